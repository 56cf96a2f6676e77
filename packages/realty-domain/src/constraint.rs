use serde::{Deserialize, Serialize};

use crate::{candidate::SearchCandidate, requirements::SearchRequirements};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
	FreeText,
	Bedrooms,
	Price,
	District,
	PropertyType,
}
impl Constraint {
	/// Constraints a candidate must satisfy to count toward the match rate.
	pub const HARD: [Self; 4] = [Self::District, Self::Price, Self::Bedrooms, Self::PropertyType];
	/// Weakest first; at most one of these is loosened per iteration.
	pub const RELAXATION_ORDER: [Self; 4] =
		[Self::FreeText, Self::Bedrooms, Self::Price, Self::District];
	/// Reporting order for unmet constraints.
	pub const ALL: [Self; 5] =
		[Self::FreeText, Self::Bedrooms, Self::Price, Self::District, Self::PropertyType];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::FreeText => "free_text",
			Self::Bedrooms => "bedrooms",
			Self::Price => "price",
			Self::District => "district",
			Self::PropertyType => "property_type",
		}
	}

	pub fn is_present(self, requirements: &SearchRequirements) -> bool {
		match self {
			Self::FreeText => !requirements.free_text_constraints.is_empty(),
			Self::Bedrooms => requirements.bedrooms.is_some(),
			Self::Price => requirements.has_price_bounds(),
			Self::District => requirements.district.is_some(),
			Self::PropertyType => requirements.property_type.is_some(),
		}
	}

	/// Whether `candidate` meets this constraint. Absent constraints are met vacuously and
	/// free text is never checked against candidates.
	pub fn is_satisfied_by(
		self,
		requirements: &SearchRequirements,
		candidate: &SearchCandidate,
	) -> bool {
		match self {
			Self::FreeText => true,
			Self::Bedrooms => match (requirements.bedroom_range(), candidate.bedrooms) {
				(None, _) => true,
				(Some((min, max)), Some(bedrooms)) => (min..=max).contains(&bedrooms),
				(Some(_), None) => false,
			},
			Self::Price => {
				if !requirements.has_price_bounds() {
					return true;
				}

				let Some(price) = candidate.price else {
					return false;
				};

				requirements.price_min.is_none_or(|min| price >= min)
					&& requirements.price_max.is_none_or(|max| price <= max)
			},
			Self::District => match (&requirements.district, candidate.district.as_deref()) {
				(None, _) => true,
				(Some(district), Some(candidate_district)) =>
					district.matches_exact(candidate_district),
				(Some(_), None) => false,
			},
			Self::PropertyType =>
				match (&requirements.property_type, candidate.property_type.as_deref()) {
					(None, _) => true,
					(Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual.trim()),
					(Some(_), None) => false,
				},
		}
	}
}

/// One loosening step applied to a requirements variant.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Relaxation {
	DropFreeText,
	WidenBedrooms { by: u32 },
	WidenPrice { ratio: f64 },
	/// Replaces the district with its parent city, when one is known.
	DistrictToCity { city: Option<String> },
}
impl Relaxation {
	pub fn constraint(&self) -> Constraint {
		match self {
			Self::DropFreeText => Constraint::FreeText,
			Self::WidenBedrooms { .. } => Constraint::Bedrooms,
			Self::WidenPrice { .. } => Constraint::Price,
			Self::DistrictToCity { .. } => Constraint::District,
		}
	}
}

/// Whether `candidate` satisfies every hard constraint present in `requirements`.
pub fn satisfies_hard_constraints(
	requirements: &SearchRequirements,
	candidate: &SearchCandidate,
) -> bool {
	Constraint::HARD.iter().all(|constraint| constraint.is_satisfied_by(requirements, candidate))
}
