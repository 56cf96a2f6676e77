use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
	constraint::{Constraint, Relaxation},
	filters::{ScopeFilters, StructuredFilters},
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum TransactionType {
	Sale,
	Rent,
}
impl TransactionType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Sale => "sale",
			Self::Rent => "rent",
		}
	}
}
impl FromStr for TransactionType {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"sale" | "sell" | "buy" => Ok(Self::Sale),
			"rent" | "lease" => Ok(Self::Rent),
			other => Err(format!("unknown transaction type {other:?}")),
		}
	}
}
impl TryFrom<String> for TransactionType {
	type Error = String;

	fn try_from(raw: String) -> Result<Self, Self::Error> {
		raw.parse()
	}
}
impl fmt::Display for TransactionType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A geographic requirement that the extractor emits either as one name or as a list of names.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum District {
	Single(String),
	Multiple(Vec<String>),
}
impl District {
	/// Trims names, drops blanks, and collapses a one-element list into [`District::Single`].
	pub fn normalized(self) -> Option<Self> {
		match self {
			Self::Single(name) => {
				let name = name.trim();

				(!name.is_empty()).then(|| Self::Single(name.to_string()))
			},
			Self::Multiple(names) => {
				let mut kept: Vec<String> = Vec::with_capacity(names.len());

				for name in names {
					let name = name.trim();

					let seen = kept.iter().any(|kept| kept.eq_ignore_ascii_case(name));

					if !name.is_empty() && !seen {
						kept.push(name.to_string());
					}
				}

				match kept.len() {
					0 => None,
					1 => kept.pop().map(Self::Single),
					_ => Some(Self::Multiple(kept)),
				}
			},
		}
	}

	pub fn names(&self) -> &[String] {
		match self {
			Self::Single(name) => std::slice::from_ref(name),
			Self::Multiple(names) => names,
		}
	}

	pub fn matches_exact(&self, candidate_district: &str) -> bool {
		let candidate = candidate_district.trim();

		match self {
			Self::Single(name) => name.eq_ignore_ascii_case(candidate),
			Self::Multiple(names) => names.iter().any(|name| name.eq_ignore_ascii_case(candidate)),
		}
	}

	/// Substring match in either direction, e.g. "Q2" against "Q2 - An Phu".
	pub fn matches_partial(&self, candidate_location: &str) -> bool {
		let candidate = candidate_location.trim().to_lowercase();

		if candidate.is_empty() {
			return false;
		}

		let partial = |name: &String| {
			let name = name.to_lowercase();

			candidate.contains(&name) || name.contains(&candidate)
		};

		match self {
			Self::Single(name) => partial(name),
			Self::Multiple(names) => names.iter().any(partial),
		}
	}

	pub fn label(&self) -> String {
		match self {
			Self::Single(name) => name.clone(),
			Self::Multiple(names) => names.join(", "),
		}
	}
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SearchRequirements {
	pub property_type: Option<String>,
	pub transaction_type: Option<TransactionType>,
	pub city: Option<String>,
	pub district: Option<District>,
	pub price_min: Option<f64>,
	pub price_max: Option<f64>,
	pub area_min: Option<f64>,
	pub area_max: Option<f64>,
	pub bedrooms: Option<u32>,
	#[serde(default)]
	pub free_text_constraints: Vec<String>,
	/// Bedroom counts within this distance of `bedrooms` satisfy the requirement.
	#[serde(default, skip_serializing_if = "is_zero")]
	pub bedroom_tolerance: u32,
	/// Constraints loosened so far, oldest first.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub relaxed: Vec<Constraint>,
}
impl SearchRequirements {
	fn normalized(mut self) -> Self {
		self.property_type = trimmed(self.property_type);
		self.city = trimmed(self.city);
		self.district = self.district.and_then(District::normalized);
		self.free_text_constraints = self
			.free_text_constraints
			.into_iter()
			.map(|phrase| phrase.trim().to_string())
			.filter(|phrase| !phrase.is_empty())
			.collect();

		self
	}

	pub fn has_price_bounds(&self) -> bool {
		self.price_min.is_some() || self.price_max.is_some()
	}

	pub fn is_relaxed(&self, constraint: Constraint) -> bool {
		self.relaxed.contains(&constraint)
	}

	pub fn bedroom_range(&self) -> Option<(u32, u32)> {
		self.bedrooms.map(|target| {
			(
				target.saturating_sub(self.bedroom_tolerance),
				target.saturating_add(self.bedroom_tolerance),
			)
		})
	}

	/// Returns a copy with exactly one constraint loosened.
	pub fn relaxed_with(&self, relaxation: &Relaxation) -> Self {
		let mut next = self.clone();

		match relaxation {
			Relaxation::DropFreeText => next.free_text_constraints.clear(),
			Relaxation::WidenBedrooms { by } =>
				next.bedroom_tolerance = next.bedroom_tolerance.saturating_add(*by),
			Relaxation::WidenPrice { ratio } => {
				next.price_min = next.price_min.map(|min| min * (1.0 - ratio));
				next.price_max = next.price_max.map(|max| max * (1.0 + ratio));
			},
			Relaxation::DistrictToCity { city } => {
				next.district = None;

				if next.city.is_none() {
					next.city = city.clone();
				}
			},
		}

		let constraint = relaxation.constraint();

		if !next.relaxed.contains(&constraint) {
			next.relaxed.push(constraint);
		}

		next
	}

	pub fn structured_filters(&self) -> StructuredFilters {
		let (bedrooms_min, bedrooms_max) = match self.bedroom_range() {
			Some((min, max)) => (Some(min), Some(max)),
			None => (None, None),
		};

		StructuredFilters {
			property_type: self.property_type.clone(),
			transaction_type: self.transaction_type,
			city: self.city.clone(),
			district: self.district.clone(),
			price_min: self.price_min,
			price_max: self.price_max,
			area_min: self.area_min,
			area_max: self.area_max,
			bedrooms_min,
			bedrooms_max,
		}
	}

	/// Property type and transaction type within `city`, ignoring any district.
	pub fn city_scope(&self, city: Option<&str>) -> ScopeFilters {
		ScopeFilters {
			property_type: self.property_type.clone(),
			transaction_type: self.transaction_type,
			city: city.map(str::to_string),
			district: None,
		}
	}

	/// The city scope narrowed to the requested district(s), when there are any.
	pub fn narrowest_scope(&self, city: Option<&str>) -> ScopeFilters {
		ScopeFilters { district: self.district.clone(), ..self.city_scope(city) }
	}

	/// Renders the requirements as the free-form query sent alongside the structured filters.
	pub fn query_text(&self) -> String {
		let mut parts: Vec<String> = Vec::new();

		if let Some(property_type) = &self.property_type {
			parts.push(property_type.clone());
		}
		if let Some(transaction_type) = self.transaction_type {
			parts.push(format!("for {transaction_type}"));
		}

		let mut places: Vec<String> = Vec::new();

		if let Some(district) = &self.district {
			places.extend(district.names().iter().cloned());
		}
		if let Some(city) = &self.city {
			places.push(city.clone());
		}
		if !places.is_empty() {
			parts.push(format!("in {}", places.join(" ")));
		}
		if let Some(bedrooms) = self.bedrooms {
			parts.push(format!("{bedrooms} bedrooms"));
		}

		match (self.price_min, self.price_max) {
			(Some(min), Some(max)) => parts.push(format!("price {} to {}", whole(min), whole(max))),
			(Some(min), None) => parts.push(format!("price from {}", whole(min))),
			(None, Some(max)) => parts.push(format!("price up to {}", whole(max))),
			(None, None) => {},
		}
		match (self.area_min, self.area_max) {
			(Some(min), Some(max)) =>
				parts.push(format!("area {} to {} m2", whole(min), whole(max))),
			(Some(min), None) => parts.push(format!("area from {} m2", whole(min))),
			(None, Some(max)) => parts.push(format!("area up to {} m2", whole(max))),
			(None, None) => {},
		}

		parts.extend(self.free_text_constraints.iter().cloned());

		parts.join(" ")
	}
}

/// Parses the extraction collaborator's output into normalized requirements.
pub fn parse_requirements(value: Value) -> Result<SearchRequirements, serde_json::Error> {
	let requirements: SearchRequirements = serde_json::from_value(value)?;

	Ok(requirements.normalized())
}

fn trimmed(value: Option<String>) -> Option<String> {
	value.map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty())
}

fn whole(value: f64) -> String {
	format!("{}", value.round() as i64)
}

fn is_zero(value: &u32) -> bool {
	*value == 0
}
