use serde::Serialize;

use realty_config::Evaluation as EvaluationConfig;
use realty_domain::{
	Constraint, GeographyIndex, Relaxation, SearchCandidate, SearchRequirements,
	satisfies_hard_constraints,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum EvaluationVerdict {
	Sufficient,
	RefineWith { relaxation: Relaxation },
	Clarify { unmet: Vec<Constraint> },
}
impl EvaluationVerdict {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Sufficient => "sufficient",
			Self::RefineWith { .. } => "refine_with",
			Self::Clarify { .. } => "clarify",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Evaluation {
	pub verdict: EvaluationVerdict,
	pub match_rate: f32,
}

pub struct ResultEvaluator<'a> {
	cfg: &'a EvaluationConfig,
	geography: &'a GeographyIndex,
}
impl<'a> ResultEvaluator<'a> {
	pub fn new(cfg: &'a EvaluationConfig, geography: &'a GeographyIndex) -> Self {
		Self { cfg, geography }
	}

	/// Classifies one iteration's candidates. `iterations_remain` gates refinement: without a
	/// further iteration there is nothing to refine into.
	pub fn evaluate(
		&self,
		candidates: &[SearchCandidate],
		requirements: &SearchRequirements,
		iterations_remain: bool,
	) -> Evaluation {
		let match_rate = match_rate(candidates, requirements);
		let enough = candidates.len() >= self.cfg.minimum_count as usize;

		if enough && match_rate >= self.cfg.sufficiency_threshold {
			return Evaluation { verdict: EvaluationVerdict::Sufficient, match_rate };
		}

		let verdict = match self.next_relaxation(requirements).filter(|_| iterations_remain) {
			Some(relaxation) => EvaluationVerdict::RefineWith { relaxation },
			None => EvaluationVerdict::Clarify {
				unmet: self.unmet_constraints(candidates, requirements),
			},
		};

		Evaluation { verdict, match_rate }
	}

	/// Constraints to surface in a clarification. A present hard constraint is unmet when fewer
	/// than `sufficiency_threshold` of the candidates satisfy it; free text cannot be verified
	/// against candidates, so it is unmet whenever present. Relaxed constraints are always unmet.
	pub fn unmet_constraints(
		&self,
		candidates: &[SearchCandidate],
		requirements: &SearchRequirements,
	) -> Vec<Constraint> {
		Constraint::ALL
			.into_iter()
			.filter(|constraint| {
				if requirements.is_relaxed(*constraint) {
					return true;
				}
				if !constraint.is_present(requirements) {
					return false;
				}
				if *constraint == Constraint::FreeText || candidates.is_empty() {
					return true;
				}

				let satisfied = candidates
					.iter()
					.filter(|candidate| constraint.is_satisfied_by(requirements, candidate))
					.count();

				(satisfied as f32 / candidates.len() as f32) < self.cfg.sufficiency_threshold
			})
			.collect()
	}

	/// The weakest constraint that can still be loosened, in the fixed order free text,
	/// bedrooms, price, district.
	pub fn next_relaxation(&self, requirements: &SearchRequirements) -> Option<Relaxation> {
		Constraint::RELAXATION_ORDER.into_iter().find_map(|constraint| match constraint {
			Constraint::FreeText => Constraint::FreeText
				.is_present(requirements)
				.then_some(Relaxation::DropFreeText),
			Constraint::Bedrooms => (requirements.bedrooms.is_some()
				&& !requirements.is_relaxed(Constraint::Bedrooms))
			.then_some(Relaxation::WidenBedrooms { by: self.cfg.bedroom_widen_by }),
			Constraint::Price => (requirements.has_price_bounds()
				&& !requirements.is_relaxed(Constraint::Price))
			.then_some(Relaxation::WidenPrice { ratio: self.cfg.price_widen_ratio }),
			Constraint::District => requirements.district.as_ref().map(|district| {
				Relaxation::DistrictToCity { city: self.geography.parent_city(district) }
			}),
			Constraint::PropertyType => None,
		})
	}
}

/// Fraction of `candidates` that satisfy every hard constraint; zero for an empty set.
pub fn match_rate(candidates: &[SearchCandidate], requirements: &SearchRequirements) -> f32 {
	if candidates.is_empty() {
		return 0.0;
	}

	let matching = candidates
		.iter()
		.filter(|candidate| satisfies_hard_constraints(requirements, candidate))
		.count();

	matching as f32 / candidates.len() as f32
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use realty_domain::District;

	use super::*;

	fn geography() -> GeographyIndex {
		GeographyIndex::new(&realty_config::Geography {
			parent_city: HashMap::from([("Q2".to_string(), "Ho Chi Minh City".to_string())]),
			..realty_config::Geography::default()
		})
	}

	fn candidate(district: &str, bedrooms: u32) -> SearchCandidate {
		SearchCandidate {
			id: format!("{district}-{bedrooms}"),
			district: Some(district.to_string()),
			bedrooms: Some(bedrooms),
			property_type: Some("apartment".to_string()),
			..SearchCandidate::default()
		}
	}

	fn requirements() -> SearchRequirements {
		SearchRequirements {
			property_type: Some("apartment".to_string()),
			district: Some(District::Single("Q2".to_string())),
			bedrooms: Some(3),
			price_max: Some(3_000.0),
			free_text_constraints: vec!["near international school".to_string()],
			..SearchRequirements::default()
		}
	}

	#[test]
	fn sufficient_needs_rate_and_count() {
		let cfg = EvaluationConfig::default();
		let geography = geography();
		let evaluator = ResultEvaluator::new(&cfg, &geography);
		let requirements = SearchRequirements {
			district: Some(District::Single("Q2".to_string())),
			bedrooms: Some(3),
			..SearchRequirements::default()
		};
		let mut candidates = vec![
			candidate("Q2", 3),
			candidate("Q2", 3),
			candidate("Q2", 3),
			candidate("Q2", 3),
			candidate("Q9", 3),
		];
		let evaluation = evaluator.evaluate(&candidates, &requirements, true);

		assert_eq!(evaluation.verdict, EvaluationVerdict::Sufficient);
		assert!((evaluation.match_rate - 0.8).abs() < 1e-6);

		candidates.truncate(2);

		let too_few = evaluator.evaluate(&candidates, &requirements, true);

		assert_eq!(too_few.match_rate, 1.0);
		assert_ne!(too_few.verdict, EvaluationVerdict::Sufficient);
	}

	#[test]
	fn relaxes_one_constraint_at_a_time_weakest_first() {
		let cfg = EvaluationConfig::default();
		let geography = geography();
		let evaluator = ResultEvaluator::new(&cfg, &geography);
		let mut requirements = requirements();
		let mut order = Vec::new();

		while let Some(relaxation) = evaluator.next_relaxation(&requirements) {
			requirements = requirements.relaxed_with(&relaxation);

			order.push(relaxation);
		}

		assert_eq!(order, vec![
			Relaxation::DropFreeText,
			Relaxation::WidenBedrooms { by: 1 },
			Relaxation::WidenPrice { ratio: 0.2 },
			Relaxation::DistrictToCity { city: Some("Ho Chi Minh City".to_string()) },
		]);
		assert_eq!(requirements.city.as_deref(), Some("Ho Chi Minh City"));
	}

	#[test]
	fn clarifies_when_no_iterations_remain() {
		let cfg = EvaluationConfig::default();
		let geography = geography();
		let evaluator = ResultEvaluator::new(&cfg, &geography);
		let evaluation = evaluator.evaluate(&[candidate("Q9", 3)], &requirements(), false);

		assert_eq!(evaluation.verdict, EvaluationVerdict::Clarify {
			unmet: vec![Constraint::FreeText, Constraint::Price, Constraint::District],
		});
	}

	#[test]
	fn clarifies_when_nothing_is_left_to_relax() {
		let cfg = EvaluationConfig::default();
		let geography = geography();
		let evaluator = ResultEvaluator::new(&cfg, &geography);
		let requirements =
			SearchRequirements { property_type: Some("villa".to_string()), ..Default::default() };
		let evaluation = evaluator.evaluate(&[], &requirements, true);

		assert_eq!(evaluation.match_rate, 0.0);
		assert_eq!(evaluation.verdict, EvaluationVerdict::Clarify {
			unmet: vec![Constraint::PropertyType],
		});
	}

	#[test]
	fn relaxed_constraints_stay_unmet() {
		let cfg = EvaluationConfig::default();
		let geography = geography();
		let evaluator = ResultEvaluator::new(&cfg, &geography);
		let relaxed = requirements()
			.relaxed_with(&Relaxation::DropFreeText)
			.relaxed_with(&Relaxation::WidenBedrooms { by: 1 });
		let candidates = vec![
			SearchCandidate { price: Some(2_000.0), ..candidate("Q2", 4) },
			SearchCandidate { price: Some(2_500.0), ..candidate("Q2", 3) },
		];

		assert_eq!(evaluator.unmet_constraints(&candidates, &relaxed), vec![
			Constraint::FreeText,
			Constraint::Bedrooms,
		]);
	}
}
