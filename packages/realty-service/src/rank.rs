use serde::Serialize;

use realty_config::{Ranking, RankingBands};
use realty_domain::{SearchCandidate, SearchRequirements};

const MAX_SCORE: u32 = 100;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
	Good,
	Partial,
	Weak,
}
impl Band {
	pub fn for_score(score: u8, bands: &RankingBands) -> Self {
		if score >= bands.good_min {
			Self::Good
		} else if score >= bands.partial_min {
			Self::Partial
		} else {
			Self::Weak
		}
	}
}

/// Which regime produced the scores of a ranked list. Never mixed within one list.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPath {
	Semantic,
	RuleBased,
}
impl ScoringPath {
	/// Semantic as soon as any candidate carries a backend relevance score.
	pub fn select(candidates: &[SearchCandidate]) -> Self {
		if candidates.iter().any(|candidate| candidate.raw_relevance_score.is_some()) {
			Self::Semantic
		} else {
			Self::RuleBased
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedAlternative {
	pub candidate: SearchCandidate,
	pub normalized_score: u8,
	pub band: Band,
}

pub struct MatchRanker<'a> {
	cfg: &'a Ranking,
}
impl<'a> MatchRanker<'a> {
	pub fn new(cfg: &'a Ranking) -> Self {
		Self { cfg }
	}

	/// Scores and orders the full candidate list, best first. Equal scores keep backend order.
	pub fn rank(
		&self,
		candidates: &[SearchCandidate],
		requirements: &SearchRequirements,
	) -> Vec<RankedAlternative> {
		let scores = match ScoringPath::select(candidates) {
			ScoringPath::Semantic => semantic_scores(candidates),
			ScoringPath::RuleBased => candidates
				.iter()
				.map(|candidate| self.rule_based_score(candidate, requirements))
				.collect(),
		};
		let mut ranked: Vec<RankedAlternative> = candidates
			.iter()
			.zip(scores)
			.map(|(candidate, normalized_score)| RankedAlternative {
				candidate: candidate.clone(),
				normalized_score,
				band: Band::for_score(normalized_score, &self.cfg.bands),
			})
			.collect();

		ranked.sort_by(|left, right| right.normalized_score.cmp(&left.normalized_score));

		ranked
	}

	/// Weighted agreement between one candidate and the requirements. Components the
	/// requirements leave open earn their full weight.
	pub fn rule_based_score(
		&self,
		candidate: &SearchCandidate,
		requirements: &SearchRequirements,
	) -> u8 {
		let weights = &self.cfg.weights;
		let mut score = 0_u32;

		score += match (&requirements.district, candidate.district.as_deref()) {
			(None, _) => weights.district_exact,
			(Some(district), Some(actual)) if district.matches_exact(actual) =>
				weights.district_exact,
			(Some(district), _) if district.matches_partial(&candidate.location()) =>
				weights.district_partial,
			(Some(_), _) => 0,
		};
		score += match (requirements.bedrooms, candidate.bedrooms) {
			(None, _) => weights.bedrooms_exact,
			(Some(target), Some(actual)) if target == actual => weights.bedrooms_exact,
			(Some(target), Some(actual)) if target.abs_diff(actual) == 1 => weights.bedrooms_near,
			(Some(_), _) => 0,
		};
		score += match (&requirements.property_type, candidate.property_type.as_deref()) {
			(None, _) => weights.property_type,
			(Some(wanted), Some(actual)) if wanted.eq_ignore_ascii_case(actual.trim()) =>
				weights.property_type,
			(Some(_), _) => 0,
		};
		score += self.price_score(candidate, requirements);

		score.min(MAX_SCORE) as u8
	}

	fn price_score(&self, candidate: &SearchCandidate, requirements: &SearchRequirements) -> u32 {
		let weights = &self.cfg.weights;

		if !requirements.has_price_bounds() {
			return weights.price_within;
		}

		let Some(price) = candidate.price else {
			return 0;
		};
		let above_min = requirements.price_min.is_none_or(|min| price >= min);

		match requirements.price_max {
			_ if !above_min => 0,
			None => weights.price_within,
			Some(max) if price <= max => weights.price_within,
			Some(max) if price <= max * (1.0 + self.cfg.over_budget_tolerance) =>
				weights.price_over_budget,
			Some(_) => 0,
		}
	}
}

/// Scales backend scores so the best candidate gets 100. A missing score counts as zero, and a
/// non-positive maximum zeroes every score.
fn semantic_scores(candidates: &[SearchCandidate]) -> Vec<u8> {
	let max_raw = candidates
		.iter()
		.filter_map(|candidate| candidate.raw_relevance_score)
		.filter(|score| score.is_finite())
		.fold(f64::NEG_INFINITY, f64::max);

	candidates
		.iter()
		.map(|candidate| {
			let raw = candidate.raw_relevance_score.unwrap_or(0.0);

			if max_raw <= 0.0 || !raw.is_finite() {
				return 0;
			}

			(raw / max_raw * f64::from(MAX_SCORE)).round().clamp(0.0, f64::from(MAX_SCORE)) as u8
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use realty_domain::District;

	use super::*;

	fn scored(id: &str, raw: Option<f64>) -> SearchCandidate {
		SearchCandidate {
			id: id.to_string(),
			raw_relevance_score: raw,
			..SearchCandidate::default()
		}
	}

	fn listing(district: &str, bedrooms: u32, property_type: &str, price: f64) -> SearchCandidate {
		SearchCandidate {
			id: format!("{district}-{bedrooms}-{price}"),
			district: Some(district.to_string()),
			city: Some("Ho Chi Minh City".to_string()),
			bedrooms: Some(bedrooms),
			property_type: Some(property_type.to_string()),
			price: Some(price),
			..SearchCandidate::default()
		}
	}

	fn requirements() -> SearchRequirements {
		SearchRequirements {
			property_type: Some("apartment".to_string()),
			district: Some(District::Single("Q2".to_string())),
			bedrooms: Some(3),
			price_min: Some(2_000.0),
			price_max: Some(3_000.0),
			..SearchRequirements::default()
		}
	}

	#[test]
	fn semantic_scores_scale_to_the_best_candidate() {
		let ranking = Ranking::default();
		let ranker = MatchRanker::new(&ranking);
		let candidates: Vec<SearchCandidate> = [12.45, 10.8, 9.1, 6.0, 5.3]
			.into_iter()
			.enumerate()
			.map(|(index, raw)| scored(&index.to_string(), Some(raw)))
			.collect();
		let ranked = ranker.rank(&candidates, &SearchRequirements::default());
		let scores: Vec<u8> = ranked.iter().map(|ranked| ranked.normalized_score).collect();
		let bands: Vec<Band> = ranked.iter().map(|ranked| ranked.band).collect();

		assert_eq!(scores, vec![100, 87, 73, 48, 43]);
		assert_eq!(bands, vec![Band::Good, Band::Good, Band::Good, Band::Partial, Band::Partial]);
	}

	#[test]
	fn semantic_path_applies_to_the_whole_list() {
		let ranking = Ranking::default();
		let ranker = MatchRanker::new(&ranking);
		let candidates = vec![
			SearchCandidate { raw_relevance_score: None, ..listing("Q2", 3, "apartment", 2_500.0) },
			scored("b", Some(4.0)),
			scored("c", Some(4.0)),
		];
		let ranked = ranker.rank(&candidates, &requirements());
		let order: Vec<(&str, u8)> = ranked
			.iter()
			.map(|alternative| (alternative.candidate.id.as_str(), alternative.normalized_score))
			.collect();

		assert_eq!(order, vec![("b", 100), ("c", 100), ("Q2-3-2500", 0)]);
	}

	#[test]
	fn zero_maximum_zeroes_every_score() {
		let ranking = Ranking::default();
		let ranker = MatchRanker::new(&ranking);
		let ranked = ranker.rank(
			&[scored("a", Some(0.0)), scored("b", Some(0.0))],
			&SearchRequirements::default(),
		);

		assert!(ranked.iter().all(|alternative| alternative.normalized_score == 0));
		assert!(ranked.iter().all(|alternative| alternative.band == Band::Weak));
	}

	#[test]
	fn exact_rule_match_scores_one_hundred() {
		let ranking = Ranking::default();
		let ranker = MatchRanker::new(&ranking);

		assert_eq!(
			ranker.rule_based_score(&listing("Q2", 3, "Apartment", 2_500.0), &requirements()),
			100
		);
	}

	#[test]
	fn rule_based_partial_credit() {
		let ranking = Ranking::default();
		let ranker = MatchRanker::new(&ranking);
		let requirements = requirements();

		// Partial district, one bedroom off, over budget within tolerance.
		assert_eq!(
			ranker.rule_based_score(
				&listing("Q2 - An Phu", 4, "apartment", 3_500.0),
				&requirements
			),
			20 + 15 + 15 + 7
		);
		// Wrong district, two bedrooms off, far over budget.
		assert_eq!(
			ranker.rule_based_score(&listing("Q9", 1, "villa", 9_000.0), &requirements),
			0
		);
	}

	#[test]
	fn rule_based_ranking_is_sorted_and_banded() {
		let ranking = Ranking::default();
		let ranker = MatchRanker::new(&ranking);
		let candidates = vec![
			listing("Q9", 1, "villa", 9_000.0),
			listing("Q2", 3, "apartment", 2_500.0),
			listing("Q2 - An Phu", 4, "apartment", 3_500.0),
		];
		let ranked = ranker.rank(&candidates, &requirements());
		let scores: Vec<(u8, Band)> =
			ranked.iter().map(|ranked| (ranked.normalized_score, ranked.band)).collect();

		assert_eq!(ScoringPath::select(&candidates), ScoringPath::RuleBased);
		assert_eq!(scores, vec![(100, Band::Good), (57, Band::Partial), (0, Band::Weak)]);
	}
}
