use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::{
	Result, RetrievalBackend,
	retry::{Attempted, RetryPolicy},
};
use realty_config::{Config, Fusion};
use realty_domain::{GeographyIndex, SearchCandidate, SearchRequirements};
use realty_providers::search::RetrievalRequest;

pub(crate) const BACKEND_LABEL: &str = "retrieval";

static NUMERIC_TOKEN: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"(?i)^\d+(?:[.,]\d+)*(?:m2|sqm|k|m|b|bn|tr|ty)?$").ok());
static DISTRICT_CODE_TOKEN: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"(?i)^[a-z]{1,2}\d{1,2}$").ok());

/// Result of one retrieval iteration, after retries.
#[derive(Debug)]
pub struct RetrievalOutcome {
	pub alpha_hint: Option<f32>,
	pub result: Result<Vec<SearchCandidate>>,
	pub attempts: u32,
}

/// Glue between the orchestrator and the hybrid backend: renders the request, picks the fusion
/// hint, and applies the retry policy.
pub struct HybridRetrievalClient<'a> {
	cfg: &'a Config,
	geography: &'a GeographyIndex,
	backend: &'a dyn RetrievalBackend,
	policy: RetryPolicy,
}
impl<'a> HybridRetrievalClient<'a> {
	pub fn new(
		cfg: &'a Config,
		geography: &'a GeographyIndex,
		backend: &'a dyn RetrievalBackend,
	) -> Self {
		let policy = RetryPolicy::new(&cfg.retry, cfg.providers.retrieval.timeout_ms);

		Self { cfg, geography, backend, policy }
	}

	pub fn build_request(&self, requirements: &SearchRequirements) -> RetrievalRequest {
		let query_text = requirements.query_text();
		let alpha_hint = self.cfg.providers.retrieval.send_alpha_hint.then(|| {
			alpha_hint(lexical_density(&query_text, requirements, self.geography), &self.cfg.fusion)
		});

		RetrievalRequest {
			query_text,
			structured_filters: requirements.structured_filters(),
			alpha_hint,
			limit: self.cfg.providers.retrieval.result_limit,
		}
	}

	pub async fn search(&self, requirements: &SearchRequirements) -> RetrievalOutcome {
		let request = self.build_request(requirements);
		let cfg = &self.cfg.providers.retrieval;
		let Attempted { result, attempts } =
			self.policy.run(BACKEND_LABEL, || self.backend.search(cfg, &request)).await;

		RetrievalOutcome { alpha_hint: request.alpha_hint, result, attempts }
	}
}

/// Share of query tokens that look like structured values: numbers, district codes, and known
/// place names (including the requirement's own city and districts).
pub fn lexical_density(
	query_text: &str,
	requirements: &SearchRequirements,
	geography: &GeographyIndex,
) -> f32 {
	let tokens: Vec<String> = query_text.unicode_words().map(str::to_lowercase).collect();

	if tokens.is_empty() {
		return 0.0;
	}

	let mut structured: Vec<bool> = tokens
		.iter()
		.map(|token| {
			pattern_matches(&NUMERIC_TOKEN, token)
				|| pattern_matches(&DISTRICT_CODE_TOKEN, token)
				|| geography.is_known_place(token)
		})
		.collect();

	let requested_places = requirements
		.district
		.iter()
		.flat_map(|district| district.names().iter().map(String::as_str))
		.chain(requirements.city.as_deref());

	for place in geography.places().chain(requested_places) {
		let place_tokens: Vec<String> = place.unicode_words().map(str::to_lowercase).collect();

		// Single-word places were already matched per token.
		if place_tokens.len() > 1 || !geography.is_known_place(place) {
			mark_sequence(&tokens, &place_tokens, &mut structured);
		}
	}

	let count = structured.iter().filter(|flag| **flag).count();

	count as f32 / tokens.len() as f32
}

/// Strictly above the threshold favours lexical matching.
pub fn alpha_hint(density: f32, fusion: &Fusion) -> f32 {
	if density > fusion.lexical_density_threshold {
		fusion.lexical_alpha
	} else {
		fusion.semantic_alpha
	}
}

fn pattern_matches(pattern: &LazyLock<Option<Regex>>, token: &str) -> bool {
	pattern.as_ref().is_some_and(|re| re.is_match(token))
}

fn mark_sequence(tokens: &[String], needle: &[String], structured: &mut [bool]) {
	if needle.is_empty() || needle.len() > tokens.len() {
		return;
	}

	for start in 0..=tokens.len() - needle.len() {
		if tokens[start..start + needle.len()] == *needle {
			structured[start..start + needle.len()].iter_mut().for_each(|flag| *flag = true);
		}
	}
}

#[cfg(test)]
mod tests {
	use realty_domain::{District, TransactionType};

	use super::*;

	fn geography() -> GeographyIndex {
		GeographyIndex::new(&realty_config::Geography {
			known_places: vec!["Ho Chi Minh City".to_string()],
			..realty_config::Geography::default()
		})
	}

	fn structured_requirements() -> SearchRequirements {
		SearchRequirements {
			property_type: Some("apartment".to_string()),
			transaction_type: Some(TransactionType::Sale),
			city: Some("Ho Chi Minh City".to_string()),
			district: Some(District::Single("Q2".to_string())),
			bedrooms: Some(3),
			price_min: Some(2_000_000_000.0),
			price_max: Some(3_000_000_000.0),
			..SearchRequirements::default()
		}
	}

	#[test]
	fn numeric_and_place_heavy_queries_favour_lexical() {
		let requirements = structured_requirements();
		let density =
			lexical_density(&requirements.query_text(), &requirements, &geography());

		assert!(density > 0.4, "Unexpected density: {density}");
		assert_eq!(alpha_hint(density, &Fusion::default()), 0.7);
	}

	#[test]
	fn descriptive_queries_favour_semantic() {
		let requirements = SearchRequirements {
			property_type: Some("house".to_string()),
			free_text_constraints: vec![
				"quiet street with a garden".to_string(),
				"walking distance to an international school".to_string(),
			],
			..SearchRequirements::default()
		};
		let density =
			lexical_density(&requirements.query_text(), &requirements, &geography());

		assert!(density <= 0.4, "Unexpected density: {density}");
		assert_eq!(alpha_hint(density, &Fusion::default()), 0.3);
	}

	#[test]
	fn multi_word_places_count_every_token() {
		let density = lexical_density(
			"Ho Chi Minh City villa",
			&SearchRequirements::default(),
			&geography(),
		);

		assert_eq!(density, 0.8);
	}

	#[test]
	fn single_word_known_places_count_as_structured() {
		let geography = GeographyIndex::new(&realty_config::Geography {
			known_places: vec!["Thao Dien".to_string(), "Ecopark".to_string()],
			..realty_config::Geography::default()
		});
		let density =
			lexical_density("townhouse ecopark garden", &SearchRequirements::default(), &geography);

		assert_eq!(density, 1.0 / 3.0);
	}

	#[test]
	fn empty_query_has_zero_density() {
		assert_eq!(lexical_density("", &SearchRequirements::default(), &geography()), 0.0);
	}
}
