use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	#[serde(default)]
	pub orchestrator: Orchestrator,
	#[serde(default)]
	pub retry: Retry,
	#[serde(default)]
	pub evaluation: Evaluation,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub fusion: Fusion,
	#[serde(default)]
	pub clarification: Clarification,
	#[serde(default)]
	pub geography: Geography,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub retrieval: RetrievalProviderConfig,
	pub statistics: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub path: String,
	pub api_key: Option<String>,
	#[serde(default = "default_retrieval_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
	#[serde(default = "default_result_limit")]
	pub result_limit: u32,
	/// Omit `alpha_hint` from requests for backends that reject unknown fields.
	#[serde(default = "default_true")]
	pub send_alpha_hint: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub path: String,
	pub api_key: Option<String>,
	#[serde(default = "default_statistics_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Orchestrator {
	pub max_iterations: u32,
	/// Consecutive iterations without candidates after which the loop stops early.
	pub empty_iterations_before_stop: u32,
	pub request_deadline_ms: u64,
}
impl Default for Orchestrator {
	fn default() -> Self {
		Self { max_iterations: 2, empty_iterations_before_stop: 2, request_deadline_ms: 8_000 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retry {
	pub max_retries: u32,
	pub backoff_ms: u64,
}
impl Default for Retry {
	fn default() -> Self {
		Self { max_retries: 1, backoff_ms: 200 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Evaluation {
	pub sufficiency_threshold: f32,
	pub minimum_count: u32,
	pub bedroom_widen_by: u32,
	pub price_widen_ratio: f64,
}
impl Default for Evaluation {
	fn default() -> Self {
		Self {
			sufficiency_threshold: 0.5,
			minimum_count: 3,
			bedroom_widen_by: 1,
			price_widen_ratio: 0.2,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub weights: RankingWeights,
	/// Fraction above `price_max` that still earns the over-budget score.
	pub over_budget_tolerance: f64,
	pub bands: RankingBands,
}
impl Default for Ranking {
	fn default() -> Self {
		Self {
			weights: RankingWeights::default(),
			over_budget_tolerance: 0.2,
			bands: RankingBands::default(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
	pub district_exact: u32,
	pub district_partial: u32,
	pub bedrooms_exact: u32,
	pub bedrooms_near: u32,
	pub property_type: u32,
	pub price_within: u32,
	pub price_over_budget: u32,
}
impl Default for RankingWeights {
	fn default() -> Self {
		Self {
			district_exact: 40,
			district_partial: 20,
			bedrooms_exact: 30,
			bedrooms_near: 15,
			property_type: 15,
			price_within: 15,
			price_over_budget: 7,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingBands {
	pub good_min: u8,
	pub partial_min: u8,
}
impl Default for RankingBands {
	fn default() -> Self {
		Self { good_min: 70, partial_min: 40 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Fusion {
	pub lexical_density_threshold: f32,
	pub lexical_alpha: f32,
	pub semantic_alpha: f32,
}
impl Default for Fusion {
	fn default() -> Self {
		Self { lexical_density_threshold: 0.4, lexical_alpha: 0.7, semantic_alpha: 0.3 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Clarification {
	pub max_alternatives: u32,
}
impl Default for Clarification {
	fn default() -> Self {
		Self { max_alternatives: 5 }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Geography {
	/// District name to its nearest neighbouring districts, closest first.
	pub adjacency: HashMap<String, Vec<String>>,
	/// District name to the city that contains it.
	pub parent_city: HashMap<String, String>,
	/// Extra place names that count as structured tokens when estimating lexical density.
	pub known_places: Vec<String>,
}

fn default_retrieval_timeout_ms() -> u64 {
	3_000
}

fn default_statistics_timeout_ms() -> u64 {
	2_000
}

fn default_result_limit() -> u32 {
	20
}

fn default_true() -> bool {
	true
}
