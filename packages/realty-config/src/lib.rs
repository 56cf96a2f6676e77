mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Clarification, Config, Evaluation, Fusion, Geography, Orchestrator, ProviderConfig, Providers,
	Ranking, RankingBands, RankingWeights, Retry, RetrievalProviderConfig, Service,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::validation("service.log_level must be non-empty."));
	}

	for (label, api_base, timeout_ms, headers) in [
		(
			"retrieval",
			&cfg.providers.retrieval.api_base,
			cfg.providers.retrieval.timeout_ms,
			&cfg.providers.retrieval.default_headers,
		),
		(
			"statistics",
			&cfg.providers.statistics.api_base,
			cfg.providers.statistics.timeout_ms,
			&cfg.providers.statistics.default_headers,
		),
	] {
		if api_base.trim().is_empty() {
			return Err(Error::validation(format!(
				"providers.{label}.api_base must be non-empty."
			)));
		}
		if timeout_ms == 0 {
			return Err(Error::validation(format!(
				"providers.{label}.timeout_ms must be greater than zero."
			)));
		}
		if headers.values().any(|value| !value.is_string()) {
			return Err(Error::validation(format!(
				"providers.{label}.default_headers values must be strings."
			)));
		}
	}

	if cfg.providers.retrieval.result_limit == 0 {
		return Err(Error::validation(
			"providers.retrieval.result_limit must be greater than zero.",
		));
	}
	if cfg.orchestrator.max_iterations == 0 {
		return Err(Error::validation("orchestrator.max_iterations must be greater than zero."));
	}
	if cfg.orchestrator.empty_iterations_before_stop == 0 {
		return Err(Error::validation(
			"orchestrator.empty_iterations_before_stop must be greater than zero.",
		));
	}

	let retried_call_ms = cfg.providers.retrieval.timeout_ms
		* (u64::from(cfg.retry.max_retries) + 1)
		+ cfg.retry.backoff_ms * u64::from(cfg.retry.max_retries);

	if retried_call_ms > cfg.orchestrator.request_deadline_ms {
		return Err(Error::validation(format!(
			"orchestrator.request_deadline_ms must allow one retried retrieval call ({retried_call_ms} ms)."
		)));
	}

	validate_unit_range("evaluation.sufficiency_threshold", cfg.evaluation.sufficiency_threshold)?;

	if cfg.evaluation.minimum_count == 0 {
		return Err(Error::validation("evaluation.minimum_count must be greater than zero."));
	}
	if cfg.evaluation.bedroom_widen_by == 0 {
		return Err(Error::validation("evaluation.bedroom_widen_by must be greater than zero."));
	}
	if !cfg.evaluation.price_widen_ratio.is_finite()
		|| cfg.evaluation.price_widen_ratio <= 0.0
		|| cfg.evaluation.price_widen_ratio > 1.0
	{
		return Err(Error::validation(
			"evaluation.price_widen_ratio must be greater than 0.0 and at most 1.0.",
		));
	}
	if !cfg.ranking.over_budget_tolerance.is_finite() || cfg.ranking.over_budget_tolerance < 0.0 {
		return Err(Error::validation(
			"ranking.over_budget_tolerance must be a finite number, zero or greater.",
		));
	}

	let bands = &cfg.ranking.bands;

	if bands.good_min > 100 || bands.partial_min >= bands.good_min {
		return Err(Error::validation(
			"ranking.bands must satisfy partial_min < good_min <= 100.",
		));
	}

	validate_unit_range("fusion.lexical_density_threshold", cfg.fusion.lexical_density_threshold)?;
	validate_unit_range("fusion.lexical_alpha", cfg.fusion.lexical_alpha)?;
	validate_unit_range("fusion.semantic_alpha", cfg.fusion.semantic_alpha)?;

	if !(1..=5).contains(&cfg.clarification.max_alternatives) {
		return Err(Error::validation("clarification.max_alternatives must be in the range 1-5."));
	}

	for (district, neighbours) in &cfg.geography.adjacency {
		if neighbours.is_empty() {
			return Err(Error::Geography {
				district: district.clone(),
				message: "adjacency list must be non-empty.".to_string(),
			});
		}
		if neighbours.iter().any(|neighbour| neighbour.eq_ignore_ascii_case(district)) {
			return Err(Error::Geography {
				district: district.clone(),
				message: "a district cannot neighbour itself.".to_string(),
			});
		}
	}
	for (district, city) in &cfg.geography.parent_city {
		if city.trim().is_empty() {
			return Err(Error::Geography {
				district: district.clone(),
				message: "parent city must be non-empty.".to_string(),
			});
		}
	}

	Ok(())
}

fn validate_unit_range(key: &str, value: f32) -> Result<()> {
	if !value.is_finite() || !(0.0..=1.0).contains(&value) {
		return Err(Error::validation(format!("{key} must be in the range 0.0-1.0.")));
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for api_key in
		[&mut cfg.providers.retrieval.api_key, &mut cfg.providers.statistics.api_key]
	{
		if api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
			*api_key = None;
		}
	}

	cfg.providers.retrieval.api_base =
		cfg.providers.retrieval.api_base.trim_end_matches('/').to_string();
	cfg.providers.statistics.api_base =
		cfg.providers.statistics.api_base.trim_end_matches('/').to_string();
	cfg.geography.known_places.retain(|place| !place.trim().is_empty());
}
