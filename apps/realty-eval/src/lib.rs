use std::{
	fs,
	path::{Path, PathBuf},
	time::Instant,
};

use clap::{
	Parser,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use realty_service::{RunResult, RunTrace, SearchEngine, StopReason};

pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

#[derive(Debug, Parser)]
#[command(version = VERSION, rename_all = "kebab", styles = styles())]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	#[arg(long, value_name = "N", default_value_t = 1)]
	pub runs_per_query: u32,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
	Success,
	Clarification,
}
impl Expectation {
	fn matches(self, result: &RunResult) -> bool {
		matches!(
			(self, result),
			(Self::Success, RunResult::Success(_))
				| (Self::Clarification, RunResult::Clarification(_))
		)
	}
}

#[derive(Debug, Deserialize)]
pub struct EvalDataset {
	pub name: Option<String>,
	pub queries: Vec<EvalQuery>,
}

#[derive(Debug, Deserialize)]
pub struct EvalQuery {
	pub id: Option<String>,
	/// Raw extraction output; parsed by the engine so unreadable input is evaluated too.
	pub requirements: Value,
	pub expect: Option<Expectation>,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	generated_at: String,
	dataset: EvalDatasetInfo,
	settings: EvalSettings,
	summary: EvalSummary,
	queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
struct EvalDatasetInfo {
	name: String,
	query_count: usize,
}

#[derive(Debug, Serialize)]
struct EvalSettings {
	config_path: String,
	max_iterations: u32,
	runs_per_query: u32,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct EvalSummary {
	pub success_rate: f64,
	pub clarification_rate: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expectation_accuracy: Option<f64>,
	pub mean_iterations: f64,
	pub latency_ms_p50: f64,
	pub latency_ms_p95: f64,
}

#[derive(Debug, Serialize)]
pub struct QueryReport {
	pub id: String,
	pub request_ids: Vec<Uuid>,
	pub kind: &'static str,
	pub iterations: usize,
	pub stop_reason: StopReason,
	pub alternative_count: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub top_score: Option<u8>,
	pub latency_ms: f64,
	/// Whether every run of the query ended in the same kind of result.
	pub consistent: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expect: Option<Expectation>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expectation_met: Option<bool>,
}

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Red.on_default() | Effects::BOLD)
		.usage(AnsiColor::Red.on_default() | Effects::BOLD)
		.literal(AnsiColor::Blue.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = realty_config::load(&args.config)?;
	let filter = EnvFilter::try_new(&config.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let dataset = load_dataset(&args.dataset)?;
	let runs_per_query = args.runs_per_query.max(1);
	let max_iterations = config.orchestrator.max_iterations;
	let engine = SearchEngine::new(config);
	let queries = evaluate(&engine, &dataset, runs_per_query).await;
	let output = EvalOutput {
		generated_at: OffsetDateTime::now_utc()
			.format(&Rfc3339)
			.map_err(|err| eyre::eyre!("Failed to format report timestamp: {err}"))?,
		dataset: EvalDatasetInfo {
			name: dataset.name.clone().unwrap_or_else(|| "unnamed".to_string()),
			query_count: dataset.queries.len(),
		},
		settings: EvalSettings {
			config_path: args.config.display().to_string(),
			max_iterations,
			runs_per_query,
		},
		summary: summarize(&queries),
		queries,
	};
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

pub fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	Ok(dataset)
}

/// Runs every query `runs_per_query` times. The report describes the last run; latency is the
/// mean over all runs.
pub async fn evaluate(
	engine: &SearchEngine,
	dataset: &EvalDataset,
	runs_per_query: u32,
) -> Vec<QueryReport> {
	let mut reports = Vec::with_capacity(dataset.queries.len());

	for (index, query) in dataset.queries.iter().enumerate() {
		let id = query.id.clone().unwrap_or_else(|| format!("q{}", index + 1));
		let mut runs: Vec<(RunResult, RunTrace, f64)> = Vec::new();

		for _ in 0..runs_per_query.max(1) {
			let started = Instant::now();
			let (result, trace) = engine.run_value(query.requirements.clone()).await;

			runs.push((result, trace, started.elapsed().as_secs_f64() * 1_000.0));
		}

		let Some((result, trace, _)) = runs.last() else {
			continue;
		};
		let kind = result.as_str();
		let consistent = runs.iter().all(|(other, _, _)| other.as_str() == kind);
		let latency_ms =
			runs.iter().map(|(_, _, latency)| latency).sum::<f64>() / runs.len() as f64;
		let (alternative_count, top_score) = match result {
			RunResult::Success(success) => (
				success.ranked.len(),
				success.ranked.first().map(|ranked| ranked.normalized_score),
			),
			RunResult::Clarification(response) => (
				response.alternatives.len(),
				response.alternatives.first().map(|ranked| ranked.normalized_score),
			),
		};
		let expectation_met = query.expect.map(|expect| expect.matches(result));

		tracing::info!(
			query_id = %id,
			kind,
			stop_reason = trace.stop_reason.as_str(),
			latency_ms,
			"Evaluated query."
		);

		reports.push(QueryReport {
			id,
			request_ids: runs.iter().map(|(_, trace, _)| trace.request_id).collect(),
			kind,
			iterations: trace.iterations.len(),
			stop_reason: trace.stop_reason,
			alternative_count,
			top_score,
			latency_ms,
			consistent,
			expect: query.expect,
			expectation_met,
		});
	}

	reports
}

pub fn summarize(queries: &[QueryReport]) -> EvalSummary {
	let total = queries.len().max(1) as f64;
	let successes = queries.iter().filter(|query| query.kind == "success").count() as f64;
	let clarifications =
		queries.iter().filter(|query| query.kind == "clarification").count() as f64;
	let judged: Vec<bool> = queries.iter().filter_map(|query| query.expectation_met).collect();
	let expectation_accuracy = (!judged.is_empty())
		.then(|| judged.iter().filter(|met| **met).count() as f64 / judged.len() as f64);
	let mean_iterations = queries.iter().map(|query| query.iterations as f64).sum::<f64>() / total;
	let mut latencies: Vec<f64> = queries.iter().map(|query| query.latency_ms).collect();

	latencies.sort_by(f64::total_cmp);

	EvalSummary {
		success_rate: successes / total,
		clarification_rate: clarifications / total,
		expectation_accuracy,
		mean_iterations,
		latency_ms_p50: percentile(&latencies, 0.50),
		latency_ms_p95: percentile(&latencies, 0.95),
	}
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let clamped = percentile.clamp(0.0, 1.0);
	let pos = clamped * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn report(
		kind: &'static str,
		iterations: usize,
		latency_ms: f64,
		met: Option<bool>,
	) -> QueryReport {
		QueryReport {
			id: kind.to_string(),
			request_ids: vec![Uuid::new_v4()],
			kind,
			iterations,
			stop_reason: StopReason::Sufficient,
			alternative_count: 0,
			top_score: None,
			latency_ms,
			consistent: true,
			expect: None,
			expectation_met: met,
		}
	}

	#[test]
	fn percentile_interpolates_between_neighbours() {
		let values = [10.0, 20.0, 30.0, 40.0];

		assert_eq!(percentile(&values, 0.0), 10.0);
		assert_eq!(percentile(&values, 1.0), 40.0);
		assert!((percentile(&values, 0.5) - 25.0).abs() < 1e-9);
		assert_eq!(percentile(&[], 0.95), 0.0);
	}

	#[test]
	fn summary_counts_outcomes_and_expectations() {
		let summary = summarize(&[
			report("success", 1, 40.0, Some(true)),
			report("clarification", 2, 10.0, Some(false)),
			report("clarification", 2, 20.0, None),
			report("success", 1, 30.0, Some(true)),
		]);

		assert_eq!(summary.success_rate, 0.5);
		assert_eq!(summary.clarification_rate, 0.5);
		assert_eq!(summary.mean_iterations, 1.5);
		assert!((summary.expectation_accuracy.unwrap_or_default() - 2.0 / 3.0).abs() < 1e-9);
		assert!((summary.latency_ms_p50 - 25.0).abs() < 1e-9);
	}

	#[test]
	fn dataset_parses_expectations_and_rejects_empty_sets() {
		let dataset: EvalDataset = serde_json::from_value(serde_json::json!({
			"name": "smoke",
			"queries": [
				{ "id": "a", "requirements": { "property_type": "apartment" }, "expect": "success" },
				{ "requirements": { "city": "Hanoi" }, "expect": "clarification" }
			]
		}))
		.expect("Dataset must parse.");

		assert_eq!(dataset.queries[0].expect, Some(Expectation::Success));
		assert_eq!(dataset.queries[1].expect, Some(Expectation::Clarification));

		let path = std::env::temp_dir().join(format!("realty_eval_{}.json", Uuid::new_v4()));

		fs::write(&path, r#"{ "queries": [] }"#).expect("Failed to write dataset.");

		assert!(load_dataset(&path).is_err());

		fs::remove_file(&path).ok();
	}

	#[tokio::test]
	async fn malformed_queries_are_reported_without_backend_calls() {
		let config: realty_config::Config = serde_json::from_value(serde_json::json!({
			"service": { "log_level": "info" },
			"providers": {
				"retrieval": {
					"provider_id": "unused",
					"api_base": "http://127.0.0.1:9",
					"path": "/search"
				},
				"statistics": {
					"provider_id": "unused",
					"api_base": "http://127.0.0.1:9",
					"path": "/count"
				}
			}
		}))
		.expect("Config must parse.");
		let dataset: EvalDataset = serde_json::from_value(serde_json::json!({
			"queries": [
				{ "requirements": { "city": "Hanoi" }, "expect": "clarification" },
				{ "id": "bad", "requirements": { "transaction_type": "swap" } }
			]
		}))
		.expect("Dataset must parse.");
		let reports = evaluate(&SearchEngine::new(config), &dataset, 2).await;

		assert_eq!(reports.len(), 2);
		assert_eq!(reports[0].id, "q1");
		assert_eq!(reports[0].kind, "clarification");
		assert_eq!(reports[0].stop_reason, StopReason::MalformedRequirements);
		assert_eq!(reports[0].expectation_met, Some(true));
		assert_eq!(reports[0].request_ids.len(), 2);
		assert!(reports[0].consistent);
		assert_eq!(reports[1].iterations, 0);
		assert_eq!(reports[1].expectation_met, None);
	}

	#[test]
	fn args_parse_with_defaults() {
		let args = Args::try_parse_from(["realty-eval", "-c", "config.toml", "-d", "set.json"])
			.expect("Arguments must parse.");

		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.runs_per_query, 1);
	}
}
