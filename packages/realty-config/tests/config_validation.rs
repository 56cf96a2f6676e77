use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use realty_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

fn sample_value() -> Value {
	toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.")
}

fn with_section_value(section: &[&str], key: &str, value: Value) -> String {
	let mut root = sample_value();
	let mut table = root.as_table_mut().expect("Sample config must be a table.");

	for name in section {
		table = table
			.get_mut(*name)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Sample config must include [{name}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render sample config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("realty_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> realty_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = realty_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn expect_validation(payload: String, expected: &str) {
	let err = load_payload(payload).expect_err("Expected validation error.");
	let message = err.to_string();

	assert!(message.contains(expected), "Unexpected error message: {message}");
}

#[test]
fn sample_config_loads_and_normalizes() {
	let cfg = load_payload(SAMPLE_CONFIG_TOML.to_string()).expect("Sample config must load.");

	assert_eq!(cfg.providers.retrieval.api_base, "http://127.0.0.1:7700");
	assert!(cfg.providers.retrieval.api_key.is_none());
	assert!(cfg.providers.retrieval.send_alpha_hint);
	assert_eq!(cfg.geography.known_places, vec!["Thu Duc".to_string()]);
	assert_eq!(cfg.geography.adjacency["Q2"].len(), 3);
}

#[test]
fn omitted_tuning_sections_fall_back_to_defaults() {
	let payload = r#"
[service]
log_level = "debug"

[providers.retrieval]
provider_id = "hybrid"
api_base = "http://localhost:7700"
path = "/search"

[providers.statistics]
provider_id = "hybrid"
api_base = "http://localhost:7700"
path = "/count"
"#;
	let cfg = load_payload(payload.to_string()).expect("Minimal config must load.");

	assert_eq!(cfg.orchestrator.max_iterations, 2);
	assert_eq!(cfg.orchestrator.empty_iterations_before_stop, 2);
	assert_eq!(cfg.retry.max_retries, 1);
	assert_eq!(cfg.evaluation.minimum_count, 3);
	assert_eq!(cfg.evaluation.sufficiency_threshold, 0.5);
	assert_eq!(cfg.ranking.weights.district_exact, 40);
	assert_eq!(cfg.ranking.weights.bedrooms_exact, 30);
	assert_eq!(cfg.ranking.bands.good_min, 70);
	assert_eq!(cfg.fusion.lexical_density_threshold, 0.4);
	assert_eq!(cfg.clarification.max_alternatives, 5);
	assert_eq!(cfg.providers.retrieval.timeout_ms, 3_000);
	assert_eq!(cfg.providers.statistics.timeout_ms, 2_000);
}

#[test]
fn max_iterations_must_be_positive() {
	expect_validation(
		with_section_value(&["orchestrator"], "max_iterations", Value::Integer(0)),
		"orchestrator.max_iterations must be greater than zero.",
	);
}

#[test]
fn deadline_must_fit_a_retried_call() {
	expect_validation(
		with_section_value(&["orchestrator"], "request_deadline_ms", Value::Integer(5_000)),
		"orchestrator.request_deadline_ms must allow one retried retrieval call (6200 ms).",
	);
}

#[test]
fn sufficiency_threshold_must_be_a_ratio() {
	expect_validation(
		with_section_value(&["evaluation"], "sufficiency_threshold", Value::Float(1.5)),
		"evaluation.sufficiency_threshold must be in the range 0.0-1.0.",
	);
}

#[test]
fn bands_must_be_ordered() {
	expect_validation(
		with_section_value(&["ranking", "bands"], "partial_min", Value::Integer(80)),
		"ranking.bands must satisfy partial_min < good_min <= 100.",
	);
}

#[test]
fn alternatives_are_capped_at_five() {
	expect_validation(
		with_section_value(&["clarification"], "max_alternatives", Value::Integer(6)),
		"clarification.max_alternatives must be in the range 1-5.",
	);
}

#[test]
fn header_values_must_be_strings() {
	expect_validation(
		with_section_value(
			&["providers", "retrieval", "default_headers"],
			"x-retries",
			Value::Integer(3),
		),
		"providers.retrieval.default_headers values must be strings.",
	);
}

#[test]
fn district_cannot_neighbour_itself() {
	let payload = with_section_value(
		&["geography", "adjacency"],
		"Q3",
		Value::Array(vec![Value::String("q3".to_string())]),
	);
	let err = load_payload(payload).expect_err("Expected geography error.");

	match err {
		Error::Geography { district, .. } => assert_eq!(district, "Q3"),
		other => panic!("Unexpected error: {other}"),
	}
}

#[test]
fn missing_file_reports_read_error() {
	let err = realty_config::load(&PathBuf::from("/nonexistent/realty.toml"))
		.expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}
