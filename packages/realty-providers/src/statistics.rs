use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};
use realty_config::ProviderConfig;
use realty_domain::ScopeFilters;

pub async fn count(cfg: &ProviderConfig, scope: &ScopeFilters) -> Result<u64> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "scope_filters": scope });
	let res = client
		.post(url)
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json = crate::read_json(res).await?;

	parse_count_response(&json)
}

fn parse_count_response(json: &Value) -> Result<u64> {
	json.get("count").and_then(|v| v.as_u64()).ok_or_else(|| Error::InvalidResponse {
		message: "Count response is missing a non-negative integer count.".to_string(),
	})
}
