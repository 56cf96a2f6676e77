use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{Error, Result};
use realty_config::RetrievalProviderConfig;
use realty_domain::{SearchCandidate, StructuredFilters, TransactionType};

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalRequest {
	pub query_text: String,
	pub structured_filters: StructuredFilters,
	/// Fusion weight for the lexical sub-ranking; `None` leaves the choice to the backend.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub alpha_hint: Option<f32>,
	pub limit: u32,
}

/// Display fields of one listing. Each field decodes on its own; a value of the wrong shape
/// reads as absent instead of failing the listing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidateFields {
	#[serde(deserialize_with = "lenient")]
	title: Option<String>,
	#[serde(deserialize_with = "lenient")]
	price: Option<f64>,
	#[serde(deserialize_with = "lenient")]
	area: Option<f64>,
	#[serde(deserialize_with = "lenient")]
	bedrooms: Option<u32>,
	#[serde(deserialize_with = "lenient")]
	property_type: Option<String>,
	#[serde(deserialize_with = "lenient")]
	transaction_type: Option<TransactionType>,
	#[serde(deserialize_with = "lenient")]
	district: Option<String>,
	#[serde(deserialize_with = "lenient")]
	city: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
	D: Deserializer<'de>,
	T: DeserializeOwned,
{
	let value = Value::deserialize(deserializer)?;

	Ok(serde_json::from_value(value).ok())
}

pub async fn search(
	cfg: &RetrievalProviderConfig,
	request: &RetrievalRequest,
) -> Result<Vec<SearchCandidate>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let res = client
		.post(url)
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(request)
		.send()
		.await?;
	let json = crate::read_json(res).await?;

	parse_search_response(json)
}

fn parse_search_response(json: Value) -> Result<Vec<SearchCandidate>> {
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.or_else(|| json.get("hits"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Search response is missing results array.".to_string(),
		})?;
	let mut out = Vec::with_capacity(results.len());

	for (index, item) in results.iter().enumerate() {
		let id = match item.get("id") {
			Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
			Some(Value::Number(id)) => id.to_string(),
			_ => {
				return Err(Error::InvalidResponse {
					message: format!("Search result {index} is missing an id."),
				});
			},
		};
		let fields: CandidateFields =
			serde_json::from_value(item.get("fields").unwrap_or(item).clone()).unwrap_or_default();
		let raw_relevance_score = item
			.get("raw_relevance_score")
			.or_else(|| item.get("score"))
			.and_then(|v| v.as_f64())
			.filter(|score| score.is_finite());

		out.push(SearchCandidate {
			id,
			title: fields.title.unwrap_or_default(),
			price: fields.price,
			area: fields.area,
			bedrooms: fields.bedrooms,
			property_type: fields.property_type,
			transaction_type: fields.transaction_type,
			district: fields.district,
			city: fields.city,
			raw_relevance_score,
		});
	}

	Ok(out)
}
