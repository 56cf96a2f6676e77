use serde::{Deserialize, Serialize};

use crate::requirements::TransactionType;

/// One property returned by the retrieval backend.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SearchCandidate {
	pub id: String,
	#[serde(default)]
	pub title: String,
	pub price: Option<f64>,
	pub area: Option<f64>,
	pub bedrooms: Option<u32>,
	pub property_type: Option<String>,
	pub transaction_type: Option<TransactionType>,
	pub district: Option<String>,
	pub city: Option<String>,
	/// Fused lexical/vector score; absent when the backend is not a scored source.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub raw_relevance_score: Option<f64>,
}
impl SearchCandidate {
	pub fn location(&self) -> String {
		match (self.district.as_deref(), self.city.as_deref()) {
			(Some(district), Some(city)) => format!("{district}, {city}"),
			(Some(place), None) | (None, Some(place)) => place.to_string(),
			(None, None) => String::new(),
		}
	}
}
