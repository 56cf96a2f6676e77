use serde::{Deserialize, Serialize};

use crate::requirements::{District, TransactionType};

/// Filters sent with every retrieval request.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct StructuredFilters {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub property_type: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub transaction_type: Option<TransactionType>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub city: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub district: Option<District>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub price_min: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub price_max: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub area_min: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub area_max: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub bedrooms_min: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub bedrooms_max: Option<u32>,
}

/// Scope of an aggregate count query.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ScopeFilters {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub property_type: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub transaction_type: Option<TransactionType>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub city: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub district: Option<District>,
}
impl ScopeFilters {
	pub fn label(&self) -> String {
		let place = match (&self.district, &self.city) {
			(Some(district), Some(city)) => format!("{} ({city})", district.label()),
			(Some(district), None) => district.label(),
			(None, Some(city)) => city.clone(),
			(None, None) => "all areas".to_string(),
		};

		match &self.property_type {
			Some(property_type) => format!("{property_type} in {place}"),
			None => place,
		}
	}
}
