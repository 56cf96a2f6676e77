use serde::Serialize;

use crate::{
	StatisticsBackend,
	rank::RankedAlternative,
	retry::{Attempted, RetryPolicy},
};
use realty_config::Config;
use realty_domain::{Constraint, GeographyIndex, ScopeFilters, SearchRequirements};

const STATISTICS_LABEL: &str = "statistics";
const FALLBACK_OPTION: &str = "Relax one of the search criteria to see more listings.";

/// Counts behind a clarification. `None` means the count is unknown, not zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScopeStatistics {
	pub city_scope: Option<String>,
	pub total_in_city: Option<u64>,
	pub narrowest_scope: Option<String>,
	pub total_in_narrowest_scope: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClarificationResponse {
	pub scope_statistics: ScopeStatistics,
	pub relaxation_options: Vec<String>,
	pub alternatives: Vec<RankedAlternative>,
}

/// A composed response plus the statistics failures that were swallowed while building it.
#[derive(Debug)]
pub struct Composed {
	pub response: ClarificationResponse,
	pub statistics_failures: Vec<String>,
}

pub struct ClarificationComposer<'a> {
	cfg: &'a Config,
	geography: &'a GeographyIndex,
	statistics: &'a dyn StatisticsBackend,
	policy: RetryPolicy,
}
impl<'a> ClarificationComposer<'a> {
	pub fn new(
		cfg: &'a Config,
		geography: &'a GeographyIndex,
		statistics: &'a dyn StatisticsBackend,
	) -> Self {
		let policy = RetryPolicy::new(&cfg.retry, cfg.providers.statistics.timeout_ms);

		Self { cfg, geography, statistics, policy }
	}

	/// Builds the clarification for `requirements` as the caller originally stated them.
	/// `ranked_best` must already be ordered by the ranker.
	pub async fn compose(
		&self,
		requirements: &SearchRequirements,
		unmet: &[Constraint],
		ranked_best: Vec<RankedAlternative>,
	) -> Composed {
		let city = self.city_of(requirements);
		let city_scope = requirements.city_scope(city.as_deref());
		let (scope_statistics, statistics_failures) = match &requirements.district {
			Some(_) => {
				let narrowest = requirements.narrowest_scope(city.as_deref());
				let (in_city, in_narrowest) =
					tokio::join!(self.count(&city_scope), self.count(&narrowest));
				let mut failures = Vec::new();
				let total_in_city = keep_count(in_city, &mut failures);
				let total_in_narrowest_scope = keep_count(in_narrowest, &mut failures);

				(
					ScopeStatistics {
						city_scope: Some(city_scope.label()),
						total_in_city,
						narrowest_scope: Some(narrowest.label()),
						total_in_narrowest_scope,
					},
					failures,
				)
			},
			None => {
				let mut failures = Vec::new();
				let total = keep_count(self.count(&city_scope).await, &mut failures);

				(
					ScopeStatistics {
						city_scope: Some(city_scope.label()),
						total_in_city: total,
						narrowest_scope: Some(city_scope.label()),
						total_in_narrowest_scope: total,
					},
					failures,
				)
			},
		};
		let relaxation_options =
			self.relaxation_options(requirements, unmet, city.as_deref(), &scope_statistics);
		let mut alternatives = ranked_best;

		alternatives.truncate(self.cfg.clarification.max_alternatives as usize);

		Composed {
			response: ClarificationResponse { scope_statistics, relaxation_options, alternatives },
			statistics_failures,
		}
	}

	/// Response for requirements rejected before any search: no statistics, no alternatives.
	pub fn malformed(problems: &[String]) -> ClarificationResponse {
		let relaxation_options = if problems.is_empty() {
			vec![
				"Tell us more about the property you are looking for, such as its type or \
				 whether you want to buy or rent."
					.to_string(),
			]
		} else {
			problems.to_vec()
		};

		ClarificationResponse {
			scope_statistics: ScopeStatistics::default(),
			relaxation_options,
			alternatives: Vec::new(),
		}
	}

	/// Human-readable suggestions, one group per unmet constraint in reporting order. Never
	/// empty.
	pub fn relaxation_options(
		&self,
		requirements: &SearchRequirements,
		unmet: &[Constraint],
		city: Option<&str>,
		statistics: &ScopeStatistics,
	) -> Vec<String> {
		let mut options = Vec::new();

		for constraint in Constraint::ALL {
			if !unmet.contains(&constraint) {
				continue;
			}

			match constraint {
				Constraint::FreeText =>
					options.extend(requirements.free_text_constraints.iter().map(|phrase| {
						format!(
							"Clarify what \"{phrase}\" means so it can be matched against listing \
							 details."
						)
					})),
				Constraint::Bedrooms =>
					if let Some(bedrooms) = requirements.bedrooms {
						let by = self.cfg.evaluation.bedroom_widen_by;

						options.push(format!(
							"Adjust the bedroom count by \u{b1}{by} ({}-{} bedrooms).",
							bedrooms.saturating_sub(by),
							bedrooms.saturating_add(by)
						));
					},
				Constraint::Price =>
					if let Some(option) = self.price_option(requirements) {
						options.push(option);
					},
				Constraint::District =>
					if let Some(district) = &requirements.district {
						let neighbours = self.geography.neighbours(district);

						if !neighbours.is_empty() {
							options.push(format!(
								"Search nearby districts: {}.",
								neighbours.join(", ")
							));
						}

						options.push(city_option(city, statistics.total_in_city));
					},
				Constraint::PropertyType =>
					if let Some(property_type) = &requirements.property_type {
						options.push(format!(
							"Consider other property types besides {property_type}."
						));
					},
			}
		}

		if options.is_empty() {
			options.push(FALLBACK_OPTION.to_string());
		}

		options
	}

	fn price_option(&self, requirements: &SearchRequirements) -> Option<String> {
		let ratio = self.cfg.evaluation.price_widen_ratio;
		let percent = (ratio * 100.0).round() as i64;
		let range = match (requirements.price_min, requirements.price_max) {
			(Some(min), Some(max)) =>
				format!("{} to {}", whole(min * (1.0 - ratio)), whole(max * (1.0 + ratio))),
			(Some(min), None) => format!("from {}", whole(min * (1.0 - ratio))),
			(None, Some(max)) => format!("up to {}", whole(max * (1.0 + ratio))),
			(None, None) => return None,
		};

		Some(format!("Widen the price range by {percent}% ({range})."))
	}

	fn city_of(&self, requirements: &SearchRequirements) -> Option<String> {
		requirements.city.clone().or_else(|| {
			requirements.district.as_ref().and_then(|district| self.geography.parent_city(district))
		})
	}

	async fn count(&self, scope: &ScopeFilters) -> Attempted<u64> {
		let cfg = &self.cfg.providers.statistics;

		self.policy.run(STATISTICS_LABEL, || self.statistics.count(cfg, scope)).await
	}
}

fn keep_count(attempted: Attempted<u64>, failures: &mut Vec<String>) -> Option<u64> {
	match attempted.result {
		Ok(count) => Some(count),
		Err(err) => {
			failures.push(err.to_string());

			None
		},
	}
}

fn city_option(city: Option<&str>, total_in_city: Option<u64>) -> String {
	match (city, total_in_city) {
		(Some(city), Some(total)) =>
			format!("Broaden the search to the whole of {city} ({total} listings)."),
		(Some(city), None) => format!("Broaden the search to the whole of {city}."),
		(None, _) => "Broaden the search to the whole city.".to_string(),
	}
}

fn whole(value: f64) -> String {
	format!("{}", value.round() as i64)
}
