use serde::Serialize;
use uuid::Uuid;

use crate::{orchestrator::IterationRecord, rank::ScoringPath};
use realty_domain::Relaxation;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
	Sufficient,
	Clarify,
	BudgetExhausted,
	ConsecutiveEmpty,
	DeadlineExceeded,
	MalformedRequirements,
}
impl StopReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Sufficient => "sufficient",
			Self::Clarify => "clarify",
			Self::BudgetExhausted => "budget_exhausted",
			Self::ConsecutiveEmpty => "consecutive_empty",
			Self::DeadlineExceeded => "deadline_exceeded",
			Self::MalformedRequirements => "malformed_requirements",
		}
	}
}

/// Diagnostics for one run. Kept out of every caller-facing response.
#[derive(Clone, Debug, Serialize)]
pub struct RunTrace {
	pub request_id: Uuid,
	pub iterations: Vec<IterationTrace>,
	pub stop_reason: StopReason,
	pub best_iteration: Option<u32>,
	pub best_candidate_count: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub scoring_path: Option<ScoringPath>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub statistics_failures: Vec<String>,
	pub elapsed_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct IterationTrace {
	pub iteration: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub alpha_hint: Option<f32>,
	pub attempts: u32,
	pub candidate_count: usize,
	pub match_rate: f32,
	pub verdict: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub relaxation: Option<Relaxation>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub failure: Option<String>,
}
impl From<&IterationRecord> for IterationTrace {
	fn from(record: &IterationRecord) -> Self {
		let relaxation = match &record.evaluation.verdict {
			crate::EvaluationVerdict::RefineWith { relaxation } => Some(relaxation.clone()),
			_ => None,
		};

		Self {
			iteration: record.iteration,
			alpha_hint: record.alpha_hint,
			attempts: record.attempts,
			candidate_count: record.candidates.len(),
			match_rate: record.evaluation.match_rate,
			verdict: record.evaluation.verdict.as_str(),
			relaxation,
			failure: record.failure.clone(),
		}
	}
}
