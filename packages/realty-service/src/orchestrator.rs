use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
	Error, SearchEngine,
	clarify::{ClarificationComposer, ClarificationResponse},
	evaluate::{Evaluation, EvaluationVerdict, ResultEvaluator},
	rank::{MatchRanker, RankedAlternative, ScoringPath},
	retrieval::{HybridRetrievalClient, RetrievalOutcome},
	trace::{IterationTrace, RunTrace, StopReason},
};
use realty_domain::{Relaxation, SearchCandidate, SearchRequirements};

/// Terminal outcome of a run. Every run ends in exactly one of these.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunResult {
	Success(SuccessResult),
	Clarification(ClarificationResponse),
}
impl RunResult {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Success(_) => "success",
			Self::Clarification(_) => "clarification",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SuccessResult {
	pub ranked: Vec<RankedAlternative>,
}

/// One pass of the loop. Never modified once pushed.
#[derive(Clone, Debug)]
pub struct IterationRecord {
	pub iteration: u32,
	pub requirements_variant: SearchRequirements,
	pub candidates: Vec<SearchCandidate>,
	pub evaluation: Evaluation,
	pub alpha_hint: Option<f32>,
	pub attempts: u32,
	pub failure: Option<String>,
}

/// Largest candidate set observed so far; on ties the earliest iteration wins.
#[derive(Clone, Debug, Default)]
pub struct BestState {
	pub candidates: Vec<SearchCandidate>,
	pub evaluation: Option<Evaluation>,
	pub iteration: Option<u32>,
}

/// Everything one request owns while it runs.
struct RunContext {
	request_id: Uuid,
	started: Instant,
	deadline: tokio::time::Instant,
	iteration: u32,
	consecutive_empty: u32,
	current: SearchRequirements,
	best: BestState,
	records: Vec<IterationRecord>,
}
impl RunContext {
	fn new(request_id: Uuid, requirements: &SearchRequirements, deadline_ms: u64) -> Self {
		Self {
			request_id,
			started: Instant::now(),
			deadline: tokio::time::Instant::now() + Duration::from_millis(deadline_ms),
			iteration: 0,
			consecutive_empty: 0,
			current: requirements.clone(),
			best: BestState::default(),
			records: Vec::new(),
		}
	}

	fn trace(
		&self,
		stop_reason: StopReason,
		scoring_path: Option<ScoringPath>,
		statistics_failures: Vec<String>,
	) -> RunTrace {
		RunTrace {
			request_id: self.request_id,
			iterations: self.records.iter().map(IterationTrace::from).collect(),
			stop_reason,
			best_iteration: self.best.iteration,
			best_candidate_count: self.best.candidates.len(),
			scoring_path,
			statistics_failures,
			elapsed_ms: self.started.elapsed().as_millis() as u64,
		}
	}
}

enum Phase {
	Search,
	Evaluate(RetrievalOutcome),
	Refine(Relaxation),
	Done(Exit),
}

enum Exit {
	Success(Vec<SearchCandidate>),
	Degrade(StopReason),
}

impl SearchEngine {
	pub async fn run(&self, requirements: SearchRequirements) -> RunResult {
		self.run_traced(requirements).await.0
	}

	/// Parses the extraction collaborator's JSON first; unreadable input is answered like any
	/// other malformed requirement set.
	pub async fn run_value(&self, raw: Value) -> (RunResult, RunTrace) {
		match realty_domain::parse_requirements(raw) {
			Ok(requirements) => self.run_traced(requirements).await,
			Err(err) => {
				let ctx = RunContext::new(Uuid::new_v4(), &SearchRequirements::default(), 0);

				tracing::warn!(
					request_id = %ctx.request_id,
					error = %err,
					"Rejected unreadable requirements."
				);

				let response = ClarificationComposer::malformed(&[format!(
					"The search requirements could not be read ({err}). Please restate what you \
					 are looking for."
				)]);

				(
					RunResult::Clarification(response),
					ctx.trace(StopReason::MalformedRequirements, None, Vec::new()),
				)
			},
		}
	}

	pub async fn run_traced(&self, requirements: SearchRequirements) -> (RunResult, RunTrace) {
		let request_id = Uuid::new_v4();
		let span = tracing::info_span!("run", request_id = %request_id);

		self.drive(request_id, requirements).instrument(span).await
	}

	async fn drive(
		&self,
		request_id: Uuid,
		requirements: SearchRequirements,
	) -> (RunResult, RunTrace) {
		let cfg = &self.cfg;
		let mut ctx =
			RunContext::new(request_id, &requirements, cfg.orchestrator.request_deadline_ms);
		let problems = check_requirements(&requirements);

		if !problems.is_empty() {
			let err = Error::MalformedRequirements { message: problems.join(" ") };

			tracing::warn!(error = %err, "Rejected requirements before searching.");

			return (
				RunResult::Clarification(ClarificationComposer::malformed(&problems)),
				ctx.trace(StopReason::MalformedRequirements, None, Vec::new()),
			);
		}

		let client =
			HybridRetrievalClient::new(cfg, &self.geography, self.providers.retrieval.as_ref());
		let evaluator = ResultEvaluator::new(&cfg.evaluation, &self.geography);
		let mut phase = Phase::Search;
		let exit = loop {
			phase = match phase {
				Phase::Search => self.search(&mut ctx, &client).await,
				Phase::Evaluate(outcome) => self.evaluate(&mut ctx, &evaluator, outcome),
				Phase::Refine(relaxation) => {
					tracing::info!(
						iteration = ctx.iteration,
						relaxation = relaxation.constraint().as_str(),
						"Relaxing requirements."
					);

					ctx.current = ctx.current.relaxed_with(&relaxation);

					Phase::Search
				},
				Phase::Done(exit) => break exit,
			};
		};

		self.finish(ctx, &requirements, &evaluator, exit).await
	}

	async fn search(&self, ctx: &mut RunContext, client: &HybridRetrievalClient<'_>) -> Phase {
		if ctx.iteration >= self.cfg.orchestrator.max_iterations {
			return Phase::Done(Exit::Degrade(StopReason::BudgetExhausted));
		}
		if tokio::time::Instant::now() >= ctx.deadline {
			tracing::warn!(iteration = ctx.iteration, "Request deadline reached.");

			return Phase::Done(Exit::Degrade(StopReason::DeadlineExceeded));
		}

		ctx.iteration += 1;

		match tokio::time::timeout_at(ctx.deadline, client.search(&ctx.current)).await {
			Ok(outcome) => Phase::Evaluate(outcome),
			Err(_) => {
				tracing::warn!(
					iteration = ctx.iteration,
					error = %Error::DeadlineExceeded,
					"Retrieval abandoned at the request deadline."
				);

				Phase::Done(Exit::Degrade(StopReason::DeadlineExceeded))
			},
		}
	}

	fn evaluate(
		&self,
		ctx: &mut RunContext,
		evaluator: &ResultEvaluator<'_>,
		outcome: RetrievalOutcome,
	) -> Phase {
		let RetrievalOutcome { alpha_hint, result, attempts } = outcome;
		let (candidates, failure) = match result {
			Ok(candidates) => (candidates, None),
			Err(err) => {
				tracing::warn!(
					iteration = ctx.iteration,
					attempts,
					error = %err,
					"Retrieval failed; treating the iteration as empty."
				);

				(Vec::new(), Some(err.to_string()))
			},
		};
		let iterations_remain = ctx.iteration < self.cfg.orchestrator.max_iterations;
		let evaluation = evaluator.evaluate(&candidates, &ctx.current, iterations_remain);

		tracing::info!(
			iteration = ctx.iteration,
			candidate_count = candidates.len(),
			match_rate = evaluation.match_rate,
			verdict = evaluation.verdict.as_str(),
			"Evaluated retrieval results."
		);

		if candidates.len() > ctx.best.candidates.len() {
			ctx.best = BestState {
				candidates: candidates.clone(),
				evaluation: Some(evaluation.clone()),
				iteration: Some(ctx.iteration),
			};
		}
		if candidates.is_empty() {
			ctx.consecutive_empty += 1;
		} else {
			ctx.consecutive_empty = 0;
		}

		let verdict = evaluation.verdict.clone();

		ctx.records.push(IterationRecord {
			iteration: ctx.iteration,
			requirements_variant: ctx.current.clone(),
			candidates: candidates.clone(),
			evaluation,
			alpha_hint,
			attempts,
			failure,
		});

		if ctx.consecutive_empty >= self.cfg.orchestrator.empty_iterations_before_stop {
			tracing::info!(
				iteration = ctx.iteration,
				consecutive_empty = ctx.consecutive_empty,
				"Stopping early after consecutive empty iterations."
			);

			return Phase::Done(Exit::Degrade(StopReason::ConsecutiveEmpty));
		}

		match verdict {
			EvaluationVerdict::Sufficient => Phase::Done(Exit::Success(candidates)),
			EvaluationVerdict::RefineWith { relaxation } => Phase::Refine(relaxation),
			EvaluationVerdict::Clarify { .. } => Phase::Done(Exit::Degrade(StopReason::Clarify)),
		}
	}

	async fn finish(
		&self,
		ctx: RunContext,
		original: &SearchRequirements,
		evaluator: &ResultEvaluator<'_>,
		exit: Exit,
	) -> (RunResult, RunTrace) {
		let ranker = MatchRanker::new(&self.cfg.ranking);

		match exit {
			Exit::Success(candidates) => {
				let ranked = ranker.rank(&candidates, original);
				let trace = ctx.trace(
					StopReason::Sufficient,
					Some(ScoringPath::select(&candidates)),
					Vec::new(),
				);

				tracing::info!(
					iterations = trace.iterations.len(),
					ranked = ranked.len(),
					"Search succeeded."
				);

				(RunResult::Success(SuccessResult { ranked }), trace)
			},
			Exit::Degrade(stop_reason) => {
				let best = &ctx.best.candidates;
				let ranked = ranker.rank(best, original);
				let unmet = evaluator.unmet_constraints(best, &ctx.current);
				let composer = ClarificationComposer::new(
					&self.cfg,
					&self.geography,
					self.providers.statistics.as_ref(),
				);
				let composed = composer.compose(original, &unmet, ranked).await;
				let scoring_path = (!best.is_empty()).then(|| ScoringPath::select(best));
				let trace = ctx.trace(stop_reason, scoring_path, composed.statistics_failures);

				tracing::info!(
					iterations = trace.iterations.len(),
					stop_reason = stop_reason.as_str(),
					best_candidate_count = trace.best_candidate_count,
					"Search degraded to a clarification."
				);

				(RunResult::Clarification(composed.response), trace)
			},
		}
	}
}

/// Problems that make `requirements` unsearchable, phrased as requests to the user.
pub fn check_requirements(requirements: &SearchRequirements) -> Vec<String> {
	let mut problems = Vec::new();

	if requirements.property_type.is_none() && requirements.transaction_type.is_none() {
		problems.push(
			"Tell us what kind of property you want (for example an apartment or a house) or \
			 whether you want to buy or rent."
				.to_string(),
		);
	}
	if let (Some(min), Some(max)) = (requirements.price_min, requirements.price_max)
		&& min > max
	{
		problems.push(
			"The minimum price is above the maximum price. Please confirm your budget.".to_string(),
		);
	}
	if let (Some(min), Some(max)) = (requirements.area_min, requirements.area_max)
		&& min > max
	{
		problems.push(
			"The minimum area is above the maximum area. Please confirm the size you need."
				.to_string(),
		);
	}

	problems
}
