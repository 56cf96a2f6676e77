pub mod clarify;
pub mod evaluate;
pub mod orchestrator;
pub mod rank;
pub mod retrieval;
pub mod retry;
pub mod trace;

mod error;

use std::{future::Future, pin::Pin, sync::Arc};

pub use clarify::{ClarificationComposer, ClarificationResponse, ScopeStatistics};
pub use error::{Error, Result};
pub use evaluate::{Evaluation, EvaluationVerdict, ResultEvaluator};
pub use orchestrator::{BestState, IterationRecord, RunResult, SuccessResult};
pub use rank::{Band, MatchRanker, RankedAlternative, ScoringPath};
pub use retrieval::HybridRetrievalClient;
pub use retry::RetryPolicy;
pub use trace::{IterationTrace, RunTrace, StopReason};

use realty_config::{Config, ProviderConfig, RetrievalProviderConfig};
use realty_domain::{GeographyIndex, ScopeFilters, SearchCandidate};
use realty_providers::{search, search::RetrievalRequest, statistics};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The hybrid lexical and vector search backend.
pub trait RetrievalBackend
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a RetrievalProviderConfig,
		request: &'a RetrievalRequest,
	) -> BoxFuture<'a, Result<Vec<SearchCandidate>>>;
}

/// The aggregate-count backend used for clarification statistics.
pub trait StatisticsBackend
where
	Self: Send + Sync,
{
	fn count<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		scope: &'a ScopeFilters,
	) -> BoxFuture<'a, Result<u64>>;
}

#[derive(Clone)]
pub struct Providers {
	pub retrieval: Arc<dyn RetrievalBackend>,
	pub statistics: Arc<dyn StatisticsBackend>,
}
impl Providers {
	pub fn new(
		retrieval: Arc<dyn RetrievalBackend>,
		statistics: Arc<dyn StatisticsBackend>,
	) -> Self {
		Self { retrieval, statistics }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { retrieval: provider.clone(), statistics: provider }
	}
}

/// Entry point of the engine. Cheap to clone and holds no per-request state, so one value can
/// serve any number of concurrent runs.
#[derive(Clone)]
pub struct SearchEngine {
	cfg: Arc<Config>,
	geography: Arc<GeographyIndex>,
	providers: Providers,
}
impl SearchEngine {
	pub fn new(cfg: Config) -> Self {
		Self::with_providers(cfg, Providers::default())
	}

	pub fn with_providers(cfg: Config, providers: Providers) -> Self {
		let geography = GeographyIndex::new(&cfg.geography);

		Self { cfg: Arc::new(cfg), geography: Arc::new(geography), providers }
	}

	pub fn config(&self) -> &Config {
		&self.cfg
	}
}

struct DefaultProviders;
impl RetrievalBackend for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a RetrievalProviderConfig,
		request: &'a RetrievalRequest,
	) -> BoxFuture<'a, Result<Vec<SearchCandidate>>> {
		Box::pin(async move { Ok(search::search(cfg, request).await?) })
	}
}
impl StatisticsBackend for DefaultProviders {
	fn count<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		scope: &'a ScopeFilters,
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move { Ok(statistics::count(cfg, scope).await?) })
	}
}
