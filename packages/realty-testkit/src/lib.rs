mod error;

pub use error::{Error, Result};

use std::{
	collections::VecDeque,
	future::IntoFuture,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing,
};
use serde_json::Value;
use tokio::{net::TcpListener, sync::oneshot};

pub const SEARCH_PATH: &str = "/search";
pub const COUNT_PATH: &str = "/count";

type CountFn = dyn Fn(&Value) -> StubReply + Send + Sync;

/// One scripted backend answer.
#[derive(Debug, Clone)]
pub enum StubReply {
	Json(Value),
	Status(u16),
	/// Waits before answering, for exercising client timeouts.
	Delayed { millis: u64, body: Value },
}
impl StubReply {
	async fn respond(self) -> Response {
		match self {
			Self::Json(body) => (StatusCode::OK, Json(body)).into_response(),
			Self::Status(code) => StatusCode::from_u16(code)
				.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
				.into_response(),
			Self::Delayed { millis, body } => {
				tokio::time::sleep(Duration::from_millis(millis)).await;

				(StatusCode::OK, Json(body)).into_response()
			},
		}
	}
}

struct StubState {
	search_script: Mutex<VecDeque<StubReply>>,
	search_requests: Mutex<Vec<Value>>,
	count_requests: Mutex<Vec<Value>>,
	count: Box<CountFn>,
	search_calls: AtomicUsize,
}

/// A local HTTP server standing in for the retrieval and statistics backends.
///
/// Search replies are served in script order; the last reply repeats once the script is
/// exhausted. Count replies come from the supplied closure, which sees `scope_filters`.
pub struct StubBackend {
	base_url: String,
	state: Arc<StubState>,
	shutdown: Option<oneshot::Sender<()>>,
}
impl StubBackend {
	pub async fn start<F>(search_script: Vec<StubReply>, count: F) -> Result<Self>
	where
		F: Fn(&Value) -> StubReply + Send + Sync + 'static,
	{
		let state = Arc::new(StubState {
			search_script: Mutex::new(search_script.into()),
			search_requests: Mutex::new(Vec::new()),
			count_requests: Mutex::new(Vec::new()),
			count: Box::new(count),
			search_calls: AtomicUsize::new(0),
		});
		let app = Router::new()
			.route(SEARCH_PATH, routing::post(search_handler))
			.route(COUNT_PATH, routing::post(count_handler))
			.with_state(state.clone());
		let listener = TcpListener::bind("127.0.0.1:0").await?;
		let addr = listener.local_addr()?;
		let (tx, rx) = oneshot::channel();
		let server = axum::serve(listener, app).with_graceful_shutdown(async move {
			let _ = rx.await;
		});

		tokio::spawn(async move {
			let _ = server.into_future().await;
		});

		Ok(Self { base_url: format!("http://{addr}"), state, shutdown: Some(tx) })
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	pub fn search_calls(&self) -> usize {
		self.state.search_calls.load(Ordering::SeqCst)
	}

	pub fn search_requests(&self) -> Vec<Value> {
		self.state.search_requests.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn count_requests(&self) -> Vec<Value> {
		self.state.count_requests.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn shutdown(mut self) {
		if let Some(tx) = self.shutdown.take() {
			let _ = tx.send(());
		}
	}
}
impl Drop for StubBackend {
	fn drop(&mut self) {
		if let Some(tx) = self.shutdown.take() {
			let _ = tx.send(());
		}
	}
}

/// Wraps listing objects in the `results` envelope the retrieval client expects.
pub fn results(items: Vec<Value>) -> Value {
	serde_json::json!({ "results": items })
}

/// A scored listing in the retrieval wire format.
pub fn listing(id: &str, fields: Value, score: Option<f64>) -> Value {
	match score {
		Some(score) => serde_json::json!({ "id": id, "fields": fields, "score": score }),
		None => serde_json::json!({ "id": id, "fields": fields }),
	}
}

pub fn count_reply(count: u64) -> StubReply {
	StubReply::Json(serde_json::json!({ "count": count }))
}

async fn search_handler(
	State(state): State<Arc<StubState>>,
	Json(payload): Json<Value>,
) -> Response {
	state.search_calls.fetch_add(1, Ordering::SeqCst);
	state.search_requests.lock().unwrap_or_else(|err| err.into_inner()).push(payload);

	let reply = {
		let mut script = state.search_script.lock().unwrap_or_else(|err| err.into_inner());

		if script.len() > 1 { script.pop_front() } else { script.front().cloned() }
	};

	reply.unwrap_or_else(|| StubReply::Json(results(Vec::new()))).respond().await
}

async fn count_handler(
	State(state): State<Arc<StubState>>,
	Json(payload): Json<Value>,
) -> Response {
	let scope = payload.get("scope_filters").cloned().unwrap_or(Value::Null);
	let reply = (state.count)(&scope);

	state.count_requests.lock().unwrap_or_else(|err| err.into_inner()).push(scope);

	reply.respond().await
}
