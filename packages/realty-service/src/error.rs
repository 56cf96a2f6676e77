pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Backend {backend} unavailable after {attempts} attempt(s): {message}")]
	BackendUnavailable { backend: String, attempts: u32, message: String },
	#[error("Malformed requirements: {message}")]
	MalformedRequirements { message: String },
	#[error("Request deadline exceeded.")]
	DeadlineExceeded,
	#[error("Provider error: {message}")]
	Provider { message: String },
}
impl From<realty_providers::Error> for Error {
	fn from(err: realty_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
