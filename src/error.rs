//! Client-level error types shared across the transport, store, and request layers.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout); no response was obtained.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Backend rejected the request with 401 and no refresh path could recover it.
	#[error("Request is unauthorized ({cause}): {message}.")]
	Unauthorized {
		/// Backend-supplied message from the rejecting response.
		message: String,
		/// Why the refresh path could not recover the request.
		cause: UnauthorizedCause,
	},
	/// Backend answered with a non-2xx, non-401 status.
	#[error("Backend returned HTTP {status}: {message}.")]
	Server {
		/// HTTP status code.
		status: u16,
		/// Backend-supplied message, or the raw body when no message field exists.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Raw response body.
		body: Vec<u8>,
	},
	/// Response body could not be decoded into the requested type.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the decoded response.
		status: u16,
	},
}
impl Error {
	/// Returns `true` when the caller may retry the same request later.
	///
	/// Transport failures plus 408, 429, and 5xx server errors qualify.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Transport(_) => true,
			Self::Server { status, .. } => matches!(status, 408 | 429 | 500..=599),
			_ => false,
		}
	}

	/// Returns the HTTP status associated with the error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Unauthorized { .. } => Some(401),
			Self::Server { status, .. } | Self::Decode { status, .. } => Some(*status),
			_ => None,
		}
	}
}

/// Reason a 401 could not be recovered through the refresh path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnauthorizedCause {
	/// No refresh token was stored.
	MissingRefreshToken,
	/// The refresh endpoint answered with a non-2xx status.
	RefreshRejected {
		/// Status returned by the refresh endpoint.
		status: u16,
	},
	/// The refresh endpoint answered 2xx but the body lacked a usable access token.
	RefreshResponseInvalid,
	/// The refresh call did not complete (transport or store failure) and the session was
	/// invalidated.
	RefreshUnavailable,
	/// The retried request was rejected again after a successful refresh.
	RetryRejected,
}
impl Display for UnauthorizedCause {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::MissingRefreshToken => f.write_str("no refresh token stored"),
			Self::RefreshRejected { status } =>
				write!(f, "refresh endpoint returned HTTP {status}"),
			Self::RefreshResponseInvalid => f.write_str("refresh response was invalid"),
			Self::RefreshUnavailable => f.write_str("refresh did not complete"),
			Self::RetryRejected => f.write_str("retry after refresh was rejected"),
		}
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL must use HTTPS unless it targets a loopback host.
	#[error("The base URL must use HTTPS: {url}.")]
	InsecureBaseUrl {
		/// URL that failed validation.
		url: String,
	},
	/// Base URL cannot carry relative paths.
	#[error("The base URL cannot be used as a base: {url}.")]
	InvalidBaseUrl {
		/// URL that failed validation.
		url: String,
	},
	/// A request path could not be joined onto the base URL.
	#[error("Path `{path}` cannot be joined onto the base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A request path resolved outside the base URL's origin.
	#[error("Path `{path}` resolves outside the base URL's origin.")]
	ForeignPath {
		/// Offending path.
		path: String,
	},
	/// Header name or value is not valid HTTP.
	#[error("Header `{name}` is invalid.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodySerialize(#[from] serde_json::Error),
	/// A wire field name for the refresh exchange is empty.
	#[error("Refresh wire field `{field}` must not be empty.")]
	EmptyWireField {
		/// Which field failed validation.
		field: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeout).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the backend.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request exceeded the configured timeout.
	#[error("Request timed out while calling the backend.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retryable_classification_follows_status() {
		let server = |status| Error::Server {
			status,
			message: "boom".into(),
			retry_after: None,
			body: Vec::new(),
		};

		assert!(server(503).is_retryable());
		assert!(server(429).is_retryable());
		assert!(!server(404).is_retryable());
		assert!(Error::from(TransportError::Timeout).is_retryable());
		assert!(
			!Error::Unauthorized {
				message: "expired".into(),
				cause: UnauthorizedCause::MissingRefreshToken,
			}
			.is_retryable()
		);
	}

	#[test]
	fn unauthorized_reports_cause_and_status() {
		let err = Error::Unauthorized {
			message: "Token expired".into(),
			cause: UnauthorizedCause::RefreshRejected { status: 403 },
		};

		assert_eq!(err.status(), Some(401));
		assert_eq!(
			err.to_string(),
			"Request is unauthorized (refresh endpoint returned HTTP 403): Token expired."
		);
	}
}
