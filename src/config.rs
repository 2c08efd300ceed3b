//! Client configuration: backend base address, refresh endpoint wiring, and transport knobs.
//!
//! [`ClientConfig`] is assembled through [`ClientConfigBuilder`], which validates that the
//! base address is HTTPS (plain HTTP is tolerated for loopback hosts only), that it can carry
//! relative paths, and that the refresh endpoint joins cleanly onto it.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, error::ConfigError};

/// Field names used on the wire by the refresh exchange.
///
/// The request body is form-encoded with [`request_refresh_field`](Self::request_refresh_field);
/// the JSON response is read through the two response field names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshWireFormat {
	/// Form field carrying the refresh token in the request body.
	pub request_refresh_field: String,
	/// JSON field holding the new access token in the response.
	pub response_access_field: String,
	/// JSON field holding the rotated refresh token in the response.
	pub response_refresh_field: String,
}
impl Default for RefreshWireFormat {
	fn default() -> Self {
		Self {
			request_refresh_field: "refreshToken".into(),
			response_access_field: "accessToken".into(),
			response_refresh_field: "refreshToken".into(),
		}
	}
}

/// How concurrent 401 recoveries interact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
	#[default]
	/// Every request that hits 401 issues its own refresh call.
	PerRequest,
	/// Refreshes are serialized; callers that queued behind a completed rotation reuse it.
	Coalesced,
}

/// Immutable client configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// Backend origin every request path is joined onto. Always ends with `/`.
	pub base_url: Url,
	/// Refresh endpoint path relative to [`base_url`](Self::base_url).
	pub refresh_path: String,
	/// Refresh exchange field names.
	pub wire_format: RefreshWireFormat,
	/// Per-request timeout applied by the transport.
	pub timeout: StdDuration,
	/// Optional `User-Agent` header.
	pub user_agent: Option<String>,
	/// Concurrency policy for refresh calls.
	pub refresh_policy: RefreshPolicy,
	/// Clears the credential store when a session is invalidated by a failed refresh.
	pub clear_credentials_on_logout: bool,
	/// Headers attached to every request before caller headers.
	pub default_headers: Vec<(String, String)>,
}
impl ClientConfig {
	/// Default refresh endpoint path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "auth/refresh";
	/// Default per-request timeout.
	pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

	/// Creates a new builder for the provided base address.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Resolves a request path against the base address.
	///
	/// Absolute URLs and anything else that lands on a different origin are rejected, so the
	/// bearer token is only ever sent to the configured backend.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		let relative = path.trim_start_matches('/');
		let url = self
			.base_url
			.join(relative)
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })?;

		if url.origin() != self.base_url.origin() {
			return Err(ConfigError::ForeignPath { path: path.to_owned() });
		}

		Ok(url)
	}

	/// Absolute refresh endpoint URL.
	pub fn refresh_url(&self) -> Result<Url, ConfigError> {
		self.resolve(&self.refresh_path)
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	base_url: Url,
	refresh_path: String,
	wire_format: RefreshWireFormat,
	timeout: StdDuration,
	user_agent: Option<String>,
	refresh_policy: RefreshPolicy,
	clear_credentials_on_logout: bool,
	default_headers: Vec<(String, String)>,
}
impl ClientConfigBuilder {
	/// Creates a builder seeded with defaults.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: ClientConfig::DEFAULT_REFRESH_PATH.into(),
			wire_format: RefreshWireFormat::default(),
			timeout: ClientConfig::DEFAULT_TIMEOUT,
			user_agent: None,
			refresh_policy: RefreshPolicy::default(),
			clear_credentials_on_logout: false,
			default_headers: Vec::new(),
		}
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the refresh exchange field names.
	pub fn wire_format(mut self, wire_format: RefreshWireFormat) -> Self {
		self.wire_format = wire_format;

		self
	}

	/// Overrides the per-request timeout.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Sets the `User-Agent` header.
	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());

		self
	}

	/// Overrides the refresh concurrency policy.
	pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
		self.refresh_policy = policy;

		self
	}

	/// Clears stored credentials whenever a failed refresh invalidates the session.
	pub fn clear_credentials_on_logout(mut self, clear: bool) -> Self {
		self.clear_credentials_on_logout = clear;

		self
	}

	/// Adds a header attached to every request.
	pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.default_headers.push((name.into(), value.into()));

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let mut base_url = self.base_url;

		validate_base_url(&base_url)?;

		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		let config = ClientConfig {
			base_url,
			refresh_path: self.refresh_path.trim_start_matches('/').to_owned(),
			wire_format: self.wire_format,
			timeout: self.timeout,
			user_agent: self.user_agent,
			refresh_policy: self.refresh_policy,
			clear_credentials_on_logout: self.clear_credentials_on_logout,
			default_headers: self.default_headers,
		};

		config.validate()?;

		Ok(config)
	}
}

impl ClientConfig {
	fn validate(&self) -> Result<(), ConfigError> {
		self.refresh_url()?;

		for (field, value) in [
			("request_refresh_field", &self.wire_format.request_refresh_field),
			("response_access_field", &self.wire_format.response_access_field),
			("response_refresh_field", &self.wire_format.response_refresh_field),
		] {
			if value.trim().is_empty() {
				return Err(ConfigError::EmptyWireField { field });
			}
		}
		for (name, _) in &self.default_headers {
			if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic() && b != b':') {
				return Err(ConfigError::InvalidHeader { name: name.clone() });
			}
		}

		Ok(())
	}
}

fn validate_base_url(url: &Url) -> Result<(), ConfigError> {
	if url.cannot_be_a_base() {
		return Err(ConfigError::InvalidBaseUrl { url: url.to_string() });
	}

	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ConfigError::InsecureBaseUrl { url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
		Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse test URL.")
	}

	#[test]
	fn builder_normalizes_base_path_and_refresh_url() {
		let config = ClientConfig::builder(url("https://api.example.com/v1"))
			.refresh_path("/auth/refresh")
			.build()
			.expect("HTTPS configuration should build.");

		assert_eq!(config.base_url.as_str(), "https://api.example.com/v1/");
		assert_eq!(
			config.refresh_url().expect("Refresh URL should resolve.").as_str(),
			"https://api.example.com/v1/auth/refresh"
		);
		assert_eq!(
			config.resolve("/comments/5").expect("Path should resolve.").as_str(),
			"https://api.example.com/v1/comments/5"
		);
	}

	#[test]
	fn resolve_keeps_paths_on_the_base_origin() {
		let config = ClientConfig::builder(url("https://api.example.com/v1/"))
			.build()
			.expect("HTTPS configuration should build.");

		for foreign in ["https://evil.example/steal", "http://api.example.com/v1/me"] {
			let err = config.resolve(foreign).expect_err("Foreign origins should be rejected.");

			assert!(matches!(err, ConfigError::ForeignPath { .. }), "{foreign} gave {err:?}.");
		}

		assert_eq!(
			config
				.resolve("//evil.example/steal")
				.expect("Leading slashes should stay relative.")
				.as_str(),
			"https://api.example.com/v1/evil.example/steal"
		);
		assert_eq!(
			config.resolve("stories?page=2").expect("Relative path should resolve.").as_str(),
			"https://api.example.com/v1/stories?page=2"
		);
	}

	#[test]
	fn builder_rejects_insecure_remote_hosts() {
		let err = ClientConfig::builder(url("http://api.example.com/"))
			.build()
			.expect_err("Plain HTTP to a remote host should be rejected.");

		assert!(matches!(err, ConfigError::InsecureBaseUrl { .. }));

		for loopback in ["http://localhost:3000/", "http://127.0.0.1:8080/", "http://[::1]:9000/"] {
			ClientConfig::builder(url(loopback))
				.build()
				.expect("Plain HTTP to a loopback host should be accepted.");
		}
	}

	#[test]
	fn builder_rejects_non_base_urls_and_empty_fields() {
		let err = ClientConfig::builder(url("mailto:ops@example.com"))
			.build()
			.expect_err("Non-base URLs should be rejected.");

		assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));

		let err = ClientConfig::builder(url("https://api.example.com/"))
			.wire_format(RefreshWireFormat {
				response_access_field: " ".into(),
				..RefreshWireFormat::default()
			})
			.build()
			.expect_err("Blank wire fields should be rejected.");

		assert!(matches!(err, ConfigError::EmptyWireField { field: "response_access_field" }));
	}

	#[test]
	fn defaults_match_backend_contract() {
		let config = crate::_preludet::test_config();

		assert_eq!(config.refresh_path, "auth/refresh");
		assert_eq!(config.wire_format.request_refresh_field, "refreshToken");
		assert_eq!(config.wire_format.response_access_field, "accessToken");
		assert_eq!(config.refresh_policy, RefreshPolicy::PerRequest);
		assert_eq!(config.timeout, StdDuration::from_secs(30));
		assert!(!config.clear_credentials_on_logout);
		assert_eq!(
			config.refresh_url().expect("Refresh URL should resolve.").as_str(),
			"http://127.0.0.1:8080/api/auth/refresh"
		);
	}
}
