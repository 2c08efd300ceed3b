//! Transport primitives for backend requests.
//!
//! Callers describe requests with [`ApiRequest`]; the client resolves them into an
//! [`OutboundRequest`] (absolute URL, final headers, encoded body) and hands that to an
//! [`ApiTransport`]. Transports return a [`RawResponse`] for every HTTP status and only fail
//! when no response was obtained at all.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError};

/// Boxed future returned by [`ApiTransport::send`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<RawResponse>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing backend requests.
///
/// The trait is the client's only dependency on an HTTP library. Implementations must be
/// `Send + Sync + 'static` so a single transport can be shared across cloned clients, and must
/// report every HTTP status as a [`RawResponse`]; status interpretation belongs to the client.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends the fully resolved request.
	fn send(&self, request: OutboundRequest) -> TransportFuture<'_>;
}

/// HTTP methods issued by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the method token as sent on the wire.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Request payload variants.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
	#[default]
	/// No body.
	Empty,
	/// JSON document sent as `application/json`.
	Json(serde_json::Value),
	/// Form fields sent as `application/x-www-form-urlencoded`.
	Form(Vec<(String, String)>),
	/// Raw bytes with an explicit content type.
	Bytes {
		/// `Content-Type` header value.
		content_type: String,
		/// Payload bytes.
		data: Vec<u8>,
	},
}
impl RequestBody {
	fn encode(&self) -> (Option<&str>, Vec<u8>) {
		match self {
			Self::Empty => (None, Vec::new()),
			Self::Json(value) => (Some("application/json"), value.to_string().into_bytes()),
			Self::Form(fields) => {
				let encoded = url::form_urlencoded::Serializer::new(String::new())
					.extend_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
					.finish();

				(Some("application/x-www-form-urlencoded"), encoded.into_bytes())
			},
			Self::Bytes { content_type, data } => (Some(content_type.as_str()), data.clone()),
		}
	}
}

/// Caller-constructed request descriptor.
///
/// The client treats the descriptor as opaque apart from injecting the `Authorization` header.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the configured base address.
	pub path: String,
	/// Query string pairs appended to the resolved URL.
	pub query: Vec<(String, String)>,
	/// Caller headers.
	pub headers: Vec<(String, String)>,
	/// Request payload.
	pub body: RequestBody,
}
impl ApiRequest {
	/// Creates a request with no body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			headers: Vec::new(),
			body: RequestBody::Empty,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::Put, path)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::Patch, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Appends a query pair.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Appends a caller header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Serializes `payload` as the JSON body.
	pub fn json<T>(mut self, payload: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = RequestBody::Json(serde_json::to_value(payload)?);

		Ok(self)
	}

	/// Uses form fields as the body.
	pub fn form<I, K, V>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.body =
			RequestBody::Form(fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect());

		self
	}

	/// Uses raw bytes as the body.
	pub fn bytes(mut self, content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
		self.body = RequestBody::Bytes { content_type: content_type.into(), data: data.into() };

		self
	}
}

/// Fully resolved request handed to the transport.
#[derive(Clone, PartialEq, Eq)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL.
	pub url: Url,
	/// Final header list, in send order.
	pub headers: Vec<(String, String)>,
	/// Encoded body bytes.
	pub body: Vec<u8>,
}
impl OutboundRequest {
	/// Resolves `request` against `base`, layering `defaults` under the caller's headers.
	pub(crate) fn resolve(
		request: &ApiRequest,
		url: Url,
		defaults: &[(String, String)],
	) -> Result<Self, ConfigError> {
		let mut url = url;

		if !request.query.is_empty() {
			url.query_pairs_mut()
				.extend_pairs(request.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
		}

		let (content_type, body) = request.body.encode();
		let mut outbound = Self { method: request.method, url, headers: Vec::new(), body };

		for (name, value) in defaults.iter().chain(request.headers.iter()) {
			validate_header(name, value)?;
			outbound.set_header(name, value);
		}
		if let Some(content_type) =
			content_type.filter(|_| outbound.header("content-type").is_none())
		{
			outbound.set_header("Content-Type", content_type);
		}

		Ok(outbound)
	}

	/// Returns the first header value matching `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	/// Replaces every header matching `name` with a single value.
	pub fn set_header(&mut self, name: &str, value: &str) {
		self.remove_header(name);
		self.headers.push((name.to_owned(), value.to_owned()));
	}

	/// Removes every header matching `name`.
	pub fn remove_header(&mut self, name: &str) {
		self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
	}

	/// Returns the `Authorization` header, if any.
	pub fn authorization(&self) -> Option<&str> {
		self.header("authorization")
	}

	/// Returns the body as UTF-8 text when possible.
	pub fn body_text(&self) -> Option<&str> {
		std::str::from_utf8(&self.body).ok()
	}
}
impl Debug for OutboundRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let headers: Vec<_> = self
			.headers
			.iter()
			.map(|(name, value)| {
				if name.eq_ignore_ascii_case("authorization") {
					(name.as_str(), "<redacted>")
				} else {
					(name.as_str(), value.as_str())
				}
			})
			.collect();

		f.debug_struct("OutboundRequest")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("headers", &headers)
			.field("body_len", &self.body.len())
			.finish()
	}
}

/// Raw response returned by a transport for any HTTP status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: Vec<(String, String)>,
	/// Response body.
	pub body: Vec<u8>,
}
impl RawResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns the first header value matching `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	/// Extracts the backend's human-readable message.
	///
	/// Looks for a JSON `message` (string or array of strings) or `error` field and falls back
	/// to the trimmed body text, then to a generic status description.
	pub fn backend_message(&self) -> String {
		if let Ok(serde_json::Value::Object(map)) =
			serde_json::from_slice::<serde_json::Value>(&self.body)
		{
			for key in ["message", "error"] {
				match map.get(key) {
					Some(serde_json::Value::String(text)) if !text.is_empty() =>
						return text.clone(),
					Some(serde_json::Value::Array(items)) => {
						let joined = items
							.iter()
							.filter_map(serde_json::Value::as_str)
							.collect::<Vec<_>>()
							.join("; ");

						if !joined.is_empty() {
							return joined;
						}
					},
					_ => {},
				}
			}
		}

		let text = String::from_utf8_lossy(&self.body);
		let text = text.trim();

		if text.is_empty() { format!("HTTP {}", self.status) } else { text.to_owned() }
	}

	/// Parses the `Retry-After` header as a relative duration.
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(self.header("retry-after")?)
	}
}

/// Successful (2xx) response returned to callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: Vec<(String, String)>,
	/// Response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Returns the first header value matching `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	/// Returns the body as lossy UTF-8 text.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the body as JSON, reporting the failing path on error.
	pub fn json<T>(&self) -> Result<T>
	where
		T: serde::de::DeserializeOwned,
	{
		// Empty 2xx bodies (204, bare 200) decode like JSON `null`.
		let body: &[u8] = if self.body.is_empty() { b"null" } else { &self.body };
		let mut de = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| Error::Decode { source, status: self.status })
	}
}
impl From<RawResponse> for ApiResponse {
	fn from(raw: RawResponse) -> Self {
		Self { status: raw.status, headers: raw.headers, body: raw.body }
	}
}

/// reqwest-backed [`ApiTransport`].
///
/// Redirects are not followed automatically so a redirect to an authentication page is
/// reported to the caller rather than silently replayed without the bearer token.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a transport that applies the configured timeout and user agent.
	pub fn from_config(config: &crate::config::ClientConfig) -> Result<Self, ConfigError> {
		let mut builder = ReqwestClient::builder()
			.timeout(config.timeout)
			.redirect(reqwest::redirect::Policy::none());

		if let Some(user_agent) = &config.user_agent {
			builder = builder.user_agent(user_agent.as_str());
		}

		Ok(Self(builder.build()?))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn send(&self, request: OutboundRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let method = match request.method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
				Method::Put => reqwest::Method::PUT,
				Method::Patch => reqwest::Method::PATCH,
				Method::Delete => reqwest::Method::DELETE,
			};
			let mut builder = self.0.request(method, request.url);

			for (name, value) in &request.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if !request.body.is_empty() {
				builder = builder.body(request.body);
			}

			let response = builder.send().await.map_err(map_reqwest_error)?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(name, value)| {
					value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
				})
				.collect();
			let body = response.bytes().await.map_err(map_reqwest_error)?.to_vec();

			Ok(RawResponse { status, headers, body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}

	crate::error::TransportError::from(err).into()
}

/// Parses a `Retry-After` value given as delta-seconds or an RFC 2822 date.
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
	let raw = raw.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

fn validate_header(name: &str, value: &str) -> Result<(), ConfigError> {
	let name_ok = !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic() && b != b':');
	let value_ok = value.bytes().all(|b| b == b'\t' || (b >= 0x20 && b != 0x7f));

	if name_ok && value_ok {
		Ok(())
	} else {
		Err(ConfigError::InvalidHeader { name: name.to_owned() })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::BTreeMap;
	// self
	use super::*;

	fn base() -> Url {
		Url::parse("https://api.example.com/v1/stories").expect("Failed to parse test URL.")
	}

	#[test]
	fn resolve_layers_defaults_under_caller_headers() {
		let request = ApiRequest::get("stories")
			.query("page", "2")
			.header("Accept", "application/json")
			.header("x-client", "caller");
		let defaults = vec![("X-Client".to_owned(), "default".to_owned())];
		let outbound = OutboundRequest::resolve(&request, base(), &defaults)
			.expect("Request should resolve.");

		assert_eq!(outbound.url.as_str(), "https://api.example.com/v1/stories?page=2");
		assert_eq!(outbound.header("x-client"), Some("caller"));
		assert_eq!(outbound.header("accept"), Some("application/json"));
		assert!(outbound.authorization().is_none());
		assert!(outbound.body.is_empty());
	}

	#[test]
	fn form_and_json_bodies_set_content_type() {
		let form = ApiRequest::post("auth/refresh").form([("refreshToken", "a b&c")]);
		let outbound =
			OutboundRequest::resolve(&form, base(), &[]).expect("Form request should resolve.");

		assert_eq!(outbound.header("content-type"), Some("application/x-www-form-urlencoded"));
		assert_eq!(outbound.body_text(), Some("refreshToken=a+b%26c"));

		let json = ApiRequest::post("comments/5")
			.json(&serde_json::json!({ "text": "hot take" }))
			.expect("JSON body should serialize.");
		let outbound =
			OutboundRequest::resolve(&json, base(), &[]).expect("JSON request should resolve.");

		assert_eq!(outbound.header("content-type"), Some("application/json"));
		assert_eq!(outbound.body_text(), Some("{\"text\":\"hot take\"}"));
	}

	#[test]
	fn resolve_rejects_invalid_headers() {
		let request = ApiRequest::get("stories").header("Bad Header", "value");
		let err = OutboundRequest::resolve(&request, base(), &[])
			.expect_err("Header names with spaces should be rejected.");

		assert!(matches!(err, ConfigError::InvalidHeader { .. }));
	}

	#[test]
	fn debug_redacts_authorization() {
		let mut outbound = OutboundRequest::resolve(&ApiRequest::get("stories"), base(), &[])
			.expect("Request should resolve.");

		outbound.set_header("Authorization", "Bearer abc");

		let rendered = format!("{outbound:?}");

		assert!(!rendered.contains("abc"));
		assert!(rendered.contains("<redacted>"));
	}

	#[test]
	fn backend_message_prefers_json_fields() {
		let raw = |body: &str| RawResponse {
			status: 400,
			headers: Vec::new(),
			body: body.as_bytes().to_vec(),
		};

		assert_eq!(raw("{\"message\":\"Story not found\"}").backend_message(), "Story not found");
		assert_eq!(
			raw("{\"message\":[\"text too long\",\"bad id\"]}").backend_message(),
			"text too long; bad id"
		);
		assert_eq!(raw("{\"error\":\"Forbidden\"}").backend_message(), "Forbidden");
		assert_eq!(raw("  plain failure \n").backend_message(), "plain failure");
		assert_eq!(raw("").backend_message(), "HTTP 400");
	}

	#[test]
	fn retry_after_accepts_seconds_and_dates() {
		assert_eq!(parse_retry_after("120"), Some(Duration::seconds(120)));
		assert_eq!(parse_retry_after("Tue, 01 Jan 2019 00:00:00 +0000"), None);
		assert_eq!(parse_retry_after("soon"), None);

		let parsed = parse_retry_after("Fri, 01 Jan 2100 00:00:00 +0000")
			.expect("Future date should parse.");

		assert!(parsed.is_positive());
	}

	#[test]
	fn empty_success_body_decodes_as_unit() {
		let response = ApiResponse { status: 204, headers: Vec::new(), body: Vec::new() };

		response.json::<()>().expect("Empty body should decode as unit.");

		let response =
			ApiResponse { status: 200, headers: Vec::new(), body: b"{\"id\":\"x\"}".to_vec() };
		let err = response
			.json::<BTreeMap<String, u32>>()
			.expect_err("String values should not decode as integers.");

		assert!(matches!(err, Error::Decode { status: 200, .. }));
	}
}
