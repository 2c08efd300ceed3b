//! Authenticated API client with transparent single-shot token refresh.
//!
//! [`ApiClient::execute`] reads the stored credential pair, attaches `Authorization: Bearer`
//! when an access token exists, and sends the request. A `401` on the first send enters the
//! refresh path (see [`refresh`]): one call to the refresh endpoint, an atomic store rewrite,
//! and exactly one retry whose outcome is final. Every other status passes through unchanged.

pub mod refresh;
pub mod state;

mod metrics;

pub use metrics::RefreshMetrics;
pub use state::RequestState;

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	config::ClientConfig,
	error::UnauthorizedCause,
	http::{ApiRequest, ApiResponse, ApiTransport, OutboundRequest, RawResponse},
	obs::{self, RequestOutcome, RequestSpan},
	session::{LogoutReason, LogoutSignal, SessionInvalidated},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;
use refresh::RefreshLedger;
use state::{Attempt, StateTracker};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// Issues backend requests on behalf of the signed-in user.
///
/// The client owns the transport, the injected credential store, and the logout signal so
/// callers never attach or rotate tokens themselves. Cloning is cheap and clones share every
/// collaborator, including the refresh guard used by [`RefreshPolicy::Coalesced`].
///
/// [`RefreshPolicy::Coalesced`]: crate::config::RefreshPolicy::Coalesced
pub struct ApiClient<T>
where
	T: ApiTransport,
{
	/// Validated configuration.
	pub config: Arc<ClientConfig>,
	/// Transport used for every outbound request, including refresh calls.
	pub transport: Arc<T>,
	/// Credential store consulted before each send and rewritten on refresh.
	pub store: Arc<dyn CredentialStore>,
	/// Subscriber notified when the session can no longer be recovered.
	pub signal: Arc<dyn LogoutSignal>,
	refresh_metrics: Arc<RefreshMetrics>,
	refresh_guard: Arc<AsyncMutex<RefreshLedger>>,
}
impl<T> ApiClient<T>
where
	T: ApiTransport,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_transport(
		config: ClientConfig,
		transport: impl Into<Arc<T>>,
		store: Arc<dyn CredentialStore>,
		signal: Arc<dyn LogoutSignal>,
	) -> Self {
		Self {
			config: Arc::new(config),
			transport: transport.into(),
			store,
			signal,
			refresh_metrics: Default::default(),
			refresh_guard: Default::default(),
		}
	}

	/// Sends `request`, recovering from one expired access token.
	///
	/// Returns the response for any 2xx status. A 401 that the refresh path cannot recover
	/// yields [`Error::Unauthorized`]; other statuses yield [`Error::Server`]; transport
	/// failures yield [`Error::Transport`].
	pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
		let span = RequestSpan::new(request.method, &request.path);

		span.instrument(self.execute_tracked(request)).await
	}

	/// Runs [`execute`](Self::execute) and decodes the JSON body into `R`.
	pub async fn execute_json<R>(&self, request: ApiRequest) -> Result<R>
	where
		R: serde::de::DeserializeOwned,
	{
		self.execute(request).await?.json()
	}

	/// Stores a pair obtained from login, registration, or social sign-in.
	pub async fn store_credentials(&self, pair: CredentialPair) -> Result<()> {
		self.store.set(pair).await.map_err(Error::from)
	}

	/// Returns the stored pair, if any.
	pub async fn credentials(&self) -> Result<Option<CredentialPair>> {
		self.store.get().await.map_err(Error::from)
	}

	/// Counters for refresh calls made by this client and its clones.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}

	/// Clears stored credentials and notifies the logout subscriber.
	pub async fn logout(&self) -> Result<()> {
		self.store.clear().await?;

		let event = SessionInvalidated::new(LogoutReason::UserInitiated);

		obs::record_session_invalidated(&event);
		self.signal.session_invalidated(&event);

		Ok(())
	}

	async fn execute_tracked(&self, request: ApiRequest) -> Result<ApiResponse> {
		let mut tracker = StateTracker::new();
		let credentials = match self.store.get().await {
			Ok(pair) => pair.unwrap_or_default(),
			Err(e) => return tracker.settle(Err(e.into())),
		};
		let sent_token = credentials.access_token;
		let raw = match self.send(&request, sent_token.as_ref(), Attempt::Initial).await {
			Ok(raw) => raw,
			Err(e) => return tracker.settle(Err(e)),
		};

		tracker.advance(RequestState::Sent);

		if raw.status != 401 {
			return tracker.settle(into_result(raw));
		}

		tracker.advance(RequestState::NeedsRefresh);

		let rejection = raw.backend_message();
		let fresh_token = match self
			.recover_session(&request.path, sent_token.as_ref(), rejection, &mut tracker)
			.await
		{
			Ok(token) => token,
			Err(e) => {
				if !tracker.current().is_terminal() {
					tracker.advance(RequestState::Failed);
				}

				return Err(e);
			},
		};
		let raw = match self.send(&request, Some(&fresh_token), Attempt::Retry).await {
			Ok(raw) => raw,
			Err(e) => {
				tracker.advance(RequestState::Failed);

				return Err(e);
			},
		};

		tracker.advance(RequestState::Retried);

		tracker.settle(self.classify(raw, Attempt::Retry))
	}

	/// Sends one attempt. The bearer header mirrors `token` exactly: present when a token is
	/// supplied, stripped otherwise.
	async fn send(
		&self,
		request: &ApiRequest,
		token: Option<&TokenSecret>,
		attempt: Attempt,
	) -> Result<RawResponse> {
		let stage = attempt.stage();

		obs::record_request_outcome(stage, RequestOutcome::Attempt);

		let url = self.config.resolve(&request.path)?;
		let mut outbound = OutboundRequest::resolve(request, url, &self.config.default_headers)?;

		match token {
			Some(token) => outbound.set_header("Authorization", &token.bearer()),
			None => outbound.remove_header("authorization"),
		}

		let result = self.transport.send(outbound).await;

		match &result {
			Ok(raw) if raw.is_success() =>
				obs::record_request_outcome(stage, RequestOutcome::Success),
			_ => obs::record_request_outcome(stage, RequestOutcome::Failure),
		}

		result
	}

	fn classify(&self, raw: RawResponse, attempt: Attempt) -> Result<ApiResponse> {
		if raw.status == 401 && !attempt.may_refresh() {
			return Err(Error::Unauthorized {
				message: raw.backend_message(),
				cause: UnauthorizedCause::RetryRejected,
			});
		}

		into_result(raw)
	}

	async fn invalidate_session(&self, event: SessionInvalidated) {
		obs::record_session_invalidated(&event);

		let cleared =
			if self.config.clear_credentials_on_logout { self.store.clear().await } else { Ok(()) };

		if let Err(e) = cleared {
			obs::record_store_clear_failed(&e);
		}

		self.signal.session_invalidated(&event);
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a client that provisions its own reqwest transport from `config`.
	///
	/// The transport applies [`ClientConfig::timeout`] and [`ClientConfig::user_agent`] and
	/// does not follow redirects.
	pub fn new(
		config: ClientConfig,
		store: Arc<dyn CredentialStore>,
		signal: Arc<dyn LogoutSignal>,
	) -> Result<Self> {
		let transport = ReqwestTransport::from_config(&config)?;

		Ok(Self::with_transport(config, transport, store, signal))
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			transport: self.transport.clone(),
			store: self.store.clone(),
			signal: self.signal.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			refresh_guard: self.refresh_guard.clone(),
		}
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("refresh_policy", &self.config.refresh_policy)
			.finish()
	}
}

/// Maps a non-401 response onto the caller-facing result.
fn into_result(raw: RawResponse) -> Result<ApiResponse> {
	if raw.is_success() {
		return Ok(raw.into());
	}

	Err(Error::Server {
		status: raw.status,
		message: raw.backend_message(),
		retry_after: raw.retry_after(),
		body: raw.body,
	})
}
