//! Refresh path entered after a `401` on the first send.
//!
//! The stored refresh token is exchanged at the configured refresh endpoint with a
//! form-encoded body. The call never carries a bearer token and never re-enters the refresh
//! path. A 2xx answer rewrites the credential pair in one store write; anything else
//! invalidates the session. Under [`RefreshPolicy::Coalesced`] callers queue behind one async
//! guard and reuse a rotation that completed while they waited.

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	client::{ApiClient, RefreshMetrics, RequestState, state::StateTracker},
	config::{RefreshPolicy, RefreshWireFormat},
	error::UnauthorizedCause,
	http::{ApiRequest, ApiTransport, OutboundRequest, RawResponse},
	obs::{self, RequestOutcome, RequestStage},
	session::{LogoutReason, SessionInvalidated},
};

/// Why a refresh response could not be turned into credentials.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshResponseError {
	/// Body is not a JSON object.
	#[error("Refresh response is not a JSON object.")]
	NotAnObject,
	/// The access token field is missing, empty, or not a string.
	#[error("Refresh response lacks a usable `{field}` field.")]
	MissingAccessToken {
		/// Configured wire field name.
		field: String,
	},
}

/// Tokens issued by a successful refresh call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RotatedTokens {
	/// New access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, or the previous one when the backend did not rotate it.
	pub refresh_token: TokenSecret,
}
impl From<RotatedTokens> for CredentialPair {
	fn from(tokens: RotatedTokens) -> Self {
		Self { access_token: Some(tokens.access_token), refresh_token: Some(tokens.refresh_token) }
	}
}

/// Parses a refresh response body.
///
/// A missing or empty refresh field keeps `previous_refresh`, so backends that do not rotate
/// refresh tokens still leave a complete pair in the store.
pub fn parse_refresh_response(
	body: &[u8],
	wire: &RefreshWireFormat,
	previous_refresh: &TokenSecret,
) -> Result<RotatedTokens, RefreshResponseError> {
	let value: serde_json::Value =
		serde_json::from_slice(body).map_err(|_| RefreshResponseError::NotAnObject)?;
	let serde_json::Value::Object(map) = value else {
		return Err(RefreshResponseError::NotAnObject);
	};
	let access_token = map
		.get(&wire.response_access_field)
		.and_then(serde_json::Value::as_str)
		.filter(|value| !value.is_empty())
		.map(TokenSecret::new)
		.ok_or_else(|| RefreshResponseError::MissingAccessToken {
			field: wire.response_access_field.clone(),
		})?;
	let refresh_token = map
		.get(&wire.response_refresh_field)
		.and_then(serde_json::Value::as_str)
		.filter(|value| !value.is_empty())
		.map(TokenSecret::new)
		.unwrap_or_else(|| previous_refresh.clone());

	Ok(RotatedTokens { access_token, refresh_token })
}

/// Outcome of the last refresh that ended a session, shared with callers queued behind it under
/// [`RefreshPolicy::Coalesced`].
#[derive(Debug, Default)]
pub(crate) struct RefreshLedger {
	failed: Option<(TokenSecret, UnauthorizedCause)>,
}
impl RefreshLedger {
	/// Cause of a failed refresh that replaced `sent_token`, if one happened.
	fn failure_for(&self, sent_token: Option<&TokenSecret>) -> Option<UnauthorizedCause> {
		self.failed
			.as_ref()
			.filter(|(token, _)| Some(token) == sent_token)
			.map(|(_, cause)| *cause)
	}

	fn record(
		&mut self,
		sent_token: Option<&TokenSecret>,
		result: &Result<TokenSecret>,
		state: RequestState,
	) {
		match result {
			Ok(_) => self.failed = None,
			Err(e) if state == RequestState::LoggedOut => {
				let cause = match e {
					Error::Unauthorized { cause, .. } => *cause,
					_ => UnauthorizedCause::RefreshUnavailable,
				};

				if let Some(token) = sent_token {
					self.failed = Some((token.clone(), cause));
				}
			},
			Err(_) => {},
		}
	}
}

impl<T> ApiClient<T>
where
	T: ApiTransport,
{
	/// Produces the access token for the single retry, or the error that ends the request.
	pub(crate) async fn recover_session(
		&self,
		path: &str,
		sent_token: Option<&TokenSecret>,
		rejection: String,
		tracker: &mut StateTracker,
	) -> Result<TokenSecret> {
		match self.config.refresh_policy {
			RefreshPolicy::PerRequest =>
				self.refresh_once(path, sent_token, rejection, tracker).await,
			RefreshPolicy::Coalesced => {
				let mut ledger = self.refresh_guard.lock().await;

				// The refresh this caller queued behind already ended the session.
				if let Some(cause) = ledger.failure_for(sent_token) {
					return Err(Error::Unauthorized { message: rejection, cause });
				}

				let current = self.store.get().await?.unwrap_or_default();

				if let Some(rotated) =
					current.access_token.filter(|stored| Some(stored) != sent_token)
				{
					self.refresh_metrics.record_reuse();
					tracker.advance(RequestState::RefreshSucceeded);

					return Ok(rotated);
				}

				let result = self.refresh_once(path, sent_token, rejection, tracker).await;

				ledger.record(sent_token, &result, tracker.current());

				result
			},
		}
	}

	async fn refresh_once(
		&self,
		path: &str,
		sent_token: Option<&TokenSecret>,
		rejection: String,
		tracker: &mut StateTracker,
	) -> Result<TokenSecret> {
		let current = self.store.get().await?.unwrap_or_default();
		let Some(refresh_token) = current.refresh_token else {
			let unauthorized = Error::Unauthorized {
				message: rejection,
				cause: UnauthorizedCause::MissingRefreshToken,
			};

			// A public call (e.g. a failed login) never had a session to invalidate.
			if sent_token.is_none() {
				return Err(unauthorized);
			}

			tracker.advance(RequestState::RefreshFailed);
			self.invalidate_session(
				SessionInvalidated::new(LogoutReason::MissingRefreshToken).with_path(path),
			)
			.await;
			tracker.advance(RequestState::LoggedOut);

			return Err(unauthorized);
		};
		let metrics: &RefreshMetrics = &self.refresh_metrics;

		metrics.record_attempt();
		obs::record_refresh_outcome(RequestOutcome::Attempt);

		let response = match self.send_refresh(&refresh_token).await {
			Ok(response) => response,
			Err(e) => {
				self.fail_refresh(
					tracker,
					SessionInvalidated::new(LogoutReason::RefreshUnreachable).with_path(path),
				)
				.await;

				return Err(e);
			},
		};

		if !response.is_success() {
			self.fail_refresh(
				tracker,
				SessionInvalidated::new(LogoutReason::RefreshRejected)
					.with_path(path)
					.with_refresh_status(response.status),
			)
			.await;

			return Err(Error::Unauthorized {
				message: rejection,
				cause: UnauthorizedCause::RefreshRejected { status: response.status },
			});
		}

		let rotated = match parse_refresh_response(
			&response.body,
			&self.config.wire_format,
			&refresh_token,
		) {
			Ok(rotated) => rotated,
			Err(_) => {
				self.fail_refresh(
					tracker,
					SessionInvalidated::new(LogoutReason::RefreshResponseInvalid)
						.with_path(path)
						.with_refresh_status(response.status),
				)
				.await;

				return Err(Error::Unauthorized {
					message: rejection,
					cause: UnauthorizedCause::RefreshResponseInvalid,
				});
			},
		};
		let access = rotated.access_token.clone();

		// The backend has already rotated the refresh token, so a lost write ends the session.
		if let Err(e) = self.store.set(rotated.into()).await {
			self.fail_refresh(
				tracker,
				SessionInvalidated::new(LogoutReason::StoreWriteFailed).with_path(path),
			)
			.await;

			return Err(e.into());
		}

		metrics.record_success();
		obs::record_refresh_outcome(RequestOutcome::Success);
		tracker.advance(RequestState::RefreshSucceeded);

		Ok(access)
	}

	/// Calls the refresh endpoint directly on the transport, bypassing bearer injection.
	async fn send_refresh(&self, refresh_token: &TokenSecret) -> Result<RawResponse> {
		let request = ApiRequest::post(self.config.refresh_path.as_str()).form([(
			self.config.wire_format.request_refresh_field.as_str(),
			refresh_token.expose(),
		)]);
		let mut outbound = OutboundRequest::resolve(
			&request,
			self.config.refresh_url()?,
			&self.config.default_headers,
		)?;

		outbound.remove_header("authorization");
		obs::record_request_outcome(RequestStage::Refresh, RequestOutcome::Attempt);

		let result = self.transport.send(outbound).await;

		match &result {
			Ok(raw) if raw.is_success() =>
				obs::record_request_outcome(RequestStage::Refresh, RequestOutcome::Success),
			_ => obs::record_request_outcome(RequestStage::Refresh, RequestOutcome::Failure),
		}

		result
	}

	async fn fail_refresh(&self, tracker: &mut StateTracker, event: SessionInvalidated) {
		self.refresh_metrics.record_failure();
		obs::record_refresh_outcome(RequestOutcome::Failure);
		tracker.advance(RequestState::RefreshFailed);
		self.invalidate_session(event).await;
		tracker.advance(RequestState::LoggedOut);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn previous() -> TokenSecret {
		TokenSecret::new("refresh-old")
	}

	#[test]
	fn parses_default_wire_fields() {
		let pair = parse_refresh_response(
			b"{\"accessToken\":\"xyz\",\"refreshToken\":\"uvw\"}",
			&RefreshWireFormat::default(),
			&previous(),
		)
		.expect("Well-formed refresh response should parse.");

		assert_eq!(CredentialPair::from(pair), CredentialPair::new("xyz", "uvw"));
	}

	#[test]
	fn keeps_previous_refresh_token_when_not_rotated() {
		let pair = parse_refresh_response(
			b"{\"accessToken\":\"xyz\"}",
			&RefreshWireFormat::default(),
			&previous(),
		)
		.expect("Refresh response without rotation should parse.");

		assert_eq!(pair.refresh_token.expose(), "refresh-old");
	}

	#[test]
	fn honors_custom_wire_fields() {
		let wire = RefreshWireFormat {
			request_refresh_field: "refresh_token".into(),
			response_access_field: "access_token".into(),
			response_refresh_field: "refresh_token".into(),
		};
		let pair = parse_refresh_response(
			b"{\"access_token\":\"a1\",\"refresh_token\":\"r1\",\"token_type\":\"bearer\"}",
			&wire,
			&previous(),
		)
		.expect("Snake-case refresh response should parse.");

		assert_eq!(pair.access_token.expose(), "a1");
		assert_eq!(pair.refresh_token.expose(), "r1");
	}

	#[test]
	fn ledger_shares_only_failures_that_ended_the_session() {
		let sent = TokenSecret::new("abc");
		let mut ledger = RefreshLedger::default();
		let rejected: Result<TokenSecret> = Err(Error::Unauthorized {
			message: "expired".into(),
			cause: UnauthorizedCause::RefreshRejected { status: 403 },
		});

		ledger.record(Some(&sent), &rejected, RequestState::Failed);

		assert_eq!(ledger.failure_for(Some(&sent)), None);

		ledger.record(Some(&sent), &rejected, RequestState::LoggedOut);

		assert_eq!(
			ledger.failure_for(Some(&sent)),
			Some(UnauthorizedCause::RefreshRejected { status: 403 })
		);
		assert_eq!(ledger.failure_for(Some(&TokenSecret::new("fresh-login"))), None);
		assert_eq!(ledger.failure_for(None), None);

		ledger.record(
			Some(&sent),
			&Err(crate::error::TransportError::Timeout.into()),
			RequestState::LoggedOut,
		);

		assert_eq!(ledger.failure_for(Some(&sent)), Some(UnauthorizedCause::RefreshUnavailable));

		ledger.record(Some(&sent), &Ok(TokenSecret::new("xyz")), RequestState::RefreshSucceeded);

		assert_eq!(ledger.failure_for(Some(&sent)), None);
	}

	#[test]
	fn rejects_unusable_bodies() {
		let wire = RefreshWireFormat::default();

		assert_eq!(
			parse_refresh_response(b"[]", &wire, &previous()),
			Err(RefreshResponseError::NotAnObject)
		);
		assert_eq!(
			parse_refresh_response(b"not json", &wire, &previous()),
			Err(RefreshResponseError::NotAnObject)
		);
		assert_eq!(
			parse_refresh_response(b"{\"accessToken\":\"\"}", &wire, &previous()),
			Err(RefreshResponseError::MissingAccessToken { field: "accessToken".into() })
		);
	}
}
