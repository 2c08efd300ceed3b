//! Access/refresh credential pair persisted by credential stores.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Access and refresh tokens issued by the backend at login, registration, or refresh.
///
/// Either half may be missing; an empty pair represents the unauthenticated state.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Short-lived bearer credential attached to every request.
	pub access_token: Option<TokenSecret>,
	/// Longer-lived credential exchanged for a new access token.
	pub refresh_token: Option<TokenSecret>,
}
impl CredentialPair {
	/// Creates a complete pair.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: Some(TokenSecret::new(access_token)),
			refresh_token: Some(TokenSecret::new(refresh_token)),
		}
	}

	/// Creates a pair that only carries an access token.
	pub fn access_only(access_token: impl Into<String>) -> Self {
		Self { access_token: Some(TokenSecret::new(access_token)), refresh_token: None }
	}

	/// Returns `true` when neither token is present.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none()
	}

	/// Returns the access token value, if present.
	pub fn access(&self) -> Option<&str> {
		self.access_token.as_ref().map(TokenSecret::expose)
	}

	/// Returns the refresh token value, if present.
	pub fn refresh(&self) -> Option<&str> {
		self.refresh_token.as_ref().map(TokenSecret::expose)
	}
}
impl Debug for CredentialPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialPair")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn debug_output_redacts_both_tokens() {
		let pair = CredentialPair::new("access-abc", "refresh-uvw");
		let rendered = format!("{pair:?}");

		assert!(!rendered.contains("access-abc"));
		assert!(!rendered.contains("refresh-uvw"));
		assert!(rendered.contains("<redacted>"));
	}

	#[test]
	fn empty_and_partial_pairs() {
		assert!(CredentialPair::default().is_empty());

		let partial = CredentialPair::access_only("abc");

		assert!(!partial.is_empty());
		assert_eq!(partial.access(), Some("abc"));
		assert_eq!(partial.refresh(), None);
	}

	#[test]
	fn serializes_as_plain_strings() {
		let pair = CredentialPair::new("xyz", "uvw");
		let payload =
			serde_json::to_string(&pair).expect("Credential pair should serialize to JSON.");

		assert_eq!(payload, "{\"access_token\":\"xyz\",\"refresh_token\":\"uvw\"}");
	}
}
