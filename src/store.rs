//! Storage contracts and built-in store implementations for the credential pair.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::CredentialPair};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable key-value persistence holding the current credential pair.
///
/// Implementations must write the access and refresh tokens together so a concurrent reader
/// never observes a pair mixed from two different writes.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the stored pair, or `None` when no session exists.
	fn get(&self) -> StoreFuture<'_, Option<CredentialPair>>;

	/// Replaces the stored pair.
	fn set(&self, pair: CredentialPair) -> StoreFuture<'_, ()>;

	/// Deletes the stored pair.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "keychain locked".into() };
		let client_error: Error = store_error.clone().into();

		assert!(matches!(client_error, Error::Storage(_)));
		assert!(client_error.to_string().contains("keychain locked"));

		let source = StdError::source(&client_error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[tokio::test]
	async fn trait_objects_share_one_backend() {
		let backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn CredentialStore> = backend.clone();

		store.set(CredentialPair::new("abc", "def")).await.expect("Set should succeed.");

		let fetched = backend.get().await.expect("Get should succeed.");

		assert_eq!(fetched, Some(CredentialPair::new("abc", "def")));
	}
}
