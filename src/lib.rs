//! Authenticated API client for The Arena backend: bearer injection, single-shot token refresh,
//! and session invalidation signals in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod session;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// self
	use crate::config::ClientConfig;
	#[cfg(feature = "reqwest")]
	use crate::{client::ReqwestApiClient, session::SessionEvents, store::MemoryStore};

	/// Default configuration pointing at a loopback backend.
	pub fn test_config() -> ClientConfig {
		test_config_for("http://127.0.0.1:8080/api/")
	}

	/// Builds a configuration for the provided loopback base URL.
	pub fn test_config_for(base_url: &str) -> ClientConfig {
		ClientConfig::builder(Url::parse(base_url).expect("Test base URL should parse."))
			.build()
			.expect("Loopback test configuration should build.")
	}

	/// Constructs a reqwest-backed [`ReqwestApiClient`] with an in-memory store and a
	/// [`SessionEvents`] hub so tests can inspect every collaborator.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_client(
		base_url: &str,
	) -> (ReqwestApiClient, Arc<MemoryStore>, Arc<SessionEvents>) {
		let store = Arc::new(MemoryStore::default());
		let events = Arc::new(SessionEvents::default());
		let client =
			ReqwestApiClient::new(test_config_for(base_url), store.clone(), events.clone())
				.expect("Failed to build reqwest client for tests.");

		(client, store, events)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
