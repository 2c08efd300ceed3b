//! Shared fixtures for integration tests: a scripted transport plus client builders.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	io::{Error as IoError, ErrorKind},
	sync::Arc,
	time::Duration as StdDuration,
};
// crates.io
use parking_lot::Mutex;
use url::Url;
// self
use arena_client::{
	client::ApiClient,
	config::ClientConfig,
	error::TransportError,
	http::{ApiTransport, OutboundRequest, RawResponse, TransportFuture},
	session::SessionEvents,
	store::MemoryStore,
};

/// Reply served by [`ScriptedTransport`].
#[derive(Debug)]
pub enum Reply {
	/// Respond with the given raw response.
	Response(RawResponse),
	/// Fail without a response.
	NetworkFailure,
}
impl Reply {
	pub fn json(status: u16, body: &str) -> Self {
		Self::Response(RawResponse {
			status,
			headers: vec![("content-type".into(), "application/json".into())],
			body: body.as_bytes().to_vec(),
		})
	}

	pub fn status(status: u16) -> Self {
		Self::Response(RawResponse { status, headers: Vec::new(), body: Vec::new() })
	}
}

/// In-process transport that replays queued replies and records every request.
///
/// Requests whose path ends with `/auth/refresh` pull from the refresh queue; all others pull
/// from the API queue. An exhausted queue answers HTTP 599 so unexpected calls fail loudly.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
	api: Mutex<VecDeque<Reply>>,
	refresh: Mutex<VecDeque<Reply>>,
	sent: Mutex<Vec<OutboundRequest>>,
	delay: Mutex<Option<StdDuration>>,
}
impl ScriptedTransport {
	pub fn push_api(&self, reply: Reply) -> &Self {
		self.api.lock().push_back(reply);

		self
	}

	pub fn push_refresh(&self, reply: Reply) -> &Self {
		self.refresh.lock().push_back(reply);

		self
	}

	pub fn set_delay(&self, delay: StdDuration) {
		*self.delay.lock() = Some(delay);
	}

	pub fn sent(&self) -> Vec<OutboundRequest> {
		self.sent.lock().clone()
	}

	pub fn refresh_calls(&self) -> Vec<OutboundRequest> {
		self.sent().into_iter().filter(is_refresh).collect()
	}

	pub fn api_calls(&self) -> Vec<OutboundRequest> {
		self.sent().into_iter().filter(|req| !is_refresh(req)).collect()
	}
}
impl ApiTransport for ScriptedTransport {
	fn send(&self, request: OutboundRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let refresh = is_refresh(&request);

			self.sent.lock().push(request);

			let delay = *self.delay.lock();

			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			let reply =
				if refresh { self.refresh.lock().pop_front() } else { self.api.lock().pop_front() };

			match reply {
				Some(Reply::Response(response)) => Ok(response),
				Some(Reply::NetworkFailure) => Err(TransportError::network(IoError::new(
					ErrorKind::ConnectionReset,
					"connection reset by peer",
				))
				.into()),
				None => Ok(RawResponse { status: 599, headers: Vec::new(), body: Vec::new() }),
			}
		})
	}
}

fn is_refresh(request: &OutboundRequest) -> bool {
	request.url.path().ends_with("/auth/refresh")
}

pub type ScriptedClient = ApiClient<ScriptedTransport>;

pub struct Harness {
	pub client: ScriptedClient,
	pub transport: Arc<ScriptedTransport>,
	pub store: Arc<MemoryStore>,
	pub events: Arc<SessionEvents>,
}

pub fn base_config() -> ClientConfig {
	ClientConfig::builder(Url::parse("https://api.arena.test/v1/").expect("Base URL should parse."))
		.build()
		.expect("Test configuration should build.")
}

pub fn harness() -> Harness {
	harness_with(base_config())
}

pub fn harness_with(config: ClientConfig) -> Harness {
	let transport = Arc::new(ScriptedTransport::default());
	let store = Arc::new(MemoryStore::default());
	let events = Arc::new(SessionEvents::default());
	let client =
		ApiClient::with_transport(config, transport.clone(), store.clone(), events.clone());

	Harness { client, transport, store, events }
}
