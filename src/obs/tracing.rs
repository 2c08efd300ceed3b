// self
use crate::{
	_prelude::*, client::RequestState, http::Method, session::SessionInvalidated,
	store::StoreError,
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRequest<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRequest<F> = F;

/// A span builder wrapping one logical `execute` call.
#[derive(Clone, Debug)]
pub struct RequestSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RequestSpan {
	/// Creates a new span tagged with the request method + path.
	pub fn new(method: Method, path: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("arena_client.request", method = method.as_str(), path);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (method, path);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRequest<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event for a request state transition.
pub fn record_transition(from: RequestState, to: RequestState) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(from = from.as_str(), to = to.as_str(), "request state transition");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (from, to);
	}
}

/// Emits a warning when the session is invalidated.
pub fn record_session_invalidated(event: &SessionInvalidated) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			reason = event.reason.as_str(),
			path = event.path.as_deref(),
			refresh_status = event.refresh_status,
			"session invalidated"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = event;
	}
}

/// Emits a warning when credentials could not be cleared after a logout.
pub fn record_store_clear_failed(error: &StoreError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(error = %error, "failed to clear credentials after logout");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = error;
	}
}
