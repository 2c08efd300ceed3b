//! Session invalidation signal emitted when the client can no longer authenticate.
//!
//! The surrounding application subscribes through [`LogoutSignal`] to route the user back to
//! an authentication flow. [`SessionEvents`] is a ready-made hub that fans one event out to
//! any number of listeners and keeps the last event for inspection.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Why the session was invalidated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
	/// An authenticated request hit 401 and no refresh token was stored.
	MissingRefreshToken,
	/// The refresh endpoint answered with a non-2xx status.
	RefreshRejected,
	/// The refresh endpoint answered 2xx without a usable access token.
	RefreshResponseInvalid,
	/// The refresh call failed at the transport level.
	RefreshUnreachable,
	/// Rotated credentials could not be written to the store.
	StoreWriteFailed,
	/// The application requested a logout.
	UserInitiated,
}
impl LogoutReason {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LogoutReason::MissingRefreshToken => "missing_refresh_token",
			LogoutReason::RefreshRejected => "refresh_rejected",
			LogoutReason::RefreshResponseInvalid => "refresh_response_invalid",
			LogoutReason::RefreshUnreachable => "refresh_unreachable",
			LogoutReason::StoreWriteFailed => "store_write_failed",
			LogoutReason::UserInitiated => "user_initiated",
		}
	}
}
impl Display for LogoutReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Event delivered to [`LogoutSignal`] subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInvalidated {
	/// Why the session ended.
	pub reason: LogoutReason,
	/// Path of the request that triggered the invalidation, if any.
	pub path: Option<String>,
	/// HTTP status returned by the refresh endpoint, when it answered.
	pub refresh_status: Option<u16>,
	/// Instant the event was emitted.
	pub at: OffsetDateTime,
}
impl SessionInvalidated {
	/// Creates an event stamped with the current clock.
	pub fn new(reason: LogoutReason) -> Self {
		Self { reason, path: None, refresh_status: None, at: OffsetDateTime::now_utc() }
	}

	/// Attaches the triggering request path.
	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());

		self
	}

	/// Attaches the refresh endpoint status.
	pub fn with_refresh_status(mut self, status: u16) -> Self {
		self.refresh_status = Some(status);

		self
	}
}

/// Subscriber contract for session invalidation.
///
/// Implementations must return quickly; the client calls them inline on the request path.
pub trait LogoutSignal
where
	Self: Send + Sync,
{
	/// Called once per invalidation.
	fn session_invalidated(&self, event: &SessionInvalidated);
}
impl<F> LogoutSignal for F
where
	F: Fn(&SessionInvalidated) + Send + Sync,
{
	fn session_invalidated(&self, event: &SessionInvalidated) {
		self(event)
	}
}

/// Signal that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSignal;
impl LogoutSignal for NoopSignal {
	fn session_invalidated(&self, _event: &SessionInvalidated) {}
}

type Listener = Arc<dyn LogoutSignal>;

/// Fan-out hub that forwards each event to registered listeners.
#[derive(Default)]
pub struct SessionEvents {
	listeners: RwLock<Vec<Listener>>,
	emitted: AtomicU64,
	last: Mutex<Option<SessionInvalidated>>,
}
impl SessionEvents {
	/// Registers a listener.
	pub fn subscribe(&self, listener: impl 'static + LogoutSignal) {
		self.listeners.write().push(Arc::new(listener));
	}

	/// Number of events emitted so far.
	pub fn emitted(&self) -> u64 {
		self.emitted.load(Ordering::SeqCst)
	}

	/// Most recent event, if any.
	pub fn last(&self) -> Option<SessionInvalidated> {
		self.last.lock().clone()
	}
}
impl LogoutSignal for SessionEvents {
	fn session_invalidated(&self, event: &SessionInvalidated) {
		self.emitted.fetch_add(1, Ordering::SeqCst);
		*self.last.lock() = Some(event.clone());

		// Snapshot so listeners may subscribe further listeners without deadlocking.
		let listeners = self.listeners.read().clone();

		for listener in listeners {
			listener.session_invalidated(event);
		}
	}
}
impl Debug for SessionEvents {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionEvents")
			.field("listeners", &self.listeners.read().len())
			.field("emitted", &self.emitted())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn hub_fans_out_and_records_last_event() {
		let hub = SessionEvents::default();
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = seen.clone();

		hub.subscribe(move |event: &SessionInvalidated| sink.lock().push(event.reason));
		hub.session_invalidated(
			&SessionInvalidated::new(LogoutReason::RefreshRejected)
				.with_path("comments/5")
				.with_refresh_status(403),
		);

		assert_eq!(hub.emitted(), 1);
		assert_eq!(*seen.lock(), vec![LogoutReason::RefreshRejected]);

		let last = hub.last().expect("Hub should retain the last event.");

		assert_eq!(last.path.as_deref(), Some("comments/5"));
		assert_eq!(last.refresh_status, Some(403));
	}

	#[test]
	fn reason_labels_are_stable() {
		assert_eq!(LogoutReason::RefreshUnreachable.as_str(), "refresh_unreachable");
		assert_eq!(LogoutReason::UserInitiated.to_string(), "user_initiated");
	}
}
