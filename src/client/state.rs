//! Per-request state machine and the explicit retry budget.

// self
use crate::{
	_prelude::*,
	obs::{self, RequestStage},
};

/// Lifecycle of one logical `execute` call.
///
/// `Initial → Sent → {Success, Failed, NeedsRefresh}`, `NeedsRefresh → {RefreshSucceeded,
/// RefreshFailed, Failed}`, `RefreshSucceeded → Retried → {Success, Failed}`,
/// `RefreshFailed → LoggedOut`. `NeedsRefresh → Failed` covers a 401 with no refresh token on
/// a request that never carried a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestState {
	/// Request built, nothing sent yet.
	Initial,
	/// First send completed.
	Sent,
	/// Backend answered 401 to the first send.
	NeedsRefresh,
	/// New credentials were obtained and stored.
	RefreshSucceeded,
	/// The refresh path could not produce credentials.
	RefreshFailed,
	/// The single retry completed.
	Retried,
	/// Terminal: the caller receives a 2xx response.
	Success,
	/// Terminal: the caller receives an error.
	Failed,
	/// Terminal: the session was invalidated.
	LoggedOut,
}
impl RequestState {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestState::Initial => "initial",
			RequestState::Sent => "sent",
			RequestState::NeedsRefresh => "needs_refresh",
			RequestState::RefreshSucceeded => "refresh_succeeded",
			RequestState::RefreshFailed => "refresh_failed",
			RequestState::Retried => "retried",
			RequestState::Success => "success",
			RequestState::Failed => "failed",
			RequestState::LoggedOut => "logged_out",
		}
	}

	/// Returns `true` for states that end the request.
	pub const fn is_terminal(self) -> bool {
		matches!(self, RequestState::Success | RequestState::Failed | RequestState::LoggedOut)
	}

	/// Checks whether `next` is a legal successor.
	pub fn can_transition_to(self, next: RequestState) -> bool {
		use RequestState::*;

		matches!(
			(self, next),
			(Initial, Sent)
				| (Initial, Failed)
				| (Sent, Success)
				| (Sent, Failed)
				| (Sent, NeedsRefresh)
				| (NeedsRefresh, RefreshSucceeded)
				| (NeedsRefresh, RefreshFailed)
				| (NeedsRefresh, Failed)
				| (RefreshSucceeded, Retried)
				| (RefreshSucceeded, Failed)
				| (RefreshFailed, LoggedOut)
				| (Retried, Success)
				| (Retried, Failed)
		)
	}
}
impl Display for RequestState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Tracks the current [`RequestState`] and reports transitions.
#[derive(Debug)]
pub(crate) struct StateTracker {
	current: RequestState,
}
impl StateTracker {
	pub(crate) fn new() -> Self {
		Self { current: RequestState::Initial }
	}

	pub(crate) fn current(&self) -> RequestState {
		self.current
	}

	pub(crate) fn advance(&mut self, next: RequestState) {
		debug_assert!(
			self.current.can_transition_to(next),
			"Illegal request state transition {} -> {}.",
			self.current,
			next
		);

		obs::record_transition(self.current, next);

		self.current = next;
	}

	/// Moves to `Success` or `Failed` depending on `result`.
	pub(crate) fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
		self.advance(if result.is_ok() { RequestState::Success } else { RequestState::Failed });

		result
	}
}

/// Which send of a logical request is in flight.
///
/// Only [`Attempt::Initial`] may enter the refresh path, which bounds every `execute` call to
/// one refresh and one retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Attempt {
	Initial,
	Retry,
}
impl Attempt {
	pub(crate) const fn may_refresh(self) -> bool {
		matches!(self, Attempt::Initial)
	}

	pub(crate) const fn stage(self) -> RequestStage {
		match self {
			Attempt::Initial => RequestStage::Initial,
			Attempt::Retry => RequestStage::Retry,
		}
	}
}
