//! Authentication lifecycle state machine.
//!
//! ```text
//! Unauthenticated ─▶ AuthorizationRequested ─▶ CodeReceived ─▶ TokenExchangePending ─▶ Authenticated
//!        │                                                              │                   │
//!        └───────── persisted credential verified / rejected ──────────┴──▶ Revoked ◀──────┘
//! ```
//!
//! `Revoked` is terminal until [`Session::reset`] is called.

// self
use crate::{_prelude::*, obs};

/// Position of a session in the authentication lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
	/// No credential; the host has not started an authorization.
	Unauthenticated,
	/// The authorize URL was handed to the host.
	AuthorizationRequested,
	/// A callback URL carrying a code was accepted.
	CodeReceived,
	/// The code is being exchanged at the token endpoint.
	TokenExchangePending,
	/// A verified credential is live.
	Authenticated,
	/// The service rejected the credential; restart from `Unauthenticated`.
	Revoked,
}
impl AuthState {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthState::Unauthenticated => "unauthenticated",
			AuthState::AuthorizationRequested => "authorization_requested",
			AuthState::CodeReceived => "code_received",
			AuthState::TokenExchangePending => "token_exchange_pending",
			AuthState::Authenticated => "authenticated",
			AuthState::Revoked => "revoked",
		}
	}

	/// Whether the lifecycle permits moving from `self` to `to`.
	pub fn can_transition_to(self, to: AuthState) -> bool {
		use AuthState::*;

		matches!(
			(self, to),
			(Unauthenticated, AuthorizationRequested | CodeReceived | Authenticated | Revoked)
				| (
					AuthorizationRequested,
					AuthorizationRequested | CodeReceived | Unauthenticated | Authenticated | Revoked
				)
				| (CodeReceived, TokenExchangePending | Unauthenticated)
				| (TokenExchangePending, Authenticated | Revoked | Unauthenticated)
				| (
					Authenticated,
					Authenticated | Revoked | AuthorizationRequested | CodeReceived
				)
		)
	}
}
impl Display for AuthState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Shared, thread-safe holder of the current [`AuthState`].
///
/// Clones observe the same state.
#[derive(Clone, Debug)]
pub struct Session(Arc<Mutex<AuthState>>);
impl Session {
	/// Current state.
	pub fn state(&self) -> AuthState {
		*self.0.lock()
	}

	/// Returns `true` once a verified credential is live.
	pub fn is_authenticated(&self) -> bool {
		self.state() == AuthState::Authenticated
	}

	/// Moves the session to `to`, rejecting transitions outside the lifecycle.
	pub fn transition(&self, to: AuthState) -> Result<AuthState> {
		let mut state = self.0.lock();
		let from = *state;

		if from == AuthState::Revoked {
			return Err(Error::SessionRevoked);
		}
		if !from.can_transition_to(to) {
			return Err(Error::InvalidTransition { from, to });
		}

		*state = to;

		drop(state);
		obs::record_transition(from, to);

		Ok(from)
	}

	/// Fails with [`Error::SessionRevoked`] while the session is revoked.
	pub fn ensure_live(&self) -> Result<()> {
		if self.state() == AuthState::Revoked { Err(Error::SessionRevoked) } else { Ok(()) }
	}

	/// Returns the session to `Unauthenticated` from any state, including `Revoked`.
	pub fn reset(&self) {
		let from = std::mem::replace(&mut *self.0.lock(), AuthState::Unauthenticated);

		obs::record_transition(from, AuthState::Unauthenticated);
	}

	/// Applies `to` when legal and otherwise leaves the state untouched.
	///
	/// Used on failure paths, where the original error must win over a transition error.
	pub(crate) fn settle(&self, to: AuthState) {
		let _ = self.transition(to);
	}
}
impl Default for Session {
	fn default() -> Self {
		Self(Arc::new(Mutex::new(AuthState::Unauthenticated)))
	}
}
