//! Emulated authentication state.
//!
//! [`AuthClient`] holds the current principal and session, an optional
//! standing error, the live subscriber list and a script of state-change
//! events. It has two states, anonymous and authenticated:
//!
//! - configuration (`set_principal`, `set_error`, `script_event`) writes
//!   silently and never notifies;
//! - [`sign_out`](AuthClient::sign_out) moves to anonymous and notifies every
//!   live subscriber synchronously;
//! - every new subscriber gets the **whole** script replayed to it, one
//!   scheduled delivery per event, after the configured replay delay (zero
//!   by default, i.e. the next scheduler tick).
//!
//! Unsubscribing removes the callback from the live list only. Replays that
//! were already scheduled for it still run.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::EmulatorError;
use crate::response::Response;
use crate::scheduler::Scheduler;
use crate::sync::lock;

/// Identifier of an auth state subscription.
pub type SubscriptionId = Uuid;

/// Callback invoked on auth state changes.
pub type AuthCallback = Arc<dyn Fn(AuthChangeEvent, Option<Session>) + Send + Sync>;

// ── Principal and session ───────────────────────────────────────────

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct User {
    /// Stable user id.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Contact email, if known.
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Authorization role, e.g. `authenticated`.
    pub role: Option<String>,
    /// Free-form profile data.
    #[serde(default)]
    pub user_metadata: Value,
}

impl User {
    /// Create a user with the given id and no other attributes.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set the contact email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Replace the profile metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.user_metadata = metadata;
        self
    }
}

/// A session issued to a [`User`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token presented on requests.
    pub access_token: String,
    /// Token exchanged for a new session.
    pub refresh_token: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: u64,
    /// Token scheme, normally `bearer`.
    pub token_type: String,
    /// The principal this session belongs to.
    pub user: User,
}

impl Session {
    /// Create a one-hour bearer session for `user` with random tokens.
    pub fn new(user: User) -> Self {
        Self {
            access_token: format!("emulated-access-{}", Uuid::new_v4()),
            refresh_token: format!("emulated-refresh-{}", Uuid::new_v4()),
            expires_in: 3600,
            token_type: "bearer".to_owned(),
            user,
        }
    }

    /// Replace the access token.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = token.into();
        self
    }
}

/// Auth state change kinds, named as the emulated client names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    /// The session known when a listener attaches.
    InitialSession,
    /// A principal signed in.
    SignedIn,
    /// The principal signed out.
    SignedOut,
    /// The access token was renewed.
    TokenRefreshed,
    /// Principal attributes changed.
    UserUpdated,
    /// A password recovery link was followed.
    PasswordRecovery,
}

impl fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        })
    }
}

// ── Shared state ────────────────────────────────────────────────────

#[derive(Default)]
struct AuthState {
    user: Option<User>,
    session: Option<Session>,
    error: Option<EmulatorError>,
    scripted: Vec<(AuthChangeEvent, Option<Session>)>,
    subscribers: Vec<(SubscriptionId, AuthCallback)>,
}

// ── Client ──────────────────────────────────────────────────────────

/// The `auth` namespace of the emulated client.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct AuthClient {
    state: Arc<Mutex<AuthState>>,
    scheduler: Arc<dyn Scheduler>,
    replay_delay: Duration,
}

impl AuthClient {
    pub(crate) fn new(scheduler: Arc<dyn Scheduler>, replay_delay: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(AuthState::default())),
            scheduler,
            replay_delay,
        }
    }

    /// The current session, alongside the standing auth error if any.
    pub async fn get_session(&self) -> Response<Session> {
        let state = lock(&self.state);
        Response {
            data: state.session.clone(),
            error: state.error.clone(),
        }
    }

    /// The current principal, alongside the standing auth error if any.
    pub async fn get_user(&self) -> Response<User> {
        let state = lock(&self.state);
        Response {
            data: state.user.clone(),
            error: state.error.clone(),
        }
    }

    /// Clear the principal and session, then notify every live subscriber
    /// with [`AuthChangeEvent::SignedOut`] before returning.
    pub async fn sign_out(&self) -> Response<()> {
        let subscribers: Vec<AuthCallback> = {
            let mut state = lock(&self.state);
            state.user = None;
            state.session = None;
            state.subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        debug!(subscribers = subscribers.len(), "signed out; notifying subscribers");
        for callback in subscribers {
            callback(AuthChangeEvent::SignedOut, None);
        }
        Response::empty()
    }

    /// Register `callback` for auth state changes and schedule a replay of
    /// every scripted event to it.
    pub fn on_auth_state_change<F>(&self, callback: F) -> AuthSubscription
    where
        F: Fn(AuthChangeEvent, Option<Session>) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        let callback: AuthCallback = Arc::new(callback);
        let script = {
            let mut state = lock(&self.state);
            state.subscribers.push((id, Arc::clone(&callback)));
            state.scripted.clone()
        };
        debug!(%id, replays = script.len(), "auth subscriber registered");

        for (event, session) in script {
            let callback = Arc::clone(&callback);
            self.scheduler.schedule(
                self.replay_delay,
                Box::new(move || callback(event, session)),
            );
        }

        AuthSubscription {
            id,
            state: Arc::downgrade(&self.state),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.state).subscribers.len()
    }

    // ── Unsupported credential flows ────────────────────────────────
    //
    // Each returns `NotConfigured`; tests set the principal directly.

    /// Password sign-in. Not emulated.
    pub async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Response<Session> {
        not_configured("sign_in_with_password")
    }

    /// One-time-password sign-in. Not emulated.
    pub async fn sign_in_with_otp(&self, _email: &str) -> Response<()> {
        not_configured("sign_in_with_otp")
    }

    /// Account creation. Not emulated.
    pub async fn sign_up(&self, _email: &str, _password: &str) -> Response<Session> {
        not_configured("sign_up")
    }

    /// Password reset email. Not emulated.
    pub async fn reset_password_for_email(&self, _email: &str) -> Response<()> {
        not_configured("reset_password_for_email")
    }

    /// Principal attribute update. Not emulated.
    pub async fn update_user(&self, _attributes: Value) -> Response<User> {
        not_configured("update_user")
    }

    /// Session refresh. Not emulated.
    pub async fn refresh_session(&self) -> Response<Session> {
        not_configured("refresh_session")
    }

    // ── Configuration ───────────────────────────────────────────────

    /// Set the principal and session without notifying anyone.
    pub fn set_principal(&self, user: Option<User>, session: Option<Session>) {
        let mut state = lock(&self.state);
        state.user = user;
        state.session = session;
    }

    /// Install (`Some`) or clear (`None`) the standing auth error.
    pub fn set_error(&self, error: Option<EmulatorError>) {
        lock(&self.state).error = error;
    }

    /// Append an event to the script replayed to every new subscriber.
    pub fn script_event(&self, event: AuthChangeEvent, session: Option<Session>) {
        lock(&self.state).scripted.push((event, session));
    }
}

fn not_configured<T>(action: &str) -> Response<T> {
    debug!(action, "unsupported auth flow invoked");
    Response::err(EmulatorError::NotConfigured {
        action: action.to_owned(),
    })
}

impl fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("AuthClient")
            .field("authenticated", &state.session.is_some())
            .field("subscribers", &state.subscribers.len())
            .field("scripted", &state.scripted.len())
            .field("replay_delay", &self.replay_delay)
            .finish()
    }
}

/// Handle returned by [`AuthClient::on_auth_state_change`].
///
/// Dropping the handle does **not** unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe).
#[derive(Debug, Clone)]
pub struct AuthSubscription {
    id: SubscriptionId,
    state: Weak<Mutex<AuthState>>,
}

impl AuthSubscription {
    /// Id of this subscription.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the callback from the live subscriber list. Replays already
    /// scheduled for it are not cancelled.
    pub fn unsubscribe(&self) {
        if let Some(state) = self.state.upgrade() {
            lock(&state).subscribers.retain(|(id, _)| *id != self.id);
            debug!(id = %self.id, "auth subscriber removed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::schedulers::ManualScheduler;
    use tokio_test::block_on;

    type Log = Arc<Mutex<Vec<(AuthChangeEvent, Option<String>)>>>;

    fn client() -> (AuthClient, ManualScheduler) {
        let scheduler = ManualScheduler::new();
        let auth = AuthClient::new(Arc::new(scheduler.clone()), Duration::ZERO);
        (auth, scheduler)
    }

    fn recorder(log: &Log) -> impl Fn(AuthChangeEvent, Option<Session>) + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |event, session| {
            log.lock()
                .unwrap()
                .push((event, session.map(|s| s.user.id)));
        }
    }

    fn session(id: &str) -> Session {
        Session::new(User::new(id))
    }

    #[test]
    fn configuration_is_silent() {
        let (auth, scheduler) = client();
        let log: Log = Arc::default();
        let _sub = auth.on_auth_state_change(recorder(&log));

        auth.set_principal(Some(User::new("u1")), Some(session("u1")));
        scheduler.run_until_idle();
        assert!(log.lock().unwrap().is_empty());

        let res = block_on(auth.get_user());
        assert_eq!(res.data.unwrap().id, "u1");
    }

    #[test]
    fn get_session_returns_data_and_standing_error() {
        let (auth, _) = client();
        auth.set_principal(None, Some(session("u1")));
        auth.set_error(Some(EmulatorError::injected("expired")));

        let res = block_on(auth.get_session());
        assert_eq!(res.data.unwrap().user.id, "u1");
        assert_eq!(res.error.unwrap().to_string(), "expired");
    }

    #[test]
    fn sign_out_notifies_synchronously() {
        let (auth, scheduler) = client();
        let log: Log = Arc::default();
        auth.set_principal(Some(User::new("u1")), Some(session("u1")));
        let _sub = auth.on_auth_state_change(recorder(&log));

        let res = block_on(auth.sign_out());
        assert!(res.error.is_none());
        assert_eq!(*log.lock().unwrap(), vec![(AuthChangeEvent::SignedOut, None)]);
        assert_eq!(scheduler.pending(), 0);
        assert!(block_on(auth.get_session()).data.is_none());
        assert!(block_on(auth.get_user()).data.is_none());
    }

    #[test]
    fn replay_is_deferred_to_next_tick() {
        let (auth, scheduler) = client();
        auth.script_event(AuthChangeEvent::SignedIn, Some(session("u1")));
        let log: Log = Arc::default();
        let _sub = auth.on_auth_state_change(recorder(&log));

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec![(AuthChangeEvent::SignedIn, Some("u1".to_owned()))]
        );
    }

    #[test]
    fn unsubscribed_callbacks_miss_sign_out() {
        let (auth, _) = client();
        let log: Log = Arc::default();
        let sub = auth.on_auth_state_change(recorder(&log));
        assert_eq!(auth.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(auth.subscriber_count(), 0);

        block_on(auth.sign_out());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn credential_flows_are_not_configured() {
        let (auth, _) = client();
        let res = block_on(auth.sign_in_with_password("a@b.c", "pw"));
        assert_eq!(
            res.error,
            Some(EmulatorError::NotConfigured {
                action: "sign_in_with_password".into()
            })
        );
        assert!(block_on(auth.sign_up("a@b.c", "pw")).is_err());
        assert!(block_on(auth.sign_in_with_otp("a@b.c")).is_err());
        assert!(block_on(auth.reset_password_for_email("a@b.c")).is_err());
        assert!(block_on(auth.update_user(Value::Null)).is_err());
        assert!(block_on(auth.refresh_session()).is_err());
    }

    #[test]
    fn event_names_match_wire_format() {
        assert_eq!(AuthChangeEvent::SignedOut.to_string(), "SIGNED_OUT");
        assert_eq!(
            serde_json::to_string(&AuthChangeEvent::TokenRefreshed).unwrap(),
            "\"TOKEN_REFRESHED\""
        );
    }

    #[test]
    fn user_round_trips_through_json() {
        let user = User::new("u1")
            .with_email("u1@example.com")
            .with_role("admin")
            .with_metadata(serde_json::json!({"name": "One"}));
        let parsed: User = serde_json::from_value(serde_json::to_value(&user).unwrap()).unwrap();
        assert_eq!(parsed, user);
    }
}
