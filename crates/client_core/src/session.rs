use std::{future::Future, sync::Arc, time::Duration};

use anyhow::Result;
use shared::{
    domain::{Credentials, ProfileExistence, SessionState},
    error::{AuthError, ProfileError, RemoteError},
    protocol::{
        CreateProfileRequest, LoginRequest, Profile, ProfileDraft, ProfileSummary,
        RegisterRequest,
    },
};
use storage::KeyValueStore;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use crate::{
    api::{ProfileApi, DEFAULT_REQUEST_TIMEOUT},
    record::{PersistedSession, SessionRecord},
};

const SESSION_EVENT_CAPACITY: usize = 64;
const DEFAULT_READ_RETRIES: u32 = 1;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on every remote call made by the controller.
    pub request_timeout: Duration,
    /// Extra attempts for idempotent reads that failed transiently.
    pub read_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            read_retries: DEFAULT_READ_RETRIES,
        }
    }
}

/// Decides which destination the user is routed to, from persisted session
/// data plus a live profile check when needed.
///
/// `resume`, `login`, `create_profile` and the profile reads run one at a
/// time. `logout` never waits for them: it ends the session generation
/// immediately and whatever was in flight is discarded when it tries to
/// commit.
pub struct SessionController {
    api: Arc<dyn ProfileApi>,
    record: SessionRecord,
    config: SessionConfig,
    op_lock: Mutex<()>,
    events: broadcast::Sender<SessionState>,
}

impl SessionController {
    pub fn new(api: Arc<dyn ProfileApi>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(api, store, SessionConfig::default())
    }

    pub fn with_config(
        api: Arc<dyn ProfileApi>,
        store: Arc<dyn KeyValueStore>,
        config: SessionConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            api,
            record: SessionRecord::new(store),
            config,
            op_lock: Mutex::new(()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionState> {
        self.events.subscribe()
    }

    pub async fn persisted(&self) -> Result<PersistedSession> {
        self.record.load().await
    }

    /// Re-derives the session state. Call on cold start and whenever the app
    /// regains focus.
    pub async fn resume(&self) -> SessionState {
        let _op = self.op_lock.lock().await;
        let generation = self.record.generation().await;

        let persisted = match self.record.load().await {
            Ok(persisted) => persisted,
            Err(err) => {
                error!("session: resume could not read session record: {err:#}");
                return self.reset("unreadable session record").await;
            }
        };

        let Some(credentials) = persisted.credentials else {
            if persisted.stray_entries {
                return self.reset("incomplete credentials").await;
            }
            return self.publish(SessionState::Unauthenticated);
        };

        if persisted.profile == ProfileExistence::Missing {
            let Some(_current) = self.record.hold_current(generation).await else {
                return SessionState::Unauthenticated;
            };
            return self.publish(SessionState::NeedsProfile);
        }

        let resolved = match self.verify_profile(&credentials).await {
            Ok(()) => ProfileExistence::Exists,
            Err(RemoteError::NotFound) => ProfileExistence::Missing,
            Err(err) if err.is_transient() && persisted.profile == ProfileExistence::Exists => {
                warn!(
                    "session: profile check failed transiently, trusting cached flag user_id={} err={err}",
                    credentials.user_id
                );
                ProfileExistence::Exists
            }
            Err(err) => {
                warn!(
                    "session: profile check failed, ending session user_id={} err={err}",
                    credentials.user_id
                );
                return self.reset("profile check failed on resume").await;
            }
        };

        let current = if resolved == persisted.profile {
            self.record.hold_current(generation).await
        } else {
            match self
                .record
                .commit_profile_existence(generation, resolved)
                .await
            {
                Ok(current) => current,
                Err(err) => {
                    error!("session: failed to persist profile flag: {err:#}");
                    return self.reset("unwritable session record").await;
                }
            }
        };
        let Some(_current) = current else {
            info!("session: discarding resume overtaken by logout");
            return SessionState::Unauthenticated;
        };

        let state = SessionState::derive(true, resolved);
        info!(
            "session: resumed state={state} user_id={}",
            credentials.user_id
        );
        self.publish(state)
    }

    /// Authenticates, checks for the user's profile and persists both results
    /// together. Nothing is written unless the profile check resolved.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionState, AuthError> {
        let _op = self.op_lock.lock().await;
        let generation = self.record.generation().await;

        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "email and password are required".to_string(),
            ));
        }

        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let response = self
            .bounded(self.api.login(&request))
            .await
            .map_err(|err| {
                warn!("session: login rejected err={err}");
                AuthError::from_remote(err)
            })?;
        let Some((token, user_id)) = response.credentials() else {
            return Err(AuthError::Unknown(
                "login response is missing a token or user id".to_string(),
            ));
        };
        let credentials = Credentials::new(token, user_id);

        let existence = match self.verify_profile(&credentials).await {
            Ok(()) => ProfileExistence::Exists,
            Err(RemoteError::NotFound) => ProfileExistence::Missing,
            Err(err) => {
                warn!("session: profile check after login failed user_id={user_id} err={err}");
                return Err(AuthError::ProfileCheckFailed(err.to_string()));
            }
        };

        let _committed = match self
            .record
            .commit_login(generation, &credentials, existence)
            .await
        {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                info!("session: discarding login completed after logout user_id={user_id}");
                return Err(AuthError::Cancelled);
            }
            Err(err) => return Err(AuthError::Storage(format!("{err:#}"))),
        };

        let state = SessionState::derive(true, existence);
        info!("session: login ok state={state} user_id={user_id}");
        Ok(self.publish(state))
    }

    /// Creates an account. Does not sign in.
    pub async fn register(&self, email: &str, password: &str) -> Result<(), AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "email and password are required".to_string(),
            ));
        }
        let request = RegisterRequest::new(email.trim(), password);
        self.bounded(self.api.register(&request))
            .await
            .map_err(|err| {
                warn!("session: registration rejected err={err}");
                AuthError::from_remote(err)
            })?;
        info!("session: account registered");
        Ok(())
    }

    pub async fn create_profile(&self, draft: ProfileDraft) -> Result<SessionState, ProfileError> {
        let _op = self.op_lock.lock().await;
        let generation = self.record.generation().await;
        let credentials = self.active_credentials().await?;

        draft.validate()?;

        let request = CreateProfileRequest::new(draft, credentials.user_id);
        self.bounded(self.api.create_profile(&credentials.token, &request))
            .await
            .map_err(|err| {
                warn!(
                    "session: profile creation rejected user_id={} err={err}",
                    credentials.user_id
                );
                ProfileError::RemoteRejected(err.to_string())
            })?;

        let _committed = match self
            .record
            .commit_profile_existence(generation, ProfileExistence::Exists)
            .await
        {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                info!(
                    "session: discarding profile creation completed after logout user_id={}",
                    credentials.user_id
                );
                return Err(ProfileError::Cancelled);
            }
            Err(err) => return Err(ProfileError::Storage(format!("{err:#}"))),
        };

        info!("session: profile created user_id={}", credentials.user_id);
        Ok(self.publish(SessionState::Ready))
    }

    /// The signed-in user's own profile.
    pub async fn current_profile(&self) -> Result<Profile, ProfileError> {
        let _op = self.op_lock.lock().await;
        let generation = self.record.generation().await;
        let credentials = self.active_credentials().await?;

        let (user_id, token) = (credentials.user_id, credentials.token.as_str());
        let result = self
            .read_with_retry(move || self.api.fetch_profile(user_id, token))
            .await;
        match result {
            Ok(_) if self.record.generation().await != generation => Err(ProfileError::Cancelled),
            Ok(profile) => Ok(profile),
            Err(RemoteError::NotFound) => {
                match self
                    .record
                    .commit_profile_existence(generation, ProfileExistence::Missing)
                    .await
                {
                    Ok(Some(_committed)) => {
                        self.publish(SessionState::NeedsProfile);
                        Err(ProfileError::NoProfile)
                    }
                    Ok(None) => Err(ProfileError::Cancelled),
                    Err(err) => Err(ProfileError::Storage(format!("{err:#}"))),
                }
            }
            Err(err) => Err(self.read_failure(err).await),
        }
    }

    /// Profiles other users have made public.
    pub async fn public_profiles(&self) -> Result<Vec<ProfileSummary>, ProfileError> {
        let _op = self.op_lock.lock().await;
        let credentials = self.active_credentials().await?;

        let token = credentials.token.as_str();
        match self
            .read_with_retry(move || self.api.list_public_profiles(token))
            .await
        {
            Ok(profiles) => Ok(profiles),
            Err(err) => Err(self.read_failure(err).await),
        }
    }

    /// Clears the session unconditionally. Every state published by an
    /// operation that committed before this call is delivered before the
    /// `Unauthenticated` published here. Safe to call when already signed
    /// out.
    pub async fn logout(&self) -> SessionState {
        if let Err(err) = self.record.invalidate().await {
            error!("session: failed to clear session record: {err:#}");
        }
        info!("session: logged out");
        self.publish(SessionState::Unauthenticated)
    }

    async fn reset(&self, reason: &str) -> SessionState {
        warn!("session: resetting session reason={reason}");
        self.logout().await
    }

    async fn active_credentials(&self) -> Result<Credentials, ProfileError> {
        let persisted = self
            .record
            .load()
            .await
            .map_err(|err| ProfileError::Storage(format!("{err:#}")))?;
        persisted.credentials.ok_or(ProfileError::NotAuthenticated)
    }

    async fn verify_profile(&self, credentials: &Credentials) -> Result<(), RemoteError> {
        let (user_id, token) = (credentials.user_id, credentials.token.as_str());
        self.read_with_retry(move || self.api.profile_exists(user_id, token))
            .await
    }

    /// Rejected tokens end the session; anything else is reported as-is.
    async fn read_failure(&self, err: RemoteError) -> ProfileError {
        if err.is_auth_rejection() {
            self.reset("token rejected").await;
            return ProfileError::NotAuthenticated;
        }
        ProfileError::RemoteRejected(err.to_string())
    }

    async fn read_with_retry<T, F, Fut>(&self, mut call: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 0;
        loop {
            match self.bounded(call()).await {
                Err(err) if err.is_transient() && attempt < self.config.read_retries => {
                    attempt += 1;
                    warn!("session: retrying read attempt={attempt} err={err}");
                }
                result => return result,
            }
        }
    }

    async fn bounded<T, Fut>(&self, call: Fut) -> Result<T, RemoteError>
    where
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        tokio::time::timeout(self.config.request_timeout, call)
            .await
            .unwrap_or(Err(RemoteError::Timeout))
    }

    fn publish(&self, state: SessionState) -> SessionState {
        let _ = self.events.send(state);
        state
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
