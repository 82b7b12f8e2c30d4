use std::sync::Arc;

use anyhow::Result;
use shared::domain::{Credentials, ProfileExistence, UserId};
use storage::KeyValueStore;
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

pub const USER_TOKEN_KEY: &str = "userToken";
pub const USER_ID_KEY: &str = "userId";
pub const PROFILE_EXISTS_KEY: &str = "profileExists";

const SESSION_KEYS: [&str; 3] = [USER_TOKEN_KEY, USER_ID_KEY, PROFILE_EXISTS_KEY];

/// What the store currently says about the session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistedSession {
    pub credentials: Option<Credentials>,
    pub profile: ProfileExistence,
    /// Some session key is present but no usable credentials could be read.
    pub stray_entries: bool,
}

/// Sole reader/writer of the persisted session keys.
///
/// Writes are stamped with the generation they were computed under;
/// [`SessionRecord::invalidate`] bumps the generation, so a write prepared
/// before a logout is refused instead of resurrecting the session.
///
/// Successful commits hand back the generation guard. Whatever the caller
/// publishes while holding it is ordered before any later invalidation.
pub(crate) struct SessionRecord {
    store: Arc<dyn KeyValueStore>,
    generation: Mutex<u64>,
}

impl SessionRecord {
    pub(crate) fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            generation: Mutex::new(0),
        }
    }

    pub(crate) async fn generation(&self) -> u64 {
        *self.generation.lock().await
    }

    /// The generation guard, if `generation` is still current.
    pub(crate) async fn hold_current(&self, generation: u64) -> Option<MutexGuard<'_, u64>> {
        let guard = self.generation.lock().await;
        (*guard == generation).then_some(guard)
    }

    pub(crate) async fn load(&self) -> Result<PersistedSession> {
        let _guard = self.generation.lock().await;
        let token = self.store.get(USER_TOKEN_KEY).await?;
        let raw_user_id = self.store.get(USER_ID_KEY).await?;
        let flag = self.store.get(PROFILE_EXISTS_KEY).await?;

        let user_id = raw_user_id
            .as_deref()
            .and_then(|raw| match raw.parse::<UserId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!("session: stored user id is not numeric");
                    None
                }
            });
        let any_entry = token.is_some() || raw_user_id.is_some() || flag.is_some();
        let credentials = match (token, user_id) {
            (Some(token), Some(user_id)) if !token.is_empty() => {
                Some(Credentials::new(token, user_id))
            }
            _ => None,
        };
        let stray_entries = credentials.is_none() && any_entry;

        Ok(PersistedSession {
            credentials,
            profile: ProfileExistence::from_flag(flag.as_deref()),
            stray_entries,
        })
    }

    /// Writes credentials and the resolved profile flag in one store call.
    /// Returns `None` without writing if the session was invalidated since
    /// `generation` was read.
    pub(crate) async fn commit_login(
        &self,
        generation: u64,
        credentials: &Credentials,
        profile: ProfileExistence,
    ) -> Result<Option<MutexGuard<'_, u64>>> {
        let Some(guard) = self.hold_current(generation).await else {
            return Ok(None);
        };
        let user_id = credentials.user_id.to_string();
        let mut entries = vec![
            (USER_TOKEN_KEY, credentials.token.as_str()),
            (USER_ID_KEY, user_id.as_str()),
        ];
        match profile.as_flag() {
            Some(flag) => entries.push((PROFILE_EXISTS_KEY, flag)),
            None => self.store.remove(PROFILE_EXISTS_KEY).await?,
        }
        self.store.set_many(&entries).await?;
        Ok(Some(guard))
    }

    pub(crate) async fn commit_profile_existence(
        &self,
        generation: u64,
        profile: ProfileExistence,
    ) -> Result<Option<MutexGuard<'_, u64>>> {
        let Some(guard) = self.hold_current(generation).await else {
            return Ok(None);
        };
        match profile.as_flag() {
            Some(flag) => self.store.set(PROFILE_EXISTS_KEY, flag).await?,
            None => self.store.remove(PROFILE_EXISTS_KEY).await?,
        }
        Ok(Some(guard))
    }

    /// Ends the current generation and removes every session key. Idempotent.
    pub(crate) async fn invalidate(&self) -> Result<()> {
        let mut guard = self.generation.lock().await;
        *guard += 1;
        self.store.remove_many(&SESSION_KEYS).await
    }
}

#[cfg(test)]
#[path = "tests/record_tests.rs"]
mod tests;
