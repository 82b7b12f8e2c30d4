//! Session bootstrap for the profile directory client.
//!
//! [`SessionController`] decides whether the user lands on login, profile
//! creation or home, backed by a [`storage::KeyValueStore`] and the remote
//! auth/profile service behind [`ProfileApi`].

pub mod api;
pub mod navigation;
mod record;
pub mod session;

pub use api::{HttpProfileApi, ProfileApi, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
pub use navigation::{spawn_navigator, Navigator, Route};
pub use record::{PersistedSession, PROFILE_EXISTS_KEY, USER_ID_KEY, USER_TOKEN_KEY};
pub use session::{SessionConfig, SessionController};

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod api_tests;
