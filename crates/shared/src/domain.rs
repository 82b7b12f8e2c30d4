use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ProfileId);

/// Stored and wire user ids are decimal strings.
impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.trim().parse::<i64>().map(Self)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub user_id: UserId,
}

impl Credentials {
    pub fn new(token: impl Into<String>, user_id: UserId) -> Self {
        Self {
            token: token.into(),
            user_id,
        }
    }
}

// Tokens stay out of logs and panic messages.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Whether the signed-in user has a profile on the server, as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileExistence {
    #[default]
    Unknown,
    Exists,
    Missing,
}

impl ProfileExistence {
    /// Decodes the persisted `profileExists` flag. Anything other than the two
    /// known values reads as `Unknown` so it gets re-verified.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("true") => Self::Exists,
            Some("false") => Self::Missing,
            _ => Self::Unknown,
        }
    }

    pub fn as_flag(self) -> Option<&'static str> {
        match self {
            Self::Exists => Some("true"),
            Self::Missing => Some("false"),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    NeedsProfile,
    Ready,
}

impl SessionState {
    /// `Ready` iff credentials and an existing profile, `NeedsProfile` iff
    /// credentials and a missing profile, `Unauthenticated` otherwise.
    pub fn derive(has_credentials: bool, existence: ProfileExistence) -> Self {
        match (has_credentials, existence) {
            (true, ProfileExistence::Exists) => Self::Ready,
            (true, ProfileExistence::Missing) => Self::NeedsProfile,
            _ => Self::Unauthenticated,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::NeedsProfile => "needs_profile",
            Self::Ready => "ready",
        };
        f.write_str(label)
    }
}
