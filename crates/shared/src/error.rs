use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::ProfileField;

/// Error body the remote service attaches to rejected requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Failure of a single remote call, decoded once at the HTTP boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("resource not found")]
    NotFound,
    #[error("request not authorized (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("request rejected (HTTP {status}){}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status {
        status: u16,
        message: Option<String>,
    },
    #[error("server unreachable: {0}")]
    Unreachable(String),
    #[error("request timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            404 => Self::NotFound,
            401 | 403 => Self::Unauthorized { status },
            _ => Self::Status { status, message },
        }
    }

    /// Worth one more attempt for idempotent reads.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound => Some(404),
            Self::Unauthorized { status } | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("authentication service unreachable")]
    NetworkUnreachable,
    #[error("signed in, but the profile check failed: {0}")]
    ProfileCheckFailed(String),
    #[error("unexpected authentication failure: {0}")]
    Unknown(String),
    #[error("superseded by logout")]
    Cancelled,
    #[error("session store failure: {0}")]
    Storage(String),
}

impl AuthError {
    /// Maps a failed login/register call.
    pub fn from_remote(err: RemoteError) -> Self {
        match err {
            RemoteError::Unreachable(_) | RemoteError::Timeout => Self::NetworkUnreachable,
            RemoteError::NotFound => Self::InvalidCredentials("HTTP 404".to_string()),
            RemoteError::Unauthorized { status } => {
                Self::InvalidCredentials(format!("HTTP {status}"))
            }
            RemoteError::Status { status, message } if (400..500).contains(&status) => {
                Self::InvalidCredentials(message.unwrap_or_else(|| format!("HTTP {status}")))
            }
            other => Self::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("no active session")]
    NotAuthenticated,
    #[error("required field `{0}` is empty")]
    ValidationFailed(ProfileField),
    #[error("profile service rejected the request: {0}")]
    RemoteRejected(String),
    #[error("no profile exists for the signed-in user")]
    NoProfile,
    #[error("superseded by logout")]
    Cancelled,
    #[error("session store failure: {0}")]
    Storage(String),
}
