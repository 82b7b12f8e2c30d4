use std::sync::Arc;

use shared::domain::SessionState;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    CreateProfile,
    Home,
}

impl Route {
    pub fn for_state(state: SessionState) -> Self {
        match state {
            SessionState::Unauthenticated => Self::Login,
            SessionState::NeedsProfile => Self::CreateProfile,
            SessionState::Ready => Self::Home,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::CreateProfile => "/screens/CreateProfileScreen",
            Self::Home => "/",
        }
    }
}

/// Presentation-layer hook that shows the screen for a route.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Forwards every published session state to `navigator` until the
/// controller's sender is dropped.
pub fn spawn_navigator(
    mut states: broadcast::Receiver<SessionState>,
    navigator: Arc<dyn Navigator>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match states.recv().await {
                Ok(state) => {
                    let route = Route::for_state(state);
                    debug!("navigation: state={state} route={}", route.path());
                    navigator.navigate(route);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("navigation: skipped {skipped} stale session states");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
