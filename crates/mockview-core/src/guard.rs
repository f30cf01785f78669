//! Access decision for routes that require a signed-in user.

use crate::auth::SessionState;
use crate::navigation::Route;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// Session still being resolved; show a loading indicator
    Pending,
    Allow,
    Redirect(Route),
}

pub struct RouteGuard;

impl RouteGuard {
    pub fn check(state: &SessionState) -> RouteAccess {
        match state {
            SessionState::Initializing | SessionState::Authenticating => RouteAccess::Pending,
            SessionState::Authenticated(_) => RouteAccess::Allow,
            SessionState::Unauthenticated | SessionState::LoggingOut => {
                RouteAccess::Redirect(Route::Login)
            }
        }
    }
}
