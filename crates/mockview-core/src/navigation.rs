//! Navigation capability used by the session layer.
//!
//! The core never drives a UI directly. Whenever a session ends or an
//! account is deleted it asks the embedding application to perform a full
//! navigation through a [`Navigator`].

use std::sync::{Mutex, PoisonError};

/// Entry points the session layer can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Signup,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Signup => "/signup",
        }
    }
}

pub trait Navigator: Send + Sync {
    /// Replace the current view with `route`, dropping any in-page state.
    fn navigate(&self, route: Route);
}

/// Remembers every navigation request, for tests and headless embedders.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<Route> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<Route> {
        self.visited().last().copied()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route);
    }
}
