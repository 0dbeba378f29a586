//! Route table and authentication guard.
//!
//! The guard only asks the credential provider whether somebody is signed
//! in; it never looks at the album store.

use crate::auth::CredentialProvider;

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const ABOUT_PATH: &str = "/about";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub name: String,
    pub requires_auth: bool,
}

impl Route {
    pub fn new(path: &str, name: &str) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
            requires_auth: false,
        }
    }

    pub fn protected(path: &str, name: &str) -> Self {
        Self {
            requires_auth: true,
            ..Self::new(path, name)
        }
    }
}

/// Outcome of resolving a path through the guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation<'a> {
    Proceed(&'a Route),
    Redirect { to: String },
    NotFound,
}

pub struct Router {
    routes: Vec<Route>,
    login_path: String,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(
            vec![
                Route::protected(HOME_PATH, "home"),
                Route::new(LOGIN_PATH, "login"),
                Route::new(ABOUT_PATH, "about"),
            ],
            LOGIN_PATH,
        )
    }
}

impl Router {
    pub fn new(routes: Vec<Route>, login_path: &str) -> Self {
        Self {
            routes,
            login_path: login_path.to_string(),
        }
    }

    pub fn find(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.path == path)
    }

    /// Decide whether navigation to `path` may proceed
    pub fn resolve(&self, path: &str, credentials: &dyn CredentialProvider) -> Navigation<'_> {
        let Some(route) = self.find(path) else {
            return Navigation::NotFound;
        };

        if route.requires_auth && credentials.current_principal().is_none() {
            tracing::debug!("Route {} requires auth, redirecting to {}", route.name, self.login_path);
            return Navigation::Redirect {
                to: self.login_path.clone(),
            };
        }

        Navigation::Proceed(route)
    }
}
