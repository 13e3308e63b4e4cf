#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Today,
    Upcoming,
    Projects,
    Project(String),
}

impl Route {
    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Login | Route::Register)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login => "Sign in",
            Route::Register => "Register",
            Route::Today => "Today",
            Route::Upcoming => "Upcoming",
            Route::Projects | Route::Project(_) => "Projects",
        }
    }
}

/// Why the login view is being shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPrompt {
    /// No token on disk; the login form is shown without comment.
    SignIn,
    /// The server refused the stored token.
    Expired,
}

impl AuthPrompt {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            AuthPrompt::SignIn => None,
            AuthPrompt::Expired => Some("Your session has expired. Please sign in again."),
        }
    }
}

/// Where a visitor actually lands when asking for `route`.
///
/// Only the presence of a token is checked. Whether the server still accepts
/// it shows up on the next API call.
pub fn guard(route: Route, has_token: bool) -> Route {
    if route.is_protected() && !has_token {
        tracing::debug!(?route, "no token, redirecting to login");
        Route::Login
    } else {
        route
    }
}
