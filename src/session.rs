use crate::api::ApiClient;
use crate::error::{ApiError, SessionError};
use crate::models::{AuthResponse, User};
use keyring::Entry;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const KEYRING_SERVICE: &str = "todo-tui";
const KEYRING_USER: &str = "token";

/// The single slot holding the bearer token.
pub enum TokenStore {
    /// The platform secret store, used unless a token file is configured.
    Keyring(Entry),
    File(PathBuf),
}

impl TokenStore {
    pub fn keyring() -> Result<Self, SessionError> {
        Ok(TokenStore::Keyring(Entry::new(KEYRING_SERVICE, KEYRING_USER)?))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        TokenStore::File(path.into())
    }

    pub fn load(&self) -> Option<String> {
        let token = match self {
            TokenStore::Keyring(entry) => match entry.get_password() {
                Ok(token) => token,
                Err(keyring::Error::NoEntry) => return None,
                Err(err) => {
                    tracing::warn!(error = %err, "could not read token from keyring");
                    return None;
                }
            },
            TokenStore::File(path) => fs::read_to_string(path).ok()?,
        };
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }

    pub fn save(&self, token: &str) -> Result<(), SessionError> {
        match self {
            TokenStore::Keyring(entry) => entry.set_password(token)?,
            TokenStore::File(path) => write_private(path, token)?,
        }
        Ok(())
    }

    /// Removes the token. Clearing an empty slot is not an error.
    pub fn clear(&self) -> Result<(), SessionError> {
        match self {
            TokenStore::Keyring(entry) => match entry.delete_password() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(err) => return Err(err.into()),
            },
            TokenStore::File(path) => match fs::remove_file(path) {
                Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err.into()),
                _ => {}
            },
        }
        Ok(())
    }
}

impl fmt::Display for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenStore::Keyring(_) => write!(f, "keyring {}/{}", KEYRING_SERVICE, KEYRING_USER),
            TokenStore::File(path) => write!(f, "{}", path.display()),
        }
    }
}

// Owner read/write only; the file holds a bearer credential.
fn write_private(path: &Path, token: &str) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        if path.exists() {
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
    }
    let mut file = options.open(path)?;
    file.write_all(token.as_bytes())
}

/// Result of [`Session::load`] and [`Session::apply_profile`].
#[derive(Debug)]
pub enum LoadOutcome {
    /// No token was stored; no request was made.
    Anonymous,
    Authenticated,
    /// The server rejected the stored token.
    Rejected(ApiError),
    /// The profile could not be fetched for any other reason.
    Unreachable(ApiError),
}

impl LoadOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, LoadOutcome::Authenticated)
    }
}

/// The signed-in user and the client that acts on their behalf.
///
/// Created once at startup and handed to the app. Later profile reads run in
/// the background and come back through [`Session::apply_profile`].
pub struct Session {
    api: ApiClient,
    store: TokenStore,
    user: Option<User>,
    loading: bool,
}

impl Session {
    pub fn new(mut api: ApiClient, store: TokenStore) -> Self {
        api.clear_token();
        Session {
            api,
            store,
            user: None,
            loading: true,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether a token was found or issued. A token the server refused
    /// still counts until logout.
    pub fn has_token(&self) -> bool {
        self.api.token().is_some()
    }

    pub fn is_premium(&self) -> bool {
        self.user.as_ref().map(|u| u.is_premium).unwrap_or(false)
    }

    /// Reads the stored token and, if there is one, fetches the profile.
    ///
    /// A failed fetch leaves the token in place; only [`Session::logout`]
    /// removes it.
    pub async fn load(&mut self) -> LoadOutcome {
        match self.store.load() {
            Some(token) => {
                self.api.set_token(token);
                self.fetch_user().await
            }
            None => {
                self.api.clear_token();
                self.user = None;
                self.loading = false;
                LoadOutcome::Anonymous
            }
        }
    }

    async fn fetch_user(&mut self) -> LoadOutcome {
        self.loading = true;
        let result = self.api.user().me().await;
        self.apply_profile(result)
    }

    /// Starts a background profile fetch: marks the session as loading and
    /// hands out a client carrying the current token. `None` when signed out.
    pub fn begin_refresh(&mut self) -> Option<ApiClient> {
        self.api.token()?;
        self.loading = true;
        Some(self.api.clone())
    }

    /// Caches the result of a `/me` call. A failure keeps the token.
    pub fn apply_profile(&mut self, result: Result<User, ApiError>) -> LoadOutcome {
        let outcome = match result {
            Ok(user) => {
                tracing::info!(user = %user.email, premium = user.is_premium, "session loaded");
                self.user = Some(user);
                LoadOutcome::Authenticated
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not load user profile");
                self.user = None;
                if err.is_unauthorized() {
                    LoadOutcome::Rejected(err)
                } else {
                    LoadOutcome::Unreachable(err)
                }
            }
        };
        self.loading = false;
        outcome
    }

    /// Stores the token from an auth response and caches its user.
    pub fn sign_in(&mut self, auth: AuthResponse) -> Result<&User, SessionError> {
        self.store.save(&auth.token)?;
        self.api.set_token(auth.token);
        self.loading = false;
        let user = self.user.insert(auth.user);
        Ok(&*user)
    }

    /// Drops the cached user after the server refused the token. The token
    /// itself stays stored.
    pub fn forget_user(&mut self) {
        self.user = None;
        self.loading = false;
    }

    /// Forgets the token and the cached user. Navigation is up to the caller.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        self.store.clear()?;
        self.api.clear_token();
        self.user = None;
        self.loading = false;
        tracing::info!("logged out");
        Ok(())
    }
}
