use crate::api::ApiClient;
use crate::config::AdConfig;
use crate::error::{ApiError, UpsellError};
use crate::models::{CheckoutSession, User};
use crate::session::Session;
use reqwest::Url;
use std::io;

const MARKER: &str = "upgrade";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsellState {
    Free,
    /// The user was sent to the billing provider and has not come back yet.
    CheckoutPending,
    Premium,
}

impl UpsellState {
    pub fn for_user(user: Option<&User>) -> Self {
        match user {
            Some(u) if u.is_premium => UpsellState::Premium,
            _ => UpsellState::Free,
        }
    }
}

/// How the billing provider sent the user back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutReturn {
    Success,
    Cancel,
}

impl CheckoutReturn {
    /// Looks for the `upgrade=success|cancel` marker in a return URL.
    pub fn from_url(url: &str) -> Option<Self> {
        let url = Url::parse(url).ok()?;
        let value = url
            .query_pairs()
            .find(|(key, _)| key == MARKER)
            .map(|(_, value)| value.into_owned())?;
        match value.as_str() {
            "success" => Some(CheckoutReturn::Success),
            "cancel" => Some(CheckoutReturn::Cancel),
            _ => None,
        }
    }
}

/// Removes the return marker and keeps every other query pair.
pub fn strip_marker(url: &str) -> String {
    let mut parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return url.to_string(),
    };
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != MARKER)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }
    parsed.to_string()
}

fn with_marker(return_url: &str, value: &str) -> String {
    let sep = if return_url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", return_url, sep, MARKER, value)
}

/// Opens checkout pages outside the terminal.
pub trait Browser {
    fn open(&self, url: &str) -> io::Result<()>;
}

pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        open::that_detached(url)
    }
}

#[derive(Debug)]
pub struct Upsell {
    state: UpsellState,
}

impl Upsell {
    pub fn new(user: Option<&User>) -> Self {
        Upsell {
            state: UpsellState::for_user(user),
        }
    }

    pub fn state(&self) -> UpsellState {
        self.state
    }

    /// Follows the cached user, except while a checkout is outstanding.
    pub fn sync(&mut self, user: Option<&User>) {
        let next = UpsellState::for_user(user);
        if self.state != UpsellState::CheckoutPending || next == UpsellState::Premium {
            self.state = next;
        }
    }

    /// Opens the checkout page the server handed out.
    ///
    /// Nothing is opened unless the session carries a non-empty URL; on any
    /// error the state stays `Free`.
    pub fn open_checkout(
        &mut self,
        session: CheckoutSession,
        browser: &dyn Browser,
    ) -> Result<String, UpsellError> {
        let url = session
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or(UpsellError::MissingUrl)?;

        browser.open(&url)?;
        tracing::info!(%url, "opened checkout");
        self.state = UpsellState::CheckoutPending;
        Ok(url)
    }

    /// Handles the user coming back from the billing provider.
    ///
    /// After a success return the profile should be re-read first so that
    /// `user` reflects the new subscription. A cancel keeps whatever the
    /// cached user already has.
    pub fn complete(&mut self, user: Option<&User>, ret: CheckoutReturn) -> UpsellState {
        self.state = UpsellState::for_user(user);
        tracing::info!(state = ?self.state, ?ret, "checkout finished");
        self.state
    }
}

/// Asks the server for a checkout session whose return URLs carry the
/// success and cancel markers.
pub async fn request_checkout(
    api: &ApiClient,
    return_url: &str,
) -> Result<CheckoutSession, ApiError> {
    let success = with_marker(return_url, "success");
    let cancel = with_marker(return_url, "cancel");
    api.subscription()
        .create_checkout_session(&success, &cancel)
        .await
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdBanner {
    Hidden,
    /// Ads are due but no ad client is configured.
    Placeholder,
    Slot { client: String, slot: String },
}

impl AdBanner {
    pub fn for_user(loading: bool, user: Option<&User>, ads: &AdConfig) -> Self {
        match user {
            _ if loading => AdBanner::Hidden,
            None => AdBanner::Hidden,
            Some(u) if u.is_premium => AdBanner::Hidden,
            Some(_) => match &ads.client {
                Some(client) => AdBanner::Slot {
                    client: client.clone(),
                    slot: ads.slot.clone(),
                },
                None => AdBanner::Placeholder,
            },
        }
    }

    pub fn for_session(session: &Session, ads: &AdConfig) -> Self {
        AdBanner::for_user(session.is_loading(), session.user(), ads)
    }
}
