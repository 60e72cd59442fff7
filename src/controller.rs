//! Page controller: the cache-then-fetch decision engine.
//!
//! Owns what the user currently sees. An activation either serves fresh
//! cached items or makes exactly one `retrieve` call; linking success feeds
//! exchanged items back in. Every failure ends as a `Message`, never a panic
//! or an `Err` to the host.

use serde::Serialize;

use crate::cache::{KeyValueStore, RecurringCache};
use crate::error::{LinkError, GENERIC_FAILURE_MESSAGE};
use crate::gateway::{GatewayResponse, RecurringGateway};
use crate::link::{LinkLauncher, LinkOrchestrator};
use crate::normalizer::normalize_streams;
use crate::types::{RecurringItem, StreamScope};

pub const MISSING_IDENTITY_MESSAGE: &str =
    "We couldn't tell who you are. Open this page from your account link.";
pub const NO_ITEMS_MESSAGE: &str = "No recurring charges found for your linked accounts.";

/// What the host should render, in priority order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum DisplayState {
    Loading,
    Ready(Vec<RecurringItem>),
    /// A bank link is required; carries the connection token.
    NeedsLink(String),
    Message(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    Loading,
    NeedsLink(String),
    Message(String),
    Settled,
}

pub struct PageController<G, S> {
    gateway: G,
    cache: RecurringCache<S>,
    scope: StreamScope,
    link: LinkOrchestrator,
    identity: Option<String>,
    /// Last non-empty list shown. Survives link tokens and failures.
    items: Vec<RecurringItem>,
    phase: Phase,
}

impl<G, S> PageController<G, S>
where
    G: RecurringGateway,
    S: KeyValueStore,
{
    pub fn new(gateway: G, cache: RecurringCache<S>, scope: StreamScope) -> Self {
        Self {
            gateway,
            cache,
            scope,
            link: LinkOrchestrator::new(scope),
            identity: None,
            items: Vec::new(),
            phase: Phase::Idle,
        }
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn items(&self) -> &[RecurringItem] {
        &self.items
    }

    /// Connection token offered for a fresh link, if one is pending.
    pub fn pending_link_token(&self) -> Option<&str> {
        match &self.phase {
            Phase::NeedsLink(token) => Some(token),
            _ => None,
        }
    }

    /// Latest status message, even when a stale list still takes precedence.
    pub fn notice(&self) -> Option<&str> {
        match &self.phase {
            Phase::Message(text) => Some(text),
            _ => None,
        }
    }

    /// Current view: items, then link, then message, then loading.
    pub fn view(&self) -> DisplayState {
        if !self.items.is_empty() {
            return DisplayState::Ready(self.items.clone());
        }
        match &self.phase {
            Phase::NeedsLink(token) => DisplayState::NeedsLink(token.clone()),
            Phase::Message(text) => DisplayState::Message(text.clone()),
            Phase::Idle | Phase::Loading | Phase::Settled => DisplayState::Loading,
        }
    }

    /// Run one activation for `identity`.
    pub async fn activate(&mut self, identity: Option<&str>) -> DisplayState {
        // Identities are opaque: whitespace only decides blankness, never the key.
        let Some(identity) = identity.filter(|id| !id.trim().is_empty()) else {
            log::warn!("Activation without an identity");
            self.identity = None;
            self.items.clear();
            self.phase = Phase::Message(MISSING_IDENTITY_MESSAGE.to_string());
            return self.view();
        };

        if self.identity.as_deref() != Some(identity) {
            self.items.clear();
            self.identity = Some(identity.to_string());
        }

        if let Some(cached) = self.cache.read(identity).filter(|items| !items.is_empty()) {
            log::info!("Serving {} cached recurring items", cached.len());
            self.items = cached;
            self.phase = Phase::Settled;
            return self.view();
        }

        self.phase = Phase::Loading;
        let identity = identity.to_string();
        match self.gateway.retrieve(&identity).await {
            Ok(GatewayResponse::RecurringData(payload)) => {
                let items = normalize_streams(Some(&payload), self.scope);
                log::info!("Retrieved {} recurring items", items.len());
                self.accept_items(&identity, items);
            }
            Ok(GatewayResponse::LinkToken(token)) => {
                log::info!("Gateway requires a bank link");
                self.phase = Phase::NeedsLink(token);
            }
            Err(e) => {
                log::warn!("Recurring retrieve failed: {}", e);
                self.phase = Phase::Message(GENERIC_FAILURE_MESSAGE.to_string());
            }
        }
        self.view()
    }

    /// Items delivered by a successful link flow.
    pub fn link_succeeded(&mut self, items: Vec<RecurringItem>) -> DisplayState {
        match self.identity.clone() {
            Some(identity) => self.accept_items(&identity, items),
            None => self.phase = Phase::Message(MISSING_IDENTITY_MESSAGE.to_string()),
        }
        self.view()
    }

    /// A link flow or exchange failed. Items already shown stay shown.
    pub fn link_failed(&mut self, error: &LinkError) -> DisplayState {
        log::warn!("Bank link failed: {}", error);
        self.phase = Phase::Message(error.user_message().to_string());
        self.view()
    }

    /// Run the external link flow for the pending token and apply the result.
    pub async fn complete_link<L>(&mut self, launcher: &L) -> DisplayState
    where
        L: LinkLauncher + ?Sized,
    {
        let Some(identity) = self.identity.clone() else {
            return self.link_failed(&LinkError::MissingIdentity);
        };
        let Some(token) = self.pending_link_token().map(str::to_string) else {
            return self.link_failed(&LinkError::NoPendingLink);
        };

        match self.link.run(&self.gateway, launcher, &identity, &token).await {
            Ok(items) => self.link_succeeded(items),
            Err(e) => self.link_failed(&e),
        }
    }

    /// Exchange a one-time credential obtained outside [`complete_link`].
    ///
    /// [`complete_link`]: Self::complete_link
    pub async fn submit_credential(&mut self, public_token: &str) -> DisplayState {
        let Some(identity) = self.identity.clone() else {
            return self.link_failed(&LinkError::MissingIdentity);
        };

        match self.link.submit(&self.gateway, &identity, public_token).await {
            Ok(items) => self.link_succeeded(items),
            Err(e) => self.link_failed(&e),
        }
    }

    /// Set the identity without an activation, for hosts that only exchange.
    pub fn set_identity(&mut self, identity: &str) -> bool {
        if identity.trim().is_empty() {
            return false;
        }
        if self.identity.as_deref() != Some(identity) {
            self.items.clear();
            self.phase = Phase::Idle;
            self.identity = Some(identity.to_string());
        }
        true
    }

    fn accept_items(&mut self, identity: &str, items: Vec<RecurringItem>) {
        self.cache.write(identity, &items);
        self.phase = if items.is_empty() {
            Phase::Message(NO_ITEMS_MESSAGE.to_string())
        } else {
            Phase::Settled
        };
        self.items = items;
    }
}
