//! Bank-link flow orchestration.
//!
//! A [`LinkLauncher`] runs the external linking UI for a connection token and
//! reports the one-time credential it produced. The [`LinkOrchestrator`]
//! trades that credential for stream data exactly once and normalizes it.

pub mod browser;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::LinkError;
use crate::gateway::RecurringGateway;
use crate::normalizer::normalize_streams;
use crate::types::{RecurringItem, StreamScope};

pub use browser::BrowserLauncher;

/// How the external linking UI finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Success { public_token: String },
    /// User closed the flow or the institution errored out.
    Exited,
}

#[async_trait]
pub trait LinkLauncher: Send + Sync {
    async fn launch(&self, link_token: &str) -> Result<LinkOutcome, LinkError>;
}

/// Submits one-time credentials, refusing to send the same one twice.
#[derive(Debug, Default)]
pub struct LinkOrchestrator {
    scope: StreamScope,
    submitted: HashSet<String>,
}

impl LinkOrchestrator {
    pub fn new(scope: StreamScope) -> Self {
        Self {
            scope,
            submitted: HashSet::new(),
        }
    }

    pub fn was_submitted(&self, public_token: &str) -> bool {
        self.submitted.contains(public_token)
    }

    /// Launch the linking UI for `link_token`, then exchange its credential.
    pub async fn run<G, L>(
        &mut self,
        gateway: &G,
        launcher: &L,
        identity: &str,
        link_token: &str,
    ) -> Result<Vec<RecurringItem>, LinkError>
    where
        G: RecurringGateway + ?Sized,
        L: LinkLauncher + ?Sized,
    {
        match launcher.launch(link_token).await? {
            LinkOutcome::Success { public_token } => {
                self.submit(gateway, identity, &public_token).await
            }
            LinkOutcome::Exited => {
                log::info!("Link flow exited without connecting a bank");
                Err(LinkError::Exited)
            }
        }
    }

    /// Exchange `public_token` for items. A credential is sent at most once,
    /// whether or not the first exchange succeeded.
    pub async fn submit<G>(
        &mut self,
        gateway: &G,
        identity: &str,
        public_token: &str,
    ) -> Result<Vec<RecurringItem>, LinkError>
    where
        G: RecurringGateway + ?Sized,
    {
        if identity.trim().is_empty() {
            return Err(LinkError::MissingIdentity);
        }
        if !self.submitted.insert(public_token.to_string()) {
            log::warn!("Refusing to resubmit a one-time credential");
            return Err(LinkError::CredentialAlreadySubmitted);
        }

        let payload = gateway.exchange(identity, public_token).await?;
        let items = normalize_streams(Some(&payload), self.scope);
        log::info!("Exchange returned {} recurring items", items.len());
        Ok(items)
    }
}
