//! Error types for the gateway and the link flow.
//!
//! None of these escape the page controller: every variant ends up as a
//! `Message` view. `user_message()` is what the user sees; `Display` is what
//! gets logged.

use thiserror::Error;

/// Shown for any retrieve failure. Details go to the log, not the screen.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "We couldn't load your subscriptions right now. Please try again later.";

/// Errors from the remote aggregation gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Gateway returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected gateway response: {0}")]
    MalformedResponse(String),

    #[error("One-time credential rejected: {0}")]
    CredentialRejected(String),
}

impl GatewayError {
    /// Replaying or presenting a spent credential needs a fresh link flow.
    pub fn requires_relink(&self) -> bool {
        matches!(self, GatewayError::CredentialRejected(_))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            GatewayError::CredentialRejected(_) => {
                "That bank connection has already been used or expired. Please link your account again."
            }
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }
}

/// Errors from driving the external bank-linking flow.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Link flow exited before a bank was connected")]
    Exited,

    #[error("Link flow timed out after {0} seconds")]
    Timeout(u64),

    #[error("Credential was already submitted for exchange")]
    CredentialAlreadySubmitted,

    #[error("No link token is pending")]
    NoPendingLink,

    #[error("Missing identity")]
    MissingIdentity,

    #[error("Invalid link page URL: {0}")]
    InvalidLinkPage(String),

    #[error("Link callback IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Exchange failed: {0}")]
    Exchange(#[from] GatewayError),
}

impl LinkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            LinkError::Exited => "Bank linking was cancelled.",
            LinkError::Timeout(_) => "Bank linking took too long. Please try again.",
            LinkError::CredentialAlreadySubmitted => {
                "This bank connection was already submitted."
            }
            LinkError::NoPendingLink => "There is no bank link in progress.",
            LinkError::MissingIdentity => crate::controller::MISSING_IDENTITY_MESSAGE,
            LinkError::InvalidLinkPage(_) | LinkError::Io(_) => {
                "Bank linking failed. Please try again."
            }
            LinkError::Exchange(e) => {
                if e.requires_relink() {
                    e.user_message()
                } else {
                    "We couldn't finish connecting your bank. Please try again later."
                }
            }
        }
    }
}
