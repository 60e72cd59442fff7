//! Browser-hosted bank-link flow.
//!
//! Opens the hosted link page with the connection token and a localhost
//! redirect, then waits for the page to redirect back with
//! `?public_token=...` (success) or `?error=...` (exit).

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::{LinkLauncher, LinkOutcome};
use crate::error::LinkError;

const CALLBACK_PATH: &str = "/callback";
/// How long an accepted connection may take to send its request line.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

pub struct BrowserLauncher {
    link_page_url: String,
    timeout: Duration,
}

impl BrowserLauncher {
    pub fn new(link_page_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            link_page_url: link_page_url.into(),
            timeout,
        }
    }

    /// Link page URL carrying the connection token and our redirect.
    pub fn authorize_url(&self, link_token: &str, redirect_uri: &str) -> Result<String, LinkError> {
        let url = url::Url::parse_with_params(
            &self.link_page_url,
            &[("link_token", link_token), ("redirect_uri", redirect_uri)],
        )
        .map_err(|e| LinkError::InvalidLinkPage(format!("{}: {}", self.link_page_url, e)))?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl LinkLauncher for BrowserLauncher {
    async fn launch(&self, link_token: &str) -> Result<LinkOutcome, LinkError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH);
        let url = self.authorize_url(link_token, &redirect_uri)?;

        log::info!("Opening browser for bank linking...");
        if let Err(e) = open::that(&url) {
            log::warn!("Failed to open browser: {}. URL: {}", e, url);
            eprintln!("Open this URL to link your bank:\n  {}", url);
        }

        let callback = wait_for_callback(&listener, REQUEST_READ_TIMEOUT);
        match tokio::time::timeout(self.timeout, callback).await {
            Ok(outcome) => outcome,
            Err(_) => Err(LinkError::Timeout(self.timeout.as_secs())),
        }
    }
}

/// Accept connections until one hits the callback path. Connections that
/// send nothing within `read_timeout` (browser preconnects) are dropped.
pub(crate) async fn wait_for_callback(
    listener: &TcpListener,
    read_timeout: Duration,
) -> Result<LinkOutcome, LinkError> {
    loop {
        let (mut stream, _) = listener.accept().await?;
        let read = tokio::time::timeout(read_timeout, read_request_target(&mut stream)).await;
        let target = match read {
            Ok(Ok(Some(target))) => target,
            Ok(Ok(None)) => continue,
            Ok(Err(e)) => {
                log::debug!("Ignoring unreadable link callback request: {}", e);
                continue;
            }
            Err(_) => {
                log::debug!("Dropping idle connection on the link callback listener");
                continue;
            }
        };

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => (target.clone(), String::new()),
        };

        if path != CALLBACK_PATH {
            send_response(&mut stream, "404 Not Found", "Not found.").await;
            continue;
        }

        let outcome = parse_callback_query(&query);
        let message = match &outcome {
            LinkOutcome::Success { .. } => {
                "Bank linked! You can close this tab and return to the terminal."
            }
            LinkOutcome::Exited => "Bank linking was cancelled. You can close this tab.",
        };
        send_response(&mut stream, "200 OK", message).await;
        return Ok(outcome);
    }
}

/// Interpret the callback query string.
pub(crate) fn parse_callback_query(query: &str) -> LinkOutcome {
    let mut public_token = None;
    let mut error = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "public_token" if !value.trim().is_empty() => public_token = Some(value.into_owned()),
            "error" | "error_code" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    match (public_token, error) {
        (Some(public_token), None) => LinkOutcome::Success { public_token },
        (_, Some(err)) => {
            log::warn!("Link flow reported an error: {}", err);
            LinkOutcome::Exited
        }
        (None, None) => LinkOutcome::Exited,
    }
}

/// Read the request line and return its target (`/path?query`).
async fn read_request_target(stream: &mut TcpStream) -> std::io::Result<Option<String>> {
    let mut buffer = [0u8; 4096];
    let n = stream.read(&mut buffer).await?;
    let request = String::from_utf8_lossy(&buffer[..n]);
    Ok(request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_string))
}

async fn send_response(stream: &mut TcpStream, status: &str, message: &str) {
    let body = format!(
        "<html><body style=\"font-family: system-ui; text-align: center; padding: 40px;\">\
         <h2>{}</h2></body></html>",
        message
    );
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.flush().await;
}
