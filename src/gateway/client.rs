//! HTTP client for the aggregation gateway.
//!
//! Plain reqwest POSTs with JSON bodies. No retries: a failed call is reported
//! once and the user re-triggers it.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{
    classify_exchange_failure, parse_envelope, GatewayResponse, RecurringGateway,
};
use crate::error::GatewayError;
use crate::types::Config;

pub struct HttpGateway {
    client: reqwest::Client,
    retrieve_url: String,
    exchange_url: String,
}

impl HttpGateway {
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            retrieve_url: config.retrieve_url(),
            exchange_url: config.exchange_url(),
        })
    }

    async fn post(&self, url: &str, body: &Value) -> Result<(u16, String), GatewayError> {
        let resp = self.client.post(url).json(body).send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        Ok((status, text))
    }
}

fn parse_body(text: &str) -> Result<GatewayResponse, GatewayError> {
    let json: Value = serde_json::from_str(text)
        .map_err(|e| GatewayError::MalformedResponse(format!("invalid JSON: {}", e)))?;
    parse_envelope(&json)
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[async_trait]
impl RecurringGateway for HttpGateway {
    async fn retrieve(&self, identity: &str) -> Result<GatewayResponse, GatewayError> {
        log::debug!("gateway retrieve for {}", identity);
        let body = serde_json::json!({ "userId": identity });
        let (status, text) = self.post(&self.retrieve_url, &body).await?;

        if !is_success(status) {
            return Err(GatewayError::Status { status, body: text });
        }
        parse_body(&text)
    }

    async fn exchange(&self, identity: &str, public_token: &str) -> Result<Value, GatewayError> {
        log::debug!("gateway exchange for {}", identity);
        let body = serde_json::json!({ "publicToken": public_token, "userId": identity });
        let (status, text) = self.post(&self.exchange_url, &body).await?;

        if !is_success(status) {
            return Err(classify_exchange_failure(status, &text));
        }
        match parse_body(&text)? {
            GatewayResponse::RecurringData(data) => Ok(data),
            GatewayResponse::LinkToken(_) => Err(GatewayError::MalformedResponse(
                "exchange answered with a link token".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve exactly one HTTP response and hand back the request body.
    async fn one_shot_server(status: u16, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let request_body = loop {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break String::new();
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let headers = text[..split].to_ascii_lowercase();
                    let len = headers
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    let body = &text[split + 4..];
                    if body.len() >= len {
                        break body.to_string();
                    }
                }
            };
            let response = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            let _ = tx.send(request_body);
        });

        (format!("http://{}", addr), rx)
    }

    fn gateway_for(base: &str) -> HttpGateway {
        let config = Config {
            api_base_url: base.to_string(),
            request_timeout_secs: 5,
            ..Config::default()
        };
        HttpGateway::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_retrieve_posts_user_id_and_parses_link_token() {
        let (base, request) = one_shot_server(
            200,
            r#"{"response_object":{"tag":"link_token","data":{"link_token":"tok1"}}}"#,
        )
        .await;
        let gateway = gateway_for(&base);

        let resp = gateway.retrieve("u1").await.unwrap();
        assert_eq!(resp, GatewayResponse::LinkToken("tok1".to_string()));

        let sent: Value = serde_json::from_str(&request.await.unwrap()).unwrap();
        assert_eq!(sent, serde_json::json!({ "userId": "u1" }));
    }

    #[tokio::test]
    async fn test_retrieve_non_success_status() {
        let (base, _request) = one_shot_server(502, "bad gateway").await;
        let err = gateway_for(&base).retrieve("u1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_retrieve_invalid_json_is_malformed() {
        let (base, _request) = one_shot_server(200, "<html>").await;
        let err = gateway_for(&base).retrieve("u1").await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_exchange_sends_public_token_and_returns_payload() {
        let (base, request) = one_shot_server(
            200,
            r#"{"response_object":{"tag":"recurring_data","data":{"outflow_streams":[]}}}"#,
        )
        .await;
        let data = gateway_for(&base).exchange("u1", "public-abc").await.unwrap();
        assert_eq!(data, serde_json::json!({ "outflow_streams": [] }));

        let sent: Value = serde_json::from_str(&request.await.unwrap()).unwrap();
        assert_eq!(sent["publicToken"], "public-abc");
        assert_eq!(sent["userId"], "u1");
    }

    #[tokio::test]
    async fn test_exchange_replay_is_credential_rejected() {
        let (base, _request) =
            one_shot_server(400, r#"{"error_code":"INVALID_PUBLIC_TOKEN"}"#).await;
        let err = gateway_for(&base).exchange("u1", "spent").await.unwrap_err();
        assert!(err.requires_relink());
    }

    #[tokio::test]
    async fn test_exchange_link_token_answer_is_malformed() {
        let (base, _request) = one_shot_server(
            200,
            r#"{"response_object":{"tag":"link_token","data":{"link_token":"tok"}}}"#,
        )
        .await;
        let err = gateway_for(&base).exchange("u1", "p").await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = gateway_for(&format!("http://{}", addr))
            .retrieve("u1")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
}
