//! Remote access gateway: a thin verb/path/payload wrapper over HTTP.
//!
//! The store depends only on the [`Gateway`] trait, so tests substitute a
//! scripted in-memory implementation. [`HttpGateway`] is the production one:
//! base-URL join, JSON bodies, bearer-token injection once a session exists.

use serde_json::Value;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// Non-2xx response; `message` is the server-provided error text, empty
    /// when the body carried none.
    #[error("server error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl GatewayError {
    /// Server-provided error message, if the response carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            GatewayError::Api { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }

    /// Message for a user-facing notice: the server's own text when present,
    /// otherwise the given fallback.
    pub fn user_message(&self, fallback: &str) -> String {
        self.server_message().unwrap_or(fallback).to_string()
    }
}

/// Verb/path/payload contract every mutation handler and the bulk loader
/// depend on. Responses resolve to parsed JSON.
#[allow(async_fn_in_trait)]
pub trait Gateway {
    /// Install or clear the bearer token used on subsequent requests.
    fn set_token(&self, token: Option<String>);

    async fn get(&self, path: &str) -> Result<Value, GatewayError>;
    async fn post(&self, path: &str, body: Value) -> Result<Value, GatewayError>;
    async fn put(&self, path: &str, body: Value) -> Result<Value, GatewayError>;
    async fn patch(&self, path: &str, body: Value) -> Result<Value, GatewayError>;
    async fn delete(&self, path: &str) -> Result<Value, GatewayError>;
}

/// Production gateway backed by `reqwest`.
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
    token: Mutex<Option<String>>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, GatewayError> {
        let request = {
            let token = self.token.lock().unwrap().clone();
            match token {
                Some(token) => request.bearer_auth(token),
                None => request,
            }
        };

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            Ok(serde_json::from_str(&text)?)
        } else {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| {
                    body.get("message")
                        .or_else(|| body.get("error"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_default();
            Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

impl Gateway for HttpGateway {
    fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap() = token;
    }

    async fn get(&self, path: &str) -> Result<Value, GatewayError> {
        self.send(self.client.get(self.url(path))).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, GatewayError> {
        self.send(self.client.post(self.url(path)).json(&body)).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value, GatewayError> {
        self.send(self.client.put(self.url(path)).json(&body)).await
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Value, GatewayError> {
        self.send(self.client.patch(self.url(path)).json(&body)).await
    }

    async fn delete(&self, path: &str) -> Result<Value, GatewayError> {
        self.send(self.client.delete(self.url(path))).await
    }
}
