use std::time::Duration;

use anyhow::{bail, Result};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::identity::Token;
use crate::model::Comment;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: Option<String>,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-success response; `message` is the server's body, as sent.
    #[error("{message}")]
    Server { status: StatusCode, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("base url {0} cannot hold a path")]
    InvalidBase(String),
}

#[derive(Serialize)]
struct NewComment<'a> {
    desc: &'a str,
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("comments client user agent required");
        }
        let base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base)?;
        if base_url.cannot_be_a_base() {
            bail!("comments client base url must be hierarchical: {base}");
        }
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(DEFAULT_TIMEOUT))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    /// `GET /comments/{post_id}`, in the order the server returns them.
    pub fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>, ApiError> {
        let url = self.endpoint(post_id)?;
        debug!(%url, "fetch comments");
        let resp = self.send(self.http.get(url))?;
        let text = resp.text()?;
        Ok(serde_json::from_str(&text)?)
    }

    /// `POST /comments/{post_id}` with `{ "desc": body }`.
    pub fn create_comment(&self, post_id: &str, body: &str, token: &Token) -> Result<(), ApiError> {
        let url = self.endpoint(post_id)?;
        debug!(%url, "create comment");
        let req = self
            .authorized(Method::POST, url, token)
            .json(&NewComment { desc: body });
        self.send(req)?;
        Ok(())
    }

    /// `DELETE /comments/{comment_id}`.
    pub fn delete_comment(&self, comment_id: &str, token: &Token) -> Result<(), ApiError> {
        let url = self.endpoint(comment_id)?;
        debug!(%url, "delete comment");
        self.send(self.authorized(Method::DELETE, url, token))?;
        Ok(())
    }

    fn endpoint(&self, id: &str) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBase(self.base_url.to_string()))?
            .pop_if_empty()
            .push("comments")
            .push(id);
        Ok(url)
    }

    fn authorized(&self, method: Method, url: Url, token: &Token) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(AUTHORIZATION, token.bearer())
    }

    fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let resp = req.header(USER_AGENT, self.user_agent.clone()).send()?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        Err(ApiError::Server {
            status,
            message: server_message(status, &body),
        })
    }
}

/// Error bodies are shown to the user as-is. A JSON string body is
/// unwrapped so the user doesn't see the quotes.
pub fn server_message(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::String(text)) => text,
        _ => trimmed.to_string(),
    }
}
