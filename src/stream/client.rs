use std::time::Duration;

use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{StreamConfig, HTTP_TIMEOUT_SECS, STREAM_STALL_SECS};
use crate::error::{AppError, Result};
use crate::stream::oauth::OAuthSigner;

#[derive(Debug, Deserialize)]
struct UserLookup {
    id_str: String,
}

/// Authenticated client for the platform's REST and filter-stream endpoints.
pub struct TwitterClient {
    http: reqwest::Client,
    stream_http: reqwest::Client,
    signer: OAuthSigner,
    api_base_url: String,
    stream_url: String,
}

impl TwitterClient {
    pub fn new(cfg: &StreamConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        // No overall timeout on the stream: the body is open-ended. A stalled
        // connection is detected by the per-read timeout instead.
        let stream_http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(STREAM_STALL_SECS))
            .build()?;
        Ok(Self {
            http,
            stream_http,
            signer: OAuthSigner::new(cfg.credentials.clone()),
            api_base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            stream_url: cfg.stream_url.clone(),
        })
    }

    async fn signed_get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response> {
        let url = format!("{}{}", self.api_base_url, path);
        let auth = self.signer.authorization_header("GET", &url, query)?;
        let resp = self
            .http
            .request(Method::GET, &url)
            .query(query)
            .header(reqwest::header::AUTHORIZATION, auth)
            .send()
            .await?;
        Ok(resp)
    }

    /// Exchanges the static credentials for a confirmed session. Rejection is fatal.
    pub async fn verify_credentials(&self) -> Result<()> {
        let resp = self
            .signed_get("/account/verify_credentials.json", &[("skip_status", "true")])
            .await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::Auth(status.as_u16()));
        }
        resp.error_for_status()?;
        info!("Credentials verified");
        Ok(())
    }

    /// Screen name → stable numeric account id.
    pub async fn lookup_user_id(&self, handle: &str) -> Result<String> {
        let resp = self
            .signed_get("/users/show.json", &[("screen_name", handle)])
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::UnknownHandle {
                handle: handle.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }
        let user: UserLookup = resp.json().await?;
        debug!(handle, id = %user.id_str, "resolved handle");
        Ok(user.id_str)
    }

    /// Resolves every handle or fails on the first one that cannot be resolved.
    pub async fn resolve_follows(&self, handles: &[String]) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(handles.len());
        for handle in handles {
            ids.push(self.lookup_user_id(handle).await?);
        }
        info!(count = ids.len(), ids = ?ids, "Resolved follow list");
        Ok(ids)
    }

    /// Opens the filter stream. The caller inspects the status and reads the body.
    pub async fn open_filter_stream(&self, follow_ids: &[String], track: &[String]) -> Result<Response> {
        let follow = follow_ids.join(",");
        let track = track.join(",");
        let mut form: Vec<(&str, &str)> = Vec::with_capacity(2);
        if !follow.is_empty() {
            form.push(("follow", follow.as_str()));
        }
        if !track.is_empty() {
            form.push(("track", track.as_str()));
        }
        let auth = self
            .signer
            .authorization_header("POST", &self.stream_url, &form)?;
        let resp = self
            .stream_http
            .post(&self.stream_url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .form(&form)
            .send()
            .await?;
        Ok(resp)
    }
}
