//! OAuth 1.0a request signing (HMAC-SHA1) for the REST and streaming endpoints.

use base64::prelude::*;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;

use crate::config::Credentials;
use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct OAuthSigner {
    creds: Credentials,
}

impl OAuthSigner {
    pub fn new(creds: Credentials) -> Self {
        Self { creds }
    }

    /// `Authorization` header value for a request. `params` are the query and
    /// form-body parameters of the request; they take part in the signature.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<String> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_header_with(method, url, params, &nonce, &timestamp)
    }

    fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String> {
        let oauth = [
            ("oauth_consumer_key", self.creds.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp),
            ("oauth_token", self.creds.access_token.as_str()),
            ("oauth_version", "1.0"),
        ];

        let mut all: Vec<(&str, &str)> = params.to_vec();
        all.extend_from_slice(&oauth);
        let base = signature_base_string(method, url, &all);
        let signature = sign(
            &base,
            &self.creds.consumer_secret,
            &self.creds.access_token_secret,
        )?;

        let mut fields: Vec<String> = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect();
        fields.push(format!("oauth_signature=\"{}\"", percent_encode(&signature)));
        fields.sort();
        Ok(format!("OAuth {}", fields.join(", ")))
    }
}

/// `METHOD&enc(url)&enc(sorted k=v pairs)` per RFC 5849 §3.4.1.
pub fn signature_base_string(method: &str, url: &str, params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    let param_str = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&param_str)
    )
}

pub fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> Result<String> {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|e| AppError::Config(format!("invalid signing key: {e}")))?;
    mac.update(base.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// RFC 3986 encoding: everything except `A-Z a-z 0-9 - . _ ~` becomes `%XX`.
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
