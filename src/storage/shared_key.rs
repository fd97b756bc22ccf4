//! Shared Key request signing for the blob and table REST APIs.

use crate::errors::{AppError, AppResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Storage account name and decoded account key.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedKeyCredential {
    account: String,
    key: Vec<u8>,
}

/// The parts of a blob request that enter its signature.
pub struct BlobRequest<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    pub content_length: usize,
    pub content_type: &'a str,
    pub if_none_match: &'a str,
    /// Every `x-ms-*` header sent with the request
    pub ms_headers: &'a [(&'a str, &'a str)],
}

impl SharedKeyCredential {
    /// Builds a credential from an account name and a base64 account key.
    pub fn new(account: &str, key_base64: &str) -> AppResult<Self> {
        if account.trim().is_empty() {
            return Err(AppError::InvalidConfig(
                "AccountKey requires an AccountName".to_string(),
            ));
        }
        let key = STANDARD
            .decode(key_base64.trim())
            .map_err(|e| AppError::InvalidConfig(format!("AccountKey is not valid base64: {e}")))?;
        if key.is_empty() {
            return Err(AppError::InvalidConfig("AccountKey is empty".to_string()));
        }
        Ok(Self {
            account: account.trim().to_string(),
            key,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// `Authorization` header value for a blob request.
    pub fn sign_blob(&self, request: &BlobRequest) -> AppResult<String> {
        self.authorization(&blob_string_to_sign(&self.account, request))
    }

    /// `Authorization` header value for a table request sent with `x-ms-date: date`.
    pub fn sign_table(
        &self,
        method: &str,
        content_type: &str,
        date: &str,
        url: &Url,
    ) -> AppResult<String> {
        self.authorization(&table_string_to_sign(
            &self.account,
            method,
            content_type,
            date,
            url,
        ))
    }

    fn authorization(&self, string_to_sign: &str) -> AppResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AppError::SinkUnavailable(format!("Failed to sign request: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        Ok(format!("SharedKey {}:{signature}", self.account))
    }
}

impl fmt::Debug for SharedKeyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKeyCredential")
            .field("account", &self.account)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Current time in the RFC 1123 form expected by `x-ms-date`.
pub fn request_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Blob service string-to-sign (version 2015-02-21 and later).
pub(crate) fn blob_string_to_sign(account: &str, request: &BlobRequest) -> String {
    let content_length = match request.content_length {
        0 => String::new(),
        n => n.to_string(),
    };

    let mut headers: Vec<(String, &str)> = request
        .ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    headers.sort();
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();

    let mut resource = format!("/{account}{}", request.url.path());
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in request.url.query_pairs() {
        params
            .entry(name.to_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        resource.push_str(&format!("\n{name}:{}", values.join(",")));
    }

    // Content-Encoding, Content-Language, Content-MD5, Date, If-Modified-Since,
    // If-Match, If-Unmodified-Since and Range are never sent
    format!(
        "{method}\n\n\n{content_length}\n\n{content_type}\n\n\n\n{if_none_match}\n\n\n{canonical_headers}{resource}",
        method = request.method,
        content_type = request.content_type,
        if_none_match = request.if_none_match,
    )
}

/// Table service string-to-sign.
pub(crate) fn table_string_to_sign(
    account: &str,
    method: &str,
    content_type: &str,
    date: &str,
    url: &Url,
) -> String {
    format!("{method}\n\n{content_type}\n{date}\n/{account}{}", url.path())
}
