use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::storage::error::StoreError;

type HmacSha256 = Hmac<Sha256>;

/// SharedKeyLite request signer for the Table service
#[derive(Clone)]
pub struct SharedKeyLite {
    account: String,
    key: Vec<u8>,
}

impl SharedKeyLite {
    pub fn new(account: &str, account_key: &str) -> Result<Self, StoreError> {
        let key = STANDARD
            .decode(account_key)
            .map_err(|e| StoreError::Connection(format!("AccountKey is not valid base64: {}", e)))?;

        Ok(Self {
            account: account.to_string(),
            key,
        })
    }

    /// Value for the `x-ms-date` header (RFC 1123, always GMT)
    pub fn format_date(now: DateTime<Utc>) -> String {
        now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
    }

    /// `path` is the percent-encoded request path as sent on the wire
    pub fn string_to_sign(&self, date: &str, path: &str) -> String {
        format!("{}\n/{}{}", date, self.account, path)
    }

    pub fn sign(&self, date: &str, path: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(self.string_to_sign(date, path).as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    /// Complete `Authorization` header value
    pub fn authorization(&self, date: &str, path: &str) -> String {
        format!("SharedKeyLite {}:{}", self.account, self.sign(date, path))
    }
}

impl std::fmt::Debug for SharedKeyLite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeyLite")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}
