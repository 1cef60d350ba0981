//! HMAC request signer for the live order path.
//!
//! Produces CLOB-style L2 auth headers: api key, millisecond timestamp,
//! and a base64 HMAC-SHA256 over `timestamp + method + path + body`.

use base64::Engine;
use hmac::{Hmac, Mac};
use martin_sources::RequestSigner;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC signer holding the venue API credentials.
pub struct HmacSigner {
    api_key: String,
    secret: Vec<u8>,
}

impl HmacSigner {
    /// `secret` is the base64-encoded shared secret issued by the venue.
    pub fn new(api_key: impl Into<String>, secret_b64: &str) -> Result<Self, String> {
        let secret = base64::engine::general_purpose::STANDARD
            .decode(secret_b64)
            .map_err(|e| format!("invalid API secret encoding: {e}"))?;
        Ok(Self {
            api_key: api_key.into(),
            secret,
        })
    }

    fn sign(&self, timestamp_ms: i64, method: &str, path: &str, body: &str) -> String {
        let message = format!("{timestamp_ms}{method}{path}{body}");
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length");
        mac.update(message.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }
}

impl RequestSigner for HmacSigner {
    fn headers(&self, method: &str, path: &str, body: &str) -> Vec<(String, String)> {
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let signature = self.sign(timestamp_ms, method, path, body);
        vec![
            ("MARTIN-API-KEY".to_string(), self.api_key.clone()),
            ("MARTIN-TIMESTAMP".to_string(), timestamp_ms.to_string()),
            ("MARTIN-SIGNATURE".to_string(), signature),
        ]
    }
}
