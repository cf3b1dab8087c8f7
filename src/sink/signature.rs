use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("shared key is not valid base64: {0}")]
    InvalidKey(#[from] base64::DecodeError),

    #[error("shared key is empty")]
    EmptyKey,
}

/// Signs ingestion requests with the workspace's shared key.
///
/// The string-to-sign is
/// `METHOD\nCONTENT_LENGTH\nCONTENT_TYPE\nx-ms-date:DATE\nRESOURCE` and the
/// header value is `SharedKey {customer_id}:{base64(hmac_sha256)}`. Any
/// change in whitespace, order or casing fails authentication at the sink.
#[derive(Clone)]
pub struct SharedKeySigner {
    customer_id: String,
    key: Vec<u8>,
}

impl std::fmt::Debug for SharedKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeySigner")
            .field("customer_id", &self.customer_id)
            .finish_non_exhaustive()
    }
}

impl SharedKeySigner {
    pub fn new(customer_id: &str, shared_key: &str) -> Result<Self, SignatureError> {
        let key = STANDARD.decode(shared_key.trim())?;
        if key.is_empty() {
            return Err(SignatureError::EmptyKey);
        }
        Ok(Self {
            customer_id: customer_id.to_string(),
            key,
        })
    }

    pub fn sign(
        &self,
        date: &str,
        content_length: usize,
        method: &str,
        content_type: &str,
        resource: &str,
    ) -> String {
        let string_to_hash = format!(
            "{}\n{}\n{}\nx-ms-date:{}\n{}",
            method, content_length, content_type, date, resource
        );

        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(string_to_hash.as_bytes());
        let digest = STANDARD.encode(mac.finalize().into_bytes());

        format!("SharedKey {}:{}", self.customer_id, digest)
    }
}

/// One-shot form of [`SharedKeySigner::sign`].
pub fn build_signature(
    customer_id: &str,
    shared_key: &str,
    date: &str,
    content_length: usize,
    method: &str,
    content_type: &str,
    resource: &str,
) -> Result<String, SignatureError> {
    let signer = SharedKeySigner::new(customer_id, shared_key)?;
    Ok(signer.sign(date, content_length, method, content_type, resource))
}

/// `x-ms-date` value, e.g. `Mon, 01 Jan 2024 00:00:00 GMT`.
pub fn rfc1123_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
