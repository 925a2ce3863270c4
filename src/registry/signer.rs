//! ROA-style request signing for Aliyun APIs
//!
//! The string to sign is
//!
//! ```text
//! METHOD\nAccept\nContent-MD5\nContent-Type\nDate\n<x-acs-* headers><resource>
//! ```
//!
//! where the `x-acs-*` headers are lower-cased, sorted and written as
//! `name:value\n`, and the resource is the path followed by the sorted query.
//! The signature is base64(HMAC-SHA1(secret, string)).

use crate::{MirrorError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::BTreeMap;

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const SIGNATURE_VERSION: &str = "1.0";

/// Access key pair
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
}

/// The parts of a request covered by the signature
#[derive(Debug)]
pub struct SigningInput<'a> {
    pub method: &'a str,
    pub accept: &'a str,
    pub content_md5: &'a str,
    pub content_type: &'a str,
    pub date: &'a str,
    pub acs_headers: &'a BTreeMap<String, String>,
    pub path: &'a str,
    pub query: &'a BTreeMap<String, String>,
}

impl SigningInput<'_> {
    pub fn string_to_sign(&self) -> String {
        let mut out = format!(
            "{}\n{}\n{}\n{}\n{}\n",
            self.method.to_uppercase(),
            self.accept,
            self.content_md5,
            self.content_type,
            self.date
        );

        let mut headers: Vec<(String, &str)> = self
            .acs_headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.as_str()))
            .filter(|(k, _)| k.starts_with("x-acs-"))
            .collect();
        headers.sort();
        for (name, value) in headers {
            out.push_str(&name);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }

        out.push_str(self.path);
        if !self.query.is_empty() {
            let query: Vec<String> = self
                .query
                .iter()
                .map(|(k, v)| {
                    if v.is_empty() {
                        k.clone()
                    } else {
                        format!("{}={}", k, v)
                    }
                })
                .collect();
            out.push('?');
            out.push_str(&query.join("&"));
        }
        out
    }
}

/// base64(HMAC-SHA1(secret, message))
pub fn sign(secret: &str, message: &str) -> Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .map_err(|e| MirrorError::Signing(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Value of the `Authorization` header
pub fn authorization(credentials: &Credentials, input: &SigningInput<'_>) -> Result<String> {
    let signature = sign(&credentials.access_key_secret, &input.string_to_sign())?;
    Ok(format!("acs {}:{}", credentials.access_key_id, signature))
}
