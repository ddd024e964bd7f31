//! Canonical parameter strings and their HMAC-SHA512 signatures.
//!
//! Values are UTF-8 encoded and then `application/x-www-form-urlencoded`
//! (space becomes `+`, only `*-._` and alphanumerics pass through), which is
//! byte-for-byte what the gateway's reference integration produces.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::collections::HashMap;
use std::fmt;
use url::form_urlencoded;

use crate::EcommerceError;

type HmacSha512 = Hmac<Sha512>;

pub const SIGNATURE_FIELD: &str = "vnp_SecureHash";
pub const SIGNATURE_TYPE_FIELD: &str = "vnp_SecureHashType";

/// Drops empty keys and values, sorts by key (byte order), encodes and joins.
pub fn canonicalize<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut pairs: Vec<(&str, &str)> = params.into_iter().filter(|(k, v)| !k.is_empty() && !v.is_empty()).collect();
    pairs.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut out = String::new();
    for (i, (key, value)) in pairs.into_iter().enumerate() {
        if i > 0 { out.push('&'); }
        out.extend(form_urlencoded::byte_serialize(key.as_bytes()));
        out.push('=');
        out.extend(form_urlencoded::byte_serialize(value.as_bytes()));
    }
    out
}

/// Keyed signer for one merchant secret.
#[derive(Clone)]
pub struct Checksum {
    mac: HmacSha512,
}

impl Checksum {
    pub fn new(secret: &str) -> Result<Self, EcommerceError> {
        if secret.is_empty() {
            return Err(EcommerceError::Configuration("gateway hash secret is empty".into()));
        }
        let mac = HmacSha512::new_from_slice(secret.as_bytes()).map_err(|e| EcommerceError::Configuration(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Lower-case hex HMAC-SHA512 digest, 128 characters.
    pub fn sign(&self, canonical: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(canonical.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of a hex signature (either case) over `canonical`.
    pub fn verify(&self, canonical: &str, provided: &str) -> bool {
        let Ok(expected) = hex::decode(provided.trim()) else { return false };
        let mut mac = self.mac.clone();
        mac.update(canonical.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    /// Verifies a raw gateway parameter map. The signature fields themselves are
    /// excluded from the canonical string.
    pub fn verify_params(&self, params: &HashMap<String, String>) -> bool {
        let Some(provided) = params.get(SIGNATURE_FIELD) else { return false };
        let canonical = canonicalize(
            params.iter()
                .filter(|(k, _)| k.as_str() != SIGNATURE_FIELD && k.as_str() != SIGNATURE_TYPE_FIELD)
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        self.verify(&canonical, provided)
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Checksum(HMAC-SHA512, <redacted>)") }
}
