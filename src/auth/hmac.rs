//! HMAC-SHA256 signatures used by Shopify.
//!
//! Shopify signs three kinds of requests, each with a different encoding:
//!
//! | Request            | Where                        | Message                                  | Encoding |
//! |--------------------|------------------------------|------------------------------------------|----------|
//! | OAuth callback     | `hmac` query param           | sorted `k=v` pairs joined with `&`       | hex      |
//! | App proxy          | `signature` query param      | sorted `k=v` pairs, no separator         | hex      |
//! | Webhook            | `X-Shopify-Hmac-SHA256`      | raw request body                         | base64   |
//!
//! Every comparison is constant-time, and every verification tries the
//! current secret first and then the old one (key rotation).
//!
//! ```rust
//! use shopify_app::auth::hmac::{compute_signature, compute_signature_base64};
//!
//! let signature = compute_signature("message", "key");
//! assert_eq!(signature, "6e9ef29b75fffc5b7abae527d58fdadb2fe42e7219011976917343065f58ed4a");
//!
//! let signature = compute_signature_base64(b"message", "key");
//! assert_eq!(signature, "bp7ym3X//Ft6uuUn1Y/a2y/kLnIZARl2kXNDBl9Y7Uo=");
//! ```

use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt::Write;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

fn digest(message: &[u8], secret: &str) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Computes a lowercase hex HMAC-SHA256 signature of `message`.
#[must_use]
pub fn compute_signature(message: &str, secret: &str) -> String {
    digest(message.as_bytes(), secret)
        .unwrap_or_default()
        .iter()
        .fold(String::with_capacity(64), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}

/// Computes a standard base64 HMAC-SHA256 signature of raw bytes.
#[must_use]
pub fn compute_signature_base64(message: &[u8], secret: &str) -> String {
    digest(message, secret)
        .map(|bytes| BASE64_STANDARD.encode(bytes))
        .unwrap_or_default()
}

/// Compares two strings in constant time.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Verifies a hex signature of `message` against each secret in turn.
pub(crate) fn verify_hex<'a>(
    message: &str,
    received: &str,
    mut secrets: impl Iterator<Item = &'a str>,
) -> bool {
    !received.is_empty()
        && secrets.any(|secret| constant_time_compare(&compute_signature(message, secret), received))
}

/// Verifies a base64 signature of `body` against each secret in turn.
pub(crate) fn verify_base64<'a>(
    body: &[u8],
    received: &str,
    mut secrets: impl Iterator<Item = &'a str>,
) -> bool {
    !received.is_empty()
        && secrets.any(|secret| {
            constant_time_compare(&compute_signature_base64(body, secret), received)
        })
}

/// Builds the message signed in OAuth callbacks: every parameter except
/// `hmac` and `signature`, sorted by key, as `k=v` joined with `&`.
#[must_use]
pub fn oauth_signable(params: &[(String, String)]) -> String {
    let mut pairs: Vec<(&str, &str)> = params
        .iter()
        .filter(|(key, _)| key != "hmac" && key != "signature")
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    pairs.sort_unstable();

    pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Builds the message signed in app proxy requests: every parameter except
/// `signature`, with repeated keys' values joined by `,`, sorted by key, as
/// `k=v` with no separator.
#[must_use]
pub fn app_proxy_signable(params: &[(String, String)]) -> String {
    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (key, value) in params.iter().filter(|(key, _)| key != "signature") {
        grouped.entry(key.as_str()).or_default().push(value.as_str());
    }

    grouped
        .iter()
        .map(|(key, values)| format!("{key}={}", values.join(",")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_compute_signature_produces_lowercase_hex() {
        let sig = compute_signature("test", "secret");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_compute_signature_base64_with_non_utf8_bytes() {
        let sig = compute_signature_base64(&[0x80, 0x81, 0xff, 0xfe], "secret");
        assert_eq!(sig.len(), 44);
        assert!(BASE64_STANDARD.decode(&sig).is_ok());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("short", "longer string"));
    }

    #[test]
    fn test_verify_hex_falls_back_to_old_secret() {
        let sig = compute_signature("message", "old-secret");

        assert!(verify_hex("message", &sig, ["new-secret", "old-secret"].into_iter()));
        assert!(!verify_hex("message", &sig, ["new-secret"].into_iter()));
    }

    #[test]
    fn test_verify_rejects_empty_signature() {
        assert!(!verify_hex("message", "", ["secret"].into_iter()));
        assert!(!verify_base64(b"body", "", ["secret"].into_iter()));
    }

    #[test]
    fn test_verify_base64_matches_body_signature() {
        let body = br#"{"id":1}"#;
        let sig = compute_signature_base64(body, "secret");

        assert!(verify_base64(body, &sig, ["secret"].into_iter()));
        assert!(!verify_base64(b"tampered", &sig, ["secret"].into_iter()));
    }

    #[test]
    fn test_oauth_signable_sorts_and_drops_hmac() {
        let signable = oauth_signable(&params(&[
            ("shop", "test-shop.myshopify.com"),
            ("hmac", "abc"),
            ("code", "123"),
            ("timestamp", "1700000000"),
        ]));

        assert_eq!(
            signable,
            "code=123&shop=test-shop.myshopify.com&timestamp=1700000000"
        );
    }

    #[test]
    fn test_app_proxy_signable_joins_repeated_keys() {
        let signable = app_proxy_signable(&params(&[
            ("shop", "test-shop.myshopify.com"),
            ("extra", "1"),
            ("extra", "2"),
            ("signature", "abc"),
            ("path_prefix", "/apps/proxy"),
        ]));

        assert_eq!(
            signable,
            "extra=1,2path_prefix=/apps/proxyshop=test-shop.myshopify.com"
        );
    }
}
