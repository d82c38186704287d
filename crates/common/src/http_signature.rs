//! HTTP Signature codec.
//!
//! Implements the `Signature` header grammar and canonical signing string of
//! draft-cavage HTTP Signatures as spoken by `ActivityPub` servers:
//!
//! ```text
//! keyId="https://remote.example/users/alice#main-key",algorithm="rsa-sha256",
//! headers="(request-target) host date digest",signature="<base64>"
//! ```
//!
//! See: <https://datatracker.ietf.org/doc/html/draft-cavage-http-signatures>

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;

use crate::crypto;

/// The only algorithm accepted on the wire.
pub const ALGORITHM: &str = "rsa-sha256";

/// Pseudo-header standing for the lowercased method and the path.
pub const REQUEST_TARGET: &str = "(request-target)";

/// Failures from parsing, building or verifying a signature.
///
/// Cryptographic mismatches of any kind surface only as [`Self::Invalid`].
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature header is missing {0}")]
    MissingComponent(&'static str),

    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("signed header missing from request: {0}")]
    MissingHeader(String),

    #[error("malformed signature: {0}")]
    Malformed(String),

    #[error("domain is blocked: {0}")]
    BlockedDomain(String),

    #[error("missing Date header")]
    MissingDate,

    #[error("unparsable Date header: {0}")]
    InvalidDate(String),

    #[error("request date is {age_secs}s old")]
    Expired { age_secs: i64 },

    #[error("unknown actor: {0}")]
    UnknownActor(String),

    #[error("actor has no public key: {0}")]
    MissingPublicKey(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("signature invalid")]
    Invalid,
}

/// Parsed `Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Key URI, usually `<actor>#main-key`.
    pub key_id: String,
    pub algorithm: String,
    /// Signed header names, in signing order.
    pub headers: Vec<String>,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
}

impl SignatureHeader {
    /// Parse a `Signature` header value.
    ///
    /// Pairs are matched tolerantly: unknown keys are ignored, whitespace
    /// around separators is skipped and values may be quoted or bare.
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let params = parse_params(header);

        let key_id = params
            .get("keyId")
            .ok_or(SignatureError::MissingComponent("keyId"))?;
        let algorithm = params
            .get("algorithm")
            .ok_or(SignatureError::MissingComponent("algorithm"))?;
        let headers = params
            .get("headers")
            .ok_or(SignatureError::MissingComponent("headers"))?;
        let signature = params
            .get("signature")
            .ok_or(SignatureError::MissingComponent("signature"))?;

        if !algorithm.eq_ignore_ascii_case(ALGORITHM) {
            return Err(SignatureError::UnsupportedAlgorithm((*algorithm).to_string()));
        }

        let signature = BASE64
            .decode(signature.as_bytes())
            .map_err(|e| SignatureError::Malformed(format!("signature is not base64: {e}")))?;

        Ok(Self {
            key_id: (*key_id).to_string(),
            algorithm: ALGORITHM.to_string(),
            headers: headers
                .split_ascii_whitespace()
                .map(str::to_ascii_lowercase)
                .collect(),
            signature,
        })
    }

    /// Actor URI the key belongs to: the key id without its fragment.
    #[must_use]
    pub fn actor_id(&self) -> &str {
        self.key_id
            .split_once('#')
            .map_or(self.key_id.as_str(), |(actor, _)| actor)
    }

    /// Render back into header form.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            r#"keyId="{}",algorithm="{}",headers="{}",signature="{}""#,
            self.key_id,
            self.algorithm,
            self.headers.join(" "),
            BASE64.encode(&self.signature)
        )
    }

    /// Check the signature against the canonical string it should cover.
    pub fn verify(&self, public_key: &RsaPublicKey, signing_string: &str) -> Result<(), SignatureError> {
        crypto::verify(public_key, signing_string.as_bytes(), &self.signature)
    }

    /// Sign `signing_string` and produce a header for `headers`.
    #[must_use]
    pub fn sign(
        private_key: &RsaPrivateKey,
        key_id: &str,
        headers: &[&str],
        signing_string: &str,
    ) -> Self {
        Self {
            key_id: key_id.to_string(),
            algorithm: ALGORITHM.to_string(),
            headers: headers.iter().map(|h| (*h).to_string()).collect(),
            signature: crypto::sign(private_key, signing_string.as_bytes()),
        }
    }
}

fn parse_params(header: &str) -> HashMap<&str, &str> {
    let mut params = HashMap::new();
    let mut rest = header.trim();

    while !rest.is_empty() {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let after = after.trim_start();

        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.split_once('"') {
                Some((value, remaining)) => (value, remaining),
                None => (quoted, ""),
            }
        } else {
            match after.split_once(',') {
                Some((value, remaining)) => (value.trim(), remaining),
                None => (after.trim(), ""),
            }
        };

        params.entry(key.trim()).or_insert(value);
        rest = remaining;
    }

    params
}

/// Build the canonical signing string.
///
/// Each name in `names` contributes a `name: value` line. `(request-target)`
/// is synthesized from `method` and `path`. `digest` is synthesized as
/// `SHA-256=<body_hash>` from the hash of the body actually received, so a
/// forged `Digest` header cannot vouch for a different body. `headers` must be
/// keyed by lowercase header name.
pub fn build_signing_string(
    method: &str,
    path: &str,
    headers: &HashMap<String, String>,
    names: &[String],
    body_hash: Option<&str>,
) -> Result<String, SignatureError> {
    let mut lines = Vec::with_capacity(names.len());

    for name in names {
        let name = name.to_ascii_lowercase();
        let value = match name.as_str() {
            REQUEST_TARGET => format!("{} {}", method.to_ascii_lowercase(), path),
            "digest" => match body_hash {
                Some(hash) => format!("SHA-256={hash}"),
                None => headers
                    .get("digest")
                    .cloned()
                    .ok_or_else(|| SignatureError::MissingHeader(name.clone()))?,
            },
            other => headers
                .get(other)
                .map(|v| v.trim().to_string())
                .ok_or_else(|| SignatureError::MissingHeader(name.clone()))?,
        };
        lines.push(format!("{name}: {value}"));
    }

    Ok(lines.join("\n"))
}

/// Base64 SHA-256 of a body.
#[must_use]
pub fn body_hash(body: &[u8]) -> String {
    BASE64.encode(Sha256::digest(body))
}

/// `Digest` header value for a body.
#[must_use]
pub fn calculate_digest(body: &[u8]) -> String {
    format!("SHA-256={}", body_hash(body))
}
