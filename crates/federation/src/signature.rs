//! HTTP Signature signing for outgoing requests.
//!
//! Implements the draft-cavage-http-signatures flavour every `ActivityPub`
//! server speaks: POSTs sign `(request-target) host date digest`, GETs drop
//! the digest.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rsa::RsaPrivateKey;
use tracing::debug;
use url::Url;
use vitrine_common::{
    SignatureError, SignatureHeader, body_hash, build_signing_string, crypto::parse_private_key,
    http_signature::REQUEST_TARGET,
};
use vitrine_db::entities::actor;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format a timestamp as an HTTP `Date` header.
#[must_use]
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format(HTTP_DATE_FORMAT).to_string()
}

/// Parse an HTTP `Date` header (IMF-fixdate, with RFC 2822 as a fallback).
pub fn parse_http_date(value: &str) -> Result<DateTime<Utc>, SignatureError> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, HTTP_DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc2822(value).map(|dt| dt.with_timezone(&Utc)))
        .map_err(|_| SignatureError::InvalidDate(value.to_string()))
}

/// Signs requests on behalf of one local actor.
pub struct HttpSigner {
    private_key: RsaPrivateKey,
    key_id: String,
}

impl HttpSigner {
    /// Create a new HTTP signer from a PEM-encoded private key.
    pub fn new(private_key_pem: &str, key_id: String) -> Result<Self, SignatureError> {
        Ok(Self {
            private_key: parse_private_key(private_key_pem)?,
            key_id,
        })
    }

    /// Signer for a local actor, `None` when the actor holds no private key.
    pub fn for_actor(actor: &actor::Model) -> Result<Option<Self>, SignatureError> {
        actor
            .private_key_pem
            .as_deref()
            .map(|pem| Self::new(pem, actor.key_id()))
            .transpose()
    }

    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Sign a request and return the headers to send with it.
    pub fn sign_request(
        &self,
        method: &str,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<HeaderMap, SignatureError> {
        self.sign_request_at(method, url, body, Utc::now())
    }

    /// [`Self::sign_request`] with an explicit `Date`.
    pub fn sign_request_at(
        &self,
        method: &str,
        url: &Url,
        body: Option<&[u8]>,
        at: DateTime<Utc>,
    ) -> Result<HeaderMap, SignatureError> {
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(SignatureError::Malformed(format!("no host in {url}"))),
        };
        let path = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };
        let hash = body.map(body_hash);

        let mut values = HashMap::new();
        values.insert("host".to_string(), host);
        values.insert("date".to_string(), http_date(at));

        let mut names = vec![REQUEST_TARGET, "host", "date"];
        if hash.is_some() {
            names.push("digest");
        }
        let owned: Vec<String> = names.iter().map(|n| (*n).to_string()).collect();

        let signing_string = build_signing_string(method, &path, &values, &owned, hash.as_deref())?;
        debug!(key_id = %self.key_id, signing_string = %signing_string, "Signing request");

        let signature = SignatureHeader::sign(&self.private_key, &self.key_id, &names, &signing_string);

        let mut headers = HeaderMap::new();
        for (name, value) in values {
            insert(&mut headers, &name, &value)?;
        }
        if let Some(hash) = hash {
            insert(&mut headers, "digest", &format!("SHA-256={hash}"))?;
        }
        insert(&mut headers, "signature", &signature.render())?;

        Ok(headers)
    }
}

fn insert(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), SignatureError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
    let value = HeaderValue::from_str(value).map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
    headers.insert(name, value);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vitrine_common::{calculate_digest, crypto::parse_public_key, generate_rsa_keypair};

    #[test]
    fn test_http_date_round_trip() {
        let at = Utc.with_ymd_and_hms(2014, 6, 7, 20, 51, 35).unwrap();
        assert_eq!(http_date(at), "Sat, 07 Jun 2014 20:51:35 GMT");
        assert_eq!(parse_http_date("Sat, 07 Jun 2014 20:51:35 GMT").unwrap(), at);
        assert_eq!(parse_http_date("Sat, 07 Jun 2014 22:51:35 +0200").unwrap(), at);
        assert!(matches!(
            parse_http_date("yesterday"),
            Err(SignatureError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_signed_post_verifies() {
        let keypair = generate_rsa_keypair().unwrap();
        let signer = HttpSigner::new(
            &keypair.private_key_pem,
            "https://vitrine.example/users/bob#main-key".to_string(),
        )
        .unwrap();
        let url = Url::parse("https://remote.example/inbox").unwrap();
        let body = br#"{"type":"Like"}"#;

        let headers = signer.sign_request("POST", &url, Some(body)).unwrap();
        assert_eq!(headers["host"], "remote.example");
        assert_eq!(headers["digest"], calculate_digest(body).as_str());

        let parsed = SignatureHeader::parse(headers["signature"].to_str().unwrap()).unwrap();
        assert_eq!(parsed.headers, vec!["(request-target)", "host", "date", "digest"]);
        assert_eq!(parsed.actor_id(), "https://vitrine.example/users/bob");

        let lookup: HashMap<String, String> = headers
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap().to_string()))
            .collect();
        let signing_string =
            build_signing_string("POST", "/inbox", &lookup, &parsed.headers, Some(&body_hash(body)))
                .unwrap();
        let public = parse_public_key(&keypair.public_key_pem).unwrap();
        assert!(parsed.verify(&public, &signing_string).is_ok());
    }

    #[test]
    fn test_signed_get_has_no_digest() {
        let keypair = generate_rsa_keypair().unwrap();
        let signer = HttpSigner::new(&keypair.private_key_pem, "k".to_string()).unwrap();
        let url = Url::parse("https://remote.example:8443/users/alice?page=1").unwrap();

        let headers = signer.sign_request("GET", &url, None).unwrap();
        assert!(headers.get("digest").is_none());
        assert_eq!(headers["host"], "remote.example:8443");

        let parsed = SignatureHeader::parse(headers["signature"].to_str().unwrap()).unwrap();
        assert_eq!(parsed.headers, vec!["(request-target)", "host", "date"]);
    }

    #[test]
    fn test_actor_without_key_has_no_signer() {
        let actor = vitrine_db::test_utils::remote_actor(1, "alice", "remote.example");
        assert!(HttpSigner::for_actor(&actor).unwrap().is_none());
    }
}
