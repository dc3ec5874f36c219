//! S3-compatible object storage client.
//!
//! Talks to the deployment bucket (Cloudflare R2 or any S3-compatible
//! endpoint) over the S3 REST API with AWS Signature V4 authentication,
//! using only pure-Rust crypto (`hmac` + `sha2`) — no vendor SDK, no C
//! dependencies. Requests are path-style (`https://<endpoint>/<bucket>/<key>`),
//! which is what R2's account endpoints expect.
//!
//! # Environment Variables
//!
//! - `R2_ENDPOINT` — account endpoint URL (required)
//! - `R2_ACCESS_KEY_ID` — required
//! - `R2_SECRET_ACCESS_KEY` — required
//! - `R2_BUCKET_NAME` — overrides the configured bucket name
//!
//! Missing credentials are a configuration error surfaced before any work
//! starts; only `--dry-run` flows skip client construction entirely.
//!
//! # Operations
//!
//! `put`, `get`, `delete`, and paginated `list_all` — the four verbs the
//! deploy uploader and the edge router need. Every request carries an
//! explicit timeout; a hung bucket fails the step instead of the whole run
//! hanging.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Missing storage credentials: {0} is not set")]
    MissingCredentials(&'static str),
    #[error("No bucket configured: set storage.bucket in config.toml or R2_BUCKET_NAME")]
    MissingBucket,
    #[error("Storage request failed for '{key}': {message}")]
    Request { key: String, message: String },
    #[error("Storage returned HTTP {status} for '{key}'")]
    Status { key: String, status: u16 },
}

/// Credentials for SigV4 signing.
#[derive(Clone)]
struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

/// A handle to one bucket on one endpoint.
#[derive(Clone)]
pub struct ObjectStore {
    client: reqwest::Client,
    /// `scheme://host` with no trailing slash and no bucket component.
    endpoint: String,
    /// Host portion only, for the signed `host` header.
    host: String,
    bucket: String,
    region: String,
    creds: Credentials,
}

impl ObjectStore {
    /// Construct from environment variables, with `fallback_bucket` from
    /// the config file used when `R2_BUCKET_NAME` is unset.
    pub fn from_env(fallback_bucket: &str) -> Result<Self, StorageError> {
        let mut endpoint = std::env::var("R2_ENDPOINT")
            .map_err(|_| StorageError::MissingCredentials("R2_ENDPOINT"))?;
        let access_key_id = std::env::var("R2_ACCESS_KEY_ID")
            .map_err(|_| StorageError::MissingCredentials("R2_ACCESS_KEY_ID"))?;
        let secret_access_key = std::env::var("R2_SECRET_ACCESS_KEY")
            .map_err(|_| StorageError::MissingCredentials("R2_SECRET_ACCESS_KEY"))?;

        let bucket = std::env::var("R2_BUCKET_NAME")
            .ok()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| fallback_bucket.to_string());
        if bucket.is_empty() {
            return Err(StorageError::MissingBucket);
        }

        // Tolerate an endpoint with the bucket name appended.
        endpoint = endpoint.trim_end_matches('/').to_string();
        if let Some(stripped) = endpoint.strip_suffix(&format!("/{bucket}")) {
            endpoint = stripped.to_string();
        }

        let host = endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Request {
                key: String::new(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint,
            host,
            bucket,
            region: "auto".to_string(),
            creds: Credentials {
                access_key_id,
                secret_access_key,
            },
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload one object.
    pub async fn put(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), StorageError> {
        let uri = self.object_uri(key);
        let payload_hash = hex_sha256(body);
        let signed = self.sign("PUT", &uri, "", &payload_hash);

        let response = self
            .client
            .put(format!("{}{}", self.endpoint, uri))
            .header("Authorization", &signed.authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &signed.amz_date)
            .header("Content-Type", content_type)
            .header("Cache-Control", cache_control)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| request_error(key, e))?;

        if !response.status().is_success() {
            return Err(StorageError::Status {
                key: key.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    /// Fetch one object. `Ok(None)` for a missing key.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let uri = self.object_uri(key);
        let payload_hash = hex_sha256(b"");
        let signed = self.sign("GET", &uri, "", &payload_hash);

        let response = self
            .client
            .get(format!("{}{}", self.endpoint, uri))
            .header("Authorization", &signed.authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &signed.amz_date)
            .send()
            .await
            .map_err(|e| request_error(key, e))?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StorageError::Status {
                key: key.to_string(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(|e| request_error(key, e))?;
        Ok(Some(bytes.to_vec()))
    }

    /// Delete one object. Deleting a missing key succeeds (S3 semantics).
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let uri = self.object_uri(key);
        let payload_hash = hex_sha256(b"");
        let signed = self.sign("DELETE", &uri, "", &payload_hash);

        let response = self
            .client
            .delete(format!("{}{}", self.endpoint, uri))
            .header("Authorization", &signed.authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &signed.amz_date)
            .send()
            .await
            .map_err(|e| request_error(key, e))?;

        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(StorageError::Status {
                key: key.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    /// List every key in the bucket, following `ListObjectsV2` continuation
    /// tokens until the listing is complete.
    pub async fn list_all(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("list-type", "2".to_string()),
                ("max-keys", "1000".to_string()),
            ];
            if let Some(token) = &continuation {
                query.push(("continuation-token", token.clone()));
            }
            query.sort_by(|a, b| a.0.cmp(b.0));

            let query_string: String = query
                .iter()
                .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
                .collect::<Vec<_>>()
                .join("&");

            let uri = format!("/{}/", self.bucket);
            let payload_hash = hex_sha256(b"");
            let signed = self.sign("GET", &uri, &query_string, &payload_hash);

            let response = self
                .client
                .get(format!("{}{}?{}", self.endpoint, uri, query_string))
                .header("Authorization", &signed.authorization)
                .header("x-amz-content-sha256", &payload_hash)
                .header("x-amz-date", &signed.amz_date)
                .send()
                .await
                .map_err(|e| request_error("(list)", e))?;

            if !response.status().is_success() {
                return Err(StorageError::Status {
                    key: "(list)".to_string(),
                    status: response.status().as_u16(),
                });
            }

            let xml = response.text().await.map_err(|e| request_error("(list)", e))?;
            keys.extend(extract_tag_values(&xml, "Key"));

            let truncated = extract_tag_value(&xml, "IsTruncated")
                .map(|v| v == "true")
                .unwrap_or(false);
            if truncated {
                continuation = extract_tag_value(&xml, "NextContinuationToken");
                if continuation.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(keys)
    }

    fn object_uri(&self, key: &str) -> String {
        let encoded: String = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        format!("/{}/{}", self.bucket, encoded)
    }

    /// Produce the SigV4 `Authorization` header for one request. The signed
    /// header set is fixed (`host`, `x-amz-content-sha256`, `x-amz-date`);
    /// content headers ride along unsigned, which SigV4 permits.
    fn sign(
        &self,
        method: &str,
        canonical_uri: &str,
        canonical_query: &str,
        payload_hash: &str,
    ) -> Signed {
        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let canonical_headers = format!(
            "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
            self.host, payload_hash, amz_date
        );
        let signed_headers = "host;x-amz-content-sha256;x-amz-date";

        let canonical_request = format!(
            "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.creds.secret_access_key,
            &date_stamp,
            &self.region,
            "s3",
        );
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.creds.access_key_id, credential_scope, signed_headers, signature
        );

        Signed {
            authorization,
            amz_date,
        }
    }
}

struct Signed {
    authorization: String,
    amz_date: String,
}

fn request_error(key: &str, e: reqwest::Error) -> StorageError {
    StorageError::Request {
        key: key.to_string(),
        message: e.to_string(),
    }
}

// ============================================================================
// SigV4 primitives
// ============================================================================

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the SigV4 signing key:
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{secret_key}").as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode per RFC 3986: everything except unreserved characters.
fn uri_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

// ============================================================================
// Minimal XML extraction (ListObjectsV2 responses)
// ============================================================================

/// Text content of the first `<tag>` occurrence.
fn extract_tag_value(xml: &str, tag: &str) -> Option<String> {
    extract_tag_values(xml, tag).into_iter().next()
}

/// Text content of every `<tag>` occurrence, in document order.
pub fn extract_tag_values(xml: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut values = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let value_start = start + open.len();
        let Some(end) = rest[value_start..].find(&close) else {
            break;
        };
        values.push(rest[value_start..value_start + end].to_string());
        rest = &rest[value_start + end + close.len()..];
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_encode_preserves_unreserved() {
        assert_eq!(uri_encode("glossary/data-lake"), "glossary%2Fdata-lake");
        assert_eq!(uri_encode("index.html"), "index.html");
        assert_eq!(uri_encode("a b"), "a%20b");
    }

    #[test]
    fn signing_key_matches_aws_reference_vector() {
        // Known vector from the AWS SigV4 documentation.
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20150830",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn hex_sha256_of_empty_payload() {
        // The canonical empty-body hash that appears in every signed GET.
        assert_eq!(
            hex_sha256(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn extract_tag_values_walks_document_order() {
        let xml = "<ListBucketResult>\
                   <Contents><Key>a/index.html</Key></Contents>\
                   <Contents><Key>b/index.html</Key></Contents>\
                   <IsTruncated>false</IsTruncated>\
                   </ListBucketResult>";
        assert_eq!(
            extract_tag_values(xml, "Key"),
            vec!["a/index.html", "b/index.html"]
        );
        assert_eq!(extract_tag_value(xml, "IsTruncated").as_deref(), Some("false"));
        assert!(extract_tag_values(xml, "NextContinuationToken").is_empty());
    }

    #[test]
    fn extract_tag_handles_unclosed_tag() {
        assert!(extract_tag_values("<Key>oops", "Key").is_empty());
    }
}
