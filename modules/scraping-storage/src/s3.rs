// S3-compatible object store (Wasabi, AWS, MinIO) with SigV4 request signing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::object_store::{ObjectStore, PutResult};

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "s3";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub struct S3Store {
    http: reqwest::Client,
    endpoint: reqwest::Url,
    access_key_id: String,
    secret_access_key: String,
    region: String,
}

impl S3Store {
    pub fn new(
        endpoint: &str,
        access_key_id: &str,
        secret_access_key: &str,
        region: &str,
    ) -> Result<Self> {
        let endpoint = reqwest::Url::parse(endpoint)
            .map_err(|e| StorageError::Config(format!("invalid endpoint {endpoint}: {e}")))?;
        if endpoint.host_str().is_none() {
            return Err(StorageError::Config(format!("endpoint {endpoint} has no host")));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            region: region.to_string(),
        })
    }

    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Path-style object path, each segment encoded the way SigV4 expects.
    fn object_path(bucket: &str, key: &str) -> String {
        let mut path = format!("/{}", uri_encode(bucket));
        for segment in key.split('/') {
            path.push('/');
            path.push_str(&uri_encode(segment));
        }
        path
    }

    /// Headers for a signed PUT: `(authorization, x-amz-date, x-amz-content-sha256)`.
    fn sign_put(&self, path: &str, body: &[u8], now: DateTime<Utc>) -> Result<SignedHeaders> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let payload_hash = hex::encode(Sha256::digest(body));
        let host = self.host();

        let signed_headers = "host;x-amz-content-sha256;x-amz-date";
        let canonical_request = format!(
            "PUT\n{path}\n\nhost:{host}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n\n{signed_headers}\n{payload_hash}"
        );

        let scope = format!("{date}/{}/{SERVICE}/aws4_request", self.region);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(&self.secret_access_key, &date, &self.region, SERVICE)?;
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

        Ok(SignedHeaders {
            authorization: format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                self.access_key_id
            ),
            amz_date,
            payload_hash,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
    pub payload_hash: String,
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<PutResult> {
        let path = Self::object_path(bucket, key);
        let signed = self.sign_put(&path, &body, Utc::now())?;

        let mut url = self.endpoint.clone();
        url.set_path(&path);
        debug!(%url, bytes = body.len(), "s3: put object");

        let resp = self
            .http
            .put(url)
            .header("authorization", signed.authorization)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.payload_hash)
            .header("content-type", content_type)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                bucket: bucket.to_string(),
                key: key.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        Ok(PutResult {
            status: status.as_u16(),
        })
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::Config(format!("invalid signing key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// SigV4 key derivation: secret → date → region → service → "aws4_request".
pub(crate) fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

/// RFC 3986 encoding: unreserved characters pass through, everything else is %XX.
fn uri_encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
