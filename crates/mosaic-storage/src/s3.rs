//! S3-compatible object store client (MinIO and friends)
//!
//! Requests use path-style addressing (`{endpoint}/{bucket}/{key}`) and are
//! signed with SigV4.

use crate::sigv4::{self, CanonicalRequest, SigningParams};
use crate::{ObjectStore, Result, StorageError, StoredObject, DEFAULT_CONTENT_TYPE};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::{Client, Method, Response, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Connection settings for an S3-compatible server
#[derive(Clone)]
pub struct S3Config {
    /// Base URL, e.g. `http://localhost:9000`
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            region: "us-east-1".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("region", &self.region)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Object store speaking the S3 REST API
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: Client,
    config: S3Config,
    endpoint: Url,
}

impl S3ObjectStore {
    /// Create a new client; no request is made until first use
    pub fn new(config: S3Config) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| StorageError::Configuration(format!("invalid endpoint: {}", e)))?;

        if endpoint.host_str().is_none() {
            return Err(StorageError::Configuration(
                "endpoint must include a host".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    /// Public URL of the server
    pub fn endpoint(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    async fn send(
        &self,
        method: Method,
        bucket: &str,
        key: Option<&str>,
        query: &[(&str, &str)],
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<Response> {
        let raw_path = match key {
            Some(key) => format!("/{}/{}", bucket, key),
            None => format!("/{}", bucket),
        };
        let base_path = self.endpoint.path().trim_end_matches('/');
        let path = format!("{}{}", base_path, sigv4::encode_path(&raw_path));

        let query: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let query_string = query
            .iter()
            .map(|(k, v)| format!("{}={}", sigv4::uri_encode(k), sigv4::uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let mut url = self.endpoint.clone();
        url.set_path(&path);
        url.set_query(if query_string.is_empty() {
            None
        } else {
            Some(&query_string)
        });

        let now = Utc::now();
        let payload_hash = sigv4::sha256_hex(&body);
        let amz_date = sigv4::amz_date(now);

        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), self.host_header());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        headers.insert("x-amz-date".to_string(), amz_date.clone());

        let canonical = CanonicalRequest {
            method: method.as_str().to_string(),
            path,
            query,
            headers,
            payload_hash: payload_hash.clone(),
        };
        let params = SigningParams {
            access_key: &self.config.access_key,
            secret_key: &self.config.secret_key,
            region: &self.config.region,
            service: "s3",
            time: now,
        };
        let authorization = sigv4::authorization(&canonical, &params)?;

        debug!(method = %method, url = %url, "S3 request");

        let mut request = self
            .client
            .request(method, url)
            .header("x-amz-content-sha256", payload_hash)
            .header("x-amz-date", amz_date)
            .header("authorization", authorization);

        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }

        Ok(request.body(body).send().await?)
    }

    async fn api_error(response: Response) -> StorageError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        warn!(status, "S3 API error");
        StorageError::S3Api { status, message }
    }
}

/// Bucket policy granting anonymous `s3:GetObject`
pub fn public_read_policy(bucket: &str) -> serde_json::Value {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"AWS": ["*"]},
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{}/*", bucket)]
        }]
    })
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let response = self
            .send(Method::HEAD, bucket, None, &[], Bytes::new(), None)
            .await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::api_error(response).await),
        }
    }

    #[instrument(skip(self))]
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let response = self
            .send(Method::PUT, bucket, None, &[], Bytes::new(), None)
            .await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(StorageError::BucketAlreadyExists(bucket.to_string())),
            _ => Err(Self::api_error(response).await),
        }
    }

    #[instrument(skip(self))]
    async fn set_public_read(&self, bucket: &str) -> Result<()> {
        let policy = serde_json::to_vec(&public_read_policy(bucket))?;
        let response = self
            .send(
                Method::PUT,
                bucket,
                None,
                &[("policy", "")],
                Bytes::from(policy),
                Some("application/json"),
            )
            .await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StorageError::BucketNotFound(bucket.to_string())),
            _ => Err(Self::api_error(response).await),
        }
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()> {
        let response = self
            .send(Method::PUT, bucket, Some(key), &[], data, Some(content_type))
            .await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StorageError::BucketNotFound(bucket.to_string())),
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        let response = self
            .send(Method::GET, bucket, Some(key), &[], Bytes::new(), None)
            .await?;
        match response.status() {
            s if s.is_success() => {
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                let data = response.bytes().await?;
                Ok(StoredObject { data, content_type })
            }
            StatusCode::NOT_FOUND => Err(StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            _ => Err(Self::api_error(response).await),
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let response = self
            .send(Method::DELETE, bucket, Some(key), &[], Bytes::new(), None)
            .await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            _ => Err(Self::api_error(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> S3ObjectStore {
        S3ObjectStore::new(S3Config {
            endpoint: server.uri(),
            access_key: "minio".to_string(),
            secret_key: "minio-secret".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_bucket_exists() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/media"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = client(&server);
        assert!(store.bucket_exists("media").await.unwrap());
        assert!(!store.bucket_exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_bucket_and_policy() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/media"))
            .and(query_param_is_missing("policy"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/media"))
            .and(query_param("policy", ""))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = client(&server);
        store.create_bucket("media").await.unwrap();
        store.set_public_read("media").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_bucket_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/media"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let err = client(&server).create_bucket("media").await.unwrap_err();
        assert!(matches!(err, StorageError::BucketAlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_put_and_get_object() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/media/abc.png"))
            .and(header("content-type", "image/png"))
            .and(header_exists("x-amz-date"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/media/abc.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"png-bytes".to_vec()),
            )
            .mount(&server)
            .await;

        let store = client(&server);
        store
            .put_object("media", "abc.png", Bytes::from_static(b"png-bytes"), "image/png")
            .await
            .unwrap();

        let object = store.get_object("media", "abc.png").await.unwrap();
        assert_eq!(object.data.as_ref(), b"png-bytes");
        assert_eq!(object.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_get_missing_and_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/media/broken.png"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let store = client(&server);
        assert!(store.get_object("media", "gone.png").await.unwrap_err().is_not_found());

        match store.get_object("media", "broken.png").await.unwrap_err() {
            StorageError::S3Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/media/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        client(&server).delete_object("media", "gone.png").await.unwrap();
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = S3ObjectStore::new(S3Config {
            endpoint: "not a url".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(StorageError::Configuration(_))));
    }

    #[test]
    fn test_public_policy_shape() {
        let policy = public_read_policy("media");
        assert_eq!(policy["Statement"][0]["Action"][0], "s3:GetObject");
        assert_eq!(policy["Statement"][0]["Resource"][0], "arn:aws:s3:::media/*");
    }
}
