//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which object store backs uploaded media
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStoreKind {
    /// Process memory, lost on restart
    #[default]
    Memory,
    /// Local directory tree
    Fs,
    /// S3-compatible server such as MinIO
    S3,
}

/// Server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// PostgreSQL connection URL; the in-memory store is used when absent
    pub database_url: Option<String>,
    /// Pool size for the database
    pub database_max_connections: u32,
    /// Object store backend
    pub object_store: ObjectStoreKind,
    /// S3 endpoint, with or without scheme
    pub s3_endpoint: String,
    pub s3_access_key: String,
    #[serde(skip_serializing)]
    pub s3_secret_key: String,
    pub s3_region: String,
    /// Use https when the endpoint has no scheme
    pub s3_secure: bool,
    /// Root directory for the filesystem backend
    pub objects_root: PathBuf,
    /// Bucket receiving uploads
    pub media_bucket: String,
    /// Base of public object URLs; derived from the backend when absent
    pub public_base_url: Option<String>,
    /// Secret for signing bearer tokens
    #[serde(skip_serializing)]
    pub jwt_secret: Option<String>,
    /// Generate a random signing secret at startup (development only)
    pub dev_secret: bool,
    /// Token lifetime in hours
    pub token_validity_hours: i64,
    /// Rate limit (requests per second per client)
    pub rate_limit_rps: u32,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Enable CORS
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_url: None,
            database_max_connections: 10,
            object_store: ObjectStoreKind::Memory,
            s3_endpoint: "localhost:9000".to_string(),
            s3_access_key: String::new(),
            s3_secret_key: String::new(),
            s3_region: "us-east-1".to_string(),
            s3_secure: false,
            objects_root: PathBuf::from("./data/objects"),
            media_bucket: mosaic_storage::DEFAULT_BUCKET.to_string(),
            public_base_url: None,
            jwt_secret: None,
            dev_secret: false,
            token_validity_hours: mosaic_crypto::DEFAULT_TOKEN_VALIDITY_HOURS,
            rate_limit_rps: 100,
            max_body_size: 20 * 1024 * 1024, // 20 MB
            cors_enabled: true,
        }
    }
}

impl ServerConfig {
    /// Load from defaults, an optional TOML file and `MOSAIC_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder
            .add_source(config::Environment::with_prefix("MOSAIC").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// S3 endpoint with an explicit scheme
    pub fn s3_url(&self) -> String {
        if self.s3_endpoint.contains("://") {
            self.s3_endpoint.trim_end_matches('/').to_string()
        } else {
            let scheme = if self.s3_secure { "https" } else { "http" };
            format!("{}://{}", scheme, self.s3_endpoint.trim_end_matches('/'))
        }
    }

    /// Base that object keys are appended to (`<base>/<bucket>/<key>`)
    pub fn public_base(&self) -> String {
        if let Some(base) = &self.public_base_url {
            return base.trim_end_matches('/').to_string();
        }
        match self.object_store {
            ObjectStoreKind::S3 => self.s3_url(),
            ObjectStoreKind::Memory | ObjectStoreKind::Fs => {
                let host = match self.host.as_str() {
                    "0.0.0.0" | "::" | "[::]" => "localhost",
                    other => other,
                };
                format!("http://{}:{}/objects", host, self.port)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.media_bucket, "media");
        assert_eq!(config.token_validity_hours, 24);
        assert!(config.jwt_secret.is_none());
    }

    #[rstest]
    #[case("localhost:9000", false, "http://localhost:9000")]
    #[case("minio.internal:9000", true, "https://minio.internal:9000")]
    #[case("https://s3.example.com/", false, "https://s3.example.com")]
    fn test_s3_url(#[case] endpoint: &str, #[case] secure: bool, #[case] expected: &str) {
        let config = ServerConfig {
            s3_endpoint: endpoint.to_string(),
            s3_secure: secure,
            ..Default::default()
        };
        assert_eq!(config.s3_url(), expected);
    }

    #[test]
    fn test_public_base_local_backend() {
        let config = ServerConfig {
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.public_base(), "http://localhost:8080/objects");
    }

    #[test]
    fn test_public_base_s3_backend() {
        let config = ServerConfig {
            object_store: ObjectStoreKind::S3,
            s3_endpoint: "minio:9000".to_string(),
            ..Default::default()
        };
        assert_eq!(config.public_base(), "http://minio:9000");
    }

    #[test]
    fn test_public_base_override() {
        let config = ServerConfig {
            public_base_url: Some("https://cdn.example.com/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.public_base(), "https://cdn.example.com");
    }

    #[test]
    fn test_load_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mosaic.toml");
        std::fs::write(
            &path,
            "port = 9100\nobject_store = \"fs\"\nmedia_bucket = \"photos\"\n",
        )
        .unwrap();

        let config = ServerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.object_store, ObjectStoreKind::Fs);
        assert_eq!(config.media_bucket, "photos");
        assert_eq!(config.rate_limit_rps, 100);
    }
}
