use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use url::Url;

/// Byte storage for uploaded files.
///
/// `upload_file` returns the location string that is persisted on the File Record;
/// `get_file` must accept any location previously returned by the same backend.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn upload_file(&self, key: &str, data: Bytes) -> Result<String>;
    async fn get_file(&self, location: &str) -> Result<Vec<u8>>;
    async fn health_check(&self) -> bool;
}

/// Stores files below a directory on the local filesystem.
/// Locations are `file://` URLs.
pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    /// Creates the root directory if needed. The root is canonicalized so that
    /// locations are absolute.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        tokio::fs::create_dir_all(root)
            .await
            .with_context(|| format!("Failed to create upload directory {}", root.display()))?;
        let root = tokio::fs::canonicalize(root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, location: &str) -> Result<PathBuf> {
        let url = Url::parse(location).with_context(|| format!("Invalid location '{}'", location))?;
        if url.scheme() != "file" {
            bail!("Location '{}' is not a local file", location);
        }
        let path = url
            .to_file_path()
            .map_err(|_| anyhow!("Location '{}' has no file path", location))?;
        if !path.starts_with(&self.root) {
            bail!("Location '{}' is outside the upload directory", location);
        }
        Ok(path)
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn upload_file(&self, key: &str, data: Bytes) -> Result<String> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        let url = Url::from_file_path(&path)
            .map_err(|_| anyhow!("Cannot build file URL for {}", path.display()))?;
        Ok(url.to_string())
    }

    async fn get_file(&self, location: &str) -> Result<Vec<u8>> {
        let path = self.resolve(location)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    async fn health_check(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }
}

/// S3-compatible object storage. Locations are `s3://bucket/key` URLs.
pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    fn key_of<'a>(&self, location: &'a str) -> Result<&'a str> {
        let rest = location
            .strip_prefix("s3://")
            .ok_or_else(|| anyhow!("Location '{}' is not an s3 URL", location))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| anyhow!("Location '{}' has no object key", location))?;
        if bucket != self.bucket {
            bail!(
                "Location '{}' belongs to bucket '{}', expected '{}'",
                location,
                bucket,
                self.bucket
            );
        }
        Ok(key)
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn upload_file(&self, key: &str, data: Bytes) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(format!("s3://{}/{}", self.bucket, key))
    }

    async fn get_file(&self, location: &str) -> Result<Vec<u8>> {
        let key = self.key_of(location)?;
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        let data = res.body.collect().await?.to_vec();
        Ok(data)
    }

    async fn health_check(&self) -> bool {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path()).await.unwrap();

        let location = storage
            .upload_file("uploads/abc.pdf", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert!(location.starts_with("file://"));
        assert!(location.ends_with("/uploads/abc.pdf"));

        let data = storage.get_file(&location).await.unwrap();
        assert_eq!(data, b"hello");
        assert!(storage.health_check().await);
    }

    #[tokio::test]
    async fn test_local_rejects_foreign_locations() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path()).await.unwrap();

        assert!(storage.get_file("file:///etc/passwd").await.is_err());
        assert!(storage.get_file("s3://bucket/key").await.is_err());
        assert!(storage.get_file("not a url").await.is_err());
    }

    #[tokio::test]
    async fn test_local_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageService::new(dir.path()).await.unwrap();
        let location = Url::from_file_path(storage.root().join("gone.pdf"))
            .unwrap()
            .to_string();
        assert!(storage.get_file(&location).await.is_err());
    }

    #[test]
    fn test_s3_key_of() {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        let storage = S3StorageService::new(Client::from_conf(config), "files".to_string());

        assert_eq!(
            storage.key_of("s3://files/uploads/a.pdf").unwrap(),
            "uploads/a.pdf"
        );
        assert!(storage.key_of("s3://other/uploads/a.pdf").is_err());
        assert!(storage.key_of("s3://files").is_err());
        assert!(storage.key_of("file:///tmp/a.pdf").is_err());
    }
}
