use crate::config::StorageBackend;
use crate::services::storage::{LocalStorageService, S3StorageService, StorageService};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(backend: &StorageBackend) -> anyhow::Result<Arc<dyn StorageService>> {
    match backend {
        StorageBackend::Local { root } => {
            let storage = LocalStorageService::new(root).await?;
            info!("💽 Local Storage: {}", storage.root().display());
            Ok(Arc::new(storage))
        }
        StorageBackend::S3 {
            endpoint,
            access_key,
            secret_key,
            bucket,
            region,
        } => {
            info!("☁️  S3 Storage: {} (Bucket: {})", endpoint, bucket);

            let aws_config = aws_config::from_env()
                .endpoint_url(endpoint)
                .region(Region::new(region.clone()))
                .credentials_provider(aws_sdk_s3::config::Credentials::new(
                    access_key.clone(),
                    secret_key.clone(),
                    None,
                    None,
                    "static",
                ))
                .load()
                .await;

            let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true)
                .build();

            let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

            // Ensure bucket exists
            match s3_client.head_bucket().bucket(bucket).send().await {
                Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
                Err(_) => {
                    info!("🪣 Bucket '{}' not found, creating...", bucket);
                    if let Err(e) = s3_client.create_bucket().bucket(bucket).send().await {
                        tracing::error!("❌ Failed to create bucket '{}': {}", bucket, e);
                    } else {
                        info!("✅ Bucket '{}' created successfully", bucket);
                    }
                }
            }

            Ok(Arc::new(S3StorageService::new(s3_client, bucket.clone())))
        }
    }
}
