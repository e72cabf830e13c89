use s3::creds::Credentials;
use s3::{Bucket, Region};
use uuid::Uuid;

const UPLOAD_PREFIX: &str = "user_uploads";

/// Public-read S3 bucket holding user photos the face-swap provider fetches.
pub struct PhotoStore {
    bucket: Box<Bucket>,
    public_base: String,
}

impl PhotoStore {
    /// `endpoint` overrides the AWS endpoint for S3-compatible stores.
    pub fn new(
        bucket_name: &str,
        region: &str,
        endpoint: Option<&str>,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let (region, public_base) = match endpoint {
            Some(endpoint) => {
                let endpoint = endpoint.trim_end_matches('/');
                (
                    Region::Custom {
                        region: region.to_string(),
                        endpoint: endpoint.to_string(),
                    },
                    format!("{}/{}", endpoint, bucket_name),
                )
            }
            None => (
                region
                    .parse::<Region>()
                    .map_err(|e| StorageError::Config(e.to_string()))?,
                format!("https://{}.s3.{}.amazonaws.com", bucket_name, region),
            ),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let mut bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;
        if endpoint.is_some() {
            bucket = bucket.with_path_style();
        }
        bucket.add_header("x-amz-acl", "public-read");

        Ok(Self {
            bucket,
            public_base,
        })
    }

    /// Upload a photo under a fresh key and return its public URL.
    pub async fn upload(
        &self,
        data: &[u8],
        extension: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let key = object_key(extension);
        let response = self
            .bucket
            .put_object_with_content_type(&key, data, content_type)
            .await?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StorageError::Rejected(status));
        }

        tracing::info!(%key, size = data.len(), "Uploaded user photo");
        Ok(format!("{}/{}", self.public_base, key))
    }
}

/// Object key for a new upload, e.g. `user_uploads/<uuid>.jpg`.
pub fn object_key(extension: &str) -> String {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        format!("{}/{}", UPLOAD_PREFIX, Uuid::new_v4())
    } else {
        format!("{}/{}.{}", UPLOAD_PREFIX, Uuid::new_v4(), extension)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("S3 upload returned status {0}")]
    Rejected(u16),

    #[error("Storage configuration error: {0}")]
    Config(String),
}
