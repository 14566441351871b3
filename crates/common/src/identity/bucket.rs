use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Bucket segment of the shared, published namespace.
pub const PUBLIC_BUCKET: &str = "public";

/// Length of a derived bucket id: 32 HMAC bytes in unpadded base64url.
pub const BUCKET_ID_LEN: usize = 43;

/// Shape check for a bucket URL segment.
pub fn is_valid_bucket_id(id: &str) -> bool {
    id == PUBLIC_BUCKET
        || (id.len() == BUCKET_ID_LEN
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'))
}

/// A caller's home bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(rename = "bucket")]
    pub id: String,
    /// `<ownerBucket>/appdata/<sourceDeployment>` for deployment-scoped callers
    #[serde(rename = "appdata", default, skip_serializing_if = "Option::is_none")]
    pub app_data_path: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BucketError {
    #[error("bucket secret must not be empty")]
    EmptySecret,
    #[error("invalid bucket secret: {0}")]
    InvalidSecret(String),
}

/// Derives bucket ids from original keys.
///
/// The id is `base64url(HMAC-SHA256(secret, original_key))`, so it is stable
/// for a key across calls and processes sharing the secret, and the key can't
/// be recovered from it.
#[derive(Clone)]
pub struct BucketResolver {
    mac: HmacSha256,
}

impl BucketResolver {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, BucketError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(BucketError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| BucketError::InvalidSecret(e.to_string()))?;
        Ok(Self { mac })
    }

    pub fn bucket_id(&self, original_key: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(original_key.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    pub fn resolve(&self, original_key: &str, source_deployment: Option<&str>) -> Bucket {
        let id = self.bucket_id(original_key);
        let app_data_path = source_deployment.map(|deployment| format!("{}/appdata/{}", id, deployment));
        Bucket { id, app_data_path }
    }
}

impl std::fmt::Debug for BucketResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketResolver").finish_non_exhaustive()
    }
}
