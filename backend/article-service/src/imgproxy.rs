// imgproxy URL signing - HMAC-SHA256 over salt + processing path
// Pure function of (storage path, variant); no I/O.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::ImgProxyConfig;
use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Named resize presets for cover images
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageVariant {
    #[default]
    Cover,
    Large,
    Medium,
    Small,
}

impl ImageVariant {
    pub fn options(self) -> &'static str {
        match self {
            ImageVariant::Cover => "/rs:fit:350:350/q:80",
            ImageVariant::Large => "/rs:fit:876:876/q:80",
            ImageVariant::Medium => "/rs:fit:520:520/q:80",
            ImageVariant::Small => "/rs:fit:136:136/q:80",
        }
    }
}

/// Signs storage paths into public imgproxy URLs
#[derive(Clone)]
pub struct ImgProxy {
    mac: HmacSha256,
    salt: Vec<u8>,
    base_url: String,
}

impl std::fmt::Debug for ImgProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImgProxy")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ImgProxy {
    /// `key_hex` and `salt_hex` are the hex strings imgproxy is configured with
    pub fn new(key_hex: &str, salt_hex: &str, base_url: impl Into<String>) -> Result<Self> {
        let key = hex::decode(key_hex.trim())
            .map_err(|e| AppError::Internal(format!("Invalid IMGPROXY_KEY: {}", e)))?;
        let salt = hex::decode(salt_hex.trim())
            .map_err(|e| AppError::Internal(format!("Invalid IMGPROXY_SALT: {}", e)))?;
        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| AppError::Internal(format!("HMAC error: {}", e)))?;

        Ok(Self {
            mac,
            salt,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &ImgProxyConfig) -> Result<Self> {
        Self::new(&config.key, &config.salt, config.base_url.clone())
    }

    /// `{base_url}{signature}{options}/{base64(path)}`
    pub fn url(&self, storage_path: &str, variant: ImageVariant) -> String {
        let path = format!("{}/{}", variant.options(), STANDARD.encode(storage_path));

        let mut mac = self.mac.clone();
        mac.update(&self.salt);
        mac.update(path.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}{}{}", self.base_url, signature, path)
    }
}
