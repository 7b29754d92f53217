use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::dto::ImageAsset;

pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Client surface a workflow is driven from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Web,
    Mobile,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported file type {0:?}, please pick an image")]
    UnsupportedType(String),

    #[error("image is empty")]
    Empty,

    #[error("image is too large: {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: u64, max: u64 },

    /// Upload stopped before its size was known.
    #[error("image is too large: it exceeds the {max} byte limit")]
    ExceedsLimit { max: u64 },
}

/// Input rules applied to a picked image before anything is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRules {
    /// `None` means unbounded.
    pub max_bytes: Option<u64>,
}

impl Default for ImageRules {
    fn default() -> Self {
        Self {
            max_bytes: Some(DEFAULT_MAX_IMAGE_BYTES),
        }
    }
}

impl ImageRules {
    pub fn unbounded() -> Self {
        Self { max_bytes: None }
    }

    pub fn with_max_bytes(max: u64) -> Self {
        Self {
            max_bytes: Some(max),
        }
    }

    pub fn validate(&self, asset: &ImageAsset) -> Result<(), ValidationError> {
        if !is_image_type(&asset.content_type) {
            return Err(ValidationError::UnsupportedType(asset.content_type.clone()));
        }
        if asset.bytes.is_empty() {
            return Err(ValidationError::Empty);
        }
        if let Some(max) = self.max_bytes {
            let size = asset.size();
            if size > max {
                return Err(ValidationError::TooLarge { size, max });
            }
        }
        Ok(())
    }
}

fn is_image_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.split_once('/') {
        Some(("image", sub)) => !sub.is_empty(),
        _ => false,
    }
}
