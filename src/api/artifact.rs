use serde::{Deserialize, Serialize};

use crate::api::opt_int_or_str;

/// One entry of an artifact directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Path relative to the run's artifact root.
    pub path: String,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default, with = "opt_int_or_str", skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
}

impl FileInfo {
    pub fn file(path: impl Into<String>, size: i64) -> Self {
        FileInfo {
            path: path.into(),
            is_dir: false,
            file_size: Some(size),
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        FileInfo {
            path: path.into(),
            is_dir: true,
            file_size: None,
        }
    }
}
