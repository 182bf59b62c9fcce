//! API server configuration.

use std::path::PathBuf;

use crate::serializers::ValidationRules;

/// Configuration for the API server, built once at process start.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8000").
    pub bind_addr: String,
    /// Path prefix all API routes are served under. `/` serves them at the root.
    pub api_prefix: String,
    /// Directory uploaded files are written to and served from under `/media`.
    pub media_root: PathBuf,
    /// Largest accepted image upload in bytes.
    pub max_upload_bytes: usize,
    /// Minimum password length on account create and update.
    pub min_password_length: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".into(),
            api_prefix: "/api".into(),
            media_root: PathBuf::from("media"),
            max_upload_bytes: 10 * 1024 * 1024,
            min_password_length: 5,
        }
    }
}

impl ApiConfig {
    pub fn validation_rules(&self) -> ValidationRules {
        ValidationRules {
            min_password_length: self.min_password_length,
        }
    }

    /// The API prefix with a leading slash and no trailing slash. Empty means
    /// the routes live at the root.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.api_prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }
}
