use std::path::PathBuf;

use serde::Deserialize;

/// Resumable upload storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct UploadAppConfig {
    /// Directory holding upload data and info files. Default: "./uploads".
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,
    /// Largest accepted declared upload length in bytes. Default: 50 MiB.
    #[serde(default = "default_upload_max_size")]
    pub max_size: u64,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}
fn default_upload_max_size() -> u64 {
    50 * 1024 * 1024
}

impl Default for UploadAppConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            max_size: default_upload_max_size(),
        }
    }
}

/// Which search index implementation backs `/tracks/search`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    /// In-process index, rebuilt from the metadata stores at startup.
    #[default]
    Memory,
    /// Remote Elasticsearch cluster reached over HTTP.
    Elasticsearch,
}

/// Search index configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchAppConfig {
    #[serde(default)]
    pub backend: SearchBackend,
    /// Elasticsearch base URL. Default: "http://localhost:9200".
    #[serde(default = "default_search_url")]
    pub url: String,
    /// Index name. Default: "tracks".
    #[serde(default = "default_search_index")]
    pub index: String,
    /// Number of hits returned by a search (first page only). Default: 10.
    #[serde(default = "default_search_page_size")]
    pub page_size: usize,
}

fn default_search_url() -> String {
    "http://localhost:9200".into()
}
fn default_search_index() -> String {
    "tracks".into()
}
fn default_search_page_size() -> usize {
    10
}

impl Default for SearchAppConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackend::default(),
            url: default_search_url(),
            index: default_search_index(),
            page_size: default_search_page_size(),
        }
    }
}
