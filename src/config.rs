// src/config.rs
use std::path::{Path, PathBuf};

/// Runtime configuration consumed by the server core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on, in network byte order as produced by
    /// `syscalls::resolve_port`; 0 lets the kernel pick one.
    pub port: u16,
    /// Directory whose files are served for GET requests.
    pub document_root: PathBuf,
    /// Directory holding the error bodies (`404.html`).
    pub error_documents: PathBuf,
    /// Directory for the access/error logs and the chat log.
    pub logs_dir: PathBuf,
}

impl Config {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            document_root: PathBuf::from("./htdocs"),
            error_documents: PathBuf::from("./error_documents"),
            logs_dir: PathBuf::from("./logs"),
        }
    }

    pub fn access_log_path(&self) -> PathBuf {
        self.logs_dir.join("access.log")
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.logs_dir.join("error.log")
    }

    pub fn chat_log_path(&self) -> PathBuf {
        self.logs_dir.join("chat_log")
    }

    pub fn not_found_page(&self) -> PathBuf {
        self.error_documents.join("404.html")
    }

    /// Maps a request target onto the document root, the plain
    /// concatenation the wire protocol promises.
    pub fn resolve_target(&self, url: &str) -> PathBuf {
        self.document_root.join(url.trim_start_matches('/'))
    }
}
