// src/logfile.rs
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Append-only request log with a local-time prefix on every line,
/// e.g. `[02/Aug/2026 13:45:01] GET /missing 404 Not Found`.
pub struct RequestLog {
    file: File,
}

impl RequestLog {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        Ok(Self { file })
    }

    /// Appends one timestamped line. Logging failures are reported as
    /// diagnostics but never disturb the connection being served.
    pub fn append(&mut self, line: &str) {
        let stamped = format!("{}{}\n", Local::now().format("[%d/%b/%Y %H:%M:%S] "), line);
        if let Err(e) = self
            .file
            .write_all(stamped.as_bytes())
            .and_then(|_| self.file.flush())
        {
            tracing::warn!("request log write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_accumulate_with_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");

        let mut log = RequestLog::open(&path).unwrap();
        log.append("GET /index.html 200 OK");
        log.append("GET /missing 404 Not Found");
        drop(log);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("GET /index.html 200 OK"));
        assert!(lines[1].ends_with("GET /missing 404 Not Found"));
        // `[dd/Mon/YYYY HH:MM:SS] ` prefix is 22 chars wide
        assert_eq!(&lines[0][21..23], "] ");
    }

    #[test]
    fn reopening_appends_instead_of_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");

        RequestLog::open(&path).unwrap().append("first");
        RequestLog::open(&path).unwrap().append("second");

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
