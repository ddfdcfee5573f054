use crate::error::InstallerError;
use std::fs;
use std::path::Path;

const USER_AGENT: &str = concat!("zerobrew-installer/", env!("CARGO_PKG_VERSION"));

pub trait Download: Send + Sync {
    fn download(&self, url: &str, dest: &Path) -> Result<(), InstallerError>;
}

pub struct HttpDownloader;

impl Download for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), InstallerError> {
        if !url.starts_with("https://") {
            return Err(InstallerError::NetworkOrPermission {
                operation: format!("downloading {url}"),
                message: "refusing to fetch over a non-HTTPS URL".to_string(),
                hint: Some("set toolchain.bootstrap_url to an https:// address".to_string()),
            });
        }
        let client = reqwest::blocking::Client::new();
        let response = client.get(url).header("User-Agent", USER_AGENT).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(InstallerError::NetworkOrPermission {
                operation: format!("downloading {url}"),
                message: format!("HTTP {status}"),
                hint: None,
            });
        }
        let bytes = response.bytes()?;
        fs::write(dest, &bytes)?;
        tracing::debug!(url, bytes = bytes.len(), "download complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_http_is_rejected_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("script");
        let err = HttpDownloader
            .download("http://sh.rustup.rs", &dest)
            .expect_err("http must be refused");
        assert!(err.to_string().contains("non-HTTPS"));
        assert!(!dest.exists());
    }
}
