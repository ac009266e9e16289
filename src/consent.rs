//! Consent cookie file management for the subprocess extractor.
//!
//! The extractor accepts a Netscape-format cookie file. When the operator
//! configures one it is used as-is (and ignored when the path doesn't
//! exist); otherwise a minimal consent-only cookie file is written under
//! the cache directory so caption endpoints don't serve the EU consent
//! interstitial.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Netscape cookie file contents carrying only the consent cookie.
const CONSENT_COOKIE_FILE: &str = "# Netscape HTTP Cookie File\n\
.youtube.com\tTRUE\t/\tFALSE\t2145916800\tCONSENT\tYES+cb.20210328-17-p0.en+FX+888\n";

/// Resolve the cookie file handed to the extractor.
///
/// Order: an existing configured file wins; a configured but missing file
/// is ignored; otherwise a consent-only file is created (once) under
/// `cache_dir` and reused.
pub fn resolve_cookie_file(configured: Option<&Path>, cache_dir: &Path) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "configured cookie file does not exist, ignoring");
    }

    let consent_path = cache_dir.join("consent_cookies.txt");
    if consent_path.is_file() {
        return Some(consent_path);
    }

    if let Err(e) = fs::create_dir_all(cache_dir) {
        warn!(error = %e, "could not create cache directory for consent cookie file");
        return None;
    }
    match fs::write(&consent_path, CONSENT_COOKIE_FILE) {
        Ok(()) => Some(consent_path),
        Err(e) => {
            warn!(error = %e, "could not write consent cookie file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_consent_file_when_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let path = resolve_cookie_file(None, dir.path()).unwrap();
        assert!(path.is_file());

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# Netscape HTTP Cookie File"));
        assert!(contents.contains("CONSENT"));

        // Second resolution reuses the same file.
        assert_eq!(resolve_cookie_file(None, dir.path()).unwrap(), path);
    }

    #[test]
    fn test_existing_configured_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let configured = dir.path().join("cookies.txt");
        fs::write(&configured, "# my cookies\n").unwrap();

        let path = resolve_cookie_file(Some(&configured), dir.path()).unwrap();
        assert_eq!(path, configured);
    }

    #[test]
    fn test_missing_configured_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let configured = dir.path().join("nope.txt");
        let path = resolve_cookie_file(Some(&configured), dir.path()).unwrap();
        assert_ne!(path, configured);
        assert!(path.is_file());
    }
}
