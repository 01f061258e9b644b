//! The asset manifest warmed into the static namespace at install.

use url::Url;

use crate::Error;
use crate::request::RequestDescriptor;
use crate::url::{is_http, resolve};

/// Ordered list of resources to preload.
///
/// Entries are same-origin paths (`/index.html`) or absolute URLs on an
/// allow-listed CDN host. The list is fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManifest {
    entries: Vec<String>,
}

impl AssetManifest {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve every entry to a GET request, in manifest order.
    pub fn requests(&self, origin: &Url) -> Result<Vec<RequestDescriptor>, Error> {
        self.entries
            .iter()
            .map(|entry| {
                let url = resolve(entry, Some(origin))?;
                if !is_http(&url) {
                    return Err(Error::InvalidUrl(format!("manifest entry {entry} is not http(s)")));
                }
                Ok(RequestDescriptor::from_url(url))
            })
            .collect()
    }

    /// Check that each external entry points at an allowed host.
    pub fn check_external_hosts(&self, allowed_hosts: &[String]) -> Result<(), String> {
        for entry in self.entries.iter().filter(|e| !e.starts_with('/')) {
            let url = Url::parse(entry).map_err(|e| format!("{entry}: {e}"))?;
            if !is_http(&url) {
                return Err(format!("{entry}: only http(s) URLs are allowed"));
            }
            let host = url.host_str().unwrap_or_default();
            if !allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
                return Err(format!("{entry}: host {host} is not on the CDN allow-list"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://localhost:8080").unwrap()
    }

    #[test]
    fn test_requests_keep_order() {
        let manifest = AssetManifest::new(vec![
            "/".into(),
            "/css/app.css".into(),
            "https://cdn.jsdelivr.net/npm/lib@1/dist/lib.js".into(),
        ]);
        let urls: Vec<String> = manifest
            .requests(&origin())
            .unwrap()
            .into_iter()
            .map(|r| r.url.to_string())
            .collect();
        assert_eq!(
            urls,
            vec![
                "http://localhost:8080/".to_string(),
                "http://localhost:8080/css/app.css".to_string(),
                "https://cdn.jsdelivr.net/npm/lib@1/dist/lib.js".to_string(),
            ]
        );
    }

    #[test]
    fn test_requests_reject_non_http() {
        let manifest = AssetManifest::new(vec!["ftp://example.com/file".into()]);
        assert!(matches!(manifest.requests(&origin()), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_external_host_allow_list() {
        let allowed = vec!["cdn.jsdelivr.net".to_string()];
        let ok = AssetManifest::new(vec!["/".into(), "https://cdn.jsdelivr.net/x.js".into()]);
        assert!(ok.check_external_hosts(&allowed).is_ok());

        let bad = AssetManifest::new(vec!["https://evil.example/x.js".into()]);
        let err = bad.check_external_hosts(&allowed).unwrap_err();
        assert!(err.contains("evil.example"));
    }
}
