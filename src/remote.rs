use std::fs::File;
use std::time::Duration;

use camino::Utf8Path;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::HarvestError;

/// Remote directory fetcher. Enumerates the remote subtree rooted at
/// `remote_subpath`, downloads every entry whose base name satisfies the
/// predicate into `local_dir` (flattening the tree) and returns the number
/// of files transferred. An unreachable root is fatal to the whole run.
pub trait RemoteSource: Send + Sync {
    fn download_dir(
        &self,
        remote_subpath: &str,
        local_dir: &Utf8Path,
        predicate: &dyn Fn(&str) -> bool,
    ) -> Result<usize, HarvestError>;
}

pub struct HttpRemoteSource {
    client: Client,
    base_url: String,
}

impl HttpRemoteSource {
    pub fn new(base_url: &str) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("dbgap-harvest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HarvestError::RemoteHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| HarvestError::RemoteHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Entry names from one directory index page. Subdirectories keep their
    /// trailing slash; navigation and absolute links are dropped.
    fn list_entries(&self, dir_url: &str) -> Result<Vec<String>, HarvestError> {
        let response = self
            .client
            .get(dir_url)
            .send()
            .map_err(|err| HarvestError::RemoteHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "remote listing failed".to_string());
            return Err(HarvestError::RemoteStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| HarvestError::RemoteHttp(err.to_string()))?;
        let href = Regex::new(r#"href="([^"]+)""#).unwrap();
        let entries = href
            .captures_iter(&body)
            .map(|captures| captures[1].to_string())
            .filter(|link| {
                !link.starts_with('/')
                    && !link.starts_with('?')
                    && !link.starts_with('#')
                    && !link.starts_with("..")
                    && !link.contains("://")
            })
            .collect();
        Ok(entries)
    }

    fn download_file(&self, file_url: &str, destination: &Utf8Path) -> Result<(), HarvestError> {
        let mut response = self
            .client
            .get(file_url)
            .send()
            .map_err(|err| HarvestError::RemoteHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "remote download failed".to_string());
            return Err(HarvestError::RemoteStatus { status, message });
        }
        let mut file = File::create(destination.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

impl RemoteSource for HttpRemoteSource {
    fn download_dir(
        &self,
        remote_subpath: &str,
        local_dir: &Utf8Path,
        predicate: &dyn Fn(&str) -> bool,
    ) -> Result<usize, HarvestError> {
        let root_url = format!("{}/{}/", self.base_url, remote_subpath.trim_matches('/'));
        let root_entries = self
            .list_entries(&root_url)
            .map_err(|err| HarvestError::RemoteUnavailable(format!("{root_url}: {err}")))?;

        std::fs::create_dir_all(local_dir.as_std_path())
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;

        let mut transferred = 0usize;
        let mut pending = vec![(root_url, root_entries)];
        while let Some((dir_url, entries)) = pending.pop() {
            for entry in entries {
                if let Some(subdir) = entry.strip_suffix('/') {
                    let sub_url = format!("{dir_url}{subdir}/");
                    let sub_entries = self.list_entries(&sub_url)?;
                    pending.push((sub_url, sub_entries));
                    continue;
                }
                if !predicate(&entry) {
                    continue;
                }
                let file_url = format!("{dir_url}{entry}");
                debug!(url = %file_url, "downloading");
                self.download_file(&file_url, &local_dir.join(&entry))?;
                transferred += 1;
            }
        }
        Ok(transferred)
    }
}
