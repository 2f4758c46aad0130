//! HTTP resolver.
//!
//! A source URL ending in `.urls` is a manifest: a text file with one URL per
//! line (blank lines and `#` comments ignored, relative URLs resolved against
//! the manifest). Any other http(s) URL is a single file.
//!
//! The format preference filters manifest entries by file extension;
//! `best` (or an empty preference) keeps everything.

use async_trait::async_trait;
use url::Url;

use bulkdl_core::{FileDescriptor, ResolveError, ResolverPort};

use super::{USER_AGENT, file_name};

const MANIFEST_EXTENSION: &str = ".urls";

/// Resolver for plain HTTP sources.
pub struct HttpResolver {
    client: reqwest::Client,
}

impl HttpResolver {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Use a preconfigured client.
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_manifest(&self, url: &Url) -> Result<String, ResolveError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| ResolveError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::network_with_status(
                format!("manifest request failed: {status}"),
                status.as_u16(),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| ResolveError::network(e.to_string()))
    }
}

impl Default for HttpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResolverPort for HttpResolver {
    async fn resolve(
        &self,
        source_url: &str,
        format_preference: &str,
    ) -> Result<Vec<FileDescriptor>, ResolveError> {
        let url = parse_source(source_url)?;

        if !url.path().ends_with(MANIFEST_EXTENSION) {
            let title = file_name(&url).unwrap_or_else(|| url.to_string());
            return Ok(vec![FileDescriptor::new("file", title, url.as_str())]);
        }

        let body = self.fetch_manifest(&url).await?;
        let files = filter_by_format(parse_manifest(&url, &body), format_preference);
        tracing::debug!(target: "bulkdl.http", %url, files = files.len(), "Manifest resolved");
        Ok(files)
    }
}

fn parse_source(source_url: &str) -> Result<Url, ResolveError> {
    let url = Url::parse(source_url)
        .map_err(|e| ResolveError::invalid_source(format!("{source_url}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ResolveError::invalid_source(format!(
            "unsupported scheme '{scheme}'"
        ))),
    }
}

/// Parse a manifest body into descriptors. Unparseable lines are skipped.
fn parse_manifest(base: &Url, body: &str) -> Vec<FileDescriptor> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match base.join(line) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::debug!(target: "bulkdl.http", line, error = %e, "Skipping manifest line");
                None
            }
        })
        .enumerate()
        .map(|(index, url)| {
            let title = file_name(&url).unwrap_or_else(|| format!("file {}", index + 1));
            FileDescriptor::new(format!("{}", index + 1), title, url.as_str())
        })
        .collect()
}

fn filter_by_format(files: Vec<FileDescriptor>, format_preference: &str) -> Vec<FileDescriptor> {
    let format = format_preference.trim().trim_start_matches('.');
    if format.is_empty() || format.eq_ignore_ascii_case("best") {
        return files;
    }
    files
        .into_iter()
        .filter(|file| {
            std::path::Path::new(&file.title)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(format))
        })
        .collect()
}
