//! Reference HTTP adapters.
//!
//! - `HttpResolver` - plain URLs and `.urls` manifests
//! - `HttpBackend` - resumable downloads into a directory

mod backend;
mod resolver;

pub use backend::HttpBackend;
pub use resolver::HttpResolver;

use url::Url;

const USER_AGENT: &str = concat!("bulkdl/", env!("CARGO_PKG_VERSION"));

/// Last non-empty path segment of a URL.
fn file_name(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Replace characters that are unsafe in file names.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    trimmed.to_string()
}
