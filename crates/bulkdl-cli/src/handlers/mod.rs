//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Thin wrappers that translate arguments, call the batch manager and
//!   format output for the terminal

pub mod add;
pub mod control;
pub mod list;
pub mod run;

use bulkdl_core::SelectedItem;

/// Build selections from URLs, keyed by the URL itself.
pub fn selections(urls: &[String], title: Option<&str>) -> Vec<SelectedItem> {
    urls.iter()
        .map(|url| {
            let title = title.map_or_else(|| title_from_url(url), str::to_string);
            SelectedItem::from_url(url.clone(), title)
        })
        .collect()
}

/// Last non-empty path segment of a URL, without query or fragment.
fn title_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map_or_else(|| url.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_url() {
        assert_eq!(title_from_url("https://example.com/a/clip.mp4?x=1"), "clip.mp4");
        assert_eq!(title_from_url("https://example.com/list/"), "list");
        assert_eq!(title_from_url("https://example.com"), "example.com");
        assert_eq!(title_from_url("https:"), "https:");
    }

    #[test]
    fn test_selections_are_keyed_by_url() {
        let urls = vec!["https://example.com/a.bin".to_string()];
        let items = selections(&urls, None);
        assert_eq!(items[0].id.as_str(), "https://example.com/a.bin");
        assert_eq!(items[0].title, "a.bin");

        let items = selections(&urls, Some("Custom"));
        assert_eq!(items[0].title, "Custom");
    }
}
