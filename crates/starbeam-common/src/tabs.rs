use serde::{Deserialize, Serialize};
use url::Url;

/// An open browser tab as seen by the selection side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub active: bool,
}

/// Whether `url` belongs to `host` (exact host or a subdomain of it).
pub fn is_target_url(url: &str, host: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .map(|h| h == host || h.ends_with(&format!(".{}", host)))
            .unwrap_or(false),
        Err(_) => url.contains(host),
    }
}

/// Tabs worth beaming: plain web pages, excluding the target application itself
/// and browser-internal pages.
pub fn filter_tabs(tabs: &[TabInfo], target_host: &str) -> Vec<TabInfo> {
    tabs.iter()
        .filter(|tab| {
            let url = tab.url.as_str();
            url.starts_with("http")
                && !is_target_url(url, target_host)
                && !url.starts_with("chrome://")
                && !url.starts_with("about:")
        })
        .cloned()
        .collect()
}

/// First tab hosting the target application.
pub fn find_target<'a>(tabs: &'a [TabInfo], target_host: &str) -> Option<&'a TabInfo> {
    tabs.iter().find(|tab| is_target_url(&tab.url, target_host))
}

pub fn join_payload<S: AsRef<str>>(urls: &[S]) -> String {
    urls.iter()
        .map(|u| u.as_ref())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn split_payload(payload: &str) -> Vec<&str> {
    payload
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(url: &str) -> TabInfo {
        TabInfo {
            id: url.to_string(),
            url: url.to_string(),
            title: String::new(),
            active: false,
        }
    }

    #[test]
    fn test_filter_tabs_drops_internal_and_target_pages() {
        let tabs = vec![
            tab("https://docs.rs/tokio"),
            tab("chrome://settings"),
            tab("about:blank"),
            tab("https://notebooklm.google.com/notebook/abc"),
            tab("file:///tmp/a.html"),
            tab("http://example.com"),
        ];
        let kept = filter_tabs(&tabs, "notebooklm.google.com");
        let urls: Vec<&str> = kept.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(urls, vec!["https://docs.rs/tokio", "http://example.com"]);
    }

    #[test]
    fn test_find_target() {
        let tabs = vec![
            tab("https://example.com/?q=notebooklm.google.com.evil"),
            tab("https://notebooklm.google.com/"),
        ];
        let found = find_target(&tabs, "notebooklm.google.com").unwrap();
        assert_eq!(found.url, "https://notebooklm.google.com/");
    }

    #[test]
    fn test_payload_join_and_split() {
        let payload = join_payload(&["https://a.example", "https://b.example"]);
        assert_eq!(payload, "https://a.example\nhttps://b.example");
        assert_eq!(split_payload("a\n\n b \n"), vec!["a", "b"]);
    }
}
