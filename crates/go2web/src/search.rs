//! Search-engine queries and result harvesting

use crate::error::{FetchError, Result};
use crate::extract::{self, collapse_whitespace, Node};
use crate::target::Target;
use serde::Serialize;
use std::fmt;
use url::Url;

/// Default results page; `{query}` is replaced by the encoded terms
pub const DEFAULT_SEARCH_ENGINE: &str = "https://html.duckduckgo.com/html/?q={query}";

/// Number of results printed for a search
pub const DEFAULT_RESULT_LIMIT: usize = 10;

const QUERY_PLACEHOLDER: &str = "{query}";

/// Query parameter DuckDuckGo uses to wrap outbound result links
const REDIRECT_PARAM: &str = "uddg";

/// A single search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n   {}", self.title, self.url)
    }
}

/// Build the results-page target for `terms`
///
/// Terms are joined with spaces and form-urlencoded into the template's
/// `{query}` placeholder, or appended when the template has none.
pub fn search_url(template: &str, terms: &[String]) -> Result<Target> {
    let query = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if query.is_empty() {
        return Err(FetchError::InvalidUrl("empty search query".to_string()));
    }

    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    let url = if template.contains(QUERY_PLACEHOLDER) {
        template.replace(QUERY_PLACEHOLDER, &encoded)
    } else {
        format!("{}{}", template, encoded)
    };

    Target::parse(&url)
}

/// Harvest up to `limit` result links from a results page
///
/// Anchors whose class mentions `result` are taken in page order. Links
/// back to the search engine itself (ads, pagination) and duplicates are
/// skipped. Wrapped redirect links are unwrapped to their destination.
pub fn results(html: &str, base: &Url, limit: usize) -> Vec<SearchResult> {
    let mut found: Vec<SearchResult> = Vec::new();
    let mut open: Option<(String, String)> = None;

    for node in extract::nodes(html) {
        if found.len() >= limit {
            break;
        }

        match node {
            Node::Text(text) => {
                if let Some((_, title)) = open.as_mut() {
                    title.push_str(&text);
                }
            }
            Node::Tag(tag) if tag.name == "a" && tag.closing => {
                let Some((url, title)) = open.take() else {
                    continue;
                };
                let title = collapse_whitespace(&title);
                if title.is_empty() || found.iter().any(|r| r.url == url) {
                    continue;
                }
                found.push(SearchResult { title, url });
            }
            Node::Tag(tag) if tag.name == "a" && tag.class_contains("result") => {
                open = tag
                    .attr("href")
                    .and_then(|href| destination(base, &href))
                    .map(|url| (url, String::new()));
            }
            Node::Tag(_) => {}
        }
    }

    found
}

/// Resolve and unwrap a result href; `None` for links that stay on the
/// search engine
fn destination(base: &Url, href: &str) -> Option<String> {
    let url = base.join(href.trim()).ok()?;

    let url = url
        .query_pairs()
        .find(|(key, _)| key == REDIRECT_PARAM)
        .and_then(|(_, target)| Url::parse(&target).ok())
        .unwrap_or(url);

    if !matches!(url.scheme(), "http" | "https") || url.host_str() == base.host_str() {
        return None;
    }
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn base() -> Url {
        Url::parse("https://html.duckduckgo.com/html/?q=rust").unwrap()
    }

    #[test]
    fn test_search_url_default_engine() {
        let target = search_url(DEFAULT_SEARCH_ENGINE, &terms(&["rust", "async io"])).unwrap();
        assert_eq!(
            target.url().as_str(),
            "https://html.duckduckgo.com/html/?q=rust+async+io"
        );
    }

    #[test]
    fn test_search_url_escapes_and_appends() {
        let target = search_url("https://search.example/?q=", &terms(&["c++", "&", "ü"])).unwrap();
        assert_eq!(
            target.url().as_str(),
            "https://search.example/?q=c%2B%2B+%26+%C3%BC"
        );
    }

    #[test]
    fn test_search_url_empty_terms() {
        assert!(matches!(
            search_url(DEFAULT_SEARCH_ENGINE, &terms(&["  ", ""])),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_results_unwraps_redirect_links() {
        let html = r#"
            <div class="result results_links">
              <h2 class="result__title">
                <a rel="nofollow" class="result__a"
                   href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc">Rust
                   Programming <b>Language</b></a>
              </h2>
              <a class="result__snippet" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F">A language</a>
            </div>
            <div class="result">
              <a class="result__a" href="https://doc.rust-lang.org/book/">The Book</a>
            </div>
            <div class="nav-link"><a class="result--more__btn" href="/html/?q=rust&amp;s=30">Next</a></div>
            <a href="https://unrelated.example/">Footer</a>
        "#;

        let found = results(html, &base(), DEFAULT_RESULT_LIMIT);
        assert_eq!(
            found,
            vec![
                SearchResult {
                    title: "Rust Programming Language".to_string(),
                    url: "https://www.rust-lang.org/".to_string(),
                },
                SearchResult {
                    title: "The Book".to_string(),
                    url: "https://doc.rust-lang.org/book/".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_results_limit() {
        let html: String = (0..15)
            .map(|i| format!(r#"<a class="result__a" href="https://site{}.example/">Site {}</a>"#, i, i))
            .collect();

        let found = results(&html, &base(), DEFAULT_RESULT_LIMIT);
        assert_eq!(found.len(), 10);
        assert_eq!(found[9].title, "Site 9");
        assert_eq!(results(&html, &base(), 3).len(), 3);
    }

    #[test]
    fn test_search_result_display() {
        let result = SearchResult {
            title: "Example".to_string(),
            url: "https://example.com/".to_string(),
        };
        assert_eq!(result.to_string(), "Example\n   https://example.com/");
    }
}
