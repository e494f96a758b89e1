//! Web search crawler
//!
//! Queries HTML search engines and extracts result links with their
//! surrounding snippet text.

use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::{fetch_text, NetError};
use credence_core::{host_of, SearchEngine};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Maximum characters kept per snippet
const MAX_SNIPPET_LENGTH: usize = 300;

/// A search result from a web search engine
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Result title
    pub title: String,
    /// Result URL
    pub url: String,
    /// Text surrounding the result link
    pub snippet: String,
    /// Source search engine
    pub engine: String,
}

impl SearchHit {
    /// Host of the result, without `www.`
    pub fn domain(&self) -> Option<String> {
        host_of(&self.url)
    }
}

/// Crawl a search engine for results
pub async fn crawl_engine(
    client: &Client,
    engine: &SearchEngine,
    query: &str,
    max_retries: u32,
) -> Result<Vec<SearchHit>, NetError> {
    let url = engine.build_url(query);

    debug!("Crawling {} with query: {}", engine.name, query);

    let html = fetch_text(client, &url, max_retries).await?;
    let results = parse_search_results(&html, engine);

    debug!("Engine {} returned {} results", engine.name, results.len());
    Ok(results)
}

/// Crawl multiple search engines concurrently.
///
/// Engine failures are logged and contribute no hits. Returns `Err` only
/// when every engine failed, carrying the last error.
pub async fn crawl_engines(
    client: &Client,
    engines: &[&SearchEngine],
    query: &str,
    max_retries: u32,
    max_concurrent: usize,
) -> Result<Vec<SearchHit>, NetError> {
    use futures::stream::{self, StreamExt};

    let owned: Vec<SearchEngine> = engines.iter().map(|e| (*e).clone()).collect();
    let outcomes: Vec<_> = stream::iter(owned)
        .map(|engine| {
            let client = client.clone();
            async move {
                let outcome = crawl_engine(&client, &engine, query, max_retries).await;
                if let Err(e) = &outcome {
                    warn!("Engine {} failed: {}", engine.name, e);
                }
                outcome
            }
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    let mut last_error = None;
    let mut any_ok = false;
    let mut seen: HashSet<String> = HashSet::new();
    let mut deduped = Vec::new();

    for outcome in outcomes {
        match outcome {
            Ok(hits) => {
                any_ok = true;
                for hit in hits {
                    let normalized = hit.url.trim_end_matches('/').to_lowercase();
                    if seen.insert(normalized) {
                        deduped.push(hit);
                    }
                }
            }
            Err(e) => last_error = Some(e),
        }
    }

    match (any_ok, last_error) {
        (false, Some(e)) => Err(e),
        _ => Ok(deduped),
    }
}

/// Parse search results from an engine's HTML results page
pub fn parse_search_results(html: &str, engine: &SearchEngine) -> Vec<SearchHit> {
    let selector = match Selector::parse(engine.result_selector) {
        Ok(s) => s,
        Err(e) => {
            warn!("Engine {} has invalid selector: {:?}", engine.name, e);
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);
    let engine_host = host_of(engine.url_template);
    let mut results = Vec::new();

    for element in document.select(&selector) {
        let href = match element.value().attr("href") {
            Some(h) => h,
            None => continue,
        };

        let url = match resolve_result_url(href) {
            Some(u) => u,
            None => continue,
        };

        // Skip engine self-links
        if host_of(&url).is_none() || host_of(&url) == engine_host {
            continue;
        }

        let title = collapse(&element.text().collect::<String>());
        if title.len() < 3 {
            continue;
        }

        let snippet = snippet_for(&element, &title);

        results.push(SearchHit {
            title,
            url,
            snippet,
            engine: engine.name.to_string(),
        });
    }

    results
}

/// Turn a result href into an absolute target URL, unwrapping redirect links
fn resolve_result_url(href: &str) -> Option<String> {
    let href = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    if !(href.starts_with("http://") || href.starts_with("https://")) {
        return None;
    }

    // DuckDuckGo wraps targets as /l/?uddg=<encoded>
    if let Some(start) = href.find("uddg=") {
        let encoded = &href[start + 5..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        return urlencoding::decode(encoded).ok().map(|d| d.into_owned());
    }

    Some(href)
}

/// Text of the closest ancestor that holds more than the link title
fn snippet_for(element: &ElementRef<'_>, title: &str) -> String {
    for ancestor in element.ancestors().take(3) {
        let Some(ancestor) = ElementRef::wrap(ancestor) else {
            continue;
        };
        let text = collapse(&ancestor.text().collect::<String>());
        if text.len() > title.len() + 20 {
            let rest = text.replacen(title, "", 1);
            return truncate(rest.trim(), MAX_SNIPPET_LENGTH);
        }
    }
    String::new()
}

fn collapse(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credence_core::DEFAULT_SEARCH_ENGINES;

    fn duckduckgo() -> &'static SearchEngine {
        &DEFAULT_SEARCH_ENGINES[0]
    }

    #[test]
    fn test_parse_search_results() {
        let html = r#"
            <html>
            <body>
                <div class="result">
                    <h2><a class="result__a" href="https://www.reuters.com/world/rates-held">Central bank holds rates</a></h2>
                    <a class="result__snippet">The central bank held interest rates steady on Thursday, officials said.</a>
                </div>
                <div class="result">
                    <h2><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fapnews.com%2Farticle%2Frates&amp;rut=abc">Rates unchanged, AP reports</a></h2>
                </div>
                <div class="result">
                    <h2><a class="result__a" href="/html/?q=next">More</a></h2>
                </div>
                <a href="https://example.org/not-a-result">Not a result link</a>
            </body>
            </html>
        "#;

        let results = parse_search_results(html, duckduckgo());

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://www.reuters.com/world/rates-held");
        assert_eq!(results[0].domain().as_deref(), Some("reuters.com"));
        assert!(results[0].snippet.contains("interest rates steady"));
        assert_eq!(results[1].url, "https://apnews.com/article/rates");
        assert!(results.iter().all(|r| r.engine == "DuckDuckGo"));
    }

    #[test]
    fn test_resolve_result_url() {
        assert_eq!(resolve_result_url("/relative"), None);
        assert_eq!(
            resolve_result_url("//example.com/a").as_deref(),
            Some("https://example.com/a")
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
