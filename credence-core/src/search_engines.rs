//! Corroboration search engine registry
//!
//! HTML search endpoints used to look for independent coverage of a claim
//! when no search API key is configured.

use serde::Serialize;

/// A web search engine with an HTML results page
#[derive(Debug, Clone, Serialize)]
pub struct SearchEngine {
    /// Human-readable name
    pub name: &'static str,
    /// URL template with {query} placeholder
    pub url_template: &'static str,
    /// CSS selector for result anchors on the results page
    pub result_selector: &'static str,
    /// Whether this engine is currently used
    pub active: bool,
    /// Estimated reliability (0.0 - 1.0)
    pub reliability: f64,
}

impl SearchEngine {
    /// Build search URL for a query
    pub fn build_url(&self, query: &str) -> String {
        self.url_template.replace("{query}", &urlencoding::encode(query))
    }
}

/// Default list of corroboration search engines
pub static DEFAULT_SEARCH_ENGINES: &[SearchEngine] = &[
    SearchEngine {
        name: "DuckDuckGo",
        url_template: "https://html.duckduckgo.com/html/?q={query}",
        result_selector: "a.result__a",
        active: true,
        reliability: 0.85,
    },
    SearchEngine {
        name: "Bing",
        url_template: "https://www.bing.com/search?q={query}&setlang=en",
        result_selector: "li.b_algo h2 a",
        active: true,
        reliability: 0.8,
    },
    SearchEngine {
        name: "Mojeek",
        url_template: "https://www.mojeek.com/search?q={query}",
        result_selector: "ul.results-standard a.title",
        active: true,
        reliability: 0.65,
    },
    SearchEngine {
        name: "Startpage",
        url_template: "https://www.startpage.com/do/search?q={query}",
        result_selector: "a.result-link",
        active: false,
        reliability: 0.6,
    },
];

/// Get all active search engines
pub fn active_engines() -> impl Iterator<Item = &'static SearchEngine> {
    DEFAULT_SEARCH_ENGINES.iter().filter(|e| e.active)
}

/// Get engines sorted by reliability (highest first)
pub fn engines_by_reliability() -> Vec<&'static SearchEngine> {
    let mut engines: Vec<_> = active_engines().collect();
    engines.sort_by(|a, b| b.reliability.total_cmp(&a.reliability));
    engines
}
