//! Corroboration checker
//!
//! Searches the web for independent coverage of a claim and counts the
//! distinct domains whose results overlap the claim's keywords. The claim's
//! own source domain never counts as corroboration.

use async_trait::async_trait;
use credence_core::{engines_by_reliability, AnalysisRequest, RequestField, SignalResult};
use credence_net::{crawl_engines, SearchHit};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

use crate::{guarded, Assessment, ModuleError, SignalModule};

pub const CORROBORATION_MODULE_ID: &str = "corroboration";

const REQUIRES: &[RequestField] = &[RequestField::Text];

/// Keywords taken from a claim
const MAX_KEYWORDS: usize = 8;
/// Share of keywords a result must mention to count
const MIN_OVERLAP: f64 = 0.3;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her",
    "was", "one", "our", "out", "has", "him", "his", "how", "its", "may", "new", "now",
    "old", "see", "two", "who", "did", "get", "let", "say", "she", "too", "use", "that",
    "with", "have", "this", "will", "your", "from", "they", "been", "were", "said", "each",
    "which", "their", "there", "what", "about", "would", "these", "other", "into", "than",
    "them", "then", "some", "could", "just", "over", "also", "after", "very", "shows",
    "show", "says", "being", "while", "where", "when", "more", "most",
];

/// Dramatizing filler that carries no searchable content
const FILLER_WORDS: &[&str] = &[
    "shocking", "breaking", "must", "watch", "exposed", "secret", "truth", "unbelievable",
    "amazing", "incredible", "share", "viral", "urgent", "wow", "omg", "believe",
];

/// Extract up to eight distinct search keywords from a claim, in claim order
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|w| w.chars().count() >= 3)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()) && !FILLER_WORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .take(MAX_KEYWORDS)
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .map(|w| w.trim_matches('-').to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Share of keywords mentioned in a hit's title and snippet
pub fn keyword_overlap(keywords: &[String], hit: &SearchHit) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let words: HashSet<String> = tokenize(&format!("{} {}", hit.title, hit.snippet))
        .into_iter()
        .collect();
    let matched = keywords.iter().filter(|k| words.contains(*k)).count();
    matched as f64 / keywords.len() as f64
}

/// Distinct corroborating domains, excluding the source host and its subdomains
pub fn corroborating_domains(
    keywords: &[String],
    hits: &[SearchHit],
    source_host: Option<&str>,
) -> BTreeSet<String> {
    hits.iter()
        .filter(|hit| keyword_overlap(keywords, hit) >= MIN_OVERLAP)
        .filter_map(SearchHit::domain)
        .filter(|domain| match source_host {
            Some(source) => !same_site(domain, source),
            None => true,
        })
        .collect()
}

fn same_site(a: &str, b: &str) -> bool {
    a == b || a.ends_with(&format!(".{}", b)) || b.ends_with(&format!(".{}", a))
}

/// A web search provider
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ModuleError>;

    fn name(&self) -> &str;
}

/// Brave Search API response
#[derive(Debug, Deserialize)]
struct BraveSearchResponse {
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    #[serde(default)]
    description: Option<String>,
}

/// Brave Search API provider
pub struct BraveSearch {
    api_key: String,
    client: Client,
    count: usize,
}

impl BraveSearch {
    pub fn new(api_key: impl Into<String>, client: Client) -> Self {
        Self {
            api_key: api_key.into(),
            client,
            count: 20,
        }
    }
}

#[async_trait]
impl WebSearch for BraveSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ModuleError> {
        let url = format!(
            "https://api.search.brave.com/res/v1/web/search?q={}&count={}",
            urlencoding::encode(query),
            self.count
        );

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ModuleError::RateLimited("Brave Search".to_string()));
        }
        if !status.is_success() {
            return Err(ModuleError::Upstream {
                service: "Brave Search".to_string(),
                status: status.as_u16(),
            });
        }

        let data: BraveSearchResponse = response.json().await?;
        Ok(data
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.description.unwrap_or_default(),
                engine: "Brave".to_string(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Brave Search"
    }
}

/// HTML search engines crawled concurrently
pub struct EngineSearch {
    client: Client,
    max_retries: u32,
    max_concurrent: usize,
}

impl EngineSearch {
    pub fn new(client: Client, max_retries: u32) -> Self {
        Self {
            client,
            max_retries,
            max_concurrent: 3,
        }
    }
}

#[async_trait]
impl WebSearch for EngineSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ModuleError> {
        let engines = engines_by_reliability();
        Ok(crawl_engines(
            &self.client,
            &engines,
            query,
            self.max_retries,
            self.max_concurrent,
        )
        .await?)
    }

    fn name(&self) -> &str {
        "web search engines"
    }
}

/// Corroboration checker module
pub struct CorroborationChecker {
    search: Arc<dyn WebSearch>,
}

impl CorroborationChecker {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }

    async fn assess(&self, request: &AnalysisRequest) -> Result<Assessment, ModuleError> {
        let keywords = extract_keywords(request.text().unwrap_or_default());
        if keywords.is_empty() {
            return Err(ModuleError::Parse("claim has no searchable keywords".to_string()));
        }

        let query = keywords.join(" ");
        let hits = self.search.search(&query).await?;
        let source_host = request.source_host();
        let domains = corroborating_domains(&keywords, &hits, source_host.as_deref());

        debug!(
            provider = self.search.name(),
            query = %query,
            hits = hits.len(),
            corroborating = domains.len(),
            "Corroboration search complete"
        );

        let confidence = if hits.is_empty() { 0.4 } else { 0.7 };
        let rationale = if domains.is_empty() {
            format!(
                "No independent coverage found among {} results for '{}'",
                hits.len(),
                query
            )
        } else {
            format!(
                "{} independent source(s) cover the claim: {}",
                domains.len(),
                domains.iter().cloned().collect::<Vec<_>>().join(", ")
            )
        };

        Ok(Assessment::new(domains.len() as f64, confidence, rationale))
    }
}

#[async_trait]
impl SignalModule for CorroborationChecker {
    fn id(&self) -> &str {
        CORROBORATION_MODULE_ID
    }

    fn requires(&self) -> &[RequestField] {
        REQUIRES
    }

    async fn analyze(&self, request: &AnalysisRequest, deadline: Instant) -> SignalResult {
        guarded(CORROBORATION_MODULE_ID, REQUIRES, request, deadline, self.assess(request)).await
    }
}
