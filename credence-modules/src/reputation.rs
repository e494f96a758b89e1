//! Source reputation checker
//!
//! Rates the publishing domain using two sources:
//! 1. A local credibility database of known outlets
//! 2. Google Safe Browsing v4 for malware and phishing URLs
//!
//! A threat match caps the score at 0.1. Threat lookup failures fall back
//! to the database score.

use async_trait::async_trait;
use credence_core::{AnalysisRequest, RequestField, SignalResult};
use dashmap::DashMap;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::catalog::read_file;
use crate::{guarded, Assessment, CatalogError, ModuleError, SignalModule};

pub const REPUTATION_MODULE_ID: &str = "source_reputation";

const REQUIRES: &[RequestField] = &[RequestField::SourceUrl];

/// Score for domains the database does not know
const NEUTRAL_SCORE: f64 = 0.5;
/// Ceiling applied when a threat list flags the URL
const THREAT_CEILING: f64 = 0.1;

/// Threat verdicts kept before the cache is reset
const DEFAULT_CACHE_CAPACITY: usize = 4096;

const SAFE_BROWSING_URL: &str = "https://safebrowsing.googleapis.com/v4/threatMatches:find";

/// One credibility database record
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DomainRecord {
    /// Credibility in [0, 1]
    pub score: f64,
    #[serde(default)]
    pub reason: String,
}

/// Known-domain credibility scores
#[derive(Debug, Clone, Default)]
pub struct CredibilityDb {
    entries: HashMap<String, DomainRecord>,
}

impl CredibilityDb {
    /// The database shipped with the crate
    pub fn load_embedded() -> Result<Self, CatalogError> {
        Self::from_json(include_str!("../data/credibility_db.json"))
    }

    /// Load a database from a JSON file of `{domain: {score, reason}}`
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let db = Self::from_json(&read_file(path.as_ref())?)?;
        info!("Credibility DB loaded {} domains from {}", db.len(), path.as_ref().display());
        Ok(db)
    }

    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        let raw: HashMap<String, DomainRecord> = serde_json::from_str(content)?;
        let entries = raw
            .into_iter()
            .map(|(domain, mut record)| {
                record.score = if record.score.is_finite() {
                    record.score.clamp(0.0, 1.0)
                } else {
                    NEUTRAL_SCORE
                };
                (normalize_domain(&domain), record)
            })
            .collect();
        Ok(Self { entries })
    }

    /// Add entries from another database, overriding existing domains
    pub fn merge(&mut self, other: CredibilityDb) {
        self.entries.extend(other.entries);
    }

    /// Look up a host, then each parent domain (news.bbc.co.uk, bbc.co.uk, co.uk)
    pub fn lookup(&self, host: &str) -> Option<(&str, &DomainRecord)> {
        let host = normalize_domain(host);
        let mut candidate = host.as_str();
        loop {
            if let Some((domain, record)) = self.entries.get_key_value(candidate) {
                return Some((domain.as_str(), record));
            }
            match candidate.split_once('.') {
                Some((_, parent)) if parent.contains('.') => candidate = parent,
                _ => return None,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('.').to_lowercase();
    domain.strip_prefix("www.").unwrap_or(&domain).to_string()
}

/// A URL threat list
#[async_trait]
pub trait ThreatList: Send + Sync {
    /// Threat type if the URL is listed, `None` if clean
    async fn lookup(&self, url: &str) -> Result<Option<String>, ModuleError>;
}

#[derive(Debug, Deserialize)]
struct ThreatMatchesResponse {
    #[serde(default)]
    matches: Vec<ThreatMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreatMatch {
    threat_type: String,
}

/// Google Safe Browsing v4 lookup API
pub struct SafeBrowsing {
    api_key: String,
    client: Client,
}

impl SafeBrowsing {
    pub fn new(api_key: impl Into<String>, client: Client) -> Self {
        Self {
            api_key: api_key.into(),
            client,
        }
    }
}

#[async_trait]
impl ThreatList for SafeBrowsing {
    async fn lookup(&self, url: &str) -> Result<Option<String>, ModuleError> {
        let body = serde_json::json!({
            "client": {
                "clientId": "credence",
                "clientVersion": env!("CARGO_PKG_VERSION")
            },
            "threatInfo": {
                "threatTypes": [
                    "MALWARE",
                    "SOCIAL_ENGINEERING",
                    "UNWANTED_SOFTWARE",
                    "POTENTIALLY_HARMFUL_APPLICATION"
                ],
                "platformTypes": ["ANY_PLATFORM"],
                "threatEntryTypes": ["URL"],
                "threatEntries": [{"url": url}]
            }
        });

        let response = self
            .client
            .post(SAFE_BROWSING_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ModuleError::RateLimited("Safe Browsing".to_string()));
        }
        if !status.is_success() {
            return Err(ModuleError::Upstream {
                service: "Safe Browsing".to_string(),
                status: status.as_u16(),
            });
        }

        let parsed: ThreatMatchesResponse = response.json().await?;
        Ok(parsed.matches.into_iter().next().map(|m| m.threat_type))
    }
}

/// Source reputation checker module
pub struct SourceReputationChecker {
    db: CredibilityDb,
    threats: Option<Arc<dyn ThreatList>>,
    /// Clean/flagged verdicts per URL; failures are not cached
    cache: DashMap<String, Option<String>>,
    cache_capacity: usize,
}

impl SourceReputationChecker {
    pub fn new(db: CredibilityDb, threats: Option<Arc<dyn ThreatList>>) -> Self {
        Self {
            db,
            threats,
            cache: DashMap::new(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// Bound on cached threat verdicts; the cache is cleared once it is full
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }

    async fn threat_status(
        &self,
        threats: &dyn ThreatList,
        url: &str,
    ) -> Result<Option<String>, ModuleError> {
        if let Some(cached) = self.cache.get(url) {
            debug!("Threat status cache hit for {}", url);
            return Ok(cached.value().clone());
        }

        let status = threats.lookup(url).await?;
        if self.cache.len() >= self.cache_capacity {
            debug!(entries = self.cache.len(), "Threat status cache full; clearing");
            self.cache.clear();
        }
        self.cache.insert(url.to_string(), status.clone());
        Ok(status)
    }

    async fn assess(&self, request: &AnalysisRequest) -> Result<Assessment, ModuleError> {
        let url = request.source_url().unwrap_or_default();
        let host = request
            .source_host()
            .ok_or_else(|| ModuleError::Parse(format!("no host in {}", url)))?;

        let (mut score, mut confidence, mut reason) = match self.db.lookup(&host) {
            Some((domain, record)) => (
                record.score,
                0.8,
                format!(
                    "{} found in credibility DB (score {:.2}): {}",
                    domain, record.score, record.reason
                ),
            ),
            None => (
                NEUTRAL_SCORE,
                0.3,
                format!("{} is not in the credibility DB; treated as neutral", host),
            ),
        };

        if let Some(threats) = &self.threats {
            match self.threat_status(threats.as_ref(), url).await {
                Ok(Some(threat)) => {
                    score = score.min(THREAT_CEILING);
                    confidence = 0.95;
                    reason = format!(
                        "Safe Browsing flagged the URL as {}; credibility capped at {:.1}",
                        threat, THREAT_CEILING
                    );
                }
                Ok(None) => {
                    confidence = (confidence + 0.1_f64).min(1.0);
                    reason.push_str("; Safe Browsing found no threats");
                }
                Err(e) => {
                    warn!("Threat lookup failed for {}: {}. Falling back to DB score.", url, e);
                    reason.push_str("; threat lookup unavailable");
                }
            }
        }

        Ok(Assessment::new(score, confidence, reason))
    }
}

#[async_trait]
impl SignalModule for SourceReputationChecker {
    fn id(&self) -> &str {
        REPUTATION_MODULE_ID
    }

    fn requires(&self) -> &[RequestField] {
        REQUIRES
    }

    async fn analyze(&self, request: &AnalysisRequest, deadline: Instant) -> SignalResult {
        guarded(REPUTATION_MODULE_ID, REQUIRES, request, deadline, self.assess(request)).await
    }
}
