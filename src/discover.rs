use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, anyhow};
use regex::Regex;
use tracing::{debug, info};

use crate::error::AgentError;
use crate::models::{JobPosting, SalaryRange, SearchCriteria};

/// One job board. Implementations perform their own fetch and return
/// postings already filtered against the criteria; "no results" is an empty
/// list, never an error.
pub trait JobSource: Send {
    fn name(&self) -> &str;
    fn search(&self, criteria: &SearchCriteria) -> Result<Vec<JobPosting>, AgentError>;
}

/// Aggregates site-specific sources and merges their results.
pub struct DiscoveryService {
    sources: Vec<Box<dyn JobSource>>,
}

impl DiscoveryService {
    pub fn new(sources: Vec<Box<dyn JobSource>>) -> Self {
        Self { sources }
    }

    /// Query every source in order and merge, deduplicating by URL while
    /// preserving first-seen order. A single failing source fails discovery;
    /// the pipeline treats that as fatal to the run.
    pub fn discover(&self, criteria: &SearchCriteria) -> Result<Vec<JobPosting>, AgentError> {
        let mut batches = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let postings = source.search(criteria)?;
            debug!(source = source.name(), count = postings.len(), "source returned postings");
            batches.push(postings);
        }
        let merged = merge_postings(batches);
        info!(count = merged.len(), "discovery completed");
        Ok(merged)
    }
}

/// Merge postings from multiple sources, de-duplicating by URL.
pub fn merge_postings(batches: Vec<Vec<JobPosting>>) -> Vec<JobPosting> {
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    for batch in batches {
        for posting in batch {
            if seen_urls.insert(posting.url.clone()) {
                merged.push(posting);
            }
        }
    }
    merged
}

/// Criteria filter shared by all sources: keyword match-any over title and
/// description, location match-any with an implicit remote wildcard, and an
/// optional compensation floor. When a posting carries no structured salary,
/// the floor check falls back to amounts found in the description text.
pub fn matches_criteria(posting: &JobPosting, criteria: &SearchCriteria) -> bool {
    if !criteria.keywords.is_empty() {
        let title = posting.title.to_lowercase();
        let description = posting.description.to_lowercase();
        let hit = criteria
            .keywords
            .iter()
            .map(|kw| kw.to_lowercase())
            .any(|kw| title.contains(&kw) || description.contains(&kw));
        if !hit {
            return false;
        }
    }

    if !criteria.locations.is_empty() {
        let location = posting
            .location
            .as_deref()
            .unwrap_or("Remote")
            .to_lowercase();
        let accepted = criteria
            .locations
            .iter()
            .any(|loc| loc.to_lowercase() == location)
            || location.contains("remote");
        if !accepted {
            return false;
        }
    }

    if let Some(min_comp) = criteria.min_compensation {
        if min_comp > 0 {
            let salary = posting
                .salary
                .clone()
                .or_else(|| parse_salary(&posting.description));
            match salary {
                Some(range) if range.minimum.unwrap_or(0) >= min_comp => {}
                _ => return false,
            }
        }
    }

    true
}

static SALARY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d[\d,]*)").expect("salary pattern is valid"));

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

/// Pull dollar amounts out of free text, e.g. "$120,000 - $150,000".
/// The smallest amount becomes the minimum; the largest becomes the maximum
/// when more than one amount is present.
pub fn parse_salary(raw: &str) -> Option<SalaryRange> {
    let amounts: Vec<i64> = SALARY_PATTERN
        .captures_iter(raw)
        .filter_map(|cap| cap[1].replace(',', "").parse().ok())
        .collect();
    if amounts.is_empty() {
        return None;
    }
    let minimum = amounts.iter().min().copied();
    let maximum = if amounts.len() > 1 {
        amounts.iter().max().copied()
    } else {
        None
    };
    Some(SalaryRange::usd(minimum, maximum))
}

pub fn strip_html(raw: &str) -> String {
    HTML_TAG.replace_all(raw, "").to_string()
}

// --- RemoteOK source ---

const REMOTEOK_API: &str = "https://remoteok.com/api";

/// Remote-friendly jobs from RemoteOK's public JSON API.
pub struct RemoteOkSource {
    client: reqwest::blocking::Client,
    max_results: usize,
}

impl RemoteOkSource {
    pub fn new(max_results: usize, timeout_secs: u64) -> Result<Self, AgentError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("scout/0.1")
            .build()
            .map_err(|e| AgentError::Discovery(e.to_string()))?;
        Ok(Self { client, max_results })
    }

    fn fetch(&self) -> anyhow::Result<Vec<serde_json::Value>> {
        let response = self
            .client
            .get(REMOTEOK_API)
            .send()
            .context("Failed to reach RemoteOK API")?
            .error_for_status()
            .context("RemoteOK API returned an error status")?;
        let data: serde_json::Value = response.json().context("Failed to parse RemoteOK response")?;
        let serde_json::Value::Array(items) = data else {
            return Err(anyhow!("Unexpected response shape from RemoteOK API"));
        };
        // first element is API metadata, not a posting
        Ok(items.into_iter().skip(1).collect())
    }

    fn to_posting(&self, job: &serde_json::Value) -> Option<JobPosting> {
        let field = |key: &str| job.get(key).and_then(|v| v.as_str()).unwrap_or("");
        let title = field("position").trim().to_string();
        if title.is_empty() {
            return None;
        }
        let url = ["url", "apply_url", "original"]
            .into_iter()
            .map(&field)
            .find(|value| !value.is_empty())?
            .to_string();
        let location = field("location");
        Some(JobPosting {
            title,
            company: {
                let company = field("company");
                if company.is_empty() { "Unknown" } else { company }.to_string()
            },
            location: Some(if location.is_empty() { "Remote" } else { location }.to_string()),
            description: strip_html(field("description")),
            url,
            source: self.name().to_string(),
            salary: parse_salary(field("salary")),
            listed_at: None,
        })
    }
}

impl JobSource for RemoteOkSource {
    fn name(&self) -> &str {
        "RemoteOK"
    }

    fn search(&self, criteria: &SearchCriteria) -> Result<Vec<JobPosting>, AgentError> {
        let raw = self
            .fetch()
            .map_err(|e| AgentError::Discovery(format!("RemoteOK: {e}")))?;
        let postings: Vec<JobPosting> = raw
            .iter()
            .filter_map(|job| self.to_posting(job))
            .filter(|posting| matches_criteria(posting, criteria))
            .take(self.max_results)
            .collect();
        Ok(postings)
    }
}
