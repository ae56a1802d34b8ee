use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the user is hunting for. Immutable once a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    pub min_compensation: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalaryRange {
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
    pub currency: String,
}

impl SalaryRange {
    pub fn usd(minimum: Option<i64>, maximum: Option<i64>) -> Self {
        Self {
            minimum,
            maximum,
            currency: "USD".to_string(),
        }
    }
}

/// One discovered job posting. The URL is the natural identity: two postings
/// with the same URL are the same job, regardless of which source found them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: String,
    pub url: String,
    pub source: String,
    pub salary: Option<SalaryRange>,
    pub listed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub portfolio_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resume {
    pub content: String,
    pub format: String, // "markdown", "plain", "latex"
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub contact: Contact,
    pub base_resume: Resume,
    pub additional_documents: Vec<Resume>,
}

/// A resume variant generated for one specific posting.
#[derive(Debug, Clone)]
pub struct TailoredResume {
    pub original_format: String,
    pub content: String,
    pub job_title: String,
    pub job_company: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationStatus {
    Submitted,
    ReadyForReview,
    ReviewRequired,
    PendingHumanReview,
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::ReadyForReview => "ready-for-review",
            ApplicationStatus::ReviewRequired => "review-required",
            ApplicationStatus::PendingHumanReview => "pending-human-review",
        };
        f.write_str(s)
    }
}

/// The outcome of one submission attempt, at most one per candidate per run.
#[derive(Debug, Clone)]
pub struct ApplicationResult {
    pub job: JobPosting,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub fit_score: Option<f64>,
}

/// Which stage of the per-candidate sequence produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Discovery,
    Tailoring,
    Scoring,
    Submission,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Discovery => "discovery",
            Stage::Tailoring => "tailoring",
            Stage::Scoring => "scoring",
            Stage::Submission => "submission",
        };
        f.write_str(s)
    }
}

/// Flat projection of an [`ApplicationResult`] carried by the journal and the
/// sealed summary. Value copies, not shared references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub job_title: String,
    pub company: String,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub source: String,
    pub fit_score: Option<f64>,
}

impl OutcomeRecord {
    pub fn from_result(result: &ApplicationResult) -> Self {
        Self {
            job_title: result.job.title.clone(),
            company: result.job.company.clone(),
            status: result.status.to_string(),
            submitted_at: result.submitted_at,
            notes: result.notes.clone(),
            source: result.job.source.clone(),
            fit_score: result.fit_score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub job_title: String,
    pub company: String,
    pub source: String,
    pub stage: Stage,
    pub error: String,
}

/// Sealed record of one run. Built once at `finish()` and never mutated after
/// it has been persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    pub min_compensation: Option<i64>,
    pub result_count: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub errors: Vec<ErrorRecord>,
    pub results: Vec<OutcomeRecord>,
    pub top_matches: Vec<OutcomeRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub run_id: String,
    pub job_title: String,
    pub company: String,
    pub feedback: String,
    pub received_at: String,
}
