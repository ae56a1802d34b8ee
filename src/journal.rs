use std::collections::{BTreeMap, VecDeque};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::Database;
use crate::models::{
    ApplicationResult, ErrorRecord, JobPosting, OutcomeRecord, RunSummary, SearchCriteria, Stage,
};

const TOP_MATCH_COUNT: usize = 3;

/// Per-run accumulator of outcomes and errors. Appends are in-memory and
/// never fail; storage failures only surface at [`RunJournal::finish`].
/// A single instance tolerates concurrent appends from multiple workers.
pub struct RunJournal {
    run_id: String,
    started_at: DateTime<Utc>,
    criteria: SearchCriteria,
    log_path: PathBuf,
    db_path: PathBuf,
    inner: Mutex<JournalState>,
}

#[derive(Default)]
struct JournalState {
    results: Vec<OutcomeRecord>,
    errors: Vec<ErrorRecord>,
}

impl RunJournal {
    pub fn new(criteria: SearchCriteria, log_path: PathBuf, db_path: PathBuf) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            criteria,
            log_path,
            db_path,
            inner: Mutex::new(JournalState::default()),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn record_outcome(&self, result: &ApplicationResult) {
        let record = OutcomeRecord::from_result(result);
        self.lock().results.push(record);
    }

    pub fn record_error(&self, job: &JobPosting, stage: Stage, message: impl Into<String>) {
        let record = ErrorRecord {
            job_title: job.title.clone(),
            company: job.company.clone(),
            source: job.source.clone(),
            stage,
            error: message.into(),
        };
        self.lock().errors.push(record);
    }

    /// Seal the run: compute the end timestamp, histogram, and top matches,
    /// then write the summary to both the append-only event log and the
    /// normalized store. Both writes are attempted even when one fails;
    /// the first failure is surfaced after both attempts.
    pub fn finish(&self) -> Result<RunSummary> {
        let summary = self.build_summary();

        let log_result = self.append_event_log(&summary);
        if let Err(error) = &log_result {
            warn!(run_id = %summary.run_id, %error, "event log append failed");
        }

        let db_result = self.persist_summary(&summary);
        if let Err(error) = &db_result {
            warn!(run_id = %summary.run_id, %error, "summary upsert failed");
        }

        log_result?;
        db_result?;

        info!(
            run_id = %summary.run_id,
            results = summary.result_count,
            errors = summary.errors.len(),
            "run recorded"
        );
        Ok(summary)
    }

    fn build_summary(&self) -> RunSummary {
        let state = self.lock();
        let ended_at = Utc::now();

        let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in &state.results {
            *status_counts.entry(record.status.clone()).or_insert(0) += 1;
        }

        // Stable sort keeps original order between equal scores; a missing
        // score ranks as zero.
        let mut ranked = state.results.clone();
        ranked.sort_by(|a, b| {
            let score_a = a.fit_score.unwrap_or(0.0);
            let score_b = b.fit_score.unwrap_or(0.0);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(TOP_MATCH_COUNT);

        RunSummary {
            run_id: self.run_id.clone(),
            started_at: self.started_at,
            ended_at,
            keywords: self.criteria.keywords.clone(),
            locations: self.criteria.locations.clone(),
            min_compensation: self.criteria.min_compensation,
            result_count: state.results.len(),
            status_counts,
            errors: state.errors.clone(),
            results: state.results.clone(),
            top_matches: ranked,
        }
    }

    fn append_event_log(&self, summary: &RunSummary) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        let line = serde_json::to_string(summary).context("Failed to serialize run summary")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open event log {}", self.log_path.display()))?;
        writeln!(file, "{line}").context("Failed to append to event log")?;
        Ok(())
    }

    fn persist_summary(&self, summary: &RunSummary) -> Result<()> {
        let mut db = Database::open(&self.db_path)?;
        db.upsert_run_summary(summary)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JournalState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read the most recent run summaries from the event log, newest last.
/// Unparseable lines are skipped rather than failing the scan.
pub fn load_recent_runs(path: &Path, limit: usize) -> Result<Vec<RunSummary>> {
    if limit == 0 || !path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open event log {}", path.display()))?;

    let mut buffer: VecDeque<String> = VecDeque::with_capacity(limit);
    for line in BufReader::new(file).lines() {
        let line = line.context("Failed to read event log line")?;
        if line.trim().is_empty() {
            continue;
        }
        if buffer.len() >= limit {
            buffer.pop_front();
        }
        buffer.push_back(line);
    }

    Ok(buffer
        .into_iter()
        .filter_map(|line| serde_json::from_str(&line).ok())
        .collect())
}
