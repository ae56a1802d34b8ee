use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::models::{FeedbackEntry, RunSummary};

/// Normalized durable store for run summaries, per-application rows, and
/// recruiter feedback. The schema is created idempotently on open and
/// tolerates additive column evolution.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        let db = Self {
            conn,
            path: path.to_path_buf(),
        };
        db.ensure_schema()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                keywords TEXT,
                locations TEXT,
                min_comp INTEGER,
                result_count INTEGER DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS applications (
                run_id TEXT NOT NULL,
                job_title TEXT NOT NULL,
                company TEXT NOT NULL,
                source TEXT,
                status TEXT,
                submitted_at TEXT,
                notes TEXT,
                FOREIGN KEY(run_id) REFERENCES runs(id)
            );

            CREATE TABLE IF NOT EXISTS feedback (
                run_id TEXT NOT NULL,
                job_title TEXT NOT NULL,
                company TEXT NOT NULL,
                feedback TEXT,
                received_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_applications_run ON applications(run_id);
            CREATE INDEX IF NOT EXISTS idx_feedback_run ON feedback(run_id);
            "#,
        )?;

        // Additive evolution: older databases predate the fit_score column.
        // New optional columns default to null for pre-existing rows.
        let mut stmt = self.conn.prepare("PRAGMA table_info(applications)")?;
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<_, _>>()?;
        if !columns.iter().any(|name| name == "fit_score") {
            self.conn
                .execute("ALTER TABLE applications ADD COLUMN fit_score REAL", [])?;
        }
        Ok(())
    }

    /// Idempotent per-run upsert: replaces the run row and rewrites that
    /// run's application rows in one transaction, so re-flushing the same
    /// run id never duplicates rows.
    pub fn upsert_run_summary(&mut self, summary: &RunSummary) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT OR REPLACE INTO runs (id, started_at, ended_at, keywords, locations, min_comp, result_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                summary.run_id,
                summary.started_at.to_rfc3339(),
                summary.ended_at.to_rfc3339(),
                serde_json::to_string(&summary.keywords)?,
                serde_json::to_string(&summary.locations)?,
                summary.min_compensation,
                summary.result_count as i64,
            ],
        )?;

        tx.execute(
            "DELETE FROM applications WHERE run_id = ?1",
            params![summary.run_id],
        )?;

        for outcome in &summary.results {
            tx.execute(
                "INSERT INTO applications (run_id, job_title, company, source, status, submitted_at, notes, fit_score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    summary.run_id,
                    outcome.job_title,
                    outcome.company,
                    outcome.source,
                    outcome.status,
                    outcome.submitted_at.to_rfc3339(),
                    outcome.notes,
                    outcome.fit_score,
                ],
            )?;
        }

        tx.commit().context("Failed to commit run summary")?;
        Ok(())
    }

    pub fn record_feedback(
        &self,
        run_id: &str,
        job_title: &str,
        company: &str,
        feedback: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO feedback (run_id, job_title, company, feedback) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, job_title, company, feedback],
        )?;
        Ok(())
    }

    pub fn list_feedback(&self, run_id: Option<&str>) -> Result<Vec<FeedbackEntry>> {
        let mut sql = String::from(
            "SELECT run_id, job_title, company, feedback, received_at FROM feedback",
        );
        if run_id.is_some() {
            sql.push_str(" WHERE run_id = ?1");
        }
        sql.push_str(" ORDER BY received_at DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = if let Some(id) = run_id {
            stmt.query_map([id], Self::row_to_feedback)?
        } else {
            stmt.query_map([], Self::row_to_feedback)?
        };

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to list feedback")
    }

    fn row_to_feedback(row: &rusqlite::Row) -> rusqlite::Result<FeedbackEntry> {
        Ok(FeedbackEntry {
            run_id: row.get(0)?,
            job_title: row.get(1)?,
            company: row.get(2)?,
            feedback: row.get(3)?,
            received_at: row.get(4)?,
        })
    }

    pub fn application_count(&self, run_id: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM applications WHERE run_id = ?1",
            [run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn run_result_count(&self, run_id: &str) -> Result<Option<i64>> {
        let result = self.conn.query_row(
            "SELECT result_count FROM runs WHERE id = ?1",
            [run_id],
            |row| row.get(0),
        );
        match result {
            Ok(count) => Ok(Some(count)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutcomeRecord;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn summary(run_id: &str, titles: &[&str]) -> RunSummary {
        let now = Utc::now();
        let results: Vec<OutcomeRecord> = titles
            .iter()
            .map(|title| OutcomeRecord {
                job_title: title.to_string(),
                company: "Acme".to_string(),
                status: "pending-human-review".to_string(),
                submitted_at: now,
                notes: None,
                source: "test".to_string(),
                fit_score: Some(0.5),
            })
            .collect();
        RunSummary {
            run_id: run_id.to_string(),
            started_at: now,
            ended_at: now,
            keywords: vec!["rust".to_string()],
            locations: vec!["remote".to_string()],
            min_compensation: Some(100_000),
            result_count: results.len(),
            status_counts: BTreeMap::new(),
            errors: vec![],
            results,
            top_matches: vec![],
        }
    }

    #[test]
    fn test_schema_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scout.db");
        let first = Database::open(&path).unwrap();
        drop(first);
        Database::open(&path).unwrap();
    }

    #[test]
    fn test_additive_migration_backfills_fit_score() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scout.db");

        // Simulate a database written before fit_score existed.
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE applications (
                     run_id TEXT NOT NULL,
                     job_title TEXT NOT NULL,
                     company TEXT NOT NULL,
                     source TEXT,
                     status TEXT,
                     submitted_at TEXT,
                     notes TEXT
                 );
                 INSERT INTO applications (run_id, job_title, company)
                 VALUES ('old-run', 'Engineer', 'Acme');",
            )
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let score: Option<f64> = db
            .conn
            .query_row(
                "SELECT fit_score FROM applications WHERE run_id = 'old-run'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(score.is_none());
        assert_eq!(db.application_count("old-run").unwrap(), 1);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(&dir.path().join("scout.db")).unwrap();
        let summary = summary("run-1", &["Engineer", "Analyst"]);

        db.upsert_run_summary(&summary).unwrap();
        db.upsert_run_summary(&summary).unwrap();

        assert_eq!(db.application_count("run-1").unwrap(), 2);
        assert_eq!(db.run_result_count("run-1").unwrap(), Some(2));
    }

    #[test]
    fn test_upsert_replaces_prior_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(&dir.path().join("scout.db")).unwrap();

        db.upsert_run_summary(&summary("run-1", &["Engineer", "Analyst"]))
            .unwrap();
        db.upsert_run_summary(&summary("run-1", &["Engineer"])).unwrap();

        assert_eq!(db.application_count("run-1").unwrap(), 1);
        assert_eq!(db.run_result_count("run-1").unwrap(), Some(1));
    }

    #[test]
    fn test_feedback_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("scout.db")).unwrap();

        // No runs rows exist; feedback is keyed loosely by run id and must
        // insert regardless.
        db.record_feedback("run-1", "Engineer", "Acme", "Phone screen scheduled")
            .unwrap();
        db.record_feedback("run-2", "Analyst", "Globex", "Rejected")
            .unwrap();

        let all = db.list_feedback(None).unwrap();
        assert_eq!(all.len(), 2);

        let one = db.list_feedback(Some("run-1")).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].job_title, "Engineer");
        assert_eq!(one[0].feedback, "Phone screen scheduled");
        assert!(!one[0].received_at.is_empty());
    }
}
