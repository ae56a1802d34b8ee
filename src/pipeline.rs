use std::path::PathBuf;

use tracing::{error, info};

use crate::ai;
use crate::config::AppConfig;
use crate::discover::{DiscoveryService, RemoteOkSource};
use crate::error::AgentError;
use crate::journal::RunJournal;
use crate::models::{ApplicationResult, SearchCriteria, Stage};
use crate::profile::{JsonProfileStore, ProfileStore};
use crate::scoring::FitScorer;
use crate::submit::{ManualReviewBot, Submitter};
use crate::tailor::{ResumeTailor, TailorEngine};

const DEFAULT_SOURCE_RESULTS: usize = 50;

/// Drives one run end to end: load profile, discover candidates, then
/// tailor -> score -> submit per candidate, with each stage independently
/// guarded so one bad candidate never aborts the batch. Every outcome and
/// error lands in a per-run [`RunJournal`], which is flushed unconditionally
/// at the end of the run.
pub struct Pipeline {
    criteria: SearchCriteria,
    profiles: Box<dyn ProfileStore>,
    discovery: DiscoveryService,
    tailor: Box<dyn TailorEngine>,
    scorer: FitScorer,
    submitter: Box<dyn Submitter>,
    log_path: PathBuf,
    db_path: PathBuf,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        criteria: SearchCriteria,
        profiles: Box<dyn ProfileStore>,
        discovery: DiscoveryService,
        tailor: Box<dyn TailorEngine>,
        scorer: FitScorer,
        submitter: Box<dyn Submitter>,
        log_path: PathBuf,
        db_path: PathBuf,
    ) -> Self {
        Self {
            criteria,
            profiles,
            discovery,
            tailor,
            scorer,
            submitter,
            log_path,
            db_path,
        }
    }

    /// Wire the production collaborator set from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, AgentError> {
        let text_backend = ai::create_text_backend(&config.llm, config.request_timeout_secs);
        let embedding_backend =
            ai::create_embedding_backend(&config.scoring, config.request_timeout_secs);

        let remoteok = RemoteOkSource::new(DEFAULT_SOURCE_RESULTS, config.request_timeout_secs)?;

        Ok(Self::new(
            config.search.clone(),
            Box::new(JsonProfileStore::new(config.profile_path.clone())),
            DiscoveryService::new(vec![Box::new(remoteok)]),
            Box::new(ResumeTailor::new(text_backend, config.tailor_fallback_to_base)),
            FitScorer::new(config.scoring.clone(), embedding_backend),
            Box::new(ManualReviewBot),
            config.log_path.clone(),
            config.db_path.clone(),
        ))
    }

    /// Execute one run. The journal is flushed whether or not the run
    /// succeeds; a discovery or profile failure still seals an (empty)
    /// summary before the error is surfaced.
    pub fn run(&self, max_jobs: Option<usize>) -> Result<Vec<ApplicationResult>, AgentError> {
        let journal = RunJournal::new(
            self.criteria.clone(),
            self.log_path.clone(),
            self.db_path.clone(),
        );
        info!(run_id = journal.run_id(), "run started");

        let outcome = self.process(&journal, max_jobs);

        let flushed = journal
            .finish()
            .map_err(|e| AgentError::Telemetry(e.to_string()));

        match (outcome, flushed) {
            (Ok(results), Ok(_)) => {
                info!(run_id = journal.run_id(), results = results.len(), "run complete");
                Ok(results)
            }
            (Err(run_error), _) => Err(run_error),
            (Ok(_), Err(flush_error)) => Err(flush_error),
        }
    }

    fn process(
        &self,
        journal: &RunJournal,
        max_jobs: Option<usize>,
    ) -> Result<Vec<ApplicationResult>, AgentError> {
        let profile = self.profiles.load()?;

        let mut jobs = self.discovery.discover(&self.criteria)?;
        if let Some(cap) = max_jobs {
            jobs.truncate(cap);
        }
        info!(job_count = jobs.len(), "processing candidates");

        let mut results = Vec::new();
        for job in &jobs {
            // Tailor. Submission is never attempted without a tailored resume.
            let tailored = match self.tailor.tailor(&profile, job) {
                Ok(tailored) => tailored,
                Err(e) => {
                    let message = match &e {
                        AgentError::Tailoring(cause) => format!("Tailoring failed: {cause}"),
                        other => format!("Unexpected tailoring error: {other}"),
                    };
                    error!(job_title = %job.title, job_company = %job.company, error = %e, "tailoring failed");
                    journal.record_error(job, Stage::Tailoring, message);
                    continue;
                }
            };

            // Score. Never fails and never blocks submission.
            let fit_score = self
                .scorer
                .score(&profile.base_resume.content, &job.description);

            // Submit. A failure preserves the tailored resume for manual
            // follow-up; only the outcome is lost.
            match self.submitter.submit(&profile, job, &tailored) {
                Ok(mut result) => {
                    result.fit_score = Some(fit_score);
                    journal.record_outcome(&result);
                    info!(
                        job_title = %job.title,
                        job_company = %job.company,
                        status = %result.status,
                        fit_score,
                        "application recorded"
                    );
                    results.push(result);
                }
                Err(e) => {
                    let message = match &e {
                        AgentError::Submission(cause) => format!("Application failed: {cause}"),
                        other => format!("Unexpected application error: {other}"),
                    };
                    error!(job_title = %job.title, job_company = %job.company, error = %e, "application failed");
                    journal.record_error(job, Stage::Submission, message);
                }
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringSettings;
    use crate::discover::JobSource;
    use crate::journal::load_recent_runs;
    use crate::models::{
        ApplicationStatus, Contact, JobPosting, Resume, TailoredResume, UserProfile,
    };
    use chrono::Utc;
    use std::path::Path;

    struct StaticProfile;

    impl ProfileStore for StaticProfile {
        fn load(&self) -> Result<UserProfile, AgentError> {
            Ok(UserProfile {
                contact: Contact {
                    full_name: "Jane Doe".to_string(),
                    email: "jane@example.com".to_string(),
                    phone: None,
                    location: None,
                    linkedin_url: None,
                    github_url: None,
                    portfolio_url: None,
                },
                base_resume: Resume {
                    content: "Senior engineer building distributed systems in Rust".to_string(),
                    format: "markdown".to_string(),
                    last_updated: Utc::now(),
                },
                additional_documents: vec![],
            })
        }
    }

    struct FixedSource {
        postings: Vec<JobPosting>,
    }

    impl JobSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        fn search(&self, criteria: &SearchCriteria) -> Result<Vec<JobPosting>, AgentError> {
            Ok(self
                .postings
                .iter()
                .filter(|p| crate::discover::matches_criteria(p, criteria))
                .cloned()
                .collect())
        }
    }

    struct FailingSource;

    impl JobSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        fn search(&self, _criteria: &SearchCriteria) -> Result<Vec<JobPosting>, AgentError> {
            Err(AgentError::Discovery("board unreachable".to_string()))
        }
    }

    struct SelectiveTailor {
        fail_title: Option<String>,
    }

    impl TailorEngine for SelectiveTailor {
        fn tailor(
            &self,
            profile: &UserProfile,
            job: &JobPosting,
        ) -> Result<TailoredResume, AgentError> {
            if self.fail_title.as_deref() == Some(job.title.as_str()) {
                return Err(AgentError::Tailoring("generation failed".to_string()));
            }
            Ok(TailoredResume {
                original_format: profile.base_resume.format.clone(),
                content: profile.base_resume.content.clone(),
                job_title: job.title.clone(),
                job_company: job.company.clone(),
                created_at: Utc::now(),
            })
        }
    }

    struct AcceptingBot;

    impl Submitter for AcceptingBot {
        fn submit(
            &self,
            _profile: &UserProfile,
            job: &JobPosting,
            _resume: &TailoredResume,
        ) -> Result<ApplicationResult, AgentError> {
            Ok(ApplicationResult {
                job: job.clone(),
                status: ApplicationStatus::Submitted,
                submitted_at: Utc::now(),
                notes: None,
                fit_score: None,
            })
        }
    }

    fn posting(title: &str, description: &str) -> JobPosting {
        JobPosting {
            title: title.to_string(),
            company: "Acme".to_string(),
            location: Some("Remote".to_string()),
            description: description.to_string(),
            url: format!("https://jobs.example/{title}"),
            source: "fixed".to_string(),
            salary: None,
            listed_at: None,
        }
    }

    fn scorer() -> FitScorer {
        FitScorer::new(
            ScoringSettings {
                provider: "noop".to_string(),
                embedding_model: "none".to_string(),
                fallback_weight: 1.0,
                api_key: None,
            },
            None,
        )
    }

    fn pipeline(
        dir: &Path,
        criteria: SearchCriteria,
        source: Box<dyn JobSource>,
        tailor: Box<dyn TailorEngine>,
    ) -> Pipeline {
        Pipeline::new(
            criteria,
            Box::new(StaticProfile),
            DiscoveryService::new(vec![source]),
            tailor,
            scorer(),
            Box::new(AcceptingBot),
            dir.join("run_history.jsonl"),
            dir.join("scout.db"),
        )
    }

    fn open_criteria() -> SearchCriteria {
        SearchCriteria {
            keywords: vec![],
            locations: vec![],
            min_compensation: None,
        }
    }

    #[test]
    fn test_tailoring_failure_isolated_to_one_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let source = FixedSource {
            postings: vec![
                posting("alpha", "rust systems"),
                posting("beta", "rust systems"),
                posting("gamma", "rust systems"),
            ],
        };
        let tailor = SelectiveTailor {
            fail_title: Some("beta".to_string()),
        };
        let pipeline = pipeline(dir.path(), open_criteria(), Box::new(source), Box::new(tailor));

        let results = pipeline.run(None).unwrap();
        assert_eq!(results.len(), 2);

        let runs = load_recent_runs(&dir.path().join("run_history.jsonl"), 1).unwrap();
        let summary = &runs[0];
        assert_eq!(summary.result_count, 2);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].job_title, "beta");
        assert_eq!(summary.errors[0].stage, Stage::Tailoring);
        assert!(summary.errors[0].error.starts_with("Tailoring failed"));
    }

    #[test]
    fn test_discovery_failure_still_flushes_empty_summary() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            dir.path(),
            open_criteria(),
            Box::new(FailingSource),
            Box::new(SelectiveTailor { fail_title: None }),
        );

        match pipeline.run(None) {
            Err(AgentError::Discovery(message)) => assert!(message.contains("unreachable")),
            other => panic!("expected discovery error, got {other:?}"),
        }

        let runs = load_recent_runs(&dir.path().join("run_history.jsonl"), 1).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].result_count, 0);
        assert!(runs[0].results.is_empty());
    }

    #[test]
    fn test_max_jobs_cap_applied_after_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let source = FixedSource {
            postings: vec![
                posting("alpha", "rust"),
                posting("beta", "rust"),
                posting("gamma", "rust"),
            ],
        };
        let pipeline = pipeline(
            dir.path(),
            open_criteria(),
            Box::new(source),
            Box::new(SelectiveTailor { fail_title: None }),
        );

        let results = pipeline.run(Some(2)).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].job.title, "alpha");
        assert_eq!(results[1].job.title, "beta");
    }

    #[test]
    fn test_fit_score_attached_to_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let source = FixedSource {
            postings: vec![posting("alpha", "distributed systems rust engineer")],
        };
        let pipeline = pipeline(
            dir.path(),
            open_criteria(),
            Box::new(source),
            Box::new(SelectiveTailor { fail_title: None }),
        );

        let results = pipeline.run(None).unwrap();
        let score = results[0].fit_score.expect("score attached");
        assert!(score > 0.0);
        assert!(score <= 1.0);
    }

    #[test]
    fn test_end_to_end_filtering_and_submission() {
        let dir = tempfile::tempdir().unwrap();
        let criteria = SearchCriteria {
            keywords: vec!["engineer".to_string()],
            locations: vec!["remote".to_string()],
            min_compensation: Some(100_000),
        };
        let source = FixedSource {
            postings: vec![
                posting("Senior Engineer", "Distributed systems in Rust, pays $120,000"),
                posting("Chief Accountant", "Ledgers and audits, pays $150,000"),
            ],
        };
        let pipeline = pipeline(
            dir.path(),
            criteria,
            Box::new(source),
            Box::new(SelectiveTailor { fail_title: None }),
        );

        let results = pipeline.run(None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].job.title, "Senior Engineer");
        assert_eq!(results[0].status, ApplicationStatus::Submitted);
        assert!(results[0].fit_score.is_some());
    }

    #[test]
    fn test_submission_failure_recorded_and_run_continues() {
        struct RejectingBot;

        impl Submitter for RejectingBot {
            fn submit(
                &self,
                _profile: &UserProfile,
                job: &JobPosting,
                _resume: &TailoredResume,
            ) -> Result<ApplicationResult, AgentError> {
                if job.title == "beta" {
                    Err(AgentError::Submission("form rejected".to_string()))
                } else {
                    Ok(ApplicationResult {
                        job: job.clone(),
                        status: ApplicationStatus::Submitted,
                        submitted_at: Utc::now(),
                        notes: None,
                        fit_score: None,
                    })
                }
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let source = FixedSource {
            postings: vec![posting("alpha", "rust"), posting("beta", "rust")],
        };
        let pipeline = Pipeline::new(
            open_criteria(),
            Box::new(StaticProfile),
            DiscoveryService::new(vec![Box::new(source)]),
            Box::new(SelectiveTailor { fail_title: None }),
            scorer(),
            Box::new(RejectingBot),
            dir.path().join("run_history.jsonl"),
            dir.path().join("scout.db"),
        );

        let results = pipeline.run(None).unwrap();
        assert_eq!(results.len(), 1);

        let runs = load_recent_runs(&dir.path().join("run_history.jsonl"), 1).unwrap();
        assert_eq!(runs[0].errors.len(), 1);
        assert_eq!(runs[0].errors[0].stage, Stage::Submission);
        assert!(runs[0].errors[0].error.starts_with("Application failed"));
    }
}
