use chrono::Utc;
use tracing::info;

use crate::error::AgentError;
use crate::models::{ApplicationResult, ApplicationStatus, JobPosting, TailoredResume, UserProfile};

/// Submits one application. Implementations wrap whatever automation exists
/// for a given applicant tracking system; they fail with a submission error
/// on any unrecoverable fault.
pub trait Submitter: Send {
    fn submit(
        &self,
        profile: &UserProfile,
        job: &JobPosting,
        resume: &TailoredResume,
    ) -> Result<ApplicationResult, AgentError>;
}

/// Fallback submitter used when no automation can handle the posting: the
/// application is queued for a human, with the tailored resume preserved.
pub struct ManualReviewBot;

impl Submitter for ManualReviewBot {
    fn submit(
        &self,
        _profile: &UserProfile,
        job: &JobPosting,
        _resume: &TailoredResume,
    ) -> Result<ApplicationResult, AgentError> {
        info!(job_title = %job.title, job_company = %job.company, "queued for manual review");
        Ok(ApplicationResult {
            job: job.clone(),
            status: ApplicationStatus::PendingHumanReview,
            submitted_at: Utc::now(),
            notes: Some(
                "No automation available for this provider. Manual submission required."
                    .to_string(),
            ),
            fit_score: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contact, Resume};

    #[test]
    fn test_manual_review_bot_queues_for_review() {
        let profile = UserProfile {
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
                content: "resume".to_string(),
                format: "markdown".to_string(),
                last_updated: Utc::now(),
            },
            additional_documents: vec![],
        };
        let job = JobPosting {
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            location: None,
            description: "desc".to_string(),
            url: "https://jobs.example/1".to_string(),
            source: "test".to_string(),
            salary: None,
            listed_at: None,
        };
        let resume = TailoredResume {
            original_format: "markdown".to_string(),
            content: "tailored".to_string(),
            job_title: job.title.clone(),
            job_company: job.company.clone(),
            created_at: Utc::now(),
        };

        let result = ManualReviewBot.submit(&profile, &job, &resume).unwrap();
        assert_eq!(result.status, ApplicationStatus::PendingHumanReview);
        assert!(result.notes.unwrap().contains("Manual submission"));
        assert!(result.fit_score.is_none());
    }
}
