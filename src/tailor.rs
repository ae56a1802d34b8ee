use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::ai::AiBackend;
use crate::error::AgentError;
use crate::models::{JobPosting, TailoredResume, UserProfile};

/// Produces a resume variant tuned to one posting.
pub trait TailorEngine: Send {
    fn tailor(&self, profile: &UserProfile, job: &JobPosting) -> Result<TailoredResume, AgentError>;
}

/// LLM-backed tailoring. When no backend is configured the behavior is a
/// policy choice: either echo the base resume (degraded mode) or fail the
/// candidate, controlled by `fallback_to_base`.
pub struct ResumeTailor {
    backend: Option<Arc<dyn AiBackend>>,
    fallback_to_base: bool,
}

impl ResumeTailor {
    pub fn new(backend: Option<Arc<dyn AiBackend>>, fallback_to_base: bool) -> Self {
        Self {
            backend,
            fallback_to_base,
        }
    }
}

impl TailorEngine for ResumeTailor {
    fn tailor(&self, profile: &UserProfile, job: &JobPosting) -> Result<TailoredResume, AgentError> {
        let content = match &self.backend {
            Some(backend) => {
                let prompt = build_prompt(profile, job);
                backend
                    .generate_text(&prompt)
                    .map_err(|e| AgentError::Tailoring(e.to_string()))?
            }
            None if self.fallback_to_base => {
                warn!(
                    job_title = %job.title,
                    job_company = %job.company,
                    "no tailoring backend, using base resume"
                );
                profile.base_resume.content.clone()
            }
            None => {
                return Err(AgentError::Tailoring(
                    "LLM provider not configured. Supply an API key to enable tailoring.".to_string(),
                ));
            }
        };

        info!(job_title = %job.title, job_company = %job.company, "resume tailored");
        Ok(TailoredResume {
            original_format: profile.base_resume.format.clone(),
            content,
            job_title: job.title.clone(),
            job_company: job.company.clone(),
            created_at: Utc::now(),
        })
    }
}

const DESCRIPTION_SNIPPET: usize = 500;
const RESUME_SNIPPET: usize = 2000;

/// Prompt aligning the base resume with one job description.
pub fn build_prompt(profile: &UserProfile, job: &JobPosting) -> String {
    let keywords: Vec<&str> = job.description.split_whitespace().take(20).collect();
    format!(
        "You are an expert career coach. Rewrite the following resume summary and \
         bullet points so they align with the target job description. Do not invent \
         experience that is not present in the base resume. Highlight quantifiable \
         achievements and incorporate relevant keywords.\n\n\
         JOB TITLE: {}\n\
         COMPANY: {}\n\
         LOCATION: {}\n\n\
         JOB DESCRIPTION SNIPPET:\n{}\n\n\
         KEYWORDS TO PRIORITIZE:\n{}\n\n\
         BASE RESUME:\n{}",
        job.title,
        job.company,
        job.location.as_deref().unwrap_or("Unspecified"),
        truncate_chars(&job.description, DESCRIPTION_SNIPPET),
        keywords.join(", "),
        truncate_chars(&profile.base_resume.content, RESUME_SNIPPET),
    )
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
