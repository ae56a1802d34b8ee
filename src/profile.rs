use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::error::AgentError;
use crate::models::{Contact, Resume, UserProfile};

/// Loads the user's profile and base resume. Read-only to the pipeline.
pub trait ProfileStore: Send {
    fn load(&self) -> Result<UserProfile, AgentError>;
}

/// The default implementation: a JSON document on disk pointing at a resume
/// file.
pub struct JsonProfileStore {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ProfileDocument {
    contact: Contact,
    resume: ResumeReference,
}

#[derive(Debug, Deserialize)]
struct ResumeReference {
    path: PathBuf,
    #[serde(default = "default_format")]
    format: String,
}

fn default_format() -> String {
    "markdown".to_string()
}

impl JsonProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_document(&self) -> Result<ProfileDocument, AgentError> {
        let raw = fs::read_to_string(&self.path).map_err(|_| {
            AgentError::Profile(format!("Profile file not found: {}", self.path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AgentError::Profile(format!("Malformed profile {}: {e}", self.path.display()))
        })
    }

    fn read_resume(&self, path: &Path, format: &str) -> Result<Resume, AgentError> {
        let content = fs::read_to_string(path).map_err(|_| {
            AgentError::Profile(format!("Base resume file not found: {}", path.display()))
        })?;
        Ok(Resume {
            content,
            format: format.to_string(),
            last_updated: Utc::now(),
        })
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self) -> Result<UserProfile, AgentError> {
        let document = self.read_document()?;
        let base_resume = self.read_resume(&document.resume.path, &document.resume.format)?;
        info!(user = %document.contact.full_name, "profile loaded");
        Ok(UserProfile {
            contact: document.contact,
            base_resume,
            additional_documents: Vec::new(),
        })
    }
}
