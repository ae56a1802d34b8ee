use std::env;
use std::path::PathBuf;

use crate::models::SearchCriteria;

/// Process configuration, read once at startup and passed by value to each
/// component. No component reads the environment after construction.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub search: SearchCriteria,
    pub scoring: ScoringSettings,
    pub llm: LlmSettings,
    /// When the tailoring backend is unavailable, echo the base resume
    /// instead of failing the candidate.
    pub tailor_fallback_to_base: bool,
    pub profile_path: PathBuf,
    pub log_path: PathBuf,
    pub db_path: PathBuf,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ScoringSettings {
    pub provider: String,
    pub embedding_model: String,
    /// Weight of the lexical signal when blending with the embedding signal.
    /// Clamped to [0,1] at use.
    pub fallback_weight: f64,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub api_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let api_key = env::var("OPENAI_API_KEY").ok();

        let search = SearchCriteria {
            keywords: parse_list(env::var("DEFAULT_SEARCH_KEYWORDS").ok().as_deref())
                .unwrap_or_else(|| vec!["Software Engineer".to_string()]),
            locations: parse_list(env::var("DEFAULT_SEARCH_LOCATIONS").ok().as_deref())
                .unwrap_or_else(|| vec!["Remote".to_string()]),
            min_compensation: env::var("TARGET_MIN_COMPENSATION")
                .ok()
                .and_then(|v| v.trim().parse().ok()),
        };

        let scoring = ScoringSettings {
            provider: env::var("SCORING_PROVIDER").unwrap_or_else(|_| "openai".to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            fallback_weight: env::var("SCORING_FALLBACK_WEIGHT")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0.35),
            api_key: api_key.clone(),
        };

        let llm = LlmSettings {
            provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string()),
            model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            temperature: env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0.2),
            api_key,
        };

        Self {
            search,
            scoring,
            llm,
            tailor_fallback_to_base: env::var("TAILOR_FALLBACK_TO_BASE")
                .map(|v| v.trim().eq_ignore_ascii_case("true") || v.trim() == "1")
                .unwrap_or(true),
            profile_path: env::var("PROFILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("config/profile.json")),
            log_path: env::var("RUN_HISTORY_LOG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_data_file("run_history.jsonl")),
            db_path: env::var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_data_file("scout.db")),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(30),
        }
    }
}

fn default_data_file(name: &str) -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "scout") {
        proj_dirs.data_dir().join(name)
    } else {
        PathBuf::from(name)
    }
}

/// Semicolon-separated lists, e.g. `DEFAULT_SEARCH_KEYWORDS="Rust;Backend"`.
/// Returns `None` when the variable is unset or contains nothing usable.
fn parse_list(value: Option<&str>) -> Option<Vec<String>> {
    let items: Vec<String> = value?
        .split(';')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();
    if items.is_empty() { None } else { Some(items) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_splits_and_trims() {
        let parsed = parse_list(Some("Rust; Backend Engineer ;;Distributed Systems")).unwrap();
        assert_eq!(parsed, vec!["Rust", "Backend Engineer", "Distributed Systems"]);
    }

    #[test]
    fn test_parse_list_empty_is_none() {
        assert!(parse_list(None).is_none());
        assert!(parse_list(Some("")).is_none());
        assert!(parse_list(Some(" ; ; ")).is_none());
    }
}
