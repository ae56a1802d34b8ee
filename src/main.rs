mod ai;
mod config;
mod db;
mod discover;
mod error;
mod journal;
mod models;
mod pipeline;
mod profile;
mod scoring;
mod submit;
mod supervisor;
mod tailor;

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use db::Database;
use error::AgentError;
use journal::load_recent_runs;
use models::RunSummary;
use pipeline::Pipeline;
use supervisor::RunSupervisor;

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Job search agent - discover postings, tailor resumes, track applications")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Execute one full run: discover -> tailor -> score -> submit
    Run {
        /// Limit the number of jobs processed this run
        #[arg(short, long)]
        max_jobs: Option<usize>,
    },

    /// Launch a run through the supervisor and poll its status
    Agent {
        /// Limit the number of jobs processed this run
        #[arg(short, long)]
        max_jobs: Option<usize>,
    },

    /// Display recent runs and their outcomes
    History {
        /// Number of recent runs to display
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Manage recruiter feedback
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommands,
    },
}

#[derive(Subcommand)]
enum FeedbackCommands {
    /// Log feedback for an application
    Add {
        /// Run identifier (from the history table)
        run_id: String,

        /// Job title the feedback refers to
        job_title: String,

        /// Company associated with the job
        company: String,

        /// Notes from the recruiter or application portal
        note: String,
    },

    /// List recorded feedback
    List {
        /// Filter by run ID
        #[arg(short, long)]
        run_id: Option<String>,

        /// Maximum entries to display
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match cli.command {
        Commands::Init => {
            let db = Database::open(&config.db_path)?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Run { max_jobs } => {
            let pipeline = Pipeline::from_config(&config)?;
            let results = pipeline.run(max_jobs)?;
            if results.is_empty() {
                println!("No applications were submitted. Try broadening your search criteria.");
            } else {
                println!(
                    "{:<30} {:<20} {:<22} {:>8}",
                    "TITLE", "COMPANY", "STATUS", "FIT"
                );
                println!("{}", "-".repeat(84));
                for result in &results {
                    println!(
                        "{:<30} {:<20} {:<22} {:>7.1}%",
                        truncate(&result.job.title, 28),
                        truncate(&result.job.company, 18),
                        result.status,
                        result.fit_score.unwrap_or(0.0) * 100.0
                    );
                }
                println!("\n{} application(s) processed.", results.len());
            }
        }

        Commands::Agent { max_jobs } => {
            let supervisor = RunSupervisor::new(Box::new(move || {
                Pipeline::from_config(&AppConfig::from_env())
            }));

            match supervisor.start(max_jobs) {
                Ok(()) => println!("Run launched."),
                Err(AgentError::Busy) => {
                    println!("A run is already in progress.");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            while supervisor.status().running {
                println!("Run in progress...");
                std::thread::sleep(Duration::from_secs(1));
            }
            supervisor.wait();

            let snapshot = supervisor.status();
            match snapshot.latest {
                Some(record) => {
                    println!("Run {}: {} application(s)", record.status, record.total_applications);
                    if let Some(notes) = &record.notes {
                        println!("Notes: {}", notes);
                    }
                    for view in &record.results {
                        println!(
                            "  {} at {} - {}",
                            view.job_title, view.company, view.status
                        );
                    }
                }
                None => println!("No run recorded."),
            }
        }

        Commands::History { limit } => {
            let runs = load_recent_runs(&config.log_path, limit)?;
            if runs.is_empty() {
                println!("No recorded runs yet. Launch the agent to generate telemetry.");
            } else {
                render_history(&runs);
            }
        }

        Commands::Feedback { command } => {
            let db = Database::open(&config.db_path)?;
            match command {
                FeedbackCommands::Add {
                    run_id,
                    job_title,
                    company,
                    note,
                } => {
                    db.record_feedback(&run_id, &job_title, &company, &note)?;
                    println!("Feedback captured for '{}' at {}.", job_title, company);
                }

                FeedbackCommands::List { run_id, limit } => {
                    let entries = db.list_feedback(run_id.as_deref())?;
                    if entries.is_empty() {
                        println!("No feedback recorded yet. Log one via `scout feedback add`.");
                    } else {
                        println!(
                            "{:<38} {:<24} {:<18} {:<30}",
                            "RUN ID", "JOB TITLE", "COMPANY", "FEEDBACK"
                        );
                        println!("{}", "-".repeat(112));
                        for entry in entries.iter().take(limit) {
                            println!(
                                "{:<38} {:<24} {:<18} {:<30}",
                                truncate(&entry.run_id, 36),
                                truncate(&entry.job_title, 22),
                                truncate(&entry.company, 16),
                                truncate(&entry.feedback, 28)
                            );
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

fn render_history(runs: &[RunSummary]) {
    println!(
        "{:<38} {:<22} {:>6} {:<30}",
        "RUN ID", "STARTED", "JOBS", "STATUS MIX"
    );
    println!("{}", "-".repeat(98));
    for run in runs.iter().rev() {
        let status_mix = if run.status_counts.is_empty() {
            "-".to_string()
        } else {
            run.status_counts
                .iter()
                .map(|(status, count)| format!("{status}:{count}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!(
            "{:<38} {:<22} {:>6} {:<30}",
            run.run_id,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.result_count,
            truncate(&status_mix, 28)
        );
    }

    if let Some(latest) = runs.last() {
        if !latest.top_matches.is_empty() {
            println!("\nTop matches (run {}):", latest.run_id);
            println!(
                "{:<28} {:<18} {:<12} {:>7} {:<20}",
                "JOB", "COMPANY", "SOURCE", "FIT", "STATUS"
            );
            println!("{}", "-".repeat(88));
            for m in &latest.top_matches {
                println!(
                    "{:<28} {:<18} {:<12} {:>6.1}% {:<20}",
                    truncate(&m.job_title, 26),
                    truncate(&m.company, 16),
                    truncate(&m.source, 10),
                    m.fit_score.unwrap_or(0.0) * 100.0,
                    m.status
                );
            }
        }

        let errors: Vec<_> = runs
            .iter()
            .flat_map(|run| run.errors.iter().map(move |e| (run.run_id.as_str(), e)))
            .collect();
        if !errors.is_empty() {
            println!("\nErrors:");
            for (run_id, e) in errors {
                println!(
                    "  [{}] {} at {} ({}): {}",
                    truncate(run_id, 8),
                    e.job_title,
                    e.company,
                    e.stage,
                    e.error
                );
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
