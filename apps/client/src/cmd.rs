use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::auth;
use crate::errors::ClientError;
use crate::guard::{self, Screen};
use crate::matches::MatchFeedLoader;
use crate::session::SessionStore;
use crate::transfer::TransferClient;
use crate::upload::UploadOrchestrator;

#[derive(Parser)]
#[command(about = "client for the AI job-matching platform")]
struct Cmd {
    #[command(subcommand)]
    command: Option<SubCommandType>,
}

#[derive(Subcommand)]
enum SubCommandType {
    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and persist the session credential
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Drop the persisted session credential
    Logout,
    /// Show the current resume processing status
    Status,
    /// Upload a resume document
    Upload { path: PathBuf },
    /// Print a short-lived download address for a resume
    Download {
        /// Record to download; defaults to the most recent resume
        #[arg(long)]
        id: Option<Uuid>,
    },
    /// List ranked job matches
    Matches {
        #[arg(long, default_value_t = 0)]
        skip: u64,
        #[arg(long, default_value_t = 10)]
        limit: u64,
    },
}

fn screen_for(command: &SubCommandType) -> Screen {
    match command {
        SubCommandType::Register { .. } => Screen::Register,
        SubCommandType::Login { .. } | SubCommandType::Logout => Screen::Login,
        SubCommandType::Status
        | SubCommandType::Upload { .. }
        | SubCommandType::Download { .. } => Screen::Resume,
        SubCommandType::Matches { .. } => Screen::Matches,
    }
}

pub async fn run(session: Arc<SessionStore>, transfer: Arc<TransferClient>) -> Result<()> {
    let args = Cmd::parse();
    let Some(command) = args.command else {
        tracing::error!("no subcommand passed");
        return Ok(());
    };

    // The session guard runs before every screen; nothing else executes
    // for an unauthenticated user.
    let screen = screen_for(&command);
    if guard::check(&session, screen).is_some() {
        println!("Not logged in. Please run `client login` first.");
        return Ok(());
    }

    let mut auth_signal = session.subscribe();
    if let Err(err) = dispatch(command, &session, &transfer).await {
        let (code, message) = err.user_message();
        eprintln!("{message} [{code}]");
    }

    // The gate re-runs whenever the authenticated signal changes; for a
    // one-shot command that means once more after dispatch.
    if auth_signal.has_changed().unwrap_or(false) && !*auth_signal.borrow_and_update() {
        if let Some(redirect) = guard::check(&session, screen) {
            tracing::debug!("session ended during command, redirecting to {redirect:?}");
        }
    }
    tracing::debug!("active screen: {:?}", *session.navigation().borrow());
    Ok(())
}

async fn dispatch(
    command: SubCommandType,
    session: &Arc<SessionStore>,
    transfer: &Arc<TransferClient>,
) -> Result<(), ClientError> {
    match command {
        SubCommandType::Register {
            username,
            email,
            password,
        } => {
            auth::register(transfer, &username, &email, &password).await?;
            println!("Registered. You can now log in.");
        }
        SubCommandType::Login { username, password } => {
            auth::login(transfer, session, &username, &password).await?;
            println!("Logged in.");
        }
        SubCommandType::Logout => {
            session.logout();
            println!("Logged out.");
        }
        SubCommandType::Status => {
            let orchestrator = UploadOrchestrator::new(transfer.clone());
            if let Err(err) = orchestrator.refresh().await {
                // The empty-state sentinel covers fetch failures too.
                tracing::warn!("status fetch failed: {err}");
            }
            println!("Current status: {}", orchestrator.display_status());
            if let Some(record) = orchestrator.latest_record() {
                println!(
                    "  {} ({} bytes, progress {:.0}%)",
                    record.original_filename,
                    record.file_size.unwrap_or(0),
                    record.upload_progress * 100.0
                );
            }
        }
        SubCommandType::Upload { path } => {
            let bytes = tokio::fs::read(&path).await.map_err(|err| {
                ClientError::Validation(format!("could not read {}: {err}", path.display()))
            })?;
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| ClientError::Validation("invalid file name".to_string()))?;

            let orchestrator = UploadOrchestrator::new(transfer.clone());
            orchestrator.select_file(name, bytes.into())?;
            let resume_id = orchestrator.upload().await?;
            tracing::debug!("upload finished in phase {:?}", orchestrator.phase());
            println!(
                "Uploaded resume {resume_id}. Current status: {}",
                orchestrator.display_status()
            );
        }
        SubCommandType::Download { id } => {
            let orchestrator = UploadOrchestrator::new(transfer.clone());
            let resume_id = match id {
                Some(id) => id,
                None => orchestrator
                    .refresh()
                    .await?
                    .map(|record| record.id)
                    .ok_or(ClientError::DownloadUnavailable)?,
            };
            let url = orchestrator.download_url(resume_id).await?;
            println!("{url}");
        }
        SubCommandType::Matches { skip, limit } => {
            let loader = MatchFeedLoader::new(transfer.clone());
            let feed = loader.list(skip, limit).await?;
            if feed.is_empty() {
                println!("No matches yet. Processing in background.");
            } else {
                for entry in &feed.matches {
                    match &entry.score_badge {
                        Some(badge) => println!("{badge:>6}  {} at {}", entry.title, entry.company),
                        None => println!("        {} at {}", entry.title, entry.company),
                    }
                    if let Some(created) = entry.created_at {
                        println!("        matched {}", created.format("%Y-%m-%d"));
                    }
                    println!("        {}", entry.analysis);
                }
                println!("{} of {} matches", feed.matches.len(), feed.total);
            }
        }
    }
    Ok(())
}
