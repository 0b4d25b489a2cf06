//! CLI for driving AI-assisted deck generation sessions.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use deck_core::{AppState, FileUpload, InitialInput, InitialInputPatch};
use deck_generate::{generate_for_session, GenerationConfig, Orchestrator, RunOutcome};
use deck_http::{ApiClient, HttpConfig};
use deck_store::{LocalCache, Session, SessionState, StoreConfig, TieredStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Turn notes into a slide deck: clarify, approve an outline, generate.
#[derive(Parser, Debug)]
#[command(name = "deck")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Local cache directory
    #[arg(long, default_value = ".deck", global = true)]
    cache_dir: PathBuf,

    /// Backend base URL (document store and AI services)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token for the backend
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Keep documents in the local cache only, even with --api-url
    #[arg(long, global = true)]
    local_only: bool,

    /// Autosave coalescing window in milliseconds
    #[arg(long, default_value = "1000", global = true)]
    debounce_ms: u64,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new presentation and print its id
    New,

    /// Print a presentation's state and slides
    Show {
        id: String,
        /// Print the full document as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record the clarification outcome for a presentation
    Clarify {
        id: String,
        /// File with the free-text notes
        #[arg(long)]
        notes: PathBuf,
        /// Summary of the clarified goals
        #[arg(long)]
        goals: String,
        #[arg(long)]
        audience: Option<String>,
        #[arg(long)]
        tone: Option<String>,
        #[arg(long)]
        length: Option<String>,
    },

    /// Approve an outline (one slide title per line)
    Approve {
        id: String,
        #[arg(long)]
        outline: PathBuf,
    },

    /// Generate slides for the approved outline, replacing any existing
    /// slides; Ctrl-C stops after in-flight work
    Generate {
        id: String,
        /// Maximum simultaneous slide pipelines
        #[arg(short = 'c', long, default_value = "3")]
        concurrency: usize,
        /// Context chunks retrieved per slide
        #[arg(long, default_value = "5")]
        top_k: usize,
    },

    /// Copy a presentation under a new id
    Duplicate { id: String },

    /// Save a presentation and start a fresh one
    Reset { id: String },

    /// Upload a source file into a presentation
    Upload {
        id: String,
        file: PathBuf,
        #[arg(long)]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let api = match &args.api_url {
        Some(url) => {
            let mut config = HttpConfig::new(url);
            if let Some(key) = &args.api_key {
                config = config.with_api_key(key);
            }
            Some(Arc::new(ApiClient::new(config).context("Failed to build HTTP client")?))
        }
        None => None,
    };

    let session = open_session(&args, api.clone());
    let result = run_command(&args, &session, api).await;

    // Persist whatever the command changed; untouched documents are skipped.
    if let Err(e) = session.save_now().await {
        log::warn!("Final save failed: {}", e);
    }
    result
}

fn open_session(args: &Args, api: Option<Arc<ApiClient>>) -> Session {
    let config = StoreConfig::new(&args.cache_dir)
        .with_remote_enabled(api.is_some() && !args.local_only)
        .with_autosave_debounce(Duration::from_millis(args.debounce_ms));
    let local = LocalCache::new(&config.cache_dir);

    let store = match &api {
        Some(api) if config.remote_enabled => TieredStore::with_remote(api.clone(), local),
        _ => TieredStore::local_only(local),
    };
    match api {
        Some(api) => Session::with_uploader(store, &config, api),
        None => Session::new(store, &config),
    }
}

async fn run_command(args: &Args, session: &Session, api: Option<Arc<ApiClient>>) -> Result<()> {
    match &args.command {
        Command::New => {
            let id = session.reset_state().await;
            println!("{}", id);
        }
        Command::Show { id, json } => {
            // Read straight from the store so showing never writes.
            let store = session.store();
            let Some((presentation, _)) = store
                .load_with_source(id)
                .await
                .with_context(|| format!("Failed to load presentation {}", id))?
            else {
                bail!("Presentation {} not found", id);
            };
            let cached = store.local().cached_state(id).await;
            let state = SessionState {
                app_state: AppState::reconcile(cached, AppState::derive(&presentation)),
                presentation,
            };
            if *json {
                println!("{}", serde_json::to_string_pretty(&state.presentation)?);
            } else {
                print_summary(&state);
            }
        }
        Command::Clarify {
            id,
            notes,
            goals,
            audience,
            tone,
            length,
        } => {
            session.load(id).await;
            let text = std::fs::read_to_string(notes)
                .with_context(|| format!("Failed to read {}", notes.display()))?;
            if session.app_state() == AppState::Initial {
                session
                    .begin_clarification(InitialInput {
                        text,
                        ..InitialInput::default()
                    })
                    .await?;
            } else {
                session.patch_initial_input(InitialInputPatch {
                    text: Some(text),
                    ..InitialInputPatch::default()
                });
            }
            session.patch_initial_input(InitialInputPatch {
                audience: audience.clone(),
                tone: tone.clone(),
                length: length.clone(),
                ..InitialInputPatch::default()
            });
            session.finish_clarification(goals.clone()).await?;
            print_summary(&session.snapshot());
        }
        Command::Approve { id, outline } => {
            session.load(id).await;
            let titles = read_outline(outline)?;
            session.approve_outline(titles).await?;
            print_summary(&session.snapshot());
        }
        Command::Generate {
            id,
            concurrency,
            top_k,
        } => {
            let Some(api) = api else {
                bail!("--api-url is required to generate slides");
            };
            let state = session.load(id).await;
            if state.app_state == AppState::Error {
                bail!("Presentation {} is in the error state; reset it first", id);
            }

            let orchestrator = Orchestrator::new(api.clone(), api.clone())
                .with_retriever(api)
                .with_config(
                    GenerationConfig::default()
                        .with_max_concurrency(*concurrency)
                        .with_retrieval_top_k(*top_k),
                );

            let cancel = session.cancellation().clone();
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("Cancelling after in-flight slides finish...");
                    cancel.cancel();
                }
            });
            let report = generate_for_session(session, &orchestrator).await;
            watcher.abort();

            let report = report.context("Slide generation failed")?;
            if args.verbose {
                eprintln!("  Generated {}/{} slides", report.completed, report.total);
            }
            if report.outcome == RunOutcome::Cancelled {
                eprintln!("Generation cancelled; kept {} slides", report.completed);
            }
            print_summary(&session.snapshot());
        }
        Command::Duplicate { id } => {
            session.load(id).await;
            let copy = session.duplicate_presentation().await?;
            println!("{}", copy);
        }
        Command::Reset { id } => {
            session.load(id).await;
            let fresh = session.reset_state().await;
            println!("{}", fresh);
        }
        Command::Upload { id, file, category } => {
            session.load(id).await;
            let upload = read_upload(file)?;
            let file_ref = session
                .upload_file(&upload, category.as_deref())
                .await
                .with_context(|| format!("Failed to upload {}", file.display()))?;
            println!("{}", file_ref.url);
            session.patch_initial_input(InitialInputPatch {
                add_files: vec![file_ref],
                ..InitialInputPatch::default()
            });
        }
    }
    Ok(())
}

/// Read an outline file: one title per non-empty line.
fn read_outline(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let titles: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();
    if titles.is_empty() {
        log::warn!("Outline {} is empty", path.display());
    }
    Ok(titles)
}

fn read_upload(path: &Path) -> Result<FileUpload> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    let mime_type = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(mime_for_extension)
        .map(String::from);
    Ok(FileUpload {
        name,
        mime_type,
        bytes,
    })
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        "md" => Some("text/markdown"),
        "csv" => Some("text/csv"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "pptx" => {
            Some("application/vnd.openxmlformats-officedocument.presentationml.presentation")
        }
        _ => None,
    }
}

fn print_summary(state: &SessionState) {
    let doc = &state.presentation;
    println!("{} [{}]", doc.id, state.app_state);
    if let Some(goals) = &doc.clarified_goals {
        println!("Goals: {}", goals);
    }
    for (i, title) in doc.outline.iter().enumerate() {
        println!("{:>3}. {}", i + 1, title);
    }
    if !doc.outline.is_empty() {
        println!("Slides: {}/{}", doc.slides.len(), doc.outline.len());
    }
    for slide in &doc.slides {
        println!();
        println!("## {}", slide.title);
        for bullet in &slide.content {
            println!("- {}", bullet);
        }
    }
}
