//! services/client/src/cli/mod.rs
//!
//! Command line surface of the `evaluator` binary and the dispatch from
//! commands to the core services.

pub mod export;
pub mod render;
pub mod shell;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use evaluation_core::auth::{AuthContext, Registration, Route};
use evaluation_core::dashboard;
use evaluation_core::domain::{EvaluationMode, StagedFile, UploadedFileHandle};
use evaluation_core::filter::ScoreBand;
use evaluation_core::history::HistoryBrowser;
use evaluation_core::ports::SystemService;
use evaluation_core::session::EvaluationSession;
use tracing::{info, instrument};

use crate::adapters::{FileCredentialStore, HttpAuthAdapter, HttpBackend, RestClient};
use crate::config::Config;
use crate::error::CliError;
use export::ExportKind;

//=========================================================================================
// Command Definitions
//=========================================================================================

/// Client for the AI evaluation backend: grade documents, slide decks and
/// GitHub repositories, and browse past evaluations.
#[derive(Debug, Parser)]
#[command(name = "evaluator", version, about)]
pub struct Cli {
    /// Backend base URL, overriding EVALUATOR_API_URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and remember the credential.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account, then sign in with it.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    /// Forget the stored credential.
    Logout,
    /// Show the account behind the stored credential.
    Whoami,
    /// Account summary and backend health.
    Dashboard,
    /// Model provider and re-evaluation availability.
    Status,
    /// Browse past evaluations.
    #[command(subcommand)]
    History(HistoryCommand),
    /// Run one evaluation and print the results.
    #[command(subcommand)]
    Evaluate(EvaluateCommand),
    /// Interactive evaluation session.
    Shell,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        category: Option<String>,
    },
    Show {
        id: i64,
    },
    Delete {
        id: i64,
    },
    /// Download an originally uploaded file.
    Download {
        file_id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download the server-rendered report of one evaluated subject.
    Report {
        result_id: i64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum EvaluateCommand {
    /// Grade documents against a rubric.
    Files {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Review slide decks.
    Slides {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// Judge the visual design instead of the content.
        #[arg(long)]
        design: bool,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Audit a GitHub repository against free-text rules.
    Repo {
        #[arg(long)]
        url: String,
        #[arg(long)]
        rules: String,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Only show subjects in this score band: all, high, mid or low.
    #[arg(long, default_value = "all")]
    pub band: String,
    /// Only show subjects whose name contains this text.
    #[arg(long, default_value = "")]
    pub name: String,
    /// Write the report in these formats.
    #[arg(long, value_enum)]
    pub export: Vec<ExportKind>,
    /// Also write one report per subject.
    #[arg(long)]
    pub per_subject: bool,
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

//=========================================================================================
// Dispatch
//=========================================================================================

/// The wired-up client: one credential context shared by every adapter.
pub struct App {
    config: Config,
    auth: Arc<AuthContext>,
    backend: Arc<HttpBackend>,
}

impl App {
    /// Builds the adapters and restores any stored credential.
    pub async fn connect(config: Config) -> Result<Self, CliError> {
        let rest = RestClient::new(config.api_url.clone(), config.request_timeout)?;
        let store = Arc::new(FileCredentialStore::new(config.state_path.clone()));
        let auth = Arc::new(AuthContext::new(
            Arc::new(HttpAuthAdapter::new(rest.clone())),
            store,
        ));
        if let Some(user) = auth.hydrate().await? {
            info!(user_id = user.id, "Using stored credential");
        }
        let backend = Arc::new(HttpBackend::new(rest, auth.clone()));
        Ok(Self { config, auth, backend })
    }

    /// Runs one command. A rejected credential is forgotten before the
    /// error is reported.
    pub async fn run(&self, command: Command) -> Result<(), CliError> {
        match self.dispatch(command).await {
            Err(err) if err.is_unauthorized() => {
                self.auth.handle_unauthorized().await;
                Err(err)
            }
            other => other,
        }
    }

    async fn require(&self, route: Route) -> Result<(), CliError> {
        match self.auth.gate(route).await {
            Route::Login => Err(CliError::Usage(
                "Please login first: evaluator login --email <email> --password <password>".into(),
            )),
            _ => Ok(()),
        }
    }

    async fn dispatch(&self, command: Command) -> Result<(), CliError> {
        match command {
            Command::Login { email, password } => {
                let user = self.auth.login(&email, &password).await?;
                println!("Signed in as {}", user.email);
            }
            Command::Register { email, password, confirm } => {
                match self.auth.register(&email, &password, &confirm).await? {
                    Registration::SignedIn(user) => {
                        println!("Account created. Signed in as {}", user.email)
                    }
                    Registration::SignInRequired => {
                        println!("Account created. Please login to continue.")
                    }
                }
            }
            Command::Logout => {
                self.auth.logout().await?;
                println!("Signed out.");
            }
            Command::Whoami => {
                let user = self.auth.refresh_user().await?;
                println!("{} (id {})", user.email, user.id);
            }
            Command::Dashboard => {
                let summary = dashboard::account_summary(&self.auth, self.backend.as_ref()).await?;
                print!("{}", render::account_summary(&summary));
            }
            Command::Status => {
                self.require(Route::About).await?;
                let status = self.backend.model_status().await?;
                println!(
                    "Model: {}{}",
                    if status.connected { "connected" } else { "disconnected" },
                    status.detail.map(|d| format!(" ({})", d)).unwrap_or_default()
                );
                let available = self.backend.reevaluate_available().await;
                println!("Re-evaluate: {}", if available { "available" } else { "unavailable" });
            }
            Command::History(command) => {
                self.require(Route::History).await?;
                self.history(command).await?;
            }
            Command::Evaluate(command) => {
                self.require(Route::Services).await?;
                self.evaluate(command).await?;
            }
            Command::Shell => {
                self.require(Route::Services).await?;
                let session = EvaluationSession::new(self.backend.clone());
                shell::run(&session).await?;
            }
        }
        Ok(())
    }

    async fn history(&self, command: HistoryCommand) -> Result<(), CliError> {
        let mut browser = HistoryBrowser::new(self.backend.clone(), self.config.page_size);
        match command {
            HistoryCommand::List { page, category } => {
                browser.set_category(category);
                browser.fetch_page(page).await?;
                print!(
                    "{}",
                    render::history_page(
                        browser.entries(),
                        browser.page(),
                        browser.total_pages(),
                        browser.total()
                    )
                );
            }
            HistoryCommand::Show { id } => {
                print!("{}", render::history_detail(&browser.view(id).await?));
            }
            HistoryCommand::Delete { id } => {
                browser.delete(id).await?;
                println!("Deleted evaluation #{}.", id);
            }
            HistoryCommand::Download { file_id, output } => {
                let bytes = browser.download_file(&UploadedFileHandle::new(file_id.as_str())).await?;
                let path = output.unwrap_or_else(|| PathBuf::from(&file_id));
                save(&path, &bytes).await?;
            }
            HistoryCommand::Report { result_id, output } => {
                let bytes = browser.download_report(result_id).await?;
                let path =
                    output.unwrap_or_else(|| PathBuf::from(format!("evaluation_report_{}.pdf", result_id)));
                save(&path, &bytes).await?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self, command))]
    async fn evaluate(&self, command: EvaluateCommand) -> Result<(), CliError> {
        let session = EvaluationSession::new(self.backend.clone());
        let output = match command {
            EvaluateCommand::Files { title, description, files, output } => {
                session.select_mode(EvaluationMode::Files).await?;
                session.set_title(&title).await;
                session.set_description(&description).await;
                stage(&session, &files).await?;
                output
            }
            EvaluateCommand::Slides { title, description, design, files, output } => {
                session.select_mode(EvaluationMode::Slides).await?;
                session.set_title(&title).await;
                session.set_description(&description).await;
                session.set_evaluate_design(design).await;
                stage(&session, &files).await?;
                output
            }
            EvaluateCommand::Repo { url, rules, output } => {
                session.select_mode(EvaluationMode::Repository).await?;
                session.set_repository_url(&url).await;
                session.set_description(&rules).await;
                output
            }
        };
        let band: ScoreBand = output.band.parse()?;

        eprintln!("Evaluating...");
        let outcome = session.submit().await;
        session.close();
        let count = outcome?;
        info!(subjects = count, "Evaluation finished");

        let snapshot = session.snapshot().await;
        let visible = session.filtered(&output.name, band).await;
        print!("{}", render::results(&snapshot, &visible));

        for kind in &output.export {
            match export::write(&snapshot, *kind, None, &output.out_dir).await? {
                Some(path) => println!("Wrote {}", path.display()),
                None => println!("No results available to download."),
            }
            if output.per_subject {
                for (index, _) in &visible {
                    if let Some(path) =
                        export::write(&snapshot, *kind, Some(*index), &output.out_dir).await?
                    {
                        println!("Wrote {}", path.display());
                    }
                }
            }
        }
        Ok(())
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Reads files from disk into upload candidates named after their file names.
pub(crate) async fn read_staged_files(paths: &[PathBuf]) -> Result<Vec<StagedFile>, CliError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CliError::Usage(format!("'{}' is not a file", path.display())))?;
        let content = tokio::fs::read(path).await?;
        files.push(StagedFile::new(name, content));
    }
    Ok(files)
}

async fn stage(session: &EvaluationSession, paths: &[PathBuf]) -> Result<(), CliError> {
    let report = session.stage_files(read_staged_files(paths).await?).await;
    eprint!("{}", render::staging_report(&report));
    Ok(())
}

async fn save(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    println!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
