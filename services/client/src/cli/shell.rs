//! services/client/src/cli/shell.rs
//!
//! The interactive shell: one long-lived Evaluation Session driven by
//! line commands, standing in for a browser tab.

use std::path::PathBuf;

use clap::ValueEnum;
use evaluation_core::domain::EvaluationMode;
use evaluation_core::filter::ScoreBand;
use evaluation_core::session::{EvaluationSession, SessionError};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use super::export::{self, ExportKind};
use super::{read_staged_files, render};
use crate::error::CliError;

pub const HELP: &str = "\
Commands:
  mode <files|slides|repo|none>   choose the evaluation type (none switches type)
  stage <path>...                 add files to the upload list
  staged                          list staged files
  remove <n>                      drop staged file n
  title <text>                    set the title
  description <text>              set the description or repository rules
  url <github url>                set the repository to audit
  design <on|off>                 judge slide design instead of content
  submit                          run the evaluation
  results                         show the results with the current filter
  filter [all|high|mid|low] [name]  narrow the results list
  reevaluate <n>...               re-run evaluation for subjects n...
  export <text|print|doc> [n]     write the report (or subject n's) to disk
  status                          show the session inputs
  reset                           switch evaluation type
  help                            show this text
  quit                            leave the shell";

/// One parsed shell line. Subject and file numbers are 1-based as typed.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Mode(EvaluationMode),
    Stage(Vec<PathBuf>),
    Staged,
    Remove(usize),
    Title(String),
    Description(String),
    Url(String),
    Design(bool),
    Submit,
    Results,
    Filter { band: ScoreBand, name: String },
    Reevaluate(Vec<usize>),
    Export { kind: ExportKind, subject: Option<usize> },
    Status,
    Reset,
    Help,
    Quit,
}

fn number(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("'{}' is not a positive number", raw)),
    }
}

impl ShellCommand {
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match word.to_ascii_lowercase().as_str() {
            "mode" => ShellCommand::Mode(match rest.to_ascii_lowercase().as_str() {
                "files" => EvaluationMode::Files,
                "slides" | "ppt" => EvaluationMode::Slides,
                "repo" | "repository" | "github" => EvaluationMode::Repository,
                "none" => EvaluationMode::None,
                other => return Err(format!("Unknown evaluation type '{}'", other)),
            }),
            "stage" if !args.is_empty() => {
                ShellCommand::Stage(args.iter().map(PathBuf::from).collect())
            }
            "staged" => ShellCommand::Staged,
            "remove" if args.len() == 1 => ShellCommand::Remove(number(args[0])?),
            "title" => ShellCommand::Title(rest.to_string()),
            "description" | "rules" => ShellCommand::Description(rest.to_string()),
            "url" => ShellCommand::Url(rest.to_string()),
            "design" => ShellCommand::Design(match rest {
                "on" | "yes" | "true" => true,
                "off" | "no" | "false" => false,
                other => return Err(format!("Expected on or off, got '{}'", other)),
            }),
            "submit" => ShellCommand::Submit,
            "results" => ShellCommand::Results,
            "filter" => match args.first().map(|a| a.parse::<ScoreBand>()) {
                Some(Ok(band)) => ShellCommand::Filter { band, name: args[1..].join(" ") },
                _ => ShellCommand::Filter { band: ScoreBand::All, name: rest.to_string() },
            },
            "reevaluate" | "re" if !args.is_empty() => ShellCommand::Reevaluate(
                args.iter().map(|a| number(a)).collect::<Result<_, _>>()?,
            ),
            "export" if !args.is_empty() => {
                let kind = ExportKind::from_str(args[0], true)
                    .map_err(|_| format!("Unknown export format '{}'", args[0]))?;
                let subject = args.get(1).map(|a| number(a)).transpose()?;
                ShellCommand::Export { kind, subject }
            }
            "status" => ShellCommand::Status,
            "reset" => ShellCommand::Reset,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            other => return Err(format!("Unknown or incomplete command '{}'. Type help.", other)),
        };
        Ok(Some(command))
    }
}

/// Shell-local view settings.
#[derive(Debug, Default)]
struct View {
    band: ScoreBand,
    name: String,
}

/// Runs one command. Returns `false` when the shell should exit.
async fn execute<W: AsyncWrite + Unpin>(
    session: &EvaluationSession,
    view: &mut View,
    command: ShellCommand,
    out: &mut W,
) -> Result<bool, CliError> {
    let text = match command {
        ShellCommand::Mode(mode) => {
            session.select_mode(mode).await?;
            format!("Evaluation type: {}\n", mode)
        }
        ShellCommand::Stage(paths) => {
            let files = read_staged_files(&paths).await?;
            render::staging_report(&session.stage_files(files).await)
        }
        ShellCommand::Staged => render::staged_files(&session.snapshot().await.staged),
        ShellCommand::Remove(n) => {
            let removed = session.remove_staged_file(n - 1).await?;
            format!("Removed {}\n", removed.name)
        }
        ShellCommand::Title(title) => {
            session.set_title(&title).await;
            String::new()
        }
        ShellCommand::Description(description) => {
            session.set_description(&description).await;
            String::new()
        }
        ShellCommand::Url(url) => {
            session.set_repository_url(&url).await;
            String::new()
        }
        ShellCommand::Design(on) => {
            session.set_evaluate_design(on).await;
            String::new()
        }
        ShellCommand::Submit => {
            out.write_all(b"Evaluating...\n").await?;
            out.flush().await?;
            let count = session.submit().await?;
            format!("Evaluated {} subject(s).\n", count)
        }
        ShellCommand::Results => results(session, view).await,
        ShellCommand::Filter { band, name } => {
            view.band = band;
            view.name = name;
            results(session, view).await
        }
        ShellCommand::Reevaluate(numbers) => {
            let runs = numbers.iter().map(|n| session.reevaluate(n - 1));
            let outcomes = futures::future::join_all(runs).await;
            let mut text = String::new();
            for (n, outcome) in numbers.iter().zip(outcomes) {
                match outcome {
                    Ok(record) => text.push_str(&format!(
                        "[{}] {} re-evaluated: {}\n",
                        n,
                        record.label(n - 1),
                        record.score_percent.map_or("-".to_string(), |s| format!("{:.2}%", s))
                    )),
                    Err(SessionError::Unauthorized) => return Err(SessionError::Unauthorized.into()),
                    Err(err) => text.push_str(&format!("[{}] {}\n", n, err)),
                }
            }
            text
        }
        ShellCommand::Export { kind, subject } => {
            let snapshot = session.snapshot().await;
            match export::write(&snapshot, kind, subject.map(|n| n - 1), &PathBuf::from(".")).await? {
                Some(path) => format!("Wrote {}\n", path.display()),
                None => "No results available to download.\n".to_string(),
            }
        }
        ShellCommand::Status => render::session_status(&session.snapshot().await),
        ShellCommand::Reset => {
            session.switch_type().await?;
            "Evaluation type cleared.\n".to_string()
        }
        ShellCommand::Help => format!("{}\n", HELP),
        ShellCommand::Quit => return Ok(false),
    };
    out.write_all(text.as_bytes()).await?;
    Ok(true)
}

async fn results(session: &EvaluationSession, view: &View) -> String {
    let snapshot = session.snapshot().await;
    let visible = session.filtered(&view.name, view.band).await;
    render::results(&snapshot, &visible)
}

/// Reads commands from stdin until `quit` or end of input.
///
/// Failed commands are reported and the shell keeps going, except for an
/// expired credential, which ends the shell.
pub async fn run(session: &EvaluationSession) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut view = View::default();
    stdout.write_all(b"Type help for commands.\n").await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = match ShellCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                stdout.write_all(format!("{}\n", message).as_bytes()).await?;
                continue;
            }
        };
        debug!(?command, "Shell command");
        match execute(session, &mut view, command, &mut stdout).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) if err.is_unauthorized() => {
                session.close();
                return Err(err);
            }
            Err(err) => {
                warn!("Shell command failed: {}", err);
                stdout.write_all(format!("Error: {}\n", err).as_bytes()).await?;
            }
        }
    }
    session.close();
    Ok(())
}
