use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, bail};
use clap::Args;
use serde_json::{Map, Value};
use survey_flow::{
    CompletionPayload, FileSlot, JsonFileSink, Navigation, Paginator, PaginatorOptions,
    ResponseSink, SurveyDocument,
};

use super::{load_document, state_dir};
use crate::terminal::TerminalShell;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, value_name = "survey.json")]
    pub config: PathBuf,
    #[arg(long = "state-dir", value_name = "DIR")]
    pub state_dir: Option<PathBuf>,
    /// Append the finished payload to this JSON array file
    #[arg(long, value_name = "responses.json")]
    pub responses: Option<PathBuf>,
    /// Answer every page from a file instead of prompting
    #[arg(long, value_name = "answers.json")]
    pub answers: Option<PathBuf>,
    /// Start from the first page even if progress was saved
    #[arg(long = "no-resume", default_value_t = false)]
    pub no_resume: bool,
    /// Print the completion payload as JSON
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,
}

/// Page key to `{ input id: value }`.
type Answers = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Next,
    Back,
    /// One-based page number.
    Jump(usize),
    Reset,
    Quit,
    Unknown(String),
}

fn parse_command(raw: &str) -> Command {
    let raw = raw.trim().to_ascii_lowercase();
    let mut parts = raw.split_whitespace();
    match (parts.next(), parts.next()) {
        (None, _) | (Some("n" | "next"), None) => Command::Next,
        (Some("b" | "back"), None) => Command::Back,
        (Some("r" | "reset"), None) => Command::Reset,
        (Some("q" | "quit" | "exit"), None) => Command::Quit,
        (Some("j" | "jump"), Some(number)) => match number.parse::<usize>() {
            Ok(page) if page > 0 => Command::Jump(page),
            _ => Command::Unknown(raw.clone()),
        },
        _ => Command::Unknown(raw.clone()),
    }
}

pub fn run(args: RunArgs) -> Result<()> {
    let document = load_document(&args.config)?;
    let answers = args.answers.as_deref().map(load_answers).transpose()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let payload = runtime.block_on(drive(
        &document,
        &args,
        answers,
        stdin.lock(),
        &mut stdout,
    ))?;

    let Some(payload) = payload else {
        println!("progress saved; run again to continue where you left off");
        return Ok(());
    };
    if let Some(path) = &args.responses {
        JsonFileSink::new(path)
            .submit(&payload)
            .with_context(|| format!("failed to store response in {}", path.display()))?;
    }
    if args.json {
        println!("{}", payload.to_json_pretty()?);
    } else {
        println!("survey '{}' complete, thank you!", document.id);
    }
    Ok(())
}

fn load_answers(path: &Path) -> Result<Answers> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read answers file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("answers file {} must be a JSON object", path.display()))
}

/// Runs the survey to completion or until the user quits. Returns the
/// payload when the survey completed.
async fn drive<R: BufRead, W: Write>(
    document: &SurveyDocument,
    args: &RunArgs,
    answers: Option<Answers>,
    input: R,
    out: &mut W,
) -> Result<Option<CompletionPayload>> {
    let shell = Arc::new(TerminalShell::new());
    let finished = Arc::new(Mutex::new(None));
    let sink = finished.clone();

    let mut options = PaginatorOptions::from_document(document);
    options.resume_from_storage = options.resume_from_storage && !args.no_resume;
    options.on_complete = Some(Arc::new(move |payload: &CompletionPayload| {
        *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(payload.clone());
    }));

    let state_dir = state_dir(args.state_dir.as_deref());
    tracing::debug!(state_dir = %state_dir.display(), "using progress directory");
    let paginator = Paginator::builder(document.pages.clone())
        .shell(shell.clone())
        .slot(Arc::new(FileSlot::new(state_dir)))
        .options(options)
        .build()
        .with_context(|| format!("survey '{}' is not runnable", document.id))?;

    if let Navigation::Moved { to, .. } = paginator.start().await
        && to > 0
        && answers.is_none()
    {
        writeln!(out, "resuming at page {}", to + 1)?;
    }

    match answers {
        Some(answers) => replay(&paginator, &shell, &answers).await?,
        None => interact(&paginator, &shell, input, out).await?,
    }

    let payload = finished
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    Ok(payload)
}

/// Fills every page from the answers file and advances until done.
async fn replay(paginator: &Paginator, shell: &TerminalShell, answers: &Answers) -> Result<()> {
    while !paginator.is_complete() {
        let key = paginator.state().key;
        let page = answers.get(&key);
        for input in shell.mount().inputs() {
            if let Some(value) = page.and_then(|page| page.get(&input.id)) {
                input.field.set_value(Some(value.clone()));
            }
        }
        match paginator.next().await {
            Navigation::Moved { .. } | Navigation::Completed => {}
            Navigation::Rejected { message } => {
                bail!("page '{key}' rejected the supplied answers: {message}")
            }
            Navigation::Ignored => bail!("page '{key}' cannot continue with the supplied answers"),
        }
    }
    Ok(())
}

/// Prompts for each input, then for a navigation command. Input lines that
/// start with `:` are commands too. End of input quits.
async fn interact<R: BufRead, W: Write>(
    paginator: &Paginator,
    shell: &TerminalShell,
    input: R,
    out: &mut W,
) -> Result<()> {
    let mut lines = input.lines();
    while !paginator.is_complete() {
        shell.render(out)?;

        let mut command = None;
        for node in shell.mount().inputs() {
            let current = node
                .field
                .value()
                .map(|value| match value {
                    Value::String(text) => format!(" [{text}]"),
                    other => format!(" [{other}]"),
                })
                .unwrap_or_default();
            write!(out, "{}{current}: ", node.label)?;
            out.flush()?;
            let Some(line) = lines.next().transpose()? else {
                return Ok(());
            };
            let line = line.trim();
            if let Some(raw) = line.strip_prefix(':') {
                command = Some(raw.to_string());
                break;
            }
            if !line.is_empty() {
                node.field.set_value(Some(Value::String(line.to_string())));
            }
        }

        let command = match command {
            Some(command) => command,
            None => {
                write!(out, "next, back, jump N, reset or quit [next]: ")?;
                out.flush()?;
                match lines.next().transpose()? {
                    Some(line) => line,
                    None => return Ok(()),
                }
            }
        };

        match parse_command(&command) {
            Command::Next => {
                if paginator.next().await == Navigation::Ignored {
                    writeln!(out, "! this page cannot continue yet")?;
                }
            }
            Command::Back => {
                if paginator.back().await == Navigation::Ignored {
                    writeln!(out, "! already on the first page")?;
                }
            }
            Command::Jump(page) => {
                if let Err(err) = paginator.jump_to(page - 1).await {
                    writeln!(out, "! {err}")?;
                }
            }
            Command::Reset => {
                paginator.reset().await;
                writeln!(out, "survey restarted")?;
            }
            Command::Quit => return Ok(()),
            Command::Unknown(raw) => writeln!(out, "! unknown command '{raw}'")?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_navigation_commands() {
        assert_eq!(parse_command(""), Command::Next);
        assert_eq!(parse_command(" Next "), Command::Next);
        assert_eq!(parse_command("b"), Command::Back);
        assert_eq!(parse_command("jump 3"), Command::Jump(3));
        assert_eq!(parse_command("j 0"), Command::Unknown("j 0".into()));
        assert_eq!(parse_command("quit"), Command::Quit);
        assert_eq!(parse_command("reset"), Command::Reset);
        assert_eq!(parse_command("dance"), Command::Unknown("dance".into()));
    }
}
