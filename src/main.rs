use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use smartstart::config::Config;
use smartstart::console::{self, Command};
use smartstart::flow::{
    validate, Answer, AnswerOutcome, FlowController, InputKind, StepCatalog, Transition,
};
use smartstart::logging;
use smartstart::notifications::{NotificationService, NotificationSink};
use smartstart::submission::{self, LocalStore, LocationAnalysis, SubmissionReceipt};
use smartstart::ui::{self, TerminalGuard, ToastBoard, WizardScreen};

/// Field of the site sub-step that triggers a location analysis
const ANALYSIS_SITE_FIELD: &str = "analysis_site";

/// How long the wizard waits for a key before redrawing
const TICK_RATE: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "smartstart")]
#[command(about = "Guided project intake for entrepreneurs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the intake wizard (default)
    Intake {
        /// Continue a saved draft by session id
        #[arg(short, long)]
        resume: Option<String>,

        /// Use the line-by-line prompt even on a terminal
        #[arg(long)]
        plain: bool,
    },

    /// List the intake steps
    Catalog {
        /// Print the catalog as JSON (loadable with `intake.catalog`)
        #[arg(long)]
        json: bool,
    },

    /// Validate a JSON file of answers keyed by field name
    Check {
        /// Path to a JSON object such as {"project_name": "...", "goals": [...]}
        file: PathBuf,
    },

    /// List saved drafts, newest first
    Drafts,

    /// Show the effective configuration
    Config {
        /// Write it to .smartstart/config.toml
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;

    // The wizard owns the terminal, so its logs go to a file
    let interactive = matches!(cli.command, None | Some(Commands::Intake { .. }));
    let logging_handle = logging::init_logging(&config, interactive, cli.debug)?;

    match cli.command {
        None => {
            run_intake(&config, None, false, logging_handle.log_file_path).await?;
        }
        Some(Commands::Intake { resume, plain }) => {
            run_intake(&config, resume, plain, logging_handle.log_file_path).await?;
        }
        Some(Commands::Catalog { json }) => {
            cmd_catalog(&config, json)?;
        }
        Some(Commands::Check { file }) => {
            let errors = cmd_check(&config, &file)?;
            if errors > 0 {
                std::process::exit(1);
            }
        }
        Some(Commands::Drafts) => {
            cmd_drafts(&config).await?;
        }
        Some(Commands::Config { save }) => {
            cmd_config(&config, save)?;
        }
    }

    Ok(())
}

fn load_catalog(config: &Config) -> Result<StepCatalog> {
    match config.catalog_path() {
        Some(path) => StepCatalog::from_path(&path)
            .with_context(|| format!("Failed to load step catalog {}", path.display())),
        None => StepCatalog::smartstart().context("Built-in step catalog is invalid"),
    }
}

async fn run_intake(
    config: &Config,
    resume: Option<String>,
    plain: bool,
    log_file_path: Option<PathBuf>,
) -> Result<()> {
    let result = intake(config, resume, plain).await;

    // Print log file path on exit if logs were written
    if let Some(log_path) = log_file_path {
        if let Ok(metadata) = log_path.metadata() {
            if metadata.len() > 0 {
                eprintln!("Session log: {}", log_path.display());
            }
        }
    }

    result
}

async fn intake(config: &Config, resume: Option<String>, plain: bool) -> Result<()> {
    let catalog = load_catalog(config)?;
    let adapter = submission::from_config(config)?;
    let store = LocalStore::from_config(config);
    let draft = match resume {
        Some(id) => {
            let session_id =
                Uuid::parse_str(&id).with_context(|| format!("Invalid session id: {}", id))?;
            let Some(draft) = store.load_draft(session_id).await? else {
                bail!("No saved draft for session {}", session_id);
            };
            Some(draft)
        }
        None => None,
    };

    let full_screen = !plain && std::io::stdin().is_terminal() && std::io::stdout().is_terminal();
    let toasts = Arc::new(ToastBoard::new(&config.notifications.console));
    let notifier: Arc<dyn NotificationSink> = if full_screen {
        Arc::new(NotificationService::with_console(config, toasts.clone())?)
    } else {
        Arc::new(NotificationService::from_config(config)?)
    };

    let mut flow = match draft {
        Some(draft) => FlowController::resume(&catalog, &draft, adapter, notifier)?,
        None => FlowController::new(&catalog, adapter, notifier),
    };

    let submitted = if full_screen {
        wizard_loop(&mut flow, toasts).await?
    } else {
        line_loop(&mut flow).await?
    };

    match submitted {
        Some(receipt) => {
            println!("Submitted. Reference: {}", receipt.reference);
            if store.delete_draft(flow.session_id()).await? {
                tracing::debug!(session = %flow.session_id(), "Removed draft after submission");
            }
        }
        None => println!("Intake left unfinished (session {}).", flow.session_id()),
    }
    Ok(())
}

/// Full-screen wizard; returns the receipt once submitted
async fn wizard_loop(
    flow: &mut FlowController,
    toasts: Arc<ToastBoard>,
) -> Result<Option<SubmissionReceipt>> {
    ui::install_panic_hook();
    let _guard = TerminalGuard::new()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(std::io::stdout()))?;
    let mut screen = WizardScreen::new(toasts);

    loop {
        let snapshot = flow.snapshot();
        screen.sync(&snapshot);
        terminal.draw(|f| screen.render(f, &snapshot))?;

        if !event::poll(TICK_RATE)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let Some(command) = screen.handle_key(key) else {
            continue;
        };

        if snapshot.is_final_step && matches!(command, Command::Continue | Command::Answer(_)) {
            screen.set_busy(Some("Submitting..."));
            terminal.draw(|f| screen.render(f, &snapshot))?;
        }
        let outcome = apply(flow, snapshot.current_index, command).await?;
        screen.set_busy(None);

        match outcome {
            Step::Submitted(receipt) => return Ok(Some(receipt)),
            Step::Quit => return Ok(None),
            Step::Stay => {}
        }
    }
}

/// Line-by-line prompt for pipes and dumb terminals
async fn line_loop(flow: &mut FlowController) -> Result<Option<SubmissionReceipt>> {
    println!("SmartStart project intake (session {})", flow.session_id());
    println!("Type :help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let snapshot = flow.snapshot();
        println!();
        print!("{}", console::render_snapshot(&snapshot));
        print!("{}", console::input_prompt(&snapshot));
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            return Ok(None);
        };

        let command = console::parse_input(&snapshot.step, &line);
        if command == Command::Help {
            println!("{}", console::HELP);
            continue;
        }
        match apply(flow, snapshot.current_index, command).await? {
            Step::Submitted(receipt) => {
                println!();
                return Ok(Some(receipt));
            }
            Step::Quit => return Ok(None),
            Step::Stay => {}
        }
    }
}

/// What the input loops do after a command
enum Step {
    Stay,
    Submitted(SubmissionReceipt),
    Quit,
}

/// Run one wizard command against the flow
async fn apply(flow: &mut FlowController, index: usize, command: Command) -> Result<Step> {
    match command {
        Command::Help => {}
        Command::Quit => return Ok(Step::Quit),
        Command::Back => {
            flow.previous();
        }
        Command::SaveDraft => {
            // Outcome is reported through the notification service
            let _ = flow.save_draft().await;
        }
        Command::Continue => return advance(flow).await,
        Command::Answer(answer) => match flow.answer(index, answer)? {
            AnswerOutcome::Valid => {
                attach_site_analysis(flow, index);
                return advance(flow).await;
            }
            AnswerOutcome::Invalid(_) | AnswerOutcome::Ignored => {}
        },
    }
    Ok(Step::Stay)
}

async fn advance(flow: &mut FlowController) -> Result<Step> {
    Ok(match flow.next().await? {
        Transition::Submitted(receipt) => Step::Submitted(receipt),
        _ => Step::Stay,
    })
}

/// A site typed in the analysis sub-step becomes the location-analysis payload
fn attach_site_analysis(flow: &mut FlowController, index: usize) {
    if flow.steps()[index].field != ANALYSIS_SITE_FIELD {
        return;
    }
    let Some(site) = flow.answer_at(index).map(Answer::display) else {
        return;
    };
    let city = flow
        .answer_for_field("location")
        .map(Answer::display)
        .unwrap_or_default();
    flow.attach_location_analysis(&LocationAnalysis::new(city, site));
}

fn cmd_catalog(config: &Config, json: bool) -> Result<()> {
    let catalog = load_catalog(config)?;

    if json {
        let file = serde_json::json!({ "steps": catalog.steps() });
        println!("{}", serde_json::to_string_pretty(&file)?);
        return Ok(());
    }

    println!("Intake steps ({})", catalog.len());
    println!("{}", "─".repeat(60));
    print!("{}", console::render_catalog(&catalog));
    Ok(())
}

/// Build an answer of the step's kind from a JSON value
fn answer_from_json(kind: InputKind, value: &serde_json::Value) -> Option<Answer> {
    use serde_json::Value;

    match (kind, value) {
        (InputKind::MultiChoice, Value::Array(items)) => Some(Answer::choices(
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string)),
        )),
        (InputKind::NumericRange, Value::Number(n)) => Some(Answer::amount(n.to_string())),
        (kind, Value::String(s)) => Some(Answer::from_raw(kind, s)),
        _ => None,
    }
}

/// Returns the number of problems found
fn cmd_check(config: &Config, path: &Path) -> Result<usize> {
    let catalog = load_catalog(config)?;
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let answers: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a JSON object", path.display()))?;

    let mut problems = 0;
    for field in answers.keys() {
        if catalog.find_field(field).is_none() {
            println!("  ? {}: not a step of this intake", field);
            problems += 1;
        }
    }

    let mut flow = FlowController::new(
        &catalog,
        submission::from_config(config)?,
        Arc::new(NotificationService::disabled()),
    );

    // Answer in order so branches open before their sub-steps are reached
    let mut index = 0;
    while index < flow.steps().len() {
        let kind = flow.steps()[index].input_kind;
        let field = flow.steps()[index].field.clone();
        if let Some(value) = answers.get(&field) {
            match answer_from_json(kind, value) {
                Some(answer) => {
                    flow.answer(index, answer)?;
                }
                None => {
                    println!("  x {}: expected {}, got {}", field, kind, value);
                    problems += 1;
                }
            }
        }
        index += 1;
    }

    for (index, step) in flow.steps().iter().enumerate() {
        if let Some(error) = validate(step, flow.answer_at(index)) {
            println!("  x {}: {}", step.field, error.message);
            problems += 1;
        }
    }

    if problems == 0 {
        println!(
            "✓ All {} steps valid ({}% complete)",
            flow.steps().len(),
            flow.completion_percentage()
        );
    } else {
        println!("{} problem(s) found", problems);
    }
    Ok(problems)
}

async fn cmd_drafts(config: &Config) -> Result<()> {
    let store = LocalStore::from_config(config);
    let drafts = store.list_drafts().await?;

    if drafts.is_empty() {
        println!("No saved drafts");
        return Ok(());
    }

    println!("Saved drafts ({})", drafts.len());
    println!("{}", "─".repeat(60));
    print!("{}", console::render_drafts(&drafts));
    println!();
    println!("Resume with: smartstart intake --resume <SESSION>");
    Ok(())
}

fn cmd_config(config: &Config, save: bool) -> Result<()> {
    if save {
        let path = config.save()?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    print!("{}", config.to_toml()?);
    Ok(())
}
