use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use threadcraft_core::{
    Config, GeminiClient, GenerationClient, SessionController, StyleKey, TemplateStore,
    TurnOutcome,
};
use tracing_subscriber::EnvFilter;

mod app;
mod clipboard;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, TICK_RATE};

#[derive(Parser)]
#[command(name = "threadcraft")]
#[command(version, about = "Turn messy thoughts into polished social threads with Gemini")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available styles
    Styles,
    /// List known Gemini models
    Models,
    /// Generate a thread without opening the TUI
    Generate {
        /// Style key (see `threadcraft styles`)
        #[arg(short, long, default_value = "NATURAL")]
        style: String,
        /// Follow-up refinement, applied in order (repeatable)
        #[arg(short, long)]
        refine: Vec<String>,
        /// Your messy thoughts
        input: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: could not read config ({}), using defaults", e);
        Config::new()
    });

    match cli.command {
        None => {
            init_file_logging()?;
            run_tui(config).await
        }
        Some(Commands::Styles) => {
            init_stderr_logging();
            list_styles();
            Ok(())
        }
        Some(Commands::Models) => {
            init_stderr_logging();
            list_models(&config);
            Ok(())
        }
        Some(Commands::Generate { style, refine, input }) => {
            init_stderr_logging();
            generate_once(config, &style, &refine, &input).await
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// The TUI owns the terminal, so logs go to a file next to the config.
fn init_file_logging() -> Result<()> {
    let dir = Config::config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("threadcraft.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

async fn run_tui(config: Config) -> Result<()> {
    tracing::info!(key_source = ?config.key_source(), "loading config");
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut app = App::new(config);
    let mut events = EventHandler::new(TICK_RATE);

    tracing::info!(model = app.session.client().model(), "threadcraft started");

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            tokio::select! {
                event = events.next() => match event {
                    Some(event) => handler::handle_event(&mut app, event),
                    None => break,
                },
                result = app.generation_done() => app.finish_generation(result),
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

fn list_styles() {
    let templates = TemplateStore::default();
    for (key, config) in templates.styles() {
        println!("{:<14} {}", key.as_str(), config.name);
        println!("{:<14} {}", "", config.description);
    }
}

fn list_models(config: &Config) {
    let current = config.client_settings().model;
    for model in GeminiClient::list_models() {
        let marker = if model == current { "*" } else { " " };
        println!("{} {}", marker, model);
    }
}

async fn generate_once(config: Config, style: &str, refinements: &[String], input: &str) -> Result<()> {
    let templates = TemplateStore::default();
    let style = StyleKey::new(style.to_uppercase());
    if !templates.contains(&style) {
        bail!("unknown style '{}' (see `threadcraft styles`)", style);
    }

    let client = GenerationClient::new(config.client_settings());
    if !client.is_available() {
        bail!("no API key: set GEMINI_API_KEY or store one from the TUI");
    }
    let mut session = SessionController::new(client, config.session_options());

    let outcome = session.generate(&templates, &style, input).await?;
    print_turn(&session, outcome)?;

    for text in refinements {
        let outcome = session.refine(text).await?;
        println!();
        print_turn(&session, outcome)?;
    }
    Ok(())
}

fn print_turn(session: &SessionController, outcome: TurnOutcome) -> Result<()> {
    match outcome {
        TurnOutcome::Ignored => bail!("nothing to send: input is empty"),
        TurnOutcome::Replied { .. } => {
            if let Some(reply) = session.last_reply() {
                println!("{}", reply.content);
            }
            Ok(())
        }
        TurnOutcome::Failed { error, .. } => Err(error.into()),
    }
}
