mod backend;
mod cli;
mod config;
mod console;
mod docker;
mod error;
mod flow;
mod form;
mod input;
mod list;
mod model;
mod overlay;
mod refresh;
mod registry;
mod serializer;
mod ui;
mod worker;

use anyhow::{Context, Result};
use backend::ResourceBackend;
use clap::Parser;
use cli::CliArgs;
use config::Settings;
use console::Console;
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use docker::DockerCli;
use futures::StreamExt;
use model::PanelKind;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use refresh::RefreshLoop;
use serializer::{Serializer, Task, Updater};
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use worker::Worker;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let settings = Settings::load(&args)?;
    init_tracing(&args.log_filter, settings.log_file.as_deref())?;
    if let Some(source) = &settings.source {
        info!(config = %source, "loaded configuration");
    }

    let backend: Arc<dyn ResourceBackend> = Arc::new(DockerCli::new(
        settings.docker_binary.clone(),
        settings.docker_host.clone(),
    ));
    let engine = {
        let backend = Arc::clone(&backend);
        tokio::task::spawn_blocking(move || backend.ping())
            .await
            .context("engine ping was aborted")?
            .context("docker daemon unreachable")?
    };
    info!(%engine, "connected to engine");

    let mut console = Console::new(&settings.bindings).context("invalid key bindings")?;
    console.set_engine(engine);

    run(&mut console, backend, &settings).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    // The terminal belongs to the UI; logs go to a file or nowhere.
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = builder.with_ansi(false).with_writer(Mutex::new(file)).try_init();
        }
        None => {
            let _ = builder.with_writer(io::sink).try_init();
        }
    }

    Ok(())
}

async fn run(
    console: &mut Console,
    backend: Arc<dyn ResourceBackend>,
    settings: &Settings,
) -> Result<()> {
    let (serializer, updater) = Serializer::new();
    let worker = Worker::new(backend, updater.clone());
    let refreshers = PanelKind::ALL
        .into_iter()
        .map(|panel| RefreshLoop::spawn(panel, settings.refresh, updater.clone()))
        .collect::<Vec<_>>();

    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, console, serializer, updater, &worker).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    for refresher in refreshers {
        refresher.stop().await;
    }

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

/// Terminal events are forwarded into the serializer like every other
/// producer; only queued tasks ever touch the console.
async fn run_loop(
    terminal: &mut TuiTerminal,
    console: &mut Console,
    mut serializer: Serializer<Task>,
    updater: Updater<Task>,
    worker: &Worker,
) -> Result<()> {
    let mut reader = EventStream::new();
    let mut input_open = true;

    terminal
        .draw(|frame| ui::render(frame, console))
        .context("failed to render terminal frame")?;

    loop {
        tokio::select! {
            maybe_event = reader.next(), if input_open => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind != KeyEventKind::Release => {
                        updater.submit(Task::Key(key));
                    }
                    Some(Ok(Event::Resize(_, _))) => {
                        updater.submit(Task::Resize);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        warn!(%error, "terminal event error");
                        updater.submit(Task::InputError(error.to_string()));
                    }
                    None => {
                        input_open = false;
                        updater.submit(Task::InputClosed);
                    }
                }
            }
            maybe_task = serializer.next() => {
                let Some(task) = maybe_task else {
                    break;
                };
                // Apply everything already queued, then draw once.
                let mut next = Some(task);
                while let Some(task) = next {
                    let effects = console
                        .apply(task)
                        .context("console state is inconsistent")?;
                    for effect in effects {
                        debug!(?effect, "dispatching effect");
                        worker.run(effect);
                    }
                    if !console.running() {
                        break;
                    }
                    next = serializer.try_next();
                }
                terminal
                    .draw(|frame| ui::render(frame, console))
                    .context("failed to render terminal frame")?;
                if !console.running() {
                    break;
                }
            }
        }
    }

    serializer.close();
    Ok(())
}
