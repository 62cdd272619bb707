//! Terminal dashboard for DVF real-estate transactions in La Réunion.

mod app;
mod config;
mod input;
mod ui;

use std::{
    fs::OpenOptions,
    io,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use kaz_core::{
    directory,
    model::SourceId,
    plugin::{SourcePlugin, SourceRegistry},
    service::KazService,
};
use kaz_source_file as file_source;
use kaz_source_geodvf as geodvf;
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::config::{Cli, SourceKind};
use crate::input::Action;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref(), cli.debug)?;

    // Source + service setup
    let band = cli.band()?;
    let (source, plugin) = build_source(&cli, band)?;
    let registry = Arc::new(SourceRegistry::new(vec![plugin]));
    let service = Arc::new(KazService::new(registry));

    tracing::info!(source = %source, %band, "kaz starting");

    let mut app = App::new(service, source);
    let preselected = match cli.municipality.as_deref() {
        Some(wanted) => {
            let municipality = directory::resolve(wanted)
                .with_context(|| format!("unknown municipality {wanted:?}"))?;
            app.select_code(&municipality.code);
            true
        }
        None => false,
    };

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app, preselected).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

fn build_source(
    cli: &Cli,
    band: kaz_core::model::PlausibilityBand,
) -> Result<(SourceId, SourcePlugin)> {
    match cli.source {
        SourceKind::File => Ok((
            SourceId(file_source::SOURCE_ID.to_owned()),
            file_source::plugin(cli.file.clone(), band),
        )),
        SourceKind::Geodvf => {
            let client = geodvf::http_client(cli.timeout())?;
            Ok((
                SourceId(geodvf::SOURCE_ID.to_owned()),
                geodvf::plugin(client, cli.year, band),
            ))
        }
    }
}

// Logs go to a file only: the terminal belongs to the UI.
fn init_logging(log_file: Option<&Path>, debug: bool) -> Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();

    tracing::debug!(path = %path.display(), "Logging initialised");
    Ok(())
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    preselected: bool,
) -> Result<()> {
    if preselected {
        load_selected(terminal, &mut app, false).await?;
    }

    loop {
        // Draw current UI
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input (non-blocking, small timeout to keep CPU low)
        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            let action = input::handle_key_event(key, &mut app);

            match action {
                Action::Quit => break,
                Action::None => {}
                Action::FilterChanged => app.refresh_sample(),
                Action::LoadDataset => load_selected(terminal, &mut app, false).await?,
                Action::ReloadDataset => load_selected(terminal, &mut app, true).await?,
            }
        }
    }

    Ok(())
}

async fn load_selected(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    reload: bool,
) -> Result<()> {
    let Some(municipality) = app.selected_municipality().cloned() else {
        app.error_message = Some("Select a municipality first".into());
        return Ok(());
    };

    if reload && let Err(err) = app.service.invalidate(&app.source, &municipality.code) {
        app.error_message = Some(format!("Reload failed: {err}"));
        return Ok(());
    }

    app.screen = app::Screen::Dashboard;
    app.is_loading = true;
    app.error_message = None;
    terminal.draw(|frame| ui::draw(frame, app))?;

    let res = app.service.dataset(&app.source, &municipality.code).await;

    app.is_loading = false;
    match res {
        Ok(state) => app.apply_state(state),
        Err(err) => {
            app.error_message = Some(format!("Failed to load {}: {err}", municipality.name));
        }
    }
    Ok(())
}
