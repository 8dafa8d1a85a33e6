use std::{
    io,
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle},
};
use ratatui::prelude::*;
use tracing::{error, info, level_filters::LevelFilter};

use flowtime::{
    alarm::SoundAlarm,
    app::{handle_input, App},
    assets::{AssetCache, SystemSounds, ALARM_SOUND, ICON},
    clock::SystemClock,
    config::{data_dir, Config, CONFIG_FILE},
    history::History,
    logging::enable_logging,
    session::Controller,
    storage::FileStorage,
    ui::render_ui,
};

// Upper bound on how long the loop blocks waiting for input.
const POLL_CAP: Duration = Duration::from_millis(250);

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Clone)]
#[command(author, version, about = "flowtime - focus as long as it flows, then take a break")]
struct Args {
    /// Where history, config, logs and cached assets live
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Default break length in minutes
    #[arg(short, long = "break", value_parser = clap::value_parser!(u32).range(1..=1440))]
    break_minutes: Option<u32>,
    #[arg(short = 't', long)]
    theme: Option<String>,
    #[arg(long)]
    no_sound: bool,
    #[arg(long)]
    log_level: Option<LevelFilter>,
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    let data_dir = data_dir(args.data_dir).context("could not create data directory")?;
    enable_logging(&data_dir, args.log_level)?;

    let mut config = Config::load(&data_dir);
    if !data_dir.join(CONFIG_FILE).exists() {
        config.save(&data_dir).context("could not write default config")?;
    }
    if let Some(b) = args.break_minutes { config.default_break_minutes = b; }
    if let Some(t) = args.theme { config.theme = t; }
    if args.no_sound { config.sound_enabled = false; }

    let assets = AssetCache::new(&data_dir).context("could not create asset cache")?;
    assets.install(&SystemSounds::default());
    let sound = if config.sound_enabled { assets.path(ALARM_SOUND) } else { None };
    let alarm = SoundAlarm::new(sound, assets.path(ICON));

    let storage = FileStorage::new(&data_dir)?;
    let history = History::load(Box::new(storage)).context("could not load history")?;
    let controller = Controller::new(Box::new(SystemClock), history, Box::new(alarm));
    let mut app = App::new(controller, config, data_dir);
    info!(records = app.controller.history().len(), "flowtime started");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    res.inspect_err(|e| error!("flowtime stopped with an error: {e:?}"))
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    let mut title = String::new();

    loop {
        let display = app.controller.display();
        if display.title != title {
            execute!(terminal.backend_mut(), SetTitle(&display.title))?;
            title = display.title;
        }
        terminal.draw(|f| render_ui(f, app))?;

        let timeout = app.controller.ticker().timeout(Instant::now(), POLL_CAP);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_input(key, app) {
                    info!("flowtime quit");
                    return Ok(());
                }
            }
        }

        app.controller.poll_tick(Instant::now());
    }
}
