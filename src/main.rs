//! humtui - a terminal melody notepad.
//!
//! Hum or whistle into a pitch tracker, get discrete notes on an editable
//! piano roll, and play them back through a SoundFont synthesizer.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --demo                         # Open with the demo melody
//! cargo run -- --sim-input                    # Record from the simulated voice
//! cargo run -- --soundfont path/to/font.sf2   # Audible playback
//! ```

mod app;
mod audio;
mod melody;
mod roll;
mod transcribe;
mod ui;

use app::App;
use audio::{AudioSession, SynthEngine};
use melody::Melody;

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::time::Duration;

/// Default path of the melody library file.
const LIBRARY_PATH: &str = "melodies.json";

/// Event poll interval; also the playback sequencer tick.
const TICK_MS: u64 = 16;

/// Command-line options for the application.
struct CliOptions {
    /// Path to a SoundFont (.sf2) for audible playback.
    soundfont: Option<PathBuf>,
    /// Start with the demo melody loaded.
    demo: bool,
    /// Record from the built-in simulated voice instead of requiring an
    /// external pitch tracker.
    sim_input: bool,
    /// Path of the melody library file.
    library: PathBuf,
    /// MIDI file to open as the starting melody.
    import: Option<PathBuf>,
}

impl CliOptions {
    /// Parses command-line arguments.
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let mut soundfont: Option<PathBuf> = None;
        let mut demo = false;
        let mut sim_input = false;
        let mut library = PathBuf::from(LIBRARY_PATH);
        let mut import: Option<PathBuf> = None;
        let mut i = 1;

        while i < args.len() {
            match args[i].as_str() {
                "--demo" => demo = true,
                "--sim-input" => sim_input = true,
                "--soundfont" | "-sf" => {
                    i += 1;
                    if i >= args.len() {
                        eprintln!("Error: --soundfont requires a path argument");
                        std::process::exit(1);
                    }
                    soundfont = Some(PathBuf::from(&args[i]));
                }
                "--library" => {
                    i += 1;
                    if i >= args.len() {
                        eprintln!("Error: --library requires a path argument");
                        std::process::exit(1);
                    }
                    library = PathBuf::from(&args[i]);
                }
                "--import" => {
                    i += 1;
                    if i >= args.len() {
                        eprintln!("Error: --import requires a path argument");
                        std::process::exit(1);
                    }
                    import = Some(PathBuf::from(&args[i]));
                }
                "--help" | "-h" => {
                    eprintln!("humtui - terminal melody notepad");
                    eprintln!();
                    eprintln!(
                        "Usage: {} [OPTIONS]",
                        args.first().map(String::as_str).unwrap_or("humtui")
                    );
                    eprintln!();
                    eprintln!("Options:");
                    eprintln!("  -sf, --soundfont PATH  SoundFont (.sf2) for audible playback");
                    eprintln!("      --demo             Start with the demo melody loaded");
                    eprintln!("      --sim-input        Record from a built-in simulated voice");
                    eprintln!("      --library PATH     Melody library file (default {})", LIBRARY_PATH);
                    eprintln!("      --import PATH      Open a MIDI file as the starting melody");
                    eprintln!("  -h, --help             Print this help message");
                    std::process::exit(0);
                }
                other => {
                    // Positional shortcuts for the two file kinds we open
                    if other.ends_with(".sf2") {
                        soundfont = Some(PathBuf::from(other));
                    } else if other.ends_with(".mid") || other.ends_with(".midi") {
                        import = Some(PathBuf::from(other));
                    } else {
                        eprintln!("Unknown option: {}", other);
                        eprintln!("Use --help for usage information");
                        std::process::exit(1);
                    }
                }
            }
            i += 1;
        }

        Self {
            soundfont,
            demo,
            sim_input,
            library,
            import,
        }
    }
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = CliOptions::parse();

    // Logging goes to stderr so it never fights the TUI; enable with
    // RUST_LOG=debug etc.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // A missing or broken SoundFont degrades to silent playback rather
    // than refusing to start: timing and editing work either way.
    let engine = match &cli.soundfont {
        Some(path) => match SynthEngine::new(path) {
            Ok(engine) => engine,
            Err(e) => {
                tracing::warn!("falling back to silent playback: {:#}", e);
                SynthEngine::silent()
            }
        },
        None => SynthEngine::silent(),
    };

    let melody = if let Some(path) = &cli.import {
        melody::import_melody_from_midi(path)
            .with_context(|| format!("Failed to import {}", path.display()))?
    } else if cli.demo {
        Melody::demo()
    } else {
        Melody::empty()
    };

    let mut app = App::new(
        AudioSession::new(engine),
        melody,
        cli.sim_input,
        cli.library,
        cli.soundfont,
    );

    // Recover a melody the last session left behind, unless the user asked
    // for a specific starting melody
    if !cli.demo && cli.import.is_none() {
        app.try_load_autosave();
    }

    let mut terminal = setup_terminal().context("Failed to setup terminal")?;
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;

    result
}

type Tui = Terminal<CrosstermBackend<Stdout>>;

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// The cooperative event loop: poll input, advance the session, draw.
fn run_app(terminal: &mut Tui, app: &mut App) -> Result<()> {
    loop {
        app.update();
        terminal.draw(|frame| ui::render(frame, app))?;

        if !event::poll(Duration::from_millis(TICK_MS))? {
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                handle_key(app, key.code);
            }
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::Down(MouseButton::Left) => {
                    app.pointer_down(mouse.column, mouse.row);
                }
                MouseEventKind::Drag(MouseButton::Left) => {
                    app.pointer_drag(mouse.column, mouse.row);
                }
                MouseEventKind::Up(MouseButton::Left) => {
                    app.pointer_up();
                }
                MouseEventKind::ScrollUp => app.scroll_by(0.0, -2.0),
                MouseEventKind::ScrollDown => app.scroll_by(0.0, 2.0),
                MouseEventKind::ScrollLeft => app.scroll_by(-4.0, 0.0),
                MouseEventKind::ScrollRight => app.scroll_by(4.0, 0.0),
                _ => {}
            },
            _ => {}
        }

        if app.should_quit {
            app.autosave();
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, code: KeyCode) {
    // Tempo entry captures keys while active
    if app.tempo_entry.is_some() {
        match code {
            KeyCode::Enter => app.confirm_tempo_entry(),
            KeyCode::Esc => app.cancel_tempo_entry(),
            KeyCode::Backspace => app.tempo_entry_backspace(),
            KeyCode::Char(c) => app.tempo_entry_input(c),
            _ => {}
        }
        return;
    }

    match code {
        KeyCode::Char('q') => app.prepare_quit(),
        KeyCode::Char(' ') => app.toggle_playback(),
        KeyCode::Char('r') => app.toggle_recording(),
        KeyCode::Char('n') => app.insert_note(),
        KeyCode::Char('d') | KeyCode::Delete | KeyCode::Backspace => app.delete_selected(),
        KeyCode::Char('t') => app.start_tempo_entry(),
        KeyCode::Char('m') => {
            app.session.metronome = !app.session.metronome;
            let state = if app.session.metronome { "on" } else { "off" };
            app.set_status(format!("Metronome {}", state));
        }
        KeyCode::Char('s') => app.save_to_library(),
        KeyCode::Char('l') => app.load_from_library(),
        KeyCode::Char('e') => app.export_midi(),
        KeyCode::Char('w') => app.export_wav(),
        KeyCode::Left => app.scroll_by(-4.0, 0.0),
        KeyCode::Right => app.scroll_by(4.0, 0.0),
        KeyCode::Up => app.scroll_by(0.0, -1.0),
        KeyCode::Down => app.scroll_by(0.0, 1.0),
        KeyCode::PageUp => app.scroll_by(0.0, -12.0),
        KeyCode::PageDown => app.scroll_by(0.0, 12.0),
        KeyCode::Home => app.scroll_home(),
        _ => {}
    }
}
