// hexlattice - Animated hexagon-lattice visualization
// Four timed modes (filter, order, cluster, enrich) rendered in the
// terminal and mirrored over HTTP, with a filter proxy and cost estimator
use anyhow::Result;
use clap::Parser;
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers, MouseButton,
    MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use notify::{Config as NotifyConfig, Event as NotifyEvent, RecommendedWatcher, RecursiveMode, Watcher};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

mod clustering;
mod config;
mod demo;
mod engine;
mod enriching;
mod estimator;
mod filtering;
mod httpd;
mod lattice;
mod llm;
mod ordering;
mod renderer;
mod sequencer;
mod types;

use config::{Args, LatticeConfig};
use engine::{LatticeEngine, PhaseEvent};
use httpd::AppState;
use llm::FilterClient;
use renderer::LatticeRenderer;
use types::{LatticeMode, ModeExitReason};

fn build_engine(config: &LatticeConfig, seed: Option<u64>) -> LatticeEngine {
    let mode = config.lattice_mode();
    let params = config.engine_params();
    match seed {
        Some(seed) => LatticeEngine::with_seed(mode, params, seed),
        None => LatticeEngine::new(mode, params),
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor()?;
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.backend_mut().execute(DisableMouseCapture)?;
    Ok(())
}

/// The TUI run loop for one mode. Returns when the user quits or the mode
/// changes (keys or config file edits); the caller rebuilds and re-enters.
fn run_lattice_mode(
    config: &LatticeConfig,
    engine: Arc<Mutex<LatticeEngine>>,
    phase_tx: broadcast::Sender<PhaseEvent>,
    config_change_tx: broadcast::Sender<()>,
    seed: Option<u64>,
) -> Result<ModeExitReason> {
    // Setup terminal for TUI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    terminal.hide_cursor()?;

    // Subscribe to config changes
    let mut config_change_rx = config_change_tx.subscribe();
    let mut current_config = config.clone();

    let mut lattice_renderer = LatticeRenderer::new();

    // Frame timing
    let mut frame_duration = Duration::from_secs_f64(1.0 / current_config.fps);
    let mut last_frame = Instant::now();
    let mut frame_count = 0u64;
    let mut fps_timer = Instant::now();
    let mut actual_fps = 0.0;

    // Mode switch helper: persist the new mode and let the caller re-enter.
    let switch_mode = |target: LatticeMode, cfg: &mut LatticeConfig| -> Result<()> {
        cfg.mode = target.as_str().to_string();
        cfg.save()
    };

    loop {
        // Layout is computed outside the draw call so mouse events can be
        // hit-tested against the canvas area.
        let size = terminal.size()?;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(10),   // Canvas
                Constraint::Length(3), // Footer
            ])
            .split(size);
        let canvas_area: Rect = chunks[1];

        // Check for keyboard and mouse input
        if crossterm::event::poll(Duration::from_millis(0))? {
            match crossterm::event::read()? {
                Event::Key(key) => match key.code {
                    KeyCode::Char('q') | KeyCode::Char('Q') => {
                        restore_terminal(&mut terminal)?;
                        return Ok(ModeExitReason::UserQuit);
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        restore_terminal(&mut terminal)?;
                        return Ok(ModeExitReason::UserQuit);
                    }
                    KeyCode::Char(' ') | KeyCode::Enter => {
                        engine.lock().unwrap().activate();
                    }
                    KeyCode::Char('1') => {
                        switch_mode(LatticeMode::Filter, &mut current_config)?;
                        restore_terminal(&mut terminal)?;
                        return Ok(ModeExitReason::ModeChanged);
                    }
                    KeyCode::Char('2') => {
                        switch_mode(LatticeMode::Order, &mut current_config)?;
                        restore_terminal(&mut terminal)?;
                        return Ok(ModeExitReason::ModeChanged);
                    }
                    KeyCode::Char('3') => {
                        switch_mode(LatticeMode::Cluster, &mut current_config)?;
                        restore_terminal(&mut terminal)?;
                        return Ok(ModeExitReason::ModeChanged);
                    }
                    KeyCode::Char('4') => {
                        switch_mode(LatticeMode::Enrich, &mut current_config)?;
                        restore_terminal(&mut terminal)?;
                        return Ok(ModeExitReason::ModeChanged);
                    }
                    KeyCode::Char('m') => {
                        let next = engine.lock().unwrap().mode().next();
                        switch_mode(next, &mut current_config)?;
                        restore_terminal(&mut terminal)?;
                        return Ok(ModeExitReason::ModeChanged);
                    }
                    _ => {}
                },
                Event::Mouse(mouse) => {
                    // A click anywhere on the canvas is the activation
                    // trigger, exactly like clicking the rendered lattice.
                    if mouse.kind == MouseEventKind::Down(MouseButton::Left)
                        && mouse.column >= canvas_area.x
                        && mouse.column < canvas_area.x + canvas_area.width
                        && mouse.row >= canvas_area.y
                        && mouse.row < canvas_area.y + canvas_area.height
                    {
                        engine.lock().unwrap().activate();
                    }
                }
                _ => {}
            }
        }

        // Check for config changes
        if config_change_rx.try_recv().is_ok() {
            let new_config = match LatticeConfig::load() {
                Ok(config) => config,
                Err(_) => current_config.clone(),
            };

            // Check if mode changed
            if new_config.mode != current_config.mode {
                restore_terminal(&mut terminal)?;
                return Ok(ModeExitReason::ModeChanged);
            }

            // Rebuild the engine if the geometry changed
            if new_config.engine_changed(&current_config) {
                *engine.lock().unwrap() = build_engine(&new_config, seed);
                lattice_renderer = LatticeRenderer::new();
            }

            // Update frame duration if FPS changed
            if new_config.fps != current_config.fps {
                frame_duration = Duration::from_secs_f64(1.0 / new_config.fps);
            }

            current_config = new_config;
        }

        // Render frame if it's time
        let now = Instant::now();
        let elapsed = now.duration_since(last_frame);
        if elapsed >= frame_duration {
            last_frame = now;
            frame_count += 1;

            // Advance the animation and publish any phase transitions
            let snapshot = {
                let mut engine = engine.lock().unwrap();
                for event in engine.tick() {
                    let _ = phase_tx.send(event);
                }
                engine.snapshot()
            };

            lattice_renderer.update(&snapshot, elapsed.as_secs_f64() * 1000.0);

            if fps_timer.elapsed().as_secs_f64() > 0.0 {
                actual_fps = frame_count as f64 / fps_timer.elapsed().as_secs_f64();
            }
            if fps_timer.elapsed() >= Duration::from_secs(2) {
                frame_count = 0;
                fps_timer = Instant::now();
            }

            let mode_label = current_config.lattice_mode().label();
            let target_fps = current_config.fps;
            terminal.draw(|f| {
                let header = Paragraph::new(renderer::header_line(
                    mode_label,
                    snapshot.phase.as_str(),
                    snapshot.is_animating,
                ))
                .block(Block::default().borders(Borders::ALL));
                f.render_widget(header, chunks[0]);

                lattice_renderer.draw(f, chunks[1], &snapshot);

                f.render_widget(
                    renderer::footer_paragraph(
                        snapshot.dots.len(),
                        snapshot.activations,
                        actual_fps,
                        target_fps,
                    ),
                    chunks[2],
                );
            })?;
        }

        // Small sleep to avoid spinning
        thread::sleep(Duration::from_millis(1));
    }
}

fn spawn_http_server(config: &LatticeConfig, state: AppState) -> Result<Option<thread::JoinHandle<()>>> {
    if !config.httpd_enabled {
        return Ok(None);
    }

    let ip = config.httpd_ip.clone();
    let port = config.httpd_port;

    let handle = thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            if let Err(e) = httpd::run_http_server(ip, port, state).await {
                eprintln!("HTTP server error: {}", e);
            }
        });
    });

    Ok(Some(handle))
}

/// Watch the config file and notify subscribers when it changes
fn spawn_config_watcher(config_change_tx: broadcast::Sender<()>) -> Result<()> {
    let config_path = LatticeConfig::config_path(None)?;

    thread::spawn(move || -> Result<()> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = match RecommendedWatcher::new(tx, NotifyConfig::default()) {
            Ok(watcher) => watcher,
            Err(_) => return Ok(()),
        };

        if watcher
            .watch(&config_path, RecursiveMode::NonRecursive)
            .is_err()
        {
            return Ok(());
        }

        loop {
            match rx.recv() {
                Ok(Ok(NotifyEvent { kind, .. })) => {
                    if matches!(kind, notify::EventKind::Modify(_)) {
                        let _ = config_change_tx.send(());
                    }
                }
                Err(_) => break,
                _ => {}
            }
        }
        Ok(())
    });

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set global config path immediately (before any config loads)
    LatticeConfig::set_config_path(args.cfg.clone());

    let cfg_arg = args.cfg.as_deref();
    let config_path = LatticeConfig::config_path(cfg_arg)?;
    let config_file_exists = config_path.exists();

    // Load existing config or start from defaults, then merge CLI args
    let mut config = if config_file_exists {
        match LatticeConfig::load_with_path(cfg_arg) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("\nFailed to load config file: {}", e);
                eprintln!("Config file: {}", config_path.display());
                eprintln!("\nPlease fix the config file or delete it to regenerate with defaults.");
                return Err(e);
            }
        }
    } else {
        let mut default_config = LatticeConfig::default();
        default_config.config_path = Some(config_path.clone());
        default_config
    };

    let args_provided = config.merge_with_args(&args);
    config.sanitize();

    // Persist on first run, or when CLI args changed something
    if !config_file_exists || args_provided {
        config.save()?;
    }

    println!("Using config file: {}", config_path.display());

    // Broadcast channels: config-file changes and animation phase events
    let (config_change_tx, _config_change_rx) = broadcast::channel(100);
    let (phase_tx, _phase_rx) = broadcast::channel(256);

    // The engine is shared between the TUI loop and the HTTP handlers
    let engine = Arc::new(Mutex::new(build_engine(&config, args.seed)));

    let state = AppState {
        engine: engine.clone(),
        config_change_tx: config_change_tx.clone(),
        phase_tx: phase_tx.clone(),
        client: FilterClient::from_config(&config),
        demo_item_delay: Duration::from_millis(config.demo_item_delay_ms),
    };

    let _http_server_handle = spawn_http_server(&config, state)?;

    // Start config watcher for dynamic changes
    spawn_config_watcher(config_change_tx.clone())?;

    println!("\n=== Dynamic Configuration ===");
    println!("Current mode: {}", config.mode);
    println!("Config changes apply automatically:");
    println!("  - Mode changes: Switches dynamically (no restart needed!)");
    println!("  - Geometry changes: Rebuilds the lattice automatically");
    println!("  - Other settings: Apply in real-time");
    println!();

    // Main mode switching loop - allows dynamic mode changes without restart
    loop {
        let current_config = LatticeConfig::load().unwrap_or_else(|_| config.clone());
        *engine.lock().unwrap() = build_engine(&current_config, args.seed);

        println!("Starting {} mode...", current_config.lattice_mode().label());
        match run_lattice_mode(
            &current_config,
            engine.clone(),
            phase_tx.clone(),
            config_change_tx.clone(),
            args.seed,
        ) {
            Ok(ModeExitReason::UserQuit) => {
                println!("\nApplication exiting.");
                return Ok(());
            }
            Ok(ModeExitReason::ModeChanged) => {
                println!("\nMode changed, restarting...");
            }
            Err(e) => {
                eprintln!("\nMode error: {}", e);
                return Err(e);
            }
        }
    }
}
