//! Interactive dashboard.
//!
//! Mirrors the registry through a [`RegistryWatcher`] subscription and lets
//! the user stop processes or open them in a browser.

mod app;
mod ui;

use std::io::{self, Stdout};
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use port_arranger_core::{
    DockerCompose, Registry, RegistryWatcher, StatusReporter, StopService, SystemProcessControl,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use app::{Action, App};

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

fn init_terminal() -> io::Result<TuiTerminal> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal(mut terminal: TuiTerminal) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Forward key presses from a blocking reader thread into the event loop.
fn spawn_input_listener(tx: mpsc::Sender<KeyEvent>) {
    std::thread::spawn(move || loop {
        if event::poll(Duration::from_millis(100)).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                if key.kind == KeyEventKind::Press && tx.blocking_send(key).is_err() {
                    break;
                }
            }
        }
    });
}

/// Open `http://localhost:<port>` in the default browser.
fn open_browser(port: u16) -> io::Result<()> {
    let url = format!("http://localhost:{}", port);

    #[cfg(target_os = "macos")]
    let mut command = {
        let mut c = Command::new("open");
        c.arg(&url);
        c
    };

    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", "", &url]);
        c
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = {
        let mut c = Command::new("xdg-open");
        c.arg(&url);
        c
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

pub async fn run(registry: Registry) -> Result<()> {
    let watcher = RegistryWatcher::new(StatusReporter::new(
        registry.clone(),
        SystemProcessControl::new(),
        DockerCompose::new(),
    ));
    let stopper = StopService::new(registry, SystemProcessControl::new(), DockerCompose::new());

    let mut updates = watcher.subscribe();
    let mut app = App::new(watcher.refresh().await);
    let _handle = watcher.start()?;

    let (key_tx, mut key_rx) = mpsc::channel(64);
    spawn_input_listener(key_tx);

    let mut terminal = init_terminal()?;
    let result = event_loop(&mut terminal, &mut app, &mut key_rx, &mut updates, &stopper).await;
    restore_terminal(terminal)?;
    result
}

async fn event_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    keys: &mut mpsc::Receiver<KeyEvent>,
    updates: &mut tokio::sync::broadcast::Receiver<port_arranger_core::Snapshot>,
    stopper: &StopService<SystemProcessControl, DockerCompose>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        tokio::select! {
            key = keys.recv() => {
                let Some(key) = key else {
                    return Ok(());
                };
                match app.handle_key(key) {
                    Action::Quit => return Ok(()),
                    Action::Stop(name) => {
                        app.set_status(format!("Stopping {}...", name));
                        terminal.draw(|f| ui::draw(f, app))?;
                        match stopper.stop(&name).await {
                            Ok(outcome) => app.set_status(format!("Stopped {} (PID: {})", name, outcome.pid())),
                            Err(e) => app.set_status(format!("Failed to stop {}: {}", name, e)),
                        }
                    }
                    Action::Restart(name) => {
                        match stopper.restart(&name).await {
                            Ok(_) => app.set_status(format!("Stopped {}; start it again with pa run", name)),
                            Err(e) => app.set_status(format!("Failed to restart {}: {}", name, e)),
                        }
                    }
                    Action::OpenBrowser(port) => {
                        if let Err(e) = open_browser(port) {
                            app.set_status(format!("Failed to open browser: {}", e));
                        }
                    }
                    Action::None => {}
                }
            }
            update = updates.recv() => match update {
                Ok(snapshot) => app.set_processes(snapshot),
                // A newer snapshot follows.
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    }
}
