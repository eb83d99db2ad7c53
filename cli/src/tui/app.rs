//! Dashboard state and key handling.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use port_arranger_core::{ProcessMapping, Snapshot};

/// What the event loop should do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Stop(String),
    Restart(String),
    OpenBrowser(u16),
}

pub struct App {
    processes: Vec<(String, ProcessMapping)>,
    pub selected: usize,
    status: Option<String>,
}

impl App {
    pub fn new(snapshot: Snapshot) -> Self {
        let mut app = Self {
            processes: Vec::new(),
            selected: 0,
            status: None,
        };
        app.set_processes(snapshot);
        app
    }

    /// Replace the process list, keeping the selection on the same name
    /// when it still exists.
    pub fn set_processes(&mut self, snapshot: Snapshot) {
        let current = self.selected_entry().map(|(name, _)| name.clone());
        self.processes = snapshot.into_iter().collect();

        self.selected = current
            .and_then(|name| self.processes.iter().position(|(n, _)| *n == name))
            .unwrap_or(self.selected)
            .min(self.processes.len().saturating_sub(1));
    }

    pub fn processes(&self) -> &[(String, ProcessMapping)] {
        &self.processes
    }

    pub fn selected_entry(&self) -> Option<&(String, ProcessMapping)> {
        self.processes.get(self.selected)
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn get_status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn next(&mut self) {
        if !self.processes.is_empty() {
            self.selected = (self.selected + 1) % self.processes.len();
        }
    }

    fn previous(&mut self) {
        if !self.processes.is_empty() {
            self.selected = self
                .selected
                .checked_sub(1)
                .unwrap_or(self.processes.len() - 1);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('j') | KeyCode::Down => {
                self.next();
                Action::None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.previous();
                Action::None
            }
            KeyCode::Char('s') | KeyCode::Char('x') => self
                .selected_entry()
                .map(|(name, _)| Action::Stop(name.clone()))
                .unwrap_or(Action::None),
            KeyCode::Char('r') => self
                .selected_entry()
                .map(|(name, _)| Action::Restart(name.clone()))
                .unwrap_or(Action::None),
            KeyCode::Char('o') | KeyCode::Enter => match self.selected_entry() {
                Some((_, mapping)) if mapping.port != 0 => Action::OpenBrowser(mapping.port),
                Some((name, _)) => {
                    let message = format!("{} has no published port", name);
                    self.set_status(message);
                    Action::None
                }
                None => Action::None,
            },
            _ => Action::None,
        }
    }
}
