//! Single-line progress indicator on stderr

use std::io::{IsTerminal, Write};

pub struct Progress {
    total: usize,
    enabled: bool,
}

impl Progress {
    /// Visible only when stderr is a terminal
    pub fn new(total: usize) -> Self {
        Self {
            total,
            enabled: std::io::stderr().is_terminal(),
        }
    }

    pub fn hidden(total: usize) -> Self {
        Self {
            total,
            enabled: false,
        }
    }

    pub fn update(&self, done: usize, detail: &str) {
        if !self.enabled {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r{}{:<10}", render(done, self.total), detail);
        let _ = stderr.flush();
    }

    pub fn finish(&self) {
        if self.enabled {
            eprintln!();
        }
    }
}

fn render(done: usize, total: usize) -> String {
    let percent = if total == 0 { 100 } else { done * 100 / total };
    format!("[{:>3}%] ({}/{}) ", percent, done, total)
}
