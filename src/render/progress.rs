//! Spinner shown while waiting on a provider or the backend.

use crossterm::style::Stylize;
use std::io::{self, IsTerminal, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use super::settings;

/// RAII handle for an active spinner. Dropping it stops the spinner.
pub struct ProgressHandle {
    running: Option<(mpsc::Sender<()>, thread::JoinHandle<()>)>,
}

impl ProgressHandle {
    pub(crate) fn disabled() -> Self {
        Self { running: None }
    }

    pub fn is_active(&self) -> bool {
        self.running.is_some()
    }

    /// Stop the spinner and wait until its line is cleared.
    pub fn finish(&mut self) {
        if let Some((stop, thread)) = self.running.take() {
            let _ = stop.send(());
            let _ = thread.join();
        }
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Start a spinner on stderr. No-op when stderr is not a terminal.
pub fn start_progress(label: impl Into<String>, color: bool) -> ProgressHandle {
    if !io::stderr().is_terminal() {
        return ProgressHandle::disabled();
    }

    let label = label.into();
    let (stop, stopped) = mpsc::channel::<()>();
    let tick = Duration::from_millis(settings::PROGRESS_TICK_MS);
    let thread = thread::spawn(move || {
        let start = Instant::now();
        for frame in settings::PROGRESS_FRAMES.iter().cycle() {
            let line = progress_line(*frame, &label, start.elapsed(), color);
            let mut err = io::stderr();
            let _ = write!(err, "{line}");
            let _ = err.flush();
            // A stop message or a dropped sender both end the spinner.
            if stopped.recv_timeout(tick) != Err(RecvTimeoutError::Timeout) {
                break;
            }
        }
        let mut err = io::stderr();
        let _ = write!(err, "{}", settings::PROGRESS_CLEAR_LINE);
        let _ = err.flush();
    });

    ProgressHandle {
        running: Some((stop, thread)),
    }
}

fn progress_line(frame: char, label: &str, elapsed: Duration, color: bool) -> String {
    let elapsed = format!("({}s)", elapsed.as_secs());
    if color {
        format!(
            "{}{} {} {}",
            settings::PROGRESS_CLEAR_LINE,
            frame.with(settings::COLOR_PROGRESS_FRAME),
            label.with(settings::COLOR_PROGRESS_LABEL),
            elapsed.with(settings::COLOR_PROGRESS_ELAPSED),
        )
    } else {
        format!("{}{frame} {label} {elapsed}", settings::PROGRESS_CLEAR_LINE)
    }
}
