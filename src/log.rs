use std::env;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::Error;

/// Per-endpoint protocol event sink.
///
/// Enabled by `RUDP_LOG=1` in the environment; any other value (or none)
/// leaves the sink disabled and every `event` call a no-op. Records are
/// flushed one per line so a crashed peer still leaves a usable trace.
#[derive(Debug)]
pub struct EventLog {
    sink: Option<File>,
}

impl EventLog {
    /// Opens the sink at `path` if `RUDP_LOG=1`, truncating a previous log.
    pub fn from_env(path: impl AsRef<Path>) -> Result<Self, Error> {
        let enabled = env::var("RUDP_LOG").map(|v| v == "1").unwrap_or(false);
        if !enabled {
            return Ok(EventLog { sink: None });
        }

        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            Error::Setup(format!("failed to open log file '{}': {e}", path.display()))
        })?;

        Ok(EventLog { sink: Some(file) })
    }

    /// A sink that discards everything, regardless of the environment.
    pub fn disabled() -> Self {
        EventLog { sink: None }
    }

    pub fn event(&mut self, args: fmt::Arguments<'_>) {
        if let Some(file) = &mut self.sink {
            let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f");
            let _ = writeln!(file, "[{now}] [LOG] {args}");
            let _ = file.flush();
        }
    }
}

macro_rules! event {
    ($log:expr, $($arg:tt)*) => {
        $log.event(format_args!($($arg)*))
    };
}

pub(crate) use event;
