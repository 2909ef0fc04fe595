//! Process-wide logging for every emulated system.
//!
//! Emulation code never formats a message unless somebody is listening:
//! callers hand [`log`] a closure, and the closure only runs when the
//! category/level pair is enabled and the category has not exceeded its
//! per-second budget.
//!
//! # Architecture
//!
//! - **LogConfig**: global singleton holding one atomic level per category
//!   plus a global fallback level
//! - **LogLevel**: `Off < Error < Warn < Info < Debug < Trace`
//! - **LogCategory**: the emulator subsystem a message belongs to
//! - **Output**: stderr by default, or a file written by a background thread
//!
//! # Usage
//!
//! ```rust
//! use emu_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Sprites, LogLevel::Debug, || {
//!     format!("chain head {:04X}", 0x2000)
//! });
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Verbosity of a message, or the threshold of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

/// Returned when a level name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level: {0:?}")]
pub struct ParseLevelError(pub String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "0" => Ok(LogLevel::Off),
            "error" | "err" | "1" => Ok(LogLevel::Error),
            "warn" | "warning" | "2" => Ok(LogLevel::Warn),
            "info" | "3" => Ok(LogLevel::Info),
            "debug" | "4" => Ok(LogLevel::Debug),
            "trace" | "5" => Ok(LogLevel::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl LogLevel {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Emulator subsystem a message is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Host CPU stepping and stalls
    CPU,
    /// Memory bus routing
    Bus,
    /// Sprite engine: chain walks, descriptors, quadrant rendering
    Sprites,
    /// Hardware multiply/divide unit
    Math,
    /// Joystick, switches and cartridge ports
    Input,
    /// Registers or features that are not emulated
    Stubs,
}

impl LogCategory {
    /// Every category, in storage order.
    pub const ALL: [LogCategory; 6] = [
        LogCategory::CPU,
        LogCategory::Bus,
        LogCategory::Sprites,
        LogCategory::Math,
        LogCategory::Input,
        LogCategory::Stubs,
    ];

    fn index(self) -> usize {
        match self {
            LogCategory::CPU => 0,
            LogCategory::Bus => 1,
            LogCategory::Sprites => 2,
            LogCategory::Math => 3,
            LogCategory::Input => 4,
            LogCategory::Stubs => 5,
        }
    }
}

const CATEGORY_COUNT: usize = LogCategory::ALL.len();

/// Per-category budget state for one one-second window.
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Option<Instant>,
    emitted: usize,
    dropped: usize,
}

impl Window {
    const EMPTY: Window = Window {
        started: None,
        emitted: 0,
        dropped: 0,
    };
}

/// Fixed-window rate limiter, one window per category.
///
/// When a window closes with dropped messages the next admitted message
/// carries the drop count so a summary line can be printed.
struct RateLimiter {
    per_second: AtomicUsize,
    windows: Mutex<[Window; CATEGORY_COUNT]>,
}

impl RateLimiter {
    fn new(per_second: usize) -> Self {
        Self {
            per_second: AtomicUsize::new(per_second),
            windows: Mutex::new([Window::EMPTY; CATEGORY_COUNT]),
        }
    }

    /// Returns whether the message may be emitted, and how many messages were
    /// dropped in the window that just closed (if any).
    fn admit(&self, category: LogCategory, now: Instant) -> (bool, Option<usize>) {
        let budget = self.per_second.load(Ordering::Relaxed);
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = &mut windows[category.index()];

        let mut reported = None;
        let expired = window
            .started
            .map_or(true, |start| now.duration_since(start) >= Duration::from_secs(1));
        if expired {
            if window.dropped > 0 {
                reported = Some(window.dropped);
            }
            *window = Window {
                started: Some(now),
                emitted: 0,
                dropped: 0,
            };
        }

        if window.emitted < budget {
            window.emitted += 1;
            (true, reported)
        } else {
            window.dropped += 1;
            (false, reported)
        }
    }
}

/// Global logging configuration.
pub struct LogConfig {
    global_level: AtomicU8,
    levels: [AtomicU8; CATEGORY_COUNT],
    file_sink: Mutex<Option<Sender<String>>>,
    file_enabled: AtomicBool,
    limiter: RateLimiter,
}

impl LogConfig {
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            levels: std::array::from_fn(|_| AtomicU8::new(LogLevel::Off as u8)),
            file_sink: Mutex::new(None),
            file_enabled: AtomicBool::new(false),
            limiter: RateLimiter::new(60),
        }
    }

    /// The process-wide configuration.
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn global_level(&self) -> LogLevel {
        LogLevel::from_raw(self.global_level.load(Ordering::Relaxed))
    }

    /// Override the level of one category. `Off` falls back to the global level.
    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_raw(self.levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category with its own level uses it; otherwise the global level applies.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        let threshold = match self.level(category) {
            LogLevel::Off => self.global_level(),
            own => own,
        };
        level <= threshold
    }

    /// Turn everything off again.
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    /// Maximum messages per second per category.
    pub fn set_rate_limit(&self, per_second: usize) {
        self.limiter.per_second.store(per_second, Ordering::Relaxed);
    }

    pub fn rate_limit(&self) -> usize {
        self.limiter.per_second.load(Ordering::Relaxed)
    }

    /// Append log output to `path` from a background writer thread.
    ///
    /// Replaces any previous log file; the old writer exits once its channel
    /// is dropped.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("emu-log-writer".to_string())
            .spawn(move || {
                for line in receiver {
                    if writeln!(file, "{}", line).is_err() {
                        break;
                    }
                }
                let _ = file.flush();
            })?;

        let mut sink = match self.file_sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *sink = Some(sender);
        self.file_enabled.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Stop writing to the log file and go back to stderr.
    pub fn clear_log_file(&self) {
        let mut sink = match self.file_sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *sink = None;
        self.file_enabled.store(false, Ordering::Relaxed);
    }

    fn emit(&self, line: String) {
        if self.file_enabled.load(Ordering::Relaxed) {
            let sink = match self.file_sink.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(sender) = sink.as_ref() {
                if let Err(failed) = sender.send(line) {
                    eprintln!("{}", failed.0);
                }
                return;
            }
        }
        eprintln!("{}", line);
    }
}

/// Log a lazily formatted message.
///
/// `message_fn` runs only if `category` is enabled at `level` and the
/// category still has budget in the current one-second window. When a window
/// closes with dropped messages a one-line summary is printed first.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    let (admitted, dropped) = config.limiter.admit(category, Instant::now());
    if let Some(count) = dropped {
        config.emit(format!(
            "[{:?}] rate limit: {} message(s) dropped in the last second",
            category, count
        ));
    }
    if admitted {
        config.emit(format!("[{:?}] {}", category, message_fn()));
    }
}
