/// Structured logging for the flood early-warning service
///
/// Provides context-rich logging tagged with the pipeline component and,
/// where relevant, the site id. Supports console output and an append-only
/// log file for daemon operation.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::FloodError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Validator,
    Buffer,
    Scorer,
    Classifier,
    Pipeline,
    Store,
    Gateway,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Validator => write!(f, "VALID"),
            Component::Buffer => write!(f, "BUFFER"),
            Component::Scorer => write!(f, "SCORE"),
            Component::Classifier => write!(f, "ALERT"),
            Component::Pipeline => write!(f, "PIPE"),
            Component::Store => write!(f, "DB"),
            Component::Gateway => write!(f, "GW"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - bad or late field data that the pipeline discards
    Expected,
    /// Unexpected failure - service degradation or configuration issue
    Unexpected,
    /// Unknown - may be a field outage or may be noise
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn format_entry(level: LogLevel, component: Component, site_id: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let site_part = site_id.map(|s| format!(" [{}]", s)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, component, site_part, message)
    }

    fn log(&self, level: LogLevel, component: Component, site_id: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, component, site_id, message);
        let site_part = site_id.map(|s| format!(" [{}]", s)).unwrap_or_default();

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, site_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, site_part, message),
                LogLevel::Info => println!("   {}{}: {}", component, site_part, message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, component: Component, site_id: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, component, site_id, message);
        }
    }
}

/// Log a general informational message
pub fn info(component: Component, site_id: Option<&str>, message: &str) {
    emit(LogLevel::Info, component, site_id, message);
}

/// Log a warning message
pub fn warn(component: Component, site_id: Option<&str>, message: &str) {
    emit(LogLevel::Warning, component, site_id, message);
}

/// Log an error message
pub fn error(component: Component, site_id: Option<&str>, message: &str) {
    emit(LogLevel::Error, component, site_id, message);
}

/// Log a debug message
pub fn debug(component: Component, site_id: Option<&str>, message: &str) {
    emit(LogLevel::Debug, component, site_id, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a pipeline failure by how much attention it deserves.
pub fn classify_failure(err: &FloodError) -> FailureType {
    match err {
        // Field units send junk and retransmit; discarding is routine.
        FloodError::Validation(_) | FloodError::Ordering { .. } => FailureType::Expected,
        // A gap can be a dead battery or a flooded enclosure.
        FloodError::Gap { .. } => FailureType::Unknown,
        FloodError::ScoringUnavailable { .. }
        | FloodError::Configuration(_)
        | FloodError::Storage(_)
        | FloodError::Transport(_) => FailureType::Unexpected,
    }
}

/// Component that owns a given failure.
fn component_for(err: &FloodError) -> Component {
    match err {
        FloodError::Validation(_) | FloodError::Ordering { .. } => Component::Validator,
        FloodError::Gap { .. } => Component::Buffer,
        FloodError::ScoringUnavailable { .. } => Component::Scorer,
        FloodError::Configuration(_) => Component::System,
        FloodError::Storage(_) => Component::Store,
        FloodError::Transport(_) => Component::Gateway,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a pipeline failure with automatic classification
pub fn log_failure(operation: &str, err: &FloodError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);
    let component = component_for(err);
    let site_id = err.site_id();

    match failure_type {
        FailureType::Expected => debug(component, site_id, &message),
        FailureType::Unexpected => error(component, site_id, &message),
        FailureType::Unknown => warn(component, site_id, &message),
    }
}

// ---------------------------------------------------------------------------
// Batch Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a replay or poll batch
pub fn log_batch_summary(component: Component, label: &str, total: usize, accepted: usize, rejected: usize) {
    let message = format!(
        "{} complete: {}/{} accepted, {} rejected",
        label, accepted, total, rejected
    );

    if rejected == 0 {
        info(component, None, &message);
    } else if accepted == 0 {
        error(component, None, &message);
    } else {
        warn(component, None, &message);
    }
}
