//! Minimal structured logger
//!
//! The core logs only a handful of events: a missing file auto-created on
//! startup, a corruption note, and vacuum start/finish. This is not a
//! general-purpose logging facade — it is the same small synchronous
//! JSON-lines logger `aerodb` rolls for itself (`src/observability/logger.rs`),
//! trimmed to what this crate actually calls. One event per line,
//! deterministic (alphabetical) field ordering, no buffering, no external
//! logging crate.

use std::fmt;
use std::io::{self, Write};

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational note (e.g. file auto-created).
    Info,
    /// Recoverable issue.
    Warn,
    /// Unrecoverable; the caller should treat the operation as aborted.
    Fatal,
}

impl Severity {
    fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stateless structured logger.
pub struct Logger;

impl Logger {
    /// Log at INFO level (stdout).
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::write(Severity::Info, event, fields, &mut io::stdout());
    }

    /// Log at WARN level (stdout).
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::write(Severity::Warn, event, fields, &mut io::stdout());
    }

    /// Log at FATAL level (stderr).
    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::write(Severity::Fatal, event, fields, &mut io::stderr());
    }

    fn write<W: Write>(severity: Severity, event: &str, fields: &[(&str, &str)], out: &mut W) {
        let mut line = String::with_capacity(128);
        line.push('{');

        line.push_str("\"event\":\"");
        escape(&mut line, event);
        line.push('"');

        line.push_str(",\"severity\":\"");
        line.push_str(severity.as_str());
        line.push('"');

        let mut sorted: Vec<_> = fields.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);
        for (k, v) in sorted {
            line.push_str(",\"");
            escape(&mut line, k);
            line.push_str("\":\"");
            escape(&mut line, v);
            line.push('"');
        }

        line.push('}');
        line.push('\n');

        let _ = out.write_all(line.as_bytes());
        let _ = out.flush();
    }
}

fn escape(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
}
