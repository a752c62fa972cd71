//! Shared output layer for pretty/text/JSON parity across all CLI commands.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format` / hidden `--json` flag
//! 2. The mode resolved by the config layer (`FORMAT` env var, then user
//!    config, then TTY detection)

use clap::ValueEnum;
use evalpath_core::{ErrorCode, FlowError};
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-optimized output (sections, markers).
    Pretty,
    /// Tab-separated rows for scripts and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "pretty" => Some(Self::Pretty),
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Pick the output mode from flags, falling back to the config-resolved
/// mode name.
pub fn resolve_output_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    configured: &str,
) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }
    if json_flag {
        return OutputMode::Json;
    }
    OutputMode::from_name(configured).unwrap_or(OutputMode::Text)
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Stable code such as `E2002`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }

    /// Attach `code` and its remediation hint.
    #[must_use]
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.suggestion = code.hint().map(str::to_string);
        self.error_code = Some(code.code().to_string());
        self
    }
}

impl From<&FlowError> for CliError {
    fn from(err: &FlowError) -> Self {
        Self::new(err.to_string()).with_code(err.code())
    }
}

/// A failure that has already been written to stderr.
///
/// `main` maps it to a non-zero exit status without printing it again.
#[derive(Debug)]
pub struct Reported;

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("error already reported")
    }
}

impl std::error::Error for Reported {}

/// Render a serializable value to stdout in the requested format.
///
/// JSON mode serializes `value`; pretty and text modes call the matching
/// closure.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}

/// Render `error` and return the [`Reported`] marker.
pub fn report(mode: OutputMode, error: &CliError) -> anyhow::Error {
    match render_error(mode, error) {
        Ok(()) => anyhow::Error::new(Reported),
        Err(render_err) => render_err,
    }
}

/// Render `err` and turn it into the command's failure.
pub fn fail(mode: OutputMode, err: &FlowError) -> anyhow::Error {
    report(mode, &CliError::from(err))
}

/// Render any error not yet shown. Errors already [`Reported`] pass through.
pub fn report_unhandled(mode: OutputMode, err: anyhow::Error) -> anyhow::Error {
    if err.is::<Reported>() {
        return err;
    }
    report(mode, &CliError::new(format!("{err:#}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_flag_wins_over_json_and_config() {
        let mode = resolve_output_mode(Some(OutputMode::Text), true, "pretty");
        assert_eq!(mode, OutputMode::Text);
    }

    #[test]
    fn json_flag_wins_over_config() {
        assert_eq!(resolve_output_mode(None, true, "pretty"), OutputMode::Json);
    }

    #[test]
    fn configured_mode_is_used_without_flags() {
        assert_eq!(resolve_output_mode(None, false, "pretty"), OutputMode::Pretty);
        assert_eq!(resolve_output_mode(None, false, "json"), OutputMode::Json);
        assert_eq!(resolve_output_mode(None, false, "bogus"), OutputMode::Text);
    }

    #[test]
    fn flow_error_carries_code_and_hint() {
        let err = FlowError::OrderingViolation {
            screen: "comparison_3".into(),
            current: "comparison_1".into(),
        };
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E2002"));
        assert!(cli.suggestion.is_some());
        assert!(cli.message.contains("comparison_3"));
    }

    #[test]
    fn cli_error_json_omits_empty_fields() {
        let json = serde_json::to_value(CliError::new("boom")).expect("serialize");
        assert_eq!(json, serde_json::json!({"message": "boom"}));
    }

    #[test]
    fn config_code_carries_hint() {
        let cli = CliError::new("bad offset").with_code(ErrorCode::InvalidConfig);
        assert_eq!(cli.error_code.as_deref(), Some("E1001"));
        assert!(cli.suggestion.is_some());
    }

    #[test]
    fn flow_failures_are_marked_reported() {
        let err = fail(OutputMode::Text, &FlowError::UnknownScreen("nowhere".into()));
        assert!(err.is::<Reported>());
        let again = report_unhandled(OutputMode::Text, err);
        assert!(again.is::<Reported>());
    }
}
