//! Shared output layer for pretty/text/JSON parity across all CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its output
//! accordingly: pretty output for humans, compact text for agents, or stable JSON.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format` flag
//! 2. the mode settled from config: hidden `--json`, `FORMAT` env, user config
//! 3. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use std::io::{self, IsTerminal, Write};
use tally_core::ErrorCode;
use tally_core::model::{ColumnValue, NormalizedItem};

use crate::fetch::FetchError;
use crate::source::SourceError;

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

/// Write a horizontal separator used by pretty human output.
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

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-optimized output (sections, visual framing).
    Pretty,
    /// Token-efficient plain text for agents and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    /// Parse a canonical mode name as produced by config resolution.
    fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "text" => Some(Self::Text),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Core resolution logic, separated from I/O for testability.
///
/// `format_flag`: explicit `--format` value if provided.
/// `configured`: the mode settled by config loading, when it succeeded.
/// `json_flag`: hidden `--json` alias.
/// `format_env`: the value of `FORMAT` if set.
/// `is_tty`: true if stdout is a TTY.
fn resolve_output_mode_inner(
    format_flag: Option<OutputMode>,
    configured: Option<&str>,
    json_flag: bool,
    format_env: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }

    if let Some(mode) = configured.and_then(OutputMode::from_name) {
        return mode;
    }

    if json_flag {
        return OutputMode::Json;
    }

    if let Some(mode) = format_env.and_then(OutputMode::from_name) {
        return mode;
    }

    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// Resolve the output mode from CLI flags, resolved config, environment, and TTY defaults.
pub fn resolve_output_mode(
    format_flag: Option<OutputMode>,
    configured: Option<&str>,
    json_flag: bool,
) -> OutputMode {
    let env_val = std::env::var("FORMAT").ok();
    let is_tty = io::stdout().is_terminal();
    resolve_output_mode_inner(
        format_flag,
        configured,
        json_flag,
        env_val.as_deref(),
        is_tty,
    )
}

/// Trait implemented by any CLI result type that can be rendered in all modes.
///
/// The [`render_item`] and [`render_list`] free functions dispatch to the
/// appropriate method based on [`OutputMode`].
pub trait Renderable {
    /// Render for human consumption: labelled sections.
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()>;

    /// Render as a self-contained JSON value.
    fn render_json(&self, w: &mut dyn Write) -> io::Result<()>;

    /// Render as compact text rows.
    fn render_text(&self, w: &mut dyn Write) -> io::Result<()>;
}

/// Render a single [`Renderable`] item to stdout using the given output mode.
pub fn render_item<R: Renderable>(item: &R, mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Pretty => item.render_human(&mut out),
        OutputMode::Text => item.render_text(&mut out),
        OutputMode::Json => {
            item.render_json(&mut out)?;
            writeln!(out)
        }
    }
}

/// Render a list of [`Renderable`] items to stdout.
///
/// - In JSON mode, wraps items in a JSON array.
/// - In pretty/text mode, renders items sequentially.
pub fn render_list<R: Renderable>(items: &[R], mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_list(&mut out, items, mode)
}

fn write_list<R: Renderable>(out: &mut dyn Write, items: &[R], mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Pretty => {
            for item in items {
                item.render_human(out)?;
            }
        }
        OutputMode::Text => {
            for item in items {
                item.render_text(out)?;
            }
        }
        OutputMode::Json => {
            if items.is_empty() {
                return writeln!(out, "[]");
            }
            write!(out, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(out, ",")?;
                }
                writeln!(out)?;
                let mut buf = Vec::new();
                item.render_json(&mut buf)?;
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                out.write_all(&buf)?;
            }
            writeln!(out, "\n]")?;
        }
    }
    Ok(())
}

impl Renderable for NormalizedItem {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let name = self.header.name.as_deref().unwrap_or("(unnamed)");
        pretty_section(w, &format!("{name} [{}]", self.header.id))?;
        if let Some(board) = self.header.board.get("id").and_then(scalar) {
            pretty_kv(w, "Board", board)?;
        }
        if let Some(group) = self.header.group.get("title").and_then(scalar) {
            pretty_kv(w, "Group", group)?;
        }
        if let Some(parent) = &self.parent_item {
            pretty_kv(w, "Parent", &parent.header.id)?;
        }
        if !self.subitems.is_empty() {
            pretty_kv(w, "Subitems", self.subitems.len().to_string())?;
        }
        for cv in &self.column_values {
            let label = cv.title.as_deref().unwrap_or(&cv.id);
            pretty_kv(w, label, cell_summary(cv))?;
        }
        writeln!(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *w, self)?;
        writeln!(w)
    }

    fn render_text(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}  {}",
            self.header.id,
            self.header.name.as_deref().unwrap_or("-")
        )?;
        for cv in &self.column_values {
            writeln!(w, "  {}  {}", cv.id, cell_summary(cv))?;
        }
        Ok(())
    }
}

/// One-line view of a column: its text, else its raw value, else `-`.
fn cell_summary(cv: &ColumnValue) -> String {
    match (&cv.text, &cv.value) {
        (Some(text), _) if !text.is_empty() => text.clone(),
        (_, Value::String(raw)) if !raw.is_empty() => raw.clone(),
        _ => "-".to_string(),
    }
}

fn scalar(value: &Value) -> Option<String> {
    tally_core::de::coerce_id(value)
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (`E####`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Create an error carrying a code and that code's hint.
    pub fn with_code(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }

    /// Classify a command failure by the first typed error in its chain.
    /// Anything unrecognized is reported as an internal error.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let code = err
            .chain()
            .find_map(error_code_of)
            .unwrap_or(ErrorCode::InternalUnexpected);
        Self::with_code(format!("{err:#}"), code)
    }
}

fn error_code_of(cause: &(dyn std::error::Error + 'static)) -> Option<ErrorCode> {
    if let Some(err) = cause.downcast_ref::<FetchError>() {
        return Some(err.code());
    }
    if let Some(err) = cause.downcast_ref::<SourceError>() {
        return Some(err.code());
    }
    cause
        .downcast_ref::<tally_core::InputError>()
        .map(tally_core::InputError::code)
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(&mut out, mode, error)
}

fn write_error(out: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut *out, &wrapper)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> NormalizedItem {
        let raw = serde_json::from_value(json!({
            "id": "1",
            "name": "Order",
            "board": {"id": "B1"},
            "column_values": [
                {"id": "status", "text": "Done", "value": "{\"index\":1}",
                 "column": {"title": "Status"}},
                {"id": "empty", "value": null}
            ]
        }))
        .expect("raw item");
        tally_core::normalize(raw)
    }

    fn rendered(mode: OutputMode, items: &[NormalizedItem]) -> String {
        let mut buf = Vec::new();
        write_list(&mut buf, items, mode).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    // ── resolve_output_mode_inner ───────────────────────────────────────────

    #[test]
    fn resolve_format_flag_wins_over_everything() {
        let mode =
            resolve_output_mode_inner(Some(OutputMode::Text), Some("json"), true, Some("pretty"), true);
        assert_eq!(mode, OutputMode::Text);
    }

    #[test]
    fn resolve_configured_mode_is_used() {
        let mode = resolve_output_mode_inner(None, Some("pretty"), false, Some("text"), false);
        assert_eq!(mode, OutputMode::Pretty);
    }

    #[test]
    fn resolve_without_config_falls_back_to_flags_and_env() {
        assert_eq!(
            resolve_output_mode_inner(None, None, true, Some("pretty"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode_inner(None, None, false, Some("TEXT"), true),
            OutputMode::Text
        );
    }

    #[test]
    fn resolve_unknown_env_falls_through_to_tty() {
        assert_eq!(
            resolve_output_mode_inner(None, None, false, Some("fancy"), true),
            OutputMode::Pretty
        );
        assert_eq!(
            resolve_output_mode_inner(None, None, false, Some("fancy"), false),
            OutputMode::Text
        );
    }

    // ── rendering ───────────────────────────────────────────────────────────

    #[test]
    fn json_list_is_an_array_of_items() {
        let out = rendered(OutputMode::Json, &[item(), item()]);
        let parsed: Value = serde_json::from_str(&out).expect("valid JSON");
        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
        assert_eq!(parsed[0]["id"], json!("1"));
        assert_eq!(parsed[0]["mappable_column_values"]["status"]["text"], json!("Done"));
    }

    #[test]
    fn empty_json_list() {
        assert_eq!(rendered(OutputMode::Json, &[]), "[]\n");
    }

    #[test]
    fn text_rows_list_columns() {
        let out = rendered(OutputMode::Text, &[item()]);
        assert_eq!(out, "1  Order\n  status  Done\n  empty  -\n");
    }

    #[test]
    fn pretty_uses_titles_and_sections() {
        let out = rendered(OutputMode::Pretty, &[item()]);
        assert!(out.starts_with("Order [1]\n"));
        assert!(out.contains("Board:       B1"));
        assert!(out.contains("Status:      Done"));
    }

    // ── errors ──────────────────────────────────────────────────────────────

    #[test]
    fn cli_error_json_shape() {
        let err = CliError::with_code("no items found", ErrorCode::InputMalformed);
        let mut buf = Vec::new();
        write_error(&mut buf, OutputMode::Json, &err).expect("render");
        let parsed: Value = serde_json::from_slice(&buf).expect("valid JSON");
        assert_eq!(parsed["error"]["error_code"], json!("E2002"));
        assert_eq!(parsed["error"]["message"], json!("no items found"));
        assert!(parsed["error"]["suggestion"].is_string());
    }

    #[test]
    fn cli_error_text_shape() {
        let err = CliError::with_code("boom", ErrorCode::InputUnreadable);
        let mut buf = Vec::new();
        write_error(&mut buf, OutputMode::Text, &err).expect("render");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "error[E2001]: boom\n  suggestion: Check the input path, or pipe the document on stdin.\n"
        );
    }

    #[test]
    fn typed_errors_are_classified_through_context() {
        let err = anyhow::Error::new(tally_core::InputError::NoItems).context("reading stdin");
        let cli = CliError::from_anyhow(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E2002"));
        assert!(cli.message.starts_with("reading stdin: "));

        let plain = CliError::from_anyhow(&anyhow::anyhow!("something else"));
        assert_eq!(plain.error_code.as_deref(), Some("E9001"));
        assert_eq!(plain.message, "something else");
    }
}
