//! `tl relation`: inspect how a column's settings blob is read.

use crate::output::{OutputMode, Renderable, pretty_kv, pretty_section, render_item};
use crate::source::{self, STDIN};
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use tally_core::relation::parse_relation_metadata;

#[derive(Args, Debug)]
pub struct RelationArgs {
    /// Column settings JSON (`settings_str`), or `-` to read it from stdin.
    #[arg(default_value = STDIN)]
    pub settings: String,
}

/// One `displayed_linked_columns` entry.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DisplayedBoard {
    pub board_id: String,
    pub columns: Vec<String>,
}

/// What aggregation would do with a column carrying these settings.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RelationReport {
    pub relation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_board: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_column: Option<String>,
    pub flagged_columns: Vec<String>,
    pub displayed_linked_columns: Vec<DisplayedBoard>,
}

impl RelationReport {
    pub fn from_settings(settings: &str) -> Self {
        let Some(meta) = parse_relation_metadata(Some(settings)) else {
            return Self {
                relation: false,
                kind: None,
                target_board: None,
                target_column: None,
                flagged_columns: Vec::new(),
                displayed_linked_columns: Vec::new(),
            };
        };

        let target = meta.target();
        Self {
            relation: true,
            kind: Some(meta.kind.as_str()),
            target_board: target.map(|t| t.board_id.to_string()),
            target_column: target.map(|t| t.column_id.to_string()),
            flagged_columns: meta.flagged_columns().map(str::to_string).collect(),
            displayed_linked_columns: meta
                .displayed_linked_columns
                .iter()
                .map(|(board_id, columns)| DisplayedBoard {
                    board_id: board_id.clone(),
                    columns: columns.clone(),
                })
                .collect(),
        }
    }
}

impl Renderable for RelationReport {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, "Relation")?;
        let Some(kind) = self.kind else {
            return pretty_kv(w, "Kind", "not a relation column");
        };
        pretty_kv(w, "Kind", kind)?;
        pretty_kv(w, "Board", self.target_board.as_deref().unwrap_or("-"))?;
        pretty_kv(w, "Column", self.target_column.as_deref().unwrap_or("-"))?;
        if !self.flagged_columns.is_empty() {
            pretty_kv(w, "Narrowed by", self.flagged_columns.join(", "))?;
        }
        Ok(())
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *w, self)?;
        Ok(())
    }

    fn render_text(&self, w: &mut dyn Write) -> io::Result<()> {
        let Some(kind) = self.kind else {
            return writeln!(w, "none");
        };
        writeln!(
            w,
            "{kind}  {}  {}  {}",
            self.target_board.as_deref().unwrap_or("-"),
            self.target_column.as_deref().unwrap_or("-"),
            if self.flagged_columns.is_empty() {
                "-".to_string()
            } else {
                self.flagged_columns.join(",")
            }
        )
    }
}

/// Execute `tl relation <SETTINGS>`.
///
/// # Errors
///
/// Returns an error if stdin cannot be read or output fails.
pub fn run_relation(args: &RelationArgs, output: OutputMode) -> anyhow::Result<()> {
    let settings = if args.settings == STDIN {
        source::read_document(STDIN)?
    } else {
        args.settings.clone()
    };

    let report = RelationReport::from_settings(settings.trim());
    render_item(&report, output)?;
    Ok(())
}
