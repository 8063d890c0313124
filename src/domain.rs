use std::io;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::model::SortMode;
use crate::route::ActionKind;

#[derive(Debug, Error)]
pub enum GridError {
    /// A column references something the schema does not have, or the primary key can not be inferred.
    #[error("invalid grid configuration: {0}")]
    Configuration(String),
    #[error("can not format value as '{format}': {reason}")]
    Formatter { format: String, reason: String },
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error(transparent)]
    PolarsError(#[from] PolarsError),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("unknown file type")]
    UnknownFileType,
    #[error("navigation failed: {0}")]
    Navigation(String),
}

impl GridError {
    pub fn config(msg: impl Into<String>) -> Self {
        GridError::Configuration(msg.into())
    }
}

/// Options of the rendered grid and of the table controller.
#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_", into)]
pub struct GridConfig {
    /// Id of the wrapper element the client script binds to.
    pub id: String,
    pub wrapper_class: String,
    pub table_class: String,
    pub action_column: bool,
    pub action_view_class: String,
    pub action_update_class: String,
    pub filter_fields: bool,
    /// Directory the vue script is served from.
    pub vue_src: String,
    /// Serve the unminified vue build.
    pub dev: bool,
    #[setters(strip_option)]
    pub sort_key: Option<String>,
    #[setters(strip_option)]
    pub primary_key: Option<String>,
    pub sort_mode: SortMode,
    pub event_poll_time: u64,
    pub max_column_width: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            id: "w0".to_string(),
            wrapper_class: "tbl-wrapper".to_string(),
            table_class: "table table-striped".to_string(),
            action_column: true,
            action_view_class: "fa fa-eye".to_string(),
            action_update_class: "fa fa-pencil".to_string(),
            filter_fields: true,
            vue_src: "https://cdn.jsdelivr.net/npm/vue@2/dist".to_string(),
            dev: false,
            sort_key: None,
            primary_key: None,
            sort_mode: SortMode::Lexicographic,
            event_poll_time: 100,
            max_column_width: 40,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Quit,
    Exit,
    Enter,
    Help,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Sort(Option<String>),
    Filter,
    SetFilter(String, String),
    ClearFilters,
    Action(ActionKind),
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
tvgrid - sortable, filterable data grid

Navigation
  ↑/k ↓/j        move row
  ←/h →/l        select column
  PgUp/PgDn      page up/down
  g / G          first / last row

Table
  s, Enter       sort by selected column (again: reverse)
  /              filter selected column (Enter keep, Esc undo)
  c              clear all filters
  v              open view page of selected row
  u              open update page of selected row

  ?              this help (Esc to close)
  q              quit
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_setters_chain() {
        let cfg = GridConfig::default()
            .with_id("products")
            .with_sort_key("price")
            .with_action_column(false);
        assert_eq!(cfg.id, "products");
        assert_eq!(cfg.sort_key.as_deref(), Some("price"));
        assert!(!cfg.action_column);
        assert!(cfg.filter_fields);
    }

    #[test]
    fn configuration_error_message() {
        let err = GridError::config("unknown field 'foo'");
        assert_eq!(
            err.to_string(),
            "invalid grid configuration: unknown field 'foo'"
        );
    }
}
