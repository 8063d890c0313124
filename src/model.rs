use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::builder::{Labels, ViewModel, ViewRow};
use crate::domain::{GridConfig, GridError, HELP_TEXT, Message};
use crate::inputter::{InputResult, Inputter};
use crate::route::{ActionKind, Navigator, RouteResolver};

/// How cells of the sort column are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Plain string comparison of the formatted cells, "10" sorts before "9".
    #[default]
    Lexicographic,
    /// Cells that read as numbers are compared numerically and sort before all other cells.
    Numeric,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub sort_key: Option<String>,
    pub reverse: bool,
}

/// Initial state handed to a presentation host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridState {
    #[serde(default)]
    pub name: String,
    pub labels: Labels,
    pub tbldata: Vec<ViewRow>,
    #[serde(default)]
    pub filters: IndexMap<String, String>,
    #[serde(default)]
    pub sort_key: Option<String>,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub sort_mode: SortMode,
    #[serde(default)]
    pub primary_key: String,
}

impl GridState {
    pub fn initial(vm: &ViewModel) -> Self {
        Self {
            name: vm.name.clone(),
            labels: vm.labels.clone(),
            tbldata: vm.rows.clone(),
            filters: vm.filters(),
            sort_key: vm.sort_key.clone(),
            reverse: false,
            sort_mode: SortMode::default(),
            primary_key: vm.primary_key.clone(),
        }
    }
}

enum Matcher {
    Regex(Regex),
    Literal(String),
}

impl Matcher {
    // The filter is a case insensitive regex search. Input that is not a valid regex is searched literally.
    fn new(pattern: &str) -> Self {
        let build = |p: &str| RegexBuilder::new(p).case_insensitive(true).build();
        match build(pattern).or_else(|_| build(&regex::escape(pattern))) {
            Ok(re) => Matcher::Regex(re),
            Err(e) => {
                debug!("Filter '{pattern}' can not be compiled ({e}), using plain search");
                Matcher::Literal(pattern.to_lowercase())
            }
        }
    }

    fn is_match(&self, haystack: &str) -> bool {
        match self {
            Matcher::Regex(re) => re.is_match(haystack),
            Matcher::Literal(term) => haystack.to_lowercase().contains(term.as_str()),
        }
    }
}

/// Live table state: filters and sorting over a fixed set of view rows.
///
/// Every state change recomputes the derived rows, the indices of the view rows that pass all
/// filters in sort order. The view rows themselves are never touched.
pub struct GridModel {
    name: String,
    labels: Labels,
    rows: Arc<Vec<ViewRow>>,
    filters: IndexMap<String, String>,
    matchers: Vec<(String, Matcher)>,
    sort: SortState,
    sort_mode: SortMode,
    primary_key: String,
    derived: Arc<Vec<usize>>, // Mapping of derived row index to view row index
    routes: Box<dyn RouteResolver>,
}

impl GridModel {
    pub fn new(vm: ViewModel, routes: Box<dyn RouteResolver>) -> Self {
        let filters = vm.filters();
        let mut model = Self {
            name: vm.name,
            labels: vm.labels,
            rows: Arc::new(vm.rows),
            filters,
            matchers: Vec::new(),
            sort: SortState {
                sort_key: vm.sort_key,
                reverse: false,
            },
            sort_mode: SortMode::default(),
            primary_key: vm.primary_key,
            derived: Arc::new(Vec::new()),
            routes,
        };
        model.normalize_sort_key();
        model.recompute();
        model
    }

    /// Restores a model from an externally provided state.
    ///
    /// Unknown sort keys fall back to the first column, filters on unknown columns are dropped
    /// and every column gets a filter entry.
    pub fn from_state(state: GridState, routes: Box<dyn RouteResolver>) -> Self {
        let mut filters: IndexMap<String, String> = state
            .labels
            .keys()
            .map(|k| (k.clone(), String::new()))
            .collect();
        for (key, value) in state.filters {
            match filters.get_mut(&key) {
                Some(f) => *f = value,
                None => warn!("Dropping filter on unknown column '{key}'"),
            }
        }

        let mut model = Self {
            name: state.name,
            labels: state.labels,
            rows: Arc::new(state.tbldata),
            filters,
            matchers: Vec::new(),
            sort: SortState {
                sort_key: state.sort_key,
                reverse: state.reverse,
            },
            sort_mode: state.sort_mode,
            primary_key: state.primary_key,
            derived: Arc::new(Vec::new()),
            routes,
        };
        model.normalize_sort_key();
        model.rebuild_matchers();
        model.recompute();
        model
    }

    pub fn with_sort_mode(mut self, mode: SortMode) -> Self {
        self.sort_mode = mode;
        self.recompute();
        self
    }

    pub fn state(&self) -> GridState {
        GridState {
            name: self.name.clone(),
            labels: self.labels.clone(),
            tbldata: self.rows.as_ref().clone(),
            filters: self.filters.clone(),
            sort_key: self.sort.sort_key.clone(),
            reverse: self.sort.reverse,
            sort_mode: self.sort_mode,
            primary_key: self.primary_key.clone(),
        }
    }

    fn normalize_sort_key(&mut self) {
        let valid = match &self.sort.sort_key {
            Some(key) => self.labels.contains_key(key),
            None => self.labels.is_empty(),
        };
        if !valid {
            let fallback = self.labels.keys().next().cloned();
            warn!(
                "Sort key {:?} is not a column, falling back to {:?}",
                self.sort.sort_key, fallback
            );
            self.sort.sort_key = fallback;
            self.sort.reverse = false;
        }
    }

    /// Sort by `key`, sorting by the current key again reverses the order.
    pub fn sort(&mut self, key: &str) {
        if !self.labels.contains_key(key) {
            debug!("Ignoring sort on unknown column '{key}'");
            return;
        }
        if self.sort.sort_key.as_deref() == Some(key) {
            self.sort.reverse = !self.sort.reverse;
        } else {
            self.sort.sort_key = Some(key.to_string());
            self.sort.reverse = false;
        }
        trace!("Sort {:?}", self.sort);
        self.recompute();
    }

    pub fn set_filter(&mut self, key: &str, value: &str) {
        match self.filters.get_mut(key) {
            Some(f) => *f = value.to_string(),
            None => {
                debug!("Ignoring filter on unknown column '{key}'");
                return;
            }
        }
        self.rebuild_matchers();
        self.recompute();
    }

    pub fn clear_filters(&mut self) {
        self.filters.values_mut().for_each(String::clear);
        self.matchers.clear();
        self.recompute();
    }

    /// Resolves the location of `action` for the derived row at `row` and navigates there.
    ///
    /// Returns the location, or `None` if there is no such row or it has no primary key value.
    pub fn activate_row_action(
        &self,
        row: usize,
        action: ActionKind,
        navigator: &mut dyn Navigator,
    ) -> Result<Option<String>, GridError> {
        let Some(key) = self.derived_row(row).and_then(|r| r.key.as_deref()) else {
            debug!("No {} target for row {row}", action.name());
            return Ok(None);
        };
        let url = self.routes.resolve(action, key);
        navigator.navigate(&url)?;
        Ok(Some(url))
    }

    fn rebuild_matchers(&mut self) {
        self.matchers = self
            .filters
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.clone(), Matcher::new(value)))
            .collect();
    }

    fn recompute(&mut self) {
        let start_time = Instant::now();
        let rows = &self.rows;
        let matchers = &self.matchers;

        let mut derived: Vec<usize> = (0..rows.len())
            .filter(|&idx| {
                matchers
                    .iter()
                    .all(|(key, m)| m.is_match(rows[idx].get(key).unwrap_or("")))
            })
            .collect();

        // Stable sort, rows with equal cells keep their order. Reversing swaps the comparator so
        // that holds for descending order too.
        if let Some(key) = &self.sort.sort_key {
            let mode = self.sort_mode;
            let cell = |idx: &usize| rows[*idx].get(key).unwrap_or("");
            if self.sort.reverse {
                derived.sort_by(|a, b| compare_cells(mode, cell(b), cell(a)));
            } else {
                derived.sort_by(|a, b| compare_cells(mode, cell(a), cell(b)));
            }
        }

        trace!(
            "Derived {}/{} rows in {}us",
            derived.len(),
            rows.len(),
            start_time.elapsed().as_micros()
        );
        self.derived = Arc::new(derived);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn rows(&self) -> &[ViewRow] {
        &self.rows
    }

    pub fn filters(&self) -> &IndexMap<String, String> {
        &self.filters
    }

    pub fn filter(&self, key: &str) -> &str {
        self.filters.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Indices into [`GridModel::rows`] in display order.
    pub fn derived(&self) -> Arc<Vec<usize>> {
        Arc::clone(&self.derived)
    }

    pub fn derived_len(&self) -> usize {
        self.derived.len()
    }

    pub fn derived_row(&self, row: usize) -> Option<&ViewRow> {
        self.derived.get(row).map(|&idx| &self.rows[idx])
    }

    pub fn derived_rows(&self) -> impl Iterator<Item = &ViewRow> {
        self.derived.iter().map(|&idx| &self.rows[idx])
    }
}

// Currency and percent signs plus thousand separators, as written by the formatter.
const NUMBER_DECORATION: &[char] = &['$', '€', '£', '¥', '₹', '%', ','];

fn numeric_cell(cell: &str) -> Option<f64> {
    if !cell.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let cleaned: String = cell
        .trim()
        .chars()
        .filter(|c| !NUMBER_DECORATION.contains(c))
        .collect();
    cleaned.parse().ok()
}

fn compare_cells(mode: SortMode, a: &str, b: &str) -> Ordering {
    match mode {
        SortMode::Lexicographic => a.cmp(b),
        SortMode::Numeric => match (numeric_cell(a), numeric_cell(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less, // Numbers come first
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        },
    }
}

// ------------------------------ terminal host ------------------------------ //

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    FILTERINPUT,
}

/// Everything the ui needs to draw one frame.
pub struct UIData {
    pub name: String,
    pub headers: Vec<String>,
    pub filters: Vec<String>,
    pub widths: Vec<usize>,
    pub rows: Vec<Vec<String>>,
    pub nrows: usize,
    pub total_rows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub filter_input: Option<InputResult>,
    pub status_message: String,
    pub last_update: Instant,
}

/// Terminal host state around a [`GridModel`].
pub struct Model {
    grid: GridModel,
    config: GridConfig,
    navigator: Box<dyn Navigator>,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    curser_row: usize,
    offset_row: usize,
    curser_column: usize,
    height: usize,
    input: Inputter,
    filter_backup: Option<String>,
    status_message: String,
    last_update: Instant,
}

impl Model {
    pub fn init(
        grid: GridModel,
        config: &GridConfig,
        navigator: Box<dyn Navigator>,
        ui_height: usize,
    ) -> Self {
        let status_message = format!(
            "Loaded {} rows, {} columns. Press ? for help.",
            grid.rows().len(),
            grid.labels().len()
        );
        Self {
            grid,
            config: config.clone(),
            navigator,
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            curser_row: 0,
            offset_row: 0,
            curser_column: 0,
            height: Self::table_height(ui_height),
            input: Inputter::default(),
            filter_backup: None,
            status_message,
            last_update: Instant::now(),
        }
    }

    // Title, table border, header with filter row and status line
    fn table_height(ui_height: usize) -> usize {
        ui_height.saturating_sub(6).max(1)
    }

    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    /// Keys have to be forwarded as raw keys while a filter is edited.
    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::FILTERINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), GridError> {
        if let Some(msg) = message {
            trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MovePageUp => self.move_selection_up(self.height),
                    Message::MovePageDown => self.move_selection_down(self.height),
                    Message::MoveBeginning => self.move_selection_up(usize::MAX),
                    Message::MoveEnd => self.move_selection_down(usize::MAX),
                    Message::MoveLeft => self.move_column(-1),
                    Message::MoveRight => self.move_column(1),
                    Message::Enter | Message::Sort(None) => self.sort_current_column(),
                    Message::Sort(Some(key)) => self.grid.sort(&key),
                    Message::Filter => self.enter_filter_mode(),
                    Message::SetFilter(key, value) => self.grid.set_filter(&key, &value),
                    Message::ClearFilters => {
                        self.grid.clear_filters();
                        self.set_status_message("Cleared all filters");
                    }
                    Message::Action(action) => self.row_action(action),
                    Message::Resize(_, height) => self.ui_resize(height),
                    Message::Help => self.show_help(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(_, height) => self.ui_resize(height),
                    Message::Exit | Message::Help | Message::Enter => self.exit(),
                    _ => (),
                },
                Modus::FILTERINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(_, height) => self.ui_resize(height),
                    _ => (),
                },
            }
            self.clamp_selection();
        }

        self.last_update = Instant::now();
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn ui_resize(&mut self, height: usize) {
        trace!("UI was resized! h:{}", height);
        self.height = Self::table_height(height);
    }

    fn exit(&mut self) {
        if self.modus == Modus::POPUP {
            trace!("Close popup ...");
            self.modus = self.previous_modus;
            self.previous_modus = Modus::POPUP;
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn current_column(&self) -> Option<String> {
        self.grid.labels().keys().nth(self.curser_column).cloned()
    }

    fn sort_current_column(&mut self) {
        if let Some(key) = self.current_column() {
            self.grid.sort(&key);
            let direction = if self.grid.sort_state().reverse { "descending" } else { "ascending" };
            self.set_status_message(format!("Sorted by {} ({direction})", self.grid.labels()[&key]));
        }
    }

    fn enter_filter_mode(&mut self) {
        let Some(key) = self.current_column() else {
            return;
        };
        let current = self.grid.filter(&key).to_string();
        self.input.clear();
        self.input.set(&current);
        self.filter_backup = Some(current);
        self.previous_modus = self.modus;
        self.modus = Modus::FILTERINPUT;
    }

    // Every keystroke updates the filter, cancel restores the value the filter had before.
    fn raw_input(&mut self, key: ratatui::crossterm::event::KeyEvent) {
        let Some(column) = self.current_column() else {
            self.modus = Modus::TABLE;
            return;
        };
        let result = self.input.read(key);
        if result.canceled {
            let backup = self.filter_backup.take().unwrap_or_default();
            self.grid.set_filter(&column, &backup);
        } else {
            self.grid.set_filter(&column, &result.input);
        }

        if result.finished {
            self.modus = Modus::TABLE;
            self.previous_modus = Modus::FILTERINPUT;
            self.filter_backup = None;
            self.input.clear();
            self.set_status_message(format!(
                "{} of {} rows match",
                self.grid.derived_len(),
                self.grid.rows().len()
            ));
        }
    }

    fn row_action(&mut self, action: ActionKind) {
        if !self.config.action_column {
            return;
        }
        let row = self.offset_row + self.curser_row;
        match self.grid.activate_row_action(row, action, self.navigator.as_mut()) {
            Ok(Some(url)) => self.set_status_message(format!("Opened {url}")),
            Ok(None) => self.set_status_message(format!("Row has no {}", self.grid.primary_key())),
            Err(e) => {
                info!("Row action failed: {e}");
                self.set_status_message(e.to_string())
            }
        }
    }

    fn move_selection_up(&mut self, size: usize) {
        let abs = (self.offset_row + self.curser_row).saturating_sub(size);
        self.select_row(abs);
    }

    fn move_selection_down(&mut self, size: usize) {
        let abs = (self.offset_row + self.curser_row).saturating_add(size);
        self.select_row(abs);
    }

    fn select_row(&mut self, row: usize) {
        let row = row.min(self.grid.derived_len().saturating_sub(1));
        if row < self.offset_row {
            self.offset_row = row;
        } else if row >= self.offset_row + self.height {
            self.offset_row = row + 1 - self.height;
        }
        self.curser_row = row - self.offset_row;
    }

    fn move_column(&mut self, step: i32) {
        let ncolumns = self.grid.labels().len();
        if ncolumns == 0 {
            return;
        }
        self.curser_column = if step < 0 {
            self.curser_column.saturating_sub(1)
        } else {
            (self.curser_column + 1).min(ncolumns - 1)
        };
    }

    // Filtering can shrink the derived rows below the cursor.
    fn clamp_selection(&mut self) {
        let nrows = self.grid.derived_len();
        let abs = self.offset_row + self.curser_row;
        if nrows == 0 {
            self.offset_row = 0;
            self.curser_row = 0;
        } else if abs >= nrows {
            self.select_row(nrows - 1);
        }
        if self.offset_row + self.height > nrows && self.offset_row > 0 {
            let abs = self.offset_row + self.curser_row;
            self.offset_row = nrows.saturating_sub(self.height);
            self.curser_row = abs - self.offset_row;
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn visible_name(name: &str, width: usize) -> String {
        if name.chars().count() <= width {
            return name.to_string();
        }
        if width < 3 {
            return String::new();
        }
        let mut reduced: String = name.chars().take(width - 3).collect();
        reduced.push_str("...");
        reduced
    }

    pub fn get_uidata(&self) -> UIData {
        let grid = &self.grid;
        let sort = grid.sort_state();
        let max_width = self.config.max_column_width;

        let headers: Vec<String> = grid
            .labels()
            .iter()
            .map(|(key, label)| {
                if sort.sort_key.as_deref() == Some(key.as_str()) {
                    format!("{label} {}", if sort.reverse { "▼" } else { "▲" })
                } else {
                    label.clone()
                }
            })
            .collect();
        let filters: Vec<String> = grid.filters().values().cloned().collect();

        // Widths are computed over all rows so they do not jump while scrolling.
        let widths: Vec<usize> = grid
            .labels()
            .keys()
            .zip(headers.iter())
            .map(|(key, header)| {
                grid.rows()
                    .iter()
                    .map(|r| r.get(key).map(|c| c.chars().count()).unwrap_or(0))
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or(0)
                    .min(max_width)
                    .max(3)
            })
            .collect();

        let derived = grid.derived();
        let rend = std::cmp::min(self.offset_row + self.height, derived.len());
        let rows: Vec<Vec<String>> = derived[self.offset_row.min(rend)..rend]
            .iter()
            .map(|&idx| {
                let row = &grid.rows()[idx];
                grid.labels()
                    .keys()
                    .zip(widths.iter())
                    .map(|(key, &w)| Self::visible_name(row.get(key).unwrap_or(""), w))
                    .collect()
            })
            .collect();

        UIData {
            name: grid.name().to_string(),
            headers,
            filters,
            widths,
            rows,
            nrows: derived.len(),
            total_rows: grid.rows().len(),
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            abs_selected_row: self.offset_row + self.curser_row,
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            filter_input: (self.modus == Modus::FILTERINPUT).then(|| self.input.get()),
            status_message: self.status_message.clone(),
            last_update: self.last_update,
        }
    }
}
