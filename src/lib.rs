//! Sortable, filterable data grid.
//!
//! A [`builder::ViewModelBuilder`] turns the records of a [`schema::DataSource`] into display
//! ready rows once, a [`model::GridModel`] keeps filters and sorting over them live. The grid is
//! presented either as HTML with an embedded client script ([`html::GridWidget`]) or in the
//! terminal ([`ui::TableUI`]).

pub mod builder;
pub mod column;
pub mod controller;
pub mod domain;
pub mod format;
pub mod html;
pub mod inputter;
pub mod model;
pub mod route;
pub mod schema;
pub mod source;
pub mod ui;
pub mod value;

pub use builder::{Labels, ViewModel, ViewModelBuilder, ViewRow};
pub use column::{ColumnDef, ColumnSpec, ColumnValue};
pub use domain::{GridConfig, GridError, Message};
pub use format::{Format, Formatter, StdFormatter};
pub use model::{GridModel, GridState, SortMode, SortState};
pub use route::{ActionKind, Navigator, RouteResolver, TemplateRoutes};
pub use schema::{DataSource, FieldDef, MemorySource, Record, Schema};
pub use value::Value;
