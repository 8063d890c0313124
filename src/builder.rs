use std::time::Instant;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::column::{ColumnSpec, ColumnValue, Derivation};
use crate::domain::GridError;
use crate::format::{Format, Formatter};
use crate::schema::{DataSource, Record, Schema};
use crate::value::Value;

/// Column key -> display label, in display order.
pub type Labels = IndexMap<String, String>;

/// Display ready projection of one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    /// Primary key value of the source record, used by the row actions.
    #[serde(default)]
    pub key: Option<String>,
    pub cells: IndexMap<String, String>,
}

impl ViewRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewModel {
    pub name: String,
    pub labels: Labels,
    pub rows: Vec<ViewRow>,
    pub sort_key: Option<String>,
    pub primary_key: String,
}

impl ViewModel {
    /// Empty filter for every column.
    pub fn filters(&self) -> IndexMap<String, String> {
        self.labels
            .keys()
            .map(|k| (k.clone(), String::new()))
            .collect()
    }
}

enum Accessor {
    Field(usize),
    Constant(Value),
    Derived(Derivation),
}

struct ResolvedColumn {
    attribute: String,
    format: Format,
    accessor: Accessor,
}

/// Builds the [`ViewModel`] of a grid from a data source and its column configuration.
pub struct ViewModelBuilder<'a> {
    formatter: &'a dyn Formatter,
    columns: Vec<ColumnSpec>,
    sort_key: Option<String>,
    primary_key: Option<String>,
}

impl<'a> ViewModelBuilder<'a> {
    pub fn new(formatter: &'a dyn Formatter) -> Self {
        Self {
            formatter,
            columns: Vec::new(),
            sort_key: None,
            primary_key: None,
        }
    }

    pub fn columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnSpec>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn column(mut self, column: impl Into<ColumnSpec>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn sort_key(mut self, key: Option<String>) -> Self {
        self.sort_key = key;
        self
    }

    pub fn primary_key(mut self, field: Option<String>) -> Self {
        self.primary_key = field;
        self
    }

    pub fn build(&self, source: &dyn DataSource) -> Result<ViewModel, GridError> {
        let start_time = Instant::now();
        let schema = source.schema();
        let records = source.records();

        let (labels, plan) = self.resolve(schema)?;
        let primary_key = self.resolve_primary_key(source)?;
        let key_idx = schema.index(&primary_key).ok_or_else(|| {
            GridError::config(format!("primary key '{primary_key}' is not a field of the data source"))
        })?;

        let rows = if plan.is_empty() {
            Vec::new()
        } else {
            records
                .iter()
                .map(|record| self.build_row(record, schema, &plan, key_idx))
                .collect::<Result<Vec<ViewRow>, GridError>>()?
        };

        let sort_key = match &self.sort_key {
            Some(key) if labels.contains_key(key) => Some(key.clone()),
            Some(key) => {
                warn!("Sort key '{key}' is not a grid column, using the first column");
                labels.keys().next().cloned()
            }
            None => labels.keys().next().cloned(),
        };

        info!(
            "Built view model with {} columns and {} rows in {}ms",
            labels.len(),
            rows.len(),
            start_time.elapsed().as_millis()
        );

        Ok(ViewModel {
            name: source.name().to_string(),
            labels,
            rows,
            sort_key,
            primary_key,
        })
    }

    // Labels are first wins: a later column with an already known attribute keeps the earlier label.
    fn resolve(&self, schema: &Schema) -> Result<(Labels, Vec<ResolvedColumn>), GridError> {
        let mut labels = Labels::new();
        let mut plan = Vec::with_capacity(self.columns.len());

        for (index, spec) in self.columns.iter().enumerate() {
            let (attribute, label, column) = match spec {
                ColumnSpec::Field(name) => {
                    let idx = field_index(schema, name)?;
                    let label = schema.label(name).unwrap_or_else(|| name.clone());
                    let column = ResolvedColumn {
                        attribute: name.clone(),
                        format: Format::Text,
                        accessor: Accessor::Field(idx),
                    };
                    (name.clone(), label, column)
                }
                ColumnSpec::Custom(def) => {
                    let attribute = def
                        .attribute
                        .clone()
                        .unwrap_or_else(|| format!("attribute{index}"));
                    let label = match &def.label {
                        Some(label) => label.clone(),
                        None => schema.label(&attribute).ok_or_else(|| {
                            GridError::config(format!(
                                "column {index} has no label and '{attribute}' is not a field of the data source"
                            ))
                        })?,
                    };
                    let format = match &def.format {
                        Some(name) => name.parse::<Format>()?,
                        None => Format::Text,
                    };
                    let accessor = match &def.value {
                        Some(ColumnValue::Field(name)) => Accessor::Field(field_index(schema, name)?),
                        Some(ColumnValue::Constant(v)) => Accessor::Constant(v.clone()),
                        Some(ColumnValue::Derived(f)) => Accessor::Derived(f.clone()),
                        None => Accessor::Field(field_index(schema, &attribute)?),
                    };
                    let column = ResolvedColumn {
                        attribute: attribute.clone(),
                        format,
                        accessor,
                    };
                    (attribute, label, column)
                }
            };

            if labels.contains_key(&attribute) {
                debug!("Column {index} repeats '{attribute}', keeping label '{}'", labels[&attribute]);
            } else {
                labels.insert(attribute, label);
            }
            plan.push(column);
        }

        trace!("Resolved labels {:?}", labels);
        Ok((labels, plan))
    }

    fn resolve_primary_key(&self, source: &dyn DataSource) -> Result<String, GridError> {
        if let Some(pk) = &self.primary_key {
            return Ok(pk.clone());
        }
        match source.primary_key() {
            Some(pk) => Ok(pk.to_string()),
            None if source.records().is_empty() => Err(GridError::config(
                "no primary key given and the data source has no rows to infer it from",
            )),
            None => Err(GridError::config(
                "no primary key given and the data source declares none",
            )),
        }
    }

    fn build_row(
        &self,
        record: &Record,
        schema: &Schema,
        plan: &[ResolvedColumn],
        key_idx: usize,
    ) -> Result<ViewRow, GridError> {
        let mut cells = IndexMap::with_capacity(plan.len());
        for column in plan {
            let cell = match &column.accessor {
                Accessor::Field(idx) => self.formatter.format(record.get(*idx), column.format)?,
                Accessor::Constant(v) => self.formatter.format(v, column.format)?,
                Accessor::Derived(f) => f(record, schema),
            };
            cells.insert(column.attribute.clone(), cell);
        }

        let key = match record.get(key_idx) {
            Value::Null => None,
            v => Some(v.to_string()),
        };
        Ok(ViewRow { key, cells })
    }
}

fn field_index(schema: &Schema, name: &str) -> Result<usize, GridError> {
    schema
        .index(name)
        .ok_or_else(|| GridError::config(format!("'{name}' is not a field of the data source")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDef;
    use crate::format::StdFormatter;
    use crate::schema::{FieldDef, MemorySource};

    fn products() -> MemorySource {
        let schema = Schema::new(vec![
            FieldDef::labeled("id", "ID"),
            FieldDef::labeled("name", "Name"),
            FieldDef::labeled("price", "Price"),
        ])
        .with_primary_key("id");
        MemorySource::new(schema)
            .with_row(vec![1.into(), "Bob".into(), 10.into()])
            .with_row(vec![2.into(), "Al".into(), 20.into()])
    }

    fn cells(row: &ViewRow) -> Vec<(&str, &str)> {
        row.cells
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn builds_labels_rows_and_defaults() {
        let formatter = StdFormatter::default();
        let vm = ViewModelBuilder::new(&formatter)
            .column("name")
            .column(ColumnDef::default().attribute("price").format("currency"))
            .build(&products())
            .unwrap();

        let labels: Vec<(&str, &str)> = vm
            .labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(labels, vec![("name", "Name"), ("price", "Price")]);
        assert_eq!(cells(&vm.rows[0]), vec![("name", "Bob"), ("price", "$10.00")]);
        assert_eq!(cells(&vm.rows[1]), vec![("name", "Al"), ("price", "$20.00")]);
        assert_eq!(vm.rows[1].key.as_deref(), Some("2"));
        assert_eq!(vm.sort_key.as_deref(), Some("name"));
        assert_eq!(vm.primary_key, "id");
        assert_eq!(vm.filters().get("price").map(String::as_str), Some(""));
    }

    #[test]
    fn first_label_wins_for_repeated_attribute() {
        let formatter = StdFormatter::default();
        let vm = ViewModelBuilder::new(&formatter)
            .column("price")
            .column(
                ColumnDef::default()
                    .attribute("price")
                    .label("Unit price")
                    .format("currency"),
            )
            .build(&products())
            .unwrap();

        assert_eq!(vm.labels.len(), 1);
        assert_eq!(vm.labels["price"], "Price");
        // the later column still provides the cell
        assert_eq!(vm.rows[0].get("price"), Some("$10.00"));
    }

    #[test]
    fn derived_and_constant_values() {
        let formatter = StdFormatter::default();
        let vm = ViewModelBuilder::new(&formatter)
            .column(
                ColumnDef::default()
                    .label("Half price")
                    .format("currency")
                    .value(ColumnValue::derived(|record, schema| {
                        let price = record
                            .field(schema, "price")
                            .and_then(Value::as_f64)
                            .unwrap_or_default();
                        (price / 2.0).to_string()
                    })),
            )
            .column(
                ColumnDef::default()
                    .attribute("vat")
                    .label("VAT")
                    .format("percent")
                    .value(ColumnValue::Constant(Value::Float(0.2))),
            )
            .build(&products())
            .unwrap();

        assert_eq!(vm.labels.keys().collect::<Vec<_>>(), vec!["attribute0", "vat"]);
        // derived values skip the formatter
        assert_eq!(vm.rows[0].get("attribute0"), Some("5"));
        assert_eq!(vm.rows[1].get("vat"), Some("20%"));
    }

    #[test]
    fn empty_columns_give_an_empty_table() {
        let formatter = StdFormatter::default();
        let vm = ViewModelBuilder::new(&formatter)
            .build(&products())
            .unwrap();
        assert!(vm.labels.is_empty());
        assert!(vm.rows.is_empty());
        assert_eq!(vm.sort_key, None);
    }

    #[test]
    fn unknown_attribute_is_a_configuration_error() {
        let formatter = StdFormatter::default();
        let err = ViewModelBuilder::new(&formatter)
            .column("weight")
            .build(&products())
            .unwrap_err();
        assert!(matches!(err, GridError::Configuration(_)));

        let err = ViewModelBuilder::new(&formatter)
            .column(ColumnDef::default().attribute("weight").label("Weight"))
            .build(&products())
            .unwrap_err();
        assert!(matches!(err, GridError::Configuration(_)));
    }

    #[test]
    fn unknown_format_is_propagated() {
        let formatter = StdFormatter::default();
        let err = ViewModelBuilder::new(&formatter)
            .column(ColumnDef::default().attribute("price").format("money"))
            .build(&products())
            .unwrap_err();
        assert!(matches!(err, GridError::Formatter { .. }));
    }

    #[test]
    fn primary_key_can_not_be_inferred_from_empty_source() {
        let formatter = StdFormatter::default();
        let empty = MemorySource::new(Schema::new(vec![FieldDef::new("name")]));
        let err = ViewModelBuilder::new(&formatter)
            .column("name")
            .build(&empty)
            .unwrap_err();
        assert!(matches!(err, GridError::Configuration(_)));

        let vm = ViewModelBuilder::new(&formatter)
            .column("name")
            .primary_key(Some("name".to_string()))
            .build(&empty)
            .unwrap();
        assert!(vm.rows.is_empty());
        assert_eq!(vm.labels["name"], "Name");
    }

    #[test]
    fn unknown_sort_key_falls_back_to_first_column() {
        let formatter = StdFormatter::default();
        let vm = ViewModelBuilder::new(&formatter)
            .columns(["name", "price"])
            .sort_key(Some("weight".to_string()))
            .build(&products())
            .unwrap();
        assert_eq!(vm.sort_key.as_deref(), Some("name"));
    }
}
