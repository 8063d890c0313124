use std::sync::Arc;

use crate::value::Value;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub label: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
        }
    }

    pub fn labeled(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: Some(label.into()),
        }
    }
}

/// Ordered field declarations shared by all records of a data source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<FieldDef>,
    primary_key: Option<String>,
}

impl Schema {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self {
            fields,
            primary_key: None,
        }
    }

    pub fn with_primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = Some(field.into());
        self
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Accessor index of a field.
    pub fn index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index(name).is_some()
    }

    /// Display label of a field, falling back to its humanized name when none is declared.
    pub fn label(&self, name: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.label.clone().unwrap_or_else(|| humanize(&f.name)))
    }
}

/// Turns `unit_price` into `Unit Price`.
pub fn humanize(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c == ' ')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, idx: usize) -> &Value {
        self.values.get(idx).unwrap_or(&NULL)
    }

    /// Field lookup by name, for derivations that do not hold a resolved index.
    pub fn field<'a>(&'a self, schema: &Schema, name: &str) -> Option<&'a Value> {
        schema.index(name).map(|idx| self.get(idx))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The rows of the current page plus their schema.
pub trait DataSource {
    fn schema(&self) -> &Schema;
    fn records(&self) -> &[Record];

    fn primary_key(&self) -> Option<&str> {
        self.schema().primary_key()
    }

    fn name(&self) -> &str {
        "grid"
    }
}

/// Records held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    schema: Arc<Schema>,
    records: Vec<Record>,
}

impl MemorySource {
    pub fn new(schema: Schema) -> Self {
        Self {
            name: "grid".to_string(),
            schema: Arc::new(schema),
            records: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn push(&mut self, values: Vec<Value>) {
        self.records.push(Record::new(values));
    }

    pub fn with_row(mut self, values: Vec<Value>) -> Self {
        self.push(values);
        self
    }

    pub fn from_records(schema: Schema, records: Vec<Record>) -> Self {
        Self {
            name: "grid".to_string(),
            schema: Arc::new(schema),
            records,
        }
    }
}

impl DataSource for MemorySource {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn records(&self) -> &[Record] {
        &self.records
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            FieldDef::new("id"),
            FieldDef::labeled("name", "Product name"),
        ])
        .with_primary_key("id")
    }

    #[test]
    fn label_falls_back_to_humanized_name() {
        let s = schema();
        assert_eq!(s.label("id").as_deref(), Some("Id"));
        assert_eq!(s.label("name").as_deref(), Some("Product name"));
        assert_eq!(s.label("price"), None);
    }

    #[test]
    fn record_field_lookup() {
        let s = schema();
        let r = Record::new(vec![Value::Int(1), Value::from("Bob")]);
        assert_eq!(r.field(&s, "name"), Some(&Value::from("Bob")));
        assert_eq!(r.field(&s, "price"), None);
        assert_eq!(r.get(7), &Value::Null);
    }

    #[test]
    fn humanize_names() {
        assert_eq!(humanize("unit_price"), "Unit Price");
        assert_eq!(humanize("name"), "Name");
        assert_eq!(humanize("created-at"), "Created At");
    }
}
