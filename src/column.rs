use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::GridError;
use crate::schema::{Record, Schema};
use crate::value::Value;

pub type Derivation = Arc<dyn Fn(&Record, &Schema) -> String + Send + Sync>;

/// Where the cell value of a column comes from.
#[derive(Clone)]
pub enum ColumnValue {
    /// Value of another field, run through the column format.
    Field(String),
    /// The same value on every row, run through the column format.
    Constant(Value),
    /// Computed from the whole record. The result is used as is, the column format is skipped.
    Derived(Derivation),
}

impl ColumnValue {
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&Record, &Schema) -> String + Send + Sync + 'static,
    {
        ColumnValue::Derived(Arc::new(f))
    }
}

impl fmt::Debug for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Field(name) => f.debug_tuple("Field").field(name).finish(),
            ColumnValue::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            ColumnValue::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ColumnDef {
    pub attribute: Option<String>,
    pub label: Option<String>,
    pub format: Option<String>,
    pub value: Option<ColumnValue>,
}

impl ColumnDef {
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn value(mut self, value: ColumnValue) -> Self {
        self.value = Some(value);
        self
    }
}

/// Configuration of one grid column.
#[derive(Debug, Clone)]
pub enum ColumnSpec {
    /// Plain field shown with its schema label and the text format.
    Field(String),
    Custom(ColumnDef),
}

impl ColumnSpec {
    pub fn field(name: impl Into<String>) -> Self {
        ColumnSpec::Field(name.into())
    }

    pub fn custom(def: ColumnDef) -> Self {
        ColumnSpec::Custom(def)
    }
}

impl From<&str> for ColumnSpec {
    fn from(name: &str) -> Self {
        ColumnSpec::Field(name.to_string())
    }
}

impl From<ColumnDef> for ColumnSpec {
    fn from(def: ColumnDef) -> Self {
        ColumnSpec::Custom(def)
    }
}

/// Parses the command line form `attribute[:format[:label]]`.
///
/// A bare name becomes [`ColumnSpec::Field`], anything with a format or a label becomes a
/// [`ColumnSpec::Custom`]. Empty parts are left undeclared, so `price::Unit price` only
/// overrides the label.
impl FromStr for ColumnSpec {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let attribute = parts.next().unwrap_or_default().trim();
        let format = parts.next().map(str::trim).filter(|f| !f.is_empty());
        let label = parts.next().map(str::trim).filter(|l| !l.is_empty());

        if attribute.is_empty() {
            return Err(GridError::config(format!("column '{s}' has no attribute")));
        }

        if format.is_none() && label.is_none() {
            return Ok(ColumnSpec::Field(attribute.to_string()));
        }

        let mut def = ColumnDef::default().attribute(attribute);
        if let Some(f) = format {
            def = def.format(f);
        }
        if let Some(l) = label {
            def = def.label(l);
        }
        Ok(ColumnSpec::Custom(def))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_field() {
        let spec: ColumnSpec = "name".parse().unwrap();
        assert!(matches!(spec, ColumnSpec::Field(ref n) if n == "name"));
    }

    #[test]
    fn parse_custom_column() {
        let spec: ColumnSpec = "price:currency:Unit price".parse().unwrap();
        let ColumnSpec::Custom(def) = spec else {
            panic!("expected custom column");
        };
        assert_eq!(def.attribute.as_deref(), Some("price"));
        assert_eq!(def.format.as_deref(), Some("currency"));
        assert_eq!(def.label.as_deref(), Some("Unit price"));
    }

    #[test]
    fn parse_label_only() {
        let spec: ColumnSpec = "price::Cost: gross".parse().unwrap();
        let ColumnSpec::Custom(def) = spec else {
            panic!("expected custom column");
        };
        assert_eq!(def.format, None);
        assert_eq!(def.label.as_deref(), Some("Cost: gross"));
    }

    #[test]
    fn parse_rejects_missing_attribute() {
        assert!(":currency".parse::<ColumnSpec>().is_err());
    }

    #[test]
    fn derived_value_debug() {
        let v = ColumnValue::derived(|_, _| "x".to_string());
        assert_eq!(format!("{v:?}"), "Derived(..)");
    }
}
