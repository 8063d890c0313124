use std::str::FromStr;

use crate::domain::GridError;
use crate::value::Value;

/// Named cell formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Text,
    Raw,
    Integer,
    Decimal,
    Currency,
    Percent,
    Boolean,
}

impl FromStr for Format {
    type Err = GridError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Format::Text),
            "raw" => Ok(Format::Raw),
            "integer" => Ok(Format::Integer),
            "decimal" => Ok(Format::Decimal),
            "currency" => Ok(Format::Currency),
            "percent" => Ok(Format::Percent),
            "boolean" => Ok(Format::Boolean),
            _ => Err(GridError::Formatter {
                format: name.to_string(),
                reason: "unknown format".to_string(),
            }),
        }
    }
}

impl Format {
    pub fn name(&self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Raw => "raw",
            Format::Integer => "integer",
            Format::Decimal => "decimal",
            Format::Currency => "currency",
            Format::Percent => "percent",
            Format::Boolean => "boolean",
        }
    }
}

/// Turns raw values into display strings.
pub trait Formatter {
    fn format(&self, value: &Value, format: Format) -> Result<String, GridError>;
}

#[derive(Debug, Clone)]
pub struct StdFormatter {
    pub currency_symbol: String,
    pub decimals: usize,
    pub thousand_separator: char,
    pub null_display: String,
    pub boolean_display: (String, String),
}

impl Default for StdFormatter {
    fn default() -> Self {
        Self {
            currency_symbol: "$".to_string(),
            decimals: 2,
            thousand_separator: ',',
            null_display: "(not set)".to_string(),
            boolean_display: ("No".to_string(), "Yes".to_string()),
        }
    }
}

impl StdFormatter {
    pub fn with_currency_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.currency_symbol = symbol.into();
        self
    }

    fn numeric(value: &Value, format: Format) -> Result<f64, GridError> {
        value.as_f64().ok_or_else(|| GridError::Formatter {
            format: format.name().to_string(),
            reason: format!("'{value}' is not a numeric value"),
        })
    }

    fn grouped(&self, x: f64, decimals: usize) -> String {
        let fixed = format!("{:.*}", decimals, x.abs());
        let (int_part, frac_part) = match fixed.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (fixed.as_str(), None),
        };

        let mut out = String::with_capacity(fixed.len() + int_part.len() / 3);
        for (pos, c) in int_part.chars().enumerate() {
            if pos > 0 && (int_part.len() - pos) % 3 == 0 {
                out.push(self.thousand_separator);
            }
            out.push(c);
        }
        if let Some(f) = frac_part {
            out.push('.');
            out.push_str(f);
        }
        // Avoid "-0.00"
        if x < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
            out.insert(0, '-');
        }
        out
    }

    fn truthy(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        }
    }
}

impl Formatter for StdFormatter {
    fn format(&self, value: &Value, format: Format) -> Result<String, GridError> {
        if value.is_null() {
            return Ok(self.null_display.clone());
        }
        let formatted = match format {
            Format::Text | Format::Raw => value.to_string(),
            Format::Integer => self.grouped(Self::numeric(value, format)?.trunc(), 0),
            Format::Decimal => self.grouped(Self::numeric(value, format)?, self.decimals),
            Format::Currency => {
                let x = Self::numeric(value, format)?;
                let amount = self.grouped(x, self.decimals);
                match amount.strip_prefix('-') {
                    Some(positive) => format!("-{}{}", self.currency_symbol, positive),
                    None => format!("{}{}", self.currency_symbol, amount),
                }
            }
            Format::Percent => format!("{}%", self.grouped(Self::numeric(value, format)? * 100.0, 0)),
            Format::Boolean => {
                let (no, yes) = &self.boolean_display;
                if Self::truthy(value) { yes.clone() } else { no.clone() }
            }
        };
        Ok(formatted)
    }
}
