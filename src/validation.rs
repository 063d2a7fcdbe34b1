// Input validation for expense payloads
// Explicit presence and type checks; every failing field is reported.

use crate::db::NewExpense;
use serde::Serialize;
use serde_json::Value;

/// A field that was present but carried the wrong kind of value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidField {
    pub field: String,
    pub message: String,
}

/// All problems found in one payload
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationErrors {
    pub missing: Vec<String>,
    pub invalid: Vec<InvalidField>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    fn add_missing(&mut self, field: &str) {
        self.missing.push(field.to_string());
    }

    fn add_invalid(&mut self, field: &str, message: &str) {
        self.invalid.push(InvalidField {
            field: field.to_string(),
            message: message.to_string(),
        });
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.missing.is_empty() {
            write!(f, "Missing required fields: {}", self.missing.join(", "))?;
            if !self.invalid.is_empty() {
                write!(f, "; ")?;
            }
        }
        if !self.invalid.is_empty() {
            let fields: Vec<&str> = self.invalid.iter().map(|e| e.field.as_str()).collect();
            write!(f, "Invalid fields: {}", fields.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate a JSON request body into a [`NewExpense`].
///
/// `amount` must be a finite number (zero is accepted), `category` and `date`
/// must be non-empty strings, `description` is optional and defaults to `""`.
pub fn expense_from_json(body: &Value) -> Result<NewExpense, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let Some(obj) = body.as_object() else {
        errors.add_invalid("body", "expected a JSON object");
        return Err(errors);
    };

    let amount = match obj.get("amount") {
        None | Some(Value::Null) => {
            errors.add_missing("amount");
            None
        }
        Some(v) => match v.as_f64() {
            Some(n) if n.is_finite() => Some(n),
            _ => {
                errors.add_invalid("amount", "must be a number");
                None
            }
        },
    };

    let category = required_text(obj.get("category"), "category", &mut errors);
    let date = required_text(obj.get("date"), "date", &mut errors);

    let description = match obj.get("description") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            errors.add_invalid("description", "must be a string");
            String::new()
        }
    };

    match (amount, category, date) {
        (Some(amount), Some(category), Some(date)) if errors.is_empty() => Ok(NewExpense {
            amount,
            category,
            description,
            date,
        }),
        _ => Err(errors),
    }
}

/// Validate loosely-typed fields (e.g. a CSV row) into a [`NewExpense`].
pub fn expense_from_fields(
    amount: Option<f64>,
    category: Option<String>,
    description: Option<String>,
    date: Option<String>,
) -> Result<NewExpense, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    match amount {
        None => errors.add_missing("amount"),
        Some(n) if !n.is_finite() => errors.add_invalid("amount", "must be a number"),
        Some(_) => {}
    }
    let category = category.filter(|s| !s.is_empty());
    if category.is_none() {
        errors.add_missing("category");
    }
    let date = date.filter(|s| !s.is_empty());
    if date.is_none() {
        errors.add_missing("date");
    }

    match (amount, category, date) {
        (Some(amount), Some(category), Some(date)) if errors.is_empty() => Ok(NewExpense {
            amount,
            category,
            description: description.unwrap_or_default(),
            date,
        }),
        _ => Err(errors),
    }
}

fn required_text(value: Option<&Value>, field: &str, errors: &mut ValidationErrors) -> Option<String> {
    match value {
        None | Some(Value::Null) => {
            errors.add_missing(field);
            None
        }
        Some(Value::String(s)) if s.is_empty() => {
            errors.add_missing(field);
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.add_invalid(field, "must be a string");
            None
        }
    }
}
