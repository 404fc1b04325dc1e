//! Configuration validation utilities.
//!
//! Adapter and storage implementations receive their settings as raw TOML
//! tables. Each implementation describes the shape it expects with a
//! [`Schema`], which is checked before the implementation is built.

use alloy_primitives::{Address, U256};
use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// An integer value with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	/// A 20-byte hex address string.
	Address,
	/// A base-10 string holding a 256-bit unsigned amount.
	Amount,
}

/// A named field in a schema.
#[derive(Debug)]
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
		}
	}
}

/// Required and optional fields of a TOML table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	///
	/// Required fields must be present; optional fields are checked only when
	/// present.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| mismatch("root", "table", config))?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			validate_field_type(&field.name, value, &field.field_type)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				validate_field_type(&field.name, value, &field.field_type)?;
			}
		}

		Ok(())
	}
}

fn mismatch(field: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String => {
			value
				.as_str()
				.ok_or_else(|| mismatch(field_name, "string", value))?;
		},
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| mismatch(field_name, "integer", value))?;
			if min.is_some_and(|m| int_val < m) || max.is_some_and(|m| int_val > m) {
				return Err(ValidationError::InvalidValue {
					field: field_name.to_string(),
					message: format!("Value {} outside [{:?}, {:?}]", int_val, min, max),
				});
			}
		},
		FieldType::Address => {
			let s = value
				.as_str()
				.ok_or_else(|| mismatch(field_name, "address string", value))?;
			s.parse::<Address>()
				.map_err(|e| ValidationError::InvalidValue {
					field: field_name.to_string(),
					message: format!("Invalid address '{}': {}", s, e),
				})?;
		},
		FieldType::Amount => {
			let s = value
				.as_str()
				.ok_or_else(|| mismatch(field_name, "decimal string", value))?;
			U256::from_str_radix(s, 10).map_err(|e| ValidationError::InvalidValue {
				field: field_name.to_string(),
				message: format!("Invalid amount '{}': {}", s, e),
			})?;
		},
	}

	Ok(())
}

/// A configuration schema that can validate TOML values.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(s: &str) -> toml::Value {
		toml::Value::Table(toml::from_str::<toml::Table>(s).unwrap())
	}

	#[test]
	fn test_required_and_typed_fields() {
		let schema = Schema::new(
			vec![
				Field::new("target", FieldType::Address),
				Field::new("rate", FieldType::Amount),
			],
			vec![Field::new(
				"fee_bps",
				FieldType::Integer {
					min: Some(0),
					max: Some(10_000),
				},
			)],
		);

		let ok = parse(
			r#"
			target = "0x000000000000000000000000000000000000dEaD"
			rate = "2000000000000000000"
			fee_bps = 30
			"#,
		);
		assert!(schema.validate(&ok).is_ok());

		let missing = parse(r#"rate = "1""#);
		assert!(matches!(
			schema.validate(&missing),
			Err(ValidationError::MissingField(f)) if f == "target"
		));

		let bad_amount = parse(
			r#"
			target = "0x000000000000000000000000000000000000dEaD"
			rate = "-1"
			"#,
		);
		assert!(matches!(
			schema.validate(&bad_amount),
			Err(ValidationError::InvalidValue { .. })
		));

		let out_of_range = parse(
			r#"
			target = "0x000000000000000000000000000000000000dEaD"
			rate = "1"
			fee_bps = 20000
			"#,
		);
		assert!(schema.validate(&out_of_range).is_err());
	}
}
