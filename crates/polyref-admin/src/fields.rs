//! Two-part form field for a generic reference

use crate::error::{AdminError, AdminResult};
use polyref_db::Value;
use polyref_db::contenttypes::ContentType;
use std::collections::HashMap;

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const PARTIAL_MESSAGE: &str =
	"Select content and object; it is not allowed to fill only one of the two.";
pub const INVALID_CHOICE_MESSAGE: &str =
	"Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_ID_MESSAGE: &str = "Enter a whole number.";

/// Form field made of a content type select and an object id
///
/// Raw sub-values come straight from submitted form data (strings or
/// numbers); cleaning yields the structure shape
/// `{content_type, object_id}` accepted by the normalizer.
#[derive(Debug, Clone)]
pub struct ReferenceFormField {
	pub name: String,
	pub label: Option<String>,
	pub required: bool,
	pub choices: Vec<ContentType>,
	pub error_messages: HashMap<String, String>,
}

impl ReferenceFormField {
	/// Create an optional field offering `choices`
	///
	/// # Examples
	///
	/// ```
	/// use polyref_admin::ReferenceFormField;
	/// use polyref_db::Value;
	/// use polyref_db::contenttypes::ContentType;
	/// use serde_json::json;
	///
	/// let user = ContentType::new("auth", "user").with_id(1);
	/// let field = ReferenceFormField::new("owner__ref", vec![user.clone()]);
	///
	/// let cleaned = field.clean(&[json!("1"), json!("7")]).unwrap();
	/// assert_eq!(cleaned, Value::structure(user, 7i64));
	/// ```
	pub fn new(name: impl Into<String>, choices: Vec<ContentType>) -> Self {
		let mut error_messages = HashMap::new();
		error_messages.insert("required".to_string(), REQUIRED_MESSAGE.to_string());
		error_messages.insert("partial".to_string(), PARTIAL_MESSAGE.to_string());
		error_messages.insert(
			"invalid_choice".to_string(),
			INVALID_CHOICE_MESSAGE.to_string(),
		);
		error_messages.insert("invalid_id".to_string(), INVALID_ID_MESSAGE.to_string());
		Self {
			name: name.into(),
			label: None,
			required: false,
			choices,
			error_messages,
		}
	}

	pub fn required(mut self, required: bool) -> Self {
		self.required = required;
		self
	}

	pub fn label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	pub fn error_message(mut self, error_type: impl Into<String>, message: impl Into<String>) -> Self {
		self.error_messages.insert(error_type.into(), message.into());
		self
	}

	fn error(&self, error_type: &str) -> AdminError {
		let message = self
			.error_messages
			.get(error_type)
			.cloned()
			.unwrap_or_else(|| REQUIRED_MESSAGE.to_string());
		AdminError::Validation(message)
	}

	/// Combine cleaned sub-values into the structure shape
	///
	/// Missing, blank or partial input compresses to a structure with both
	/// members null.
	pub fn compress(&self, parts: &[Value]) -> Value {
		match parts {
			[content_type, object_id, ..] if !is_blank(content_type) && !is_blank(object_id) => {
				Value::structure(content_type.clone(), object_id.clone())
			}
			_ => Value::structure(Value::Null, Value::Null),
		}
	}

	/// Validate raw sub-values and compress them
	///
	/// Partial input is rejected; empty input is rejected when required.
	pub fn clean(&self, raw: &[serde_json::Value]) -> AdminResult<Value> {
		let content_type = raw.first().and_then(blank_to_none);
		let object_id = raw.get(1).and_then(blank_to_none);
		let parts = match (content_type, object_id) {
			(None, None) if self.required => return Err(self.error("required")),
			(None, None) => return Ok(self.compress(&[])),
			(Some(_), None) | (None, Some(_)) => return Err(self.error("partial")),
			(Some(content_type), Some(object_id)) => [
				Value::ContentType(self.clean_content_type(content_type)?),
				Value::Int(self.clean_object_id(object_id)?),
			],
		};
		Ok(self.compress(&parts))
	}

	fn clean_content_type(&self, raw: &serde_json::Value) -> AdminResult<ContentType> {
		let id = parse_int(raw).ok_or_else(|| self.error("invalid_choice"))?;
		self.choices
			.iter()
			.find(|ct| ct.id == Some(id))
			.cloned()
			.ok_or_else(|| self.error("invalid_choice"))
	}

	fn clean_object_id(&self, raw: &serde_json::Value) -> AdminResult<i64> {
		parse_int(raw).ok_or_else(|| self.error("invalid_id"))
	}
}

fn is_blank(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::String(s) => s.trim().is_empty(),
		_ => false,
	}
}

fn blank_to_none(raw: &serde_json::Value) -> Option<&serde_json::Value> {
	match raw {
		serde_json::Value::Null => None,
		serde_json::Value::String(s) if s.trim().is_empty() => None,
		other => Some(other),
	}
}

fn parse_int(raw: &serde_json::Value) -> Option<i64> {
	match raw {
		serde_json::Value::Number(n) => n.as_i64(),
		serde_json::Value::String(s) => s.trim().parse().ok(),
		_ => None,
	}
}
