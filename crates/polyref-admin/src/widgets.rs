//! Two-select widget: content type first, then the object

use crate::autocomplete::object_label;
use crate::choices::content_type_label;
use crate::error::AdminResult;
use polyref_conf::{AdminSettings, AutocompleteSettings};
use polyref_db::Value;
use polyref_db::contenttypes::ContentType;
use polyref_db::kwargs;
use polyref_db::orm::{Database, QueryLayer};
use serde::Serialize;

/// One `<option>` of a select
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
	pub value: String,
	pub label: String,
	pub selected: bool,
}

/// Serializable render context of a [`ReferenceWidget`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetContext {
	pub name: String,
	pub content_type_choices: Vec<SelectOption>,
	/// Prepopulated option of the object select, when the value resolves
	pub object_choice: Option<SelectOption>,
	pub autocomplete_url: String,
	pub show_app_label: bool,
}

pub const EMPTY_LABEL: &str = "---------";

/// Widget rendering a reference as two selects
#[derive(Debug, Clone)]
pub struct ReferenceWidget {
	choices: Vec<ContentType>,
	show_app_label: bool,
	autocomplete_url: String,
	search_fields: Vec<String>,
}

impl ReferenceWidget {
	pub fn new(choices: Vec<ContentType>, admin: &AdminSettings, autocomplete: &AutocompleteSettings) -> Self {
		Self {
			choices,
			show_app_label: admin.show_app_label,
			autocomplete_url: autocomplete.url.clone(),
			search_fields: autocomplete.search_fields.clone(),
		}
	}

	pub fn choices(&self) -> &[ContentType] {
		&self.choices
	}

	/// Split a value into `(content type id, object id)`
	///
	/// Accepts the pair and structure shapes; anything else is empty.
	///
	/// # Examples
	///
	/// ```
	/// use polyref_admin::ReferenceWidget;
	/// use polyref_db::Value;
	/// use polyref_db::contenttypes::ContentType;
	///
	/// let user = ContentType::new("auth", "user").with_id(4);
	/// assert_eq!(
	///     ReferenceWidget::decompress(&Value::structure(user, 9i64)),
	///     (Value::Int(4), Value::Int(9))
	/// );
	/// assert_eq!(ReferenceWidget::decompress(&Value::Null), (Value::Null, Value::Null));
	/// ```
	pub fn decompress(value: &Value) -> (Value, Value) {
		let (content_type, object_id) = match value {
			Value::Tuple(items) | Value::List(items) if items.len() >= 2 => {
				(items[0].clone(), items[1].clone())
			}
			Value::Map(map) => (
				map.get("content_type").cloned().unwrap_or(Value::Null),
				map.get("object_id").cloned().unwrap_or(Value::Null),
			),
			_ => (Value::Null, Value::Null),
		};
		let content_type = match content_type {
			Value::ContentType(ct) => ct.id.map(Value::Int).unwrap_or(Value::Null),
			other => other,
		};
		(content_type, object_id)
	}

	/// Build the render context for `value`
	///
	/// A current content type missing from the choices is appended so the
	/// stored value stays visible. Unresolvable values leave the object
	/// select empty.
	pub fn context(&self, db: &Database, name: &str, value: &Value) -> AdminResult<WidgetContext> {
		let (content_type, object_id) = Self::decompress(value);
		let selected_id = content_type.as_int();

		let mut content_types = self.choices.clone();
		if let Some(id) = selected_id
			&& !content_types.iter().any(|ct| ct.id == Some(id))
			&& let Some(current) = db.catalog().get_by_id(id)
		{
			content_types.push(current);
		}

		let mut content_type_choices = vec![SelectOption {
			value: String::new(),
			label: EMPTY_LABEL.to_string(),
			selected: selected_id.is_none(),
		}];
		content_type_choices.extend(content_types.iter().filter_map(|ct| {
			ct.id.map(|id| SelectOption {
				value: id.to_string(),
				label: content_type_label(db, ct, self.show_app_label),
				selected: Some(id) == selected_id,
			})
		}));

		let object_choice = match (selected_id, object_id.as_int()) {
			(Some(ct_id), Some(object_id)) => self.object_choice(db, ct_id, object_id)?,
			_ => None,
		};

		Ok(WidgetContext {
			name: name.to_string(),
			content_type_choices,
			object_choice,
			autocomplete_url: self.autocomplete_url.clone(),
			show_app_label: self.show_app_label,
		})
	}

	fn object_choice(&self, db: &Database, ct_id: i64, object_id: i64) -> AdminResult<Option<SelectOption>> {
		let Some(content_type) = db.catalog().get_by_id(ct_id) else {
			return Ok(None);
		};
		let Some(schema) = db.schema(&content_type.qualified_name()) else {
			return Ok(None);
		};
		let record = db
			.objects_for(&content_type)?
			.filter_kwargs(kwargs! { "pk" => object_id })?
			.first()?;
		Ok(record.map(|record| SelectOption {
			value: object_id.to_string(),
			label: object_label(&schema, &record, &self.search_fields),
			selected: true,
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use polyref_db::orm::{Column, ModelSchemaBuilder};
	use rstest::{fixture, rstest};

	struct Setup {
		db: Database,
		user: ContentType,
		group: ContentType,
	}

	#[fixture]
	fn setup() -> Setup {
		let db = Database::new();
		db.register(
			ModelSchemaBuilder::new("auth", "User")
				.column(Column::text("username"))
				.build()
				.unwrap(),
		);
		db.register(ModelSchemaBuilder::new("auth", "Group").build().unwrap());
		db.objects("auth.user")
			.unwrap()
			.create(kwargs! { "username" => "alice" })
			.unwrap();
		let user = db.catalog().get("auth", "user").unwrap();
		let group = db.catalog().get("auth", "group").unwrap();
		Setup { db, user, group }
	}

	fn widget(choices: Vec<ContentType>) -> ReferenceWidget {
		ReferenceWidget::new(choices, &AdminSettings::default(), &AutocompleteSettings::default())
	}

	#[rstest]
	#[case::pair(Value::pair(3i64, 8i64))]
	#[case::list(Value::List(vec![Value::Int(3), Value::Int(8)]))]
	#[case::structure(Value::structure(3i64, 8i64))]
	fn test_decompress_shapes(#[case] value: Value) {
		assert_eq!(
			ReferenceWidget::decompress(&value),
			(Value::Int(3), Value::Int(8))
		);
	}

	#[rstest]
	fn test_context_selects_current_value(setup: Setup) {
		let context = widget(vec![setup.user.clone()])
			.context(&setup.db, "owner__ref", &Value::pair(setup.user.clone(), 1i64))
			.unwrap();
		let labels: Vec<&str> = context
			.content_type_choices
			.iter()
			.map(|c| c.label.as_str())
			.collect();
		assert_eq!(labels, vec![EMPTY_LABEL, "auth | user"]);
		assert!(context.content_type_choices[1].selected);
		assert_eq!(
			context.object_choice,
			Some(SelectOption {
				value: "1".into(),
				label: "alice".into(),
				selected: true,
			})
		);
		assert_eq!(context.autocomplete_url, AutocompleteSettings::default().url);
	}

	#[rstest]
	fn test_context_appends_filtered_out_type(setup: Setup) {
		let context = widget(vec![setup.user.clone()])
			.context(&setup.db, "owner__ref", &Value::pair(setup.group.clone(), 5i64))
			.unwrap();
		assert_eq!(context.content_type_choices.len(), 3);
		assert_eq!(context.content_type_choices[2].label, "auth | group");
		assert!(context.content_type_choices[2].selected);
		assert_eq!(context.object_choice, None);
	}

	#[rstest]
	fn test_context_for_empty_value(setup: Setup) {
		let context = widget(vec![setup.user.clone(), setup.group.clone()])
			.context(&setup.db, "owner__ref", &Value::Null)
			.unwrap();
		assert!(context.content_type_choices[0].selected);
		assert!(context.content_type_choices[1..].iter().all(|c| !c.selected));
		let json = serde_json::to_value(&context).unwrap();
		assert_eq!(json["name"], "owner__ref");
		assert_eq!(json["object_choice"], serde_json::Value::Null);
	}
}
