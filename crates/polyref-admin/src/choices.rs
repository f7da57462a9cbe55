//! Content type choices offered by reference form fields

use crate::error::AdminResult;
use polyref_db::contenttypes::{ContentType, ContentTypeRegistry, LimitChoicesTo};
use polyref_db::orm::Database;

/// Content types selectable under `limit`, in catalog order
///
/// The predicate is applied verbatim to the catalog. `None` allows every
/// registered content type.
///
/// # Examples
///
/// ```
/// use polyref_admin::apply_limit_choices;
/// use polyref_db::contenttypes::{ContentType, ContentTypeRegistry, LimitChoicesTo};
/// use polyref_db::kwargs;
///
/// let catalog = ContentTypeRegistry::new();
/// catalog.register(ContentType::new("auth", "user"));
/// catalog.register(ContentType::new("auth", "group"));
/// catalog.register(ContentType::new("blog", "post"));
///
/// let auth = apply_limit_choices(&catalog, Some(&kwargs! { "app_label" => "auth" }.into())).unwrap();
/// assert_eq!(auth.len(), 2);
/// assert_eq!(apply_limit_choices(&catalog, None).unwrap().len(), 3);
/// ```
pub fn apply_limit_choices(
	catalog: &ContentTypeRegistry,
	limit: Option<&LimitChoicesTo>,
) -> AdminResult<Vec<ContentType>> {
	Ok(match limit {
		Some(limit) => catalog.filter(limit)?,
		None => catalog.all(),
	})
}

/// Label of a content type choice
///
/// `app_label | model` when `show_app_label` is set, else the model's
/// verbose name when its schema is registered, else the model name.
pub fn content_type_label(db: &Database, content_type: &ContentType, show_app_label: bool) -> String {
	if show_app_label {
		return content_type.to_string();
	}
	db.schema(&content_type.qualified_name())
		.map(|schema| schema.verbose_name().to_string())
		.unwrap_or_else(|| content_type.model.clone())
}
