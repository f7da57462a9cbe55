//! Field lists and fieldsets for forms editing generic references

use crate::adapter::ReferenceFormAdapter;
use polyref_db::orm::ColumnKind;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fieldset {
	pub title: Option<String>,
	pub fields: Vec<String>,
}

impl Fieldset {
	pub fn new(title: Option<&str>, fields: &[&str]) -> Self {
		Self {
			title: title.map(str::to_string),
			fields: fields.iter().map(|f| f.to_string()).collect(),
		}
	}
}

/// Replaces reference columns with their surrogate form fields
#[derive(Debug, Clone, Copy)]
pub struct InlineLayout<'a> {
	adapter: &'a ReferenceFormAdapter,
}

impl<'a> InlineLayout<'a> {
	pub fn new(adapter: &'a ReferenceFormAdapter) -> Self {
		Self { adapter }
	}

	/// Names hidden from forms: logical names and both physical columns
	fn hidden(&self) -> HashSet<String> {
		self.adapter
			.specs()
			.iter()
			.flat_map(|spec| {
				[
					spec.name.clone(),
					spec.type_column.clone(),
					spec.id_column.clone(),
				]
			})
			.collect()
	}

	/// Editable non-reference columns, in schema order
	pub fn fields(&self) -> Vec<String> {
		let mut excluded = self.hidden();
		excluded.extend(self.adapter.surrogates());
		self.adapter
			.schema()
			.columns()
			.filter(|column| column.editable && !matches!(column.kind, ColumnKind::AutoId))
			.filter(|column| !excluded.contains(&column.name))
			.map(|column| column.name.clone())
			.collect()
	}

	/// Rewrite `fieldsets` so references appear once, as surrogates
	///
	/// Logical names and physical columns are dropped from every fieldset.
	/// Surrogates not already listed go to the front of the first fieldset,
	/// which is created when none is given.
	///
	/// # Examples
	///
	/// ```
	/// use polyref_admin::{Fieldset, InlineLayout, ReferenceFormAdapter};
	/// use polyref_conf::AdminSettings;
	/// use polyref_db::contenttypes::GenericReferenceField;
	/// use polyref_db::orm::{Column, Database, ModelSchemaBuilder};
	///
	/// let db = Database::new();
	/// let schema = db.register(
	///     ModelSchemaBuilder::new("vault", "Credential")
	///         .column(Column::text("label"))
	///         .generic_reference(GenericReferenceField::new("owner"))
	///         .build()
	///         .unwrap(),
	/// );
	/// let adapter = ReferenceFormAdapter::new(schema, db.catalog().clone(), &AdminSettings::default());
	/// let layout = InlineLayout::new(&adapter);
	///
	/// let fieldsets = layout.fieldsets(vec![Fieldset::new(None, &["label", "owner_type", "owner_id"])]);
	/// assert_eq!(fieldsets[0].fields, vec!["owner__ref", "label"]);
	/// ```
	pub fn fieldsets(&self, fieldsets: Vec<Fieldset>) -> Vec<Fieldset> {
		let hidden = self.hidden();
		let mut fieldsets: Vec<Fieldset> = fieldsets
			.into_iter()
			.map(|mut fieldset| {
				fieldset.fields.retain(|field| !hidden.contains(field));
				fieldset
			})
			.collect();
		if fieldsets.is_empty() {
			fieldsets.push(Fieldset {
				title: None,
				fields: self.fields(),
			});
		}

		let listed: HashSet<String> = fieldsets
			.iter()
			.flat_map(|fieldset| fieldset.fields.iter().cloned())
			.collect();
		let mut missing: Vec<String> = self
			.adapter
			.surrogates()
			.into_iter()
			.filter(|surrogate| !listed.contains(surrogate))
			.collect();
		if let Some(first) = fieldsets.first_mut() {
			missing.append(&mut first.fields);
			first.fields = missing;
		}
		fieldsets
	}
}
