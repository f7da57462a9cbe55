//! The query layer contract shared by every queryset in the stack

use super::query::{Kwargs, Q};
use super::record::Record;
use super::schema::ModelSchema;
use super::sql::Dialect;
use crate::contenttypes::{ContentType, ContentTypeRegistry};
use crate::error::Result;
use std::sync::Arc;

/// One layer of a queryset stack
///
/// Layers compose by wrapping: each outer layer translates its arguments and
/// delegates to the layer it wraps. The innermost layer owns storage.
/// Querysets are immutable values; `filter` and friends return new ones.
pub trait QueryLayer: Clone + Sized {
	fn schema(&self) -> &Arc<ModelSchema>;

	fn content_types(&self) -> &Arc<ContentTypeRegistry>;

	/// Narrow by positional expressions and keyword conditions (ANDed)
	fn filter(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<Self>;

	/// Exclude rows matching the conjunction of the arguments
	fn exclude(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<Self>;

	/// The single matching row
	fn get(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<Record>;

	/// An unsaved row built from column assignments
	fn build(&self, kwargs: Kwargs) -> Result<Record>;

	/// Insert or update `record`, writing back the stored values
	fn save(&self, record: &mut Record) -> Result<()>;

	fn create(&self, kwargs: Kwargs) -> Result<Record> {
		let mut record = self.build(kwargs)?;
		self.save(&mut record)?;
		Ok(record)
	}

	/// Apply assignments to every matching row; returns the row count
	fn update(&self, kwargs: Kwargs) -> Result<usize>;

	/// Look a row up, creating it from the plain kwargs and `defaults`
	fn get_or_create(&self, kwargs: Kwargs, defaults: Kwargs) -> Result<(Record, bool)>;

	/// Look a row up and apply `defaults`, creating it when missing
	fn update_or_create(&self, kwargs: Kwargs, defaults: Kwargs) -> Result<(Record, bool)>;

	fn order_by(&self, fields: &[&str]) -> Result<Self>;

	fn all(&self) -> Result<Vec<Record>>;

	fn count(&self) -> Result<usize> {
		Ok(self.all()?.len())
	}

	fn first(&self) -> Result<Option<Record>> {
		Ok(self.all()?.into_iter().next())
	}

	fn exists(&self) -> Result<bool> {
		Ok(self.count()? > 0)
	}

	/// The SELECT this queryset stands for
	fn to_sql(&self, dialect: Dialect) -> String;

	fn filter_kwargs(&self, kwargs: Kwargs) -> Result<Self> {
		self.filter(Vec::new(), kwargs)
	}

	fn filter_q(&self, q: Q) -> Result<Self> {
		self.filter(vec![q], Kwargs::new())
	}
}

/// Paged row listing by content type, used by lookup endpoints
pub trait RowLister {
	/// Schema of the table storing rows of `content_type`, if registered
	fn schema_for(&self, content_type: &ContentType) -> Option<Arc<ModelSchema>>;

	/// Rows of `content_type` matching `q`, ordered, from `offset`
	///
	/// At most `limit` rows are returned.
	fn list_rows(
		&self,
		content_type: &ContentType,
		q: Q,
		ordering: &[String],
		offset: usize,
		limit: usize,
	) -> Result<Vec<Record>>;

	/// Number of rows of `content_type` matching `q`
	fn count_rows(&self, content_type: &ContentType, q: Q) -> Result<usize>;
}

/// Keys of `kwargs` usable as plain column assignments on creation
///
/// Lookup keys (anything containing `__`) are dropped; `defaults` win.
pub(crate) fn creation_params(kwargs: &Kwargs, defaults: Kwargs) -> Kwargs {
	let mut params: Kwargs = kwargs
		.iter()
		.filter(|(key, _)| !key.contains(super::query::LOOKUP_SEP))
		.map(|(key, value)| (key.clone(), value.clone()))
		.collect();
	params.extend(defaults);
	params
}
