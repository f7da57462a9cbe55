//! Autocomplete endpoint listing rows of a content type
//!
//! `GET <url>?ct=<id>&q=<text>&page=<n>` answers
//! `{"results": [{"id": .., "text": ..}], "more": bool}`.

use crate::error::{AdminError, AdminResult};
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Request, Response, StatusCode};
use polyref_conf::AutocompleteSettings;
use polyref_db::Value;
use polyref_db::contenttypes::{ContentType, ContentTypeRegistry};
use polyref_db::orm::{ColumnKind, ModelSchema, Q, Record, RowLister};
use serde::{Deserialize, Serialize};

/// Authentication state of the caller
///
/// Stored in request extensions by whatever authenticates the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminUser {
	pub is_authenticated: bool,
	pub is_active: bool,
	pub is_staff: bool,
}

impl AdminUser {
	/// An authenticated, active staff member
	pub fn staff() -> Self {
		Self {
			is_authenticated: true,
			is_active: true,
			is_staff: true,
		}
	}

	pub fn anonymous() -> Self {
		Self::default()
	}

	pub fn can_use_admin(&self) -> bool {
		self.is_authenticated && self.is_active && self.is_staff
	}
}

/// Query string parameters, all optional and kept raw until validated
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AutocompleteQuery {
	pub ct: Option<String>,
	pub q: Option<String>,
	pub page: Option<String>,
}

impl AutocompleteQuery {
	/// Parse a URL query string
	///
	/// # Examples
	///
	/// ```
	/// use polyref_admin::AutocompleteQuery;
	///
	/// let query = AutocompleteQuery::parse(Some("ct=3&q=ali%20ce")).unwrap();
	/// assert_eq!(query.ct.as_deref(), Some("3"));
	/// assert_eq!(query.q.as_deref(), Some("ali ce"));
	/// assert_eq!(query.page, None);
	/// ```
	pub fn parse(query: Option<&str>) -> AdminResult<Self> {
		match query {
			Some(query) => serde_urlencoded::from_str(query)
				.map_err(|e| AdminError::Validation(format!("Malformed query string: {}", e))),
			None => Ok(Self::default()),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutocompleteItem {
	pub id: i64,
	pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutocompleteResponse {
	pub results: Vec<AutocompleteItem>,
	pub more: bool,
}

/// Display label of a row
///
/// The first non-empty text column among `search_fields`, else
/// `<Model> #<pk>`.
pub fn object_label(schema: &ModelSchema, record: &Record, search_fields: &[String]) -> String {
	search_fields
		.iter()
		.filter(|field| {
			schema
				.column_for(field)
				.is_some_and(|column| matches!(column.kind, ColumnKind::Text { .. }))
		})
		.find_map(|field| match record.get(field) {
			Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
			_ => None,
		})
		.unwrap_or_else(|| format!("{} #{}", schema.object_name(), record.get(schema.pk_field())))
}

/// The autocomplete view over some row source
pub struct Autocomplete<'a, R: RowLister> {
	rows: &'a R,
	catalog: &'a ContentTypeRegistry,
	settings: &'a AutocompleteSettings,
}

impl<'a, R: RowLister> Autocomplete<'a, R> {
	pub fn new(rows: &'a R, catalog: &'a ContentTypeRegistry, settings: &'a AutocompleteSettings) -> Self {
		Self {
			rows,
			catalog,
			settings,
		}
	}

	fn content_type(&self, raw: Option<&str>) -> AdminResult<ContentType> {
		let raw = raw
			.map(str::trim)
			.filter(|raw| !raw.is_empty())
			.ok_or_else(|| AdminError::NotFound("Missing content type".to_string()))?;
		raw.parse::<i64>()
			.ok()
			.and_then(|id| self.catalog.get_by_id(id))
			.ok_or_else(|| AdminError::NotFound("Invalid content type".to_string()))
	}

	/// OR of the search clauses for `text`; match-nothing when no field applies
	fn search_condition(&self, schema: &ModelSchema, text: &str) -> Q {
		let fields: Vec<&String> = self
			.settings
			.search_fields
			.iter()
			.filter(|field| schema.column_for(field).is_some())
			.collect();
		if text.is_empty() || fields.is_empty() {
			return Q::new();
		}
		let mut condition = Q::new();
		for field in fields {
			if field == "id" {
				if let Ok(id) = text.parse::<i64>()
					&& text.chars().all(|c| c.is_ascii_digit())
				{
					condition = condition | Q::leaf(field.as_str(), id);
				}
			} else {
				condition = condition | Q::leaf(format!("{}__icontains", field), text);
			}
		}
		if condition.is_empty() {
			Q::leaf("pk__in", Vec::<Value>::new())
		} else {
			condition
		}
	}

	/// Answer a request from `user`
	pub fn search(&self, user: &AdminUser, query: &AutocompleteQuery) -> AdminResult<AutocompleteResponse> {
		if !user.can_use_admin() {
			return Err(AdminError::PermissionDenied(
				"Staff member login required".to_string(),
			));
		}
		let content_type = self.content_type(query.ct.as_deref())?;
		let Some(schema) = self.rows.schema_for(&content_type) else {
			tracing::debug!(content_type = %content_type, "no table registered for content type");
			return Ok(AutocompleteResponse::default());
		};

		let condition = self.search_condition(&schema, query.q.as_deref().unwrap_or(""));
		let ordering: Vec<String> = if schema.ordering().is_empty() {
			vec!["pk".to_string()]
		} else {
			schema.ordering().to_vec()
		};

		let page_size = self.settings.page_size.max(1);
		let total = self.rows.count_rows(&content_type, condition.clone())?;
		let num_pages = total.div_ceil(page_size).max(1);
		let page = match query.page.as_deref().map(|p| p.trim().parse::<i64>()) {
			None | Some(Err(_)) => 1,
			Some(Ok(n)) if n >= 1 && (n as usize) <= num_pages => n as usize,
			Some(Ok(_)) => num_pages,
		};

		let records = self.rows.list_rows(
			&content_type,
			condition,
			&ordering,
			(page - 1) * page_size,
			page_size,
		)?;
		tracing::debug!(
			content_type = %content_type,
			total,
			page,
			returned = records.len(),
			"autocomplete lookup"
		);

		let results = records
			.iter()
			.filter_map(|record| {
				record.pk().map(|id| AutocompleteItem {
					id,
					text: object_label(&schema, record, &self.settings.search_fields),
				})
			})
			.collect();
		Ok(AutocompleteResponse {
			results,
			more: page < num_pages,
		})
	}

	/// Serve an HTTP request
	///
	/// The caller is read from the request's [`AdminUser`] extension and is
	/// anonymous when absent. Errors become JSON `{"detail": ..}` bodies.
	pub fn handle<B>(&self, request: &Request<B>) -> Response<String> {
		let user = request
			.extensions()
			.get::<AdminUser>()
			.copied()
			.unwrap_or_default();
		let result = AutocompleteQuery::parse(request.uri().query())
			.and_then(|query| self.search(&user, &query));
		match result {
			Ok(response) => match serde_json::to_string(&response) {
				Ok(body) => json_response(StatusCode::OK, body),
				Err(e) => {
					tracing::error!(error = %e, "failed to serialize autocomplete response");
					json_response(
						StatusCode::INTERNAL_SERVER_ERROR,
						r#"{"detail":"Serialization failed"}"#.to_string(),
					)
				}
			},
			Err(error) => {
				if let AdminError::Database(inner) = &error {
					tracing::error!(error = %inner, "autocomplete lookup failed");
				}
				let body = serde_json::json!({ "detail": error.public_message() }).to_string();
				json_response(error.status(), body)
			}
		}
	}
}

fn json_response(status: StatusCode, body: String) -> Response<String> {
	let mut response = Response::new(body);
	*response.status_mut() = status;
	response
		.headers_mut()
		.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	response
}
