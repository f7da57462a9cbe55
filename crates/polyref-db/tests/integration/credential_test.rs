//! Integration tests for the credential ownership scenario
//!
//! `Credential.owner` is a generic reference limited to `auth.user`. Tests
//! drive it through the rewriting queryset and inspect both the rewritten
//! expression and the stored rows.

use crate::common::{Vault, vault};
use polyref_db::contenttypes::{Rewriter, fetch_reference};
use polyref_db::kwargs;
use polyref_db::orm::{Connector, Dialect, Q, QChild, QueryLayer};
use polyref_db::{Error, Value};
use rstest::rstest;

fn pair(type_id: i64, object_id: i64) -> Q {
	let mut q = Q::new();
	q.push_leaf("owner_type", type_id);
	q.push_leaf("owner_id", object_id);
	q
}

fn both_null() -> Q {
	let mut q = Q::new();
	q.push_leaf("owner_type__isnull", true);
	q.push_leaf("owner_id__isnull", true);
	q
}

/// Test that equality on the logical name becomes equality on both columns
#[rstest]
fn test_filter_by_owner_rewrites_to_pair(vault: Vault) {
	// Arrange
	let rewriter = Rewriter::new(&vault.credential, vault.db.catalog());

	// Act
	let (q, rest) = rewriter
		.rewrite_filters(kwargs! { "owner" => &vault.user })
		.unwrap();

	// Assert
	assert!(rest.is_empty());
	assert_eq!(vault.user.pk(), Some(7));
	assert_eq!(
		q.children(),
		&[QChild::Node(pair(vault.user_type_id(), 7))]
	);
}

/// Test that `in` with a row and None becomes an OR of pair and both-null
#[rstest]
fn test_filter_by_owner_in_with_none(vault: Vault) {
	// Arrange
	let rewriter = Rewriter::new(&vault.credential, vault.db.catalog());
	let mut expected = Q::with_connector(Connector::Or);
	expected.push_node(pair(vault.user_type_id(), 7));
	expected.push_node(both_null());

	// Act
	let (q, _) = rewriter
		.rewrite_filters(kwargs! { "owner__in" => vec![Value::from(&vault.user), Value::Null] })
		.unwrap();

	// Assert
	assert_eq!(q.children(), &[QChild::Node(expected)]);
}

/// Test that create persists the physical columns next to plain fields
#[rstest]
fn test_create_persists_physical_columns(vault: Vault) {
	// Arrange
	let credentials = vault.credentials();

	// Act
	let created = credentials
		.create(kwargs! { "owner" => &vault.user, "label" => "x" })
		.unwrap();

	// Assert
	let stored = credentials
		.get(vec![], kwargs! { "pk" => created.pk().unwrap() })
		.unwrap();
	assert_eq!(stored.get("owner_type"), &Value::Int(vault.user_type_id()));
	assert_eq!(stored.get("owner_id"), &Value::Int(7));
	assert_eq!(stored.get("label"), &Value::from("x"));
	assert!(!stored.values.contains_key("owner"));
}

/// Test that unsupported lookups name both the lookup and the field
#[rstest]
fn test_unsupported_lookup_is_not_implemented(vault: Vault) {
	// Act
	let err = vault
		.credentials()
		.filter_kwargs(kwargs! { "owner__bogus" => 1i64 })
		.unwrap_err();

	// Assert
	assert_eq!(
		err,
		Error::NotImplemented {
			lookup: "bogus".into(),
			field: "owner".into(),
		}
	);
	let message = err.to_string();
	assert!(message.contains("bogus"));
	assert!(message.contains("owner"));
}

/// Test the filters end to end against stored rows
#[rstest]
fn test_filters_select_expected_rows(vault: Vault) {
	// Arrange
	let credentials = vault.credentials();
	credentials
		.create(kwargs! { "label" => "ssh", "owner" => &vault.user })
		.unwrap();
	credentials
		.create(kwargs! { "label" => "gpg", "owner" => Value::pair(vault.user_type_id(), 1i64) })
		.unwrap();
	credentials.create(kwargs! { "label" => "vpn" }).unwrap();

	// Act
	let labels = |kwargs| -> Vec<String> {
		credentials
			.filter_kwargs(kwargs)
			.unwrap()
			.all()
			.unwrap()
			.iter()
			.map(|r| r.get("label").to_string())
			.collect()
	};

	// Assert
	assert_eq!(labels(kwargs! { "owner" => &vault.user }), vec!["ssh"]);
	assert_eq!(
		labels(kwargs! { "owner__in" => vec![Value::from(&vault.user), Value::Null] }),
		vec!["ssh", "vpn"]
	);
	assert_eq!(labels(kwargs! { "owner__isnull" => false }), vec!["gpg", "ssh"]);
	assert_eq!(labels(kwargs! { "owner" => Value::Null }), vec!["vpn"]);
	assert!(labels(kwargs! { "owner__in" => Vec::<Value>::new() }).is_empty());
}

/// Test that the group row is a valid reference target once stored
///
/// The type restriction only constrains choices offered to editors; the
/// query layer stores whatever pair it is given.
#[rstest]
fn test_reference_to_other_type_is_stored(vault: Vault) {
	// Arrange
	let credentials = vault.credentials();

	// Act
	let created = credentials
		.create(kwargs! { "label" => "team", "owner" => &vault.group })
		.unwrap();

	// Assert
	let owner = fetch_reference(&vault.db, &vault.credential, &created, "owner")
		.unwrap()
		.unwrap();
	assert_eq!(owner.label(), "auth.group");
	assert_eq!(owner.get("name"), &Value::from("admins"));
}

/// Test that excluding a reference keeps rows with other or no owners
#[rstest]
fn test_exclude_owner(vault: Vault) {
	// Arrange
	let credentials = vault.credentials();
	credentials
		.create(kwargs! { "label" => "ssh", "owner" => &vault.user })
		.unwrap();
	credentials
		.create(kwargs! { "label" => "team", "owner" => &vault.group })
		.unwrap();

	// Act
	let others = credentials
		.exclude(vec![], kwargs! { "owner" => &vault.user })
		.unwrap()
		.all()
		.unwrap();

	// Assert
	assert_eq!(others.len(), 1);
	assert_eq!(others[0].get("label"), &Value::from("team"));
}

/// Test that mixed expressions keep their boolean structure
#[rstest]
fn test_negated_expression_argument(vault: Vault) {
	// Arrange
	let credentials = vault.credentials();
	credentials
		.create(kwargs! { "label" => "ssh", "owner" => &vault.user })
		.unwrap();
	credentials
		.create(kwargs! { "label" => "team", "owner" => &vault.group })
		.unwrap();
	credentials.create(kwargs! { "label" => "vpn" }).unwrap();

	// Act
	let found = credentials
		.filter(
			vec![!(Q::leaf("owner", &vault.user) | Q::leaf("label", "vpn"))],
			kwargs! {},
		)
		.unwrap()
		.all()
		.unwrap();

	// Assert
	assert_eq!(found.len(), 1);
	assert_eq!(found[0].get("label"), &Value::from("team"));
}

/// Test that rendered SQL only mentions physical columns
#[rstest]
#[case::postgres(Dialect::Postgres, r#""owner_type""#)]
#[case::mysql(Dialect::MySql, "`owner_type`")]
#[case::sqlite(Dialect::Sqlite, r#""owner_type""#)]
fn test_sql_uses_physical_columns(vault: Vault, #[case] dialect: Dialect, #[case] column: &str) {
	// Act
	let sql = vault
		.credentials()
		.filter_kwargs(kwargs! { "owner__in" => vec![Value::from(&vault.user), Value::Null] })
		.unwrap()
		.to_sql(dialect);

	// Assert
	assert!(sql.contains(column), "{}", sql);
	assert!(sql.contains("IS NULL"), "{}", sql);
	assert!(sql.contains(" OR "), "{}", sql);
}
