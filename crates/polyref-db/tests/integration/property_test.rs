//! Behavioural properties of reference rewriting that hold for any data

use crate::common::{Vault, vault};
use polyref_db::Value;
use polyref_db::contenttypes::{Normalizer, Rewriter};
use polyref_db::kwargs;
use polyref_db::orm::{QueryLayer, Record};
use rstest::rstest;

/// Populate one credential per user, one for the group and two without owner
fn populate(vault: &Vault) -> Vec<Record> {
	let credentials = vault.credentials();
	let mut owners: Vec<Record> = vault.db.objects("auth.user").unwrap().all().unwrap();
	owners.push(vault.group.clone());
	for (i, owner) in owners.iter().enumerate() {
		credentials
			.create(kwargs! { "label" => format!("cred-{}", i), "owner" => owner })
			.unwrap();
	}
	credentials.create(kwargs! { "label" => "spare-a" }).unwrap();
	credentials.create(kwargs! { "label" => "spare-b" }).unwrap();
	owners
}

/// Test that an equality filter on any row selects exactly the rows
/// storing that row's normalized pair
#[rstest]
fn test_equality_matches_normalized_pair(vault: Vault) {
	// Arrange
	let owners = populate(&vault);
	let normalizer = Normalizer::new(vault.db.catalog());
	let credentials = vault.credentials();
	let every_row = credentials.all().unwrap();

	for owner in &owners {
		// Act
		let reference = normalizer
			.normalize(&Value::from(owner))
			.unwrap()
			.unwrap();
		let matched = credentials
			.filter_kwargs(kwargs! { "owner" => owner })
			.unwrap()
			.all()
			.unwrap();

		// Assert
		let expected: Vec<&Record> = every_row
			.iter()
			.filter(|r| {
				r.get("owner_type") == &Value::Int(reference.content_type_id())
					&& r.get("owner_id") == &Value::Int(reference.object_id())
			})
			.collect();
		assert_eq!(matched.len(), 1);
		assert_eq!(matched.iter().collect::<Vec<_>>(), expected);
	}
}

/// Test that equality with None is the both-null condition
#[rstest]
fn test_equality_with_none_is_both_null(vault: Vault) {
	// Arrange
	populate(&vault);
	let credentials = vault.credentials();

	// Act
	let by_none = credentials
		.filter_kwargs(kwargs! { "owner" => Value::Null })
		.unwrap()
		.all()
		.unwrap();
	let by_columns = vault
		.db
		.objects("vault.credential")
		.unwrap()
		.filter_kwargs(kwargs! { "owner_type__isnull" => true, "owner_id__isnull" => true })
		.unwrap()
		.all()
		.unwrap();

	// Assert
	assert_eq!(by_none.len(), 2);
	assert_eq!(by_none, by_columns);
}

/// Test that an empty `in` matches nothing regardless of table contents
#[rstest]
#[case::empty_table(false)]
#[case::populated_table(true)]
fn test_empty_in_matches_nothing(vault: Vault, #[case] populated: bool) {
	// Arrange
	if populated {
		populate(&vault);
	}

	// Act
	let credentials = vault.credentials();
	let plain = credentials
		.filter_kwargs(kwargs! { "owner__in" => Vec::<Value>::new() })
		.unwrap();
	let combined = credentials
		.filter_kwargs(kwargs! { "owner__in" => Vec::<Value>::new(), "label__startswith" => "cred" })
		.unwrap();

	// Assert
	assert_eq!(plain.count().unwrap(), 0);
	assert_eq!(combined.count().unwrap(), 0);
}

/// Test that write payloads never keep a logical key
#[rstest]
#[case::instance(true, false)]
#[case::pair(false, false)]
#[case::empty(false, true)]
fn test_payload_replaces_logical_key(vault: Vault, #[case] instance: bool, #[case] empty: bool) {
	// Arrange
	let rewriter = Rewriter::new(&vault.credential, vault.db.catalog());
	let value = match (instance, empty) {
		(_, true) => Value::Null,
		(true, _) => Value::from(&vault.user),
		(false, _) => Value::pair(vault.user_type_id(), 7i64),
	};

	// Act
	let payload = rewriter
		.rewrite_payload(kwargs! { "label" => "x", "owner" => value })
		.unwrap();

	// Assert
	let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
	assert_eq!(keys, vec!["label", "owner_type", "owner_id"]);
	assert_eq!(payload["owner_type"].is_null(), empty);
	assert_eq!(payload["owner_id"].is_null(), empty);
}

/// Test that saving a half-set pair clears both columns
#[rstest]
#[case::type_only("owner_id")]
#[case::id_only("owner_type")]
fn test_save_clears_partial_pair(vault: Vault, #[case] cleared: &str) {
	// Arrange
	let credentials = vault.credentials();
	let mut record = credentials
		.create(kwargs! { "label" => "ssh", "owner" => &vault.user })
		.unwrap();
	record.set(cleared, Value::Null);

	// Act
	credentials.save(&mut record).unwrap();

	// Assert
	let stored = credentials
		.get(vec![], kwargs! { "pk" => record.pk().unwrap() })
		.unwrap();
	assert_eq!(stored.get("owner_type"), &Value::Null);
	assert_eq!(stored.get("owner_id"), &Value::Null);
}
