//! Integration tests for generic references on a polymorphic hierarchy
//!
//! The rewriting queryset sits on top of the inheritance layer, which sits on
//! top of the in-memory store. The last test swaps the two outer layers.

use crate::common::{Studio, studio};
use polyref_db::Value;
use polyref_db::contenttypes::stored_reference;
use polyref_db::kwargs;
use polyref_db::orm::{QueryLayer, Record};
use rstest::rstest;

fn seed(studio: &Studio) {
	studio
		.projects("Project")
		.create(kwargs! { "topic" => "Department Party", "owner" => &studio.group })
		.unwrap();
	studio
		.projects("ArtProject")
		.create(kwargs! {
			"topic" => "Painting with Tim",
			"artist" => "T. Turner",
			"owner" => &studio.user,
		})
		.unwrap();
	studio
		.projects("ResearchProject")
		.create(kwargs! {
			"topic" => "Swallow Aerodynamics",
			"supervisor" => "Dr. Winter",
			"owner" => &studio.group,
		})
		.unwrap();
	studio
		.projects("Thesis")
		.create(kwargs! {
			"topic" => "Coconuts",
			"supervisor" => "Dr. Winter",
			"owner" => &studio.user,
		})
		.unwrap();
}

fn topics(records: &[Record]) -> Vec<String> {
	records.iter().map(|r| r.get("topic").to_string()).collect()
}

/// Test that a child queryset stamps its type and writes both columns
#[rstest]
fn test_child_create_writes_reference(studio: Studio) {
	// Act
	let created = studio
		.projects("ArtProject")
		.create(kwargs! { "topic" => "Sculpture", "owner" => &studio.user })
		.unwrap();

	// Assert
	assert_eq!(created.model, "artproject");
	let artproject = studio.db.catalog().get("studio", "artproject").unwrap();
	assert_eq!(created.get("polymorphic_ctype"), &Value::Int(artproject.id.unwrap()));
	let schema = studio.db.schema("studio.project").unwrap();
	let reference = stored_reference(&studio.db, &schema, &created, "owner")
		.unwrap()
		.unwrap();
	assert_eq!(reference.content_type().model, "user");
	assert_eq!(reference.object_id(), studio.user.pk().unwrap());
}

/// Test filtering on the logical name from the base queryset
#[rstest]
fn test_base_filter_by_owner_returns_downcast_rows(studio: Studio) {
	// Arrange
	seed(&studio);

	// Act
	let owned = studio
		.projects("Project")
		.filter_kwargs(kwargs! { "owner" => &studio.user })
		.unwrap()
		.all()
		.unwrap();

	// Assert
	assert_eq!(topics(&owned), vec!["Coconuts", "Painting with Tim"]);
	let models: Vec<&str> = owned.iter().map(|r| r.model.as_str()).collect();
	assert_eq!(models, vec!["thesis", "artproject"]);
}

/// Test that a prefixed logical name is restricted to the named subtree
#[rstest]
fn test_prefixed_owner_is_restricted_to_subtree(studio: Studio) {
	// Arrange
	seed(&studio);

	// Act
	let research = studio
		.projects("Project")
		.filter_kwargs(kwargs! { "ResearchProject___owner" => &studio.user })
		.unwrap()
		.all()
		.unwrap();
	let grouped = studio
		.projects("Project")
		.filter_kwargs(kwargs! { "ResearchProject___owner__in" => vec![Value::from(&studio.group)] })
		.unwrap()
		.all()
		.unwrap();

	// Assert
	assert_eq!(topics(&research), vec!["Coconuts"]);
	assert_eq!(topics(&grouped), vec!["Swallow Aerodynamics"]);
}

/// Test that a child queryset only sees its own subtree
#[rstest]
fn test_child_queryset_scope(studio: Studio) {
	// Arrange
	seed(&studio);

	// Act
	let research = studio
		.projects("ResearchProject")
		.filter_kwargs(kwargs! { "owner__isnull" => false })
		.unwrap();

	// Assert
	assert_eq!(research.count().unwrap(), 2);
	let grouped = research
		.filter_kwargs(kwargs! { "owner" => &studio.group })
		.unwrap()
		.all()
		.unwrap();
	assert_eq!(topics(&grouped), vec!["Swallow Aerodynamics"]);
}

/// Test type narrowing combined with a reference filter
#[rstest]
fn test_instance_of_with_owner(studio: Studio) {
	// Arrange
	seed(&studio);
	let projects = studio.projects("Project");

	// Act
	let art_or_thesis = projects
		.instance_of(&["ArtProject", "Thesis"])
		.unwrap()
		.filter_kwargs(kwargs! { "owner" => &studio.user })
		.unwrap();
	let not_research = projects
		.not_instance_of(&["ResearchProject"])
		.unwrap()
		.filter_kwargs(kwargs! { "owner" => &studio.group })
		.unwrap()
		.all()
		.unwrap();

	// Assert
	assert_eq!(art_or_thesis.count().unwrap(), 2);
	assert_eq!(topics(&not_research), vec!["Department Party"]);
}

/// Test get_or_create through both layers
#[rstest]
fn test_get_or_create_on_child(studio: Studio) {
	// Arrange
	seed(&studio);
	let theses = studio.projects("Thesis");

	// Act
	let (found, created) = theses
		.get_or_create(kwargs! { "owner" => &studio.user }, kwargs! {})
		.unwrap();
	let (made, made_new) = theses
		.get_or_create(
			kwargs! { "owner" => &studio.group },
			kwargs! { "topic" => "Holy Grail", "supervisor" => "Dr. Winter" },
		)
		.unwrap();

	// Assert
	assert!(!created);
	assert_eq!(found.get("topic"), &Value::from("Coconuts"));
	assert!(made_new);
	assert_eq!(made.model, "thesis");
	assert_eq!(made.get("owner_id"), &Value::Int(studio.group.pk().unwrap()));
	assert_eq!(theses.count().unwrap(), 2);
}

/// Test that updating through a child only touches its subtree
#[rstest]
fn test_update_owner_on_child(studio: Studio) {
	// Arrange
	seed(&studio);

	// Act
	let updated = studio
		.projects("ResearchProject")
		.update(kwargs! { "owner" => Value::Null })
		.unwrap();

	// Assert
	assert_eq!(updated, 2);
	let orphans = studio
		.projects("Project")
		.filter_kwargs(kwargs! { "owner" => Value::Null })
		.unwrap()
		.all()
		.unwrap();
	assert_eq!(topics(&orphans), vec!["Coconuts", "Swallow Aerodynamics"]);
}

/// Test that the inheritance layer can also wrap the rewriting layer
#[rstest]
fn test_inheritance_layer_over_rewriter(studio: Studio) {
	// Arrange
	seed(&studio);

	// Act
	let research = studio
		.inherited("Project")
		.filter_kwargs(kwargs! { "ResearchProject___owner" => &studio.group })
		.unwrap()
		.all()
		.unwrap();
	let (thesis, created) = studio
		.inherited("Thesis")
		.update_or_create(
			kwargs! { "topic" => "Coconuts" },
			kwargs! { "owner" => &studio.group },
		)
		.unwrap();

	// Assert
	assert_eq!(topics(&research), vec!["Swallow Aerodynamics"]);
	assert!(!created);
	assert_eq!(thesis.model, "thesis");
	assert_eq!(thesis.get("owner_id"), &Value::Int(studio.group.pk().unwrap()));
}

fn assert_partial_defaults_are_cleared<L: QueryLayer>(projects: &L, user: &Record) {
	// Act
	let (kites, kites_created) = projects
		.get_or_create(kwargs! { "topic" => "Kites" }, kwargs! { "owner_id" => 5i64 })
		.unwrap();
	projects
		.create(kwargs! { "topic" => "Gliders", "owner" => user })
		.unwrap();
	let (gliders, gliders_created) = projects
		.update_or_create(
			kwargs! { "topic" => "Gliders" },
			kwargs! { "owner_id" => Value::Null },
		)
		.unwrap();

	// Assert
	assert!(kites_created);
	assert!(!gliders_created);
	let stored_kites = projects.get(vec![], kwargs! { "topic" => "Kites" }).unwrap();
	let stored_gliders = projects.get(vec![], kwargs! { "topic" => "Gliders" }).unwrap();
	for record in [&kites, &gliders, &stored_kites, &stored_gliders] {
		assert_eq!(record.get("owner_type"), &Value::Null);
		assert_eq!(record.get("owner_id"), &Value::Null);
	}
	assert_eq!(stored_gliders.model, "artproject");
}

/// Test that get_or_create and update_or_create never store half a pair
#[rstest]
fn test_partial_defaults_cleared_with_rewriter_outermost(studio: Studio) {
	assert_partial_defaults_are_cleared(&studio.projects("ArtProject"), &studio.user);
}

/// Test the same guarantee with the inheritance layer outermost
#[rstest]
fn test_partial_defaults_cleared_with_inheritance_outermost(studio: Studio) {
	assert_partial_defaults_are_cleared(&studio.inherited("ArtProject"), &studio.user);
}
