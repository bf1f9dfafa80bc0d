use serde_json::json;
use std::fs;
use sticky::errors::ErrorKind;
use sticky::metadata::{FileSchemaVersion, SchemaVersionStore};
use sticky::migration::MigrationStatus;
use sticky::sticky::Sticky;
use sticky::store::EntityStoreProvider;
use sticky_int_test::test_util::{cleanup, create_test_context, run_test};

// ==================== Property Actions ====================

#[test]
fn test_rename_property_end_to_end() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity(
                "College",
                json!([{"name": "A", "rank": 1}, {"name": "B", "rank": 2}]),
            )?;

            let sticky = ctx.sticky();
            let outcomes = sticky.migrate(vec![ctx.migration(
                2,
                json!({"renameProperty": {"College": {"rank": "ranking"}}}),
            )])?;

            assert_eq!(outcomes.len(), 1);
            assert!(outcomes[0].is_applied());
            assert_eq!(
                ctx.read_entity("College")?,
                json!([{"name": "A", "ranking": 1}, {"name": "B", "ranking": 2}])
            );
            assert_eq!(sticky.schema_version()?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_remove_property_keeps_other_fields_in_order() {
    // "score": null is not a list of names, so that task is skipped
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity(
                "College",
                json!([
                    {"name": "A", "score": 10, "city": "X", "info": {"notes": "n", "rank": 1}},
                    {"name": "B", "city": "Y"}
                ]),
            )?;

            let outcomes = ctx.sticky().migrate(vec![ctx.migration(
                1,
                json!({"removeProperty": {
                    "College": {"score": null, "info": ["notes"]}
                }}),
            )])?;

            assert!(outcomes[0].is_applied(), "{}", outcomes[0]);
            let college = ctx.read_entity("College")?;
            assert_eq!(
                college,
                json!([
                    {"name": "A", "score": 10, "city": "X", "info": {"rank": 1}},
                    {"name": "B", "city": "Y"}
                ])
            );

            let keys = college[0]
                .as_object()
                .map(|record| record.keys().cloned().collect::<Vec<_>>())
                .unwrap_or_default();
            assert_eq!(keys, vec!["name", "score", "city", "info"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_new_property_nested_and_top_level() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity(
                "College",
                json!([{"name": "A", "address": {"city": "X"}}, {"name": "B"}]),
            )?;

            ctx.sticky().migrate(vec![ctx.migration(
                3,
                json!({"newProperty": {"College": {"founded": 1900, "address": {"zip": null}}}}),
            )])?;

            assert_eq!(
                ctx.read_entity("College")?,
                json!([
                    {"name": "A", "address": {"city": "X", "zip": null}, "founded": 1900},
                    {"name": "B", "founded": 1900}
                ])
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_tasks_of_one_file_compose() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity(
                "College",
                json!([{"name": "A", "rank": 1, "meta": {"tmp": true, "source": "import"}}]),
            )?;

            let outcomes = ctx.sticky().migrate(vec![ctx.migration(
                2,
                json!({
                    "renameProperty": {"College": {"rank": "ranking"}},
                    "newProperty": {"College": {"active": true}},
                    "removeProperty": {"College": {"meta": ["tmp"]}}
                }),
            )])?;

            match &outcomes[0].status {
                MigrationStatus::Applied {
                    entities_written,
                    entities_renamed,
                } => {
                    assert_eq!(*entities_written, 1);
                    assert_eq!(*entities_renamed, 0);
                }
                other => panic!("unexpected status {:?}", other),
            }
            assert_eq!(
                ctx.read_entity("College")?,
                json!([{"name": "A", "ranking": 1, "meta": {"source": "import"}, "active": true}])
            );
            Ok(())
        },
        cleanup,
    )
}

// ==================== Entity Rename ====================

#[test]
fn test_rename_entity_moves_file_unchanged() {
    run_test(
        create_test_context,
        |ctx| {
            let raw = "[ {\"name\" : \"Norway\"},\n  {\"name\": \"Chile\"} ]";
            ctx.write_entity_raw("Country", raw)?;

            let outcomes = ctx.sticky().migrate(vec![ctx.migration(
                4,
                json!({"renameEntity": {"Country": "Nation"}}),
            )])?;

            assert!(outcomes[0].is_applied());
            assert!(!ctx.entity_exists("Country"));
            assert_eq!(ctx.read_entity_bytes("Nation")?, raw.as_bytes());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_edit_then_rename_entity() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity("Country", json!([{"name": "Norway", "code": "NO"}]))?;

            ctx.sticky().migrate(vec![ctx.migration(
                2,
                json!({
                    "renameProperty": {"Country": {"code": "iso"}},
                    "renameEntity": {"Country": "Nation"}
                }),
            )])?;

            assert!(!ctx.entity_exists("Country"));
            assert_eq!(ctx.read_entity("Nation")?, json!([{"name": "Norway", "iso": "NO"}]));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_rename_entity_onto_existing_entity_fails() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity("Country", json!([{"name": "Norway"}]))?;
            ctx.write_entity("Nation", json!([{"name": "Chile"}]))?;

            let sticky = ctx.sticky();
            let outcomes = sticky.migrate(vec![ctx.migration(
                2,
                json!({"renameEntity": {"Country": "Nation"}}),
            )])?;

            assert_eq!(outcomes[0].error().map(|e| e.kind()), Some(&ErrorKind::IOFailure));
            assert_eq!(ctx.read_entity("Country")?, json!([{"name": "Norway"}]));
            assert_eq!(ctx.read_entity("Nation")?, json!([{"name": "Chile"}]));
            assert_eq!(sticky.schema_version()?, 0);
            Ok(())
        },
        cleanup,
    )
}

// ==================== Version Gate and Failures ====================

#[test]
fn test_same_version_is_a_no_op() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity("College", json!([{"name": "A", "rank": 1}]))?;
            let sticky = ctx.sticky();
            let body = json!({"newProperty": {"College": {"count": 1}}});

            sticky.migrate(vec![ctx.migration(2, body.clone())])?;
            let first = ctx.read_entity_bytes("College")?;

            let outcomes = sticky.migrate(vec![ctx.migration(2, body)])?;
            assert!(outcomes[0].is_skipped());
            assert_eq!(ctx.read_entity_bytes("College")?, first);
            assert_eq!(sticky.schema_version()?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unknown_action_does_not_advance() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity("College", json!([{"name": "A", "rank": 1}]))?;
            let before = ctx.read_entity_bytes("College")?;

            let sticky = ctx.sticky();
            let outcomes = sticky.migrate(vec![ctx.migration(
                2,
                json!({
                    "renameProperty": {"College": {"rank": "ranking"}},
                    "dropEverything": {"College": true}
                }),
            )])?;

            assert_eq!(
                outcomes[0].error().map(|e| e.kind()),
                Some(&ErrorKind::UnknownAction)
            );
            assert_eq!(ctx.read_entity_bytes("College")?, before);
            assert_eq!(sticky.schema_version()?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_missing_entity_abandons_file() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity("College", json!([{"name": "A", "rank": 1}]))?;
            let before = ctx.read_entity_bytes("College")?;

            let sticky = ctx.sticky();
            let outcomes = sticky.migrate(vec![ctx.migration(
                2,
                json!({
                    "renameProperty": {"College": {"rank": "ranking"}},
                    "newProperty": {"University": {"founded": 1900}}
                }),
            )])?;

            assert_eq!(
                outcomes[0].error().map(|e| e.kind()),
                Some(&ErrorKind::MissingEntityData)
            );
            assert_eq!(ctx.read_entity_bytes("College")?, before);
            assert!(!ctx.entity_exists("University"));
            assert_eq!(sticky.schema_version()?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_corrupted_entity_file_abandons_file() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity_raw("College", "{\"name\": \"not an array\"}")?;

            let sticky = ctx.sticky();
            let outcomes = sticky.migrate(vec![ctx.migration(
                1,
                json!({"newProperty": {"College": {"rank": 0}}}),
            )])?;

            assert_eq!(
                outcomes[0].error().map(|e| e.kind()),
                Some(&ErrorKind::MalformedFile)
            );
            assert_eq!(sticky.schema_version()?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failed_file_does_not_block_later_files() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity("College", json!([{"name": "A"}]))?;

            let sticky = ctx.sticky();
            let outcomes = sticky.migrate(vec![
                ctx.migration(3, json!({"newProperty": {"College": {"c": 3}}})),
                ctx.migration(2, json!({"newProperty": {"Missing": {"b": 2}}})),
                ctx.migration(1, json!({"newProperty": {"College": {"a": 1}}})),
            ])?;

            let versions = outcomes.iter().map(|o| o.version).collect::<Vec<_>>();
            assert_eq!(versions, vec![1, 2, 3]);
            assert!(outcomes[0].is_applied());
            assert!(outcomes[1].error().is_some());
            assert!(outcomes[2].is_applied());
            assert_eq!(ctx.read_entity("College")?, json!([{"name": "A", "a": 1, "c": 3}]));
            assert_eq!(sticky.schema_version()?, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_empty_body_advances_version() {
    run_test(
        create_test_context,
        |ctx| {
            let sticky = ctx.sticky();
            let outcomes = sticky.migrate(vec![ctx.migration(5, json!({}))])?;
            assert!(outcomes[0].is_applied());
            assert_eq!(sticky.schema_version()?, 5);
            Ok(())
        },
        cleanup,
    )
}

// ==================== Metadata ====================

#[test]
fn test_schema_version_is_persisted() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity("College", json!([]))?;
            ctx.sticky().migrate(vec![ctx.migration(
                7,
                json!({"newProperty": {"College": {"rank": 0}}}),
            )])?;

            let stored = FileSchemaVersion::new(ctx.metadata_path());
            assert_eq!(stored.get()?, 7);

            let metadata = stored.metadata()?.map(|m| (m.schema_version, m.create_time <= m.update_time));
            assert_eq!(metadata, Some((7, true)));

            let names = ctx.sticky().entity_store().entity_names()?;
            assert_eq!(names, vec!["College".to_string()]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_clear_removes_entities_only() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity("College", json!([{"name": "A"}]))?;
            ctx.write_entity("Country", json!([{"name": "Norway"}]))?;
            let sticky = ctx.sticky();
            sticky.migrate(vec![ctx.migration(1, json!({}))])?;

            sticky.clear()?;

            assert!(!ctx.entity_exists("College"));
            assert!(!ctx.entity_exists("Country"));
            assert!(ctx.metadata_path().is_file());
            assert_eq!(sticky.schema_version()?, 1);
            assert!(fs::read_dir(ctx.data_dir())?.count() == 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_clear_keeps_custom_metadata_file() {
    run_test(
        create_test_context,
        |ctx| {
            let dir = ctx.path().join("custom");
            let sticky = Sticky::builder()
                .storage_dir(&dir)
                .metadata_file(".schema.json")
                .open()?;

            fs::write(dir.join("College.json"), "[]")?;
            sticky.migrate(vec![ctx.migration(3, json!({"newProperty": {"College": {"a": 1}}}))])?;
            assert_eq!(sticky.entity_store().entity_names()?, vec!["College".to_string()]);

            sticky.clear()?;

            assert!(dir.join(".schema.json").is_file());
            assert!(!dir.join("College.json").exists());
            assert_eq!(sticky.schema_version()?, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_visible_metadata_file_is_refused() {
    let result = Sticky::builder()
        .storage_dir(std::env::temp_dir().join("sticky-unopened"))
        .metadata_file("schema.json")
        .open();
    match result {
        Ok(_) => panic!("a visible metadata file must be refused"),
        Err(err) => assert_eq!(err.kind(), &ErrorKind::ConfigError),
    }
}
