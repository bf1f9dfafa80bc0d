use serde_json::json;
use std::fs;
use sticky::errors::ErrorKind;
use sticky::migration::{discover_migrations, MigrationFile};
use sticky::sticky::Sticky;
use sticky_int_test::test_util::{cleanup, create_test_context, random_path, run_test};

#[test]
fn test_migrate_pending_runs_in_version_order() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity("College", json!([{"name": "A", "rank": 1}]))?;
            ctx.write_migration(
                "v10_rename_entity.json",
                json!({"renameEntity": {"College": "University"}}),
            )?;
            ctx.write_migration("2.json", json!({"renameProperty": {"College": {"rank": "ranking"}}}))?;
            ctx.write_migration("v3-add-founded.json", json!({"newProperty": {"College": {"founded": 1900}}}))?;
            ctx.write_migration("notes.json", json!({"newProperty": {"College": {"bad": true}}}))?;
            ctx.write_migration(".4.json", json!({"newProperty": {"College": {"hidden": true}}}))?;
            fs::write(ctx.migration_dir().join("5.txt"), "not a migration")?;

            let sticky = ctx.sticky();
            let outcomes = sticky.migrate_pending()?;

            let versions = outcomes.iter().map(|o| o.version).collect::<Vec<_>>();
            assert_eq!(versions, vec![2, 3, 10]);
            assert!(outcomes.iter().all(|o| o.is_applied()));

            assert!(!ctx.entity_exists("College"));
            assert_eq!(
                ctx.read_entity("University")?,
                json!([{"name": "A", "ranking": 1, "founded": 1900}])
            );
            assert_eq!(sticky.schema_version()?, 10);

            let again = sticky.migrate_pending()?;
            assert!(again.iter().all(|o| o.is_skipped()));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_duplicate_versions_run_once() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity("College", json!([{"name": "A"}]))?;
            ctx.write_migration("2_a.json", json!({"newProperty": {"College": {"a": 1}}}))?;
            ctx.write_migration("2_b.json", json!({"newProperty": {"College": {"b": 1}}}))?;

            let outcomes = ctx.sticky().migrate_pending()?;

            assert_eq!(outcomes.len(), 2);
            assert!(outcomes[0].is_applied());
            assert!(outcomes[1].is_skipped());
            assert_eq!(ctx.read_entity("College")?, json!([{"name": "A", "a": 1}]));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_malformed_migration_file() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity("College", json!([{"name": "A"}]))?;
            fs::write(ctx.migration_dir().join("1.json"), "{ not json")?;
            ctx.write_migration("2.json", json!({"newProperty": {"College": {"b": 2}}}))?;

            let sticky = ctx.sticky();
            let outcomes = sticky.migrate_pending()?;

            assert_eq!(
                outcomes[0].error().map(|e| e.kind()),
                Some(&ErrorKind::MalformedFile)
            );
            assert!(outcomes[1].is_applied());
            assert_eq!(sticky.schema_version()?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_missing_migration_directory() {
    run_test(
        create_test_context,
        |ctx| {
            fs::remove_dir_all(ctx.migration_dir())?;
            let err = match ctx.sticky().migrate_pending() {
                Ok(_) => panic!("listing a removed directory must fail"),
                Err(err) => err,
            };
            assert_eq!(err.kind(), &ErrorKind::IOFailure);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_migration_file_from_path() {
    let dir = random_path();
    fs::create_dir_all(&dir).unwrap();

    let path = dir.join("v7_cleanup.json");
    fs::write(&path, r#"{"removeProperty": {"College": {"info": ["x"]}}}"#).unwrap();

    let file = MigrationFile::from_path(&path).unwrap();
    assert_eq!(file.version, 7);
    assert!(file.load().is_ok());

    let found = discover_migrations(&dir).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].version, 7);

    let err = MigrationFile::from_path(dir.join("cleanup.json")).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::MalformedFile);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_reopen_keeps_schema_version() {
    run_test(
        create_test_context,
        |ctx| {
            ctx.write_entity("College", json!([]))?;
            ctx.sticky()
                .migrate(vec![ctx.migration(4, json!({"newProperty": {"College": {"x": 1}}}))])?;

            let reopened = Sticky::builder().storage_dir(ctx.data_dir()).open()?;
            assert_eq!(reopened.schema_version()?, 4);
            assert!(!reopened.needs_migration(4)?);
            assert!(reopened.needs_migration(5)?);
            Ok(())
        },
        cleanup,
    )
}
