mod common;

use std::sync::{Arc, Mutex};

use asupersync::runtime::RuntimeBuilder;
use common::{MockConnection, expect_err, unwrap_outcome, user_schema};
use pglize::prelude::*;

fn user_model(conn: &MockConnection, options: ModelOptions) -> ModelType {
    Pglize::new(conn.clone()).create_model("User", user_schema(), options)
}

type Events = Arc<Mutex<Vec<(&'static str, bool)>>>;

fn as_hook<F>(hook: F) -> F
where
    F: for<'a> Fn(&'a mut Instance) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    hook
}

/// A hook that logs its stage and whether the instance was saved at the time.
fn recorder(
    events: &Events,
    stage: &'static str,
) -> impl for<'a> Fn(&'a mut Instance) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static {
    let events = Arc::clone(events);
    as_hook(move |user| {
        let events = Arc::clone(&events);
        Box::pin(async move {
            events.lock().unwrap().push((stage, user.is_saved()));
            Ok(())
        })
    })
}

fn credit(record: &Record) -> Option<i64> {
    record.get("credit").and_then(Value::as_i64)
}

#[test]
fn save_inserts_every_visible_field_and_marks_saved() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let model = user_model(&conn, ModelOptions::new());

        let mut user = model.build(
            Record::new()
                .with("email", "bonjovi@mail.com")
                .with("nickname", "jb"),
        );
        assert!(!user.is_saved());
        unwrap_outcome(user.save(&cx).await);

        assert!(user.is_saved());
        assert_eq!(user.get("id"), Some(&Value::Int(1)));
        assert_eq!(user.selfie().get("id"), user.get("id"));
        assert_eq!(user.get("nickname"), None);

        let log = conn.log();
        assert_eq!(log.len(), 1);
        assert_eq!(
            log[0].0,
            "INSERT INTO user (\"email\", \"credit\") VALUES ($1, $2) RETURNING *"
        );
        assert_eq!(
            log[0].1,
            vec![Value::from("bonjovi@mail.com"), Value::Int(100)]
        );
        assert_eq!(conn.rows("user").len(), 1);
    });
}

#[test]
fn save_rejects_failed_custom_check_without_touching_the_database() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let model = user_model(&conn, ModelOptions::new());

        let mut user = model.build(Record::new().with("credit", 99));
        let err = expect_err(user.save(&cx).await);
        let Error::Validation(err) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(err.name(), "ValidationError");
        assert_eq!(err.custom_validation(), vec!["credit"]);
        assert_eq!(err.required_validation(), vec!["email"]);
        assert!(err.attr().contains(&"credit"));
        assert!(err.attr().contains(&"email"));

        assert!(conn.log().is_empty());
        assert!(!user.is_saved());
    });
}

#[test]
fn pre_save_changes_persist_and_post_save_changes_stay_local() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let options = ModelOptions::new()
            .pre_save(|user| {
                Box::pin(async move {
                    let current = user.get("credit").and_then(Value::as_i64).unwrap_or(0);
                    user.set("credit", current + 10);
                    Ok(())
                })
            })
            .post_save(|user| {
                Box::pin(async move {
                    user.set("credit", 5000);
                    Ok(())
                })
            });
        let model = user_model(&conn, options);

        let mut user = model.build(Record::new().with("email", "a@x.io"));
        unwrap_outcome(user.save(&cx).await);

        assert_eq!(credit(user.fields()), Some(5000));
        assert_eq!(credit(user.selfie()), Some(110));
        assert_eq!(credit(&conn.rows("user")[0]), Some(110));
    });
}

#[test]
fn hooks_run_around_each_operation_in_order() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let events: Events = Arc::default();

        let record = |stage: &'static str| recorder(&events, stage);
        let pre_update_events = Arc::clone(&events);
        let options = ModelOptions::new()
            .pre_save(record("pre_save"))
            .post_save(record("post_save"))
            .pre_update(move |user, _updates| {
                let events = Arc::clone(&pre_update_events);
                Box::pin(async move {
                    events.lock().unwrap().push(("pre_update", user.is_saved()));
                    Ok(())
                })
            })
            .post_update(record("post_update"))
            .pre_delete(record("pre_delete"))
            .post_delete(record("post_delete"));
        let model = user_model(&conn, options);

        let mut user = model.build(Record::new().with("email", "a@x.io"));
        unwrap_outcome(user.save(&cx).await);
        unwrap_outcome(user.update(&cx, Record::new().with("credit", 200)).await);
        unwrap_outcome(user.delete(&cx, DeleteOptions::default()).await);

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                ("pre_save", false),
                ("post_save", true),
                ("pre_update", true),
                ("post_update", true),
                ("pre_delete", true),
                ("post_delete", false),
            ]
        );
        assert_eq!(conn.statements().len(), 3);
    });
}

#[test]
fn failing_pre_save_hook_aborts_the_save() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let options = ModelOptions::new().pre_save(|_| {
            Box::pin(async { Err(Error::Custom("credit check unavailable".to_string())) })
        });
        let model = user_model(&conn, options);

        let mut user = model.build(Record::new().with("email", "a@x.io"));
        let err = expect_err(user.save(&cx).await);
        assert!(matches!(err, Error::Custom(ref m) if m == "credit check unavailable"));
        assert!(conn.log().is_empty());
    });
}

#[test]
fn timestamps_are_stamped_on_save() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let model = user_model(&conn, ModelOptions::new().timestamps(true));

        let mut user = model.build(Record::new().with("email", "a@x.io"));
        unwrap_outcome(user.save(&cx).await);

        let created = user.get("createdAt").cloned();
        assert!(matches!(created, Some(Value::TimestampTz(_))));
        assert_eq!(user.get("updatedAt").cloned(), created);
        assert!(conn.statements()[0].contains("\"createdAt\", \"updatedAt\""));
    });
}

#[test]
fn update_and_delete_require_a_saved_instance() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let model = user_model(&conn, ModelOptions::new());
        let mut user = model.build(Record::new().with("email", "a@x.io"));

        for err in [
            expect_err(user.update(&cx, Record::new().with("credit", 300)).await),
            expect_err(user.delete(&cx, DeleteOptions::default()).await),
        ] {
            let Error::Instance(err) = err else {
                panic!("expected InstanceError, got {err:?}");
            };
            assert_eq!(err.name(), "InstanceError");
            assert_eq!(err.message(), "This instance has not been saved yet");
        }
        assert!(conn.log().is_empty());
    });
}

#[test]
fn update_writes_sanitized_fields_and_merges_the_row() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let model = user_model(&conn, ModelOptions::new());
        let mut user = model.build(Record::new().with("email", "a@x.io"));
        unwrap_outcome(user.save(&cx).await);

        unwrap_outcome(
            user.update(&cx, Record::new().with("credit", 300).with("admin", true))
                .await,
        );

        let (sql, params) = conn.log().pop().unwrap();
        assert_eq!(sql, "UPDATE user SET \"credit\"=$1 WHERE id=$2 RETURNING *");
        assert_eq!(params, vec![Value::Int(300), Value::Int(1)]);
        assert_eq!(credit(user.fields()), Some(300));
        assert_eq!(credit(user.selfie()), Some(300));
        assert!(user.get("admin").is_none());
        assert!(user.is_saved());
    });
}

#[test]
fn update_validates_only_the_supplied_fields() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let model = user_model(&conn, ModelOptions::new());
        let mut user = model.build(Record::new().with("email", "a@x.io"));
        unwrap_outcome(user.save(&cx).await);

        let err = expect_err(user.update(&cx, Record::new().with("credit", 10)).await);
        let Error::Validation(err) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(err.attr(), vec!["credit"]);
        assert!(err.required_validation().is_empty());
        assert_eq!(conn.statements().len(), 1);
        assert_eq!(credit(user.selfie()), Some(100));
    });
}

#[test]
fn pre_update_can_rewrite_the_update_map() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let options = ModelOptions::new().pre_update(|_user, updates| {
            Box::pin(async move {
                updates.set("credit", 1000);
                Ok(())
            })
        });
        let model = user_model(&conn, options);
        let mut user = model.build(Record::new().with("email", "a@x.io"));
        unwrap_outcome(user.save(&cx).await);

        unwrap_outcome(
            user.update(&cx, Record::new().with("email", "b@x.io"))
                .await,
        );
        let (sql, _) = conn.log().pop().unwrap();
        assert_eq!(
            sql,
            "UPDATE user SET \"email\"=$1, \"credit\"=$2 WHERE id=$3 RETURNING *"
        );
        assert_eq!(user.get("email"), Some(&Value::from("b@x.io")));
        assert_eq!(credit(user.fields()), Some(1000));
    });
}

#[test]
fn empty_update_runs_no_statement() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let model = user_model(&conn, ModelOptions::new());
        let mut user = model.build(Record::new().with("email", "a@x.io"));
        unwrap_outcome(user.save(&cx).await);

        unwrap_outcome(user.update(&cx, Record::new().with("unknown", 1)).await);
        assert_eq!(conn.statements().len(), 1);
        assert!(user.is_saved());
    });
}

#[test]
fn hard_delete_removes_the_row_and_empties_the_snapshot() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let model = user_model(&conn, ModelOptions::new());
        let mut user = model.build(Record::new().with("email", "a@x.io"));
        unwrap_outcome(user.save(&cx).await);

        unwrap_outcome(user.delete(&cx, DeleteOptions::default()).await);

        let (sql, params) = conn.log().pop().unwrap();
        assert_eq!(sql, "DELETE FROM user WHERE id=$1 RETURNING *");
        assert_eq!(params, vec![Value::Int(1)]);
        assert!(!user.is_saved());
        assert!(user.selfie().is_empty());
        assert_eq!(user.get("email"), Some(&Value::from("a@x.io")));
        assert!(conn.rows("user").is_empty());
    });
}

#[test]
fn soft_delete_stamps_deleted_at_and_unsaves_the_instance() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let model = user_model(&conn, ModelOptions::new().soft_delete(true));
        let mut user = model.build(Record::new().with("email", "a@x.io"));
        unwrap_outcome(user.save(&cx).await);

        unwrap_outcome(user.delete(&cx, DeleteOptions::default()).await);

        let (sql, params) = conn.log().pop().unwrap();
        assert_eq!(
            sql,
            "UPDATE user SET \"deletedAt\"=$1 WHERE id=$2 RETURNING *"
        );
        assert!(matches!(params[0], Value::TimestampTz(_)));

        let rows = conn.rows("user");
        assert_eq!(rows.len(), 1);
        assert_eq!(user.get("deletedAt"), rows[0].get("deletedAt"));
        assert_eq!(user.get("deletedAt"), Some(&params[0]));
        assert!(!user.is_saved());
        assert!(user.selfie().is_empty());
    });
}

#[test]
fn call_option_overrides_model_soft_delete() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();

        let soft_model = user_model(&conn, ModelOptions::new().soft_delete(true));
        let mut user = soft_model.build(Record::new().with("email", "a@x.io"));
        unwrap_outcome(user.save(&cx).await);
        unwrap_outcome(user.delete(&cx, DeleteOptions::hard()).await);
        assert!(conn.statements().last().unwrap().starts_with("DELETE FROM user"));

        let hard_model = user_model(&conn, ModelOptions::new());
        let mut user = hard_model.build(Record::new().with("email", "b@x.io"));
        unwrap_outcome(user.save(&cx).await);
        unwrap_outcome(user.delete(&cx, DeleteOptions::soft()).await);
        assert!(
            conn.statements()
                .last()
                .unwrap()
                .starts_with("UPDATE user SET \"deletedAt\"")
        );
    });
}

#[test]
fn database_failures_are_wrapped_with_the_operation_path() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let model = user_model(&conn, ModelOptions::new());
        let mut user = model.build(Record::new().with("email", "a@x.io"));

        conn.fail_next(Some("23505"), "duplicate key value violates unique constraint");
        let err = expect_err(user.save(&cx).await);
        assert_eq!(err.name(), "ModelError");
        assert_eq!(err.sqlstate(), Some("23505"));
        let Error::Model(err) = err else {
            unreachable!();
        };
        assert_eq!(err.path(), Some("User.save"));
        assert!(err.message().starts_with("User.save: "));
        assert!(err.message().contains("duplicate key value"));
        assert!(matches!(err.inner(), Some(Error::Query(_))));
        assert!(!user.is_saved());
    });
}

#[test]
fn missing_row_on_update_is_a_wrapped_row_count_error() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let model = user_model(&conn, ModelOptions::new());
        let mut user = model.build(Record::new().with("email", "a@x.io"));
        unwrap_outcome(user.save(&cx).await);
        conn.state.lock().unwrap().tables.clear();

        let err = expect_err(user.update(&cx, Record::new().with("credit", 300)).await);
        let Error::Model(err) = err else {
            panic!("expected ModelError, got {err:?}");
        };
        assert_eq!(err.path(), Some("User.update"));
        assert!(err.message().contains("Expected one row, found none"));
    });
}

#[test]
fn keys_added_by_pre_update_outside_the_schema_are_dropped() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let options = ModelOptions::new().pre_update(|_user, updates| {
            Box::pin(async move {
                updates.set("bogus", 1);
                Ok(())
            })
        });
        let model = user_model(&conn, options);
        let mut user = model.build(Record::new().with("email", "a@x.io"));
        unwrap_outcome(user.save(&cx).await);

        unwrap_outcome(user.update(&cx, Record::new().with("email", "b@x.io")).await);

        let (sql, params) = conn.log().pop().unwrap();
        assert_eq!(sql, "UPDATE user SET \"email\"=$1 WHERE id=$2 RETURNING *");
        assert_eq!(params, vec![Value::from("b@x.io"), Value::Int(1)]);
        assert!(user.get("bogus").is_none());
        assert!(user.selfie().get("bogus").is_none());
        assert!(conn.rows("user")[0].get("bogus").is_none());
    });
}

fn vip_model(conn: &MockConnection) -> ModelType {
    use pglize::types::{BOOLEAN, INTEGER, VARCHAR};

    let schema = Schema::new()
        .field("email", FieldDef::new(VARCHAR).required())
        .field("vip", FieldDef::new(BOOLEAN))
        .field(
            "credit",
            FieldDef::new(INTEGER).validate_with(|value, fields| {
                fields.get("vip") == Some(&Value::Bool(true))
                    || value.as_i64().is_some_and(|n| n >= 100)
            }),
        );
    Pglize::new(conn.clone()).create_model("Member", schema, ModelOptions::new())
}

#[test]
fn custom_checks_read_the_current_visible_fields() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();

    rt.block_on(async {
        let conn = MockConnection::new();
        let model = vip_model(&conn);

        let mut vip = model.build(
            Record::new()
                .with("email", "vip@x.io")
                .with("vip", true)
                .with("credit", 50),
        );
        unwrap_outcome(vip.save(&cx).await);

        let mut regular = model.build(Record::new().with("email", "reg@x.io").with("credit", 50));
        let err = expect_err(regular.save(&cx).await);
        let Error::Validation(err) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(err.custom_validation(), vec!["credit"]);

        regular.set("credit", 150);
        unwrap_outcome(regular.save(&cx).await);

        // Updates are checked against the fields the instance holds right now.
        unwrap_outcome(vip.update(&cx, Record::new().with("credit", 10)).await);
        assert_eq!(credit(vip.selfie()), Some(10));

        let err = expect_err(regular.update(&cx, Record::new().with("credit", 10)).await);
        let Error::Validation(err) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(err.attr(), vec!["credit"]);

        regular.set("vip", true);
        unwrap_outcome(regular.update(&cx, Record::new().with("credit", 10)).await);
        assert_eq!(credit(regular.selfie()), Some(10));
    });
}
