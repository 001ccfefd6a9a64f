use std::sync::Arc;

use dbrs::drivers::{InMemoryTestDriver, InMemoryTestResponseBuilder};
use dbrs::placeholders::PlaceholderStyle;
use dbrs::types::{RawQueryResult, SqlValue};
use dbrs::{
    Adapter, AdapterConfig, Direction, Driver, ErrorKind, Factory, FetchMode, Platform, WhereClause,
};

fn adapter(driver: Driver, native: &InMemoryTestDriver) -> Adapter {
    Adapter::with_driver(AdapterConfig::new("default", driver), Arc::new(native.clone())).unwrap()
}

#[test]
fn test_simple_select_single_column() {
    let in_memory_test_driver = InMemoryTestDriver::new().with_response(
        InMemoryTestResponseBuilder::new()
            .columns(&["id"])
            .row([SqlValue::Int(1)])
            .build(),
    );
    let mut adapter = adapter(Driver::Mysqli, &in_memory_test_driver);

    let select = adapter.builder_factory().select(["users.id"]).from("users");
    let mut result = adapter.query(&select).unwrap();

    // Verify the query that was executed
    in_memory_test_driver.assert_last_query("SELECT `users`.`id` FROM `users`", &[]);
    in_memory_test_driver.assert_query_count(1);

    // Verify the result
    let row = result.fetch_object().unwrap();
    assert_eq!(row.get("id"), Some(&SqlValue::Int(1)));
}

#[test]
fn test_select_with_where() {
    let in_memory_test_driver = InMemoryTestDriver::new().with_response(
        InMemoryTestResponseBuilder::new()
            .columns(&["id"])
            .row([SqlValue::Int(42)])
            .build(),
    );
    let mut adapter = adapter(Driver::Pgsql, &in_memory_test_driver);

    let select = adapter
        .builder_factory()
        .select(["users.id"])
        .from("users")
        .where_("users.name", "O'Brien");
    let mut result = adapter.query(&select).unwrap();

    in_memory_test_driver.assert_last_query(
        "SELECT \"users\".\"id\" FROM \"users\" WHERE \"users\".\"name\" = 'O''Brien'",
        &[],
    );
    let row = result.fetch_assoc().unwrap();
    assert_eq!(row["id"], SqlValue::Int(42));
}

#[test]
fn test_select_with_where_and_limit() {
    let in_memory_test_driver = InMemoryTestDriver::new()
        .with_placeholder_style(PlaceholderStyle::Dollar)
        .with_response(
            InMemoryTestResponseBuilder::new()
                .columns(&["id"])
                .row([SqlValue::Int(1)])
                .row([SqlValue::Int(2)])
                .row([SqlValue::Int(3)])
                .build(),
        );
    let mut adapter = adapter(Driver::Pgsql, &in_memory_test_driver);

    let select = adapter
        .builder_factory()
        .select(["users.id"])
        .from("users")
        .where_("users.name", "John")
        .order_by("users.id", Direction::Asc)
        .limit(3);
    let mut statement = adapter.prepare_query(&select).unwrap().unwrap();
    let result = statement.execute(FetchMode::Num).unwrap();

    in_memory_test_driver.assert_last_query(
        "SELECT \"users\".\"id\" FROM \"users\" WHERE \"users\".\"name\" = $1 ORDER BY \"users\".\"id\" ASC LIMIT 3",
        &[SqlValue::from("John")],
    );

    let ids: Vec<SqlValue> = result
        .map(|row| row.get_index(0).cloned().unwrap_or(SqlValue::Null))
        .collect();
    assert_eq!(ids, vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]);
}

#[test]
fn test_select_empty_result() {
    let in_memory_test_driver = InMemoryTestDriver::new().with_response(
        InMemoryTestResponseBuilder::new().columns(&["id"]).build(),
    );
    let mut adapter = adapter(Driver::Mysqli, &in_memory_test_driver);

    let select = adapter
        .builder_factory()
        .select(["id"])
        .from("users")
        .where_("id", -1);
    let mut result = adapter.query(&select).unwrap();

    assert_eq!(result.num_rows(), 0);
    assert!(result.has_result_set());
    assert!(result.fetch_assoc().is_none());
    assert!(result.fetch_all(FetchMode::Assoc).is_empty());
}

#[test]
fn test_multiple_queries() {
    let in_memory_test_driver = InMemoryTestDriver::new().with_responses([
        InMemoryTestResponseBuilder::new()
            .columns(&["id"])
            .row([SqlValue::Int(1)])
            .build(),
        InMemoryTestResponseBuilder::new()
            .columns(&["name"])
            .row(["Alice"])
            .build(),
    ]);
    let mut adapter = adapter(Driver::MssqlPdo, &in_memory_test_driver);
    let factory = adapter.builder_factory();

    adapter.query(&factory.select(["id"]).from("users")).unwrap();
    let mut names = adapter.query(&factory.select(["name"]).from("users")).unwrap();

    in_memory_test_driver.assert_query_count(2);

    let queries = in_memory_test_driver.recorded_queries();
    assert_eq!(queries[0].sql, "SELECT [id] FROM [users]");
    assert_eq!(queries[1].sql, "SELECT [name] FROM [users]");
    assert!(!queries[0].prepared);
    assert_eq!(
        names.fetch(FetchMode::Both).unwrap().get("name"),
        Some(&SqlValue::from("Alice"))
    );
}

#[test]
fn test_compound_where_clause() {
    let in_memory_test_driver = InMemoryTestDriver::new().with_response(
        InMemoryTestResponseBuilder::new()
            .columns(&["name"])
            .row(["Admin"])
            .build(),
    );
    let mut adapter = adapter(Driver::MysqlPdo, &in_memory_test_driver);

    let select = adapter
        .builder_factory()
        .select(["name"])
        .from("users")
        .where_clause(WhereClause::eq("role", "admin").or(WhereClause::eq("role", "owner")));
    let mut statement = adapter.prepare_query(&select).unwrap().unwrap();
    assert_eq!(
        statement.sql(),
        "SELECT `name` FROM `users` WHERE (`role` = :role) OR (`role` = :role_2)"
    );
    let mut result = statement.execute(FetchMode::Assoc).unwrap();

    in_memory_test_driver.assert_last_query(
        "SELECT `name` FROM `users` WHERE (`role` = ?) OR (`role` = ?)",
        &[SqlValue::from("admin"), SqlValue::from("owner")],
    );
    assert_eq!(result.fetch_assoc().unwrap()["name"], SqlValue::from("Admin"));
}

#[test]
fn test_insert_update_delete_report_affected_rows() {
    let in_memory_test_driver = InMemoryTestDriver::new().with_responses([
        RawQueryResult::affected(2),
        RawQueryResult::affected(3),
        RawQueryResult::affected(1),
    ]);
    let mut adapter = adapter(Driver::Mysqli, &in_memory_test_driver);
    let factory = adapter.builder_factory();

    let insert = factory
        .insert("user")
        .columns(["name"])
        .values(["a"])
        .unwrap()
        .values(["b"])
        .unwrap();
    assert_eq!(adapter.query(&insert).unwrap().num_rows(), 2);

    let update = factory.update("user").set("active", false).where_("active", true);
    assert_eq!(adapter.query(&update).unwrap().num_rows(), 3);
    in_memory_test_driver.assert_last_query("UPDATE `user` SET `active` = 0 WHERE `active` = 1", &[]);

    let delete = factory.delete("user").where_in("id", [1, 2, 3]);
    let deleted = adapter.query(&delete).unwrap();
    assert_eq!(deleted.num_rows(), 1);
    assert!(!deleted.has_result_set());
    in_memory_test_driver.assert_last_query("DELETE FROM `user` WHERE `id` IN (1, 2, 3)", &[]);
}

#[test]
fn test_builder_errors_surface_through_adapter() {
    let in_memory_test_driver = InMemoryTestDriver::new();
    let mut adapter = adapter(Driver::Mysqli, &in_memory_test_driver);
    let factory = adapter.builder_factory();

    let err = factory
        .select(["id"])
        .from("a")
        .full_join("b", "a.id = b.a_id", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    assert_eq!(err.driver(), Some(Driver::Mysqli));

    let err = adapter.query(&factory.update("user")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(adapter.error_message().is_some());
    in_memory_test_driver.assert_query_count(0);
}

#[test]
fn test_full_join_from_foreign_factory_refused() {
    let in_memory_test_driver = InMemoryTestDriver::new();
    let mut adapter = adapter(Driver::Mysqli, &in_memory_test_driver);

    let select = Factory::new(Platform::new(Driver::Pgsql))
        .select(["a.id"])
        .from("a")
        .full_join("b", "a.id = b.a_id", None)
        .unwrap();
    let err = adapter.query(&select).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    assert_eq!(err.driver(), Some(Driver::Mysqli));
    assert!(adapter.error_message().is_some());
    in_memory_test_driver.assert_query_count(0);
}

#[test]
fn test_quoted_column_with_embedded_quote() {
    let in_memory_test_driver = InMemoryTestDriver::new()
        .with_placeholder_style(PlaceholderStyle::Dollar)
        .with_response(
            InMemoryTestResponseBuilder::new()
                .columns(&["a\"b"])
                .row([SqlValue::Int(1)])
                .build(),
        );
    let mut adapter = adapter(Driver::PgsqlPdo, &in_memory_test_driver);

    let select = adapter
        .builder_factory()
        .select(["a\"b"])
        .from("t")
        .where_("id", 5);
    let mut statement = adapter.prepare_query(&select).unwrap().unwrap();
    assert_eq!(statement.param_count(), 1);
    assert_eq!(statement.sql(), r#"SELECT "a\"b" FROM "t" WHERE "id" = :id"#);
    statement.execute(FetchMode::Assoc).unwrap();

    in_memory_test_driver
        .assert_last_query(r#"SELECT "a\"b" FROM "t" WHERE "id" = $1"#, &[SqlValue::Int(5)]);
}
