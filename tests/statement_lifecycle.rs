use indexmap::IndexMap;
use sqlite3_dbal::{
    ConnectionParams, Error, FetchStyle, ParamCell, ParamType, Params, Result, Row,
    Sqlite3Connection, Sqlite3Driver, Value,
};

// Helper function to create an in-memory database for testing
fn create_test_db() -> Result<Sqlite3Connection> {
    let conn = Sqlite3Driver::new().connect(&ConnectionParams::memory())?;
    initialize_schema(&conn)?;
    Ok(conn)
}

// Initialize the database schema with two rows
fn initialize_schema(conn: &Sqlite3Connection) -> Result<()> {
    conn.exec(
        r#"
        CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);
        INSERT INTO t (name) VALUES ('a');
        INSERT INTO t (name) VALUES ('b');
        "#,
    )?;
    Ok(())
}

#[test]
fn fetch_before_execute_is_end_of_rows() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.prepare("SELECT * FROM t")?;

    assert_eq!(stmt.fetch(None)?, None);
    assert!(stmt.fetch_all(None)?.is_empty());
    assert_eq!(stmt.fetch_column(0)?, None);
    assert_eq!(stmt.column_count()?, 0);
    Ok(())
}

#[test]
fn associative_fetch_returns_rows_in_insertion_order() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.prepare("SELECT * FROM t")?;
    stmt.execute(None)?;

    let first = stmt.fetch(Some(FetchStyle::Associative))?;
    let second = stmt.fetch(Some(FetchStyle::Associative))?;
    assert_eq!(stmt.fetch(Some(FetchStyle::Associative))?, None);

    let expected = |id: i64, name: &str| {
        Row::Associative(IndexMap::from([
            ("id".to_string(), Value::Integer(id)),
            ("name".to_string(), Value::Text(name.to_string())),
        ]))
    };
    assert_eq!(first, Some(expected(1, "a")));
    assert_eq!(second, Some(expected(2, "b")));

    if let Some(Row::Associative(map)) = first {
        assert_eq!(map.keys().collect::<Vec<_>>(), ["id", "name"]);
    }
    Ok(())
}

#[test]
fn default_style_is_both() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.query("SELECT id, name FROM t WHERE id = 2")?;

    let row = stmt.fetch(None)?.expect("one row");
    assert_eq!(row.style(), FetchStyle::Both);
    assert_eq!(row.get(0), Some(&Value::Integer(2)));
    assert_eq!(row.get_named("name"), Some(&Value::Text("b".into())));
    Ok(())
}

#[test]
fn set_fetch_mode_changes_the_default() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.query("SELECT id, name FROM t")?;
    stmt.set_fetch_mode(FetchStyle::Numeric)?;

    let rows = stmt.fetch_all(None)?;
    assert_eq!(
        rows,
        vec![
            Row::Numeric(vec![Value::Integer(1), Value::Text("a".into())]),
            Row::Numeric(vec![Value::Integer(2), Value::Text("b".into())]),
        ]
    );
    Ok(())
}

#[test]
fn exhausted_cursor_stays_exhausted() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.query("SELECT name FROM t")?;

    assert!(stmt.fetch(None)?.is_some());
    assert!(stmt.fetch(None)?.is_some());
    assert!(stmt.fetch_all(None)?.is_empty());
    assert!(stmt.fetch_all(None)?.is_empty());
    assert_eq!(stmt.fetch(None)?, None);
    Ok(())
}

#[test]
fn partial_fetch_then_fetch_all_returns_only_the_rest() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.query("SELECT name FROM t")?;

    assert_eq!(stmt.fetch_column(0)?, Some(Value::Text("a".into())));
    let rest = stmt.fetch_all(Some(FetchStyle::Numeric))?;
    assert_eq!(rest, vec![Row::Numeric(vec![Value::Text("b".into())])]);
    Ok(())
}

#[test]
fn rebinding_between_executions_gives_independent_results() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.prepare("SELECT name FROM t WHERE id = :id")?;

    stmt.bind_value("id", 1, None)?;
    stmt.execute(None)?;
    assert_eq!(stmt.fetch_column(0)?, Some(Value::Text("a".into())));

    stmt.bind_value(":id", 2, Some(ParamType::Integer))?;
    stmt.execute(None)?;
    assert_eq!(stmt.fetch_column(0)?, Some(Value::Text("b".into())));
    assert_eq!(stmt.fetch_column(0)?, None);

    // bound values persist when executing again without rebinding
    stmt.execute(None)?;
    assert_eq!(stmt.fetch_column(0)?, Some(Value::Text("b".into())));
    Ok(())
}

#[test]
fn bound_cells_are_read_at_execute_time() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.prepare("SELECT name FROM t WHERE id = ?")?;
    let id = ParamCell::new(1);
    stmt.bind_param(1, &id, Some(ParamType::Integer))?;

    stmt.execute(None)?;
    assert_eq!(stmt.fetch_column(0)?, Some(Value::Text("a".into())));

    id.set(2);
    stmt.execute(None)?;
    assert_eq!(stmt.fetch_column(0)?, Some(Value::Text("b".into())));

    // a value bound later replaces the reference
    stmt.bind_value(1, 1, None)?;
    id.set(2);
    stmt.execute(None)?;
    assert_eq!(stmt.fetch_column(0)?, Some(Value::Text("a".into())));
    Ok(())
}

#[test]
fn execute_binds_positional_and_named_params() -> Result<()> {
    let conn = create_test_db()?;

    let mut insert = conn.prepare("INSERT INTO t (name) VALUES (?)")?;
    insert.execute(Some(&Params::positional(["c"])))?;
    assert_eq!(conn.last_insert_id(), 3);

    let mut select = conn.prepare("SELECT id FROM t WHERE name = :name")?;
    select.execute(Some(&Params::new().with_value("name", "c")))?;
    assert_eq!(select.fetch_column(0)?, Some(Value::Integer(3)));
    Ok(())
}

#[test]
fn bound_values_round_trip_for_each_logical_type() -> Result<()> {
    let conn = create_test_db()?;
    conn.exec("CREATE TABLE r (s TEXT, b INTEGER, n TEXT, i INTEGER, l BLOB)")?;

    let mut insert = conn.prepare("INSERT INTO r VALUES (:s, :b, :n, :i, :l)")?;
    insert.bind_value("s", "it's", Some(ParamType::String))?;
    insert.bind_value("b", true, Some(ParamType::Boolean))?;
    insert.bind_value("n", Value::Null, Some(ParamType::Null))?;
    insert.bind_value("i", -42, Some(ParamType::Integer))?;
    insert.bind_value("l", vec![0u8, 159, 255], Some(ParamType::LargeObject))?;
    insert.execute(None)?;

    let mut select = conn.query("SELECT s, b, n, i, l FROM r")?;
    let row = select.fetch(Some(FetchStyle::Associative))?.expect("one row");
    assert_eq!(row.get_named("s"), Some(&Value::Text("it's".into())));
    assert_eq!(row.get_named("b").and_then(Value::as_bool), Some(true));
    assert_eq!(row.get_named("n"), Some(&Value::Null));
    assert_eq!(row.get_named("i"), Some(&Value::Integer(-42)));
    assert_eq!(row.get_named("l"), Some(&Value::Blob(vec![0, 159, 255])));
    Ok(())
}

#[test]
fn inferred_types_follow_the_value() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.prepare("SELECT typeof(?1), typeof(?2), typeof(?3), typeof(?4)")?;
    stmt.execute(Some(&Params::positional([
        Value::Integer(1),
        Value::Real(1.5),
        Value::Text("x".into()),
        Value::Boolean(false),
    ])))?;

    let row = stmt.fetch(Some(FetchStyle::Numeric))?.expect("one row");
    assert_eq!(
        row.into_values(),
        vec![
            Value::Text("integer".into()),
            Value::Text("real".into()),
            Value::Text("text".into()),
            Value::Text("integer".into()),
        ]
    );
    Ok(())
}

#[test]
fn explicit_types_coerce_the_bound_value() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.prepare("SELECT typeof(:v), :v")?;

    stmt.bind_value("v", "17", Some(ParamType::Integer))?;
    stmt.execute(None)?;
    let row = stmt.fetch(Some(FetchStyle::Numeric))?.expect("one row");
    assert_eq!(
        row.into_values(),
        vec![Value::Text("integer".into()), Value::Integer(17)]
    );

    stmt.bind_value("v", 17, Some(ParamType::String))?;
    stmt.execute(None)?;
    let row = stmt.fetch(Some(FetchStyle::Numeric))?.expect("one row");
    assert_eq!(
        row.into_values(),
        vec![Value::Text("text".into()), Value::Text("17".into())]
    );
    Ok(())
}

#[test]
fn unknown_placeholders_are_rejected_when_bound() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.prepare("SELECT name FROM t WHERE id = :id")?;

    let err = stmt.bind_value("missing", 1, None).unwrap_err();
    assert!(matches!(err, Error::Statement { code: 25, .. }), "{err:?}");
    assert_eq!(stmt.error_code(), 25);

    let err = stmt.bind_param(2, &ParamCell::new(1), None).unwrap_err();
    assert!(matches!(err, Error::Statement { code: 25, .. }), "{err:?}");
    Ok(())
}

#[test]
fn fetch_column_out_of_range_is_an_error() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.query("SELECT id FROM t")?;

    let err = stmt.fetch_column(3).unwrap_err();
    assert_eq!(err.native_code(), Some(25));

    // the row is still there for a valid index
    assert_eq!(stmt.fetch_column(0)?, Some(Value::Integer(1)));
    assert_eq!(stmt.fetch_column(0)?, Some(Value::Integer(2)));
    Ok(())
}

#[test]
fn fetch_steps_an_unbounded_query_one_row_at_a_time() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.query(
        "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT x FROM c",
    )?;

    assert_eq!(stmt.fetch_column(0)?, Some(Value::Integer(1)));
    assert_eq!(stmt.fetch_column(0)?, Some(Value::Integer(2)));
    let next: Vec<Row> = stmt.rows()?.take(3).collect::<Result<_>>()?;
    assert_eq!(next.len(), 3);
    assert_eq!(next[2].get(0), Some(&Value::Integer(5)));

    // executing again restarts the cursor
    stmt.execute(None)?;
    assert_eq!(stmt.fetch_column(0)?, Some(Value::Integer(1)));
    Ok(())
}

#[test]
fn rebinding_leaves_the_open_cursor_alone() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.prepare("SELECT name FROM t WHERE id >= ?")?;
    stmt.bind_value(1, 1, None)?;
    stmt.execute(None)?;
    assert_eq!(stmt.fetch_column(0)?, Some(Value::Text("a".into())));

    // takes effect at the next execute
    stmt.bind_value(1, 2, None)?;
    assert_eq!(stmt.fetch_column(0)?, Some(Value::Text("b".into())));
    assert_eq!(stmt.fetch_column(0)?, None);

    stmt.execute(None)?;
    assert_eq!(stmt.fetch_all(None)?.len(), 1);
    Ok(())
}

#[test]
fn execute_failure_carries_the_native_error() -> Result<()> {
    let conn = create_test_db()?;
    conn.exec("CREATE TABLE u (x INTEGER UNIQUE)")?;
    let mut stmt = conn.prepare("INSERT INTO u (x) VALUES (?)")?;
    stmt.bind_value(1, 1, None)?;
    stmt.execute(None)?;

    let err = stmt.execute(None).unwrap_err();
    match err {
        Error::Statement { code, message } => {
            assert_eq!(code, 19);
            assert!(message.contains("UNIQUE"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(stmt.error_code(), 19);
    assert_eq!(conn.error_code(), 19);
    Ok(())
}

#[test]
fn close_cursor_reports_whether_one_was_open() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.prepare("SELECT id, name FROM t")?;
    assert!(!stmt.close_cursor()?);

    stmt.execute(None)?;
    assert_eq!(stmt.column_count()?, 2);
    assert!(stmt.close_cursor()?);
    assert!(!stmt.close_cursor()?);
    assert_eq!(stmt.column_count()?, 0);
    assert_eq!(stmt.fetch(None)?, None);

    // the compiled statement survives
    stmt.execute(None)?;
    assert_eq!(stmt.fetch_all(None)?.len(), 2);
    Ok(())
}

#[test]
fn row_count_reports_the_last_write() -> Result<()> {
    let conn = create_test_db()?;

    let mut update = conn.prepare("UPDATE t SET name = 'x'")?;
    update.execute(None)?;
    assert_eq!(update.row_count()?, 2);

    let mut select = conn.query("SELECT * FROM t WHERE id = 1")?;
    assert_eq!(select.fetch_all(None)?.len(), 1);
    // not the size of the result set
    assert_eq!(select.row_count()?, 2);
    Ok(())
}

#[test]
fn rows_iterates_once_per_execution() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.query("SELECT name FROM t")?;
    stmt.set_fetch_mode(FetchStyle::Numeric)?;

    let rows: Vec<Row> = stmt.rows()?.collect::<Result<_>>()?;
    let names: Vec<Value> = rows.iter().filter_map(|row| row.get(0).cloned()).collect();
    assert_eq!(names, vec![Value::Text("a".into()), Value::Text("b".into())]);
    assert_eq!(stmt.rows()?.count(), 0);

    stmt.execute(None)?;
    assert_eq!(stmt.rows()?.count(), 2);
    Ok(())
}

#[test]
fn closed_statements_reject_every_operation() -> Result<()> {
    let conn = create_test_db()?;
    let mut stmt = conn.query("SELECT * FROM t")?;
    stmt.close()?;

    assert!(stmt.is_closed());
    assert_eq!(stmt.fetch(None), Err(Error::StatementClosed));
    assert_eq!(stmt.execute(None), Err(Error::StatementClosed));
    assert_eq!(stmt.bind_value(1, 1, None), Err(Error::StatementClosed));
    assert_eq!(stmt.close_cursor(), Err(Error::StatementClosed));
    assert_eq!(stmt.row_count(), Err(Error::StatementClosed));
    assert_eq!(stmt.column_count(), Err(Error::StatementClosed));
    assert_eq!(stmt.set_fetch_mode(FetchStyle::Numeric), Err(Error::StatementClosed));
    assert_eq!(stmt.close(), Err(Error::StatementClosed));
    Ok(())
}
