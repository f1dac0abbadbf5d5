use studiodb::storage::{KvStore, MemoryStore, PartitionStore, Value};
use studiodb::{Engine, EngineConfig, Error, ErrorKind, WhereSemantics};

fn config() -> EngineConfig {
    EngineConfig::new().seed_demo(false)
}

fn engine() -> Engine<MemoryStore> {
    Engine::in_memory(config())
}

#[tokio::test]
async fn test_create_insert_select_round_trip() {
    let engine = engine();
    engine
        .execute_statement("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, score REAL)")
        .await
        .unwrap();
    engine
        .execute_statement(
            "INSERT INTO users (id, name, score) VALUES (1, 'Alice', 9.5), (2, 'Bob', NULL);",
        )
        .await
        .unwrap();

    let result = engine
        .execute_statement("SELECT * FROM users")
        .await
        .unwrap();
    assert_eq!(result.columns, vec!["id", "name", "score"]);
    assert_eq!(
        result.rows,
        vec![
            vec![Value::Integer(1), Value::from("Alice"), Value::Real(9.5)],
            vec![Value::Integer(2), Value::from("Bob"), Value::Null],
        ]
    );

    let result = engine
        .execute_statement("select name from users where id = 2")
        .await
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::from("Bob")]]);
}

#[tokio::test]
async fn test_rename_preserves_columns_and_data() {
    let engine = engine();
    engine
        .execute_statement("CREATE TABLE old_name (k TEXT, v INTEGER)")
        .await
        .unwrap();
    engine
        .execute_statement("INSERT INTO old_name (k, v) VALUES ('b', 2), ('a', 1)")
        .await
        .unwrap();
    let before = engine
        .execute_statement("SELECT * FROM old_name")
        .await
        .unwrap();

    engine.rename_table("old_name", "new_name").await.unwrap();

    let schema = engine.get_schema().await.unwrap();
    assert_eq!(schema.len(), 1);
    assert_eq!(schema[0].name, "new_name");
    assert_eq!(schema[0].column_names(), vec!["k", "v"]);

    let after = engine
        .execute_statement("SELECT * FROM new_name")
        .await
        .unwrap();
    assert_eq!(after.rows, before.rows);

    let err = engine
        .execute_statement("SELECT * FROM old_name")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TableNotFound(_)));
}

#[tokio::test]
async fn test_drop_removes_table() {
    let engine = engine();
    engine
        .execute_statement("CREATE TABLE t (id INTEGER)")
        .await
        .unwrap();
    engine.execute_statement("DROP TABLE t;").await.unwrap();

    assert!(engine.get_schema().await.unwrap().is_empty());
    let err = engine
        .execute_statement("SELECT * FROM t")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);

    // Dropping a missing table is not an error
    let result = engine.execute_statement("DROP TABLE t").await.unwrap();
    assert!(result.schema_changed);
}

#[tokio::test]
async fn test_create_table_as_select_union_all() {
    let engine = engine();
    let result = engine
        .execute_statement(
            "CREATE TABLE colors AS SELECT 1 AS id, 'red' AS name, 0.5 AS weight \
             UNION ALL SELECT 2, 'green', 1.5 \
             UNION ALL SELECT 3, 'blue', NULL",
        )
        .await
        .unwrap();
    assert!(result.schema_changed);
    assert_eq!(result.message(), Some("Table \"colors\" created with 3 rows."));

    let schema = engine.get_schema().await.unwrap();
    let types: Vec<String> = schema[0]
        .columns
        .iter()
        .map(|c| c.data_type.to_string())
        .collect();
    assert_eq!(types, vec!["INTEGER", "TEXT", "REAL"]);

    let result = engine
        .execute_statement("SELECT name FROM colors")
        .await
        .unwrap();
    assert_eq!(
        result.rows,
        vec![
            vec![Value::from("red")],
            vec![Value::from("green")],
            vec![Value::from("blue")],
        ]
    );
}

#[tokio::test]
async fn test_create_table_as_select_full_rows() {
    let engine = engine();
    engine
        .execute_statement("CREATE TABLE t AS SELECT 1 AS id, 'x' AS name UNION ALL SELECT 2, 'y'")
        .await
        .unwrap();

    let result = engine.execute_statement("SELECT * FROM t").await.unwrap();
    assert_eq!(result.columns, vec!["id", "name"]);
    assert_eq!(
        result.rows,
        vec![
            vec![Value::Integer(1), Value::from("x")],
            vec![Value::Integer(2), Value::from("y")],
        ]
    );
}

#[tokio::test]
async fn test_create_table_as_select_errors_create_nothing() {
    let engine = engine();

    let err = engine
        .execute_statement("CREATE TABLE t AS SELECT 1 AS id, 2 UNION ALL SELECT 3, 4")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingAlias(text) if text == "2"));

    let err = engine
        .execute_statement("CREATE TABLE t AS SELECT 1 AS id, 'x' AS name UNION ALL SELECT 2")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ColumnCountMismatch {
            expected: 2,
            found: 1
        }
    ));

    let err = engine
        .execute_statement("CREATE TABLE t AS SELECT 1 AS id UNION ALL SELECT 1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Constraint);

    assert!(engine.get_schema().await.unwrap().is_empty());
    assert_eq!(engine.version().await.unwrap(), 1);
}

#[tokio::test]
async fn test_unqualified_delete_is_rejected() {
    let engine = engine();
    engine
        .execute_statement("CREATE TABLE t (id INTEGER)")
        .await
        .unwrap();
    engine
        .execute_statement("INSERT INTO t (id) VALUES (1), (2)")
        .await
        .unwrap();

    let err = engine
        .execute_statement("DELETE FROM t")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Constraint);

    let result = engine
        .execute_statement("SELECT * FROM t")
        .await
        .unwrap();
    assert_eq!(result.rows.len(), 2);
}

#[tokio::test]
async fn test_get_schema_is_idempotent() {
    let engine = Engine::in_memory(EngineConfig::new());
    let first = engine.get_schema().await.unwrap();
    let second = engine.get_schema().await.unwrap();
    assert_eq!(first, second);

    let names: Vec<&str> = first.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["departments", "employees", "project_assignments", "projects"]
    );
}

#[tokio::test]
async fn test_demo_seed() {
    let engine = Engine::in_memory(EngineConfig::new());
    let result = engine
        .execute_statement("SELECT first_name, salary FROM employees WHERE employee_id = 102")
        .await
        .unwrap();
    assert_eq!(
        result.rows,
        vec![vec![Value::from("Jane"), Value::Integer(82000)]]
    );

    let result = engine
        .execute_statement("SELECT * FROM departments")
        .await
        .unwrap();
    assert_eq!(result.rows.len(), 2);
}

#[tokio::test]
async fn test_where_key_lookup_vs_column_filter() {
    let store = MemoryStore::new();
    let lookup = Engine::with_store(store.clone(), config());
    lookup
        .execute_statement("CREATE TABLE pets (id INTEGER, kind TEXT)")
        .await
        .unwrap();
    lookup
        .execute_statement("INSERT INTO pets (id, kind) VALUES (1, 'cat'), (2, 'dog'), (3, 'cat')")
        .await
        .unwrap();

    // The literal is used as the key whatever column is named
    let result = lookup
        .execute_statement("SELECT id FROM pets WHERE kind = 'cat'")
        .await
        .unwrap();
    assert!(result.rows.is_empty());
    let result = lookup
        .execute_statement("SELECT kind FROM pets WHERE kind = 2")
        .await
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::from("dog")]]);

    let filter = Engine::with_store(
        store,
        config().where_semantics(WhereSemantics::ColumnFilter),
    );
    let result = filter
        .execute_statement("SELECT id FROM pets WHERE kind = 'cat'")
        .await
        .unwrap();
    assert_eq!(
        result.rows,
        vec![vec![Value::Integer(1)], vec![Value::Integer(3)]]
    );
    let result = filter
        .execute_statement("SELECT kind FROM pets WHERE kind = 2")
        .await
        .unwrap();
    assert!(result.rows.is_empty());
}

#[tokio::test]
async fn test_ignored_where_clause_selects_everything() {
    let engine = engine();
    engine
        .execute_statement("CREATE TABLE t (id INTEGER)")
        .await
        .unwrap();
    engine
        .execute_statement("INSERT INTO t (id) VALUES (1), (2), (3)")
        .await
        .unwrap();

    let result = engine
        .execute_statement("SELECT * FROM t WHERE id > 1")
        .await
        .unwrap();
    assert_eq!(result.rows.len(), 3);

    // With the clause ignored DELETE has no WHERE left
    let err = engine
        .execute_statement("DELETE FROM t WHERE id = 1 OR id = 2")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DeleteWithoutWhere(_)));
}

#[tokio::test]
async fn test_syntax_errors() {
    let engine = engine();
    let err = engine
        .execute_statement("UPDATE t SET a = 1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedCommand(ref t) if t == "UPDATE"));
    assert_eq!(err.kind(), ErrorKind::Syntax);

    let err = engine
        .execute_statement("SELECT * FROM t ORDER BY id")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
}

#[tokio::test]
async fn test_duplicate_table_names() {
    let engine = engine();
    engine
        .execute_statement("CREATE TABLE a (id INTEGER)")
        .await
        .unwrap();
    engine
        .execute_statement("CREATE TABLE b (id INTEGER)")
        .await
        .unwrap();

    let err = engine
        .execute_statement("CREATE TABLE a (other TEXT)")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TableAlreadyExists(_)));

    let err = engine.rename_table("a", "b").await.unwrap_err();
    assert!(matches!(err, Error::TableAlreadyExists(_)));
    let err = engine.rename_table("missing", "c").await.unwrap_err();
    assert!(matches!(err, Error::TableNotFound(_)));
}

#[tokio::test]
async fn test_memory_store_survives_engine_restart() {
    let store = MemoryStore::new();
    {
        let engine = Engine::with_store(store.clone(), config());
        engine
            .execute_statement("CREATE TABLE t (id INTEGER, v TEXT)")
            .await
            .unwrap();
        engine
            .execute_statement("INSERT INTO t (v) VALUES ('x')")
            .await
            .unwrap();
    }

    let engine = Engine::with_store(store, config());
    assert!(!engine.initialize().await.unwrap());
    let result = engine.execute_statement("SELECT * FROM t").await.unwrap();
    assert_eq!(result.rows, vec![vec![Value::Integer(1), Value::from("x")]]);
}

#[tokio::test]
async fn test_partition_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("studio.db");

    {
        let engine = Engine::open(config().path(&path)).unwrap();
        assert!(engine.initialize().await.unwrap());
        engine
            .execute_statement("CREATE TABLE notes (id INTEGER, body TEXT)")
            .await
            .unwrap();
        engine
            .execute_statement("INSERT INTO notes (id, body) VALUES (7, 'it''s here'), (8, 'gone')")
            .await
            .unwrap();
        engine
            .execute_statement("DELETE FROM notes WHERE id = 8")
            .await
            .unwrap();
        engine.rename_table("notes", "memos").await.unwrap();
    }

    let engine = Engine::with_store(PartitionStore::open(&path).unwrap(), config());
    assert!(!engine.initialize().await.unwrap());
    assert_eq!(engine.version().await.unwrap(), 3);

    let result = engine
        .execute_statement("SELECT body FROM memos WHERE id = 7")
        .await
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::from("it's here")]]);
    assert_eq!(
        engine.dump_table("memos").await.unwrap(),
        vec!["INSERT INTO memos (id, body) VALUES (7, 'it''s here')"]
    );
    let err = engine
        .execute_statement("SELECT * FROM notes")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TableNotFound(_)));
}

#[tokio::test]
async fn test_seeded_partition_store_reopens_with_demo_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.db");

    {
        let engine = Engine::open(EngineConfig::new().path(&path)).unwrap();
        assert!(engine.initialize().await.unwrap());
        engine
            .execute_statement("INSERT INTO departments (department_name) VALUES ('Sales')")
            .await
            .unwrap();
    }

    let store = PartitionStore::open(&path).unwrap();
    let image = store.load().await.unwrap().unwrap();
    assert_eq!(image.version, 1);
    assert_eq!(image.catalog.len(), 4);

    let engine = Engine::with_store(store, EngineConfig::new());
    assert!(!engine.initialize().await.unwrap());
    let result = engine
        .execute_statement("SELECT department_name FROM departments WHERE department_id = 3")
        .await
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::from("Sales")]]);
}
