//! End-to-end migration cycles against a real store

use floodgate::dialect::Dialect;
use floodgate::executor::{SqlExecutor, SqlValue};
use floodgate::sqlite::{SqliteDialect, SqliteSession};
use floodgate::{
    ExecutableMigration, MigrationConfig, MigrationError, MigrationRunner, MigrationState,
    SchemaInitializer, SchemaVersion, SqlMigration,
};

fn sql_migration(version: &str, description: &str, sql: &str) -> SqlMigration {
    SqlMigration::new(
        SchemaVersion::with_description(version, description),
        format!(
            "V{}__{}.sql",
            version.replace('.', "_"),
            description.replace(' ', "_")
        ),
        sql,
    )
}

#[test]
fn full_cycle_on_a_fresh_store() {
    let session = SqliteSession::open_in_memory().expect("open");
    let dialect = SqliteDialect;
    let runner = MigrationRunner::new(&session, &dialect, MigrationConfig::default());

    let m1 = sql_migration(
        "1",
        "create accounts",
        "CREATE TABLE accounts (id INTEGER PRIMARY KEY, email TEXT NOT NULL)",
    );
    let m2 = sql_migration(
        "1.1",
        "seed admin",
        "INSERT INTO accounts (id, email) VALUES (1, 'admin@example.com')",
    );
    let m3 = sql_migration(
        "2",
        "index email",
        "CREATE UNIQUE INDEX idx_accounts_email ON accounts (email)",
    );
    let migrations: Vec<&dyn ExecutableMigration> = vec![&m1, &m2, &m3];

    let applied = runner.migrate(&migrations).expect("migrate");
    assert_eq!(applied, 3);

    let status = runner.info(&migrations).expect("info");
    assert!(status.is_up_to_date());
    assert_eq!(status.all().len(), 3);
    assert!(status
        .all()
        .iter()
        .all(|info| info.state == MigrationState::Success));
    assert_eq!(
        status.current().expect("applied rows").version,
        SchemaVersion::new("2")
    );

    let rows = session
        .query("SELECT email FROM accounts", &[])
        .expect("migrated schema is usable");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].text(0), Some("admin@example.com"));
}

#[test]
fn baseline_adopts_an_existing_schema() {
    let session = SqliteSession::open_in_memory().expect("open");
    let dialect = SqliteDialect;

    // The schema predates the ledger: accounts already exists
    session
        .execute_batch("CREATE TABLE accounts (id INTEGER PRIMARY KEY)")
        .expect("pre-existing schema");

    SchemaInitializer::new(&session, &dialect, "schema_version")
        .init(&SchemaVersion::with_description("2", "adopted schema"))
        .expect("baseline init");

    // Migrations 1 and 2 describe history that already happened
    let m1 = sql_migration("1", "create accounts", "CREATE TABLE accounts (id INTEGER)");
    let m2 = sql_migration("2", "add email", "ALTER TABLE accounts ADD COLUMN email TEXT");
    let m3 = sql_migration(
        "3",
        "create reports",
        "CREATE TABLE reports (id INTEGER PRIMARY KEY)",
    );
    let migrations: Vec<&dyn ExecutableMigration> = vec![&m1, &m2, &m3];

    let runner = MigrationRunner::new(&session, &dialect, MigrationConfig::default());
    let applied = runner.migrate(&migrations).expect("migrate");
    assert_eq!(applied, 1, "only the migration above the baseline runs");

    assert!(dialect.table_exists(&session, "reports").expect("probe"));

    let status = runner.info(&migrations).expect("info");
    assert!(status.is_up_to_date());
    let shadowed = &status.all()[0];
    assert_eq!(shadowed.version, SchemaVersion::new("1"));
    assert_eq!(shadowed.state, MigrationState::Success);
    assert!(
        shadowed.installed_on.is_none(),
        "shadowed migrations were never executed"
    );
}

#[test]
fn ledger_persists_across_sessions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("floodgate.db");
    let dialect = SqliteDialect;

    let m1 = sql_migration("1", "one", "CREATE TABLE t1 (id INTEGER)");
    let m2 = sql_migration("2", "two", "CREATE TABLE t2 (id INTEGER)");
    let m3 = sql_migration("3", "three", "CREATE TABLE t3 (id INTEGER)");

    {
        let session = SqliteSession::open(&path).expect("open");
        let runner = MigrationRunner::new(&session, &dialect, MigrationConfig::default());
        let first: Vec<&dyn ExecutableMigration> = vec![&m1, &m2];
        assert_eq!(runner.migrate(&first).expect("first deploy"), 2);
    }

    // A later deploy with one new migration picks up where it left off
    let session = SqliteSession::open(&path).expect("reopen");
    let runner = MigrationRunner::new(&session, &dialect, MigrationConfig::default());
    let all: Vec<&dyn ExecutableMigration> = vec![&m1, &m2, &m3];
    assert_eq!(runner.migrate(&all).expect("second deploy"), 1);

    let status = runner.info(&all).expect("info");
    assert_eq!(
        status.current().expect("applied rows").version,
        SchemaVersion::new("3")
    );
}

#[test]
fn failed_migration_blocks_until_manually_repaired() {
    let session = SqliteSession::open_in_memory().expect("open");
    let dialect = SqliteDialect;
    let runner = MigrationRunner::new(&session, &dialect, MigrationConfig::default());

    let m1 = sql_migration("1", "good", "CREATE TABLE t1 (id INTEGER)");
    let broken = sql_migration("2", "broken", "THIS IS NOT SQL");
    let m3 = sql_migration("3", "three", "CREATE TABLE t3 (id INTEGER)");

    let with_broken: Vec<&dyn ExecutableMigration> = vec![&m1, &broken, &m3];
    let err = runner.migrate(&with_broken).expect_err("broken sql fails");
    assert!(matches!(err, MigrationError::ExecutionFailed { .. }));

    // Every further run is refused while the FAILED row is current
    let err = runner.migrate(&with_broken).expect_err("blocked");
    assert!(matches!(err, MigrationError::FailedMigrationBlocks { .. }));

    // Operator repair: drop the FAILED row and ship a fixed migration
    session
        .execute(
            "DELETE FROM schema_version WHERE state = ?",
            &[SqlValue::from("FAILED")],
        )
        .expect("manual repair");
    let fixed = sql_migration("2", "fixed", "CREATE TABLE t2 (id INTEGER)");
    let repaired: Vec<&dyn ExecutableMigration> = vec![&m1, &fixed, &m3];

    let applied = runner.migrate(&repaired).expect("repaired run");
    assert_eq!(applied, 2);

    let status = runner.info(&repaired).expect("info");
    assert!(status.is_up_to_date());
    assert_eq!(
        status.current().expect("applied rows").version,
        SchemaVersion::new("3")
    );
}
