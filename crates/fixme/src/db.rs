//! Database connection utilities.

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

/// Pool size. Page tasks of one cycle write concurrently.
const MAX_CONNECTIONS: u32 = 10;

/// Applied to every SQLite connection:
/// WAL so readers don't block the page writers, a 5 s busy wait instead of
/// immediate `SQLITE_BUSY`, and NORMAL sync (safe under WAL).
const SQLITE_PRAGMAS: [&str; 3] = [
    "PRAGMA journal_mode=WAL",
    "PRAGMA busy_timeout=5000",
    "PRAGMA synchronous=NORMAL",
];

fn is_sqlite(database_url: &str) -> bool {
    database_url.starts_with("sqlite:")
}

async fn configure_sqlite(db: &DatabaseConnection) -> Result<(), DbErr> {
    for pragma in SQLITE_PRAGMAS {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            pragma.to_string(),
        ))
        .await?;
    }
    Ok(())
}

/// Open a connection pool for `database_url`
/// (`sqlite://fixme.db?mode=rwc`, `postgres://localhost/fixme`).
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url);
    options.max_connections(MAX_CONNECTIONS).sqlx_logging(false);

    let db = Database::connect(options).await?;
    if is_sqlite(database_url) {
        configure_sqlite(&db).await?;
    }
    tracing::debug!(backend = ?db.get_database_backend(), "Database connected");
    Ok(db)
}

/// [`connect`], then apply pending migrations.
///
/// ```ignore
/// let db = fixme::connect_and_migrate("postgres://localhost/fixme").await?;
/// ```
#[cfg(feature = "migrate")]
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    use sea_orm_migration::MigratorTrait;

    let db = connect(database_url).await?;
    crate::migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn configure_sqlite_runs_every_pragma() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_results(SQLITE_PRAGMAS.map(|_| MockExecResult {
                rows_affected: 0,
                last_insert_id: 0,
            }))
            .into_connection();

        configure_sqlite(&db).await.unwrap();

        let log = db.into_transaction_log();
        assert_eq!(log.len(), SQLITE_PRAGMAS.len());
        assert!(format!("{:?}", log[0]).contains("journal_mode=WAL"));
    }

    #[test]
    fn sqlite_urls_are_detected() {
        assert!(is_sqlite("sqlite://fixme.db?mode=rwc"));
        assert!(is_sqlite("sqlite::memory:"));
        assert!(!is_sqlite("postgres://localhost/fixme"));
    }

    #[tokio::test]
    async fn connect_rejects_unknown_scheme() {
        assert!(connect("this-is-not-a-db-url").await.is_err());
    }
}
