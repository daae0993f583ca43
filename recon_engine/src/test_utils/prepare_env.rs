use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

/// Creates a fresh database at `url`, runs the migrations and returns a connected backend.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/recon_test_{}.db", dir.display(), rand::random::<u64>())
}

pub async fn run_migrations(url: &str) -> SqliteDatabase {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
    db
}

pub async fn create_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("Created Sqlite database {url}");
}

pub async fn drop_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
}

/// Installs a trigger that aborts every insert into `table`, simulating a store that accepts reads but fails writes.
pub async fn reject_inserts(db: &SqliteDatabase, table: &str) {
    let sql = format!(
        "CREATE TRIGGER reject_{table}_inserts BEFORE INSERT ON {table} BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END"
    );
    sqlx::query(&sql).execute(db.pool()).await.expect("Error installing trigger");
}

pub async fn allow_inserts(db: &SqliteDatabase, table: &str) {
    let sql = format!("DROP TRIGGER IF EXISTS reject_{table}_inserts");
    sqlx::query(&sql).execute(db.pool()).await.expect("Error dropping trigger");
}
