use crate::error::StoreResult;
use sqlx::SqlitePool;
use tracing::info;

/// Ordered schema migrations: (version, name, script).
const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "001_initial_schema",
    include_str!("../../migrations/001_initial_schema.sql"),
)];

/// Database migration manager
pub struct MigrationRunner {
    pool: SqlitePool,
}

impl MigrationRunner {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let applied_versions: Vec<i64> =
            sqlx::query_scalar("SELECT version FROM _migrations ORDER BY version")
                .fetch_all(&self.pool)
                .await?;

        for (version, name, script) in MIGRATIONS {
            if applied_versions.contains(version) {
                continue;
            }

            let mut tx = self.pool.begin().await?;
            for statement in split_statements(script) {
                sqlx::query(&statement).execute(&mut *tx).await?;
            }
            sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
                .bind(version)
                .bind(name)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            info!(version, name, "applied migration");
        }

        Ok(())
    }
}

/// Split a SQLite script into statements. `CREATE TRIGGER` bodies stay
/// whole up to their closing `END;`.
fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut buffer = String::new();
    let mut inside_trigger = false;

    for raw_line in script.lines() {
        let line = raw_line.trim_end();
        let upper = line.trim_start().to_uppercase();

        // Leading comments and blank lines never start a statement
        if buffer.trim().is_empty() && (upper.is_empty() || upper.starts_with("--")) {
            continue;
        }

        buffer.push_str(line);
        buffer.push('\n');

        if upper.starts_with("CREATE TRIGGER") {
            inside_trigger = true;
        }
        let is_end_of_trigger = inside_trigger && upper.ends_with("END;");

        if (line.ends_with(';') && !inside_trigger) || is_end_of_trigger {
            statements.push(buffer.trim().to_string());
            buffer.clear();
            inside_trigger = false;
        }
    }

    let trailing = buffer.trim();
    if !trailing.is_empty() {
        statements.push(trailing.to_string());
    }
    statements
}
