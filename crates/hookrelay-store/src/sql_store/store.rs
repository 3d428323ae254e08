use crate::error::{StoreError, StoreResult};
use crate::sql_store::migrations::MigrationRunner;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use hookrelay_core::{
    store::{AccountStore, CredentialStore, RequestLogStore},
    Account, CoreResult, OAuthCredential, Plan, RequestLogEntry, RequestLogFilter,
    RequestLogPage, RequestLogRecord, TenantId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;

/// Timestamps are stored as fixed-width RFC 3339 text so range filters
/// compare correctly as strings.
fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(row: &SqliteRow, column: &str) -> StoreResult<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{} '{}': {}", column, raw, e)))
}

/// SQLite-based store implementation
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Create a new SqlStore with database URL and default pool size
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        Self::new_with_config(database_url, None).await
    }

    /// Create SqlStore with custom pool configuration
    pub async fn new_with_config(
        database_url: &str,
        max_connections: Option<u32>,
    ) -> StoreResult<Self> {
        let max_conn = max_connections.unwrap_or_else(|| {
            std::env::var("HOOKRELAY_DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10)
        });

        let pool = if let Some(path_str) = database_url.strip_prefix("sqlite://") {
            let path = PathBuf::from(path_str);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .foreign_keys(true);
            SqlitePoolOptions::new()
                .max_connections(max_conn)
                .connect_with(options)
                .await?
        } else {
            // e.g. sqlite::memory:, which must stay on one connection
            let options = SqliteConnectOptions::from_str(database_url)?
                .create_if_missing(true)
                .foreign_keys(true);
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await?
        };

        sqlx::query("PRAGMA journal_mode = WAL;")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous = NORMAL;")
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create SqlStore from existing pool (for testing)
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run migrations manually
    pub async fn migrate(&self) -> StoreResult<()> {
        MigrationRunner::new(self.pool.clone()).migrate().await
    }

    fn credential_from_row(row: &SqliteRow) -> StoreResult<OAuthCredential> {
        Ok(OAuthCredential {
            tenant_id: TenantId::new(row.try_get::<String, _>("member_id")?),
            domain: row.try_get("domain")?,
            access_token: row.try_get("access_token")?,
            refresh_token: row.try_get("refresh_token")?,
            expires_at: decode_ts(row, "expires_at")?,
            client_endpoint: row.try_get("client_endpoint")?,
            server_endpoint: row.try_get("server_endpoint")?,
            scope: row.try_get("scope")?,
        })
    }

    fn account_from_row(row: &SqliteRow) -> StoreResult<Account> {
        let plan: String = row.try_get("plan")?;
        Ok(Account {
            id: row.try_get("id")?,
            member_id: TenantId::new(row.try_get::<String, _>("member_id")?),
            domain: row.try_get("domain")?,
            plan: Plan::from_str(&plan)?,
            installed_at: decode_ts(row, "installed_at")?,
            updated_at: decode_ts(row, "updated_at")?,
        })
    }

    fn log_from_row(row: &SqliteRow) -> StoreResult<RequestLogRecord> {
        let status_code: Option<i64> = row.try_get("status_code")?;
        let execution_time_ms: Option<i64> = row.try_get("execution_time_ms")?;
        Ok(RequestLogRecord {
            id: row.try_get("id")?,
            entry: RequestLogEntry {
                account_id: row.try_get("account_id")?,
                url: row.try_get("url")?,
                method: row.try_get("method")?,
                status_code: status_code.and_then(|c| u16::try_from(c).ok()),
                success: row.try_get("success")?,
                execution_time_ms: execution_time_ms.map(|ms| ms.max(0) as u64),
                error_message: row.try_get("error_message")?,
                created_at: decode_ts(row, "created_at")?,
            },
        })
    }

    async fn fetch_account(&self, member_id: &TenantId) -> StoreResult<Option<Account>> {
        let row = sqlx::query(
            "SELECT id, member_id, domain, plan, installed_at, updated_at FROM accounts WHERE member_id = ?",
        )
        .bind(member_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::account_from_row).transpose()
    }
}

#[async_trait]
impl CredentialStore for SqlStore {
    async fn get(&self, tenant: &TenantId) -> CoreResult<Option<OAuthCredential>> {
        let row = sqlx::query(
            r#"
            SELECT member_id, domain, access_token, refresh_token, expires_at,
                   client_endpoint, server_endpoint, scope
            FROM oauth_tokens
            WHERE member_id = ?
            "#,
        )
        .bind(tenant.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(row.as_ref().map(Self::credential_from_row).transpose()?)
    }

    async fn upsert(&self, credential: &OAuthCredential) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO oauth_tokens (
                member_id, domain, access_token, refresh_token, expires_at,
                client_endpoint, server_endpoint, scope, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(member_id) DO UPDATE SET
                domain = excluded.domain,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                client_endpoint = COALESCE(excluded.client_endpoint, oauth_tokens.client_endpoint),
                server_endpoint = COALESCE(excluded.server_endpoint, oauth_tokens.server_endpoint),
                scope = COALESCE(excluded.scope, oauth_tokens.scope),
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(credential.tenant_id.as_str())
        .bind(&credential.domain)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(encode_ts(&credential.expires_at))
        .bind(credential.client_endpoint.as_deref())
        .bind(credential.server_endpoint.as_deref())
        .bind(credential.scope.as_deref())
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(())
    }

    async fn delete(&self, tenant: &TenantId) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM oauth_tokens WHERE member_id = ?")
            .bind(tenant.as_str())
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AccountStore for SqlStore {
    async fn upsert(&self, member_id: &TenantId, domain: &str) -> CoreResult<Account> {
        let now = encode_ts(&Utc::now());
        // An existing plan is kept
        sqlx::query(
            r#"
            INSERT INTO accounts (member_id, domain, plan, installed_at, updated_at)
            VALUES (?, ?, 'free', ?, ?)
            ON CONFLICT(member_id) DO UPDATE SET
                domain = excluded.domain,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(member_id.as_str())
        .bind(domain)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        self.fetch_account(member_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("account {}", member_id)).into())
    }

    async fn get_or_create(&self, member_id: &TenantId, domain: &str) -> CoreResult<Account> {
        if let Some(account) = self.fetch_account(member_id).await? {
            return Ok(account);
        }

        let now = encode_ts(&Utc::now());
        sqlx::query(
            r#"
            INSERT INTO accounts (member_id, domain, plan, installed_at, updated_at)
            VALUES (?, ?, 'free', ?, ?)
            ON CONFLICT(member_id) DO NOTHING
            "#,
        )
        .bind(member_id.as_str())
        .bind(domain)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        self.fetch_account(member_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("account {}", member_id)).into())
    }

    async fn get_by_member(&self, member_id: &TenantId) -> CoreResult<Option<Account>> {
        Ok(self.fetch_account(member_id).await?)
    }

    async fn update_plan(&self, member_id: &TenantId, plan: Plan) -> CoreResult<Option<Account>> {
        let result = sqlx::query("UPDATE accounts SET plan = ?, updated_at = ? WHERE member_id = ?")
            .bind(plan.as_str())
            .bind(encode_ts(&Utc::now()))
            .bind(member_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(self.fetch_account(member_id).await?)
    }
}

#[async_trait]
impl RequestLogStore for SqlStore {
    async fn append(&self, entry: &RequestLogEntry) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO request_logs (
                account_id, url, method, status_code, success,
                execution_time_ms, error_message, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.account_id)
        .bind(&entry.url)
        .bind(&entry.method)
        .bind(entry.status_code.map(i64::from))
        .bind(entry.success)
        .bind(entry.execution_time_ms.map(|ms| ms.min(i64::MAX as u64) as i64))
        .bind(entry.error_message.as_deref())
        .bind(encode_ts(&entry.created_at))
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;
        Ok(())
    }

    async fn count_since(&self, account_id: i64, since: DateTime<Utc>) -> CoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM request_logs WHERE account_id = ? AND created_at >= ?",
        )
        .bind(account_id)
        .bind(encode_ts(&since))
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::Database)?;
        Ok(count.max(0) as u64)
    }

    async fn list(&self, account_id: i64, filter: &RequestLogFilter) -> CoreResult<RequestLogPage> {
        const WHERE: &str = r#"
            WHERE account_id = ?
              AND (? IS NULL OR success = ?)
              AND (? IS NULL OR UPPER(method) = UPPER(?))
        "#;

        let method = filter.method.as_deref().map(str::trim).filter(|m| !m.is_empty());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM request_logs {}", WHERE))
            .bind(account_id)
            .bind(filter.success)
            .bind(filter.success)
            .bind(method)
            .bind(method)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::Database)?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT id, account_id, url, method, status_code, success,
                   execution_time_ms, error_message, created_at
            FROM request_logs
            {}
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
            WHERE
        ))
        .bind(account_id)
        .bind(filter.success)
        .bind(filter.success)
        .bind(method)
        .bind(method)
        .bind(filter.effective_limit() as i64)
        .bind(filter.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        let data = rows
            .iter()
            .map(Self::log_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(RequestLogPage::new(data, total.max(0) as u64, filter))
    }
}
