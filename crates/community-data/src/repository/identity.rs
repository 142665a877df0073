//! PostgreSQL 사용자/역할 repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use community_core::{
    DatabaseConfig, Permission, Role, RoleId, RoleSummary, UserCredentials, UserId, UserProfile,
    UserRecord, UserStats,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::IdentityStore;
use crate::error::{DataError, Result};
use crate::storage::bounded;

/// 데이터베이스 연결 풀 래퍼.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 새로운 데이터베이스 연결 풀을 생성합니다.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| DataError::ConnectionError("database.url is not set".to_string()))?;

        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// 내부 연결 풀을 반환합니다.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 데이터베이스 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations...");

        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DataError::QueryError(e.to_string()))?;

        info!("Migrations completed successfully");
        Ok(())
    }

    /// 데이터베이스 상태를 확인합니다.
    pub async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }
}

/// 사용자 + 역할 + 통계 조인 결과 행.
#[derive(Debug, FromRow)]
struct UserProfileRow {
    id: i64,
    username: String,
    email: String,
    role_id: i64,
    bio: Option<String>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    role_name: String,
    post_count: i64,
    follower_count: i64,
    following_count: i64,
}

impl From<UserProfileRow> for UserProfile {
    fn from(row: UserProfileRow) -> Self {
        UserProfile {
            role: RoleSummary {
                id: row.role_id,
                name: row.role_name,
            },
            stats: UserStats {
                post_count: row.post_count,
                follower_count: row.follower_count,
                following_count: row.following_count,
            },
            user: UserRecord {
                id: row.id,
                username: row.username,
                email: row.email,
                role_id: row.role_id,
                bio: row.bio,
                avatar_url: row.avatar_url,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        }
    }
}

/// PostgreSQL 기반 [`IdentityStore`].
///
/// 모든 쿼리는 `query_timeout` 안에 끝나야 하며, 넘기면
/// [`DataError::Timeout`]으로 실패합니다.
#[derive(Clone)]
pub struct PgIdentityStore {
    db: Database,
    query_timeout: Duration,
}

impl PgIdentityStore {
    pub fn new(db: Database, query_timeout: Duration) -> Self {
        Self { db, query_timeout }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    #[instrument(skip(self))]
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<UserProfile>> {
        let row: Option<UserProfileRow> = bounded(
            self.query_timeout,
            "find_user_by_id",
            async {
                sqlx::query_as(
                    r#"
                    SELECT
                        u.id, u.username, u.email, u.role_id, u.bio, u.avatar_url,
                        u.created_at, u.updated_at,
                        r.name AS role_name,
                        (SELECT COUNT(*) FROM posts p WHERE p.author_id = u.id) AS post_count,
                        (SELECT COUNT(*) FROM follows f WHERE f.following_id = u.id) AS follower_count,
                        (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.id) AS following_count
                    FROM users u
                    JOIN roles r ON r.id = u.role_id
                    WHERE u.id = $1
                    "#,
                )
                .bind(id)
                .fetch_optional(self.db.pool())
                .await
                .map_err(Into::into)
            },
        )
        .await?;

        Ok(row.map(UserProfile::from))
    }

    #[instrument(skip(self))]
    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<Role>> {
        bounded(self.query_timeout, "find_role_by_id", async {
            let role: Option<(i64, String)> =
                sqlx::query_as("SELECT id, name FROM roles WHERE id = $1")
                    .bind(id)
                    .fetch_optional(self.db.pool())
                    .await?;

            let Some((role_id, name)) = role else {
                return Ok(None);
            };

            let permissions: Vec<Permission> = sqlx::query_as(
                r#"
                SELECT p.id, p.name
                FROM permissions p
                JOIN role_permissions rp ON rp.permission_id = p.id
                WHERE rp.role_id = $1
                ORDER BY p.name
                "#,
            )
            .bind(role_id)
            .fetch_all(self.db.pool())
            .await?;

            debug!(role_id, permissions = permissions.len(), "Loaded role");

            Ok(Some(Role {
                id: role_id,
                name,
                permissions,
            }))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn find_credentials_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>> {
        bounded(self.query_timeout, "find_credentials_by_username", async {
            sqlx::query_as(
                "SELECT id, username, role_id, password_hash FROM users WHERE username = $1",
            )
            .bind(username)
            .fetch_optional(self.db.pool())
            .await
            .map_err(Into::into)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn find_credentials_by_id(&self, id: UserId) -> Result<Option<UserCredentials>> {
        bounded(self.query_timeout, "find_credentials_by_id", async {
            sqlx::query_as("SELECT id, username, role_id, password_hash FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(self.db.pool())
                .await
                .map_err(Into::into)
        })
        .await
    }

    #[instrument(skip(self, password_hash))]
    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<bool> {
        bounded(self.query_timeout, "update_password_hash", async {
            let result = sqlx::query(
                "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(password_hash)
            .execute(self.db.pool())
            .await?;

            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn ping(&self) -> Result<bool> {
        bounded(self.query_timeout, "ping", self.db.health_check()).await
    }
}
