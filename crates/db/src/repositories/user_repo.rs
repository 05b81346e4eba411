//! Read-only repository for the `users` table (identity is provisioned
//! externally).

use sqlx::PgPool;

use eventra_core::types::DbId;

use crate::models::user::User;

/// Column list for `users` queries.
const COLUMNS: &str = "id, email, display_name, category, role, created_at, updated_at";

pub struct UserRepo;

impl UserRepo {
    /// Find a user by primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
