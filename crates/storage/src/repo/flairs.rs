use crate::{models::SqlFlair, now_seconds, Db};
use domain::FlairRecord;

impl Db {
    /// Associates `role_id` with a reaction on a message.
    pub async fn save_flair(
        &self,
        author: &str,
        message_id: &str,
        reaction_id: &str,
        role_id: &str,
    ) -> anyhow::Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO flairs (created_at, author, message_id, reaction_id, role_id, enabled)
            VALUES (?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(now_seconds())
        .bind(author)
        .bind(message_id)
        .bind(reaction_id)
        .bind(role_id)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Role ids granted by reacting with `reaction_id` on `message_id`.
    pub async fn flair_roles(
        &self,
        message_id: &str,
        reaction_id: &str,
    ) -> anyhow::Result<Vec<String>> {
        let roles: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT role_id FROM flairs
            WHERE message_id = ? AND reaction_id = ? AND enabled = 1
            ORDER BY id ASC
            "#,
        )
        .bind(message_id)
        .bind(reaction_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    pub async fn list_flairs(&self) -> anyhow::Result<Vec<FlairRecord>> {
        let rows = sqlx::query_as::<_, SqlFlair>(
            r#"
            SELECT id, created_at, author, message_id, reaction_id, role_id, enabled
            FROM flairs
            WHERE enabled = 1
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn delete_flair(&self, message_id: &str, reaction_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE flairs SET enabled = 0 WHERE message_id = ? AND reaction_id = ? AND enabled = 1",
        )
        .bind(message_id)
        .bind(reaction_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
