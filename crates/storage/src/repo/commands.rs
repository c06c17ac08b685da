use crate::{
    models::{SqlCommand, SqlTriggerSummary},
    now_seconds, Db,
};
use domain::{
    decode_attachment, encode_attachment, Attachment, CommandRecord, StoredResponse, Trigger,
    TriggerSummary,
};
use rand::seq::SliceRandom;
use sqlx::{Executor, Sqlite};

async fn insert_command<'e, E>(
    executor: E,
    author: &str,
    trigger: &Trigger,
    content: &str,
    attachment: Option<&Attachment>,
) -> anyhow::Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let blob = attachment.map(encode_attachment).transpose()?;
    let result = sqlx::query(
        r#"
        INSERT INTO commands (created_at, author, trigger, content, enabled, attachment)
        VALUES (?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(now_seconds())
    .bind(author)
    .bind(trigger.as_str())
    .bind(content)
    .bind(blob)
    .execute(executor)
    .await?;
    Ok(result.last_insert_rowid())
}

impl Db {
    /// Appends one enabled response for `trigger`. Returns the new row id.
    pub async fn save_command(
        &self,
        author: &str,
        trigger: &Trigger,
        content: &str,
        attachment: Option<&Attachment>,
    ) -> anyhow::Result<i64> {
        insert_command(&self.pool, author, trigger, content, attachment).await
    }

    /// Soft-deletes every response of `trigger` and inserts the new one in a
    /// single transaction, so a crash can't leave the trigger empty.
    pub async fn replace_command(
        &self,
        author: &str,
        trigger: &Trigger,
        content: &str,
        attachment: Option<&Attachment>,
    ) -> anyhow::Result<i64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE commands SET enabled = 0 WHERE trigger = ?")
            .bind(trigger.as_str())
            .execute(&mut *tx)
            .await?;
        let id = insert_command(&mut *tx, author, trigger, content, attachment).await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Picks one enabled response for `trigger` uniformly at random.
    pub async fn get_command(&self, trigger: &Trigger) -> anyhow::Result<StoredResponse> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM commands WHERE trigger = ? AND enabled = 1")
                .bind(trigger.as_str())
                .fetch_all(&self.pool)
                .await?;

        let picked = {
            let mut rng = rand::thread_rng();
            ids.choose(&mut rng).copied()
        };
        let Some(id) = picked else {
            return Ok(StoredResponse::default());
        };

        let row: Option<(String, Option<Vec<u8>>)> =
            sqlx::query_as("SELECT content, attachment FROM commands WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((content, blob)) = row else {
            return Ok(StoredResponse::default());
        };
        let attachment = blob.as_deref().map(decode_attachment).transpose()?;
        Ok(StoredResponse {
            content,
            attachment,
        })
    }

    pub async fn count_commands(&self, trigger: &Trigger) -> anyhow::Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM commands WHERE trigger = ? AND enabled = 1")
                .bind(trigger.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Soft delete: rows stay, `enabled` goes to 0. Returns how many rows were
    /// switched off; deleting an unknown trigger is not an error.
    pub async fn delete_command(&self, trigger: &Trigger) -> anyhow::Result<u64> {
        let result =
            sqlx::query("UPDATE commands SET enabled = 0 WHERE trigger = ? AND enabled = 1")
                .bind(trigger.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// One entry per active trigger, ordered by trigger, carrying the author
    /// and age of its newest active response.
    pub async fn list_commands(&self) -> anyhow::Result<Vec<TriggerSummary>> {
        let rows = sqlx::query_as::<_, SqlTriggerSummary>(
            r#"
            SELECT c.trigger, c.author, c.created_at
            FROM commands c
            WHERE c.enabled = 1
              AND c.id = (
                  SELECT MAX(id) FROM commands
                  WHERE trigger = c.trigger AND enabled = 1
              )
            ORDER BY c.trigger ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let now = now_seconds();
        Ok(rows.into_iter().map(|r| r.into_summary(now)).collect())
    }

    /// Full history of a trigger, deleted rows included, oldest first.
    pub async fn command_history(&self, trigger: &Trigger) -> anyhow::Result<Vec<CommandRecord>> {
        let rows = sqlx::query_as::<_, SqlCommand>(
            r#"
            SELECT id, created_at, author, trigger, content, enabled, attachment
            FROM commands
            WHERE trigger = ?
            ORDER BY id ASC
            "#,
        )
        .bind(trigger.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CommandRecord::try_from).collect()
    }
}
