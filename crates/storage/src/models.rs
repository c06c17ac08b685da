use domain::{decode_attachment, CommandRecord, FlairRecord, Trigger, TriggerSummary};
use sqlx::FromRow;

#[derive(FromRow)]
pub struct SqlCommand {
    pub id: i64,
    pub created_at: f64,
    pub author: String,
    pub trigger: String,
    pub content: String,
    pub enabled: bool,
    pub attachment: Option<Vec<u8>>,
}

impl TryFrom<SqlCommand> for CommandRecord {
    type Error = anyhow::Error;

    fn try_from(sql: SqlCommand) -> anyhow::Result<Self> {
        let attachment = sql
            .attachment
            .as_deref()
            .map(decode_attachment)
            .transpose()?;
        Ok(CommandRecord {
            id: sql.id,
            created_at: sql.created_at,
            author: sql.author,
            trigger: Trigger::new(sql.trigger),
            content: sql.content,
            attachment,
            enabled: sql.enabled,
        })
    }
}

// list 聚合结果：每个触发词最新的一条
#[derive(FromRow)]
pub struct SqlTriggerSummary {
    pub trigger: String,
    pub author: String,
    pub created_at: f64,
}

impl SqlTriggerSummary {
    pub fn into_summary(self, now: f64) -> TriggerSummary {
        TriggerSummary {
            trigger: Trigger::new(self.trigger),
            last_author: self.author,
            elapsed_seconds: (now - self.created_at).max(0.0),
        }
    }
}

#[derive(FromRow)]
pub struct SqlFlair {
    pub id: i64,
    pub created_at: f64,
    pub author: String,
    pub message_id: String,
    pub reaction_id: String,
    pub role_id: String,
    pub enabled: bool,
}

impl From<SqlFlair> for FlairRecord {
    fn from(sql: SqlFlair) -> Self {
        FlairRecord {
            id: sql.id,
            created_at: sql.created_at,
            author: sql.author,
            message_id: sql.message_id,
            reaction_id: sql.reaction_id,
            role_id: sql.role_id,
            enabled: sql.enabled,
        }
    }
}
