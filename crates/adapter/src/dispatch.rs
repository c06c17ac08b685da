use domain::{
    protocol::{self, MESSAGE_SIZE_LIMIT},
    Attachment, CommandSyntax, InboundMessage, ParsedCommand, Reply, Trigger,
};
use storage::Db;
use thiserror::Error;
use tracing::{debug, info};

use crate::traits::ReplyChannel;

pub const DEFAULT_ADMIN_CHANNEL: &str = "newtons-study";
/// Files above this are refused before downloading; the bot could not
/// upload them again anyway.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct DispatchConfig {
    /// Mutating commands are only accepted in the channel with this name.
    pub admin_channel: String,
    pub syntax: CommandSyntax,
    pub message_size_limit: usize,
    pub max_attachment_bytes: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            admin_channel: DEFAULT_ADMIN_CHANNEL.to_string(),
            syntax: CommandSyntax::default(),
            message_size_limit: MESSAGE_SIZE_LIMIT,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
    #[error("failed to send reply: {0:#}")]
    Send(anyhow::Error),
    #[error("failed to download attachment: {0:#}")]
    Download(anyhow::Error),
}

impl DispatchError {
    /// Only the store is unrecoverable; platform hiccups end the current
    /// message and nothing else.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DispatchError::Storage(_))
    }
}

type DispatchResult = Result<(), DispatchError>;

/// Turns one inbound message into store operations and replies.
pub struct Dispatcher {
    db: Db,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(db: Db, config: DispatchConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub async fn handle(
        &self,
        own_id: &str,
        msg: &InboundMessage,
        channel: &dyn ReplyChannel,
    ) -> DispatchResult {
        // 忽略自己发出的消息，否则会死循环
        if msg.author_id == own_id {
            return Ok(());
        }

        let parsed = self.config.syntax.parse(&msg.text, msg.attachments.len());
        if let Ok(ParsedCommand::Trigger(trigger)) = &parsed {
            return self.lookup(trigger, channel).await;
        }

        // 以下命令只在管理频道生效
        if msg.channel_name != self.config.admin_channel {
            return Ok(());
        }

        let command = match parsed {
            Ok(command) => command,
            Err(usage) => {
                debug!(actor = %msg.author_name, "Rejected malformed command: {}", usage);
                return send(channel, Reply::text(usage.to_string())).await;
            }
        };

        match command {
            ParsedCommand::Delete { trigger } => self.delete(msg, &trigger, channel).await,
            ParsedCommand::Save {
                trigger,
                content,
                with_attachment,
            } => {
                self.save(msg, &trigger, &content, with_attachment, channel)
                    .await
            }
            ParsedCommand::AddAll { trigger, words } => {
                self.add_all(msg, &trigger, &words, channel).await
            }
            ParsedCommand::RandomAdd {
                trigger,
                content,
                with_attachment,
            } => {
                self.random_add(msg, &trigger, &content, with_attachment, channel)
                    .await
            }
            ParsedCommand::List => self.list(channel).await,
            ParsedCommand::Help => send(channel, Reply::text(self.config.syntax.help_text())).await,
            ParsedCommand::Trigger(_) | ParsedCommand::Unrecognized => Ok(()),
        }
    }

    async fn lookup(&self, trigger: &Trigger, channel: &dyn ReplyChannel) -> DispatchResult {
        let response = self
            .db
            .get_command(trigger)
            .await
            .map_err(DispatchError::Storage)?;
        if response.is_empty() {
            return Ok(());
        }
        send(
            channel,
            Reply {
                content: response.content,
                attachment: response.attachment,
            },
        )
        .await
    }

    async fn delete(
        &self,
        msg: &InboundMessage,
        trigger: &Trigger,
        channel: &dyn ReplyChannel,
    ) -> DispatchResult {
        self.db
            .delete_command(trigger)
            .await
            .map_err(DispatchError::Storage)?;
        info!(actor = %msg.author_name, trigger = %trigger, "Command deleted");
        send(channel, Reply::text(self.config.syntax.deleted_reply(trigger))).await
    }

    async fn save(
        &self,
        msg: &InboundMessage,
        trigger: &Trigger,
        content: &str,
        with_attachment: bool,
        channel: &dyn ReplyChannel,
    ) -> DispatchResult {
        let syntax = &self.config.syntax;

        // 多回复命令不允许被 save 静默覆盖
        let existing = self
            .db
            .count_commands(trigger)
            .await
            .map_err(DispatchError::Storage)?;
        if existing > 1 {
            return send(channel, Reply::text(syntax.overwrite_refused_reply(trigger))).await;
        }

        if let Some(reply) = self.refuse_oversized(msg, with_attachment) {
            return send(channel, reply).await;
        }
        let attachment = download_if(with_attachment, channel).await?;
        self.db
            .replace_command(&msg.author_name, trigger, content, attachment.as_ref())
            .await
            .map_err(DispatchError::Storage)?;
        info!(
            actor = %msg.author_name,
            trigger = %trigger,
            content = %content,
            attachment = with_attachment,
            "Command saved"
        );

        send(
            channel,
            Reply::text(syntax.saved_reply(trigger, content, with_attachment)),
        )
        .await
    }

    async fn add_all(
        &self,
        msg: &InboundMessage,
        trigger: &Trigger,
        words: &[String],
        channel: &dyn ReplyChannel,
    ) -> DispatchResult {
        for word in words {
            self.db
                .save_command(&msg.author_name, trigger, word, None)
                .await
                .map_err(DispatchError::Storage)?;
        }
        let total = self
            .db
            .count_commands(trigger)
            .await
            .map_err(DispatchError::Storage)?;
        info!(
            actor = %msg.author_name,
            trigger = %trigger,
            words = ?words,
            total,
            "Responses added to random command"
        );

        send(
            channel,
            Reply::text(self.config.syntax.added_all_reply(trigger, words.len(), total)),
        )
        .await
    }

    async fn random_add(
        &self,
        msg: &InboundMessage,
        trigger: &Trigger,
        content: &str,
        with_attachment: bool,
        channel: &dyn ReplyChannel,
    ) -> DispatchResult {
        if let Some(reply) = self.refuse_oversized(msg, with_attachment) {
            return send(channel, reply).await;
        }
        let attachment = download_if(with_attachment, channel).await?;
        self.db
            .save_command(&msg.author_name, trigger, content, attachment.as_ref())
            .await
            .map_err(DispatchError::Storage)?;
        let total = self
            .db
            .count_commands(trigger)
            .await
            .map_err(DispatchError::Storage)?;
        info!(
            actor = %msg.author_name,
            trigger = %trigger,
            content = %content,
            attachment = with_attachment,
            total,
            "Response added to random command"
        );

        send(
            channel,
            Reply::text(
                self.config
                    .syntax
                    .random_added_reply(trigger, content, with_attachment, total),
            ),
        )
        .await
    }

    fn refuse_oversized(&self, msg: &InboundMessage, with_attachment: bool) -> Option<Reply> {
        let limit = self.config.max_attachment_bytes;
        let meta = msg.attachments.first().filter(|_| with_attachment)?;
        if meta.size <= limit {
            return None;
        }
        debug!(actor = %msg.author_name, size = meta.size, "Refused oversized attachment");
        Some(Reply::text(
            self.config.syntax.attachment_too_large_reply(meta.size, limit),
        ))
    }

    async fn list(&self, channel: &dyn ReplyChannel) -> DispatchResult {
        let summaries = self
            .db
            .list_commands()
            .await
            .map_err(DispatchError::Storage)?;
        let lines = summaries.iter().map(protocol::list_line);

        // 空列表不发送任何消息（Discord 拒绝空消息）
        for batch in protocol::batch_lines(lines, self.config.message_size_limit) {
            send(channel, Reply::text(batch)).await?;
        }
        Ok(())
    }
}

async fn send(channel: &dyn ReplyChannel, reply: Reply) -> DispatchResult {
    channel.send(reply).await.map_err(DispatchError::Send)
}

async fn download_if(
    wanted: bool,
    channel: &dyn ReplyChannel,
) -> Result<Option<Attachment>, DispatchError> {
    if !wanted {
        return Ok(None);
    }
    let attachment = channel.download(0).await.map_err(DispatchError::Download)?;
    Ok(Some(attachment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use domain::AttachmentMeta;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const ADMIN: &str = "admin-channel";
    const BOT_ID: &str = "u-bot";

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<Reply>>,
        files: Vec<Attachment>,
        fail_sends: bool,
    }

    impl RecordingChannel {
        fn with_files(files: Vec<Attachment>) -> Self {
            Self {
                files,
                ..Default::default()
            }
        }

        fn take(&self) -> Vec<Reply> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    #[async_trait]
    impl ReplyChannel for RecordingChannel {
        async fn send(&self, reply: Reply) -> anyhow::Result<()> {
            if self.fail_sends {
                return Err(anyhow!("Must be 2000 or fewer in length."));
            }
            self.sent.lock().unwrap().push(reply);
            Ok(())
        }

        async fn download(&self, index: usize) -> anyhow::Result<Attachment> {
            self.files
                .get(index)
                .cloned()
                .ok_or_else(|| anyhow!("no attachment {}", index))
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        db: Db,
        _dir: TempDir,
    }

    impl Harness {
        async fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let url = format!("sqlite://{}", dir.path().join("bot.db").display());
            let db = Db::new(&url).await.unwrap();
            let config = DispatchConfig {
                admin_channel: ADMIN.to_string(),
                ..Default::default()
            };
            Self {
                dispatcher: Dispatcher::new(db.clone(), config),
                db,
                _dir: dir,
            }
        }

        /// Sends `text` as alice in `channel_name`, returns every reply.
        async fn send(&self, text: &str, channel_name: &str) -> Vec<Reply> {
            let channel = RecordingChannel::default();
            self.dispatcher
                .handle(BOT_ID, &message(text, channel_name), &channel)
                .await
                .unwrap();
            channel.take()
        }

        /// Like `send`, expecting exactly one text reply.
        async fn reply(&self, text: &str, channel_name: &str) -> String {
            let replies = self.send(text, channel_name).await;
            assert_eq!(replies.len(), 1, "expected one reply to {:?}, got {:?}", text, replies);
            replies[0].content.clone()
        }
    }

    fn message(text: &str, channel_name: &str) -> InboundMessage {
        InboundMessage {
            author_id: "u-alice".to_string(),
            author_name: "alice".to_string(),
            channel_name: channel_name.to_string(),
            text: text.to_string(),
            attachments: Vec::new(),
        }
    }

    fn with_attachments(mut msg: InboundMessage, files: &[Attachment]) -> InboundMessage {
        msg.attachments = files
            .iter()
            .map(|f| AttachmentMeta {
                size: f.data.len() as u64,
            })
            .collect();
        msg
    }

    #[tokio::test]
    async fn save_then_trigger() {
        let h = Harness::new().await;
        let reply = h.reply("!save Test I say something now", ADMIN).await;
        assert!(reply.contains("~test"));
        assert!(reply.contains("I say something now"));

        assert_eq!(h.reply("~TEST", "general").await, "I say something now");
        assert_eq!(h.reply("~test with trailing words", ADMIN).await, "I say something now");
    }

    #[tokio::test]
    async fn overwrite_collapses_to_latest() {
        let h = Harness::new().await;
        for i in 0..5 {
            h.reply(&format!("!save t content {}", i), ADMIN).await;
        }
        assert_eq!(h.db.count_commands(&Trigger::new("t")).await.unwrap(), 1);
        for _ in 0..10 {
            assert_eq!(h.reply("~t", "general").await, "content 4");
        }
    }

    #[tokio::test]
    async fn random_add_distributes_over_variants() {
        let h = Harness::new().await;
        let variants = ["heads", "tails", "edge"];
        for (i, v) in variants.iter().enumerate() {
            let reply = h.reply(&format!("!random-add coin {}", v), ADMIN).await;
            assert!(reply.contains(&format!("one of {} possible responses", i + 1)));
        }

        let mut seen = HashSet::new();
        for _ in 0..100 {
            seen.insert(h.reply("~coin", "general").await);
        }
        let expected: HashSet<String> = variants.iter().map(|s| s.to_string()).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn add_all_inserts_one_response_per_word() {
        let h = Harness::new().await;
        h.reply("!random-add dice 1", ADMIN).await;
        let reply = h.reply("!random-addall dice 2 3 4", ADMIN).await;
        assert!(reply.contains("one of those 3 responses"));
        assert!(reply.contains("(4 total.)"));
        assert_eq!(h.db.count_commands(&Trigger::new("dice")).await.unwrap(), 4);

        let reply = h.reply("!random-addall dice", ADMIN).await;
        assert!(reply.contains("!random-addall <keyword>"));
    }

    #[tokio::test]
    async fn delete_hides_trigger() {
        let h = Harness::new().await;
        h.reply("!save t x", ADMIN).await;
        let reply = h.reply("!delete t", ADMIN).await;
        assert!(reply.contains("no longer respond to '~t'"));

        assert!(h.send("~t", "general").await.is_empty());
        assert_eq!(h.db.count_commands(&Trigger::new("t")).await.unwrap(), 0);

        // 删除不存在的触发词同样回复成功
        let reply = h.reply("!delete never-existed", ADMIN).await;
        assert!(reply.contains("no longer respond to '~never-existed'"));
    }

    #[tokio::test]
    async fn delete_arity_is_checked() {
        let h = Harness::new().await;
        h.reply("!save t x", ADMIN).await;
        let reply = h.reply("!delete t extra", ADMIN).await;
        assert!(reply.contains("!delete <keyword>"));
        assert_eq!(h.reply("~t", "general").await, "x");
    }

    #[tokio::test]
    async fn save_refuses_to_collapse_random_command() {
        let h = Harness::new().await;
        h.reply("!random-add r one", ADMIN).await;
        h.reply("!random-add r two", ADMIN).await;

        let reply = h.reply("!save r three", ADMIN).await;
        assert!(reply.contains("!delete r"));
        assert_eq!(h.db.count_commands(&Trigger::new("r")).await.unwrap(), 2);

        let mut seen = HashSet::new();
        for _ in 0..60 {
            seen.insert(h.reply("~r", "general").await);
        }
        assert!(!seen.contains("three"));
    }

    #[tokio::test]
    async fn mutations_outside_admin_channel_are_ignored() {
        let h = Harness::new().await;
        h.reply("!save keep original", ADMIN).await;

        for text in [
            "!save keep changed",
            "!save new thing",
            "!delete keep",
            "!random-add keep other",
            "!random-addall keep a b c",
            "!list",
            "!help",
            "!delete",
        ] {
            assert!(h.send(text, "general").await.is_empty(), "{} replied", text);
        }

        assert_eq!(h.db.count_commands(&Trigger::new("keep")).await.unwrap(), 1);
        assert_eq!(h.db.count_commands(&Trigger::new("new")).await.unwrap(), 0);
        assert_eq!(h.reply("~keep", "general").await, "original");
    }

    #[tokio::test]
    async fn list_excludes_deleted_and_dedupes_random() {
        let h = Harness::new().await;
        h.reply("!save apple red", ADMIN).await;
        h.reply("!save banana yellow", ADMIN).await;
        h.reply("!random-addall cherry one two three", ADMIN).await;
        h.reply("!delete banana", ADMIN).await;

        let listing = h.reply("!list", ADMIN).await;
        assert!(listing.contains("apple: last updated by alice 0d 0h ago"));
        assert!(!listing.contains("banana"));
        assert_eq!(listing.matches("cherry:").count(), 1);
        assert_eq!(listing.lines().count(), 2);
    }

    #[tokio::test]
    async fn list_on_empty_store_sends_nothing() {
        let h = Harness::new().await;
        assert!(h.send("!list", ADMIN).await.is_empty());
    }

    #[tokio::test]
    async fn long_list_is_split_under_limit() {
        let h = Harness::new().await;
        for i in 0..120 {
            h.db
                .save_command("alice", &Trigger::new(format!("trigger-number-{:03}", i)), "x", None)
                .await
                .unwrap();
        }

        let replies = h.send("!list", ADMIN).await;
        assert!(replies.len() > 1);
        for r in &replies {
            assert!(r.content.chars().count() <= MESSAGE_SIZE_LIMIT);
            assert!(!r.content.is_empty());
        }
        let all: Vec<String> = replies
            .iter()
            .flat_map(|r| r.content.lines().map(str::to_string))
            .collect();
        assert_eq!(all.len(), 120);
        assert!(all[0].starts_with("trigger-number-000:"));
        assert!(all[119].starts_with("trigger-number-119:"));
    }

    #[tokio::test]
    async fn self_messages_are_ignored() {
        let h = Harness::new().await;
        h.reply("!save t x", ADMIN).await;

        let channel = RecordingChannel::default();
        for text in ["~t", "!save t y", "!delete t", "!list", "!help"] {
            let mut msg = message(text, ADMIN);
            msg.author_id = BOT_ID.to_string();
            h.dispatcher.handle(BOT_ID, &msg, &channel).await.unwrap();
        }
        assert!(channel.take().is_empty());
        assert_eq!(h.reply("~t", "general").await, "x");
    }

    #[tokio::test]
    async fn attachment_roundtrip() {
        let h = Harness::new().await;
        let file = Attachment::new("x.png", b"abc".to_vec());

        let channel = RecordingChannel::with_files(vec![file.clone()]);
        let msg = with_attachments(message("!save pic", ADMIN), &[file.clone()]);
        h.dispatcher.handle(BOT_ID, &msg, &channel).await.unwrap();
        let replies = channel.take();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].content.contains("attached file"));

        let replies = h.send("~pic", "general").await;
        assert_eq!(
            replies,
            vec![Reply {
                content: String::new(),
                attachment: Some(file),
            }]
        );
    }

    #[tokio::test]
    async fn too_many_attachments_are_rejected() {
        let h = Harness::new().await;
        let files = vec![
            Attachment::new("a.png", b"a".to_vec()),
            Attachment::new("b.png", b"b".to_vec()),
        ];
        let channel = RecordingChannel::with_files(files.clone());
        let msg = with_attachments(message("!random-add pics", ADMIN), &files);
        h.dispatcher.handle(BOT_ID, &msg, &channel).await.unwrap();

        let replies = channel.take();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].content.contains("only save one attached file"));
        assert_eq!(h.db.count_commands(&Trigger::new("pics")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_download_is_not_fatal_and_stores_nothing() {
        let h = Harness::new().await;
        let file = Attachment::new("gone.png", b"abc".to_vec());

        for text in ["!save pic", "!random-add pic"] {
            // 平台报告有附件，但下载失败
            let channel = RecordingChannel::default();
            let msg = with_attachments(message(text, ADMIN), &[file.clone()]);
            let err = h.dispatcher.handle(BOT_ID, &msg, &channel).await.unwrap_err();
            assert!(matches!(err, DispatchError::Download(_)), "{}: {:?}", text, err);
            assert!(!err.is_fatal());
            assert!(channel.take().is_empty());
        }
        assert_eq!(h.db.count_commands(&Trigger::new("pic")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn oversized_attachment_is_refused_before_download() {
        let h = Harness::new().await;
        let channel = RecordingChannel::default();
        let mut msg = message("!save big", ADMIN);
        msg.attachments = vec![AttachmentMeta {
            size: DEFAULT_MAX_ATTACHMENT_BYTES + 1,
        }];

        // 没有可下载的文件：若尝试下载会返回错误
        h.dispatcher.handle(BOT_ID, &msg, &channel).await.unwrap();
        let replies = channel.take();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].content.contains("I can only save files up to"));
        assert_eq!(h.db.count_commands(&Trigger::new("big")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn long_trigger_does_not_hide_the_rest_of_the_list() {
        let h = Harness::new().await;
        h.db
            .save_command("alice", &Trigger::new("a".repeat(1990)), "x", None)
            .await
            .unwrap();
        h.db
            .save_command("bob", &Trigger::new("zebra"), "y", None)
            .await
            .unwrap();

        let replies = h.send("!list", ADMIN).await;
        assert_eq!(replies.len(), 2);
        assert!(replies
            .iter()
            .all(|r| r.content.chars().count() <= MESSAGE_SIZE_LIMIT));
        assert!(replies[1].content.starts_with("zebra: last updated by bob"));
    }

    #[tokio::test]
    async fn save_without_content_is_a_usage_error() {
        let h = Harness::new().await;
        let reply = h.reply("!save lonely", ADMIN).await;
        assert!(reply.contains("!save <keyword> <response content>"));
        assert_eq!(h.db.count_commands(&Trigger::new("lonely")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn help_enumerates_commands() {
        let h = Harness::new().await;
        let help = h.reply("!help", ADMIN).await;
        for cmd in ["!save", "!random-add", "!random-addall", "!delete", "!list"] {
            assert!(help.contains(cmd));
        }
    }

    #[tokio::test]
    async fn ordinary_chat_is_ignored() {
        let h = Harness::new().await;
        assert!(h.send("just chatting", ADMIN).await.is_empty());
        assert!(h.send("~unknown", "general").await.is_empty());
    }

    #[tokio::test]
    async fn send_failures_are_not_fatal() {
        let h = Harness::new().await;
        let channel = RecordingChannel {
            fail_sends: true,
            ..Default::default()
        };
        let err = h
            .dispatcher
            .handle(BOT_ID, &message("!save t x", ADMIN), &channel)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Send(_)));
        assert!(!err.is_fatal());

        // 存储已生效，只是回复失败
        assert_eq!(h.reply("~t", "general").await, "x");
    }
}
