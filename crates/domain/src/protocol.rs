use crate::commands::{CommandSyntax, Keyword};
use crate::models::{Trigger, TriggerSummary};

/// Discord rejects messages longer than this many characters.
pub const MESSAGE_SIZE_LIMIT: usize = 2000;

const SECONDS_PER_HOUR: u64 = 60 * 60;
const SECONDS_PER_DAY: u64 = 24 * SECONDS_PER_HOUR;

/// `"<days>d <hours>h"`, truncating to whole units.
pub fn format_elapsed(elapsed_seconds: f64) -> String {
    let total = elapsed_seconds.max(0.0) as u64;
    let days = total / SECONDS_PER_DAY;
    let hours = (total % SECONDS_PER_DAY) / SECONDS_PER_HOUR;
    format!("{}d {}h", days, hours)
}

pub fn list_line(summary: &TriggerSummary) -> String {
    format!(
        "{}: last updated by {} {} ago",
        summary.trigger,
        summary.last_author,
        format_elapsed(summary.elapsed_seconds)
    )
}

/// Greedily packs lines into newline-joined messages of at most `limit`
/// characters each. A line longer than `limit` on its own is cut down to
/// `limit` characters. Never yields an empty message.
pub fn batch_lines<I>(lines: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut batches = Vec::new();
    let mut batch: Vec<String> = Vec::new();
    let mut total_chars = 0;

    for mut line in lines {
        let mut len = line.chars().count();
        if len > limit {
            if let Some((cut, _)) = line.char_indices().nth(limit) {
                line.truncate(cut);
            }
            len = limit;
        }
        if !batch.is_empty() && total_chars + len > limit {
            batches.push(batch.join("\n"));
            batch.clear();
            total_chars = 0;
        }
        // +1 for the joining newline
        total_chars += len + 1;
        batch.push(line);
    }

    if !batch.is_empty() {
        batches.push(batch.join("\n"));
    }
    batches
}

fn describe_response(content: &str, with_attachment: bool) -> String {
    match (content.is_empty(), with_attachment) {
        (false, false) => format!("'{}'", content),
        (false, true) => format!("'{}' and the attached file", content),
        (true, _) => "the attached file".to_string(),
    }
}

impl CommandSyntax {
    pub fn saved_reply(&self, trigger: &Trigger, content: &str, with_attachment: bool) -> String {
        format!(
            "Got it! Will respond to '{}' with {}.",
            self.summon(trigger),
            describe_response(content, with_attachment)
        )
    }

    pub fn random_added_reply(
        &self,
        trigger: &Trigger,
        content: &str,
        with_attachment: bool,
        total: i64,
    ) -> String {
        format!(
            "Got it! Will sometimes respond to '{}' with {}. (one of {} possible responses).",
            self.summon(trigger),
            describe_response(content, with_attachment),
            total
        )
    }

    pub fn added_all_reply(&self, trigger: &Trigger, added: usize, total: i64) -> String {
        format!(
            "Got it! Will sometimes respond to '{}' with one of those {} responses. ({} total.)",
            self.summon(trigger),
            added,
            total
        )
    }

    pub fn deleted_reply(&self, trigger: &Trigger) -> String {
        format!("Got it! Will no longer respond to '{}'.", self.summon(trigger))
    }

    pub fn overwrite_refused_reply(&self, trigger: &Trigger) -> String {
        format!(
            "Sorry, {} is already a command with multiple responses. \
             If you're sure you want to overwrite it, delete it first with {} {}",
            self.summon(trigger),
            self.command(Keyword::Delete),
            trigger
        )
    }

    pub fn attachment_too_large_reply(&self, size: u64, limit: u64) -> String {
        format!(
            "Sorry, that file is {} bytes. I can only save files up to {} bytes.",
            size, limit
        )
    }

    pub fn help_text(&self) -> String {
        format!(
            "Save a command: {save} <keyword> <response content> (or attach a single file)\n\
             Save a random command: {random} <keyword> <response content> ({addall} <keyword> <word> <word>... to add each word as a separate response)\n\
             Use a command: {key}<keyword>\n\
             Delete a command: {delete} <keyword>\n\
             List all commands: {list}\n\
             Show this message: {help}",
            save = self.command(Keyword::Save),
            random = self.command(Keyword::RandomAdd),
            addall = self.command(Keyword::AddAll),
            key = self.summoning_key,
            delete = self.command(Keyword::Delete),
            list = self.command(Keyword::List),
            help = self.command(Keyword::Help),
        )
    }
}
