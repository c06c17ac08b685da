use thiserror::Error;

use crate::models::Trigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Delete,
    Save,
    AddAll,
    RandomAdd,
    List,
    Help,
}

impl Keyword {
    // 按整个首词匹配：random-addall 永远不会落到 random-add
    const TABLE: &'static [(&'static str, Keyword)] = &[
        ("delete", Keyword::Delete),
        ("save", Keyword::Save),
        ("random-addall", Keyword::AddAll),
        ("random-add", Keyword::RandomAdd),
        ("list", Keyword::List),
        ("help", Keyword::Help),
    ];

    pub fn lookup(name: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(word, _)| *word == name)
            .map(|(_, kw)| *kw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Delete => "delete",
            Keyword::Save => "save",
            Keyword::AddAll => "random-addall",
            Keyword::RandomAdd => "random-add",
            Keyword::List => "list",
            Keyword::Help => "help",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    /// `~keyword`, allowed in every channel.
    Trigger(Trigger),
    Save {
        trigger: Trigger,
        content: String,
        with_attachment: bool,
    },
    RandomAdd {
        trigger: Trigger,
        content: String,
        with_attachment: bool,
    },
    AddAll {
        trigger: Trigger,
        words: Vec<String>,
    },
    Delete {
        trigger: Trigger,
    },
    List,
    Help,
    Unrecognized,
}

/// Malformed admin commands. The `Display` text is what gets sent back.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("Sorry, bud. I need the format '{command} <keyword>'.")]
    Delete { command: String },
    #[error("Sorry, I need the format '{command} <keyword> <response content>'. The content can be left out if exactly one file is attached.")]
    Content { command: String },
    #[error("Sorry, I need the format '{command} <keyword> <response> <response> <response>...'.")]
    AddAll { command: String },
    #[error("Sorry, I can only save one attached file per response, but {count} were attached.")]
    TooManyAttachments { count: usize },
}

/// The prefixes that turn chat text into commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSyntax {
    pub summoning_key: String,
    pub command_prefix: String,
}

impl Default for CommandSyntax {
    fn default() -> Self {
        Self {
            summoning_key: "~".to_string(),
            command_prefix: "!".to_string(),
        }
    }
}

impl CommandSyntax {
    pub fn new(summoning_key: impl Into<String>, command_prefix: impl Into<String>) -> Self {
        Self {
            summoning_key: summoning_key.into(),
            command_prefix: command_prefix.into(),
        }
    }

    /// Full command token for a keyword, e.g. `!save`.
    pub fn command(&self, keyword: Keyword) -> String {
        format!("{}{}", self.command_prefix, keyword.as_str())
    }

    /// How a trigger is invoked, e.g. `~hello`.
    pub fn summon(&self, trigger: &Trigger) -> String {
        format!("{}{}", self.summoning_key, trigger)
    }

    pub fn parse(&self, text: &str, attachment_count: usize) -> Result<ParsedCommand, UsageError> {
        let Some(head) = text.split_whitespace().next() else {
            return Ok(ParsedCommand::Unrecognized);
        };

        if let Some(word) = head.strip_prefix(self.summoning_key.as_str()) {
            if word.is_empty() {
                return Ok(ParsedCommand::Unrecognized);
            }
            return Ok(ParsedCommand::Trigger(Trigger::new(word)));
        }

        let Some(keyword) = head
            .strip_prefix(self.command_prefix.as_str())
            .and_then(Keyword::lookup)
        else {
            return Ok(ParsedCommand::Unrecognized);
        };

        match keyword {
            Keyword::Delete => {
                let tokens: Vec<&str> = text.split_whitespace().collect();
                if tokens.len() != 2 {
                    return Err(UsageError::Delete {
                        command: self.command(keyword),
                    });
                }
                Ok(ParsedCommand::Delete {
                    trigger: Trigger::new(tokens[1]),
                })
            }
            Keyword::Save | Keyword::RandomAdd => {
                let (trigger, content) = self.parse_content(text, keyword, attachment_count)?;
                let with_attachment = attachment_count == 1;
                Ok(if keyword == Keyword::Save {
                    ParsedCommand::Save {
                        trigger,
                        content,
                        with_attachment,
                    }
                } else {
                    ParsedCommand::RandomAdd {
                        trigger,
                        content,
                        with_attachment,
                    }
                })
            }
            Keyword::AddAll => {
                let tokens: Vec<&str> = text.split_whitespace().collect();
                if tokens.len() < 3 {
                    return Err(UsageError::AddAll {
                        command: self.command(keyword),
                    });
                }
                Ok(ParsedCommand::AddAll {
                    trigger: Trigger::new(tokens[1]),
                    words: tokens[2..].iter().map(|w| w.to_string()).collect(),
                })
            }
            Keyword::List => Ok(ParsedCommand::List),
            Keyword::Help => Ok(ParsedCommand::Help),
        }
    }

    fn parse_content(
        &self,
        text: &str,
        keyword: Keyword,
        attachment_count: usize,
    ) -> Result<(Trigger, String), UsageError> {
        if attachment_count > 1 {
            return Err(UsageError::TooManyAttachments {
                count: attachment_count,
            });
        }

        let (_, rest) = split_word(text);
        let (trigger, content) = split_word(rest);
        let content = content.trim_end();
        if trigger.is_empty() || (content.is_empty() && attachment_count == 0) {
            return Err(UsageError::Content {
                command: self.command(keyword),
            });
        }
        Ok((Trigger::new(trigger), content.to_string()))
    }
}

/// Splits off the first whitespace-delimited word, keeping the remainder's
/// inner whitespace intact.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}
