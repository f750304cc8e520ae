//! Automatic message filter: profanity, mention spam and repeated words

use crate::config::FilterConfig;
use crate::moderation::{GuildActions, ModerationResult, audit_log};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Why a message was blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Profanity,
    Mentions,
    Repeats,
}

/// Compiled filter rules
#[derive(Debug)]
pub struct MessageFilter {
    config: FilterConfig,
    patterns: Vec<Regex>,
}

impl MessageFilter {
    /// # Errors
    /// Returns [`crate::moderation::ModerationError::InvalidPattern`] if a
    /// pattern does not compile.
    pub fn new(config: FilterConfig) -> ModerationResult<Self> {
        // Patterns only have to match the start of a word
        let patterns = config
            .patterns
            .iter()
            .map(|p| Regex::new(&format!("^(?:{p})")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { config, patterns })
    }

    #[must_use]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Lowercased words with markup characters removed
    #[must_use]
    pub fn words(&self, content: &str) -> Vec<String> {
        let stripped: String = content
            .to_lowercase()
            .chars()
            .filter(|c| !self.config.strip_chars.contains(*c))
            .collect();
        stripped.split_whitespace().map(str::to_owned).collect()
    }

    /// First rule a message breaks, if any
    #[must_use]
    pub fn check(&self, content: &str, mentions: usize) -> Option<Violation> {
        let words = self.words(content);

        if words
            .iter()
            .any(|word| self.patterns.iter().any(|p| p.is_match(word)))
        {
            return Some(Violation::Profanity);
        }
        if mentions > self.config.max_mentions {
            return Some(Violation::Mentions);
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for word in &words {
            *counts.entry(word.as_str()).or_default() += 1;
        }
        if counts.values().any(|n| *n > self.config.max_word_count) {
            return Some(Violation::Repeats);
        }
        None
    }

    /// Reply for a violation with `{mention}` filled in
    #[must_use]
    pub fn reply(&self, violation: Violation, mention: &str) -> String {
        let template = match violation {
            Violation::Profanity => &self.config.profanity_reply,
            Violation::Mentions => &self.config.mentions_reply,
            Violation::Repeats => &self.config.repeats_reply,
        };
        template.replace("{mention}", mention)
    }
}

/// Screens guild messages and removes the ones breaking a rule
#[derive(Clone)]
pub struct Filter {
    rules: Arc<MessageFilter>,
    actions: Arc<dyn GuildActions>,
    log_channel: Option<u64>,
}

impl Filter {
    /// # Errors
    /// See [`MessageFilter::new`].
    pub fn new(
        config: FilterConfig,
        actions: Arc<dyn GuildActions>,
        log_channel: Option<u64>,
    ) -> ModerationResult<Self> {
        Ok(Self {
            rules: Arc::new(MessageFilter::new(config)?),
            actions,
            log_channel,
        })
    }

    #[must_use]
    pub fn rules(&self) -> &MessageFilter {
        &self.rules
    }

    /// Delete the message and warn its author if it breaks a rule.
    /// Returns the violation, `None` if the message may stay.
    ///
    /// # Errors
    /// Fails if the message can't be deleted. A failed reply is only logged.
    pub async fn screen(
        &self,
        channel: u64,
        message: u64,
        author: u64,
        content: &str,
        mentions: usize,
    ) -> ModerationResult<Option<Violation>> {
        if !self.rules.config.enabled {
            return Ok(None);
        }
        let Some(violation) = self.rules.check(content, mentions) else {
            return Ok(None);
        };

        self.actions.delete_message(channel, message).await?;
        let reply = self.rules.reply(violation, &format!("<@{author}>"));
        if let Err(e) = self.actions.send_message(channel, reply.clone()).await {
            warn!("Could not reply to blocked message in {channel}: {e}");
        }

        info!(user = author, channel, ?violation, "Message blocked");
        audit_log(
            self.actions.as_ref(),
            self.log_channel,
            "Message blocked",
            format!("<@{author}> in <#{channel}> ({reply}): {content}"),
        )
        .await;
        Ok(Some(violation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::{MockGuildActions, ModerationError};

    const LOG: u64 = 900;

    fn config() -> FilterConfig {
        FilterConfig {
            patterns: vec!["heck".to_string(), "da+r+n".to_string()],
            max_mentions: 2,
            max_word_count: 3,
            ..FilterConfig::default()
        }
    }

    #[test]
    fn test_words_strip_markup() {
        let rules = MessageFilter::new(config()).unwrap();
        assert_eq!(rules.words("**Hello**,  World!"), ["hello", "world"]);
        assert!(rules.words("  ").is_empty());
    }

    #[test]
    fn test_check_order_and_thresholds() {
        let rules = MessageFilter::new(config()).unwrap();
        assert_eq!(rules.check("what the HECKING", 0), Some(Violation::Profanity));
        assert_eq!(rules.check("daaarn it", 0), Some(Violation::Profanity));
        // Patterns are anchored at the start of a word
        assert_eq!(rules.check("oheck", 0), None);
        assert_eq!(rules.check("heck <@1> <@2> <@3>", 3), Some(Violation::Profanity));
        assert_eq!(rules.check("hi all", 3), Some(Violation::Mentions));
        assert_eq!(rules.check("hi all", 2), None);
        assert_eq!(rules.check("spam spam, spam SPAM", 0), Some(Violation::Repeats));
        assert_eq!(rules.check("spam spam spam", 0), None);
    }

    #[test]
    fn test_reply_mentions_author() {
        let rules = MessageFilter::new(config()).unwrap();
        assert_eq!(
            rules.reply(Violation::Repeats, "<@7>"),
            "Don't repeat messages <@7>"
        );
    }

    #[test]
    fn test_invalid_pattern() {
        let config = FilterConfig {
            patterns: vec!["(".to_string()],
            ..FilterConfig::default()
        };
        assert!(matches!(
            MessageFilter::new(config),
            Err(ModerationError::InvalidPattern(_))
        ));
    }

    #[tokio::test]
    async fn test_screen_blocks_and_logs() {
        let mut actions = MockGuildActions::new();
        actions
            .expect_delete_message()
            .withf(|channel, message| *channel == 10 && *message == 11)
            .times(1)
            .returning(|_, _| Ok(()));
        actions
            .expect_send_message()
            .withf(|channel, content| *channel == 10 && content == "Watch your profanity <@7>")
            .times(1)
            .returning(|_, _| Ok(()));
        actions
            .expect_send_message()
            .withf(|channel, content| {
                *channel == LOG
                    && content.starts_with("**Message blocked**")
                    && content.ends_with("(Watch your profanity <@7>): oh heck")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let filter = Filter::new(config(), Arc::new(actions), Some(LOG)).unwrap();
        assert_eq!(
            filter.screen(10, 11, 7, "oh heck", 0).await.unwrap(),
            Some(Violation::Profanity)
        );
        assert_eq!(filter.screen(10, 12, 7, "oh hello", 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_disabled_filter_allows_everything() {
        let mut actions = MockGuildActions::new();
        actions.expect_delete_message().never();

        let config = FilterConfig {
            enabled: false,
            ..config()
        };
        let filter = Filter::new(config, Arc::new(actions), None).unwrap();
        assert_eq!(filter.screen(10, 11, 7, "heck", 9).await.unwrap(), None);
    }
}
