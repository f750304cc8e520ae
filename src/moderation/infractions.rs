//! Warns, strikes and the escalation policy

use crate::config::{InfractionConfig, render};
use crate::models::{Infraction, InfractionKind, Table};
use crate::moderation::{GuildActions, ModerationResult, Mutes};
use crate::time::format_duration;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What should happen to a member after an infraction was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    None,
    Mute(Duration),
    Ban,
    /// The warn completed a strike; carries the strike auto-action
    AutoStrike(Option<Duration>),
}

/// Tally of a member's infractions
#[derive(Debug, Clone)]
pub struct History {
    pub infractions: Vec<Infraction>,
    pub total_warns: usize,
    pub active_warns: usize,
    pub strikes: usize,
    pub strikes_from_warns: usize,
    pub warns_to_strike: usize,
    pub strikes_to_ban: usize,
}

impl History {
    fn tally(infractions: Vec<Infraction>, policy: &InfractionConfig) -> Self {
        let warns_to_strike = policy.warns_to_strike.max(1) as usize;
        let total_warns = infractions
            .iter()
            .filter(|i| i.kind == InfractionKind::Warn)
            .count();
        let strikes = infractions.len() - total_warns;
        Self {
            infractions,
            total_warns,
            active_warns: total_warns % warns_to_strike,
            strikes,
            strikes_from_warns: total_warns / warns_to_strike,
            warns_to_strike,
            strikes_to_ban: policy.strikes_to_ban as usize,
        }
    }

    #[must_use]
    pub const fn active_strikes(&self) -> usize {
        self.strikes + self.strikes_from_warns
    }

    /// Plain text summary. Moderators are only listed when `show_moderators`.
    #[must_use]
    pub fn render(&self, name: &str, show_moderators: bool) -> String {
        let mut out = format!("History of {name}\n");
        let _ = writeln!(
            out,
            "Warnings: {} / {} ({} in total)",
            self.active_warns, self.warns_to_strike, self.total_warns
        );
        let _ = writeln!(
            out,
            "Strikes: {} / {} ({} from warnings)",
            self.active_strikes(),
            self.strikes_to_ban,
            self.strikes_from_warns
        );

        if self.infractions.is_empty() {
            out.push_str("No infractions.");
            return out;
        }

        out.push('\n');
        for infraction in &self.infractions {
            let date = DateTime::<Utc>::from_timestamp(infraction.date, 0)
                .map_or_else(|| infraction.date.to_string(), |d| d.format("%Y-%m-%d").to_string());
            let reason = infraction.reason.as_deref().unwrap_or("No reason given");
            let _ = write!(out, "- {} on {date}: {reason}", infraction.kind);
            if show_moderators {
                let _ = write!(out, " (by <@{}>)", infraction.moderator);
            }
            out.push('\n');
        }
        out
    }
}

/// Records infractions and applies the configured consequences
#[derive(Clone)]
pub struct Infractions {
    table: Table<Infraction>,
    policy: Arc<InfractionConfig>,
    actions: Arc<dyn GuildActions>,
    mutes: Mutes,
}

impl Infractions {
    #[must_use]
    pub fn new(
        table: Table<Infraction>,
        policy: InfractionConfig,
        actions: Arc<dyn GuildActions>,
        mutes: Mutes,
    ) -> Self {
        Self {
            table,
            policy: Arc::new(policy),
            actions,
            mutes,
        }
    }

    /// Store an infraction and work out the escalation it triggers
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn record(
        &self,
        kind: InfractionKind,
        user: u64,
        moderator: u64,
        reason: Option<String>,
    ) -> ModerationResult<Escalation> {
        self.table
            .insert(&Infraction {
                user,
                kind,
                reason,
                moderator,
                date: Utc::now().timestamp(),
            })
            .await?;

        let count = self
            .table
            .find([Infraction::USER.equals(user), Infraction::KIND.equals(kind)])
            .await?
            .len();

        let escalation = match kind {
            InfractionKind::Strike if count == self.policy.strikes_to_ban as usize => {
                Escalation::Ban
            }
            InfractionKind::Strike => self.policy.strike_action.mute_duration().into(),
            InfractionKind::Warn if count % self.policy.warns_to_strike.max(1) as usize == 0 => {
                Escalation::AutoStrike(self.policy.strike_action.mute_duration())
            }
            InfractionKind::Warn => self.policy.warn_action.mute_duration().into(),
        };

        info!(user, moderator, kind = %kind, count, ?escalation, "Infraction recorded");
        Ok(escalation)
    }

    /// Record an infraction, notify the member and carry out the escalation
    ///
    /// # Errors
    /// Propagates store failures and failures to mute or ban.
    pub async fn issue(
        &self,
        kind: InfractionKind,
        user: u64,
        moderator: u64,
        reason: Option<String>,
    ) -> ModerationResult<Escalation> {
        let escalation = self.record(kind, user, moderator, reason.clone()).await?;

        let messages = &self.policy.messages;
        let notice = match (kind, reason.as_deref()) {
            (InfractionKind::Warn, Some(reason)) => render(&messages.warn, reason),
            (InfractionKind::Warn, None) => messages.warn_no_reason.clone(),
            (InfractionKind::Strike, Some(reason)) => render(&messages.strike, reason),
            (InfractionKind::Strike, None) => messages.strike_no_reason.clone(),
        };
        self.notify(user, notice).await;

        match escalation {
            Escalation::None => {}
            Escalation::Mute(duration) => {
                self.mutes.mute(user, Some(duration), reason).await?;
            }
            Escalation::AutoStrike(mute) => {
                self.notify(user, messages.strike_auto.clone()).await;
                if let Some(duration) = mute {
                    let reason = format!("Automatic strike ({})", format_duration(duration));
                    self.mutes.mute(user, Some(duration), Some(reason)).await?;
                }
            }
            Escalation::Ban => self.actions.ban(user, reason).await?,
        }

        Ok(escalation)
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn history(&self, user: u64) -> ModerationResult<History> {
        let infractions = self.table.find([Infraction::USER.equals(user)]).await?;
        Ok(History::tally(infractions, &self.policy))
    }

    /// Forget every infraction of a member, returning how many were removed
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn pardon(&self, user: u64) -> ModerationResult<u64> {
        let removed = self.table.delete([Infraction::USER.equals(user)]).await?;
        info!(user, removed, "Infractions pardoned");
        Ok(removed)
    }

    async fn notify(&self, user: u64, content: String) {
        // Members with closed DMs still get the infraction
        if let Err(e) = self.actions.direct_message(user, content).await {
            warn!("Could not DM {user}: {e}");
        }
    }
}

impl From<Option<Duration>> for Escalation {
    fn from(mute: Option<Duration>) -> Self {
        mute.map_or(Self::None, Self::Mute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutoAction;
    use crate::models::{Models, SqliteStore, Store};
    use crate::moderation::MockGuildActions;

    const USER: u64 = 1_000_000_000_000_000_001;
    const MOD: u64 = 42;

    fn policy() -> InfractionConfig {
        InfractionConfig {
            warns_to_strike: 2,
            strikes_to_ban: 2,
            warn_action: AutoAction::default(),
            strike_action: AutoAction { mute: Some(600) },
            ..InfractionConfig::default()
        }
    }

    async fn service(actions: MockGuildActions) -> (Infractions, Models) {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().await.unwrap());
        let models = Models::open(store).await.unwrap();
        let actions: Arc<dyn GuildActions> = Arc::new(actions);
        let mutes = Mutes::new(models.mutes.clone(), Arc::clone(&actions), 9);
        let service = Infractions::new(models.infractions.clone(), policy(), actions, mutes);
        (service, models)
    }

    #[tokio::test]
    async fn test_record_escalation() {
        let (infractions, _models) = service(MockGuildActions::new()).await;

        let first = infractions
            .record(InfractionKind::Warn, USER, MOD, None)
            .await
            .unwrap();
        assert_eq!(first, Escalation::None);

        let second = infractions
            .record(InfractionKind::Warn, USER, MOD, Some("spam".to_string()))
            .await
            .unwrap();
        assert_eq!(second, Escalation::AutoStrike(Some(Duration::from_secs(600))));

        let strike = infractions
            .record(InfractionKind::Strike, USER, MOD, None)
            .await
            .unwrap();
        assert_eq!(strike, Escalation::Mute(Duration::from_secs(600)));

        let ban = infractions
            .record(InfractionKind::Strike, USER, MOD, None)
            .await
            .unwrap();
        assert_eq!(ban, Escalation::Ban);
    }

    #[tokio::test]
    async fn test_history_and_pardon() {
        let (infractions, _models) = service(MockGuildActions::new()).await;
        for _ in 0..3 {
            infractions
                .record(InfractionKind::Warn, USER, MOD, None)
                .await
                .unwrap();
        }
        infractions
            .record(InfractionKind::Strike, USER, MOD, Some("raid".to_string()))
            .await
            .unwrap();
        infractions
            .record(InfractionKind::Warn, 7, MOD, None)
            .await
            .unwrap();

        let history = infractions.history(USER).await.unwrap();
        assert_eq!(history.infractions.len(), 4);
        assert_eq!(history.total_warns, 3);
        assert_eq!(history.active_warns, 1);
        assert_eq!(history.strikes_from_warns, 1);
        assert_eq!(history.active_strikes(), 2);

        let public = history.render("someone", false);
        assert!(public.contains("Warnings: 1 / 2 (3 in total)"));
        assert!(public.contains("strike on "));
        assert!(public.contains("raid"));
        assert!(!public.contains("<@42>"));
        assert!(history.render("someone", true).contains("(by <@42>)"));

        assert_eq!(infractions.pardon(USER).await.unwrap(), 4);
        let history = infractions.history(USER).await.unwrap();
        assert!(history.infractions.is_empty());
        assert!(history.render("someone", false).ends_with("No infractions."));
        assert_eq!(infractions.history(7).await.unwrap().total_warns, 1);
    }

    #[tokio::test]
    async fn test_issue_strike_dms_and_mutes() {
        let mut actions = MockGuildActions::new();
        actions
            .expect_direct_message()
            .withf(|user, content| *user == USER && content == "You have received a strike: raid")
            .times(1)
            .returning(|_, _| Ok(()));
        actions
            .expect_add_role()
            .withf(|user, role, _| *user == USER && *role == 9)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let (infractions, models) = service(actions).await;
        let escalation = infractions
            .issue(InfractionKind::Strike, USER, MOD, Some("raid".to_string()))
            .await
            .unwrap();
        assert_eq!(escalation, Escalation::Mute(Duration::from_secs(600)));
        assert!(models.mutes.get(USER).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_issue_survives_closed_dms() {
        let mut actions = MockGuildActions::new();
        actions
            .expect_direct_message()
            .returning(|_, _| Err("Cannot send messages to this user".to_string().into()));

        let (infractions, _models) = service(actions).await;
        let escalation = infractions
            .issue(InfractionKind::Warn, USER, MOD, None)
            .await
            .unwrap();
        assert_eq!(escalation, Escalation::None);
    }
}
