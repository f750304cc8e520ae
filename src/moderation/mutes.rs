//! Mute role management with timed unmutes

use crate::models::{Mute, Table};
use crate::moderation::{GuildActions, ModerationResult, Timers};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct Mutes {
    table: Table<Mute>,
    actions: Arc<dyn GuildActions>,
    role: u64,
    timers: Timers,
}

impl Mutes {
    #[must_use]
    pub fn new(table: Table<Mute>, actions: Arc<dyn GuildActions>, role: u64) -> Self {
        Self {
            table,
            actions,
            role,
            timers: Timers::new(),
        }
    }

    /// Give a member the mute role. A timed mute replaces any earlier one.
    ///
    /// # Errors
    /// Fails if the role can't be added or the mute can't be stored.
    pub async fn mute(
        &self,
        user: u64,
        duration: Option<Duration>,
        reason: Option<String>,
    ) -> ModerationResult<()> {
        self.actions.add_role(user, self.role, reason.clone()).await?;

        self.timers.cancel(user);
        self.table.delete(Mute::USER.equals(user)).await?;

        if let Some(duration) = duration {
            let seconds = i64::try_from(duration.as_secs()).unwrap_or(i64::MAX);
            let until = Utc::now().timestamp().saturating_add(seconds);
            self.table.insert(&Mute { user, until, reason }).await?;
            self.schedule(user, until, duration);
        }

        info!(user, ?duration, "Member muted");
        Ok(())
    }

    /// Lift a mute now, cancelling its timer
    ///
    /// # Errors
    /// Fails if the role can't be removed or the row can't be deleted.
    pub async fn unmute(&self, user: u64) -> ModerationResult<()> {
        self.timers.cancel(user);
        self.lift(user).await
    }

    /// Re-arm timers for mutes stored before a restart. Returns how many
    /// were rescheduled; already expired ones are lifted right away.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn restore(&self) -> ModerationResult<usize> {
        let now = Utc::now().timestamp();
        let mut scheduled = 0;

        for mute in self.table.find_all().await? {
            let remaining = mute.until.saturating_sub(now);
            if remaining <= 0 {
                if let Err(e) = self.lift(mute.user).await {
                    error!("Failed to lift expired mute of {}: {e}", mute.user);
                }
            } else {
                self.schedule(
                    mute.user,
                    mute.until,
                    Duration::from_secs(remaining.unsigned_abs()),
                );
                scheduled += 1;
            }
        }

        info!(scheduled, "Mutes restored");
        Ok(scheduled)
    }

    #[must_use]
    pub fn is_scheduled(&self, user: u64) -> bool {
        self.timers.is_scheduled(user)
    }

    fn schedule(&self, user: u64, until: i64, delay: Duration) {
        let this = self.clone();
        self.timers.schedule(user, delay, async move {
            if let Err(e) = this.expire(user, until).await {
                error!("Failed to unmute {user}: {e}");
            }
        });
    }

    /// Timer path: only the row this timer was armed for is removed, so a
    /// mute issued while the role was being removed survives.
    async fn expire(&self, user: u64, until: i64) -> ModerationResult<()> {
        self.actions.remove_role(user, self.role).await?;
        self.table
            .delete([Mute::USER.equals(user), Mute::UNTIL.equals(until)])
            .await?;
        info!(user, "Mute expired");
        Ok(())
    }

    async fn lift(&self, user: u64) -> ModerationResult<()> {
        self.actions.remove_role(user, self.role).await?;
        self.table.delete(Mute::USER.equals(user)).await?;
        info!(user, "Member unmuted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Models, SqliteStore, Store};
    use crate::moderation::MockGuildActions;

    const ROLE: u64 = 99;

    async fn mutes(actions: MockGuildActions) -> (Mutes, Table<Mute>) {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().await.unwrap());
        let table = Models::open(store).await.unwrap().mutes;
        (Mutes::new(table.clone(), Arc::new(actions), ROLE), table)
    }

    #[tokio::test]
    async fn test_timed_mute_expires() {
        let mut actions = MockGuildActions::new();
        actions
            .expect_add_role()
            .withf(|user, role, reason| *user == 5 && *role == ROLE && reason.as_deref() == Some("spam"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        actions
            .expect_remove_role()
            .withf(|user, role| *user == 5 && *role == ROLE)
            .times(1)
            .returning(|_, _| Ok(()));

        let (mutes, table) = mutes(actions).await;
        mutes
            .mute(5, Some(Duration::from_millis(50)), Some("spam".to_string()))
            .await
            .unwrap();
        assert!(mutes.is_scheduled(5));
        assert_eq!(table.get(5u64).await.unwrap().unwrap().reason.as_deref(), Some("spam"));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!mutes.is_scheduled(5));
        assert!(table.get(5u64).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_permanent_mute_replaces_timed_one() {
        let mut actions = MockGuildActions::new();
        actions.expect_add_role().times(2).returning(|_, _, _| Ok(()));
        actions.expect_remove_role().never();

        let (mutes, table) = mutes(actions).await;
        mutes
            .mute(5, Some(Duration::from_secs(3600)), None)
            .await
            .unwrap();
        mutes.mute(5, None, None).await.unwrap();

        assert!(!mutes.is_scheduled(5));
        assert!(table.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unmute_cancels_timer() {
        let mut actions = MockGuildActions::new();
        actions.expect_add_role().returning(|_, _, _| Ok(()));
        actions.expect_remove_role().times(1).returning(|_, _| Ok(()));

        let (mutes, table) = mutes(actions).await;
        mutes
            .mute(5, Some(Duration::from_millis(100)), None)
            .await
            .unwrap();
        mutes.unmute(5).await.unwrap();
        assert!(!mutes.is_scheduled(5));
        assert!(table.get(5u64).await.unwrap().is_none());

        // The aborted timer must not remove the role a second time
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    #[tokio::test]
    async fn test_restore() {
        let mut actions = MockGuildActions::new();
        actions
            .expect_remove_role()
            .withf(|user, _| *user == 1)
            .times(1)
            .returning(|_, _| Ok(()));

        let (mutes, table) = mutes(actions).await;
        let now = Utc::now().timestamp();
        table
            .insert(&Mute { user: 1, until: now - 10, reason: None })
            .await
            .unwrap();
        table
            .insert(&Mute { user: 2, until: now + 3600, reason: None })
            .await
            .unwrap();

        assert_eq!(mutes.restore().await.unwrap(), 1);
        assert!(mutes.is_scheduled(2));
        assert!(!mutes.is_scheduled(1));
        assert_eq!(table.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expiry_keeps_newer_mute() {
        let mut actions = MockGuildActions::new();
        actions
            .expect_remove_role()
            .withf(|user, role| *user == 5 && *role == ROLE)
            .times(1)
            .returning(|_, _| Ok(()));

        let (mutes, table) = mutes(actions).await;
        let now = Utc::now().timestamp();
        // Re-muted while the first timer was finishing
        let newer = Mute {
            user: 5,
            until: now + 3600,
            reason: Some("again".to_string()),
        };
        table.insert(&newer).await.unwrap();

        mutes.expire(5, now - 1).await.unwrap();
        assert_eq!(table.get(5u64).await.unwrap(), Some(newer));
    }
}
