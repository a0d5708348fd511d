//! Per-identity daily operation budget.
//!
//! Usage is counted over the current UTC calendar day `[00:00, next 00:00)`
//! as computed by [`DayWindow`]. Enforcement and reporting both go through
//! [`QuotaCounter::day_window`] so they always agree on what "today" means.
//!
//! In strict mode the check and the later usage write are serialized per
//! identity: the [`QuotaGrant`] owns that identity's lock until it is
//! recorded or dropped. Lenient mode takes no lock, so concurrent requests
//! from one identity can each observe the same count and over-grant.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use slideai_core::logging::{COMPONENT, OPERATION, SERVICE_TYPE, SUBSYSTEM, USED_TODAY, USER_ID};
use slideai_core::{
    Clock, DayWindow, Error, Identity, NewUsageEvent, Result, ServiceType, UsageEvent,
    UsageRepository, UsageStatus,
};

/// Permission to perform one operation.
///
/// Dropping a grant without recording it consumes nothing.
#[derive(Debug)]
pub struct QuotaGrant {
    user_id: i64,
    is_privileged: bool,
    window: DayWindow,
    _guard: Option<OwnedMutexGuard<()>>,
}

impl QuotaGrant {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn is_privileged(&self) -> bool {
        self.is_privileged
    }

    /// The day window the grant was checked against.
    pub fn window(&self) -> DayWindow {
        self.window
    }

    /// Whether this grant holds the identity's single-writer lock.
    pub fn is_exclusive(&self) -> bool {
        self._guard.is_some()
    }
}

/// Result of a quota check.
#[derive(Debug)]
pub enum QuotaDecision {
    Granted(QuotaGrant),
    Exceeded { used: i64, limit: i64 },
}

impl QuotaDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// Convert into a grant, failing with [`Error::QuotaExceeded`] on denial.
    pub fn into_grant(self) -> Result<QuotaGrant> {
        match self {
            Self::Granted(grant) => Ok(grant),
            Self::Exceeded { used, limit } => Err(Error::QuotaExceeded { used, limit }),
        }
    }
}

/// Quota Counter.
pub struct QuotaCounter {
    usage: Arc<dyn UsageRepository>,
    clock: Arc<dyn Clock>,
    limit: i64,
    strict: bool,
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl QuotaCounter {
    pub fn new(usage: Arc<dyn UsageRepository>, clock: Arc<dyn Clock>, limit: i64, strict: bool) -> Self {
        Self {
            usage,
            clock,
            limit,
            strict,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// The UTC day containing the clock's current reading.
    pub fn day_window(&self) -> DayWindow {
        DayWindow::containing(self.clock.now())
    }

    /// Acquire the per-identity writer lock, pruning locks nobody holds.
    async fn lock_identity(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|id, lock| *id == user_id || Arc::strong_count(lock) > 1);
            locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Decide whether `identity` may perform one more operation today.
    ///
    /// Privileged identities are always granted without touching usage
    /// storage. A denial mutates nothing.
    pub async fn check_and_reserve(&self, identity: &Identity) -> Result<QuotaDecision> {
        if identity.is_privileged {
            return Ok(QuotaDecision::Granted(QuotaGrant {
                user_id: identity.id,
                is_privileged: true,
                window: self.day_window(),
                _guard: None,
            }));
        }

        let guard = if self.strict {
            Some(self.lock_identity(identity.id).await)
        } else {
            None
        };

        let window = self.day_window();
        let used = self
            .usage
            .count_in_window(identity.id, window.start, window.end)
            .await?;

        if used >= self.limit {
            info!(
                { SUBSYSTEM } = "service",
                { COMPONENT } = "quota",
                { OPERATION } = "check_and_reserve",
                { USER_ID } = identity.id,
                { USED_TODAY } = used,
                limit = self.limit,
                "Daily usage limit reached"
            );
            return Ok(QuotaDecision::Exceeded {
                used,
                limit: self.limit,
            });
        }

        debug!(
            { SUBSYSTEM } = "service",
            { COMPONENT } = "quota",
            { USER_ID } = identity.id,
            { USED_TODAY } = used,
            "Quota granted"
        );
        Ok(QuotaDecision::Granted(QuotaGrant {
            user_id: identity.id,
            is_privileged: false,
            window,
            _guard: guard,
        }))
    }

    /// Persist the usage event for a granted operation and release the grant.
    ///
    /// Returns `None` for privileged grants, which leave no history.
    pub async fn record_usage(
        &self,
        grant: QuotaGrant,
        service_type: ServiceType,
    ) -> Result<Option<UsageEvent>> {
        if grant.is_privileged {
            return Ok(None);
        }

        let event = self
            .usage
            .insert(NewUsageEvent {
                user_id: grant.user_id,
                service_type,
                usage_date: self.clock.now(),
            })
            .await?;

        debug!(
            { SUBSYSTEM } = "service",
            { COMPONENT } = "quota",
            { OPERATION } = "record_usage",
            { USER_ID } = grant.user_id,
            { SERVICE_TYPE } = %service_type,
            "Usage recorded"
        );
        drop(grant);
        Ok(Some(event))
    }

    /// Today's quota position. Pure read.
    pub async fn remaining_today(&self, identity: &Identity) -> Result<UsageStatus> {
        if identity.is_privileged {
            return Ok(UsageStatus::privileged(self.limit));
        }
        let window = self.day_window();
        let used = self
            .usage
            .count_in_window(identity.id, window.start, window.end)
            .await?;
        Ok(UsageStatus::from_count(used, self.limit))
    }

    /// Today's usage events for `identity`, oldest first.
    pub async fn usage_today(&self, identity: &Identity) -> Result<Vec<UsageEvent>> {
        let window = self.day_window();
        self.usage
            .list_in_window(identity.id, window.start, window.end)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use slideai_core::ManualClock;
    use slideai_db::MemoryUsageRepository;
    use std::time::Duration;

    struct Fixture {
        usage: Arc<MemoryUsageRepository>,
        clock: Arc<ManualClock>,
        quota: QuotaCounter,
    }

    fn fixture(strict: bool) -> Fixture {
        let usage = Arc::new(MemoryUsageRepository::new());
        let clock = Arc::new(ManualClock::starting_at(
            Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap(),
        ));
        let quota = QuotaCounter::new(usage.clone(), clock.clone(), 5, strict);
        Fixture {
            usage,
            clock,
            quota,
        }
    }

    fn user() -> Identity {
        Identity::new(7, "user@x.io", false)
    }

    async fn spend(quota: &QuotaCounter, identity: &Identity) {
        let grant = quota
            .check_and_reserve(identity)
            .await
            .unwrap()
            .into_grant()
            .unwrap();
        quota
            .record_usage(grant, ServiceType::VideoAbstract)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sixth_operation_denied() {
        let f = fixture(true);
        for _ in 0..5 {
            spend(&f.quota, &user()).await;
        }

        match f.quota.check_and_reserve(&user()).await.unwrap() {
            QuotaDecision::Exceeded { used, limit } => {
                assert_eq!(used, 5);
                assert_eq!(limit, 5);
            }
            QuotaDecision::Granted(_) => panic!("sixth operation must be denied"),
        }
        let status = f.quota.remaining_today(&user()).await.unwrap();
        assert_eq!((status.used, status.limit, status.remaining), (5, 5, 0));
        assert_eq!(f.usage.len().await, 5);
    }

    #[tokio::test]
    async fn test_remaining_decreases_by_one_per_event() {
        let f = fixture(true);
        let mut previous = f.quota.remaining_today(&user()).await.unwrap().remaining;
        assert_eq!(previous, 5);
        for _ in 0..5 {
            spend(&f.quota, &user()).await;
            let now = f.quota.remaining_today(&user()).await.unwrap().remaining;
            assert_eq!(now, previous - 1);
            previous = now;
        }
    }

    #[tokio::test]
    async fn test_dropped_grant_consumes_nothing() {
        let f = fixture(true);
        let decision = f.quota.check_and_reserve(&user()).await.unwrap();
        assert!(decision.is_granted());
        drop(decision);

        assert!(f.usage.is_empty().await);
        assert_eq!(f.quota.remaining_today(&user()).await.unwrap().remaining, 5);
    }

    #[tokio::test]
    async fn test_privileged_never_recorded() {
        let f = fixture(true);
        let admin = Identity::new(1, "admin@x.io", true);
        for _ in 0..100 {
            let grant = f
                .quota
                .check_and_reserve(&admin)
                .await
                .unwrap()
                .into_grant()
                .unwrap();
            assert!(!grant.is_exclusive());
            let event = f
                .quota
                .record_usage(grant, ServiceType::PptToVideo)
                .await
                .unwrap();
            assert!(event.is_none());
        }
        assert!(f.usage.is_empty().await);
        let status = f.quota.remaining_today(&admin).await.unwrap();
        assert!(status.is_privileged);
        assert_eq!(status.remaining, 5);
    }

    #[tokio::test]
    async fn test_budget_resets_at_utc_midnight() {
        let f = fixture(true);
        for _ in 0..5 {
            spend(&f.quota, &user()).await;
        }
        f.clock
            .set(Utc.with_ymd_and_hms(2026, 3, 10, 23, 59, 59).unwrap());
        assert!(!f.quota.check_and_reserve(&user()).await.unwrap().is_granted());

        f.clock.advance(Duration::from_secs(1));
        assert!(f.quota.check_and_reserve(&user()).await.unwrap().is_granted());
        assert_eq!(f.quota.remaining_today(&user()).await.unwrap().used, 0);
    }

    #[tokio::test]
    async fn test_usage_today_lists_window_only() {
        let f = fixture(false);
        spend(&f.quota, &user()).await;
        f.clock.advance(Duration::from_secs(24 * 3600));
        spend(&f.quota, &user()).await;

        let today = f.quota.usage_today(&user()).await.unwrap();
        assert_eq!(today.len(), 1);
        assert!(f.quota.day_window().contains(today[0].usage_date));
    }

    #[tokio::test]
    async fn test_strict_grant_is_exclusive() {
        let f = fixture(true);
        let grant = f
            .quota
            .check_and_reserve(&user())
            .await
            .unwrap()
            .into_grant()
            .unwrap();
        assert!(grant.is_exclusive());

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            f.quota.check_and_reserve(&user()),
        )
        .await;
        assert!(blocked.is_err(), "second check must wait for the grant");

        // Other identities are unaffected.
        let other = Identity::new(8, "other@x.io", false);
        assert!(f.quota.check_and_reserve(&other).await.unwrap().is_granted());
    }

    #[tokio::test]
    async fn test_lenient_grant_takes_no_lock() {
        let f = fixture(false);
        let first = f
            .quota
            .check_and_reserve(&user())
            .await
            .unwrap()
            .into_grant()
            .unwrap();
        assert!(!first.is_exclusive());
        assert!(f.quota.check_and_reserve(&user()).await.unwrap().is_granted());
    }

    #[tokio::test]
    async fn test_into_grant_maps_denial_to_error() {
        let decision = QuotaDecision::Exceeded { used: 5, limit: 5 };
        match decision.into_grant() {
            Err(Error::QuotaExceeded { used, limit }) => assert_eq!((used, limit), (5, 5)),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
