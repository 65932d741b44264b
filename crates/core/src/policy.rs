use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{OrderContext, PolicyDecision, PolicyReason};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRule {
    ReturnWindow,
    Blackout,
    MonthlyQuota,
}

/// Inclusive calendar interval during which cancellations are
/// categorically denied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BlackoutInterval {
    pub fn single_day(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub cancellation_window_days: u32,
    pub max_cancellations_per_month: u32,
    pub blackouts: Vec<BlackoutInterval>,
    /// Rule evaluation order; the first violated rule decides the
    /// denial reason. The default order is not canonical and may be
    /// reordered per deployment.
    pub precedence: Vec<PolicyRule>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            cancellation_window_days: 10,
            max_cancellations_per_month: 3,
            blackouts: vec![
                BlackoutInterval::single_day(NaiveDate::from_ymd_opt(2025, 12, 25).unwrap()),
                BlackoutInterval::single_day(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            ],
            precedence: vec![PolicyRule::ReturnWindow, PolicyRule::Blackout, PolicyRule::MonthlyQuota],
        }
    }
}

/// Cancellation-eligibility rules. Evaluation is pure: the decision is
/// a function of the order, the current date, and the caller-supplied
/// quota count. Quota persistence lives behind [`QuotaStore`].
#[derive(Clone, Debug, Default)]
pub struct CancellationPolicy {
    config: PolicyConfig,
}

impl CancellationPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn evaluate(
        &self,
        order: &OrderContext,
        as_of: NaiveDate,
        prior_cancellations: u32,
    ) -> PolicyDecision {
        for rule in &self.config.precedence {
            if let Some(reason) = self.violation(*rule, order, as_of, prior_cancellations) {
                return PolicyDecision::deny(reason);
            }
        }
        PolicyDecision::allow()
    }

    fn violation(
        &self,
        rule: PolicyRule,
        order: &OrderContext,
        as_of: NaiveDate,
        prior_cancellations: u32,
    ) -> Option<PolicyReason> {
        match rule {
            PolicyRule::ReturnWindow => {
                let age_days = (as_of - order.order_date).num_days();
                (age_days >= i64::from(self.config.cancellation_window_days))
                    .then_some(PolicyReason::WindowExpired)
            }
            PolicyRule::Blackout => self
                .config
                .blackouts
                .iter()
                .any(|interval| interval.contains(as_of))
                .then_some(PolicyReason::BlackoutDate),
            PolicyRule::MonthlyQuota => (prior_cancellations
                >= self.config.max_cancellations_per_month)
                .then_some(PolicyReason::QuotaExceeded),
        }
    }
}

/// Externally owned per-user monthly cancellation counter. The policy
/// engine only ever consumes a current-count value; reads and the
/// subsequent compare are not atomic, so concurrent cancellations
/// racing the quota boundary can both pass. Accepted for now.
pub trait QuotaStore: Send + Sync {
    fn cancellations_in_month(&self, user_id: &str, year: i32, month: u32) -> u32;
    fn record_cancellation(&self, user_id: &str, year: i32, month: u32);
}

#[derive(Clone, Default)]
pub struct InMemoryQuotaStore {
    counts: Arc<Mutex<HashMap<(String, i32, u32), u32>>>,
}

impl InMemoryQuotaStore {
    pub fn with_count(user_id: &str, year: i32, month: u32, count: u32) -> Self {
        let store = Self::default();
        {
            let mut counts = store.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            counts.insert((user_id.to_owned(), year, month), count);
        }
        store
    }
}

impl QuotaStore for InMemoryQuotaStore {
    fn cancellations_in_month(&self, user_id: &str, year: i32, month: u32) -> u32 {
        let counts = self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        counts.get(&(user_id.to_owned(), year, month)).copied().unwrap_or(0)
    }

    fn record_cancellation(&self, user_id: &str, year: i32, month: u32) {
        let mut counts = self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *counts.entry((user_id.to_owned(), year, month)).or_insert(0) += 1;
    }
}

/// Month key helper for quota lookups.
pub fn month_of(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}
