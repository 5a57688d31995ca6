//! Store availability: may this store accept an order right now?
//!
//! Precedence is strict: activation gate, then the admin override, then the
//! owner override, then the default schedule. AUTO with no schedule means
//! closed.

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Utc};
use serde::Serialize;

use crate::store::{AdminOverride, OwnerOverride, Store};

/// Why a store is (not) accepting orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityReason {
    Inactive,
    AdminForcedOpen,
    AdminForcedClosed,
    OwnerForcedClosed,
    NoSchedule,
    ZeroWidthWindow,
    WithinSchedule,
    OutsideSchedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AvailabilityDecision {
    pub accepting_orders: bool,
    pub reason: AvailabilityReason,
}

impl AvailabilityDecision {
    fn open(reason: AvailabilityReason) -> Self {
        Self { accepting_orders: true, reason }
    }

    fn closed(reason: AvailabilityReason) -> Self {
        Self { accepting_orders: false, reason }
    }
}

/// Evaluates availability against the stores' local clock.
///
/// `offset` converts the UTC instant into the time-of-day the schedules are
/// written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreAvailabilityEvaluator {
    offset: FixedOffset,
}

impl Default for StoreAvailabilityEvaluator {
    fn default() -> Self {
        Self::utc()
    }
}

impl StoreAvailabilityEvaluator {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn accepts(&self, store: &Store, now: DateTime<Utc>) -> bool {
        self.evaluate(store, now).accepting_orders
    }

    pub fn evaluate(&self, store: &Store, now: DateTime<Utc>) -> AvailabilityDecision {
        let local = now.with_timezone(&self.offset).time();
        evaluate_at(store, local)
    }
}

/// The decision for a given local time-of-day.
pub fn evaluate_at(store: &Store, time_of_day: NaiveTime) -> AvailabilityDecision {
    use AvailabilityReason::*;

    if !store.is_active {
        return AvailabilityDecision::closed(Inactive);
    }

    match store.admin_forced_status {
        AdminOverride::ForceOpen => return AvailabilityDecision::open(AdminForcedOpen),
        AdminOverride::ForceClosed => return AvailabilityDecision::closed(AdminForcedClosed),
        AdminOverride::Auto => {}
    }

    if store.owner_choice_status == OwnerOverride::ForceClosed {
        return AvailabilityDecision::closed(OwnerForcedClosed);
    }

    let (Some(opening), Some(closing)) = (store.default_opening_time, store.default_closing_time)
    else {
        return AvailabilityDecision::closed(NoSchedule);
    };

    if opening == closing {
        return AvailabilityDecision::closed(ZeroWidthWindow);
    }

    let within = if closing < opening {
        // Overnight window, e.g. 22:00-02:00.
        time_of_day >= opening || time_of_day < closing
    } else {
        time_of_day >= opening && time_of_day < closing
    };

    if within {
        AvailabilityDecision::open(WithinSchedule)
    } else {
        AvailabilityDecision::closed(OutsideSchedule)
    }
}
