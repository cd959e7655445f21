//! Rolling duty-hour bookkeeping.
//!
//! A [`DutyClock`] tracks how much of each Hours-of-Service budget a
//! driver has used and answers whether a driving or on-duty period may
//! start.  Mutations that would breach a limit are rejected with a
//! [`DutyRejection`] and leave the state untouched; the clock never
//! clamps.  One clock is created per planning run.

use crate::models::RuleId;
use crate::rules::{duration_hours, HosRules};
use chrono::Duration;
use std::fmt;
use thiserror::Error;

/// One of the budgets a driving period draws on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HosLimit {
    /// 70 hours on duty in 8 days.
    Cycle,
    /// 14 hour window after a qualifying rest.
    DutyWindow,
    /// 11 hours of driving after a qualifying rest.
    Driving,
    /// 8 hours of driving without a 30 minute interruption.
    RestBreak,
}

impl HosLimit {
    pub fn rule(self) -> RuleId {
        match self {
            HosLimit::Cycle => RuleId::CycleLimit,
            HosLimit::DutyWindow => RuleId::DutyWindow,
            HosLimit::Driving => RuleId::DrivingLimit,
            HosLimit::RestBreak => RuleId::RestBreak,
        }
    }
}

impl fmt::Display for HosLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            HosLimit::Cycle => "70-hour/8-day cycle",
            HosLimit::DutyWindow => "14-hour duty window",
            HosLimit::Driving => "11-hour driving limit",
            HosLimit::RestBreak => "30-minute break requirement",
        };
        f.write_str(text)
    }
}

/// Snapshot of a driver's duty counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyState {
    pub driving_today: Duration,
    /// On-duty time including driving since the last qualifying rest.
    pub on_duty_today: Duration,
    pub cycle_used: Duration,
    /// Wall-clock time since the last qualifying rest, including short
    /// off-duty periods.  The 14 hour window is measured against this.
    pub since_last_off_duty_block: Duration,
    pub driving_since_break: Duration,
}

/// A mutation the clock refused because it would breach `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{limit} exceeded: requested {:.2} h, {:.2} h available", hours_of(.requested), hours_of(.available))]
pub struct DutyRejection {
    pub limit: HosLimit,
    pub requested: Duration,
    pub available: Duration,
}

fn hours_of(duration: &Duration) -> f64 {
    duration_hours(*duration)
}

#[derive(Debug, Clone)]
pub struct DutyClock {
    rules: HosRules,
    state: DutyState,
}

impl DutyClock {
    /// Create a clock for a rested driver who has already used
    /// `cycle_used` of their cycle.
    pub fn new(rules: HosRules, cycle_used: Duration) -> Self {
        Self {
            rules,
            state: DutyState {
                driving_today: Duration::zero(),
                on_duty_today: Duration::zero(),
                cycle_used,
                since_last_off_duty_block: Duration::zero(),
                driving_since_break: Duration::zero(),
            },
        }
    }

    pub fn state(&self) -> DutyState {
        self.state
    }

    pub fn rules(&self) -> &HosRules {
        &self.rules
    }

    pub fn cycle_remaining(&self) -> Duration {
        (self.rules.cycle_limit - self.state.cycle_used).max(Duration::zero())
    }

    fn window_remaining(&self) -> Duration {
        (self.rules.duty_window - self.state.since_last_off_duty_block).max(Duration::zero())
    }

    /// Remaining allowance of each budget a driving period draws on, in
    /// the order limits are reported.
    fn driving_budgets(&self) -> Vec<(HosLimit, Duration)> {
        let mut budgets = vec![
            (HosLimit::Cycle, self.cycle_remaining()),
            (HosLimit::DutyWindow, self.window_remaining()),
            (
                HosLimit::Driving,
                (self.rules.max_driving - self.state.driving_today).max(Duration::zero()),
            ),
        ];
        if let Some(rest_break) = self.rules.rest_break {
            budgets.push((
                HosLimit::RestBreak,
                (rest_break.after_driving - self.state.driving_since_break).max(Duration::zero()),
            ));
        }
        budgets
    }

    /// Longest driving period that may start now.
    pub fn driving_available(&self) -> Duration {
        self.driving_budgets()
            .into_iter()
            .map(|(_, remaining)| remaining)
            .min()
            .unwrap_or_else(Duration::zero)
    }

    /// The exhausted budget preventing any driving, if there is one.
    pub fn blocking_limit(&self) -> Option<HosLimit> {
        self.driving_budgets()
            .into_iter()
            .find(|(_, remaining)| *remaining <= Duration::zero())
            .map(|(limit, _)| limit)
    }

    pub fn can_drive(&self, duration: Duration) -> bool {
        self.driving_rejection(duration).is_none()
    }

    /// Whether an on-duty, non-driving period fits the window and cycle.
    pub fn can_work(&self, duration: Duration) -> bool {
        self.work_rejection(duration).is_none()
    }

    fn driving_rejection(&self, duration: Duration) -> Option<DutyRejection> {
        self.driving_budgets()
            .into_iter()
            .find(|(_, remaining)| duration > *remaining)
            .map(|(limit, available)| DutyRejection {
                limit,
                requested: duration,
                available,
            })
    }

    fn work_rejection(&self, duration: Duration) -> Option<DutyRejection> {
        [
            (HosLimit::Cycle, self.cycle_remaining()),
            (HosLimit::DutyWindow, self.window_remaining()),
        ]
        .into_iter()
        .find(|(_, remaining)| duration > *remaining)
        .map(|(limit, available)| DutyRejection {
            limit,
            requested: duration,
            available,
        })
    }

    pub fn record_driving(&mut self, duration: Duration) -> Result<(), DutyRejection> {
        if let Some(rejection) = self.driving_rejection(duration) {
            return Err(rejection);
        }
        let state = &mut self.state;
        state.driving_today = state.driving_today + duration;
        state.on_duty_today = state.on_duty_today + duration;
        state.cycle_used = state.cycle_used + duration;
        state.since_last_off_duty_block = state.since_last_off_duty_block + duration;
        state.driving_since_break = state.driving_since_break + duration;
        Ok(())
    }

    pub fn record_on_duty(&mut self, duration: Duration) -> Result<(), DutyRejection> {
        if let Some(rejection) = self.work_rejection(duration) {
            return Err(rejection);
        }
        let state = &mut self.state;
        state.on_duty_today = state.on_duty_today + duration;
        state.cycle_used = state.cycle_used + duration;
        state.since_last_off_duty_block = state.since_last_off_duty_block + duration;
        self.note_interruption(duration);
        Ok(())
    }

    /// Record an off-duty period.  Only an uninterrupted period of at
    /// least the daily reset resets the daily counters, and only one of
    /// at least the restart length resets the cycle.
    pub fn record_off_duty(&mut self, duration: Duration) {
        if duration >= self.rules.cycle_restart {
            self.state.cycle_used = Duration::zero();
        }
        if duration >= self.rules.daily_reset {
            self.state.driving_today = Duration::zero();
            self.state.on_duty_today = Duration::zero();
            self.state.since_last_off_duty_block = Duration::zero();
            self.state.driving_since_break = Duration::zero();
        } else {
            self.state.since_last_off_duty_block = self.state.since_last_off_duty_block + duration;
            self.note_interruption(duration);
        }
    }

    /// Any non-driving period of the break length satisfies the break.
    fn note_interruption(&mut self, duration: Duration) {
        if let Some(rest_break) = self.rules.rest_break {
            if duration >= rest_break.length {
                self.state.driving_since_break = Duration::zero();
            }
        }
    }
}
