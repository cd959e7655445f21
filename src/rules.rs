//! Hours-of-Service rules and planning constants.
//!
//! [`HosRules`] collects every limit the planner enforces for a
//! property-carrying driver on the 70-hour/8-day schedule, along with
//! the fixed durations the planner allocates to stops.  The defaults
//! follow 49 CFR 395.3; the fuel and stop durations are planning
//! choices rather than regulation.

use chrono::Duration;

/// The 30 minute interruption required after a stretch of driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestBreakRule {
    /// Cumulative driving after which a break is required.
    pub after_driving: Duration,
    /// Minimum length of a qualifying non-driving period.
    pub length: Duration,
}

impl Default for RestBreakRule {
    fn default() -> Self {
        Self {
            after_driving: Duration::hours(8),
            length: Duration::minutes(30),
        }
    }
}

/// Regulatory limits and stop durations used by the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct HosRules {
    /// Maximum driving after a qualifying rest (11 hours).
    pub max_driving: Duration,
    /// Length of the on-duty window opened by the first on-duty period
    /// after a qualifying rest (14 hours).
    pub duty_window: Duration,
    /// Rolling 8-day on-duty budget (70 hours).
    pub cycle_limit: Duration,
    /// Consecutive off-duty time that resets the daily limits.
    pub daily_reset: Duration,
    /// Consecutive off-duty time that resets the cycle.
    pub cycle_restart: Duration,
    /// Optional 30 minute break rule.  `None` disables it.
    pub rest_break: Option<RestBreakRule>,
    /// Maximum cumulative driving distance between fuel stops.
    pub fuel_interval_miles: f64,
    /// On-duty time allocated to each fuel stop.
    pub fuel_stop: Duration,
    /// On-duty time allocated to loading at the pickup.
    pub pickup: Duration,
    /// On-duty time allocated to unloading at the dropoff.
    pub dropoff: Duration,
}

impl Default for HosRules {
    fn default() -> Self {
        Self {
            max_driving: Duration::hours(11),
            duty_window: Duration::hours(14),
            cycle_limit: Duration::hours(70),
            daily_reset: Duration::hours(10),
            cycle_restart: Duration::hours(34),
            rest_break: None,
            fuel_interval_miles: 1000.0,
            fuel_stop: Duration::minutes(30),
            pickup: Duration::hours(1),
            dropoff: Duration::hours(1),
        }
    }
}

impl HosRules {
    /// Enable the 30 minute break after 8 hours of driving.
    pub fn with_rest_break(mut self) -> Self {
        self.rest_break = Some(RestBreakRule::default());
        self
    }
}

/// Convert fractional hours to a whole-minute duration.
///
/// All planner arithmetic happens on whole minutes so that daily totals
/// are exact sums of their segments.
pub fn hours_to_duration(hours: f64) -> Duration {
    Duration::minutes((hours * 60.0).round() as i64)
}

/// Express a duration as fractional hours.
pub fn duration_hours(duration: Duration) -> f64 {
    duration.num_minutes() as f64 / 60.0
}
