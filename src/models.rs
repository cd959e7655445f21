//! Data models for the ELD planner.
//!
//! The `models` module defines the serialisable structs and enums that
//! describe a trip: the request submitted by the front end, the
//! locations and waypoints along the route, the duty segments produced
//! by the planner, the daily logs they are folded into, and the response
//! returned over HTTP.  Wire types use camelCase field names because the
//! existing front end depends on them exactly.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named point on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Human readable place name, e.g. `"Chicago, IL"`.
    pub name: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
}

impl Location {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }

    /// Point a fraction of the way from `self` towards `other`.
    ///
    /// Linear interpolation is adequate for placing stop markers; the
    /// planner never uses these coordinates for distance.
    pub fn interpolate(&self, other: &Location, fraction: f64, name: impl Into<String>) -> Location {
        let t = fraction.clamp(0.0, 1.0);
        Location {
            name: name.into(),
            latitude: self.latitude + (other.latitude - self.latitude) * t,
            longitude: self.longitude + (other.longitude - self.longitude) * t,
        }
    }
}

/// The role a waypoint plays in the trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointKind {
    Start,
    Pickup,
    Dropoff,
    Fuel,
    Rest,
}

/// A stop along the planned route with its estimated arrival time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    #[serde(flatten)]
    pub location: Location,
    #[serde(rename = "type")]
    pub kind: WaypointKind,
    #[serde(
        rename = "estimatedArrival",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub estimated_arrival: Option<NaiveDateTime>,
}

/// Duty status as recorded on a log sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DutyStatus {
    Driving,
    OnDuty,
    OffDuty,
    Sleeper,
}

impl DutyStatus {
    /// Status as shown on a log sheet entry.  The front end only knows
    /// three statuses, so sleeper berth time is shown as off duty.
    pub fn log_status(self) -> DutyStatus {
        match self {
            DutyStatus::Sleeper => DutyStatus::OffDuty,
            other => other,
        }
    }
}

/// What the driver is doing during a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Drive,
    Pickup,
    Dropoff,
    Fuel,
    /// Short interruption satisfying the 30 minute break rule.
    Break,
    /// Off-duty period resetting the daily limits.
    Rest,
    /// Off-duty period resetting the cycle.
    Restart,
}

impl Activity {
    pub fn status(self) -> DutyStatus {
        match self {
            Activity::Drive => DutyStatus::Driving,
            Activity::Pickup | Activity::Dropoff | Activity::Fuel => DutyStatus::OnDuty,
            Activity::Break | Activity::Rest | Activity::Restart => DutyStatus::OffDuty,
        }
    }
}

/// A contiguous period of a single duty status.
#[derive(Debug, Clone, PartialEq)]
pub struct DutySegment {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: DutyStatus,
    pub activity: Activity,
    /// Where the driver is, or where they are heading when driving.
    pub label: String,
    /// Distance covered; zero for everything but driving.
    pub miles: f64,
}

impl DutySegment {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Identifier of the rule a [`Violation`] refers to.  Rendered on log
/// sheets through [`fmt::Display`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleId {
    /// The cycle ran out before the trip finished and a 34 hour restart
    /// was inserted.  Informational.
    CycleExhaustion,
    DrivingLimit,
    DutyWindow,
    CycleLimit,
    RestBreak,
}

impl RuleId {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleId::CycleExhaustion => "cycle-exhaustion",
            RuleId::DrivingLimit => "driving-limit",
            RuleId::DutyWindow => "duty-window",
            RuleId::CycleLimit => "cycle-limit",
            RuleId::RestBreak => "rest-break",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded rule breach.  Violations never abort planning.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub rule: RuleId,
    pub description: String,
    /// When the violation occurred; decides which daily log carries it.
    pub at: NaiveDateTime,
    /// Index of the segment the violation refers to.
    pub segment: usize,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rule, self.description)
    }
}

/// A forced off-duty period inserted by the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct RestPeriod {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub activity: Activity,
}

impl RestPeriod {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Label used in the `type` field of the response.
    pub fn kind_label(&self) -> &'static str {
        match self.activity {
            Activity::Restart => "34-hour restart",
            Activity::Break => "30-minute break",
            _ => "10-hour rest",
        }
    }
}

/// The duty record for one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyLog {
    pub date: NaiveDate,
    /// Segments falling on this date, already split at midnight.
    pub segments: Vec<DutySegment>,
    pub driving: Duration,
    /// On-duty time excluding driving.
    pub on_duty: Duration,
    /// Off-duty and sleeper berth time.
    pub rest: Duration,
    pub violations: Vec<Violation>,
}

impl DailyLog {
    /// Sum of the contained segment durations.
    pub fn logged(&self) -> Duration {
        self.segments
            .iter()
            .fold(Duration::zero(), |acc, s| acc + s.duration())
    }
}

/// Trip request posted by the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRequest {
    pub current_location: String,
    pub pickup_location: String,
    pub dropoff_location: String,
    /// Hours already used in the current 70-hour/8-day cycle.
    pub current_cycle_used: f64,
    /// Local date and time the trip begins.  The server substitutes its
    /// configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveDateTime>,
}

/// Response body for a planned trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub route: RouteSummary,
    pub log_sheets: Vec<LogSheet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    /// Miles.
    pub total_distance: f64,
    /// Driving hours.
    pub total_time: f64,
    pub waypoints: Vec<Waypoint>,
    pub fuel_stops: usize,
    pub rest_periods: Vec<RestPeriodEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestPeriodEntry {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Hours.
    pub duration: f64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One daily log sheet as rendered by the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSheet {
    pub date: NaiveDate,
    pub driving_time: f64,
    pub on_duty_time: f64,
    pub rest_time: f64,
    pub violations: Vec<String>,
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// `HH:MM` start of the entry.
    pub time: String,
    pub status: DutyStatus,
    pub location: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trip_request_uses_front_end_field_names() {
        let request: TripRequest = serde_json::from_value(json!({
            "currentLocation": "New York, NY",
            "pickupLocation": "Chicago, IL",
            "dropoffLocation": "Los Angeles, CA",
            "currentCycleUsed": 12.5
        }))
        .unwrap();
        assert_eq!(request.pickup_location, "Chicago, IL");
        assert_eq!(request.current_cycle_used, 12.5);
        assert!(request.start_time.is_none());
    }

    #[test]
    fn test_waypoint_serialises_flat() {
        let waypoint = Waypoint {
            location: Location::new("Fuel Stop", 41.5, -81.7),
            kind: WaypointKind::Fuel,
            estimated_arrival: NaiveDate::from_ymd_opt(2024, 6, 15)
                .and_then(|d| d.and_hms_opt(10, 30, 0)),
        };
        let value = serde_json::to_value(&waypoint).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "Fuel Stop",
                "lat": 41.5,
                "lng": -81.7,
                "type": "fuel",
                "estimatedArrival": "2024-06-15T10:30:00"
            })
        );
    }

    #[test]
    fn test_sleeper_is_logged_as_off_duty() {
        assert_eq!(DutyStatus::Sleeper.log_status(), DutyStatus::OffDuty);
        assert_eq!(
            serde_json::to_value(DutyStatus::OnDuty).unwrap(),
            json!("on-duty")
        );
    }

    #[test]
    fn test_violation_renders_rule_id() {
        let violation = Violation {
            rule: RuleId::DutyWindow,
            description: "14-hour window exceeded".into(),
            at: NaiveDate::from_ymd_opt(2024, 6, 15)
                .and_then(|d| d.and_hms_opt(20, 0, 0))
                .unwrap(),
            segment: 3,
        };
        assert_eq!(
            violation.to_string(),
            "duty-window: 14-hour window exceeded"
        );
    }

    #[test]
    fn test_interpolate_midpoint() {
        let a = Location::new("A", 40.0, -80.0);
        let b = Location::new("B", 42.0, -90.0);
        let mid = a.interpolate(&b, 0.5, "Mid");
        assert_eq!(mid.latitude, 41.0);
        assert_eq!(mid.longitude, -85.0);
    }
}
