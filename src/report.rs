//! Compliance report assembly.
//!
//! A [`ComplianceReport`] packages a planned trip: its totals, the
//! waypoints in order, the forced rest periods and the daily logs.
//! [`ComplianceReport::to_response`] renders it in the JSON shape the
//! front end expects, rounding hours to hundredths and miles to tenths.

use crate::models::{
    DailyLog, DutySegment, DutyStatus, LogEntry, LogSheet, PlanResponse, RestPeriod,
    RestPeriodEntry, RouteSummary, Violation, Waypoint,
};
use crate::rules::duration_hours;
use crate::segmenter::SegmentPlan;
use chrono::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceReport {
    /// Sum of driving segment miles.
    pub total_distance: f64,
    /// Sum of driving segment durations.
    pub total_driving: Duration,
    pub waypoints: Vec<Waypoint>,
    pub fuel_stops: usize,
    pub rest_periods: Vec<RestPeriod>,
    /// The unsplit segment sequence the logs were built from.
    pub segments: Vec<DutySegment>,
    pub daily_logs: Vec<DailyLog>,
}

impl ComplianceReport {
    pub fn assemble(plan: SegmentPlan, daily_logs: Vec<DailyLog>) -> Self {
        let driving = plan
            .segments
            .iter()
            .filter(|s| s.status == DutyStatus::Driving);
        let total_distance = driving.clone().map(|s| s.miles).sum();
        let total_driving = driving.fold(Duration::zero(), |acc, s| acc + s.duration());
        Self {
            total_distance,
            total_driving,
            waypoints: plan.waypoints,
            fuel_stops: plan.fuel_stops,
            rest_periods: plan.rest_periods,
            segments: plan.segments,
            daily_logs,
        }
    }

    /// Every violation across all daily logs, in log order.
    pub fn violations(&self) -> impl Iterator<Item = &Violation> {
        self.daily_logs.iter().flat_map(|log| log.violations.iter())
    }

    pub fn to_response(&self) -> PlanResponse {
        PlanResponse {
            route: RouteSummary {
                total_distance: round_to(self.total_distance, 1),
                total_time: hours(self.total_driving),
                waypoints: self.waypoints.clone(),
                fuel_stops: self.fuel_stops,
                rest_periods: self
                    .rest_periods
                    .iter()
                    .map(|rest| RestPeriodEntry {
                        start: rest.start,
                        end: rest.end,
                        duration: hours(rest.duration()),
                        kind: rest.kind_label().to_string(),
                    })
                    .collect(),
            },
            log_sheets: self.daily_logs.iter().map(log_sheet).collect(),
        }
    }
}

fn log_sheet(log: &DailyLog) -> LogSheet {
    LogSheet {
        date: log.date,
        driving_time: hours(log.driving),
        on_duty_time: hours(log.on_duty),
        rest_time: hours(log.rest),
        violations: log.violations.iter().map(ToString::to_string).collect(),
        entries: log
            .segments
            .iter()
            .map(|segment| LogEntry {
                time: segment.start.format("%H:%M").to_string(),
                status: segment.status.log_status(),
                location: segment.label.clone(),
            })
            .collect(),
    }
}

fn hours(duration: Duration) -> f64 {
    round_to(duration_hours(duration), 2)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logsheet::LogSheetGenerator;
    use crate::models::{Activity, Location, RuleId, WaypointKind};
    use crate::rules::HosRules;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn sample_plan() -> SegmentPlan {
        let segment = |start, end, activity: Activity, miles| DutySegment {
            start,
            end,
            status: activity.status(),
            activity,
            label: format!("{activity:?}"),
            miles,
        };
        SegmentPlan {
            segments: vec![
                segment(at(6, 0), at(8, 20), Activity::Drive, 140.0),
                segment(at(8, 20), at(9, 20), Activity::Pickup, 0.0),
                segment(at(9, 20), at(9, 50), Activity::Break, 0.0),
                segment(at(9, 50), at(10, 50), Activity::Dropoff, 0.0),
            ],
            waypoints: vec![Waypoint {
                location: Location::new("Origin", 40.0, -74.0),
                kind: WaypointKind::Start,
                estimated_arrival: Some(at(6, 0)),
            }],
            rest_periods: vec![RestPeriod {
                start: at(9, 20),
                end: at(9, 50),
                activity: Activity::Break,
            }],
            violations: vec![Violation {
                rule: RuleId::CycleExhaustion,
                description: "34-hour restart inserted".into(),
                at: at(9, 20),
                segment: 2,
            }],
            fuel_stops: 0,
        }
    }

    #[test]
    fn test_response_matches_front_end_schema() {
        let plan = sample_plan();
        let rules = HosRules::default();
        let logs =
            LogSheetGenerator::new(&rules).generate(&plan.segments, &plan.violations, Duration::zero());
        let report = ComplianceReport::assemble(plan, logs);
        assert_eq!(report.total_distance, 140.0);
        assert_eq!(report.total_driving, Duration::minutes(140));
        assert_eq!(report.violations().count(), 1);

        let value = serde_json::to_value(report.to_response()).unwrap();
        assert_eq!(value["route"]["totalTime"], 2.33);
        assert_eq!(value["route"]["fuelStops"], 0);
        assert_eq!(value["route"]["restPeriods"][0]["type"], "30-minute break");
        assert_eq!(value["route"]["restPeriods"][0]["duration"], 0.5);
        assert_eq!(value["route"]["waypoints"][0]["type"], "start");

        let sheet = &value["logSheets"][0];
        assert_eq!(sheet["date"], "2024-06-15");
        assert_eq!(sheet["drivingTime"], 2.33);
        assert_eq!(sheet["onDutyTime"], 2.0);
        assert_eq!(sheet["restTime"], 0.5);
        assert_eq!(
            sheet["violations"][0],
            "cycle-exhaustion: 34-hour restart inserted"
        );
        assert_eq!(sheet["entries"][0]["time"], "06:00");
        assert_eq!(sheet["entries"][0]["status"], "driving");
        assert_eq!(sheet["entries"][2]["status"], "off-duty");
        assert_eq!(sheet["entries"][3]["location"], "Dropoff");
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_to(2805.04, 1), 2805.0);
        assert_eq!(hours(Duration::minutes(20)), 0.33);
    }
}
