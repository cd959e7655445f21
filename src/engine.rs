//! Trip planning engine.
//!
//! The `engine` module turns a [`TripRequest`] into a
//! [`ComplianceReport`].  A run validates the request, asks the
//! [`DistanceProvider`] for all legs in one call, segments the trip,
//! folds the segments into daily logs and packages the result.  Each run
//! builds its own state, so runs are independent; [`plan_batch`] uses
//! the [`rayon`] crate to plan many trips across CPU cores.

use crate::distance::{DistanceProvider, Leg, ProviderError, RouteEstimate};
use crate::error::PlanError;
use crate::logsheet::LogSheetGenerator;
use crate::models::TripRequest;
use crate::report::ComplianceReport;
use crate::rules::{duration_hours, hours_to_duration, HosRules};
use crate::segmenter::TripSegmenter;
use chrono::{Duration, NaiveDateTime};
use rayon::prelude::*;
use tracing::{info, warn};

/// Fastest average speed accepted from a distance provider.
const MAX_AVERAGE_MPH: f64 = 100.0;

/// Plan one trip starting at `start`.
///
/// Fails only for an invalid request or an unusable distance lookup; in
/// either case no partial report is produced.  Hours-of-Service problems
/// are reported as violations inside the returned report.
pub fn plan_trip(
    request: &TripRequest,
    start: NaiveDateTime,
    provider: &dyn DistanceProvider,
    rules: &HosRules,
) -> Result<ComplianceReport, PlanError> {
    let cycle_used = validate_request(request, rules)?;
    let names = [
        request.current_location.trim(),
        request.pickup_location.trim(),
        request.dropoff_location.trim(),
    ];
    info!(
        from = names[0],
        pickup = names[1],
        dropoff = names[2],
        cycle_used = duration_hours(cycle_used),
        %start,
        provider = provider.name(),
        "planning trip"
    );

    let estimate = provider.estimate(&names).map_err(|err| {
        warn!(error = %err, "distance lookup failed");
        err
    })?;
    let route = validate_route(&names, estimate)?;

    let plan = TripSegmenter::new(rules.clone(), cycle_used, start).plan(&route)?;
    let logs = LogSheetGenerator::new(rules).generate(&plan.segments, &plan.violations, cycle_used);
    let report = ComplianceReport::assemble(plan, logs);

    info!(
        miles = report.total_distance,
        driving_hours = duration_hours(report.total_driving),
        fuel_stops = report.fuel_stops,
        days = report.daily_logs.len(),
        violations = report.violations().count(),
        "trip planned"
    );
    Ok(report)
}

/// Plan many trips in parallel.  Requests without a start time begin at
/// `default_start`.  Results are returned in request order.
pub fn plan_batch(
    requests: Vec<TripRequest>,
    default_start: NaiveDateTime,
    provider: &dyn DistanceProvider,
    rules: &HosRules,
) -> Vec<Result<ComplianceReport, PlanError>> {
    requests
        .into_par_iter()
        .map(|request| {
            let start = request.start_time.unwrap_or(default_start);
            plan_trip(&request, start, provider, rules)
        })
        .collect()
}

/// Check the request fields and return the cycle time already used.
fn validate_request(request: &TripRequest, rules: &HosRules) -> Result<Duration, PlanError> {
    let fields = [
        ("currentLocation", &request.current_location),
        ("pickupLocation", &request.pickup_location),
        ("dropoffLocation", &request.dropoff_location),
    ];
    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(PlanError::invalid(field, "must not be empty"));
        }
    }
    let cycle = request.current_cycle_used;
    let limit = duration_hours(rules.cycle_limit);
    if !cycle.is_finite() {
        return Err(PlanError::invalid("currentCycleUsed", "must be a number"));
    }
    if !(0.0..=limit).contains(&cycle) {
        return Err(PlanError::invalid(
            "currentCycleUsed",
            format!("must be between 0 and {limit}, got {cycle}"),
        ));
    }
    Ok(hours_to_duration(cycle))
}

fn same_place(a: &str, b: &str) -> bool {
    a.split_whitespace()
        .map(str::to_lowercase)
        .eq(b.split_whitespace().map(str::to_lowercase))
}

/// Check the provider's answer before planning on it and normalise drive
/// times to whole minutes.
fn validate_route(names: &[&str], estimate: RouteEstimate) -> Result<RouteEstimate, ProviderError> {
    if estimate.stops.len() != names.len() || estimate.legs.len() + 1 != names.len() {
        return Err(ProviderError::Incomplete(format!(
            "asked for {} stops, got {} stops and {} legs",
            names.len(),
            estimate.stops.len(),
            estimate.legs.len()
        )));
    }
    let mut legs = Vec::with_capacity(estimate.legs.len());
    for (index, leg) in estimate.legs.into_iter().enumerate() {
        let (from, to) = (names[index], names[index + 1]);
        let invalid = |reason: &str| ProviderError::InvalidLeg {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
        };
        if !leg.miles.is_finite() || leg.miles < 0.0 {
            return Err(invalid("distance must be a non-negative number"));
        }
        if leg.miles == 0.0 {
            if !same_place(from, to) {
                return Err(invalid("distance between distinct stops must be positive"));
            }
            legs.push(Leg {
                miles: 0.0,
                drive_time: Duration::zero(),
            });
            continue;
        }
        let seconds = leg.drive_time.num_seconds();
        if seconds <= 0 {
            return Err(invalid("drive time must be positive"));
        }
        let minutes = ((seconds as f64) / 60.0).round().max(1.0) as i64;
        if leg.miles * 60.0 / minutes as f64 > MAX_AVERAGE_MPH {
            return Err(invalid("implied average speed is implausibly high"));
        }
        legs.push(Leg {
            miles: leg.miles,
            drive_time: Duration::minutes(minutes),
        });
    }
    Ok(RouteEstimate {
        stops: estimate.stops,
        legs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Activity, Location, RuleId, WaypointKind};
    use chrono::NaiveDate;

    /// Answers from a fixed list of legs, in request order.
    struct FixedProvider {
        legs: Vec<Leg>,
    }

    impl DistanceProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        fn estimate(&self, stops: &[&str]) -> Result<RouteEstimate, ProviderError> {
            Ok(RouteEstimate {
                stops: stops
                    .iter()
                    .enumerate()
                    .map(|(i, name)| Location::new(*name, 40.0, -74.0 - i as f64))
                    .collect(),
                legs: self.legs.clone(),
            })
        }
    }

    struct DownProvider;

    impl DistanceProvider for DownProvider {
        fn name(&self) -> &str {
            "down"
        }

        fn estimate(&self, _stops: &[&str]) -> Result<RouteEstimate, ProviderError> {
            Err(ProviderError::Incomplete("service unavailable".into()))
        }
    }

    fn provider(legs: &[(f64, i64)]) -> FixedProvider {
        FixedProvider {
            legs: legs
                .iter()
                .map(|&(miles, minutes)| Leg {
                    miles,
                    drive_time: Duration::minutes(minutes),
                })
                .collect(),
        }
    }

    fn request(cycle: f64) -> TripRequest {
        TripRequest {
            current_location: "New York, NY".into(),
            pickup_location: "Chicago, IL".into(),
            dropoff_location: "Los Angeles, CA".into(),
            current_cycle_used: cycle,
            start_time: None,
        }
    }

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_rejects_bad_requests() {
        let rules = HosRules::default();
        let provider = provider(&[(790.0, 780), (2015.0, 1860)]);
        for cycle in [-1.0, 70.5, f64::NAN] {
            let err = plan_trip(&request(cycle), start(), &provider, &rules).unwrap_err();
            assert!(err.is_client_error(), "{cycle}: {err}");
        }
        let mut blank = request(0.0);
        blank.pickup_location = "  ".into();
        assert!(matches!(
            plan_trip(&blank, start(), &provider, &rules),
            Err(PlanError::InvalidInput { field: "pickupLocation", .. })
        ));
    }

    #[test]
    fn test_rejects_bad_provider_data() {
        let rules = HosRules::default();
        for legs in [
            vec![(f64::NAN, 60), (10.0, 10)],
            vec![(-5.0, 60), (10.0, 10)],
            vec![(0.0, 0), (10.0, 10)],
            vec![(50.0, 0), (10.0, 10)],
            vec![(50.0, 60)],
            vec![(100.0, 100), (2500.0, 2)],
        ] {
            let err = plan_trip(&request(0.0), start(), &provider(&legs), &rules).unwrap_err();
            assert!(matches!(err, PlanError::Provider(_)), "{legs:?}: {err}");
        }
    }

    #[test]
    fn test_provider_failure_yields_no_report() {
        let err = plan_trip(&request(0.0), start(), &DownProvider, &HosRules::default()).unwrap_err();
        assert!(matches!(err, PlanError::Provider(ProviderError::Incomplete(_))));
    }

    #[test]
    fn test_planning_is_deterministic() {
        let rules = HosRules::default();
        let provider = provider(&[(790.0, 780), (2015.0, 1860)]);
        let first = plan_trip(&request(12.0), start(), &provider, &rules).unwrap();
        let second = plan_trip(&request(12.0), start(), &provider, &rules).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_response(), second.to_response());
    }

    #[test]
    fn test_zero_mile_trip() {
        let mut trip = request(0.0);
        trip.pickup_location = "New York, NY".into();
        trip.dropoff_location = "new york,  NY".into();
        let report = plan_trip(
            &trip,
            start(),
            &provider(&[(0.0, 0), (0.0, 0)]),
            &HosRules::default(),
        )
        .unwrap();
        assert_eq!(report.waypoints.len(), 1);
        assert_eq!(report.waypoints[0].kind, WaypointKind::Start);
        assert_eq!(report.fuel_stops, 0);
        assert_eq!(report.total_distance, 0.0);
        assert_eq!(report.daily_logs.len(), 1);
        let log = &report.daily_logs[0];
        assert_eq!(log.on_duty, Duration::hours(2));
        assert_eq!(log.driving, Duration::zero());
        assert_eq!(log.rest, Duration::zero());
    }

    #[test]
    fn test_drive_times_are_rounded_to_minutes() {
        let provider = FixedProvider {
            legs: vec![
                Leg {
                    miles: 30.0,
                    drive_time: Duration::seconds(1790),
                },
                Leg {
                    miles: 1.0,
                    drive_time: Duration::seconds(5),
                },
            ],
        };
        let report = plan_trip(&request(0.0), start(), &provider, &HosRules::default()).unwrap();
        let drives: Vec<_> = report
            .segments
            .iter()
            .filter(|s| s.activity == Activity::Drive)
            .map(|s| s.duration())
            .collect();
        assert_eq!(drives, vec![Duration::minutes(30), Duration::minutes(1)]);
    }

    #[test]
    fn test_batch_matches_sequential_planning() {
        let rules = HosRules::default();
        let provider = provider(&[(790.0, 780), (2015.0, 1860)]);
        let mut late = request(68.0);
        late.start_time = Some(start() + Duration::days(3));
        let requests = vec![request(0.0), late, request(-3.0)];

        let results = plan_batch(requests, start(), &provider, &rules);
        assert_eq!(results.len(), 3);
        let expected = plan_trip(&request(0.0), start(), &provider, &rules).unwrap();
        assert_eq!(results[0].as_ref().unwrap(), &expected);
        let restarted = results[1].as_ref().unwrap();
        assert_eq!(restarted.segments[0].start, start() + Duration::days(3));
        assert!(restarted
            .violations()
            .any(|v| v.rule == RuleId::CycleExhaustion));
        assert!(results[2].as_ref().unwrap_err().is_client_error());
    }
}
