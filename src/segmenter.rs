//! Trip segmentation.
//!
//! The [`TripSegmenter`] walks the legs of a route in order and turns
//! them into a contiguous sequence of [`DutySegment`]s: driving blocks
//! as long as the [`DutyClock`] allows, an hour of on-duty work at each
//! pickup and dropoff, a fuel stop at or before every fuel interval, and
//! the off-duty periods the clock demands.  Fuel stops and rest stops are
//! also emitted as [`Waypoint`]s, positioned along the leg by the
//! fraction of its distance already covered.
//!
//! Planning is a single sequential loop; each segment's end state is the
//! precondition for the next.  It never fails because of an Hours of
//! Service limit: a driver who runs out of cycle gets a 34 hour restart
//! and the plan records a violation.

use crate::clock::{DutyClock, DutyRejection, HosLimit};
use crate::distance::{Leg, ProviderError, RouteEstimate};
use crate::error::PlanError;
use crate::models::{
    Activity, DutySegment, Location, RestPeriod, RuleId, Violation, Waypoint, WaypointKind,
};
use crate::rules::{duration_hours, HosRules};
use chrono::{Duration, NaiveDateTime};
use tracing::debug;

/// Distances below this are treated as zero.
const MILE_EPSILON: f64 = 1e-6;

/// Everything the segmenter produces for one trip.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    pub segments: Vec<DutySegment>,
    pub waypoints: Vec<Waypoint>,
    pub rest_periods: Vec<RestPeriod>,
    pub violations: Vec<Violation>,
    pub fuel_stops: usize,
}

/// The leg currently being driven, used to place stops on the map.
struct LegProgress {
    from: Location,
    to: Location,
    miles: f64,
    covered: f64,
}

impl LegProgress {
    fn position(&self, name: String) -> Location {
        if self.miles > MILE_EPSILON {
            self.from.interpolate(&self.to, self.covered / self.miles, name)
        } else {
            Location {
                name,
                ..self.to.clone()
            }
        }
    }
}

pub struct TripSegmenter {
    clock: DutyClock,
    now: NaiveDateTime,
    segments: Vec<DutySegment>,
    waypoints: Vec<Waypoint>,
    rest_periods: Vec<RestPeriod>,
    violations: Vec<Violation>,
    fuel_stops: usize,
    miles_since_fuel: f64,
    miles_driven: f64,
    leg: LegProgress,
    /// Drive time not yet scheduled.
    remaining_drive: Duration,
    /// Pickup and dropoff work not yet scheduled.
    pending_work: Duration,
    steps: usize,
    max_steps: usize,
}

impl TripSegmenter {
    /// Start planning at `start` for a rested driver who has already used
    /// `cycle_used` of their cycle.
    pub fn new(rules: HosRules, cycle_used: Duration, start: NaiveDateTime) -> Self {
        let nowhere = Location::new("", 0.0, 0.0);
        Self {
            clock: DutyClock::new(rules, cycle_used),
            now: start,
            segments: Vec::new(),
            waypoints: Vec::new(),
            rest_periods: Vec::new(),
            violations: Vec::new(),
            fuel_stops: 0,
            miles_since_fuel: 0.0,
            miles_driven: 0.0,
            leg: LegProgress {
                from: nowhere.clone(),
                to: nowhere,
                miles: 0.0,
                covered: 0.0,
            },
            remaining_drive: Duration::zero(),
            pending_work: Duration::zero(),
            steps: 0,
            max_steps: 0,
        }
    }

    /// Plan the whole trip.  The first stop is the start, the last the
    /// dropoff, and any stops in between are pickups.
    ///
    /// `route` must already be validated: one leg per consecutive pair of
    /// stops, finite non-negative miles, and whole-minute drive times
    /// that are positive whenever the leg has distance.
    pub fn plan(mut self, route: &RouteEstimate) -> Result<SegmentPlan, PlanError> {
        let (first, last) = match (route.stops.first(), route.stops.last()) {
            (Some(first), Some(last)) if route.stops.len() >= 2 => (first.clone(), last.clone()),
            _ => {
                return Err(PlanError::Unschedulable(
                    "a trip needs at least a start and a dropoff".into(),
                ))
            }
        };
        if route.legs.len() + 1 != route.stops.len() {
            return Err(ProviderError::Incomplete(format!(
                "{} stops need {} legs, got {}",
                route.stops.len(),
                route.stops.len() - 1,
                route.legs.len()
            ))
            .into());
        }
        let rules = self.clock.rules().clone();
        let pickups = route.stops.len() as i32 - 2;

        self.remaining_drive = route
            .legs
            .iter()
            .fold(Duration::zero(), |acc, leg| acc + leg.drive_time);
        self.pending_work = rules.pickup * pickups + rules.dropoff;
        self.max_steps = step_bound(&route.legs, &rules);
        self.leg = LegProgress {
            from: first.clone(),
            to: first.clone(),
            miles: 0.0,
            covered: 0.0,
        };
        self.waypoints.push(Waypoint {
            location: first,
            kind: WaypointKind::Start,
            estimated_arrival: Some(self.now),
        });

        let leg_count = route.legs.len();
        let total_miles: f64 = route.legs.iter().map(|leg| leg.miles).sum();
        for (index, leg) in route.legs.iter().enumerate() {
            let from = &route.stops[index];
            let to = &route.stops[index + 1];
            self.drive_leg(from, to, leg)?;

            let is_dropoff = index + 1 == leg_count;
            let (kind, activity, work, verb) = if is_dropoff {
                (WaypointKind::Dropoff, Activity::Dropoff, rules.dropoff, "Dropoff")
            } else {
                (WaypointKind::Pickup, Activity::Pickup, rules.pickup, "Pickup")
            };
            // A trip that never moves keeps only its start marker.
            if total_miles > MILE_EPSILON {
                self.waypoints.push(Waypoint {
                    location: to.clone(),
                    kind,
                    estimated_arrival: Some(self.now),
                });
            }
            self.work(activity, work, format!("{verb} - {}", to.name));
            self.pending_work = self.pending_work - work;

            if !is_dropoff {
                let miles_ahead: f64 = route.legs[index + 1..].iter().map(|l| l.miles).sum();
                self.top_up_fuel(miles_ahead);
            }
        }

        debug!(
            destination = %last.name,
            segments = self.segments.len(),
            fuel_stops = self.fuel_stops,
            violations = self.violations.len(),
            "trip segmented"
        );
        Ok(SegmentPlan {
            segments: self.segments,
            waypoints: self.waypoints,
            rest_periods: self.rest_periods,
            violations: self.violations,
            fuel_stops: self.fuel_stops,
        })
    }

    fn drive_leg(&mut self, from: &Location, to: &Location, leg: &Leg) -> Result<(), PlanError> {
        self.leg = LegProgress {
            from: from.clone(),
            to: to.clone(),
            miles: leg.miles,
            covered: 0.0,
        };
        let interval = self.clock.rules().fuel_interval_miles;
        let label = format!("En route to {}", to.name);
        let mut remaining_miles = leg.miles;
        let mut remaining_time = leg.drive_time;

        while remaining_time > Duration::zero() {
            self.step()?;
            let to_fuel = interval - self.miles_since_fuel;
            // Fuel is checked before rest so that when both fall due at
            // the same point the fuel stop comes first.
            if fuel_due(to_fuel, remaining_miles, remaining_time) {
                self.fuel();
                continue;
            }
            if let Some(limit) = self.clock.blocking_limit() {
                self.rest_for(limit);
                continue;
            }

            let mut chunk = self.clock.driving_available().min(remaining_time);
            let mut miles = if chunk == remaining_time {
                remaining_miles
            } else {
                remaining_miles * chunk.num_minutes() as f64 / remaining_time.num_minutes() as f64
            };
            if remaining_miles > to_fuel {
                let until_fuel = minutes_floor(remaining_time, to_fuel / remaining_miles);
                if until_fuel <= chunk {
                    chunk = until_fuel;
                    miles = to_fuel;
                }
                miles = miles.min(to_fuel);
            }

            self.drive(chunk, miles, &label);
            remaining_time = remaining_time - chunk;
            remaining_miles = if remaining_time > Duration::zero() {
                remaining_miles - miles
            } else {
                0.0
            };
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), PlanError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(PlanError::Unschedulable(format!(
                "no progress after {} planning steps",
                self.max_steps
            )));
        }
        Ok(())
    }

    fn remaining_work(&self) -> Duration {
        self.remaining_drive + self.pending_work
    }

    fn push_segment(&mut self, activity: Activity, duration: Duration, label: String, miles: f64) {
        let start = self.now;
        self.now = start + duration;
        self.segments.push(DutySegment {
            start,
            end: self.now,
            status: activity.status(),
            activity,
            label,
            miles,
        });
    }

    fn record_rejection(&mut self, rejection: DutyRejection) {
        self.violations.push(Violation {
            rule: rejection.limit.rule(),
            description: rejection.to_string(),
            at: self.now,
            segment: self.segments.len(),
        });
    }

    fn drive(&mut self, duration: Duration, miles: f64, label: &str) {
        if let Err(rejection) = self.clock.record_driving(duration) {
            self.record_rejection(rejection);
        }
        self.push_segment(Activity::Drive, duration, label.to_string(), miles);
        self.miles_since_fuel += miles;
        self.miles_driven += miles;
        self.leg.covered += miles;
        self.remaining_drive = self.remaining_drive - duration;
    }

    /// On-duty, non-driving work.  Rests first if the window or cycle
    /// cannot hold it.
    fn work(&mut self, activity: Activity, duration: Duration, label: String) {
        if !self.clock.can_work(duration) {
            self.rest();
        }
        if let Err(rejection) = self.clock.record_on_duty(duration) {
            self.record_rejection(rejection);
        }
        self.push_segment(activity, duration, label, 0.0);
    }

    fn fuel(&mut self) {
        let fuel_stop = self.clock.rules().fuel_stop;
        if !self.clock.can_work(fuel_stop) {
            self.rest();
        }
        let location = self
            .leg
            .position(format!("Fuel Stop (mile {:.0})", self.miles_driven));
        debug!(at = %self.now, miles = self.miles_driven, "fuel stop");
        self.waypoints.push(Waypoint {
            location: location.clone(),
            kind: WaypointKind::Fuel,
            estimated_arrival: Some(self.now),
        });
        self.work(Activity::Fuel, fuel_stop, location.name);
        self.fuel_stops += 1;
        self.miles_since_fuel = 0.0;
    }

    /// Fuel at a pickup when the rest of the route is longer than the
    /// remaining range, rather than stopping again shortly after.
    fn top_up_fuel(&mut self, miles_ahead: f64) {
        let range = self.clock.rules().fuel_interval_miles - self.miles_since_fuel;
        if self.miles_since_fuel > MILE_EPSILON && miles_ahead > range + MILE_EPSILON {
            self.fuel();
        }
    }

    fn rest_for(&mut self, limit: HosLimit) {
        let rest_break = self.clock.rules().rest_break;
        match (limit, rest_break) {
            (HosLimit::RestBreak, Some(rest_break)) => {
                self.off_duty(Activity::Break, rest_break.length, "30-minute break".into());
            }
            _ => self.rest(),
        }
    }

    /// Take a 10 hour rest, or a 34 hour restart when the cycle cannot
    /// cover the work still ahead.
    fn rest(&mut self) {
        let needed = self.remaining_work();
        let available = self.clock.cycle_remaining();
        let rules = self.clock.rules().clone();
        if available < needed {
            let used = self.clock.state().cycle_used;
            self.violations.push(Violation {
                rule: RuleId::CycleExhaustion,
                description: format!(
                    "cycle nearly exhausted: {:.1} of {:.0} hours used with {:.1} hours of work remaining; 34-hour restart inserted",
                    duration_hours(used),
                    duration_hours(rules.cycle_limit),
                    duration_hours(needed),
                ),
                at: self.now,
                segment: self.segments.len(),
            });
            self.off_duty(Activity::Restart, rules.cycle_restart, "34-hour restart".into());
        } else {
            self.off_duty(Activity::Rest, rules.daily_reset, "10-hour rest".into());
        }
    }

    fn off_duty(&mut self, activity: Activity, duration: Duration, label: String) {
        debug!(at = %self.now, ?activity, hours = duration_hours(duration), "off-duty period");
        if activity != Activity::Break {
            let name = match activity {
                Activity::Restart => format!("34-Hour Restart (mile {:.0})", self.miles_driven),
                _ => format!("Mandatory Rest (mile {:.0})", self.miles_driven),
            };
            self.waypoints.push(Waypoint {
                location: self.leg.position(name),
                kind: WaypointKind::Rest,
                estimated_arrival: Some(self.now),
            });
        }
        self.clock.record_off_duty(duration);
        let start = self.now;
        self.push_segment(activity, duration, label, 0.0);
        self.rest_periods.push(RestPeriod {
            start,
            end: self.now,
            activity,
        });
    }
}

/// Whether a fuel stop must happen before any more driving: the fuel
/// mark has been reached, or it lies on this leg less than a minute
/// ahead.
fn fuel_due(to_fuel: f64, remaining_miles: f64, remaining_time: Duration) -> bool {
    if to_fuel <= MILE_EPSILON {
        return true;
    }
    remaining_miles > to_fuel + MILE_EPSILON
        && minutes_floor(remaining_time, to_fuel / remaining_miles) == Duration::zero()
}

fn minutes_floor(duration: Duration, fraction: f64) -> Duration {
    Duration::minutes((duration.num_minutes() as f64 * fraction).floor() as i64)
}

/// Upper bound on loop iterations.  Every step either drives, fuels or
/// rests, and every rest frees at least the shortest driving budget, so
/// a valid trip finishes well inside this.
fn step_bound(legs: &[Leg], rules: &HosRules) -> usize {
    let miles: f64 = legs.iter().map(|leg| leg.miles).sum();
    let hours: i64 = legs.iter().map(|leg| leg.drive_time.num_hours() + 1).sum();
    let fuel_marks = if rules.fuel_interval_miles > 0.0 {
        (miles / rules.fuel_interval_miles).ceil() as usize
    } else {
        0
    };
    64 + 8 * legs.len() + 4 * fuel_marks + 4 * hours.max(0) as usize
}
