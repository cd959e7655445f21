//! Daily log generation.
//!
//! Folds a trip's duty segments into one [`DailyLog`] per calendar date.
//! Segments that cross midnight are split at the boundary with their
//! distance apportioned by elapsed time.  Totals are computed from the
//! split segments, so a log's totals always equal the sum of its
//! segments.  Violations found while planning are attached to the log
//! covering the moment they occurred, together with whatever an
//! independent replay of the segments against the limits turns up.

use crate::models::{DailyLog, DutySegment, DutyStatus, RuleId, Violation};
use crate::rules::{duration_hours, HosRules};
use chrono::{Duration, NaiveDateTime, NaiveTime};

pub struct LogSheetGenerator<'a> {
    rules: &'a HosRules,
}

impl<'a> LogSheetGenerator<'a> {
    pub fn new(rules: &'a HosRules) -> Self {
        Self { rules }
    }

    /// Build the daily logs for `segments`.
    ///
    /// `initial_cycle` is the cycle time already used when the first
    /// segment starts; the audit needs it to check the 70 hour limit.
    pub fn generate(
        &self,
        segments: &[DutySegment],
        planner_violations: &[Violation],
        initial_cycle: Duration,
    ) -> Vec<DailyLog> {
        let mut logs: Vec<DailyLog> = Vec::new();
        for piece in split_at_midnight(segments) {
            let date = piece.start.date();
            if logs.last().map_or(true, |log| log.date != date) {
                logs.push(DailyLog {
                    date,
                    segments: Vec::new(),
                    driving: Duration::zero(),
                    on_duty: Duration::zero(),
                    rest: Duration::zero(),
                    violations: Vec::new(),
                });
            }
            if let Some(log) = logs.last_mut() {
                let duration = piece.duration();
                match piece.status.log_status() {
                    DutyStatus::Driving => log.driving = log.driving + duration,
                    DutyStatus::OnDuty => log.on_duty = log.on_duty + duration,
                    _ => log.rest = log.rest + duration,
                }
                log.segments.push(piece);
            }
        }

        let mut violations = planner_violations.to_vec();
        violations.extend(audit(segments, initial_cycle, self.rules));
        for violation in violations {
            attach(&mut logs, violation);
        }
        for log in &mut logs {
            log.violations.sort_by_key(|v| v.at);
        }
        logs
    }
}

/// Put `violation` on the log for its date, or the closest earlier log
/// when the trip has no segment on that date.
fn attach(logs: &mut [DailyLog], violation: Violation) {
    let date = violation.at.date();
    let index = logs
        .iter()
        .rposition(|log| log.date <= date)
        .unwrap_or(0);
    if let Some(log) = logs.get_mut(index) {
        log.violations.push(violation);
    }
}

fn next_midnight(at: NaiveDateTime) -> NaiveDateTime {
    at.date()
        .succ_opt()
        .map_or(NaiveDateTime::MAX, |date| date.and_time(NaiveTime::MIN))
}

/// Split every segment at each midnight it crosses.
///
/// The pieces of a segment keep its status, activity and label; its
/// miles are shared out by elapsed time with the final piece taking the
/// remainder so nothing is lost to rounding.
pub fn split_at_midnight(segments: &[DutySegment]) -> Vec<DutySegment> {
    let mut pieces = Vec::with_capacity(segments.len());
    for segment in segments {
        let total_minutes = segment.duration().num_minutes();
        let mut cursor = segment.start;
        let mut miles_left = segment.miles;
        while cursor < segment.end {
            let end = next_midnight(cursor).min(segment.end);
            let miles = if end == segment.end || total_minutes == 0 {
                miles_left
            } else {
                segment.miles * (end - cursor).num_minutes() as f64 / total_minutes as f64
            };
            miles_left -= miles;
            pieces.push(DutySegment {
                start: cursor,
                end,
                miles,
                ..segment.clone()
            });
            cursor = end;
        }
    }
    pieces
}

/// Replay `segments` against the daily and cycle limits and report every
/// driving segment that breaches one.
///
/// This does not trust the planner: it recomputes the counters from the
/// segments alone, resetting them only on qualifying off-duty periods.
pub fn audit(segments: &[DutySegment], initial_cycle: Duration, rules: &HosRules) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut driving = Duration::zero();
    let mut window = Duration::zero();
    let mut cycle = initial_cycle;
    let mut since_break = Duration::zero();
    let break_length = rules.rest_break.map(|b| b.length);

    for (index, segment) in segments.iter().enumerate() {
        let duration = segment.duration();
        let mut flag = |rule: RuleId, description: String| {
            violations.push(Violation {
                rule,
                description,
                at: segment.start,
                segment: index,
            });
        };
        match segment.status {
            DutyStatus::Driving => {
                driving = driving + duration;
                window = window + duration;
                cycle = cycle + duration;
                since_break = since_break + duration;
                if driving > rules.max_driving {
                    flag(
                        RuleId::DrivingLimit,
                        format!(
                            "{:.2} hours driven since the last qualifying rest (limit {:.0})",
                            duration_hours(driving),
                            duration_hours(rules.max_driving)
                        ),
                    );
                }
                if window > rules.duty_window {
                    flag(
                        RuleId::DutyWindow,
                        format!(
                            "driving {:.2} hours after the start of the duty window (limit {:.0})",
                            duration_hours(window),
                            duration_hours(rules.duty_window)
                        ),
                    );
                }
                if cycle > rules.cycle_limit {
                    flag(
                        RuleId::CycleLimit,
                        format!(
                            "driving with {:.2} cycle hours used (limit {:.0})",
                            duration_hours(cycle),
                            duration_hours(rules.cycle_limit)
                        ),
                    );
                }
                if let Some(rest_break) = rules.rest_break {
                    if since_break > rest_break.after_driving {
                        flag(
                            RuleId::RestBreak,
                            format!(
                                "{:.2} hours driven without a 30-minute break",
                                duration_hours(since_break)
                            ),
                        );
                    }
                }
            }
            DutyStatus::OnDuty => {
                window = window + duration;
                cycle = cycle + duration;
                if break_length.map_or(false, |length| duration >= length) {
                    since_break = Duration::zero();
                }
            }
            DutyStatus::OffDuty | DutyStatus::Sleeper => {
                if duration >= rules.cycle_restart {
                    cycle = Duration::zero();
                }
                if duration >= rules.daily_reset {
                    driving = Duration::zero();
                    window = Duration::zero();
                    since_break = Duration::zero();
                } else {
                    window = window + duration;
                    if break_length.map_or(false, |length| duration >= length) {
                        since_break = Duration::zero();
                    }
                }
            }
        }
    }
    violations
}
