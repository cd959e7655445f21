//! Distance and drive-time lookup.
//!
//! The planner does not geocode or route on a road graph.  It asks a
//! [`DistanceProvider`] for the coordinates of each stop and the miles
//! and drive time of each leg between consecutive stops, once per trip.
//! This module defines that trait, the route table format used by the
//! bundled provider, and helpers for loading route tables from
//! versioned JSON files.

use crate::models::Location;
use crate::rules::hours_to_duration;
use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Errors reported by a [`DistanceProvider`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown location: {0}")]
    UnknownLocation(String),

    #[error("no route between {from} and {to}")]
    MissingLeg { from: String, to: String },

    #[error("invalid leg {from} -> {to}: {reason}")]
    InvalidLeg {
        from: String,
        to: String,
        reason: String,
    },

    /// The provider answered, but not for every stop or leg asked for.
    #[error("incomplete route estimate: {0}")]
    Incomplete(String),
}

/// A single leg between consecutive stops.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub miles: f64,
    pub drive_time: Duration,
}

/// The provider's answer for an ordered list of stops.
///
/// `stops` has one entry per requested name and `legs` one entry per
/// consecutive pair, so `legs.len() == stops.len() - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEstimate {
    pub stops: Vec<Location>,
    pub legs: Vec<Leg>,
}

/// Supplies distances and drive times for the planner.
///
/// Providers must be thread-safe (`Send + Sync`) because the server
/// shares one instance across concurrent requests and batch planning
/// calls it from multiple threads.
pub trait DistanceProvider: Send + Sync {
    /// Short name used in logs and the health endpoint.
    fn name(&self) -> &str;

    /// Resolve `stops` and estimate every leg between consecutive
    /// entries.  Called once per trip with all stops batched together.
    fn estimate(&self, stops: &[&str]) -> Result<RouteEstimate, ProviderError>;
}

/// A leg as written in a route table file.  Legs are symmetric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableLeg {
    pub from: String,
    pub to: String,
    pub miles: f64,
    /// Typical drive time in hours.
    pub hours: f64,
}

/// A set of known places and precomputed legs, stored as JSON.
///
/// Route tables are expected to live under `route_tables/`.  Several
/// tables may be loaded at once; later files extend earlier ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteTable {
    /// Table name, e.g. `"us-interstate-2024"`.
    pub name: String,
    pub places: Vec<Location>,
    #[serde(default)]
    pub legs: Vec<TableLeg>,
}

/// Load all route tables from a directory.
///
/// Every `.json` file that parses as a [`RouteTable`] is returned.
/// Files that fail to parse are logged and skipped; a missing directory
/// yields an empty list.
pub fn load_route_tables_from_dir(path: &std::path::Path) -> Result<Vec<RouteTable>> {
    let mut tables = Vec::new();
    if path.is_dir() {
        let mut entries = std::fs::read_dir(path)?.collect::<std::io::Result<Vec<_>>>()?;
        // Directory order is platform dependent; later tables override
        // earlier ones, so make that order stable.
        entries.sort_by_key(|entry| entry.path());
        for entry in entries {
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.path().extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let data = std::fs::read_to_string(entry.path())?;
            match serde_json::from_str::<RouteTable>(&data) {
                Ok(table) => tables.push(table),
                Err(err) => {
                    tracing::warn!(path = ?entry.path(), error = %err, "failed to parse route table");
                }
            }
        }
    }
    Ok(tables)
}

fn normalise(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Great-circle distance between two points in miles.
pub fn haversine_miles(a: &Location, b: &Location) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().asin()
}

/// Estimate for place pairs a table has coordinates for but no leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GreatCircleFallback {
    /// Ratio of road distance to great-circle distance.
    pub circuity: f64,
    pub average_mph: f64,
}

impl Default for GreatCircleFallback {
    fn default() -> Self {
        Self {
            circuity: 1.2,
            average_mph: 55.0,
        }
    }
}

impl GreatCircleFallback {
    fn leg(&self, from: &Location, to: &Location) -> Leg {
        let miles = haversine_miles(from, to) * self.circuity;
        Leg {
            miles,
            drive_time: hours_to_duration(miles / self.average_mph),
        }
    }
}

/// A [`DistanceProvider`] backed by route tables.
pub struct TableProvider {
    places: HashMap<String, Location>,
    legs: HashMap<(String, String), Leg>,
    fallback: Option<GreatCircleFallback>,
}

impl TableProvider {
    /// Merge `tables` into one lookup.  The great-circle fallback is
    /// enabled; see [`TableProvider::without_fallback`].
    pub fn from_tables(tables: Vec<RouteTable>) -> Self {
        let mut places = HashMap::new();
        let mut legs = HashMap::new();
        for table in tables {
            tracing::debug!(table = %table.name, places = table.places.len(), legs = table.legs.len(), "loading route table");
            for place in table.places {
                places.insert(normalise(&place.name), place);
            }
            for leg in table.legs {
                let key = (normalise(&leg.from), normalise(&leg.to));
                legs.insert(
                    key,
                    Leg {
                        miles: leg.miles,
                        drive_time: hours_to_duration(leg.hours),
                    },
                );
            }
        }
        Self {
            places,
            legs,
            fallback: Some(GreatCircleFallback::default()),
        }
    }

    /// Only answer for legs listed explicitly in the tables.
    pub fn without_fallback(mut self) -> Self {
        self.fallback = None;
        self
    }

    pub fn place_count(&self) -> usize {
        self.places.len()
    }

    fn place(&self, name: &str) -> Result<&Location, ProviderError> {
        self.places
            .get(&normalise(name))
            .ok_or_else(|| ProviderError::UnknownLocation(name.to_string()))
    }

    fn leg(&self, from: &Location, to: &Location) -> Result<Leg, ProviderError> {
        let (a, b) = (normalise(&from.name), normalise(&to.name));
        if a == b {
            return Ok(Leg {
                miles: 0.0,
                drive_time: Duration::zero(),
            });
        }
        if let Some(leg) = self
            .legs
            .get(&(a.clone(), b.clone()))
            .or_else(|| self.legs.get(&(b, a)))
        {
            return Ok(leg.clone());
        }
        match &self.fallback {
            Some(fallback) => Ok(fallback.leg(from, to)),
            None => Err(ProviderError::MissingLeg {
                from: from.name.clone(),
                to: to.name.clone(),
            }),
        }
    }
}

impl DistanceProvider for TableProvider {
    fn name(&self) -> &str {
        "route-table"
    }

    fn estimate(&self, stops: &[&str]) -> Result<RouteEstimate, ProviderError> {
        let stops = stops
            .iter()
            .map(|name| self.place(name).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        let legs = stops
            .windows(2)
            .map(|pair| self.leg(&pair[0], &pair[1]))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RouteEstimate { stops, legs })
    }
}
