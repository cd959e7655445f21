//! ELD planner library crate.
//!
//! This crate plans truck trips under the federal Hours-of-Service rules
//! and produces the daily log sheets an electronic logging device would
//! record.  External applications may depend on the `eld_planner` crate
//! and call [`engine::plan_trip`] directly with their own
//! [`distance::DistanceProvider`], or embed the HTTP API via
//! [`api::build_router`].

pub mod rules;
pub mod models;
pub mod error;
pub mod distance;
pub mod clock;
pub mod segmenter;
pub mod logsheet;
pub mod report;
pub mod engine;
pub mod config;
pub mod api;
