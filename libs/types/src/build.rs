//! Decoded build specification for a vehicle
//!
//! A `BuildSpec` is a value type: once decoded it is never edited, only
//! replaced wholesale.

use serde::{Deserialize, Serialize};

/// Decoded vehicle specification (year/make/model/trim and powertrain data)
///
/// Field names follow the provider's decode payload. Missing fields decode to
/// their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSpec {
    pub year: i32,
    pub make: String,
    pub model: String,
    pub trim: String,
    pub version: String,
    pub body_type: String,
    pub vehicle_type: String,
    pub transmission: String,
    pub drivetrain: String,
    pub fuel_type: String,
    pub doors: i32,
    pub made_in: String,
    pub overall_height: String,
    pub overall_length: String,
    pub overall_width: String,
    pub std_seating: String,
    pub highway_mpg: i32,
    pub city_mpg: i32,
    pub powertrain_type: String,
}

impl BuildSpec {
    /// A spec without a make carries no usable decode.
    pub fn is_empty(&self) -> bool {
        self.make.trim().is_empty()
    }
}
