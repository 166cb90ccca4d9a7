//! Best-effort device signals used as verification evidence.
//!
//! Every sampler may fail. Callers treat `PermissionDenied` and `Unavailable`
//! the same way: the attempt continues with less evidence.

pub mod location;
pub mod motion;

pub use location::{ConfiguredLocation, LocationSampler};
pub use motion::{IioMotionSensor, MotionSampler, NoMotionSensor};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SensorError {
    #[error("sensor permission denied")]
    PermissionDenied,
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
}
