use crate::collector::{GeoPoint, SensorError};

pub trait LocationSampler {
    /// One-shot position request.
    fn sample(&mut self) -> Result<GeoPoint, SensorError>;
}

/// Location the user stored with `config set location`. Without one the
/// request behaves like a denied permission prompt.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredLocation {
    point: Option<GeoPoint>,
}

impl ConfiguredLocation {
    pub fn new(point: Option<GeoPoint>) -> Self {
        Self { point }
    }
}

impl LocationSampler for ConfiguredLocation {
    fn sample(&mut self) -> Result<GeoPoint, SensorError> {
        self.point.ok_or(SensorError::PermissionDenied)
    }
}
