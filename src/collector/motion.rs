use crate::collector::{Acceleration, SensorError};
#[cfg(test)]
use std::collections::VecDeque;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Magnitude on the x or y axis above which a sample counts as movement.
pub const MOTION_THRESHOLD: f64 = 2.0;

pub trait MotionSampler {
    /// Returns every sample gathered since the previous call.
    fn drain(&mut self) -> Result<Vec<Acceleration>, SensorError>;
}

pub fn is_motion(sample: &Acceleration) -> bool {
    sample.x.abs() > MOTION_THRESHOLD || sample.y.abs() > MOTION_THRESHOLD
}

/// Hosts without an accelerometer.
#[derive(Debug, Default)]
pub struct NoMotionSensor;

impl MotionSampler for NoMotionSensor {
    fn drain(&mut self) -> Result<Vec<Acceleration>, SensorError> {
        Err(SensorError::Unavailable(
            "no accelerometer on this host".to_string(),
        ))
    }
}

const IIO_ROOT: &str = "/sys/bus/iio/devices";

/// Linux industrial-I/O accelerometer. Each drain yields the change since the
/// previous reading, so gravity cancels out; the first drain yields nothing.
#[derive(Debug)]
pub struct IioMotionSensor {
    device: PathBuf,
    previous: Option<Acceleration>,
}

impl IioMotionSensor {
    pub fn detect() -> Option<Self> {
        Self::detect_in(Path::new(IIO_ROOT))
    }

    fn detect_in(root: &Path) -> Option<Self> {
        let mut devices = fs::read_dir(root)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.join("in_accel_x_raw").exists())
            .collect::<Vec<_>>();
        devices.sort();

        devices.into_iter().next().map(|device| Self {
            device,
            previous: None,
        })
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    fn read_axis(&self, axis: &str) -> Result<f64, SensorError> {
        let raw = read_number(&self.device.join(format!("in_accel_{axis}_raw")))?;
        let scale = read_number(&self.device.join(format!("in_accel_{axis}_scale")))
            .or_else(|_| read_number(&self.device.join("in_accel_scale")))
            .unwrap_or(1.0);

        Ok(raw * scale)
    }
}

impl MotionSampler for IioMotionSensor {
    fn drain(&mut self) -> Result<Vec<Acceleration>, SensorError> {
        let current = Acceleration {
            x: self.read_axis("x")?,
            y: self.read_axis("y")?,
            z: self.read_axis("z")?,
        };

        let delta = self.previous.replace(current).map(|previous| Acceleration {
            x: current.x - previous.x,
            y: current.y - previous.y,
            z: current.z - previous.z,
        });

        Ok(delta.into_iter().collect())
    }
}

fn read_number(path: &Path) -> Result<f64, SensorError> {
    let content = fs::read_to_string(path).map_err(|error| match error.kind() {
        ErrorKind::PermissionDenied => SensorError::PermissionDenied,
        _ => SensorError::Unavailable(format!("{}: {error}", path.display())),
    })?;

    content
        .trim()
        .parse::<f64>()
        .map_err(|_| SensorError::Unavailable(format!("unreadable value in {}", path.display())))
}

/// Replays queued batches, one per `drain` call.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedMotion {
    batches: VecDeque<Result<Vec<Acceleration>, SensorError>>,
}

#[cfg(test)]
impl ScriptedMotion {
    pub fn push(&mut self, batch: Result<Vec<Acceleration>, SensorError>) -> &mut Self {
        self.batches.push_back(batch);
        self
    }

    pub fn still() -> Self {
        Self::default()
    }

    pub fn shaking() -> Self {
        let mut sampler = Self::default();
        sampler.push(Ok(vec![Acceleration {
            x: 3.4,
            y: 0.2,
            z: 9.8,
        }]));
        sampler
    }
}

#[cfg(test)]
impl MotionSampler for ScriptedMotion {
    fn drain(&mut self) -> Result<Vec<Acceleration>, SensorError> {
        self.batches.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}
