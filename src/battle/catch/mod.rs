pub mod calculation;
pub mod commands;
pub mod validation;

pub use calculation::*;
pub use commands::*;
pub use validation::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Capture device tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CaptureDevice {
    #[default]
    Basic,
    Great,
    Ultra,
    /// Never fails.
    Master,
}

impl CaptureDevice {
    pub fn multiplier(&self) -> f64 {
        match self {
            CaptureDevice::Basic => 1.0,
            CaptureDevice::Great => 1.5,
            CaptureDevice::Ultra => 2.0,
            CaptureDevice::Master => 255.0,
        }
    }
}

impl fmt::Display for CaptureDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureDevice::Basic => "Poke Ball",
            CaptureDevice::Great => "Great Ball",
            CaptureDevice::Ultra => "Ultra Ball",
            CaptureDevice::Master => "Master Ball",
        };
        f.write_str(name)
    }
}
