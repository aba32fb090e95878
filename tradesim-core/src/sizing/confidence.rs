//! Confidence-scaled sizer: linear from `floor` at confidence 0 to `ceiling` at 1.

use crate::domain::Signal;

use super::{PositionSizer, SizingContext};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceSizer {
    pub floor: f64,
    pub ceiling: f64,
}

impl ConfidenceSizer {
    pub fn new(floor: f64, ceiling: f64) -> Self {
        Self { floor, ceiling }
    }
}

impl PositionSizer for ConfidenceSizer {
    fn name(&self) -> &str {
        "confidence"
    }

    fn size(&self, signal: &Signal, _ctx: &SizingContext<'_>) -> f64 {
        match signal.confidence {
            Some(c) => self.floor + (self.ceiling - self.floor) * c.clamp(0.0, 1.0),
            None => self.floor,
        }
    }
}
