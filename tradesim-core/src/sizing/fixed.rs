//! Fixed fraction sizer — commit the same share of the basis on every entry.

use crate::domain::Signal;

use super::{PositionSizer, SizingContext};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedFractionSizer {
    pub fraction: f64,
}

impl FixedFractionSizer {
    pub fn new(fraction: f64) -> Self {
        Self { fraction }
    }

    /// Commit everything.
    pub fn full() -> Self {
        Self::new(1.0)
    }
}

impl PositionSizer for FixedFractionSizer {
    fn name(&self) -> &str {
        "fixed"
    }

    fn size(&self, _signal: &Signal, _ctx: &SizingContext<'_>) -> f64 {
        self.fraction
    }
}
