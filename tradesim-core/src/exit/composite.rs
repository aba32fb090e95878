//! Composite exit — consult policies in order, first non-hold decision wins.

use crate::domain::Position;

use super::{ExitDecision, ExitPolicy, MarketContext};

pub struct CompositeExit {
    policies: Vec<Box<dyn ExitPolicy>>,
}

impl CompositeExit {
    pub fn new(policies: Vec<Box<dyn ExitPolicy>>) -> Self {
        Self { policies }
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.policies.iter().map(|p| p.name()).collect()
    }
}

impl std::fmt::Debug for CompositeExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeExit")
            .field("policies", &self.names())
            .finish()
    }
}

impl ExitPolicy for CompositeExit {
    fn name(&self) -> &str {
        "composite"
    }

    fn check(&self, position: &Position, ctx: &MarketContext<'_>) -> ExitDecision {
        self.policies
            .iter()
            .map(|p| p.check(position, ctx))
            .find(|d| !d.is_hold())
            .unwrap_or(ExitDecision::Hold)
    }
}
