//! Reorg safety: deciding when a block is final enough to notify on.

use std::sync::Arc;

use crate::{config::ConfigurationProvider, models::Alarm};

/// Applies the deployment-wide reorg margin, raised per alarm by its own
/// confirmation requirement.
#[derive(Clone)]
pub struct ReorgPolicy {
    config: Arc<dyn ConfigurationProvider>,
}

impl ReorgPolicy {
    /// Creates a policy reading the margin from `config`.
    pub fn new(config: Arc<dyn ConfigurationProvider>) -> Self {
        Self { config }
    }

    /// Blocks that must be built on top of a block before it is final for
    /// `alarm`.
    pub fn margin_for(&self, alarm: &Alarm) -> u64 {
        self.config.reorg_safety().max(alarm.block_confirmations)
    }

    /// Highest final block for `alarm` given the current chain head.
    ///
    /// `None` while the chain is shorter than the margin: nothing is final yet.
    pub fn effective_safe_height(&self, chain_head: u64, alarm: &Alarm) -> Option<u64> {
        chain_head.checked_sub(self.margin_for(alarm))
    }

    /// True if a block at `height` is final for `alarm`.
    pub fn is_final(&self, height: u64, chain_head: u64, alarm: &Alarm) -> bool {
        self.effective_safe_height(chain_head, alarm).is_some_and(|safe| height <= safe)
    }
}
