// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

/// Per-side options of a link.
///
/// Backpressure thresholds (`toilet_capacity`, `throttling_factor`) are read
/// from the input side only; the consumer controls them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkProps {
    /// Unconsumed units tolerated before a push sender is paused.
    pub toilet_capacity: Option<u64>,
    /// Minimum accumulated decrement flushed across the link at once.
    pub throttling_factor: Option<u64>,
    /// Prefetch target of a manual input queue.
    pub target_queue_size: Option<u64>,
    /// Demand kept outstanding on an auto input.
    pub auto_demand_size: Option<u64>,
}

impl LinkProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toilet_capacity(mut self, capacity: u64) -> Self {
        self.toilet_capacity = Some(capacity);
        self
    }

    pub fn throttling_factor(mut self, factor: u64) -> Self {
        self.throttling_factor = Some(factor);
        self
    }

    pub fn target_queue_size(mut self, size: u64) -> Self {
        self.target_queue_size = Some(size);
        self
    }

    pub fn auto_demand_size(mut self, size: u64) -> Self {
        self.auto_demand_size = Some(size);
        self
    }
}
