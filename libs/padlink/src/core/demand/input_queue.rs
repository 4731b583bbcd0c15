// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Prefetch queue of a manual input pad.
//!
//! Sizes and demand are tracked in the link's (inbound) unit, the unit of the
//! [`AtomicDemand`]. Dequeue amounts are expressed in the pad's own
//! (outbound) unit. Outside of the window where the sender is still
//! fulfilling demand, `size + demand == target_size`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::AtomicDemand;
use crate::core::buffers::{DemandUnit, QueueItem};

pub struct InputQueue {
    items: VecDeque<QueueItem>,
    inbound_unit: DemandUnit,
    outbound_unit: DemandUnit,
    atomic_demand: AtomicDemand,
    target_size: u64,
    size: u64,
    demand: u64,
    size_gauge: Arc<AtomicU64>,
}

impl InputQueue {
    /// Create the queue and immediately demand `target_size` from the sender.
    pub fn new(
        inbound_unit: DemandUnit,
        outbound_unit: DemandUnit,
        atomic_demand: AtomicDemand,
        target_size: u64,
    ) -> Self {
        let mut queue = Self {
            items: VecDeque::new(),
            inbound_unit,
            outbound_unit,
            atomic_demand,
            target_size,
            size: 0,
            demand: 0,
            size_gauge: Arc::new(AtomicU64::new(0)),
        };
        queue.refill();
        queue
    }

    pub fn enqueue(&mut self, item: QueueItem) {
        let size = item.size(self.inbound_unit);
        self.size += size;
        self.demand = self.demand.saturating_sub(size);
        self.items.push_back(item);
        self.size_gauge.store(self.size, Ordering::Relaxed);
    }

    /// Take items worth up to `amount` in the outbound unit.
    ///
    /// Stream formats and end of stream are taken as they come up. A byte
    /// buffer that does not fit is split. Returns the items and the amount
    /// taken, then asks the sender to refill toward the target.
    pub fn dequeue(&mut self, amount: u64) -> (Vec<QueueItem>, u64) {
        let mut taken = 0;
        let mut out = Vec::new();

        while let Some(item) = self.items.pop_front() {
            let buffer = match item {
                QueueItem::Buffer(buffer) => buffer,
                other => {
                    out.push(other);
                    continue;
                }
            };

            if taken >= amount {
                self.items.push_front(QueueItem::Buffer(buffer));
                break;
            }

            let outbound_size = self.outbound_unit.buffer_size(&buffer);
            if taken + outbound_size <= amount {
                taken += outbound_size;
                self.size = self
                    .size
                    .saturating_sub(self.inbound_unit.buffer_size(&buffer));
                out.push(QueueItem::Buffer(buffer));
                continue;
            }

            let inbound_before = self.inbound_unit.buffer_size(&buffer);
            let (head, rest) = self.outbound_unit.split_buffer(buffer, amount - taken);
            taken += self.outbound_unit.buffer_size(&head);
            let inbound_after = rest
                .as_ref()
                .map_or(0, |rest| self.inbound_unit.buffer_size(rest));
            self.size = self
                .size
                .saturating_sub(inbound_before.saturating_sub(inbound_after));
            out.push(QueueItem::Buffer(head));
            if let Some(rest) = rest {
                self.items.push_front(QueueItem::Buffer(rest));
            }
            break;
        }

        self.size_gauge.store(self.size, Ordering::Relaxed);
        self.refill();
        (out, taken)
    }

    /// Raise demand so that at least `wanted` (outbound unit) is queued or
    /// on its way. Only needed when the target does not prefetch.
    pub fn ensure_demand(&mut self, wanted: u64) {
        let wanted = self.to_inbound(wanted);
        let available = self.size + self.demand;
        if wanted > available {
            let missing = wanted - available;
            self.demand += missing;
            self.atomic_demand.increase(missing);
        }
    }

    fn refill(&mut self) {
        let to_demand = self
            .target_size
            .saturating_sub(self.size)
            .saturating_sub(self.demand);
        if to_demand > 0 {
            self.demand += to_demand;
            self.atomic_demand.increase(to_demand);
        }
    }

    fn to_inbound(&self, amount: u64) -> u64 {
        match (self.outbound_unit, self.inbound_unit) {
            (DemandUnit::Buffers, DemandUnit::Bytes) => {
                amount * DemandUnit::Bytes.buffer_size_approximation()
            }
            (DemandUnit::Bytes, DemandUnit::Buffers) => {
                amount.div_ceil(DemandUnit::Bytes.buffer_size_approximation())
            }
            _ => amount,
        }
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn demand(&self) -> u64 {
        self.demand
    }

    #[inline]
    pub fn target_size(&self) -> u64 {
        self.target_size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether a buffer is waiting, as opposed to only events or nothing.
    pub fn has_buffers(&self) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, QueueItem::Buffer(_)))
    }

    pub fn inbound_unit(&self) -> DemandUnit {
        self.inbound_unit
    }

    pub fn outbound_unit(&self) -> DemandUnit {
        self.outbound_unit
    }

    pub fn atomic_demand(&self) -> &AtomicDemand {
        &self.atomic_demand
    }

    pub(crate) fn size_gauge(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.size_gauge)
    }
}

impl std::fmt::Debug for InputQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputQueue")
            .field("items", &self.items.len())
            .field("inbound_unit", &self.inbound_unit)
            .field("outbound_unit", &self.outbound_unit)
            .field("target_size", &self.target_size)
            .field("size", &self.size)
            .field("demand", &self.demand)
            .finish()
    }
}
