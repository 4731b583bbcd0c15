// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! AtomicDemand - the counter shared by the two ends of a link.
//!
//! The receiver increases it when it wants more data and the sender decreases
//! it when it sends. Only the counter, the statuses and the pause flag are
//! shared; the sender's buffered decrement is local to its copy of the handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use crate::core::buffers::DemandUnit;
use crate::core::config::FlowConfig;
use crate::core::element::{ElementHandle, ElementMessage};
use crate::core::pads::{EffectiveFlowControl, PadRef};
use crate::core::{Result, StreamError};

const STATUS_TO_BE_RESOLVED: u8 = 0;
const STATUS_PUSH: u8 = 1;
const STATUS_PULL: u8 = 2;

/// Resolution state of one end of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEndStatus {
    ToBeResolved,
    Resolved(EffectiveFlowControl),
}

impl LinkEndStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            STATUS_PUSH => LinkEndStatus::Resolved(EffectiveFlowControl::Push),
            STATUS_PULL => LinkEndStatus::Resolved(EffectiveFlowControl::Pull),
            _ => LinkEndStatus::ToBeResolved,
        }
    }
}

fn status_to_u8(mode: EffectiveFlowControl) -> u8 {
    match mode {
        EffectiveFlowControl::Push => STATUS_PUSH,
        EffectiveFlowControl::Pull => STATUS_PULL,
    }
}

/// Everything needed to create the shared demand of a link.
#[derive(Debug, Clone)]
pub struct AtomicDemandParams {
    pub receiver_effective_flow_control: EffectiveFlowControl,
    pub receiver: ElementHandle,
    pub receiver_demand_unit: DemandUnit,
    pub sender: ElementHandle,
    pub sender_pad_ref: PadRef,
    pub toilet_capacity: Option<u64>,
    pub throttling_factor: Option<u64>,
}

struct AtomicDemandShared {
    counter: AtomicI64,
    sender_status: AtomicU8,
    receiver_status: AtomicU8,
    paused: AtomicBool,
    toilet_capacity: u64,
    throttling_factor: u64,
    receiver_demand_unit: DemandUnit,
    receiver: ElementHandle,
    sender: ElementHandle,
    sender_pad_ref: PadRef,
}

/// Handle to the shared demand of one link.
///
/// Cloning shares the counter; the sender-local throttling state is copied.
#[derive(Clone)]
pub struct AtomicDemand {
    shared: Arc<AtomicDemandShared>,
    buffered_decrementation: u64,
    overflowed_since: Option<Instant>,
}

impl AtomicDemand {
    pub fn new(params: AtomicDemandParams, config: &FlowConfig) -> Self {
        let approximation = params.receiver_demand_unit.buffer_size_approximation();
        let toilet_capacity = params
            .toilet_capacity
            .unwrap_or(config.toilet_capacity_factor * approximation);
        let throttling_factor = params
            .throttling_factor
            .unwrap_or(config.throttling_factor)
            .max(1);

        Self {
            shared: Arc::new(AtomicDemandShared {
                counter: AtomicI64::new(0),
                sender_status: AtomicU8::new(STATUS_TO_BE_RESOLVED),
                receiver_status: AtomicU8::new(status_to_u8(
                    params.receiver_effective_flow_control,
                )),
                paused: AtomicBool::new(false),
                toilet_capacity,
                throttling_factor,
                receiver_demand_unit: params.receiver_demand_unit,
                receiver: params.receiver,
                sender: params.sender,
                sender_pad_ref: params.sender_pad_ref,
            }),
            buffered_decrementation: 0,
            overflowed_since: None,
        }
    }

    /// Receiver side: allow the sender to produce `value` more units.
    pub fn increase(&self, value: u64) {
        if value == 0 {
            return;
        }
        let value = value as i64;
        let new_value = self.shared.counter.fetch_add(value, Ordering::AcqRel) + value;
        let old_value = new_value - value;

        let resumed = -new_value <= self.shared.toilet_capacity as i64
            && self
                .shared
                .paused
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();

        if resumed {
            tracing::debug!(
                "[{}] toilet of {} drained to {}, resuming sender",
                self.shared.receiver.id(),
                self.shared.sender_pad_ref,
                new_value
            );
        }

        if (old_value <= 0 && new_value > 0) || resumed {
            self.notify_sender();
        }
    }

    /// Sender side: record that `value` units were sent.
    ///
    /// The decrement is flushed to the shared counter once it reaches the
    /// throttling factor.
    pub fn decrease(&mut self, value: u64) {
        self.buffered_decrementation += value;
        if self.buffered_decrementation >= self.shared.throttling_factor {
            self.flush();
        }
    }

    /// Apply a signed change: positive from the receiver, negative from the sender.
    pub fn adjust(&mut self, delta: i64) {
        if delta >= 0 {
            self.increase(delta as u64);
        } else {
            self.decrease(delta.unsigned_abs());
        }
    }

    /// Push any buffered decrement to the shared counter.
    pub fn flush(&mut self) {
        if self.buffered_decrementation == 0 {
            return;
        }
        let value = self.buffered_decrementation as i64;
        self.buffered_decrementation = 0;
        let new_value = self.shared.counter.fetch_sub(value, Ordering::AcqRel) - value;
        self.check_toilet(new_value);
    }

    fn check_toilet(&mut self, value: i64) {
        if !self.is_toilet() {
            return;
        }
        let capacity = self.shared.toilet_capacity as i64;
        if -value > capacity {
            if !self.shared.paused.swap(true, Ordering::AcqRel) {
                self.overflowed_since = Some(Instant::now());
                tracing::warn!(
                    "[{}] toilet overflow on {}: {} units sent without demand, capacity is {}; pausing sender",
                    self.shared.sender.id(),
                    self.shared.sender_pad_ref,
                    -value,
                    capacity
                );
            }
        } else if !self.is_paused() {
            self.overflowed_since = None;
        }
    }

    /// Fail if the toilet has stayed overflowed for longer than the configured
    /// timeout. Called by the sender whenever it tries to produce while paused.
    pub fn check_sustained_overflow(&mut self, timeout: Duration) -> Result<()> {
        if !self.is_paused() {
            self.overflowed_since = None;
            return Ok(());
        }
        let since = *self.overflowed_since.get_or_insert_with(Instant::now);
        if since.elapsed() > timeout {
            return Err(StreamError::ToiletOverflow {
                pad: self.shared.sender_pad_ref.to_string(),
                unconsumed: -self.current(),
                capacity: self.shared.toilet_capacity,
            });
        }
        Ok(())
    }

    fn notify_sender(&self) {
        let delivered = self
            .shared
            .sender
            .send(ElementMessage::AtomicDemandIncreased {
                pad: self.shared.sender_pad_ref.clone(),
            });
        if !delivered {
            tracing::trace!(
                "[{}] sender {} is gone, demand notification dropped",
                self.shared.receiver.id(),
                self.shared.sender.id()
            );
        }
    }

    /// Value of the shared counter. May be stale; diagnostics only.
    #[inline]
    pub fn current(&self) -> i64 {
        self.shared.counter.load(Ordering::Acquire)
    }

    /// Demand as seen by the sender, including its unflushed decrement.
    #[inline]
    pub fn sender_view(&self) -> i64 {
        self.current() - self.buffered_decrementation as i64
    }

    pub fn set_sender_status(&self, mode: EffectiveFlowControl) {
        let previous = self
            .shared
            .sender_status
            .swap(status_to_u8(mode), Ordering::AcqRel);
        if previous != status_to_u8(mode) {
            tracing::trace!(
                "[{}] sender status of {} resolved to {}",
                self.shared.sender.id(),
                self.shared.sender_pad_ref,
                mode
            );
        }
    }

    pub fn sender_status(&self) -> LinkEndStatus {
        LinkEndStatus::from_u8(self.shared.sender_status.load(Ordering::Acquire))
    }

    pub fn set_receiver_status(&self, mode: EffectiveFlowControl) {
        self.shared
            .receiver_status
            .store(status_to_u8(mode), Ordering::Release);

        // A push receiver never overflows; release a sender paused earlier.
        if mode == EffectiveFlowControl::Push && self.shared.paused.swap(false, Ordering::AcqRel) {
            self.notify_sender();
        }
    }

    pub fn receiver_status(&self) -> LinkEndStatus {
        LinkEndStatus::from_u8(self.shared.receiver_status.load(Ordering::Acquire))
    }

    /// A push sender feeding a pull receiver: demand only detects overflow.
    pub fn is_toilet(&self) -> bool {
        self.sender_status() == LinkEndStatus::Resolved(EffectiveFlowControl::Push)
            && self.receiver_status() == LinkEndStatus::Resolved(EffectiveFlowControl::Pull)
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    /// Whether the sender may produce right now.
    pub fn may_produce(&self) -> bool {
        if self.is_paused() {
            return false;
        }
        match self.sender_status() {
            LinkEndStatus::Resolved(EffectiveFlowControl::Push) => true,
            _ => self.sender_view() > 0,
        }
    }

    #[inline]
    pub fn toilet_capacity(&self) -> u64 {
        self.shared.toilet_capacity
    }

    #[inline]
    pub fn throttling_factor(&self) -> u64 {
        self.shared.throttling_factor
    }

    #[inline]
    pub fn receiver_demand_unit(&self) -> DemandUnit {
        self.shared.receiver_demand_unit
    }

    #[inline]
    pub fn sender_pad_ref(&self) -> &PadRef {
        &self.shared.sender_pad_ref
    }

    /// Shared counter for read-only metric producers.
    pub(crate) fn counter_probe(&self) -> impl Fn() -> i64 + Send + Sync + 'static {
        let shared = Arc::clone(&self.shared);
        move || shared.counter.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for AtomicDemand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicDemand")
            .field("value", &self.current())
            .field("sender", self.shared.sender.id())
            .field("sender_pad_ref", &self.shared.sender_pad_ref)
            .field("receiver", self.shared.receiver.id())
            .field("sender_status", &self.sender_status())
            .field("receiver_status", &self.receiver_status())
            .field("paused", &self.is_paused())
            .field("toilet_capacity", &self.shared.toilet_capacity)
            .field("throttling_factor", &self.shared.throttling_factor)
            .field("buffered_decrementation", &self.buffered_decrementation)
            .finish()
    }
}
