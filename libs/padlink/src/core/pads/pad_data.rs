// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Runtime state of a linked pad.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{EffectiveFlowControl, FlowControl, PadDirection, PadRef, PadSpec, PadSummary};
use crate::core::buffers::{DemandUnit, QueueItem, StreamFormat};
use crate::core::demand::{AtomicDemand, InputQueue};
use crate::core::element::ElementHandle;

/// Materialized half of a link, owned by the element the pad belongs to.
///
/// Created when the link handshake succeeds and dropped on unlink.
pub struct PadData {
    pub pad_ref: PadRef,
    pub spec: PadSpec,
    pub link_id: String,

    pub other_element: ElementHandle,
    pub other_ref: PadRef,
    pub other_info: PadSummary,

    /// Unit the link's demand is counted in.
    pub demand_unit: DemandUnit,
    pub atomic_demand: AtomicDemand,

    pub stream_format: Option<StreamFormat>,
    pub start_of_stream: bool,
    pub end_of_stream: bool,

    /// Manual inputs only.
    pub input_queue: Option<InputQueue>,
    /// Pending amount the element asked for on a manual input, in the pad's unit.
    pub manual_demand_size: u64,

    /// Auto inputs: demand issued and not yet received, in the link unit.
    pub demand: i64,
    pub auto_demand_size: u64,
    pub auto_demand_paused: bool,
    /// Items held back while the element cannot take more.
    pub auto_flow_queue: VecDeque<QueueItem>,

    /// Mode the neighbour presents over this link. Auto pads only.
    pub other_effective_flow_control: Option<EffectiveFlowControl>,
    /// Last mode this element presented to an auto neighbour.
    pub sent_effective_flow_control: Option<EffectiveFlowControl>,

    /// Outputs: items produced while the link's toilet is paused.
    pub held_items: VecDeque<QueueItem>,

    pub buffers_sent: Arc<AtomicU64>,
    pub buffers_received: Arc<AtomicU64>,
}

impl PadData {
    pub fn new(
        pad_ref: PadRef,
        spec: PadSpec,
        other_element: ElementHandle,
        other_ref: PadRef,
        other_info: PadSummary,
        demand_unit: DemandUnit,
        atomic_demand: AtomicDemand,
    ) -> Self {
        let link_id = match spec.direction {
            PadDirection::Output => format!("{}:{}", pad_ref, other_ref),
            PadDirection::Input => format!("{}:{}", other_ref, pad_ref),
        };
        Self {
            pad_ref,
            spec,
            link_id,
            other_element,
            other_ref,
            other_info,
            demand_unit,
            atomic_demand,
            stream_format: None,
            start_of_stream: false,
            end_of_stream: false,
            input_queue: None,
            manual_demand_size: 0,
            demand: 0,
            auto_demand_size: 0,
            auto_demand_paused: false,
            auto_flow_queue: VecDeque::new(),
            other_effective_flow_control: None,
            sent_effective_flow_control: None,
            held_items: VecDeque::new(),
            buffers_sent: Arc::new(AtomicU64::new(0)),
            buffers_received: Arc::new(AtomicU64::new(0)),
        }
    }

    #[inline]
    pub fn direction(&self) -> PadDirection {
        self.spec.direction
    }

    #[inline]
    pub fn flow_control(&self) -> FlowControl {
        self.spec.flow_control
    }

    #[inline]
    pub fn is_auto(&self) -> bool {
        self.spec.flow_control.is_auto()
    }

    #[inline]
    pub fn is_manual(&self) -> bool {
        self.spec.flow_control.is_manual()
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.pad_ref.is_dynamic()
    }

    /// Auto pad linked to another auto pad; such pads exchange their views.
    pub fn has_auto_peer(&self) -> bool {
        self.is_auto() && self.other_info.flow_control.is_auto()
    }

    pub(crate) fn count_sent(&self, buffers: usize) {
        self.buffers_sent.fetch_add(buffers as u64, Ordering::Relaxed);
    }

    pub(crate) fn count_received(&self, buffers: usize) {
        self.buffers_received
            .fetch_add(buffers as u64, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for PadData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PadData")
            .field("pad_ref", &self.pad_ref)
            .field("link_id", &self.link_id)
            .field("flow_control", &self.spec.flow_control)
            .field("demand_unit", &self.demand_unit)
            .field("atomic_demand", &self.atomic_demand)
            .field("input_queue", &self.input_queue)
            .field("demand", &self.demand)
            .field(
                "other_effective_flow_control",
                &self.other_effective_flow_control,
            )
            .field("end_of_stream", &self.end_of_stream)
            .finish_non_exhaustive()
    }
}
