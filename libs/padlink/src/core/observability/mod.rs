// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Metrics sink and point-in-time snapshots of element state.

mod metrics;

pub use metrics::{InMemoryMetrics, MetricProbe, MetricSnapshot, MetricsSink, NoopMetrics};
pub(crate) use metrics::register_pad_metrics;

use serde::{Deserialize, Serialize};

use crate::core::buffers::DemandUnit;
use crate::core::demand::LinkEndStatus;
use crate::core::element::{ElementState, PlaybackState};
use crate::core::pads::{EffectiveFlowControl, FlowControl, PadData, PadDirection};

/// Point-in-time snapshot of an element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub id: String,
    pub playback: PlaybackState,
    pub terminating: bool,
    /// Operating mode derived from the element's auto pads.
    pub effective_flow_control: EffectiveFlowControl,
    /// Linked pads, sorted by reference.
    pub pads: Vec<PadSnapshot>,
    pub satisfied_auto_output_pads: Vec<String>,
    pub awaiting_auto_input_pads: Vec<String>,
    /// Auto inputs in their current round-robin order.
    pub auto_input_pads: Vec<String>,
}

impl ElementSnapshot {
    pub fn capture(state: &ElementState) -> Self {
        let mut satisfied: Vec<String> = state
            .satisfied_auto_output_pads
            .iter()
            .map(ToString::to_string)
            .collect();
        satisfied.sort();
        let mut awaiting: Vec<String> = state
            .awaiting_auto_input_pads
            .iter()
            .map(ToString::to_string)
            .collect();
        awaiting.sort();

        Self {
            id: state.id().to_string(),
            playback: state.playback(),
            terminating: state.is_terminating(),
            effective_flow_control: state.effective_flow_control(),
            pads: state
                .linked_pads()
                .iter()
                .filter_map(|pad| state.pad_data(pad))
                .map(|data| PadSnapshot::capture(data, state.effective_flow_control()))
                .collect(),
            satisfied_auto_output_pads: satisfied,
            awaiting_auto_input_pads: awaiting,
            auto_input_pads: state
                .auto_input_pads
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    pub fn pad(&self, pad: &str) -> Option<&PadSnapshot> {
        self.pads.iter().find(|p| p.pad == pad)
    }

    /// Whether `pad` appears in any of the element's pad or auto bookkeeping.
    pub fn references_pad(&self, pad: &str) -> bool {
        self.pad(pad).is_some()
            || self.satisfied_auto_output_pads.iter().any(|p| p == pad)
            || self.awaiting_auto_input_pads.iter().any(|p| p == pad)
            || self.auto_input_pads.iter().any(|p| p == pad)
    }
}

/// Point-in-time snapshot of a linked pad.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PadSnapshot {
    pub pad: String,
    pub link_id: String,
    pub direction: PadDirection,
    pub flow_control: FlowControl,
    /// Resolved behaviour of the pad.
    pub effective_flow_control: EffectiveFlowControl,
    pub other_effective_flow_control: Option<EffectiveFlowControl>,
    pub demand_unit: DemandUnit,
    /// Shared counter value. May be stale.
    pub atomic_demand: i64,
    pub sender_status: Option<EffectiveFlowControl>,
    pub receiver_status: Option<EffectiveFlowControl>,
    pub toilet_capacity: u64,
    pub paused: bool,
    /// Auto inputs: outstanding demand.
    pub demand: i64,
    pub manual_demand_size: u64,
    pub input_queue: Option<InputQueueSnapshot>,
    pub auto_flow_queue: usize,
    pub held_items: usize,
    pub stream_format: Option<String>,
    pub start_of_stream: bool,
    pub end_of_stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputQueueSnapshot {
    pub size: u64,
    pub demand: u64,
    pub target_size: u64,
}

fn resolved(status: LinkEndStatus) -> Option<EffectiveFlowControl> {
    match status {
        LinkEndStatus::Resolved(mode) => Some(mode),
        LinkEndStatus::ToBeResolved => None,
    }
}

impl PadSnapshot {
    fn capture(data: &PadData, element_mode: EffectiveFlowControl) -> Self {
        Self {
            pad: data.pad_ref.to_string(),
            link_id: data.link_id.clone(),
            direction: data.direction(),
            flow_control: data.flow_control(),
            effective_flow_control: data.flow_control().fixed_effective().unwrap_or(element_mode),
            other_effective_flow_control: data.other_effective_flow_control,
            demand_unit: data.demand_unit,
            atomic_demand: data.atomic_demand.current(),
            sender_status: resolved(data.atomic_demand.sender_status()),
            receiver_status: resolved(data.atomic_demand.receiver_status()),
            toilet_capacity: data.atomic_demand.toilet_capacity(),
            paused: data.atomic_demand.is_paused(),
            demand: data.demand,
            manual_demand_size: data.manual_demand_size,
            input_queue: data.input_queue.as_ref().map(|queue| InputQueueSnapshot {
                size: queue.size(),
                demand: queue.demand(),
                target_size: queue.target_size(),
            }),
            auto_flow_queue: data.auto_flow_queue.len(),
            held_items: data.held_items.len(),
            stream_format: data.stream_format.as_ref().map(ToString::to_string),
            start_of_stream: data.start_of_stream,
            end_of_stream: data.end_of_stream,
        }
    }
}
