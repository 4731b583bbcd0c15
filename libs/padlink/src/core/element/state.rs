// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! State owned by one element's loop.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::handle::{ElementHandle, ElementId};
use crate::core::config::FlowConfig;
use crate::core::observability::MetricsSink;
use crate::core::pads::{EffectiveFlowControl, PadData, PadDirection, PadRef, PadSpec};
use crate::core::{Result, StreamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

/// Everything an element's loop knows about its pads and their demand.
///
/// Passed read-only to [`Element`](super::Element) callbacks as their context.
pub struct ElementState {
    pub(crate) id: ElementId,
    pub(crate) handle: ElementHandle,
    pub(crate) config: FlowConfig,
    pub(crate) metrics: Arc<dyn MetricsSink>,

    pub(crate) pads_info: HashMap<String, PadSpec>,
    pub(crate) pads_data: HashMap<PadRef, PadData>,

    pub(crate) effective_flow_control: EffectiveFlowControl,
    pub(crate) satisfied_auto_output_pads: HashSet<PadRef>,
    pub(crate) awaiting_auto_input_pads: HashSet<PadRef>,
    /// Round-robin order of auto inputs; rotated on every redistribution.
    pub(crate) auto_input_pads: Vec<PadRef>,

    pub(crate) playback: PlaybackState,
    pub(crate) terminating: bool,

    /// Manual pads whose demand must be supplied once the current callback returns.
    pub(crate) delayed_demands: Vec<PadRef>,
    pub(crate) supplying_demand: bool,
    pub(crate) popping_queues: bool,
}

impl ElementState {
    pub fn new(
        handle: ElementHandle,
        pads: Vec<PadSpec>,
        config: FlowConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            id: handle.id().clone(),
            handle,
            config,
            metrics,
            pads_info: pads
                .into_iter()
                .map(|spec| (spec.name.clone(), spec))
                .collect(),
            pads_data: HashMap::new(),
            effective_flow_control: EffectiveFlowControl::default(),
            satisfied_auto_output_pads: HashSet::new(),
            awaiting_auto_input_pads: HashSet::new(),
            auto_input_pads: Vec::new(),
            playback: PlaybackState::Stopped,
            terminating: false,
            delayed_demands: Vec::new(),
            supplying_demand: false,
            popping_queues: false,
        }
    }

    #[inline]
    pub fn id(&self) -> &ElementId {
        &self.id
    }

    #[inline]
    pub fn handle(&self) -> &ElementHandle {
        &self.handle
    }

    #[inline]
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    #[inline]
    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    #[inline]
    pub fn is_terminating(&self) -> bool {
        self.terminating
    }

    /// Operating mode derived from the element's auto pads.
    #[inline]
    pub fn effective_flow_control(&self) -> EffectiveFlowControl {
        self.effective_flow_control
    }

    pub fn pad_spec(&self, pad: &PadRef) -> Option<&PadSpec> {
        self.pads_info.get(pad.name())
    }

    pub fn pad_data(&self, pad: &PadRef) -> Option<&PadData> {
        self.pads_data.get(pad)
    }

    pub fn is_linked(&self, pad: &PadRef) -> bool {
        self.pads_data.contains_key(pad)
    }

    /// Linked pads in a stable order.
    pub fn linked_pads(&self) -> Vec<PadRef> {
        let mut pads: Vec<PadRef> = self.pads_data.keys().cloned().collect();
        pads.sort();
        pads
    }

    /// Linked pads of one direction in a stable order.
    pub fn linked_pads_by_direction(&self, direction: PadDirection) -> Vec<PadRef> {
        let mut pads: Vec<PadRef> = self
            .pads_data
            .iter()
            .filter(|(_, data)| data.direction() == direction)
            .map(|(pad, _)| pad.clone())
            .collect();
        pads.sort();
        pads
    }

    pub(crate) fn existing_pad_data(&self, pad: &PadRef) -> Result<&PadData> {
        self.pads_data
            .get(pad)
            .ok_or_else(|| StreamError::UnknownPad(format!("{} on {}", pad, self.id)))
    }

    pub(crate) fn existing_pad_data_mut(&mut self, pad: &PadRef) -> Result<&mut PadData> {
        let id = &self.id;
        self.pads_data
            .get_mut(pad)
            .ok_or_else(|| StreamError::UnknownPad(format!("{} on {}", pad, id)))
    }

    pub(crate) fn delay_demand(&mut self, pad: &PadRef) {
        if !self.delayed_demands.contains(pad) {
            self.delayed_demands.push(pad.clone());
        }
    }

    /// Auto pads with their neighbour's current view, excluding `excluding`.
    pub(crate) fn auto_pad_views<'a>(
        &'a self,
        excluding: Option<&'a PadRef>,
    ) -> impl Iterator<Item = Option<EffectiveFlowControl>> + 'a {
        self.pads_data
            .values()
            .filter(move |data| data.is_auto() && Some(&data.pad_ref) != excluding)
            .map(|data| data.other_effective_flow_control)
    }

    /// Whether auto inputs must hold data back until a satisfied output drains.
    pub(crate) fn auto_flow_blocked(&self) -> bool {
        self.effective_flow_control == EffectiveFlowControl::Pull
            && !self.satisfied_auto_output_pads.is_empty()
    }
}

impl std::fmt::Debug for ElementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementState")
            .field("id", &self.id)
            .field("effective_flow_control", &self.effective_flow_control)
            .field("pads_data", &self.pads_data)
            .field("playback", &self.playback)
            .field("terminating", &self.terminating)
            .finish_non_exhaustive()
    }
}
