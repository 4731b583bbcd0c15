// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Fixtures for unit tests that drive an [`ElementState`] without threads.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::core::buffers::{Buffer, DemandUnit, StreamFormat};
use crate::core::config::FlowConfig;
use crate::core::demand::{AtomicDemand, AtomicDemandParams, InputQueue};
use crate::core::element::{
    Action, Element, ElementHandle, ElementId, ElementMessage, ElementState, PropagationPass,
};
use crate::core::flow::effective_flow_controller::presented_effective_flow_control;
use crate::core::observability::InMemoryMetrics;
use crate::core::pads::{
    EffectiveFlowControl, FlowControl, PadData, PadDirection, PadRef, PadSpec, PadSummary,
};
use crate::core::Result;

pub(crate) struct StateFixture {
    pub state: ElementState,
    pub metrics: Arc<InMemoryMetrics>,
    pub peer: ElementHandle,
    peer_rx: Receiver<ElementMessage>,
    _mailbox: Receiver<ElementMessage>,
    pads: Vec<PadSpec>,
    events: Arc<Mutex<Vec<String>>>,
}

impl StateFixture {
    pub fn new(pads: Vec<PadSpec>) -> Self {
        let (tx, mailbox) = crossbeam_channel::unbounded();
        let (peer_tx, peer_rx) = crossbeam_channel::unbounded();
        let metrics = Arc::new(InMemoryMetrics::new());
        let handle = ElementHandle::new(ElementId::from_string("element").unwrap(), tx);
        let state = ElementState::new(handle, pads.clone(), FlowConfig::default(), metrics.clone());
        Self {
            state,
            metrics,
            peer: ElementHandle::new(ElementId::from_string("peer").unwrap(), peer_tx),
            peer_rx,
            _mailbox: mailbox,
            pads,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Element that records every callback it receives.
    pub fn element(&self) -> RecordingElement {
        RecordingElement {
            pads: self.pads.clone(),
            events: Arc::clone(&self.events),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// Drain flow control updates sent to the peer.
    pub fn peer_flow_control_updates(&self) -> Vec<(PadRef, EffectiveFlowControl, PropagationPass)> {
        self.peer_rx
            .try_iter()
            .filter_map(|message| match message {
                ElementMessage::OtherEffectiveFlowControl { pad, mode, pass } => {
                    Some((pad, mode, pass))
                }
                _ => None,
            })
            .collect()
    }

    /// Drain everything sent to the peer, by message kind.
    pub fn peer_message_kinds(&self) -> Vec<&'static str> {
        self.peer_rx.try_iter().map(|message| message.kind()).collect()
    }

    /// Materialize pad data for `pad` as if a handshake with a peer pad of
    /// `peer_flow_control` had succeeded.
    pub fn link(
        &mut self,
        pad: impl TryInto<PadRef, Error: std::fmt::Debug>,
        peer_flow_control: FlowControl,
        view: Option<EffectiveFlowControl>,
    ) -> PadRef {
        let pad: PadRef = pad.try_into().unwrap();
        let spec = self.state.pad_spec(&pad).unwrap().clone();
        let unit = spec.demand_unit.unwrap_or_default();
        let (peer_pad, other_info) = match spec.direction {
            PadDirection::Input => (
                PadRef::new("peer_output"),
                PadSpec::output("peer_output").flow_control(peer_flow_control).summary(),
            ),
            PadDirection::Output => (
                PadRef::new("peer_input"),
                PadSpec::input("peer_input").flow_control(peer_flow_control).summary(),
            ),
        };
        let (receiver, sender, sender_pad) = match spec.direction {
            PadDirection::Input => (self.state.handle().clone(), self.peer.clone(), peer_pad.clone()),
            PadDirection::Output => (self.peer.clone(), self.state.handle().clone(), pad.clone()),
        };
        let atomic_demand = AtomicDemand::new(
            AtomicDemandParams {
                receiver_effective_flow_control: view.unwrap_or_default(),
                receiver,
                receiver_demand_unit: unit,
                sender,
                sender_pad_ref: sender_pad,
                toilet_capacity: None,
                throttling_factor: None,
            },
            self.state.config(),
        );

        let mut data = PadData::new(
            pad.clone(),
            spec.clone(),
            self.peer.clone(),
            peer_pad,
            other_info,
            unit,
            atomic_demand.clone(),
        );
        if spec.flow_control.is_manual() && spec.direction == PadDirection::Input {
            data.input_queue = Some(InputQueue::new(unit, unit, atomic_demand, 10));
        }
        if spec.flow_control.is_auto() {
            data.other_effective_flow_control = view;
            data.auto_demand_size = 400;
            data.sent_effective_flow_control =
                Some(presented_effective_flow_control(&self.state, &pad));
            if spec.direction == PadDirection::Input {
                self.state.auto_input_pads.push(pad.clone());
            }
        }
        self.state.pads_data.insert(pad.clone(), data);
        crate::core::observability::register_pad_metrics(
            self.metrics.as_ref(),
            &self.state.id,
            &self.state.pads_data[&pad],
        );
        pad
    }
}

/// Link an auto pad to an auto peer presenting `view`.
pub(crate) fn auto_link(
    fixture: &mut StateFixture,
    pad: impl TryInto<PadRef, Error: std::fmt::Debug>,
    view: Option<EffectiveFlowControl>,
) -> PadRef {
    fixture.link(pad, FlowControl::Auto, view)
}

pub(crate) struct RecordingElement {
    pads: Vec<PadSpec>,
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingElement {
    fn record(&self, event: String) -> Result<Vec<Action>> {
        self.events.lock().push(event);
        Ok(Vec::new())
    }
}

impl Element for RecordingElement {
    fn pads(&self) -> Vec<PadSpec> {
        self.pads.clone()
    }

    fn handle_pad_added(&mut self, pad: &PadRef, _ctx: &ElementState) -> Result<Vec<Action>> {
        self.record(format!("pad_added {}", pad))
    }

    fn handle_pad_removed(&mut self, pad: &PadRef, _ctx: &ElementState) -> Result<Vec<Action>> {
        self.record(format!("pad_removed {}", pad))
    }

    fn handle_stream_format(
        &mut self,
        pad: &PadRef,
        format: &StreamFormat,
        _ctx: &ElementState,
    ) -> Result<Vec<Action>> {
        self.record(format!("stream_format {} {}", pad, format))
    }

    fn handle_buffer(
        &mut self,
        pad: &PadRef,
        _buffer: Buffer,
        _ctx: &ElementState,
    ) -> Result<Vec<Action>> {
        self.record(format!("buffer {}", pad))
    }

    fn handle_demand(
        &mut self,
        pad: &PadRef,
        size: u64,
        _unit: DemandUnit,
        _ctx: &ElementState,
    ) -> Result<Vec<Action>> {
        self.record(format!("demand {} {}", pad, size))
    }

    fn handle_end_of_stream(&mut self, pad: &PadRef, _ctx: &ElementState) -> Result<Vec<Action>> {
        self.record(format!("end_of_stream {}", pad))
    }
}
