// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Messages processed by an element's loop.

use crossbeam_channel::Sender;

use super::handle::{ElementHandle, ElementId};
use crate::core::buffers::{Buffer, DemandUnit, StreamFormat};
use crate::core::demand::AtomicDemand;
use crate::core::error::{LinkError, Result};
use crate::core::observability::ElementSnapshot;
use crate::core::pads::{EffectiveFlowControl, LinkProps, PadDirection, PadRef, PadSummary};

type Reply<T> = Sender<T>;

/// The remote end of a link as seen by the element asked to link.
#[derive(Debug, Clone)]
pub struct PadEndpoint {
    pub element: ElementHandle,
    pub pad: PadRef,
    pub props: LinkProps,
}

impl PadEndpoint {
    pub fn new(element: ElementHandle, pad: impl Into<PadRef>, props: LinkProps) -> Self {
        Self {
            element,
            pad: pad.into(),
            props,
        }
    }
}

/// What the output side tells the input side during the handshake.
#[derive(Debug, Clone)]
pub struct LinkRequest {
    /// Input pad on the receiving element.
    pub pad: PadRef,
    pub input_props: LinkProps,
    pub output_element: ElementHandle,
    pub output_pad: PadRef,
    pub output_info: PadSummary,
    pub output_props: LinkProps,
    /// Mode the output side presents over this link.
    pub output_effective_flow_control: EffectiveFlowControl,
}

/// What the input side answers to a successful handshake.
#[derive(Debug, Clone)]
pub struct LinkResponse {
    pub atomic_demand: AtomicDemand,
    pub input_info: PadSummary,
    pub input_effective_flow_control: EffectiveFlowControl,
    pub demand_unit: DemandUnit,
}

/// One cascade of effective flow control updates.
///
/// Elements already visited by the pass ignore further updates from it, so
/// the cascade terminates even on cyclic topologies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationPass {
    pub id: u64,
    pub visited: Vec<ElementId>,
}

impl PropagationPass {
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            visited: Vec::new(),
        }
    }

    pub fn has_visited(&self, element: &ElementId) -> bool {
        self.visited.contains(element)
    }

    pub fn visit(&mut self, element: &ElementId) {
        if !self.has_visited(element) {
            self.visited.push(element.clone());
        }
    }
}

impl Default for PropagationPass {
    fn default() -> Self {
        Self::new()
    }
}

pub enum ElementMessage {
    /// Link one of this element's pads (sent by the assembly layer).
    Link {
        direction: PadDirection,
        pad: PadRef,
        props: LinkProps,
        peer: PadEndpoint,
        reply: Reply<std::result::Result<(), LinkError>>,
    },
    /// Input side of the link handshake.
    LinkRequest {
        request: LinkRequest,
        reply: Reply<std::result::Result<LinkResponse, LinkError>>,
    },
    Unlink {
        pad: PadRef,
        reply: Reply<Result<()>>,
    },
    Play,
    Terminate,

    Buffers {
        pad: PadRef,
        buffers: Vec<Buffer>,
    },
    StreamFormat {
        pad: PadRef,
        format: StreamFormat,
    },
    EndOfStream {
        pad: PadRef,
    },

    /// The shared demand of a link this element sends on went positive, or
    /// its toilet drained back under capacity.
    AtomicDemandIncreased {
        pad: PadRef,
    },
    /// The neighbour behind `pad` now presents `mode` over the link.
    OtherEffectiveFlowControl {
        pad: PadRef,
        mode: EffectiveFlowControl,
        pass: PropagationPass,
    },

    /// Application-defined message for the element's callbacks.
    Notify {
        notification: serde_json::Value,
    },

    Inspect {
        reply: Reply<ElementSnapshot>,
    },
}

impl ElementMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ElementMessage::Link { .. } => "link",
            ElementMessage::LinkRequest { .. } => "link_request",
            ElementMessage::Unlink { .. } => "unlink",
            ElementMessage::Play => "play",
            ElementMessage::Terminate => "terminate",
            ElementMessage::Buffers { .. } => "buffers",
            ElementMessage::StreamFormat { .. } => "stream_format",
            ElementMessage::EndOfStream { .. } => "end_of_stream",
            ElementMessage::AtomicDemandIncreased { .. } => "atomic_demand_increased",
            ElementMessage::OtherEffectiveFlowControl { .. } => "other_effective_flow_control",
            ElementMessage::Notify { .. } => "notify",
            ElementMessage::Inspect { .. } => "inspect",
        }
    }
}

impl std::fmt::Debug for ElementMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ElementMessage::{}", self.kind())
    }
}
