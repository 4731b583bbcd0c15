// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pad linking, demand accounting and backpressure for element pipelines.
//!
//! Elements run on their own threads and exchange buffers over links between
//! pads. Each link shares an [`AtomicDemand`] counter through which receivers
//! grant demand to senders. Auto pads resolve push or pull from their
//! neighbours; push senders feeding pull receivers are throttled by a
//! bounded "toilet".

#![allow(clippy::too_many_arguments)] // Link handshake helpers carry both ends of a link
#![allow(clippy::type_complexity)] // Reply channels nest results

pub mod core;

pub use crate::core::{
    Action, AtomicDemand, Buffer, CallError, DemandUnit, EffectiveFlowControl, Element,
    ElementHandle, ElementId, ElementSnapshot, ElementState, FlowConfig, FlowControl,
    InMemoryMetrics, InputQueue, LinkEndStatus, LinkError, LinkProps, MetricsSink, NoopMetrics,
    PadDirection, PadRef, PadSnapshot, PadSpec, Pipeline, PlaybackState, QueueItem, Result,
    StreamError, StreamFormat, init_logging,
};
