// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod buffers;
pub mod config;
pub mod demand;
pub mod element;
pub mod error;
pub mod flow;
pub mod logging;
pub mod observability;
pub mod pad_controller;
pub mod pads;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_support;

pub use buffers::{Buffer, DemandUnit, QueueItem, StreamFormat};
pub use config::FlowConfig;
pub use demand::{AtomicDemand, InputQueue, LinkEndStatus};
pub use element::{Action, Element, ElementHandle, ElementId, ElementState, PlaybackState};
pub use error::{CallError, LinkError, Result, StreamError};
pub use logging::init_logging;
pub use observability::{ElementSnapshot, InMemoryMetrics, MetricsSink, NoopMetrics, PadSnapshot};
pub use pads::{EffectiveFlowControl, FlowControl, LinkProps, PadDirection, PadRef, PadSpec};
pub use pipeline::Pipeline;
