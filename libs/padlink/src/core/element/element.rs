// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The trait implemented by every element kind.

use super::actions::Action;
use super::state::ElementState;
use crate::core::Result;
use crate::core::buffers::{Buffer, DemandUnit, StreamFormat};
use crate::core::pads::{PadRef, PadSpec};

/// User logic of an element.
///
/// Every callback runs on the element's own thread and returns the actions
/// to apply. An error returned from a callback terminates the element.
pub trait Element: Send + 'static {
    /// Pads this element declares.
    fn pads(&self) -> Vec<PadSpec>;

    fn handle_playing(&mut self, _ctx: &ElementState) -> Result<Vec<Action>> {
        Ok(Vec::new())
    }

    /// A dynamic pad was linked.
    fn handle_pad_added(&mut self, _pad: &PadRef, _ctx: &ElementState) -> Result<Vec<Action>> {
        Ok(Vec::new())
    }

    /// A dynamic pad was unlinked. Its pad data is still available in `ctx`.
    fn handle_pad_removed(&mut self, _pad: &PadRef, _ctx: &ElementState) -> Result<Vec<Action>> {
        Ok(Vec::new())
    }

    fn handle_stream_format(
        &mut self,
        _pad: &PadRef,
        _format: &StreamFormat,
        _ctx: &ElementState,
    ) -> Result<Vec<Action>> {
        Ok(Vec::new())
    }

    fn handle_buffer(
        &mut self,
        _pad: &PadRef,
        _buffer: Buffer,
        _ctx: &ElementState,
    ) -> Result<Vec<Action>> {
        Ok(Vec::new())
    }

    /// A manual output pad has `size` units of demand.
    fn handle_demand(
        &mut self,
        _pad: &PadRef,
        _size: u64,
        _unit: DemandUnit,
        _ctx: &ElementState,
    ) -> Result<Vec<Action>> {
        Ok(Vec::new())
    }

    fn handle_end_of_stream(&mut self, _pad: &PadRef, _ctx: &ElementState) -> Result<Vec<Action>> {
        Ok(Vec::new())
    }

    /// Application-defined message sent through the pipeline.
    fn handle_notification(
        &mut self,
        _notification: serde_json::Value,
        _ctx: &ElementState,
    ) -> Result<Vec<Action>> {
        Ok(Vec::new())
    }

    fn handle_terminate(&mut self, _ctx: &ElementState) -> Result<()> {
        Ok(())
    }
}
