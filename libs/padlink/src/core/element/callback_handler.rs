// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Runs element callbacks and applies the actions they return.

use super::actions::Action;
use super::data_handler;
use super::element::Element;
use super::state::ElementState;
use crate::core::buffers::{Buffer, DemandUnit, StreamFormat};
use crate::core::flow::auto_flow_controller;
use crate::core::pads::{PadData, PadDirection, PadRef};
use crate::core::{Result, StreamError};

/// A callback invocation with its arguments.
#[derive(Debug)]
pub enum Callback {
    Playing,
    PadAdded(PadRef),
    PadRemoved(PadRef),
    StreamFormat { pad: PadRef, format: StreamFormat },
    Buffer { pad: PadRef, buffer: Buffer },
    Demand { pad: PadRef, size: u64, unit: DemandUnit },
    EndOfStream(PadRef),
    Notification(serde_json::Value),
}

impl Callback {
    pub fn name(&self) -> &'static str {
        match self {
            Callback::Playing => "handle_playing",
            Callback::PadAdded(_) => "handle_pad_added",
            Callback::PadRemoved(_) => "handle_pad_removed",
            Callback::StreamFormat { .. } => "handle_stream_format",
            Callback::Buffer { .. } => "handle_buffer",
            Callback::Demand { .. } => "handle_demand",
            Callback::EndOfStream(_) => "handle_end_of_stream",
            Callback::Notification(_) => "handle_notification",
        }
    }
}

/// Run `callback`, apply its actions in order, then supply delayed demands.
///
/// A failing callback is reported as a fatal [`StreamError::Callback`].
pub fn exec_and_handle_callback(
    state: &mut ElementState,
    element: &mut dyn Element,
    callback: Callback,
) -> Result<()> {
    let name = callback.name();
    tracing::trace!("[{}] Running {}", state.id, name);

    let actions = run_callback(state, element, callback).map_err(|e| StreamError::Callback {
        callback: name.to_string(),
        reason: e.to_string(),
    })?;

    for action in actions {
        handle_action(state, element, action)?;
    }

    if !state.supplying_demand {
        supply_delayed_demands(state, element)?;
    }
    Ok(())
}

fn run_callback(
    state: &ElementState,
    element: &mut dyn Element,
    callback: Callback,
) -> Result<Vec<Action>> {
    match callback {
        Callback::Playing => element.handle_playing(state),
        Callback::PadAdded(pad) => element.handle_pad_added(&pad, state),
        Callback::PadRemoved(pad) => element.handle_pad_removed(&pad, state),
        Callback::StreamFormat { pad, format } => element.handle_stream_format(&pad, &format, state),
        Callback::Buffer { pad, buffer } => element.handle_buffer(&pad, buffer, state),
        Callback::Demand { pad, size, unit } => element.handle_demand(&pad, size, unit, state),
        Callback::EndOfStream(pad) => element.handle_end_of_stream(&pad, state),
        Callback::Notification(notification) => element.handle_notification(notification, state),
    }
}

pub fn handle_action(
    state: &mut ElementState,
    element: &mut dyn Element,
    action: Action,
) -> Result<()> {
    tracing::trace!("[{}] Handling action {}", state.id, action.name());

    match action {
        Action::Buffer { pad, buffers } => data_handler::send_buffers(state, &pad, buffers),
        Action::StreamFormat { pad, format } => data_handler::send_stream_format(state, &pad, format),
        Action::EndOfStream(pad) => data_handler::send_end_of_stream(state, &pad),
        Action::Demand { pad, size } => {
            let data = state.existing_pad_data_mut(&pad)?;
            if data.direction() != PadDirection::Input || !data.is_manual() {
                return Err(StreamError::InvalidAction(format!(
                    "demand on {} pad {}, only manual inputs can demand",
                    data.flow_control(),
                    pad
                )));
            }
            data.manual_demand_size += size;
            state.delay_demand(&pad);
            Ok(())
        }
        Action::Redemand(pad) => {
            let data = state.existing_pad_data(&pad)?;
            if data.direction() != PadDirection::Output || !data.is_manual() {
                return Err(StreamError::InvalidAction(format!(
                    "redemand on {} pad {}, only manual outputs can redemand",
                    data.flow_control(),
                    pad
                )));
            }
            state.delay_demand(&pad);
            Ok(())
        }
        Action::PauseAutoDemand(pad) => {
            let data = auto_input(state, &pad)?;
            data.auto_demand_paused = true;
            tracing::debug!("[{}] Auto demand paused on {}", state.id, pad);
            Ok(())
        }
        Action::ResumeAutoDemand(pad) => {
            let data = auto_input(state, &pad)?;
            data.auto_demand_paused = false;
            tracing::debug!("[{}] Auto demand resumed on {}", state.id, pad);
            auto_flow_controller::auto_adjust_atomic_demand(state, &pad)?;
            auto_flow_controller::pop_queues_and_bump_demand(state, element)
        }
    }
}

fn auto_input<'a>(state: &'a mut ElementState, pad: &PadRef) -> Result<&'a mut PadData> {
    let data = state.existing_pad_data_mut(pad)?;
    if data.direction() != PadDirection::Input || !data.is_auto() {
        return Err(StreamError::InvalidAction(format!(
            "auto demand can only be paused or resumed on auto inputs, {} is {}",
            pad,
            data.flow_control()
        )));
    }
    Ok(data)
}

/// Serve manual pads whose demand changed while callbacks ran.
///
/// Inputs get queued data up to what the element asked for. Outputs get
/// `handle_demand` while their link has demand.
pub fn supply_delayed_demands(state: &mut ElementState, element: &mut dyn Element) -> Result<()> {
    if state.supplying_demand {
        return Ok(());
    }
    state.supplying_demand = true;
    let result = supply_loop(state, element);
    state.supplying_demand = false;
    result
}

fn supply_loop(state: &mut ElementState, element: &mut dyn Element) -> Result<()> {
    while !state.delayed_demands.is_empty() {
        let pad = state.delayed_demands.remove(0);
        let direction = match state.pad_data(&pad) {
            Some(data) => data.direction(),
            None => continue,
        };
        match direction {
            PadDirection::Input => data_handler::supply_manual_input(state, element, &pad)?,
            PadDirection::Output => data_handler::supply_manual_output(state, element, &pad)?,
        }
    }
    Ok(())
}
