// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Buffers, stream formats and end of stream: sending on outputs, receiving
//! on inputs, and supplying demand of manual pads.

use super::callback_handler::{Callback, exec_and_handle_callback, supply_delayed_demands};
use super::element::Element;
use super::messages::ElementMessage;
use super::state::{ElementState, PlaybackState};
use crate::core::buffers::{Buffer, QueueItem, StreamFormat};
use crate::core::flow::auto_flow_controller;
use crate::core::pads::{EffectiveFlowControl, FlowControl, PadData, PadDirection, PadRef};
use crate::core::{Result, StreamError};

fn output_pad<'a>(state: &'a mut ElementState, pad: &PadRef) -> Result<&'a mut PadData> {
    let data = state.existing_pad_data_mut(pad)?;
    if data.direction() != PadDirection::Output {
        return Err(StreamError::InvalidAction(format!(
            "cannot send on input pad {}",
            pad
        )));
    }
    if data.end_of_stream {
        return Err(StreamError::EndOfStreamViolation(pad.to_string()));
    }
    Ok(data)
}

pub fn send_buffers(state: &mut ElementState, pad: &PadRef, buffers: Vec<Buffer>) -> Result<()> {
    let overflow_timeout = state.config.toilet_overflow_timeout();
    let data = output_pad(state, pad)?;
    if data.stream_format.is_none() {
        return Err(StreamError::BufferBeforeStreamFormat(pad.to_string()));
    }
    if buffers.is_empty() {
        return Ok(());
    }
    if data.is_manual() {
        let demand = data.atomic_demand.sender_view();
        let size = data.demand_unit.buffers_size(&buffers);
        if size as i64 > demand {
            return Err(StreamError::DemandExceeded {
                pad: pad.to_string(),
                size,
                demand,
            });
        }
    }

    if data.atomic_demand.is_paused() || !data.held_items.is_empty() {
        data.atomic_demand.check_sustained_overflow(overflow_timeout)?;
        data.held_items
            .extend(buffers.into_iter().map(QueueItem::Buffer));
        let held = data.held_items.len();
        tracing::trace!(
            "[{}] {} paused by toilet, holding {} items",
            state.id,
            pad,
            held
        );
        return Ok(());
    }

    transmit_buffers(data, buffers);
    update_satisfied(state, pad);
    Ok(())
}

fn transmit_buffers(data: &mut PadData, buffers: Vec<Buffer>) {
    let size = data.demand_unit.buffers_size(&buffers);
    data.count_sent(buffers.len());
    data.atomic_demand.decrease(size);
    let delivered = data.other_element.send(ElementMessage::Buffers {
        pad: data.other_ref.clone(),
        buffers,
    });
    if !delivered {
        tracing::debug!(
            "{} is gone, buffers on {} dropped",
            data.other_element.id(),
            data.link_id
        );
    }
}

fn transmit_event(data: &mut PadData, item: QueueItem) {
    let message = match item {
        QueueItem::Buffer(buffer) => return transmit_buffers(data, vec![buffer]),
        QueueItem::StreamFormat(format) => ElementMessage::StreamFormat {
            pad: data.other_ref.clone(),
            format,
        },
        QueueItem::EndOfStream => {
            data.atomic_demand.flush();
            ElementMessage::EndOfStream {
                pad: data.other_ref.clone(),
            }
        }
    };
    if !data.other_element.send(message) {
        tracing::debug!(
            "{} is gone, event on {} dropped",
            data.other_element.id(),
            data.link_id
        );
    }
}

fn update_satisfied(state: &mut ElementState, pad: &PadRef) {
    let satisfied = match state.pads_data.get(pad) {
        Some(data) => {
            data.is_auto()
                && state.effective_flow_control == EffectiveFlowControl::Pull
                && data.atomic_demand.sender_view() <= 0
        }
        None => false,
    };
    if satisfied {
        state.satisfied_auto_output_pads.insert(pad.clone());
    }
}

pub fn send_stream_format(
    state: &mut ElementState,
    pad: &PadRef,
    format: StreamFormat,
) -> Result<()> {
    let data = output_pad(state, pad)?;
    data.stream_format = Some(format.clone());
    if data.held_items.is_empty() {
        transmit_event(data, QueueItem::StreamFormat(format));
    } else {
        data.held_items.push_back(QueueItem::StreamFormat(format));
    }
    Ok(())
}

pub fn send_end_of_stream(state: &mut ElementState, pad: &PadRef) -> Result<()> {
    let data = output_pad(state, pad)?;
    data.end_of_stream = true;
    if data.held_items.is_empty() {
        transmit_event(data, QueueItem::EndOfStream);
    } else {
        data.held_items.push_back(QueueItem::EndOfStream);
    }
    tracing::debug!("[{}] End of stream sent on {}", state.id, pad);
    Ok(())
}

/// The link behind output `pad` has new demand or its toilet drained.
pub fn handle_atomic_demand_increased(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
) -> Result<()> {
    let Some(data) = state.pads_data.get_mut(pad) else {
        tracing::debug!("[{}] Demand increased on unlinked {}, ignoring", state.id, pad);
        return Ok(());
    };

    while !data.atomic_demand.is_paused() {
        let Some(item) = data.held_items.pop_front() else {
            break;
        };
        transmit_event(data, item);
    }

    match data.flow_control() {
        FlowControl::Manual | FlowControl::Pull => {
            state.delay_demand(pad);
            supply_delayed_demands(state, element)
        }
        FlowControl::Auto => {
            if data.atomic_demand.sender_view() > 0
                && state.satisfied_auto_output_pads.remove(pad)
            {
                auto_flow_controller::pop_queues_and_bump_demand(state, element)?;
            }
            update_satisfied(state, pad);
            Ok(())
        }
        FlowControl::Push => Ok(()),
    }
}

/// Ask the element for data on a manual output while its link has demand.
pub fn supply_manual_output(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
) -> Result<()> {
    if state.playback != PlaybackState::Playing {
        return Ok(());
    }
    let data = state.existing_pad_data(pad)?;
    let size = data.atomic_demand.sender_view();
    if size <= 0 || data.end_of_stream || data.atomic_demand.is_paused() {
        return Ok(());
    }
    let unit = data.demand_unit;
    exec_and_handle_callback(
        state,
        element,
        Callback::Demand {
            pad: pad.clone(),
            size: size as u64,
            unit,
        },
    )
}

/// Hand queued items of a manual input to the element, up to what it asked for.
pub fn supply_manual_input(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
) -> Result<()> {
    let data = state.existing_pad_data_mut(pad)?;
    let wanted = data.manual_demand_size;
    let Some(queue) = data.input_queue.as_mut() else {
        return Err(StreamError::Runtime(format!(
            "manual input {} has no input queue",
            pad
        )));
    };
    if queue.target_size() == 0 && wanted > 0 {
        queue.ensure_demand(wanted);
    }
    let (items, taken) = queue.dequeue(wanted);
    data.manual_demand_size = wanted.saturating_sub(taken);

    for item in items {
        if !state.is_linked(pad) {
            break;
        }
        deliver_item(state, element, pad, item)?;
    }
    Ok(())
}

fn input_pad<'a>(state: &'a mut ElementState, pad: &PadRef) -> Result<Option<&'a mut PadData>> {
    match state.pads_data.get_mut(pad) {
        None => {
            tracing::debug!("[{}] Data on unlinked {} dropped", state.id, pad);
            Ok(None)
        }
        Some(data) if data.direction() != PadDirection::Input => Err(StreamError::InvalidAction(
            format!("data received on output pad {}", pad),
        )),
        Some(data) => Ok(Some(data)),
    }
}

/// Route an arriving item by the pad's flow control.
fn receive(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
    item: QueueItem,
) -> Result<()> {
    let blocked = state.auto_flow_blocked();
    let Some(data) = input_pad(state, pad)? else {
        return Ok(());
    };

    match data.flow_control() {
        FlowControl::Manual | FlowControl::Pull => {
            if let Some(queue) = data.input_queue.as_mut() {
                queue.enqueue(item);
            }
            state.delay_demand(pad);
            supply_delayed_demands(state, element)
        }
        FlowControl::Auto => {
            if blocked || !data.auto_flow_queue.is_empty() {
                data.auto_flow_queue.push_back(item);
                state.awaiting_auto_input_pads.insert(pad.clone());
                if !blocked {
                    auto_flow_controller::pop_queues_and_bump_demand(state, element)?;
                }
                return Ok(());
            }
            deliver_item(state, element, pad, item)?;
            auto_flow_controller::auto_adjust_atomic_demand(state, pad)
        }
        FlowControl::Push => deliver_item(state, element, pad, item),
    }
}

pub fn handle_buffers(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
    buffers: Vec<Buffer>,
) -> Result<()> {
    let Some(data) = input_pad(state, pad)? else {
        return Ok(());
    };
    if data.end_of_stream {
        return Err(StreamError::EndOfStreamViolation(pad.to_string()));
    }
    data.count_received(buffers.len());
    let size = data.demand_unit.buffers_size(&buffers);

    match data.flow_control() {
        FlowControl::Auto => data.demand -= size as i64,
        // Push inputs keep the sender's window open.
        FlowControl::Push => data.atomic_demand.increase(size),
        FlowControl::Manual | FlowControl::Pull => {}
    }

    for buffer in buffers {
        receive(state, element, pad, QueueItem::Buffer(buffer))?;
    }
    Ok(())
}

pub fn handle_stream_format(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
    format: StreamFormat,
) -> Result<()> {
    let Some(data) = input_pad(state, pad)? else {
        return Ok(());
    };
    if !data.spec.accepts_format(&format) {
        return Err(StreamError::StreamFormatRejected {
            pad: pad.to_string(),
            format: format.to_string(),
        });
    }
    receive(state, element, pad, QueueItem::StreamFormat(format))
}

pub fn handle_end_of_stream(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
) -> Result<()> {
    receive(state, element, pad, QueueItem::EndOfStream)
}

/// Hand one item to the element's callbacks.
pub fn deliver_item(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
    item: QueueItem,
) -> Result<()> {
    match item {
        QueueItem::Buffer(buffer) => {
            if let Some(data) = state.pads_data.get_mut(pad) {
                data.start_of_stream = true;
            }
            exec_and_handle_callback(
                state,
                element,
                Callback::Buffer {
                    pad: pad.clone(),
                    buffer,
                },
            )
        }
        QueueItem::StreamFormat(format) => {
            if let Some(data) = state.pads_data.get_mut(pad) {
                data.stream_format = Some(format.clone());
            }
            exec_and_handle_callback(
                state,
                element,
                Callback::StreamFormat {
                    pad: pad.clone(),
                    format,
                },
            )
        }
        QueueItem::EndOfStream => deliver_end_of_stream(state, element, pad),
    }
}

/// Mark the input as ended and run `handle_end_of_stream` once.
pub fn deliver_end_of_stream(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
) -> Result<()> {
    if let Some(data) = state.pads_data.get_mut(pad) {
        if data.end_of_stream {
            tracing::warn!("[{}] Duplicate end of stream on {} ignored", state.id, pad);
            return Ok(());
        }
        data.end_of_stream = true;
    }
    tracing::debug!("[{}] End of stream received on {}", state.id, pad);
    exec_and_handle_callback(state, element, Callback::EndOfStream(pad.clone()))
}
