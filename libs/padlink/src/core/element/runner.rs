// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;

use super::callback_handler::{Callback, exec_and_handle_callback, supply_delayed_demands};
use super::data_handler;
use super::element::Element;
use super::handle::{ElementHandle, ElementId};
use super::messages::{ElementMessage, PropagationPass};
use super::state::{ElementState, PlaybackState};
use crate::core::config::FlowConfig;
use crate::core::error::LinkError;
use crate::core::flow::effective_flow_controller::{
    handle_receiver_effective_flow_control, handle_sender_effective_flow_control,
};
use crate::core::observability::{ElementSnapshot, MetricsSink};
use crate::core::pad_controller;
use crate::core::pads::{EffectiveFlowControl, PadDirection, PadRef};
use crate::core::{Result, StreamError};

/// Whether the loop keeps running after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Start `element` on its own thread and return the handle to its mailbox.
pub fn spawn_element(
    id: ElementId,
    element: Box<dyn Element>,
    config: FlowConfig,
    metrics: Arc<dyn MetricsSink>,
) -> Result<(ElementHandle, JoinHandle<()>)> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = ElementHandle::new(id.clone(), tx);
    let state = ElementState::new(handle.clone(), element.pads(), config, metrics);

    let thread = std::thread::Builder::new()
        .name(format!("padlink-{}", id))
        .spawn(move || run_element_loop(state, element, rx))?;

    Ok((handle, thread))
}

fn run_element_loop(
    mut state: ElementState,
    mut element: Box<dyn Element>,
    mailbox: Receiver<ElementMessage>,
) {
    tracing::info!("[{}] Thread started", state.id);

    while let Ok(message) = mailbox.recv() {
        let kind = message.kind();
        tracing::trace!("[{}] Handling {}", state.id, kind);
        match handle_message(&mut state, element.as_mut(), message) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Stop) => break,
            Err(e) if e.is_fatal() => {
                tracing::error!("[{}] Fatal error while handling {}: {}", state.id, kind, e);
                break;
            }
            Err(e) => {
                tracing::warn!("[{}] Error while handling {}: {}", state.id, kind, e);
            }
        }
    }

    for pad in state.linked_pads() {
        state.metrics.unregister_pad(&state.id, &pad);
    }
    tracing::debug!("[{}] Thread stopped", state.id);
}

fn handle_message(
    state: &mut ElementState,
    element: &mut dyn Element,
    message: ElementMessage,
) -> Result<Flow> {
    match message {
        ElementMessage::Link {
            direction,
            pad,
            props,
            peer,
            reply,
        } => {
            let result = pad_controller::handle_link(state, element, direction, pad, props, peer);
            let flow = match &result {
                Ok(()) => Flow::Continue,
                Err(e) => log_link_error(state, e),
            };
            let _ = reply.send(result);
            Ok(flow)
        }
        ElementMessage::LinkRequest { request, reply } => {
            let pad = request.pad.clone();
            match pad_controller::handle_link_request(state, element, request) {
                Ok(response) => {
                    if reply.send(Ok(response)).is_err() {
                        pad_controller::rollback_link(state, element, &pad)?;
                    }
                    Ok(Flow::Continue)
                }
                Err(e) => {
                    let flow = log_link_error(state, &e);
                    let _ = reply.send(Err(e));
                    Ok(flow)
                }
            }
        }
        ElementMessage::Unlink { pad, reply } => {
            let result = pad_controller::handle_unlink(state, element, &pad);
            let flow = match &result {
                Err(e) if e.is_fatal() => {
                    tracing::error!("[{}] Unlink of {} failed: {}", state.id, pad, e);
                    Flow::Stop
                }
                _ => Flow::Continue,
            };
            let _ = reply.send(result);
            Ok(flow)
        }
        ElementMessage::Play => {
            handle_play(state, element)?;
            Ok(Flow::Continue)
        }
        ElementMessage::Terminate => {
            handle_terminate(state, element)?;
            Ok(Flow::Stop)
        }
        ElementMessage::Buffers { pad, buffers } => {
            data_handler::handle_buffers(state, element, &pad, buffers)?;
            Ok(Flow::Continue)
        }
        ElementMessage::StreamFormat { pad, format } => {
            data_handler::handle_stream_format(state, element, &pad, format)?;
            Ok(Flow::Continue)
        }
        ElementMessage::EndOfStream { pad } => {
            data_handler::handle_end_of_stream(state, element, &pad)?;
            Ok(Flow::Continue)
        }
        ElementMessage::AtomicDemandIncreased { pad } => {
            data_handler::handle_atomic_demand_increased(state, element, &pad)?;
            Ok(Flow::Continue)
        }
        ElementMessage::OtherEffectiveFlowControl { pad, mode, pass } => {
            handle_flow_control_update(state, element, &pad, mode, pass)?;
            Ok(Flow::Continue)
        }
        ElementMessage::Notify { notification } => {
            exec_and_handle_callback(state, element, Callback::Notification(notification))?;
            Ok(Flow::Continue)
        }
        ElementMessage::Inspect { reply } => {
            let _ = reply.send(ElementSnapshot::capture(state));
            Ok(Flow::Continue)
        }
    }
}

fn log_link_error(state: &ElementState, error: &LinkError) -> Flow {
    if error.is_recoverable() {
        tracing::warn!("[{}] Link failed: {}", state.id, error);
        Flow::Continue
    } else {
        tracing::error!("[{}] Link failed: {}", state.id, error);
        Flow::Stop
    }
}

fn handle_flow_control_update(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
    mode: EffectiveFlowControl,
    pass: PropagationPass,
) -> Result<()> {
    let Some(direction) = state.pad_data(pad).map(|data| data.direction()) else {
        tracing::debug!("[{}] Flow control update for unlinked {} ignored", state.id, pad);
        return Ok(());
    };
    match direction {
        PadDirection::Input => {
            handle_sender_effective_flow_control(state, element, pad, mode, pass)
        }
        PadDirection::Output => {
            handle_receiver_effective_flow_control(state, element, pad, mode, pass)
        }
    }
}

fn handle_play(state: &mut ElementState, element: &mut dyn Element) -> Result<()> {
    if state.playback == PlaybackState::Playing {
        tracing::debug!("[{}] Already playing", state.id);
        return Ok(());
    }
    state.playback = PlaybackState::Playing;
    tracing::info!("[{}] Playing", state.id);
    exec_and_handle_callback(state, element, Callback::Playing)?;

    for pad in state.linked_pads_by_direction(PadDirection::Output) {
        let manual = state.pad_data(&pad).is_some_and(|data| data.is_manual());
        if manual {
            state.delay_demand(&pad);
        }
    }
    supply_delayed_demands(state, element)
}

fn handle_terminate(state: &mut ElementState, element: &mut dyn Element) -> Result<()> {
    tracing::info!("[{}] Terminating", state.id);
    state.terminating = true;
    pad_controller::unlink_all(state, element)?;
    element.handle_terminate(state).map_err(|e| StreamError::Callback {
        callback: "handle_terminate".to_string(),
        reason: e.to_string(),
    })
}
