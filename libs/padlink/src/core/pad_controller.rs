// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Link and unlink of pads.
//!
//! The output side initiates: it validates its pad and calls the input
//! element with a [`LinkRequest`]. The input side validates the pairing,
//! creates the link's [`AtomicDemand`] from its own link props and answers
//! with a [`LinkResponse`]. Either side materializes its [`PadData`] only
//! once the handshake has succeeded.

use crate::core::demand::{AtomicDemand, AtomicDemandParams, InputQueue};
use crate::core::element::callback_handler::{
    Callback, exec_and_handle_callback, supply_delayed_demands,
};
use crate::core::element::{
    Element, ElementMessage, ElementState, LinkRequest, LinkResponse, PadEndpoint,
    PlaybackState, PropagationPass, data_handler,
};
use crate::core::error::{CallError, LinkError};
use crate::core::flow::auto_flow_controller;
use crate::core::flow::effective_flow_controller::{
    derive_effective_flow_control, resolve_effective_flow_control,
};
use crate::core::observability::register_pad_metrics;
use crate::core::pads::{
    Availability, EffectiveFlowControl, LinkProps, PadData, PadDirection, PadRef, PadSpec,
    PadSummary,
};
use crate::core::{Result, StreamError};

/// Check that `pad` can be linked in `direction` and return its declaration.
fn validate_pad(state: &ElementState, pad: &PadRef, direction: PadDirection) -> Result<PadSpec> {
    let spec = state
        .pad_spec(pad)
        .ok_or_else(|| StreamError::UnknownPad(format!("{} on {}", pad, state.id())))?;

    if spec.direction != direction {
        return Err(StreamError::PadDirectionMismatch {
            pad: pad.to_string(),
            declared: spec.direction.to_string(),
            requested: direction.to_string(),
        });
    }
    match (spec.availability, pad.is_dynamic()) {
        (Availability::Always, true) => {
            return Err(StreamError::UnknownPad(format!(
                "{} on {}: static pads have no instances",
                pad,
                state.id()
            )));
        }
        (Availability::OnRequest, false) => {
            return Err(StreamError::UnknownPad(format!(
                "{} on {}: on-request pads need an instance id",
                pad,
                state.id()
            )));
        }
        _ => {}
    }
    if state.is_linked(pad) {
        return Err(StreamError::PadAlreadyLinked(format!("{} on {}", pad, state.id())));
    }
    Ok(spec.clone())
}

/// Reject pairings whose flow control cannot work together.
fn check_compatibility(output: &PadSummary, input: &PadSpec) -> Result<()> {
    if output.direction != PadDirection::Output {
        return Err(StreamError::PadDirectionMismatch {
            pad: output.name.clone(),
            declared: output.direction.to_string(),
            requested: PadDirection::Output.to_string(),
        });
    }
    if input.flow_control.is_manual() && output.flow_control.is_auto() && output.push_only {
        return Err(StreamError::IncompatibleFlowControl(format!(
            "manual input {} cannot be fed by push-only auto output {}",
            input.name, output.name
        )));
    }
    if output.flow_control.is_manual() && input.flow_control.is_auto() && input.push_only {
        return Err(StreamError::IncompatibleFlowControl(format!(
            "manual output {} cannot feed push-only auto input {}",
            output.name, input.name
        )));
    }
    Ok(())
}

/// Mode a pad presents over a new link, before the link exists.
fn presented_on_new_link(state: &ElementState, spec: &PadSpec) -> EffectiveFlowControl {
    spec.flow_control
        .fixed_effective()
        .unwrap_or_else(|| derive_effective_flow_control(state, None))
}

/// Link `pad` of this element to `peer`.
///
/// Only the output side initiates. Peer unavailability and refusals are
/// returned as recoverable errors and leave this element's state unchanged.
pub fn handle_link(
    state: &mut ElementState,
    element: &mut dyn Element,
    direction: PadDirection,
    pad: PadRef,
    props: LinkProps,
    peer: PadEndpoint,
) -> std::result::Result<(), LinkError> {
    if direction == PadDirection::Input {
        return Err(LinkError::Fatal(StreamError::InvalidAction(format!(
            "link of {} must be initiated by the output side",
            pad
        ))));
    }

    let spec = validate_pad(state, &pad, PadDirection::Output)?;
    let presented = presented_on_new_link(state, &spec);

    let request = LinkRequest {
        pad: peer.pad.clone(),
        input_props: peer.props.clone(),
        output_element: state.handle().clone(),
        output_pad: pad.clone(),
        output_info: spec.summary(),
        output_props: props,
        output_effective_flow_control: presented,
    };

    tracing::debug!(
        "[{}] Linking {} to {}:{}",
        state.id,
        pad,
        peer.element.id(),
        peer.pad
    );

    let response = match peer.element.call(
        |reply| ElementMessage::LinkRequest { request, reply },
        state.config.link_call_timeout(),
    ) {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::warn!("[{}] {}:{} refused link: {}", state.id, peer.element.id(), peer.pad, e);
            // The peer's configuration error terminated the peer, not us.
            return Err(match e {
                LinkError::Fatal(source) => LinkError::NeighborRefused {
                    element: peer.element.id().to_string(),
                    source,
                },
                recoverable => recoverable,
            });
        }
        Err(CallError::CallFailure(reason)) => {
            tracing::warn!("[{}] Link of {} failed: {}", state.id, pad, reason);
            return Err(LinkError::NeighborDead(peer.element.id().to_string()));
        }
        Err(CallError::ChildDead(reason)) => {
            tracing::warn!("[{}] Link of {} failed: {}", state.id, pad, reason);
            return Err(LinkError::NeighborChildDead(peer.element.id().to_string()));
        }
    };

    let other_view = response
        .input_info
        .flow_control
        .fixed_effective()
        .unwrap_or(response.input_effective_flow_control);
    let mut data = PadData::new(
        pad.clone(),
        spec.clone(),
        peer.element.clone(),
        peer.pad.clone(),
        response.input_info,
        response.demand_unit,
        response.atomic_demand,
    );
    if spec.flow_control.is_auto() {
        data.other_effective_flow_control = Some(other_view);
        data.sent_effective_flow_control = Some(presented);
    }

    state.pads_data.insert(pad.clone(), data);
    register_pad_metrics(state.metrics.as_ref(), &state.id, &state.pads_data[&pad]);
    tracing::info!(
        "[{}] Linked {} to {}:{} ({})",
        state.id,
        pad,
        peer.element.id(),
        peer.pad,
        spec.flow_control
    );

    if spec.flow_control.is_auto() {
        resolve_effective_flow_control(state, element, PropagationPass::new())?;
    }
    if pad.is_dynamic() {
        exec_and_handle_callback(state, element, Callback::PadAdded(pad.clone()))?;
    }
    if spec.flow_control.is_manual() {
        state.delay_demand(&pad);
        supply_delayed_demands(state, element)?;
    }
    Ok(())
}

/// Input side of the handshake.
pub fn handle_link_request(
    state: &mut ElementState,
    element: &mut dyn Element,
    request: LinkRequest,
) -> std::result::Result<LinkResponse, LinkError> {
    let pad = request.pad.clone();
    if state.pad_spec(&pad).is_none() {
        tracing::warn!("[{}] Link request for unknown pad {}", state.id, pad);
        return Err(LinkError::UnknownPad(format!("{} on {}", pad, state.id)));
    }
    let spec = validate_pad(state, &pad, PadDirection::Input)?;
    check_compatibility(&request.output_info, &spec)?;

    let demand_unit = request
        .output_info
        .demand_unit
        .or(spec.demand_unit)
        .unwrap_or_default();
    let other_view = request
        .output_info
        .flow_control
        .fixed_effective()
        .unwrap_or(request.output_effective_flow_control);
    let presented = presented_on_new_link(state, &spec);
    let receiver_mode = match spec.flow_control.fixed_effective() {
        Some(mode) => mode,
        None if other_view == EffectiveFlowControl::Pull => EffectiveFlowControl::Pull,
        None => presented,
    };

    let atomic_demand = AtomicDemand::new(
        AtomicDemandParams {
            receiver_effective_flow_control: receiver_mode,
            receiver: state.handle().clone(),
            receiver_demand_unit: demand_unit,
            sender: request.output_element.clone(),
            sender_pad_ref: request.output_pad.clone(),
            toilet_capacity: request.input_props.toilet_capacity,
            throttling_factor: request.input_props.throttling_factor,
        },
        &state.config,
    );
    if let Some(mode) = request.output_info.flow_control.fixed_effective() {
        atomic_demand.set_sender_status(mode);
    }

    let mut data = PadData::new(
        pad.clone(),
        spec.clone(),
        request.output_element.clone(),
        request.output_pad.clone(),
        request.output_info.clone(),
        demand_unit,
        atomic_demand.clone(),
    );
    let approximation = demand_unit.buffer_size_approximation();
    if spec.flow_control.is_manual() {
        let target = request
            .input_props
            .target_queue_size
            .unwrap_or(state.config.target_queue_size_factor * approximation);
        data.input_queue = Some(InputQueue::new(
            demand_unit,
            spec.demand_unit.unwrap_or(demand_unit),
            atomic_demand.clone(),
            target,
        ));
    } else if spec.flow_control.is_auto() {
        data.other_effective_flow_control = Some(other_view);
        data.sent_effective_flow_control = Some(presented);
        data.auto_demand_size = request
            .input_props
            .auto_demand_size
            .unwrap_or(state.config.auto_demand_size_factor * approximation);
    } else {
        atomic_demand.increase(atomic_demand.toilet_capacity());
    }

    state.pads_data.insert(pad.clone(), data);
    if spec.flow_control.is_auto() {
        state.auto_input_pads.push(pad.clone());
    }
    register_pad_metrics(state.metrics.as_ref(), &state.id, &state.pads_data[&pad]);
    tracing::info!(
        "[{}] Linked {} from {}:{} ({}, {})",
        state.id,
        pad,
        request.output_element.id(),
        request.output_pad,
        spec.flow_control,
        demand_unit
    );

    if spec.flow_control.is_auto() {
        resolve_effective_flow_control(state, element, PropagationPass::new())?;
        auto_flow_controller::auto_adjust_atomic_demand(state, &pad)?;
    }
    if pad.is_dynamic() {
        exec_and_handle_callback(state, element, Callback::PadAdded(pad.clone()))?;
    }

    Ok(LinkResponse {
        atomic_demand,
        input_info: spec.summary(),
        input_effective_flow_control: presented,
        demand_unit,
    })
}

/// Unlink `pad`.
///
/// Static pads may only be unlinked while the element terminates. A dynamic
/// pad that is not linked is left alone.
pub fn handle_unlink(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
) -> Result<()> {
    let Some(data) = state.pads_data.get(pad) else {
        let is_static = state
            .pad_spec(pad)
            .is_some_and(|spec| spec.availability == Availability::Always);
        if is_static && !state.terminating {
            return Err(StreamError::StaticPadNotLinked(pad.to_string()));
        }
        tracing::debug!("[{}] Ignoring unlink of {}: not linked", state.id, pad);
        return Ok(());
    };

    if data.spec.availability == Availability::Always && !state.terminating {
        return Err(StreamError::StaticPadUnlink(pad.to_string()));
    }

    let needs_end_of_stream = data.direction() == PadDirection::Input
        && !data.end_of_stream
        && state.playback == PlaybackState::Playing;
    remove_link(state, element, pad, needs_end_of_stream)
}

/// Undo the input half of a handshake whose initiator stopped waiting.
///
/// Static pads are rolled back too. The link never carried data, so no end of
/// stream is delivered.
pub fn rollback_link(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
) -> Result<()> {
    if !state.is_linked(pad) {
        return Ok(());
    }
    tracing::warn!(
        "[{}] Link initiator stopped waiting, rolling back {}",
        state.id,
        pad
    );
    remove_link(state, element, pad, false)
}

fn remove_link(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
    needs_end_of_stream: bool,
) -> Result<()> {
    state.metrics.unregister_pad(&state.id, pad);
    if needs_end_of_stream {
        data_handler::deliver_end_of_stream(state, element, pad)?;
    }
    if pad.is_dynamic() {
        exec_and_handle_callback(state, element, Callback::PadRemoved(pad.clone()))?;
    }

    if let Some(data) = state.pads_data.remove(pad) {
        tracing::info!("[{}] Unlinked {} ({})", state.id, pad, data.link_id);
    }
    state.satisfied_auto_output_pads.remove(pad);
    state.awaiting_auto_input_pads.remove(pad);
    state.auto_input_pads.retain(|p| p != pad);
    state.delayed_demands.retain(|p| p != pad);

    resolve_effective_flow_control(state, element, PropagationPass::new())?;
    auto_flow_controller::pop_queues_and_bump_demand(state, element)
}

/// Unlink every pad, inputs first so end of stream can still be forwarded.
pub fn unlink_all(state: &mut ElementState, element: &mut dyn Element) -> Result<()> {
    for pad in state.linked_pads_by_direction(PadDirection::Input) {
        handle_unlink(state, element, &pad)?;
    }
    for pad in state.linked_pads_by_direction(PadDirection::Output) {
        handle_unlink(state, element, &pad)?;
    }
    Ok(())
}
