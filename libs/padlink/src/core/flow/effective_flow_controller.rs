// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Push/pull resolution of auto pads.
//!
//! Every auto pad records the mode its neighbour presents over the link. A
//! fixed neighbour presents its declared mode. An auto neighbour presents
//! the mode its element derives from all of its *other* auto pads, so a
//! link never echoes a view back to where it came from. An element is
//! pull-driven when any of its auto pads sees a pull neighbour.
//!
//! Changes travel as [`ElementMessage::OtherEffectiveFlowControl`] carrying a
//! [`PropagationPass`]; an element already visited by the pass settles its
//! own pads and stops forwarding.

use super::auto_flow_controller;
use crate::core::element::{Element, ElementMessage, ElementState, PropagationPass};
use crate::core::pads::{EffectiveFlowControl, PadDirection, PadRef};
use crate::core::{Result, StreamError};

/// Effective mode of `pad`: its declared mode if fixed, the element's mode if auto.
pub fn get_pad_effective_flow_control(
    state: &ElementState,
    pad: &PadRef,
) -> Result<EffectiveFlowControl> {
    let spec = state
        .pad_spec(pad)
        .ok_or_else(|| StreamError::UnknownPad(format!("{} on {}", pad, state.id())))?;
    Ok(spec
        .flow_control
        .fixed_effective()
        .unwrap_or(state.effective_flow_control()))
}

/// Mode derived from the neighbour views of the auto pads, ignoring `excluding`.
pub fn derive_effective_flow_control(
    state: &ElementState,
    excluding: Option<&PadRef>,
) -> EffectiveFlowControl {
    if state
        .auto_pad_views(excluding)
        .any(|view| view == Some(EffectiveFlowControl::Pull))
    {
        EffectiveFlowControl::Pull
    } else {
        EffectiveFlowControl::Push
    }
}

/// Mode this element presents to the neighbour behind auto `pad`.
#[inline]
pub fn presented_effective_flow_control(state: &ElementState, pad: &PadRef) -> EffectiveFlowControl {
    derive_effective_flow_control(state, Some(pad))
}

/// The sender behind auto input `pad` now presents `mode`.
pub fn handle_sender_effective_flow_control(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
    mode: EffectiveFlowControl,
    pass: PropagationPass,
) -> Result<()> {
    handle_other_effective_flow_control(state, element, pad, PadDirection::Input, mode, pass)
}

/// The receiver behind auto output `pad` now presents `mode`.
pub fn handle_receiver_effective_flow_control(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
    mode: EffectiveFlowControl,
    pass: PropagationPass,
) -> Result<()> {
    handle_other_effective_flow_control(state, element, pad, PadDirection::Output, mode, pass)
}

fn handle_other_effective_flow_control(
    state: &mut ElementState,
    element: &mut dyn Element,
    pad: &PadRef,
    direction: PadDirection,
    mode: EffectiveFlowControl,
    pass: PropagationPass,
) -> Result<()> {
    let Some(data) = state.pads_data.get_mut(pad) else {
        tracing::debug!(
            "[{}] Flow control update for unlinked {} ignored",
            state.id,
            pad
        );
        return Ok(());
    };
    if !data.is_auto() || data.direction() != direction {
        return Ok(());
    }
    if data.other_effective_flow_control == Some(mode) {
        return Ok(());
    }
    data.other_effective_flow_control = Some(mode);
    tracing::debug!(
        "[{}] Neighbour of {} now presents {} (pass {})",
        state.id,
        pad,
        mode,
        pass.id
    );

    if pass.has_visited(&state.id) {
        tracing::trace!(
            "[{}] Already visited by pass {}, settling locally",
            state.id,
            pass.id
        );
        return apply_effective_flow_control(state, element, None);
    }
    resolve_effective_flow_control(state, element, pass)
}

/// Re-derive the element's mode and push changes to auto neighbours.
///
/// Runs after every link and unlink, and whenever a neighbour's view changes.
pub fn resolve_effective_flow_control(
    state: &mut ElementState,
    element: &mut dyn Element,
    mut pass: PropagationPass,
) -> Result<()> {
    pass.visit(&state.id);
    apply_effective_flow_control(state, element, Some(pass))
}

fn apply_effective_flow_control(
    state: &mut ElementState,
    element: &mut dyn Element,
    pass: Option<PropagationPass>,
) -> Result<()> {
    let previous = state.effective_flow_control;
    let mode = derive_effective_flow_control(state, None);
    state.effective_flow_control = mode;
    if previous != mode {
        tracing::info!(
            "[{}] Effective flow control changed from {} to {}",
            state.id,
            previous,
            mode
        );
    }

    for pad in state.linked_pads() {
        let presented = presented_effective_flow_control(state, &pad);
        let Some(data) = state.pads_data.get_mut(&pad) else {
            continue;
        };
        if !data.is_auto() {
            continue;
        }

        match data.direction() {
            PadDirection::Output => data.atomic_demand.set_sender_status(mode),
            PadDirection::Input => data.atomic_demand.set_receiver_status(mode),
        }

        let Some(pass) = &pass else {
            continue;
        };
        if data.has_auto_peer() && data.sent_effective_flow_control != Some(presented) {
            data.sent_effective_flow_control = Some(presented);
            let delivered = data
                .other_element
                .send(ElementMessage::OtherEffectiveFlowControl {
                    pad: data.other_ref.clone(),
                    mode: presented,
                    pass: pass.clone(),
                });
            if !delivered {
                tracing::debug!(
                    "[{}] {} is gone, flow control update dropped",
                    state.id,
                    data.other_element.id()
                );
            }
        }
    }

    auto_flow_controller::refresh_satisfied_output_pads(state);
    auto_flow_controller::pop_queues_and_bump_demand(state, element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{StateFixture, auto_link};
    use crate::core::pads::PadSpec;

    #[test]
    fn test_fixed_pads_keep_declared_mode() {
        let fixture = StateFixture::new(vec![
            PadSpec::input("input").manual(),
            PadSpec::output("output").push(),
        ]);
        assert_eq!(
            get_pad_effective_flow_control(&fixture.state, &PadRef::new("input")).unwrap(),
            EffectiveFlowControl::Pull
        );
        assert_eq!(
            get_pad_effective_flow_control(&fixture.state, &PadRef::new("output")).unwrap(),
            EffectiveFlowControl::Push
        );
        assert!(get_pad_effective_flow_control(&fixture.state, &PadRef::new("absent")).is_err());
    }

    #[test]
    fn test_any_pull_view_makes_element_pull() {
        let mut fixture = StateFixture::new(vec![
            PadSpec::input("input"),
            PadSpec::output("output"),
        ]);
        auto_link(&mut fixture, "input", Some(EffectiveFlowControl::Push));
        auto_link(&mut fixture, "output", Some(EffectiveFlowControl::Pull));

        assert_eq!(
            derive_effective_flow_control(&fixture.state, None),
            EffectiveFlowControl::Pull
        );
        // The output's own neighbour is not echoed back to it.
        assert_eq!(
            presented_effective_flow_control(&fixture.state, &PadRef::new("output")),
            EffectiveFlowControl::Push
        );
        assert_eq!(
            presented_effective_flow_control(&fixture.state, &PadRef::new("input")),
            EffectiveFlowControl::Pull
        );
    }

    #[test]
    fn test_sender_update_resolves_and_propagates() {
        let mut fixture = StateFixture::new(vec![
            PadSpec::input("input"),
            PadSpec::output("output"),
        ]);
        auto_link(&mut fixture, "input", Some(EffectiveFlowControl::Push));
        auto_link(&mut fixture, "output", Some(EffectiveFlowControl::Push));
        let mut element = fixture.element();

        handle_receiver_effective_flow_control(
            &mut fixture.state,
            &mut element,
            &PadRef::new("output"),
            EffectiveFlowControl::Pull,
            PropagationPass::new(),
        )
        .unwrap();

        assert_eq!(fixture.state.effective_flow_control(), EffectiveFlowControl::Pull);
        let input = fixture.state.pad_data(&PadRef::new("input")).unwrap();
        assert_eq!(
            input.sent_effective_flow_control,
            Some(EffectiveFlowControl::Pull)
        );
        let updates = fixture.peer_flow_control_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, PadRef::new("peer_output"));
        assert_eq!(updates[0].1, EffectiveFlowControl::Pull);
        assert!(updates[0].2.has_visited(fixture.state.id()));
    }

    #[test]
    fn test_visited_pass_settles_without_forwarding() {
        let mut fixture = StateFixture::new(vec![
            PadSpec::input("input"),
            PadSpec::output("output"),
        ]);
        auto_link(&mut fixture, "input", Some(EffectiveFlowControl::Push));
        auto_link(&mut fixture, "output", Some(EffectiveFlowControl::Push));
        let mut element = fixture.element();

        let mut pass = PropagationPass::new();
        pass.visit(fixture.state.id());
        handle_receiver_effective_flow_control(
            &mut fixture.state,
            &mut element,
            &PadRef::new("output"),
            EffectiveFlowControl::Pull,
            pass,
        )
        .unwrap();

        assert_eq!(fixture.state.effective_flow_control(), EffectiveFlowControl::Pull);
        assert!(fixture.peer_flow_control_updates().is_empty());
    }

    #[test]
    fn test_repeated_update_is_idempotent() {
        let mut fixture = StateFixture::new(vec![PadSpec::input("input"), PadSpec::output("output")]);
        auto_link(&mut fixture, "input", Some(EffectiveFlowControl::Push));
        auto_link(&mut fixture, "output", Some(EffectiveFlowControl::Push));
        let mut element = fixture.element();

        for _ in 0..3 {
            handle_sender_effective_flow_control(
                &mut fixture.state,
                &mut element,
                &PadRef::new("input"),
                EffectiveFlowControl::Pull,
                PropagationPass::new(),
            )
            .unwrap();
        }
        assert_eq!(fixture.peer_flow_control_updates().len(), 1);
    }
}
