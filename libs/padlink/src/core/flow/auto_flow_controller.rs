// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Demand of auto pads.
//!
//! Auto inputs keep `auto_demand_size` outstanding. In pull mode an element
//! stops demanding while any auto output is satisfied (its link has no
//! demand left) and holds arriving data in per-pad queues until the output
//! drains. Queues are emptied round-robin across `auto_input_pads`.

use crate::core::Result;
use crate::core::demand::LinkEndStatus;
use crate::core::element::{Element, ElementState, data_handler};
use crate::core::pads::{EffectiveFlowControl, PadDirection, PadRef};

/// Raise the demand of auto input `pad` back to its auto demand size.
///
/// Demand is raised once it falls under half the size, in pull mode when no
/// auto output is satisfied, in push mode only when the sender pulls.
pub fn auto_adjust_atomic_demand(state: &mut ElementState, pad: &PadRef) -> Result<()> {
    let mode = state.effective_flow_control;
    let blocked = state.auto_flow_blocked();
    let id = &state.id;
    let Some(data) = state.pads_data.get_mut(pad) else {
        return Ok(());
    };
    if !data.is_auto() || data.direction() != PadDirection::Input || data.auto_demand_paused {
        return Ok(());
    }

    let size = data.auto_demand_size as i64;
    if data.demand >= size / 2 {
        return Ok(());
    }

    let should_demand = match mode {
        EffectiveFlowControl::Pull => !blocked,
        EffectiveFlowControl::Push => {
            data.atomic_demand.sender_status()
                == LinkEndStatus::Resolved(EffectiveFlowControl::Pull)
        }
    };
    if !should_demand {
        return Ok(());
    }

    let increase = size - data.demand;
    data.atomic_demand.increase(increase as u64);
    data.demand = size;
    tracing::trace!("[{}] Auto demand on {} raised by {}", id, pad, increase);
    Ok(())
}

/// Recompute which auto outputs are satisfied.
pub fn refresh_satisfied_output_pads(state: &mut ElementState) {
    let pull = state.effective_flow_control == EffectiveFlowControl::Pull;
    for (pad, data) in &state.pads_data {
        if !data.is_auto() || data.direction() != PadDirection::Output {
            continue;
        }
        if pull && data.atomic_demand.sender_view() <= 0 {
            state.satisfied_auto_output_pads.insert(pad.clone());
        } else {
            state.satisfied_auto_output_pads.remove(pad);
        }
    }
}

/// Deliver items held on auto inputs and top up their demand.
///
/// Items are taken one per pad per round, starting from a different pad on
/// every call, until the queues are empty or an output becomes satisfied.
pub fn pop_queues_and_bump_demand(
    state: &mut ElementState,
    element: &mut dyn Element,
) -> Result<()> {
    if state.popping_queues {
        return Ok(());
    }
    state.popping_queues = true;
    let result = pop_queues(state, element).and_then(|()| bump_demand(state));
    state.popping_queues = false;
    result
}

fn pop_queues(state: &mut ElementState, element: &mut dyn Element) -> Result<()> {
    if state.auto_input_pads.len() > 1 {
        state.auto_input_pads.rotate_left(1);
    }
    let order = state.auto_input_pads.clone();

    loop {
        let mut progressed = false;
        for pad in &order {
            if state.auto_flow_blocked() {
                return Ok(());
            }
            let item = state
                .pads_data
                .get_mut(pad)
                .and_then(|data| data.auto_flow_queue.pop_front());
            match item {
                Some(item) => {
                    progressed = true;
                    data_handler::deliver_item(state, element, pad, item)?;
                }
                None => {
                    state.awaiting_auto_input_pads.remove(pad);
                }
            }
        }
        if !progressed {
            return Ok(());
        }
    }
}

fn bump_demand(state: &mut ElementState) -> Result<()> {
    for pad in state.auto_input_pads.clone() {
        let idle = state
            .pads_data
            .get(&pad)
            .is_some_and(|data| data.auto_flow_queue.is_empty());
        if idle {
            auto_adjust_atomic_demand(state, &pad)?;
        }
    }
    Ok(())
}
