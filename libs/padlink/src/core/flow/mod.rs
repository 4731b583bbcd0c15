// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod auto_flow_controller;
pub mod effective_flow_controller;

pub use effective_flow_controller::{
    get_pad_effective_flow_control, handle_receiver_effective_flow_control,
    handle_sender_effective_flow_control, resolve_effective_flow_control,
};
