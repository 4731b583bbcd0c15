// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod atomic_demand;
mod input_queue;

pub use atomic_demand::{AtomicDemand, AtomicDemandParams, LinkEndStatus};
pub use input_queue::InputQueue;
