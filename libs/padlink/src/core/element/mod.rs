// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod actions;
#[allow(clippy::module_inception)]
mod element;
mod handle;
mod messages;
mod runner;
mod state;

pub mod callback_handler;
pub mod data_handler;

pub use actions::Action;
pub use callback_handler::{Callback, exec_and_handle_callback};
pub use element::Element;
pub use handle::{ElementHandle, ElementId};
pub use messages::{ElementMessage, LinkRequest, LinkResponse, PadEndpoint, PropagationPass};
pub use runner::spawn_element;
pub use state::{ElementState, PlaybackState};
