// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod link_props;
mod pad_data;
mod pad_ref;
mod pad_spec;

pub use link_props::LinkProps;
pub use pad_data::PadData;
pub use pad_ref::{PadRef, PadRefError};
pub use pad_spec::{
    AcceptedFormat, Availability, EffectiveFlowControl, FlowControl, PadDirection, PadSpec,
    PadSummary,
};
