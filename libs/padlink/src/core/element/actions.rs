// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use crate::core::buffers::{Buffer, StreamFormat};
use crate::core::pads::PadRef;

/// Side effect requested by an element callback.
///
/// Actions are applied in order once the callback returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Send buffers on an output pad.
    Buffer { pad: PadRef, buffers: Vec<Buffer> },
    /// Announce the format of the following buffers on an output pad.
    StreamFormat { pad: PadRef, format: StreamFormat },
    /// No more data will be sent on an output pad.
    EndOfStream(PadRef),
    /// Ask for `size` more units on a manual input pad.
    Demand { pad: PadRef, size: u64 },
    /// Call `handle_demand` again for a manual output pad if it still has demand.
    Redemand(PadRef),
    /// Stop raising demand on an auto input pad.
    PauseAutoDemand(PadRef),
    /// Resume raising demand on an auto input pad.
    ResumeAutoDemand(PadRef),
}

impl Action {
    pub fn buffer(pad: impl Into<PadRef>, buffer: Buffer) -> Self {
        Action::Buffer {
            pad: pad.into(),
            buffers: vec![buffer],
        }
    }

    pub fn stream_format(pad: impl Into<PadRef>, format: StreamFormat) -> Self {
        Action::StreamFormat {
            pad: pad.into(),
            format,
        }
    }

    pub fn demand(pad: impl Into<PadRef>, size: u64) -> Self {
        Action::Demand {
            pad: pad.into(),
            size,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Buffer { .. } => "buffer",
            Action::StreamFormat { .. } => "stream_format",
            Action::EndOfStream(_) => "end_of_stream",
            Action::Demand { .. } => "demand",
            Action::Redemand(_) => "redemand",
            Action::PauseAutoDemand(_) => "pause_auto_demand",
            Action::ResumeAutoDemand(_) => "resume_auto_demand",
        }
    }
}
