// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Data units exchanged over links and the units demand is counted in.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A unit of data sent from an output pad to an input pad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    pub payload: Bytes,
    /// Presentation timestamp in nanoseconds, if known.
    pub pts: Option<u64>,
}

impl Buffer {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            pts: None,
        }
    }

    pub fn with_pts(mut self, pts: u64) -> Self {
        self.pts = Some(pts);
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Description of the data a pad carries, announced before any buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub name: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl StreamFormat {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: serde_json::Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }
}

impl std::fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.properties.is_empty() {
            write!(f, " {}", serde_json::Value::Object(self.properties.clone()))?;
        }
        Ok(())
    }
}

/// Unit in which demand and queue sizes are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemandUnit {
    /// One unit per buffer.
    #[default]
    Buffers,
    /// One unit per payload byte.
    Bytes,
}

impl DemandUnit {
    /// Rough size of a single buffer in this unit.
    pub const fn buffer_size_approximation(self) -> u64 {
        match self {
            DemandUnit::Buffers => 1,
            DemandUnit::Bytes => 2048,
        }
    }

    pub fn buffer_size(self, buffer: &Buffer) -> u64 {
        match self {
            DemandUnit::Buffers => 1,
            DemandUnit::Bytes => buffer.len() as u64,
        }
    }

    pub fn buffers_size(self, buffers: &[Buffer]) -> u64 {
        match self {
            DemandUnit::Buffers => buffers.len() as u64,
            DemandUnit::Bytes => buffers.iter().map(|b| b.len() as u64).sum(),
        }
    }

    /// Split `buffer` so that its head measures at most `size` in this unit.
    ///
    /// Buffers cannot be split in the `Buffers` unit; the whole buffer is
    /// returned as head.
    pub fn split_buffer(self, mut buffer: Buffer, size: u64) -> (Buffer, Option<Buffer>) {
        match self {
            DemandUnit::Buffers => (buffer, None),
            DemandUnit::Bytes => {
                let at = size as usize;
                if at >= buffer.len() {
                    return (buffer, None);
                }
                let head = buffer.payload.split_to(at);
                (
                    Buffer {
                        payload: head,
                        pts: buffer.pts,
                    },
                    Some(buffer),
                )
            }
        }
    }
}

impl std::fmt::Display for DemandUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DemandUnit::Buffers => write!(f, "buffers"),
            DemandUnit::Bytes => write!(f, "bytes"),
        }
    }
}

/// Anything that travels over a link in order with buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueItem {
    Buffer(Buffer),
    StreamFormat(StreamFormat),
    EndOfStream,
}

impl QueueItem {
    /// Size of the item in `unit`; only buffers take up space.
    pub fn size(&self, unit: DemandUnit) -> u64 {
        match self {
            QueueItem::Buffer(buffer) => unit.buffer_size(buffer),
            _ => 0,
        }
    }
}
