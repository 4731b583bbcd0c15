// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

/// Reference to a pad of one element.
///
/// Static pads are referenced by name. Pads with `on_request` availability
/// are instantiated per link and carry an instance id next to their name.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PadRef {
    name: String,
    instance: Option<u64>,
}

/// Errors that can occur when parsing a [`PadRef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PadRefError {
    Empty,
    InvalidCharacters(String),
    InvalidFormat(String),
}

impl std::fmt::Display for PadRefError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Pad name cannot be empty"),
            Self::InvalidCharacters(name) => {
                write!(f, "Pad name '{}' contains invalid characters", name)
            }
            Self::InvalidFormat(msg) => write!(f, "Invalid pad reference: {}", msg),
        }
    }
}

impl std::error::Error for PadRefError {}

fn validate_name(name: &str) -> Result<(), PadRefError> {
    if name.is_empty() {
        return Err(PadRefError::Empty);
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(PadRefError::InvalidCharacters(name.to_string()));
    }
    Ok(())
}

impl PadRef {
    /// Reference to a static pad.
    ///
    /// # Panics
    ///
    /// Panics on an invalid name. Use [`PadRef::parse`] for untrusted input.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if let Err(e) = validate_name(&name) {
            panic!("{}", e);
        }
        Self {
            name,
            instance: None,
        }
    }

    /// Reference to instance `id` of a dynamic pad.
    pub fn dynamic(name: impl Into<String>, id: u64) -> Self {
        Self {
            instance: Some(id),
            ..Self::new(name)
        }
    }

    /// Parse `name` or `name[id]`.
    pub fn parse(s: &str) -> Result<Self, PadRefError> {
        match s.split_once('[') {
            None => {
                validate_name(s)?;
                Ok(Self {
                    name: s.to_string(),
                    instance: None,
                })
            }
            Some((name, rest)) => {
                validate_name(name)?;
                let id = rest
                    .strip_suffix(']')
                    .and_then(|id| id.parse::<u64>().ok())
                    .ok_or_else(|| PadRefError::InvalidFormat(s.to_string()))?;
                Ok(Self {
                    name: name.to_string(),
                    instance: Some(id),
                })
            }
        }
    }

    /// Name of the pad declaration this reference points to.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn instance(&self) -> Option<u64> {
        self.instance
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.instance.is_some()
    }
}

impl std::fmt::Display for PadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.instance {
            Some(id) => write!(f, "{}[{}]", self.name, id),
            None => write!(f, "{}", self.name),
        }
    }
}

impl TryFrom<&str> for PadRef {
    type Error = PadRefError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PadRef {
    type Error = PadRefError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}
