// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pad declarations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::buffers::{DemandUnit, StreamFormat};

/// Direction of a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadDirection {
    /// Receives data.
    Input,
    /// Sends data.
    Output,
}

impl PadDirection {
    pub fn opposite(self) -> Self {
        match self {
            PadDirection::Input => PadDirection::Output,
            PadDirection::Output => PadDirection::Input,
        }
    }
}

impl std::fmt::Display for PadDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PadDirection::Input => write!(f, "input"),
            PadDirection::Output => write!(f, "output"),
        }
    }
}

/// Declared flow control discipline of a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    /// Sender streams unconditionally.
    Push,
    /// Alias of [`FlowControl::Manual`].
    Pull,
    /// The element explicitly demands (input) or answers demand (output).
    Manual,
    /// The runtime manages demand; push or pull is resolved from the neighbours.
    Auto,
}

impl FlowControl {
    #[inline]
    pub fn is_manual(self) -> bool {
        matches!(self, FlowControl::Pull | FlowControl::Manual)
    }

    #[inline]
    pub fn is_auto(self) -> bool {
        self == FlowControl::Auto
    }

    /// Effective mode of a pad with a fixed discipline, `None` for `Auto`.
    pub fn fixed_effective(self) -> Option<EffectiveFlowControl> {
        match self {
            FlowControl::Push => Some(EffectiveFlowControl::Push),
            FlowControl::Pull | FlowControl::Manual => Some(EffectiveFlowControl::Pull),
            FlowControl::Auto => None,
        }
    }
}

impl std::fmt::Display for FlowControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowControl::Push => write!(f, "push"),
            FlowControl::Pull => write!(f, "pull"),
            FlowControl::Manual => write!(f, "manual"),
            FlowControl::Auto => write!(f, "auto"),
        }
    }
}

/// Concretely resolved behaviour of a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectiveFlowControl {
    #[default]
    Push,
    Pull,
}

impl std::fmt::Display for EffectiveFlowControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectiveFlowControl::Push => write!(f, "push"),
            EffectiveFlowControl::Pull => write!(f, "pull"),
        }
    }
}

/// Whether a pad exists for the whole element lifetime or per link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Always,
    OnRequest,
}

/// Validator deciding whether a pad accepts a stream format.
pub type AcceptedFormat = Arc<dyn Fn(&StreamFormat) -> bool + Send + Sync>;

/// Declaration of a pad on an element.
#[derive(Clone)]
pub struct PadSpec {
    pub name: String,
    pub direction: PadDirection,
    pub flow_control: FlowControl,
    pub availability: Availability,
    /// Unit demand is counted in; `None` defers to the peer or to buffers.
    pub demand_unit: Option<DemandUnit>,
    /// An auto pad that cannot operate in pull mode.
    pub push_only: bool,
    accepted_format: AcceptedFormat,
}

impl PadSpec {
    fn new(name: impl Into<String>, direction: PadDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            flow_control: FlowControl::Auto,
            availability: Availability::Always,
            demand_unit: None,
            push_only: false,
            accepted_format: Arc::new(|_| true),
        }
    }

    pub fn input(name: impl Into<String>) -> Self {
        Self::new(name, PadDirection::Input)
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self::new(name, PadDirection::Output)
    }

    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }

    pub fn push(self) -> Self {
        self.flow_control(FlowControl::Push)
    }

    pub fn manual(self) -> Self {
        self.flow_control(FlowControl::Manual)
    }

    pub fn auto(self) -> Self {
        self.flow_control(FlowControl::Auto)
    }

    pub fn on_request(mut self) -> Self {
        self.availability = Availability::OnRequest;
        self
    }

    pub fn demand_unit(mut self, unit: DemandUnit) -> Self {
        self.demand_unit = Some(unit);
        self
    }

    pub fn push_only(mut self) -> Self {
        self.push_only = true;
        self
    }

    pub fn accepts<F>(mut self, validator: F) -> Self
    where
        F: Fn(&StreamFormat) -> bool + Send + Sync + 'static,
    {
        self.accepted_format = Arc::new(validator);
        self
    }

    pub fn accepts_format(&self, format: &StreamFormat) -> bool {
        (self.accepted_format)(format)
    }

    pub fn accepted_format(&self) -> AcceptedFormat {
        Arc::clone(&self.accepted_format)
    }

    /// Metadata about this pad shared with a peer during linking.
    pub fn summary(&self) -> PadSummary {
        PadSummary {
            name: self.name.clone(),
            direction: self.direction,
            flow_control: self.flow_control,
            availability: self.availability,
            demand_unit: self.demand_unit,
            push_only: self.push_only,
        }
    }
}

impl std::fmt::Debug for PadSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PadSpec")
            .field("name", &self.name)
            .field("direction", &self.direction)
            .field("flow_control", &self.flow_control)
            .field("availability", &self.availability)
            .field("demand_unit", &self.demand_unit)
            .field("push_only", &self.push_only)
            .finish_non_exhaustive()
    }
}

/// Serializable subset of a [`PadSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadSummary {
    pub name: String,
    pub direction: PadDirection,
    pub flow_control: FlowControl,
    pub availability: Availability,
    pub demand_unit: Option<DemandUnit>,
    pub push_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let spec = PadSpec::input("input");
        assert_eq!(spec.direction, PadDirection::Input);
        assert_eq!(spec.flow_control, FlowControl::Auto);
        assert_eq!(spec.availability, Availability::Always);
        assert!(spec.accepts_format(&StreamFormat::new("anything")));
    }

    #[test]
    fn test_accepted_format_validator() {
        let spec = PadSpec::input("input")
            .manual()
            .accepts(|format| format.name == "audio/raw");
        assert!(spec.accepts_format(&StreamFormat::new("audio/raw")));
        assert!(!spec.accepts_format(&StreamFormat::new("video/raw")));
    }

    #[test]
    fn test_fixed_effective() {
        assert_eq!(
            FlowControl::Pull.fixed_effective(),
            Some(EffectiveFlowControl::Pull)
        );
        assert_eq!(
            FlowControl::Manual.fixed_effective(),
            Some(EffectiveFlowControl::Pull)
        );
        assert_eq!(
            FlowControl::Push.fixed_effective(),
            Some(EffectiveFlowControl::Push)
        );
        assert_eq!(FlowControl::Auto.fixed_effective(), None);
    }

    #[test]
    fn test_summary_serde() {
        let summary = PadSpec::output("output")
            .push()
            .on_request()
            .demand_unit(DemandUnit::Bytes)
            .summary();
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains(r#""availability":"on_request""#));
        let back: PadSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
