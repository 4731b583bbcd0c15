// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-pad metric producers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::element::ElementId;
use crate::core::pads::{PadData, PadDirection, PadRef};

/// Read-only producer of a numeric metric.
pub type MetricProbe = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Receiver of metric producers, keyed by element and pad.
///
/// Probes are only read; they must not affect the runtime.
pub trait MetricsSink: Send + Sync {
    fn register(&self, element: &ElementId, pad: &PadRef, name: &'static str, probe: MetricProbe);

    /// Drop every probe registered for `pad`.
    fn unregister_pad(&self, element: &ElementId, pad: &PadRef);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn register(&self, _: &ElementId, _: &PadRef, _: &'static str, _: MetricProbe) {}

    fn unregister_pad(&self, _: &ElementId, _: &PadRef) {}
}

/// One metric value read at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub element: String,
    pub pad: String,
    pub name: String,
    pub value: i64,
}

type PadKey = (String, String);

/// Sink keeping probes in memory so they can be read back.
#[derive(Default)]
pub struct InMemoryMetrics {
    probes: Mutex<BTreeMap<PadKey, BTreeMap<&'static str, MetricProbe>>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every registered probe.
    pub fn snapshot(&self) -> Vec<MetricSnapshot> {
        let probes = self.probes.lock();
        probes
            .iter()
            .flat_map(|((element, pad), metrics)| {
                metrics.iter().map(move |(name, probe)| MetricSnapshot {
                    element: element.clone(),
                    pad: pad.clone(),
                    name: name.to_string(),
                    value: probe(),
                })
            })
            .collect()
    }

    pub fn value(&self, element: &str, pad: &str, name: &str) -> Option<i64> {
        let probes = self.probes.lock();
        probes
            .get(&(element.to_string(), pad.to_string()))
            .and_then(|metrics| metrics.get(name))
            .map(|probe| probe())
    }

    pub fn has_pad(&self, element: &str, pad: &str) -> bool {
        self.probes
            .lock()
            .contains_key(&(element.to_string(), pad.to_string()))
    }
}

impl MetricsSink for InMemoryMetrics {
    fn register(&self, element: &ElementId, pad: &PadRef, name: &'static str, probe: MetricProbe) {
        self.probes
            .lock()
            .entry((element.to_string(), pad.to_string()))
            .or_default()
            .insert(name, probe);
    }

    fn unregister_pad(&self, element: &ElementId, pad: &PadRef) {
        self.probes
            .lock()
            .remove(&(element.to_string(), pad.to_string()));
    }
}

impl std::fmt::Debug for InMemoryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryMetrics")
            .field("pads", &self.probes.lock().len())
            .finish()
    }
}

/// Register the probes of a freshly linked pad.
pub(crate) fn register_pad_metrics(sink: &dyn MetricsSink, element: &ElementId, data: &PadData) {
    let pad = &data.pad_ref;
    sink.register(
        element,
        pad,
        "atomic_demand",
        Arc::new(data.atomic_demand.counter_probe()),
    );

    let (name, counter) = match data.direction() {
        PadDirection::Output => ("buffers_sent", Arc::clone(&data.buffers_sent)),
        PadDirection::Input => ("buffers_received", Arc::clone(&data.buffers_received)),
    };
    sink.register(
        element,
        pad,
        name,
        Arc::new(move || counter.load(Ordering::Relaxed) as i64),
    );

    if let Some(queue) = &data.input_queue {
        let gauge = queue.size_gauge();
        sink.register(
            element,
            pad,
            "input_queue_size",
            Arc::new(move || gauge.load(Ordering::Relaxed) as i64),
        );
    }
}
