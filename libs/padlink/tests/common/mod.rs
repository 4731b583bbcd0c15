// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Test-only elements and helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use padlink::core::{
    Action, Buffer, DemandUnit, Element, ElementSnapshot, ElementState, PadRef, PadSnapshot,
    PadSpec, Pipeline, Result, StreamFormat,
};

pub const WAIT: Duration = Duration::from_secs(5);

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Wait until the element's snapshot satisfies `condition` and return it.
pub fn wait_for_snapshot(
    pipeline: &Pipeline,
    element: &str,
    condition: impl Fn(&ElementSnapshot) -> bool,
) -> ElementSnapshot {
    let mut last = None;
    let reached = wait_until(WAIT, || {
        let snapshot = pipeline.inspect(element).unwrap();
        let done = condition(&snapshot);
        last = Some(snapshot);
        done
    });
    let snapshot = last.unwrap();
    assert!(reached, "condition on {} not reached: {:#?}", element, snapshot);
    snapshot
}

pub fn pad<'a>(snapshot: &'a ElementSnapshot, pad: &str) -> &'a PadSnapshot {
    snapshot
        .pad(pad)
        .unwrap_or_else(|| panic!("{} has no linked pad {}", snapshot.id, pad))
}

pub fn format() -> StreamFormat {
    StreamFormat::new("audio/raw").with("channels", 2)
}

pub type Events = Arc<Mutex<Vec<String>>>;

/// Configurable element driven by notifications.
///
/// Notifications understood:
/// - `{"send": pad, "count": n}` sends the stream format once, then `n`
///   single-buffer actions on `pad`
/// - `{"demand": pad, "size": n}` demands `n` on a manual input
/// - `{"end_of_stream": pad}`
/// - `{"pause": pad}` / `{"resume": pad}` toggle auto demand
pub struct Probe {
    pads: Vec<PadSpec>,
    events: Events,
    /// Output receiving everything that arrives on inputs.
    forward_to: Option<PadRef>,
    /// Answer `handle_demand` with as many buffers as demanded.
    serve_demand: bool,
    panic_on_pad_added: bool,
    /// Time `handle_pad_added` blocks the element before returning.
    pad_added_delay: Option<Duration>,
    format_sent: Vec<PadRef>,
}

impl Probe {
    pub fn new(pads: Vec<PadSpec>) -> Self {
        Self {
            pads,
            events: Arc::new(Mutex::new(Vec::new())),
            forward_to: None,
            serve_demand: false,
            panic_on_pad_added: false,
            pad_added_delay: None,
            format_sent: Vec::new(),
        }
    }

    pub fn source(output: PadSpec) -> Self {
        Self::new(vec![output])
    }

    pub fn sink(input: PadSpec) -> Self {
        Self::new(vec![input])
    }

    pub fn filter(input: PadSpec, output: PadSpec) -> Self {
        let forward_to = PadRef::new(output.name.clone());
        let mut probe = Self::new(vec![input, output]);
        probe.forward_to = Some(forward_to);
        probe
    }

    pub fn serving_demand(mut self) -> Self {
        self.serve_demand = true;
        self
    }

    pub fn panicking_on_pad_added(mut self) -> Self {
        self.panic_on_pad_added = true;
        self
    }

    pub fn delaying_pad_added(mut self, delay: Duration) -> Self {
        self.pad_added_delay = Some(delay);
        self
    }

    pub fn events(&self) -> Events {
        Arc::clone(&self.events)
    }

    fn record(&self, event: String) {
        self.events.lock().push(event);
    }

    fn with_format(&mut self, pad: &PadRef, mut actions: Vec<Action>) -> Vec<Action> {
        if !self.format_sent.contains(pad) {
            self.format_sent.push(pad.clone());
            actions.insert(0, Action::stream_format(pad.clone(), format()));
        }
        actions
    }
}

pub fn count(events: &Events, prefix: &str) -> usize {
    events
        .lock()
        .iter()
        .filter(|event| event.starts_with(prefix))
        .count()
}

fn notification_pad(notification: &serde_json::Value, key: &str) -> Option<PadRef> {
    notification
        .get(key)
        .and_then(|value| value.as_str())
        .map(|pad| PadRef::parse(pad).unwrap())
}

impl Element for Probe {
    fn pads(&self) -> Vec<PadSpec> {
        self.pads.clone()
    }

    fn handle_pad_added(&mut self, pad: &PadRef, _ctx: &ElementState) -> Result<Vec<Action>> {
        if self.panic_on_pad_added {
            panic!("pad_added {} refused", pad);
        }
        if let Some(delay) = self.pad_added_delay {
            std::thread::sleep(delay);
        }
        self.record(format!("pad_added {}", pad));
        Ok(Vec::new())
    }

    fn handle_pad_removed(&mut self, pad: &PadRef, _ctx: &ElementState) -> Result<Vec<Action>> {
        self.record(format!("pad_removed {}", pad));
        Ok(Vec::new())
    }

    fn handle_stream_format(
        &mut self,
        pad: &PadRef,
        format: &StreamFormat,
        _ctx: &ElementState,
    ) -> Result<Vec<Action>> {
        self.record(format!("stream_format {}", pad));
        match self.forward_to.clone() {
            Some(output) => {
                self.format_sent.push(output.clone());
                Ok(vec![Action::stream_format(output, format.clone())])
            }
            None => Ok(Vec::new()),
        }
    }

    fn handle_buffer(
        &mut self,
        pad: &PadRef,
        buffer: Buffer,
        _ctx: &ElementState,
    ) -> Result<Vec<Action>> {
        self.record(format!("buffer {}", pad));
        match &self.forward_to {
            Some(output) => Ok(vec![Action::buffer(output.clone(), buffer)]),
            None => Ok(Vec::new()),
        }
    }

    fn handle_demand(
        &mut self,
        pad: &PadRef,
        size: u64,
        _unit: DemandUnit,
        _ctx: &ElementState,
    ) -> Result<Vec<Action>> {
        self.record(format!("demand {} {}", pad, size));
        if !self.serve_demand {
            return Ok(Vec::new());
        }
        let buffers = (0..size).map(|i| Buffer::new(vec![i as u8])).collect();
        let actions = vec![Action::Buffer {
            pad: pad.clone(),
            buffers,
        }];
        Ok(self.with_format(pad, actions))
    }

    fn handle_end_of_stream(&mut self, pad: &PadRef, _ctx: &ElementState) -> Result<Vec<Action>> {
        self.record(format!("end_of_stream {}", pad));
        match &self.forward_to {
            Some(output) => Ok(vec![Action::EndOfStream(output.clone())]),
            None => Ok(Vec::new()),
        }
    }

    fn handle_notification(
        &mut self,
        notification: serde_json::Value,
        _ctx: &ElementState,
    ) -> Result<Vec<Action>> {
        if let Some(pad) = notification_pad(&notification, "send") {
            let count = notification["count"].as_u64().unwrap_or(1);
            let actions = (0..count)
                .map(|i| Action::buffer(pad.clone(), Buffer::new(vec![i as u8])))
                .collect();
            return Ok(self.with_format(&pad, actions));
        }
        if let Some(pad) = notification_pad(&notification, "demand") {
            let size = notification["size"].as_u64().unwrap_or(1);
            return Ok(vec![Action::demand(pad, size)]);
        }
        if let Some(pad) = notification_pad(&notification, "end_of_stream") {
            return Ok(vec![Action::EndOfStream(pad)]);
        }
        if let Some(pad) = notification_pad(&notification, "pause") {
            return Ok(vec![Action::PauseAutoDemand(pad)]);
        }
        if let Some(pad) = notification_pad(&notification, "resume") {
            return Ok(vec![Action::ResumeAutoDemand(pad)]);
        }
        Ok(Vec::new())
    }
}
