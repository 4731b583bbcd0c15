// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::core::config::FlowConfig;
use crate::core::element::{
    Element, ElementHandle, ElementId, ElementMessage, PadEndpoint, spawn_element,
};
use crate::core::error::{CallError, LinkError};
use crate::core::observability::{ElementSnapshot, MetricsSink, NoopMetrics};
use crate::core::pads::{LinkProps, PadDirection, PadRef};
use crate::core::{Result, StreamError};

struct RunningElement {
    handle: ElementHandle,
    thread: Option<JoinHandle<()>>,
}

/// Assembly layer: spawns elements, links and unlinks their pads, and shuts
/// them down.
///
/// All methods take `&self`, so a pipeline can be shared via `Arc<Pipeline>`.
/// Elements are terminated in insertion order when the pipeline is dropped.
pub struct Pipeline {
    config: FlowConfig,
    metrics: Arc<dyn MetricsSink>,
    elements: Mutex<Vec<RunningElement>>,
}

impl Pipeline {
    pub fn new(config: FlowConfig) -> Self {
        Self::with_metrics(config, Arc::new(NoopMetrics))
    }

    pub fn with_metrics(config: FlowConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            config,
            metrics,
            elements: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Spawn `element` under `id`.
    pub fn add_element(&self, id: &str, element: impl Element) -> Result<ElementHandle> {
        let id = ElementId::from_string(id).map_err(StreamError::Configuration)?;
        let mut elements = self.elements.lock();
        if elements.iter().any(|running| running.handle.id() == &id) {
            return Err(StreamError::Configuration(format!(
                "element {} already exists",
                id
            )));
        }

        let (handle, thread) = spawn_element(
            id.clone(),
            Box::new(element),
            self.config.clone(),
            Arc::clone(&self.metrics),
        )?;
        elements.push(RunningElement {
            handle: handle.clone(),
            thread: Some(thread),
        });
        tracing::debug!("Added element {}", id);
        Ok(handle)
    }

    pub fn handle(&self, id: &str) -> Result<ElementHandle> {
        self.elements
            .lock()
            .iter()
            .find(|running| running.handle.id().as_str() == id)
            .map(|running| running.handle.clone())
            .ok_or_else(|| StreamError::UnknownElement(id.to_string()))
    }

    /// Link `output_element`'s `output_pad` to `input_element`'s `input_pad`
    /// with default link props.
    ///
    /// Pads are given as [`PadRef`]s or as `name` / `name[id]` strings.
    pub fn link<O, I>(
        &self,
        output_element: &str,
        output_pad: O,
        input_element: &str,
        input_pad: I,
    ) -> std::result::Result<(), LinkError>
    where
        O: TryInto<PadRef>,
        I: TryInto<PadRef>,
        StreamError: From<O::Error> + From<I::Error>,
    {
        self.link_with_props(
            output_element,
            output_pad,
            LinkProps::default(),
            input_element,
            input_pad,
            LinkProps::default(),
        )
    }

    /// Link two pads. The output side runs the handshake with the input side.
    ///
    /// Recoverable errors leave both elements running. A link the input
    /// element rejects comes back as [`LinkError::NeighborRefused`]; only the
    /// element whose configuration was at fault is terminated.
    pub fn link_with_props<O, I>(
        &self,
        output_element: &str,
        output_pad: O,
        output_props: LinkProps,
        input_element: &str,
        input_pad: I,
        input_props: LinkProps,
    ) -> std::result::Result<(), LinkError>
    where
        O: TryInto<PadRef>,
        I: TryInto<PadRef>,
        StreamError: From<O::Error> + From<I::Error>,
    {
        let output_pad: PadRef = output_pad.try_into().map_err(StreamError::from)?;
        let input_pad: PadRef = input_pad.try_into().map_err(StreamError::from)?;
        let output = self.handle(output_element)?;
        let input = self.handle(input_element)?;
        let peer = PadEndpoint::new(input, input_pad, input_props);

        tracing::info!(
            "Linking {}:{} -> {}:{}",
            output.id(),
            output_pad,
            peer.element.id(),
            peer.pad
        );

        // The output side waits up to one link timeout on the input side.
        let timeout = self.config.link_call_timeout() * 2;
        match output.call(
            |reply| ElementMessage::Link {
                direction: PadDirection::Output,
                pad: output_pad,
                props: output_props,
                peer,
                reply,
            },
            timeout,
        ) {
            Ok(result) => result,
            Err(CallError::CallFailure(reason)) => {
                tracing::warn!("Link failed: {}", reason);
                Err(LinkError::NeighborDead(output.id().to_string()))
            }
            Err(CallError::ChildDead(reason)) => {
                tracing::warn!("Link failed: {}", reason);
                Err(LinkError::NeighborChildDead(output.id().to_string()))
            }
        }
    }

    pub fn unlink<P>(&self, element: &str, pad: P) -> Result<()>
    where
        P: TryInto<PadRef>,
        StreamError: From<P::Error>,
    {
        let pad: PadRef = pad.try_into()?;
        let handle = self.handle(element)?;
        handle
            .call(
                |reply| ElementMessage::Unlink { pad, reply },
                self.config.link_call_timeout(),
            )
            .map_err(|e| StreamError::Runtime(format!("unlink on {}: {}", element, e)))?
    }

    /// Start playback of every element.
    pub fn play(&self) {
        for running in self.elements.lock().iter() {
            if !running.handle.send(ElementMessage::Play) {
                tracing::warn!("Element {} is not running, cannot play", running.handle.id());
            }
        }
    }

    /// Deliver `notification` to the element's `handle_notification`.
    pub fn notify(&self, element: &str, notification: serde_json::Value) -> Result<()> {
        let handle = self.handle(element)?;
        if handle.send(ElementMessage::Notify { notification }) {
            Ok(())
        } else {
            Err(StreamError::Runtime(format!("element {} is not running", element)))
        }
    }

    /// Snapshot of an element's pads and demand bookkeeping.
    pub fn inspect(&self, element: &str) -> Result<ElementSnapshot> {
        let handle = self.handle(element)?;
        handle
            .call(
                |reply| ElementMessage::Inspect { reply },
                self.config.link_call_timeout(),
            )
            .map_err(|e| StreamError::Runtime(format!("inspect of {}: {}", element, e)))
    }

    /// Whether the element's thread is still running.
    pub fn is_running(&self, element: &str) -> bool {
        self.elements
            .lock()
            .iter()
            .find(|running| running.handle.id().as_str() == element)
            .and_then(|running| running.thread.as_ref())
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Terminate one element and wait for its thread.
    pub fn terminate_element(&self, element: &str) -> Result<()> {
        let running = {
            let mut elements = self.elements.lock();
            let index = elements
                .iter()
                .position(|running| running.handle.id().as_str() == element)
                .ok_or_else(|| StreamError::UnknownElement(element.to_string()))?;
            elements.remove(index)
        };
        shutdown(running);
        Ok(())
    }

    /// Terminate every element and wait for their threads.
    pub fn terminate(&self) {
        let elements: Vec<RunningElement> = self.elements.lock().drain(..).collect();
        if elements.is_empty() {
            return;
        }
        tracing::info!("Terminating {} elements", elements.len());
        for running in &elements {
            running.handle.send(ElementMessage::Terminate);
        }
        for running in elements {
            join(running);
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn shutdown(running: RunningElement) {
    running.handle.send(ElementMessage::Terminate);
    join(running);
}

fn join(mut running: RunningElement) {
    let Some(thread) = running.thread.take() else {
        return;
    };
    if thread.join().is_err() {
        tracing::warn!("Element {} panicked", running.handle.id());
    }
}
