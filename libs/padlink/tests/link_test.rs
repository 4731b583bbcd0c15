// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Link handshake, unlink and their failure modes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Probe, WAIT, count, pad, wait_for_snapshot, wait_until};
use padlink::core::element::ElementMessage;
use padlink::core::{
    FlowConfig, InMemoryMetrics, LinkError, PadRef, PadSpec, Pipeline, StreamError, StreamFormat,
};
use serde_json::json;

fn mixer_pipeline(metrics: Arc<InMemoryMetrics>) -> (Pipeline, common::Events) {
    let pipeline = Pipeline::with_metrics(FlowConfig::default(), metrics);
    pipeline
        .add_element("source", Probe::source(PadSpec::output("output")))
        .unwrap();
    let mixer = Probe::new(vec![
        PadSpec::input("input").on_request(),
        PadSpec::output("output").manual(),
    ]);
    let events = mixer.events();
    pipeline.add_element("mixer", mixer).unwrap();
    pipeline
        .add_element("sink", Probe::sink(PadSpec::input("input")))
        .unwrap();
    pipeline.link("mixer", "output", "sink", "input").unwrap();
    (pipeline, events)
}

// =============================================================================
// Unlink
// =============================================================================

#[test]
fn test_unlink_purges_dynamic_pad_bookkeeping() {
    let metrics = Arc::new(InMemoryMetrics::new());
    let (pipeline, events) = mixer_pipeline(Arc::clone(&metrics));
    let pad_ref = PadRef::dynamic("input", 7);

    pipeline.link("source", "output", "mixer", pad_ref.clone()).unwrap();
    let mixer = pipeline.inspect("mixer").unwrap();
    assert!(mixer.references_pad("input[7]"));
    assert!(metrics.has_pad("mixer", "input[7]"));
    assert_eq!(metrics.value("mixer", "input[7]", "buffers_received"), Some(0));

    pipeline.unlink("mixer", pad_ref).unwrap();

    let mixer = pipeline.inspect("mixer").unwrap();
    assert!(!mixer.references_pad("input[7]"));
    assert!(mixer.pad("output").is_some());
    assert!(!metrics.has_pad("mixer", "input[7]"));
    assert_eq!(
        events.lock().clone(),
        vec!["pad_added input[7]", "pad_removed input[7]"]
    );
}

#[test]
fn test_double_unlink_of_dynamic_pad_is_noop() {
    let (pipeline, events) = mixer_pipeline(Arc::new(InMemoryMetrics::new()));
    let pad_ref = PadRef::dynamic("input", 1);
    pipeline.link("source", "output", "mixer", pad_ref.clone()).unwrap();

    pipeline.unlink("mixer", pad_ref.clone()).unwrap();
    let before = pipeline.inspect("mixer").unwrap();
    let events_before = events.lock().clone();

    pipeline.unlink("mixer", pad_ref).unwrap();
    let after = pipeline.inspect("mixer").unwrap();
    assert_eq!(
        serde_json::to_value(&before).unwrap(),
        serde_json::to_value(&after).unwrap()
    );
    assert_eq!(*events.lock(), events_before);
    assert!(pipeline.is_running("mixer"));
}

#[test]
fn test_unlink_while_playing_ends_the_stream() {
    let (pipeline, events) = mixer_pipeline(Arc::new(InMemoryMetrics::new()));
    let pad_ref = PadRef::dynamic("input", 1);
    pipeline.link("source", "output", "mixer", pad_ref.clone()).unwrap();
    pipeline.play();
    wait_for_snapshot(&pipeline, "mixer", |s| {
        s.playback == padlink::PlaybackState::Playing
    });

    pipeline.unlink("mixer", pad_ref).unwrap();
    let pad_events: Vec<String> = events
        .lock()
        .iter()
        .filter(|event| event.ends_with("input[1]"))
        .cloned()
        .collect();
    assert_eq!(
        pad_events,
        vec![
            "pad_added input[1]",
            "end_of_stream input[1]",
            "pad_removed input[1]"
        ]
    );
}

#[test]
fn test_static_pad_unlink_mid_pipeline_is_fatal() {
    let (pipeline, _events) = mixer_pipeline(Arc::new(InMemoryMetrics::new()));

    let err = pipeline.unlink("sink", "input").unwrap_err();
    assert!(matches!(err, StreamError::StaticPadUnlink(_)), "{:?}", err);
    assert!(err.is_fatal());
    assert!(wait_until(WAIT, || !pipeline.is_running("sink")));
    assert!(pipeline.is_running("mixer"));
}

#[test]
fn test_terminate_unlinks_static_pads() {
    let metrics = Arc::new(InMemoryMetrics::new());
    let (pipeline, _events) = mixer_pipeline(Arc::clone(&metrics));
    assert!(metrics.has_pad("sink", "input"));

    pipeline.terminate_element("sink").unwrap();
    assert!(!metrics.has_pad("sink", "input"));
}

// =============================================================================
// Handshake failures
// =============================================================================

#[test]
fn test_link_to_terminated_element_is_neighbor_dead() {
    let pipeline = Pipeline::new(FlowConfig::default());
    pipeline
        .add_element("source", Probe::source(PadSpec::output("output")))
        .unwrap();
    let sink = pipeline
        .add_element("sink", Probe::sink(PadSpec::input("input")))
        .unwrap();

    assert!(sink.send(ElementMessage::Terminate));
    assert!(wait_until(WAIT, || !pipeline.is_running("sink")));

    let err = pipeline.link("source", "output", "sink", "input").unwrap_err();
    assert!(matches!(err, LinkError::NeighborDead(ref id) if id == "sink"), "{:?}", err);
    assert!(err.is_recoverable());

    let source = pipeline.inspect("source").unwrap();
    assert!(source.pads.is_empty());
}

#[test]
fn test_link_to_crashing_element_is_neighbor_child_dead() {
    let pipeline = Pipeline::new(FlowConfig::default());
    pipeline
        .add_element("source", Probe::source(PadSpec::output("output")))
        .unwrap();
    pipeline
        .add_element(
            "sink",
            Probe::sink(PadSpec::input("input").on_request()).panicking_on_pad_added(),
        )
        .unwrap();

    let err = pipeline
        .link("source", "output", "sink", PadRef::dynamic("input", 1))
        .unwrap_err();
    assert!(matches!(err, LinkError::NeighborChildDead(_)), "{:?}", err);
    assert!(err.is_recoverable());

    let source = pipeline.inspect("source").unwrap();
    assert!(source.pads.is_empty());
    assert!(pipeline.is_running("source"));
}

#[test]
fn test_link_to_unknown_pad_is_recoverable() {
    let pipeline = Pipeline::new(FlowConfig::default());
    pipeline
        .add_element("source", Probe::source(PadSpec::output("output")))
        .unwrap();
    pipeline
        .add_element("sink", Probe::sink(PadSpec::input("input")))
        .unwrap();

    let err = pipeline.link("source", "output", "sink", "absent").unwrap_err();
    assert!(matches!(err, LinkError::UnknownPad(_)), "{:?}", err);
    assert!(pipeline.is_running("source"));
    assert!(pipeline.is_running("sink"));

    pipeline.link("source", "output", "sink", "input").unwrap();
    let source = pipeline.inspect("source").unwrap();
    assert_eq!(pad(&source, "output").link_id, "output:input");
}

#[test]
fn test_incompatible_link_terminates_only_input_element() {
    let pipeline = Pipeline::new(FlowConfig::default());
    pipeline
        .add_element(
            "source",
            Probe::source(PadSpec::output("output").push_only()),
        )
        .unwrap();
    pipeline
        .add_element("sink", Probe::sink(PadSpec::input("input").manual()))
        .unwrap();

    let err = pipeline.link("source", "output", "sink", "input").unwrap_err();
    assert!(
        matches!(
            &err,
            LinkError::NeighborRefused {
                element,
                source: StreamError::IncompatibleFlowControl(_),
            } if element == "sink"
        ),
        "{:?}",
        err
    );
    assert!(err.is_recoverable());
    assert!(wait_until(WAIT, || !pipeline.is_running("sink")));
    assert!(pipeline.is_running("source"));
    let source = pipeline.inspect("source").unwrap();
    assert!(source.pads.is_empty());
}

#[test]
fn test_timed_out_handshake_is_rolled_back_on_both_sides() {
    let config = FlowConfig {
        link_call_timeout_ms: 50,
        ..FlowConfig::default()
    };
    let metrics = Arc::new(InMemoryMetrics::new());
    let pipeline = Pipeline::with_metrics(config, Arc::<InMemoryMetrics>::clone(&metrics));
    pipeline
        .add_element("source", Probe::source(PadSpec::output("output")))
        .unwrap();
    let sink = Probe::sink(PadSpec::input("input").on_request())
        .delaying_pad_added(Duration::from_millis(300));
    let events = sink.events();
    pipeline.add_element("sink", sink).unwrap();

    let err = pipeline
        .link("source", "output", "sink", PadRef::dynamic("input", 1))
        .unwrap_err();
    assert!(
        matches!(&err, LinkError::NeighborDead(element) if element == "sink"),
        "{:?}",
        err
    );
    let source = pipeline.inspect("source").unwrap();
    assert!(source.pads.is_empty());
    assert!(!metrics.has_pad("source", "output"));

    // Inspect calls time out while the sink is still inside pad_added.
    assert!(wait_until(WAIT, || {
        pipeline
            .inspect("sink")
            .is_ok_and(|sink| !sink.references_pad("input[1]"))
    }));
    assert!(!metrics.has_pad("sink", "input[1]"));
    assert_eq!(
        events.lock().clone(),
        vec!["pad_added input[1]", "pad_removed input[1]"]
    );
    assert!(pipeline.is_running("source"));
    assert!(pipeline.is_running("sink"));
}

#[test]
fn test_linking_a_pad_twice_is_fatal() {
    let pipeline = Pipeline::new(FlowConfig::default());
    pipeline
        .add_element("source", Probe::source(PadSpec::output("output")))
        .unwrap();
    pipeline
        .add_element("sink", Probe::sink(PadSpec::input("input")))
        .unwrap();
    pipeline
        .add_element("other", Probe::sink(PadSpec::input("input")))
        .unwrap();
    pipeline.link("source", "output", "sink", "input").unwrap();

    let err = pipeline.link("source", "output", "other", "input").unwrap_err();
    assert!(
        matches!(err, LinkError::Fatal(StreamError::PadAlreadyLinked(_))),
        "{:?}",
        err
    );
    assert!(wait_until(WAIT, || !pipeline.is_running("source")));
}

// =============================================================================
// Stream formats
// =============================================================================

#[test]
fn test_rejected_stream_format_is_fatal_for_receiver() {
    let pipeline = Pipeline::new(FlowConfig::default());
    pipeline
        .add_element("source", Probe::source(PadSpec::output("output")))
        .unwrap();
    let sink = Probe::sink(
        PadSpec::input("input").accepts(|format: &StreamFormat| format.name == "video/raw"),
    );
    let events = sink.events();
    pipeline.add_element("sink", sink).unwrap();
    pipeline.link("source", "output", "sink", "input").unwrap();

    pipeline
        .notify("source", json!({"send": "output", "count": 1}))
        .unwrap();
    assert!(wait_until(WAIT, || !pipeline.is_running("sink")));
    assert_eq!(count(&events, "stream_format"), 0);
    assert!(pipeline.is_running("source"));
}
