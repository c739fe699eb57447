// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Test driver for the invocation engine: build the inbound message
//! sequence, run a handler against it, decode and assert on the outbound
//! messages.

#![allow(dead_code)]

use bytes::{Bytes, BytesMut};
use restate_sdk_core::{Context, HandlerResult, InvocationEngine, Options, ServiceRegistry};
use restate_sdk_protocol::message::{Decoder, Encoder, ProtocolMessage};
use restate_sdk_types::errors::UserErrorCode;
use restate_sdk_types::identifiers::InvocationTarget;
use restate_sdk_types::journal::{
    Completion, CompletionResult, Entry, EntryResult, GetStateResult,
};
use std::future::Future;

pub const GREETER_SERVICE: &str = "Greeter";
pub const GREET_METHOD: &str = "greet";

/// Runs `handler` against the given inbound messages, delivered as a single
/// chunk, and returns the decoded outbound messages.
pub fn run_test<F, Fut>(handler: F, input: Vec<ProtocolMessage>) -> Vec<ProtocolMessage>
where
    F: Fn(Context, Bytes) -> Fut + 'static,
    Fut: Future<Output = HandlerResult> + 'static,
{
    run_test_chunked(handler, vec![input])
}

/// Like [`run_test`], with explicit control over chunk boundaries: the
/// engine evaluates suspension at the end of each chunk.
pub fn run_test_chunked<F, Fut>(
    handler: F,
    chunks: Vec<Vec<ProtocolMessage>>,
) -> Vec<ProtocolMessage>
where
    F: Fn(Context, Bytes) -> Fut + 'static,
    Fut: Future<Output = HandlerResult> + 'static,
{
    let mut registry = ServiceRegistry::new();
    registry.register(GREETER_SERVICE, GREET_METHOD, handler);

    let mut engine = InvocationEngine::from_registry(
        &registry,
        InvocationTarget::new(GREETER_SERVICE, GREET_METHOD),
        &Options::default(),
    )
    .expect("the handler is registered");

    let encoder = Encoder::new();
    for chunk in chunks {
        let mut buf = BytesMut::new();
        for msg in chunk {
            buf.extend_from_slice(&encoder.encode(msg));
        }
        engine.push_input(buf.freeze());
    }

    let mut decoder = Decoder::default();
    while let Some(frame) = engine.poll_output() {
        decoder.push(frame);
    }
    let mut output = vec![];
    while let Some((_, msg)) = decoder.consume_next().expect("output frames are well formed") {
        output.push(msg);
    }
    output
}

// --- Inbound message builders

pub fn start_message(known_entries: u32) -> ProtocolMessage {
    start_message_with_state(known_entries, vec![])
}

pub fn start_message_with_state(
    known_entries: u32,
    state: Vec<(&'static str, &'static str)>,
) -> ProtocolMessage {
    ProtocolMessage::new_start_message(
        Bytes::from_static(b"abc-123"),
        "inv-debug-id".to_owned(),
        known_entries,
        false,
        state
            .into_iter()
            .map(|(k, v)| (Bytes::from_static(k.as_bytes()), Bytes::from_static(v.as_bytes()))),
    )
}

pub fn start_message_with_partial_state(
    known_entries: u32,
    state: Vec<(&'static str, &'static str)>,
) -> ProtocolMessage {
    ProtocolMessage::new_start_message(
        Bytes::from_static(b"abc-123"),
        "inv-debug-id".to_owned(),
        known_entries,
        true,
        state
            .into_iter()
            .map(|(k, v)| (Bytes::from_static(k.as_bytes()), Bytes::from_static(v.as_bytes()))),
    )
}

pub fn input_message(value: &'static str) -> ProtocolMessage {
    Entry::poll_input_stream(value.as_bytes()).into()
}

pub fn get_state_message(key: &'static str) -> ProtocolMessage {
    Entry::get_state(Bytes::from_static(key.as_bytes()), None).into()
}

pub fn get_state_message_with_value(key: &'static str, value: &'static str) -> ProtocolMessage {
    Entry::get_state(
        Bytes::from_static(key.as_bytes()),
        Some(GetStateResult::Result(Bytes::from_static(value.as_bytes()))),
    )
    .into()
}

pub fn set_state_message(key: &'static str, value: &'static str) -> ProtocolMessage {
    Entry::set_state(
        Bytes::from_static(key.as_bytes()),
        Bytes::from_static(value.as_bytes()),
    )
    .into()
}

pub fn clear_state_message(key: &'static str) -> ProtocolMessage {
    Entry::clear_state(Bytes::from_static(key.as_bytes())).into()
}

pub fn side_effect_message(value: &'static str) -> ProtocolMessage {
    Entry::side_effect(EntryResult::Success(Bytes::from_static(value.as_bytes()))).into()
}

pub fn completion_message(entry_index: u32, value: &'static str) -> ProtocolMessage {
    Completion::new(
        entry_index,
        CompletionResult::Success(Bytes::from_static(value.as_bytes())),
    )
    .into()
}

pub fn empty_completion_message(entry_index: u32) -> ProtocolMessage {
    Completion::new(entry_index, CompletionResult::Empty).into()
}

pub fn failure_completion_message(
    entry_index: u32,
    code: UserErrorCode,
    message: &'static str,
) -> ProtocolMessage {
    Completion::new(
        entry_index,
        CompletionResult::Failure(code, message.into()),
    )
    .into()
}

pub fn ack_message(entry_index: u32) -> ProtocolMessage {
    ProtocolMessage::new_entry_ack(entry_index)
}

// --- Outbound message assertions

pub fn output_message(value: &'static str) -> ProtocolMessage {
    Entry::output_stream(EntryResult::Success(Bytes::from_static(value.as_bytes()))).into()
}

pub fn output_failure_message(code: UserErrorCode, message: &'static str) -> ProtocolMessage {
    Entry::output_stream(EntryResult::Failure(code, message.into())).into()
}

/// Asserts the message is an `ErrorMessage` with the given code, returning
/// its message text for further checks.
pub fn assert_error_message(msg: &ProtocolMessage, expected_code: u16) -> String {
    match msg {
        ProtocolMessage::Error(e) => {
            assert_eq!(
                e.code, expected_code as u32,
                "unexpected error code in {e:?}"
            );
            e.message.clone()
        }
        other => panic!("expected an error message, got {other:?}"),
    }
}

pub fn assert_suspension_message(msg: &ProtocolMessage, expected_indexes: &[u32]) {
    match msg {
        ProtocolMessage::Suspension(s) => {
            assert_eq!(s.entry_indexes, expected_indexes, "unexpected suspension set")
        }
        other => panic!("expected a suspension message, got {other:?}"),
    }
}

/// Codes the engine reports in `ErrorMessage`s.
pub const INTERNAL_CODE: u16 = 500;
pub const JOURNAL_MISMATCH_CODE: u16 = 570;
pub const PROTOCOL_VIOLATION_CODE: u16 = 571;
