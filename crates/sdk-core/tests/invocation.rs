// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod common;

use common::*;

use bytes::Bytes;
use restate_sdk_protocol::message::ProtocolMessage;
use restate_sdk_types::journal::{Entry, EntryResult, InvokeRequest};
use test_log::test;

#[test]
fn echo_input() {
    let output = run_test(
        |_ctx, input| async move { Ok(input) },
        vec![start_message(1), input_message("till")],
    );

    assert_eq!(output, vec![output_message("till")]);
}

#[test]
fn reset_counter() {
    let output = run_test(
        |ctx, _input| async move {
            ctx.clear("total").await?;
            Ok(Bytes::new())
        },
        vec![start_message(1), input_message("counter-request")],
    );

    assert_eq!(
        output,
        vec![clear_state_message("total"), output_message("")]
    );
}

#[test]
fn journal_indices_are_contiguous() {
    let output = run_test(
        |ctx, _input| async move {
            ctx.clear("a").await?;
            ctx.clear("b").await?;
            ctx.one_way_call(InvokeRequest::new("Greeter", "greet", Bytes::new()))?;
            Ok(Bytes::new())
        },
        vec![start_message(1), input_message("in")],
    );

    // Input is index 0; the emitted entries cover indices 1, 2, 3 followed by
    // the output entry.
    assert_eq!(output.len(), 4);
    assert_eq!(output[0], clear_state_message("a"));
    assert_eq!(output[1], clear_state_message("b"));
    assert!(matches!(
        &output[2],
        ProtocolMessage::Entry(Entry::BackgroundInvoke(_))
    ));
    assert_eq!(output[3], output_message(""));
}

#[test]
fn replaying_own_journal_produces_no_entries() {
    let handler = |ctx: restate_sdk_core::Context, _input: Bytes| async move {
        ctx.clear("a").await?;
        ctx.clear("b").await?;
        Ok(Bytes::from_static(b"done"))
    };

    // First attempt journals everything.
    let first = run_test(handler, vec![start_message(1), input_message("in")]);
    assert_eq!(
        first,
        vec![
            clear_state_message("a"),
            clear_state_message("b"),
            output_message("done")
        ]
    );

    // Replaying the full journal (input + both entries + output) emits
    // nothing: the handler deterministically re-issues the same operations
    // and they are all served from the journal.
    let second = run_test(
        handler,
        vec![
            start_message(4),
            input_message("in"),
            clear_state_message("a"),
            clear_state_message("b"),
            ProtocolMessage::Entry(Entry::output_stream(EntryResult::Success(
                Bytes::from_static(b"done"),
            ))),
        ],
    );
    assert_eq!(second, vec![]);
}

#[test]
fn delayed_call_carries_invoke_time() {
    let output = run_test(
        |ctx, _input| async move {
            ctx.delayed_call(
                InvokeRequest::new("Greeter", "greet", Bytes::new()),
                std::time::Duration::from_secs(60),
            )?;
            Ok(Bytes::new())
        },
        vec![start_message(1), input_message("in")],
    );

    assert_eq!(output.len(), 2);
    match &output[0] {
        ProtocolMessage::Entry(Entry::BackgroundInvoke(e)) => {
            assert!(e.invoke_time > 0, "delayed calls carry a future timestamp");
        }
        other => panic!("expected a background invoke entry, got {other:?}"),
    }
}

#[test]
fn handler_error_after_close_is_ignored() {
    // The handler issues an operation that trips a journal mismatch, then
    // swallows the error and returns a value. The engine must keep the error
    // close, not emit an output entry.
    let output = run_test(
        |ctx, _input| async move {
            let _ = ctx.clear("not-the-journalled-key").await;
            Ok(Bytes::from_static(b"should never surface"))
        },
        vec![
            start_message(2),
            input_message("in"),
            clear_state_message("journalled-key"),
        ],
    );

    assert_eq!(output.len(), 1);
    assert_error_message(&output[0], JOURNAL_MISMATCH_CODE);
}
