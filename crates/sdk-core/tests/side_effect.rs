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
use googletest::assert_that;
use googletest::matchers::contains_substring;
use restate_sdk_core::HandlerError;
use restate_sdk_types::errors::UserErrorCode;
use restate_sdk_types::journal::InvokeRequest;
use restate_sdk_types::payload::Utf8StringCodec;
use std::cell::Cell;
use std::rc::Rc;
use test_log::test;

#[test]
fn side_effect() {
    let output = run_test(
        |ctx, _input| async move {
            let result = ctx
                .side_effect(&Utf8StringCodec, || Ok("hello".to_owned()))
                .await?;
            Ok(Bytes::from(format!("Hello {result}")))
        },
        vec![start_message(1), input_message("till"), ack_message(1)],
    );

    assert_eq!(
        output,
        vec![side_effect_message("hello"), output_message("Hello hello")]
    );
}

#[test]
fn consecutive_side_effects() {
    let output = run_test(
        |ctx, _input| async move {
            let first = ctx
                .side_effect(&Utf8StringCodec, || Ok("hello".to_owned()))
                .await?;
            let second = ctx
                .side_effect(&Utf8StringCodec, move || Ok(first.to_uppercase()))
                .await?;
            Ok(Bytes::from(second))
        },
        vec![
            start_message(1),
            input_message("till"),
            ack_message(1),
            ack_message(2),
        ],
    );

    assert_eq!(
        output,
        vec![
            side_effect_message("hello"),
            side_effect_message("HELLO"),
            output_message("HELLO")
        ]
    );
}

#[test]
fn unacked_side_effect_suspends() {
    let output = run_test(
        |ctx, _input| async move {
            let result = ctx
                .side_effect(&Utf8StringCodec, || Ok("hello".to_owned()))
                .await?;
            Ok(Bytes::from(result))
        },
        vec![start_message(1), input_message("till")],
    );

    assert_eq!(output.len(), 2);
    assert_eq!(output[0], side_effect_message("hello"));
    assert_suspension_message(&output[1], &[1]);
}

#[test]
fn replayed_side_effect_does_not_execute() {
    let executions = Rc::new(Cell::new(0));
    let executions_in_handler = executions.clone();

    let output = run_test(
        move |ctx, _input| {
            let executions = executions_in_handler.clone();
            async move {
                let result = ctx
                    .side_effect(&Utf8StringCodec, move || {
                        executions.set(executions.get() + 1);
                        Ok("fresh".to_owned())
                    })
                    .await?;
                Ok(Bytes::from(result))
            }
        },
        vec![
            start_message(2),
            input_message("till"),
            side_effect_message("recorded"),
        ],
    );

    assert_eq!(executions.get(), 0, "a replayed side effect must not run");
    assert_eq!(output, vec![output_message("recorded")]);
}

#[test]
fn side_effect_guard() {
    let output = run_test(
        |ctx, _input| async move {
            let inner = ctx.clone();
            ctx.side_effect(&Utf8StringCodec, move || {
                inner.one_way_call(InvokeRequest::new("Greeter", "greet", Bytes::new()))?;
                Ok("unreachable".to_owned())
            })
            .await?;
            unreachable!("the guard aborts the invocation");
        },
        vec![start_message(1), input_message("till")],
    );

    // No side effect entry is recorded; the stream closes with an error.
    assert_eq!(output.len(), 1);
    let message = assert_error_message(&output[0], INTERNAL_CODE);
    assert_that!(message, contains_substring("side effect"));
}

#[test]
fn side_effect_terminal_failure() {
    let nonterminal_seen = Rc::new(Cell::new(false));
    let flag = nonterminal_seen.clone();

    let output = run_test(
        move |ctx, _input| {
            let flag = flag.clone();
            async move {
                let result: Result<String, HandlerError> = ctx
                    .side_effect(&Utf8StringCodec, || {
                        Err(HandlerError::terminal(UserErrorCode::Internal, "my error"))
                    })
                    .await;
                if result.is_err() && result.as_ref().err().unwrap().as_terminal().is_none() {
                    flag.set(true);
                }
                result.map(Bytes::from)
            }
        },
        vec![start_message(1), input_message("till"), ack_message(1)],
    );

    assert!(!nonterminal_seen.get(), "the failure surfaces as terminal");
    assert_eq!(output.len(), 2);
    assert_eq!(
        output[0],
        restate_sdk_types::journal::Entry::side_effect(
            restate_sdk_types::journal::EntryResult::Failure(
                UserErrorCode::Internal,
                "my error".into()
            )
        )
        .into()
    );
    assert_eq!(
        output[1],
        output_failure_message(UserErrorCode::Internal, "my error")
    );
}

#[test]
fn side_effect_retryable_failure() {
    let output = run_test(
        |ctx, _input| async move {
            let result = ctx
                .side_effect(&Utf8StringCodec, || {
                    Err(HandlerError::from(anyhow::anyhow!("boom")))
                })
                .await?;
            Ok(Bytes::from(result))
        },
        vec![start_message(1), input_message("till")],
    );

    // No side effect entry; the invocation closes for the runtime to retry.
    assert_eq!(output.len(), 1);
    let message = assert_error_message(&output[0], INTERNAL_CODE);
    assert!(message.contains("boom"), "unexpected message: {message}");
}

#[test]
fn side_effect_replay_deserialization_failure_is_retryable() {
    struct FailingCodec;
    impl restate_sdk_types::payload::PayloadCodec<String> for FailingCodec {
        fn serialize(
            &self,
            value: &String,
        ) -> Result<Bytes, restate_sdk_types::payload::PayloadCodecError> {
            Ok(Bytes::from(value.clone()))
        }

        fn deserialize(
            &self,
            _bytes: Bytes,
        ) -> Result<String, restate_sdk_types::payload::PayloadCodecError> {
            Err(restate_sdk_types::payload::PayloadCodecError::new(
                anyhow::anyhow!("cannot deserialize"),
            ))
        }
    }

    let output = run_test(
        |ctx, _input| async move {
            let result = ctx
                .side_effect(&FailingCodec, || Ok("whatever".to_owned()))
                .await?;
            Ok(Bytes::from(result))
        },
        vec![
            start_message(2),
            input_message("till"),
            side_effect_message("recorded"),
        ],
    );

    assert_eq!(output.len(), 1);
    let message = assert_error_message(&output[0], INTERNAL_CODE);
    assert!(
        message.contains("cannot deserialize"),
        "unexpected message: {message}"
    );
}
