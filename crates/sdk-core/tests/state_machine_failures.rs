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
use restate_sdk_types::payload::{PayloadCodec, PayloadCodecError, Utf8StringCodec};
use test_log::test;

#[test]
fn journal_mismatch() {
    let output = run_test(
        |ctx, _input| async move {
            let state = ctx.get("STATE", &Utf8StringCodec).await?;
            Ok(Bytes::from(state.unwrap_or_default()))
        },
        vec![
            start_message(2),
            input_message("till"),
            get_state_message("other"),
        ],
    );

    assert_eq!(output.len(), 1);
    assert_error_message(&output[0], JOURNAL_MISMATCH_CODE);
}

#[test]
fn journal_type_mismatch() {
    let output = run_test(
        |ctx, _input| async move {
            ctx.clear("STATE").await?;
            Ok(Bytes::new())
        },
        vec![
            start_message(2),
            input_message("till"),
            set_state_message("STATE", "value"),
        ],
    );

    assert_eq!(output.len(), 1);
    assert_error_message(&output[0], JOURNAL_MISMATCH_CODE);
}

#[test]
fn replayed_state_deserialization_failure_is_retryable() {
    struct IntCodec;
    impl PayloadCodec<i32> for IntCodec {
        fn serialize(&self, value: &i32) -> Result<Bytes, PayloadCodecError> {
            Ok(Bytes::from(value.to_string()))
        }

        fn deserialize(&self, bytes: Bytes) -> Result<i32, PayloadCodecError> {
            String::from_utf8(bytes.to_vec())
                .map_err(PayloadCodecError::new)?
                .parse()
                .map_err(PayloadCodecError::new)
        }
    }

    let output = run_test(
        |ctx, _input| async move {
            let count = ctx.get("STATE", &IntCodec).await?.unwrap_or_default();
            Ok(Bytes::from(count.to_string()))
        },
        vec![
            start_message(2),
            input_message("till"),
            get_state_message_with_value("STATE", "this is not an integer"),
        ],
    );

    assert_eq!(output.len(), 1);
    assert_error_message(&output[0], INTERNAL_CODE);
}

#[test]
fn side_effect_serialization_failure_is_retryable() {
    struct FailingCodec;
    impl PayloadCodec<i32> for FailingCodec {
        fn serialize(&self, _value: &i32) -> Result<Bytes, PayloadCodecError> {
            Err(PayloadCodecError::new(anyhow::anyhow!(
                "cannot serialize integer"
            )))
        }

        fn deserialize(&self, _bytes: Bytes) -> Result<i32, PayloadCodecError> {
            unreachable!()
        }
    }

    let output = run_test(
        |ctx, _input| async move {
            let value = ctx.side_effect(&FailingCodec, || Ok(42)).await?;
            Ok(Bytes::from(value.to_string()))
        },
        vec![start_message(1), input_message("till")],
    );

    // Serialization happens before the entry is recorded, so no side effect
    // entry is emitted.
    assert_eq!(output.len(), 1);
    let message = assert_error_message(&output[0], INTERNAL_CODE);
    assert!(
        message.contains("cannot serialize integer"),
        "unexpected message: {message}"
    );
}

#[test]
fn duplicate_completion_with_different_result() {
    let output = run_test(
        |ctx, _input| async move {
            let call = ctx.call(restate_sdk_types::journal::InvokeRequest::new(
                "Greeter",
                "greet",
                Bytes::new(),
            ))?;
            let response = call.await?;
            Ok(response)
        },
        vec![
            start_message(1),
            input_message("till"),
            completion_message(1, "first"),
            completion_message(1, "second"),
        ],
    );

    // The conflicting duplicate is detected while buffering, before the
    // handler even starts.
    assert_eq!(output.len(), 1);
    assert_error_message(&output[0], INTERNAL_CODE);
}

#[test]
fn unexpected_start_message() {
    let output = run_test(
        |_ctx, _input| async move { Ok(Bytes::new()) },
        vec![start_message(1), start_message(1)],
    );

    assert_eq!(output.len(), 1);
    assert_error_message(&output[0], PROTOCOL_VIOLATION_CODE);
}
