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
use restate_sdk_types::journal::{Entry, GetStateResult};
use restate_sdk_types::payload::Utf8StringCodec;
use test_log::test;

#[test]
fn get_empty() {
    let output = run_test(
        |ctx, _input| async move {
            let state = ctx.get("STATE", &Utf8StringCodec).await?;
            Ok(Bytes::from(state.is_none().to_string()))
        },
        vec![start_message(1), input_message("till")],
    );

    // The complete (non-partial) state map answers the miss locally with a
    // synthesized empty get entry.
    assert_eq!(
        output,
        vec![
            ProtocolMessage::Entry(Entry::get_state(
                Bytes::from_static(b"STATE"),
                Some(GetStateResult::Empty)
            )),
            output_message("true")
        ]
    );
}

#[test]
fn get_with_eager_hit() {
    let output = run_test(
        |ctx, _input| async move {
            let state = ctx
                .get("STATE", &Utf8StringCodec)
                .await?
                .expect("the eager state carries the key");
            Ok(Bytes::from(state))
        },
        vec![
            start_message_with_state(1, vec![("STATE", "hello")]),
            input_message("till"),
        ],
    );

    assert_eq!(
        output,
        vec![
            get_state_message_with_value("STATE", "hello"),
            output_message("hello")
        ]
    );
}

#[test]
fn get_append_and_get() {
    let output = run_test(
        |ctx, input| async move {
            let old = ctx
                .get("STATE", &Utf8StringCodec)
                .await?
                .expect("the eager state carries the key");
            let appended = old + &String::from_utf8_lossy(&input);
            ctx.set("STATE", &Utf8StringCodec, &appended).await?;

            let new = ctx
                .get("STATE", &Utf8StringCodec)
                .await?
                .expect("the key was just written");
            Ok(Bytes::from(new))
        },
        vec![
            start_message_with_state(1, vec![("STATE", "hello ")]),
            input_message("till"),
        ],
    );

    // The second get reads a locally written key: no journal entry for it.
    assert_eq!(
        output,
        vec![
            get_state_message_with_value("STATE", "hello "),
            set_state_message("STATE", "hello till"),
            output_message("hello till")
        ]
    );
}

#[test]
fn get_clear_and_get() {
    let output = run_test(
        |ctx, _input| async move {
            let old = ctx
                .get("STATE", &Utf8StringCodec)
                .await?
                .expect("the eager state carries the key");
            ctx.clear("STATE").await?;
            assert!(ctx.get("STATE", &Utf8StringCodec).await?.is_none());
            Ok(Bytes::from(old))
        },
        vec![
            start_message_with_state(1, vec![("STATE", "hello")]),
            input_message("till"),
        ],
    );

    assert_eq!(
        output,
        vec![
            get_state_message_with_value("STATE", "hello"),
            clear_state_message("STATE"),
            output_message("hello")
        ]
    );
}

#[test]
fn partial_state_miss_goes_to_the_runtime() {
    let output = run_test(
        |ctx, _input| async move {
            let state = ctx
                .get("STATE", &Utf8StringCodec)
                .await?
                .expect("the runtime answers the get");
            Ok(Bytes::from(state))
        },
        vec![
            start_message_with_partial_state(1, vec![]),
            input_message("till"),
            completion_message(1, "from-runtime"),
        ],
    );

    assert_eq!(
        output,
        vec![
            get_state_message("STATE"),
            output_message("from-runtime")
        ]
    );
}

#[test]
fn partial_state_hit_resolves_locally() {
    let output = run_test(
        |ctx, _input| async move {
            let state = ctx
                .get("STATE", &Utf8StringCodec)
                .await?
                .expect("the partial eager state carries the key");
            Ok(Bytes::from(state))
        },
        vec![
            start_message_with_partial_state(1, vec![("STATE", "hello")]),
            input_message("till"),
        ],
    );

    assert_eq!(
        output,
        vec![
            get_state_message_with_value("STATE", "hello"),
            output_message("hello")
        ]
    );
}

#[test]
fn replayed_get_feeds_the_cache() {
    // First op replays a completed get; the second get for the same key is
    // then served from the cache, producing a synthesized entry.
    let output = run_test(
        |ctx, _input| async move {
            let first = ctx
                .get("STATE", &Utf8StringCodec)
                .await?
                .expect("the journal carries the value");
            let second = ctx
                .get("STATE", &Utf8StringCodec)
                .await?
                .expect("the cache carries the value");
            assert_eq!(first, second);
            Ok(Bytes::from(second))
        },
        vec![
            start_message_with_partial_state(2, vec![]),
            input_message("till"),
            get_state_message_with_value("STATE", "hello"),
        ],
    );

    assert_eq!(
        output,
        vec![
            get_state_message_with_value("STATE", "hello"),
            output_message("hello")
        ]
    );
}
