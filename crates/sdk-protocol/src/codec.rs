// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::pb::{protocol, sdk};

use bytes::Bytes;
use prost::Message;
use restate_sdk_types::errors::UserErrorCode;
use restate_sdk_types::journal::{
    CompletableEntry, Entry, EntryResult, EntryType, GetStateResult, SleepResult,
};

#[derive(Debug, thiserror::Error)]
#[error("failed converting {entry_type} entry: {kind}")]
pub struct EntryCodecError {
    entry_type: EntryType,
    kind: ErrorKind,
}

impl EntryCodecError {
    pub(crate) fn new(entry_type: EntryType, kind: ErrorKind) -> Self {
        Self { entry_type, kind }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ErrorKind {
    #[error("cannot decode protobuf message: {source}")]
    Decode {
        #[source]
        source: prost::DecodeError,
    },
    #[error("missing field {0}")]
    MissingField(&'static str),
}

/// This macro generates the pattern matching with arms per entry.
/// For each entry it first executes `Message::decode` and then `try_into()`.
/// It expects that for each `{...}Entry` there is a valid `TryFrom<{...}Message>` implementation with `Error = &'static str`.
/// These implementations are available in [`super::pb_into`].
macro_rules! match_decode {
    ($ty:expr, $buf:expr, { $($variant:ident),* }) => {
        match $ty {
              $(EntryType::$variant { .. } => paste::paste! {
                  protocol::[<$variant EntryMessage>]::decode($buf)
                    .map_err(|e| EntryCodecError::new($ty, ErrorKind::Decode { source: e }))
                    .and_then(|msg| msg.try_into().map_err(|f| EntryCodecError::new($ty, ErrorKind::MissingField(f))))
              },)*
              EntryType::SideEffect => sdk::SideEffectEntryMessage::decode($buf)
                  .map_err(|e| EntryCodecError::new($ty, ErrorKind::Decode { source: e }))
                  .and_then(|msg| msg.try_into().map_err(|f| EntryCodecError::new($ty, ErrorKind::MissingField(f)))),
              EntryType::CombinatorAwaitable => sdk::CombinatorAwaitableEntryMessage::decode($buf)
                  .map_err(|e| EntryCodecError::new($ty, ErrorKind::Decode { source: e }))
                  .and_then(|msg| msg.try_into().map_err(|f| EntryCodecError::new($ty, ErrorKind::MissingField(f)))),
        }
    };
}

/// Converts between the materialized [`Entry`] model and protobuf-encoded
/// entry message bodies. Purely syntactic; completeness of an entry travels
/// in the body, the header flag is derived from it.
#[derive(Debug, Default, Copy, Clone)]
pub struct ProtobufEntryCodec;

impl ProtobufEntryCodec {
    pub fn deserialize(entry_type: EntryType, entry_value: Bytes) -> Result<Entry, EntryCodecError> {
        match_decode!(entry_type, entry_value, {
            PollInputStream,
            OutputStream,
            GetState,
            SetState,
            ClearState,
            Sleep,
            Invoke,
            BackgroundInvoke,
            Awakeable,
            CompleteAwakeable
        })
    }

    pub fn serialize(entry: &Entry) -> Bytes {
        match entry {
            Entry::PollInputStream(entry) => protocol::PollInputStreamEntryMessage {
                result: Some(match entry.result.clone() {
                    EntryResult::Success(value) => {
                        protocol::poll_input_stream_entry_message::Result::Value(value)
                    }
                    EntryResult::Failure(code, message) => {
                        protocol::poll_input_stream_entry_message::Result::Failure(to_failure(
                            code, &message,
                        ))
                    }
                }),
            }
            .encode_to_vec()
            .into(),
            Entry::OutputStream(entry) => protocol::OutputStreamEntryMessage {
                result: Some(match entry.result.clone() {
                    EntryResult::Success(value) => {
                        protocol::output_stream_entry_message::Result::Value(value)
                    }
                    EntryResult::Failure(code, message) => {
                        protocol::output_stream_entry_message::Result::Failure(to_failure(
                            code, &message,
                        ))
                    }
                }),
            }
            .encode_to_vec()
            .into(),
            Entry::GetState(entry) => protocol::GetStateEntryMessage {
                key: entry.key.clone(),
                result: entry.value.clone().map(|value| match value {
                    GetStateResult::Empty => protocol::get_state_entry_message::Result::Empty(()),
                    GetStateResult::Result(v) => protocol::get_state_entry_message::Result::Value(v),
                    GetStateResult::Failure(code, message) => {
                        protocol::get_state_entry_message::Result::Failure(to_failure(
                            code, &message,
                        ))
                    }
                }),
            }
            .encode_to_vec()
            .into(),
            Entry::SetState(entry) => protocol::SetStateEntryMessage {
                key: entry.key.clone(),
                value: entry.value.clone(),
            }
            .encode_to_vec()
            .into(),
            Entry::ClearState(entry) => protocol::ClearStateEntryMessage {
                key: entry.key.clone(),
            }
            .encode_to_vec()
            .into(),
            Entry::Sleep(entry) => protocol::SleepEntryMessage {
                wake_up_time: entry.wake_up_time,
                result: entry.result.clone().map(|result| match result {
                    SleepResult::Fired => protocol::sleep_entry_message::Result::Empty(()),
                    SleepResult::Failure(code, message) => {
                        protocol::sleep_entry_message::Result::Failure(to_failure(code, &message))
                    }
                }),
            }
            .encode_to_vec()
            .into(),
            Entry::Invoke(entry) => protocol::InvokeEntryMessage {
                service_name: entry.request.service_name.to_string(),
                method_name: entry.request.method_name.to_string(),
                parameter: entry.request.parameter.clone(),
                result: entry.result.clone().map(|result| match result {
                    EntryResult::Success(value) => {
                        protocol::invoke_entry_message::Result::Value(value)
                    }
                    EntryResult::Failure(code, message) => {
                        protocol::invoke_entry_message::Result::Failure(to_failure(code, &message))
                    }
                }),
            }
            .encode_to_vec()
            .into(),
            Entry::BackgroundInvoke(entry) => protocol::BackgroundInvokeEntryMessage {
                service_name: entry.request.service_name.to_string(),
                method_name: entry.request.method_name.to_string(),
                parameter: entry.request.parameter.clone(),
                invoke_time: entry.invoke_time,
            }
            .encode_to_vec()
            .into(),
            Entry::Awakeable(entry) => protocol::AwakeableEntryMessage {
                result: entry.result.clone().map(|result| match result {
                    EntryResult::Success(value) => {
                        protocol::awakeable_entry_message::Result::Value(value)
                    }
                    EntryResult::Failure(code, message) => {
                        protocol::awakeable_entry_message::Result::Failure(to_failure(
                            code, &message,
                        ))
                    }
                }),
            }
            .encode_to_vec()
            .into(),
            Entry::CompleteAwakeable(entry) => protocol::CompleteAwakeableEntryMessage {
                id: entry.id.to_string(),
                result: Some(match entry.result.clone() {
                    EntryResult::Success(value) => {
                        protocol::complete_awakeable_entry_message::Result::Value(value)
                    }
                    EntryResult::Failure(code, message) => {
                        protocol::complete_awakeable_entry_message::Result::Failure(to_failure(
                            code, &message,
                        ))
                    }
                }),
            }
            .encode_to_vec()
            .into(),
            Entry::SideEffect(entry) => sdk::SideEffectEntryMessage {
                result: Some(match entry.result.clone() {
                    EntryResult::Success(value) => {
                        sdk::side_effect_entry_message::Result::Value(value)
                    }
                    EntryResult::Failure(code, message) => {
                        sdk::side_effect_entry_message::Result::Failure(to_failure(code, &message))
                    }
                }),
            }
            .encode_to_vec()
            .into(),
            Entry::CombinatorAwaitable(entry) => sdk::CombinatorAwaitableEntryMessage {
                entry_index: entry.entry_indexes.clone(),
            }
            .encode_to_vec()
            .into(),
        }
    }

    /// Value of the `DONE` header flag for this entry, if its type carries one.
    pub fn done_flag(entry: &Entry) -> Option<bool> {
        match entry {
            Entry::GetState(e) => Some(e.is_completed()),
            Entry::Sleep(e) => Some(e.is_completed()),
            Entry::Invoke(e) => Some(e.is_completed()),
            Entry::Awakeable(e) => Some(e.is_completed()),
            _ => None,
        }
    }
}

pub(crate) fn to_failure(code: UserErrorCode, message: &str) -> protocol::Failure {
    protocol::Failure {
        code: code.into(),
        message: message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use restate_sdk_types::journal::InvokeRequest;

    #[test]
    fn serialize_deserialize_invoke() {
        let entry = Entry::invoke(
            InvokeRequest::new("MySvc", "MyMethod", Bytes::from_static(b"input")),
            Some(EntryResult::Success(Bytes::from_static(b"output"))),
        );

        let serialized = ProtobufEntryCodec::serialize(&entry);
        let deserialized =
            ProtobufEntryCodec::deserialize(EntryType::Invoke, serialized).unwrap();

        assert_eq!(deserialized, entry);
        assert_eq!(ProtobufEntryCodec::done_flag(&deserialized), Some(true));
    }

    #[test]
    fn deserialize_get_state_without_result() {
        let serialized = ProtobufEntryCodec::serialize(&Entry::get_state(
            Bytes::from_static(b"STATE"),
            None,
        ));
        let deserialized =
            ProtobufEntryCodec::deserialize(EntryType::GetState, serialized).unwrap();

        assert_eq!(
            deserialized,
            Entry::get_state(Bytes::from_static(b"STATE"), None)
        );
        assert_eq!(ProtobufEntryCodec::done_flag(&deserialized), Some(false));
    }

    #[test]
    fn deserialize_truncated_body() {
        let serialized = ProtobufEntryCodec::serialize(&Entry::invoke(
            InvokeRequest::new("MySvc", "MyMethod", Bytes::from_static(b"input")),
            None,
        ));
        let truncated = serialized.slice(0..serialized.len() - 1);

        assert!(ProtobufEntryCodec::deserialize(EntryType::Invoke, truncated).is_err());
    }
}
