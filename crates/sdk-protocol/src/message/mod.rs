// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Module containing definitions of Protocol messages,
//! including encoding and decoding of headers and message payloads.

use super::pb;

use bytes::Bytes;
use restate_sdk_types::errors::InvocationError;
use restate_sdk_types::identifiers::EntryIndex;
use restate_sdk_types::journal::{Completion, CompletionResult, Entry};

mod encoding;
mod header;

pub use encoding::{Decoder, Encoder, EncodingError};
pub use header::{MessageHeader, MessageKind, MessageType, UnknownMessageType};

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolMessage {
    // Core
    Start(pb::protocol::StartMessage),
    Completion(pb::protocol::CompletionMessage),
    Suspension(pb::protocol::SuspensionMessage),
    Error(pb::protocol::ErrorMessage),
    EntryAck(pb::protocol::EntryAckMessage),

    // Entries, materialized at decoding time
    Entry(Entry),
}

impl ProtocolMessage {
    pub fn ty(&self) -> MessageType {
        match self {
            ProtocolMessage::Start(_) => MessageType::Start,
            ProtocolMessage::Completion(_) => MessageType::Completion,
            ProtocolMessage::Suspension(_) => MessageType::Suspension,
            ProtocolMessage::Error(_) => MessageType::Error,
            ProtocolMessage::EntryAck(_) => MessageType::EntryAck,
            ProtocolMessage::Entry(entry) => entry.ty().into(),
        }
    }

    pub fn new_start_message(
        invocation_id: Bytes,
        debug_id: String,
        known_entries: u32,
        partial_state: bool,
        state_map_entries: impl IntoIterator<Item = (Bytes, Bytes)>,
    ) -> Self {
        Self::Start(pb::protocol::StartMessage {
            invocation_id,
            debug_id,
            known_entries,
            partial_state,
            state_map: state_map_entries
                .into_iter()
                .map(|(key, value)| pb::protocol::start_message::StateEntry { key, value })
                .collect(),
        })
    }

    pub fn new_suspension_message(
        entry_indexes: impl IntoIterator<Item = EntryIndex>,
    ) -> ProtocolMessage {
        Self::Suspension(pb::protocol::SuspensionMessage {
            entry_indexes: entry_indexes.into_iter().collect(),
        })
    }

    pub fn new_entry_ack(entry_index: EntryIndex) -> ProtocolMessage {
        Self::EntryAck(pb::protocol::EntryAckMessage { entry_index })
    }
}

impl From<Completion> for ProtocolMessage {
    fn from(completion: Completion) -> Self {
        ProtocolMessage::Completion(pb::protocol::CompletionMessage {
            entry_index: completion.entry_index,
            result: Some(match completion.result {
                CompletionResult::Empty => pb::protocol::completion_message::Result::Empty(()),
                CompletionResult::Success(b) => {
                    pb::protocol::completion_message::Result::Value(b)
                }
                CompletionResult::Failure(code, message) => {
                    pb::protocol::completion_message::Result::Failure(pb::protocol::Failure {
                        code: code.into(),
                        message: message.to_string(),
                    })
                }
            }),
        })
    }
}

impl From<Entry> for ProtocolMessage {
    fn from(value: Entry) -> Self {
        ProtocolMessage::Entry(value)
    }
}

impl From<&InvocationError> for ProtocolMessage {
    fn from(value: &InvocationError) -> Self {
        ProtocolMessage::Error(pb::protocol::ErrorMessage {
            code: value.code().into(),
            message: value.message().to_owned(),
            description: value.description().unwrap_or_default().to_owned(),
        })
    }
}

impl From<pb::protocol::ErrorMessage> for InvocationError {
    fn from(value: pb::protocol::ErrorMessage) -> Self {
        if value.description.is_empty() {
            InvocationError::new(value.code, value.message)
        } else {
            InvocationError::new(value.code, value.message).with_description(value.description)
        }
    }
}
