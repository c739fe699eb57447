// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use super::header::UnknownMessageType;
use super::*;

use std::mem;

use crate::codec::{EntryCodecError, ProtobufEntryCodec};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use bytes_utils::SegmentedBuf;
use prost::Message;
use restate_sdk_types::journal::EntryType;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("cannot decode message type {0:?}. Reason: {1:?}")]
    DecodeMessage(MessageType, #[source] prost::DecodeError),
    #[error(transparent)]
    UnknownMessageType(#[from] UnknownMessageType),
    #[error(transparent)]
    Entry(#[from] EntryCodecError),
    #[error("hit message size limit: {0} >= {1}")]
    MessageSizeLimit(usize, usize),
}

// --- Message encoder

#[derive(Debug, Default)]
pub struct Encoder {}

impl Encoder {
    pub fn new() -> Self {
        Self {}
    }

    /// Encodes a message to bytes, prepending the 64-bit header.
    pub fn encode(&self, msg: ProtocolMessage) -> Bytes {
        let (header, body) = encode_parts(msg);
        let mut buf = BytesMut::with_capacity(8 + body.len());
        buf.put_u64(header.into());
        buf.put(body);
        buf.freeze()
    }
}

fn encode_parts(msg: ProtocolMessage) -> (MessageHeader, Bytes) {
    let (ty, body): (MessageType, Bytes) = match &msg {
        ProtocolMessage::Start(m) => (MessageType::Start, m.encode_to_vec().into()),
        ProtocolMessage::Completion(m) => (MessageType::Completion, m.encode_to_vec().into()),
        ProtocolMessage::Suspension(m) => (MessageType::Suspension, m.encode_to_vec().into()),
        ProtocolMessage::Error(m) => (MessageType::Error, m.encode_to_vec().into()),
        ProtocolMessage::EntryAck(m) => (MessageType::EntryAck, m.encode_to_vec().into()),
        ProtocolMessage::Entry(entry) => (
            entry.ty().into(),
            ProtobufEntryCodec::serialize(entry),
        ),
    };
    let len: u32 = body
        .len()
        .try_into()
        .expect("Protocol messages can't be larger than u32");

    let header = match &msg {
        ProtocolMessage::Entry(entry) => MessageHeader::new_entry_header(
            ty,
            ProtobufEntryCodec::done_flag(entry),
            if ty == MessageType::SideEffectEntry {
                Some(true)
            } else {
                None
            },
            len,
        ),
        _ => MessageHeader::new(ty, len),
    };

    (header, body)
}

// --- Message decoder

/// Stateful decoder to decode [`ProtocolMessage`]
pub struct Decoder {
    buf: SegmentedBuf<Bytes>,
    state: DecoderState,
    message_size_warning: usize,
    message_size_limit: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new(usize::MAX, None)
    }
}

impl Decoder {
    pub fn new(message_size_warning: usize, message_size_limit: Option<usize>) -> Self {
        Self {
            buf: SegmentedBuf::new(),
            state: DecoderState::WaitingHeader,
            message_size_warning,
            message_size_limit: message_size_limit.unwrap_or(usize::MAX),
        }
    }

    pub fn has_remaining(&self) -> bool {
        self.buf.has_remaining()
    }

    /// Concatenate a new chunk in the internal buffer.
    pub fn push(&mut self, buf: Bytes) {
        self.buf.push(buf)
    }

    /// Try to consume the next message in the internal buffer.
    pub fn consume_next(
        &mut self,
    ) -> Result<Option<(MessageHeader, ProtocolMessage)>, EncodingError> {
        loop {
            let remaining = self.buf.remaining();

            if remaining >= self.message_size_warning {
                warn!(
                    "Message size warning: {} >= {}. \
                    Generating very large messages can make the system unstable if configured with too little memory. \
                    You can increase the threshold to avoid this warning by changing the message_size_warning option",
                    remaining, self.message_size_warning
                );
            }
            if remaining >= self.message_size_limit {
                return Err(EncodingError::MessageSizeLimit(
                    remaining,
                    self.message_size_limit,
                ));
            }

            if remaining < self.state.needs_bytes() {
                return Ok(None);
            }

            if let Some(res) = self.state.decode(&mut self.buf)? {
                return Ok(Some(res));
            }
        }
    }
}

#[derive(Default)]
enum DecoderState {
    #[default]
    WaitingHeader,
    WaitingPayload(MessageHeader),
}

impl DecoderState {
    fn needs_bytes(&self) -> usize {
        match self {
            DecoderState::WaitingHeader => 8,
            DecoderState::WaitingPayload(h) => h.frame_length() as usize,
        }
    }

    fn decode(
        &mut self,
        mut buf: impl Buf,
    ) -> Result<Option<(MessageHeader, ProtocolMessage)>, EncodingError> {
        let mut res = None;

        *self = match mem::take(self) {
            DecoderState::WaitingHeader => DecoderState::WaitingPayload(buf.get_u64().try_into()?),
            DecoderState::WaitingPayload(h) => {
                let msg = decode_protocol_message(&h, buf.take(h.frame_length() as usize))?;
                res = Some((h, msg));
                DecoderState::WaitingHeader
            }
        };

        Ok(res)
    }
}

fn decode_protocol_message(
    header: &MessageHeader,
    mut buf: impl Buf,
) -> Result<ProtocolMessage, EncodingError> {
    let decode_err =
        |e: prost::DecodeError| EncodingError::DecodeMessage(header.message_type(), e);
    Ok(match header.message_type() {
        MessageType::Start => {
            ProtocolMessage::Start(pb::protocol::StartMessage::decode(buf).map_err(decode_err)?)
        }
        MessageType::Completion => ProtocolMessage::Completion(
            pb::protocol::CompletionMessage::decode(buf).map_err(decode_err)?,
        ),
        MessageType::Suspension => ProtocolMessage::Suspension(
            pb::protocol::SuspensionMessage::decode(buf).map_err(decode_err)?,
        ),
        MessageType::Error => {
            ProtocolMessage::Error(pb::protocol::ErrorMessage::decode(buf).map_err(decode_err)?)
        }
        MessageType::EntryAck => ProtocolMessage::EntryAck(
            pb::protocol::EntryAckMessage::decode(buf).map_err(decode_err)?,
        ),
        entry_ty => {
            let entry_type: EntryType = entry_ty
                .try_into()
                .expect("every non-core message type maps to an entry type");
            // NOTE: This is a no-op copy if the Buf is instance of Bytes.
            // In case of SegmentedBuf, this doesn't copy if the whole message is contained
            // in a single Bytes instance.
            let entry_bytes = buf.copy_to_bytes(buf.remaining());
            ProtocolMessage::Entry(ProtobufEntryCodec::deserialize(entry_type, entry_bytes)?)
        }
    })
}
