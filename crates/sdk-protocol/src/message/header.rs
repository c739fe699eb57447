// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use restate_sdk_types::journal::EntryType;

const DONE_MASK: u64 = 0x0001_0000_0000;
const REQUIRES_ACK_MASK: u64 = 0x8000_0000_0000;

type MessageTypeId = u16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Core,
    IO,
    State,
    Syscall,
    Sdk,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageType {
    Start,
    Completion,
    Suspension,
    Error,
    EntryAck,
    PollInputStreamEntry,
    OutputStreamEntry,
    GetStateEntry,
    SetStateEntry,
    ClearStateEntry,
    SleepEntry,
    InvokeEntry,
    BackgroundInvokeEntry,
    AwakeableEntry,
    CompleteAwakeableEntry,
    CombinatorAwaitableEntry,
    SideEffectEntry,
}

impl MessageType {
    fn kind(&self) -> MessageKind {
        match self {
            MessageType::Start => MessageKind::Core,
            MessageType::Completion => MessageKind::Core,
            MessageType::Suspension => MessageKind::Core,
            MessageType::Error => MessageKind::Core,
            MessageType::EntryAck => MessageKind::Core,
            MessageType::PollInputStreamEntry => MessageKind::IO,
            MessageType::OutputStreamEntry => MessageKind::IO,
            MessageType::GetStateEntry => MessageKind::State,
            MessageType::SetStateEntry => MessageKind::State,
            MessageType::ClearStateEntry => MessageKind::State,
            MessageType::SleepEntry => MessageKind::Syscall,
            MessageType::InvokeEntry => MessageKind::Syscall,
            MessageType::BackgroundInvokeEntry => MessageKind::Syscall,
            MessageType::AwakeableEntry => MessageKind::Syscall,
            MessageType::CompleteAwakeableEntry => MessageKind::Syscall,
            MessageType::CombinatorAwaitableEntry => MessageKind::Sdk,
            MessageType::SideEffectEntry => MessageKind::Sdk,
        }
    }

    fn has_done_flag(&self) -> bool {
        matches!(
            self,
            MessageType::GetStateEntry
                | MessageType::SleepEntry
                | MessageType::InvokeEntry
                | MessageType::AwakeableEntry
        )
    }

    fn has_requires_ack_flag(&self) -> bool {
        matches!(self, MessageType::SideEffectEntry)
    }
}

const START_MESSAGE_TYPE: u16 = 0x0000;
const COMPLETION_MESSAGE_TYPE: u16 = 0x0001;
const SUSPENSION_MESSAGE_TYPE: u16 = 0x0002;
const ERROR_MESSAGE_TYPE: u16 = 0x0003;
const ENTRY_ACK_MESSAGE_TYPE: u16 = 0x0004;
const POLL_INPUT_STREAM_ENTRY_MESSAGE_TYPE: u16 = 0x0400;
const OUTPUT_STREAM_ENTRY_MESSAGE_TYPE: u16 = 0x0401;
const GET_STATE_ENTRY_MESSAGE_TYPE: u16 = 0x0800;
const SET_STATE_ENTRY_MESSAGE_TYPE: u16 = 0x0801;
const CLEAR_STATE_ENTRY_MESSAGE_TYPE: u16 = 0x0802;
const SLEEP_ENTRY_MESSAGE_TYPE: u16 = 0x0C00;
const INVOKE_ENTRY_MESSAGE_TYPE: u16 = 0x0C01;
const BACKGROUND_INVOKE_ENTRY_MESSAGE_TYPE: u16 = 0x0C02;
const AWAKEABLE_ENTRY_MESSAGE_TYPE: u16 = 0x0C03;
const COMPLETE_AWAKEABLE_ENTRY_MESSAGE_TYPE: u16 = 0x0C04;
const COMBINATOR_AWAITABLE_ENTRY_MESSAGE_TYPE: u16 = 0xFC00;
const SIDE_EFFECT_ENTRY_MESSAGE_TYPE: u16 = 0xFC01;

impl From<MessageType> for MessageTypeId {
    fn from(mt: MessageType) -> Self {
        match mt {
            MessageType::Start => START_MESSAGE_TYPE,
            MessageType::Completion => COMPLETION_MESSAGE_TYPE,
            MessageType::Suspension => SUSPENSION_MESSAGE_TYPE,
            MessageType::Error => ERROR_MESSAGE_TYPE,
            MessageType::EntryAck => ENTRY_ACK_MESSAGE_TYPE,
            MessageType::PollInputStreamEntry => POLL_INPUT_STREAM_ENTRY_MESSAGE_TYPE,
            MessageType::OutputStreamEntry => OUTPUT_STREAM_ENTRY_MESSAGE_TYPE,
            MessageType::GetStateEntry => GET_STATE_ENTRY_MESSAGE_TYPE,
            MessageType::SetStateEntry => SET_STATE_ENTRY_MESSAGE_TYPE,
            MessageType::ClearStateEntry => CLEAR_STATE_ENTRY_MESSAGE_TYPE,
            MessageType::SleepEntry => SLEEP_ENTRY_MESSAGE_TYPE,
            MessageType::InvokeEntry => INVOKE_ENTRY_MESSAGE_TYPE,
            MessageType::BackgroundInvokeEntry => BACKGROUND_INVOKE_ENTRY_MESSAGE_TYPE,
            MessageType::AwakeableEntry => AWAKEABLE_ENTRY_MESSAGE_TYPE,
            MessageType::CompleteAwakeableEntry => COMPLETE_AWAKEABLE_ENTRY_MESSAGE_TYPE,
            MessageType::CombinatorAwaitableEntry => COMBINATOR_AWAITABLE_ENTRY_MESSAGE_TYPE,
            MessageType::SideEffectEntry => SIDE_EFFECT_ENTRY_MESSAGE_TYPE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown message code {0:#x}")]
pub struct UnknownMessageType(pub u16);

impl TryFrom<MessageTypeId> for MessageType {
    type Error = UnknownMessageType;

    fn try_from(value: MessageTypeId) -> Result<Self, UnknownMessageType> {
        match value {
            START_MESSAGE_TYPE => Ok(MessageType::Start),
            COMPLETION_MESSAGE_TYPE => Ok(MessageType::Completion),
            SUSPENSION_MESSAGE_TYPE => Ok(MessageType::Suspension),
            ERROR_MESSAGE_TYPE => Ok(MessageType::Error),
            ENTRY_ACK_MESSAGE_TYPE => Ok(MessageType::EntryAck),
            POLL_INPUT_STREAM_ENTRY_MESSAGE_TYPE => Ok(MessageType::PollInputStreamEntry),
            OUTPUT_STREAM_ENTRY_MESSAGE_TYPE => Ok(MessageType::OutputStreamEntry),
            GET_STATE_ENTRY_MESSAGE_TYPE => Ok(MessageType::GetStateEntry),
            SET_STATE_ENTRY_MESSAGE_TYPE => Ok(MessageType::SetStateEntry),
            CLEAR_STATE_ENTRY_MESSAGE_TYPE => Ok(MessageType::ClearStateEntry),
            SLEEP_ENTRY_MESSAGE_TYPE => Ok(MessageType::SleepEntry),
            INVOKE_ENTRY_MESSAGE_TYPE => Ok(MessageType::InvokeEntry),
            BACKGROUND_INVOKE_ENTRY_MESSAGE_TYPE => Ok(MessageType::BackgroundInvokeEntry),
            AWAKEABLE_ENTRY_MESSAGE_TYPE => Ok(MessageType::AwakeableEntry),
            COMPLETE_AWAKEABLE_ENTRY_MESSAGE_TYPE => Ok(MessageType::CompleteAwakeableEntry),
            COMBINATOR_AWAITABLE_ENTRY_MESSAGE_TYPE => Ok(MessageType::CombinatorAwaitableEntry),
            SIDE_EFFECT_ENTRY_MESSAGE_TYPE => Ok(MessageType::SideEffectEntry),
            v => Err(UnknownMessageType(v)),
        }
    }
}

impl TryFrom<MessageType> for EntryType {
    type Error = MessageType;

    fn try_from(value: MessageType) -> Result<Self, MessageType> {
        match value {
            MessageType::PollInputStreamEntry => Ok(EntryType::PollInputStream),
            MessageType::OutputStreamEntry => Ok(EntryType::OutputStream),
            MessageType::GetStateEntry => Ok(EntryType::GetState),
            MessageType::SetStateEntry => Ok(EntryType::SetState),
            MessageType::ClearStateEntry => Ok(EntryType::ClearState),
            MessageType::SleepEntry => Ok(EntryType::Sleep),
            MessageType::InvokeEntry => Ok(EntryType::Invoke),
            MessageType::BackgroundInvokeEntry => Ok(EntryType::BackgroundInvoke),
            MessageType::AwakeableEntry => Ok(EntryType::Awakeable),
            MessageType::CompleteAwakeableEntry => Ok(EntryType::CompleteAwakeable),
            MessageType::CombinatorAwaitableEntry => Ok(EntryType::CombinatorAwaitable),
            MessageType::SideEffectEntry => Ok(EntryType::SideEffect),
            MessageType::Start
            | MessageType::Completion
            | MessageType::Suspension
            | MessageType::Error
            | MessageType::EntryAck => Err(value),
        }
    }
}

impl From<EntryType> for MessageType {
    fn from(value: EntryType) -> Self {
        match value {
            EntryType::PollInputStream => MessageType::PollInputStreamEntry,
            EntryType::OutputStream => MessageType::OutputStreamEntry,
            EntryType::GetState => MessageType::GetStateEntry,
            EntryType::SetState => MessageType::SetStateEntry,
            EntryType::ClearState => MessageType::ClearStateEntry,
            EntryType::Sleep => MessageType::SleepEntry,
            EntryType::Invoke => MessageType::InvokeEntry,
            EntryType::BackgroundInvoke => MessageType::BackgroundInvokeEntry,
            EntryType::Awakeable => MessageType::AwakeableEntry,
            EntryType::CompleteAwakeable => MessageType::CompleteAwakeableEntry,
            EntryType::CombinatorAwaitable => MessageType::CombinatorAwaitableEntry,
            EntryType::SideEffect => MessageType::SideEffectEntry,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    ty: MessageType,
    length: u32,

    // --- Flags
    /// Only completable entries have the done flag. See [`MessageType::has_done_flag`].
    done_flag: Option<bool>,
    /// Only side effect entries have the requires ack flag.
    requires_ack_flag: Option<bool>,
}

impl MessageHeader {
    #[inline]
    pub fn new(ty: MessageType, length: u32) -> Self {
        Self::_new(ty, None, None, length)
    }

    #[inline]
    pub fn new_entry_header(
        ty: MessageType,
        done_flag: Option<bool>,
        requires_ack_flag: Option<bool>,
        length: u32,
    ) -> Self {
        debug_assert!(done_flag.is_some() == ty.has_done_flag());
        debug_assert!(requires_ack_flag.is_some() == ty.has_requires_ack_flag());

        Self::_new(ty, done_flag, requires_ack_flag, length)
    }

    #[inline]
    fn _new(
        ty: MessageType,
        done_flag: Option<bool>,
        requires_ack_flag: Option<bool>,
        length: u32,
    ) -> Self {
        MessageHeader {
            ty,
            length,
            done_flag,
            requires_ack_flag,
        }
    }

    #[inline]
    pub fn message_kind(&self) -> MessageKind {
        self.ty.kind()
    }

    #[inline]
    pub fn message_type(&self) -> MessageType {
        self.ty
    }

    #[inline]
    pub fn done(&self) -> Option<bool> {
        self.done_flag
    }

    #[inline]
    pub fn requires_ack(&self) -> Option<bool> {
        self.requires_ack_flag
    }

    #[inline]
    pub fn frame_length(&self) -> u32 {
        self.length
    }
}

macro_rules! read_flag_if {
    ($cond:expr, $value:expr, $mask:expr) => {
        if $cond {
            Some(($value & $mask) != 0)
        } else {
            None
        }
    };
}

impl TryFrom<u64> for MessageHeader {
    type Error = UnknownMessageType;

    /// Deserialize the protocol header.
    fn try_from(value: u64) -> Result<Self, Self::Error> {
        let ty_code = (value >> 48) as u16;
        let ty: MessageType = ty_code.try_into()?;

        let done_flag = read_flag_if!(ty.has_done_flag(), value, DONE_MASK);
        let requires_ack_flag = read_flag_if!(ty.has_requires_ack_flag(), value, REQUIRES_ACK_MASK);
        let length = value as u32;

        Ok(MessageHeader::_new(ty, done_flag, requires_ack_flag, length))
    }
}

macro_rules! write_flag {
    ($flag:expr, $value:expr, $mask:expr) => {
        if let Some(true) = $flag {
            *$value |= $mask;
        }
    };
}

impl From<MessageHeader> for u64 {
    /// Serialize the protocol header.
    fn from(message_header: MessageHeader) -> Self {
        let mut res =
            ((u16::from(message_header.ty) as u64) << 48) | (message_header.length as u64);

        write_flag!(message_header.done_flag, &mut res, DONE_MASK);
        write_flag!(
            message_header.requires_ack_flag,
            &mut res,
            REQUIRES_ACK_MASK
        );

        res
    }
}

#[cfg(test)]
mod tests {

    use super::{MessageKind::*, MessageType::*, *};

    impl MessageHeader {
        fn new_completable_entry(ty: MessageType, done: bool, length: u32) -> Self {
            Self::new_entry_header(ty, Some(done), None, length)
        }
    }

    macro_rules! roundtrip_test {
        ($test_name:ident, $header:expr, $ty:expr, $kind:expr, $len:expr) => {
            roundtrip_test!($test_name, $header, $ty, $kind, $len, None, None);
        };
        ($test_name:ident, $header:expr, $ty:expr, $kind:expr, $len:expr, done: $done:expr) => {
            roundtrip_test!($test_name, $header, $ty, $kind, $len, Some($done), None);
        };
        ($test_name:ident, $header:expr, $ty:expr, $kind:expr, $len:expr, requires_ack: $requires_ack:expr) => {
            roundtrip_test!(
                $test_name,
                $header,
                $ty,
                $kind,
                $len,
                None,
                Some($requires_ack)
            );
        };
        ($test_name:ident, $header:expr, $ty:expr, $kind:expr, $len:expr, $done:expr, $requires_ack:expr) => {
            #[test]
            fn $test_name() {
                let serialized: u64 = $header.into();
                let header: MessageHeader = serialized.try_into().unwrap();

                assert_eq!(header.message_type(), $ty);
                assert_eq!(header.message_kind(), $kind);
                assert_eq!(header.done(), $done);
                assert_eq!(header.requires_ack(), $requires_ack);
                assert_eq!(header.frame_length(), $len);
            }
        };
    }

    roundtrip_test!(start, MessageHeader::new(Start, 25), Start, Core, 25);

    roundtrip_test!(
        completion,
        MessageHeader::new(Completion, 22),
        Completion,
        Core,
        22
    );

    roundtrip_test!(
        completed_get_state,
        MessageHeader::new_completable_entry(GetStateEntry, true, 0),
        GetStateEntry,
        State,
        0,
        done: true
    );

    roundtrip_test!(
        not_completed_get_state,
        MessageHeader::new_completable_entry(GetStateEntry, false, 0),
        GetStateEntry,
        State,
        0,
        done: false
    );

    roundtrip_test!(
        completed_get_state_with_len,
        MessageHeader::new_completable_entry(GetStateEntry, true, 10341),
        GetStateEntry,
        State,
        10341,
        done: true
    );

    roundtrip_test!(
        set_state,
        MessageHeader::new(SetStateEntry, 10341),
        SetStateEntry,
        State,
        10341
    );

    roundtrip_test!(
        side_effect_with_requires_ack,
        MessageHeader::new_entry_header(SideEffectEntry, None, Some(true), 10341),
        SideEffectEntry,
        Sdk,
        10341,
        requires_ack: true
    );

    roundtrip_test!(
        combinator_awaitable,
        MessageHeader::new(CombinatorAwaitableEntry, 16),
        CombinatorAwaitableEntry,
        Sdk,
        16
    );

    #[test]
    fn unknown_message_type() {
        let encoded: u64 = 0x1234_0000_0000_0010;
        assert!(MessageHeader::try_from(encoded).is_err());
    }
}
