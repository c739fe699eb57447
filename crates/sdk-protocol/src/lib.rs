// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! This crate contains the protocol message structs of the invocation
//! protocol spoken between the runtime and the SDK, and the codec to use them.

pub mod awakeable_id;
pub mod codec;
pub mod message;
pub mod pb;

/// This module implements conversions from proto messages to the
/// [`restate_sdk_types::journal::Entry`] model.
/// These are used by the [`codec::ProtobufEntryCodec`].
mod pb_into {
    use super::pb::{protocol::*, sdk};

    use restate_sdk_types::journal::*;

    impl TryFrom<PollInputStreamEntryMessage> for Entry {
        type Error = &'static str;

        fn try_from(msg: PollInputStreamEntryMessage) -> Result<Self, Self::Error> {
            Ok(Self::PollInputStream(PollInputStreamEntry {
                result: match msg.result.ok_or("result")? {
                    poll_input_stream_entry_message::Result::Value(r) => EntryResult::Success(r),
                    poll_input_stream_entry_message::Result::Failure(Failure { code, message }) => {
                        EntryResult::Failure(code.into(), message.into())
                    }
                },
            }))
        }
    }

    impl TryFrom<OutputStreamEntryMessage> for Entry {
        type Error = &'static str;

        fn try_from(msg: OutputStreamEntryMessage) -> Result<Self, Self::Error> {
            Ok(Entry::OutputStream(OutputStreamEntry {
                result: match msg.result.ok_or("result")? {
                    output_stream_entry_message::Result::Value(r) => EntryResult::Success(r),
                    output_stream_entry_message::Result::Failure(Failure { code, message }) => {
                        EntryResult::Failure(code.into(), message.into())
                    }
                },
            }))
        }
    }

    impl TryFrom<GetStateEntryMessage> for Entry {
        type Error = &'static str;

        fn try_from(msg: GetStateEntryMessage) -> Result<Self, Self::Error> {
            Ok(Entry::GetState(GetStateEntry {
                key: msg.key,
                value: msg.result.map(|v| match v {
                    get_state_entry_message::Result::Empty(()) => GetStateResult::Empty,
                    get_state_entry_message::Result::Value(b) => GetStateResult::Result(b),
                    get_state_entry_message::Result::Failure(Failure { code, message }) => {
                        GetStateResult::Failure(code.into(), message.into())
                    }
                }),
            }))
        }
    }

    impl TryFrom<SetStateEntryMessage> for Entry {
        type Error = &'static str;

        fn try_from(msg: SetStateEntryMessage) -> Result<Self, Self::Error> {
            Ok(Entry::SetState(SetStateEntry {
                key: msg.key,
                value: msg.value,
            }))
        }
    }

    impl TryFrom<ClearStateEntryMessage> for Entry {
        type Error = &'static str;

        fn try_from(msg: ClearStateEntryMessage) -> Result<Self, Self::Error> {
            Ok(Entry::ClearState(ClearStateEntry { key: msg.key }))
        }
    }

    impl TryFrom<SleepEntryMessage> for Entry {
        type Error = &'static str;

        fn try_from(msg: SleepEntryMessage) -> Result<Self, Self::Error> {
            Ok(Entry::Sleep(SleepEntry {
                wake_up_time: msg.wake_up_time,
                result: msg.result.map(|r| match r {
                    sleep_entry_message::Result::Empty(()) => SleepResult::Fired,
                    sleep_entry_message::Result::Failure(Failure { code, message }) => {
                        SleepResult::Failure(code.into(), message.into())
                    }
                }),
            }))
        }
    }

    impl TryFrom<InvokeEntryMessage> for Entry {
        type Error = &'static str;

        fn try_from(msg: InvokeEntryMessage) -> Result<Self, Self::Error> {
            Ok(Entry::Invoke(InvokeEntry {
                request: InvokeRequest {
                    service_name: msg.service_name.into(),
                    method_name: msg.method_name.into(),
                    parameter: msg.parameter,
                },
                result: msg.result.map(|v| match v {
                    invoke_entry_message::Result::Value(r) => EntryResult::Success(r),
                    invoke_entry_message::Result::Failure(Failure { code, message }) => {
                        EntryResult::Failure(code.into(), message.into())
                    }
                }),
            }))
        }
    }

    impl TryFrom<BackgroundInvokeEntryMessage> for Entry {
        type Error = &'static str;

        fn try_from(msg: BackgroundInvokeEntryMessage) -> Result<Self, Self::Error> {
            Ok(Entry::BackgroundInvoke(BackgroundInvokeEntry {
                request: InvokeRequest {
                    service_name: msg.service_name.into(),
                    method_name: msg.method_name.into(),
                    parameter: msg.parameter,
                },
                invoke_time: msg.invoke_time,
            }))
        }
    }

    impl TryFrom<AwakeableEntryMessage> for Entry {
        type Error = &'static str;

        fn try_from(msg: AwakeableEntryMessage) -> Result<Self, Self::Error> {
            Ok(Entry::Awakeable(AwakeableEntry {
                result: msg.result.map(|v| match v {
                    awakeable_entry_message::Result::Value(r) => EntryResult::Success(r),
                    awakeable_entry_message::Result::Failure(Failure { code, message }) => {
                        EntryResult::Failure(code.into(), message.into())
                    }
                }),
            }))
        }
    }

    impl TryFrom<CompleteAwakeableEntryMessage> for Entry {
        type Error = &'static str;

        fn try_from(msg: CompleteAwakeableEntryMessage) -> Result<Self, Self::Error> {
            Ok(Entry::CompleteAwakeable(CompleteAwakeableEntry {
                id: msg.id.into(),
                result: match msg.result.ok_or("result")? {
                    complete_awakeable_entry_message::Result::Value(r) => EntryResult::Success(r),
                    complete_awakeable_entry_message::Result::Failure(Failure {
                        code,
                        message,
                    }) => EntryResult::Failure(code.into(), message.into()),
                },
            }))
        }
    }

    impl TryFrom<sdk::SideEffectEntryMessage> for Entry {
        type Error = &'static str;

        fn try_from(msg: sdk::SideEffectEntryMessage) -> Result<Self, Self::Error> {
            Ok(Entry::SideEffect(SideEffectEntry {
                // A value-less side effect entry is a recorded empty value.
                result: match msg.result {
                    Some(sdk::side_effect_entry_message::Result::Value(r)) => {
                        EntryResult::Success(r)
                    }
                    Some(sdk::side_effect_entry_message::Result::Failure(Failure {
                        code,
                        message,
                    })) => EntryResult::Failure(code.into(), message.into()),
                    None => EntryResult::Success(Default::default()),
                },
            }))
        }
    }

    impl TryFrom<sdk::CombinatorAwaitableEntryMessage> for Entry {
        type Error = &'static str;

        fn try_from(msg: sdk::CombinatorAwaitableEntryMessage) -> Result<Self, Self::Error> {
            Ok(Entry::CombinatorAwaitable(CombinatorAwaitableEntry {
                entry_indexes: msg.entry_index,
            }))
        }
    }
}
