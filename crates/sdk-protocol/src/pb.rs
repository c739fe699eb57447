// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Protocol message structs, mirroring the service protocol definitions.
//!
//! These are maintained by hand in the shape `prost-build` generates, so the
//! wire format stays byte-compatible with the runtime's generated structs.

pub mod protocol {
    /// First message of the stream, sent by the runtime.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StartMessage {
        #[prost(bytes = "bytes", tag = "1")]
        pub invocation_id: ::prost::bytes::Bytes,
        /// Invocation id in a human readable format, for debugging/logging purposes.
        #[prost(string, tag = "2")]
        pub debug_id: ::prost::alloc::string::String,
        #[prost(uint32, tag = "3")]
        pub known_entries: u32,
        /// Eager state, used to resolve GetState locally.
        #[prost(message, repeated, tag = "4")]
        pub state_map: ::prost::alloc::vec::Vec<start_message::StateEntry>,
        /// If true, `state_map` is only a subset of the stored state.
        #[prost(bool, tag = "5")]
        pub partial_state: bool,
    }
    /// Nested message and enum types in `StartMessage`.
    pub mod start_message {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct StateEntry {
            #[prost(bytes = "bytes", tag = "1")]
            pub key: ::prost::bytes::Bytes,
            #[prost(bytes = "bytes", tag = "2")]
            pub value: ::prost::bytes::Bytes,
        }
    }
    /// Carries the result of a previously emitted entry.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CompletionMessage {
        #[prost(uint32, tag = "1")]
        pub entry_index: u32,
        #[prost(oneof = "completion_message::Result", tags = "13, 14, 15")]
        pub result: ::core::option::Option<completion_message::Result>,
    }
    /// Nested message and enum types in `CompletionMessage`.
    pub mod completion_message {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Result {
            #[prost(message, tag = "13")]
            Empty(()),
            #[prost(bytes = "bytes", tag = "14")]
            Value(::prost::bytes::Bytes),
            #[prost(message, tag = "15")]
            Failure(super::Failure),
        }
    }
    /// Sent by the SDK when the invocation blocks on unresolved results and
    /// no further input is available.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SuspensionMessage {
        #[prost(uint32, repeated, tag = "1")]
        pub entry_indexes: ::prost::alloc::vec::Vec<u32>,
    }
    /// Terminates the stream reporting a failure the runtime may retry.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ErrorMessage {
        #[prost(uint32, tag = "1")]
        pub code: u32,
        #[prost(string, tag = "2")]
        pub message: ::prost::alloc::string::String,
        /// Contains more details about the error, e.g. a stringified stack trace.
        #[prost(string, tag = "3")]
        pub description: ::prost::alloc::string::String,
    }
    /// Acknowledges the durable storage of the entry at `entry_index`.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct EntryAckMessage {
        #[prost(uint32, tag = "1")]
        pub entry_index: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Failure {
        #[prost(uint32, tag = "1")]
        pub code: u32,
        #[prost(string, tag = "2")]
        pub message: ::prost::alloc::string::String,
    }

    // --- Journal entries

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PollInputStreamEntryMessage {
        #[prost(oneof = "poll_input_stream_entry_message::Result", tags = "14, 15")]
        pub result: ::core::option::Option<poll_input_stream_entry_message::Result>,
    }
    /// Nested message and enum types in `PollInputStreamEntryMessage`.
    pub mod poll_input_stream_entry_message {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Result {
            #[prost(bytes = "bytes", tag = "14")]
            Value(::prost::bytes::Bytes),
            #[prost(message, tag = "15")]
            Failure(super::Failure),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct OutputStreamEntryMessage {
        #[prost(oneof = "output_stream_entry_message::Result", tags = "14, 15")]
        pub result: ::core::option::Option<output_stream_entry_message::Result>,
    }
    /// Nested message and enum types in `OutputStreamEntryMessage`.
    pub mod output_stream_entry_message {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Result {
            #[prost(bytes = "bytes", tag = "14")]
            Value(::prost::bytes::Bytes),
            #[prost(message, tag = "15")]
            Failure(super::Failure),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetStateEntryMessage {
        #[prost(bytes = "bytes", tag = "1")]
        pub key: ::prost::bytes::Bytes,
        #[prost(oneof = "get_state_entry_message::Result", tags = "13, 14, 15")]
        pub result: ::core::option::Option<get_state_entry_message::Result>,
    }
    /// Nested message and enum types in `GetStateEntryMessage`.
    pub mod get_state_entry_message {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Result {
            #[prost(message, tag = "13")]
            Empty(()),
            #[prost(bytes = "bytes", tag = "14")]
            Value(::prost::bytes::Bytes),
            #[prost(message, tag = "15")]
            Failure(super::Failure),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SetStateEntryMessage {
        #[prost(bytes = "bytes", tag = "1")]
        pub key: ::prost::bytes::Bytes,
        #[prost(bytes = "bytes", tag = "3")]
        pub value: ::prost::bytes::Bytes,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ClearStateEntryMessage {
        #[prost(bytes = "bytes", tag = "1")]
        pub key: ::prost::bytes::Bytes,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SleepEntryMessage {
        /// Wake up time, as duration since UNIX_EPOCH in millis.
        #[prost(uint64, tag = "1")]
        pub wake_up_time: u64,
        #[prost(oneof = "sleep_entry_message::Result", tags = "13, 15")]
        pub result: ::core::option::Option<sleep_entry_message::Result>,
    }
    /// Nested message and enum types in `SleepEntryMessage`.
    pub mod sleep_entry_message {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Result {
            #[prost(message, tag = "13")]
            Empty(()),
            #[prost(message, tag = "15")]
            Failure(super::Failure),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct InvokeEntryMessage {
        #[prost(string, tag = "1")]
        pub service_name: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub method_name: ::prost::alloc::string::String,
        #[prost(bytes = "bytes", tag = "3")]
        pub parameter: ::prost::bytes::Bytes,
        #[prost(oneof = "invoke_entry_message::Result", tags = "14, 15")]
        pub result: ::core::option::Option<invoke_entry_message::Result>,
    }
    /// Nested message and enum types in `InvokeEntryMessage`.
    pub mod invoke_entry_message {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Result {
            #[prost(bytes = "bytes", tag = "14")]
            Value(::prost::bytes::Bytes),
            #[prost(message, tag = "15")]
            Failure(super::Failure),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct BackgroundInvokeEntryMessage {
        #[prost(string, tag = "1")]
        pub service_name: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub method_name: ::prost::alloc::string::String,
        #[prost(bytes = "bytes", tag = "3")]
        pub parameter: ::prost::bytes::Bytes,
        /// Time when this BackgroundInvoke should be executed, as duration
        /// since UNIX_EPOCH in millis. 0 means immediately.
        #[prost(uint64, tag = "4")]
        pub invoke_time: u64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AwakeableEntryMessage {
        #[prost(oneof = "awakeable_entry_message::Result", tags = "14, 15")]
        pub result: ::core::option::Option<awakeable_entry_message::Result>,
    }
    /// Nested message and enum types in `AwakeableEntryMessage`.
    pub mod awakeable_entry_message {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Result {
            #[prost(bytes = "bytes", tag = "14")]
            Value(::prost::bytes::Bytes),
            #[prost(message, tag = "15")]
            Failure(super::Failure),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CompleteAwakeableEntryMessage {
        #[prost(string, tag = "1")]
        pub id: ::prost::alloc::string::String,
        #[prost(oneof = "complete_awakeable_entry_message::Result", tags = "14, 15")]
        pub result: ::core::option::Option<complete_awakeable_entry_message::Result>,
    }
    /// Nested message and enum types in `CompleteAwakeableEntryMessage`.
    pub mod complete_awakeable_entry_message {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Result {
            #[prost(bytes = "bytes", tag = "14")]
            Value(::prost::bytes::Bytes),
            #[prost(message, tag = "15")]
            Failure(super::Failure),
        }
    }
}

/// SDK-owned entries, in the custom range of the message type space.
pub mod sdk {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SideEffectEntryMessage {
        #[prost(oneof = "side_effect_entry_message::Result", tags = "14, 15")]
        pub result: ::core::option::Option<side_effect_entry_message::Result>,
    }
    /// Nested message and enum types in `SideEffectEntryMessage`.
    pub mod side_effect_entry_message {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Result {
            #[prost(bytes = "bytes", tag = "14")]
            Value(::prost::bytes::Bytes),
            #[prost(message, tag = "15")]
            Failure(super::super::protocol::Failure),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CombinatorAwaitableEntryMessage {
        /// Indexes of the journal entries that resolved this combinator, in
        /// resolution order.
        #[prost(uint32, repeated, tag = "1")]
        pub entry_index: ::prost::alloc::vec::Vec<u32>,
    }
}
