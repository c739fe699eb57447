// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Core of the Restate Rust SDK: the invocation state machine.
//!
//! An [`InvocationEngine`] drives one invocation: it reads the ordered
//! protocol stream coming from the runtime, replays journalled effects
//! against the registered handler, correlates every operation the handler
//! requests to a journal entry, and produces the outbound entry messages,
//! the invocation result, and suspension decisions.
//!
//! Transport adapters (HTTP streaming, serverless request/response) sit on
//! top of the engine's `push_input`/`poll_output` surface and are not part of
//! this crate.

mod context;
mod deferred;
mod eager_state;
mod engine;
mod entries;
mod error;
mod journal;
mod options;
mod registry;
mod state_machine;

pub use context::{AwakeableHandle, Awaitable, Context};
pub use deferred::DeferredHandle;
pub use engine::InvocationEngine;
pub use entries::DeferredValue;
pub use error::HandlerError;
pub use options::{Options, OptionsBuilder};
pub use registry::{BoxedHandler, HandlerResult, ServiceRegistry};
