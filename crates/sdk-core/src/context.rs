// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The surface exposed to user handler code: state access, calls, timers,
//! side effects, awakeables and combinators.
//!
//! One context exists per invocation and is single-threaded cooperative: the
//! handler runs on one logical task and suspends only at await points. The
//! context must not be used concurrently; doing so corrupts journal ordering.

use crate::deferred::{DeferredHandle, Resolution};
use crate::entries::DeferredValue;
use crate::error::HandlerError;
use crate::state_machine::{GetStateOutcome, PollResult, SideEffectEnter, StateMachine};

use bytes::Bytes;
use bytestring::ByteString;
use restate_sdk_types::errors::{TerminalError, UserErrorCode};
use restate_sdk_types::journal::{EntryResult, InvokeRequest};
use restate_sdk_types::payload::PayloadCodec;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

/// Handler bridge of a single invocation.
#[derive(Clone)]
pub struct Context {
    machine: Rc<RefCell<StateMachine>>,
}

impl Context {
    pub(crate) fn new(machine: Rc<RefCell<StateMachine>>) -> Self {
        Self { machine }
    }

    /// Reads a state key. Resolves from the eager state cache when possible,
    /// otherwise asks the runtime.
    pub async fn get<T>(
        &self,
        key: &str,
        codec: &impl PayloadCodec<T>,
    ) -> Result<Option<T>, HandlerError> {
        let outcome = self
            .machine
            .borrow_mut()
            .sys_get_state(key_bytes(key))?;
        let value = match outcome {
            GetStateOutcome::Ready(value) => value,
            GetStateOutcome::Deferred(id) => {
                match raw_await(&self.machine, DeferredHandle(id)).await? {
                    DeferredValue::Empty => None,
                    DeferredValue::Success(b) => Some(b),
                }
            }
        };
        value
            .map(|b| codec.deserialize(b).map_err(HandlerError::from))
            .transpose()
    }

    /// Writes a state key, updating the local cache.
    pub async fn set<T>(
        &self,
        key: &str,
        codec: &impl PayloadCodec<T>,
        value: &T,
    ) -> Result<(), HandlerError> {
        let bytes = codec.serialize(value).map_err(HandlerError::from)?;
        self.machine
            .borrow_mut()
            .sys_set_state(key_bytes(key), bytes)
    }

    /// Clears a state key, updating the local cache.
    pub async fn clear(&self, key: &str) -> Result<(), HandlerError> {
        self.machine.borrow_mut().sys_clear_state(key_bytes(key))
    }

    /// Sleeps for the given duration of durable time.
    pub fn sleep(&self, duration: Duration) -> Result<Awaitable<()>, HandlerError> {
        let id = self.machine.borrow_mut().sys_sleep(duration)?;
        Ok(Awaitable::new(self.machine.clone(), id, |resolution| {
            single(resolution).map(|_| ())
        }))
    }

    /// Calls another service method, blocking on the response.
    pub fn call(&self, request: InvokeRequest) -> Result<Awaitable<Bytes>, HandlerError> {
        let id = self.machine.borrow_mut().sys_call(request)?;
        Ok(Awaitable::new(self.machine.clone(), id, |resolution| {
            Ok(single(resolution)?.into_bytes())
        }))
    }

    /// Calls another service method without awaiting the response.
    pub fn one_way_call(&self, request: InvokeRequest) -> Result<(), HandlerError> {
        self.machine.borrow_mut().sys_background_invoke(request, None)
    }

    /// Like [`Context::one_way_call`], executed by the runtime after `delay`.
    pub fn delayed_call(&self, request: InvokeRequest, delay: Duration) -> Result<(), HandlerError> {
        self.machine
            .borrow_mut()
            .sys_background_invoke(request, Some(delay))
    }

    /// Runs a non-deterministic action, freezing its result in the journal.
    /// On replay the recorded result is returned without running the closure.
    ///
    /// The closure must not interact with the invocation context; doing so is
    /// a fatal protocol violation.
    pub async fn side_effect<T, F>(
        &self,
        codec: &impl PayloadCodec<T>,
        action: F,
    ) -> Result<T, HandlerError>
    where
        F: FnOnce() -> Result<T, HandlerError>,
    {
        match self.machine.borrow_mut().sys_side_effect_enter()? {
            SideEffectEnter::Replayed(EntryResult::Success(bytes)) => {
                codec.deserialize(bytes).map_err(HandlerError::from)
            }
            SideEffectEnter::Replayed(EntryResult::Failure(code, message)) => {
                Err(TerminalError::new(code, message.to_string()).into())
            }
            SideEffectEnter::Execute => match action() {
                Ok(value) => match codec.serialize(&value) {
                    Ok(bytes) => {
                        self.finish_side_effect(EntryResult::Success(bytes)).await?;
                        Ok(value)
                    }
                    Err(error) => {
                        // Serialization failures are retryable.
                        let error = HandlerError::from(error);
                        self.machine.borrow_mut().sys_side_effect_abort(&error);
                        Err(error)
                    }
                },
                Err(error) => match error.as_terminal() {
                    Some(terminal) => {
                        let terminal = terminal.clone();
                        self.finish_side_effect(terminal.clone().into()).await?;
                        Err(terminal.into())
                    }
                    None => {
                        self.machine.borrow_mut().sys_side_effect_abort(&error);
                        Err(error)
                    }
                },
            },
        }
    }

    /// Records the side effect entry and awaits the runtime ack, making the
    /// result durable before control returns to user code.
    async fn finish_side_effect(&self, result: EntryResult) -> Result<(), HandlerError> {
        let ack = self.machine.borrow_mut().sys_side_effect_exit(result)?;
        raw_await(&self.machine, DeferredHandle(ack)).await?;
        Ok(())
    }

    /// Creates an awaitable resolvable by an external party through its id.
    pub fn awakeable<T, C>(&self, codec: C) -> Result<(String, Awaitable<T>), HandlerError>
    where
        C: PayloadCodec<T> + 'static,
        T: 'static,
    {
        let (id, deferred_id) = self.machine.borrow_mut().sys_awakeable()?;
        Ok((
            id,
            Awaitable::new(self.machine.clone(), deferred_id, move |resolution| {
                codec
                    .deserialize(single(resolution)?.into_bytes())
                    .map_err(HandlerError::from)
            }),
        ))
    }

    /// Handle to resolve or reject a peer's awakeable.
    pub fn awakeable_handle(&self, id: impl Into<ByteString>) -> AwakeableHandle {
        AwakeableHandle {
            machine: self.machine.clone(),
            id: id.into(),
        }
    }

    /// Resolves when all handles resolve; fails on the first handle failure.
    pub fn all(
        &self,
        handles: impl IntoIterator<Item = DeferredHandle>,
    ) -> Awaitable<Vec<DeferredValue>> {
        let id = self
            .machine
            .borrow_mut()
            .sys_all(handles.into_iter().map(|h| h.0).collect());
        Awaitable::new(self.machine.clone(), id, |resolution| match resolution {
            Resolution::All(result) => result.map_err(HandlerError::from),
            _ => Err(unexpected_resolution()),
        })
    }

    /// Resolves to the first handle that resolves, yielding its position and
    /// value. The winner is stable across replays.
    pub fn any(
        &self,
        handles: impl IntoIterator<Item = DeferredHandle>,
    ) -> Awaitable<(usize, DeferredValue)> {
        let id = self
            .machine
            .borrow_mut()
            .sys_any(handles.into_iter().map(|h| h.0).collect());
        Awaitable::new(self.machine.clone(), id, |resolution| match resolution {
            Resolution::Any(result) => result.map_err(HandlerError::from),
            _ => Err(unexpected_resolution()),
        })
    }
}

/// Handle to complete a peer's awakeable.
pub struct AwakeableHandle {
    machine: Rc<RefCell<StateMachine>>,
    id: ByteString,
}

impl AwakeableHandle {
    pub fn resolve(self, payload: impl Into<Bytes>) -> Result<(), HandlerError> {
        self.machine
            .borrow_mut()
            .sys_complete_awakeable(self.id, EntryResult::Success(payload.into()))
    }

    pub fn reject(self, code: UserErrorCode, message: impl Into<String>) -> Result<(), HandlerError> {
        let message: String = message.into();
        self.machine
            .borrow_mut()
            .sys_complete_awakeable(self.id, EntryResult::Failure(code, message.into()))
    }
}

type Convert<T> = Box<dyn FnOnce(Resolution) -> Result<T, HandlerError>>;

/// A deferred result with a typed conversion applied on resolution.
///
/// Awaiting it parks the handler until the underlying journal entry has a
/// result; [`Awaitable::handle`] lets it participate in combinators.
pub struct Awaitable<T> {
    machine: Rc<RefCell<StateMachine>>,
    handle: DeferredHandle,
    convert: Option<Convert<T>>,
}

impl<T> Awaitable<T> {
    fn new(
        machine: Rc<RefCell<StateMachine>>,
        id: crate::deferred::DeferredId,
        convert: impl FnOnce(Resolution) -> Result<T, HandlerError> + 'static,
    ) -> Self {
        Self {
            machine,
            handle: DeferredHandle(id),
            convert: Some(Box::new(convert)),
        }
    }

    pub fn handle(&self) -> DeferredHandle {
        self.handle
    }
}

impl<T> Future for Awaitable<T> {
    type Output = Result<T, HandlerError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.machine.borrow_mut().poll_deferred(this.handle.0) {
            PollResult::Pending => Poll::Pending,
            PollResult::Aborted(terminal) => Poll::Ready(Err(terminal.into())),
            PollResult::Ready(resolution) => Poll::Ready((this
                .convert
                .take()
                .expect("an awaitable must not be polled after completion"))(
                resolution
            )),
        }
    }
}

/// Awaits a raw deferred value, without conversion.
async fn raw_await(
    machine: &Rc<RefCell<StateMachine>>,
    handle: DeferredHandle,
) -> Result<DeferredValue, HandlerError> {
    struct RawAwait {
        machine: Rc<RefCell<StateMachine>>,
        handle: DeferredHandle,
    }

    impl Future for RawAwait {
        type Output = Result<DeferredValue, HandlerError>;

        fn poll(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
            match self.machine.borrow_mut().poll_deferred(self.handle.0) {
                PollResult::Pending => Poll::Pending,
                PollResult::Aborted(terminal) => Poll::Ready(Err(terminal.into())),
                PollResult::Ready(resolution) => Poll::Ready(single(resolution)),
            }
        }
    }

    RawAwait {
        machine: machine.clone(),
        handle,
    }
    .await
}

fn single(resolution: Resolution) -> Result<DeferredValue, HandlerError> {
    match resolution {
        Resolution::Single(result) => result.map_err(HandlerError::from),
        _ => Err(unexpected_resolution()),
    }
}

fn unexpected_resolution() -> HandlerError {
    HandlerError::from(anyhow::anyhow!(
        "a deferred result resolved with an unexpected shape"
    ))
}

fn key_bytes(key: &str) -> Bytes {
    Bytes::copy_from_slice(key.as_bytes())
}
