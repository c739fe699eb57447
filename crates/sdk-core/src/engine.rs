// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The surface adapters drive: bytes in, bytes out, plus the cooperative
//! poll loop resuming the handler whenever inbound messages made progress
//! possible.

use crate::context::Context;
use crate::options::Options;
use crate::registry::{BoxedHandler, HandlerResult, ServiceRegistry};
use crate::state_machine::StateMachine;

use bytes::Bytes;
use futures::future::LocalBoxFuture;
use restate_sdk_protocol::message::{Decoder, Encoder};
use restate_sdk_types::errors::{codes, InvocationError};
use restate_sdk_types::identifiers::InvocationTarget;
use std::cell::RefCell;
use std::rc::Rc;
use std::task::Poll;
use tracing::trace;

/// One engine instance serves exactly one invocation.
///
/// The engine is sans-io: an adapter feeds it the inbound byte stream with
/// [`InvocationEngine::push_input`] and drains outbound frames with
/// [`InvocationEngine::poll_output`]. User code runs on the adapter's thread,
/// inside `push_input`, and suspends only at await points on deferred
/// results.
pub struct InvocationEngine {
    machine: Rc<RefCell<StateMachine>>,
    handler_fn: Option<BoxedHandler>,
    handler: Option<LocalBoxFuture<'static, HandlerResult>>,
    encoder: Encoder,
    decoder: Decoder,
}

impl InvocationEngine {
    pub fn new(target: InvocationTarget, handler: BoxedHandler, options: &Options) -> Self {
        Self {
            machine: Rc::new(RefCell::new(StateMachine::new(target))),
            handler_fn: Some(handler),
            handler: None,
            encoder: Encoder::new(),
            decoder: Decoder::new(
                options.message_size_warning(),
                options.message_size_limit(),
            ),
        }
    }

    /// Resolves the handler from the registry. Unknown targets fail before
    /// the engine exists; the adapter reports them to the runtime.
    pub fn from_registry(
        registry: &ServiceRegistry,
        target: InvocationTarget,
        options: &Options,
    ) -> Result<Self, InvocationError> {
        let handler = registry.resolve(&target.service_name, &target.method_name)?;
        Ok(Self::new(target, handler, options))
    }

    /// Feeds a chunk of the inbound stream. Chunk boundaries are arbitrary;
    /// all complete messages are processed and the handler is resumed.
    pub fn push_input(&mut self, bytes: Bytes) {
        if self.is_closed() {
            trace!("Discarding input pushed after the engine closed");
            return;
        }

        self.decoder.push(bytes);
        loop {
            if self.is_closed() {
                break;
            }
            match self.decoder.consume_next() {
                Ok(Some((_, msg))) => {
                    let result = self.machine.borrow_mut().handle_message(msg);
                    if let Err(error) = result {
                        self.machine.borrow_mut().fail(error);
                        break;
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    self.machine
                        .borrow_mut()
                        .fail(InvocationError::new(codes::PROTOCOL_VIOLATION, error));
                    break;
                }
            }
        }

        self.drive();
    }

    /// Next outbound frame, already encoded, or `None` when drained.
    pub fn poll_output(&mut self) -> Option<Bytes> {
        self.machine
            .borrow_mut()
            .pop_output()
            .map(|msg| self.encoder.encode(msg))
    }

    pub fn is_closed(&self) -> bool {
        self.machine.borrow().is_closed()
    }

    /// Starts the handler once the replay journal is in, then polls it. A
    /// pending handler with no buffered input left means the invocation
    /// either idles on external progress or suspends.
    fn drive(&mut self) {
        self.maybe_start_handler();

        if self.machine.borrow().is_closed() {
            self.handler = None;
            return;
        }
        let Some(handler) = self.handler.as_mut() else {
            return;
        };

        self.machine.borrow_mut().clear_blocked();
        let waker = futures::task::noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);
        match handler.as_mut().poll(&mut cx) {
            Poll::Ready(result) => {
                self.handler = None;
                self.machine.borrow_mut().on_handler_result(result);
            }
            Poll::Pending => {
                if self.machine.borrow().is_closed() {
                    self.handler = None;
                    return;
                }
                if !self.decoder.has_remaining() {
                    self.machine.borrow_mut().suspend_if_blocked();
                    if self.machine.borrow().is_closed() {
                        self.handler = None;
                    }
                }
            }
        }
    }

    fn maybe_start_handler(&mut self) {
        if self.handler.is_some() || self.handler_fn.is_none() {
            return;
        }
        {
            let machine = self.machine.borrow();
            if !machine.is_executing() {
                return;
            }
        }

        let input = match self.machine.borrow_mut().sys_poll_input() {
            Ok(input) => input,
            Err(error) => {
                self.machine.borrow_mut().fail(error);
                return;
            }
        };

        let handler_fn = self
            .handler_fn
            .take()
            .expect("checked above that the handler is still there");
        let ctx = Context::new(self.machine.clone());
        self.handler = Some(handler_fn(ctx, input));
    }
}
