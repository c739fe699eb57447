// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Maps `(service, method)` pairs to handler functions.

use crate::context::Context;
use crate::error::HandlerError;

use bytes::Bytes;
use bytestring::ByteString;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use restate_sdk_types::errors::InvocationError;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

pub type HandlerResult = Result<Bytes, HandlerError>;

/// A registered handler: opaque request bytes in, opaque response bytes out.
pub type BoxedHandler = Rc<dyn Fn(Context, Bytes) -> LocalBoxFuture<'static, HandlerResult>>;

#[derive(Default, Clone)]
pub struct ServiceRegistry {
    handlers: HashMap<(ByteString, ByteString), BoxedHandler>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(
        &mut self,
        service: impl Into<ByteString>,
        method: impl Into<ByteString>,
        handler: F,
    ) where
        F: Fn(Context, Bytes) -> Fut + 'static,
        Fut: Future<Output = HandlerResult> + 'static,
    {
        self.handlers.insert(
            (service.into(), method.into()),
            Rc::new(move |ctx, input| handler(ctx, input).boxed_local()),
        );
    }

    pub fn resolve(&self, service: &str, method: &str) -> Result<BoxedHandler, InvocationError> {
        self.handlers
            .get(&(ByteString::from(service), ByteString::from(method)))
            .cloned()
            .ok_or_else(|| InvocationError::service_handler_not_found(service, method))
    }
}
