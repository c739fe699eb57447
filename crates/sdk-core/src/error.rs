// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use restate_sdk_types::errors::{codes, InvocationError, TerminalError};
use restate_sdk_types::journal::EntryType;
use restate_sdk_types::identifiers::EntryIndex;

use std::fmt;

/// Error escaping a user handler.
///
/// Wraps either a [`TerminalError`], which completes the invocation with a
/// failure result, or any other error, which terminates the invocation stream
/// and lets the runtime retry it. User code typically just propagates these
/// with `?`.
pub struct HandlerError(anyhow::Error);

impl HandlerError {
    pub fn from_error(error: impl Into<anyhow::Error>) -> Self {
        HandlerError(error.into())
    }

    /// Shorthand to fail the invocation with a terminal failure.
    pub fn terminal(
        code: restate_sdk_types::errors::UserErrorCode,
        message: impl Into<String>,
    ) -> Self {
        HandlerError(anyhow::Error::new(TerminalError::new(code, message)))
    }

    /// Returns the wrapped terminal failure, if this is one.
    pub fn as_terminal(&self) -> Option<&TerminalError> {
        self.0.downcast_ref::<TerminalError>()
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.0
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<TerminalError> for HandlerError {
    fn from(value: TerminalError) -> Self {
        HandlerError(anyhow::Error::new(value))
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(value: anyhow::Error) -> Self {
        HandlerError(value)
    }
}

impl From<restate_sdk_types::payload::PayloadCodecError> for HandlerError {
    fn from(value: restate_sdk_types::payload::PayloadCodecError) -> Self {
        HandlerError(anyhow::Error::new(value))
    }
}

impl From<&HandlerError> for InvocationError {
    fn from(value: &HandlerError) -> Self {
        InvocationError::new(codes::UNKNOWN, format!("{:#}", value.0))
            .with_description(format!("{:?}", value.0))
    }
}

/// Violations of the invocation protocol detected by the engine. These close
/// the invocation stream with an [`InvocationError`].
#[derive(Debug, thiserror::Error)]
pub(crate) enum ProtocolViolation {
    #[error("unexpected {0:?} message received from the runtime in state {1}")]
    UnexpectedMessage(restate_sdk_protocol::message::MessageType, &'static str),
    #[error("expected a start message with at least one known entry")]
    EmptyJournal,
    #[error(
        "unexpected journal entry. The handler requested a {requested} operation at index {index}, but the journal contains a {journalled} entry"
    )]
    EntryTypeMismatch {
        index: EntryIndex,
        requested: EntryType,
        journalled: EntryType,
    },
    #[error(
        "unexpected journal entry at index {index}. The {ty} entry requested by the handler does not match the journalled one on field {field}"
    )]
    EntryFieldMismatch {
        index: EntryIndex,
        ty: EntryType,
        field: &'static str,
    },
    #[error("completion received for unknown journal index {0}")]
    CompletionForUnknownIndex(EntryIndex),
    #[error("completion received for {ty} entry at index {index}, which cannot be completed")]
    EntryNotCompletable { index: EntryIndex, ty: EntryType },
    #[error(
        "entry at index {0} was already completed with a different result. Duplicate completions must carry the same result"
    )]
    DuplicateCompletionMismatch(EntryIndex),
    #[error("cannot append a journal entry while replaying")]
    AppendWhileReplaying,
    #[error("cannot append further journal entries after the output entry")]
    AppendAfterOutput,
    #[error(
        "the journalled combinator resolution order references entry {0}, which has no result yet"
    )]
    UnresolvedCombinatorChild(EntryIndex),
    #[error("unexpected journalled operation inside a side effect. Side effect closures must not interact with the invocation context")]
    JournalOpInsideSideEffect,
}

impl ProtocolViolation {
    fn code(&self) -> restate_sdk_types::errors::InvocationErrorCode {
        match self {
            ProtocolViolation::EntryTypeMismatch { .. }
            | ProtocolViolation::EntryFieldMismatch { .. } => codes::JOURNAL_MISMATCH,
            ProtocolViolation::JournalOpInsideSideEffect
            | ProtocolViolation::DuplicateCompletionMismatch(_)
            | ProtocolViolation::UnresolvedCombinatorChild(_) => codes::INTERNAL,
            _ => codes::PROTOCOL_VIOLATION,
        }
    }
}

impl From<ProtocolViolation> for InvocationError {
    fn from(value: ProtocolViolation) -> Self {
        let code = value.code();
        InvocationError::new(code, value)
    }
}

/// Raised to user code awaiting or issuing operations after the engine closed.
pub(crate) fn aborted() -> TerminalError {
    TerminalError::new(
        restate_sdk_types::errors::UserErrorCode::Aborted,
        "invocation aborted",
    )
}
