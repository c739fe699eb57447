// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Per-entry-kind logic: how a freshly requested operation is checked against
//! a replayed entry, how completions are applied in place, and how the
//! current result of an entry is read out.

use crate::error::ProtocolViolation;

use restate_sdk_types::errors::TerminalError;
use restate_sdk_types::identifiers::EntryIndex;
use restate_sdk_types::journal::{
    CompletionResult, Entry, EntryResult, GetStateResult, SleepResult,
};

/// Checks that the entry the handler requested structurally matches the
/// journalled entry being replayed at the same index.
///
/// Only the essential parameters are compared. Fields annotated by the
/// runtime (results) and fields derived from the wall clock (wake-up and
/// invoke times) are deliberately ignored, as they cannot be recomputed
/// deterministically.
pub(crate) fn check_entry_header(
    index: EntryIndex,
    requested: &Entry,
    journalled: &Entry,
) -> Result<(), ProtocolViolation> {
    let mismatch = |field: &'static str| ProtocolViolation::EntryFieldMismatch {
        index,
        ty: requested.ty(),
        field,
    };

    match (requested, journalled) {
        (Entry::PollInputStream(_), Entry::PollInputStream(_)) => Ok(()),
        (Entry::OutputStream(_), Entry::OutputStream(_)) => Ok(()),
        (Entry::GetState(requested), Entry::GetState(journalled)) => {
            if requested.key != journalled.key {
                return Err(mismatch("key"));
            }
            Ok(())
        }
        (Entry::SetState(requested), Entry::SetState(journalled)) => {
            if requested.key != journalled.key {
                return Err(mismatch("key"));
            }
            if requested.value != journalled.value {
                return Err(mismatch("value"));
            }
            Ok(())
        }
        (Entry::ClearState(requested), Entry::ClearState(journalled)) => {
            if requested.key != journalled.key {
                return Err(mismatch("key"));
            }
            Ok(())
        }
        (Entry::Sleep(_), Entry::Sleep(_)) => Ok(()),
        (Entry::Invoke(requested), Entry::Invoke(journalled)) => {
            if requested.request.service_name != journalled.request.service_name {
                return Err(mismatch("service_name"));
            }
            if requested.request.method_name != journalled.request.method_name {
                return Err(mismatch("method_name"));
            }
            if requested.request.parameter != journalled.request.parameter {
                return Err(mismatch("parameter"));
            }
            Ok(())
        }
        (Entry::BackgroundInvoke(requested), Entry::BackgroundInvoke(journalled)) => {
            if requested.request.service_name != journalled.request.service_name {
                return Err(mismatch("service_name"));
            }
            if requested.request.method_name != journalled.request.method_name {
                return Err(mismatch("method_name"));
            }
            if requested.request.parameter != journalled.request.parameter {
                return Err(mismatch("parameter"));
            }
            Ok(())
        }
        (Entry::Awakeable(_), Entry::Awakeable(_)) => Ok(()),
        (Entry::CompleteAwakeable(requested), Entry::CompleteAwakeable(journalled)) => {
            if requested.id != journalled.id {
                return Err(mismatch("id"));
            }
            Ok(())
        }
        (Entry::SideEffect(_), Entry::SideEffect(_)) => Ok(()),
        (Entry::CombinatorAwaitable(_), Entry::CombinatorAwaitable(_)) => Ok(()),
        (requested, journalled) => Err(ProtocolViolation::EntryTypeMismatch {
            index,
            requested: requested.ty(),
            journalled: journalled.ty(),
        }),
    }
}

pub(crate) enum AppliedCompletion {
    /// The completion was applied to the entry.
    Applied,
    /// The entry already carried the same result. Tolerated as an idempotent
    /// retransmission.
    Duplicate,
}

/// Applies a completion result in place to the entry at `index`.
pub(crate) fn apply_completion(
    index: EntryIndex,
    entry: &mut Entry,
    result: CompletionResult,
) -> Result<AppliedCompletion, ProtocolViolation> {
    if let Some(current) = completion_view(entry) {
        return if current == result {
            Ok(AppliedCompletion::Duplicate)
        } else {
            Err(ProtocolViolation::DuplicateCompletionMismatch(index))
        };
    }

    let ty = entry.ty();
    let not_completable = move || ProtocolViolation::EntryNotCompletable { index, ty };

    match entry {
        Entry::GetState(e) => {
            e.value = Some(match result {
                CompletionResult::Empty => GetStateResult::Empty,
                CompletionResult::Success(b) => GetStateResult::Result(b),
                CompletionResult::Failure(code, msg) => GetStateResult::Failure(code, msg),
            });
        }
        Entry::Sleep(e) => {
            e.result = Some(match result {
                CompletionResult::Empty => SleepResult::Fired,
                // A sleep only ever completes empty or failed.
                CompletionResult::Success(_) => return Err(not_completable()),
                CompletionResult::Failure(code, msg) => SleepResult::Failure(code, msg),
            });
        }
        Entry::Invoke(e) => {
            e.result = Some(match result {
                CompletionResult::Empty => EntryResult::Success(Default::default()),
                CompletionResult::Success(b) => EntryResult::Success(b),
                CompletionResult::Failure(code, msg) => EntryResult::Failure(code, msg),
            });
        }
        Entry::Awakeable(e) => {
            e.result = Some(match result {
                CompletionResult::Empty => EntryResult::Success(Default::default()),
                CompletionResult::Success(b) => EntryResult::Success(b),
                CompletionResult::Failure(code, msg) => EntryResult::Failure(code, msg),
            });
        }
        _ => return Err(not_completable()),
    }

    Ok(AppliedCompletion::Applied)
}

/// Reads the entry result back out as the completion that would produce it,
/// used to detect idempotent duplicate completions.
fn completion_view(entry: &Entry) -> Option<CompletionResult> {
    match entry {
        Entry::GetState(e) => e.value.clone().map(|v| match v {
            GetStateResult::Empty => CompletionResult::Empty,
            GetStateResult::Result(b) => CompletionResult::Success(b),
            GetStateResult::Failure(code, msg) => CompletionResult::Failure(code, msg),
        }),
        Entry::Sleep(e) => e.result.clone().map(|r| match r {
            SleepResult::Fired => CompletionResult::Empty,
            SleepResult::Failure(code, msg) => CompletionResult::Failure(code, msg),
        }),
        Entry::Invoke(e) => e.result.clone().map(entry_result_to_completion),
        Entry::Awakeable(e) => e.result.clone().map(entry_result_to_completion),
        _ => None,
    }
}

fn entry_result_to_completion(result: EntryResult) -> CompletionResult {
    match result {
        EntryResult::Success(b) => CompletionResult::Success(b),
        EntryResult::Failure(code, msg) => CompletionResult::Failure(code, msg),
    }
}

/// The value a deferred result resolves with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredValue {
    /// The operation completed without a payload (fired sleep, absent state key).
    Empty,
    Success(bytes::Bytes),
}

impl DeferredValue {
    /// The payload of the resolution; empty resolutions yield empty bytes.
    pub fn into_bytes(self) -> bytes::Bytes {
        match self {
            DeferredValue::Empty => bytes::Bytes::new(),
            DeferredValue::Success(b) => b,
        }
    }
}

/// Reads the current result of an awaitable entry, if it has one.
pub(crate) fn deferred_result_view(
    entry: &Entry,
) -> Option<Result<DeferredValue, TerminalError>> {
    let from_entry_result = |result: &EntryResult| match result {
        EntryResult::Success(b) => Ok(DeferredValue::Success(b.clone())),
        EntryResult::Failure(code, msg) => Err(TerminalError::new(*code, msg.to_string())),
    };

    match entry {
        Entry::GetState(e) => e.value.as_ref().map(|v| match v {
            GetStateResult::Empty => Ok(DeferredValue::Empty),
            GetStateResult::Result(b) => Ok(DeferredValue::Success(b.clone())),
            GetStateResult::Failure(code, msg) => {
                Err(TerminalError::new(*code, msg.to_string()))
            }
        }),
        Entry::Sleep(e) => e.result.as_ref().map(|r| match r {
            SleepResult::Fired => Ok(DeferredValue::Empty),
            SleepResult::Failure(code, msg) => Err(TerminalError::new(*code, msg.to_string())),
        }),
        Entry::Invoke(e) => e.result.as_ref().map(from_entry_result),
        Entry::Awakeable(e) => e.result.as_ref().map(from_entry_result),
        Entry::SideEffect(e) => Some(from_entry_result(&e.result)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;
    use restate_sdk_types::journal::InvokeRequest;

    #[test]
    fn get_state_key_mismatch() {
        let requested = Entry::get_state(Bytes::from_static(b"STATE"), None);
        let journalled = Entry::get_state(Bytes::from_static(b"other"), None);

        assert!(matches!(
            check_entry_header(1, &requested, &journalled),
            Err(ProtocolViolation::EntryFieldMismatch { field: "key", .. })
        ));
    }

    #[test]
    fn type_mismatch() {
        let requested = Entry::get_state(Bytes::from_static(b"STATE"), None);
        let journalled = Entry::clear_state(Bytes::from_static(b"STATE"));

        assert!(matches!(
            check_entry_header(1, &requested, &journalled),
            Err(ProtocolViolation::EntryTypeMismatch { .. })
        ));
    }

    #[test]
    fn sleep_ignores_wake_up_time() {
        use restate_sdk_types::time::MillisSinceEpoch;

        let requested = Entry::sleep(MillisSinceEpoch::new(100), None);
        let journalled = Entry::sleep(MillisSinceEpoch::new(200), None);

        assert!(check_entry_header(1, &requested, &journalled).is_ok());
    }

    #[test]
    fn duplicate_completion_is_idempotent() {
        let mut entry = Entry::invoke(
            InvokeRequest::new("Greeter", "greet", Bytes::new()),
            None,
        );

        assert!(matches!(
            apply_completion(
                1,
                &mut entry,
                CompletionResult::Success(Bytes::from_static(b"res"))
            ),
            Ok(AppliedCompletion::Applied)
        ));
        assert!(matches!(
            apply_completion(
                1,
                &mut entry,
                CompletionResult::Success(Bytes::from_static(b"res"))
            ),
            Ok(AppliedCompletion::Duplicate)
        ));
        assert!(matches!(
            apply_completion(
                1,
                &mut entry,
                CompletionResult::Success(Bytes::from_static(b"different"))
            ),
            Err(ProtocolViolation::DuplicateCompletionMismatch(1))
        ));
    }

    #[test]
    fn set_state_cannot_be_completed() {
        let mut entry = Entry::set_state(Bytes::from_static(b"k"), Bytes::from_static(b"v"));

        assert!(matches!(
            apply_completion(1, &mut entry, CompletionResult::Empty),
            Err(ProtocolViolation::EntryNotCompletable { .. })
        ));
    }
}
