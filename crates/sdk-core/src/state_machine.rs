// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Drives the lifecycle of a single invocation: start, replay of the
//! journalled prefix, processing of fresh operations, and the closing
//! decision (output, error or suspension).

use crate::deferred::{DeferredGraph, DeferredId, Resolution};
use crate::eager_state::{EagerGet, EagerState};
use crate::entries::{self, AppliedCompletion};
use crate::error::{self, HandlerError, ProtocolViolation};
use crate::journal::Journal;

use bytes::Bytes;
use bytestring::ByteString;
use restate_sdk_protocol::awakeable_id::AwakeableIdentifier;
use restate_sdk_protocol::message::ProtocolMessage;
use restate_sdk_protocol::pb;
use restate_sdk_types::errors::InvocationError;
use restate_sdk_types::identifiers::{EntryIndex, InvocationId, InvocationTarget};
use restate_sdk_types::journal::{
    CompletionResult, Entry, EntryResult, GetStateResult, InvokeRequest,
};
use restate_sdk_types::time::MillisSinceEpoch;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, trace, warn};

#[derive(Debug)]
enum State {
    WaitingStart,
    WaitingReplayEntries,
    Executing,
    Closed,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::WaitingStart => "waiting-start",
            State::WaitingReplayEntries => "waiting-replay-entries",
            State::Executing => "executing",
            State::Closed => "closed",
        }
    }
}

#[derive(Debug)]
struct InvocationMetadata {
    invocation_id: InvocationId,
    debug_id: String,
}

/// Outcome of a state read.
pub(crate) enum GetStateOutcome {
    /// Served from the local writes of this invocation, without journalling.
    Ready(Option<Bytes>),
    Deferred(DeferredId),
}

/// Outcome of entering a side effect.
pub(crate) enum SideEffectEnter {
    /// The recorded result of a previous execution. The closure must not run.
    Replayed(EntryResult),
    /// First execution: the closure runs, guarded against journalled operations.
    Execute,
}

/// Outcome of polling a deferred result.
pub(crate) enum PollResult {
    Pending,
    Ready(Resolution),
    /// The engine closed under the caller; unwind.
    Aborted(restate_sdk_types::errors::TerminalError),
}

enum EnterOutcome {
    Replayed { index: EntryIndex, entry: Entry },
    Appended { index: EntryIndex },
}

pub(crate) struct StateMachine {
    target: InvocationTarget,
    state: State,
    metadata: Option<InvocationMetadata>,
    journal: Journal,
    eager: EagerState,
    deferred: DeferredGraph,
    output: VecDeque<ProtocolMessage>,
    /// Results delivered ahead of their entry. The runtime may answer faster
    /// than user code progresses; these are applied as soon as the entry at
    /// that index is journalled.
    pending_completions: HashMap<EntryIndex, CompletionResult>,
    pending_acks: HashSet<EntryIndex>,
    /// Deferred results the handler is currently parked on; reset before
    /// every handler resumption.
    blocked: Vec<DeferredId>,
    inside_side_effect: bool,
}

impl StateMachine {
    pub(crate) fn new(target: InvocationTarget) -> Self {
        Self {
            target,
            state: State::WaitingStart,
            metadata: None,
            journal: Journal::new(0),
            eager: EagerState::new(HashMap::new(), true),
            deferred: DeferredGraph::default(),
            output: VecDeque::new(),
            pending_completions: HashMap::new(),
            pending_acks: HashSet::new(),
            blocked: Vec::new(),
            inside_side_effect: false,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// True once the whole replay journal was received and the handler can run.
    pub(crate) fn is_executing(&self) -> bool {
        matches!(self.state, State::Executing)
    }

    pub(crate) fn pop_output(&mut self) -> Option<ProtocolMessage> {
        self.output.pop_front()
    }

    fn debug_id(&self) -> &str {
        self.metadata
            .as_ref()
            .map(|m| m.debug_id.as_str())
            .unwrap_or("<unknown>")
    }

    // --- Inbound message handling

    pub(crate) fn handle_message(&mut self, msg: ProtocolMessage) -> Result<(), InvocationError> {
        match (&self.state, msg) {
            (State::WaitingStart, ProtocolMessage::Start(m)) => self.on_start(m),
            (State::WaitingReplayEntries, ProtocolMessage::Entry(entry)) => {
                self.on_replay_entry(entry)
            }
            (
                State::WaitingReplayEntries | State::Executing,
                ProtocolMessage::Completion(m),
            ) => self.on_completion(m),
            (
                State::WaitingReplayEntries | State::Executing,
                ProtocolMessage::EntryAck(m),
            ) => self.on_entry_ack(m.entry_index),
            (state, msg) => Err(ProtocolViolation::UnexpectedMessage(msg.ty(), state.name()).into()),
        }
    }

    fn on_start(&mut self, msg: pb::protocol::StartMessage) -> Result<(), InvocationError> {
        if msg.known_entries == 0 {
            return Err(ProtocolViolation::EmptyJournal.into());
        }

        let invocation_id = InvocationId::new(msg.invocation_id);
        let debug_id = if msg.debug_id.is_empty() {
            invocation_id.to_string()
        } else {
            msg.debug_id
        };

        debug!(
            restate.invocation.id = %debug_id,
            restate.invocation.target = %self.target,
            known_entries = msg.known_entries,
            partial_state = msg.partial_state,
            "Invocation started"
        );

        self.journal = Journal::new(msg.known_entries);
        self.eager = EagerState::new(
            msg.state_map
                .into_iter()
                .map(|e| (e.key, e.value))
                .collect(),
            !msg.partial_state,
        );
        self.metadata = Some(InvocationMetadata {
            invocation_id,
            debug_id,
        });
        self.state = State::WaitingReplayEntries;
        Ok(())
    }

    fn on_replay_entry(&mut self, entry: Entry) -> Result<(), InvocationError> {
        let index = self.journal.push_replay_entry(entry);
        trace!(
            restate.invocation.id = %self.debug_id(),
            restate.journal.index = index,
            "Received replay entry"
        );
        if let Some(result) = self.pending_completions.remove(&index) {
            self.apply_completion(index, result)?;
        }
        if self.journal.is_complete() {
            debug!(
                restate.invocation.id = %self.debug_id(),
                restate.journal.size = self.journal.size(),
                "Replay journal received, transitioning to executing"
            );
            self.state = State::Executing;
        }
        Ok(())
    }

    fn on_completion(
        &mut self,
        msg: pb::protocol::CompletionMessage,
    ) -> Result<(), InvocationError> {
        let index = msg.entry_index;
        let result = match msg.result {
            None | Some(pb::protocol::completion_message::Result::Empty(())) => {
                CompletionResult::Empty
            }
            Some(pb::protocol::completion_message::Result::Value(b)) => {
                CompletionResult::Success(b)
            }
            Some(pb::protocol::completion_message::Result::Failure(f)) => {
                CompletionResult::Failure(f.code.into(), f.message.into())
            }
        };

        if self.journal.get(index).is_none() {
            // Delivered ahead of the entry; hold on to it until the handler
            // journals the operation at that index.
            if let Some(previous) = self.pending_completions.get(&index) {
                if *previous != result {
                    return Err(ProtocolViolation::DuplicateCompletionMismatch(index).into());
                }
                return Ok(());
            }
            self.pending_completions.insert(index, result);
            return Ok(());
        }

        self.apply_completion(index, result)
    }

    fn apply_completion(
        &mut self,
        index: EntryIndex,
        result: CompletionResult,
    ) -> Result<(), InvocationError> {
        match self.journal.complete(index, result)? {
            AppliedCompletion::Applied => {
                trace!(
                    restate.invocation.id = %self.debug_id(),
                    restate.journal.index = index,
                    "Applied completion"
                );
                let entry = self
                    .journal
                    .get(index)
                    .expect("the entry was just completed");
                if let Entry::GetState(e) = entry {
                    let learned = match &e.value {
                        Some(GetStateResult::Result(b)) => Some(Some(b.clone())),
                        Some(GetStateResult::Empty) => Some(None),
                        _ => None,
                    };
                    if let Some(value) = learned {
                        self.eager.learn(e.key.clone(), value);
                    }
                }
                if let Some(result) = entries::deferred_result_view(entry) {
                    self.deferred.resolve_entry(index, result);
                }
            }
            AppliedCompletion::Duplicate => {
                trace!(
                    restate.invocation.id = %self.debug_id(),
                    restate.journal.index = index,
                    "Ignoring duplicate completion"
                );
            }
        }
        Ok(())
    }

    fn on_entry_ack(&mut self, index: EntryIndex) -> Result<(), InvocationError> {
        if self.journal.get(index).is_none() {
            self.pending_acks.insert(index);
            return Ok(());
        }
        if !self.deferred.resolve_ack(index) {
            trace!(
                restate.invocation.id = %self.debug_id(),
                restate.journal.index = index,
                "Ignoring ack for an entry nothing waits on"
            );
        }
        Ok(())
    }

    // --- Closing

    pub(crate) fn fail(&mut self, error: InvocationError) {
        if self.is_closed() {
            trace!(
                restate.invocation.id = %self.debug_id(),
                %error,
                "Ignoring failure, the invocation is already closed"
            );
            return;
        }
        warn!(
            restate.invocation.id = %self.debug_id(),
            %error,
            "Closing the invocation with an error"
        );
        self.output.push_back(ProtocolMessage::from(&error));
        self.state = State::Closed;
    }

    /// Emits the suspension message and closes, if the handler is parked on
    /// unresolved deferred results. Invoked by the engine when no buffered
    /// input is left to resolve any of them.
    pub(crate) fn suspend_if_blocked(&mut self) {
        if self.is_closed() {
            return;
        }
        let indices = self.pending_suspension();
        if indices.is_empty() {
            return;
        }
        debug!(
            restate.invocation.id = %self.debug_id(),
            indices = ?indices,
            "Suspending the invocation"
        );
        self.output
            .push_back(ProtocolMessage::new_suspension_message(indices));
        self.state = State::Closed;
    }

    fn pending_suspension(&self) -> Vec<EntryIndex> {
        if !self.is_executing() {
            return vec![];
        }
        let mut indices: Vec<EntryIndex> = self
            .blocked
            .iter()
            .flat_map(|id| self.deferred.unresolved_leaves(*id))
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    pub(crate) fn clear_blocked(&mut self) {
        self.blocked.clear();
    }

    /// Applies the handler's return value or error.
    pub(crate) fn on_handler_result(&mut self, result: Result<Bytes, HandlerError>) {
        if self.is_closed() {
            trace!(
                restate.invocation.id = %self.debug_id(),
                "Ignoring the handler result, the invocation is already closed"
            );
            return;
        }
        match result {
            Ok(bytes) => self.sys_output(EntryResult::Success(bytes)),
            Err(error) => match error.as_terminal() {
                Some(terminal) => {
                    debug!(
                        restate.invocation.id = %self.debug_id(),
                        %terminal,
                        "Handler failed with a terminal error"
                    );
                    self.sys_output(terminal.clone().into())
                }
                None => self.fail(InvocationError::from(&error)),
            },
        }
    }

    fn sys_output(&mut self, result: EntryResult) {
        // A journal mismatch inside fails the machine; nothing to propagate.
        if self.enter_journal_op(Entry::output_stream(result)).is_ok() {
            debug!(
                restate.invocation.id = %self.debug_id(),
                "Invocation completed, closing"
            );
            self.state = State::Closed;
        }
    }

    // --- Operations requested through the handler bridge

    /// The input operation, always journal index 0.
    pub(crate) fn sys_poll_input(&mut self) -> Result<Bytes, InvocationError> {
        debug_assert!(self.is_executing());
        match self.enter_journal_op(Entry::poll_input_stream(Bytes::new())) {
            Ok(EnterOutcome::Replayed { entry, .. }) => match entry {
                Entry::PollInputStream(e) => match e.result {
                    EntryResult::Success(bytes) => Ok(bytes),
                    EntryResult::Failure(code, msg) => {
                        Err(InvocationError::new(u32::from(code) as u16, msg))
                    }
                },
                _ => unreachable!("enter_journal_op checked the entry type"),
            },
            // A fresh journal always carries the input entry, so the input
            // operation can never hit the append path.
            Ok(EnterOutcome::Appended { .. }) => Err(ProtocolViolation::EmptyJournal.into()),
            Err(_) => Err(InvocationError::new(
                restate_sdk_types::errors::codes::JOURNAL_MISMATCH,
                "the first journal entry is not the invocation input",
            )),
        }
    }

    pub(crate) fn sys_get_state(&mut self, key: Bytes) -> Result<GetStateOutcome, HandlerError> {
        self.check_op()?;
        match self.eager.get(&key) {
            EagerGet::Local(value) => {
                trace!(
                    restate.invocation.id = %self.debug_id(),
                    "Serving get from the local writes, no journal entry"
                );
                Ok(GetStateOutcome::Ready(value))
            }
            _ if self.journal.replaying() => {
                match self.enter_journal_op(Entry::get_state(key, None))? {
                    EnterOutcome::Replayed { index, entry } => {
                        if let Entry::GetState(e) = &entry {
                            match &e.value {
                                Some(GetStateResult::Result(b)) => {
                                    self.eager.learn(e.key.clone(), Some(b.clone()))
                                }
                                Some(GetStateResult::Empty) => {
                                    self.eager.learn(e.key.clone(), None)
                                }
                                _ => {}
                            }
                        }
                        Ok(GetStateOutcome::Deferred(
                            match entries::deferred_result_view(&entry) {
                                Some(result) => {
                                    self.deferred.create_resolved_single(index, result)
                                }
                                None => self.deferred.create_single(index),
                            },
                        ))
                    }
                    EnterOutcome::Appended { .. } => {
                        unreachable!("appends don't happen while replaying")
                    }
                }
            }
            EagerGet::Cached(value) => {
                // Synthesize a completed entry from the cache; the runtime
                // does not need to answer.
                let entry_value = match &value {
                    Some(b) => GetStateResult::Result(b.clone()),
                    None => GetStateResult::Empty,
                };
                self.enter_journal_op(Entry::get_state(key, Some(entry_value)))?;
                Ok(GetStateOutcome::Ready(value))
            }
            EagerGet::Unknown => {
                match self.enter_journal_op(Entry::get_state(key, None))? {
                    EnterOutcome::Appended { index } => Ok(GetStateOutcome::Deferred(
                        self.register_completable(index),
                    )),
                    EnterOutcome::Replayed { .. } => {
                        unreachable!("the replay path is handled above")
                    }
                }
            }
        }
    }

    pub(crate) fn sys_set_state(&mut self, key: Bytes, value: Bytes) -> Result<(), HandlerError> {
        self.check_op()?;
        self.eager.set(key.clone(), value.clone());
        self.enter_journal_op(Entry::set_state(key, value))?;
        Ok(())
    }

    pub(crate) fn sys_clear_state(&mut self, key: Bytes) -> Result<(), HandlerError> {
        self.check_op()?;
        self.eager.clear(key.clone());
        self.enter_journal_op(Entry::clear_state(key))?;
        Ok(())
    }

    pub(crate) fn sys_sleep(&mut self, duration: Duration) -> Result<DeferredId, HandlerError> {
        self.check_op()?;
        let wake_up_time = MillisSinceEpoch::now() + duration;
        Ok(self.completable_op(Entry::sleep(wake_up_time, None))?.1)
    }

    pub(crate) fn sys_call(&mut self, request: InvokeRequest) -> Result<DeferredId, HandlerError> {
        self.check_op()?;
        Ok(self.completable_op(Entry::invoke(request, None))?.1)
    }

    pub(crate) fn sys_background_invoke(
        &mut self,
        request: InvokeRequest,
        delay: Option<Duration>,
    ) -> Result<(), HandlerError> {
        self.check_op()?;
        let invoke_time = delay.map(|delay| MillisSinceEpoch::now() + delay);
        self.enter_journal_op(Entry::background_invoke(request, invoke_time))?;
        Ok(())
    }

    pub(crate) fn sys_awakeable(&mut self) -> Result<(String, DeferredId), HandlerError> {
        self.check_op()?;
        let (index, deferred_id) = self.completable_op(Entry::awakeable(None))?;
        let invocation_id = self
            .metadata
            .as_ref()
            .expect("the start message was processed")
            .invocation_id
            .clone();
        Ok((
            AwakeableIdentifier::new(invocation_id, index).to_string(),
            deferred_id,
        ))
    }

    pub(crate) fn sys_complete_awakeable(
        &mut self,
        id: ByteString,
        result: EntryResult,
    ) -> Result<(), HandlerError> {
        self.check_op()?;
        self.enter_journal_op(Entry::complete_awakeable(id, result))?;
        Ok(())
    }

    pub(crate) fn sys_side_effect_enter(&mut self) -> Result<SideEffectEnter, HandlerError> {
        self.check_op()?;
        if self.journal.replaying() {
            match self.enter_journal_op(Entry::side_effect(EntryResult::Success(Bytes::new())))? {
                EnterOutcome::Replayed { entry, .. } => match entry {
                    Entry::SideEffect(e) => Ok(SideEffectEnter::Replayed(e.result)),
                    _ => unreachable!("enter_journal_op checked the entry type"),
                },
                EnterOutcome::Appended { .. } => {
                    unreachable!("appends don't happen while replaying")
                }
            }
        } else {
            self.inside_side_effect = true;
            Ok(SideEffectEnter::Execute)
        }
    }

    /// Records the result of a freshly executed side effect and returns the
    /// deferred ack to await before handing the value back to user code.
    pub(crate) fn sys_side_effect_exit(
        &mut self,
        result: EntryResult,
    ) -> Result<DeferredId, HandlerError> {
        debug_assert!(self.inside_side_effect);
        self.inside_side_effect = false;
        if self.is_closed() {
            return Err(error::aborted().into());
        }
        match self.enter_journal_op(Entry::side_effect(result))? {
            EnterOutcome::Appended { index } => {
                let ack = self.deferred.create_ack(index);
                if self.pending_acks.remove(&index) {
                    self.deferred.resolve_ack(index);
                }
                Ok(ack)
            }
            EnterOutcome::Replayed { .. } => {
                unreachable!("side effects only execute in processing mode")
            }
        }
    }

    /// Aborts the invocation with the retryable error a side effect closure
    /// produced.
    pub(crate) fn sys_side_effect_abort(&mut self, error: &HandlerError) {
        self.inside_side_effect = false;
        self.fail(InvocationError::from(error));
    }

    pub(crate) fn sys_all(&mut self, children: Vec<DeferredId>) -> DeferredId {
        self.deferred.create_all(children)
    }

    pub(crate) fn sys_any(&mut self, children: Vec<DeferredId>) -> DeferredId {
        self.deferred.create_any(children)
    }

    // --- Awaiting

    pub(crate) fn poll_deferred(&mut self, id: DeferredId) -> PollResult {
        if self.is_closed() {
            return PollResult::Aborted(error::aborted());
        }

        if let Some(resolution) = self.deferred.resolution(id) {
            return PollResult::Ready(resolution);
        }

        if self.deferred.is_combinator(id) {
            return self.poll_combinator(id);
        }

        self.note_blocked(id);
        PollResult::Pending
    }

    /// Combinator awaits are journalled operations themselves: the entry
    /// freezing the resolution order is consumed (replay) or appended
    /// (processing) the first time the await resolves.
    fn poll_combinator(&mut self, id: DeferredId) -> PollResult {
        if self.journal.replaying() {
            let entry = match self.enter_journal_op(Entry::combinator_awaitable(vec![])) {
                Ok(EnterOutcome::Replayed { entry, .. }) => entry,
                Ok(EnterOutcome::Appended { .. }) => {
                    unreachable!("appends don't happen while replaying")
                }
                Err(_) => return PollResult::Aborted(error::aborted()),
            };
            let stored_order = match entry {
                Entry::CombinatorAwaitable(e) => e.entry_indexes,
                _ => unreachable!("enter_journal_op checked the entry type"),
            };
            if let Err(violation) = self.deferred.resolve_combinator_replay(id, &stored_order) {
                self.fail(violation.into());
                return PollResult::Aborted(error::aborted());
            }
        } else {
            match self.deferred.try_resolve_combinator(id) {
                Some(order) => {
                    if self
                        .enter_journal_op(Entry::combinator_awaitable(order))
                        .is_err()
                    {
                        return PollResult::Aborted(error::aborted());
                    }
                }
                None => {
                    self.note_blocked(id);
                    return PollResult::Pending;
                }
            }
        }

        PollResult::Ready(
            self.deferred
                .resolution(id)
                .expect("the combinator just resolved"),
        )
    }

    fn note_blocked(&mut self, id: DeferredId) {
        if !self.blocked.contains(&id) {
            self.blocked.push(id);
        }
    }

    // --- Journal entry plumbing

    fn check_op(&mut self) -> Result<(), HandlerError> {
        if self.is_closed() {
            return Err(error::aborted().into());
        }
        if self.inside_side_effect {
            self.fail(ProtocolViolation::JournalOpInsideSideEffect.into());
            return Err(error::aborted().into());
        }
        Ok(())
    }

    /// Matches the requested operation against the replayed entry at the
    /// current index, or appends it as a fresh entry and emits the
    /// corresponding outbound message.
    fn enter_journal_op(&mut self, requested: Entry) -> Result<EnterOutcome, HandlerError> {
        if self.journal.replaying() {
            let index = self.journal.user_index();
            let journalled = self
                .journal
                .current_replay_entry()
                .expect("the whole replay journal is buffered before execution starts")
                .clone();
            if let Err(violation) = entries::check_entry_header(index, &requested, &journalled) {
                self.fail(violation.into());
                return Err(error::aborted().into());
            }
            self.journal.advance_replay();
            trace!(
                restate.invocation.id = %self.debug_id(),
                restate.journal.index = index,
                restate.journal.entry_type = %journalled.ty(),
                "Matched replayed entry"
            );
            Ok(EnterOutcome::Replayed {
                index,
                entry: journalled,
            })
        } else {
            let index = match self.journal.append(requested.clone()) {
                Ok(index) => index,
                Err(violation) => {
                    self.fail(violation.into());
                    return Err(error::aborted().into());
                }
            };
            trace!(
                restate.invocation.id = %self.debug_id(),
                restate.journal.index = index,
                restate.journal.entry_type = %requested.ty(),
                "Appended journal entry"
            );
            self.output.push_back(ProtocolMessage::Entry(requested));
            Ok(EnterOutcome::Appended { index })
        }
    }

    fn completable_op(&mut self, requested: Entry) -> Result<(EntryIndex, DeferredId), HandlerError> {
        match self.enter_journal_op(requested)? {
            EnterOutcome::Replayed { index, entry } => Ok((
                index,
                match entries::deferred_result_view(&entry) {
                    Some(result) => self.deferred.create_resolved_single(index, result),
                    None => self.deferred.create_single(index),
                },
            )),
            EnterOutcome::Appended { index } => Ok((index, self.register_completable(index))),
        }
    }

    /// Registers the deferred result of a freshly appended completable entry,
    /// applying a completion that was delivered ahead of it.
    fn register_completable(&mut self, index: EntryIndex) -> DeferredId {
        let id = self.deferred.create_single(index);
        if let Some(result) = self.pending_completions.remove(&index) {
            if let Err(error) = self.apply_completion(index, result) {
                self.fail(error);
            }
        }
        id
    }
}
