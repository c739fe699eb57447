// Copyright (c) 2023 -  Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Tracks awaitable handles and combinator nodes over them.
//!
//! Leaves resolve when their journal entry receives a result. Combinators
//! resolve at await time, by evaluating the tree over the leaves resolved so
//! far: on first execution the leaves are ordered by arrival, and the order
//! that resolved the combinator is frozen into its journal entry; on replay
//! the journalled order is used instead, so the same child wins regardless
//! of the actual inbound ordering.

use crate::entries::DeferredValue;
use crate::error::ProtocolViolation;

use restate_sdk_types::errors::TerminalError;
use restate_sdk_types::identifiers::EntryIndex;
use std::collections::HashMap;

pub(crate) type DeferredId = usize;

/// Opaque handle to a deferred result, used to compose combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredHandle(pub(crate) DeferredId);

/// What a deferred result resolved to. The variant mirrors the node kind.
#[derive(Debug, Clone)]
pub(crate) enum Resolution {
    Single(Result<DeferredValue, TerminalError>),
    All(Result<Vec<DeferredValue>, TerminalError>),
    Any(Result<(usize, DeferredValue), TerminalError>),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    resolution: Option<Resolution>,
    /// Arrival stamp of the resolution, for leaves. Orders combinator
    /// evaluation on first execution.
    seq: Option<u64>,
    /// Leaf entry indices whose resolution produced `resolution`, in applied
    /// order. Journalled for combinators.
    order: Vec<EntryIndex>,
}

#[derive(Debug)]
enum NodeKind {
    Single { index: EntryIndex },
    Ack { index: EntryIndex },
    All { children: Vec<DeferredId> },
    Any { children: Vec<DeferredId> },
}

#[derive(Debug, Default)]
pub(crate) struct DeferredGraph {
    nodes: Vec<Node>,
    by_entry: HashMap<EntryIndex, DeferredId>,
    by_ack: HashMap<EntryIndex, DeferredId>,
    next_seq: u64,
}

impl DeferredGraph {
    pub(crate) fn create_single(&mut self, index: EntryIndex) -> DeferredId {
        let id = self.push(Node {
            kind: NodeKind::Single { index },
            resolution: None,
            seq: None,
            order: vec![],
        });
        self.by_entry.insert(index, id);
        id
    }

    pub(crate) fn create_resolved_single(
        &mut self,
        index: EntryIndex,
        result: Result<DeferredValue, TerminalError>,
    ) -> DeferredId {
        let id = self.create_single(index);
        self.resolve_leaf(id, result);
        id
    }

    pub(crate) fn create_ack(&mut self, index: EntryIndex) -> DeferredId {
        let id = self.push(Node {
            kind: NodeKind::Ack { index },
            resolution: None,
            seq: None,
            order: vec![],
        });
        self.by_ack.insert(index, id);
        id
    }

    pub(crate) fn create_all(&mut self, children: Vec<DeferredId>) -> DeferredId {
        self.push(Node {
            kind: NodeKind::All { children },
            resolution: None,
            seq: None,
            order: vec![],
        })
    }

    pub(crate) fn create_any(&mut self, children: Vec<DeferredId>) -> DeferredId {
        self.push(Node {
            kind: NodeKind::Any { children },
            resolution: None,
            seq: None,
            order: vec![],
        })
    }

    /// Resolves the leaf tracking the journal entry at `index`, if any.
    /// Returns whether a leaf transitioned to resolved.
    pub(crate) fn resolve_entry(
        &mut self,
        index: EntryIndex,
        result: Result<DeferredValue, TerminalError>,
    ) -> bool {
        match self.by_entry.get(&index).copied() {
            Some(id) if self.nodes[id].resolution.is_none() => {
                self.resolve_leaf(id, result);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn resolve_ack(&mut self, index: EntryIndex) -> bool {
        match self.by_ack.get(&index).copied() {
            Some(id) if self.nodes[id].resolution.is_none() => {
                self.resolve_leaf(id, Ok(DeferredValue::Empty));
                true
            }
            _ => false,
        }
    }

    pub(crate) fn resolution(&self, id: DeferredId) -> Option<Resolution> {
        self.nodes[id].resolution.clone()
    }

    pub(crate) fn is_combinator(&self, id: DeferredId) -> bool {
        matches!(
            self.nodes[id].kind,
            NodeKind::All { .. } | NodeKind::Any { .. }
        )
    }

    /// Evaluates an unresolved combinator against the leaves resolved so
    /// far. If it resolves, the resolution is cached on the node and the leaf
    /// order to journal is returned.
    pub(crate) fn try_resolve_combinator(
        &mut self,
        id: DeferredId,
    ) -> Option<Vec<EntryIndex>> {
        debug_assert!(self.is_combinator(id) && self.nodes[id].resolution.is_none());

        match self.eval(id, &|node: &Node| node.seq) {
            Ok(Some(eval)) => {
                let order = eval.order.clone();
                let node = &mut self.nodes[id];
                node.resolution = Some(eval.resolution);
                node.order = eval.order;
                Some(order)
            }
            // Strict evaluation errors cannot happen against live leaves.
            Ok(None) | Err(_) => None,
        }
    }

    /// Resolves an unresolved combinator from its journalled leaf order.
    /// Leaves outside the journalled order are treated as unresolved, as they
    /// were when the order was frozen.
    pub(crate) fn resolve_combinator_replay(
        &mut self,
        id: DeferredId,
        stored_order: &[EntryIndex],
    ) -> Result<(), ProtocolViolation> {
        debug_assert!(self.is_combinator(id) && self.nodes[id].resolution.is_none());

        let ranks: HashMap<EntryIndex, u64> = stored_order
            .iter()
            .enumerate()
            .map(|(rank, index)| (*index, rank as u64))
            .collect();

        let seq_of = |node: &Node| match node.kind {
            NodeKind::Single { index } | NodeKind::Ack { index } => {
                ranks.get(&index).copied()
            }
            _ => None,
        };

        // A leaf referenced by the journalled order must carry a result.
        for index in stored_order {
            let resolved = self
                .by_entry
                .get(index)
                .map(|id| self.nodes[*id].resolution.is_some())
                .unwrap_or(false);
            if !resolved {
                return Err(ProtocolViolation::UnresolvedCombinatorChild(*index));
            }
        }

        match self.eval(id, &seq_of)? {
            Some(eval) => {
                let node = &mut self.nodes[id];
                node.resolution = Some(eval.resolution);
                node.order = eval.order;
                Ok(())
            }
            None => Err(ProtocolViolation::UnresolvedCombinatorChild(
                stored_order.first().copied().unwrap_or_default(),
            )),
        }
    }

    /// Indices of the unresolved leaves under `id`, for the suspension set.
    pub(crate) fn unresolved_leaves(&self, id: DeferredId) -> Vec<EntryIndex> {
        let mut out = vec![];
        self.collect_unresolved_leaves(id, &mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_unresolved_leaves(&self, id: DeferredId, out: &mut Vec<EntryIndex>) {
        let node = &self.nodes[id];
        if node.resolution.is_some() {
            return;
        }
        match &node.kind {
            NodeKind::Single { index } | NodeKind::Ack { index } => out.push(*index),
            NodeKind::All { children } | NodeKind::Any { children } => {
                for child in children {
                    self.collect_unresolved_leaves(*child, out);
                }
            }
        }
    }

    fn push(&mut self, node: Node) -> DeferredId {
        let id = self.nodes.len();
        self.nodes.push(node);
        id
    }

    fn resolve_leaf(&mut self, id: DeferredId, result: Result<DeferredValue, TerminalError>) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let node = &mut self.nodes[id];
        debug_assert!(node.resolution.is_none());
        node.order = match node.kind {
            NodeKind::Single { index } | NodeKind::Ack { index } => vec![index],
            _ => unreachable!("resolve_leaf is only invoked on leaves"),
        };
        node.seq = Some(seq);
        node.resolution = Some(Resolution::Single(result));
    }

    /// Evaluates the tree under `id` with the given leaf ordering. Returns
    /// `Ok(None)` if the node does not resolve under that ordering.
    fn eval(
        &self,
        id: DeferredId,
        seq_of: &dyn Fn(&Node) -> Option<u64>,
    ) -> Result<Option<Eval>, ProtocolViolation> {
        let node = &self.nodes[id];
        match &node.kind {
            NodeKind::Single { .. } | NodeKind::Ack { .. } => {
                let Some(seq) = seq_of(node) else {
                    return Ok(None);
                };
                let Some(Resolution::Single(result)) = &node.resolution else {
                    return Ok(None);
                };
                Ok(Some(Eval {
                    seq,
                    order: node.order.clone(),
                    resolution: Resolution::Single(result.clone()),
                }))
            }
            NodeKind::All { children } => {
                let evals = children
                    .iter()
                    .map(|child| self.eval(*child, seq_of))
                    .collect::<Result<Vec<_>, _>>()?;

                // Fails on the earliest child failure, regardless of the
                // other children.
                let earliest_failure = evals
                    .iter()
                    .flatten()
                    .filter(|e| e.value().is_err())
                    .min_by_key(|e| e.seq);
                if let Some(failed) = earliest_failure {
                    return Ok(Some(Eval {
                        seq: failed.seq,
                        order: failed.order.clone(),
                        resolution: Resolution::All(Err(failed
                            .value()
                            .expect_err("filtered on failures above"))),
                    }));
                }

                if evals.iter().any(|e| e.is_none()) {
                    return Ok(None);
                }
                let mut evals: Vec<Eval> = evals.into_iter().flatten().collect();
                let values = evals
                    .iter()
                    .map(|e| e.value().expect("failures are handled above"))
                    .collect();
                let seq = evals.iter().map(|e| e.seq).max().unwrap_or_default();
                evals.sort_by_key(|e| e.seq);
                let mut order: Vec<EntryIndex> =
                    evals.into_iter().flat_map(|e| e.order).collect();
                dedup_preserving_order(&mut order);
                Ok(Some(Eval {
                    seq,
                    order,
                    resolution: Resolution::All(Ok(values)),
                }))
            }
            NodeKind::Any { children } => {
                let mut winner: Option<(usize, Eval)> = None;
                for (position, child) in children.iter().enumerate() {
                    if let Some(eval) = self.eval(*child, seq_of)? {
                        // Strictly-less keeps the first position on ties
                        // (the same handle listed twice).
                        if winner.as_ref().map(|(_, w)| eval.seq < w.seq).unwrap_or(true) {
                            winner = Some((position, eval));
                        }
                    }
                }
                Ok(winner.map(|(position, eval)| Eval {
                    seq: eval.seq,
                    order: eval.order.clone(),
                    resolution: Resolution::Any(eval.value().map(|value| (position, value))),
                }))
            }
        }
    }
}

struct Eval {
    seq: u64,
    order: Vec<EntryIndex>,
    resolution: Resolution,
}

impl Eval {
    /// The value this node contributes as a child of another combinator.
    fn value(&self) -> Result<DeferredValue, TerminalError> {
        match &self.resolution {
            Resolution::Single(r) => r.clone(),
            Resolution::All(Ok(_)) => Ok(DeferredValue::Empty),
            Resolution::All(Err(e)) => Err(e.clone()),
            Resolution::Any(Ok((_, v))) => Ok(v.clone()),
            Resolution::Any(Err(e)) => Err(e.clone()),
        }
    }
}

fn dedup_preserving_order(order: &mut Vec<EntryIndex>) {
    let mut seen = std::collections::HashSet::new();
    order.retain(|index| seen.insert(*index));
}
