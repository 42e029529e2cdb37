//! Genome tree storage.
//!
//! A genome is a rooted tree of [`Gene`]s kept in a per-genome arena. Every
//! node may own an ordered list of children; a Conditional additionally owns
//! two optional branch subtrees (`Success` / `Failure`). Each slot keeps a
//! non-owning [`ParentLink`] back to the node holding it, so parent lookups
//! are O(1) instead of a full-tree search.
//!
//! Subtrees only ever move between trees by copy (see [`GenomeTree::graft`]),
//! which keeps every tree acyclic without per-call checks.

use crate::error::{Result, WalkControlError};
use crate::types::{serialize_servo_state, Comparator, ServoState};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Index of a node inside one [`GenomeTree`]. Meaningless for any other tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Assigns servo angles when executed
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Action {
    pub angles: ServoState,
}

impl Action {
    pub fn new(angles: ServoState) -> Self {
        Self { angles }
    }

    /// `joint:angle` pairs joined by `;`
    pub fn serialize(&self) -> String {
        serialize_servo_state(&self.angles)
    }
}

impl<const N: usize> From<[(usize, u32); N]> for Action {
    fn from(pairs: [(usize, u32); N]) -> Self {
        Self::new(pairs.into_iter().collect())
    }
}

/// Pure threshold test on one state slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Predicate {
    pub slot: usize,
    pub threshold: u32,
    pub comparator: Comparator,
}

impl Predicate {
    pub fn new(slot: usize, comparator: Comparator, threshold: u32) -> Self {
        Self { slot, threshold, comparator }
    }

    /// Fails with `InvalidState` when the snapshot has no value for `slot`
    pub fn evaluate(&self, state: &ServoState) -> Result<bool> {
        let value = state.get(&self.slot).ok_or(WalkControlError::InvalidState {
            slot: self.slot,
            available: state.len(),
        })?;
        Ok(self.comparator.apply(*value, self.threshold))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}{}{}", self.slot, self.comparator.symbol(), self.threshold)
    }
}

/// Node payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Gene {
    Action(Action),
    Conditional(Predicate),
}

impl Gene {
    pub fn is_conditional(&self) -> bool {
        matches!(self, Gene::Conditional(_))
    }
}

/// Which of the parent's references holds a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Child,
    Success,
    Failure,
}

/// Non-owning back-reference from a node to the node that holds it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    pub parent: NodeId,
    pub edge: Edge,
}

#[derive(Debug)]
struct Slot {
    gene: Gene,
    children: Vec<NodeId>,
    success: Option<NodeId>,
    failure: Option<NodeId>,
    parent: Option<ParentLink>,
}

impl Slot {
    fn new(gene: Gene, parent: Option<ParentLink>) -> Self {
        Self {
            gene,
            children: Vec::new(),
            success: None,
            failure: None,
            parent,
        }
    }
}

/// Arena-backed genome tree.
///
/// Removed subtrees leave empty slots behind; ids are never reused while a
/// tree lives, and `clone()` compacts the arena.
#[derive(Debug)]
pub struct GenomeTree {
    nodes: Vec<Option<Slot>>,
    root: NodeId,
    live: usize,
}

impl GenomeTree {
    pub fn new(root: Gene) -> Self {
        Self {
            nodes: vec![Some(Slot::new(root, None))],
            root: NodeId(0),
            live: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes reachable from the root, branch subtrees included
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    fn slot(&self, id: NodeId) -> &Slot {
        match self.nodes.get(id.0) {
            Some(Some(slot)) => slot,
            _ => panic!("{:?} is not part of this genome", id),
        }
    }

    fn slot_mut(&mut self, id: NodeId) -> &mut Slot {
        match self.nodes.get_mut(id.0) {
            Some(Some(slot)) => slot,
            _ => panic!("{:?} is not part of this genome", id),
        }
    }

    /// # Panics
    /// If `id` does not belong to this tree (or was removed from it).
    pub fn gene(&self, id: NodeId) -> &Gene {
        &self.slot(id).gene
    }

    pub(crate) fn gene_mut(&mut self, id: NodeId) -> &mut Gene {
        &mut self.slot_mut(id).gene
    }

    /// Ordered child list of `id`, branch slots excluded
    ///
    /// # Panics
    /// If `id` does not belong to this tree (or was removed from it).
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.slot(id).children
    }

    /// # Panics
    /// If `id` does not belong to this tree (or was removed from it).
    pub fn success(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).success
    }

    /// # Panics
    /// If `id` does not belong to this tree (or was removed from it).
    pub fn failure(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).failure
    }

    /// Back-link to the holding node; `None` for the root
    ///
    /// # Panics
    /// If `id` does not belong to this tree (or was removed from it).
    pub fn parent(&self, id: NodeId) -> Option<ParentLink> {
        self.slot(id).parent
    }

    fn alloc(&mut self, gene: Gene, parent: Option<ParentLink>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Slot::new(gene, parent)));
        self.live += 1;
        id
    }

    /// Append a new child holding `gene`
    pub fn add_child(&mut self, parent: NodeId, gene: Gene) -> NodeId {
        let index = self.slot(parent).children.len();
        self.insert_child(parent, index, gene)
    }

    /// Insert a new child at `index` (clamped to the child count)
    pub fn insert_child(&mut self, parent: NodeId, index: usize, gene: Gene) -> NodeId {
        let id = self.alloc(gene, Some(ParentLink { parent, edge: Edge::Child }));
        let children = &mut self.slot_mut(parent).children;
        let index = index.min(children.len());
        children.insert(index, id);
        id
    }

    /// Put `gene` into a Conditional's `Success`/`Failure` slot, dropping any
    /// subtree that held it. Returns `None` when `parent` is not a Conditional.
    pub fn set_branch(&mut self, parent: NodeId, edge: Edge, gene: Gene) -> Option<NodeId> {
        if edge == Edge::Child || !self.gene(parent).is_conditional() {
            return None;
        }
        if let Some(previous) = self.branch(parent, edge) {
            self.drop_subtree(previous);
        }
        let id = self.alloc(gene, Some(ParentLink { parent, edge }));
        self.set_branch_ref(parent, edge, Some(id));
        Some(id)
    }

    fn branch(&self, parent: NodeId, edge: Edge) -> Option<NodeId> {
        match edge {
            Edge::Success => self.slot(parent).success,
            Edge::Failure => self.slot(parent).failure,
            Edge::Child => None,
        }
    }

    fn set_branch_ref(&mut self, parent: NodeId, edge: Edge, value: Option<NodeId>) {
        let slot = self.slot_mut(parent);
        match edge {
            Edge::Success => slot.success = value,
            Edge::Failure => slot.failure = value,
            Edge::Child => {}
        }
    }

    /// Attach a fresh node below `parent`: a Conditional's empty `Success`
    /// slot first, then its empty `Failure` slot, otherwise a new last child.
    pub fn attach(&mut self, parent: NodeId, gene: Gene) -> NodeId {
        if self.gene(parent).is_conditional() {
            for edge in [Edge::Success, Edge::Failure] {
                if self.branch(parent, edge).is_none() {
                    if let Some(id) = self.set_branch(parent, edge, gene.clone()) {
                        return id;
                    }
                }
            }
        }
        self.add_child(parent, gene)
    }

    /// Everything `parent` holds directly: children in order, then branches
    pub fn held(&self, parent: NodeId) -> Vec<NodeId> {
        let slot = self.slot(parent);
        slot.children
            .iter()
            .copied()
            .chain(slot.success)
            .chain(slot.failure)
            .collect()
    }

    /// Detach and drop the first reference from `parent` to `child`.
    /// No-op (returns false) when `parent` does not hold `child`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let slot = self.slot_mut(parent);
        if let Some(pos) = slot.children.iter().position(|c| *c == child) {
            slot.children.remove(pos);
        } else if slot.success == Some(child) {
            slot.success = None;
        } else if slot.failure == Some(child) {
            slot.failure = None;
        } else {
            return false;
        }
        self.drop_subtree(child);
        true
    }

    fn drop_subtree(&mut self, id: NodeId) {
        for node in self.preorder_from(id) {
            if self.nodes[node.0].take().is_some() {
                self.live -= 1;
            }
        }
    }

    /// Copy the subtree at `source_id` of `source` below `parent` via `edge`.
    /// Child grafts are inserted at `index`; branch grafts replace the slot.
    pub fn graft(
        &mut self,
        parent: NodeId,
        edge: Edge,
        index: usize,
        source: &GenomeTree,
        source_id: NodeId,
    ) -> NodeId {
        let gene = source.gene(source_id).clone();
        let id = match edge {
            Edge::Child => self.insert_child(parent, index, gene),
            Edge::Success | Edge::Failure => match self.set_branch(parent, edge, gene.clone()) {
                Some(id) => id,
                None => self.insert_child(parent, index, gene),
            },
        };
        self.copy_below(id, source, source_id);
        id
    }

    fn copy_below(&mut self, target: NodeId, source: &GenomeTree, source_id: NodeId) {
        let from = source.slot(source_id);
        for child in &from.children {
            let index = self.slot(target).children.len();
            self.graft(target, Edge::Child, index, source, *child);
        }
        if let Some(success) = from.success {
            self.graft(target, Edge::Success, 0, source, success);
        }
        if let Some(failure) = from.failure {
            self.graft(target, Edge::Failure, 0, source, failure);
        }
    }

    /// Replace the (non-root) subtree at `target` with a copy of
    /// `source_id` from `source`, at the same position of the same parent.
    /// Returns false and leaves the tree alone when `target` is the root.
    pub fn replace_subtree(&mut self, target: NodeId, source: &GenomeTree, source_id: NodeId) -> bool {
        let Some(link) = self.parent(target) else {
            return false;
        };
        match link.edge {
            Edge::Child => {
                let index = self
                    .children(link.parent)
                    .iter()
                    .position(|c| *c == target)
                    .unwrap_or(0);
                self.graft(link.parent, Edge::Child, index, source, source_id);
                self.remove_child(link.parent, target);
            }
            Edge::Success | Edge::Failure => {
                // set_branch drops the old occupant
                self.graft(link.parent, link.edge, 0, source, source_id);
            }
        }
        true
    }

    /// Standalone copy of the subtree rooted at `id`
    pub fn extract(&self, id: NodeId) -> GenomeTree {
        let mut tree = GenomeTree::new(self.gene(id).clone());
        let root = tree.root;
        tree.copy_below(root, self, id);
        tree
    }

    pub fn subtree_size(&self, id: NodeId) -> usize {
        self.preorder_from(id).len()
    }

    /// Unconditional depth-first pre-order over every node: a node, its
    /// children in order, then its `Success` and `Failure` subtrees.
    pub fn preorder(&self) -> Vec<NodeId> {
        self.preorder_from(self.root)
    }

    fn preorder_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            let slot = self.slot(id);
            stack.extend(slot.failure);
            stack.extend(slot.success);
            stack.extend(slot.children.iter().rev().copied());
        }
        order
    }

    /// Decision-directed traversal: the Action nodes executed for `state`.
    ///
    /// Actions are yielded, followed by their children. A Conditional is not
    /// yielded; its children always run, then only the branch selected by its
    /// predicate. A missing branch yields nothing.
    pub fn decide(&self, state: &ServoState) -> Result<Vec<NodeId>> {
        let mut actions = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let slot = self.slot(id);
            match &slot.gene {
                Gene::Action(_) => actions.push(id),
                Gene::Conditional(predicate) => {
                    let branch = if predicate.evaluate(state)? {
                        slot.success
                    } else {
                        slot.failure
                    };
                    stack.extend(branch);
                }
            }
            stack.extend(slot.children.iter().rev().copied());
        }
        Ok(actions)
    }

    /// Actions of [`decide`](Self::decide), borrowed from the tree
    pub fn phenotype(&self, state: &ServoState) -> Result<Vec<&Action>> {
        Ok(self
            .decide(state)?
            .into_iter()
            .filter_map(|id| match self.gene(id) {
                Gene::Action(action) => Some(action),
                Gene::Conditional(_) => None,
            })
            .collect())
    }

    /// Full-tree rendering for logs, e.g. `{0:512} if(s1>=300)[{1:10}|_]`
    pub fn to_formula(&self) -> String {
        let mut out = String::new();
        self.write_formula(self.root, &mut out);
        out
    }

    fn write_formula(&self, id: NodeId, out: &mut String) {
        let slot = self.slot(id);
        match &slot.gene {
            Gene::Action(action) => {
                out.push('{');
                out.push_str(&action.serialize());
                out.push('}');
            }
            Gene::Conditional(predicate) => {
                out.push_str(&format!("if({})[", predicate));
                self.write_branch(slot.success, out);
                out.push('|');
                self.write_branch(slot.failure, out);
                out.push(']');
            }
        }
        if !slot.children.is_empty() {
            out.push_str("+(");
            for (i, child) in slot.children.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                self.write_formula(*child, out);
            }
            out.push(')');
        }
    }

    fn write_branch(&self, branch: Option<NodeId>, out: &mut String) {
        match branch {
            Some(id) => self.write_formula(id, out),
            None => out.push('_'),
        }
    }

    fn same_subtree(&self, id: NodeId, other: &GenomeTree, other_id: NodeId) -> bool {
        let (a, b) = (self.slot(id), other.slot(other_id));
        if a.gene != b.gene
            || a.children.len() != b.children.len()
            || a.success.is_some() != b.success.is_some()
            || a.failure.is_some() != b.failure.is_some()
        {
            return false;
        }
        let children_match = a
            .children
            .iter()
            .zip(&b.children)
            .all(|(x, y)| self.same_subtree(*x, other, *y));
        let branch_match = |x: Option<NodeId>, y: Option<NodeId>| match (x, y) {
            (Some(x), Some(y)) => self.same_subtree(x, other, y),
            _ => true,
        };
        children_match && branch_match(a.success, b.success) && branch_match(a.failure, b.failure)
    }

    fn hash_subtree<H: Hasher>(&self, id: NodeId, state: &mut H) {
        let slot = self.slot(id);
        slot.gene.hash(state);
        slot.children.len().hash(state);
        for child in &slot.children {
            self.hash_subtree(*child, state);
        }
        for branch in [slot.success, slot.failure] {
            match branch {
                Some(branch) => {
                    1u8.hash(state);
                    self.hash_subtree(branch, state);
                }
                None => 0u8.hash(state),
            }
        }
    }
}

impl Clone for GenomeTree {
    /// Deep, compacting copy: payloads are duplicated by value
    fn clone(&self) -> Self {
        self.extract(self.root)
    }
}

/// Structural equality, independent of arena layout
impl PartialEq for GenomeTree {
    fn eq(&self, other: &Self) -> bool {
        self.live == other.live && self.same_subtree(self.root, other, other.root)
    }
}

impl Eq for GenomeTree {}

impl Hash for GenomeTree {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_subtree(self.root, state);
    }
}

impl From<Action> for GenomeTree {
    fn from(action: Action) -> Self {
        GenomeTree::new(Gene::Action(action))
    }
}
