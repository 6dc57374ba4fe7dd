//! A small executor for static node graphs.
//!
//! A [`Flow`] owns its nodes and a transition table keyed by `(node, label)`.
//! Running a flow steps the current node, looks up the label it returned, and
//! follows the edge. A label with no outgoing edge halts the flow. The step
//! budget bounds total node executions so a cyclic graph always terminates.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use anyhow::{Context, Result, bail};
use thiserror::Error;
use tracing::{debug, instrument};

/// A unit of work in a flow.
///
/// `step` performs the node's prepare, execute, and record phases against the
/// shared context and returns the label that selects the next node. An `Err`
/// aborts the whole flow.
pub trait Node<C, L> {
    fn name(&self) -> &'static str;
    fn step(&self, ctx: &mut C) -> Result<L>;
}

/// Handle to a node added to a [`FlowBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// The flow ran `max_steps` nodes without halting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step budget exceeded: {max_steps} node executions without finishing")]
pub struct StepBudgetExceeded {
    pub max_steps: usize,
    pub last_node: &'static str,
}

/// How a flow halted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOutcome<L> {
    /// Node whose label had no outgoing edge.
    pub last_node: &'static str,
    pub label: L,
    /// Node executions including the last one.
    pub steps: usize,
}

pub struct FlowBuilder<'a, C, L> {
    nodes: Vec<Box<dyn Node<C, L> + 'a>>,
    edges: HashMap<(NodeId, L), NodeId>,
    duplicates: Vec<String>,
    start: Option<NodeId>,
}

impl<'a, C, L> Default for FlowBuilder<'a, C, L>
where
    L: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, C, L> FlowBuilder<'a, C, L>
where
    L: Copy + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: HashMap::new(),
            duplicates: Vec::new(),
            start: None,
        }
    }

    /// Add a node. The first node added is the start node unless [`Self::start`] says otherwise.
    pub fn add_node(&mut self, node: impl Node<C, L> + 'a) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Box::new(node));
        self.start.get_or_insert(id);
        id
    }

    pub fn start(&mut self, id: NodeId) -> &mut Self {
        self.start = Some(id);
        self
    }

    /// Route `label` returned by `from` to `to`.
    pub fn connect(&mut self, from: NodeId, label: L, to: NodeId) -> &mut Self {
        if self.edges.insert((from, label), to).is_some() {
            let name = self.nodes.get(from.0).map_or("?", |node| node.name());
            self.duplicates.push(format!("{name} --{label:?}-->"));
        }
        self
    }

    pub fn has_edge(&self, from: NodeId, label: L) -> bool {
        self.edges.contains_key(&(from, label))
    }

    pub fn build(self, max_steps: usize) -> Result<Flow<'a, C, L>> {
        let Some(start) = self.start else {
            bail!("flow has no nodes");
        };
        if max_steps == 0 {
            bail!("flow step budget must be > 0");
        }
        if !self.duplicates.is_empty() {
            bail!("duplicate flow edges: {}", self.duplicates.join(", "));
        }
        let node_count = self.nodes.len();
        if let Some(((from, label), to)) = self
            .edges
            .iter()
            .find(|((from, _), to)| from.0 >= node_count || to.0 >= node_count)
        {
            bail!("edge {from:?} --{label:?}--> {to:?} references an unknown node");
        }
        Ok(Flow {
            nodes: self.nodes,
            edges: self.edges,
            start,
            max_steps,
        })
    }
}

/// A built, immutable node graph.
pub struct Flow<'a, C, L> {
    nodes: Vec<Box<dyn Node<C, L> + 'a>>,
    edges: HashMap<(NodeId, L), NodeId>,
    start: NodeId,
    max_steps: usize,
}

impl<C, L> Flow<'_, C, L>
where
    L: Copy + Eq + Hash + Debug,
{
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn has_edge(&self, from: NodeId, label: L) -> bool {
        self.edges.contains_key(&(from, label))
    }

    /// Run from the start node until a label has no outgoing edge.
    ///
    /// Node errors are returned with the failing node's name as context.
    /// Exceeding the step budget returns [`StepBudgetExceeded`].
    #[instrument(skip_all, fields(max_steps = self.max_steps))]
    pub fn run(&self, ctx: &mut C) -> Result<FlowOutcome<L>> {
        let mut current = self.start;
        let mut last_node = self.nodes[current.0].name();
        for step in 1..=self.max_steps {
            let node = &self.nodes[current.0];
            last_node = node.name();
            debug!(step, node = last_node, "stepping node");
            let label = node
                .step(ctx)
                .with_context(|| format!("node `{last_node}` failed"))?;
            match self.edges.get(&(current, label)) {
                Some(next) => {
                    debug!(node = last_node, ?label, next = self.nodes[next.0].name(), "transition");
                    current = *next;
                }
                None => {
                    debug!(node = last_node, ?label, steps = step, "flow halted");
                    return Ok(FlowOutcome {
                        last_node,
                        label,
                        steps: step,
                    });
                }
            }
        }
        Err(StepBudgetExceeded {
            max_steps: self.max_steps,
            last_node,
        }
        .into())
    }
}
