//! 可达图模型：按发现顺序追加的标识节点与发生边。
//!
//! 模型本身不去重，`add_node`/`add_edge` 总是追加；按标识查找返回最早插入的节点，
//! 按 (迁移, 源标识, 目标标识) 查找返回最早插入的边。两种查找都走哈希索引。
use std::fs;
use std::path::Path;

use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::{EdgeReference, StableGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;

use crate::analysis::boundedness::Witness;
use crate::net::ids::{EdgeId, NodeId, TransitionId};
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::structure::Marking;
use crate::net::Net;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachabilityNode {
    id: NodeId,
    marking: Marking,
}

impl ReachabilityNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn marking(&self) -> &Marking {
        &self.marking
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachabilityEdge {
    id: EdgeId,
    transition: TransitionId,
    transition_ident: String,
    transition_name: Option<String>,
    source: NodeId,
    target: NodeId,
}

impl ReachabilityEdge {
    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn transition(&self) -> TransitionId {
        self.transition
    }

    pub fn transition_ident(&self) -> &str {
        &self.transition_ident
    }

    pub fn transition_name(&self) -> Option<&str> {
        self.transition_name.as_deref()
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Outcome of recording one firing in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiringStep {
    pub node: NodeId,
    pub edge: EdgeId,
    pub new_node: bool,
    pub new_edge: bool,
}

#[derive(Debug, Clone)]
pub struct ReachabilityGraph {
    nodes: IndexVec<NodeId, ReachabilityNode>,
    edges: IndexVec<EdgeId, ReachabilityEdge>,
    by_marking: FxHashMap<Marking, NodeId>,
    by_firing: FxHashMap<(TransitionId, NodeId, NodeId), EdgeId>,
    outgoing: IndexVec<NodeId, Vec<EdgeId>>,
}

impl ReachabilityGraph {
    /// 只含根节点的图。
    pub fn new(root: Marking) -> Self {
        let mut graph = Self {
            nodes: IndexVec::new(),
            edges: IndexVec::new(),
            by_marking: FxHashMap::default(),
            by_firing: FxHashMap::default(),
            outgoing: IndexVec::new(),
        };
        graph.add_node(root);
        graph
    }

    /// 以网的当前标识为根。
    pub fn from_net(net: &Net) -> Self {
        Self::new(net.snapshot_marking())
    }

    /// 清空并以网的当前标识重新建立根节点。
    pub fn reset(&mut self, net: &Net) {
        self.nodes.clear();
        self.edges.clear();
        self.by_marking.clear();
        self.by_firing.clear();
        self.outgoing.clear();
        self.add_node(net.snapshot_marking());
    }

    pub fn add_node(&mut self, marking: Marking) -> NodeId {
        let id = NodeId::from_usize(self.nodes.len());
        self.by_marking.entry(marking.clone()).or_insert(id);
        self.nodes.push(ReachabilityNode { id, marking });
        self.outgoing.push(Vec::new());
        id
    }

    /// 追加一条 `source --transition--> target` 边，两端节点必须已在图中。
    pub fn add_edge(
        &mut self,
        net: &Net,
        transition: TransitionId,
        source: NodeId,
        target: NodeId,
    ) -> EdgeId {
        debug_assert!(self.nodes.contains_index(source) && self.nodes.contains_index(target));
        let id = EdgeId::from_usize(self.edges.len());
        let (transition_ident, transition_name) = net
            .transition(transition)
            .map(|t| (t.ident.clone(), t.name.clone()))
            .unwrap_or_else(|| (format!("{:?}", transition), None));

        let key = (transition, self.canonical(source), self.canonical(target));
        self.by_firing.entry(key).or_insert(id);
        self.outgoing[source].push(id);
        self.edges.push(ReachabilityEdge {
            id,
            transition,
            transition_ident,
            transition_name,
            source,
            target,
        });
        id
    }

    /// First node carrying an equal marking.
    fn canonical(&self, node: NodeId) -> NodeId {
        self.by_marking
            .get(&self.nodes[node].marking)
            .copied()
            .unwrap_or(node)
    }

    pub fn find_node_by_marking(&self, marking: &Marking) -> Option<&ReachabilityNode> {
        self.by_marking.get(marking).map(|&id| &self.nodes[id])
    }

    pub fn find_edge(
        &self,
        transition: TransitionId,
        source: &Marking,
        target: &Marking,
    ) -> Option<&ReachabilityEdge> {
        let source = *self.by_marking.get(source)?;
        let target = *self.by_marking.get(target)?;
        self.by_firing
            .get(&(transition, source, target))
            .map(|&id| &self.edges[id])
    }

    /// 记录一次发生：目标标识已存在则复用节点，相同边已存在则复用边。
    pub fn record_firing(
        &mut self,
        net: &Net,
        transition: TransitionId,
        source: NodeId,
        marking: Marking,
    ) -> FiringStep {
        let (node, new_node) = match self.find_node_by_marking(&marking) {
            Some(existing) => (existing.id, false),
            None => (self.add_node(marking), true),
        };
        let existing_edge = self
            .find_edge(transition, &self.nodes[source].marking, &self.nodes[node].marking)
            .map(|edge| edge.id);
        let (edge, new_edge) = match existing_edge {
            Some(edge) => (edge, false),
            None => (self.add_edge(net, transition, source, node), true),
        };
        FiringStep {
            node,
            edge,
            new_node,
            new_edge,
        }
    }

    pub fn root(&self) -> &ReachabilityNode {
        &self.nodes[NodeId::new(0)]
    }

    pub fn node(&self, id: NodeId) -> Option<&ReachabilityNode> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&ReachabilityEdge> {
        self.edges.get(id)
    }

    pub fn nodes(&self) -> &[ReachabilityNode] {
        self.nodes.as_slice()
    }

    pub fn edges(&self) -> &[ReachabilityEdge] {
        self.edges.as_slice()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// 按给定节点序列取标识，未知节点被跳过。
    pub fn path_markings(&self, path: &[NodeId]) -> Vec<&Marking> {
        path.iter()
            .filter_map(|&id| self.nodes.get(id))
            .map(|node| &node.marking)
            .collect()
    }

    pub fn contains_marking(&self, marking: &Marking) -> bool {
        self.by_marking.contains_key(marking)
    }

    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = &ReachabilityEdge> + '_ {
        self.outgoing
            .get(node)
            .into_iter()
            .flatten()
            .map(|&edge| &self.edges[edge])
    }

    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.outgoing(node).map(|edge| edge.target)
    }

    /// 复制为 petgraph 图，节点/边下标与 `NodeId`/`EdgeId` 一致。
    pub fn to_petgraph(&self) -> StableGraph<Marking, TransitionId> {
        let mut graph = StableGraph::with_capacity(self.node_count(), self.edge_count());
        for node in self.nodes.iter() {
            graph.add_node(node.marking.clone());
        }
        for edge in self.edges.iter() {
            graph.add_edge(
                NodeIndex::new(edge.source.index()),
                NodeIndex::new(edge.target.index()),
                edge.transition,
            );
        }
        graph
    }

    /// DOT 输出；给出见证时高亮见证路径，判定节点与无界节点加粗。
    pub fn dot(&self, witness: Option<&Witness>) -> String {
        let mut graph: StableGraph<String, String> =
            StableGraph::with_capacity(self.node_count(), self.edge_count());
        for node in self.nodes.iter() {
            graph.add_node(format!("s{}\\n{}", node.id, node.marking));
        }
        for edge in self.edges.iter() {
            graph.add_edge(
                NodeIndex::new(edge.source.index()),
                NodeIndex::new(edge.target.index()),
                escape_label(edge.transition_name().unwrap_or(&edge.transition_ident)),
            );
        }

        let on_path_node = |id: NodeId| witness.is_some_and(|w| w.nodes.contains(&id));
        let on_path_edge = |id: EdgeId| witness.is_some_and(|w| w.edges.contains(&id));

        let edge_attr = |_, edge: EdgeReference<String>| -> String {
            let id = EdgeId::from_usize(edge.id().index());
            if on_path_edge(id) {
                format!("label=\"{}\", color=\"#e65100\", penwidth=2", edge.weight())
            } else {
                format!("label=\"{}\"", edge.weight())
            }
        };
        let node_attr = |_, (idx, label): (NodeIndex, &String)| -> String {
            let id = NodeId::from_usize(idx.index());
            let mut attrs = vec![format!("shape=box, label=\"{}\"", label)];
            if idx.index() == 0 {
                attrs.push("peripheries=2".to_string());
            }
            if on_path_node(id) {
                attrs.push("style=filled, fillcolor=\"#ffe0b2\"".to_string());
            }
            if witness.is_some_and(|w| w.decision == id || w.unbounded == id) {
                attrs.push("penwidth=3".to_string());
            }
            attrs.join(", ")
        };

        format!(
            "{:?}",
            Dot::with_attr_getters(
                &graph,
                &[Config::EdgeNoLabel, Config::NodeNoLabel],
                &edge_attr,
                &node_attr
            )
        )
    }

    pub fn write_dot<P: AsRef<Path>>(&self, path: P, witness: Option<&Witness>) -> std::io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.dot(witness))
    }
}

fn escape_label(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
