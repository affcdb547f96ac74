//! Petri网有界性分析
//!
//! 对可达图做深度优先搜索：新标识若严格支配当前路径上的某个祖先标识，
//! 则从该祖先到新标识的发生序列可以无限重复，网无界。搜索栈显式保存在堆上，
//! 标识是不可变值，兄弟分支总从同一父标识出发，不需要回溯恢复。

use std::fmt;

use log::{debug, info, warn};

use crate::analysis::reachability::ReachabilityGraph;
use crate::net::Net;
use crate::net::ids::{EdgeId, NodeId, TransitionId};
use crate::net::structure::Marking;

/// 无界性的见证：从根到无界节点的路径。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness {
    /// 被支配的祖先节点
    pub decision: NodeId,
    /// 支配该祖先的新节点
    pub unbounded: NodeId,
    /// 根 .. 无界节点
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
}

impl Witness {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// 见证路径上依次发生的迁移。
    pub fn transitions(&self, graph: &ReachabilityGraph) -> Vec<TransitionId> {
        self.edges
            .iter()
            .filter_map(|&edge| graph.edge(edge))
            .map(|edge| edge.transition())
            .collect()
    }

    /// 判定节点之后的那段路径，即可重复的发生序列。
    pub fn pumping_edges(&self) -> &[EdgeId] {
        let start = self
            .nodes
            .iter()
            .position(|&node| node == self.decision)
            .unwrap_or(0);
        &self.edges[start.min(self.edges.len())..]
    }
}

/// 有界性检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundednessResult {
    /// 可达集有限且已穷尽
    Bounded,
    Unbounded(Witness),
    /// 达到状态上限前未能判定
    Unknown { reason: String },
}

impl BoundednessResult {
    pub fn is_bounded(&self) -> bool {
        matches!(self, BoundednessResult::Bounded)
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, BoundednessResult::Unbounded(_))
    }

    pub fn witness(&self) -> Option<&Witness> {
        match self {
            BoundednessResult::Unbounded(witness) => Some(witness),
            _ => None,
        }
    }
}

impl fmt::Display for BoundednessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundednessResult::Bounded => write!(f, "Petri网是有界的"),
            BoundednessResult::Unbounded(witness) => write!(
                f,
                "Petri网是无界的，判定节点 s{} 被节点 s{} 支配，见证路径长度 {}",
                witness.decision,
                witness.unbounded,
                witness.len()
            ),
            BoundednessResult::Unknown { reason } => {
                write!(f, "无法确定有界性: {}", reason)
            }
        }
    }
}

/// 搜索栈帧：节点、其标识、其可发生迁移以及下一个待尝试迁移的位置。
struct Frame {
    node: NodeId,
    marking: Marking,
    enabled: Vec<TransitionId>,
    next: usize,
}

impl Frame {
    fn new(net: &Net, node: NodeId, marking: Marking) -> Self {
        let enabled = net.enabled_transitions(&marking);
        Self {
            node,
            marking,
            enabled,
            next: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundednessAnalyzer {
    state_limit: Option<usize>,
}

impl BoundednessAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` 表示不设上限，搜索总会给出有界或无界结论。
    pub fn with_state_limit(mut self, limit: Option<usize>) -> Self {
        self.state_limit = limit;
        self
    }

    pub fn state_limit(&self) -> Option<usize> {
        self.state_limit
    }

    /// 从 `graph` 的根节点出发搜索；`graph` 中已有的节点与边被视为已探索。
    pub fn analyze(&self, net: &Net, graph: &mut ReachabilityGraph) -> BoundednessResult {
        let root = graph.root();
        let mut stack = vec![Frame::new(net, root.id(), root.marking().clone())];
        // 路径边条数始终是栈深度减一
        let mut path_edges: Vec<EdgeId> = Vec::new();

        while let Some(frame) = stack.last_mut() {
            let Some(&transition) = frame.enabled.get(frame.next) else {
                stack.pop();
                path_edges.pop();
                continue;
            };
            frame.next += 1;
            let source = frame.node;

            let next = match net.fire_transition(&frame.marking, transition) {
                Ok(marking) => marking,
                Err(err) => {
                    warn!("跳过迁移 {:?}: {}", transition, err);
                    continue;
                }
            };

            if let Some(existing) = graph.find_node_by_marking(&next).map(|node| node.id()) {
                if graph.find_edge(transition, &frame.marking, &next).is_none() {
                    graph.add_edge(net, transition, source, existing);
                }
                continue;
            }

            let node = graph.add_node(next.clone());
            let edge = graph.add_edge(net, transition, source, node);
            let marking = next;
            debug!("s{} --{:?}--> s{} {}", source, transition, node, marking);

            if let Some(ancestor) = stack.iter().find(|f| marking.dominates(&f.marking)) {
                let witness = Witness {
                    decision: ancestor.node,
                    unbounded: node,
                    nodes: stack.iter().map(|f| f.node).chain([node]).collect(),
                    edges: path_edges.iter().copied().chain([edge]).collect(),
                };
                info!(
                    "发现无界: s{} {} 支配 s{} {}",
                    node, marking, ancestor.node, ancestor.marking
                );
                return BoundednessResult::Unbounded(witness);
            }

            if let Some(limit) = self.state_limit {
                if graph.node_count() >= limit {
                    warn!("状态数达到上限 {}，停止搜索", limit);
                    return BoundednessResult::Unknown {
                        reason: format!("状态数达到上限 {}", limit),
                    };
                }
            }

            path_edges.push(edge);
            stack.push(Frame::new(net, node, marking));
        }

        info!(
            "网有界: {} 个节点, {} 条边",
            graph.node_count(),
            graph.edge_count()
        );
        BoundednessResult::Bounded
    }
}

/// 一次分析的全部输出：可达图与结论。
#[derive(Debug, Clone)]
pub struct Analysis {
    graph: ReachabilityGraph,
    result: BoundednessResult,
}

impl Analysis {
    /// 以网的当前标识为根，新建可达图并分析。
    pub fn run(net: &Net, analyzer: &BoundednessAnalyzer) -> Self {
        let mut graph = ReachabilityGraph::from_net(net);
        let result = analyzer.analyze(net, &mut graph);
        Self { graph, result }
    }

    pub fn result(&self) -> &BoundednessResult {
        &self.result
    }

    pub fn graph(&self) -> &ReachabilityGraph {
        &self.graph
    }

    pub fn is_unbounded(&self) -> bool {
        self.result.is_unbounded()
    }

    pub fn witness(&self) -> Option<&Witness> {
        self.result.witness()
    }

    pub fn decision_node(&self) -> Option<NodeId> {
        self.witness().map(|w| w.decision)
    }

    pub fn unbounded_node(&self) -> Option<NodeId> {
        self.witness().map(|w| w.unbounded)
    }

    pub fn witness_nodes(&self) -> &[NodeId] {
        self.witness().map(|w| w.nodes.as_slice()).unwrap_or_default()
    }

    pub fn witness_edges(&self) -> &[EdgeId] {
        self.witness().map(|w| w.edges.as_slice()).unwrap_or_default()
    }
}

/// 便捷接口：不设状态上限。
pub fn check_boundedness(net: &Net) -> Analysis {
    Analysis::run(net, &BoundednessAnalyzer::new())
}
