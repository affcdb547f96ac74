//! 交互式模拟会话：逐个发生迁移并同步记录到可达图。
use log::debug;
use thiserror::Error;

use crate::analysis::boundedness::{BoundednessAnalyzer, BoundednessResult};
use crate::analysis::reachability::{FiringStep, ReachabilityGraph};
use crate::net::ids::NodeId;
use crate::net::structure::TokenAdjustment;
use crate::net::{FireError, Net};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("unknown transition `{0}`")]
    UnknownTransition(String),
    #[error("unknown place `{0}`")]
    UnknownPlace(String),
    #[error("node {0:?} is not part of the reachability graph")]
    UnknownNode(NodeId),
    #[error(transparent)]
    Fire(#[from] FireError),
}

#[derive(Debug, Clone)]
pub struct Simulation {
    net: Net,
    graph: ReachabilityGraph,
    current: NodeId,
}

impl Simulation {
    pub fn new(net: Net) -> Self {
        let graph = ReachabilityGraph::from_net(&net);
        let current = graph.root().id();
        Self {
            net,
            graph,
            current,
        }
    }

    pub fn net(&self) -> &Net {
        &self.net
    }

    pub fn graph(&self) -> &ReachabilityGraph {
        &self.graph
    }

    pub fn current_node(&self) -> NodeId {
        self.current
    }

    pub fn into_net(self) -> Net {
        self.net
    }

    /// 发生标识符为 `ident` 的迁移，并把新标识（去重后）记入可达图。
    pub fn fire(&mut self, ident: &str) -> Result<FiringStep, SimulationError> {
        let transition = self
            .net
            .transition_id(ident)
            .ok_or_else(|| SimulationError::UnknownTransition(ident.to_string()))?;
        self.net.fire(transition)?;
        let step = self.graph.record_firing(
            &self.net,
            transition,
            self.current,
            self.net.snapshot_marking(),
        );
        debug!("模拟: {} 发生, 当前节点 s{}", ident, step.node);
        self.current = step.node;
        Ok(step)
    }

    /// 把网的标识设为图中某个已知节点的标识。
    pub fn jump_to(&mut self, node: NodeId) -> Result<(), SimulationError> {
        let marking = self
            .graph
            .node(node)
            .map(|n| n.marking().clone())
            .ok_or(SimulationError::UnknownNode(node))?;
        self.net.restore_marking(&marking)?;
        self.current = node;
        Ok(())
    }

    /// 仅复位网，可达图保留。
    pub fn reset_net(&mut self) {
        self.net.reset_to_initial();
        self.current = self
            .graph
            .find_node_by_marking(self.net.current_marking())
            .map(|node| node.id())
            .unwrap_or_else(|| self.graph.root().id());
    }

    /// 复位网并以初始标识重建可达图。
    pub fn reset(&mut self) {
        self.net.reset_to_initial();
        self.graph.reset(&self.net);
        self.current = self.graph.root().id();
    }

    /// 以当前标识为新初始标识并增减 `place` 的 token，随后整体复位。
    ///
    /// 空库所减一时返回 `Ok(false)`，什么都不改变。
    pub fn adjust_initial_tokens(
        &mut self,
        place: &str,
        adjustment: TokenAdjustment,
    ) -> Result<bool, SimulationError> {
        let place_id = self
            .net
            .place_id(place)
            .ok_or_else(|| SimulationError::UnknownPlace(place.to_string()))?;
        if !self.net.adjust_initial_tokens(place_id, adjustment) {
            return Ok(false);
        }
        self.reset();
        Ok(true)
    }

    /// 复位后在会话自己的可达图上运行分析。
    pub fn analyze(&mut self, analyzer: &BoundednessAnalyzer) -> BoundednessResult {
        self.reset();
        analyzer.analyze(&self.net, &mut self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::structure::Marking;

    fn cycle_net() -> Net {
        let mut builder = Net::builder();
        builder
            .add_place("p0")
            .and_then(|b| b.add_place("p1"))
            .and_then(|b| b.add_transition("t0"))
            .and_then(|b| b.add_transition("t1"))
            .and_then(|b| b.add_arc("a0", "p0", "t0"))
            .and_then(|b| b.add_arc("a1", "t0", "p1"))
            .and_then(|b| b.add_arc("a2", "p1", "t1"))
            .and_then(|b| b.add_arc("a3", "t1", "p0"))
            .and_then(|b| b.set_tokens("p0", 1))
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn firing_records_deduplicated_graph() {
        let mut sim = Simulation::new(cycle_net());
        let first = sim.fire("t0").unwrap();
        assert!(first.new_node);
        let back = sim.fire("t1").unwrap();
        assert_eq!(back.node, sim.graph().root().id());
        let again = sim.fire("t0").unwrap();
        assert!(!again.new_node && !again.new_edge);

        assert_eq!(sim.graph().node_count(), 2);
        assert_eq!(sim.graph().edge_count(), 2);
        assert_eq!(sim.current_node(), first.node);
    }

    #[test]
    fn disabled_or_unknown_transition_is_an_error() {
        let mut sim = Simulation::new(cycle_net());
        assert!(matches!(
            sim.fire("t1"),
            Err(SimulationError::Fire(FireError::NotEnabled { .. }))
        ));
        assert_eq!(
            sim.fire("nope"),
            Err(SimulationError::UnknownTransition("nope".into()))
        );
        assert_eq!(sim.graph().node_count(), 1);
    }

    #[test]
    fn jump_and_reset() {
        let mut sim = Simulation::new(cycle_net());
        let step = sim.fire("t0").unwrap();
        sim.jump_to(sim.graph().root().id()).unwrap();
        assert_eq!(sim.net().current_marking().as_slice(), &[1, 0]);
        assert!(sim.jump_to(NodeId::new(42)).is_err());

        sim.jump_to(step.node).unwrap();
        sim.reset_net();
        assert_eq!(sim.current_node(), sim.graph().root().id());
        assert_eq!(sim.graph().node_count(), 2);

        sim.reset();
        assert_eq!(sim.graph().node_count(), 1);
    }

    #[test]
    fn adjusting_tokens_rebuilds_from_current_marking() {
        let mut sim = Simulation::new(cycle_net());
        sim.fire("t0").unwrap();
        assert!(sim.adjust_initial_tokens("p1", TokenAdjustment::Increment).unwrap());
        assert_eq!(sim.net().initial_marking(), Marking::from_vec(vec![0, 2]));
        assert_eq!(sim.graph().root().marking().as_slice(), &[0, 2]);

        assert!(!sim.adjust_initial_tokens("p0", TokenAdjustment::Decrement).unwrap());
        assert!(sim.adjust_initial_tokens("t0", TokenAdjustment::Increment).is_err());
    }

    #[test]
    fn analyze_starts_from_initial_marking() {
        let mut sim = Simulation::new(cycle_net());
        sim.fire("t0").unwrap();
        let result = sim.analyze(&BoundednessAnalyzer::new());
        assert!(result.is_bounded());
        assert_eq!(sim.graph().root().marking().as_slice(), &[1, 0]);
        assert_eq!(sim.graph().node_count(), 2);
    }
}
