//! 运行时: 可发生判定、发生语义、标识快照与结构校验.
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::net::builder::NetBuilder;
use crate::net::ids::{PlaceId, TransitionId};
use crate::net::incidence::Incidence;
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::structure::{Arc, ArcDirection, Marking, Place, TokenAdjustment, Tokens, Transition};

/// 网定义不合法。所有结构规则共用这一种错误，`Display` 给出违反的具体规则。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetError {
    #[error("{kind} identifier must not be empty")]
    EmptyIdentifier { kind: &'static str },
    #[error("identifier `{ident}` is already used by another place, transition or arc")]
    DuplicateIdentifier { ident: String },
    #[error("arc `{ident}` duplicates arc `{existing}` from `{from}` to `{to}`")]
    DuplicateArc {
        ident: String,
        existing: String,
        from: String,
        to: String,
    },
    #[error("no place or transition with identifier `{ident}`")]
    UnknownElement { ident: String },
    #[error("arc `{ident}` must connect exactly one existing place and one existing transition ({from} -> {to})")]
    InvalidArcEndpoints {
        ident: String,
        from: String,
        to: String,
    },
    #[error("a net must contain at least one place")]
    NoPlaces,
    #[error("the net is not connected; unreachable elements: {}", unreached.join(", "))]
    Disconnected { unreached: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FireError {
    #[error("transition {0:?} is out of bounds")]
    OutOfBounds(TransitionId),
    #[error("transition `{ident}` is not enabled under the supplied marking")]
    NotEnabled {
        transition: TransitionId,
        ident: String,
    },
    #[error("marking has {found} entries but the net has {expected} places")]
    MarkingLength { expected: usize, found: usize },
}

/// Any named element of the combined identifier namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    Place(PlaceId),
    Transition(TransitionId),
    Arc(usize),
}

#[derive(Clone)]
pub struct Net {
    places: IndexVec<PlaceId, Place>,
    transitions: IndexVec<TransitionId, Transition>,
    arcs: Vec<Arc>,
    incidence: Incidence,
    elements: FxHashMap<String, Element>,
    current: Marking,
}

impl std::fmt::Debug for Net {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Net")
            .field("places", &self.places)
            .field("transitions", &self.transitions)
            .field("arcs", &self.arcs)
            .field("current", &self.current)
            .finish()
    }
}

impl Net {
    pub fn builder() -> NetBuilder {
        NetBuilder::new()
    }

    /// 由已解析的元素组装网并立即校验；校验失败时不会暴露任何部分构造的网。
    pub(crate) fn from_parts(
        places: IndexVec<PlaceId, Place>,
        transitions: IndexVec<TransitionId, Transition>,
        arcs: Vec<Arc>,
    ) -> Result<Self, NetError> {
        let mut incidence = Incidence::new(transitions.len());
        let mut elements = FxHashMap::default();

        for (id, place) in places.iter_enumerated() {
            elements.insert(place.ident.clone(), Element::Place(id));
        }
        for (id, transition) in transitions.iter_enumerated() {
            elements.insert(transition.ident.clone(), Element::Transition(id));
        }
        for (idx, arc) in arcs.iter().enumerate() {
            elements.insert(arc.ident.clone(), Element::Arc(idx));
            if !places.contains_index(arc.place) || !transitions.contains_index(arc.transition) {
                continue;
            }
            match arc.direction {
                ArcDirection::PlaceToTransition => incidence.add_input(arc.place, arc.transition),
                ArcDirection::TransitionToPlace => incidence.add_output(arc.place, arc.transition),
            }
        }

        let current = Marking::new(places.iter().map(|p| p.initial_tokens).collect());
        let net = Self {
            places,
            transitions,
            arcs,
            incidence,
            elements,
            current,
        };
        net.validate()?;
        Ok(net)
    }

    pub fn places(&self) -> &IndexVec<PlaceId, Place> {
        &self.places
    }

    pub fn transitions(&self) -> &IndexVec<TransitionId, Transition> {
        &self.transitions
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    pub fn place(&self, place: PlaceId) -> Option<&Place> {
        self.places.get(place)
    }

    pub fn transition(&self, transition: TransitionId) -> Option<&Transition> {
        self.transitions.get(transition)
    }

    pub fn element(&self, ident: &str) -> Option<Element> {
        self.elements.get(ident).copied()
    }

    pub fn place_id(&self, ident: &str) -> Option<PlaceId> {
        match self.element(ident)? {
            Element::Place(id) => Some(id),
            _ => None,
        }
    }

    pub fn transition_id(&self, ident: &str) -> Option<TransitionId> {
        match self.element(ident)? {
            Element::Transition(id) => Some(id),
            _ => None,
        }
    }

    pub fn places_len(&self) -> usize {
        self.places.len()
    }

    pub fn transitions_len(&self) -> usize {
        self.transitions.len()
    }

    pub fn preset(&self, transition: TransitionId) -> &[PlaceId] {
        self.incidence.preset(transition)
    }

    pub fn postset(&self, transition: TransitionId) -> &[PlaceId] {
        self.incidence.postset(transition)
    }

    pub fn incidence(&self) -> &Incidence {
        &self.incidence
    }

    pub fn initial_marking(&self) -> Marking {
        Marking::new(self.places.iter().map(|p| p.initial_tokens).collect())
    }

    pub fn current_marking(&self) -> &Marking {
        &self.current
    }

    pub fn current_tokens(&self, place: PlaceId) -> Tokens {
        self.current.tokens(place)
    }

    /// 当前标识的拷贝，用于回溯或建立可达图节点。
    pub fn snapshot_marking(&self) -> Marking {
        self.current.clone()
    }

    pub fn restore_marking(&mut self, marking: &Marking) -> Result<(), FireError> {
        self.check_marking(marking)?;
        self.current = marking.clone();
        Ok(())
    }

    pub fn reset_to_initial(&mut self) {
        self.current = self.initial_marking();
    }

    /// 以当前标识作为新的初始标识，并对 `place` 增减一个 token。
    ///
    /// 对空库所做减法时返回 `false`，网保持不变。
    pub fn adjust_initial_tokens(&mut self, place: PlaceId, adjustment: TokenAdjustment) -> bool {
        if !self.places.contains_index(place) {
            return false;
        }
        if adjustment == TokenAdjustment::Decrement && self.current.tokens(place) == 0 {
            return false;
        }

        let tokens = self.current.tokens_mut(place);
        match adjustment {
            TokenAdjustment::Increment => *tokens += 1,
            TokenAdjustment::Decrement => *tokens -= 1,
        }
        for (id, tokens) in self.current.iter() {
            self.places[id].initial_tokens = tokens;
        }
        true
    }

    pub fn is_enabled(&self, transition: TransitionId) -> bool {
        self.is_transition_enabled(transition, &self.current)
    }

    pub fn is_transition_enabled(&self, transition: TransitionId, marking: &Marking) -> bool {
        if !self.transitions.contains_index(transition) || marking.len() != self.places_len() {
            return false;
        }
        self.incidence
            .preset(transition)
            .iter()
            .all(|&place| marking.tokens(place) >= 1)
    }

    /// 按标识符升序返回在 `marking` 下可发生的迁移。
    pub fn enabled_transitions(&self, marking: &Marking) -> Vec<TransitionId> {
        self.transitions
            .indices()
            .filter(|&transition| self.is_transition_enabled(transition, marking))
            .collect()
    }

    /// 在当前标识上发生 `transition`。
    pub fn fire(&mut self, transition: TransitionId) -> Result<(), FireError> {
        let next = self.fire_transition(&self.current, transition)?;
        self.current = next;
        Ok(())
    }

    /// 纯函数式发生：不修改网，返回后继标识。
    pub fn fire_transition(
        &self,
        marking: &Marking,
        transition: TransitionId,
    ) -> Result<Marking, FireError> {
        if !self.transitions.contains_index(transition) {
            return Err(FireError::OutOfBounds(transition));
        }
        self.check_marking(marking)?;
        if !self.is_transition_enabled(transition, marking) {
            return Err(FireError::NotEnabled {
                transition,
                ident: self.transitions[transition].ident.clone(),
            });
        }

        let mut next = marking.clone();
        for &place in self.incidence.preset(transition) {
            *next.tokens_mut(place) -= 1;
        }
        for &place in self.incidence.postset(transition) {
            *next.tokens_mut(place) += 1;
        }
        Ok(next)
    }

    fn check_marking(&self, marking: &Marking) -> Result<(), FireError> {
        if marking.len() != self.places_len() {
            return Err(FireError::MarkingLength {
                expected: self.places_len(),
                found: marking.len(),
            });
        }
        Ok(())
    }

    /// 结构校验：至少一个库所、弧端点一库所一迁移且互不重复、网（无向）连通。
    pub fn validate(&self) -> Result<(), NetError> {
        if self.places.is_empty() {
            return Err(NetError::NoPlaces);
        }

        let mut seen: FxHashMap<(PlaceId, TransitionId, ArcDirection), &str> =
            FxHashMap::default();
        for arc in &self.arcs {
            if !self.places.contains_index(arc.place)
                || !self.transitions.contains_index(arc.transition)
            {
                return Err(NetError::InvalidArcEndpoints {
                    ident: arc.ident.clone(),
                    from: format!("{:?}", arc.place),
                    to: format!("{:?}", arc.transition),
                });
            }
            let key = (arc.place, arc.transition, arc.direction);
            if let Some(existing) = seen.insert(key, arc.ident.as_str()) {
                let (from, to) = self.arc_endpoints(arc);
                return Err(NetError::DuplicateArc {
                    ident: arc.ident.clone(),
                    existing: existing.to_string(),
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        }

        let unreached = self.unreachable_elements();
        if !unreached.is_empty() {
            return Err(NetError::Disconnected { unreached });
        }
        Ok(())
    }

    /// (source, target) identifiers of `arc`.
    pub fn arc_endpoints(&self, arc: &Arc) -> (&str, &str) {
        let place = self.places[arc.place].ident.as_str();
        let transition = self.transitions[arc.transition].ident.as_str();
        match arc.direction {
            ArcDirection::PlaceToTransition => (place, transition),
            ArcDirection::TransitionToPlace => (transition, place),
        }
    }

    /// 从第一个库所出发沿弧（忽略方向）遍历，返回未访问到的元素标识符。
    fn unreachable_elements(&self) -> Vec<String> {
        let places = self.places_len();
        let mut graph: UnGraph<(), ()> =
            UnGraph::with_capacity(places + self.transitions_len(), self.arcs.len());
        for _ in 0..places + self.transitions_len() {
            graph.add_node(());
        }
        for arc in &self.arcs {
            graph.add_edge(
                NodeIndex::new(arc.place.index()),
                NodeIndex::new(places + arc.transition.index()),
                (),
            );
        }

        let mut visited = FxHashSet::default();
        let mut bfs = Bfs::new(&graph, NodeIndex::new(0));
        while let Some(node) = bfs.next(&graph) {
            visited.insert(node.index());
        }

        let unreached_places = self
            .places
            .iter_enumerated()
            .filter(|(id, _)| !visited.contains(&id.index()))
            .map(|(_, place)| place.ident.clone());
        let unreached_transitions = self
            .transitions
            .iter_enumerated()
            .filter(|(id, _)| !visited.contains(&(places + id.index())))
            .map(|(_, transition)| transition.ident.clone());
        let unreached: Vec<String> = unreached_places.chain(unreached_transitions).collect();

        if !unreached.is_empty() {
            log::debug!("连通性检查失败，未访问元素: {:?}", unreached);
        }
        unreached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn producer_net() -> Net {
        let mut builder = Net::builder();
        builder
            .add_place("p1")
            .and_then(|b| b.add_place("p2"))
            .and_then(|b| b.add_transition("t1"))
            .and_then(|b| b.add_arc("a1", "p1", "t1"))
            .and_then(|b| b.add_arc("a2", "t1", "p1"))
            .and_then(|b| b.add_arc("a3", "t1", "p2"))
            .and_then(|b| b.set_tokens("p1", 1))
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn enabled_requires_token_in_every_input_place() {
        let mut net = producer_net();
        let t1 = net.transition_id("t1").unwrap();
        assert!(net.is_enabled(t1));

        net.restore_marking(&Marking::from_vec(vec![0, 4])).unwrap();
        assert!(!net.is_enabled(t1));
        assert!(net.enabled_transitions(net.current_marking()).is_empty());
    }

    #[test]
    fn fire_moves_tokens() {
        let mut net = producer_net();
        let t1 = net.transition_id("t1").unwrap();
        net.fire(t1).unwrap();
        net.fire(t1).unwrap();
        assert_eq!(net.current_marking().as_slice(), &[1, 2]);
        assert_eq!(net.initial_marking().as_slice(), &[1, 0]);
    }

    #[test]
    fn firing_disabled_transition_is_an_error() {
        let mut net = producer_net();
        let t1 = net.transition_id("t1").unwrap();
        net.restore_marking(&Marking::from_vec(vec![0, 0])).unwrap();

        let err = net.fire(t1).unwrap_err();
        assert!(matches!(err, FireError::NotEnabled { ref ident, .. } if ident == "t1"));
        assert_eq!(net.current_marking().as_slice(), &[0, 0]);
        assert_eq!(
            net.fire(TransitionId::new(9)),
            Err(FireError::OutOfBounds(TransitionId::new(9)))
        );
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let mut net = producer_net();
        let t1 = net.transition_id("t1").unwrap();
        let snapshot = net.snapshot_marking();
        net.fire(t1).unwrap();
        assert_ne!(net.current_marking(), &snapshot);

        net.restore_marking(&snapshot).unwrap();
        assert_eq!(net.current_marking(), &snapshot);
        assert_eq!(
            net.restore_marking(&Marking::from_vec(vec![1])),
            Err(FireError::MarkingLength {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn reset_restores_initial_tokens() {
        let mut net = producer_net();
        let t1 = net.transition_id("t1").unwrap();
        net.fire(t1).unwrap();
        net.reset_to_initial();
        assert_eq!(net.current_marking(), &net.initial_marking());
    }

    #[test]
    fn adjust_initial_tokens_commits_current_marking() {
        let mut net = producer_net();
        let t1 = net.transition_id("t1").unwrap();
        let p1 = net.place_id("p1").unwrap();
        let p2 = net.place_id("p2").unwrap();
        net.fire(t1).unwrap();

        assert!(net.adjust_initial_tokens(p1, TokenAdjustment::Increment));
        assert_eq!(net.initial_marking().as_slice(), &[2, 1]);
        assert_eq!(net.current_marking().as_slice(), &[2, 1]);

        assert!(net.adjust_initial_tokens(p2, TokenAdjustment::Decrement));
        assert!(!net.adjust_initial_tokens(p2, TokenAdjustment::Decrement));
        assert_eq!(net.initial_marking().as_slice(), &[2, 0]);
    }

    #[test]
    fn pure_firing_leaves_net_untouched() {
        let net = producer_net();
        let t1 = net.transition_id("t1").unwrap();
        let next = net.fire_transition(net.current_marking(), t1).unwrap();
        assert_eq!(next.as_slice(), &[1, 1]);
        assert_eq!(net.current_marking().as_slice(), &[1, 0]);
    }

    #[test]
    fn validate_rejects_duplicate_arc_between_same_pair() {
        let places = IndexVec::from_vec(vec![Place::new("p")]);
        let transitions = IndexVec::from_vec(vec![Transition::new("t")]);
        let p = PlaceId::new(0);
        let t = TransitionId::new(0);
        let arcs = vec![
            Arc::new("a1", p, t, ArcDirection::PlaceToTransition),
            Arc::new("a2", p, t, ArcDirection::PlaceToTransition),
            Arc::new("a3", p, t, ArcDirection::TransitionToPlace),
        ];

        let err = Net::from_parts(places, transitions, arcs).unwrap_err();
        assert_eq!(
            err,
            NetError::DuplicateArc {
                ident: "a2".into(),
                existing: "a1".into(),
                from: "p".into(),
                to: "t".into(),
            }
        );
        assert_eq!(err.to_string(), "arc `a2` duplicates arc `a1` from `p` to `t`");
    }

    #[test]
    fn validate_rejects_arc_with_missing_endpoint() {
        let places = IndexVec::from_vec(vec![Place::new("p")]);
        let transitions = IndexVec::from_vec(vec![Transition::new("t")]);
        let arcs = vec![Arc::new(
            "a",
            PlaceId::new(3),
            TransitionId::new(0),
            ArcDirection::PlaceToTransition,
        )];

        let err = Net::from_parts(places, transitions, arcs).unwrap_err();
        assert!(matches!(err, NetError::InvalidArcEndpoints { ref ident, .. } if ident == "a"));
        assert!(err.to_string().starts_with("arc `a` must connect"));
    }

    #[test]
    fn element_lookup_distinguishes_kinds() {
        let net = producer_net();
        assert_eq!(net.place_id("t1"), None);
        assert_eq!(net.transition_id("p1"), None);
        assert_eq!(net.element("a2"), Some(Element::Arc(1)));
        let arc = &net.arcs()[1];
        assert_eq!(net.arc_endpoints(arc), ("t1", "p1"));
    }
}
