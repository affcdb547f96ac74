//! 原子化的网构造：先登记、后校验，`build` 成功前不存在可用的 `Net`。
use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::net::core::{Net, NetError};
use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::IndexVec;
use crate::net::structure::{Arc, ArcDirection, Place, Tokens, Transition};

#[derive(Debug, Clone)]
enum Pending {
    Place(Place),
    Transition(Transition),
    Arc { source: String, target: String },
}

/// Collects places, transitions and arcs under one shared identifier namespace.
#[derive(Debug, Clone, Default)]
pub struct NetBuilder {
    elements: IndexMap<String, Pending>,
}

impl NetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_place(&mut self, ident: impl Into<String>) -> Result<&mut Self, NetError> {
        let ident = ident.into();
        self.insert(ident.clone(), "place", Pending::Place(Place::new(ident)))
    }

    pub fn add_transition(&mut self, ident: impl Into<String>) -> Result<&mut Self, NetError> {
        let ident = ident.into();
        self.insert(
            ident.clone(),
            "transition",
            Pending::Transition(Transition::new(ident)),
        )
    }

    /// 登记一条弧。同一 (source, target) 有序对只允许一条弧。
    pub fn add_arc(
        &mut self,
        ident: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<&mut Self, NetError> {
        let ident = ident.into();
        let source = source.into();
        let target = target.into();

        let existing = self.elements.iter().find_map(|(id, element)| match element {
            Pending::Arc {
                source: s,
                target: t,
            } if *s == source && *t == target => Some(id.clone()),
            _ => None,
        });
        if let Some(existing) = existing {
            return Err(NetError::DuplicateArc {
                ident,
                existing,
                from: source,
                to: target,
            });
        }
        self.insert(ident, "arc", Pending::Arc { source, target })
    }

    pub fn set_name(
        &mut self,
        ident: &str,
        name: impl Into<String>,
    ) -> Result<&mut Self, NetError> {
        match self.elements.get_mut(ident) {
            Some(Pending::Place(place)) => place.name = Some(name.into()),
            Some(Pending::Transition(transition)) => transition.name = Some(name.into()),
            _ => {
                return Err(NetError::UnknownElement {
                    ident: ident.to_string(),
                });
            }
        }
        Ok(self)
    }

    pub fn set_tokens(&mut self, ident: &str, tokens: Tokens) -> Result<&mut Self, NetError> {
        match self.elements.get_mut(ident) {
            Some(Pending::Place(place)) => place.initial_tokens = tokens,
            _ => {
                return Err(NetError::UnknownElement {
                    ident: ident.to_string(),
                });
            }
        }
        Ok(self)
    }

    fn insert(
        &mut self,
        ident: String,
        kind: &'static str,
        element: Pending,
    ) -> Result<&mut Self, NetError> {
        if ident.is_empty() {
            return Err(NetError::EmptyIdentifier { kind });
        }
        match self.elements.entry(ident) {
            Entry::Occupied(entry) => Err(NetError::DuplicateIdentifier {
                ident: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(element);
                Ok(self)
            }
        }
    }

    /// 解析弧端点、按标识符排序元素并校验整张网。
    pub fn build(self) -> Result<Net, NetError> {
        let mut places: Vec<Place> = Vec::new();
        let mut transitions: Vec<Transition> = Vec::new();
        let mut pending_arcs = Vec::new();

        for (ident, element) in self.elements {
            match element {
                Pending::Place(place) => places.push(place),
                Pending::Transition(transition) => transitions.push(transition),
                Pending::Arc { source, target } => pending_arcs.push((ident, source, target)),
            }
        }

        places.sort_by(|a, b| a.ident.cmp(&b.ident));
        transitions.sort_by(|a, b| a.ident.cmp(&b.ident));
        pending_arcs.sort_by(|a, b| a.0.cmp(&b.0));

        let place_ids: IndexMap<&str, PlaceId> = places
            .iter()
            .enumerate()
            .map(|(idx, place)| (place.ident.as_str(), PlaceId::new(idx as u32)))
            .collect();
        let transition_ids: IndexMap<&str, TransitionId> = transitions
            .iter()
            .enumerate()
            .map(|(idx, transition)| (transition.ident.as_str(), TransitionId::new(idx as u32)))
            .collect();

        let mut arcs = Vec::with_capacity(pending_arcs.len());
        for (ident, source, target) in &pending_arcs {
            let resolved = match (
                place_ids.get(source.as_str()),
                transition_ids.get(target.as_str()),
                transition_ids.get(source.as_str()),
                place_ids.get(target.as_str()),
            ) {
                (Some(&place), Some(&transition), _, _) => {
                    Arc::new(ident.clone(), place, transition, ArcDirection::PlaceToTransition)
                }
                (_, _, Some(&transition), Some(&place)) => {
                    Arc::new(ident.clone(), place, transition, ArcDirection::TransitionToPlace)
                }
                _ => {
                    return Err(NetError::InvalidArcEndpoints {
                        ident: ident.clone(),
                        from: source.clone(),
                        to: target.clone(),
                    });
                }
            };
            arcs.push(resolved);
        }

        log::debug!(
            "构造网: {} 个库所, {} 个迁移, {} 条弧",
            places.len(),
            transitions.len(),
            arcs.len()
        );
        Net::from_parts(IndexVec::from_vec(places), IndexVec::from_vec(transitions), arcs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_share_one_namespace() {
        let mut builder = NetBuilder::new();
        builder.add_place("x").unwrap();
        assert_eq!(
            builder.add_transition("x").unwrap_err(),
            NetError::DuplicateIdentifier {
                ident: "x".to_string()
            }
        );
        builder.add_transition("t").unwrap();
        assert!(matches!(
            builder.add_arc("t", "x", "t"),
            Err(NetError::DuplicateIdentifier { .. })
        ));
    }

    #[test]
    fn duplicate_arc_pair_is_rejected() {
        let mut builder = NetBuilder::new();
        builder
            .add_place("p")
            .and_then(|b| b.add_transition("t"))
            .and_then(|b| b.add_arc("a1", "p", "t"))
            .unwrap();
        let err = builder.add_arc("a2", "p", "t").unwrap_err();
        assert_eq!(
            err,
            NetError::DuplicateArc {
                ident: "a2".into(),
                existing: "a1".into(),
                from: "p".into(),
                to: "t".into(),
            }
        );
        // 反方向是另一条弧
        builder.add_arc("a2", "t", "p").unwrap();
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let mut builder = NetBuilder::new();
        assert_eq!(
            builder.add_place("").unwrap_err(),
            NetError::EmptyIdentifier { kind: "place" }
        );
    }

    #[test]
    fn arc_between_two_places_fails_build() {
        let mut builder = NetBuilder::new();
        builder
            .add_place("p1")
            .and_then(|b| b.add_place("p2"))
            .and_then(|b| b.add_arc("a", "p1", "p2"))
            .unwrap();
        assert!(matches!(
            builder.build(),
            Err(NetError::InvalidArcEndpoints { ident, .. }) if ident == "a"
        ));
    }

    #[test]
    fn arc_to_missing_element_fails_build() {
        let mut builder = NetBuilder::new();
        builder
            .add_place("p1")
            .and_then(|b| b.add_arc("a", "p1", "ghost"))
            .unwrap();
        assert!(matches!(
            builder.build(),
            Err(NetError::InvalidArcEndpoints { .. })
        ));
    }

    #[test]
    fn empty_net_has_no_places() {
        let mut builder = NetBuilder::new();
        builder.add_transition("t").unwrap();
        assert_eq!(builder.build().unwrap_err(), NetError::NoPlaces);
    }

    #[test]
    fn isolated_place_makes_net_disconnected() {
        let mut builder = NetBuilder::new();
        builder
            .add_place("p1")
            .and_then(|b| b.add_place("p2"))
            .and_then(|b| b.add_transition("t1"))
            .and_then(|b| b.add_arc("a1", "p1", "t1"))
            .unwrap();
        assert_eq!(
            builder.build().unwrap_err(),
            NetError::Disconnected {
                unreached: vec!["p2".to_string()]
            }
        );
    }

    #[test]
    fn single_place_without_arcs_is_valid() {
        let mut builder = NetBuilder::new();
        builder.add_place("p").unwrap();
        let net = builder.build().unwrap();
        assert_eq!(net.places_len(), 1);
        assert_eq!(net.transitions_len(), 0);
    }

    #[test]
    fn places_are_ordered_by_identifier() {
        let mut builder = NetBuilder::new();
        builder
            .add_place("b")
            .and_then(|b| b.add_place("a"))
            .and_then(|b| b.add_transition("t"))
            .and_then(|b| b.add_arc("x1", "a", "t"))
            .and_then(|b| b.add_arc("x2", "t", "b"))
            .and_then(|b| b.set_tokens("a", 2))
            .and_then(|b| b.set_name("b", "sink"))
            .unwrap();
        let net = builder.build().unwrap();

        let idents: Vec<_> = net.places().iter().map(|p| p.ident.as_str()).collect();
        assert_eq!(idents, vec!["a", "b"]);
        assert_eq!(net.current_marking().as_slice(), &[2, 0]);
        assert_eq!(net.places()[PlaceId::new(1)].label(), "sink");
    }

    #[test]
    fn annotating_unknown_element_fails() {
        let mut builder = NetBuilder::new();
        builder.add_transition("t").unwrap();
        assert!(matches!(
            builder.set_tokens("t", 1),
            Err(NetError::UnknownElement { .. })
        ));
        assert!(builder.set_name("nope", "x").is_err());
    }
}
