//! 迁移的前集/后集邻接表。
//!
//! 弧权恒为 1 且同一有序端点对至多一条弧，因此 `Pre`/`Post` 退化为按迁移存放的库所列表，
//! 发射只需遍历对应迁移的两列，而不必扫描整张弧表。
use std::fmt;

use smallvec::SmallVec;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::IndexVec;

type PlaceList = SmallVec<[PlaceId; 4]>;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Incidence {
    pre: IndexVec<TransitionId, PlaceList>,
    post: IndexVec<TransitionId, PlaceList>,
}

impl Incidence {
    pub fn new(transitions: usize) -> Self {
        Self {
            pre: (0..transitions).map(|_| PlaceList::new()).collect(),
            post: (0..transitions).map(|_| PlaceList::new()).collect(),
        }
    }

    /// 输入弧: place -> transition
    pub fn add_input(&mut self, place: PlaceId, transition: TransitionId) {
        insert_sorted(&mut self.pre[transition], place);
    }

    /// 输出弧: transition -> place
    pub fn add_output(&mut self, place: PlaceId, transition: TransitionId) {
        insert_sorted(&mut self.post[transition], place);
    }

    pub fn preset(&self, transition: TransitionId) -> &[PlaceId] {
        self.pre
            .get(transition)
            .map(|places| places.as_slice())
            .unwrap_or(&[])
    }

    pub fn postset(&self, transition: TransitionId) -> &[PlaceId] {
        self.post
            .get(transition)
            .map(|places| places.as_slice())
            .unwrap_or(&[])
    }

    pub fn transitions(&self) -> usize {
        self.pre.len()
    }

    /// Net token change of `place` when `transition` fires.
    pub fn effect(&self, place: PlaceId, transition: TransitionId) -> i64 {
        let consumed = self.preset(transition).contains(&place) as i64;
        let produced = self.postset(transition).contains(&place) as i64;
        produced - consumed
    }
}

fn insert_sorted(list: &mut PlaceList, place: PlaceId) {
    if let Err(pos) = list.binary_search(&place) {
        list.insert(pos, place);
    }
}

impl fmt::Debug for Incidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Incidence")
            .field("pre", &self.pre)
            .field("post", &self.post)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_loop_has_zero_effect() {
        let mut incidence = Incidence::new(1);
        let p = PlaceId::new(0);
        let t = TransitionId::new(0);
        incidence.add_input(p, t);
        incidence.add_output(p, t);

        assert_eq!(incidence.preset(t), &[p]);
        assert_eq!(incidence.postset(t), &[p]);
        assert_eq!(incidence.effect(p, t), 0);
    }

    #[test]
    fn places_stay_sorted_and_unique() {
        let mut incidence = Incidence::new(1);
        let t = TransitionId::new(0);
        incidence.add_output(PlaceId::new(2), t);
        incidence.add_output(PlaceId::new(0), t);
        incidence.add_output(PlaceId::new(2), t);

        assert_eq!(incidence.postset(t), &[PlaceId::new(0), PlaceId::new(2)]);
        assert!(incidence.preset(TransitionId::new(5)).is_empty());
    }
}
