//! P/T 网静态结构元素：库所、迁移、弧与标识。
use std::cmp::Ordering;
use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::IndexVec;

pub type Tokens = u64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Place {
    pub ident: String,
    pub name: Option<String>,
    pub initial_tokens: Tokens,
}

impl Place {
    pub fn new(ident: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            name: None,
            initial_tokens: 0,
        }
    }

    /// 显示用名称，未命名时退回标识符。
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.ident)
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Transition {
    pub ident: String,
    pub name: Option<String>,
}

impl Transition {
    pub fn new(ident: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            name: None,
        }
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.ident)
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transition").field(&self.ident).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArcDirection {
    PlaceToTransition,
    TransitionToPlace,
}

/// 已解析的弧：端点已落到库所/迁移索引上。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Arc {
    pub ident: String,
    pub place: PlaceId,
    pub transition: TransitionId,
    pub direction: ArcDirection,
}

impl Arc {
    pub fn new(
        ident: impl Into<String>,
        place: PlaceId,
        transition: TransitionId,
        direction: ArcDirection,
    ) -> Self {
        Self {
            ident: ident.into(),
            place,
            transition,
            direction,
        }
    }
}

impl fmt::Debug for Arc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (from, to) = match self.direction {
            ArcDirection::PlaceToTransition => {
                (format!("{:?}", self.place), format!("{:?}", self.transition))
            }
            ArcDirection::TransitionToPlace => {
                (format!("{:?}", self.transition), format!("{:?}", self.place))
            }
        };
        write!(f, "Arc({}: {} -> {})", self.ident, from, to)
    }
}

/// Direction of an initial-marking edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAdjustment {
    Increment,
    Decrement,
}

/// 标识：按库所标识符升序排列的 token 向量。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Marking(IndexVec<PlaceId, Tokens>);

impl Marking {
    pub fn new(tokens: IndexVec<PlaceId, Tokens>) -> Self {
        Self(tokens)
    }

    pub fn from_vec(tokens: Vec<Tokens>) -> Self {
        Self(IndexVec::from_vec(tokens))
    }

    pub fn zeros(places: usize) -> Self {
        Self::from_vec(vec![0; places])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, Tokens)> + '_ {
        self.0.iter_enumerated().map(|(place, tokens)| (place, *tokens))
    }

    pub fn tokens(&self, place: PlaceId) -> Tokens {
        self.0[place]
    }

    pub fn tokens_mut(&mut self, place: PlaceId) -> &mut Tokens {
        &mut self.0[place]
    }

    pub fn as_slice(&self) -> &[Tokens] {
        self.0.as_slice()
    }

    /// `self ≥ other` 逐分量成立且至少一个分量严格大于。
    pub fn dominates(&self, other: &Marking) -> bool {
        matches!(self.partial_cmp(other), Some(Ordering::Greater))
    }

    /// `self ≥ other` 逐分量成立（允许相等）。
    pub fn covers(&self, other: &Marking) -> bool {
        matches!(
            self.partial_cmp(other),
            Some(Ordering::Greater | Ordering::Equal)
        )
    }

    /// Places whose count in `self` strictly exceeds the one in `other`.
    pub fn strictly_greater_places(&self, other: &Marking) -> Vec<PlaceId> {
        self.iter()
            .zip(other.as_slice())
            .filter(|((_, left), right)| left > *right)
            .map(|((place, _), _)| place)
            .collect()
    }
}

impl fmt::Debug for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (place, tokens) in self.iter() {
            map.entry(&place, &tokens);
        }
        map.finish()
    }
}

impl fmt::Display for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.iter().join("|"))
    }
}

/// 逐分量偏序；长度不同或分量互有大小时不可比。
impl PartialOrd for Marking {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.len() != other.len() {
            return None;
        }
        let mut less = false;
        let mut greater = false;
        for (left, right) in self.as_slice().iter().zip(other.as_slice()) {
            match left.cmp(right) {
                Ordering::Less => less = true,
                Ordering::Greater => greater = true,
                Ordering::Equal => {}
            }
            if less && greater {
                return None;
            }
        }
        match (less, greater) {
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => Some(Ordering::Equal),
            (true, true) => None,
        }
    }
}

impl Serialize for Marking {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Marking {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<Tokens>::deserialize(deserializer).map(Marking::from_vec)
    }
}
