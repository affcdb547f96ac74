//! 广度优先的可达状态枚举，作为有界性搜索结果的参照。
use std::collections::VecDeque;
use std::collections::hash_map::Entry;

use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::net::Net;
use crate::net::structure::Marking;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSpaceConfig {
    /// 最多保留的不同标识数；`None` 表示穷尽（无界网不会终止）。
    pub state_limit: Option<usize>,
}

impl Default for StateSpaceConfig {
    fn default() -> Self {
        Self {
            state_limit: Some(10_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateSpaceStats {
    pub state_count: usize,
    pub edge_count: usize,
    pub deadlock_count: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct StateSpace {
    /// 按发现顺序排列，首个为起始标识
    markings: Vec<Marking>,
    index: FxHashMap<Marking, usize>,
    edge_count: usize,
    deadlocks: Vec<usize>,
    truncated: bool,
}

impl StateSpace {
    /// 从网的当前标识出发枚举。
    pub fn explore(net: &Net, config: StateSpaceConfig) -> Self {
        let initial = net.snapshot_marking();
        let mut markings = vec![initial.clone()];
        let mut index = FxHashMap::default();
        let mut queue = VecDeque::new();
        let mut deadlocks = Vec::new();
        let mut edge_count = 0;
        let mut truncated = false;

        index.insert(initial, 0);
        queue.push_back(0usize);

        while let Some(state) = queue.pop_front() {
            let current = markings[state].clone();
            let enabled = net.enabled_transitions(&current);
            if enabled.is_empty() {
                deadlocks.push(state);
                continue;
            }

            for transition in enabled {
                let next = match net.fire_transition(&current, transition) {
                    Ok(next) => next,
                    Err(err) => {
                        warn!("跳过迁移 {:?}: {}", transition, err);
                        continue;
                    }
                };
                match index.entry(next) {
                    Entry::Occupied(_) => {}
                    Entry::Vacant(entry) => {
                        if let Some(limit) = config.state_limit {
                            if markings.len() >= limit {
                                truncated = true;
                                continue;
                            }
                        }
                        let id = markings.len();
                        markings.push(entry.key().clone());
                        entry.insert(id);
                        queue.push_back(id);
                    }
                }
                edge_count += 1;
            }
        }

        if truncated {
            warn!("状态空间在 {} 个状态处被截断", markings.len());
        }
        debug!(
            "状态空间: {} 个状态, {} 条边, {} 个死锁",
            markings.len(),
            edge_count,
            deadlocks.len()
        );

        Self {
            markings,
            index,
            edge_count,
            deadlocks,
            truncated,
        }
    }

    pub fn markings(&self) -> &[Marking] {
        &self.markings
    }

    pub fn contains(&self, marking: &Marking) -> bool {
        self.index.contains_key(marking)
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn deadlocks(&self) -> impl Iterator<Item = &Marking> + '_ {
        self.deadlocks.iter().map(|&state| &self.markings[state])
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn stats(&self) -> StateSpaceStats {
        StateSpaceStats {
            state_count: self.markings.len(),
            edge_count: self.edge_count,
            deadlock_count: self.deadlocks.len(),
            truncated: self.truncated,
        }
    }
}
