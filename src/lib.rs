//! Boundedness analysis for place/transition Petri nets.
//!
//! 网由 [`net::NetBuilder`] 原子化构造；[`analysis::BoundednessAnalyzer`] 在可达图上做
//! 深度优先搜索并给出有界/无界结论，无界时附带见证路径。

pub mod analysis;
pub mod config;
pub mod net;
pub mod options;
pub mod report;
