//! # Petri 网核心定义（Place/Transition Net，弧权恒为 1）
//!
//! 设库所集合 `P` 与迁移集合 `T`。对迁移 `t`，记 `•t` 为有弧指向 `t` 的库所集合（前集），
//! `t•` 为 `t` 有弧指向的库所集合（后集）。对任意标识 `M ∈ ℕ^{|P|}`：
//!
//! * 迁移 `t` **可激发** 当且仅当 `∀p ∈ •t: M[p] ≥ 1`；
//! * 迁移 **发射** 后 `M'[p] = M[p] - [p ∈ •t] + [p ∈ t•]`。
//!
//! 库所、迁移、弧共用一个标识符命名空间；库所按标识符升序编号，因此标识向量的
//! 分量顺序与库所标识符顺序一致。
//!
//! ## 示例
//!
//! ```rust
//! use pnbound::net::*;
//!
//! let mut builder = Net::builder();
//! builder.add_place("p0")?.add_place("p1")?.add_transition("t0")?;
//! builder.add_arc("a0", "p0", "t0")?.add_arc("a1", "t0", "p1")?;
//! builder.set_tokens("p0", 1)?;
//! let net = builder.build()?;
//!
//! let t0 = net.transition_id("t0").unwrap();
//! let marking = net.initial_marking();
//! assert_eq!(net.enabled_transitions(&marking), vec![t0]);
//! let next = net.fire_transition(&marking, t0)?;
//! assert_eq!(next.as_slice(), &[0, 1]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;
pub mod core;
pub mod ids;
pub mod incidence;
pub mod index_vec;
pub mod io;
pub mod structure;

pub use self::builder::NetBuilder;
pub use self::core::{Element, FireError, Net, NetError};
pub use ids::{EdgeId, NodeId, PlaceId, TransitionId};
pub use incidence::Incidence;
pub use index_vec::{Idx, IndexVec};
pub use io::{IoError, NetDefinition, read_net, write_net};
pub use structure::{Arc, ArcDirection, Marking, Place, TokenAdjustment, Tokens, Transition};
