pub mod anchor;
pub mod budget;
pub mod error;
pub mod fallback;
pub mod graph;
pub mod html;
pub mod inject;
pub mod select;

pub use anchor::{AnchorKind, AnchorSelector, UsedAnchors};
pub use error::PlanError;
pub use fallback::FallbackClient;
pub use graph::{ClusterRole, GraphBuilder, GraphNode, LinkGraph, PageSource};
pub use inject::{Injection, Injector};
pub use select::{PlannedLink, SelectionPlan, TargetSelector};
