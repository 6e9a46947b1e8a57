//! A frame graph compiler.
//!
//! Passes declare the virtual resources they read and write, and [`graph::FrameGraph::compile`] turns those
//! declarations into an immutable [`graph::CompiledPlan`]: a deterministic topological pass order, the set of
//! passes that actually contribute to the frame's output, per-resource lifetimes, and a physical memory block
//! assignment that lets transient resources with disjoint lifetimes share memory. Executing the plan inserts
//! state-transition barriers and runs each live pass' callback.

#[cfg(feature = "ash")]
pub use ash;

pub mod arena;
pub mod graph;
pub mod resource;
#[cfg(feature = "ash")]
pub mod vk;

pub use crate::{
	graph::{CompileOptions, CompiledPlan, FrameGraph, FrameReport, PassBuilder, PassContext, PassId, ResourceHandle},
	resource::{Format, ResourceDesc, ResourceState},
};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("render graph contains a dependency cycle among passes: {}", passes.join(", "))]
	CyclicDependency { passes: Vec<String> },
	#[error("pass `{pass}` used resource {index} which is not registered in this frame")]
	InvalidResource { pass: String, index: u32 },
	#[error("pass {index} does not exist")]
	InvalidPass { index: u32 },
	#[error("plan was compiled for a different frame")]
	StalePlan,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
