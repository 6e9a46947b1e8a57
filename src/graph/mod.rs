use std::fmt;

use tracing::{debug, span, warn, Level};

pub use crate::graph::{
	compile::{BlockId, CompileOptions, CompiledPlan, MemoryStats, PhysicalBlock},
	sync::Barrier,
	virtual_resource::{ResourceEntry, ResourceLifetime, ResourceVersion},
};
use crate::{
	arena::{Arena, Id},
	graph::sync::insert_barriers,
	resource::{ResourceDesc, ResourceState},
	Error,
	Result,
};

mod compile;
mod sync;
mod virtual_resource;

/// A handle to a resource registered with a [`FrameGraph`].
///
/// Handles are only valid for the frame they were created in.
pub type ResourceHandle = Id<ResourceEntry>;

/// The index of a pass, in registration order.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct PassId(u32);

impl PassId {
	pub fn index(self) -> usize { self.0 as usize }
}

impl fmt::Display for PassId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "pass {}", self.0) }
}

type ExecuteFn<'pass> = Box<dyn FnOnce(PassContext<'_>) + 'pass>;

/// The frame graph: passes and resources for a single frame.
pub struct FrameGraph<'pass> {
	passes: Vec<PassData<'pass>>,
	resources: Arena<ResourceEntry>,
	options: CompileOptions,
	// Bumped by every declaration, so plans compiled before it can be told apart.
	generation: u64,
	// The first misuse during declaration. Reported by `compile`.
	error: Option<Error>,
}

struct PassData<'pass> {
	name: String,
	callback: Option<ExecuteFn<'pass>>,
	reads: Vec<ResourceHandle>,
	writes: Vec<ResourceHandle>,
	// May contain duplicates until edges are built.
	depends_on: Vec<PassId>,
	successors: Vec<PassId>,
	in_degree: u32,
	alive: bool,
	keep_alive: bool,
}

impl<'pass> FrameGraph<'pass> {
	pub fn new() -> Self { Self::with_options(CompileOptions::default()) }

	pub fn with_options(options: CompileOptions) -> Self {
		Self {
			passes: Vec::new(),
			resources: Arena::new(),
			options,
			generation: 0,
			error: None,
		}
	}

	pub fn options(&self) -> CompileOptions { self.options }

	pub fn set_options(&mut self, options: CompileOptions) { self.options = options; }

	/// Register a resource owned by the graph. Its memory may be shared with other transient resources.
	pub fn create_resource(&mut self, desc: ResourceDesc) -> ResourceHandle {
		self.generation += 1;
		self.resources.push(ResourceEntry::transient(desc))
	}

	/// Register a resource owned by someone else, such as a swapchain image.
	///
	/// The graph tracks its state starting at `state`, but never assigns it memory.
	pub fn import_resource(&mut self, desc: ResourceDesc, state: ResourceState) -> ResourceHandle {
		self.generation += 1;
		self.resources.push(ResourceEntry::imported(desc, state))
	}

	/// Register a pass.
	///
	/// `setup` runs immediately and declares everything the pass reads and writes. `execute` runs later, during
	/// [`Self::execute`], unless the pass is culled.
	pub fn add_pass(
		&mut self, name: impl Into<String>, setup: impl FnOnce(&mut PassBuilder<'_, 'pass>),
		execute: impl FnOnce(PassContext<'_>) + 'pass,
	) -> PassId {
		self.generation += 1;
		let pass = PassId(self.passes.len() as u32);
		self.passes.push(PassData {
			name: name.into(),
			callback: Some(Box::new(execute)),
			reads: Vec::new(),
			writes: Vec::new(),
			depends_on: Vec::new(),
			successors: Vec::new(),
			in_degree: 0,
			alive: false,
			keep_alive: false,
		});

		let mut builder = PassBuilder { graph: self, pass };
		setup(&mut builder);

		pass
	}

	/// Order `dependent` after `dependency` even though no resource connects them.
	pub fn add_dependency(&mut self, dependent: PassId, dependency: PassId) {
		self.generation += 1;
		for pass in [dependent, dependency] {
			if pass.index() >= self.passes.len() {
				warn!("dependency on unknown {}", pass);
				if self.error.is_none() {
					self.error = Some(Error::InvalidPass { index: pass.0 });
				}
				return;
			}
		}

		if dependent == dependency {
			warn!("`{}` cannot depend on itself", self.passes[dependent.index()].name);
			return;
		}

		self.passes[dependent.index()].depends_on.push(dependency);
	}

	pub fn pass_count(&self) -> usize { self.passes.len() }

	pub fn resource_count(&self) -> usize { self.resources.len() }

	pub fn pass_name(&self, pass: PassId) -> Option<&str> { self.passes.get(pass.index()).map(|p| p.name.as_str()) }

	pub fn resource(&self, handle: ResourceHandle) -> Option<&ResourceEntry> { self.resources.get(handle) }

	/// Whether the last compile kept `pass`.
	pub fn is_alive(&self, pass: PassId) -> bool { self.passes.get(pass.index()).map_or(false, |p| p.alive) }

	/// Run a compiled plan: insert barriers and call the execute callback of every live pass in order.
	///
	/// The plan must come from [`Self::compile`] on this graph with no declarations since.
	///
	/// All passes and resources are dropped afterwards, and their handles become invalid.
	pub fn execute(&mut self, plan: &CompiledPlan) -> Result<FrameReport> {
		if !plan.matches(self.resources.epoch(), self.generation) {
			return Err(Error::StalePlan);
		}

		let span = span!(Level::TRACE, "execute graph");
		let _e = span.enter();

		let mut report = FrameReport::default();
		for &pass in plan.order() {
			let data = &mut self.passes[pass.index()];
			if !plan.is_alive(pass) {
				debug!("skipping culled pass `{}`", data.name);
				report.culled.push(pass);
				continue;
			}

			let callback = data.callback.take();
			let data = &self.passes[pass.index()];

			let span = span!(Level::TRACE, "run pass", name = data.name.as_str());
			let _e = span.enter();

			let first = report.barriers.len();
			insert_barriers(
				pass,
				&data.reads,
				&data.writes,
				&mut self.resources,
				&mut report.barriers,
			);

			if let Some(callback) = callback {
				callback(PassContext {
					pass,
					name: &data.name,
					barriers: &report.barriers[first..],
					plan,
				});
			}
			report.executed.push(pass);
		}

		self.reset();
		Ok(report)
	}

	/// Compile and execute in one go.
	pub fn run(&mut self) -> Result<FrameReport> {
		let plan = self.compile()?;
		self.execute(&plan)
	}

	/// Drop everything declared for this frame without executing it.
	pub fn reset(&mut self) {
		self.generation += 1;
		self.passes.clear();
		self.resources.clear();
		self.error = None;
	}

	fn misuse(&mut self, pass: PassId, handle: ResourceHandle) {
		let name = self.passes[pass.index()].name.clone();
		warn!("pass `{}` used unregistered resource {:?}", name, handle);
		if self.error.is_none() {
			self.error = Some(Error::InvalidResource {
				pass: name,
				index: handle.index(),
			});
		}
	}
}

impl Default for FrameGraph<'_> {
	fn default() -> Self { Self::new() }
}

/// Declares what a pass reads and writes. Only available while the pass' setup runs.
pub struct PassBuilder<'frame, 'pass> {
	graph: &'frame mut FrameGraph<'pass>,
	pass: PassId,
}

impl<'frame, 'pass> PassBuilder<'frame, 'pass> {
	/// The pass being declared.
	pub fn pass(&self) -> PassId { self.pass }

	/// Read the latest version of `handle`. The pass will run after whichever pass wrote that version.
	pub fn read(&mut self, handle: ResourceHandle) -> &mut Self {
		let pass = self.pass;
		let graph = &mut *self.graph;
		let Some(entry) = graph.resources.get_mut(handle) else {
			graph.misuse(pass, handle);
			return self;
		};

		let version = entry.current_version_mut();
		if let Some(writer) = version.writer.filter(|&w| w != pass) {
			graph.passes[pass.index()].depends_on.push(writer);
		}
		version.readers.push(pass);
		graph.passes[pass.index()].reads.push(handle);

		self
	}

	/// Write `handle`, creating a new version of it.
	pub fn write(&mut self, handle: ResourceHandle) -> &mut Self {
		let pass = self.pass;
		let graph = &mut *self.graph;
		let Some(entry) = graph.resources.get_mut(handle) else {
			graph.misuse(pass, handle);
			return self;
		};

		entry.push_version(pass);
		graph.passes[pass.index()].writes.push(handle);

		self
	}

	/// Never cull this pass, even if nothing reads what it writes.
	pub fn keep_alive(&mut self) -> &mut Self {
		self.graph.passes[self.pass.index()].keep_alive = true;
		self
	}
}

/// What a pass gets to see while it executes.
pub struct PassContext<'a> {
	pass: PassId,
	name: &'a str,
	barriers: &'a [Barrier],
	plan: &'a CompiledPlan,
}

impl<'a> PassContext<'a> {
	pub fn pass(&self) -> PassId { self.pass }

	pub fn name(&self) -> &'a str { self.name }

	/// The transitions recorded right before this pass.
	pub fn barriers(&self) -> &'a [Barrier] { self.barriers }

	/// The physical memory block backing `handle`, if it has one.
	pub fn block(&self, handle: ResourceHandle) -> Option<BlockId> { self.plan.block(handle) }

	pub fn plan(&self) -> &'a CompiledPlan { self.plan }
}

/// What happened during [`FrameGraph::execute`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
	/// Passes that ran, in order.
	pub executed: Vec<PassId>,
	/// Passes that were skipped because nothing needed them.
	pub culled: Vec<PassId>,
	pub barriers: Vec<Barrier>,
}
