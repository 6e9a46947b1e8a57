use std::{cmp::Reverse, collections::BinaryHeap, hash::BuildHasherDefault};

use hashbrown::HashSet;
use rustc_hash::FxHasher;
use tracing::{debug, span, trace, Level};

use crate::{
	arena::{Arena, Id},
	graph::{
		virtual_resource::{ResourceEntry, ResourceLifetime},
		FrameGraph,
		PassData,
		PassId,
		ResourceHandle,
	},
	Error,
	Result,
};

type FxHashSet<T> = HashSet<T, BuildHasherDefault<FxHasher>>;

/// Knobs for [`FrameGraph::compile`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CompileOptions {
	/// Skip passes that don't contribute to the frame's output.
	pub cull_passes: bool,
	/// Let transient resources with disjoint lifetimes share memory.
	pub alias_memory: bool,
}

impl Default for CompileOptions {
	fn default() -> Self {
		Self {
			cull_passes: true,
			alias_memory: true,
		}
	}
}

/// The index of a physical memory block in a [`CompiledPlan`].
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct BlockId(pub u32);

/// A chunk of memory that one or more transient resources live in, one after the other.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
pub struct PhysicalBlock {
	pub size: u64,
	/// The last position in the pass order at which the current occupant is used.
	pub avail_after: u32,
}

#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct MemoryStats {
	/// Bytes required if every transient resource had its own memory.
	pub unaliased_bytes: u64,
	/// Bytes actually required by the physical blocks.
	pub aliased_bytes: u64,
	pub blocks: usize,
}

impl MemoryStats {
	pub fn saved_bytes(&self) -> u64 { self.unaliased_bytes - self.aliased_bytes }
}

/// The execution plan for a frame. Immutable once compiled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledPlan {
	epoch: u32,
	generation: u64,
	order: Vec<PassId>,
	// Indexed by pass.
	alive: Vec<bool>,
	// Indexed by resource.
	lifetimes: Vec<Option<ResourceLifetime>>,
	mapping: Vec<Option<BlockId>>,
	blocks: Vec<PhysicalBlock>,
	memory: MemoryStats,
}

impl CompiledPlan {
	/// All passes in execution order, including culled ones.
	pub fn order(&self) -> &[PassId] { &self.order }

	pub fn is_alive(&self, pass: PassId) -> bool { self.alive.get(pass.index()).copied().unwrap_or(false) }

	/// Passes that will be skipped, in execution order.
	pub fn culled(&self) -> impl Iterator<Item = PassId> + '_ {
		self.order.iter().copied().filter(move |&p| !self.is_alive(p))
	}

	/// The positions in [`Self::order`] during which `handle` is used by live passes.
	pub fn lifetime(&self, handle: ResourceHandle) -> Option<ResourceLifetime> {
		self.slot(handle).and_then(|i| self.lifetimes[i])
	}

	/// Resources that no live pass touches.
	pub fn unused(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
		let epoch = self.epoch;
		self.lifetimes
			.iter()
			.enumerate()
			.filter(|(_, l)| l.is_none())
			.map(move |(i, _)| Id::new(i as u32, epoch))
	}

	/// The physical block `handle` is placed in. `None` for imported and unused resources.
	pub fn block(&self, handle: ResourceHandle) -> Option<BlockId> { self.slot(handle).and_then(|i| self.mapping[i]) }

	pub fn blocks(&self) -> &[PhysicalBlock] { &self.blocks }

	pub fn memory(&self) -> MemoryStats { self.memory }

	pub(super) fn matches(&self, epoch: u32, generation: u64) -> bool {
		self.epoch == epoch && self.generation == generation
	}

	fn slot(&self, handle: ResourceHandle) -> Option<usize> {
		let i = handle.index() as usize;
		(handle.epoch() == self.epoch && i < self.mapping.len()).then_some(i)
	}
}

impl<'pass> FrameGraph<'pass> {
	/// Turn this frame's declarations into an execution plan.
	///
	/// Fails if a pass used a resource or pass that doesn't exist, or if the passes depend on each other in a cycle.
	pub fn compile(&mut self) -> Result<CompiledPlan> {
		let span = span!(Level::TRACE, "compile graph");
		let _e = span.enter();

		if let Some(err) = &self.error {
			return Err(err.clone());
		}

		build_edges(&mut self.passes);
		let order = topological_sort(&self.passes)?;
		cull(&mut self.passes, &self.resources, &order, self.options.cull_passes);
		let lifetimes = scan_lifetimes(&self.passes, &self.resources, &order);
		let (mapping, blocks, memory) = alias_resources(&self.resources, &lifetimes, self.options.alias_memory);

		Ok(CompiledPlan {
			epoch: self.resources.epoch(),
			generation: self.generation,
			alive: self.passes.iter().map(|p| p.alive).collect(),
			order,
			lifetimes,
			mapping,
			blocks,
			memory,
		})
	}
}

/// Turn every pass' `depends_on` into deduplicated successor lists and in-degrees.
fn build_edges(passes: &mut [PassData]) {
	let span = span!(Level::TRACE, "build edges");
	let _e = span.enter();

	for pass in passes.iter_mut() {
		pass.successors.clear();
		pass.in_degree = 0;
	}

	let mut seen = FxHashSet::default();
	for i in 0..passes.len() {
		seen.clear();
		let pass = PassId(i as u32);
		for j in 0..passes[i].depends_on.len() {
			let dep = passes[i].depends_on[j];
			if seen.insert(dep) {
				passes[dep.index()].successors.push(pass);
				passes[i].in_degree += 1;
			}
		}
	}
}

/// Kahn's algorithm. Among passes that are ready at the same time, the one registered first goes first.
fn topological_sort(passes: &[PassData]) -> Result<Vec<PassId>> {
	let span = span!(Level::TRACE, "topological sort");
	let _e = span.enter();

	let mut in_degree: Vec<_> = passes.iter().map(|p| p.in_degree).collect();
	let mut ready: BinaryHeap<_> = in_degree
		.iter()
		.enumerate()
		.filter(|(_, &d)| d == 0)
		.map(|(i, _)| Reverse(PassId(i as u32)))
		.collect();

	let mut order = Vec::with_capacity(passes.len());
	while let Some(Reverse(pass)) = ready.pop() {
		order.push(pass);
		for &succ in passes[pass.index()].successors.iter() {
			let d = &mut in_degree[succ.index()];
			*d -= 1;
			if *d == 0 {
				ready.push(Reverse(succ));
			}
		}
	}

	if order.len() != passes.len() {
		let passes: Vec<_> = in_degree
			.iter()
			.zip(passes)
			.filter(|(&d, _)| d != 0)
			.map(|(_, p)| p.name.clone())
			.collect();
		return Err(Error::CyclicDependency { passes });
	}

	debug!(
		"topological order: {}",
		order
			.iter()
			.map(|p| passes[p.index()].name.as_str())
			.collect::<Vec<_>>()
			.join(" -> ")
	);

	Ok(order)
}

/// Mark every pass that the frame's output transitively depends on as alive.
///
/// Roots are passes that write an imported resource or asked to be kept alive. Without any, the last pass in the
/// order is the root.
fn cull(passes: &mut [PassData], resources: &Arena<ResourceEntry>, order: &[PassId], enabled: bool) {
	let span = span!(Level::TRACE, "cull passes");
	let _e = span.enter();

	if !enabled {
		for pass in passes.iter_mut() {
			pass.alive = true;
		}
		return;
	}

	let mut any_root = false;
	for pass in passes.iter_mut() {
		pass.alive = pass.keep_alive
			|| pass
				.writes
				.iter()
				.any(|&h| resources.get(h).map_or(false, |r| r.is_imported()));
		any_root |= pass.alive;
	}
	if !any_root {
		if let Some(&last) = order.last() {
			passes[last.index()].alive = true;
		}
	}

	// Dependencies always come earlier in the order, so one reverse sweep reaches all of them.
	for &pass in order.iter().rev() {
		if !passes[pass.index()].alive {
			continue;
		}
		for j in 0..passes[pass.index()].depends_on.len() {
			let dep = passes[pass.index()].depends_on[j];
			passes[dep.index()].alive = true;
		}
	}

	for pass in passes.iter().filter(|p| !p.alive) {
		debug!("culled pass `{}`", pass.name);
	}
}

/// Find the first and last position in `order` at which each resource is touched by a live pass.
fn scan_lifetimes(
	passes: &[PassData], resources: &Arena<ResourceEntry>, order: &[PassId],
) -> Vec<Option<ResourceLifetime>> {
	let span = span!(Level::TRACE, "scan lifetimes");
	let _e = span.enter();

	let mut lifetimes = vec![None; resources.len()];
	for (pos, &pass) in order.iter().enumerate() {
		let pass = &passes[pass.index()];
		if !pass.alive {
			continue;
		}

		let pos = ResourceLifetime::singular(pos as u32);
		for &h in pass.reads.iter().chain(pass.writes.iter()) {
			let lifetime: &mut Option<ResourceLifetime> = &mut lifetimes[h.index() as usize];
			*lifetime = Some(lifetime.map_or(pos, |l| l.union(pos)));
		}
	}

	for (i, lifetime) in lifetimes.iter().enumerate() {
		match lifetime {
			Some(l) => trace!("resource {} alive [{}..={}]", i, l.start, l.end),
			None => trace!("resource {} unused", i),
		}
	}

	lifetimes
}

/// Greedy first-fit placement of transient resources into physical blocks.
///
/// Resources are visited by first use. A resource reuses the first block whose occupant is done before it starts
/// and that is big enough, otherwise it gets a new block of exactly its size.
fn alias_resources(
	resources: &Arena<ResourceEntry>, lifetimes: &[Option<ResourceLifetime>], alias: bool,
) -> (Vec<Option<BlockId>>, Vec<PhysicalBlock>, MemoryStats) {
	let span = span!(Level::TRACE, "alias resources");
	let _e = span.enter();

	let mut candidates: Vec<_> = resources
		.as_slice()
		.iter()
		.zip(lifetimes)
		.enumerate()
		.filter(|(_, (res, _))| !res.is_imported())
		.filter_map(|(i, (res, l))| l.map(|l| (i, res.desc().size(), l)))
		.collect();
	// Stable, so ties stay in registration order.
	candidates.sort_by_key(|&(_, _, l)| l.start);

	let mut mapping = vec![None; resources.len()];
	let mut blocks: Vec<PhysicalBlock> = Vec::new();
	let mut unaliased_bytes = 0;

	for (i, size, lifetime) in candidates {
		unaliased_bytes += size;

		let reuse = alias
			.then(|| {
				blocks
					.iter()
					.position(|b| b.avail_after < lifetime.start && b.size >= size)
			})
			.flatten();

		let block = match reuse {
			Some(b) => {
				blocks[b].avail_after = lifetime.end;
				trace!(
					"resource {} -> reuse block {} ({} bytes, [{}..={}])",
					i,
					b,
					size,
					lifetime.start,
					lifetime.end
				);
				b
			},
			None => {
				blocks.push(PhysicalBlock {
					size,
					avail_after: lifetime.end,
				});
				trace!(
					"resource {} -> new block {} ({} bytes, [{}..={}])",
					i,
					blocks.len() - 1,
					size,
					lifetime.start,
					lifetime.end
				);
				blocks.len() - 1
			},
		};
		mapping[i] = Some(BlockId(block as u32));
	}

	let memory = MemoryStats {
		unaliased_bytes,
		aliased_bytes: blocks.iter().map(|b| b.size).sum(),
		blocks: blocks.len(),
	};
	debug!(
		"{} physical blocks for {} resources: {} bytes unaliased, {} bytes aliased ({} saved)",
		memory.blocks,
		resources.len(),
		memory.unaliased_bytes,
		memory.aliased_bytes,
		memory.saved_bytes()
	);

	(mapping, blocks, memory)
}
