use crate::{
	graph::PassId,
	resource::{ResourceDesc, ResourceState},
};

/// One version of a resource: everything that happened to it between two writes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceVersion {
	/// The pass that produced this version. `None` for the initial contents.
	pub writer: Option<PassId>,
	/// The passes that read this version, in declaration order.
	pub readers: Vec<PassId>,
}

/// A virtual resource and its version history for the current frame.
#[derive(Clone, Debug)]
pub struct ResourceEntry {
	desc: ResourceDesc,
	versions: Vec<ResourceVersion>,
	state: ResourceState,
	imported: bool,
}

impl ResourceEntry {
	pub(super) fn transient(desc: ResourceDesc) -> Self {
		Self {
			desc,
			versions: vec![ResourceVersion::default()],
			state: ResourceState::Undefined,
			imported: false,
		}
	}

	pub(super) fn imported(desc: ResourceDesc, state: ResourceState) -> Self {
		Self {
			desc,
			versions: vec![ResourceVersion::default()],
			state,
			imported: true,
		}
	}

	pub fn desc(&self) -> &ResourceDesc { &self.desc }

	pub fn versions(&self) -> &[ResourceVersion] { &self.versions }

	pub fn current_version(&self) -> &ResourceVersion { &self.versions[self.versions.len() - 1] }

	/// The logical state the resource is in right now.
	pub fn state(&self) -> ResourceState { self.state }

	/// Imported resources are owned by someone else: they are never assigned memory.
	pub fn is_imported(&self) -> bool { self.imported }

	pub(super) fn current_version_mut(&mut self) -> &mut ResourceVersion {
		let last = self.versions.len() - 1;
		&mut self.versions[last]
	}

	pub(super) fn push_version(&mut self, writer: PassId) {
		self.versions.push(ResourceVersion {
			writer: Some(writer),
			readers: Vec::new(),
		});
	}

	/// Moves the resource into `state`, returning the previous state if that was a transition.
	pub(super) fn transition(&mut self, state: ResourceState) -> Option<ResourceState> {
		if self.state == state {
			None
		} else {
			Some(std::mem::replace(&mut self.state, state))
		}
	}
}

/// The inclusive range of positions in the pass order during which a resource is in use.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
pub struct ResourceLifetime {
	pub start: u32,
	pub end: u32,
}

impl ResourceLifetime {
	pub fn singular(pos: u32) -> Self { Self { start: pos, end: pos } }

	pub fn union(self, other: Self) -> Self {
		Self {
			start: self.start.min(other.start),
			end: self.end.max(other.end),
		}
	}

	pub fn independent(self, other: Self) -> bool { self.start > other.end || self.end < other.start }
}
