use tracing::trace;

use crate::{
	arena::Arena,
	graph::{virtual_resource::ResourceEntry, PassId, ResourceHandle},
	resource::ResourceState,
};

/// A state transition recorded before a pass accesses a resource.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
pub struct Barrier {
	pub pass: PassId,
	pub resource: ResourceHandle,
	pub before: ResourceState,
	pub after: ResourceState,
}

/// Bring every resource `pass` touches into the state the access needs, recording a barrier for each change.
///
/// Reads need [`ResourceState::ShaderRead`], writes need an attachment state matching the format.
pub(super) fn insert_barriers(
	pass: PassId, reads: &[ResourceHandle], writes: &[ResourceHandle], resources: &mut Arena<ResourceEntry>,
	out: &mut Vec<Barrier>,
) {
	let accesses = reads
		.iter()
		.map(|&h| (h, false))
		.chain(writes.iter().map(|&h| (h, true)));

	for (resource, write) in accesses {
		let Some(entry) = resources.get_mut(resource) else {
			continue;
		};

		let needed = if write {
			ResourceState::for_write(entry.desc().format)
		} else {
			ResourceState::for_read()
		};

		if let Some(before) = entry.transition(needed) {
			trace!("barrier: resource {} {} -> {}", resource.index(), before, needed);
			out.push(Barrier {
				pass,
				resource,
				before,
				after: needed,
			});
		}
	}
}
