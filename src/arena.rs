use std::{
	fmt,
	hash::{Hash, Hasher},
	marker::PhantomData,
	sync::atomic::{AtomicU32, Ordering},
};

use tracing::trace;

// Shared by every arena, so no two arenas (or two generations of one arena) hand out the same epoch.
static NEXT_EPOCH: AtomicU32 = AtomicU32::new(0);

fn next_epoch() -> u32 { NEXT_EPOCH.fetch_add(1, Ordering::Relaxed) }

/// A handle into an [`Arena`].
///
/// Ids remember the epoch of the arena that minted them, so an id is only accepted by that arena, and only until
/// it is cleared.
pub struct Id<T> {
	index: u32,
	epoch: u32,
	_marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
	pub(crate) fn new(index: u32, epoch: u32) -> Self {
		Self {
			index,
			epoch,
			_marker: PhantomData,
		}
	}

	pub fn index(self) -> u32 { self.index }

	pub fn epoch(self) -> u32 { self.epoch }
}

impl<T> Copy for Id<T> {}

impl<T> Clone for Id<T> {
	fn clone(&self) -> Self { *self }
}

impl<T> PartialEq for Id<T> {
	fn eq(&self, other: &Self) -> bool { self.index == other.index && self.epoch == other.epoch }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.index.hash(state);
		self.epoch.hash(state);
	}
}

impl<T> fmt::Debug for Id<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Id({}@{})", self.index, self.epoch) }
}

/// Append-only storage that is emptied all at once.
pub struct Arena<T> {
	items: Vec<T>,
	epoch: u32,
}

impl<T> Arena<T> {
	pub fn new() -> Self {
		Self {
			items: Vec::new(),
			epoch: next_epoch(),
		}
	}

	pub fn push(&mut self, item: T) -> Id<T> {
		let index = self.items.len() as u32;
		self.items.push(item);
		Id::new(index, self.epoch)
	}

	pub fn get(&self, id: Id<T>) -> Option<&T> {
		if id.epoch != self.epoch {
			return None;
		}
		self.items.get(id.index as usize)
	}

	pub fn get_mut(&mut self, id: Id<T>) -> Option<&mut T> {
		if id.epoch != self.epoch {
			return None;
		}
		self.items.get_mut(id.index as usize)
	}

	/// Drops every item and invalidates all ids handed out so far.
	pub fn clear(&mut self) {
		trace!("arena: clearing {} items", self.items.len());
		self.items.clear();
		self.epoch = next_epoch();
	}

	pub fn epoch(&self) -> u32 { self.epoch }

	pub fn len(&self) -> usize { self.items.len() }

	pub fn is_empty(&self) -> bool { self.items.is_empty() }

	pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> {
		let epoch = self.epoch;
		self.items
			.iter()
			.enumerate()
			.map(move |(i, item)| (Id::new(i as u32, epoch), item))
	}

	pub fn as_slice(&self) -> &[T] { &self.items }
}

impl<T> Default for Arena<T> {
	fn default() -> Self { Self::new() }
}
