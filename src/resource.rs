use std::fmt;

/// The pixel format of a resource.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug, Default)]
pub enum Format {
	#[default]
	Rgba8,
	Rgba16F,
	R8,
	D32F,
}

impl Format {
	pub fn bytes_per_pixel(self) -> u64 {
		match self {
			Format::R8 => 1,
			Format::Rgba8 | Format::D32F => 4,
			Format::Rgba16F => 8,
		}
	}

	pub fn is_depth(self) -> bool { matches!(self, Format::D32F) }
}

/// A description for a 2D resource.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug, Default)]
pub struct ResourceDesc {
	pub width: u32,
	pub height: u32,
	pub format: Format,
}

impl ResourceDesc {
	pub fn new(width: u32, height: u32, format: Format) -> Self { Self { width, height, format } }

	/// The number of bytes of memory backing the resource.
	pub fn size(&self) -> u64 { self.width as u64 * self.height as u64 * self.format.bytes_per_pixel() }
}

/// The logical state a resource is in between two accesses.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug, Default)]
pub enum ResourceState {
	#[default]
	Undefined,
	ColorAttachment,
	DepthAttachment,
	ShaderRead,
	Present,
}

impl ResourceState {
	/// The state a pass writing a resource of `format` needs it in.
	pub fn for_write(format: Format) -> Self {
		if format.is_depth() {
			ResourceState::DepthAttachment
		} else {
			ResourceState::ColorAttachment
		}
	}

	/// The state a pass reading a resource needs it in.
	pub fn for_read() -> Self { ResourceState::ShaderRead }
}

impl fmt::Display for ResourceState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ResourceState::Undefined => "Undefined",
			ResourceState::ColorAttachment => "ColorAttachment",
			ResourceState::DepthAttachment => "DepthAttachment",
			ResourceState::ShaderRead => "ShaderRead",
			ResourceState::Present => "Present",
		};
		f.write_str(name)
	}
}
