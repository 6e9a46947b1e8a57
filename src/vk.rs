//! Translation of logical states and barriers into Vulkan terms, for backends built on `ash`.

use ash::vk::{
	AccessFlags2,
	Image,
	ImageAspectFlags,
	ImageLayout,
	ImageMemoryBarrier2,
	ImageSubresourceRange,
	PipelineStageFlags2,
	REMAINING_ARRAY_LAYERS,
	REMAINING_MIP_LEVELS,
};

use crate::{
	graph::Barrier,
	resource::{Format, ResourceState},
};

/// An access of a resource.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Access {
	pub stage: PipelineStageFlags2,
	pub access: AccessFlags2,
}

pub fn format(format: Format) -> ash::vk::Format {
	match format {
		Format::Rgba8 => ash::vk::Format::R8G8B8A8_UNORM,
		Format::Rgba16F => ash::vk::Format::R16G16B16A16_SFLOAT,
		Format::R8 => ash::vk::Format::R8_UNORM,
		Format::D32F => ash::vk::Format::D32_SFLOAT,
	}
}

pub fn aspect_mask(format: Format) -> ImageAspectFlags {
	if format.is_depth() {
		ImageAspectFlags::DEPTH
	} else {
		ImageAspectFlags::COLOR
	}
}

pub fn image_layout(state: ResourceState, format: Format) -> ImageLayout {
	match state {
		ResourceState::Undefined => ImageLayout::UNDEFINED,
		ResourceState::ColorAttachment => ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
		ResourceState::DepthAttachment => ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
		ResourceState::ShaderRead if format.is_depth() => ImageLayout::DEPTH_READ_ONLY_OPTIMAL,
		ResourceState::ShaderRead => ImageLayout::SHADER_READ_ONLY_OPTIMAL,
		ResourceState::Present => ImageLayout::PRESENT_SRC_KHR,
	}
}

pub fn access(state: ResourceState) -> Access {
	match state {
		ResourceState::Undefined => Access {
			stage: PipelineStageFlags2::TOP_OF_PIPE,
			access: AccessFlags2::NONE,
		},
		ResourceState::ColorAttachment => Access {
			stage: PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
			access: AccessFlags2::COLOR_ATTACHMENT_READ | AccessFlags2::COLOR_ATTACHMENT_WRITE,
		},
		ResourceState::DepthAttachment => Access {
			stage: PipelineStageFlags2::EARLY_FRAGMENT_TESTS | PipelineStageFlags2::LATE_FRAGMENT_TESTS,
			access: AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
		},
		ResourceState::ShaderRead => Access {
			stage: PipelineStageFlags2::FRAGMENT_SHADER | PipelineStageFlags2::COMPUTE_SHADER,
			access: AccessFlags2::SHADER_SAMPLED_READ,
		},
		ResourceState::Present => Access {
			stage: PipelineStageFlags2::BOTTOM_OF_PIPE,
			access: AccessFlags2::NONE,
		},
	}
}

/// The Vulkan barrier for a transition of `image`, which was declared with `format`.
pub fn image_barrier(image: Image, format: Format, barrier: &Barrier) -> ImageMemoryBarrier2 {
	let src = access(barrier.before);
	let dst = access(barrier.after);

	ImageMemoryBarrier2::builder()
		.image(image)
		.subresource_range(
			ImageSubresourceRange::builder()
				.base_mip_level(0)
				.base_array_layer(0)
				.level_count(REMAINING_MIP_LEVELS)
				.layer_count(REMAINING_ARRAY_LAYERS)
				.aspect_mask(aspect_mask(format))
				.build(),
		)
		.src_stage_mask(src.stage)
		.src_access_mask(src.access)
		.old_layout(image_layout(barrier.before, format))
		.dst_stage_mask(dst.stage)
		.dst_access_mask(dst.access)
		.new_layout(image_layout(barrier.after, format))
		.build()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{graph::FrameGraph, resource::ResourceDesc};

	#[test]
	fn depth_reads_use_depth_layout() {
		assert_eq!(
			image_layout(ResourceState::ShaderRead, Format::D32F),
			ImageLayout::DEPTH_READ_ONLY_OPTIMAL
		);
		assert_eq!(
			image_layout(ResourceState::ShaderRead, Format::Rgba8),
			ImageLayout::SHADER_READ_ONLY_OPTIMAL
		);
	}

	#[test]
	fn barrier_layouts_follow_states() {
		let mut graph = FrameGraph::new();
		let depth = graph.create_resource(ResourceDesc::new(4, 4, Format::D32F));
		let pass = graph.add_pass(
			"depth",
			|p| {
				p.write(depth).keep_alive();
			},
			|_| {},
		);

		let report = graph.run().unwrap();
		assert_eq!(report.barriers.len(), 1);

		let barrier = image_barrier(Image::null(), Format::D32F, &report.barriers[0]);
		assert_eq!(report.barriers[0].pass, pass);
		assert_eq!(barrier.old_layout, ImageLayout::UNDEFINED);
		assert_eq!(barrier.new_layout, ImageLayout::DEPTH_ATTACHMENT_OPTIMAL);
		assert_eq!(barrier.subresource_range.aspect_mask, ImageAspectFlags::DEPTH);
	}
}
