//! Textured quad render pass.
//!
//! Draws [`crate::mesh::QUAD_VERTICES`] with a texture and a per-slot
//! [`TransformUbo`], using dynamic rendering straight into the swapchain image.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};
use vkframe_resources::ImageData;
use vkframe_rhi::RhiResult;
use vkframe_rhi::command::CommandBuffer;
use vkframe_rhi::device::Device;
use vkframe_rhi::image::ImageTransition;
use vkframe_rhi::pipeline::{CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use vkframe_rhi::shader::ShaderStage;
use vkframe_rhi::swapchain::Swapchain;
use vkframe_rhi::texture::Texture;
use vkframe_rhi::transfer::TransferContext;
use vkframe_rhi::vertex::Vertex;

use crate::mesh::Mesh;
use crate::recorder::{FrameRecorder, FrameTarget};
use crate::shaders;
use crate::ubo::TransformUbo;
use crate::uniforms::FrameUniforms;

/// Viewport covering the whole target.
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

fn build_pipeline(
    device: &Arc<Device>,
    layout: &PipelineLayout,
    color_format: vk::Format,
) -> RhiResult<Pipeline> {
    let vertex_shader = shaders::load(device.clone(), shaders::QUAD_VERT_SPV, ShaderStage::Vertex)?;
    let fragment_shader =
        shaders::load(device.clone(), shaders::QUAD_FRAG_SPV, ShaderStage::Fragment)?;

    GraphicsPipelineBuilder::new()
        .vertex_shader(&vertex_shader)
        .fragment_shader(&fragment_shader)
        .vertex_binding(Vertex::binding_description())
        .vertex_attributes(&Vertex::attribute_descriptions())
        .cull_mode(CullMode::Back)
        .front_face(FrontFace::CounterClockwise)
        .color_attachment_format(color_format)
        .build(device.clone(), layout)
}

/// One textured quad, cleared to a fixed color every frame.
pub struct TexturedQuadPass {
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    uniforms: FrameUniforms,
    mesh: Mesh,
    texture: Texture,
    device: Arc<Device>,
    color_format: vk::Format,
    clear_color: [f32; 4],
    transform: TransformUbo,
}

impl TexturedQuadPass {
    /// Uploads the quad and `image`, then builds the pipeline for `color_format`.
    pub fn new(
        transfer: &TransferContext,
        image: &ImageData,
        color_format: vk::Format,
        frames_in_flight: usize,
        clear_color: [f32; 4],
    ) -> RhiResult<Self> {
        let device = transfer.device().clone();

        let texture = Texture::from_rgba8(transfer, "quad texture", image.width, image.height, &image.pixels)?;
        let mesh = Mesh::quad(transfer)?;
        let uniforms = FrameUniforms::new(device.clone(), frames_in_flight, &texture)?;
        let pipeline_layout = PipelineLayout::new(device.clone(), &[uniforms.layout().handle()])?;
        let pipeline = build_pipeline(&device, &pipeline_layout, color_format)?;

        info!(
            "Textured quad pass ready: {}x{} texture, {:?} target",
            image.width, image.height, color_format
        );

        Ok(Self {
            pipeline,
            pipeline_layout,
            uniforms,
            mesh,
            texture,
            device,
            color_format,
            clear_color,
            transform: TransformUbo::default(),
        })
    }

    /// Transform written to the slot's uniform buffer on the next recorded frame.
    pub fn set_transform(&mut self, transform: TransformUbo) {
        self.transform = transform;
    }

    #[inline]
    pub fn transform(&self) -> &TransformUbo {
        &self.transform
    }

    #[inline]
    pub fn texture(&self) -> &Texture {
        &self.texture
    }
}

impl FrameRecorder for TexturedQuadPass {
    fn record(&mut self, cmd: &CommandBuffer, target: &FrameTarget) -> RhiResult<()> {
        self.uniforms.write(target.slot, &self.transform)?;

        let to_attachment = ImageTransition::between(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        )?;
        let to_present = ImageTransition::between(
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        )?;

        to_attachment.record(cmd, target.image);

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(target.view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            });
        let color_attachments = [color_attachment];
        let rendering_info = vk::RenderingInfo::default()
            .render_area(full_scissor(target.extent))
            .layer_count(1)
            .color_attachments(&color_attachments);

        cmd.begin_rendering(&rendering_info);
        cmd.set_viewport(&full_viewport(target.extent));
        cmd.set_scissor(&full_scissor(target.extent));
        cmd.bind_pipeline(self.pipeline.bind_point(), self.pipeline.handle());
        cmd.bind_descriptor_sets(
            self.pipeline.bind_point(),
            self.pipeline_layout.handle(),
            0,
            &[self.uniforms.set(target.slot)?],
        );
        self.mesh.draw(cmd);
        cmd.end_rendering();

        to_present.record(cmd, target.image);
        Ok(())
    }

    fn on_swapchain_recreated(&mut self, swapchain: &Swapchain) -> RhiResult<()> {
        if swapchain.format() == self.color_format {
            return Ok(());
        }

        debug!(
            "Swapchain format changed {:?} -> {:?}, rebuilding pipeline",
            self.color_format,
            swapchain.format()
        );
        self.pipeline = build_pipeline(&self.device, &self.pipeline_layout, swapchain.format())?;
        self.color_format = swapchain.format();
        Ok(())
    }
}
