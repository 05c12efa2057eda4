// renderer/passes/geometry.rs
// G-buffer fill with per-draw material push constants and frustum culling

use bytemuck::bytes_of;

use crate::backend::{
    BindGroupEntry, BindingResource, BlendMode, BufferDescriptor, BufferHandle, BufferUsages,
    ColorAttachment, CommandBuffer, CompareFunction, DepthAttachment, Extent, IndexFormat, LoadOp,
    PipelineHandle, RecordingError, RenderDevice, RenderPassDescriptor, ShaderSource,
    ShaderStages, StoreOp, TextureDescriptor, TextureFormat, TextureHandle,
};
use crate::error::RendererResult;
use crate::renderer::camera::PerspectiveCamera;
use crate::renderer::passes::uniform_entry;
use crate::renderer::pipeline_builder::PipelineBuilder;
use crate::renderer::transforms::RenderableEntity;
use crate::renderer::uniforms::{CameraUniform, ModelInfo};
use crate::renderer::Vertex;

const SHADER: ShaderSource = ShaderSource {
    label: "geometry",
    wgsl: include_str!("../../shader/geometry.wgsl"),
};

/// Surface attributes of every visible pixel, written by the geometry pass.
#[derive(Debug, Clone, Copy)]
pub struct GBuffer {
    pub position: TextureHandle,
    pub normal: TextureHandle,
    pub albedo: TextureHandle,
    pub metallic_roughness_ao: TextureHandle,
    pub emission: TextureHandle,
    pub depth: TextureHandle,
    pub extent: Extent,
}

impl GBuffer {
    /// Formats of the color targets in attachment order.
    pub const COLOR_FORMATS: [TextureFormat; 5] = [
        TextureFormat::Rgba16Float,
        TextureFormat::Rgba16Float,
        TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16Float,
    ];
    pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

    pub fn new<D: RenderDevice>(device: &mut D, extent: Extent) -> RendererResult<Self> {
        let [position, normal, albedo, mrao, emission] = Self::COLOR_FORMATS;
        Ok(Self {
            position: device.create_texture(&TextureDescriptor::render_target(
                "GBuffer Position",
                extent,
                position,
            ))?,
            normal: device.create_texture(&TextureDescriptor::render_target(
                "GBuffer Normal",
                extent,
                normal,
            ))?,
            albedo: device.create_texture(&TextureDescriptor::render_target(
                "GBuffer Albedo",
                extent,
                albedo,
            ))?,
            metallic_roughness_ao: device.create_texture(&TextureDescriptor::render_target(
                "GBuffer Metallic Roughness AO",
                extent,
                mrao,
            ))?,
            emission: device.create_texture(&TextureDescriptor::render_target(
                "GBuffer Emission",
                extent,
                emission,
            ))?,
            depth: device.create_texture(&TextureDescriptor::render_target(
                "GBuffer Depth",
                extent,
                Self::DEPTH_FORMAT,
            ))?,
            extent,
        })
    }

    pub fn color_targets(&self) -> [TextureHandle; 5] {
        [
            self.position,
            self.normal,
            self.albedo,
            self.metallic_roughness_ao,
            self.emission,
        ]
    }

    pub fn destroy<D: RenderDevice>(&self, device: &mut D) {
        for texture in self.color_targets() {
            device.destroy_texture(texture);
        }
        device.destroy_texture(self.depth);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawCounts {
    pub drawn: u32,
    pub culled: u32,
}

pub struct GeometryPass {
    gbuffer: GBuffer,
    camera_buffer: BufferHandle,
    pipeline: PipelineHandle,
}

impl GeometryPass {
    pub fn new<D: RenderDevice>(device: &mut D, extent: Extent) -> RendererResult<Self> {
        let gbuffer = GBuffer::new(device, extent)?;
        let camera_buffer = device.create_buffer(&BufferDescriptor {
            label: "Camera Uniform",
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        })?;

        let builder = PipelineBuilder::new("Geometry Pipeline", SHADER)
            .with_bind_group(vec![uniform_entry(0, ShaderStages::VERTEX_FRAGMENT)])
            .with_push_constants(
                ShaderStages::VERTEX_FRAGMENT,
                std::mem::size_of::<ModelInfo>() as u32,
            )
            .with_vertex_buffer(Vertex::layout())
            .with_depth_stencil(GBuffer::DEPTH_FORMAT, true, CompareFunction::Less);
        let pipeline = GBuffer::COLOR_FORMATS
            .iter()
            .fold(builder, |builder, format| {
                builder.with_color_target(*format, BlendMode::Replace)
            })
            .build(device)?;

        Ok(Self {
            gbuffer,
            camera_buffer,
            pipeline,
        })
    }

    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    /// Shared with the lighting and skybox shaders.
    pub fn camera_buffer(&self) -> BufferHandle {
        self.camera_buffer
    }

    pub fn pipeline(&self) -> PipelineHandle {
        self.pipeline
    }

    pub fn prepare<D: RenderDevice>(
        &self,
        device: &mut D,
        camera: &PerspectiveCamera,
    ) -> RendererResult<()> {
        let uniform = CameraUniform::from_camera(camera);
        device.write_buffer(self.camera_buffer, 0, bytes_of(&uniform))?;
        Ok(())
    }

    /// Records the visible renderables into the G-buffer.
    pub fn record(
        &self,
        commands: &mut CommandBuffer,
        camera: &PerspectiveCamera,
        renderables: &[RenderableEntity],
    ) -> Result<DrawCounts, RecordingError> {
        let color_attachments = self
            .gbuffer
            .color_targets()
            .into_iter()
            .map(|texture| ColorAttachment::clear(texture, [0.0, 0.0, 0.0, 0.0]))
            .collect();

        commands.begin_render_pass(RenderPassDescriptor {
            label: "Geometry Pass",
            color_attachments,
            depth_attachment: Some(DepthAttachment {
                texture: self.gbuffer.depth,
                load: LoadOp::Clear(1.0),
                store: StoreOp::Store,
            }),
        })?;
        commands.set_pipeline(self.pipeline)?;
        commands.set_bind_group(
            0,
            vec![BindGroupEntry::new(0, BindingResource::Buffer(self.camera_buffer))],
        )?;

        let mut counts = DrawCounts::default();
        for renderable in renderables {
            if !is_visible(camera, renderable) {
                counts.culled += 1;
                continue;
            }

            let model_info = ModelInfo::new(&renderable.model, &renderable.material);
            commands.set_push_constants(ShaderStages::VERTEX_FRAGMENT, 0, bytes_of(&model_info))?;
            commands.set_vertex_buffer(0, renderable.mesh.vertex_buffer())?;
            commands.set_index_buffer(renderable.mesh.index_buffer(), IndexFormat::Uint32)?;
            commands.draw_indexed(0..renderable.mesh.index_count(), 0, 0..1)?;
            counts.drawn += 1;
        }

        commands.end_render_pass()?;
        log::trace!(
            "Geometry pass: {} drawn, {} culled",
            counts.drawn,
            counts.culled
        );
        Ok(counts)
    }

    pub fn destroy<D: RenderDevice>(&self, device: &mut D) {
        self.gbuffer.destroy(device);
        device.destroy_buffer(self.camera_buffer);
        device.destroy_pipeline(self.pipeline);
    }
}

/// Meshes without usable bounds are always drawn.
fn is_visible(camera: &PerspectiveCamera, renderable: &RenderableEntity) -> bool {
    match renderable.mesh.bounds() {
        Some(bounds) if !bounds.is_degenerate() => {
            let world_bounds = bounds.transformed(&renderable.model);
            world_bounds.is_degenerate() || camera.is_inside_frustum(&world_bounds)
        }
        _ => true,
    }
}
