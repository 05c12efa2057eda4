//! wgpu implementation of [`RenderDevice`].
//!
//! Command lists are replayed into a fresh `wgpu::CommandEncoder` on submit. Bind groups are
//! created during replay from the layouts of the currently bound pipeline, so a recorded command
//! list only ever refers to handles.

mod context;
mod convert;

use std::collections::HashMap;
use std::sync::Arc;

use winit::window::Window;

use crate::backend::command::{BindGroupEntry, BindingResource, Command};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::settings::RenderSettings;

use context::GpuContext;

struct WgpuTexture {
    /// `None` for surface textures, which are owned by the swapchain.
    texture: Option<wgpu::Texture>,
    view: wgpu::TextureView,
    label: &'static str,
    extent: Extent,
    format: TextureFormat,
}

struct WgpuBuffer {
    buffer: wgpu::Buffer,
    label: &'static str,
    size: u64,
}

enum WgpuPipeline {
    Render {
        pipeline: wgpu::RenderPipeline,
        bind_group_layouts: Vec<wgpu::BindGroupLayout>,
    },
    Compute {
        pipeline: wgpu::ComputePipeline,
        bind_group_layouts: Vec<wgpu::BindGroupLayout>,
    },
}

impl WgpuPipeline {
    fn bind_group_layout(&self, index: u32) -> Option<&wgpu::BindGroupLayout> {
        match self {
            WgpuPipeline::Render {
                bind_group_layouts, ..
            }
            | WgpuPipeline::Compute {
                bind_group_layouts, ..
            } => bind_group_layouts.get(index as usize),
        }
    }
}

pub struct WgpuDevice {
    context: GpuContext,
    handles: HandleAllocator,
    textures: HashMap<u64, WgpuTexture>,
    buffers: HashMap<u64, WgpuBuffer>,
    samplers: HashMap<u64, wgpu::Sampler>,
    pipelines: HashMap<u64, WgpuPipeline>,
    in_flight: HashMap<u64, wgpu::SubmissionIndex>,
    next_submission: u64,
    surface_texture: Option<(u64, wgpu::SurfaceTexture)>,
}

impl WgpuDevice {
    pub async fn new(window: Arc<Window>, settings: &RenderSettings) -> BackendResult<Self> {
        let context = GpuContext::new(window, settings).await?;
        Ok(Self {
            context,
            handles: HandleAllocator::new(),
            textures: HashMap::new(),
            buffers: HashMap::new(),
            samplers: HashMap::new(),
            pipelines: HashMap::new(),
            in_flight: HashMap::new(),
            next_submission: 1,
            surface_texture: None,
        })
    }

    pub fn surface_extent(&self) -> Extent {
        self.context.extent()
    }

    fn texture(&self, texture: TextureHandle) -> BackendResult<&WgpuTexture> {
        self.textures
            .get(&texture.0)
            .ok_or(BackendError::InvalidHandle {
                kind: "texture",
                id: texture.0,
            })
    }

    fn buffer(&self, buffer: BufferHandle) -> BackendResult<&wgpu::Buffer> {
        self.buffers
            .get(&buffer.0)
            .map(|buffer| &buffer.buffer)
            .ok_or(BackendError::InvalidHandle {
                kind: "buffer",
                id: buffer.0,
            })
    }

    fn pipeline(&self, pipeline: PipelineHandle) -> BackendResult<&WgpuPipeline> {
        self.pipelines
            .get(&pipeline.0)
            .ok_or(BackendError::InvalidHandle {
                kind: "pipeline",
                id: pipeline.0,
            })
    }

    fn create_layouts(
        &self,
        label: &'static str,
        layout: &PipelineLayoutDescriptor,
    ) -> (wgpu::PipelineLayout, Vec<wgpu::BindGroupLayout>) {
        let device = &self.context.device;
        let bind_group_layouts: Vec<wgpu::BindGroupLayout> = layout
            .bind_groups
            .iter()
            .map(|entries| {
                let entries: Vec<wgpu::BindGroupLayoutEntry> = entries
                    .iter()
                    .map(convert::bind_group_layout_entry)
                    .collect();
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(label),
                    entries: &entries,
                })
            })
            .collect();
        let layout_refs: Vec<&wgpu::BindGroupLayout> = bind_group_layouts.iter().collect();
        let push_constant_ranges: Vec<wgpu::PushConstantRange> = layout
            .push_constants
            .iter()
            .map(|range| wgpu::PushConstantRange {
                stages: convert::shader_stages(range.stages),
                range: 0..range.size,
            })
            .collect();

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &layout_refs,
            push_constant_ranges: &push_constant_ranges,
        });

        (pipeline_layout, bind_group_layouts)
    }

    /// Runs `create` inside a validation error scope so shader or layout mistakes surface as
    /// errors instead of a device-lost panic later on.
    fn validated<T>(&self, label: &'static str, create: impl FnOnce() -> T) -> BackendResult<T> {
        self.context
            .device
            .push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create();
        match pollster::block_on(self.context.device.pop_error_scope()) {
            Some(err) => Err(BackendError::PipelineCreationFailed(format!("{label}: {err}"))),
            None => Ok(value),
        }
    }

    fn create_bind_group(
        &self,
        layout: &wgpu::BindGroupLayout,
        entries: &[BindGroupEntry],
    ) -> BackendResult<wgpu::BindGroup> {
        let mut resolved = Vec::with_capacity(entries.len());
        for entry in entries {
            let resource = match entry.resource {
                BindingResource::Buffer(buffer) => self.buffer(buffer)?.as_entire_binding(),
                BindingResource::Texture(texture) | BindingResource::StorageTexture(texture) => {
                    wgpu::BindingResource::TextureView(&self.texture(texture)?.view)
                }
                BindingResource::Sampler(sampler) => wgpu::BindingResource::Sampler(
                    self.samplers
                        .get(&sampler.0)
                        .ok_or(BackendError::InvalidHandle {
                            kind: "sampler",
                            id: sampler.0,
                        })?,
                ),
            };
            resolved.push(wgpu::BindGroupEntry {
                binding: entry.binding,
                resource,
            });
        }

        Ok(self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: None,
                layout,
                entries: &resolved,
            }))
    }

    fn replay(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        commands: &[Command],
    ) -> BackendResult<()> {
        let mut cursor = 0;
        while cursor < commands.len() {
            match &commands[cursor] {
                Command::BeginRenderPass(desc) => {
                    let end = find_end(commands, cursor, |c| matches!(c, Command::EndRenderPass))?;
                    self.replay_render_pass(encoder, desc, &commands[cursor + 1..end])?;
                    cursor = end + 1;
                }
                Command::BeginComputePass { label } => {
                    let end =
                        find_end(commands, cursor, |c| matches!(c, Command::EndComputePass))?;
                    self.replay_compute_pass(encoder, label, &commands[cursor + 1..end])?;
                    cursor = end + 1;
                }
                other => {
                    log::warn!("Ignoring command outside of a pass: {:?}", other);
                    cursor += 1;
                }
            }
        }
        Ok(())
    }

    fn replay_render_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        desc: &crate::backend::command::RenderPassDescriptor,
        commands: &[Command],
    ) -> BackendResult<()> {
        let mut color_attachments = Vec::with_capacity(desc.color_attachments.len());
        for attachment in &desc.color_attachments {
            color_attachments.push(Some(wgpu::RenderPassColorAttachment {
                view: &self.texture(attachment.texture)?.view,
                resolve_target: None,
                depth_slice: None,
                ops: convert::color_ops(attachment.load, attachment.store),
            }));
        }
        let depth_stencil_attachment = match &desc.depth_attachment {
            Some(depth) => Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.texture(depth.texture)?.view,
                depth_ops: Some(convert::depth_ops(depth.load, depth.store)),
                stencil_ops: None,
            }),
            None => None,
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(desc.label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let mut current: Option<&WgpuPipeline> = None;
        for command in commands {
            match command {
                Command::SetPipeline(handle) => {
                    let pipeline = self.pipeline(*handle)?;
                    if let WgpuPipeline::Render { pipeline, .. } = pipeline {
                        pass.set_pipeline(pipeline);
                    }
                    current = Some(pipeline);
                }
                Command::SetBindGroup { index, entries } => {
                    let layout = current
                        .and_then(|pipeline| pipeline.bind_group_layout(*index))
                        .ok_or_else(|| {
                            BackendError::PipelineCreationFailed(format!(
                                "{}: bind group {} has no layout",
                                desc.label, index
                            ))
                        })?;
                    let bind_group = self.create_bind_group(layout, entries)?;
                    pass.set_bind_group(*index, &bind_group, &[]);
                }
                Command::SetVertexBuffer { slot, buffer } => {
                    pass.set_vertex_buffer(*slot, self.buffer(*buffer)?.slice(..));
                }
                Command::SetIndexBuffer { buffer, format } => {
                    pass.set_index_buffer(
                        self.buffer(*buffer)?.slice(..),
                        convert::index_format(*format),
                    );
                }
                Command::SetViewport(viewport) => {
                    pass.set_viewport(
                        viewport.x,
                        viewport.y,
                        viewport.width,
                        viewport.height,
                        0.0,
                        1.0,
                    );
                }
                Command::SetPushConstants {
                    stages,
                    offset,
                    data,
                } => {
                    pass.set_push_constants(convert::shader_stages(*stages), *offset, data);
                }
                Command::Draw {
                    vertices,
                    instances,
                } => pass.draw(vertices.clone(), instances.clone()),
                Command::DrawIndexed {
                    indices,
                    base_vertex,
                    instances,
                } => pass.draw_indexed(indices.clone(), *base_vertex, instances.clone()),
                other => log::warn!("Ignoring {:?} inside render pass {}", other, desc.label),
            }
        }

        Ok(())
    }

    fn replay_compute_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &'static str,
        commands: &[Command],
    ) -> BackendResult<()> {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });

        let mut current: Option<&WgpuPipeline> = None;
        for command in commands {
            match command {
                Command::SetPipeline(handle) => {
                    let pipeline = self.pipeline(*handle)?;
                    if let WgpuPipeline::Compute { pipeline, .. } = pipeline {
                        pass.set_pipeline(pipeline);
                    }
                    current = Some(pipeline);
                }
                Command::SetBindGroup { index, entries } => {
                    let layout = current
                        .and_then(|pipeline| pipeline.bind_group_layout(*index))
                        .ok_or_else(|| {
                            BackendError::PipelineCreationFailed(format!(
                                "{label}: bind group {index} has no layout"
                            ))
                        })?;
                    let bind_group = self.create_bind_group(layout, entries)?;
                    pass.set_bind_group(*index, &bind_group, &[]);
                }
                Command::SetPushConstants { offset, data, .. } => {
                    pass.set_push_constants(*offset, data);
                }
                Command::Dispatch { x, y, z } => pass.dispatch_workgroups(*x, *y, *z),
                other => log::warn!("Ignoring {:?} inside compute pass {}", other, label),
            }
        }

        Ok(())
    }
}

fn find_end(
    commands: &[Command],
    start: usize,
    is_end: impl Fn(&Command) -> bool,
) -> BackendResult<usize> {
    commands[start..]
        .iter()
        .position(is_end)
        .map(|offset| start + offset)
        .ok_or_else(|| BackendError::PipelineCreationFailed("unterminated pass".to_string()))
}

impl RenderDevice for WgpuDevice {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.extent.is_empty() {
            return Err(BackendError::ResourceCreationFailed(format!(
                "{} has an empty extent",
                desc.label
            )));
        }
        let texture = self
            .context
            .device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some(desc.label),
                size: wgpu::Extent3d {
                    width: desc.extent.width,
                    height: desc.extent.height,
                    depth_or_array_layers: desc.dimension.layers(),
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: convert::texture_format(desc.format),
                usage: convert::texture_usages(desc.usage),
                view_formats: &[],
            });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(desc.label),
            dimension: Some(match desc.dimension {
                TextureDimension::D2 => wgpu::TextureViewDimension::D2,
                TextureDimension::Cube => wgpu::TextureViewDimension::Cube,
            }),
            ..Default::default()
        });

        let id = self.handles.next();
        self.textures.insert(
            id,
            WgpuTexture {
                texture: Some(texture),
                view,
                label: desc.label,
                extent: desc.extent,
                format: desc.format,
            },
        );
        Ok(TextureHandle(id))
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        layer: u32,
        data: &[u8],
    ) -> BackendResult<()> {
        let entry = self.texture(texture)?;
        let Some(target) = entry.texture.as_ref() else {
            return Err(BackendError::InvalidHandle {
                kind: "writable texture",
                id: texture.0,
            });
        };
        let bytes_per_row = entry.extent.width * entry.format.bytes_per_pixel();
        let expected = bytes_per_row as u64 * entry.extent.height as u64;
        if data.len() as u64 != expected {
            return Err(BackendError::WriteOutOfBounds {
                label: entry.label,
                offset: 0,
                len: data.len() as u64,
                size: expected,
            });
        }

        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: target,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(entry.extent.height),
            },
            wgpu::Extent3d {
                width: entry.extent.width,
                height: entry.extent.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn texture_extent(&self, texture: TextureHandle) -> Option<Extent> {
        self.textures.get(&texture.0).map(|texture| texture.extent)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(WgpuTexture {
            texture: Some(texture),
            ..
        }) = self.textures.remove(&texture.0)
        {
            texture.destroy();
        }
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let buffer = self
            .context
            .device
            .create_buffer(&wgpu::BufferDescriptor {
                label: Some(desc.label),
                size: desc.size,
                usage: convert::buffer_usages(desc.usage),
                mapped_at_creation: false,
            });
        let id = self.handles.next();
        self.buffers.insert(
            id,
            WgpuBuffer {
                buffer,
                label: desc.label,
                size: desc.size,
            },
        );
        Ok(BufferHandle(id))
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> BackendResult<()> {
        let target = self
            .buffers
            .get(&buffer.0)
            .ok_or(BackendError::InvalidHandle {
                kind: "buffer",
                id: buffer.0,
            })?;
        if offset + data.len() as u64 > target.size {
            return Err(BackendError::WriteOutOfBounds {
                label: target.label,
                offset,
                len: data.len() as u64,
                size: target.size,
            });
        }
        self.context
            .queue
            .write_buffer(&target.buffer, offset, data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(&buffer.0) {
            buffer.buffer.destroy();
        }
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let filter = convert::filter_mode(desc.filter);
        let address_mode = convert::address_mode(desc.address_mode);
        let sampler = self
            .context
            .device
            .create_sampler(&wgpu::SamplerDescriptor {
                label: Some(desc.label),
                address_mode_u: address_mode,
                address_mode_v: address_mode,
                address_mode_w: address_mode,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::FilterMode::Nearest,
                compare: desc.compare.map(convert::compare_function),
                ..Default::default()
            });
        let id = self.handles.next();
        self.samplers.insert(id, sampler);
        Ok(SamplerHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<PipelineHandle> {
        let (pipeline_layout, bind_group_layouts) = self.create_layouts(desc.label, &desc.layout);
        let device = &self.context.device;

        let attributes: Vec<Vec<wgpu::VertexAttribute>> = desc
            .vertex_buffers
            .iter()
            .map(|layout| {
                layout
                    .attributes
                    .iter()
                    .map(|attribute| wgpu::VertexAttribute {
                        format: convert::vertex_format(attribute.format),
                        offset: attribute.offset,
                        shader_location: attribute.location,
                    })
                    .collect()
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = desc
            .vertex_buffers
            .iter()
            .zip(&attributes)
            .map(|(layout, attributes)| wgpu::VertexBufferLayout {
                array_stride: layout.stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();
        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_targets
            .iter()
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: convert::texture_format(target.format),
                    blend: Some(convert::blend_state(target.blend)),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = self.validated(desc.label, || {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.shader.label),
                source: wgpu::ShaderSource::Wgsl(desc.shader.wgsl.into()),
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some(desc.vertex_entry),
                    buffers: &vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions {
                        constants: &desc.constants,
                        ..Default::default()
                    },
                },
                fragment: desc.fragment_entry.map(|entry| wgpu::FragmentState {
                    module: &module,
                    entry_point: Some(entry),
                    targets: &targets,
                    compilation_options: wgpu::PipelineCompilationOptions {
                        constants: &desc.constants,
                        ..Default::default()
                    },
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: desc.cull_mode.map(convert::face),
                    front_face: convert::front_face(desc.front_face),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil: desc.depth.as_ref().map(convert::depth_stencil),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;

        let id = self.handles.next();
        self.pipelines.insert(
            id,
            WgpuPipeline::Render {
                pipeline,
                bind_group_layouts,
            },
        );
        log::debug!("Created render pipeline {}", desc.label);
        Ok(PipelineHandle(id))
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> BackendResult<PipelineHandle> {
        let (pipeline_layout, bind_group_layouts) = self.create_layouts(desc.label, &desc.layout);
        let device = &self.context.device;

        let pipeline = self.validated(desc.label, || {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.shader.label),
                source: wgpu::ShaderSource::Wgsl(desc.shader.wgsl.into()),
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(desc.entry_point),
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &desc.constants,
                    ..Default::default()
                },
                cache: None,
            })
        })?;

        let id = self.handles.next();
        self.pipelines.insert(
            id,
            WgpuPipeline::Compute {
                pipeline,
                bind_group_layouts,
            },
        );
        log::debug!("Created compute pipeline {}", desc.label);
        Ok(PipelineHandle(id))
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        self.pipelines.remove(&pipeline.0);
    }

    fn submit(&mut self, commands: &[Command]) -> BackendResult<SubmissionIndex> {
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                });
        self.replay(&mut encoder, commands)?;
        let wgpu_index = self.context.queue.submit(std::iter::once(encoder.finish()));

        let index = self.next_submission;
        self.next_submission += 1;
        self.in_flight.insert(index, wgpu_index);
        Ok(SubmissionIndex(index))
    }

    fn wait_for_submission(&mut self, submission: SubmissionIndex) -> BackendResult<()> {
        let Some(index) = self.in_flight.remove(&submission.0) else {
            return Ok(());
        };
        self.context
            .device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(index),
                timeout: None,
            })
            .map_err(|err| {
                log::error!("Waiting for submission {} failed: {}", submission.0, err);
                BackendError::DeviceLost
            })?;
        // Everything submitted before `submission` has finished as well.
        self.in_flight.retain(|id, _| *id > submission.0);
        Ok(())
    }

    fn wait_idle(&mut self) -> BackendResult<()> {
        self.context
            .device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|err| {
                log::error!("Waiting for device idle failed: {}", err);
                BackendError::DeviceLost
            })?;
        self.in_flight.clear();
        Ok(())
    }

    fn surface_format(&self) -> Option<TextureFormat> {
        convert::from_surface_format(self.context.config.format)
    }

    fn configure_surface(&mut self, extent: Extent) -> BackendResult<()> {
        if let Some((id, _)) = self.surface_texture.take() {
            self.textures.remove(&id);
        }
        self.context.configure(extent);
        Ok(())
    }

    fn acquire_surface_texture(&mut self) -> BackendResult<SurfaceImage> {
        let format = self.surface_format().ok_or_else(|| {
            BackendError::InitializationFailed(format!(
                "unsupported surface format {:?}",
                self.context.config.format
            ))
        })?;

        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Outdated) => return Err(BackendError::SurfaceOutdated),
            Err(wgpu::SurfaceError::Lost) => return Err(BackendError::SurfaceLost),
            Err(wgpu::SurfaceError::Timeout) => return Err(BackendError::SurfaceTimeout),
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(BackendError::DeviceLost),
            Err(err) => {
                return Err(BackendError::ResourceCreationFailed(format!(
                    "surface texture: {err}"
                )))
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let extent = self.context.extent();
        let suboptimal = frame.suboptimal;

        let id = self.handles.next();
        self.textures.insert(
            id,
            WgpuTexture {
                texture: None,
                view,
                label: "SurfaceTexture",
                extent,
                format,
            },
        );
        self.surface_texture = Some((id, frame));

        Ok(SurfaceImage {
            texture: TextureHandle(id),
            extent,
            suboptimal,
        })
    }

    fn present(&mut self, image: SurfaceImage) -> BackendResult<()> {
        match self.surface_texture.take() {
            Some((id, frame)) if id == image.texture.0 => {
                self.textures.remove(&id);
                frame.present();
                Ok(())
            }
            other => {
                self.surface_texture = other;
                Err(BackendError::InvalidHandle {
                    kind: "surface texture",
                    id: image.texture.0,
                })
            }
        }
    }

    fn discard_surface_texture(&mut self, image: SurfaceImage) {
        if let Some((id, _frame)) = self.surface_texture.take() {
            self.textures.remove(&id);
        }
        self.textures.remove(&image.texture.0);
    }
}
