//! Headless device.
//!
//! Performs no GPU work. It tracks every resource it hands out, keeps the contents of buffers
//! written through it and stores each submitted command list, which lets tests observe exactly
//! what the renderer asked the GPU to do. Submissions complete immediately.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::backend::command::{BindingResource, Command};
use crate::backend::traits::*;
use crate::backend::types::*;

/// Outcome of the next [`RenderDevice::acquire_surface_texture`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireBehavior {
    Ready,
    Suboptimal,
    Outdated,
    Lost,
}

#[derive(Debug)]
struct HeadlessBuffer {
    desc: BufferDescriptor,
    data: Vec<u8>,
}

#[derive(Debug)]
struct HeadlessSurface {
    format: TextureFormat,
    extent: Extent,
    configurations: u32,
    presented: u32,
    discarded: u32,
    script: VecDeque<AcquireBehavior>,
    acquired: Option<TextureHandle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub index: SubmissionIndex,
    pub commands: Vec<Command>,
}

#[derive(Debug, Default)]
pub struct HeadlessDevice {
    handles: HandleAllocator,
    textures: HashMap<u64, TextureDescriptor>,
    buffers: HashMap<u64, HeadlessBuffer>,
    samplers: HashSet<u64>,
    pipelines: HashMap<u64, &'static str>,
    pipelines_created: u32,
    submissions: Vec<Submission>,
    waited_submissions: Vec<SubmissionIndex>,
    wait_idle_calls: u32,
    /// Pipeline creations that succeed before the next one fails.
    pipeline_failure_after: Option<u32>,
    surface: Option<HeadlessSurface>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that also owns a presentation surface of the given size.
    pub fn with_surface(format: TextureFormat, extent: Extent) -> Self {
        let mut device = Self::new();
        device.surface = Some(HeadlessSurface {
            format,
            extent,
            configurations: 0,
            presented: 0,
            discarded: 0,
            script: VecDeque::new(),
            acquired: None,
        });
        device
    }

    /// Queues the result of an upcoming surface acquire. Unscripted acquires succeed.
    pub fn script_acquire(&mut self, behavior: AcquireBehavior) {
        if let Some(surface) = self.surface.as_mut() {
            surface.script.push_back(behavior);
        }
    }

    /// Makes the pipeline creation after the next `successes` ones fail.
    pub fn fail_pipeline_after(&mut self, successes: u32) {
        self.pipeline_failure_after = Some(successes);
    }

    fn check_pipeline_request(&mut self, label: &str, wgsl: &str) -> BackendResult<()> {
        if wgsl.is_empty() {
            return Err(BackendError::PipelineCreationFailed(format!(
                "{} has no shader source",
                label
            )));
        }
        match self.pipeline_failure_after {
            Some(0) => {
                self.pipeline_failure_after = None;
                Err(BackendError::PipelineCreationFailed(format!(
                    "{} failed on request",
                    label
                )))
            }
            Some(remaining) => {
                self.pipeline_failure_after = Some(remaining - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(|buffer| buffer.data.as_slice())
    }

    pub fn pipeline_label(&self, pipeline: PipelineHandle) -> Option<&'static str> {
        self.pipelines.get(&pipeline.0).copied()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    pub fn pipelines_created(&self) -> u32 {
        self.pipelines_created
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn last_submission(&self) -> Option<&Submission> {
        self.submissions.last()
    }

    pub fn waited_submissions(&self) -> &[SubmissionIndex] {
        &self.waited_submissions
    }

    pub fn wait_idle_calls(&self) -> u32 {
        self.wait_idle_calls
    }

    pub fn presented_frames(&self) -> u32 {
        self.surface.as_ref().map_or(0, |surface| surface.presented)
    }

    pub fn discarded_frames(&self) -> u32 {
        self.surface.as_ref().map_or(0, |surface| surface.discarded)
    }

    pub fn surface_configurations(&self) -> u32 {
        self.surface
            .as_ref()
            .map_or(0, |surface| surface.configurations)
    }

    fn check_texture(&self, texture: TextureHandle) -> BackendResult<()> {
        if self.textures.contains_key(&texture.0) {
            Ok(())
        } else {
            Err(BackendError::InvalidHandle {
                kind: "texture",
                id: texture.0,
            })
        }
    }

    fn check_buffer(&self, buffer: BufferHandle) -> BackendResult<()> {
        if self.buffers.contains_key(&buffer.0) {
            Ok(())
        } else {
            Err(BackendError::InvalidHandle {
                kind: "buffer",
                id: buffer.0,
            })
        }
    }

    fn check_pipeline(&self, pipeline: PipelineHandle) -> BackendResult<()> {
        if self.pipelines.contains_key(&pipeline.0) {
            Ok(())
        } else {
            Err(BackendError::InvalidHandle {
                kind: "pipeline",
                id: pipeline.0,
            })
        }
    }

    /// Rejects command lists that reference destroyed or unknown resources.
    fn validate(&self, commands: &[Command]) -> BackendResult<()> {
        for command in commands {
            match command {
                Command::BeginRenderPass(desc) => {
                    for attachment in &desc.color_attachments {
                        self.check_texture(attachment.texture)?;
                    }
                    if let Some(depth) = &desc.depth_attachment {
                        self.check_texture(depth.texture)?;
                    }
                }
                Command::SetPipeline(pipeline) => self.check_pipeline(*pipeline)?,
                Command::SetBindGroup { entries, .. } => {
                    for entry in entries {
                        match entry.resource {
                            BindingResource::Buffer(buffer) => self.check_buffer(buffer)?,
                            BindingResource::Texture(texture)
                            | BindingResource::StorageTexture(texture) => {
                                self.check_texture(texture)?
                            }
                            BindingResource::Sampler(sampler) => {
                                if !self.samplers.contains(&sampler.0) {
                                    return Err(BackendError::InvalidHandle {
                                        kind: "sampler",
                                        id: sampler.0,
                                    });
                                }
                            }
                        }
                    }
                }
                Command::SetVertexBuffer { buffer, .. }
                | Command::SetIndexBuffer { buffer, .. } => self.check_buffer(*buffer)?,
                _ => {}
            }
        }
        Ok(())
    }
}

impl RenderDevice for HeadlessDevice {
    fn name(&self) -> &'static str {
        "Headless"
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.extent.is_empty() {
            return Err(BackendError::ResourceCreationFailed(format!(
                "{} has an empty extent",
                desc.label
            )));
        }
        let id = self.handles.next();
        log::trace!(
            "Headless: creating texture {} ({}x{})",
            desc.label,
            desc.extent.width,
            desc.extent.height
        );
        self.textures.insert(id, desc.clone());
        Ok(TextureHandle(id))
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        layer: u32,
        data: &[u8],
    ) -> BackendResult<()> {
        let desc = self
            .textures
            .get(&texture.0)
            .ok_or(BackendError::InvalidHandle {
                kind: "texture",
                id: texture.0,
            })?;
        let expected = desc.extent.width as u64
            * desc.extent.height as u64
            * desc.format.bytes_per_pixel() as u64;
        if layer >= desc.dimension.layers() || data.len() as u64 != expected {
            return Err(BackendError::WriteOutOfBounds {
                label: desc.label,
                offset: layer as u64 * expected,
                len: data.len() as u64,
                size: expected * desc.dimension.layers() as u64,
            });
        }
        Ok(())
    }

    fn texture_extent(&self, texture: TextureHandle) -> Option<Extent> {
        self.textures.get(&texture.0).map(|desc| desc.extent)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.0);
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let id = self.handles.next();
        self.buffers.insert(
            id,
            HeadlessBuffer {
                desc: desc.clone(),
                data: vec![0; desc.size as usize],
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
            .get_mut(&buffer.0)
            .ok_or(BackendError::InvalidHandle {
                kind: "buffer",
                id: buffer.0,
            })?;
        let end = offset + data.len() as u64;
        if end > target.desc.size {
            return Err(BackendError::WriteOutOfBounds {
                label: target.desc.label,
                offset,
                len: data.len() as u64,
                size: target.desc.size,
            });
        }
        target.data[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
    }

    fn create_sampler(&mut self, _desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let id = self.handles.next();
        self.samplers.insert(id);
        Ok(SamplerHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<PipelineHandle> {
        self.check_pipeline_request(desc.label, desc.shader.wgsl)?;
        let id = self.handles.next();
        self.pipelines.insert(id, desc.label);
        self.pipelines_created += 1;
        Ok(PipelineHandle(id))
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> BackendResult<PipelineHandle> {
        self.check_pipeline_request(desc.label, desc.shader.wgsl)?;
        let id = self.handles.next();
        self.pipelines.insert(id, desc.label);
        self.pipelines_created += 1;
        Ok(PipelineHandle(id))
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        self.pipelines.remove(&pipeline.0);
    }

    fn submit(&mut self, commands: &[Command]) -> BackendResult<SubmissionIndex> {
        self.validate(commands)?;
        let index = SubmissionIndex(self.submissions.len() as u64 + 1);
        self.submissions.push(Submission {
            index,
            commands: commands.to_vec(),
        });
        Ok(index)
    }

    fn wait_for_submission(&mut self, submission: SubmissionIndex) -> BackendResult<()> {
        self.waited_submissions.push(submission);
        Ok(())
    }

    fn wait_idle(&mut self) -> BackendResult<()> {
        self.wait_idle_calls += 1;
        Ok(())
    }

    fn surface_format(&self) -> Option<TextureFormat> {
        self.surface.as_ref().map(|surface| surface.format)
    }

    fn configure_surface(&mut self, extent: Extent) -> BackendResult<()> {
        let surface = self.surface.as_mut().ok_or(BackendError::NoSurface)?;
        surface.extent = extent;
        surface.configurations += 1;
        Ok(())
    }

    fn acquire_surface_texture(&mut self) -> BackendResult<SurfaceImage> {
        let (format, extent, behavior) = {
            let surface = self.surface.as_mut().ok_or(BackendError::NoSurface)?;
            let behavior = surface.script.pop_front().unwrap_or(AcquireBehavior::Ready);
            (surface.format, surface.extent, behavior)
        };

        let suboptimal = match behavior {
            AcquireBehavior::Ready => false,
            AcquireBehavior::Suboptimal => true,
            AcquireBehavior::Outdated => return Err(BackendError::SurfaceOutdated),
            AcquireBehavior::Lost => return Err(BackendError::SurfaceLost),
        };

        let texture = self.create_texture(&TextureDescriptor {
            label: "HeadlessSurfaceTexture",
            extent,
            format,
            usage: TextureUsages::RENDER_ATTACHMENT,
            dimension: TextureDimension::D2,
        })?;
        if let Some(surface) = self.surface.as_mut() {
            surface.acquired = Some(texture);
        }

        Ok(SurfaceImage {
            texture,
            extent,
            suboptimal,
        })
    }

    fn present(&mut self, image: SurfaceImage) -> BackendResult<()> {
        let surface = self.surface.as_mut().ok_or(BackendError::NoSurface)?;
        if surface.acquired.take() != Some(image.texture) {
            return Err(BackendError::InvalidHandle {
                kind: "surface texture",
                id: image.texture.0,
            });
        }
        surface.presented += 1;
        self.textures.remove(&image.texture.0);
        Ok(())
    }

    fn discard_surface_texture(&mut self, image: SurfaceImage) {
        if let Some(surface) = self.surface.as_mut() {
            if surface.acquired.take().is_some() {
                surface.discarded += 1;
            }
        }
        self.textures.remove(&image.texture.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_writes_are_bounds_checked() {
        let mut device = HeadlessDevice::new();
        let buffer = device
            .create_buffer(&BufferDescriptor {
                label: "Test",
                size: 8,
                usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            })
            .unwrap();

        device.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(device.buffer_contents(buffer), Some(&[0, 0, 0, 0, 1, 2, 3, 4][..]));
        assert!(matches!(
            device.write_buffer(buffer, 6, &[1, 2, 3, 4]),
            Err(BackendError::WriteOutOfBounds { .. })
        ));
    }

    #[test]
    fn submissions_referencing_destroyed_textures_are_rejected() {
        let mut device = HeadlessDevice::new();
        let texture = device
            .create_texture(&TextureDescriptor::render_target(
                "Target",
                Extent::new(4, 4),
                TextureFormat::Rgba8Unorm,
            ))
            .unwrap();
        device.destroy_texture(texture);

        let commands = vec![Command::BeginRenderPass(
            crate::backend::command::RenderPassDescriptor {
                label: "Pass",
                color_attachments: vec![crate::backend::command::ColorAttachment::clear(
                    texture,
                    [0.0; 4],
                )],
                depth_attachment: None,
            },
        )];
        assert!(matches!(
            device.submit(&commands),
            Err(BackendError::InvalidHandle { kind: "texture", .. })
        ));
    }

    #[test]
    fn scripted_acquire_results_are_consumed_in_order() {
        let mut device = HeadlessDevice::with_surface(TextureFormat::Bgra8Unorm, Extent::new(8, 8));
        device.script_acquire(AcquireBehavior::Outdated);
        device.script_acquire(AcquireBehavior::Suboptimal);

        assert!(matches!(
            device.acquire_surface_texture(),
            Err(BackendError::SurfaceOutdated)
        ));
        let image = device.acquire_surface_texture().unwrap();
        assert!(image.suboptimal);
        device.discard_surface_texture(image);

        let image = device.acquire_surface_texture().unwrap();
        assert!(!image.suboptimal);
        device.present(image).unwrap();
        assert_eq!(device.presented_frames(), 1);
        assert_eq!(device.discarded_frames(), 1);
    }

    #[test]
    fn scripted_pipeline_failure_fires_once() {
        let mut device = HeadlessDevice::new();
        let desc = ComputePipelineDescriptor {
            label: "Compute",
            shader: ShaderSource {
                label: "compute.wgsl",
                wgsl: "@compute @workgroup_size(1) fn main() {}",
            },
            entry_point: "main",
            layout: PipelineLayoutDescriptor::default(),
            constants: Vec::new(),
        };

        device.fail_pipeline_after(1);
        assert!(device.create_compute_pipeline(&desc).is_ok());
        assert!(matches!(
            device.create_compute_pipeline(&desc),
            Err(BackendError::PipelineCreationFailed(_))
        ));
        assert!(device.create_compute_pipeline(&desc).is_ok());
        assert_eq!(device.live_pipelines(), 2);
    }
}
