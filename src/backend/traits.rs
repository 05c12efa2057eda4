//! Capability interface the renderer drives.
//!
//! A device creates textures, buffers, samplers and pipelines, accepts recorded command lists and
//! synchronizes with the GPU. Resources are referred to by opaque handles; a handle is only ever
//! issued once, so comparing handles is comparing resource identity.

use thiserror::Error;

use crate::backend::command::Command;
use crate::backend::types::*;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create resource: {0}")]
    ResourceCreationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Unknown {kind} handle {id}")]
    InvalidHandle { kind: &'static str, id: u64 },
    #[error("Write of {len} bytes at offset {offset} overflows {label} ({size} bytes)")]
    WriteOutOfBounds {
        label: &'static str,
        offset: u64,
        len: u64,
        size: u64,
    },
    #[error("No presentation surface is configured")]
    NoSurface,
    #[error("Surface is outdated")]
    SurfaceOutdated,
    #[error("Surface lost")]
    SurfaceLost,
    #[error("Timed out acquiring surface texture")]
    SurfaceTimeout,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerHandle(pub(crate) u64);

/// Render and compute pipelines share one handle space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub(crate) u64);

/// Monotonic id of a submitted command list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionIndex(pub(crate) u64);

impl SubmissionIndex {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Surface image handed out by [`RenderDevice::acquire_surface_texture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceImage {
    pub texture: TextureHandle,
    pub extent: Extent,
    /// The surface still works but no longer matches the window; it should be reconfigured.
    pub suboptimal: bool,
}

pub trait RenderDevice {
    fn name(&self) -> &'static str;

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;
    /// Uploads tightly packed texels into one array layer (cube face) of mip 0.
    fn write_texture(
        &mut self,
        texture: TextureHandle,
        layer: u32,
        data: &[u8],
    ) -> BackendResult<()>;
    fn texture_extent(&self, texture: TextureHandle) -> Option<Extent>;
    fn destroy_texture(&mut self, texture: TextureHandle);

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8])
        -> BackendResult<()>;
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle>;

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<PipelineHandle>;
    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> BackendResult<PipelineHandle>;
    fn destroy_pipeline(&mut self, pipeline: PipelineHandle);

    /// Executes a finished command list. Returns as soon as the work is queued.
    fn submit(&mut self, commands: &[Command]) -> BackendResult<SubmissionIndex>;
    /// Blocks until `submission` has completed on the GPU.
    fn wait_for_submission(&mut self, submission: SubmissionIndex) -> BackendResult<()>;
    /// Blocks until every submitted command list has completed.
    fn wait_idle(&mut self) -> BackendResult<()>;

    fn surface_format(&self) -> Option<TextureFormat>;
    fn configure_surface(&mut self, extent: Extent) -> BackendResult<()>;
    fn acquire_surface_texture(&mut self) -> BackendResult<SurfaceImage>;
    fn present(&mut self, image: SurfaceImage) -> BackendResult<()>;
    /// Releases an acquired image without presenting it.
    fn discard_surface_texture(&mut self, image: SurfaceImage);
}

/// Issues ids for every handle kind of one device.
#[derive(Debug)]
pub(crate) struct HandleAllocator {
    next: u64,
}

impl HandleAllocator {
    pub(crate) fn new() -> Self {
        Self { next: 1 }
    }

    pub(crate) fn next(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}
