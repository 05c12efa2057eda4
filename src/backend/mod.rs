//! GPU backend seam.
//!
//! The renderer only talks to [`RenderDevice`]. [`WgpuDevice`] drives a real GPU through wgpu;
//! [`HeadlessDevice`] records everything it is asked to do and is what the tests run against.

pub mod command;
pub mod headless;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use command::{
    BindGroupEntry, BindingResource, ColorAttachment, Command, CommandBuffer, DepthAttachment,
    LoadOp, PassKind, RecordingError, RecordingState, RenderPassDescriptor, StoreOp, Viewport,
};
pub use headless::{AcquireBehavior, HeadlessDevice, Submission};
pub use traits::{
    BackendError, BackendResult, BufferHandle, PipelineHandle, RenderDevice, SamplerHandle,
    SubmissionIndex, SurfaceImage, TextureHandle,
};
pub use types::*;
pub use wgpu_backend::WgpuDevice;
