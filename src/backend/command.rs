//! Explicit command recording.
//!
//! A [`CommandBuffer`] is recorded with `begin()`, a sequence of typed commands and `end()`.
//! Its state machine is checked at runtime: recording twice, nesting passes, issuing draw calls
//! outside a render pass, submitting an unfinished buffer or reusing one that the GPU still owns
//! are all rejected with a [`RecordingError`].

use std::ops::Range;

use thiserror::Error;

use crate::backend::traits::{
    BufferHandle, PipelineHandle, SamplerHandle, SubmissionIndex, TextureHandle,
};
use crate::backend::types::{IndexFormat, ShaderStages};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<T> {
    Clear(T),
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachment {
    pub texture: TextureHandle,
    pub load: LoadOp<[f64; 4]>,
    pub store: StoreOp,
}

impl ColorAttachment {
    pub fn clear(texture: TextureHandle, color: [f64; 4]) -> Self {
        Self {
            texture,
            load: LoadOp::Clear(color),
            store: StoreOp::Store,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthAttachment {
    pub texture: TextureHandle,
    pub load: LoadOp<f32>,
    pub store: StoreOp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDescriptor {
    pub label: &'static str,
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_attachment: Option<DepthAttachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingResource {
    Buffer(BufferHandle),
    Texture(TextureHandle),
    StorageTexture(TextureHandle),
    Sampler(SamplerHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupEntry {
    pub binding: u32,
    pub resource: BindingResource,
}

impl BindGroupEntry {
    pub const fn new(binding: u32, resource: BindingResource) -> Self {
        Self { binding, resource }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginRenderPass(RenderPassDescriptor),
    EndRenderPass,
    BeginComputePass { label: &'static str },
    EndComputePass,
    SetPipeline(PipelineHandle),
    SetBindGroup {
        index: u32,
        entries: Vec<BindGroupEntry>,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: BufferHandle,
    },
    SetIndexBuffer {
        buffer: BufferHandle,
        format: IndexFormat,
    },
    SetViewport(Viewport),
    SetPushConstants {
        stages: ShaderStages,
        offset: u32,
        data: Vec<u8>,
    },
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Render,
    Compute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Initial,
    Recording,
    Executable,
    /// Submitted and possibly still executing on the GPU.
    Pending(SubmissionIndex),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    #[error("Command buffer {label} is already recording")]
    AlreadyRecording { label: &'static str },
    #[error("Command buffer {label} is not recording")]
    NotRecording { label: &'static str },
    #[error("Cannot open a {requested:?} pass on {label} while a {open:?} pass is open")]
    NestedPass {
        label: &'static str,
        open: PassKind,
        requested: PassKind,
    },
    #[error("Command on {label} requires an open {expected:?} pass")]
    NoActivePass {
        label: &'static str,
        expected: PassKind,
    },
    #[error("Command buffer {label} ended with a {open:?} pass still open")]
    PassStillOpen { label: &'static str, open: PassKind },
    #[error("Command buffer {label} is not executable (state {state:?})")]
    NotExecutable {
        label: &'static str,
        state: RecordingState,
    },
    #[error("Command buffer {label} is still pending on submission {submission:?}")]
    StillPending {
        label: &'static str,
        submission: SubmissionIndex,
    },
}

#[derive(Debug)]
pub struct CommandBuffer {
    label: &'static str,
    state: RecordingState,
    open_pass: Option<PassKind>,
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            state: RecordingState::Initial,
            open_pass: None,
            commands: Vec::new(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Starts a new recording, discarding whatever was recorded before.
    pub fn begin(&mut self) -> Result<(), RecordingError> {
        match self.state {
            RecordingState::Initial | RecordingState::Executable => {
                self.commands.clear();
                self.open_pass = None;
                self.state = RecordingState::Recording;
                Ok(())
            }
            RecordingState::Recording => {
                Err(RecordingError::AlreadyRecording { label: self.label })
            }
            RecordingState::Pending(submission) => Err(RecordingError::StillPending {
                label: self.label,
                submission,
            }),
        }
    }

    pub fn end(&mut self) -> Result<(), RecordingError> {
        self.ensure_recording()?;
        if let Some(open) = self.open_pass {
            return Err(RecordingError::PassStillOpen {
                label: self.label,
                open,
            });
        }
        self.state = RecordingState::Executable;
        Ok(())
    }

    pub fn begin_render_pass(&mut self, desc: RenderPassDescriptor) -> Result<(), RecordingError> {
        self.open(PassKind::Render)?;
        self.commands.push(Command::BeginRenderPass(desc));
        Ok(())
    }

    pub fn end_render_pass(&mut self) -> Result<(), RecordingError> {
        self.close(PassKind::Render)?;
        self.commands.push(Command::EndRenderPass);
        Ok(())
    }

    pub fn begin_compute_pass(&mut self, label: &'static str) -> Result<(), RecordingError> {
        self.open(PassKind::Compute)?;
        self.commands.push(Command::BeginComputePass { label });
        Ok(())
    }

    pub fn end_compute_pass(&mut self) -> Result<(), RecordingError> {
        self.close(PassKind::Compute)?;
        self.commands.push(Command::EndComputePass);
        Ok(())
    }

    pub fn set_pipeline(&mut self, pipeline: PipelineHandle) -> Result<(), RecordingError> {
        self.in_any_pass()?;
        self.commands.push(Command::SetPipeline(pipeline));
        Ok(())
    }

    pub fn set_bind_group(
        &mut self,
        index: u32,
        entries: Vec<BindGroupEntry>,
    ) -> Result<(), RecordingError> {
        self.in_any_pass()?;
        self.commands.push(Command::SetBindGroup { index, entries });
        Ok(())
    }

    pub fn set_push_constants(
        &mut self,
        stages: ShaderStages,
        offset: u32,
        data: &[u8],
    ) -> Result<(), RecordingError> {
        self.in_any_pass()?;
        self.commands.push(Command::SetPushConstants {
            stages,
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }

    pub fn set_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: BufferHandle,
    ) -> Result<(), RecordingError> {
        self.in_pass(PassKind::Render)?;
        self.commands.push(Command::SetVertexBuffer { slot, buffer });
        Ok(())
    }

    pub fn set_index_buffer(
        &mut self,
        buffer: BufferHandle,
        format: IndexFormat,
    ) -> Result<(), RecordingError> {
        self.in_pass(PassKind::Render)?;
        self.commands.push(Command::SetIndexBuffer { buffer, format });
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), RecordingError> {
        self.in_pass(PassKind::Render)?;
        self.commands.push(Command::SetViewport(viewport));
        Ok(())
    }

    pub fn draw(
        &mut self,
        vertices: Range<u32>,
        instances: Range<u32>,
    ) -> Result<(), RecordingError> {
        self.in_pass(PassKind::Render)?;
        self.commands.push(Command::Draw {
            vertices,
            instances,
        });
        Ok(())
    }

    pub fn draw_indexed(
        &mut self,
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    ) -> Result<(), RecordingError> {
        self.in_pass(PassKind::Render)?;
        self.commands.push(Command::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
        Ok(())
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<(), RecordingError> {
        self.in_pass(PassKind::Compute)?;
        self.commands.push(Command::Dispatch { x, y, z });
        Ok(())
    }

    /// Moves an executable buffer to `Pending` once the device accepted it.
    pub(crate) fn mark_pending(
        &mut self,
        submission: SubmissionIndex,
    ) -> Result<(), RecordingError> {
        self.ensure_executable()?;
        self.state = RecordingState::Pending(submission);
        Ok(())
    }

    pub(crate) fn ensure_executable(&self) -> Result<(), RecordingError> {
        match self.state {
            RecordingState::Executable => Ok(()),
            state => Err(RecordingError::NotExecutable {
                label: self.label,
                state,
            }),
        }
    }

    /// Returns the buffer to `Initial`. The caller must have waited on a pending submission.
    pub fn reset(&mut self) -> Result<(), RecordingError> {
        if self.state == RecordingState::Recording {
            return Err(RecordingError::AlreadyRecording { label: self.label });
        }
        self.commands.clear();
        self.open_pass = None;
        self.state = RecordingState::Initial;
        Ok(())
    }

    /// Drops a recording that was interrupted by an error. Pending buffers are left untouched.
    pub(crate) fn abandon(&mut self) {
        if self.state == RecordingState::Recording {
            self.commands.clear();
            self.open_pass = None;
            self.state = RecordingState::Initial;
        }
    }

    fn ensure_recording(&self) -> Result<(), RecordingError> {
        if self.state == RecordingState::Recording {
            Ok(())
        } else {
            Err(RecordingError::NotRecording { label: self.label })
        }
    }

    fn open(&mut self, requested: PassKind) -> Result<(), RecordingError> {
        self.ensure_recording()?;
        if let Some(open) = self.open_pass {
            return Err(RecordingError::NestedPass {
                label: self.label,
                open,
                requested,
            });
        }
        self.open_pass = Some(requested);
        Ok(())
    }

    fn close(&mut self, kind: PassKind) -> Result<(), RecordingError> {
        self.in_pass(kind)?;
        self.open_pass = None;
        Ok(())
    }

    fn in_pass(&self, expected: PassKind) -> Result<(), RecordingError> {
        self.ensure_recording()?;
        if self.open_pass == Some(expected) {
            Ok(())
        } else {
            Err(RecordingError::NoActivePass {
                label: self.label,
                expected,
            })
        }
    }

    fn in_any_pass(&self) -> Result<(), RecordingError> {
        self.ensure_recording()?;
        if self.open_pass.is_some() {
            Ok(())
        } else {
            Err(RecordingError::NoActivePass {
                label: self.label,
                expected: PassKind::Render,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(label: &'static str) -> RenderPassDescriptor {
        RenderPassDescriptor {
            label,
            color_attachments: Vec::new(),
            depth_attachment: None,
        }
    }

    #[test]
    fn records_a_full_render_pass() {
        let mut cmd = CommandBuffer::new("Test");
        cmd.begin().unwrap();
        cmd.begin_render_pass(pass("Main")).unwrap();
        cmd.set_pipeline(PipelineHandle(1)).unwrap();
        cmd.draw(0..3, 0..1).unwrap();
        cmd.end_render_pass().unwrap();
        cmd.end().unwrap();

        assert_eq!(cmd.state(), RecordingState::Executable);
        assert_eq!(cmd.commands().len(), 4);
        assert!(matches!(cmd.commands()[2], Command::Draw { .. }));
    }

    #[test]
    fn rejects_nested_begin() {
        let mut cmd = CommandBuffer::new("Test");
        cmd.begin().unwrap();
        assert_eq!(
            cmd.begin(),
            Err(RecordingError::AlreadyRecording { label: "Test" })
        );
    }

    #[test]
    fn rejects_nested_passes() {
        let mut cmd = CommandBuffer::new("Test");
        cmd.begin().unwrap();
        cmd.begin_render_pass(pass("Outer")).unwrap();
        let err = cmd.begin_compute_pass("Inner").unwrap_err();
        assert_eq!(
            err,
            RecordingError::NestedPass {
                label: "Test",
                open: PassKind::Render,
                requested: PassKind::Compute,
            }
        );
    }

    #[test]
    fn rejects_draws_outside_render_pass() {
        let mut cmd = CommandBuffer::new("Test");
        assert!(matches!(
            cmd.draw(0..3, 0..1),
            Err(RecordingError::NotRecording { .. })
        ));

        cmd.begin().unwrap();
        cmd.begin_compute_pass("Compute").unwrap();
        assert!(matches!(
            cmd.draw(0..3, 0..1),
            Err(RecordingError::NoActivePass {
                expected: PassKind::Render,
                ..
            })
        ));
        cmd.dispatch(1, 1, 1).unwrap();
    }

    #[test]
    fn end_requires_closed_passes() {
        let mut cmd = CommandBuffer::new("Test");
        cmd.begin().unwrap();
        cmd.begin_render_pass(pass("Open")).unwrap();
        assert!(matches!(
            cmd.end(),
            Err(RecordingError::PassStillOpen { .. })
        ));
    }

    #[test]
    fn pending_buffers_cannot_be_rerecorded_until_reset() {
        let mut cmd = CommandBuffer::new("Test");
        cmd.begin().unwrap();
        cmd.end().unwrap();
        cmd.mark_pending(SubmissionIndex(7)).unwrap();

        assert_eq!(
            cmd.begin(),
            Err(RecordingError::StillPending {
                label: "Test",
                submission: SubmissionIndex(7),
            })
        );

        cmd.reset().unwrap();
        assert_eq!(cmd.state(), RecordingState::Initial);
        cmd.begin().unwrap();
    }

    #[test]
    fn only_executable_buffers_can_be_marked_pending() {
        let mut cmd = CommandBuffer::new("Test");
        assert!(cmd.mark_pending(SubmissionIndex(1)).is_err());
        cmd.begin().unwrap();
        assert!(cmd.mark_pending(SubmissionIndex(1)).is_err());
    }
}
