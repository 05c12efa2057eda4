// renderer/frame.rs
// Ring of per-frame command buffers gated on their previous submission

use crate::backend::{CommandBuffer, RecordingState, RenderDevice, SubmissionIndex};
use crate::error::RendererResult;
use crate::renderer::context::RenderContext;

#[derive(Debug)]
pub struct FrameSlot {
    commands: CommandBuffer,
    submission: Option<SubmissionIndex>,
}

impl FrameSlot {
    pub fn new(label: &'static str) -> Self {
        Self {
            commands: CommandBuffer::new(label),
            submission: None,
        }
    }

    /// Blocks until the GPU is done with this slot's last submission.
    pub fn wait<D: RenderDevice>(&mut self, device: &mut D) -> RendererResult<()> {
        if let Some(submission) = self.submission.take() {
            device.wait_for_submission(submission)?;
        }
        Ok(())
    }

    /// Waits on the previous submission and opens a new recording.
    pub fn begin<D: RenderDevice>(&mut self, device: &mut D) -> RendererResult<&mut CommandBuffer> {
        self.wait(device)?;
        if self.commands.state() == RecordingState::Recording {
            log::warn!(
                "Discarding interrupted recording of {}",
                self.commands.label()
            );
            self.commands.abandon();
        }
        self.commands.reset()?;
        self.commands.begin()?;
        Ok(&mut self.commands)
    }

    pub fn commands_mut(&mut self) -> &mut CommandBuffer {
        &mut self.commands
    }

    /// Ends the recording and submits it.
    pub fn submit<D: RenderDevice>(
        &mut self,
        ctx: &mut RenderContext<D>,
    ) -> RendererResult<SubmissionIndex> {
        self.commands.end()?;
        let submission = ctx.submit(&mut self.commands)?;
        self.submission = Some(submission);
        Ok(submission)
    }

    pub fn submission(&self) -> Option<SubmissionIndex> {
        self.submission
    }

    /// Forgets the pending submission after a device-wide idle wait.
    pub(crate) fn retire(&mut self) {
        self.submission = None;
        self.commands.abandon();
        if let Err(err) = self.commands.reset() {
            log::warn!("Retiring {} failed: {}", self.commands.label(), err);
        }
    }
}

/// One [`FrameSlot`] per frame in flight.
#[derive(Debug)]
pub struct FrameRing {
    slots: Vec<FrameSlot>,
}

impl FrameRing {
    pub fn new(label: &'static str, frames_in_flight: usize) -> Self {
        Self {
            slots: (0..frames_in_flight.max(1))
                .map(|_| FrameSlot::new(label))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut FrameSlot {
        let len = self.slots.len();
        &mut self.slots[index % len]
    }

    pub(crate) fn retire_all(&mut self) {
        self.slots.iter_mut().for_each(FrameSlot::retire);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;

    #[test]
    fn reusing_a_slot_waits_for_its_previous_submission() {
        let mut ctx = RenderContext::new(HeadlessDevice::new(), 1);
        let mut slot = FrameSlot::new("Frame");

        slot.begin(ctx.device_mut()).unwrap();
        let first = slot.submit(&mut ctx).unwrap();

        slot.begin(ctx.device_mut()).unwrap();
        assert_eq!(ctx.device().waited_submissions(), &[first]);
        assert_eq!(slot.commands_mut().state(), RecordingState::Recording);
    }

    #[test]
    fn interrupted_recording_is_discarded() {
        let mut device = HeadlessDevice::new();
        let mut slot = FrameSlot::new("Frame");

        slot.begin(&mut device).unwrap();
        slot.commands_mut().begin_compute_pass("Half").unwrap();

        let commands = slot.begin(&mut device).unwrap();
        assert!(commands.commands().is_empty());
    }
}
