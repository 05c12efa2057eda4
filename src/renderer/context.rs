// renderer/context.rs
// Explicitly constructed rendering context handed to every renderer and presenter call

use crate::backend::{CommandBuffer, RenderDevice, SubmissionIndex};
use crate::error::RendererResult;
use crate::settings::MAX_FRAMES_IN_FLIGHT;

/// Owns the device and the frame counter shared by everything that records GPU work.
pub struct RenderContext<D: RenderDevice> {
    device: D,
    frames_in_flight: usize,
    frame_index: u64,
}

impl<D: RenderDevice> RenderContext<D> {
    pub fn new(device: D, frames_in_flight: usize) -> Self {
        let clamped = frames_in_flight.clamp(1, MAX_FRAMES_IN_FLIGHT);
        if clamped != frames_in_flight {
            log::warn!(
                "frames_in_flight {} is outside 1..={}, using {}",
                frames_in_flight,
                MAX_FRAMES_IN_FLIGHT,
                clamped
            );
        }
        log::info!(
            "Render context on {} backend, {} frames in flight",
            device.name(),
            clamped
        );
        Self {
            device,
            frames_in_flight: clamped,
            frame_index: 0,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Number of frames started so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Ring slot of the frame currently being recorded.
    pub fn current_frame(&self) -> usize {
        (self.frame_index.saturating_sub(1) % self.frames_in_flight as u64) as usize
    }

    /// Starts a new frame and returns its ring slot.
    pub(crate) fn advance_frame(&mut self) -> usize {
        self.frame_index += 1;
        self.current_frame()
    }

    /// Submits a finished command buffer and moves it to `Pending`.
    pub fn submit(&mut self, commands: &mut CommandBuffer) -> RendererResult<SubmissionIndex> {
        commands.ensure_executable()?;
        let submission = self.device.submit(commands.commands())?;
        commands.mark_pending(submission)?;
        Ok(submission)
    }

    pub fn wait_idle(&mut self) -> RendererResult<()> {
        self.device.wait_idle()?;
        Ok(())
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessDevice, RecordingError, RecordingState};
    use crate::error::RendererError;

    #[test]
    fn frame_slots_wrap_around_the_ring() {
        let mut ctx = RenderContext::new(HeadlessDevice::new(), 2);
        let slots: Vec<usize> = (0..5).map(|_| ctx.advance_frame()).collect();
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(ctx.frame_index(), 5);
    }

    #[test]
    fn frames_in_flight_is_clamped() {
        let ctx = RenderContext::new(HeadlessDevice::new(), 9);
        assert_eq!(ctx.frames_in_flight(), MAX_FRAMES_IN_FLIGHT);
    }

    #[test]
    fn unfinished_buffers_are_not_submitted() {
        let mut ctx = RenderContext::new(HeadlessDevice::new(), 2);
        let mut commands = CommandBuffer::new("Test");
        commands.begin().unwrap();

        let err = ctx.submit(&mut commands).unwrap_err();
        assert!(matches!(
            err,
            RendererError::Recording(RecordingError::NotExecutable { .. })
        ));
        assert!(ctx.device().submissions().is_empty());

        commands.end().unwrap();
        let submission = ctx.submit(&mut commands).unwrap();
        assert_eq!(commands.state(), RecordingState::Pending(submission));
    }
}
