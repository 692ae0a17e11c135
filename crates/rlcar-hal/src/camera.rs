//! Image sensor with driver-owned frame buffers.

use rlcar_types::CarError;

/// One captured, already-encoded (JPEG) frame.
///
/// The buffer belongs to the sensor driver: it must go back through
/// [`ImageSensor::release_frame`] exactly once.  Release takes the frame by
/// value, so a second release does not compile.
#[derive(Debug)]
pub struct CameraFrame {
    /// Driver buffer index.
    pub buffer: usize,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Encoded image bytes.
    pub data: Vec<u8>,
}

impl CameraFrame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A camera with a small pool of frame buffers.
///
/// Owned by the video worker alone.
pub trait ImageSensor: Send {
    /// Capture the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`CarError::FrameUnavailable`] while every buffer is checked
    /// out, or [`CarError::HardwareFault`] if the sensor fails.
    fn capture_frame(&mut self) -> Result<CameraFrame, CarError>;

    /// Hand a frame buffer back to the driver.
    fn release_frame(&mut self, frame: CameraFrame);
}
