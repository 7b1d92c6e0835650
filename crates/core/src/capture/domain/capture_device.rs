use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

/// An opened video capture device.
///
/// Dropping the device releases the underlying hardware handle.
pub trait CaptureDevice: Send {
    /// Blocks until the next frame is available.
    fn read(&mut self) -> Result<Frame, BoxError>;
}

/// Opens capture devices by numeric index.
pub trait DeviceOpener: Send + Sync {
    fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>, BoxError>;
}
