use thiserror::Error;

use crate::capture::domain::capture_device::{CaptureDevice, DeviceOpener};
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

#[cfg(target_os = "linux")]
const INPUT_FORMAT: &str = "v4l2";
#[cfg(target_os = "macos")]
const INPUT_FORMAT: &str = "avfoundation";
#[cfg(target_os = "windows")]
const INPUT_FORMAT: &str = "vfwcap";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const INPUT_FORMAT: &str = "v4l2";

/// Packets read without producing a frame before a read is abandoned.
const MAX_PACKETS_PER_READ: usize = 64;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("ffmpeg initialisation failed: {0}")]
    Init(#[source] ffmpeg_next::Error),
    #[error("capture input format '{0}' is not available in this ffmpeg build")]
    FormatUnavailable(&'static str),
    #[error("failed to open camera {index}: {source}")]
    Open {
        index: u32,
        #[source]
        source: ffmpeg_next::Error,
    },
    #[error("camera {0} has no video stream")]
    NoVideoStream(u32),
    #[error("failed to set up decoder for camera {index}: {source}")]
    Decoder {
        index: u32,
        #[source]
        source: ffmpeg_next::Error,
    },
    #[error("failed to read frame: {0}")]
    Read(#[source] ffmpeg_next::Error),
    #[error("camera stream ended")]
    EndOfStream,
    #[error("no frame decoded after {0} packets")]
    NoFrame(usize),
}

/// Opens cameras through libavdevice using the platform's capture format.
pub struct FfmpegDeviceOpener {
    width: u32,
    height: u32,
    fps: u32,
}

impl FfmpegDeviceOpener {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self { width, height, fps }
    }
}

impl DeviceOpener for FfmpegDeviceOpener {
    fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>, BoxError> {
        let device = FfmpegCaptureDevice::open(index, self.width, self.height, self.fps)?;
        Ok(Box::new(device))
    }
}

/// A live camera stream decoded to RGB24.
pub struct FfmpegCaptureDevice {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    frame_index: usize,
}

// Safety: FfmpegCaptureDevice is owned by one capture loop at a time and its
// raw ffmpeg pointers are never shared across threads.
unsafe impl Send for FfmpegCaptureDevice {}

impl FfmpegCaptureDevice {
    pub fn open(index: u32, width: u32, height: u32, fps: u32) -> Result<Self, CaptureError> {
        ffmpeg_next::init().map_err(CaptureError::Init)?;

        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == INPUT_FORMAT)
            .ok_or(CaptureError::FormatUnavailable(INPUT_FORMAT))?;

        let mut options = ffmpeg_next::Dictionary::new();
        options.set("video_size", &format!("{width}x{height}"));
        options.set("framerate", &fps.to_string());

        let path = device_path(index);
        let context = ffmpeg_next::format::open_with(
            &path,
            &ffmpeg_next::format::Format::Input(format),
            options,
        )
        .map_err(|source| CaptureError::Open { index, source })?;
        let input = match context {
            ffmpeg_next::format::context::Context::Input(input) => input,
            ffmpeg_next::format::context::Context::Output(_) => {
                return Err(CaptureError::NoVideoStream(index))
            }
        };

        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or(CaptureError::NoVideoStream(index))?;
        let stream_index = stream.index();
        let decoder_error = |source| CaptureError::Decoder { index, source };
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(decoder_error)?;

        let (width, height) = (decoder.width(), decoder.height());
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(decoder_error)?;

        log::debug!("Opened {INPUT_FORMAT} device {path} at {width}x{height}");
        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            frame_index: 0,
        })
    }

    fn receive(&mut self) -> Result<Option<Frame>, CaptureError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb)
            .map_err(CaptureError::Read)?;
        let pixels = extract_rgb_pixels(&rgb, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        if let Some(frame) = self.receive()? {
            return Ok(frame);
        }
        for _ in 0..MAX_PACKETS_PER_READ {
            let Some((stream, packet)) = self.input.packets().next() else {
                return Err(CaptureError::EndOfStream);
            };
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .map_err(CaptureError::Read)?;
            if let Some(frame) = self.receive()? {
                return Ok(frame);
            }
        }
        Err(CaptureError::NoFrame(MAX_PACKETS_PER_READ))
    }
}

impl CaptureDevice for FfmpegCaptureDevice {
    fn read(&mut self) -> Result<Frame, BoxError> {
        Ok(self.read_frame()?)
    }
}

/// Platform device path for a numeric camera index.
fn device_path(index: u32) -> String {
    match INPUT_FORMAT {
        "v4l2" => format!("/dev/video{index}"),
        "avfoundation" => format!("{index}:none"),
        _ => index.to_string(),
    }
}

/// Copies an RGB24 frame into a tightly packed buffer, dropping row padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
