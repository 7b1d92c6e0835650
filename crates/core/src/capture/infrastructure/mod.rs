pub mod ffmpeg_capture_device;
