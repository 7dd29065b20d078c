use std::path::PathBuf;
use std::time::Instant;

use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{FrameSource, SourceError, SourceInfo};

/// Captures frames from a camera device or video file via ffmpeg-next.
///
/// Each decoded picture is converted to RGB24 and rescaled to the configured
/// output size before being wrapped in a [`Frame`].
pub struct FfmpegFrameSource {
    location: PathBuf,
    input_format: Option<String>,
    out_width: u32,
    out_height: u32,
    state: Option<OpenStream>,
    next_sequence: u64,
}

struct OpenStream {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    flushing: bool,
    done: bool,
}

// Safety: the source is owned and driven by the main loop thread only. The
// raw ffmpeg pointers are never shared across threads.
unsafe impl Send for FfmpegFrameSource {}

impl FfmpegFrameSource {
    /// `location` is a device (`/dev/video0`, `0`, `video=Integrated Camera`)
    /// or a file path. `input_format` selects a capture demuxer such as
    /// `v4l2`, `avfoundation` or `dshow`; `None` lets ffmpeg probe.
    pub fn new(
        location: impl Into<PathBuf>,
        input_format: Option<String>,
        out_width: u32,
        out_height: u32,
    ) -> Self {
        Self {
            location: location.into(),
            input_format,
            out_width,
            out_height,
            state: None,
            next_sequence: 0,
        }
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, SourceError> {
        let Some(ref name) = self.input_format else {
            return Ok(ffmpeg_next::format::input(&self.location)?);
        };

        ffmpeg_next::device::register_all();
        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == name)
            .ok_or_else(|| format!("Capture format '{name}' is not available"))?;
        let ctx = ffmpeg_next::format::open_with(
            &self.location,
            &ffmpeg_next::Format::Input(format),
            ffmpeg_next::Dictionary::new(),
        )?;
        match ctx {
            ffmpeg_next::format::context::Context::Input(input) => Ok(input),
            ffmpeg_next::format::context::Context::Output(_) => {
                Err("Capture device opened as output".into())
            }
        }
    }

    fn receive(&mut self) -> Option<Result<Frame, SourceError>> {
        let state = self.state.as_mut()?;
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if state.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }

        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = state.scaler.run(&decoded, &mut rgb) {
            return Some(Err(Box::new(e)));
        }

        let pixels = extract_rgb_pixels(&rgb, self.out_width, self.out_height);
        let frame = Frame::captured(
            pixels,
            self.out_width,
            self.out_height,
            3,
            self.next_sequence,
            Instant::now(),
        );
        self.next_sequence += 1;
        Some(Ok(frame))
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&mut self) -> Result<SourceInfo, SourceError> {
        ffmpeg_next::init()?;

        let ictx = self.open_input()?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();
        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            self.out_width,
            self.out_height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let info = SourceInfo {
            width: self.out_width,
            height: self.out_height,
            fps,
            description: format!(
                "{} ({}x{} → {}x{})",
                self.location.display(),
                decoder.width(),
                decoder.height(),
                self.out_width,
                self.out_height
            ),
        };

        self.state = Some(OpenStream {
            ictx,
            decoder,
            scaler,
            stream_index,
            flushing: false,
            done: false,
        });
        self.next_sequence = 0;
        Ok(info)
    }

    fn next_frame(&mut self) -> Option<Result<Frame, SourceError>> {
        let state = self.state.as_ref()?;
        if state.done {
            return None;
        }

        if let Some(result) = self.receive() {
            return Some(result);
        }

        loop {
            let state = self.state.as_mut()?;
            if state.flushing {
                state.done = true;
                return None;
            }

            let stream_index = state.stream_index;
            let Some((stream, packet)) = state.ictx.packets().next() else {
                let _ = state.decoder.send_eof();
                state.flushing = true;
                if let Some(result) = self.receive() {
                    return Some(result);
                }
                continue;
            };

            if stream.index() != stream_index || state.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(result) = self.receive() {
                return Some(result);
            }
        }
    }

    fn close(&mut self) {
        self.state = None;
    }
}

/// Copies RGB24 pixel rows out of an ffmpeg frame, dropping line padding.
fn extract_rgb_pixels(
    frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_bytes = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
