use std::path::Path;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;

use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{FrameSource, FrameSourceError};

/// Decodes a video file (or any input ffmpeg can demux, such as a stream
/// URL) into RGB24 frames via ffmpeg-next.
pub struct FfmpegFrameSource {
    input: Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    video_stream_index: usize,
    width: u32,
    height: u32,
    fps: f64,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

// Safety: the source is moved between threads but never shared. The raw
// pointers inside the ffmpeg contexts are only touched through `&mut self`.
unsafe impl Send for FfmpegFrameSource {}

impl FfmpegFrameSource {
    pub fn open(path: &Path) -> Result<Self, FrameSourceError> {
        let open_err = |e: ffmpeg_next::Error| FrameSourceError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        ffmpeg_next::init().map_err(open_err)?;
        let input = ffmpeg_next::format::input(path).map_err(open_err)?;

        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| FrameSourceError::NoVideoStream(path.to_path_buf()))?;
        let video_stream_index = stream.index();
        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(open_err)?;
        let width = decoder.width();
        let height = decoder.height();
        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .map_err(open_err)?;

        log::debug!(
            "Opened {} ({}x{} @ {:.2} fps)",
            path.display(),
            width,
            height,
            fps
        );

        Ok(Self {
            input,
            decoder,
            scaler,
            video_stream_index,
            width,
            height,
            fps,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Nominal frame rate; 0 when the container does not declare one.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        let mut decoded = Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        self.convert(&decoded).map(Some)
    }

    fn convert(&mut self, decoded: &Video) -> Result<Frame, FrameSourceError> {
        let decode_err = |e: ffmpeg_next::Error| FrameSourceError::Decode(e.to_string());

        let input = *self.scaler.input();
        if (decoded.width(), decoded.height(), decoded.format())
            != (input.width, input.height, input.format)
        {
            log::debug!(
                "Stream resolution changed: {}x{} -> {}x{}",
                self.width,
                self.height,
                decoded.width(),
                decoded.height()
            );
            self.scaler = scaling::Context::get(
                decoded.format(),
                decoded.width(),
                decoded.height(),
                ffmpeg_next::format::Pixel::RGB24,
                decoded.width(),
                decoded.height(),
                scaling::Flags::BILINEAR,
            )
            .map_err(decode_err)?;
            self.width = decoded.width();
            self.height = decoded.height();
        }

        let mut rgb = Video::empty();
        self.scaler.run(decoded, &mut rgb).map_err(decode_err)?;

        let pixels = extract_rgb_pixels(&rgb, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(frame)
    }
}

impl FrameSource for FfmpegFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        if self.done {
            return Ok(None);
        }
        if let Some(frame) = self.try_receive()? {
            return Ok(Some(frame));
        }
        if self.flushing {
            self.done = true;
            return Ok(None);
        }

        loop {
            let next = self
                .input
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));

            let Some((stream_index, packet)) = next else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                let frame = self.try_receive()?;
                self.done = frame.is_none();
                return Ok(frame);
            };

            if stream_index != self.video_stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::warn!("Skipping undecodable packet: {e}");
                continue;
            }
            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
        }
    }
}

/// Copies an RGB24 plane into a tightly packed buffer, dropping the row
/// padding ffmpeg adds when stride > width * 3.
fn extract_rgb_pixels(rgb: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}
