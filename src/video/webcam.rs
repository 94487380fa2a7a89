//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use std::str::FromStr;

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, PixelFormat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::image::{Image, Resolution};
use crate::timer::Timer;

use super::Camera;

/// Which parameter to keep when the webcam can't deliver both the desired resolution and frame
/// rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamPreference {
    #[default]
    Resolution,
    Framerate,
}

impl FromStr for ParamPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resolution" => Ok(Self::Resolution),
            "framerate" | "fps" => Ok(Self::Framerate),
            _ => Err(format!("expected `resolution` or `framerate`, got '{s}'")),
        }
    }
}

/// Options controlling which webcam is opened and how its format is negotiated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebcamOptions {
    name: Option<String>,
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

impl WebcamOptions {
    /// Only opens the webcam whose V4L2 card name is `name`.
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the minimum desired resolution.
    pub fn resolution(self, resolution: Resolution) -> Self {
        Self {
            resolution: Some(resolution),
            ..self
        }
    }

    /// Sets the minimum desired frame rate.
    pub fn fps(self, fps: u32) -> Self {
        Self {
            fps: Some(fps),
            ..self
        }
    }

    pub fn prefer(self, pref: ParamPreference) -> Self {
        Self { pref, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameFormat {
    resolution: Resolution,
    interval: Fract,
}

impl FrameFormat {
    fn fps(&self) -> f32 {
        (1.0 / self.interval.as_f32()).round()
    }
}

/// Picks the best format satisfying the desired resolution and frame rate.
///
/// If no format satisfies both, the requirement that [`ParamPreference`] does not name is
/// dropped first, then the other one.
fn pick_format(formats: &[FrameFormat], options: &WebcamOptions) -> Option<FrameFormat> {
    let (mut resolution, mut fps) = (options.resolution, options.fps);
    loop {
        let best = formats
            .iter()
            .filter(|fmt| {
                resolution.map_or(true, |res| {
                    fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
                }) && fps.map_or(true, |fps| fmt.fps() >= fps as f32)
            })
            .max_by_key(|fmt| {
                let (pixels, fps) = (fmt.resolution.num_pixels(), fmt.fps() as u64);
                match options.pref {
                    ParamPreference::Resolution => (pixels, fps),
                    ParamPreference::Framerate => (fps, pixels),
                }
            });
        if best.is_some() {
            return best.copied();
        }

        log::debug!(
            "no webcam format with resolution {:?} and fps {:?}",
            resolution,
            fps
        );
        let dropped = match options.pref {
            ParamPreference::Resolution => fps.take().is_some() || resolution.take().is_some(),
            ParamPreference::Framerate => resolution.take().is_some() || fps.take().is_some(),
        };
        if !dropped {
            return None;
        }
    }
}

fn list_formats(device: &Device) -> anyhow::Result<(PixelFormat, Vec<FrameFormat>)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if matches!(format.pixel_format(), PixelFormat::JPEG | PixelFormat::MJPG) {
            pixel_format = Some(format.pixel_format());
            break;
        }
    }
    let Some(pixel_format) = pixel_format else {
        bail!("no JPEG or MJPG pixel format supported");
    };

    let FrameSizes::Discrete(sizes) = device.frame_sizes(pixel_format)? else {
        bail!("stepwise or continuous resolutions are not supported");
    };

    let mut formats = Vec::new();
    for size in sizes {
        let FrameIntervals::Discrete(intervals) =
            device.frame_intervals(pixel_format, size.width(), size.height())?
        else {
            bail!("stepwise or continuous frame rates are not supported");
        };
        formats.extend(intervals.iter().map(|interval| FrameFormat {
            resolution: Resolution::new(size.width(), size.height()),
            interval: *interval.fract(),
        }));
    }

    Ok((pixel_format, formats))
}

/// A V4L2 webcam yielding decoded [`Image`]s.
pub struct Webcam {
    name: String,
    stream: Option<ReadStream>,
    resolution: Resolution,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first supported webcam found.
    ///
    /// This can block for a few hundred milliseconds while the device initializes.
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => match Self::open_device(dev, &options) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => log::debug!("{e:#}"),
                },
                Err(e) => log::warn!("{e}"),
            }
        }

        match &options.name {
            Some(name) => bail!("no supported webcam named '{name}' found"),
            None => bail!("no supported webcam device found"),
        }
    }

    fn open_device(dev: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if let Some(name) = &options.name {
            if caps.card() != name.as_str() {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );
        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixel_format, formats) = list_formats(&dev)?;
        let Some(format) = pick_format(&formats, options) else {
            bail!("failed to negotiate a webcam format");
        };

        let capture = dev.video_capture(PixFormat::new(
            format.resolution.width(),
            format.resolution.height(),
            pixel_format,
        ))?;
        let actual_format = capture.format();
        let resolution = Resolution::new(actual_format.width(), actual_format.height());
        let interval = capture.set_frame_interval(format.interval)?;

        log::info!(
            "opened {} ({}), {} @ {:.1}Hz",
            caps.card(),
            path.display(),
            resolution,
            1.0 / interval.as_f32(),
        );

        Ok(Some(Self {
            name: caps.card().to_string(),
            stream: Some(capture.into_stream()?),
            resolution,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

impl Camera for Webcam {
    /// Dequeues and decodes the next frame.
    ///
    /// Corrupted MJPG frames happen occasionally even on good webcams. They are logged and come
    /// back as a blank frame of the stream's size instead of an error.
    fn read(&mut self) -> anyhow::Result<Image> {
        let Some(stream) = &mut self.stream else {
            bail!("webcam '{}' has been released", self.name);
        };

        let resolution = self.resolution;
        let t_decode = &self.t_decode;
        let dequeue_guard = self.t_dequeue.start();
        let image = stream.dequeue(|buf| {
            drop(dequeue_guard);
            let image = match t_decode.time(|| Image::decode_jpeg(&buf)) {
                Ok(image) => image,
                Err(e) => {
                    log::error!("webcam decode error: {e}");
                    Image::new(resolution.width(), resolution.height())
                }
            };
            Ok(image)
        })?;
        Ok(image)
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            log::info!("released webcam '{}'", self.name);
        }
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_dequeue, &self.t_decode]
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(w: u32, h: u32, fps: u32) -> FrameFormat {
        FrameFormat {
            resolution: Resolution::new(w, h),
            interval: Fract::new(1, fps),
        }
    }

    fn formats() -> Vec<FrameFormat> {
        vec![
            fmt(640, 480, 30),
            fmt(640, 480, 60),
            fmt(1280, 720, 30),
            fmt(1920, 1080, 15),
        ]
    }

    #[test]
    fn prefers_resolution() {
        let opts = WebcamOptions::default();
        assert_eq!(pick_format(&formats(), &opts), Some(fmt(1920, 1080, 15)));

        let opts = opts.fps(30);
        assert_eq!(pick_format(&formats(), &opts), Some(fmt(1280, 720, 30)));
    }

    #[test]
    fn prefers_framerate() {
        let opts = WebcamOptions::default().prefer(ParamPreference::Framerate);
        assert_eq!(pick_format(&formats(), &opts), Some(fmt(640, 480, 60)));
    }

    #[test]
    fn relaxes_requirements() {
        // No format does 4K at 120 FPS, so both requirements get dropped.
        let opts = WebcamOptions::default()
            .resolution(Resolution::new(3840, 2160))
            .fps(120);
        assert_eq!(pick_format(&formats(), &opts), Some(fmt(1920, 1080, 15)));

        let opts = WebcamOptions::default()
            .resolution(Resolution::new(1280, 720))
            .fps(60);
        assert_eq!(pick_format(&formats(), &opts), Some(fmt(1920, 1080, 15)));

        let opts = opts.prefer(ParamPreference::Framerate);
        assert_eq!(pick_format(&formats(), &opts), Some(fmt(640, 480, 60)));
    }

    #[test]
    fn parse_preference() {
        assert_eq!("Resolution".parse(), Ok(ParamPreference::Resolution));
        assert_eq!("fps".parse(), Ok(ParamPreference::Framerate));
        assert!("quality".parse::<ParamPreference>().is_err());
    }

    #[test]
    fn nothing_to_pick() {
        assert_eq!(pick_format(&[], &WebcamOptions::default()), None);
    }
}
