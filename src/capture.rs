//! The capture loop: reads frames from a camera until interrupted or something fails.
//!
//! A [`CaptureLoop`] moves through three states. In [`State::Init`] it opens the camera, in
//! [`State::Running`] it repeatedly reads, processes and records frames, and in
//! [`State::Stopped`] it has released the camera and reports a [`StopReason`].

use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crate::{
    detector::HandDetector, persist::Recorder, pipeline::FramePipeline, timer::FpsCounter,
    video::Camera,
};

/// Why the capture loop failed.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("camera unavailable: {0:#}")]
    DeviceUnavailable(anyhow::Error),
    #[error("failed to read frame: {0:#}")]
    ReadFailure(anyhow::Error),
    #[error("unexpected error: {0:#}")]
    Unexpected(anyhow::Error),
}

/// Why the capture loop stopped.
#[derive(Debug)]
pub enum StopReason {
    /// The stop flag was raised, usually by Ctrl+C.
    Interrupted,
    Failed(CaptureError),
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns the line printed to the user when the loop has stopped.
    pub fn status_line(&self) -> String {
        match self {
            Self::Interrupted => "Program stopped by user (Ctrl+C)".to_string(),
            Self::Failed(e) => format!("Error: {e}"),
        }
    }
}

/// Raises `stop`, returning whether it was already raised before.
///
/// Signal handlers use this to tell a first Ctrl+C, which lets the loop finish its current frame,
/// from a repeated one.
pub fn request_stop(stop: &AtomicBool) -> bool {
    stop.swap(true, Ordering::SeqCst)
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted => f.write_str("interrupted by user"),
            Self::Failed(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    Running,
    Stopped,
}

/// Owns a camera and releases it when dropped, including during unwinding.
#[must_use = "`Released` releases the camera when dropped"]
struct Released<C: Camera>(C);

impl<C: Camera> Drop for Released<C> {
    fn drop(&mut self) {
        self.0.release();
    }
}

impl<C: Camera> Deref for Released<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.0
    }
}

impl<C: Camera> DerefMut for Released<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.0
    }
}

/// Drives a camera through a [`FramePipeline`] and into a [`Recorder`].
pub struct CaptureLoop<D> {
    pipeline: FramePipeline<D>,
    recorder: Recorder,
    stop: Arc<AtomicBool>,
    throttle: Duration,
    state: State,
}

impl<D: HandDetector> CaptureLoop<D> {
    pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(50);

    pub fn new(pipeline: FramePipeline<D>, recorder: Recorder) -> Self {
        Self {
            pipeline,
            recorder,
            stop: Arc::new(AtomicBool::new(false)),
            throttle: Self::DEFAULT_THROTTLE,
            state: State::Init,
        }
    }

    /// Sets how long to sleep after each frame.
    pub fn with_throttle(self, throttle: Duration) -> Self {
        Self { throttle, ..self }
    }

    /// Returns the flag that stops the loop when set to `true`.
    ///
    /// The flag is checked before each frame is read; a frame that is already being processed is
    /// completed first. A camera read that blocks (eg. on a stalled device) is not interrupted, so
    /// the flag alone cannot end the loop in that case. The `handshape` binary exits the process
    /// when Ctrl+C is pressed a second time (see [`request_stop`]).
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Opens a camera with `open` and processes frames until the stop flag is raised or an error
    /// occurs.
    ///
    /// The camera is released exactly once before this returns. If `open` fails, no camera
    /// exists and nothing is released.
    pub fn run<C, F>(&mut self, open: F) -> StopReason
    where
        C: Camera,
        F: FnOnce() -> anyhow::Result<C>,
    {
        self.enter(State::Init);
        let reason = match open() {
            Ok(camera) => {
                self.enter(State::Running);
                println!("{}", self.recorder.capture_notice());
                self.run_camera(Released(camera))
            }
            Err(e) => StopReason::Failed(CaptureError::DeviceUnavailable(e)),
        };
        self.enter(State::Stopped);

        match &reason {
            StopReason::Interrupted => log::info!("capture stopped: {reason}"),
            StopReason::Failed(_) => log::error!("capture stopped: {reason}"),
        }
        reason
    }

    fn run_camera<C: Camera>(&mut self, mut camera: Released<C>) -> StopReason {
        let mut fps = FpsCounter::new("capture");
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return StopReason::Interrupted;
            }

            let image = match camera.read() {
                Ok(image) => image,
                Err(e) => return StopReason::Failed(CaptureError::ReadFailure(e)),
            };
            let frame = self.pipeline.process(image);
            if let Err(e) = self.recorder.record(&frame) {
                return StopReason::Failed(CaptureError::Unexpected(e));
            }

            fps.tick_with(
                camera
                    .timers()
                    .into_iter()
                    .chain(self.pipeline.timers())
                    .chain(self.recorder.timers()),
            );
            thread::sleep(self.throttle);
        }
    }

    fn enter(&mut self, state: State) {
        log::debug!("capture state {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use crate::{hand::landmark::HandLandmarks, image::Image};

    use super::*;

    struct NoHands;

    impl HandDetector for NoHands {
        fn detect(&mut self, _: &Image) -> anyhow::Result<Vec<HandLandmarks>> {
            Ok(Vec::new())
        }
    }

    /// Yields `frames` blank frames, then fails.
    struct Scripted {
        frames: usize,
        releases: Rc<Cell<u32>>,
    }

    impl Camera for Scripted {
        fn read(&mut self) -> anyhow::Result<Image> {
            if self.frames == 0 {
                anyhow::bail!("device disconnected");
            }
            self.frames -= 1;
            Ok(Image::new(16, 16))
        }

        fn release(&mut self) {
            self.releases.set(self.releases.get() + 1);
        }
    }

    fn capture_loop(dir: &std::path::Path) -> CaptureLoop<NoHands> {
        CaptureLoop::new(
            FramePipeline::new(NoHands),
            Recorder::create(dir, 10).unwrap(),
        )
        .with_throttle(Duration::ZERO)
    }

    #[test]
    fn read_failure_releases_once() {
        let tmp = tempfile::tempdir().unwrap();
        let releases = Rc::new(Cell::new(0));
        let mut capture = capture_loop(tmp.path());

        let reason = capture.run(|| {
            Ok(Scripted {
                frames: 3,
                releases: releases.clone(),
            })
        });

        assert!(matches!(
            reason,
            StopReason::Failed(CaptureError::ReadFailure(_))
        ));
        assert_eq!(releases.get(), 1);
        assert_eq!(capture.state(), State::Stopped);
        assert_eq!(capture.recorder().schedule().frame_count(), 3);
    }

    #[test]
    fn unavailable_device() {
        let tmp = tempfile::tempdir().unwrap();
        let mut capture = capture_loop(tmp.path());

        let reason = capture.run(|| -> anyhow::Result<Scripted> { anyhow::bail!("no webcam") });

        assert!(reason.is_failure());
        assert!(matches!(
            reason,
            StopReason::Failed(CaptureError::DeviceUnavailable(_))
        ));
        assert_eq!(reason.to_string(), "camera unavailable: no webcam");
        assert_eq!(reason.status_line(), "Error: camera unavailable: no webcam");
        assert_eq!(capture.recorder().schedule().frame_count(), 0);
    }

    #[test]
    fn interrupted_before_first_frame() {
        let tmp = tempfile::tempdir().unwrap();
        let releases = Rc::new(Cell::new(0));
        let mut capture = capture_loop(tmp.path());
        capture.stop_flag().store(true, Ordering::SeqCst);

        let reason = capture.run(|| {
            Ok(Scripted {
                frames: 100,
                releases: releases.clone(),
            })
        });

        assert!(matches!(reason, StopReason::Interrupted));
        assert!(!reason.is_failure());
        assert_eq!(reason.status_line(), "Program stopped by user (Ctrl+C)");
        assert_eq!(releases.get(), 1);
        assert_eq!(capture.recorder().schedule().frame_count(), 0);
    }

    #[test]
    fn repeated_stop_request() {
        let stop = AtomicBool::new(false);
        assert!(!request_stop(&stop));
        assert!(stop.load(Ordering::SeqCst));
        assert!(request_stop(&stop));
        assert!(request_stop(&stop));
    }
}
