//! Webcam hand shape measurement.
//!
//! Frames are read from a webcam and run through a palm detection and a hand landmark network. The
//! tips of the index, middle, ring and pinky finger span a quadrilateral whose area, perimeter and
//! bounding box are drawn onto the frame. Every few frames, the annotated frame and a text file
//! with the measurements are saved to disk.
//!
//! # Coordinates
//!
//! Landmarks are reported in normalized image coordinates, with `(0, 0)` in the top left corner
//! and `(1, 1)` in the bottom right one. Everything downstream of [`shape::extract_fingertips`]
//! works in integer pixel coordinates, with Y pointing down.
//!
//! # Environment Variables
//!
//! The `handshape` binary is configured through these environment variables (see
//! [`config::Config`]):
//!
//! * `HANDSHAPE_OUTPUT_DIR`: Directory to save frames and measurements to. Defaults to `output`.
//! * `HANDSHAPE_SAVE_INTERVAL`: Save every Nth processed frame. Defaults to 10.
//! * `HANDSHAPE_THROTTLE_MS`: Milliseconds to sleep after each frame. Defaults to 50.
//! * `HANDSHAPE_MODEL`: Path to the hand landmark `.onnx` network. Defaults to
//!   `models/hand_landmark_full.onnx`.
//! * `HANDSHAPE_PALM_MODEL`: Path to the palm detection `.onnx` network. Defaults to
//!   `models/palm_detection_full.onnx`.
//! * `HANDSHAPE_MIN_DETECTION`: Minimum palm detection confidence between 0 and 1. Defaults to 0.5.
//! * `HANDSHAPE_MIN_PRESENCE`: Minimum hand presence confidence between 0 and 1, used both to
//!   report a hand and to keep tracking it. Defaults to 0.5.
//! * `HANDSHAPE_WEBCAM_NAME`: Only open the webcam with this device name. If unset, the first
//!   device that supports a compatible image format will be used.
//! * `HANDSHAPE_WEBCAM_RESOLUTION`: Minimum webcam resolution, eg. `640x480`.
//! * `HANDSHAPE_WEBCAM_FPS`: Minimum webcam frame rate.
//! * `HANDSHAPE_WEBCAM_PREFER`: `resolution` (default) or `framerate`, the parameter to keep when
//!   the webcam can't satisfy both of the above.
//!
//! Log output is controlled through `RUST_LOG`, as usual for [`env_logger`].

use log::LevelFilter;

pub mod capture;
pub mod config;
pub mod detection;
pub mod detector;
pub mod geometry;
pub mod hand;
pub mod image;
pub mod nn;
pub mod persist;
pub mod pipeline;
pub mod rect;
pub mod shape;
pub mod timer;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("tract_onnx"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library log at *debug* level, everything else at *info* (`tract`
/// at *warn*). `RUST_LOG` overrides these defaults.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
