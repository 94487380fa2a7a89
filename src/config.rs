//! Run-time configuration from `HANDSHAPE_*` environment variables.

use std::{
    fmt::{Debug, Display},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use anyhow::{bail, Context};

use crate::{
    detector::DetectorOptions,
    image::Resolution,
    video::webcam::{ParamPreference, WebcamOptions},
};

pub const ENV_OUTPUT_DIR: &str = "HANDSHAPE_OUTPUT_DIR";
pub const ENV_SAVE_INTERVAL: &str = "HANDSHAPE_SAVE_INTERVAL";
pub const ENV_THROTTLE_MS: &str = "HANDSHAPE_THROTTLE_MS";
pub const ENV_MODEL: &str = "HANDSHAPE_MODEL";
pub const ENV_PALM_MODEL: &str = "HANDSHAPE_PALM_MODEL";
pub const ENV_MIN_DETECTION: &str = "HANDSHAPE_MIN_DETECTION";
pub const ENV_MIN_PRESENCE: &str = "HANDSHAPE_MIN_PRESENCE";
pub const ENV_WEBCAM_NAME: &str = "HANDSHAPE_WEBCAM_NAME";
pub const ENV_WEBCAM_RESOLUTION: &str = "HANDSHAPE_WEBCAM_RESOLUTION";
pub const ENV_WEBCAM_FPS: &str = "HANDSHAPE_WEBCAM_FPS";
pub const ENV_WEBCAM_PREFER: &str = "HANDSHAPE_WEBCAM_PREFER";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory that saved frames and measurements go to.
    pub output_dir: PathBuf,
    /// Every `save_interval`th processed frame is saved.
    pub save_interval: u64,
    /// Pause between two iterations of the capture loop.
    pub throttle: Duration,
    /// Path to the hand landmark `.onnx` network.
    pub model: PathBuf,
    /// Path to the palm detection `.onnx` network.
    pub palm_model: PathBuf,
    pub detector: DetectorOptions,
    pub webcam: WebcamOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            save_interval: 10,
            throttle: Duration::from_millis(50),
            model: PathBuf::from("models/hand_landmark_full.onnx"),
            palm_model: PathBuf::from("models/palm_detection_full.onnx"),
            detector: DetectorOptions::default(),
            webcam: WebcamOptions::default(),
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of a variable if it is
    /// set. Unset variables keep their default.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            if dir.is_empty() {
                bail!("`{ENV_OUTPUT_DIR}` must not be empty");
            }
            config.output_dir = dir.into();
        }
        if let Some(interval) = parse::<u64, _>(&lookup, ENV_SAVE_INTERVAL)? {
            if interval == 0 {
                bail!("`{ENV_SAVE_INTERVAL}` must be at least 1");
            }
            config.save_interval = interval;
        }
        if let Some(ms) = parse::<u64, _>(&lookup, ENV_THROTTLE_MS)? {
            config.throttle = Duration::from_millis(ms);
        }
        if let Some(model) = lookup(ENV_MODEL) {
            config.model = model.into();
        }
        if let Some(model) = lookup(ENV_PALM_MODEL) {
            config.palm_model = model.into();
        }
        if let Some(detection) = parse_confidence(&lookup, ENV_MIN_DETECTION)? {
            config.detector = config.detector.with_min_detection(detection);
        }
        if let Some(presence) = parse_confidence(&lookup, ENV_MIN_PRESENCE)? {
            config.detector = config.detector.with_min_presence(presence);
        }

        if let Some(name) = lookup(ENV_WEBCAM_NAME).filter(|name| !name.is_empty()) {
            config.webcam = config.webcam.name(name);
        }
        if let Some(resolution) = parse::<Resolution, _>(&lookup, ENV_WEBCAM_RESOLUTION)? {
            config.webcam = config.webcam.resolution(resolution);
        }
        if let Some(fps) = parse::<u32, _>(&lookup, ENV_WEBCAM_FPS)? {
            config.webcam = config.webcam.fps(fps);
        }
        if let Some(pref) = parse::<ParamPreference, _>(&lookup, ENV_WEBCAM_PREFER)? {
            config.webcam = config.webcam.prefer(pref);
        }

        Ok(config)
    }
}

fn parse_confidence<L>(lookup: L, var: &str) -> anyhow::Result<Option<f32>>
where
    L: Fn(&str) -> Option<String>,
{
    let value = parse::<f32, _>(lookup, var)?;
    if let Some(value) = value {
        if !(0.0..=1.0).contains(&value) {
            bail!("`{var}` must be between 0 and 1, got {value}");
        }
    }
    Ok(value)
}

fn parse<T, L>(lookup: L, var: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Debug + Display + Send + Sync + 'static,
    L: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("invalid value '{value}' for `{var}`"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.save_interval, 10);
        assert_eq!(config.throttle, Duration::from_millis(50));
        assert_eq!(config.detector.min_presence(), 0.5);
        assert_eq!(config.detector.min_detection(), 0.5);
        assert_eq!(config.palm_model, PathBuf::from("models/palm_detection_full.onnx"));
        assert_eq!(config.webcam, WebcamOptions::default());
    }

    #[test]
    fn overrides() {
        let config = config(&[
            (ENV_OUTPUT_DIR, "/tmp/shots"),
            (ENV_SAVE_INTERVAL, "5"),
            (ENV_THROTTLE_MS, " 0 "),
            (ENV_MODEL, "lite.onnx"),
            (ENV_PALM_MODEL, "palm.onnx"),
            (ENV_MIN_DETECTION, "0.6"),
            (ENV_MIN_PRESENCE, "0.75"),
            (ENV_WEBCAM_NAME, "HD Pro Webcam C920"),
            (ENV_WEBCAM_RESOLUTION, "1280x720"),
            (ENV_WEBCAM_FPS, "30"),
            (ENV_WEBCAM_PREFER, "framerate"),
        ])
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(config.save_interval, 5);
        assert_eq!(config.throttle, Duration::ZERO);
        assert_eq!(config.model, PathBuf::from("lite.onnx"));
        assert_eq!(config.palm_model, PathBuf::from("palm.onnx"));
        assert_eq!(config.detector.min_detection(), 0.6);
        assert_eq!(config.detector.min_presence(), 0.75);
        assert_eq!(
            config.webcam,
            WebcamOptions::default()
                .name("HD Pro Webcam C920")
                .resolution(Resolution::RES_720P)
                .fps(30)
                .prefer(ParamPreference::Framerate)
        );
    }

    #[test]
    fn invalid_values() {
        let err = config(&[(ENV_SAVE_INTERVAL, "ten")]).unwrap_err();
        assert!(format!("{err:#}").contains(ENV_SAVE_INTERVAL), "{err:#}");

        assert!(config(&[(ENV_SAVE_INTERVAL, "0")]).is_err());
        assert!(config(&[(ENV_THROTTLE_MS, "-5")]).is_err());
        assert!(config(&[(ENV_MIN_PRESENCE, "1.5")]).is_err());
        assert!(config(&[(ENV_MIN_PRESENCE, "NaN")]).is_err());
        assert!(config(&[(ENV_MIN_DETECTION, "2")]).is_err());
        assert!(config(&[(ENV_OUTPUT_DIR, "")]).is_err());
        assert!(config(&[(ENV_WEBCAM_RESOLUTION, "1280")]).is_err());
        assert!(config(&[(ENV_WEBCAM_PREFER, "quality")]).is_err());
    }
}
