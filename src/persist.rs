//! Periodic saving of annotated frames and their measurements.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::Context;
use itertools::Itertools;

use crate::{
    geometry::{Measurement, Point},
    pipeline::ProcessedFrame,
    timer::Timer,
};

/// Counts processed frames and decides which of them get saved.
///
/// Frames are counted starting at 1, so with an interval of 10 the 10th, 20th, 30th, ... frame is
/// saved.
#[derive(Debug, Clone)]
pub struct SaveSchedule {
    interval: u64,
    frame_count: u64,
}

impl SaveSchedule {
    /// # Panics
    ///
    /// Panics if `interval` is 0.
    pub fn new(interval: u64) -> Self {
        assert!(interval > 0, "save interval must be at least 1");
        Self {
            interval,
            frame_count: 0,
        }
    }

    /// Counts one processed frame and returns whether it should be saved.
    pub fn tick(&mut self) -> bool {
        self.frame_count += 1;
        self.frame_count % self.interval == 0
    }

    /// Returns the number of frames counted so far.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn interval(&self) -> u64 {
        self.interval
    }
}

/// The files written by one save action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    pub timestamp: u64,
    pub image_path: PathBuf,
    /// Only present when the frame had fingertip points.
    pub measurement_path: Option<PathBuf>,
}

/// Text report of a [`Measurement`], as written to `measurements_<ts>.txt`.
pub struct MeasurementReport<'a> {
    pub measurement: Measurement,
    pub points: &'a [Point],
}

impl fmt::Display for MeasurementReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.measurement;
        writeln!(f, "Area: {:.2} sq.px", m.area)?;
        writeln!(f, "Perimeter: {:.2} px", m.perimeter)?;
        writeln!(f, "Width: {} px", m.width)?;
        writeln!(f, "Height: {} px", m.height)?;
        writeln!(f, "Shape Points: [{}]", self.points.iter().format(", "))
    }
}

/// Returns the current time in whole seconds since the UNIX epoch.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Writes every scheduled frame to an output directory.
///
/// A save action writes `frame_<ts>.jpg` and, if the frame had fingertip points,
/// `measurements_<ts>.txt`, where `<ts>` is the UNIX timestamp in seconds. Two save actions within
/// the same second overwrite each other.
pub struct Recorder {
    dir: PathBuf,
    schedule: SaveSchedule,
    clock: fn() -> u64,
    t_save: Timer,
}

impl Recorder {
    /// Creates a recorder writing to `dir`, creating the directory if needed.
    pub fn create<P: Into<PathBuf>>(dir: P, interval: u64) -> anyhow::Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
            log::info!("created output directory '{}'", dir.display());
            println!("Created '{}' directory", dir.display());
        }

        Ok(Self {
            dir,
            schedule: SaveSchedule::new(interval),
            clock: unix_timestamp,
            t_save: Timer::new("save"),
        })
    }

    /// Replaces the timestamp source.
    pub fn with_clock(self, clock: fn() -> u64) -> Self {
        Self { clock, ..self }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn schedule(&self) -> &SaveSchedule {
        &self.schedule
    }

    /// Returns the line announcing where and how often frames are saved.
    pub fn capture_notice(&self) -> String {
        format!(
            "Capturing frames and saving to '{}' folder every {} frames...",
            self.dir.display(),
            self.schedule.interval()
        )
    }

    /// Counts `frame` and saves it if it is due.
    ///
    /// Returns the written files, or `None` if the frame was not scheduled for saving.
    pub fn record(&mut self, frame: &ProcessedFrame) -> anyhow::Result<Option<SavedArtifact>> {
        if !self.schedule.tick() {
            return Ok(None);
        }

        let _guard = self.t_save.start();
        let timestamp = (self.clock)();

        let image_path = self.dir.join(format!("frame_{timestamp}.jpg"));
        frame.image.save(&image_path)?;
        log::info!(
            "saved frame {} to '{}'",
            self.schedule.frame_count(),
            image_path.display()
        );
        println!("Saved frame as {}", image_path.display());

        let measurement_path = match Measurement::of(&frame.points) {
            Some(measurement) => {
                println!("Measurements:");
                println!("  Area: {:.2} sq.px", measurement.area);
                println!("  Perimeter: {:.2} px", measurement.perimeter);
                println!("  Width: {} px", measurement.width);
                println!("  Height: {} px", measurement.height);

                let path = self.dir.join(format!("measurements_{timestamp}.txt"));
                let report = MeasurementReport {
                    measurement,
                    points: &frame.points,
                };
                fs::write(&path, report.to_string())
                    .with_context(|| format!("failed to write '{}'", path.display()))?;
                Some(path)
            }
            None => None,
        };

        Ok(Some(SavedArtifact {
            timestamp,
            image_path,
            measurement_path,
        }))
    }

    pub fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_save]
    }
}
