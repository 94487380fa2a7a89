use std::process::{self, ExitCode};

use anyhow::Context;
use handshape::{
    capture::{request_stop, CaptureLoop, StopReason},
    config::Config,
    hand::network::HandNetwork,
    persist::Recorder,
    pipeline::FramePipeline,
    video::webcam::Webcam,
};

/// Exit status after a forced exit with a repeated Ctrl+C (128 + SIGINT).
const FORCED_EXIT: i32 = 130;

fn main() -> anyhow::Result<ExitCode> {
    handshape::init_logger!();

    println!("Starting headless hand shape detector...");
    println!("Press Ctrl+C to stop the program");

    let config = Config::from_env()?;
    log::debug!("{config:?}");

    let detector = HandNetwork::load(&config.palm_model, &config.model, config.detector)
        .context("failed to load hand detection networks")?;
    log::info!(
        "loaded '{}' ({} input) and '{}' ({} input)",
        config.palm_model.display(),
        detector.palm_detector().input_resolution(),
        config.model.display(),
        detector.landmark_network().input_resolution(),
    );

    let recorder = Recorder::create(&config.output_dir, config.save_interval)?;
    let mut capture =
        CaptureLoop::new(FramePipeline::new(detector), recorder).with_throttle(config.throttle);

    let stop = capture.stop_flag();
    ctrlc::set_handler(move || {
        if request_stop(&stop) {
            eprintln!("Ctrl+C pressed again, exiting immediately");
            process::exit(FORCED_EXIT);
        }
    })
    .context("failed to install Ctrl+C handler")?;

    let webcam = config.webcam;
    let reason = capture.run(|| Webcam::open(webcam));

    match &reason {
        StopReason::Interrupted => println!("\n{}", reason.status_line()),
        StopReason::Failed(_) => eprintln!("{}", reason.status_line()),
    }
    println!("Program ended");

    Ok(if reason.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
