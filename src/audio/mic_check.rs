use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::audio::capture;
use crate::engine::session::FrameSource;
use crate::util;

const CAPTURE_SECONDS: u64 = 2;

/// Ring size covering the whole capture window at any common sample rate.
const CHECK_RING_LEN: usize = 48_000 * 3;

/// Capture two seconds from the default input and report peak/RMS levels.
///
/// A quick sanity pass before a training session: the pitch gate sits at
/// -73 dBFS, so a mic peaking below -60 dB will never register a note.
pub fn run() -> Result<()> {
    println!();
    println!(
        "  Make a steady sound (hum, sing, play) for {} seconds.",
        CAPTURE_SECONDS
    );
    println!();

    let mic = capture::start_capture(CHECK_RING_LEN)?;
    println!("  Capturing at {} Hz.", mic.sample_rate());
    println!();

    let pb = ProgressBar::new(CAPTURE_SECONDS * 10);
    pb.set_style(
        ProgressStyle::with_template("  Listening {bar:30.green/dim} {elapsed_precise}")
            .expect("static template"),
    );

    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_secs(CAPTURE_SECONDS) {
        std::thread::sleep(Duration::from_millis(100));
        pb.set_position((start.elapsed().as_millis() / 100) as u64);
    }
    pb.finish_and_clear();

    let samples = mic.snapshot();
    drop(mic);

    if samples.is_empty() {
        eprintln!(
            "  {} No samples captured. Check your microphone connection.",
            style("WARNING").red().bold()
        );
        return Ok(());
    }

    let peak = util::peak_db(&samples);
    let rms = util::rms_db(&samples);

    println!("  Peak level:  {peak:.1} dB");
    println!("  RMS level:   {rms:.1} dB");
    println!();

    if peak < -60.0 {
        eprintln!(
            "  {} Peak is below -60 dB - mic may be muted or disconnected.",
            style("WARNING").red().bold()
        );
        eprintln!("  Run `pitchgym devices` to check available inputs.");
    } else if peak < -30.0 {
        println!(
            "  {} Signal detected but quiet. Consider increasing mic gain.",
            style("NOTE").yellow().bold()
        );
    } else {
        println!("  {} Mic is working.", style("OK").green().bold());
    }

    Ok(())
}
