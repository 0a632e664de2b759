mod audio;
mod cli;
mod config;
mod dsp;
mod engine;
mod paths;
mod theory;
mod tui;
mod util;

use std::io::BufRead;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;

use cli::{Cli, Command, TrainArgs};
use engine::session::{Session, FRAME_LEN};
use engine::TrainerConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Train(args) => run_train(args),
        Command::Tone { note, ms } => run_tone(&note, ms),
        Command::Devices => audio::devices::list_devices(),
        Command::MicCheck => audio::mic_check::run(),
        Command::Config => show_config(),
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let mut app = config::load_config()?;
    args.apply(&mut app.trainer);
    let mut cfg: TrainerConfig = app.trainer.to_trainer_config();

    println!();
    println!("{}", style("=== Pitch Training ===").bold());
    println!();
    println!(
        "  Mode {}  |  Range {}-{}  |  Tolerance {:.0} cents  |  A4 {:.1} Hz",
        style(cfg.mode).cyan(),
        theory::note_name(theory::display_note(cfg.low_note, cfg.transpose)),
        theory::note_name(theory::display_note(cfg.high_note, cfg.transpose)),
        cfg.tolerance_cents,
        cfg.a4_hz,
    );
    println!("  A tone plays; sing or play it back until the tuner locks on.");
    println!();
    println!("  Press {} to start.", style("Enter").green().bold());

    wait_for_enter()?;

    // Capture failure is fatal to session start and must leave nothing
    // running; both collaborators come up before any engine state exists.
    let mic = audio::capture::start_capture(4 * FRAME_LEN)
        .context("Could not start the training session")?;
    let tones = audio::tone::ToneSynth::new()?;

    let mut rng = rand::thread_rng();
    let mut session = Session::start(mic, tones, &cfg, 0.0, &mut rng);

    let mut terminal = tui::init()?;
    let outcome = tui::screens::trainer::run(&mut terminal, &mut session, &mut cfg);
    tui::restore()?;
    let outcome = outcome?;

    println!();
    println!("  {}", style("*** STOPPED ***").dim());
    println!();
    println!("  {}", style("Session").bold());
    println!();
    println!("  {:10} {:>8}", style("Correct").bold(), outcome.solved);
    println!(
        "  {:10} {:>8}",
        style("Elapsed").bold(),
        format!("{}s", outcome.elapsed_secs)
    );
    println!(
        "  {:10} {:>8}",
        style("Avg/note").bold(),
        format!("{:.2}s", outcome.average_note_secs)
    );
    println!();

    Ok(())
}

fn run_tone(note: &str, ms: u64) -> Result<()> {
    use engine::session::TonePlayer;

    let app = config::load_config()?;
    let cfg = app.trainer.to_trainer_config();

    let note = theory::parse_note(note)
        .with_context(|| format!("'{note}' is not a note name or MIDI number"))?;
    let freq = theory::note_to_freq(note, cfg.a4_hz);

    println!(
        "Playing {} ({:.2} Hz) for {}ms",
        style(theory::note_name(note)).green(),
        freq,
        ms
    );

    let mut tones = audio::tone::ToneSynth::new()?;
    tones.play(freq, ms, true);
    // Wait out the tone; the synth's release shapes the tail.
    std::thread::sleep(std::time::Duration::from_millis(ms + 100));

    Ok(())
}

fn show_config() -> Result<()> {
    let path = paths::config_file();
    let app = config::load_config()?;

    println!("{}", style("Configuration").bold());
    println!();
    if path.exists() {
        println!("  Loaded from {}", style(path.display()).green());
    } else {
        println!(
            "  {} does not exist; using defaults.",
            style(path.display()).yellow()
        );
    }
    println!();

    let rendered = toml::to_string_pretty(&app).context("Failed to render configuration")?;
    for line in rendered.lines() {
        println!("  {line}");
    }

    Ok(())
}

/// Block until the user presses Enter.
fn wait_for_enter() -> Result<()> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(())
}
