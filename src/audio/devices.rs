use anyhow::Result;
use console::style;
use cpal::traits::{DeviceTrait, HostTrait};

/// List available audio input devices and their supported configurations,
/// marking the default the trainer will capture from.
pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();

    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_default();

    let devices: Vec<_> = host.input_devices()?.collect();
    if devices.is_empty() {
        eprintln!("No audio input devices found.");
        return Ok(());
    }

    println!("{}", style("Audio Input Devices").bold());
    println!();

    for device in &devices {
        let name = device.name().unwrap_or_else(|_| "<unknown>".into());
        if name == default_name {
            println!("  {} {}", style("*").green().bold(), style(&name).green().bold());
        } else {
            println!("    {}", style(&name).bold());
        }

        match device.supported_input_configs() {
            Ok(configs) => {
                for cfg in configs {
                    let channels = cfg.channels();
                    let min_rate = cfg.min_sample_rate().0;
                    let max_rate = cfg.max_sample_rate().0;
                    let format = cfg.sample_format();
                    if min_rate == max_rate {
                        println!("      {channels}ch  {min_rate} Hz  {format:?}");
                    } else {
                        println!("      {channels}ch  {min_rate}-{max_rate} Hz  {format:?}");
                    }
                }
            }
            Err(e) => println!("      Could not query configs: {e}"),
        }
        println!();
    }

    if !default_name.is_empty() {
        println!("  {} = default device", style("*").green().bold());
    }

    Ok(())
}
