//! mixdown - decode, resample and combine audio files into one WAV
//!
//! ```text
//! mixdown [--config <file>] [--strategy lead|sum] <output.wav> <input>...
//! ```
//!
//! Settings come from `~/.config/mixdown/config.yaml` unless `--config`
//! names another file. Set RUST_LOG=debug for per-block output.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use mixdown_core::config::{default_config_path, load_config};
use mixdown_core::{MixEvent, MixStrategy, Mixer, MixerConfig};

const USAGE: &str =
    "usage: mixdown [--config <file>] [--strategy lead|sum] <output.wav> <input>...";

#[derive(Debug, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    strategy: Option<MixStrategy>,
    output: PathBuf,
    inputs: Vec<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut config = None;
    let mut strategy = None;
    let mut positional = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a file")?;
                config = Some(PathBuf::from(path));
            }
            "--strategy" => {
                strategy = Some(match args.next().as_deref() {
                    Some("lead") => MixStrategy::Lead,
                    Some("sum") => MixStrategy::Sum,
                    other => bail!("unknown strategy {:?} (expected lead or sum)", other),
                });
            }
            "-h" | "--help" => bail!("{}", USAGE),
            flag if flag.starts_with("--") => bail!("unknown flag {}\n{}", flag, USAGE),
            _ => positional.push(PathBuf::from(&arg)),
        }
    }

    let mut positional = positional.into_iter();
    let Some(output) = positional.next() else {
        bail!("missing output path\n{}", USAGE);
    };
    Ok(Args {
        config,
        strategy,
        output,
        inputs: positional.collect(),
    })
}

fn run(args: Args) -> Result<()> {
    let config_path = args.config.unwrap_or_else(default_config_path);
    let mut config: MixerConfig = load_config(&config_path);
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }

    let mut mixer = Mixer::new(config);
    let events = mixer.subscribe();

    for input in &args.inputs {
        mixer
            .add(input)
            .with_context(|| format!("Failed to add {:?}", input))?;
    }

    let result = mixer.mix(&args.output);

    for event in events.try_iter() {
        if let MixEvent::SourceFailed { label, error, .. } = event {
            log::warn!("source {} failed: {}", label, error);
        }
    }

    let summary = result.with_context(|| format!("Failed to mix into {:?}", args.output))?;
    log::info!(
        "wrote {:?}: {} samples in {} packets",
        args.output,
        summary.samples,
        summary.packets
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    run(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_positional_paths() {
        let parsed = args(&["out.wav", "a.mp3", "b.flac"]).unwrap();
        assert_eq!(parsed.output, PathBuf::from("out.wav"));
        assert_eq!(
            parsed.inputs,
            vec![PathBuf::from("a.mp3"), PathBuf::from("b.flac")]
        );
        assert_eq!(parsed.config, None);
        assert_eq!(parsed.strategy, None);
    }

    #[test]
    fn test_parse_flags() {
        let parsed = args(&["--strategy", "sum", "out.wav", "--config", "mix.yaml", "a.wav"]).unwrap();
        assert_eq!(parsed.strategy, Some(MixStrategy::Sum));
        assert_eq!(parsed.config, Some(PathBuf::from("mix.yaml")));
        assert_eq!(parsed.inputs, vec![PathBuf::from("a.wav")]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["--config"]).is_err());
        assert!(args(&["--strategy", "loudest", "out.wav"]).is_err());
        assert!(args(&["--verbose", "out.wav"]).is_err());
    }
}
