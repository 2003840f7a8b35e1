//! Driver settings from the command line.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

pub const USAGE: &str = "\
Usage: lifegpu [options]

  --width <px>               window width in pixels (default 1280)
  --height <px>              window height in pixels (default 720)
  --cell-size <px>           cell edge in pixels (default 10)
  --fps <n>                  target generations per second (default 60)
  --gpu                      start on the GPU update path
  --seed <n>                 seed for random fills
  --bench-generations <n>    generations per benchmark run (default 1000)
  --bench-log <file>         benchmark log (default benchmark_results.txt)
  --help                     print this message";

pub const MIN_STEPS_PER_SECOND: u32 = 5;

/// Which engine advances the board.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdatePath {
    #[default]
    Cpu,
    Gpu,
}

impl UpdatePath {
    pub fn toggled(self) -> Self {
        match self {
            UpdatePath::Cpu => UpdatePath::Gpu,
            UpdatePath::Gpu => UpdatePath::Cpu,
        }
    }

    /// Label used in benchmark reports.
    pub fn implementation_label(self) -> &'static str {
        match self {
            UpdatePath::Cpu => "CPU Implementation",
            UpdatePath::Gpu => "GPU Implementation",
        }
    }
}

impl fmt::Display for UpdatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpdatePath::Cpu => "CPU",
            UpdatePath::Gpu => "GPU",
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("help requested")]
    HelpRequested,
    #[error("missing value for `{0}`")]
    MissingValue(String),
    #[error("invalid value `{value}` for `{flag}`")]
    InvalidValue { flag: String, value: String },
    #[error("unknown argument `{0}`")]
    UnknownArgument(String),
    #[error("`{0}` must be greater than zero")]
    Zero(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub width: u32,
    pub height: u32,
    pub cell_size: u32,
    pub steps_per_second: u32,
    pub path: UpdatePath,
    pub seed: Option<u64>,
    pub bench_generations: u32,
    pub bench_log: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            cell_size: 10,
            steps_per_second: 60,
            path: UpdatePath::Cpu,
            seed: None,
            bench_generations: 1000,
            bench_log: PathBuf::from("benchmark_results.txt"),
        }
    }
}

impl AppConfig {
    /// Parses arguments, program name already stripped.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let flag = arg.to_lowercase();
            match flag.as_str() {
                "-h" | "--help" => return Err(ConfigError::HelpRequested),
                "--gpu" => config.path = UpdatePath::Gpu,
                "--width" => config.width = parse_value(&flag, args.next())?,
                "--height" => config.height = parse_value(&flag, args.next())?,
                "--cell-size" => config.cell_size = parse_value(&flag, args.next())?,
                "--fps" => config.steps_per_second = parse_value(&flag, args.next())?,
                "--seed" => config.seed = Some(parse_value(&flag, args.next())?),
                "--bench-generations" => config.bench_generations = parse_value(&flag, args.next())?,
                "--bench-log" => {
                    let value = args.next().ok_or_else(|| ConfigError::MissingValue(flag.clone()))?;
                    config.bench_log = PathBuf::from(value);
                }
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        if config.width == 0 {
            return Err(ConfigError::Zero("--width"));
        }
        if config.height == 0 {
            return Err(ConfigError::Zero("--height"));
        }
        if config.cell_size == 0 {
            return Err(ConfigError::Zero("--cell-size"));
        }
        if config.bench_generations == 0 {
            return Err(ConfigError::Zero("--bench-generations"));
        }
        config.steps_per_second = config.steps_per_second.max(MIN_STEPS_PER_SECOND);
        Ok(config)
    }
}

fn parse_value<T: FromStr>(flag: &str, value: Option<String>) -> Result<T, ConfigError> {
    let value = value.ok_or_else(|| ConfigError::MissingValue(flag.to_owned()))?;
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_owned(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<AppConfig, ConfigError> {
        AppConfig::from_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults_without_arguments() {
        assert_eq!(parse(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn overrides() {
        let config = parse(&[
            "--width", "640", "--HEIGHT", "480", "--cell-size", "4", "--gpu", "--seed", "99",
            "--fps", "2", "--bench-generations", "50", "--bench-log", "out.txt",
        ])
        .unwrap();
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
        assert_eq!(config.cell_size, 4);
        assert_eq!(config.path, UpdatePath::Gpu);
        assert_eq!(config.seed, Some(99));
        assert_eq!(config.steps_per_second, MIN_STEPS_PER_SECOND);
        assert_eq!(config.bench_generations, 50);
        assert_eq!(config.bench_log, PathBuf::from("out.txt"));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse(&["--width"]), Err(ConfigError::MissingValue("--width".into())));
        assert_eq!(
            parse(&["--cell-size", "ten"]),
            Err(ConfigError::InvalidValue {
                flag: "--cell-size".into(),
                value: "ten".into()
            })
        );
        assert_eq!(parse(&["--cell-size", "0"]), Err(ConfigError::Zero("--cell-size")));
        assert_eq!(parse(&["--fast"]), Err(ConfigError::UnknownArgument("--fast".into())));
        assert_eq!(parse(&["--help"]), Err(ConfigError::HelpRequested));
    }

    #[test]
    fn path_labels() {
        assert_eq!(UpdatePath::Cpu.toggled(), UpdatePath::Gpu);
        assert_eq!(UpdatePath::Gpu.implementation_label(), "GPU Implementation");
        assert_eq!(UpdatePath::Cpu.to_string(), "CPU");
    }
}
