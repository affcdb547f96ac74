//! Parsing Options.
//! `pnbound [OPTIONS] <NET>...`, extra flags may come from `PNB_FLAGS`.

use clap::{Arg, Command};
use std::error::Error;
use std::path::PathBuf;

use crate::config::{OutputFormat, PnbConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// 有界性判定
    #[default]
    Analyze,
    /// 广度优先枚举可达状态
    Explore,
}

fn make_options_parser() -> clap::Command {
    Command::new("pnbound")
        .no_binary_name(true)
        .args_override_self(true)
        .version("v0.1.0")
        .about("Decide boundedness of Petri nets by depth-first reachability search")
        .arg(
            Arg::new("files")
                .value_name("NET")
                .help("Net definition files (.json or .ron)")
                .num_args(1..)
                .required(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .help("What to compute for each net")
                .default_value("analyze")
                .value_parser(["analyze", "explore"]),
        )
        .arg(
            Arg::new("state-limit")
                .short('l')
                .long("state-limit")
                .value_name("N")
                .help("Stop after N distinct markings (overrides the config file)")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .help("Report format (overrides the config file)")
                .value_parser(["text", "json"]),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Write the report to FILE instead of stdout")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .default_value("pnbound.toml")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("dot")
                .long("dot")
                .value_name("FILE")
                .help("Write the reachability graph of a single net as DOT")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub files: Vec<PathBuf>,
    pub mode: Mode,
    pub state_limit: Option<usize>,
    pub format: Option<OutputFormat>,
    pub output: Option<PathBuf>,
    pub config: PathBuf,
    pub dot: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            files: Vec::new(),
            mode: Mode::Analyze,
            state_limit: None,
            format: None,
            output: None,
            config: PathBuf::from("pnbound.toml"),
            dot: None,
        }
    }
}

impl Options {
    pub fn parse_from_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let flags = shellwords::split(s)?;
        Self::parse_from_args(&flags)
    }

    pub fn parse_from_args(flags: &[String]) -> Result<Self, Box<dyn Error>> {
        let app = make_options_parser();
        let matches = app.try_get_matches_from(flags.iter())?;

        let files = matches
            .get_many::<PathBuf>("files")
            .map(|files| files.cloned().collect())
            .unwrap_or_default();
        let mode = match matches.get_one::<String>("mode").map(String::as_str) {
            Some("analyze") | None => Mode::Analyze,
            Some("explore") => Mode::Explore,
            Some(other) => return Err(format!("unsupported mode `{}`", other).into()),
        };
        let format = matches
            .get_one::<String>("format")
            .map(|format| format.parse::<OutputFormat>())
            .transpose()?;

        Ok(Options {
            files,
            mode,
            state_limit: matches.get_one::<usize>("state-limit").copied(),
            format,
            output: matches.get_one::<PathBuf>("output").cloned(),
            config: matches
                .get_one::<PathBuf>("config")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("pnbound.toml")),
            dot: matches.get_one::<PathBuf>("dot").cloned(),
        })
    }

    /// 命令行优先，其次配置文件。
    pub fn merge(&self, config: &PnbConfig) -> PnbConfig {
        PnbConfig {
            state_limit: self.state_limit.or(config.state_limit),
            format: self.format.unwrap_or(config.format),
            dot_dir: config.dot_dir.clone(),
        }
    }
}
