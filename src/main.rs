use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info, warn};
use rayon::prelude::*;

use pnbound::analysis::{Analysis, BoundednessAnalyzer, StateSpace, StateSpaceConfig};
use pnbound::config::PnbConfig;
use pnbound::net::read_net;
use pnbound::options::{Mode, Options};
use pnbound::report::{self, BatchReport, BoundednessReport, Report, StateSpaceReport};

fn main() {
    if std::env::var("PNB_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("PNB_LOG")
            .write_style("PNB_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {:#}", err);
            std::process::exit(2);
        }
    }
}

/// 返回是否所有网都成功载入。
fn run() -> Result<bool> {
    let mut flags = shellwords::split(&std::env::var("PNB_FLAGS").unwrap_or_default())
        .context("Failed to split PNB_FLAGS")?;
    flags.extend(std::env::args().skip(1));

    let options = match Options::parse_from_args(&flags) {
        Ok(options) => options,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                clap_err.exit();
            }
            return Err(anyhow!("{}", err));
        }
    };
    debug!("PNB options: {:?}", options);

    if options.dot.is_some() && options.files.len() > 1 {
        bail!("--dot takes a single net; use `dot_dir` in the config file for batches");
    }

    let config = PnbConfig::load_from_file(&options.config)?;
    let settings = options.merge(&config);
    let analyzer = BoundednessAnalyzer::new().with_state_limit(settings.state_limit);

    let reports: Vec<Report> = options
        .files
        .par_iter()
        .map(|path| {
            let dot = options
                .dot
                .clone()
                .or_else(|| dot_path_in(settings.dot_dir.as_deref(), path));
            process(path, options.mode, &settings, &analyzer, dot)
        })
        .collect();
    let batch = BatchReport::new(reports);
    info!(
        "分析完成: {} 个网, {} 个无界",
        batch.reports.len(),
        batch.unbounded_count()
    );

    match &options.output {
        Some(path) => report::save_to_file(&batch, settings.format, path)
            .with_context(|| format!("Failed to write report: {:?}", path))?,
        None => print!("{}", report::render(&batch, settings.format)?),
    }
    Ok(!batch.has_errors())
}

fn dot_path_in(dir: Option<&Path>, net: &Path) -> Option<PathBuf> {
    let stem = net.file_stem()?;
    let mut path = dir?.join(stem);
    path.set_extension("dot");
    Some(path)
}

fn process(
    path: &Path,
    mode: Mode,
    settings: &PnbConfig,
    analyzer: &BoundednessAnalyzer,
    dot: Option<PathBuf>,
) -> Report {
    let source = path.display().to_string();
    let net = match read_net(path) {
        Ok(net) => net,
        Err(err) => {
            warn!("无法载入 {}: {}", source, err);
            return match mode {
                Mode::Analyze => Report::Boundedness(BoundednessReport::failed(source, err)),
                Mode::Explore => Report::StateSpace(StateSpaceReport::failed(source, err)),
            };
        }
    };

    let start = Instant::now();
    match mode {
        Mode::Analyze => {
            let analysis = Analysis::run(&net, analyzer);
            let elapsed = start.elapsed();
            info!("{}: {}", source, analysis.result());
            if let Some(dot) = dot {
                if let Err(err) = analysis.graph().write_dot(&dot, analysis.witness()) {
                    warn!("无法写入 {:?}: {}", dot, err);
                }
            }
            Report::Boundedness(BoundednessReport::from_analysis(
                source, &net, &analysis, elapsed,
            ))
        }
        Mode::Explore => {
            let config = StateSpaceConfig {
                state_limit: settings
                    .state_limit
                    .or(StateSpaceConfig::default().state_limit),
            };
            let space = StateSpace::explore(&net, config);
            if dot.is_some() {
                warn!("explore 模式不输出 DOT");
            }
            Report::StateSpace(StateSpaceReport::from_state_space(
                source,
                &space,
                start.elapsed(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnbound::report::Verdict;

    const PRODUCER: &str = r#"{
        "places": [{ "id": "p1", "tokens": 1 }, { "id": "p2" }],
        "transitions": [{ "id": "t1" }],
        "arcs": [
            { "id": "a1", "source": "p1", "target": "t1" },
            { "id": "a2", "source": "t1", "target": "p1" },
            { "id": "a3", "source": "t1", "target": "p2" }
        ]
    }"#;

    fn write_producer(dir: &Path) -> PathBuf {
        let path = dir.join("producer.json");
        std::fs::write(&path, PRODUCER).unwrap();
        path
    }

    #[test]
    fn analyze_mode_reports_witness_and_writes_dot() {
        let dir = tempfile::tempdir().unwrap();
        let net = write_producer(dir.path());
        let dot = dir.path().join("graphs").join("producer.dot");
        let settings = PnbConfig::default();

        let report = process(&net, Mode::Analyze, &settings, &BoundednessAnalyzer::new(), Some(dot.clone()));
        let Report::Boundedness(report) = report else {
            panic!("analyze mode must produce a boundedness report");
        };
        assert_eq!(report.verdict, Verdict::Unbounded);
        assert_eq!(report.error, None);
        assert_eq!(report.witness.unwrap().transitions, vec!["t1"]);

        let written = std::fs::read_to_string(&dot).unwrap();
        assert!(written.starts_with("digraph"));
        assert!(written.contains("penwidth=3"));
    }

    #[test]
    fn explore_mode_honours_state_limit() {
        let dir = tempfile::tempdir().unwrap();
        let net = write_producer(dir.path());
        let settings = PnbConfig {
            state_limit: Some(5),
            ..PnbConfig::default()
        };

        let report = process(&net, Mode::Explore, &settings, &BoundednessAnalyzer::new(), None);
        let Report::StateSpace(report) = report else {
            panic!("explore mode must produce a state space report");
        };
        assert_eq!(report.state_count, 5);
        assert!(report.truncated);
        assert!(report.deadlocks.is_empty());
        assert_eq!(report.error, None);
    }

    #[test]
    fn unreadable_net_yields_failed_report_in_both_modes() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let settings = PnbConfig::default();
        let analyzer = BoundednessAnalyzer::new();

        match process(&missing, Mode::Analyze, &settings, &analyzer, None) {
            Report::Boundedness(report) => {
                assert_eq!(report.verdict, Verdict::Unknown);
                assert!(report.error.is_some());
            }
            other => panic!("unexpected report {:?}", other),
        }
        match process(&missing, Mode::Explore, &settings, &analyzer, None) {
            Report::StateSpace(report) => {
                assert_eq!(report.state_count, 0);
                assert!(report.error.is_some());
            }
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[test]
    fn dot_path_uses_net_stem() {
        assert_eq!(
            dot_path_in(Some(Path::new("out")), Path::new("nets/producer.json")),
            Some(PathBuf::from("out/producer.dot"))
        );
        assert_eq!(dot_path_in(None, Path::new("nets/producer.json")), None);
    }
}
