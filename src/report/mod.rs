use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::analysis::{Analysis, BoundednessResult, StateSpace, StateSpaceStats};
use crate::config::OutputFormat;
use crate::net::Net;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Bounded,
    Unbounded,
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Bounded => write!(f, "有界"),
            Verdict::Unbounded => write!(f, "无界"),
            Verdict::Unknown => write!(f, "未知"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessReport {
    pub decision_node: String,
    pub decision_marking: String,
    pub unbounded_node: String,
    pub unbounded_marking: String,
    /// 从根出发依次发生的迁移标识符
    pub transitions: Vec<String>,
    /// 无界节点上严格增长的库所
    pub growing_places: Vec<String>,
}

impl WitnessReport {
    pub fn path_len(&self) -> usize {
        self.transitions.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundednessReport {
    pub source: String,
    pub verdict: Verdict,
    pub node_count: usize,
    pub edge_count: usize,
    pub witness: Option<WitnessReport>,
    /// 未能判定的原因（状态上限）
    pub reason: Option<String>,
    pub analysis_time: Duration,
    pub error: Option<String>,
}

impl BoundednessReport {
    pub fn from_analysis(source: impl Into<String>, net: &Net, analysis: &Analysis, elapsed: Duration) -> Self {
        let graph = analysis.graph();
        let (verdict, reason) = match analysis.result() {
            BoundednessResult::Bounded => (Verdict::Bounded, None),
            BoundednessResult::Unbounded(_) => (Verdict::Unbounded, None),
            BoundednessResult::Unknown { reason } => (Verdict::Unknown, Some(reason.clone())),
        };
        let witness = analysis.witness().and_then(|witness| {
            let decision = graph.node(witness.decision)?;
            let unbounded = graph.node(witness.unbounded)?;
            let transitions = witness
                .edges
                .iter()
                .filter_map(|&edge| graph.edge(edge))
                .map(|edge| edge.transition_ident().to_string())
                .collect();
            let growing_places = unbounded
                .marking()
                .strictly_greater_places(decision.marking())
                .into_iter()
                .filter_map(|place| net.place(place))
                .map(|place| place.ident.clone())
                .collect();
            Some(WitnessReport {
                decision_node: format!("s{}", decision.id()),
                decision_marking: decision.marking().to_string(),
                unbounded_node: format!("s{}", unbounded.id()),
                unbounded_marking: unbounded.marking().to_string(),
                transitions,
                growing_places,
            })
        });

        Self {
            source: source.into(),
            verdict,
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            witness,
            reason,
            analysis_time: elapsed,
            error: None,
        }
    }

    /// 网未能载入时的报告。
    pub fn failed(source: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            source: source.into(),
            verdict: Verdict::Unknown,
            node_count: 0,
            edge_count: 0,
            witness: None,
            reason: None,
            analysis_time: Duration::default(),
            error: Some(error.to_string()),
        }
    }
}

impl fmt::Display for BoundednessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "有界性分析报告: {}", self.source)?;
        writeln!(f, "分析时间: {:?}", self.analysis_time)?;
        writeln!(f, "结论: {}", self.verdict)?;
        writeln!(f, "可达图: {} 个节点, {} 条边", self.node_count, self.edge_count)?;

        if let Some(witness) = &self.witness {
            writeln!(f, "\n见证路径 (长度 {}):", witness.path_len())?;
            writeln!(f, "  {}", witness.transitions.iter().join(" -> "))?;
            writeln!(
                f,
                "判定节点 {} {} 被无界节点 {} {} 支配",
                witness.decision_node,
                witness.decision_marking,
                witness.unbounded_node,
                witness.unbounded_marking
            )?;
            writeln!(f, "增长的库所: {}", witness.growing_places.iter().join(", "))?;
        }

        if let Some(reason) = &self.reason {
            writeln!(f, "未能判定: {}", reason)?;
        }

        if let Some(error) = &self.error {
            writeln!(f, "\n错误信息: {}", error)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSpaceReport {
    pub source: String,
    pub state_count: usize,
    pub edge_count: usize,
    pub deadlocks: Vec<String>,
    pub truncated: bool,
    pub analysis_time: Duration,
    pub error: Option<String>,
}

impl StateSpaceReport {
    pub fn from_state_space(source: impl Into<String>, space: &StateSpace, elapsed: Duration) -> Self {
        let StateSpaceStats {
            state_count,
            edge_count,
            truncated,
            ..
        } = space.stats();
        Self {
            source: source.into(),
            state_count,
            edge_count,
            deadlocks: space.deadlocks().map(ToString::to_string).collect(),
            truncated,
            analysis_time: elapsed,
            error: None,
        }
    }

    pub fn failed(source: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            source: source.into(),
            state_count: 0,
            edge_count: 0,
            deadlocks: Vec::new(),
            truncated: false,
            analysis_time: Duration::default(),
            error: Some(error.to_string()),
        }
    }
}

impl fmt::Display for StateSpaceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "状态空间报告: {}", self.source)?;
        writeln!(f, "分析时间: {:?}", self.analysis_time)?;
        writeln!(f, "状态数: {}", self.state_count)?;
        writeln!(f, "边数: {}", self.edge_count)?;
        if self.truncated {
            writeln!(f, "已达到状态上限，结果不完整")?;
        }
        if !self.deadlocks.is_empty() {
            writeln!(f, "死锁标识: {}", self.deadlocks.iter().join(", "))?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "\n错误信息: {}", error)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    Boundedness(BoundednessReport),
    StateSpace(StateSpaceReport),
}

impl Report {
    pub fn source(&self) -> &str {
        match self {
            Report::Boundedness(report) => &report.source,
            Report::StateSpace(report) => &report.source,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Boundedness(report) => fmt::Display::fmt(report, f),
            Report::StateSpace(report) => fmt::Display::fmt(report, f),
        }
    }
}

/// 多个网的汇总，按来源排序。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub reports: Vec<Report>,
}

impl BatchReport {
    pub fn new(mut reports: Vec<Report>) -> Self {
        reports.sort_by(|a, b| a.source().cmp(b.source()));
        Self { reports }
    }

    pub fn unbounded_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| {
                matches!(report, Report::Boundedness(r) if r.verdict == Verdict::Unbounded)
            })
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.reports.iter().any(|report| match report {
            Report::Boundedness(r) => r.error.is_some(),
            Report::StateSpace(r) => r.error.is_some(),
        })
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [single] = self.reports.as_slice() {
            return fmt::Display::fmt(single, f);
        }
        // 表头用 ASCII，`{:<32}` 按字符计宽，中文会错位
        writeln!(f, "{:<32} {:>8} {:>8}  {}", "net", "nodes", "edges", "result")?;
        for report in &self.reports {
            match report {
                Report::Boundedness(r) => {
                    let detail = match (&r.witness, r.error.as_ref().or(r.reason.as_ref())) {
                        (Some(w), _) => format!(
                            "{} 路径长度 {}: {}",
                            r.verdict,
                            w.path_len(),
                            w.transitions.iter().join(", ")
                        ),
                        (None, Some(error)) => format!("{} ({})", r.verdict, error),
                        (None, None) => r.verdict.to_string(),
                    };
                    writeln!(f, "{:<32} {:>8} {:>8}  {}", r.source, r.node_count, r.edge_count, detail)?;
                }
                Report::StateSpace(r) => {
                    let detail = match &r.error {
                        Some(error) => error.clone(),
                        None => format!("{} 个死锁{}", r.deadlocks.len(), if r.truncated { " (截断)" } else { "" }),
                    };
                    writeln!(f, "{:<32} {:>8} {:>8}  {}", r.source, r.state_count, r.edge_count, detail)?;
                }
            }
        }
        Ok(())
    }
}

/// 按格式渲染报告。
pub fn render<T>(report: &T, format: OutputFormat) -> serde_json::Result<String>
where
    T: Serialize + fmt::Display,
{
    match format {
        OutputFormat::Text => Ok(report.to_string()),
        OutputFormat::Json => serde_json::to_string_pretty(report),
    }
}

pub fn save_to_file<T, P>(report: &T, format: OutputFormat, path: P) -> anyhow::Result<()>
where
    T: Serialize + fmt::Display,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, render(report, format)?)?;
    Ok(())
}
