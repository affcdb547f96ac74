//! I/O 支持：网定义的 JSON 与 RON 序列化接口。
use std::fs;
use std::path::Path;

use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::net::core::{Net, NetError};
use crate::net::structure::Tokens;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ron error: {0}")]
    Ron(#[from] ron::Error),
    #[error("ron syntax error: {0}")]
    RonSyntax(#[from] ron::error::SpannedError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported net file extension `{0}` (expected .json or .ron)")]
    UnsupportedFormat(String),
    #[error("invalid net definition: {0}")]
    Net(#[from] NetError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Ron,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self, IoError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "json" => Ok(Format::Json),
            "ron" => Ok(Format::Ron),
            _ => Err(IoError::UnsupportedFormat(ext)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub tokens: Tokens,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcDefinition {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// 网的可交换描述；坐标等显示信息不属于该格式。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetDefinition {
    #[serde(default)]
    pub places: Vec<PlaceDefinition>,
    #[serde(default)]
    pub transitions: Vec<TransitionDefinition>,
    #[serde(default)]
    pub arcs: Vec<ArcDefinition>,
}

impl NetDefinition {
    pub fn into_net(self) -> Result<Net, NetError> {
        let mut builder = Net::builder();
        for place in self.places {
            builder.add_place(place.id.clone())?;
            builder.set_tokens(&place.id, place.tokens)?;
            if let Some(name) = place.name {
                builder.set_name(&place.id, name)?;
            }
        }
        for transition in self.transitions {
            builder.add_transition(transition.id.clone())?;
            if let Some(name) = transition.name {
                builder.set_name(&transition.id, name)?;
            }
        }
        for arc in self.arcs {
            builder.add_arc(arc.id, arc.source, arc.target)?;
        }
        builder.build()
    }

    /// 导出网定义；库所 token 取自初始标识。
    pub fn from_net(net: &Net) -> Self {
        Self {
            places: net
                .places()
                .iter()
                .map(|place| PlaceDefinition {
                    id: place.ident.clone(),
                    name: place.name.clone(),
                    tokens: place.initial_tokens,
                })
                .collect(),
            transitions: net
                .transitions()
                .iter()
                .map(|transition| TransitionDefinition {
                    id: transition.ident.clone(),
                    name: transition.name.clone(),
                })
                .collect(),
            arcs: net
                .arcs()
                .iter()
                .map(|arc| {
                    let (source, target) = net.arc_endpoints(arc);
                    ArcDefinition {
                        id: arc.ident.clone(),
                        source: source.to_string(),
                        target: target.to_string(),
                    }
                })
                .collect(),
        }
    }
}

pub fn to_json_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn from_json_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_str(s)?)
}

pub fn to_ron_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    let mut pretty = PrettyConfig::default();
    pretty.new_line = "\n".into();
    Ok(ron::ser::to_string_pretty(value, pretty)?)
}

pub fn from_ron_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(ron::from_str(s)?)
}

pub fn parse_net(content: &str, format: Format) -> Result<Net, IoError> {
    let definition: NetDefinition = match format {
        Format::Json => from_json_str(content)?,
        Format::Ron => from_ron_str(content)?,
    };
    Ok(definition.into_net()?)
}

/// 读取网定义文件，格式由扩展名决定。
pub fn read_net<P: AsRef<Path>>(path: P) -> Result<Net, IoError> {
    let path = path.as_ref();
    let format = Format::from_path(path)?;
    let content = fs::read_to_string(path)?;
    log::debug!("读取网定义 {:?} ({:?})", path, format);
    parse_net(&content, format)
}

pub fn write_net<P: AsRef<Path>>(path: P, net: &Net) -> Result<(), IoError> {
    let path = path.as_ref();
    let definition = NetDefinition::from_net(net);
    let content = match Format::from_path(path)? {
        Format::Json => to_json_string(&definition)?,
        Format::Ron => to_ron_string(&definition)?,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCER_JSON: &str = r#"{
        "places": [
            { "id": "p2" },
            { "id": "p1", "name": "source", "tokens": 1 }
        ],
        "transitions": [{ "id": "t1", "name": "produce" }],
        "arcs": [
            { "id": "a1", "source": "p1", "target": "t1" },
            { "id": "a2", "source": "t1", "target": "p1" },
            { "id": "a3", "source": "t1", "target": "p2" }
        ]
    }"#;

    #[test]
    fn parses_json_definition() {
        let net = parse_net(PRODUCER_JSON, Format::Json).unwrap();
        assert_eq!(net.places_len(), 2);
        assert_eq!(net.current_marking().as_slice(), &[1, 0]);
        let t1 = net.transition_id("t1").unwrap();
        assert_eq!(net.transitions()[t1].label(), "produce");
    }

    #[test]
    fn ron_round_trip_preserves_definition() {
        let net = parse_net(PRODUCER_JSON, Format::Json).unwrap();
        let definition = NetDefinition::from_net(&net);
        let ron = to_ron_string(&definition).unwrap();
        let back = parse_net(&ron, Format::Ron).unwrap();
        assert_eq!(NetDefinition::from_net(&back), definition);
    }

    #[test]
    fn structural_errors_surface_as_net_error() {
        let broken = r#"{ "places": [{ "id": "p" }, { "id": "p" }] }"#;
        let err = parse_net(broken, Format::Json).unwrap_err();
        assert!(matches!(
            err,
            IoError::Net(NetError::DuplicateIdentifier { .. })
        ));
    }

    #[test]
    fn negative_tokens_do_not_deserialize() {
        let broken = r#"{ "places": [{ "id": "p", "tokens": -1 }] }"#;
        assert!(matches!(
            parse_net(broken, Format::Json),
            Err(IoError::Json(_))
        ));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(Format::from_path(Path::new("a/net.JSON")).unwrap(), Format::Json);
        assert_eq!(Format::from_path(Path::new("net.ron")).unwrap(), Format::Ron);
        assert!(matches!(
            Format::from_path(Path::new("net.pnml")),
            Err(IoError::UnsupportedFormat(ext)) if ext == "pnml"
        ));
    }

    #[test]
    fn write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nets").join("producer.json");
        let net = parse_net(PRODUCER_JSON, Format::Json).unwrap();

        write_net(&path, &net).unwrap();
        let back = read_net(&path).unwrap();
        assert_eq!(back.initial_marking(), net.initial_marking());
        assert_eq!(back.arcs().len(), 3);
    }
}
