// src/ingest/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::providers::{SourceSpec, SOURCE_NAMES};
use crate::monitor::FirstRunPolicy;

pub const ENV_PATH: &str = "MONITOR_SOURCES_PATH";

/// Per-source tweaks on top of the built-in catalogue.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SourceOverride {
    pub name: String,
    #[serde(default)]
    pub max_notices: Option<usize>,
    #[serde(default)]
    pub first_run: Option<FirstRunPolicy>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Load overrides from an explicit path. Supports TOML or JSON formats.
pub fn load_overrides_from(path: &Path) -> Result<Vec<SourceOverride>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading source overrides from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_overrides(&content, ext.as_str())
}

/// Load overrides using env var + fallbacks:
/// 1) $MONITOR_SOURCES_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
pub fn load_overrides_default() -> Result<Vec<SourceOverride>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_overrides_from(&pb);
        } else {
            return Err(anyhow!("MONITOR_SOURCES_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_overrides_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_overrides_from(&json_p);
    }
    Ok(Vec::new())
}

/// The extension decides the format; without one, TOML is tried before JSON.
fn parse_overrides(s: &str, hint_ext: &str) -> Result<Vec<SourceOverride>> {
    let parsed = match hint_ext {
        "toml" => parse_toml(s)?,
        "json" => parse_json(s)?,
        _ => match parse_toml(s) {
            Ok(v) => v,
            Err(toml_err) => parse_json(s).map_err(|json_err| {
                anyhow!(
                    "unsupported source overrides format (toml: {toml_err:#}; json: {json_err:#})"
                )
            })?,
        },
    };
    validate(&parsed)?;
    Ok(parsed)
}

fn parse_toml(s: &str) -> Result<Vec<SourceOverride>> {
    #[derive(Deserialize)]
    struct TomlFile {
        #[serde(default)]
        source: Vec<SourceOverride>,
    }
    let v: TomlFile = toml::from_str(s).context("parsing source overrides toml")?;
    Ok(v.source)
}

fn parse_json(s: &str) -> Result<Vec<SourceOverride>> {
    serde_json::from_str(s).context("parsing source overrides json")
}

fn validate(items: &[SourceOverride]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for it in items {
        if !SOURCE_NAMES.contains(&it.name.as_str()) {
            bail!("unknown source {:?} (known: {})", it.name, SOURCE_NAMES.join(", "));
        }
        if !seen.insert(it.name.as_str()) {
            bail!("source {:?} listed twice", it.name);
        }
        if it.max_notices == Some(0) {
            bail!("max_notices for {} must be positive", it.name);
        }
    }
    Ok(())
}

/// Apply overrides to the catalogue, dropping disabled sources.
pub fn apply_overrides(specs: Vec<SourceSpec>, overrides: &[SourceOverride]) -> Vec<SourceSpec> {
    specs
        .into_iter()
        .filter_map(|mut spec| {
            let Some(o) = overrides.iter().find(|o| o.name == spec.adapter.name()) else {
                return Some(spec);
            };
            if o.enabled == Some(false) {
                tracing::info!(source = spec.adapter.name(), "source disabled by config");
                return None;
            }
            if let Some(m) = o.max_notices {
                spec.max_notices = m;
            }
            if let Some(p) = o.first_run {
                spec.first_run = p;
            }
            Some(spec)
        })
        .collect()
}
