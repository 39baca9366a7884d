// SPDX-License-Identifier: MIT
// Copyright(c) 2023 Darek Stojaczyk

//! Loads and validates the YAML policy file.
//!
//! The file has two top-level keys: `pim` (this speaker's own neighbor
//! relationship parameters) and `multicast` (the list of groups to
//! join). Unknown keys anywhere in the document are rejected rather
//! than silently ignored, so a typo'd field doesn't quietly do nothing.

use std::collections::HashSet;
use std::path::Path;

use packet::Addr;
use pimsm::{GroupConfig, JpConfig, Rpt};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawPim {
    neighbor: Addr,
    source: Addr,
    interface: String,
    #[serde(default = "default_dr_priority")]
    dr_priority: u32,
    #[serde(default = "default_hello_period")]
    hello_period_secs: u16,
    #[serde(default = "default_jp_refresh")]
    jp_refresh_secs: u16,
}

fn default_dr_priority() -> u32 {
    1
}

fn default_hello_period() -> u16 {
    30
}

fn default_jp_refresh() -> u16 {
    60
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRpt {
    rp: Addr,
    #[serde(default)]
    prunes: Vec<Addr>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGroup {
    group: Addr,
    #[serde(default)]
    rpt: Option<RawRpt>,
    #[serde(default)]
    spt: Vec<Addr>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    pim: RawPim,
    #[serde(default)]
    multicast: Vec<RawGroup>,
}

/// This speaker's own neighbor-relationship parameters, as opposed to
/// the per-group policy carried in a [`pimsm::JpConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PimParams {
    pub neighbor: Addr,
    pub source: Addr,
    pub interface: String,
    pub dr_priority: u32,
    pub hello_period_secs: u16,
    pub jp_refresh_secs: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub pim: PimParams,
    pub jp: JpConfig,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{0}")]
    Yaml(String),
    #[error("hello-period-secs must be positive")]
    ZeroHelloPeriod,
    #[error("jp-refresh-secs must be positive")]
    ZeroJpRefresh,
    #[error(transparent)]
    Group(#[from] pimsm::ConfigError),
}

/// Every validation error found in the file, reported together rather
/// than one-at-a-time, so a user fixing their YAML doesn't have to
/// re-run this speaker once per mistake.
#[derive(Debug)]
pub struct ConfigErrors(pub Vec<ConfigError>);

impl std::fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} configuration error{} found:", self.0.len(), if self.0.len() == 1 { "" } else { "s" })?;
        for e in &self.0 {
            writeln!(f, "  - {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigErrors {}

pub fn load(path: &Path) -> Result<Config, ConfigErrors> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigErrors(vec![ConfigError::Yaml(format!("reading {}: {e}", path.display()))]))?;
    parse(&text)
}

fn parse(text: &str) -> Result<Config, ConfigErrors> {
    let raw: RawConfig =
        serde_yaml::from_str(text).map_err(|e| ConfigErrors(vec![ConfigError::Yaml(e.to_string())]))?;

    let mut errors = Vec::new();

    if raw.pim.hello_period_secs == 0 {
        errors.push(ConfigError::ZeroHelloPeriod);
    }
    if raw.pim.jp_refresh_secs == 0 {
        errors.push(ConfigError::ZeroJpRefresh);
    }

    let mut groups = Vec::with_capacity(raw.multicast.len());
    let mut seen_groups = HashSet::new();
    for rg in raw.multicast {
        if !seen_groups.insert(rg.group) {
            errors.push(ConfigError::Group(pimsm::ConfigError::DuplicateGroup { group: rg.group }));
            continue;
        }

        let rpt = rg.rpt.map(|r| Rpt { rp: r.rp, prunes: r.prunes });
        match GroupConfig::new(rg.group, rpt, rg.spt) {
            Ok(ge) => groups.push(ge),
            Err(e) => errors.push(ConfigError::Group(e)),
        }
    }

    if !errors.is_empty() {
        return Err(ConfigErrors(errors));
    }

    let jp = JpConfig::new(groups).map_err(|e| ConfigErrors(vec![ConfigError::Group(e)]))?;

    Ok(Config {
        pim: PimParams {
            neighbor: raw.pim.neighbor,
            source: raw.pim.source,
            interface: raw.pim.interface,
            dr_priority: raw.pim.dr_priority,
            hello_period_secs: raw.pim.hello_period_secs,
            jp_refresh_secs: raw.pim.jp_refresh_secs,
        },
        jp,
    })
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "pim:")?;
        writeln!(f, "  neighbor: {}", self.pim.neighbor)?;
        writeln!(f, "  source: {}", self.pim.source)?;
        writeln!(f, "  interface: {}", self.pim.interface)?;
        writeln!(f, "  dr-priority: {}", self.pim.dr_priority)?;
        writeln!(f, "  hello-period-secs: {}", self.pim.hello_period_secs)?;
        writeln!(f, "  jp-refresh-secs: {}", self.pim.jp_refresh_secs)?;
        writeln!(f, "multicast:")?;
        for ge in &self.jp.groups {
            writeln!(f, "  - group: {}", ge.group)?;
            if let Some(rpt) = &ge.rpt {
                writeln!(f, "    rpt:")?;
                writeln!(f, "      rp: {}", rpt.rp)?;
                writeln!(f, "      prunes: {:?}", rpt.prunes.iter().map(ToString::to_string).collect::<Vec<_>>())?;
            }
            writeln!(f, "    spt: {:?}", ge.spt.iter().map(ToString::to_string).collect::<Vec<_>>())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
pim:
  neighbor: 203.0.113.1
  source: 203.0.113.5
  interface: eth0
multicast:
  - group: 239.1.1.1
    rpt:
      rp: 10.0.0.1
      prunes: [10.0.0.5]
    spt: [10.0.0.2, 10.0.0.3]
  - group: 239.2.2.2
    spt: [10.0.0.9]
"#;

    #[test]
    fn parses_valid_config_with_defaults() {
        let cfg = parse(VALID).unwrap();
        assert_eq!(cfg.pim.dr_priority, 1);
        assert_eq!(cfg.pim.hello_period_secs, 30);
        assert_eq!(cfg.jp.groups.len(), 2);
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let text = format!("{VALID}\nbogus: true\n");
        let err = parse(&text).unwrap_err();
        assert!(!err.0.is_empty());
    }

    #[test]
    fn rejects_duplicate_group() {
        let text = r#"
pim:
  neighbor: 203.0.113.1
  source: 203.0.113.5
  interface: eth0
multicast:
  - group: 239.1.1.1
    spt: [10.0.0.1]
  - group: 239.1.1.1
    spt: [10.0.0.2]
"#;
        let err = parse(text).unwrap_err();
        assert!(err.0.iter().any(|e| matches!(e, ConfigError::Group(pimsm::ConfigError::DuplicateGroup { .. }))));
    }

    #[test]
    fn rejects_zero_hello_period() {
        let text = r#"
pim:
  neighbor: 203.0.113.1
  source: 203.0.113.5
  interface: eth0
  hello-period-secs: 0
multicast: []
"#;
        let err = parse(text).unwrap_err();
        assert!(err.0.iter().any(|e| matches!(e, ConfigError::ZeroHelloPeriod)));
    }
}
