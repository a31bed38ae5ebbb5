// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest priority.
/// Later files override earlier ones.
///
/// `OSA_HOME`, when set, takes the place of `~/.config/osa` entirely (spec §6).
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide default
    paths.push(PathBuf::from("/etc/osa/config.yaml"));
    paths.push(PathBuf::from("/etc/osa/config.yml"));

    // 2. OSA_HOME, else XDG / home
    if let Ok(home) = std::env::var("OSA_HOME") {
        let home = PathBuf::from(home);
        paths.push(home.join("config.yaml"));
        paths.push(home.join("config.yml"));
    } else {
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config/osa/config.yaml"));
            paths.push(home.join(".config/osa/config.yml"));
        }
        if let Some(cfg) = dirs::config_dir() {
            paths.push(cfg.join("osa/config.yaml"));
            paths.push(cfg.join("osa/config.yml"));
        }
    }

    // 3. Workspace-local
    paths.push(PathBuf::from(".osa/config.yaml"));
    paths.push(PathBuf::from(".osa/config.yml"));
    paths.push(PathBuf::from(".osa.yaml"));
    paths.push(PathBuf::from(".osa.yml"));
    paths.push(PathBuf::from("osa.yaml"));
    paths.push(PathBuf::from("osa.yml"));

    paths
}

/// `OSA_HOME`-relative directory used for durable files (spec §6: sessions/,
/// memory.jsonl, HEARTBEAT.md, CRONS.json, TRIGGERS.json) when the config
/// file doesn't set an explicit path for them.
pub fn osa_home() -> PathBuf {
    if let Ok(home) = std::env::var("OSA_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config/osa")
}

/// Apply the environment-variable overlay documented in spec §6:
/// `OSA_HTTP_PORT` and `OSA_REQUIRE_AUTH` override `server.*`, and each
/// provider's `*_API_KEY` is left for `osa-model::from_config` to read
/// directly (it already checks `api_key_env` / the driver's default env var).
fn apply_env_overlay(config: &mut Config) {
    if let Ok(port) = std::env::var("OSA_HTTP_PORT") {
        if let Ok(port) = port.parse::<u16>() {
            let host = config
                .server
                .bind
                .rsplit_once(':')
                .map(|(h, _)| h.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            config.server.bind = format!("{host}:{port}");
        }
    }
    if let Ok(flag) = std::env::var("OSA_REQUIRE_AUTH") {
        config.server.require_auth = matches!(flag.as_str(), "1" | "true" | "TRUE" | "yes");
    }
}

/// Load configuration by merging all discovered YAML files.
/// The `extra` argument may provide an explicit path (e.g. `--config` CLI flag).
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    // Deserialize the merged YAML value into Config, falling back to defaults
    // when the merged value is empty (no config files found).
    let mut config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty())
    {
        Config::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };
    apply_env_overlay(&mut config);
    Ok(config)
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn val(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val("x: 1");
        let src = val("x: 2");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["x"].as_i64(), Some(2));
    }

    #[test]
    fn merge_preserves_keys_not_in_src() {
        let mut dst = val("a: 1\nb: 2");
        let src = val("b: 99");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["a"].as_i64(), Some(1));
        assert_eq!(dst["b"].as_i64(), Some(99));
    }

    #[test]
    fn merge_nested_tables() {
        let mut dst = val("model:\n  provider: openai\n  name: gpt-4o");
        let src = val("model:\n  name: gpt-4o-mini");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["model"]["provider"].as_str(), Some("openai"));
        assert_eq!(dst["model"]["name"].as_str(), Some("gpt-4o-mini"));
    }

    #[test]
    fn load_returns_error_when_explicit_path_missing() {
        let result = load(Some(Path::new("/tmp/osa_nonexistent_config_xyz.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_with_no_extra_path_returns_defaults() {
        let cfg = load(None).unwrap();
        assert_eq!(cfg.model.provider, "openai");
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "model:\n  provider: anthropic\n  name: test-model").unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.model.provider, "anthropic");
        assert_eq!(cfg.model.name, "test-model");
    }
}
