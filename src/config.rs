#![forbid(unsafe_code)]

//! Runtime configuration for the leetsub binaries.
//!
//! Values are resolved from three layers, most specific first: explicit
//! overrides (command-line flags), process environment variables, then a
//! `.env` file in the working directory.

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_PORT: u16 = 9090;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_VTT_DIRECTORY: &str = "./vtt";
/// Upper bound of the known problem set; the `/count` tally covers 1..=N.
pub const DEFAULT_PROBLEM_COUNT: i64 = 2000;

/// Fully resolved configuration consumed by the server.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Directory holding the subtitle database.
    pub data_root: PathBuf,
    /// Directory where extracted subtitle artifacts are kept.
    pub vtt_directory: PathBuf,
    pub port: u16,
    pub host: String,
    /// Debug mode skips all local filesystem writes outside the database.
    pub debug: bool,
    /// Size of the known problem set; numbers above it are rejected.
    pub problem_count: i64,
    /// Local JSON file with the problem catalog (number/title pairs).
    pub problem_set_file: Option<PathBuf>,
    /// URL serving the same JSON payload; used when no file is configured.
    pub problem_set_url: Option<String>,
    /// Explicit yt-dlp binary; defaults to `yt-dlp` on PATH.
    pub ytdlp_bin: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub data_root: Option<PathBuf>,
    pub vtt_directory: Option<PathBuf>,
    pub port: Option<u16>,
    pub host: Option<String>,
    pub env_path: Option<PathBuf>,
}

pub fn load_runtime_config() -> Result<RuntimeConfig> {
    resolve_runtime_config(RuntimeOverrides::default())
}

pub fn resolve_runtime_config(overrides: RuntimeOverrides) -> Result<RuntimeConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_runtime_config(&file_vars, env_var_string, overrides)
}

fn build_runtime_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> Result<RuntimeConfig> {
    let data_root = overrides
        .data_root
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value("DATA_ROOT", file_vars, &env_lookup))
        .ok_or_else(|| anyhow!("DATA_ROOT not set"))?;
    let vtt_directory = overrides
        .vtt_directory
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value("VTT_DIRECTORY", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_VTT_DIRECTORY.to_string());
    let port = overrides
        .port
        .or_else(|| {
            lookup_value("LEETSUB_PORT", file_vars, &env_lookup)
                .and_then(|value| value.parse::<u16>().ok())
        })
        .unwrap_or(DEFAULT_PORT);
    let host = overrides
        .host
        .and_then(|value| {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() { None } else { Some(trimmed) }
        })
        .or_else(|| lookup_value("LEETSUB_HOST", file_vars, &env_lookup))
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let debug = lookup_value("LEETSUB_DEBUG", file_vars, &env_lookup)
        .map(|value| parse_truthy(&value))
        .unwrap_or(false);
    let problem_count = lookup_value("PROBLEM_COUNT", file_vars, &env_lookup)
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|count| *count > 0)
        .unwrap_or(DEFAULT_PROBLEM_COUNT);
    let problem_set_file =
        lookup_value("PROBLEM_SET_FILE", file_vars, &env_lookup).map(PathBuf::from);
    let problem_set_url = lookup_value("PROBLEM_SET_URL", file_vars, &env_lookup);
    let ytdlp_bin = lookup_value("YTDLP_BIN", file_vars, &env_lookup).map(PathBuf::from);

    Ok(RuntimeConfig {
        data_root: PathBuf::from(data_root),
        vtt_directory: PathBuf::from(vtt_directory),
        port,
        host,
        debug,
        problem_count,
        problem_set_file,
        problem_set_url,
        ytdlp_bin,
    })
}

fn parse_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

/// Parses a minimal `KEY=value` env file. Blank lines, comments and lines
/// without `=` are skipped; `export` prefixes and single/double quotes around
/// values are stripped.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
