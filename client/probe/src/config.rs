use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ProbeError, Result},
    models::DeviceInfo,
};

pub const DEFAULT_BASE_URL: &str = "https://qudao.eh-viewer.com/api";
pub const DEFAULT_CHANNEL: &str = "3001";

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub base_url: String,
    pub software_id: i64,
    pub channel: String,
    pub timeout: Duration,
    // Used for each call inside repeated-call checks.
    pub short_timeout: Duration,
    pub case_delay: Duration,
    pub unique_devices: bool,
    pub device: DeviceInfo,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
struct FileConfig {
    base_url: Option<String>,
    software_id: Option<i64>,
    channel: Option<String>,
    timeout_secs: Option<u64>,
    short_timeout_secs: Option<u64>,
    case_delay_ms: Option<u64>,
    unique_devices: Option<bool>,
    device: Option<FileDevice>,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
struct FileDevice {
    os: Option<String>,
    model: Option<String>,
    manufacturer: Option<String>,
    brand: Option<String>,
    sdk: Option<u32>,
}

/// Values given on the command line; these win over env and file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub channel: Option<String>,
    pub timeout_secs: Option<u64>,
    pub delay_ms: Option<u64>,
    pub unique_devices: bool,
}

pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(path) = env::var("PROBE_CONFIG_PATH") {
        return PathBuf::from(path);
    }

    let repo_path = PathBuf::from("client/probe/config.toml");
    if repo_path.exists() {
        return repo_path;
    }

    PathBuf::from("config.toml")
}

pub fn load_config(explicit: Option<&Path>, overrides: &Overrides) -> Result<ProbeConfig> {
    let config_path = resolve_config_path(explicit);

    let file_config = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .map_err(|err| ProbeError::config(format!("read {}: {err}", config_path.display())))?;
        parse_file_config(&content)?
    } else if explicit.is_some() {
        return Err(ProbeError::config(format!(
            "config file {} not found",
            config_path.display()
        )));
    } else {
        FileConfig::default()
    };

    tracing::debug!(path = %config_path.display(), "config resolved");
    merge(file_config, |key| env::var(key).ok(), overrides)
}

fn parse_file_config(content: &str) -> Result<FileConfig> {
    toml::from_str::<FileConfig>(content).map_err(|err| ProbeError::config(format!("parse: {err}")))
}

fn merge<F>(file_config: FileConfig, lookup: F, overrides: &Overrides) -> Result<ProbeConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let env_u64 = |key: &str| -> Result<Option<u64>> {
        match lookup(key) {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|err| ProbeError::config(format!("{key}={value}: {err}"))),
            None => Ok(None),
        }
    };

    let base_url = overrides
        .base_url
        .clone()
        .or_else(|| lookup("PROBE_BASE_URL"))
        .or(file_config.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ProbeError::config(format!(
            "base url must be http(s): {base_url}"
        )));
    }

    let software_id = match lookup("PROBE_SOFTWARE_ID") {
        Some(value) => value
            .trim()
            .parse::<i64>()
            .map_err(|err| ProbeError::config(format!("PROBE_SOFTWARE_ID={value}: {err}")))?,
        None => file_config.software_id.unwrap_or(1),
    };
    let channel = overrides
        .channel
        .clone()
        .or_else(|| lookup("PROBE_CHANNEL"))
        .or(file_config.channel)
        .unwrap_or_else(|| DEFAULT_CHANNEL.to_string());
    let timeout_secs = match overrides.timeout_secs {
        Some(value) => value,
        None => env_u64("PROBE_TIMEOUT_SECS")?
            .or(file_config.timeout_secs)
            .unwrap_or(10),
    };
    let short_timeout_secs = match overrides.timeout_secs {
        Some(value) => value,
        None => env_u64("PROBE_SHORT_TIMEOUT_SECS")?
            .or(file_config.short_timeout_secs)
            .unwrap_or(5),
    };
    if timeout_secs == 0 || short_timeout_secs == 0 {
        return Err(ProbeError::config("timeouts must be at least one second"));
    }
    let case_delay_ms = match overrides.delay_ms {
        Some(value) => value,
        None => env_u64("PROBE_CASE_DELAY_MS")?
            .or(file_config.case_delay_ms)
            .unwrap_or(1000),
    };
    let unique_devices = overrides.unique_devices
        || lookup("PROBE_UNIQUE_DEVICES")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .or(file_config.unique_devices)
            .unwrap_or(false);

    let defaults = DeviceInfo::default();
    let file_device = file_config.device.unwrap_or_default();
    let device = DeviceInfo {
        os: file_device.os.unwrap_or(defaults.os),
        model: file_device.model.unwrap_or(defaults.model),
        manufacturer: file_device.manufacturer.unwrap_or(defaults.manufacturer),
        brand: file_device.brand.unwrap_or(defaults.brand),
        sdk: file_device.sdk.unwrap_or(defaults.sdk),
    };

    Ok(ProbeConfig {
        base_url,
        software_id,
        channel,
        timeout: Duration::from_secs(timeout_secs),
        short_timeout: Duration::from_secs(short_timeout_secs),
        case_delay: Duration::from_millis(case_delay_ms),
        unique_devices,
        device,
    })
}
