use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::monitors::thresholds::Threshold;

/// Raw configuration file. Every field is optional; absent values fall back to
/// the documented defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for throttle records, manifests and the log file
    pub state_dir: Option<PathBuf>,

    /// Alert recipient
    pub recipient: Option<String>,

    /// Shell command replacing the `mail` transport
    pub notify_command: Option<String>,

    /// Optional webhook that receives every alert as JSON
    pub webhook_url: Option<String>,

    /// Host name used in alert subjects
    pub hostname: Option<String>,

    pub memory: Option<ThresholdConfig>,
    pub swap: Option<ThresholdConfig>,
    pub cpu: Option<ThresholdConfig>,
    pub disk: Option<ThresholdConfig>,

    pub intervals: ScanIntervals,
    pub alert_intervals: AlertIntervals,
    pub network: NetworkConfig,
    pub servers: ServersConfig,

    pub servers_file: Option<PathBuf>,
    pub services_file: Option<PathBuf>,
    pub dirs_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ThresholdConfig {
    pub warning: Option<u32>,
    pub critical: Option<u32>,
    pub warning_interval: Option<u64>,
    pub critical_interval: Option<u64>,
}

impl ThresholdConfig {
    fn resolve(self, defaults: Threshold) -> Threshold {
        Threshold {
            warning: self.warning.unwrap_or(defaults.warning),
            critical: self.critical.unwrap_or(defaults.critical),
            warning_interval: self.warning_interval.unwrap_or(defaults.warning_interval),
            critical_interval: self.critical_interval.unwrap_or(defaults.critical_interval),
        }
    }
}

/// How often each check may scan, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScanIntervals {
    pub memory: u64,
    pub cpu: u64,
    pub disk: u64,
    pub dirs: u64,
    pub servers: u64,
    pub services: u64,
    pub network: u64,
}

impl Default for ScanIntervals {
    fn default() -> Self {
        Self {
            memory: 60,
            cpu: 60,
            disk: 300,
            dirs: 3600,
            servers: 300,
            services: 60,
            network: 60,
        }
    }
}

/// Cool-downs for the aggregate alerts, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AlertIntervals {
    pub dirs: u64,
    pub servers: u64,
    pub services: u64,
    pub network: u64,
}

impl Default for AlertIntervals {
    fn default() -> Self {
        Self {
            dirs: 3600,
            servers: 3600,
            services: 3600,
            network: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Alert when rx or tx reaches this many KiB/s
    pub threshold_kib: u64,
    /// Seconds between the two counter samples
    pub window_secs: u64,
    /// Interfaces to watch. Empty means every interface except loopback.
    pub interfaces: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            threshold_kib: 10240,
            window_secs: 1,
            interfaces: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServersConfig {
    /// Per-probe timeout
    pub timeout_secs: u64,
    /// Probes in flight at once
    pub concurrency: usize,
}

impl Default for ServersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            concurrency: 16,
        }
    }
}

pub const DEFAULT_CONFIG_PATH: &str = "/etc/hostguard/config.json";
pub const DEFAULT_STATE_DIR: &str = "/var/lib/hostguard";
pub const DEFAULT_RECIPIENT: &str = "root@localhost";

pub fn default_memory_threshold() -> Threshold {
    Threshold::new(75, 90)
}

pub fn default_swap_threshold() -> Threshold {
    Threshold::new(50, 80)
}

pub fn default_cpu_threshold() -> Threshold {
    Threshold::new(75, 90)
}

pub fn default_disk_threshold() -> Threshold {
    Threshold::new(80, 90)
}

/// Rejected configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// critical is below warning for the named resource
    InvertedThreshold {
        resource: &'static str,
        warning: u32,
        critical: u32,
    },
    /// warning threshold is not a percentage
    OutOfRange { resource: &'static str, warning: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvertedThreshold {
                resource,
                warning,
                critical,
            } => write!(
                f,
                "{resource}: critical threshold {critical}% is below warning threshold {warning}%"
            ),
            ConfigError::OutOfRange { resource, warning } => {
                write!(f, "{resource}: warning threshold {warning}% is not within 0..=100")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Immutable configuration shared by every component of one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub state_dir: PathBuf,
    pub recipient: String,
    pub notify_command: Option<String>,
    pub webhook_url: Option<String>,
    pub hostname: String,

    pub memory: Threshold,
    pub swap: Threshold,
    pub cpu: Threshold,
    pub disk: Threshold,

    pub intervals: ScanIntervals,
    pub alert_intervals: AlertIntervals,
    pub network: NetworkConfig,
    pub servers: ServersConfig,

    pub endpoints: Vec<ServerEndpoint>,
    pub services: Vec<ServiceSpec>,
    pub watched_dirs: Vec<PathBuf>,
}

impl Config {
    /// Apply defaults, validate, and load the list files. Relative list paths
    /// and the default list locations are taken from `config_dir`.
    pub fn resolve(self, config_dir: &Path) -> anyhow::Result<ResolvedConfig> {
        let memory = self.memory.unwrap_or_default().resolve(default_memory_threshold());
        let swap = self.swap.unwrap_or_default().resolve(default_swap_threshold());
        let cpu = self.cpu.unwrap_or_default().resolve(default_cpu_threshold());
        let disk = self.disk.unwrap_or_default().resolve(default_disk_threshold());

        for (resource, threshold) in [("memory", memory), ("swap", swap), ("cpu", cpu), ("disk", disk)] {
            validate_threshold(resource, &threshold)?;
        }

        let list_path = |configured: Option<PathBuf>, default: &str| {
            let path = configured.unwrap_or_else(|| PathBuf::from(default));
            if path.is_relative() {
                config_dir.join(path)
            } else {
                path
            }
        };

        let endpoints = parse_endpoints(&read_list(&list_path(self.servers_file, "servers.list"))?);
        let services = parse_services(&read_list(&list_path(self.services_file, "services.list"))?);
        let watched_dirs = parse_dirs(&read_list(&list_path(self.dirs_file, "dirs.list"))?);

        debug!(
            "resolved {} endpoints, {} services, {} watched roots",
            endpoints.len(),
            services.len(),
            watched_dirs.len()
        );

        let mut network = self.network;
        network.window_secs = network.window_secs.max(1);
        let mut servers = self.servers;
        servers.concurrency = servers.concurrency.max(1);

        Ok(ResolvedConfig {
            state_dir: self.state_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR)),
            recipient: self.recipient.unwrap_or_else(|| DEFAULT_RECIPIENT.to_string()),
            notify_command: self.notify_command.filter(|c| !c.trim().is_empty()),
            webhook_url: self.webhook_url.filter(|u| !u.trim().is_empty()),
            hostname: self
                .hostname
                .or_else(sysinfo::System::host_name)
                .unwrap_or_else(|| "localhost".to_string()),
            memory,
            swap,
            cpu,
            disk,
            intervals: self.intervals,
            alert_intervals: self.alert_intervals,
            network,
            servers,
            endpoints,
            services,
            watched_dirs,
        })
    }
}

pub fn validate_threshold(resource: &'static str, threshold: &Threshold) -> Result<(), ConfigError> {
    if threshold.warning > 100 {
        return Err(ConfigError::OutOfRange {
            resource,
            warning: threshold.warning,
        });
    }
    if threshold.critical < threshold.warning {
        return Err(ConfigError::InvertedThreshold {
            resource,
            warning: threshold.warning,
            critical: threshold.critical,
        });
    }
    Ok(())
}

/// Load the JSON configuration file. A missing file yields the defaults.
pub fn read_config_file(path: &Path) -> anyhow::Result<Config> {
    let file_content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("no config file at {}", path.display());
            return Ok(Config::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

fn read_list(path: &Path) -> anyhow::Result<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            trace!("no list file at {}", path.display());
            Ok(String::new())
        }
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Non-blank, non-comment lines, trimmed
fn entries(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// `host` is probed with ICMP echo, `host:port` with a TCP connect
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: Option<u16>,
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) if self.host.contains(':') => write!(f, "[{}]:{port}", self.host),
            Some(port) => write!(f, "{}:{port}", self.host),
            None => write!(f, "{}", self.host),
        }
    }
}

impl ServerEndpoint {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.contains(char::is_whitespace) {
            return None;
        }

        // [v6]:port or [v6]
        if let Some(rest) = line.strip_prefix('[') {
            let (host, tail) = rest.split_once(']')?;
            let port = match tail.strip_prefix(':') {
                Some(port) => Some(port.parse().ok()?),
                None if tail.is_empty() => None,
                None => return None,
            };
            return (!host.is_empty()).then(|| Self {
                host: host.to_string(),
                port,
            });
        }

        match line.matches(':').count() {
            0 => Some(Self {
                host: line.to_string(),
                port: None,
            }),
            1 => {
                let (host, port) = line.split_once(':')?;
                if host.is_empty() {
                    return None;
                }
                Some(Self {
                    host: host.to_string(),
                    port: Some(port.parse().ok()?),
                })
            }
            // bare IPv6 address
            _ => Some(Self {
                host: line.to_string(),
                port: None,
            }),
        }
    }
}

pub fn parse_endpoints(text: &str) -> Vec<ServerEndpoint> {
    entries(text)
        .filter_map(|line| {
            let endpoint = ServerEndpoint::parse(line);
            if endpoint.is_none() {
                trace!("skipping malformed endpoint line {line:?}");
            }
            endpoint
        })
        .collect()
}

/// What to do when a service is found down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartDirective {
    /// Nothing
    None,
    /// Ask the detected service manager to restart the service by name
    Default,
    /// Run this shell command
    Command(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub pattern: String,
    pub name: String,
    pub restart: RestartDirective,
}

impl ServiceSpec {
    /// `process_pattern : display_name : restart_directive`. The directive may
    /// itself contain colons.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.splitn(3, ':').map(str::trim);
        let pattern = fields.next().filter(|p| !p.is_empty())?;
        let name = fields.next()?;
        let directive = fields.next().unwrap_or_default();

        let restart = match directive {
            "" => RestartDirective::None,
            "default" => RestartDirective::Default,
            command => RestartDirective::Command(command.to_string()),
        };

        let name = if name.is_empty() { pattern } else { name };

        Some(Self {
            pattern: pattern.to_string(),
            name: name.to_string(),
            restart,
        })
    }
}

pub fn parse_services(text: &str) -> Vec<ServiceSpec> {
    entries(text).filter_map(ServiceSpec::parse).collect()
}

pub fn parse_dirs(text: &str) -> Vec<PathBuf> {
    entries(text).map(PathBuf::from).collect()
}
