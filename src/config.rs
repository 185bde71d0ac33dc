use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration, loaded from a TOML file. Every field has a
/// literal default matching spec.md §6's tunables table, so a config
/// file that omits a section (or is entirely absent) still yields a
/// usable configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub rpc: RpcConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
    pub heartbeat: HeartbeatConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RpcConfig {
    pub url: String,
    pub http_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        RpcConfig {
            url: "https://cloudflare-eth.com".to_string(),
            http_timeout_secs: 10,
        }
    }
}

impl RpcConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub tick_interval_secs: u64,
    pub retry_delay_secs: u64,
    pub max_retries: u32,
    pub fetch_concurrency: usize,
    pub retry_concurrency: usize,
    pub filter_concurrency: usize,
    pub queue_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            tick_interval_secs: 10,
            retry_delay_secs: 2,
            max_retries: 3,
            fetch_concurrency: 20,
            retry_concurrency: 10,
            filter_concurrency: 20,
            queue_buffer: 100,
        }
    }
}

impl PipelineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { port: 8080 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub interval_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        HeartbeatConfig { interval_secs: 300 }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path, "config file not found, using defaults");
                return Ok(Config::default());
            }
            Err(e) => return Err(eyre::eyre!("failed to read config file '{}': {}", path, e)),
        };

        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.pipeline.fetch_concurrency == 0
            || self.pipeline.retry_concurrency == 0
            || self.pipeline.filter_concurrency == 0
        {
            return Err(eyre::eyre!("concurrency settings must be non-zero"));
        }
        if self.pipeline.queue_buffer == 0 {
            return Err(eyre::eyre!("queue_buffer must be non-zero"));
        }
        if self.pipeline.max_retries == 0 {
            return Err(eyre::eyre!("max_retries must be non-zero"));
        }
        Ok(())
    }
}
