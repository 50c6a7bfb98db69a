use std::time::Duration;

/// How the worker waits for a submitted workflow to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Poll `/history/{prompt_id}` at a fixed interval.
    Polling,
    /// Watch the `/ws` event stream.
    Streaming,
}

impl CompletionMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polling" => Some(CompletionMode::Polling),
            "streaming" => Some(CompletionMode::Streaming),
            _ => None,
        }
    }
}

/// Worker configuration loaded from environment variables.
///
/// All fields have defaults matching a stock ComfyUI install on the same
/// machine.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Backend `host:port`, shared by HTTP and WebSocket (default: `127.0.0.1:8188`).
    pub comfy_host: String,
    pub polling_interval: Duration,
    pub polling_max_retries: u32,
    pub completion: CompletionMode,
    /// Output node holding the artifact list (default: `40`).
    pub output_node: String,
    /// Media kind under the output node (default: `gifs`).
    pub output_kind: String,
    /// Node whose binary WebSocket frames carry the artifact, if any.
    pub stream_node: Option<String>,
    /// Endpoint probed for readiness at startup (default: `models`).
    pub probe_path: String,
    /// Mark every result so the runtime discards the worker afterwards.
    pub refresh_worker: bool,
    /// Model repository host used by `v1/sync`.
    pub hf_endpoint: String,
    /// Local intake bind address (default: `0.0.0.0`).
    pub host: String,
    /// Local intake bind port (default: `8000`).
    pub port: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            comfy_host: "127.0.0.1:8188".into(),
            polling_interval: Duration::from_millis(250),
            polling_max_retries: 5000,
            completion: CompletionMode::Polling,
            output_node: "40".into(),
            output_kind: "gifs".into(),
            stream_node: None,
            probe_path: "models".into(),
            refresh_worker: false,
            hf_endpoint: "https://huggingface.co".into(),
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                  |
    /// |-----------------------------|--------------------------|
    /// | `COMFY_HOST`                | `127.0.0.1:8188`         |
    /// | `COMFY_POLLING_INTERVAL_MS` | `250`                    |
    /// | `COMFY_POLLING_MAX_RETRIES` | `5000`                   |
    /// | `COMPLETION_STRATEGY`       | `polling`                |
    /// | `COMFY_OUTPUT_NODE`         | `40`                     |
    /// | `COMFY_OUTPUT_KIND`         | `gifs`                   |
    /// | `COMFY_STREAM_NODE`         | unset                    |
    /// | `COMFY_PROBE_PATH`          | `models`                 |
    /// | `REFRESH_WORKER`            | `false`                  |
    /// | `HF_ENDPOINT`               | `https://huggingface.co` |
    /// | `HOST`                      | `0.0.0.0`                |
    /// | `PORT`                      | `8000`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |var: &str, default: String| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let polling_interval_ms: u64 = parse_var(
            &lookup,
            "COMFY_POLLING_INTERVAL_MS",
            defaults.polling_interval.as_millis() as u64,
        )?;
        let polling_max_retries = parse_var(
            &lookup,
            "COMFY_POLLING_MAX_RETRIES",
            defaults.polling_max_retries,
        )?;
        let port = parse_var(&lookup, "PORT", defaults.port)?;

        let completion = match lookup("COMPLETION_STRATEGY") {
            None => defaults.completion,
            Some(value) => CompletionMode::parse(&value).ok_or_else(|| ConfigError::Invalid {
                var: "COMPLETION_STRATEGY",
                value,
                reason: "expected `polling` or `streaming`".into(),
            })?,
        };

        let refresh_worker = lookup("REFRESH_WORKER")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(defaults.refresh_worker);

        let stream_node = lookup("COMFY_STREAM_NODE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Self {
            comfy_host: string("COMFY_HOST", defaults.comfy_host),
            polling_interval: Duration::from_millis(polling_interval_ms),
            polling_max_retries,
            completion,
            output_node: string("COMFY_OUTPUT_NODE", defaults.output_node),
            output_kind: string("COMFY_OUTPUT_KIND", defaults.output_kind),
            stream_node,
            probe_path: string("COMFY_PROBE_PATH", defaults.probe_path),
            refresh_worker,
            hf_endpoint: string("HF_ENDPOINT", defaults.hf_endpoint)
                .trim_end_matches('/')
                .to_string(),
            host: string("HOST", defaults.host),
            port,
        })
    }

    /// HTTP base URL of the backend.
    pub fn backend_url(&self) -> String {
        format!("http://{}", self.comfy_host)
    }

    /// WebSocket base URL of the backend.
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.comfy_host)
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}
