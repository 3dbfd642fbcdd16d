use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Args};
use fuelsync_core::{normalize_server_url, SyncMode, SyncTimings, DEFAULT_SERVER_URL};
use fuelsync_engine::{BackendSettings, EngineConfig, ReconnectPolicy};
use fuelsync_logging::sync_warn;

use super::persistence;
use super::ui::render::RenderOptions;

const LOG_FILENAME: &str = "fuelsync.log";

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Server address, e.g. http://192.168.1.20:5000. Not saved; see `set-server`.
    #[arg(short, long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// How task progress is followed: `stream` or `polling`.
    #[arg(short, long, global = true, default_value = "stream")]
    pub mode: SyncMode,

    /// Where the saved server address and the diagnostic log live.
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    pub state_dir: PathBuf,

    /// Random spread added to the 2 s reconnect delay.
    #[arg(long, global = true, value_name = "MS", default_value_t = 0)]
    pub reconnect_jitter_ms: u64,

    /// Stream mode gives up on a completion marker after this long.
    #[arg(long, global = true, value_name = "SECS", default_value_t = 600)]
    pub deadline_secs: u64,

    /// Mirror diagnostics to stderr; repeat for more detail.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub mode: SyncMode,
    pub state_dir: PathBuf,
    pub output_dir: PathBuf,
    pub log_file: PathBuf,
    pub timings: SyncTimings,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub render: RenderOptions,
}

impl ClientConfig {
    pub fn load(args: &GlobalArgs) -> Result<Self> {
        let persisted = persistence::load_server_url(&args.state_dir);
        Self::from_parts(args, persisted)
    }

    fn from_parts(args: &GlobalArgs, persisted: Option<String>) -> Result<Self> {
        let server_url = resolve_server_url(args.server.as_deref(), persisted)?;
        let defaults = BackendSettings::default();

        let mut reconnect = ReconnectPolicy::default();
        reconnect.jitter = Duration::from_millis(args.reconnect_jitter_ms);
        reconnect.max_delay = reconnect.delay + reconnect.jitter;

        let timings = SyncTimings {
            stream_deadline: Duration::from_secs(args.deadline_secs),
            ..SyncTimings::default()
        };

        Ok(Self {
            server_url,
            mode: args.mode,
            state_dir: args.state_dir.clone(),
            output_dir: PathBuf::from("."),
            log_file: args.state_dir.join(LOG_FILENAME),
            timings,
            reconnect,
            connect_timeout: defaults.connect_timeout,
            request_timeout: defaults.request_timeout,
            render: RenderOptions::default(),
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            backend: BackendSettings {
                base_url: self.server_url.clone(),
                connect_timeout: self.connect_timeout,
                request_timeout: self.request_timeout,
            },
            reconnect: self.reconnect,
        }
    }
}

/// Flag beats the saved address, which beats the built-in default.
/// A bad flag is an error; a bad saved value only falls back.
pub fn resolve_server_url(flag: Option<&str>, persisted: Option<String>) -> Result<String> {
    if let Some(raw) = flag {
        return normalize_server_url(raw).map_err(|err| anyhow!("invalid --server: {err}"));
    }
    if let Some(saved) = persisted {
        match normalize_server_url(&saved) {
            Ok(url) => return Ok(url),
            Err(err) => sync_warn!("Ignoring saved server address: {}", err),
        }
    }
    Ok(DEFAULT_SERVER_URL.to_string())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        global: GlobalArgs,
    }

    fn args(extra: &[&str]) -> GlobalArgs {
        let mut argv = vec!["fuelsync"];
        argv.extend_from_slice(extra);
        Harness::parse_from(argv).global
    }

    #[test]
    fn flag_overrides_saved_address() {
        let url = resolve_server_url(
            Some("http://10.0.0.5:5000/"),
            Some("http://192.168.1.9:5000".into()),
        )
        .unwrap();
        assert_eq!(url, "http://10.0.0.5:5000");
    }

    #[test]
    fn saved_address_used_without_flag() {
        let url = resolve_server_url(None, Some("http://192.168.1.9:5000".into())).unwrap();
        assert_eq!(url, "http://192.168.1.9:5000");
    }

    #[test]
    fn unusable_saved_address_falls_back_to_default() {
        let url = resolve_server_url(None, Some("ftp://nope".into())).unwrap();
        assert_eq!(url, DEFAULT_SERVER_URL);
        assert_eq!(resolve_server_url(None, None).unwrap(), DEFAULT_SERVER_URL);
    }

    #[test]
    fn bad_flag_is_an_error() {
        assert!(resolve_server_url(Some("not a url"), None).is_err());
    }

    #[test]
    fn defaults_match_the_documented_timings() {
        let config = ClientConfig::from_parts(&args(&[]), None).unwrap();
        assert_eq!(config.mode, SyncMode::Stream);
        assert_eq!(config.timings.midpoint_preview, Duration::from_secs(5));
        assert_eq!(config.timings.final_reset, Duration::from_secs(10));
        assert_eq!(config.reconnect.delay, Duration::from_secs(2));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(2));
        assert_eq!(config.log_file, PathBuf::from("./fuelsync.log"));
    }

    #[test]
    fn flags_shape_the_config() {
        let config = ClientConfig::from_parts(
            &args(&[
                "--mode",
                "polling",
                "--reconnect-jitter-ms",
                "500",
                "--deadline-secs",
                "30",
                "--state-dir",
                "/tmp/fs",
            ]),
            None,
        )
        .unwrap();
        assert_eq!(config.mode, SyncMode::Polling);
        assert_eq!(config.reconnect.max_delay, Duration::from_millis(2500));
        assert_eq!(config.timings.stream_deadline, Duration::from_secs(30));
        assert_eq!(config.log_file, PathBuf::from("/tmp/fs/fuelsync.log"));
        assert_eq!(config.engine_config().backend.base_url, DEFAULT_SERVER_URL);
    }
}
