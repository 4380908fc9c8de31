//! Server configuration from the environment

use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_WORKSPACE: &str = "processed";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Root directory for per-job workspaces
    pub workspace_root: PathBuf,
    /// Jobs allowed to run at once; further requests wait for a slot
    pub max_concurrent_jobs: usize,
    pub max_upload_bytes: usize,
    pub allowed_origin: String,
    /// Keep each job's artifact for `GET /jobs/:id/artifact`
    pub retain_artifacts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            workspace_root: PathBuf::from(DEFAULT_WORKSPACE),
            max_concurrent_jobs: default_concurrency(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
            retain_artifacts: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or malformed values keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parse_or(&lookup, "PORT", defaults.port),
            workspace_root: lookup("PDFFORGE_WORKSPACE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace_root),
            max_concurrent_jobs: parse_or(
                &lookup,
                "PDFFORGE_MAX_CONCURRENT_JOBS",
                defaults.max_concurrent_jobs,
            )
            .max(1),
            max_upload_bytes: parse_or(
                &lookup,
                "PDFFORGE_MAX_UPLOAD_BYTES",
                defaults.max_upload_bytes,
            ),
            allowed_origin: lookup("PDFFORGE_ALLOWED_ORIGIN")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.allowed_origin),
            retain_artifacts: parse_or(
                &lookup,
                "PDFFORGE_RETAIN_ARTIFACTS",
                defaults.retain_artifacts,
            ),
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Debug>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring malformed {}={:?}, using {:?}", key, raw, default);
                default
            }
        },
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
