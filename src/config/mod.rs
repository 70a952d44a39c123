//! Suite configuration for netcheck
//!
//! Values come from three layers: command line flags (with environment
//! fallbacks declared on the clap arguments), the optional
//! `~/.netcheck/config.toml`, and built-in defaults. Report output paths are
//! derived here so that parallel workers never write to the same file.

use crate::error::{NcError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Environment variable bounding how many failures the diagnostic collector captures
pub const MAX_FAILS_ENV: &str = "REPORTER_MAX_FAILS";

/// Failure captures when `REPORTER_MAX_FAILS` is unset or invalid
pub const DEFAULT_MAX_FAILS: usize = 10;

pub const DEFAULT_ARTIFACTS_DIR: &str = "_out/artifacts";
pub const DEFAULT_NAMESPACE: &str = "kubevirt-test-default";
pub const DEFAULT_UTILITY_REPO_PREFIX: &str = "quay.io/kubevirt";
pub const DEFAULT_UTILITY_TAG: &str = "latest";
pub const DEFAULT_SPEC_TIMEOUT_SECS: u64 = 900;

/// Optional configuration stored in ~/.netcheck/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Directory receiving junit and diagnostic artifacts
    #[serde(default)]
    pub artifacts_dir: Option<PathBuf>,

    /// Base name of the test namespace
    #[serde(default)]
    pub namespace: Option<String>,

    /// Registry prefix for utility and container disk images
    #[serde(default)]
    pub utility_repo_prefix: Option<String>,

    /// Tag for utility and container disk images
    #[serde(default)]
    pub utility_tag: Option<String>,

    /// Per-spec timeout in seconds
    #[serde(default)]
    pub spec_timeout: Option<u64>,
}

/// Which shard of the suite this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parallelism {
    /// 1-based index of this process
    pub process: usize,
    /// Number of cooperating processes
    pub total: usize,
}

impl Default for Parallelism {
    fn default() -> Self {
        Self {
            process: 1,
            total: 1,
        }
    }
}

impl Parallelism {
    /// Validate and build a parallelism descriptor
    pub fn new(process: usize, total: usize) -> Result<Self> {
        if total == 0 || process == 0 || process > total {
            return Err(NcError::InvalidArgument(format!(
                "parallel process {} out of range 1..={}",
                process, total
            )));
        }
        Ok(Self { process, total })
    }

    pub fn is_parallel(&self) -> bool {
        self.total > 1
    }

    /// Whether the spec at `index` (declaration order) belongs to this process
    pub fn owns(&self, index: usize) -> bool {
        index % self.total + 1 == self.process
    }
}

/// Polarion report settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolarionConfig {
    pub project_id: String,
    pub report_file: Option<PathBuf>,
}

/// Fully resolved configuration for one suite run
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub artifacts_dir: PathBuf,
    /// Explicit junit output path; replaced by a partial file in parallel runs
    pub junit_output: Option<PathBuf>,
    pub polarion: Option<PolarionConfig>,
    pub parallel: Parallelism,
    pub namespace_base: String,
    pub utility_repo_prefix: String,
    pub utility_tag: String,
    pub max_fails: usize,
    pub spec_timeout: Duration,
    pub fail_fast: bool,
    pub keep_namespace: bool,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            junit_output: None,
            polarion: None,
            parallel: Parallelism::default(),
            namespace_base: DEFAULT_NAMESPACE.to_string(),
            utility_repo_prefix: DEFAULT_UTILITY_REPO_PREFIX.to_string(),
            utility_tag: DEFAULT_UTILITY_TAG.to_string(),
            max_fails: DEFAULT_MAX_FAILS,
            spec_timeout: Duration::from_secs(DEFAULT_SPEC_TIMEOUT_SECS),
            fail_fast: false,
            keep_namespace: false,
        }
    }
}

impl SuiteConfig {
    /// Apply values from the config file underneath explicit flags
    pub fn with_file_defaults(mut self, file: &FileConfig) -> Self {
        if let Some(dir) = &file.artifacts_dir {
            self.artifacts_dir = dir.clone();
        }
        if let Some(ns) = &file.namespace {
            self.namespace_base = ns.clone();
        }
        if let Some(prefix) = &file.utility_repo_prefix {
            self.utility_repo_prefix = prefix.clone();
        }
        if let Some(tag) = &file.utility_tag {
            self.utility_tag = tag.clone();
        }
        if let Some(secs) = file.spec_timeout {
            self.spec_timeout = Duration::from_secs(secs);
        }
        self
    }

    /// Normalize flag values that may arrive empty or with stray separators
    pub fn normalize(mut self) -> Self {
        if self.artifacts_dir.as_os_str().is_empty() {
            self.artifacts_dir = PathBuf::from(DEFAULT_ARTIFACTS_DIR);
        }
        if self.junit_output.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            self.junit_output = None;
        }
        self.utility_repo_prefix = self.utility_repo_prefix.trim_end_matches('/').to_string();
        if self.utility_repo_prefix.is_empty() {
            self.utility_repo_prefix = DEFAULT_UTILITY_REPO_PREFIX.to_string();
        }
        if self.utility_tag.trim().is_empty() {
            self.utility_tag = DEFAULT_UTILITY_TAG.to_string();
        }
        self.namespace_base = self.namespace_base.trim().to_string();
        if self.namespace_base.is_empty() {
            self.namespace_base = DEFAULT_NAMESPACE.to_string();
        }
        self
    }

    /// Namespace used by this process
    pub fn test_namespace(&self) -> String {
        if self.parallel.is_parallel() {
            format!("{}-{}", self.namespace_base, self.parallel.process)
        } else {
            self.namespace_base.clone()
        }
    }

    /// Directory receiving the diagnostic collector dumps
    pub fn k8s_reporter_dir(&self) -> PathBuf {
        let dir = self.artifacts_dir.join("k8s-reporter");
        if self.parallel.is_parallel() {
            dir.join(self.parallel.process.to_string())
        } else {
            dir
        }
    }

    /// Where the junit report is written
    pub fn junit_output_path(&self) -> PathBuf {
        if self.parallel.is_parallel() {
            return self
                .artifacts_dir
                .join(format!("partial.junit.functest.{}.xml", self.parallel.process));
        }
        self.junit_output
            .clone()
            .unwrap_or_else(|| self.artifacts_dir.join("junit.functest.xml"))
    }

    /// Where the polarion report is written, if polarion reporting is enabled
    pub fn polarion_output_path(&self) -> Option<PathBuf> {
        let polarion = self.polarion.as_ref()?;
        if self.parallel.is_parallel() {
            return Some(
                self.artifacts_dir
                    .join(format!("partial.polarion.functest.{}.xml", self.parallel.process)),
            );
        }
        Some(
            polarion
                .report_file
                .clone()
                .unwrap_or_else(|| self.artifacts_dir.join("polarion.xml")),
        )
    }

    /// Image reference for a utility container such as the TCP probe
    pub fn utility_image(&self, name: &str) -> String {
        format!("{}/{}:{}", self.utility_repo_prefix, name, self.utility_tag)
    }

    /// Image reference for a container disk
    pub fn container_disk_image(&self, name: &str) -> String {
        self.utility_image(name)
    }
}

/// Parse the raw `REPORTER_MAX_FAILS` value.
///
/// Surrounding whitespace is ignored; negative values fall back to the default.
pub fn parse_max_fails(raw: Option<&str>) -> usize {
    match raw {
        None => DEFAULT_MAX_FAILS,
        Some(s) if s.is_empty() => DEFAULT_MAX_FAILS,
        Some(s) => match s.trim().parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                warn!(
                    "Invalid {} variable {:?}, defaulting to {}",
                    MAX_FAILS_ENV, s, DEFAULT_MAX_FAILS
                );
                DEFAULT_MAX_FAILS
            }
        },
    }
}

/// Read `REPORTER_MAX_FAILS` from the environment
pub fn max_fails_from_env() -> usize {
    let raw = std::env::var(MAX_FAILS_ENV).ok();
    parse_max_fails(raw.as_deref())
}

/// Get the netcheck config directory (~/.netcheck)
pub fn config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join(".netcheck"))
        .ok_or_else(|| NcError::Config("Could not determine home directory".to_string()))
}

/// Load file config from ~/.netcheck/config.toml
pub fn load_config() -> Result<FileConfig> {
    let path = config_dir()?.join("config.toml");
    load_config_from(&path)
}

/// Load file config from an explicit path; a missing file yields defaults
pub fn load_config_from(path: &Path) -> Result<FileConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| NcError::Config(e.to_string()))
    } else {
        Ok(FileConfig::default())
    }
}
