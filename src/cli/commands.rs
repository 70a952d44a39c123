//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "netcheck",
    version,
    about = "Network connectivity specs for virtual machine instances on KubeVirt",
    long_about = None,
)]
pub struct Cli {
    /// Kubernetes context to use
    #[arg(long, global = true, env = "NETCHECK_CONTEXT")]
    pub context: Option<String>,

    /// Base name of the test namespace
    #[arg(short = 'n', long, global = true, env = "NETCHECK_NAMESPACE")]
    pub namespace: Option<String>,

    /// Output format
    #[arg(short = 'o', long, global = true, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the connectivity specs against the current cluster
    Run(RunArgs),

    /// List registered specs
    #[command(alias = "ls")]
    List(FilterArgs),

    /// Show one spec, resolved by fuzzy name
    Describe(DescribeArgs),

    /// List objects the specs create in the test namespace
    Get(GetArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Clone, Debug, Default)]
pub struct FilterArgs {
    /// Only run specs whose full text contains this (repeatable)
    #[arg(long)]
    pub focus: Vec<String>,

    /// Skip specs whose full text contains this (repeatable)
    #[arg(long)]
    pub skip: Vec<String>,

    /// Only run specs carrying this bracketed tag, e.g. Conformance (repeatable)
    #[arg(short = 'l', long)]
    pub label: Vec<String>,
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Directory receiving reports and cluster dumps
    #[arg(long, env = "ARTIFACTS")]
    pub artifacts: Option<PathBuf>,

    /// Junit report path (ignored in parallel runs)
    #[arg(long)]
    pub junit_output: Option<PathBuf>,

    /// 1-based index of this process among parallel workers
    #[arg(long, default_value_t = 1)]
    pub parallel_process: usize,

    /// Number of parallel workers
    #[arg(long, default_value_t = 1)]
    pub parallel_total: usize,

    /// Also write a Polarion import file
    #[arg(long)]
    pub polarion_execution: bool,

    /// Polarion project id
    #[arg(long, default_value = "")]
    pub polarion_project_id: String,

    /// Polarion report path
    #[arg(long)]
    pub polarion_report_file: Option<PathBuf>,

    /// Stop after the first failing spec
    #[arg(long)]
    pub fail_fast: bool,

    /// Per-spec timeout in seconds
    #[arg(long)]
    pub spec_timeout: Option<u64>,

    /// Leave the test namespace in place after the run
    #[arg(long)]
    pub keep_namespace: bool,

    /// Registry prefix for utility and container disk images
    #[arg(long, env = "KUBEVIRT_UTILITY_REPO_PREFIX")]
    pub utility_repo_prefix: Option<String>,

    /// Tag for utility and container disk images
    #[arg(long, env = "KUBEVIRT_UTILITY_TAG")]
    pub utility_tag: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct DescribeArgs {
    /// Spec text or a fragment of it (supports fuzzy matching)
    pub pattern: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GetKind {
    #[value(alias = "vmi")]
    Vmis,
    #[value(alias = "svc")]
    Services,
    Jobs,
}

#[derive(Args, Clone, Debug)]
pub struct GetArgs {
    /// Kind of object to list
    #[arg(value_enum)]
    pub kind: GetKind,

    /// Filter by labels (key=value)
    #[arg(short = 's', long)]
    pub selector: Option<String>,

    /// Parallel process whose namespace to inspect
    #[arg(long, default_value_t = 1)]
    pub parallel_process: usize,

    /// Number of parallel workers of the run being inspected
    #[arg(long, default_value_t = 1)]
    pub parallel_total: usize,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
