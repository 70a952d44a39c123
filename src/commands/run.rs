//! Run command implementation

use crate::cli::{OutputFormat, RunArgs};
use crate::client::create_client;
use crate::config::{load_config, max_fails_from_env, FileConfig, Parallelism, PolarionConfig, SuiteConfig};
use crate::error::Result;
use crate::output::{format_failures, format_json, format_run_summary, format_yaml};
use crate::reporter::{CapturedOutputEnricher, JunitReporter, KubernetesReporter, PolarionReporter};
use crate::suite::{functional_suite, NamespaceSetup, Runner, SpecFilter, SuiteReport};
use std::time::Duration;
use tracing::{info, warn};

/// Resolve the suite configuration: flags and environment over the config file over defaults
pub fn suite_config(args: &RunArgs, namespace: Option<&str>, file: &FileConfig) -> Result<SuiteConfig> {
    let mut config = SuiteConfig::default().with_file_defaults(file);

    if let Some(dir) = &args.artifacts {
        config.artifacts_dir = dir.clone();
    }
    if let Some(ns) = namespace {
        config.namespace_base = ns.to_string();
    }
    if let Some(prefix) = &args.utility_repo_prefix {
        config.utility_repo_prefix = prefix.clone();
    }
    if let Some(tag) = &args.utility_tag {
        config.utility_tag = tag.clone();
    }
    if let Some(secs) = args.spec_timeout {
        config.spec_timeout = Duration::from_secs(secs);
    }

    config.junit_output = args.junit_output.clone();
    config.parallel = Parallelism::new(args.parallel_process, args.parallel_total)?;
    if args.polarion_execution {
        config.polarion = Some(PolarionConfig {
            project_id: args.polarion_project_id.clone(),
            report_file: args.polarion_report_file.clone(),
        });
    }
    config.max_fails = max_fails_from_env();
    config.fail_fast = args.fail_fast;
    config.keep_namespace = args.keep_namespace;

    Ok(config.normalize())
}

/// Spec selection from the shared filter flags
pub fn spec_filter(args: &crate::cli::FilterArgs) -> SpecFilter {
    SpecFilter {
        focus: args.focus.clone(),
        skip: args.skip.clone(),
        labels: args.label.clone(),
    }
}

/// Wire reporters and hooks around the functional suite and run it
pub async fn run_suite(
    context: Option<&str>,
    namespace: Option<&str>,
    args: &RunArgs,
    output: OutputFormat,
) -> Result<SuiteReport> {
    let file = load_config().unwrap_or_else(|e| {
        warn!("ignoring config file: {}", e);
        FileConfig::default()
    });
    let config = suite_config(args, namespace, &file)?;
    let client = create_client(context).await?;
    let test_namespace = config.test_namespace();

    let k8s_reporter = KubernetesReporter::new(
        config.k8s_reporter_dir(),
        config.max_fails,
        Some(client.clone()),
        &test_namespace,
    );
    k8s_reporter.cleanup()?;

    let junit_path = config.junit_output_path();
    info!(
        "artifacts in {}, junit report at {}",
        config.artifacts_dir.display(),
        junit_path.display()
    );

    let mut runner = Runner::new(config.clone(), Some(client.clone()))
        .with_reporter(CapturedOutputEnricher::new(JunitReporter::new(junit_path)))
        .with_reporter(k8s_reporter)
        .with_hooks(NamespaceSetup::new(client, &test_namespace, config.keep_namespace));
    if let (Some(polarion), Some(path)) = (&config.polarion, config.polarion_output_path()) {
        runner = runner.with_reporter(PolarionReporter::new(path, &polarion.project_id));
    }

    let suite = functional_suite();
    let report = runner.run(&suite, &spec_filter(&args.filter)).await;

    match output {
        OutputFormat::Table => {
            println!("{}", format_run_summary(&report));
            for failure in format_failures(&report) {
                eprintln!("\n{}", failure);
            }
        }
        OutputFormat::Json => println!("{}", format_json(&report)?),
        OutputFormat::Yaml => println!("{}", format_yaml(&report)?),
    }
    Ok(report)
}
