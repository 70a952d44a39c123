//! List and describe commands over the registered specs

use super::run::spec_filter;
use crate::cli::{DescribeArgs, FilterArgs, OutputFormat};
use crate::error::Result;
use crate::fuzzy::resolve_spec;
use crate::output::{format_json, format_spec_detail, format_spec_list, format_yaml, SpecSummary};
use crate::suite::Suite;

/// Summaries of the specs passing the filter
pub fn spec_summaries(suite: &Suite, args: &FilterArgs, parallel_total: usize) -> Vec<SpecSummary> {
    suite
        .select(&spec_filter(args))
        .into_iter()
        .map(|(index, spec)| SpecSummary::new(index, spec, parallel_total))
        .collect()
}

pub fn list_specs(suite: &Suite, args: &FilterArgs, output: OutputFormat) -> Result<()> {
    let specs = spec_summaries(suite, args, 1);
    let rendered = match output {
        OutputFormat::Table => format_spec_list(&specs),
        OutputFormat::Json => format_json(&specs)?,
        OutputFormat::Yaml => format_yaml(&specs)?,
    };
    println!("{}", rendered);
    Ok(())
}

pub fn describe_spec(suite: &Suite, args: &DescribeArgs, output: OutputFormat) -> Result<()> {
    let index = resolve_spec(&args.pattern, suite)?;
    let spec = &suite.specs()[index];
    let summary = SpecSummary::new(index, spec, 1);
    let rendered = match output {
        OutputFormat::Table => format_spec_detail(&summary),
        OutputFormat::Json => format_json(&summary)?,
        OutputFormat::Yaml => format_yaml(&summary)?,
    };
    println!("{}", rendered);
    Ok(())
}
