//! Get command: list the objects specs create in the test namespace

use crate::cli::{GetArgs, GetKind, OutputFormat};
use crate::client::create_client;
use crate::config::{load_config, Parallelism, SuiteConfig};
use crate::error::Result;
use crate::output::{format_json, format_table, format_yaml};
use crate::resources::{list_resources, Listable, Tabular, VirtualMachineInstance};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Service;

/// Namespace of the given parallel process
pub fn inspected_namespace(namespace: Option<&str>, args: &GetArgs) -> Result<String> {
    let file = load_config().unwrap_or_default();
    let mut config = SuiteConfig::default().with_file_defaults(&file);
    if let Some(ns) = namespace {
        config.namespace_base = ns.to_string();
    }
    config.parallel = Parallelism::new(args.parallel_process, args.parallel_total)?;
    Ok(config.normalize().test_namespace())
}

async fn list_kind<T>(
    context: Option<&str>,
    namespace: &str,
    selector: Option<&str>,
    output: OutputFormat,
) -> Result<()>
where
    T: Listable + Tabular,
{
    let client = create_client(context).await?;
    let api = T::api(client, namespace);
    let resources = list_resources(&api, selector).await?;

    let output_str = match output {
        OutputFormat::Table => format_table(&resources),
        OutputFormat::Json => format_json(&resources)?,
        OutputFormat::Yaml => format_yaml(&resources)?,
    };
    println!("{}", output_str);
    Ok(())
}

pub async fn get_objects(
    context: Option<&str>,
    namespace: Option<&str>,
    args: &GetArgs,
    output: OutputFormat,
) -> Result<()> {
    let ns = inspected_namespace(namespace, args)?;
    let selector = args.selector.as_deref();
    match args.kind {
        GetKind::Vmis => list_kind::<VirtualMachineInstance>(context, &ns, selector, output).await,
        GetKind::Services => list_kind::<Service>(context, &ns, selector, output).await,
        GetKind::Jobs => list_kind::<Job>(context, &ns, selector, output).await,
    }
}
