//! netcheck - network connectivity specs for KubeVirt virtual machine instances

use anyhow::Result;
use clap::Parser;
use netcheck::cli::{Cli, Command};
use netcheck::commands;
use netcheck::suite::functional_suite;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    if cli.no_color {
        owo_colors::set_override(false);
    }

    let context = cli.context.as_deref();
    let namespace = cli.namespace.as_deref();

    let result = match cli.command {
        Command::Run(ref args) => match commands::run_suite(context, namespace, args, cli.output).await {
            Ok(report) if report.succeeded() => Ok(()),
            Ok(_) => std::process::exit(1),
            Err(e) => Err(e),
        },
        Command::List(ref args) => commands::list_specs(&functional_suite(), args, cli.output),
        Command::Describe(ref args) => commands::describe_spec(&functional_suite(), args, cli.output),
        Command::Get(ref args) => commands::get_objects(context, namespace, args, cli.output).await,
        Command::Completions(ref args) => {
            generate_completions(args.shell);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "netcheck", &mut std::io::stdout());
}
