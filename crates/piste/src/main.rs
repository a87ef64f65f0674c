mod cli;
mod demo;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{debug, info};
use piste_core::plugin_system::Result;
use piste_core::{Registry, RegistryConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{CliArgs, Commands, PluginsCommand};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    // Logs go to stderr so command output stays machine-readable
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => match RegistryConfig::from_path(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => RegistryConfig::default(),
    };
    if args.debug {
        config.debug = true;
    }

    let registry = match bootstrap(config) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: failed to initialise registry: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&registry, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn bootstrap(config: RegistryConfig) -> Result<Arc<Registry>> {
    let mut builder = Registry::builder().config(config);
    for (name, factory) in demo::utilities() {
        builder = builder.utility(name, factory);
    }
    let registry = builder.build();
    registry.initialise()?;
    demo::register(&registry)?;
    registry.ready()?;
    info!("Registry ready with {} plugins", registry.get_plugin_names().len());
    Ok(registry)
}

async fn run(registry: &Arc<Registry>, command: Option<Commands>) -> Result<()> {
    match command {
        Some(Commands::Plugins { command }) => match command {
            PluginsCommand::List {} => {
                cli::list_plugins(registry);
                Ok(())
            }
            PluginsCommand::Show { name } => cli::show_plugin(registry, &name),
        },
        Some(Commands::Resolve { name, args }) => cli::resolve(registry, &name, &cli::parse_args(&args)),
        Some(Commands::Call { name, method, args }) => {
            cli::call(registry, &name, &method, &cli::parse_args(&args))
        }
        Some(Commands::Event { name, args, promise }) => {
            cli::event(registry, &name, cli::parse_args(&args), promise).await
        }
        None => {
            debug!("No command given, listing plugins");
            cli::list_plugins(registry);
            Ok(())
        }
    }
}
