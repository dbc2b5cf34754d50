mod cli;
mod cloud;
mod config;
mod error;
mod k8s;
mod model;
mod terminal;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{CliArgs, Command};
use cloud::{
    FileProviderRepository, GraphqlSpacesApi, HttpTokenExchanger, LoginOrchestrator,
    ProviderRepository, SystemBrowser, TokenStore,
};
use config::Settings;
use error::Error;
use k8s::{ContextResolver, ContextSelector, DriftDetector, GeneratedFile, KubeconfigFile};
use std::process::ExitCode;
use std::sync::Arc;
use terminal::{Log, TerminalLog, TerminalPrompt};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter)?;

    let settings = Settings::discover()?;
    debug!(source = ?settings.source, "settings loaded");
    let log: Arc<dyn Log> = Arc::new(TerminalLog::new());

    match &args.command {
        Command::Login => login(&settings, log).await,
        Command::Token => token(&settings).await,
        Command::UseContext {
            name,
            disallow_private,
        } => use_context(&settings, log, name.as_deref(), *disallow_private).await,
        Command::Status => check_context(&args, &settings, log, false).await,
        Command::Prepare => check_context(&args, &settings, log, true).await,
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .map_or(1, |err| err.kind().exit_code())
}

fn init_tracing(level_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .try_init();

    Ok(())
}

fn token_store(settings: &Settings) -> Result<TokenStore> {
    let repository = Arc::new(FileProviderRepository::new(config::providers_path()?));
    let provider = repository
        .load(&settings.cloud.provider)
        .with_context(|| format!("failed to load provider '{}'", settings.cloud.provider))?;
    Ok(TokenStore::new(
        provider,
        Arc::new(HttpTokenExchanger::default()),
        repository,
    ))
}

async fn login(settings: &Settings, log: Arc<dyn Log>) -> Result<()> {
    let mut store = token_store(settings)?;
    let orchestrator = LoginOrchestrator::new(
        Arc::new(SystemBrowser),
        Arc::new(TerminalPrompt),
        log.clone(),
        Arc::new(GraphqlSpacesApi::default()),
        settings.cloud.callback_port,
    )
    .with_callback_timeout(settings.cloud.callback_timeout);

    orchestrator.login(&mut store).await?;
    store.save().context("failed to save provider")?;
    log.info(&format!(
        "Successfully logged into provider '{}'",
        store.provider().name
    ));
    Ok(())
}

async fn token(settings: &Settings) -> Result<()> {
    let mut store = token_store(settings)?;
    let token = store.get_token().await?;
    println!("{token}");
    Ok(())
}

fn resolver() -> Result<ContextResolver> {
    Ok(ContextResolver::new(Arc::new(KubeconfigFile::new(
        config::kubeconfig_path()?,
    ))))
}

async fn use_context(
    settings: &Settings,
    log: Arc<dyn Log>,
    name: Option<&str>,
    disallow_private: bool,
) -> Result<()> {
    let selector = ContextSelector::new(
        resolver()?,
        Arc::new(TerminalPrompt),
        log.clone(),
        settings.kube.allow_private_clusters && !disallow_private,
    );
    let resolved = match name {
        Some(name) => selector.select_named(name, true).await?,
        None => selector.select(true).await?,
    };
    log.info(&format!(
        "Successfully set kube context to '{}'",
        resolved.context()
    ));
    Ok(())
}

async fn check_context(
    args: &CliArgs,
    settings: &Settings,
    log: Arc<dyn Log>,
    will_mutate: bool,
) -> Result<()> {
    let resolver = resolver()?;
    let resolved = match (args.context.as_deref(), args.namespace.as_deref()) {
        (None, None) => resolver.resolve_default().await?,
        (context, namespace) => resolver.resolve(context, namespace, false).await?,
    };
    debug!(cluster = %resolved.rest_config().cluster_url, "kube client ready");

    let project_dir = std::env::current_dir().context("failed to read working directory")?;
    let store = Arc::new(GeneratedFile::new(config::generated_path(&project_dir)));
    DriftDetector::new(store, log.clone(), settings.drift)
        .check(&resolved, will_mutate)
        .await?;

    if !will_mutate && !resolved.namespace_exists().await? {
        log.warn(&format!(
            "Namespace '{}' does not exist yet",
            resolved.namespace()
        ));
    }
    Ok(())
}
