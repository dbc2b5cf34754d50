use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "skiff",
    version,
    about = "Deploy to Kubernetes with cloud login and kube context drift checks."
)]
pub struct CliArgs {
    /// Kube context to use instead of the current one
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Namespace to use instead of the context's namespace
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Log into the configured cloud provider
    Login,
    /// Print a valid access token, exchanging the stored key when needed
    Token,
    /// Switch the current kube context, interactively when no name is given
    UseContext {
        name: Option<String>,

        /// Refuse clusters whose endpoint is on a private network
        #[arg(long)]
        disallow_private: bool,
    },
    /// Show the resolved kube context and namespace without recording them
    Status,
    /// Resolve the kube context for a deploy and record it for drift checks
    Prepare,
}
