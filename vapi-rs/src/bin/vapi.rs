//! vapi server: serves the demo services over HTTP.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vapi_rs::{demo, ApiServer, RegistryError, RequestContext, Response, ServerConfig};

#[derive(Parser)]
#[command(name = "vapi")]
#[command(about = "Serve registered services as Service.Method over HTTP")]
struct Cli {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "127.0.0.1", global = true)]
    host: String,
    /// Port to bind
    #[arg(long, env = "PORT", default_value_t = 8000, global = true)]
    port: u16,
    /// Prefix of the RPC routes
    #[arg(long, env = "BASE_URL", default_value = "/api", global = true)]
    base_url: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default).
    Serve,
    /// Print every registered Service.Method and exit.
    List,
}

impl Cli {
    fn config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            base_url: self.base_url.clone(),
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("registration failed: {0}")]
    Register(#[from] RegistryError),
    #[error("server stopped: {0}")]
    Serve(Box<dyn std::error::Error + Send + Sync>),
}

fn build_server(config: &ServerConfig) -> Result<ApiServer, RegistryError> {
    let mut server = ApiServer::from_config(config);
    demo::register_all(&server)?;
    server.add_route("GET", "/health", |_req: RequestContext| Response::text(200, "ok"));
    server.add_middleware(|req| {
        info!(verb = %req.method, path = %req.path, "request");
        async { None }
    });
    Ok(server)
}

fn list(server: &ApiServer) {
    let services = server.services().list_all();
    let mut names: Vec<&String> = services.keys().collect();
    names.sort();
    for name in names {
        for method in services[name].method_names() {
            println!("{}.{}", name, method);
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.config();
    let server = build_server(&config)?;
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::List => {
            list(&server);
            Ok(())
        }
        Commands::Serve => server.listen_and_serve(&config).map_err(CliError::Serve),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "vapi failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_fill_config() {
        let cli = Cli::try_parse_from(["vapi", "list", "--port", "9001", "--base-url", "/rpc"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::List)));
        let config = cli.config();
        assert_eq!(config.port, 9001);
        assert_eq!(config.base_url, "/rpc");
    }

    #[test]
    fn demo_server_builds() {
        let server = build_server(&ServerConfig::default()).unwrap();
        assert!(server.has_method("Arith.Divide"));
        let err = CliError::from(demo::register_all(&server).unwrap_err());
        assert_eq!(err.to_string(), "registration failed: api: service already defined: \"Echo\"");
    }
}
