//! cmdboot demo service.
//!
//! `cmdboot serve` runs a gRPC health service and an HTTP status endpoint,
//! both configured entirely from flags and `CMDBOOT_*` environment variables:
//!
//! ```text
//! CMDBOOT_LOG_LEVEL=debug cmdboot serve --grpc-addr=:50051 --http-addr=:8443 \
//!     --http-tls-cert-path='$TLS_DIR/cert.pem' --http-tls-key-path='$TLS_DIR/key.pem'
//! ```

use std::error::Error;
use std::process::ExitCode;

use axum::routing::get;
use axum::{Json, Router};
use clap::Command;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use cmdboot::config::{
    register_grpc_server_flags, register_http_server_flags, register_logging_flags,
    register_tracing_flags,
};
use cmdboot::lifecycle::signals::spawn_signal_listener;
use cmdboot::server::join_all;
use cmdboot::{
    EnvOverrides, FlagSet, GrpcServer, Hook, HookStack, HttpServer, Invocation, LoggingHook,
    Shutdown, TracingHook,
};

const ENV_PREFIX: &str = "cmdboot";

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn serve_flags() -> FlagSet {
    let mut flags = FlagSet::new();
    register_logging_flags(&mut flags, "log");
    register_tracing_flags(&mut flags, "otel", "");
    register_grpc_server_flags(&mut flags, "grpc", "health", "", true);
    register_http_server_flags(&mut flags, "http", "status", "", true);
    flags
}

fn cli(serve: &FlagSet) -> Command {
    Command::new("cmdboot")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Bootstrap gRPC and HTTP listeners from flags and environment")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(serve.augment(
            Command::new("serve").about("Serve gRPC health checks and an HTTP status endpoint"),
        ))
        .subcommand(Command::new("completion").about("Print words for shell completion"))
}

fn hooks() -> HookStack {
    HookStack::new()
        .with(EnvOverrides::new(ENV_PREFIX))
        .with(LoggingHook::new("log"))
        .with(TracingHook::new("otel"))
}

/// One word per line, suitable for `complete -W "$(cmdboot completion)" cmdboot`.
fn print_completion(cmd: &Command) {
    for sub in cmd.get_subcommands() {
        println!("{}", sub.get_name());
        for arg in sub.get_arguments() {
            if let Some(long) = arg.get_long() {
                println!("--{long}");
            }
        }
    }
}

fn serve(flags: FlagSet) -> Result<(), Box<dyn Error>> {
    let (_reporter, health) = tonic_health::server::health_reporter();
    let grpc = GrpcServer::from_flags(&flags, "grpc")?.routes(|server| server.add_service(health));

    let router = Router::new()
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http());
    let http = HttpServer::from_flags(&flags, "http", router)?;

    // Built after the hooks; the OTLP blocking client cannot be created inside it.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let shutdown = Shutdown::new();
        let signals = spawn_signal_listener(shutdown.clone());

        let result = join_all(vec![grpc.spawn(&shutdown), http.spawn(&shutdown)], &shutdown).await;
        signals.abort();
        result
    })?;
    Ok(())
}

fn run() -> Result<(), Box<dyn Error>> {
    let flags = serve_flags();
    let cli = cli(&flags);
    let matches = cli.clone().get_matches();

    let Some((command, sub_matches)) = matches.subcommand() else {
        return Ok(());
    };
    let sub_flags = match command {
        "serve" => flags,
        _ => FlagSet::new(),
    };
    let mut invocation = Invocation::from_matches(command, sub_flags, sub_matches)?;
    hooks().run(&mut invocation)?;

    let result = if invocation.command() == "serve" {
        serve(invocation.into_flags())
    } else {
        print_completion(&cli);
        Ok(())
    };

    if let Err(err) = cmdboot::observability::shutdown_tracing() {
        tracing::warn!(error = %err, "failed to flush traces");
    }
    result
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthz_reports_ok_and_version() {
        let Json(body) = healthz().await;
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn serve_exposes_every_flag_family() {
        let flags = serve_flags();
        let cli = cli(&flags);
        let serve = cli.find_subcommand("serve").unwrap();
        for long in ["log-level", "otel-provider", "grpc-max-conn-age", "http-enabled"] {
            assert!(
                serve.get_arguments().any(|arg| arg.get_long() == Some(long)),
                "missing --{long}"
            );
        }
        assert!(cli.find_subcommand("completion").is_some());
    }

    #[test]
    fn explicit_flags_beat_defaults_through_the_parser() {
        let flags = serve_flags();
        let matches = cli(&flags)
            .try_get_matches_from(["cmdboot", "serve", "--http-enabled=false", "--grpc-addr", ":0"])
            .unwrap();
        let (command, sub) = matches.subcommand().unwrap();
        let invocation = Invocation::from_matches(command, flags, sub).unwrap();

        assert!(!invocation.flags().get_bool("http-enabled").unwrap());
        assert_eq!(invocation.flags().get_string("grpc-addr").unwrap(), ":0");
        assert!(invocation.flags().changed("grpc-addr"));
        assert!(!invocation.flags().changed("log-level"));
    }
}
