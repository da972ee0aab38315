//  MAIN.rs
//
//  Description:
//!   Entrypoint to the `jumpstarter-exporter` binary (§4.5, §4.8, §6).
//!   Grounded on `brane-job/src/main.rs`'s `Opts`/dotenv/env_logger/
//!   `Server::builder()...serve_with_shutdown(SIGTERM)` skeleton,
//!   generalised from loading a `WorkerConfig` and serving a
//!   `JobServiceServer` to loading an `ExporterConfig` and serving an
//!   `ExporterServiceServer` over a driver tree.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use error_trace::trace;
use jumpstarter_cfg::exporter::ExporterConfig;
use jumpstarter_cfg::info::Info as _;
use jumpstarter_driver::handler::ExporterHandler;
use jumpstarter_driver::session::Session;
use jumpstarter_proto::exporter::ExporterServiceServer;
use jumpstarter_proto::transport::Endpoint;
use jumpstarter_proxy::Listener;
use log::{debug, error, info, warn, LevelFilter};
use tokio::net::{TcpListener, UnixListener};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio_stream::wrappers::{TcpListenerStream, UnixListenerStream};
use tonic::transport::Server;
use uuid::Uuid;

mod errors;
mod tree_builder;

use errors::ExporterError;

#[derive(Parser)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
struct Opts {
    /// Print debug info.
    #[clap(long, action, help = "If given, shows additional logging information.", env = "DEBUG")]
    debug: bool,

    /// The exporter config file to load (§6 `ExporterConfig`).
    #[clap(short, long, default_value = "/etc/jumpstarter/exporter.yaml", help = "Path to the exporter's YAML config.", env = "JUMPSTARTER_EXPORTER_CONFIG")]
    config_path: PathBuf,

    /// Local address the Exporter gRPC service itself binds to: a
    /// `unix://` path (preferred when client and exporter share a host)
    /// or a TCP hostport (§4.5). The router-tunnel listener dials back
    /// into this same address to relay assigned connections (§4.8).
    #[clap(long, default_value = "127.0.0.1:8082", help = "Local bind address for the Exporter gRPC service (unix:// path or host:port).", env = "JUMPSTARTER_EXPORTER_BIND")]
    bind: Endpoint,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let opts = Opts::parse();

    let mut logger = env_logger::builder();
    logger.format_module_path(false);
    if opts.debug {
        logger.filter_level(LevelFilter::Debug).init();
    } else {
        logger.filter_level(LevelFilter::Info).init();
    }
    info!("Initializing jumpstarter-exporter v{}...", env!("CARGO_PKG_VERSION"));

    debug!("Loading exporter config '{}'...", opts.config_path.display());
    let config: ExporterConfig = match ExporterConfig::from_path(&opts.config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", trace!(("Failed to load ExporterConfig"), ExporterError::ConfigLoadError { path: opts.config_path.clone(), err }));
            std::process::exit(1);
        },
    };

    let root = match tree_builder::build(&config.export) {
        Ok(root) => root,
        Err(err) => {
            error!("{}", trace!(("Failed to build driver tree"), err));
            std::process::exit(1);
        },
    };
    let session = Session::new(root);
    info!("driver tree built: {} node(s)", session.report().entries.len());

    let uuid = Uuid::new_v4();
    let listener = Listener::new(uuid, Default::default(), config.endpoint.clone(), opts.bind.clone(), session.report());
    tokio::spawn(async move {
        if let Err(err) = listener.serve().await {
            error!("{}", trace!(("Router-tunnel listener exited"), err));
        }
    });

    debug!("gRPC server ready to serve on '{}'", opts.bind);
    let server_session = session.clone();
    let shutdown = async {
        let mut handler: Signal = match signal(SignalKind::terminate()) {
            Ok(handler) => handler,
            Err(err) => {
                error!("{}", trace!(("Failed to register SIGTERM signal handler"), err));
                warn!("Service will NOT shutdown gracefully on SIGTERM");
                loop {
                    tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                }
            },
        };
        handler.recv().await;
        info!("Received SIGTERM, shutting down gracefully...");
    };

    let serve_result = match &opts.bind {
        Endpoint::Tcp(host, port) => {
            let address = format!("{host}:{port}");
            match TcpListener::bind(&address).await {
                Ok(listener) => {
                    Server::builder()
                        .add_service(ExporterServiceServer::new(ExporterHandler::new(session)))
                        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
                        .await
                },
                Err(err) => {
                    error!("Failed to bind TCP listener on '{address}': {err}");
                    std::process::exit(1);
                },
            }
        },
        Endpoint::Unix(path) => {
            let _ = std::fs::remove_file(path);
            match UnixListener::bind(path) {
                Ok(listener) => {
                    Server::builder()
                        .add_service(ExporterServiceServer::new(ExporterHandler::new(session)))
                        .serve_with_incoming_shutdown(UnixListenerStream::new(listener), shutdown)
                        .await
                },
                Err(err) => {
                    error!("Failed to bind Unix listener on '{}': {err}", path);
                    std::process::exit(1);
                },
            }
        },
    };
    if let Err(err) = serve_result {
        error!("{}", trace!(("Failed to start gRPC server"), err));
        std::process::exit(1);
    }

    server_session.shutdown().await;
}
