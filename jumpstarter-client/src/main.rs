//  MAIN.rs
//
//  Description:
//!   Entrypoint to the `jumpstarter-client` binary (§4.7, §4.9, §6).
//!   A minimal CLI surface over the library: request/release a lease,
//!   and issue one driver call through the resulting proxy tree. The
//!   broader CLI command groups (`jmp client ...`, `jmp shell`, `jmp
//!   admin ...`) are explicitly out of scope (§1 Non-goals) and left to
//!   collaborators; this binary covers only what §4.7/§4.9 describe.
//!   Subcommand layout grounded on `brane-cli/src/cli.rs`'s
//!   `Cli`/`SubCommand` clap-derive pattern.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use jumpstarter_client::config;
use jumpstarter_client::lease::LeaseClient;
use jumpstarter_client::proxy::build_tree;
use jumpstarter_proto::controller::ControllerServiceClient;
use jumpstarter_proto::exporter::ExporterServiceClient;
use jumpstarter_proto::value::Value;
use jumpstarter_shr::selector::Selector;
use log::{debug, error, info, LevelFilter};
use tonic::Request;

#[derive(Parser)]
#[clap(name = "jumpstarter-client", version = env!("CARGO_PKG_VERSION"), about = "Binds to a leased exporter's driver tree and issues calls against it.")]
struct Cli {
    #[clap(long, global = true, action, help = "Enable debug logging.", env = "DEBUG")]
    debug: bool,
    #[clap(long, global = true, help = "Named configuration context to load (see $JUMPSTARTER_CONTEXT).", env = "JUMPSTARTER_CONTEXT")]
    context: Option<String>,
    #[clap(subcommand)]
    sub_command: SubCommand,
}

#[derive(Subcommand)]
enum SubCommand {
    #[clap(about = "Manage exporter leases.")]
    Lease {
        #[clap(subcommand)]
        subcommand: LeaseSubcommand,
    },
    #[clap(about = "Lease an exporter matching a selector, then issue one driver call against it.")]
    Call {
        #[clap(long, help = "Label selector the leased exporter must satisfy (e.g. 'board=rpi,firmware in (v2,v3)').")]
        selector: String,
        #[clap(long, default_value_t = 1800, help = "Requested lease duration, in seconds.")]
        duration_secs: u64,
        #[clap(long, help = "Dot-separated path to the target driver node, e.g. 'composite1.power1'. Empty selects the root.", default_value = "")]
        path: String,
        #[clap(long, help = "Exported method name to invoke.")]
        method: String,
        #[clap(long, default_value = "null", help = "JSON-encoded argument value.")]
        args: String,
    },
}

#[derive(Subcommand)]
enum LeaseSubcommand {
    #[clap(about = "Request a lease and print its name once ready.")]
    Request {
        #[clap(long, help = "Label selector the leased exporter must satisfy.")]
        selector: String,
        #[clap(long, default_value_t = 1800, help = "Requested lease duration, in seconds.")]
        duration_secs: u64,
    },
    #[clap(about = "Release a previously-requested lease.")]
    Release {
        #[clap(help = "The lease name to release.")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    let mut logger = env_logger::builder();
    logger.format_module_path(false);
    logger.filter_level(if cli.debug { LevelFilter::Debug } else { LevelFilter::Info });
    logger.init();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            ExitCode::from(3)
        },
    }
}

async fn run(cli: Cli) -> Result<ExitCode, jumpstarter_client::CliError> {
    use jumpstarter_client::CliError;

    let config = config::load(cli.context.as_deref())?;
    debug!("loaded client config for endpoint '{}'", config.endpoint);

    match cli.sub_command {
        SubCommand::Lease { subcommand } => match subcommand {
            LeaseSubcommand::Request { selector, duration_secs } => {
                let selector: Selector = selector.parse().map_err(|err| CliError::InvalidSelector { raw: selector.clone(), err })?;
                let controller = ControllerServiceClient::connect_endpoint(&config.endpoint)
                    .await
                    .map_err(|err| CliError::ControllerConnectError { address: config.endpoint.to_string(), err })?;
                let mut lease = LeaseClient::new(controller, "jumpstarter-client");
                let (name, assignment) = lease.acquire(&selector, duration_secs).await.map_err(|err| CliError::LeaseError { err })?;
                println!("{name}");
                info!("router endpoint '{}'", assignment.router_endpoint);
                Ok(ExitCode::SUCCESS)
            },
            LeaseSubcommand::Release { name } => {
                let controller = ControllerServiceClient::connect_endpoint(&config.endpoint)
                    .await
                    .map_err(|err| CliError::ControllerConnectError { address: config.endpoint.to_string(), err })?;
                let mut lease = LeaseClient::new(controller, "jumpstarter-client");
                lease.release(&name).await.map_err(|err| CliError::LeaseError { err })?;
                Ok(ExitCode::SUCCESS)
            },
        },
        SubCommand::Call { selector, duration_secs, path, method, args } => {
            let selector: Selector = selector.parse().map_err(|err| CliError::InvalidSelector { raw: selector.clone(), err })?;
            let controller = ControllerServiceClient::connect_endpoint(&config.endpoint)
                .await
                .map_err(|err| CliError::ControllerConnectError { address: config.endpoint.to_string(), err })?;
            let mut lease_client = LeaseClient::new(controller, "jumpstarter-client");
            let (name, assignment) = lease_client.acquire(&selector, duration_secs).await.map_err(|err| CliError::LeaseError { err })?;

            let local_addr =
                jumpstarter_proxy::dial(&assignment.router_endpoint, &name, "127.0.0.1:0").await.map_err(|err| CliError::DialError { err })?;
            let mut exporter = ExporterServiceClient::connect(format!("http://{local_addr}"))
                .await
                .map_err(|err| CliError::ExporterConnectError { address: local_addr.clone(), err })?;
            let report = exporter.get_report(Request::new(jumpstarter_proto::driver::GetReportRequest {})).await.map_err(|err| CliError::ReportFailed { err })?.into_inner();

            let allow = config::allow_list(&config)?;
            let channel = tonic::transport::Channel::from_shared(format!("http://{local_addr}"))
                .expect("local dial address is always a valid URI")
                .connect_lazy();
            let tree = build_tree(&report, channel, &allow).map_err(|err| CliError::ProxyBuildError { err })?;

            let target = if path.is_empty() {
                Some(&tree)
            } else {
                path.split('.').try_fold(&tree, |node, segment| node.child(segment))
            };
            let Some(target) = target else {
                lease_client.release(&name).await.map_err(|err| CliError::LeaseError { err })?;
                error!("no driver node at path '{path}'");
                return Ok(ExitCode::from(1));
            };

            let args: serde_json::Value = serde_json::from_str(&args).unwrap_or(serde_json::Value::Null);
            let result = target.call(&method, Value::from(&args)).await;

            lease_client.release(&name).await.map_err(|err| CliError::LeaseError { err })?;

            match result {
                Ok(value) => {
                    let printable = value.into_json().unwrap_or(serde_json::Value::Null);
                    println!("{printable}");
                    Ok(ExitCode::SUCCESS)
                },
                Err(err) => {
                    error!("{method}: {err}");
                    Ok(ExitCode::from(2))
                },
            }
        },
    }
}
