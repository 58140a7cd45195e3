use clap::Parser;
use clap_derive::Parser;
use netstore::config::{ServerConfig, DEFAULT_MAX_SPACE};
use netstore::index::scan_shared_dir;
use netstore::server::Server;
use netstore::state::ServerState;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};

#[derive(Parser)]
#[clap(about = "A peer-discoverable network file store")]
struct Args {
    /// Multicast group to join and advertise
    #[clap(short = 'g', long)]
    mcast_addr: Ipv4Addr,

    /// UDP control port
    #[clap(short = 'p', long)]
    cmd_port: u16,

    /// Storage quota in bytes
    #[clap(short = 'b', long, default_value_t = DEFAULT_MAX_SPACE)]
    max_space: u64,

    /// Directory of served files
    #[clap(short = 'f', long)]
    shrd_fldr: PathBuf,

    /// Seconds to wait for a client's TCP connection (1..=300)
    #[clap(short = 't', long, default_value_t = 5)]
    timeout: u64,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let config = ServerConfig {
        multicast_addr: args.mcast_addr,
        cmd_port: args.cmd_port,
        max_space: args.max_space,
        shared_dir: args.shrd_fldr,
        timeout: Duration::from_secs(args.timeout),
    };
    config.validate()?;

    let files = scan_shared_dir(&config.shared_dir)?;
    info!("indexed {} files from {:?}", files.len(), config.shared_dir);
    let state = ServerState::from_index(config.max_space, files);

    let server = Server::bind(config, state).await?;
    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            shutdown.trigger();
        }
    });

    server.run().await
}
