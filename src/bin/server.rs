use std::time::Duration;

use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "paxoskv-server")]
struct Opt {
    /// Unique server ID
    #[structopt(short = "i", long = "id", env = "NODE_ID")]
    id: usize,

    /// Port to listen on for client and peer requests
    #[structopt(short = "p", long = "port", env = "PORT")]
    port: u16,

    /// Comma-separated peer addresses (host:port)
    #[structopt(short = "r", long = "replicas", env = "REPLICAS", default_value = "")]
    replicas: String,

    /// Timeout between servers (in milliseconds)
    #[structopt(short = "t", long = "timeout", default_value = "1000")]
    timeout: u64,

    /// Consensus rounds per write before giving up
    #[structopt(short = "a", long = "attempts", default_value = "5")]
    attempts: usize,

    /// Probability of an acceptor dropping a vote, for exercising retries
    #[structopt(short = "f", long = "failure-rate", env = "FAILURE_RATE", default_value = "0")]
    failure_rate: f64,

    /// Logging verbosity (-v, -vv, -vvv)
    #[structopt(short = "v", parse(from_occurrences))]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();

    if let Err(error) = paxoskv::logging::init(opt.verbose) {
        eprintln!("[ERROR]: {}", error);
        std::process::exit(1);
    }

    let config = paxoskv::Config::new(
            opt.id,
            opt.port,
            paxoskv::parse_peers(&opt.replicas),
        )
        .with_timeout(Duration::from_millis(opt.timeout))
        .with_attempts(opt.attempts)
        .with_failure_rate(opt.failure_rate);

    let handle = match config.run().await {
    | Ok(handle) => handle,
    | Err(error) => {
        log::error!("could not start server: {}", error);
        std::process::exit(1);
    }
    };
    log::warn!("node {} serving on {}", handle.node().id(), handle.local_addr());

    tokio::select! {
        result = handle.wait() => if let Err(error) = result {
            log::error!("server stopped: {}", error);
            std::process::exit(1);
        },
        _ = tokio::signal::ctrl_c() => log::warn!("interrupted, shutting down"),
    }
}
