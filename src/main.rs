use tracing::info;
use zedis::config::Config;
use zedis::error::ZedisResult;
use zedis::server::Server;

fn main() -> ZedisResult<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::from_args(&args);

    let level: tracing::Level = config.loglevel.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let mut server = Server::bind(config)?;

    // SIGINT flips the stop flag; the poll wakes with EINTR and the loop
    // winds down gracefully.
    let stop = server.stop_flag();
    signal_hook::flag::register(signal_hook::consts::SIGINT, stop)?;

    info!("zedis starting");
    server.run()
}
