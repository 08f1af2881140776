use registry_sync::cli::{Args, Runner};
use registry_sync::logging::Logger;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse_args();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let logger = Logger::new(args.verbose);
    if let Err(e) = args.validate() {
        logger.error(&e.to_string());
        Args::print_examples();
        std::process::exit(1);
    }

    let result = match args.sync_config() {
        Ok(config) => Runner::new(config).run(&args).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        logger.error(&e.to_string());
        std::process::exit(1);
    }
}
