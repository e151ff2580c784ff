use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = cli::run(std::env::args().skip(1)) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
