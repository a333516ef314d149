use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = routemux::cli::Cli::parse();
    if let Err(e) = routemux::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
