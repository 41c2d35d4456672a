use clap::Parser;

use lorekeeper::cli::utils::display_error_with_suggestions;
use lorekeeper::cli::{run, Cli};
use lorekeeper::observability::init_tracing;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    if let Err(e) = run(cli).await {
        display_error_with_suggestions(&e, "lorekeeper");
        std::process::exit(1);
    }
}
