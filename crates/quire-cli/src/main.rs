//! `quire` binary entrypoint.

use std::process;

#[tokio::main]
async fn main() {
    let code = quire_cli::run().await;
    process::exit(code);
}
