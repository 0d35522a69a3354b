mod cli;
mod commands;
mod config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let code = match commands::run().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {err}");
            1
        }
    };

    std::process::exit(code);
}
