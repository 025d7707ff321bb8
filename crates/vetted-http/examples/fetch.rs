//! Fetch a URL through a client configured from `.vetted/config.yaml` and
//! `VETTED_*` environment variables, then print the JSON body.
//!
//! ```text
//! VETTED_LOG_LEVEL=debug cargo run -p vetted-http --example fetch -- https://httpbin.org/json
//! ```

use std::process::ExitCode;
use vetted_common_log::LogConfig;
use vetted_http::Client;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = vetted_common_log::init(LogConfig::from_env()) {
        eprintln!("{e}");
    }

    let Some(url) = std::env::args().nth(1) else {
        eprintln!("usage: fetch <url>");
        return ExitCode::FAILURE;
    };

    let config = match vetted_common_config::load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let client = match Client::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to build client");
            return ExitCode::FAILURE;
        }
    };

    match client.get(url).send_raw().await {
        Ok(body) => {
            match serde_json::to_string_pretty(&body) {
                Ok(text) => println!("{text}"),
                Err(_) => println!("{body}"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(status = e.status, category = %e.category, "{}", e.message);
            ExitCode::FAILURE
        }
    }
}
