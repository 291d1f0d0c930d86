#![cfg(not(tarpaulin_include))]

use dashboard::app;
use std::env;

/// Main entry point for the web application
///
/// Initializes logging and the mock user store, then runs the web server
/// over the three table registers.
///
/// # Arguments
/// * Optional first argument: the storage directory (defaults to "data")
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let data_dir = args.get(1).map(|s| s.as_str()).unwrap_or("data").to_string();

    // Start the web application over the given storage directory
    app::run(&data_dir).await
}
