//! OpenAPI from routes - command-line tool for generating OpenAPI documents.
//!
//! Reads typed Express route handlers and compiled model fragments from a project tree and
//! writes one OpenAPI document per run configuration.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-routes [OPTIONS] [CONFIG]...
//! openapi-from-routes models [OPTIONS]
//! ```
//!
//! # Examples
//!
//! Generate the documents of two run configurations:
//! ```bash
//! openapi-from-routes swagger/identrust.yaml swagger/admin.yaml
//! ```
//!
//! Regenerate the schema interfaces of a project elsewhere, with verbose logging:
//! ```bash
//! openapi-from-routes models --root ../service -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_routes::cli;

fn main() -> Result<()> {
    // Parse once to pick the log level; validation logs, so it runs after logger init
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("OpenAPI from routes starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;

    cli::run(args)?;

    info!("Done");

    Ok(())
}
