//! openapi-from-comments - Command-line tool for generating OpenAPI documents.
//!
//! Reads doc-comment annotations from Rust source files and writes an OpenAPI document
//! as JSON and YAML, plus a Rust module that embeds the document.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-comments init [OPTIONS]
//! ```
//!
//! # Examples
//!
//! Generate all outputs into `./docs`:
//! ```bash
//! openapi-from-comments init -d ./ -g src/main.rs
//! ```
//!
//! Generate an OpenAPI 3.1 JSON document only:
//! ```bash
//! openapi-from-comments init --openapi-3-1 --ot json
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! openapi-from-comments -v init
//! ```

use anyhow::Result;
use log::info;
use openapi_from_comments::cli;

fn main() -> Result<()> {
    let args = cli::parse_args();

    // Initialize logger based on quiet/verbose flags
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else if args.quiet {
        log::LevelFilter::Error
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .init();

    info!("openapi-from-comments starting...");

    cli::run(args)?;

    Ok(())
}
