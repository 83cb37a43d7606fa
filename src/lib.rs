//! openapi-from-comments - OpenAPI documents from doc-comment annotations.
//!
//! Handlers and types carry their API documentation in `///` comments using `@`-tags
//! (`@Summary`, `@Param`, `@Success`, `@Router`, ...); the crate docs of the main file hold
//! the general API info (`@title`, `@version`, `@host`, ...). This library turns those
//! annotations into an OpenAPI 3.0 or 3.1 document.
//!
//! # Architecture
//!
//! 1. [`scanner`] - Finds crates and their Rust files
//! 2. [`parser`] - Parses files with `syn` and lowers declarations and annotations
//! 3. [`annotation`] - The annotation grammar for general info, operations and fields
//! 4. [`index`] - Declaration arena and module tree for path lookups
//! 5. [`type_resolver`] - Resolves type references into the [`schema_registry`]
//! 6. [`schema_generator`] - Converts resolved types to OpenAPI schemas
//! 7. [`openapi_builder`] - Assembles the document and checks reference closure
//! 8. [`emitter`] - Writes JSON, YAML and the embeddable Rust module
//! 9. [`runtime`] - Registry the generated module registers its document with
//!
//! [`generator::Generator`] runs the whole pipeline.
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_comments::config::BuildConfig;
//! use openapi_from_comments::generator::Generator;
//! use std::path::PathBuf;
//!
//! let config = BuildConfig {
//!     search_dirs: vec![PathBuf::from("./my-api")],
//!     output_dir: PathBuf::from("./my-api/src/docs"),
//!     ..BuildConfig::default()
//! };
//! let summary = Generator::new(config).build().unwrap();
//! println!("{} operations documented", summary.operations);
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod annotation;
pub mod cli;
pub mod config;
pub mod emitter;
pub mod error;
pub mod generator;
pub mod index;
pub mod naming;
pub mod openapi_builder;
pub mod overrides;
pub mod packages;
pub mod parser;
pub mod runtime;
pub mod scanner;
pub mod schema_generator;
pub mod schema_registry;
pub mod serializer;
pub mod type_resolver;
