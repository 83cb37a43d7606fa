use crate::config::{BuildConfig, CollectionFormat, OutputKind, TemplateDelims};
use crate::error::ConfigError;
use crate::generator::Generator;
use crate::naming::NamingStrategy;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::{debug, info};
use std::path::PathBuf;
use std::time::Duration;

/// Generate OpenAPI documents from doc-comment annotations in Rust source code
#[derive(Parser, Debug)]
#[command(name = "openapi-from-comments")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Only print errors
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the OpenAPI document and the embeddable Rust module
    #[command(visible_alias = "i")]
    Init(InitArgs),
}

/// Flags of the `init` command
#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Directories to parse, comma separated; the first one holds the general info file
    #[arg(short = 'd', long = "dir", default_value = "./")]
    pub dir: String,

    /// Paths or glob patterns to exclude, comma separated
    #[arg(long = "exclude", default_value = "")]
    pub exclude: String,

    /// File holding the general API info, relative to the first directory
    #[arg(short = 'g', long = "general-info", default_value = "src/main.rs")]
    pub general_info: PathBuf,

    /// Property naming strategy: declared, camelcase, snakecase or pascalcase
    #[arg(short = 'p', long = "property-strategy", default_value = "declared")]
    pub property_strategy: String,

    /// Output directory for all generated files
    #[arg(short = 'o', long = "output", default_value = "./docs")]
    pub output: PathBuf,

    /// Output types to generate, comma separated subset of rust,json,yaml
    #[arg(long = "output-types", visible_alias = "ot", default_value = "rust,json,yaml")]
    pub output_types: String,

    /// Also parse crates under vendor/
    #[arg(long = "parse-vendor")]
    pub parse_vendor: bool,

    /// Also parse directories named internal
    #[arg(long = "parse-internal")]
    pub parse_internal: bool,

    /// Also parse dependency crates
    #[arg(long = "parse-dependency", visible_alias = "pd")]
    pub parse_dependency: bool,

    /// Directory of markdown files for @Description.markdown
    #[arg(long = "markdown-files", visible_alias = "md")]
    pub markdown_files: Option<PathBuf>,

    /// Directory of code example files for @x-codeSamples
    #[arg(long = "code-example-files", visible_alias = "cef")]
    pub code_example_files: Option<PathBuf>,

    /// Maximum dependency depth followed
    #[arg(long = "parse-depth", default_value_t = 100)]
    pub parse_depth: usize,

    /// Make fields required unless they are optional or marked otherwise
    #[arg(long = "required-by-default")]
    pub required_by_default: bool,

    /// Name of the document instance, for several documents in one binary
    #[arg(long = "instance-name")]
    pub instance_name: Option<String>,

    /// Type overrides file
    #[arg(long = "overrides-file")]
    pub overrides_file: Option<PathBuf>,

    /// List dependencies with `cargo metadata`
    #[arg(long = "parse-cargo-metadata", default_value_t = true, action = clap::ArgAction::Set)]
    pub parse_cargo_metadata: bool,

    /// Seconds to wait for `cargo metadata`
    #[arg(long = "metadata-timeout", default_value_t = 30)]
    pub metadata_timeout: u64,

    /// Tag filter, e.g. `admin,!internal`
    #[arg(short = 't', long = "tags", default_value = "")]
    pub tags: String,

    /// Only keep operations carrying the @x-<name> extension
    #[arg(long = "parse-extension", default_value = "")]
    pub parse_extension: String,

    /// Generate an OpenAPI 3.1 document
    #[arg(long = "openapi-3-1")]
    pub openapi_3_1: bool,

    /// Left and right template delimiters, comma separated
    #[arg(long = "template-delims", visible_alias = "td", default_value = "{{,}}")]
    pub template_delims: String,

    /// Package name of the generated Rust module
    #[arg(long = "package-name", default_value = "")]
    pub package_name: String,

    /// Default collection format: csv, ssv, tsv, pipes or multi
    #[arg(long = "collection-format", visible_alias = "cf", default_value = "csv")]
    pub collection_format: String,

    /// Add a generation timestamp to the Rust module
    #[arg(long = "generated-time")]
    pub generated_time: bool,

    /// Fail on annotation errors
    #[arg(long = "strict")]
    pub strict: bool,
}

impl InitArgs {
    /// Converts flags into a build configuration, validating enumerated values.
    pub fn into_config(self) -> Result<BuildConfig, ConfigError> {
        Ok(BuildConfig {
            search_dirs: split_list(&self.dir).into_iter().map(PathBuf::from).collect(),
            excludes: split_list(&self.exclude),
            main_file: self.general_info,
            naming: self.property_strategy.parse::<NamingStrategy>()?,
            output_dir: self.output,
            output_kinds: OutputKind::parse_list(&self.output_types)?,
            parse_vendor: self.parse_vendor,
            parse_internal: self.parse_internal,
            parse_dependency: self.parse_dependency,
            markdown_dir: self.markdown_files,
            code_examples_dir: self.code_example_files,
            parse_depth: self.parse_depth,
            required_by_default: self.required_by_default,
            instance_name: self.instance_name.filter(|n| !n.is_empty()),
            overrides_file: self.overrides_file,
            use_cargo_metadata: self.parse_cargo_metadata,
            metadata_timeout: Duration::from_secs(self.metadata_timeout),
            tags: self.tags,
            parse_extension: Some(self.parse_extension).filter(|e| !e.is_empty()),
            openapi_3_1: self.openapi_3_1,
            template_delims: TemplateDelims::parse(&self.template_delims)?,
            package_name: Some(self.package_name).filter(|p| !p.is_empty()),
            collection_format: self.collection_format.parse::<CollectionFormat>()?,
            generated_time: self.generated_time,
            strict: self.strict,
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse command line arguments
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Run the selected command
pub fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Init(init) => {
            debug!("Parsed arguments: {:?}", init);
            let config = init.into_config()?;
            info!("Search directories: {:?}", config.search_dirs);
            info!("Output directory: {}", config.output_dir.display());

            let summary = Generator::new(config).build()?;

            info!("Generation complete!");
            info!("Summary:");
            info!("  - Files scanned: {}", summary.files_scanned);
            info!("  - Files parsed: {}", summary.files_parsed);
            info!("  - Operations: {}", summary.operations);
            info!("  - Schemas: {}", summary.schemas);
            if summary.parse_errors > 0 {
                info!("  - Annotation errors: {}", summary.parse_errors);
            }
            for path in &summary.artifacts {
                info!("  - Wrote {}", path.display());
            }
            Ok(())
        }
    }
}
