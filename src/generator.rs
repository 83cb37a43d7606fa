//! The build pipeline.
//!
//! [`Generator::build`] runs scan, parse, index, resolve, assemble and emit for one
//! [`BuildConfig`]. Every build owns its own index and schema registry, so concurrent
//! builds in one process never share state.

use crate::annotation::general::GeneralInfo;
use crate::annotation::{AssetContext, TagFilter};
use crate::config::BuildConfig;
use crate::emitter::{Artifact, Emitter};
use crate::error::{BuildError, ParseError};
use crate::index::{ModulePath, SourceIndex};
use crate::openapi_builder::{OpenApiBuilder, OpenApiDocument};
use crate::overrides::Overrides;
use crate::packages::{list_dependencies, CargoMetadataLister, PackageLister};
use crate::parser::{module_path_for, AstParser, OperationRecord, ParseContext, SourceUnit};
use crate::scanner::{CrateRoot, FileScanner, SourceFile};
use crate::schema_registry::SchemaRegistry;
use crate::type_resolver::{ResolvedOperation, ResolverOptions, TypeResolver};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Counters and outputs of a finished build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub files_scanned: usize,
    pub files_parsed: usize,
    pub operations: usize,
    pub schemas: usize,
    /// Annotation errors reported as warnings
    pub parse_errors: usize,
    pub artifacts: Vec<PathBuf>,
}

/// A document assembled in memory, before emission.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub document: OpenApiDocument,
    pub general: GeneralInfo,
    pub summary: BuildSummary,
}

/// Runs documentation builds.
pub struct Generator {
    config: BuildConfig,
    lister: Option<Box<dyn PackageLister>>,
}

impl Generator {
    pub fn new(config: BuildConfig) -> Self {
        let lister = config.use_cargo_metadata.then(|| {
            Box::new(CargoMetadataLister::new(config.metadata_timeout)) as Box<dyn PackageLister>
        });
        Self { config, lister }
    }

    /// Replaces the dependency lister; the heuristic fallback still applies on failure.
    pub fn with_lister(mut self, lister: Box<dyn PackageLister>) -> Self {
        self.lister = Some(lister);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Runs the whole pipeline and writes the requested artifacts.
    ///
    /// # Errors
    ///
    /// Any fatal [`BuildError`]. Nothing is written unless every artifact rendered.
    pub fn build(&self) -> Result<BuildSummary, BuildError> {
        let assembled = self.assemble()?;
        let artifacts = self.render(&assembled)?;
        let mut summary = assembled.summary;
        summary.artifacts = Emitter::write(&artifacts)?;
        info!(
            "Generated {} artifact(s): {} operation(s), {} schema(s)",
            summary.artifacts.len(),
            summary.operations,
            summary.schemas
        );
        Ok(summary)
    }

    /// Renders artifacts without writing them.
    pub fn render(&self, assembled: &Assembled) -> Result<Vec<Artifact>, BuildError> {
        Emitter::new(&self.config).render(&assembled.document, &assembled.general)
    }

    /// Runs every stage up to the assembled document.
    pub fn assemble(&self) -> Result<Assembled, BuildError> {
        let config = &self.config;
        config.validate()?;
        let overrides = Overrides::load(config)?;

        // Step 1: find crates and files
        info!("Scanning source directories...");
        let scanner = FileScanner::new(config);
        let roots = self.crate_roots(&scanner)?;
        let scan = scanner.scan(&roots);
        let main_file = fs::canonicalize(config.main_file_path())
            .map_err(|e| BuildError::io(config.main_file_path(), e))?;
        let files = with_main_file(scan.files, &main_file, &roots[0]);
        info!("Found {} Rust files in {} crate(s)", files.len(), roots.len());

        // Step 2: parse in parallel
        info!("Parsing Rust files...");
        let ctx = ParseContext {
            main_file: Some(main_file.clone()),
            assets: AssetContext {
                markdown_dir: config.markdown_dir.clone(),
                code_examples_dir: config.code_examples_dir.clone(),
            },
        };
        let mut units = Vec::with_capacity(files.len());
        for (file, result) in files.iter().zip(AstParser::parse_files(&files, &ctx)) {
            match result {
                Ok(unit) => units.push(unit),
                Err(e) if is_same_file(&file.path, &main_file) => return Err(e),
                Err(e) => warn!("Skipping file due to parse error: {}", e),
            }
        }
        let files_parsed = units.len();
        let parse_errors = self.check_parse_errors(&units)?;

        let general = units
            .iter_mut()
            .find(|u| u.is_main)
            .and_then(|u| u.general.take())
            .unwrap_or_default();
        if general.title.is_none() {
            warn!("No @title found in {}", main_file.display());
        }

        // Step 3: index declarations, keep operations that pass the filters
        let index = build_index(&roots, &mut units);
        let operations = self.filter_operations(units.into_iter().flat_map(|u| u.operations));
        info!(
            "Indexed {} declaration(s); {} operation(s) selected",
            index.len(),
            operations.len()
        );

        // Step 4: resolve every referenced type
        info!("Resolving types...");
        let registry = SchemaRegistry::new();
        let resolver = TypeResolver::new(
            &index,
            &registry,
            &overrides,
            ResolverOptions {
                naming: config.naming,
                required_by_default: config.required_by_default,
                parse_depth: config.parse_depth,
            },
        );
        // Collected in input order so the reported error is always the first one
        let resolved = operations
            .par_iter()
            .map(|record| resolver.resolve_operation(record))
            .collect::<Vec<_>>()
            .into_iter()
            .collect::<Result<Vec<ResolvedOperation>, _>>()?;

        // Step 5: assemble
        info!("Building OpenAPI document...");
        let mut builder = OpenApiBuilder::new(config.openapi_3_1, config.collection_format)
            .with_general(&general);
        for operation in &resolved {
            builder.add_operation(operation)?;
        }
        let document = builder.build(&registry)?;

        Ok(Assembled {
            document,
            general,
            summary: BuildSummary {
                files_scanned: files.len(),
                files_parsed,
                operations: resolved.len(),
                schemas: registry.len(),
                parse_errors,
                artifacts: Vec::new(),
            },
        })
    }

    fn crate_roots(&self, scanner: &FileScanner) -> Result<Vec<CrateRoot>, BuildError> {
        let mut roots = scanner.search_roots(&self.config)?;
        if self.config.parse_dependency {
            let root_dir = roots[0].dir.clone();
            let known: HashSet<PathBuf> = roots.iter().map(|r| canonical(&r.dir)).collect();
            let dependencies =
                list_dependencies(self.lister.as_deref(), &root_dir, self.config.parse_depth);
            debug!("Found {} dependency crate(s)", dependencies.len());
            roots.extend(
                dependencies
                    .into_iter()
                    .filter(|dep| !known.contains(&canonical(&dep.dir))),
            );
        }
        Ok(roots)
    }

    /// Fails in strict mode, otherwise logs each error and returns the count.
    fn check_parse_errors(&self, units: &[SourceUnit]) -> Result<usize, BuildError> {
        let errors: Vec<ParseError> = units.iter().flat_map(|u| u.errors.clone()).collect();
        if errors.is_empty() {
            return Ok(0);
        }
        if self.config.strict {
            return Err(BuildError::Parse(errors));
        }
        for error in &errors {
            warn!("{}", error);
        }
        Ok(errors.len())
    }

    fn filter_operations(
        &self,
        operations: impl Iterator<Item = OperationRecord>,
    ) -> Vec<OperationRecord> {
        let tags = TagFilter::parse(&self.config.tags);
        let extension = self
            .config
            .parse_extension
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(|e| format!("x-{}", e.trim_start_matches("x-")).to_ascii_lowercase());

        operations
            .filter(|record| {
                let annotation = &record.annotation;
                if !tags.allows(&annotation.tags) {
                    debug!("Operation {} filtered out by tags", record.location());
                    return false;
                }
                if let Some(extension) = &extension {
                    if !annotation
                        .extensions
                        .keys()
                        .any(|k| k.eq_ignore_ascii_case(extension))
                    {
                        debug!("Operation {} lacks {}", record.location(), extension);
                        return false;
                    }
                }
                true
            })
            .collect()
    }
}

/// Adds the main file when the walk did not reach it.
fn with_main_file(mut files: Vec<SourceFile>, main_file: &Path, root: &CrateRoot) -> Vec<SourceFile> {
    if files.iter().any(|f| is_same_file(&f.path, main_file)) {
        return files;
    }
    let root_dir = canonical(&root.dir);
    let relative = main_file
        .strip_prefix(root_dir.join("src"))
        .or_else(|_| main_file.strip_prefix(&root_dir))
        .map(PathBuf::from)
        .unwrap_or_default();
    let module = if relative.as_os_str().is_empty() {
        ModulePath::root(root.name.clone())
    } else {
        module_path_for(&root.name, &relative)
    };
    debug!("Adding main file {} outside the scanned tree", main_file.display());
    files.insert(
        0,
        SourceFile {
            path: main_file.to_path_buf(),
            module,
            depth: 0,
        },
    );
    files
}

fn build_index(roots: &[CrateRoot], units: &mut [SourceUnit]) -> SourceIndex {
    let mut index = SourceIndex::new(roots[0].name.clone());
    for root in roots {
        index.add_crate(&root.name);
    }
    for unit in units.iter_mut() {
        for record in std::mem::take(&mut unit.modules) {
            index.add_module(record);
        }
    }
    index
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn is_same_file(path: &Path, canonical_target: &Path) -> bool {
    canonical(path) == canonical_target
}
