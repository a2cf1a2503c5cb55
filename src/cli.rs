use crate::config::{load_version, ProjectLayout, RunConfig};
use crate::extractor::file_scan::scan_route_file;
use crate::inheritance::patch_inheritance;
use crate::model_gen::{generate_models, GeneratorOptions};
use crate::openapi_builder::OpenApiBuilder;
use crate::scanner::scan_route_tree;
use crate::schema_library::SchemaLibrary;
use crate::serializer::write_document;
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

/// OpenAPI from routes - Generate OpenAPI documents from typed Express route handlers
#[derive(Parser, Debug)]
#[command(name = "openapi-from-routes")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Run configuration files, one output document each
    #[arg(value_name = "CONFIG")]
    pub configs: Vec<PathBuf>,

    /// Project root the source trees are resolved against
    #[arg(long = "root", value_name = "DIR", default_value = ".", global = true)]
    pub root: PathBuf,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Generate schema interfaces from the model declarations
    Models,
}

/// What one run configuration produced.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub output: PathBuf,
    pub routes: usize,
    pub schemas: usize,
    pub missing_schemas: Vec<String>,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.root.is_dir() {
        anyhow::bail!("Project root is not a directory: {}", args.root.display());
    }

    info!("Project root: {}", args.root.display());
    for config in &args.configs {
        info!("Run configuration: {}", config.display());
    }

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    let layout = ProjectLayout::new(&args.root);

    if args.command == Some(Command::Models) {
        if !args.configs.is_empty() {
            warn!("Run configurations are ignored by the models command");
        }
        let written = generate_models(&layout, &GeneratorOptions::default())
            .context("Failed to generate schema interfaces")?;
        info!("Wrote {} schema interface(s) to {}", written.len(), layout.schemas_dir.display());
        return Ok(());
    }

    if args.configs.is_empty() {
        CliArgs::command().print_help()?;
        return Ok(());
    }

    // Fragments must carry inherited properties before any document reads them.
    let report = patch_inheritance(&layout).context("Failed to patch inherited properties")?;
    info!(
        "Patched {} compiled fragment(s) ({} skipped, {} cyclic)",
        report.patched.len(),
        report.skipped.len(),
        report.cyclic.len()
    );

    let mut failed = 0;
    for config_path in &args.configs {
        match build_from_config(config_path, &layout) {
            Ok(summary) => {
                info!("Wrote {}", summary.output.display());
                info!("Summary:");
                info!("  - Routes: {}", summary.routes);
                info!("  - Schemas: {}", summary.schemas);
                if !summary.missing_schemas.is_empty() {
                    info!("  - Missing schemas: {}", summary.missing_schemas.join(", "));
                }
            }
            Err(e) => {
                error!("{}: {:#}", config_path.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} run configuration(s) failed", failed, args.configs.len());
    }
    Ok(())
}

/// Build and write the document of one run configuration.
pub fn build_from_config(config_path: &Path, layout: &ProjectLayout) -> Result<BuildSummary> {
    info!("Processing {}", config_path.display());
    let config = RunConfig::load(config_path)?;
    let version = load_version(&layout.version_file)
        .with_context(|| format!("Failed to read version from {}", layout.version_file.display()))?;

    let mut builder = OpenApiBuilder::from_config(&config).with_version(&version);

    let (route_files, warnings) = scan_route_tree(&layout.api_dir, &config.tables)
        .with_context(|| format!("Failed to scan {}", layout.api_dir.display()))?;
    for warning in &warnings {
        warn!("{}", warning);
    }

    let mut included = 0;
    for route_file in &route_files {
        if !config.includes(&layout.relative_path(&route_file.path)) {
            continue;
        }
        included += 1;
        let scanned = scan_route_file(&route_file.path, &route_file.url_prefix)?;
        builder.add_file(&scanned, &config.tables)?;
    }
    debug!("Scanned {} of {} route files", included, route_files.len());

    let library = SchemaLibrary::load(&layout.build_dir, &layout.schemas_dir)
        .context("Failed to load the schema library")?;
    let built = builder.build(&library);

    let output = layout.output_dir.join(&config.output);
    write_document(&built.document, &output)?;

    Ok(BuildSummary {
        output,
        routes: built.route_count,
        schemas: built.document.components.schemas.len(),
        missing_schemas: built.missing_schemas,
    })
}
