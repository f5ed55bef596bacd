//! dualgen CLI
//!
//! Command-line interface for generating declarations and schemas from a
//! definition manifest (or the built-in catalog).

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dualgen::{
    catalog, emit_declarations, emit_declarations_for, emit_schema, lint, load_manifest, validate,
    variation_report, DeclarationOptions, DefinitionStatus, DefinitionsKey, Registry,
    SchemaOptions, Severity, ValidateError,
};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "dualgen")]
#[command(about = "Generate typed declarations and JSON Schema from one set of definitions")]
#[command(version)]
struct Cli {
    /// Log registry builds and emission to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit typed interface declarations
    Types {
        /// Definition manifest (built-in catalog if not specified)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Suffix for Internal declarations
        #[arg(long, default_value = dualgen::DEFAULT_INTERNAL_SUFFIX)]
        internal_suffix: String,

        /// Only emit these definitions (and what they reference)
        #[arg(long)]
        only: Vec<String>,

        /// Omit the generated-file header comment
        #[arg(long)]
        no_header: bool,
    },

    /// Emit the JSON Schema document (External variant)
    Schema {
        /// Definition manifest (built-in catalog if not specified)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Definition the document's root $ref points at
        #[arg(long)]
        root: Option<String>,

        /// Value for $id
        #[arg(long)]
        id: Option<String>,

        /// Document title
        #[arg(long)]
        title: Option<String>,

        /// Document description
        #[arg(long)]
        description: Option<String>,

        /// Put definitions under $defs instead of definitions
        #[arg(long)]
        defs: bool,
    },

    /// Show which definitions differ between the Internal and External variants
    Diff {
        /// Definition manifest (built-in catalog if not specified)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Validate a payload against one definition's schema
    Validate {
        /// Definition to validate against
        definition: String,

        /// Payload file to validate
        payload: PathBuf,

        /// Definition manifest (built-in catalog if not specified)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Lint definitions (build errors, invalid examples and defaults)
    Lint {
        /// Definition manifest (built-in catalog if not specified)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Only show failing definitions
        #[arg(long, short)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Types {
            manifest,
            output,
            internal_suffix,
            only,
            no_header,
        } => run_types(manifest.as_deref(), output, internal_suffix, &only, no_header),

        Commands::Schema {
            manifest,
            output,
            pretty,
            root,
            id,
            title,
            description,
            defs,
        } => {
            let mut options = SchemaOptions::new();
            options.root = root;
            options.id = id;
            options.title = title;
            options.description = description;
            if defs {
                options = options.definitions_key(DefinitionsKey::Defs);
            }
            run_schema(manifest.as_deref(), output, pretty, &options)
        }

        Commands::Diff { manifest, json } => run_diff(manifest.as_deref(), json),

        Commands::Validate {
            definition,
            payload,
            manifest,
            json,
        } => run_validate(manifest.as_deref(), &definition, &payload, json),

        Commands::Lint {
            manifest,
            format,
            strict,
            quiet,
        } => run_lint(manifest.as_deref(), &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_registry(manifest: Option<&Path>) -> Result<Registry, u8> {
    match manifest {
        Some(path) => load_manifest(path).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        }),
        None => catalog::common().map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        }),
    }
}

/// Write generated text to `output`, or stdout. Called only once generation
/// has fully succeeded.
fn write_output(output: Option<PathBuf>, text: &str) -> Result<(), u8> {
    match output {
        Some(path) => std::fs::write(&path, text).map_err(|e| {
            eprintln!("Error writing to {}: {}", path.display(), e);
            3u8
        }),
        None => {
            print!("{}", text);
            Ok(())
        }
    }
}

fn run_types(
    manifest: Option<&Path>,
    output: Option<PathBuf>,
    internal_suffix: String,
    only: &[String],
    no_header: bool,
) -> Result<(), u8> {
    let registry = load_registry(manifest)?;

    let mut options = DeclarationOptions::default().internal_suffix(internal_suffix);
    if no_header {
        options = options.header(None);
    }

    let generated = if only.is_empty() {
        emit_declarations(&registry, &options)
    } else {
        let names: Vec<&str> = only.iter().map(String::as_str).collect();
        emit_declarations_for(&registry, &names, &options)
    }
    .map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    write_output(output, &generated)
}

fn run_schema(
    manifest: Option<&Path>,
    output: Option<PathBuf>,
    pretty: bool,
    options: &SchemaOptions,
) -> Result<(), u8> {
    let registry = load_registry(manifest)?;

    let schema = emit_schema(&registry, options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let json_output = if pretty {
        serde_json::to_string_pretty(&schema)
    } else {
        serde_json::to_string(&schema)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    write_output(output, &format!("{}\n", json_output))
}

fn run_diff(manifest: Option<&Path>, json_output: bool) -> Result<(), u8> {
    let registry = load_registry(manifest)?;
    let report = variation_report(&registry);

    if json_output {
        let text = serde_json::to_string_pretty(&report).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", text);
        return Ok(());
    }

    for entry in &report {
        if !entry.differs {
            println!("  \x1b[32m=\x1b[0m {}", entry.name);
            continue;
        }
        let mut changes: Vec<String> = Vec::new();
        changes.extend(entry.internal_only.iter().map(|p| format!("+{}", p)));
        changes.extend(entry.external_only.iter().map(|p| format!("-{}", p)));
        if changes.is_empty() {
            println!("  \x1b[33m≠\x1b[0m {}", entry.name);
        } else {
            println!("  \x1b[33m≠\x1b[0m {} (internal: {})", entry.name, changes.join(", "));
        }
    }

    let differing = report.iter().filter(|e| e.differs).count();
    println!();
    println!(
        "{} definitions, {} with variant differences",
        report.len(),
        differing
    );
    Ok(())
}

fn load_payload(path: &Path, json_output: bool) -> Result<Value, u8> {
    if !path.exists() {
        report_error(json_output, &format!("payload not found: {}", path.display()));
        return Err(3);
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        report_error(json_output, &format!("cannot read {}: {}", path.display(), e));
        3u8
    })?;
    serde_json::from_str(&content).map_err(|e| {
        report_error(json_output, &format!("invalid JSON in payload: {}", e));
        2u8
    })
}

fn run_validate(
    manifest: Option<&Path>,
    definition: &str,
    payload_path: &Path,
    json_output: bool,
) -> Result<(), u8> {
    let registry = load_registry(manifest)?;
    let payload = load_payload(payload_path, json_output)?;

    match validate(&registry, definition, &payload) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(ValidateError::Invalid { errors }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn run_lint(manifest: Option<&Path>, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    let registry = load_registry(manifest)?;
    let result = lint(&registry, strict);

    if format == "json" {
        let text = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", text);
    } else {
        if !quiet {
            match manifest {
                Some(path) => println!("Linting {} ...\n", path.display()),
                None => println!("Linting built-in catalog ...\n"),
            }
        }

        for def in &result.results {
            let status_icon = match def.status {
                DefinitionStatus::Ok => "\x1b[32m✓\x1b[0m",
                DefinitionStatus::Warning => "\x1b[33m⚠\x1b[0m",
                DefinitionStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || def.status != DefinitionStatus::Ok {
                println!("  {} {}", status_icon, def.definition);
            }

            for diag in &def.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} definitions checked, all passed\x1b[0m",
                result.definitions_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} definitions checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.definitions_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}
