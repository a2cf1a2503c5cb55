//! OpenAPI from routes - OpenAPI documents from typed Express route handlers.
//!
//! Route handlers in the project's `src/api` tree type their requests and responses through
//! `TypedRequest*<...>` and `TypedResponse<...>` wrappers. This library reads those
//! registrations line by line, resolves the named types against JSON schema fragments compiled
//! from the project's models, and assembles a deterministic OpenAPI 3 document.
//!
//! # Architecture
//!
//! 1. [`model_gen`] - Reduces model classes to plain interfaces for the fragment compiler
//! 2. [`inheritance`] - Merges parent properties into compiled child fragments
//! 3. [`scanner`] - Lists route files and the URL prefix of their directory
//! 4. [`extractor`] - Extracts the registration, doc block and error codes of a route file
//! 5. [`doc_block`] - Parses the YAML documentation block of a route
//! 6. [`type_resolver`] - Turns type expressions into schemas and tracks referenced names
//! 7. [`schema_library`] - Loads compiled fragments and enum declarations
//! 8. [`closure`] - Pulls in every schema reachable from the referenced names
//! 9. [`openapi_builder`] - Constructs the complete OpenAPI document
//! 10. [`serializer`] - Serializes the document to JSON or YAML
//!
//! [`config`] holds the run configuration and the project layout every stage works in.
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_routes::{
//!     config::{ProjectLayout, RunConfig},
//!     extractor::file_scan::scan_route_file,
//!     openapi_builder::OpenApiBuilder,
//!     scanner::scan_route_tree,
//!     schema_library::SchemaLibrary,
//!     serializer::serialize_json,
//! };
//! use std::path::Path;
//!
//! let layout = ProjectLayout::new(".");
//! let config = RunConfig::load(Path::new("swagger/identrust.yaml")).unwrap();
//!
//! let mut builder = OpenApiBuilder::from_config(&config);
//! let (route_files, _warnings) = scan_route_tree(&layout.api_dir, &config.tables).unwrap();
//! for route_file in &route_files {
//!     let scanned = scan_route_file(&route_file.path, &route_file.url_prefix).unwrap();
//!     builder.add_file(&scanned, &config.tables).unwrap();
//! }
//!
//! let library = SchemaLibrary::load(&layout.build_dir, &layout.schemas_dir).unwrap();
//! let built = builder.build(&library);
//! println!("{}", serialize_json(&built.document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module which provides a complete CLI application.

pub mod cli;
pub mod closure;
pub mod config;
pub mod doc_block;
pub mod error;
pub mod extractor;
pub mod inheritance;
pub mod model_gen;
pub mod openapi_builder;
pub mod scanner;
pub mod schema_library;
pub mod serializer;
pub mod type_resolver;
