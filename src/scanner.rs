use crate::config::PrefixTables;
use crate::error::Result;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File scanner for traversing the source trees of a project.
///
/// The `FileScanner` recursively walks a directory and collects the files with one of the
/// accepted extensions. Hidden entries and `node_modules` are skipped. Results are sorted so
/// that later stages see the same order on every platform.
///
/// # Example
///
/// ```no_run
/// use openapi_from_routes::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./src/api"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} source files", result.files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
    extensions: Vec<String>,
}

/// Result of directory scanning operation.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Sorted paths of all discovered files
    pub files: Vec<PathBuf>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

/// A route handler file and the URL prefix its directory maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFile {
    pub path: PathBuf,
    pub url_prefix: String,
}

impl FileScanner {
    /// Creates a scanner for TypeScript and JavaScript sources under `root_path`.
    pub fn new(root_path: PathBuf) -> Self {
        Self::with_extensions(root_path, &["ts", "js"])
    }

    /// Creates a scanner accepting only the given extensions (without the dot).
    pub fn with_extensions(root_path: PathBuf, extensions: &[&str]) -> Self {
        Self {
            root_path,
            extensions: extensions.iter().map(|ext| ext.to_string()).collect(),
        }
    }

    /// Scans the directory tree and collects matching files.
    ///
    /// If any directories or files cannot be accessed, warnings are logged and added to
    /// the result, but scanning continues.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory does not exist.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("directory does not exist: {}", self.root_path.display()),
            )
            .into());
        }

        let mut files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .into_iter()
            .filter_entry(|e| {
                // Don't filter the root directory itself
                if e.path() == self.root_path {
                    return true;
                }

                let file_name = e.file_name().to_string_lossy();
                !file_name.starts_with('.') && file_name != "node_modules"
            })
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    let accepted = path
                        .extension()
                        .and_then(|s| s.to_str())
                        .is_some_and(|ext| self.extensions.iter().any(|e| e == ext));

                    if entry.file_type().is_file() && accepted {
                        files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        files.sort();
        debug!("Found {} files under {}", files.len(), self.root_path.display());

        Ok(ScanResult { files, warnings })
    }
}

/// Lists the route files under `api_dir` with their URL prefixes.
///
/// Files named `index` only wire routers together and are skipped. The prefix is the file's
/// directory relative to `api_dir` (`/identrust` for `src/api/identrust/getAccount.ts`),
/// passed through the remap table.
pub fn scan_route_tree(api_dir: &Path, tables: &PrefixTables) -> Result<(Vec<RouteFile>, Vec<String>)> {
    let result = FileScanner::new(api_dir.to_path_buf()).scan()?;

    let routes = result
        .files
        .into_iter()
        .filter(|path| path.file_stem().and_then(|s| s.to_str()) != Some("index"))
        .map(|path| {
            let url_prefix = url_prefix_for(api_dir, &path);
            let url_prefix = tables.remap(&url_prefix).to_string();
            RouteFile { path, url_prefix }
        })
        .collect();

    Ok((routes, result.warnings))
}

fn url_prefix_for(api_dir: &Path, file: &Path) -> String {
    let directory = file.parent().unwrap_or(api_dir);
    let relative = directory.strip_prefix(api_dir).unwrap_or(directory);
    relative
        .components()
        .map(|component| format!("/{}", component.as_os_str().to_string_lossy()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_normal_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("getItem.ts"), "export {}").unwrap();
        fs::write(root.join("legacy.js"), "module.exports = {}").unwrap();
        fs::write(root.join("readme.md"), "# README").unwrap();

        let scanner = FileScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert_eq!(result.files.len(), 2);
        assert!(result.warnings.is_empty());

        let file_names: Vec<String> = result
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(file_names, vec!["getItem.ts".to_string(), "legacy.js".to_string()]);
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();

        let scanner = FileScanner::new(temp_dir.path().to_path_buf());
        let result = scanner.scan().unwrap();

        assert!(result.files.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let scanner = FileScanner::new(temp_dir.path().join("absent"));
        assert!(scanner.scan().is_err());
    }

    #[test]
    fn test_scan_skips_hidden_and_node_modules() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join(".cache")).unwrap();
        fs::write(root.join(".cache/stale.ts"), "").unwrap();
        fs::create_dir(root.join("node_modules")).unwrap();
        fs::write(root.join("node_modules/dep.ts"), "").unwrap();
        fs::write(root.join("main.ts"), "").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].file_name().unwrap().to_string_lossy(), "main.ts");
    }

    #[test]
    fn test_with_extensions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("item.json"), "{}").unwrap();
        fs::write(root.join("item.ts"), "").unwrap();

        let result = FileScanner::with_extensions(root.to_path_buf(), &["json"]).scan().unwrap();

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].file_name().unwrap().to_string_lossy(), "item.json");
    }

    #[test]
    fn test_scan_route_tree_prefixes() {
        let temp_dir = TempDir::new().unwrap();
        let api = temp_dir.path().join("api");
        fs::create_dir_all(api.join("identrust")).unwrap();
        fs::create_dir_all(api.join("policyTemplates")).unwrap();
        fs::write(api.join("health.ts"), "").unwrap();
        fs::write(api.join("identrust/index.ts"), "").unwrap();
        fs::write(api.join("identrust/getAccount.ts"), "").unwrap();
        fs::write(api.join("policyTemplates/list.ts"), "").unwrap();

        let (routes, warnings) = scan_route_tree(&api, &PrefixTables::default()).unwrap();

        assert!(warnings.is_empty());
        let prefixes: Vec<(String, String)> = routes
            .iter()
            .map(|r| {
                (
                    r.path.file_name().unwrap().to_string_lossy().to_string(),
                    r.url_prefix.clone(),
                )
            })
            .collect();
        assert_eq!(
            prefixes,
            vec![
                ("health.ts".to_string(), "".to_string()),
                ("getAccount.ts".to_string(), "/identrust".to_string()),
                ("list.ts".to_string(), "/policytemplates".to_string()),
            ]
        );
    }
}
