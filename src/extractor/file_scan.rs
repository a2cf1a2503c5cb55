//! Line-oriented scan of one route file.
//!
//! Three constructs can span several lines: documentation blocks, router registrations and
//! `next(...)` error-forwarding calls. Each has its own [`Pending`]/[`DocBlock`] state and is
//! closed independently; `.status(...)` calls are recognized line by line.

use crate::error::Result;
use crate::extractor::registration::{
    parse_registration, record_error_call, record_status_call, Registration,
};
use crate::extractor::{ErrorCodeMap, ScannedFile};
use log::debug;
use std::fs;
use std::path::Path;

/// State of the documentation-block concern.
#[derive(Debug)]
enum DocBlock {
    Outside,
    Inside(Vec<String>),
}

/// State of a call that may span lines until a `)` is seen.
#[derive(Debug)]
enum Pending {
    Idle,
    Collecting(Vec<String>),
}

impl Pending {
    /// Feed one line. Returns the joined call text once it is closed.
    ///
    /// `opens` says whether the line starts a new call; an open call restarts on it.
    fn feed(&mut self, line: &str, opens: bool) -> Option<String> {
        let trimmed = line.trim();
        let parts = match std::mem::replace(self, Pending::Idle) {
            _ if opens => vec![trimmed.to_string()],
            Pending::Collecting(mut parts) => {
                parts.push(trimmed.to_string());
                parts
            }
            Pending::Idle => return None,
        };

        if line.contains(')') {
            Some(parts.concat())
        } else {
            *self = Pending::Collecting(parts);
            None
        }
    }
}

/// Per-file scanner state.
struct RouteFileScanner<'a> {
    file: &'a Path,
    url_prefix: &'a str,
    doc: DocBlock,
    last_doc: Option<Vec<String>>,
    registration: Pending,
    error_call: Pending,
    route: Option<(Registration, Option<Vec<String>>)>,
    error_codes: ErrorCodeMap,
}

impl<'a> RouteFileScanner<'a> {
    fn new(file: &'a Path, url_prefix: &'a str) -> Self {
        Self {
            file,
            url_prefix,
            doc: DocBlock::Outside,
            last_doc: None,
            registration: Pending::Idle,
            error_call: Pending::Idle,
            route: None,
            error_codes: ErrorCodeMap::new(),
        }
    }

    fn scan_line(&mut self, raw_line: &str) -> Result<()> {
        let line = raw_line.trim_end();

        if self.scan_doc_line(line) {
            return Ok(());
        }

        if let Some(text) = self.registration.feed(line, line.contains("router.")) {
            if let Some(registration) = parse_registration(&text, self.url_prefix, self.file)? {
                debug!(
                    "Registration {} {} in {}",
                    registration.method,
                    registration.uri,
                    self.file.display()
                );
                self.route = Some((registration, self.last_doc.clone()));
            }
        }

        if let Some(text) = self.error_call.feed(line, line.contains("next(")) {
            record_error_call(&text, &mut self.error_codes);
        }

        if line.contains(".status(") {
            record_status_call(line, &mut self.error_codes);
        }

        Ok(())
    }

    /// Returns true when the line belonged to a documentation block.
    fn scan_doc_line(&mut self, line: &str) -> bool {
        if line.starts_with("/**") {
            if line.len() > 3 && line.ends_with("*/") {
                let inner = line
                    .strip_prefix("/**")
                    .and_then(|rest| rest.strip_suffix("*/"))
                    .unwrap_or("")
                    .trim();
                self.last_doc = Some(doc_text(inner).into_iter().collect());
                self.doc = DocBlock::Outside;
            } else {
                self.doc = DocBlock::Inside(Vec::new());
            }
            return true;
        }

        match &mut self.doc {
            DocBlock::Outside => false,
            DocBlock::Inside(lines) => {
                if line.ends_with("*/") {
                    self.last_doc = Some(std::mem::take(lines));
                    self.doc = DocBlock::Outside;
                } else {
                    let text = match line.find('*') {
                        Some(idx) => &line[idx + 1..],
                        None => line,
                    };
                    lines.extend(doc_text(text));
                }
                true
            }
        }
    }

    fn finish(self) -> ScannedFile {
        let (route, doc_lines) = match self.route {
            Some((registration, doc)) => (registration.into_descriptor(), doc),
            None => {
                debug!("No route registration in {}", self.file.display());
                (None, None)
            }
        };

        let doc_lines = if route.is_some() { doc_lines } else { None };

        ScannedFile {
            path: self.file.to_path_buf(),
            url_prefix: self.url_prefix.to_string(),
            route,
            doc_lines,
            error_codes: self.error_codes,
        }
    }
}

/// Keep a documentation line unless it is empty or the `@swagger` marker.
fn doc_text(text: &str) -> Option<String> {
    if text.trim().is_empty() || text.contains("@swagger") {
        None
    } else {
        Some(text.to_string())
    }
}

/// Scan route source text that lives at `file` under the URL prefix `url_prefix`.
pub fn scan_route_source(file: &Path, url_prefix: &str, source: &str) -> Result<ScannedFile> {
    let mut scanner = RouteFileScanner::new(file, url_prefix);
    for line in source.lines() {
        scanner.scan_line(line)?;
    }
    Ok(scanner.finish())
}

/// Read and scan one route file.
pub fn scan_route_file(file: &Path, url_prefix: &str) -> Result<ScannedFile> {
    debug!("Scanning route file: {}", file.display());
    let source = fs::read_to_string(file)?;
    scan_route_source(file, url_prefix, &source)
}
