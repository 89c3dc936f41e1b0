//! Static analysis of Python sources
//!
//! [`CodeAnalyzer::analyze_file`] reads a file and parses it with
//! `rustpython-parser`. The resulting [`SyntaxTree`] carries the statements,
//! the original text and a small [`SourceSummary`]. The analyzer is also the
//! harness's code-context provider: it can cut numbered snippets out of a
//! file and find the failing line in a Python traceback.

use regex::Regex;
use rustpython_parser::ast::{self, Stmt};
use rustpython_parser::text_size::TextSize;
use rustpython_parser::{parse, Mode};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};

/// Lines shown on each side of the line of interest.
pub const DEFAULT_CONTEXT_RADIUS: usize = 3;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("File not found at {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("Syntax error in {} at line {line}, column {column}: {message}", .path.display())]
    SyntaxError {
        path: PathBuf,
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Failed to analyze {}: {source}", .path.display())]
    AnalysisFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// Top-level shape of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub functions: Vec<String>,
    pub classes: Vec<String>,
    pub imports: usize,
    pub line_count: usize,
}

/// A parsed Python module.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub path: PathBuf,
    pub source: String,
    pub statements: Vec<Stmt>,
    pub summary: SourceSummary,
}

/// Supplies source lines around a location for analysis prompts.
pub trait ContextProvider: Send + Sync {
    fn context(&self, path: &Path, line: usize) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct CodeAnalyzer {
    context_radius: usize,
}

impl CodeAnalyzer {
    pub fn new() -> Self {
        Self {
            context_radius: DEFAULT_CONTEXT_RADIUS,
        }
    }

    pub fn with_context_radius(mut self, radius: usize) -> Self {
        self.context_radius = radius;
        self
    }

    /// Read and parse a Python file. A new tree is built on every call.
    pub fn analyze_file(&self, path: impl AsRef<Path>) -> AnalyzerResult<SyntaxTree> {
        let path = path.as_ref();
        let source = read_source(path)?;
        let tree = self.analyze_source(path, source)?;

        debug!(
            "Parsed {}: {} statements, {} functions, {} classes",
            path.display(),
            tree.statements.len(),
            tree.summary.functions.len(),
            tree.summary.classes.len()
        );
        Ok(tree)
    }

    /// Parse source text that has already been read from `path`.
    pub fn analyze_source(&self, path: &Path, source: String) -> AnalyzerResult<SyntaxTree> {
        let source_path = path.to_string_lossy();
        let module = parse(&source, Mode::Module, &source_path).map_err(|e| {
            let (line, column) = line_and_column(&source, e.offset);
            error!("Syntax error in {}: {}", path.display(), e.error);
            AnalyzerError::SyntaxError {
                path: path.to_path_buf(),
                message: e.error.to_string(),
                line,
                column,
            }
        })?;

        let statements = match module {
            ast::Mod::Module(module) => module.body,
            // Mode::Module only ever yields a module.
            _ => Vec::new(),
        };
        let summary = summarize(&statements, &source);

        Ok(SyntaxTree {
            path: path.to_path_buf(),
            source,
            statements,
            summary,
        })
    }

    /// Numbered lines of `source` around the 1-based `line`.
    pub fn snippet(&self, source: &str, line: usize) -> Option<String> {
        let lines: Vec<&str> = source.lines().collect();
        if line == 0 || line > lines.len() {
            return None;
        }

        let start = line.saturating_sub(self.context_radius).max(1);
        let end = (line + self.context_radius).min(lines.len());
        let width = end.to_string().len();

        let rendered = (start..=end)
            .map(|n| {
                let marker = if n == line { ">" } else { " " };
                format!("{} {:>width$} | {}", marker, n, lines[n - 1], width = width)
            })
            .collect::<Vec<_>>()
            .join("\n");
        Some(rendered)
    }

    /// Like [`CodeAnalyzer::snippet`], reading the file first.
    pub fn context_snippet(&self, path: &Path, line: usize) -> Option<String> {
        let source = fs::read_to_string(path).ok()?;
        self.snippet(&source, line)
    }
}

impl Default for CodeAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextProvider for CodeAnalyzer {
    fn context(&self, path: &Path, line: usize) -> Option<String> {
        self.context_snippet(path, line)
    }
}

/// Line of the innermost traceback frame that belongs to `script`.
///
/// Frames are matched on file name so relative and absolute spellings of the
/// same script agree. Falls back to the innermost frame of any file.
pub fn traceback_line(stderr: &str, script: &Path) -> Option<usize> {
    let frame = Regex::new(r#"File "([^"]+)", line (\d+)"#).ok()?;
    let script_name = script.file_name();

    let frames: Vec<(PathBuf, usize)> = frame
        .captures_iter(stderr)
        .filter_map(|caps| {
            let file = PathBuf::from(caps.get(1)?.as_str());
            let line = caps.get(2)?.as_str().parse().ok()?;
            Some((file, line))
        })
        .collect();

    frames
        .iter()
        .rev()
        .find(|(file, _)| script_name.is_some() && file.file_name() == script_name)
        .or_else(|| frames.last())
        .map(|(_, line)| *line)
}

fn read_source(path: &Path) -> AnalyzerResult<String> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            return Err(AnalyzerError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            error!("File not found at {}", path.display());
            return Err(AnalyzerError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(AnalyzerError::AnalysisFailure {
                path: path.to_path_buf(),
                source: e,
            })
        }
    }

    fs::read_to_string(path).map_err(|e| {
        error!("Unexpected error while reading {}: {}", path.display(), e);
        AnalyzerError::AnalysisFailure {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

fn summarize(statements: &[Stmt], source: &str) -> SourceSummary {
    let mut summary = SourceSummary {
        line_count: source.lines().count(),
        ..SourceSummary::default()
    };

    for stmt in statements {
        match stmt {
            Stmt::FunctionDef(def) => summary.functions.push(def.name.to_string()),
            Stmt::AsyncFunctionDef(def) => summary.functions.push(def.name.to_string()),
            Stmt::ClassDef(def) => summary.classes.push(def.name.to_string()),
            Stmt::Import(_) | Stmt::ImportFrom(_) => summary.imports += 1,
            _ => {}
        }
    }

    summary
}

/// 1-based line and column of a byte offset.
fn line_and_column(source: &str, offset: TextSize) -> (usize, usize) {
    let offset = usize::from(offset).min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => before[newline + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}
