/*!
# BatchFixer - Directory of Submissions

Runs one patch set and oracle over every submission in a directory tree and
writes each repaired program to an output directory.
*/

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::fixer::SubmissionFixer;
use super::oracle::TestOracle;
use super::patch::Patch;

pub struct BatchFixer {
    fixer: SubmissionFixer,
    source_extensions: Vec<String>,
    preserve_structure: bool,
}

impl BatchFixer {
    pub fn new(fixer: SubmissionFixer) -> Self {
        Self {
            fixer,
            source_extensions: vec!["py".to_string()],
            preserve_structure: true,
        }
    }

    /// Set the file extensions to process
    pub fn source_extensions(mut self, extensions: Vec<String>) -> Self {
        self.source_extensions = extensions;
        self
    }

    /// Whether to mirror subdirectories in the output; otherwise every
    /// repaired file lands directly in the output directory
    pub fn preserve_structure(mut self, preserve: bool) -> Self {
        self.preserve_structure = preserve;
        self
    }

    pub fn fixer(&self) -> &SubmissionFixer {
        &self.fixer
    }

    /// Fix every submission under `source_dir`
    pub fn fix_directory<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        source_dir: P,
        output_dir: Q,
        patches: &[Patch],
        tests: &TestOracle,
    ) -> Result<BatchSummary> {
        let source_path = source_dir.as_ref();
        let output_path = output_dir.as_ref();

        if !source_path.is_dir() {
            return Err(anyhow!("Source directory does not exist: {}", source_path.display()));
        }

        fs::create_dir_all(output_path)
            .with_context(|| format!("Failed to create output directory {}", output_path.display()))?;

        let mut summary = BatchSummary::new();
        self.fix_directory_recursive(source_path, output_path, source_path, patches, tests, &mut summary)?;

        info!(
            processed = summary.files_processed,
            fixed = summary.files_fixed,
            errors = summary.errors.len(),
            "batch finished"
        );
        Ok(summary)
    }

    /// Fix one submission, writing the repaired program to `output_file`
    /// when a fix is found
    pub fn fix_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        source_file: P,
        output_file: Q,
        patches: &[Patch],
        tests: &TestOracle,
    ) -> Result<BatchSummary> {
        let source_path = source_file.as_ref();
        let output_path = output_file.as_ref();

        let source = fs::read_to_string(source_path)
            .with_context(|| format!("Failed to read {}", source_path.display()))?;

        let mut summary = BatchSummary::new();
        summary.files_processed += 1;

        match self.fixer.fix(&source, patches, tests)? {
            Some(outcome) => {
                if let Some(parent) = output_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(output_path, &outcome.source)
                    .with_context(|| format!("Failed to write {}", output_path.display()))?;
                debug!(file = %source_path.display(), patch = %outcome.patch_name, "fixed");
                summary.files_fixed += 1;
                summary.fixed.push(source_path.to_path_buf());
            }
            None => {
                debug!(file = %source_path.display(), "no fix found");
                summary.files_unfixed += 1;
                summary.unfixed.push(source_path.to_path_buf());
            }
        }

        Ok(summary)
    }

    fn fix_directory_recursive(
        &mut self,
        current_dir: &Path,
        output_dir: &Path,
        source_root: &Path,
        patches: &[Patch],
        tests: &TestOracle,
        summary: &mut BatchSummary,
    ) -> Result<()> {
        let mut entries = fs::read_dir(current_dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for path in entries {
            if path.is_dir() {
                self.fix_directory_recursive(&path, output_dir, source_root, patches, tests, summary)?;
            } else if self.should_process_file(&path) {
                let output_file = if self.preserve_structure {
                    output_dir.join(path.strip_prefix(source_root)?)
                } else {
                    match path.file_name() {
                        Some(name) => output_dir.join(name),
                        None => continue,
                    }
                };

                match self.fix_file(&path, &output_file, patches, tests) {
                    Ok(file_summary) => summary.merge(file_summary),
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "submission failed");
                        summary.files_processed += 1;
                        summary.errors.push(format!("Error processing {}: {e:#}", path.display()));
                    }
                }
            }
        }

        Ok(())
    }

    /// Check if a file should be processed based on its extension
    fn should_process_file(&self, path: &Path) -> bool {
        if let Some(extension) = path.extension() {
            let ext_str = extension.to_string_lossy().to_lowercase();
            self.source_extensions.iter().any(|ext| ext.to_lowercase() == ext_str)
        } else {
            false
        }
    }
}

impl Default for BatchFixer {
    fn default() -> Self {
        Self::new(SubmissionFixer::new())
    }
}

/// Summary of a batch run
#[derive(Debug, Default, Clone, Serialize)]
pub struct BatchSummary {
    pub files_processed: u64,
    pub files_fixed: u64,
    pub files_unfixed: u64,
    pub fixed: Vec<PathBuf>,
    pub unfixed: Vec<PathBuf>,
    pub errors: Vec<String>,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: BatchSummary) {
        self.files_processed += other.files_processed;
        self.files_fixed += other.files_fixed;
        self.files_unfixed += other.files_unfixed;
        self.fixed.extend(other.fixed);
        self.unfixed.extend(other.unfixed);
        self.errors.extend(other.errors);
    }

    pub fn success_rate(&self) -> f64 {
        if self.files_processed == 0 {
            0.0
        } else {
            (self.files_fixed as f64) / (self.files_processed as f64)
        }
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}
