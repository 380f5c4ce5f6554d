//! Runs parsed commands against the tutor core
//!
//! A [`Session`] owns the effective configuration (file values with command
//! line overrides applied) and reports through a [`Notifier`].

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tutor_core::repair::{load_patches, BatchFixer, CandidateSource, FixOutcome, SubmissionFixer, TestOracle};
use tutor_core::synthesis::{EditGrammar, ExampleLearner};
use tutor_core::{Matcher, Parser, PythonParser, ToSource, TutorConfig};

use crate::commands::{GlobalOptions, TutorCommand};
use crate::notifier::{DefaultNotifier, Notifier};

/// Process exit status of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// A fix, match or transformation was found
    Found,
    /// The command ran but found nothing
    NotFound,
    /// Unparsable submission, malformed patch, unreadable file
    Fatal,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Found => 0,
            ExitStatus::NotFound => 1,
            ExitStatus::Fatal => 2,
        }
    }
}

pub struct Session {
    config: TutorConfig,
    notifier: Box<dyn Notifier>,
}

impl Session {
    pub fn new(config: TutorConfig) -> Self {
        Self {
            config,
            notifier: Box::new(DefaultNotifier::new()),
        }
    }

    /// Load the configuration file named in `options`, if any, then apply
    /// the command-line overrides.
    pub fn from_options(options: &GlobalOptions) -> Result<Self> {
        let mut config = match &options.config {
            Some(path) => TutorConfig::load(path)?,
            None => TutorConfig::default(),
        };
        if let Some(timeout_ms) = options.timeout_ms {
            config.execution.timeout_ms = timeout_ms;
        }
        if options.debug {
            config.debug = true;
        }
        Ok(Self::new(config))
    }

    pub fn set_notifier(&mut self, notifier: Box<dyn Notifier>) {
        self.notifier = notifier;
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn config(&self) -> &TutorConfig {
        &self.config
    }

    /// Run a command. Errors are fatal; "nothing found" is a status.
    pub fn handle_command(&mut self, command: TutorCommand) -> Result<ExitStatus> {
        match command {
            TutorCommand::Fix {
                source,
                patches,
                tests,
                out,
            } => self.fix(&source, &patches, &tests, out.as_deref()),
            TutorCommand::Learn {
                before,
                after,
                grammar,
                apply,
                tests,
            } => self.learn(&before, &after, grammar.as_deref(), apply.as_deref(), tests.as_deref()),
            TutorCommand::Batch {
                dir,
                patches,
                tests,
                out,
            } => self.batch(&dir, &patches, &tests, &out),
            TutorCommand::Match { source, pattern } => self.match_pattern(&source, &pattern),
        }
    }

    fn fix(&mut self, source: &Path, patches: &Path, tests: &Path, out: Option<&Path>) -> Result<ExitStatus> {
        let submission = read_source(source)?;
        let patches = load_patches(patches)?;
        let tests = TestOracle::load(tests)?;
        info!(submission = %source.display(), patches = patches.len(), tests = tests.len(), "fixing");
        self.search(&submission, &patches, &tests, out)
    }

    fn learn(
        &mut self,
        before: &Path,
        after: &Path,
        grammar: Option<&Path>,
        apply: Option<&Path>,
        tests: Option<&Path>,
    ) -> Result<ExitStatus> {
        let grammar = match grammar {
            Some(path) => EditGrammar::load(path)?,
            None => self.config.grammar()?,
        };
        let learner = ExampleLearner::new(grammar);
        let learned = learner.learn_from_source(&read_source(before)?, &read_source(after)?)?;
        if learned.is_empty() {
            self.notifier.on_result("nothing learned from the example", 0);
            return Ok(ExitStatus::NotFound);
        }

        let Some(apply) = apply else {
            for transformation in &learned {
                self.notifier.on_output(&transformation.to_string());
            }
            self.notifier
                .on_result(&format!("learned {} transformations", learned.len()), 0);
            return Ok(ExitStatus::Found);
        };
        for transformation in &learned {
            debug!(%transformation, "learned");
        }

        let submission = read_source(apply)?;
        if let Some(tests) = tests {
            let tests = TestOracle::load(tests)?;
            return self.search(&submission, &learned, &tests, None);
        }

        // Without tests, every rewrite is a suggestion.
        let tree = PythonParser::new().parse(&submission)?;
        let mut rewrites = 0;
        for transformation in &learned {
            for candidate in transformation.invoke(&tree) {
                rewrites += 1;
                self.notifier
                    .on_output(&format!("# {}\n{}", transformation.name(), candidate.to_source()));
            }
        }
        self.notifier.on_result(&format!("{rewrites} rewrites"), 0);
        Ok(if rewrites > 0 {
            ExitStatus::Found
        } else {
            ExitStatus::NotFound
        })
    }

    fn batch(&mut self, dir: &Path, patches: &Path, tests: &Path, out: &Path) -> Result<ExitStatus> {
        let patches = load_patches(patches)?;
        let tests = TestOracle::load(tests)?;

        let start = Instant::now();
        let mut batch = BatchFixer::new(SubmissionFixer::from_config(&self.config));
        let summary = batch.fix_directory(dir, out, &patches, &tests)?;
        let duration_ms = start.elapsed().as_millis() as u64;

        for error in &summary.errors {
            self.notifier.on_error(error);
        }
        self.notifier.on_output(&serde_json::to_string_pretty(&summary)?);
        self.notifier.on_result(
            &format!(
                "{} of {} submissions fixed ({:.1}%)",
                summary.files_fixed,
                summary.files_processed,
                summary.success_rate() * 100.0
            ),
            duration_ms,
        );
        Ok(if summary.files_fixed > 0 {
            ExitStatus::Found
        } else {
            ExitStatus::NotFound
        })
    }

    fn match_pattern(&mut self, source: &Path, pattern: &str) -> Result<ExitStatus> {
        let tree = PythonParser::new().parse(&read_source(source)?)?;
        let matcher = Matcher::parse(pattern)?;

        let mut found = 0;
        for (index, location) in matcher.matches(&tree).enumerate() {
            found += 1;
            self.notifier
                .on_output(&format!("[{index}] {}", location.root.to_source().trim_end()));
            for (slot, node) in &location.bindings {
                self.notifier
                    .on_output(&format!("    ${slot} = {}", node.to_source().trim_end()));
            }
        }
        self.notifier.on_result(&format!("{found} matches"), 0);
        Ok(if found > 0 {
            ExitStatus::Found
        } else {
            ExitStatus::NotFound
        })
    }

    /// Shared tail of `fix` and `learn --tests`.
    fn search<S: CandidateSource>(
        &mut self,
        submission: &str,
        sources: &[S],
        tests: &TestOracle,
        out: Option<&Path>,
    ) -> Result<ExitStatus> {
        let mut fixer = SubmissionFixer::from_config(&self.config);
        let start = Instant::now();
        let outcome = fixer.fix_with(submission, sources, tests)?;
        let duration_ms = start.elapsed().as_millis() as u64;

        for stats in fixer.stats().values() {
            debug!(
                patch = %stats.patch_name,
                candidates = stats.candidates,
                successes = stats.successes,
                success_rate = stats.success_rate(),
                average_ms = stats.average_time_ms(),
                "patch statistics"
            );
        }

        match outcome {
            Some(outcome) => {
                self.emit_fix(&outcome, out)?;
                self.notifier.on_result(
                    &format!(
                        "fixed by {} at location {} after {} candidates",
                        outcome.patch_name, outcome.location, outcome.candidates_tried
                    ),
                    duration_ms,
                );
                Ok(ExitStatus::Found)
            }
            None => {
                self.notifier.on_result("no fix found", duration_ms);
                Ok(ExitStatus::NotFound)
            }
        }
    }

    fn emit_fix(&self, outcome: &FixOutcome, out: Option<&Path>) -> Result<()> {
        match out {
            Some(path) => {
                fs::write(path, &outcome.source).with_context(|| format!("Failed to write {}", path.display()))
            }
            None => {
                self.notifier.on_output(&outcome.source);
                Ok(())
            }
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Found.code(), 0);
        assert_eq!(ExitStatus::NotFound.code(), 1);
        assert_eq!(ExitStatus::Fatal.code(), 2);
    }

    #[test]
    fn test_overrides_apply_on_top_of_defaults() {
        let options = GlobalOptions {
            config: None,
            timeout_ms: Some(75),
            debug: true,
        };
        let session = Session::from_options(&options).unwrap();
        assert_eq!(session.config().execution.timeout_ms, 75);
        assert!(session.config().debug);
        assert_eq!(session.config().search, TutorConfig::default().search);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let options = GlobalOptions {
            config: Some("/nonexistent/tutor.json".into()),
            ..GlobalOptions::default()
        };
        assert!(Session::from_options(&options).is_err());
    }
}
