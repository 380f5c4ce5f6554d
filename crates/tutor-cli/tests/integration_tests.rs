use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tutor_cli::{build_cli, parse_command, ExitStatus, RecordingNotifier, Session, TutorCommand};
use tutor_core::TutorConfig;

const BUGGY: &str = "\
def square(x):
    return x * x

def product(n, term):
    total, k = 0, 1
    while k <= n:
        total, k = total * term(k), k + 1
    return total
";

const PATCHES: &str = r#"[{"pattern": "total, k = $1{0}, 1", "slot": 1, "update": {"replace": "1"}}]"#;

const TESTS: &str = r#"[
    {"input": "product(3, square)", "expected": 36},
    {"input": "product(4, square)", "expected": 576}
]"#;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn session() -> (Session, RecordingNotifier) {
    let mut session = Session::new(TutorConfig::default());
    let notifier = RecordingNotifier::new();
    session.set_notifier(Box::new(notifier.clone()));
    (session, notifier)
}

#[test]
fn test_fix_prints_repaired_program() {
    let temp_dir = TempDir::new().unwrap();
    let (mut session, notifier) = session();

    let status = session
        .handle_command(TutorCommand::Fix {
            source: write(temp_dir.path(), "hw.py", BUGGY),
            patches: write(temp_dir.path(), "patches.json", PATCHES),
            tests: write(temp_dir.path(), "tests.json", TESTS),
            out: None,
        })
        .unwrap();

    assert_eq!(status, ExitStatus::Found);
    assert_eq!(notifier.output().len(), 1);
    assert!(notifier.output()[0].contains("total, k = 1, 1"));
    assert!(notifier.results()[0].starts_with("fixed by patch-1"));
}

#[test]
fn test_fix_writes_out_file() {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("fixed.py");
    let (mut session, notifier) = session();

    let status = session
        .handle_command(TutorCommand::Fix {
            source: write(temp_dir.path(), "hw.py", BUGGY),
            patches: write(temp_dir.path(), "patches.json", PATCHES),
            tests: write(temp_dir.path(), "tests.json", TESTS),
            out: Some(out.clone()),
        })
        .unwrap();

    assert_eq!(status, ExitStatus::Found);
    assert!(notifier.output().is_empty());
    assert!(fs::read_to_string(out).unwrap().contains("total, k = 1, 1"));
}

#[test]
fn test_fix_without_applicable_patch() {
    let temp_dir = TempDir::new().unwrap();
    let (mut session, notifier) = session();

    let status = session
        .handle_command(TutorCommand::Fix {
            source: write(temp_dir.path(), "hw.py", &BUGGY.replace("total", "acc")),
            patches: write(temp_dir.path(), "patches.json", PATCHES),
            tests: write(temp_dir.path(), "tests.json", TESTS),
            out: None,
        })
        .unwrap();

    assert_eq!(status, ExitStatus::NotFound);
    assert_eq!(notifier.results(), vec!["no fix found"]);
}

#[test]
fn test_unparsable_submission_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let (mut session, _) = session();

    let result = session.handle_command(TutorCommand::Fix {
        source: write(temp_dir.path(), "hw.py", "def product(n, term:\n"),
        patches: write(temp_dir.path(), "patches.json", PATCHES),
        tests: write(temp_dir.path(), "tests.json", TESTS),
        out: None,
    });
    assert!(result.is_err());
}

#[test]
fn test_learn_lists_transformations() {
    let temp_dir = TempDir::new().unwrap();
    let (mut session, notifier) = session();

    let status = session
        .handle_command(TutorCommand::Learn {
            before: write(temp_dir.path(), "before.py", "x = 0\n"),
            after: write(temp_dir.path(), "after.py", "x = 1\n"),
            grammar: None,
            apply: None,
            tests: None,
        })
        .unwrap();

    assert_eq!(status, ExitStatus::Found);
    let output = notifier.output();
    assert_eq!(output.len(), 3);
    assert!(output[0].starts_with("learned-1 [1.000]"));
}

#[test]
fn test_learn_and_apply_with_tests() {
    let temp_dir = TempDir::new().unwrap();
    let grammar = write(
        temp_dir.path(),
        "edits.grammar",
        "language transformation;\nedit update;\ncontext 1;\nabstract expression, name, literal;\nlimit 4;\n",
    );
    let (mut session, notifier) = session();

    let status = session
        .handle_command(TutorCommand::Learn {
            before: write(temp_dir.path(), "before.py", "x = 0\n"),
            after: write(temp_dir.path(), "after.py", "x = 1\n"),
            grammar: Some(grammar),
            apply: Some(write(temp_dir.path(), "hw.py", BUGGY)),
            tests: Some(write(temp_dir.path(), "tests.json", TESTS)),
        })
        .unwrap();

    assert_eq!(status, ExitStatus::Found);
    assert!(notifier.output()[0].contains("total, k = 1, 1"));
}

#[test]
fn test_learn_with_bad_grammar_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let (mut session, _) = session();

    let result = session.handle_command(TutorCommand::Learn {
        before: write(temp_dir.path(), "before.py", "x = 0\n"),
        after: write(temp_dir.path(), "after.py", "x = 1\n"),
        grammar: Some(write(temp_dir.path(), "edits.grammar", "edit update;\n")),
        apply: None,
        tests: None,
    });
    assert!(result.is_err());
}

#[test]
fn test_match_reports_locations_and_bindings() {
    let temp_dir = TempDir::new().unwrap();
    let (mut session, notifier) = session();

    let status = session
        .handle_command(TutorCommand::Match {
            source: write(temp_dir.path(), "hw.py", BUGGY),
            pattern: "$1 <= n".to_string(),
        })
        .unwrap();

    assert_eq!(status, ExitStatus::Found);
    assert_eq!(notifier.output(), vec!["[0] k <= n", "    $1 = k"]);
    assert_eq!(notifier.results(), vec!["1 matches"]);
}

#[test]
fn test_batch_fixes_directory() {
    let temp_dir = TempDir::new().unwrap();
    let submissions = temp_dir.path().join("submissions");
    fs::create_dir(&submissions).unwrap();
    write(&submissions, "alice.py", BUGGY);
    write(&submissions, "bob.py", &BUGGY.replace("total", "acc"));
    let out = temp_dir.path().join("fixed");
    let (mut session, notifier) = session();

    let status = session
        .handle_command(TutorCommand::Batch {
            dir: submissions,
            patches: write(temp_dir.path(), "patches.json", PATCHES),
            tests: write(temp_dir.path(), "tests.json", TESTS),
            out: out.clone(),
        })
        .unwrap();

    assert_eq!(status, ExitStatus::Found);
    assert!(out.join("alice.py").exists());
    assert!(!out.join("bob.py").exists());
    let summary: serde_json::Value = serde_json::from_str(&notifier.output()[0]).unwrap();
    assert_eq!(summary["files_processed"], 2);
    assert_eq!(summary["files_fixed"], 1);
    assert!(notifier.results()[0].starts_with("1 of 2 submissions fixed"));
}

#[test]
fn test_command_line_to_session() {
    let temp_dir = TempDir::new().unwrap();
    let source = write(temp_dir.path(), "hw.py", BUGGY);
    let source = source.to_str().unwrap();
    let matches = build_cli()
        .try_get_matches_from(["tutor", "match", source, "--pattern", "$_ * $_", "--timeout-ms", "100"])
        .unwrap();
    let (command, options) = parse_command(&matches).unwrap();

    let mut session = Session::from_options(&options).unwrap();
    assert_eq!(session.config().execution.timeout_ms, 100);
    let notifier = RecordingNotifier::new();
    session.set_notifier(Box::new(notifier.clone()));
    assert_eq!(session.handle_command(command).unwrap(), ExitStatus::Found);
    assert_eq!(notifier.results(), vec!["2 matches"]);
}
