/*!
# Repair Integration Tests

End-to-end repair of small submissions: parse, match, rewrite, validate.
*/

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tutor_core::repair::{load_patches, BatchFixer, Patch, PatternNode, RepairError, SubmissionFixer, TestOracle, Update};
use tutor_core::synthesis::ExampleLearner;
use tutor_core::{Matcher, Parser, PythonParser, ToSource};

const SETUP: &str = "\
def square(x):
    return x * x

def identity(x):
    return x
";

fn product_submission(total: &str, k: &str) -> String {
    format!(
        "{SETUP}
def product(n, term):
    {total}, {k} = 0, 1
    while {k} <= n:
        {total}, {k} = {total} * term({k}), {k} + 1
    return {total}
"
    )
}

fn product_tests() -> TestOracle {
    TestOracle::new()
        .with_case("product(3, identity)", 6)
        .with_case("product(5, identity)", 120)
        .with_case("product(3, square)", 36)
        .with_case("product(5, square)", 14400)
}

fn reset_accumulator() -> anyhow::Result<Patch> {
    Ok(Patch::new(
        "reset-accumulator",
        PatternNode::parse("total, k = $1{0}, 1")?,
        Update::parse_replacement("1")?,
    )?)
}

#[test]
fn test_fix_product_accumulator() -> anyhow::Result<()> {
    let mut fixer = SubmissionFixer::new();
    let outcome = fixer
        .fix(&product_submission("total", "k"), &[reset_accumulator()?], &product_tests())?
        .expect("product should be fixable");

    assert_eq!(outcome.patch_name, "reset-accumulator");
    assert_eq!(outcome.location, 0);
    assert!(outcome.source.contains("    total, k = 1, 1\n"));
    assert!(!outcome.source.contains("total, k = 0, 1"));
    assert_eq!(fixer.stats()["reset-accumulator"].successes, 1);
    Ok(())
}

#[test]
fn test_patch_does_not_fire_on_renamed_variables() -> anyhow::Result<()> {
    let mut fixer = SubmissionFixer::new();
    let outcome = fixer.fix(&product_submission("z", "w"), &[reset_accumulator()?], &product_tests())?;
    assert!(outcome.is_none());
    assert_eq!(fixer.stats()["reset-accumulator"].candidates, 0);
    Ok(())
}

#[test]
fn test_empty_patch_set_finds_nothing() -> anyhow::Result<()> {
    let mut fixer = SubmissionFixer::new();
    let outcome = fixer.fix(&product_submission("total", "k"), &[], &product_tests())?;
    assert!(outcome.is_none());
    assert!(fixer.stats().is_empty());
    Ok(())
}

#[test]
fn test_unparsable_submission_is_fatal() -> anyhow::Result<()> {
    let mut fixer = SubmissionFixer::new();
    let result = fixer.fix("def product(n, term)\n    return 1\n", &[reset_accumulator()?], &product_tests());
    assert!(matches!(result, Err(RepairError::FatalParse(_))));
    Ok(())
}

#[test]
fn test_fix_accumulate_base_case() -> anyhow::Result<()> {
    let submission = format!(
        "{SETUP}
def accumulate(combiner, base, n, term):
    if n == 1:
        return base
    return combiner(term(n), accumulate(combiner, base, n - 1, term))
"
    );
    let tests = TestOracle::new()
        .with_case("accumulate(lambda a, b: a + b, 0, 5, identity)", 15)
        .with_case("accumulate(lambda a, b: a + b, 11, 3, square)", 25)
        .with_case("accumulate(lambda a, b: a * b, 1, 4, square)", 576);
    let patches = vec![Patch::new(
        "base-case",
        PatternNode::parse("n == $1{1}")?,
        Update::parse_replacement("0")?,
    )?];

    let mut fixer = SubmissionFixer::new();
    let outcome = fixer.fix(&submission, &patches, &tests)?.expect("accumulate should be fixable");
    assert!(outcome.source.contains("    if n == 0:\n"));
    // The recursive `n - 1` is not a comparison, so it is left alone.
    assert!(outcome.source.contains("n - 1"));
    Ok(())
}

#[test]
fn test_learned_transformation_fixes_renamed_program() -> anyhow::Result<()> {
    let learned = ExampleLearner::default().learn_from_source("x = 0", "x = 1")?;
    assert_eq!(learned.len(), 3);

    let mut fixer = SubmissionFixer::new();
    let outcome = fixer
        .fix_with_transformations(&product_submission("z", "w"), &learned, &product_tests())?
        .expect("the bare literal rewrite should fix the program");
    assert_eq!(outcome.patch_name, "learned-3");
    assert!(outcome.source.contains("    z, w = 1, 1\n"));
    Ok(())
}

#[test]
fn test_matcher_over_submission() -> anyhow::Result<()> {
    let tree = PythonParser::new().parse(&product_submission("total", "k"))?;
    let found = Matcher::parse("$_ * $_")?.find(&tree);
    // `x * x` in square and `total * term(k)` in product
    assert_eq!(found.len(), 2);
    assert_eq!(found.locations()[0].to_source(), "x * x");

    let slots = Matcher::parse("$1 <= n")?.find(&tree);
    assert_eq!(slots[1].len(), 1);
    assert_eq!(slots[1][0].to_source(), "k");
    Ok(())
}

#[test]
fn test_patch_and_oracle_files() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let patches_path = dir.path().join("patches.json");
    let tests_path = dir.path().join("tests.json");
    fs::write(
        &patches_path,
        r#"[
            {"pattern": "total, k = $1{0}, 1", "slot": 1, "update": {"replace": "1"}},
            {"name": "noop", "pattern": "$1{5}", "update": "delete"}
        ]"#,
    )?;
    fs::write(
        &tests_path,
        r#"[
            {"input": "product(3, identity)", "expected": 6},
            {"input": "product(5, square)", "expected": 14400}
        ]"#,
    )?;

    let patches = load_patches(&patches_path)?;
    assert_eq!(patches.len(), 2);
    assert_eq!(patches[0].name(), "patch-1");
    assert_eq!(patches[1].name(), "noop");

    let tests = TestOracle::load(&tests_path)?;
    assert_eq!(tests.len(), 2);

    let mut fixer = SubmissionFixer::new();
    let outcome = fixer.fix(&product_submission("total", "k"), &patches, &tests)?;
    assert_eq!(outcome.map(|o| o.patch_name), Some("patch-1".to_string()));
    Ok(())
}

#[test]
fn test_batch_directory() -> anyhow::Result<()> {
    let src = TempDir::new()?;
    let out = TempDir::new()?;
    fs::write(src.path().join("a.py"), product_submission("total", "k"))?;
    fs::write(src.path().join("broken.py"), "def product(n, term:\n")?;
    fs::write(src.path().join("notes.txt"), "not a submission")?;
    fs::create_dir(src.path().join("sub"))?;
    fs::write(src.path().join("sub").join("b.py"), product_submission("z", "w"))?;

    let mut batch = BatchFixer::new(SubmissionFixer::new());
    let summary = batch.fix_directory(src.path(), out.path(), &[reset_accumulator()?], &product_tests())?;

    assert_eq!(summary.files_processed, 3);
    assert_eq!(summary.files_fixed, 1);
    assert_eq!(summary.files_unfixed, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(!summary.success());

    let repaired = fs::read_to_string(out.path().join("a.py"))?;
    assert!(repaired.contains("total, k = 1, 1"));
    assert!(!out.path().join("sub").join("b.py").exists());
    assert!(!out.path().join("notes.txt").exists());
    Ok(())
}
