use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use compiler::{CompileOptions, CompiledDocument, IrNode, MappingTable};

const FIXTURE_SUFFIX: &str = ".test.wiki";

#[derive(Debug, Deserialize)]
pub struct ExpectedWarning {
    /// Substring that must appear in the warning message.
    pub contains: String,

    /// If set, the warning's span must start on this 1-based source line.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Inline mapping table, one `[mapping.Template]` table per entry.
    #[serde(default)]
    pub mapping: MappingTable,

    /// Group content into sections before compiling. Defaults to true.
    #[serde(default = "default_sections")]
    pub sections: bool,

    /// Expected IR as JSON, compared structurally.
    #[serde(default)]
    pub expect_ir: Option<String>,

    /// Expected warnings. If present (even empty), warning count and content are checked.
    /// Parse warnings come first, then compile warnings.
    #[serde(default)]
    pub expect_warnings: Option<Vec<ExpectedWarning>>,
}

fn default_sections() -> bool {
    true
}

/// Split a `.test.wiki` file into its TOML config and wikitext body.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    // An empty front matter closes immediately
    let (toml_str, rest) = if let Some(rest) = after_open.strip_prefix("---") {
        ("", rest)
    } else {
        let close_pos = after_open
            .find("\n---")
            .ok_or("missing closing --- frontmatter delimiter")?;
        (
            after_open[..close_pos].trim_end_matches('\r'),
            &after_open[close_pos + 4..],
        )
    };
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };
    let description = config.description.clone();

    let options = CompileOptions {
        sections: config.sections,
    };
    let document = compiler::compile_source(
        path.display().to_string(),
        source.to_string(),
        0,
        &config.mapping,
        options,
    );

    if let Some(expected) = &config.expect_ir {
        if let Some(reason) = check_ir(&document.ir, expected) {
            return fail(description, reason);
        }
    }

    if let Some(expected_warnings) = &config.expect_warnings {
        let warnings = collect_warnings(&document);
        if let Some(reason) = check_warnings(source, &warnings, expected_warnings) {
            return fail(description, reason);
        }
    }

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Pass,
    }
}

/// Compare the IR against the expected JSON. Returns `Some(reason)` on mismatch.
fn check_ir(actual: &[IrNode], expected: &str) -> Option<String> {
    let expected: Vec<IrNode> = match serde_json::from_str(expected) {
        Ok(nodes) => nodes,
        Err(e) => return Some(format!("expect_ir is not valid IR JSON: {}", e)),
    };
    if actual == expected.as_slice() {
        return None;
    }
    let render = |nodes: &[IrNode]| {
        serde_json::to_string_pretty(nodes).unwrap_or_else(|e| format!("<unserializable: {}>", e))
    };
    Some(format!(
        "IR mismatch\n  expected:\n{}\n  actual:\n{}",
        indent(&render(&expected)),
        indent(&render(actual))
    ))
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A warning from either stage, reduced to what fixtures can check.
struct Warning {
    message: String,
    span: Option<Range<usize>>,
}

fn collect_warnings(document: &CompiledDocument) -> Vec<Warning> {
    let parse = document.parse_warnings.iter().map(|w| Warning {
        message: w.message.clone(),
        span: Some(w.span.clone()),
    });
    let compile = document.compile_warnings.iter().map(|w| Warning {
        message: w.to_string(),
        span: w.span.clone(),
    });
    parse.chain(compile).collect()
}

/// Convert a byte offset in `source` to a 1-based line number.
fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

/// Check that actual warnings match expectations. Returns `Some(reason)` on mismatch.
fn check_warnings(source: &str, actual: &[Warning], expected: &[ExpectedWarning]) -> Option<String> {
    if actual.len() != expected.len() {
        let actual_msgs: Vec<String> = actual
            .iter()
            .map(|w| format!("  - {}", w.message))
            .collect();
        return Some(format!(
            "expected {} warning(s), got {}\n  actual warnings:\n{}",
            expected.len(),
            actual.len(),
            if actual_msgs.is_empty() {
                "    (none)".to_string()
            } else {
                actual_msgs.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in actual.iter().zip(expected.iter()).enumerate() {
        if !actual.message.contains(&expected.contains) {
            return Some(format!(
                "warning[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, actual.message
            ));
        }

        if let Some(expected_line) = expected.line {
            match &actual.span {
                Some(span) => {
                    let actual_line = byte_offset_to_line(source, span.start);
                    if actual_line != expected_line {
                        return Some(format!(
                            "warning[{}]: expected on line {}, but span is on line {}",
                            i, expected_line, actual_line
                        ));
                    }
                }
                None => {
                    return Some(format!(
                        "warning[{}]: expected on line {}, but warning has no span",
                        i, expected_line
                    ));
                }
            }
        }
    }

    None
}

/// Discover `.test.wiki` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(FIXTURE_SUFFIX) {
                let category = path
                    .parent()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                out.entry(category).or_default().push(path);
            }
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn bold(s: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[1m{}\x1b[0m", s)
    }
}

fn test_label(result: &TestResult) -> &str {
    result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_suffix(FIXTURE_SUFFIX))
            .unwrap_or("?")
    })
}

/// Run all `.test.wiki` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let run_categories: BTreeMap<String, Vec<PathBuf>> = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all_categories = discover_categorized(path);
        if all_categories.is_empty() {
            eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
            return 1;
        }
        select_categories(all_categories, categories)
    };

    if run_categories.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &run_categories {
        if !path.is_file() {
            let header = if cat.is_empty() { "(root)" } else { cat.as_str() };
            eprintln!();
            eprintln!("{}", bold(header, no_color));
        }

        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", pass_label(no_color), test_label(&result));
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", fail_label(no_color), test_label(&result));
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        let ok = if no_color { "ok" } else { "\x1b[32mok\x1b[0m" };
        eprintln!("test result: {}. {} passed, 0 failed", ok, passed);
        0
    } else {
        let label = if no_color { "FAILED" } else { "\x1b[31mFAILED\x1b[0m" };
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            label,
            passed,
            failed,
            passed + failed
        );
        1
    }
}

/// Keep the requested categories and their subcategories.
fn select_categories(
    all_categories: BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<String, Vec<PathBuf>> {
    if requested.is_empty() {
        return all_categories;
    }

    let mut filtered = BTreeMap::new();
    for req in requested {
        let req = req.trim_matches('/');
        let mut found = false;
        for (cat, files) in &all_categories {
            if cat == req || cat.starts_with(&format!("{}/", req)) {
                filtered.insert(cat.clone(), files.clone());
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all_categories
                    .keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
    }

    #[test]
    fn all_fixtures_pass() {
        let categories = discover_categorized(&fixtures_dir());
        assert!(!categories.is_empty(), "no fixtures found");
        for file in categories.values().flatten() {
            let result = run_single_test(file);
            if let TestOutcome::Fail(reason) = &result.outcome {
                panic!("{} failed:\n{}", file.display(), reason);
            }
        }
    }

    #[test]
    fn categories_follow_subfolders() {
        let categories = discover_categorized(&fixtures_dir());
        assert!(categories.contains_key("blocks"));
        assert!(categories.contains_key("sections"));
        let selected = select_categories(categories, &["blocks/".to_string()]);
        let keys: Vec<_> = selected.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["blocks"]);
    }

    #[test]
    fn front_matter_splits_config_and_body() {
        let (config, body) =
            parse_test_file("---\ndescription = \"d\"\nsections = false\n---\n== A ==\n").unwrap();
        assert_eq!(config.description.as_deref(), Some("d"));
        assert!(!config.sections);
        assert!(config.mapping.is_empty());
        assert_eq!(body, "== A ==\n");

        let (config, body) = parse_test_file("---\n---\nbody").unwrap();
        assert!(config.sections);
        assert_eq!(body, "body");

        assert!(parse_test_file("no front matter").is_err());
        assert!(parse_test_file("---\nunterminated = 1\n").is_err());
    }

    #[test]
    fn mismatched_expectations_fail() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("wrong.test.wiki");
        std::fs::write(
            &file,
            "---\nexpect_ir = '[{\"type\": \"text\", \"content\": \"other\"}]'\n---\nactual\n",
        )
        .unwrap();
        let result = run_single_test(&file);
        match result.outcome {
            TestOutcome::Fail(reason) => assert!(reason.contains("IR mismatch"), "{}", reason),
            TestOutcome::Pass => panic!("expected failure"),
        }
        assert_eq!(run_tests(dir.path(), true, &[]), 1);
    }

    #[test]
    fn warning_lines_are_checked() {
        let source = "a\n{{End}}";
        let warnings = vec![Warning {
            message: "block end `End` has no open block to close".to_string(),
            span: Some(2..9),
        }];
        let on_line = |line| {
            vec![ExpectedWarning {
                contains: "no open block".to_string(),
                line: Some(line),
            }]
        };
        assert!(check_warnings(source, &warnings, &on_line(2)).is_none());
        assert!(check_warnings(source, &warnings, &on_line(1)).is_some());
        assert!(check_warnings(source, &[], &on_line(2)).is_some());
    }
}
