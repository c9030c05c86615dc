mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use compiler::{CompileOptions, CompiledDocument, MappingTable};

#[derive(Parser)]
#[command(name = "wikir", version, about = "Compile wikitext templates into a component IR")]
struct Cli {
    /// Disable colored diagnostic output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log debug output from the parser and compiler (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a wikitext file and dump its nodes as JSON
    Parse(ParseArgs),

    /// Compile wikitext files to IR JSON
    Compile(CompileArgs),

    /// Run .test.wiki fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct ParseArgs {
    /// Wikitext source file
    file: String,

    /// Group nodes under their headings
    #[arg(long)]
    sections: bool,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
struct CompileArgs {
    /// `.wiki` files or directories to search for them
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// TOML mapping table (template name → component)
    #[arg(short, long)]
    mapping: Option<PathBuf>,

    /// Directory for `<stem>.ir.json` files. Defaults to next to each input.
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Keep headings flat instead of grouping content into sections
    #[arg(long)]
    no_sections: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.wiki file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

#[derive(Serialize)]
struct ParseOutput<'a, T: Serialize> {
    source_file: &'a str,
    content: T,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Parse(parse_args) => do_parse(parse_args, cli.no_color),
        Command::Compile(compile_args) => {
            let exit_code = do_compile(compile_args, cli.no_color);
            process::exit(exit_code);
        }
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

/// Library warnings are already rendered as diagnostics, so logging stays
/// quiet unless asked for.
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "wikitext=debug,compiler=debug,warn"
    } else {
        "error"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn color_choice(no_color: bool) -> ColorChoice {
    if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

fn do_parse(args: ParseArgs, no_color: bool) {
    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());

    let document = wikitext::parser::Parser::new(source, file_id).parse();
    let diagnostics: Vec<Diagnostic<usize>> =
        document.warnings.iter().map(|w| w.to_diagnostic()).collect();
    emit_diagnostics(color_choice(no_color), &files, &diagnostics);

    let json = if args.sections {
        serde_json::to_string_pretty(&ParseOutput {
            source_file: &args.file,
            content: document.sections(),
        })
    } else {
        serde_json::to_string_pretty(&ParseOutput {
            source_file: &args.file,
            content: &document.nodes,
        })
    };
    let json = match json {
        Ok(json) => json,
        Err(e) => {
            eprintln!("error: cannot serialize '{}': {}", args.file, e);
            process::exit(1);
        }
    };

    match &args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, json) {
                eprintln!("error: cannot write '{}': {}", path.display(), e);
                process::exit(1);
            }
        }
        None => println!("{}", json),
    }
}

/// Compile every input document. A failing document is reported and the run
/// continues; the exit code is 1 if any document failed.
fn do_compile(args: CompileArgs, no_color: bool) -> i32 {
    let mapping = match &args.mapping {
        Some(path) => match MappingTable::load(path) {
            Ok(table) => table,
            Err(e) => {
                eprintln!("error: {}", e);
                return 1;
            }
        },
        None => MappingTable::new(),
    };
    if mapping.is_empty() {
        eprintln!("warning: mapping table is empty, every template stays text");
    }

    if let Some(dir) = &args.out_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("error: cannot create '{}': {}", dir.display(), e);
            return 1;
        }
    }

    let options = CompileOptions {
        sections: !args.no_sections,
    };
    let inputs = collect_inputs(&args.paths);
    if inputs.is_empty() {
        eprintln!("error: no .wiki files found");
        return 1;
    }

    let mut compiled = 0usize;
    let mut failed = 0usize;

    for input in &inputs {
        let document = match compiler::compile_file(input, 0, &mapping, options) {
            Ok(document) => document,
            Err(failure) => {
                eprintln!("error: {}", failure);
                failed += 1;
                continue;
            }
        };
        report_document(&document, no_color);

        let output = output_path(input, args.out_dir.as_deref());
        match write_ir(&document, &output) {
            Ok(()) => {
                compiled += 1;
                tracing::debug!(input = %input.display(), output = %output.display(), "wrote IR");
            }
            Err(reason) => {
                eprintln!("error: {}: {}", document.document_id, reason);
                failed += 1;
            }
        }
    }

    eprintln!("compiled {} document(s), {} failed", compiled, failed);
    if failed == 0 { 0 } else { 1 }
}

fn report_document(document: &CompiledDocument, no_color: bool) {
    if document.warning_count() == 0 {
        return;
    }
    let mut files = SimpleFiles::new();
    files.add(document.document_id.clone(), document.source.clone());
    emit_diagnostics(color_choice(no_color), &files, &document.diagnostics());
}

fn write_ir(document: &CompiledDocument, output: &Path) -> Result<(), String> {
    let json = document
        .to_json()
        .map_err(|e| format!("cannot serialize IR: {}", e))?;
    std::fs::write(output, json).map_err(|e| format!("cannot write '{}': {}", output.display(), e))
}

/// `<stem>.ir.json`, in `out_dir` if given, else next to the input.
fn output_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    match out_dir {
        Some(dir) => {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string());
            dir.join(format!("{}.ir.json", stem))
        }
        None => input.with_extension("ir.json"),
    }
}

/// Files are taken as given; directories are searched recursively for
/// `.wiki` files, skipping `.test.wiki` fixtures.
fn collect_inputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            collect_wiki_files(path, &mut found);
            found.sort();
            inputs.extend(found);
        } else {
            inputs.push(path.clone());
        }
    }
    inputs
}

fn collect_wiki_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_wiki_files(&path, out);
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(".wiki") && !name.ends_with(".test.wiki") {
                out.push(path);
            }
        }
    }
}

fn emit_diagnostics(
    color_choice: ColorChoice,
    files: &SimpleFiles<String, String>,
    diagnostics: &[Diagnostic<usize>],
) {
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    for diagnostic in diagnostics {
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_goes_next_to_input_by_default() {
        assert_eq!(
            output_path(Path::new("pages/Intro.wiki"), None),
            PathBuf::from("pages/Intro.ir.json")
        );
        assert_eq!(
            output_path(Path::new("pages/Intro.wiki"), Some(Path::new("out"))),
            PathBuf::from("out/Intro.ir.json")
        );
    }

    #[test]
    fn directories_are_walked_for_wiki_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.wiki"), "b").unwrap();
        std::fs::write(dir.path().join("sub/a.wiki"), "a").unwrap();
        std::fs::write(dir.path().join("skip.test.wiki"), "---\n---\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let inputs = collect_inputs(&[dir.path().to_path_buf()]);
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["b.wiki", "sub/a.wiki"]);
    }

    #[test]
    fn compile_writes_ir_and_counts_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = dir.path().join("mapping.toml");
        std::fs::write(&mapping, "[Start]\ncomponent = \"Box\"\ntype = \"blockstart\"\n\n[End]\ntype = \"blockend\"\n").unwrap();
        let good = dir.path().join("good.wiki");
        std::fs::write(&good, "{{Start}}x{{End}}").unwrap();
        let bad = dir.path().join("bad.wiki");
        std::fs::write(&bad, [0xffu8, 0xfe]).unwrap();
        let out = dir.path().join("out");

        let args = CompileArgs {
            paths: vec![good, bad],
            mapping: Some(mapping),
            out_dir: Some(out.clone()),
            no_sections: false,
        };
        assert_eq!(do_compile(args, true), 1);

        let json = std::fs::read_to_string(out.join("good.ir.json")).unwrap();
        let ir: Vec<compiler::IrNode> = serde_json::from_str(&json).unwrap();
        assert_eq!(ir.len(), 1);
        assert_eq!(ir[0].as_component().map(|c| c.component_name.as_str()), Some("Box"));
        assert!(!out.join("bad.ir.json").exists());
    }
}
