mod files;
mod logging;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use darkfog_core::{Compatibility, Difficulty, ErrorCode, HiveSource, SaveError, SaveFile};
use darkfog_render::{
    JsonStyle, TextRenderOptions, TextStyle, render_compatibility, render_field_dump,
    render_json, render_splice_stats, render_text_with_options, splice_stats_json,
};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::logging::{LogConfig, init_logging};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// More diagnostics on stderr (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Fewer diagnostics on stderr.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    quiet: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report header fields, mode flags, combat settings and hive region.
    Analyze(AnalyzeArgs),
    /// Switch a peace-mode save to dark fog mode in place.
    Convert(ConvertArgs),
    /// Copy the dark fog hives of one save into another.
    Inject(InjectArgs),
    /// Write a save's hive region in the live-export layout.
    Extract(ExtractArgs),
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    #[arg(value_name = "SAVE.dsv")]
    path: PathBuf,
    #[arg(long)]
    json: bool,
    /// List every decoded header field with its offset.
    #[arg(long)]
    fields: bool,
}

#[derive(Debug, Args)]
struct ConvertArgs {
    #[arg(value_name = "SAVE.dsv")]
    path: PathBuf,
    /// Combat settings preset written into the save.
    #[arg(
        short,
        long,
        value_name = "low|normal|high",
        default_value = "normal",
        value_parser = parse_difficulty
    )]
    difficulty: Difficulty,
    /// Write here instead of overwriting the input.
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long)]
    no_backup: bool,
}

#[derive(Debug, Args)]
struct InjectArgs {
    /// Dark fog save to copy hives from.
    #[arg(short, long, required_unless_present = "source_export")]
    source: Option<PathBuf>,
    /// Hive region captured from a running game, instead of a source save.
    #[arg(long, conflicts_with = "source")]
    source_export: Option<PathBuf>,
    /// Save that receives the hives.
    #[arg(short, long)]
    target: PathBuf,
    /// Defaults to `<target>_darkfog.<ext>`.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Leave star 0 without hives.
    #[arg(long)]
    skip_birth_star: bool,
    /// Comma-separated star indices to leave without hives.
    // fully qualified so clap parses one list value instead of many indices
    #[arg(long, value_name = "0,1,2", value_parser = parse_star_list)]
    skip_stars: Option<::std::vec::Vec<usize>>,
    /// Proceed even when the two galaxies differ.
    #[arg(short, long)]
    force: bool,
    #[arg(long)]
    no_backup: bool,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ExtractArgs {
    #[arg(value_name = "SAVE.dsv")]
    path: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose, cli.quiet));

    match cli.command {
        Command::Analyze(args) => run_analyze(&args),
        Command::Convert(args) => run_convert(&args),
        Command::Inject(args) => run_inject(&args),
        Command::Extract(args) => run_extract(&args),
    }
}

fn run_analyze(args: &AnalyzeArgs) {
    let save = load_save(&args.path);
    let summary = save.summary();

    if args.json {
        let mut json = render_json(&summary, JsonStyle::CanonicalV1);
        if args.fields {
            if let JsonValue::Object(map) = &mut json {
                map.insert("fields".to_string(), fields_json(&save));
            }
        }
        print_json(&json);
        return;
    }

    print!(
        "{}",
        render_text_with_options(
            &summary,
            TextStyle::Report,
            TextRenderOptions { verbose: args.fields },
        )
    );
    if args.fields {
        println!();
        print!("{}", render_field_dump(save.fields()));
    }
}

fn run_convert(args: &ConvertArgs) {
    let mut save = load_save(&args.path);
    let settings = args.difficulty.settings();

    let changed = save
        .convert_to_dark_fog(Some(&settings))
        .unwrap_or_else(|e| fail("Error converting save", &e));
    if !changed {
        println!("Save is already in dark fog mode; nothing to convert.");
        return;
    }

    let out_path = args.output.as_deref().unwrap_or(&args.path);
    if let Some(backup) = write_output(out_path, save.bytes(), args.no_backup) {
        println!("Backup: {}", backup.display());
    }
    println!(
        "Difficulty: {} ({})",
        args.difficulty,
        args.difficulty.description()
    );
    println!("Converted to dark fog mode: {}", out_path.display());
}

fn run_inject(args: &InjectArgs) {
    let target = load_save(&args.target);

    let source_save;
    let export_bytes;
    let (hives, compat) = match (&args.source, &args.source_export) {
        (Some(path), _) => {
            source_save = load_save(path);
            if source_save.is_peace_mode() {
                eprintln!(
                    "Source save is in peace mode and has no dark fog hives: {}",
                    path.display()
                );
                process::exit(2);
            }
            let hives = source_save
                .hive_source()
                .unwrap_or_else(|e| fail("Error reading source hives", &e));
            let compat = Compatibility::between(source_save.fields(), target.fields());
            (hives, compat)
        }
        (None, Some(path)) => {
            export_bytes = read_file(path);
            let hives = HiveSource::from_export(&export_bytes)
                .unwrap_or_else(|e| fail("Error parsing hive export", &e));
            let compat = Compatibility::check(None, hives.star_count(), target.fields());
            (hives, compat)
        }
        (None, None) => {
            eprintln!("inject requires --source or --source-export");
            process::exit(2);
        }
    };

    if !args.json {
        println!("{}", render_compatibility(&compat));
    }
    if !compat.is_compatible() {
        if !args.force {
            eprintln!("Refusing to inject across different galaxies; pass --force to override");
            process::exit(2);
        }
        tracing::warn!(%compat, "injecting across galaxies because of --force");
    }

    let omit = omit_set(args.skip_birth_star, args.skip_stars.as_deref());
    let (injected, stats) = target
        .inject_from(&hives, &omit)
        .unwrap_or_else(|e| fail("Error injecting hives", &e));

    let out_path = args
        .output
        .clone()
        .unwrap_or_else(|| files::default_inject_output(&args.target));
    let backup = write_output(&out_path, injected.bytes(), args.no_backup);

    if args.json {
        let mut json = JsonMap::new();
        json.insert(
            "compatibility".to_string(),
            JsonValue::String(compat.to_string()),
        );
        json.insert("compatible".to_string(), JsonValue::Bool(compat.is_compatible()));
        json.insert("stats".to_string(), splice_stats_json(&stats));
        json.insert(
            "output".to_string(),
            JsonValue::String(out_path.display().to_string()),
        );
        json.insert(
            "backup".to_string(),
            match &backup {
                Some(p) => JsonValue::String(p.display().to_string()),
                None => JsonValue::Null,
            },
        );
        print_json(&JsonValue::Object(json));
        return;
    }

    print!("{}", render_splice_stats(&stats));
    if let Some(backup) = backup {
        println!("Backup: {}", backup.display());
    }
    println!("Wrote injected save to {}", out_path.display());
}

fn run_extract(args: &ExtractArgs) {
    let save = load_save(&args.path);
    let region = save
        .extract_hive_region()
        .unwrap_or_else(|e| fail("Error locating hive region", &e));
    fs::write(&args.output, &region).unwrap_or_else(|e| {
        eprintln!("Error writing {}: {e}", args.output.display());
        process::exit(1);
    });
    println!(
        "Wrote {} bytes of hive data to {}",
        region.len(),
        args.output.display()
    );
}

fn read_file(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", path.display());
        process::exit(1);
    })
}

fn load_save(path: &Path) -> SaveFile {
    SaveFile::from_bytes(read_file(path)).unwrap_or_else(|e| {
        eprintln!("Error parsing save file: {}", path.display());
        eprintln!("  {e}");
        process::exit(exit_code(&e));
    })
}

fn write_output(path: &Path, bytes: &[u8], no_backup: bool) -> Option<PathBuf> {
    files::write_with_backup(path, bytes, no_backup).unwrap_or_else(|e| {
        eprintln!("Error writing {}: {e}", path.display());
        process::exit(1);
    })
}

fn fail(context: &str, e: &SaveError) -> ! {
    eprintln!("{context}: {e}");
    process::exit(exit_code(e));
}

fn exit_code(e: &SaveError) -> i32 {
    match e.code() {
        ErrorCode::InvalidInput => 2,
        _ => 1,
    }
}

fn print_json(json: &JsonValue) {
    let rendered = serde_json::to_string_pretty(json).unwrap_or_else(|e| {
        eprintln!("Error rendering JSON output: {e}");
        process::exit(1);
    });
    println!("{rendered}");
}

fn fields_json(save: &SaveFile) -> JsonValue {
    JsonValue::Array(
        save.fields()
            .fields()
            .iter()
            .map(|f| {
                let mut m = JsonMap::new();
                m.insert("section".to_string(), JsonValue::String(f.section.to_string()));
                m.insert("name".to_string(), JsonValue::String(f.name.to_string()));
                m.insert("offset".to_string(), JsonValue::from(f.offset));
                m.insert("width".to_string(), JsonValue::from(f.width));
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn omit_set(skip_birth_star: bool, skip_stars: Option<&[usize]>) -> BTreeSet<usize> {
    let mut omit: BTreeSet<usize> = skip_stars.unwrap_or_default().iter().copied().collect();
    if skip_birth_star {
        omit.insert(0);
    }
    omit
}

fn parse_difficulty(value: &str) -> Result<Difficulty, String> {
    value.parse().map_err(|e: SaveError| e.to_string())
}

fn parse_star_list(value: &str) -> Result<Vec<usize>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| format!("invalid star index {s:?}; expected comma-separated numbers"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_list_parses_and_rejects() {
        assert_eq!(parse_star_list("0,1, 2").unwrap(), vec![0, 1, 2]);
        assert_eq!(parse_star_list("3,").unwrap(), vec![3]);
        assert!(parse_star_list("1,x").is_err());
        assert!(parse_star_list("-1").is_err());
    }

    #[test]
    fn omit_set_collapses_duplicates() {
        let omit = omit_set(true, Some(&[0, 4, 4, 2][..]));
        assert_eq!(omit.into_iter().collect::<Vec<_>>(), vec![0, 2, 4]);
        assert!(omit_set(false, None).is_empty());
    }

    #[test]
    fn difficulty_arg_is_case_insensitive() {
        assert_eq!(parse_difficulty("HIGH").unwrap(), Difficulty::High);
        assert!(parse_difficulty("extreme").is_err());
    }

    #[test]
    fn skip_stars_parses_as_one_list() {
        let cli = Cli::try_parse_from([
            "dsp-darkfog", "inject", "-s", "a.dsv", "-t", "b.dsv", "--skip-stars", "3,0,3",
        ])
        .unwrap();
        let Command::Inject(args) = cli.command else {
            panic!("expected inject");
        };
        assert_eq!(args.skip_stars, Some(vec![3, 0, 3]));
        assert_eq!(
            omit_set(args.skip_birth_star, args.skip_stars.as_deref())
                .into_iter()
                .collect::<Vec<_>>(),
            vec![0, 3]
        );
    }

    #[test]
    fn convert_defaults_to_normal() {
        let cli = Cli::try_parse_from(["dsp-darkfog", "convert", "a.dsv"]).unwrap();
        let Command::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.difficulty, Difficulty::Normal);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
