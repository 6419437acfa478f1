//! StyleMatch CLI
//!
//! CLI tool for checking style backups and querying matches.

use std::fs;

use clap::{Parser, Subcommand};

use sm_core::config::EngineConfig;
use sm_core::engine::MatchEngine;
use sm_core::index::StyleIndex;
use sm_core::order::InjectionOrder;
use sm_import::{classify, dedupe_styles, import_into, parse_backup};

mod bench;

#[derive(Parser)]
#[command(name = "sm-cli")]
#[command(about = "StyleMatch style backup and matching tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a style backup and list malformed patterns
    Validate {
        /// Backup file (JSON array of styles)
        #[arg(short, long)]
        input: String,
    },

    /// Print the sections injected into one or more URLs
    Match {
        /// Backup file (JSON array of styles)
        #[arg(short, long)]
        styles: String,

        /// URLs to match
        #[arg(short, long, required = true)]
        url: Vec<String>,

        /// Injection order file ({"main": {id: rank}, "prio": {id: rank}})
        #[arg(long)]
        order: Option<String>,

        /// Engine config file
        #[arg(short, long)]
        config: Option<String>,

        /// Print raw match results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show index and cache statistics
    Info {
        /// Backup file (JSON array of styles)
        #[arg(short, long)]
        styles: String,

        /// Engine config file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Benchmark matching latency on synthetic URLs
    Bench {
        /// Backup file (JSON array of styles)
        #[arg(short, long)]
        styles: String,

        /// Number of distinct URLs to generate
        #[arg(long, default_value_t = 2000)]
        urls: usize,

        /// Passes over the URL set
        #[arg(long, default_value_t = 5)]
        iterations: usize,

        /// RNG seed for URL generation
        #[arg(long, default_value_t = 1)]
        seed: u32,

        /// Engine config file
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Match {
            styles,
            url,
            order,
            config,
            json,
        } => cmd_match(&styles, &url, order.as_deref(), config.as_deref(), json),
        Commands::Info { styles, config } => cmd_info(&styles, config.as_deref()),
        Commands::Bench {
            styles,
            urls,
            iterations,
            seed,
            config,
        } => load_engine(&styles, config.as_deref()).and_then(|engine| {
            bench::run(
                engine,
                bench::BenchOptions {
                    url_count: urls,
                    iterations,
                    seed,
                },
            )
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn read_file(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))
}

fn load_config(path: Option<&str>) -> Result<EngineConfig, String> {
    match path {
        Some(path) => EngineConfig::from_json(&read_file(path)?).map_err(|e| format!("'{}': {}", path, e)),
        None => Ok(EngineConfig::default()),
    }
}

pub(crate) fn load_engine(styles_path: &str, config_path: Option<&str>) -> Result<MatchEngine, String> {
    let mut engine = MatchEngine::new(load_config(config_path)?);
    let text = read_file(styles_path)?;
    let outcome = import_into(&mut engine, &text).map_err(|e| format!("'{}': {}", styles_path, e))?;
    if !outcome.invalid.is_empty() {
        log::warn!("Skipped {} invalid entries in '{}'", outcome.invalid.len(), styles_path);
    }
    Ok(engine)
}

fn cmd_validate(input: &str) -> Result<(), String> {
    let text = read_file(input)?;
    let mut parsed = parse_backup(&text).map_err(|e| format!("Invalid backup: {}", e))?;
    let dedupe = dedupe_styles(&mut parsed.styles);

    let report = classify(&[], parsed.styles);
    let mut index = StyleIndex::new();
    let mut pattern_errors = 0usize;
    for style in report.added {
        let name = style.name.clone();
        let entry = index.add(style).map_err(|e| e.to_string())?;
        for located in entry.pattern_errors() {
            pattern_errors += 1;
            match located.section {
                Some(section) => println!("  {} (section {}): {}", name, section, located.error),
                None => println!("  {}: {}", name, located.error),
            }
        }
    }

    for entry in &parsed.invalid {
        println!("  #{} {:?}: {}", entry.index, entry.name, entry.reason);
    }

    println!("Backup '{}'", input);
    println!("  Styles:          {}", index.len());
    println!("  Duplicates:      {} replaced, {} identical", dedupe.replaced, dedupe.duplicates);
    println!("  Invalid entries: {}", parsed.invalid.len());
    println!("  Settings:        {}", parsed.skipped);
    println!("  Bad patterns:    {}", pattern_errors);
    println!("  Always matched:  {}", index.always_count());

    if parsed.invalid.is_empty() && pattern_errors == 0 {
        Ok(())
    } else {
        Err(format!("{} invalid entries, {} bad patterns", parsed.invalid.len(), pattern_errors))
    }
}

fn cmd_match(
    styles: &str,
    urls: &[String],
    order_path: Option<&str>,
    config: Option<&str>,
    json: bool,
) -> Result<(), String> {
    let mut engine = load_engine(styles, config)?;

    if let Some(path) = order_path {
        let order: InjectionOrder =
            serde_json::from_str(&read_file(path)?).map_err(|e| format!("'{}': {}", path, e))?;
        engine.set_injection_order(order).map_err(|e| e.to_string())?;
    }

    for url in urls {
        if json {
            let result = engine.resolve_deferred(url);
            let text = serde_json::to_string(&*result).map_err(|e| e.to_string())?;
            println!("{}", text);
            continue;
        }

        engine.resolve_deferred(url);
        let refs = engine.get_ordered_matches(url, None);
        println!("{} ({} sections)", url, refs.len());
        for at in refs {
            let name = engine.style(at.style_id).map(|s| s.display_name()).unwrap_or_default();
            let code_len = engine.section(at).map(|s| s.code.len()).unwrap_or_default();
            println!("  [{}] {} #{} ({} bytes)", at.style_id, name, at.index, code_len);
        }
    }

    Ok(())
}

fn cmd_info(styles: &str, config: Option<&str>) -> Result<(), String> {
    let engine = load_engine(styles, config)?;
    let stats = engine.stats();
    let config = engine.config();

    println!("Styles: {}", styles);
    println!("  Count:           {}", stats.styles);
    println!("  Enabled:         {}", engine.styles().filter(|s| s.enabled).count());
    println!("  Always matched:  {}", stats.always_candidates);
    println!("  Host keys:       {}", stats.host_keys);
    println!();
    println!("Engine:");
    println!("  Cache capacity:  {}", stats.cache_capacity);
    println!("  Regexp mode:     {:?}", config.regexp_mode);
    println!("  Keep fragment:   {}", config.keep_fragment);
    println!("  Own root:        {}", config.own_root().unwrap_or("-"));

    let order = engine.injection_order();
    if !order.is_empty() {
        println!();
        println!("Injection order:");
        println!("  Prio:            {}", order.prio.len());
        println!("  Main:            {}", order.main.len());
    }

    Ok(())
}
