//! Inspect and edit translated attributes stored in a SQLite translation table.
//!
//! Usage:
//!   translation-overlay show <owner_id> [lang]
//!   translation-overlay set <owner_id> <attribute>_<lang>=<value>...
//!   translation-overlay search <owner_table> [lang] <attribute>=<value>...
//!
//! In `set`, a plain `<attribute>=<value>` edits the default language.
//!
//! Required environment variables:
//! - TRANSLATION_LANGUAGES (e.g. "en,fr,ru,uk")
//! - TRANSLATION_ATTRIBUTES (e.g. "title,text")
//!
//! Optional:
//! - TRANSLATION_DEFAULT_LANGUAGE (defaults to the first language)
//! - TRANSLATION_TABLE (defaults to post_lang)
//! - TRANSLATION_REQUIRE_NON_EMPTY (defaults to false)
//! - DATABASE_PATH (defaults to translations.db)

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use tracing::info;
use translation_overlay::{
    AppConfig, Criteria, OwnerId, SqliteTranslationStore, TranslationOverlay,
};

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  translation-overlay show <owner_id> [lang]");
    eprintln!("  translation-overlay set <owner_id> <attribute>_<lang>=<value>...");
    eprintln!("  translation-overlay search <owner_table> [lang] <attribute>=<value>...");
}

fn parse_owner_id(raw: &str) -> Result<OwnerId> {
    raw.parse()
        .with_context(|| format!("Invalid owner id: '{}'", raw))
}

/// Split `key=value` arguments, keeping anything that is not an assignment.
fn split_assignments(args: &[String]) -> (Vec<&str>, BTreeMap<String, String>) {
    let mut plain = Vec::new();
    let mut assignments = BTreeMap::new();
    for arg in args {
        match arg.split_once('=') {
            Some((key, value)) => {
                assignments.insert(key.to_string(), value.to_string());
            }
            None => plain.push(arg.as_str()),
        }
    }
    (plain, assignments)
}

fn show_command(overlay: &TranslationOverlay<SqliteTranslationStore>, args: &[String]) -> Result<()> {
    let owner_id = parse_owner_id(args.first().context("Missing <owner_id>")?)?;
    let language = overlay.resolve_language(args.get(1).map(String::as_str));

    let view = overlay.hydrate(owner_id, language)?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn set_command(overlay: &TranslationOverlay<SqliteTranslationStore>, args: &[String]) -> Result<()> {
    let owner_id = parse_owner_id(args.first().context("Missing <owner_id>")?)?;
    let (_, edits) = split_assignments(&args[1..]);
    if edits.is_empty() {
        bail!("Nothing to set, pass <attribute>_<lang>=<value> or <attribute>=<value> arguments");
    }

    let language = overlay.config().default_language.clone();
    let mut view = overlay.hydrate(owner_id, &language)?;
    for (key, value) in &edits {
        view.set(key, value)?;
    }

    let outcome = overlay
        .persist(owner_id, &view.to_submission())
        .with_context(|| format!("Failed to save translations for owner {}", owner_id))?;

    info!(
        "Saved owner {} ({} created, {} updated)",
        owner_id, outcome.created, outcome.updated
    );
    Ok(())
}

fn search_command(overlay: &TranslationOverlay<SqliteTranslationStore>, args: &[String]) -> Result<()> {
    let owner_table = args.first().context("Missing <owner_table>")?;
    let (plain, filters) = split_assignments(&args[1..]);
    let language = overlay.resolve_language(plain.first().copied());

    let criteria = overlay.build_filter_criteria(Criteria::new(), &filters, language)?;
    let ids = overlay.store().find_owner_ids(&criteria, owner_table)?;

    for id in &ids {
        println!("{}", id);
    }
    info!("Found {} matching owners", ids.len());
    Ok(())
}

fn main() -> Result<()> {
    // Load .env file (ignored when not present)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_overlay=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let config = AppConfig::from_env()?;
    let store = SqliteTranslationStore::open(
        &config.database_path,
        &config.translation_table,
        &config.overlay.attributes,
    )
    .with_context(|| format!("Failed to open database at {}", config.database_path))?;
    let overlay = TranslationOverlay::new(store, config.overlay.clone())?;

    let command = &args[1];
    let rest = &args[2..];

    match command.as_str() {
        "show" => show_command(&overlay, rest),
        "set" => set_command(&overlay, rest),
        "search" => search_command(&overlay, rest),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            std::process::exit(1);
        }
    }
}
