//! `fcbase` - CLI for the flight controller catalog
//!
//! This binary drives revision variants, catalog validation, the search
//! export, faceted search and compare lists from the command line.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use fcbase::catalog::{load_file, Catalog, Controller, Validator};
use fcbase::cli::{
    Cli, Command, CompareAction, CompareCommand, ConfigCommand, ExportCommand, OutputFormat,
    SearchCommand, ValidateCommand, VariantsCommand,
};
use fcbase::compare::{reconcile, CompareStore, StorageWatcher, COMPARE_CHANGE_EVENT};
use fcbase::listing::{listing_url, FilterController, ListingStatus, ListingView, UrlHistory};
use fcbase::revision::build_variants;
use fcbase::search::{
    build_records, export, Facet, FacetFilters, LocalIndex, SearchClient, SearchDriver,
    SearchEvent, SearchRecord,
};
use fcbase::storage::Storage;
use fcbase::{init_logging, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    // Execute the command
    match cli.command {
        Command::Variants(cmd) => handle_variants(&cmd),
        Command::Validate(cmd) => handle_validate(&config, &cmd),
        Command::Export(cmd) => handle_export(&config, &cmd),
        Command::Search(cmd) => handle_search(&config, &cmd).await,
        Command::Compare(cmd) => handle_compare(&config, cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn content_dir(config: &Config, dir: Option<&PathBuf>) -> PathBuf {
    dir.cloned()
        .unwrap_or_else(|| config.catalog.content_dir.clone())
}

fn load_catalog(dir: &Path) -> anyhow::Result<Catalog> {
    Catalog::load(dir).with_context(|| format!("failed to load catalog from {}", dir.display()))
}

fn handle_variants(cmd: &VariantsCommand) -> anyhow::Result<()> {
    let controller: Controller = load_file(&cmd.file)
        .with_context(|| format!("failed to read {}", cmd.file.display()))?
        .ok_or_else(|| anyhow!("{} has no id", cmd.file.display()))?;

    let variants = build_variants(&controller);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&variants)?);
        return Ok(());
    }

    println!("{} ({} variants)", controller.title, variants.len());
    println!();
    for variant in &variants {
        let io = &variant.spec.io;
        println!(
            "{:<16} {:<28} UARTs {:>2}  CAN {}  PWM {:>2}  SD {}",
            variant.id,
            variant.label,
            io.uarts,
            io.can,
            io.pwm,
            if io.sd_card { "yes" } else { "no" }
        );
        if let Some(released) = variant.revision.as_ref().and_then(|r| r.released.as_deref()) {
            println!("{:<16} released {released}", "");
        }
    }
    Ok(())
}

fn handle_validate(config: &Config, cmd: &ValidateCommand) -> anyhow::Result<()> {
    let dir = content_dir(config, cmd.dir.as_ref());
    let catalog = load_catalog(&dir)?;
    let validator = Validator::new();

    let mut errors = 0usize;
    let mut warnings = 0usize;
    let mut report = |path: &Path, issues: Vec<fcbase::catalog::Issue>| {
        for issue in issues {
            if issue.is_error() {
                errors += 1;
            } else {
                warnings += 1;
            }
            println!("{}: {issue}", path.display());
        }
    };

    for entry in &catalog.controllers {
        report(&entry.path, validator.controller(&entry.data));
    }
    for entry in &catalog.transmitters {
        report(&entry.path, validator.transmitter(&entry.data));
    }

    if errors > 0 || (cmd.strict && warnings > 0) {
        bail!("validation failed: {errors} error(s), {warnings} warning(s)");
    }

    println!(
        "Validated {} controllers and {} transmitters: {warnings} warning(s)",
        catalog.controllers.len(),
        catalog.transmitters.len()
    );
    Ok(())
}

fn handle_export(config: &Config, cmd: &ExportCommand) -> anyhow::Result<()> {
    let dir = content_dir(config, cmd.content_dir.as_ref());
    let catalog = load_catalog(&dir)?;
    let records = build_records(&catalog);
    let out = cmd.out.clone().unwrap_or_else(|| config.index_path());

    export(&records, &out).with_context(|| format!("failed to write {}", out.display()))?;
    println!("Exported {} records to {}", records.len(), out.display());
    Ok(())
}

async fn handle_search(config: &Config, cmd: &SearchCommand) -> anyhow::Result<()> {
    let state = cmd.filter_state();

    // Degraded mode shows the catalog itself, so load it regardless.
    let dataset = match Catalog::load(&config.catalog.content_dir) {
        Ok(catalog) => build_records(&catalog),
        Err(e) => {
            warn!(error = %e, "Failed to load catalog for fallback results");
            Vec::new()
        }
    };

    let client = Arc::new(SearchClient::new(LocalIndex::open(config.index_path()), dataset));
    client.initialize().await;

    let mut controller = FilterController::new(UrlHistory::new(), config.search.page_size);
    controller.hydrate(&state.to_query());

    let filters = controller.state().facet_filters();
    let text = controller.state().search_text.clone();
    if cmd.interactive {
        return interactive_search(config, client, &text, filters).await;
    }
    if let Err(e) = client.search(&text, &filters).await {
        warn!(error = %e, "Search failed");
    }

    let snapshot = client.snapshot();
    controller.set_total(snapshot.results.len());
    let view = ListingView::build(&snapshot, &controller, client.dataset());
    let url = listing_url(&config.search.base_path, controller.state());

    if cmd.format == OutputFormat::Json {
        let output = serde_json::json!({ "url": url, "view": view });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match &view.status {
        ListingStatus::Degraded { message } => eprintln!("{message} Showing all controllers."),
        ListingStatus::Empty => println!("No controllers match your query."),
        _ => {}
    }
    if let Some(error) = &view.error {
        eprintln!("{error}");
    }

    match cmd.format {
        OutputFormat::Table => print_table(&view.items),
        _ => {
            for record in &view.items {
                println!("{} ({}) {}", record.title, record.brand_name, record.url);
            }
        }
    }

    println!();
    println!("{}  |  {}", view.showing(), view.page_line());
    println!("{url}");

    if cmd.facets {
        println!();
        for facet in Facet::ALL {
            let options = view.options.get(&facet).map(Vec::as_slice).unwrap_or_default();
            if options.is_empty() {
                continue;
            }
            println!("[{facet}]");
            for option in options {
                println!("  {:<24} {:>4}  ({})", option.label, option.count, option.value);
            }
        }
    }
    Ok(())
}

async fn interactive_search(
    config: &Config,
    client: Arc<SearchClient<LocalIndex>>,
    text: &str,
    filters: FacetFilters,
) -> anyhow::Result<()> {
    let (driver, mut events) = SearchDriver::from_config(client, config);
    driver.set_filters(filters);
    if !text.is_empty() {
        driver.set_text(text);
        driver.flush();
    }
    eprintln!("Each line replaces the query. Press Ctrl-D to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut open = true;
    while open {
        tokio::select! {
            line = lines.next_line() => match line.context("failed to read query")? {
                Some(line) => driver.set_text(line.trim()),
                None => {
                    driver.flush();
                    open = false;
                }
            },
            Some(event) = events.recv() => print_event(&event, config.search.page_size),
        }
    }

    driver.shutdown().await;
    // Closes once the last in-flight search has reported.
    while let Some(event) = events.recv().await {
        print_event(&event, config.search.page_size);
    }
    Ok(())
}

fn print_event(event: &SearchEvent, limit: usize) {
    match event {
        SearchEvent::Results { query, records } => {
            println!("{} results for {query:?}", records.len());
            for record in records.iter().take(limit) {
                println!("  {} ({})", record.title, record.brand_name);
            }
        }
        SearchEvent::Failed { message } => eprintln!("{message}"),
    }
}

fn print_table(records: &[SearchRecord]) {
    println!(
        "{:<32} {:<20} {:<10} {:<12} {:>5} {:>4} {:>3}",
        "TITLE", "BRAND", "MCU", "MOUNTING", "UARTS", "CAN", "SD"
    );
    for record in records {
        println!(
            "{:<32} {:<20} {:<10} {:<12} {:>5} {:>4} {:>3}",
            truncate(&record.title, 32),
            truncate(&record.brand_name, 20),
            truncate(&record.mcu_family, 10),
            record.mounting,
            record.uarts.map_or_else(|| "-".to_string(), |u| u.to_string()),
            record.can,
            if record.sd { "yes" } else { "no" }
        );
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let mut out: String = value.chars().take(width.saturating_sub(1)).collect();
        out.push('\u{2026}');
        out
    }
}

async fn handle_compare(config: &Config, cmd: CompareCommand) -> anyhow::Result<()> {
    let category = cmd.category;
    config.category(&category)?;

    let db_path = config.database_path();
    let store = CompareStore::new(
        Storage::open(&db_path).context("failed to open compare database")?,
        &config.compare,
    );

    match cmd.action {
        CompareAction::List { json } => {
            let ids = store.read(&category)?;
            if json {
                let output = serde_json::json!({ "type": category, "ids": ids });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else if ids.is_empty() {
                println!("No {category} entries in the compare list.");
            } else {
                for id in &ids {
                    println!("{id}");
                }
                if let Some(updated) = store.backend().updated_at(&store.key(&category)?)? {
                    println!();
                    println!("Updated {}", updated.format("%Y-%m-%d %H:%M:%S UTC"));
                }
            }
        }
        CompareAction::Add { id } => {
            if store.add(&category, &id)? {
                println!("Added {id} to {category} compare list.");
            } else {
                println!("{id} is already in the {category} compare list.");
            }
        }
        CompareAction::Remove { id } => {
            if store.remove(&category, &id)? {
                println!("Removed {id} from {category} compare list.");
            } else {
                println!("{id} is not in the {category} compare list.");
            }
        }
        CompareAction::Toggle { id } => {
            if store.toggle(&category, &id)? {
                println!("Added {id} to {category} compare list.");
            } else {
                println!("Removed {id} from {category} compare list.");
            }
        }
        CompareAction::Clear => {
            store.clear(&category)?;
            println!("Cleared {category} compare list.");
        }
        CompareAction::Prune { content_dir: dir } => {
            let dir = content_dir(config, dir.as_ref());
            let catalog = load_catalog(&dir)?;
            let known = catalog
                .known_ids(&category)
                .ok_or_else(|| anyhow!("the catalog has no {category} records"))?;

            let result = reconcile(&store, &category, known)?;
            if result.pruned.is_empty() {
                println!("Nothing to prune; {} entries kept.", result.kept.len());
            } else {
                println!(
                    "Pruned {} entries: {}",
                    result.pruned.len(),
                    result.pruned.join(", ")
                );
            }
        }
        CompareAction::Watch => {
            let watcher = StorageWatcher::new(Storage::open(&db_path)?, &config.compare);
            let mut events = store.subscribe(&category);
            let handle = watcher.spawn(store.sender());
            info!(category = %category, path = %db_path.display(), "Watching compare list");

            loop {
                tokio::select! {
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        let output = serde_json::json!({
                            "event": COMPARE_CHANGE_EVENT,
                            "detail": event,
                        });
                        println!("{}", serde_json::to_string(&output)?);
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }

            handle.shutdown().await;
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                if let Ok(storage) = Storage::open(config.database_path()) {
                    if let Ok(stats) = storage.stats() {
                        println!("  Stored entries:     {}", stats.total_entries);
                    }
                    let prefix = format!("{}:compare:", config.compare.namespace);
                    if let Ok(keys) = storage.keys_with_prefix(&prefix) {
                        println!("  Compare lists:      {}", keys.len());
                    }
                }
                println!();
                println!("[Compare]");
                println!("  Namespace:          {}", config.compare.namespace);
                for category in &config.compare.categories {
                    if category.legacy_keys.is_empty() {
                        println!("  Category:           {}", category.name);
                    } else {
                        println!(
                            "  Category:           {} (legacy: {})",
                            category.name,
                            category.legacy_keys.join(", ")
                        );
                    }
                }
                println!("  Watch interval:     {} ms", config.compare.watch_interval_ms);
                println!();
                println!("[Search]");
                println!("  Index path:         {}", config.index_path().display());
                println!("  Base path:          {:?}", config.search.base_path);
                println!("  Debounce:           {} ms", config.search.debounce_ms);
                println!("  Page size:          {}", config.search.page_size);
                println!();
                println!("[Catalog]");
                println!(
                    "  Content dir:        {}",
                    config.catalog.content_dir.display()
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Matek", 10), "Matek");
        assert_eq!(truncate("SpeedyBee F405 V4", 10), "SpeedyBee\u{2026}");
    }
}
