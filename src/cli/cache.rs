//! Cache management commands

use colored::Colorize;
use dialoguer::{Confirm, theme::ColorfulTheme};

use crate::cli::args::GlobalOptions;
use crate::cli::context::{self, WorkerContext};
use crate::config::Bucket;
use crate::error::{Error, Result};
use crate::models::display::format_size;
use crate::models::{CacheDisplay, EntryDisplay, EventDisplay};
use crate::output;

/// Show every cache with its entry count
pub fn status(opts: &GlobalOptions) -> Result<()> {
    let ctx = WorkerContext::new(opts)?;
    let store = ctx.worker.store();
    let config = ctx.worker.config();
    let stats = store.stats()?;

    let rows: Vec<CacheDisplay> = store
        .keys()?
        .iter()
        .map(|name| {
            let entries = store.entry_count(name).unwrap_or(0);
            CacheDisplay::new(name, entries, config.is_app_cache(name) && !config.is_stale_cache(name))
        })
        .collect();

    if opts.is_json() {
        let json = serde_json::json!({
            "caches": rows,
            "status": ctx.worker.cache_status(),
            "total_entries": stats.total_entries,
            "total_size_bytes": stats.total_size_bytes,
            "total_size_human": format_size(stats.total_size_bytes),
            "path": store.root().display().to_string(),
        });
        return output::print_json(&json);
    }

    println!("Cache Status");
    println!("────────────────────────────────────────");
    println!("Location:       {}", store.root().display());
    println!("Generation:     {}", config.cache.generation);
    println!("Entries:        {}", stats.total_entries);
    println!("Total size:     {}", format_size(stats.total_size_bytes));
    println!();
    output::print_table(&rows);
    Ok(())
}

/// Delete every application cache
pub fn clear(opts: &GlobalOptions, yes: bool) -> Result<()> {
    let mut ctx = WorkerContext::new(opts)?;

    if !yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Delete every cached response for this application?")
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Cancelled");
            return Ok(());
        }
    }

    let deleted = ctx.worker.clear_all_caches()?;
    let events = ctx.drain_events();

    if opts.is_json() {
        let json = serde_json::json!({
            "deleted": deleted,
            "success": true,
        });
        return output::print_json(&json);
    }

    if deleted.is_empty() {
        println!("Cache was already empty");
    } else {
        println!("{} Cleared {} cache(s)", "✓".green(), deleted.len());
        for name in &deleted {
            println!("  {}", name.dimmed());
        }
    }
    for event in &events {
        println!("{}", EventDisplay(event));
    }
    Ok(())
}

/// Show cache path
pub fn path(opts: &GlobalOptions) -> Result<()> {
    println!("{}", context::cache_dir(opts)?.display());
    Ok(())
}

/// List entries in one cache
pub fn list(opts: &GlobalOptions, bucket: &str) -> Result<()> {
    let ctx = WorkerContext::new(opts)?;
    let config = ctx.worker.config();
    let name = match Bucket::parse(bucket) {
        Some(bucket) => config.bucket_name(bucket),
        None => bucket.to_string(),
    };

    if !ctx.worker.store().has(&name)? {
        return Err(Error::Other(format!("No cache named '{}'", name)));
    }

    let entries = ctx.worker.store().entries(&name)?;
    let rows: Vec<EntryDisplay> = entries.iter().map(EntryDisplay::from).collect();

    if opts.is_json() {
        return output::print_json(&rows);
    }

    println!("{} ({} entries)\n", name.bold(), rows.len());
    output::print_table(&rows);
    Ok(())
}

/// Fetch a document into the documents cache
pub async fn document(opts: &GlobalOptions, url: &str, name: &str) -> Result<()> {
    let mut ctx = WorkerContext::new(opts)?;
    let stored = ctx.worker.cache_document(url, name).await;
    let events = ctx.finish().await;

    if opts.is_json() {
        let json = serde_json::json!({
            "url": url,
            "name": name,
            "success": stored,
            "events": events,
        });
        output::print_json(&json)?;
    } else {
        if stored {
            println!("{} Cached document: {}", "✓".green(), name);
        } else {
            println!("{} Failed to cache document: {}", "✗".red(), name);
        }
        for event in &events {
            println!("{}", EventDisplay(event));
        }
    }

    if stored {
        Ok(())
    } else {
        Err(Error::Other(format!("Could not cache {}", url)))
    }
}

/// Store a JSON snapshot under the snapshot key
pub fn snapshot(opts: &GlobalOptions, json: &str) -> Result<()> {
    let data: serde_json::Value = serde_json::from_str(json)?;
    let ctx = WorkerContext::new(opts)?;
    ctx.worker.cache_snapshot(&data)?;

    let key = ctx.worker.config().cache.snapshot_key.clone();
    if opts.is_json() {
        let json = serde_json::json!({ "key": key, "success": true });
        return output::print_json(&json);
    }
    println!("{} Stored snapshot under {}", "✓".green(), key);
    Ok(())
}
