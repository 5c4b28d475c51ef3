use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use divcrawl_core::crawl::{CrawlOptions, execute_crawl, execute_retry, generate_crawl_report};
use divcrawl_core::data::{merge_records, read_retries, write_records, write_retries};
use divcrawl_scanner::RetryEntry;
use std::path::PathBuf;
use url::Url;

/// Expand `~` in a user supplied path
pub fn resolve_output_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Build crawl options from parsed command line arguments
pub fn crawl_options_from_args(args: &ArgMatches) -> CrawlOptions {
    let mut options = CrawlOptions::default();

    if let Some(base_url) = args.get_one::<Url>("base-url") {
        options.base_url = base_url.clone();
    }
    if let Ok(Some(root)) = args.try_get_one::<String>("root") {
        options.root_page = root.clone();
    }
    if let Some(encoding) = args.get_one::<String>("encoding") {
        options.encoding = encoding.clone();
    }
    if let Some(timeout) = args.get_one::<u64>("timeout") {
        options.timeout_secs = *timeout;
    }
    if let Some(max_level) = args.get_one::<u8>("max-level") {
        options.max_level = *max_level;
    }
    options.show_progress_bars = !args.get_flag("quiet");
    options
}

/// Print the retry list, one line per failed page
pub fn print_retries(retries: &[RetryEntry]) {
    if retries.is_empty() {
        println!("{} No pages to retry", "✓".green().bold());
        return;
    }
    println!(
        "{} {} pages could not be expanded:",
        "⚠".yellow().bold(),
        retries.len()
    );
    for entry in retries {
        println!(
            "  {} {} {}",
            "•".yellow(),
            entry.link.bright_white(),
            entry.error.bright_black()
        );
    }
}

fn save_retries(args: &ArgMatches, retries: &[RetryEntry]) -> Result<()> {
    if let Some(raw) = args.get_one::<String>("retries-file") {
        let path = resolve_output_path(raw);
        write_retries(&path, retries)
            .with_context(|| format!("saving retry list to {}", path.display()))?;
        println!(
            "{} Retry list: {}",
            "→".blue(),
            path.display().to_string().bright_white()
        );
    }
    Ok(())
}

pub async fn handle_crawl(args: &ArgMatches) -> Result<()> {
    let options = crawl_options_from_args(args);
    let output = resolve_output_path(
        args.get_one::<String>("output")
            .map(String::as_str)
            .unwrap_or("~/district.json"),
    );
    let pretty = args.get_flag("pretty");

    println!(
        "{} Crawling {}{}",
        "→".blue(),
        options.base_url.as_str().bright_white(),
        options.root_page.bright_white()
    );

    let outcome = execute_crawl(options)
        .await
        .context("root page could not be loaded")?;

    print_retries(&outcome.retries);
    println!("{} Total records: {}", "✓".green().bold(), outcome.records.len());

    write_records(&output, &outcome.records, pretty)
        .with_context(|| format!("writing records to {}", output.display()))?;
    println!(
        "{} Output: {}",
        "→".blue(),
        output.display().to_string().bright_white()
    );
    save_retries(args, &outcome.retries)?;

    if !args.get_flag("quiet") {
        println!();
        print!("{}", generate_crawl_report(&outcome));
    }
    Ok(())
}

pub async fn handle_retry(args: &ArgMatches) -> Result<()> {
    let source = resolve_output_path(
        args.get_one::<String>("from")
            .context("--from is required")?,
    );
    let entries = read_retries(&source)
        .with_context(|| format!("reading retry list {}", source.display()))?;
    let output = resolve_output_path(
        args.get_one::<String>("output")
            .map(String::as_str)
            .unwrap_or("~/district.json"),
    );
    let pretty = args.get_flag("pretty");

    println!(
        "{} Retrying {} pages from {}",
        "→".blue(),
        entries.len(),
        source.display().to_string().bright_white()
    );

    let options = crawl_options_from_args(args);
    let outcome = execute_retry(options, entries).await?;

    print_retries(&outcome.retries);
    let total = merge_records(&output, &outcome.records, pretty)
        .with_context(|| format!("merging records into {}", output.display()))?;
    println!(
        "{} {} new records, {} total in {}",
        "✓".green().bold(),
        outcome.records.len(),
        total,
        output.display()
    );

    // Remaining failures replace the list that was just retried.
    write_retries(&source, &outcome.retries)
        .with_context(|| format!("updating retry list {}", source.display()))?;
    save_retries(args, &outcome.retries)?;
    Ok(())
}
