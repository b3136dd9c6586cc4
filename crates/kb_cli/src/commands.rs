use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use kb_core::db::now_epoch_ms;
use kb_core::{
    default_log_level, find_similar, init_logging, open_db, CaptureOptions, CaptureReport,
    CaptureService, Classifier, Embedder, EmbeddingRepository, Entry, EntryId, EntryListQuery,
    EntryService, KbConfig, LogTarget, SimilarEntry, SimilarityQuery, SqliteEmbeddingRepository,
    SqliteEntryRepository, SqliteTagRepository, SuggestionService, TagNode, TagService,
};
use log::warn;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::cli::{AddArgs, Cli, Commands, ListArgs, RelatedArgs};
use crate::providers::{classifier_from_config, embedder_from_config};

const PREFIX_SCAN_LIMIT: u32 = 100;
const PREVIEW_CHARS: usize = 80;
const SHORT_ID_CHARS: usize = 8;

pub(crate) fn run(cli: Cli) -> Result<()> {
    let config = KbConfig::from_env();
    start_logging(&config);

    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path.clone());
    ensure_parent_dir(&db_path)?;
    let conn = open_db(&db_path)
        .with_context(|| format!("failed to open database `{}`", db_path.display()))?;

    let json = cli.json;
    match cli.command {
        Commands::Add(args) => run_add(&conn, &config, args, json),
        Commands::List(args) => run_list(&conn, args, json),
        Commands::Show(arg) => {
            let id = resolve_entry_id(&conn, &arg.id)?;
            let entry = EntryService::new(SqliteEntryRepository::new(&conn)).open_entry(id)?;
            if json {
                return print_json(&entry);
            }
            print_entry_detail(&entry);
            Ok(())
        }
        Commands::Tags => {
            let tree = TagService::new(SqliteTagRepository::new(&conn)).tag_tree()?;
            if json {
                return print_json(&tree);
            }
            if tree.is_empty() {
                println!("No tags yet.");
            }
            for line in tag_tree_lines(&tree) {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Search(args) => {
            let query = args.query.join(" ");
            let hits = EntryService::new(SqliteEntryRepository::new(&conn)).search_entries(&query)?;
            print_entries(&hits, json, "No matching entries.")
        }
        Commands::Delete(arg) => {
            let id = resolve_entry_id(&conn, &arg.id)?;
            EntryService::new(SqliteEntryRepository::new(&conn)).delete_entry(id)?;
            if json {
                return print_json(&serde_json::json!({ "deleted": id }));
            }
            println!("Deleted {}", short_id(id));
            Ok(())
        }
        Commands::Suggest(args) => {
            let entries =
                SuggestionService::new(SqliteEntryRepository::new(&conn)).suggest(args.limit)?;
            print_entries(&entries, json, "Nothing to suggest yet.")
        }
        Commands::Related(args) => run_related(&conn, args, json),
    }
}

fn start_logging(config: &KbConfig) {
    let level = config
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    let target = match &config.log_dir {
        Some(dir) => match LogTarget::file(&dir.to_string_lossy()) {
            Ok(target) => target,
            Err(err) => {
                eprintln!("warning: {err}; logging to stderr");
                LogTarget::Stderr
            }
        },
        None => LogTarget::Stderr,
    };
    if let Err(err) = init_logging(&level, &target) {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create `{}`", parent.display()))?;
        }
    }
    Ok(())
}

fn run_add(conn: &Connection, config: &KbConfig, args: AddArgs, json: bool) -> Result<()> {
    let content = args.content.join(" ");
    let options = CaptureOptions {
        classify: !args.no_classify,
        embed: !args.no_embed,
        similar_limit: config.similar_limit,
    };

    let classifier = if options.classify {
        classifier_from_config(&config.classifier)?
    } else {
        None
    };
    let embedder = if options.embed {
        embedder_from_config(&config.embedder)?
    } else {
        None
    };
    if options.classify && classifier.is_none() {
        warn!("event=capture_setup module=cli status=skip step=classify reason=missing_api_key");
    }
    if options.embed && embedder.is_none() {
        warn!("event=capture_setup module=cli status=skip step=embed reason=missing_api_key");
    }

    let mut service = CaptureService::new(conn);
    if let Some(classifier) = classifier.as_ref() {
        service = service.with_classifier(classifier as &dyn Classifier);
    }
    if let Some(embedder) = embedder.as_ref() {
        service = service.with_embedder(embedder as &dyn Embedder);
    }

    let report = service.capture(&content, &options)?;
    for degradation in &report.degradations {
        eprintln!(
            "warning: {} step skipped ({}): {}",
            degradation.step.as_str(),
            degradation.kind,
            degradation.reason
        );
    }
    if json {
        return print_json(&report);
    }
    print_capture_report(&report);
    Ok(())
}

fn run_list(conn: &Connection, args: ListArgs, json: bool) -> Result<()> {
    let service = EntryService::new(SqliteEntryRepository::new(conn));
    let page = EntryListQuery {
        limit: args.limit,
        offset: args.offset,
    };
    let entries = match args.tag.as_deref() {
        Some(name) => {
            let tag = TagService::new(SqliteTagRepository::new(conn))
                .find_tag_by_name(name)?
                .with_context(|| format!("no tag named `{}`", name.trim()))?;
            service.list_entries_by_tag_page(tag.id, !args.exact, &page)?
        }
        None => service.list_entries(&page)?,
    };
    print_entries(&entries, json, "No entries yet.")
}

#[derive(Debug, Serialize)]
struct RelatedOutput {
    by_meaning: Vec<SimilarEntry>,
    by_tags: Vec<Entry>,
}

fn run_related(conn: &Connection, args: RelatedArgs, json: bool) -> Result<()> {
    let id = resolve_entry_id(conn, &args.id)?;
    let by_meaning = match SqliteEmbeddingRepository::new(conn).get_embedding(id)? {
        Some(embedding) => find_similar(
            conn,
            &SimilarityQuery::new(embedding.vector, args.limit).excluding(id),
        )?,
        None => Vec::new(),
    };
    let by_tags =
        SuggestionService::new(SqliteEntryRepository::new(conn)).similar_by_tags(id, args.limit)?;
    let output = RelatedOutput {
        by_meaning,
        by_tags,
    };
    if json {
        return print_json(&output);
    }

    println!("By meaning:");
    if output.by_meaning.is_empty() {
        println!("  (no embedding or no neighbours)");
    }
    for hit in &output.by_meaning {
        println!(
            "  {} {:.2}  {}",
            short_id(hit.entry.id),
            hit.similarity,
            preview(&hit.entry.content, PREVIEW_CHARS)
        );
    }
    println!("By tags:");
    if output.by_tags.is_empty() {
        println!("  (no entries share a tag)");
    }
    for entry in &output.by_tags {
        println!("  {}", entry_line(entry, now_epoch_ms()));
    }
    Ok(())
}

/// Resolves a full id, or a unique prefix among the most recent entries.
fn resolve_entry_id(conn: &Connection, raw: &str) -> Result<EntryId> {
    let raw = raw.trim();
    if let Ok(id) = Uuid::parse_str(raw) {
        return Ok(id);
    }
    if raw.is_empty() {
        bail!("entry id must not be empty");
    }

    let recent = EntryService::new(SqliteEntryRepository::new(conn)).list_entries(
        &EntryListQuery {
            limit: Some(PREFIX_SCAN_LIMIT),
            offset: 0,
        },
    )?;
    match match_prefix(recent.iter().map(|entry| entry.id), raw) {
        PrefixMatch::Unique(id) => Ok(id),
        PrefixMatch::None => bail!("no recent entry matches `{raw}`"),
        PrefixMatch::Ambiguous(count) => {
            bail!("`{raw}` matches {count} entries; use a longer prefix")
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PrefixMatch {
    None,
    Unique(EntryId),
    Ambiguous(usize),
}

fn match_prefix(ids: impl Iterator<Item = EntryId>, prefix: &str) -> PrefixMatch {
    let prefix = prefix.to_ascii_lowercase();
    let matches: Vec<EntryId> = ids
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();
    match matches.as_slice() {
        [] => PrefixMatch::None,
        [id] => PrefixMatch::Unique(*id),
        many => PrefixMatch::Ambiguous(many.len()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn print_entries(entries: &[Entry], json: bool, empty_message: &str) -> Result<()> {
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("{empty_message}");
    }
    let now = now_epoch_ms();
    for entry in entries {
        println!("{}", entry_line(entry, now));
    }
    Ok(())
}

fn print_entry_detail(entry: &Entry) {
    let now = now_epoch_ms();
    println!("{}", entry.id);
    println!("created: {}", format_age(now - entry.created_at));
    if !entry.tags.is_empty() {
        let names: Vec<&str> = entry.tags.iter().map(|tag| tag.name.as_str()).collect();
        println!("tags: {}", names.join(", "));
    }
    println!();
    println!("{}", entry.content);
}

fn print_capture_report(report: &CaptureReport) {
    println!("Saved {}", short_id(report.entry.id));
    for applied in &report.applied_tags {
        match &applied.parent {
            Some(parent) => println!(
                "  tag: {} (under {}) {:.2}",
                applied.tag.name, parent, applied.confidence
            ),
            None => println!("  tag: {} {:.2}", applied.tag.name, applied.confidence),
        }
    }
    if !report.similar.is_empty() {
        println!("Similar:");
        for hit in &report.similar {
            println!(
                "  {} {:.2}  {}",
                short_id(hit.entry.id),
                hit.similarity,
                preview(&hit.entry.content, PREVIEW_CHARS)
            );
        }
    }
}

/// Indented outline of the forest, depth-first in sibling order.
fn tag_tree_lines(forest: &[TagNode]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Vec<(&TagNode, usize)> =
        forest.iter().rev().map(|node| (node, 0)).collect();
    while let Some((node, depth)) = pending.pop() {
        lines.push(format!("{}{}", "  ".repeat(depth), node.name));
        pending.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
    }
    lines
}

fn entry_line(entry: &Entry, now: i64) -> String {
    let tags: Vec<&str> = entry.tags.iter().map(|tag| tag.name.as_str()).collect();
    let mut line = format!(
        "{}  {:>8}  {}",
        short_id(entry.id),
        format_age(now - entry.created_at),
        preview(&entry.content, PREVIEW_CHARS)
    );
    if !tags.is_empty() {
        line.push_str(&format!("  [{}]", tags.join(", ")));
    }
    line
}

fn short_id(id: EntryId) -> String {
    id.to_string().chars().take(SHORT_ID_CHARS).collect()
}

/// First line of `content`, capped at `max_chars` characters.
fn preview(content: &str, max_chars: usize) -> String {
    let first_line = content.trim().lines().next().unwrap_or_default();
    if first_line.chars().count() <= max_chars {
        return first_line.to_string();
    }
    let mut truncated: String = first_line.chars().take(max_chars.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}

fn format_age(elapsed_ms: i64) -> String {
    let seconds = elapsed_ms.max(0) / 1_000;
    match seconds {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", seconds / 60),
        3_600..=86_399 => format!("{}h ago", seconds / 3_600),
        _ => format!("{}d ago", seconds / 86_400),
    }
}
