//! Reader CLI commands: `page`, `jump`, `open`, and `locate`.
//!
//! Each command runs one render cycle and prints the result to stdout,
//! either as text or, with `--json`, as a single JSON object.

use anyhow::Result;
use musannaf_core::{Record, ViewMode, ViewRequest};

use crate::config::Config;
use crate::viewer::{Navigation, RenderedView, Viewer};

/// Renders `request` and prints it.
pub async fn run_view(config: &Config, request: ViewRequest, json: bool) -> Result<()> {
    let viewer = Viewer::from_config(config)?;
    let view = viewer.render(&request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_view(&view);
    }
    Ok(())
}

/// Validates raw jump input and renders the target record.
pub async fn run_jump(config: &Config, input: &str, json: bool) -> Result<()> {
    let layout = config.layout()?;
    let id = layout.parse_jump_input(input)?;
    run_view(config, ViewRequest::jump(id), json).await
}

/// Prints where a record lives without fetching anything.
pub fn run_locate(config: &Config, input: &str) -> Result<()> {
    let layout = config.layout()?;
    let id = layout.parse_jump_input(input)?;
    let chunk = layout.resolve_jump(id)?;

    println!("record:       {}", id);
    println!("chunk:        {}", chunk);
    println!("path:         {}", chunk.path_in(&config.corpus.data_dir));
    println!("local offset: {}", layout.slice_within_chunk(id));
    println!("page:         {}", layout.page_for_record(id));
    Ok(())
}

fn print_view(view: &RenderedView) {
    for notice in &view.notices {
        println!("! {}", notice);
    }
    if !view.notices.is_empty() {
        println!();
    }

    for record in &view.records {
        print_record(record, view.highlight == record.hadith_id && view.highlight.is_some());
    }

    println!("{}", navigation_line(&view.navigation));
    if let ViewMode::Page { .. } = view.view {
        if !view.range.is_empty() {
            println!("Hadiths {}-{}", view.range.start, view.range.end);
        }
    }
}

fn print_record(record: &Record, highlight: bool) {
    let marker = if highlight { ">>" } else { "--" };
    println!("{} Hadith #{} {}", marker, record.id_label(), marker);
    if let Some(ar) = record.arabic_text.as_deref().filter(|s| !s.is_empty()) {
        println!("{}", ar);
    }
    if let Some(en) = record.english_text.as_deref().filter(|s| !s.is_empty()) {
        println!("{}", en);
    }
    println!("Narrators: {}", record.narrators_en.as_deref().unwrap_or(""));
    println!();
}

fn navigation_line(nav: &Navigation) -> String {
    let mut parts: Vec<String> = Vec::new();
    match nav {
        Navigation::Pages(w) => {
            if w.has_prev() {
                parts.push("First".to_string());
                parts.push(format!("Prev({})", w.current - 1));
            }
            if w.leading_ellipsis() {
                parts.push("...".to_string());
            }
            for p in w.pages() {
                if p == w.current {
                    parts.push(format!("[{}]", p));
                } else {
                    parts.push(p.to_string());
                }
            }
            if w.trailing_ellipsis() {
                parts.push("...".to_string());
            }
            if w.has_next() {
                parts.push(format!("Next({})", w.current + 1));
                parts.push(format!("Last({})", w.total_pages));
            }
            parts.push(format!("  Page {} of {}", w.current, w.total_pages));
        }
        Navigation::Jump(nav) => {
            parts.push("First(1)".to_string());
            if nav.has_prev() {
                parts.push(format!("Prev({})", nav.prev));
            }
            parts.push(format!("Hadith {} of {}", nav.current, nav.total));
            if nav.has_next() {
                parts.push(format!("Next({})", nav.next));
            }
            parts.push(format!("Last({})", nav.last));
        }
    }
    parts.join(" ")
}
