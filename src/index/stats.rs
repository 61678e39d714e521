use crate::index::map::TrigramMap;
use crate::index::reader::read_header;
use crate::index::registry::MAP_EXTENSION;
use crate::index::types::Limits;
use crate::utils::ByteOrder;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Display statistics for one map file
pub fn show_stats(path: &Path) -> Result<()> {
    let header = read_header(path)?;
    let map = TrigramMap::load(path, Limits::default())?;
    let stats = map.stats()?;
    let size = fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();

    println!("Map Statistics");
    println!("==============");
    println!();
    println!("File:             {}", path.display());
    println!("File size:        {}", format_size(size));
    println!(
        "Byte order:       {}",
        match header.order {
            ByteOrder::Little => "little-endian",
            ByteOrder::Big => "big-endian",
        }
    );
    println!("Word size:        {} bytes", header.word_size);
    println!("References:       {}", stats.references);
    println!("Trigrams:         {}", stats.trigrams);

    Ok(())
}

/// List the map files in a databases directory
pub fn list_databases(dir: &Path) -> Result<()> {
    let mut names: Vec<(String, u64)> = Vec::new();
    if dir.is_dir() {
        for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == MAP_EXTENSION)
                && let Some(stem) = path.file_stem()
            {
                let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                names.push((stem.to_string_lossy().into_owned(), size));
            }
        }
    }

    if names.is_empty() {
        println!("No databases found in {}", dir.display());
        return Ok(());
    }

    names.sort();
    println!("Databases in {}", dir.display());
    println!();
    for (name, size) in names {
        println!("  {:20} {}", name, format_size(size));
    }
    Ok(())
}

/// Format byte size to human readable
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
