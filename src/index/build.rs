use crate::index::registry::Registry;
use crate::index::types::{Reference, Weight};
use crate::utils::progress::import_bar;
use anyhow::{Context, Result, bail};
use memchr::memchr_iter;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// One parsed line of an import file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord<'a> {
    pub needle: &'a str,
    pub reference: Reference,
    pub weight: Weight,
}

/// Outcome of a bulk import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Needles stored
    pub added: usize,
    /// Lines whose reference was already present
    pub duplicates: usize,
    /// Malformed or out-of-range lines
    pub skipped: usize,
}

/// Parse `needle<TAB>reference[<TAB>weight]`
pub fn parse_record(line: &str) -> Result<ImportRecord<'_>> {
    let bytes = line.as_bytes();
    let mut tabs = memchr_iter(b'\t', bytes);

    let Some(first) = tabs.next() else {
        bail!("missing reference column");
    };
    let second = tabs.next();
    if tabs.next().is_some() {
        bail!("too many columns");
    }

    let needle = &line[..first];
    let (reference, weight) = match second {
        Some(second) => (&line[first + 1..second], Some(&line[second + 1..])),
        None => (&line[first + 1..], None),
    };

    let reference = reference
        .trim()
        .parse::<u32>()
        .with_context(|| format!("bad reference {reference:?}"))?;
    let weight = match weight {
        Some(w) => w
            .trim()
            .parse::<u32>()
            .with_context(|| format!("bad weight {w:?}"))?,
        None => 0,
    };

    Ok(ImportRecord {
        needle,
        reference: Reference(reference),
        weight,
    })
}

/// Load a TSV file into the database `name` and save it.
///
/// Blank lines and lines starting with `#` are ignored. Malformed lines are
/// logged and skipped rather than aborting the import.
pub fn import_tsv(registry: &mut Registry, name: &str, input: &Path, silent: bool) -> Result<ImportSummary> {
    let content = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let lines: Vec<&str> = content.lines().collect();

    let map = registry
        .get_or_create(name)
        .with_context(|| format!("Failed to open database {name}"))?;

    let progress_bar = (!silent).then(|| import_bar(lines.len() as u64));
    let mut summary = ImportSummary::default();

    for (lineno, line) in lines.iter().enumerate() {
        if let Some(pb) = &progress_bar {
            pb.inc(1);
        }
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let record = match parse_record(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "skipping malformed line");
                summary.skipped += 1;
                continue;
            }
        };

        match map.put(record.needle, record.reference, record.weight) {
            Ok(0) => summary.duplicates += 1,
            Ok(_) => summary.added += 1,
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "skipping rejected line");
                summary.skipped += 1;
            }
        }
    }

    if let Some(pb) = progress_bar {
        pb.finish_with_message("done");
    }

    registry.save_all().context("Failed to save databases")?;
    info!(
        name,
        added = summary.added,
        duplicates = summary.duplicates,
        skipped = summary.skipped,
        "import complete"
    );
    Ok(summary)
}
