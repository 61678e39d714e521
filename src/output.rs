//! Terminal formatting for lookup results

use crate::index::types::{Match, Reference};
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn stdout(color: bool) -> StandardStream {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Print references returned by a server, one per line with its rank
pub fn print_references(refs: &[Reference], color: bool) -> io::Result<()> {
    let mut stdout = stdout(color);
    if refs.is_empty() {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        writeln!(stdout, "no matches")?;
        stdout.reset()?;
        return Ok(());
    }

    for (rank, reference) in refs.iter().enumerate() {
        write_rank(&mut stdout, rank)?;
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
        writeln!(stdout, "{reference}")?;
        stdout.reset()?;
    }
    Ok(())
}

/// Print scored matches from a local map
pub fn print_matches(matches: &[Match], color: bool) -> io::Result<()> {
    let mut stdout = stdout(color);
    for (rank, m) in matches.iter().enumerate() {
        write_rank(&mut stdout, rank)?;
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
        write!(stdout, "{}", m.reference)?;
        stdout.reset()?;

        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        writeln!(stdout, "  score={} weight={}", m.score, m.weight)?;
        stdout.reset()?;
    }
    Ok(())
}

fn write_rank(stdout: &mut StandardStream, rank: usize) -> io::Result<()> {
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
    write!(stdout, "{:>3}", rank + 1)?;
    stdout.reset()?;
    write!(stdout, " ")
}
