//! Line protocol for client-server communication
//!
//! One request per `\n`-terminated line, fields separated by tabs:
//! - `PUT <db> <needle> <ref> [weight]` -> `OK`
//! - `FIND <db> <needle> [limit]` -> `FOUND [ref]...`
//! - `DELETE <db> <ref>` -> `OK`
//! - `CLEAR <db>` -> `OK`
//!
//! Any failure is answered with `ERROR <message>`.

use crate::index::types::Reference;
use memchr::memchr_iter;
use regex::Regex;
use std::fmt;
use std::io::{self, BufRead, Read, Write};
use std::sync::LazyLock;

/// Longest request line accepted from a peer
pub const MAX_LINE_LEN: usize = 64 * 1024;

static DB_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_]+$").expect("valid db name pattern"));

/// Errors in the shape of a request line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unknown command")]
    UnknownCommand,
    #[error("Invalid db name")]
    InvalidDbName,
    #[error("wrong number of arguments")]
    WrongArgumentCount,
    #[error("Ref must be a number")]
    BadReference,
    #[error("Weight must be a number")]
    BadWeight,
    #[error("Limit must be a number")]
    BadLimit,
    #[error("Needle must not contain tabs or newlines")]
    BadNeedle,
}

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Put {
        db: String,
        needle: String,
        /// Raw numeric values; range checks belong to the map
        reference: u64,
        weight: u64,
    },
    Find {
        db: String,
        needle: String,
        /// `None` or `Some(0)` selects the configured default
        limit: Option<usize>,
    },
    Delete {
        db: String,
        reference: u64,
    },
    Clear {
        db: String,
    },
}

impl Command {
    pub fn db(&self) -> &str {
        match self {
            Command::Put { db, .. }
            | Command::Find { db, .. }
            | Command::Delete { db, .. }
            | Command::Clear { db } => db,
        }
    }

    /// Encode as a request line without the trailing newline
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        if !DB_NAME.is_match(self.db()) {
            return Err(ProtocolError::InvalidDbName);
        }
        Ok(match self {
            Command::Put {
                db,
                needle,
                reference,
                weight,
            } => {
                check_needle(needle)?;
                format!("PUT\t{db}\t{needle}\t{reference}\t{weight}")
            }
            Command::Find { db, needle, limit } => {
                check_needle(needle)?;
                match limit {
                    Some(limit) => format!("FIND\t{db}\t{needle}\t{limit}"),
                    None => format!("FIND\t{db}\t{needle}"),
                }
            }
            Command::Delete { db, reference } => format!("DELETE\t{db}\t{reference}"),
            Command::Clear { db } => format!("CLEAR\t{db}"),
        })
    }
}

fn check_needle(needle: &str) -> Result<(), ProtocolError> {
    if needle.contains(['\t', '\n', '\r']) {
        Err(ProtocolError::BadNeedle)
    } else {
        Ok(())
    }
}

/// Split a line on tabs
fn fields(line: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    for pos in memchr_iter(b'\t', line.as_bytes()) {
        fields.push(&line[start..pos]);
        start = pos + 1;
    }
    fields.push(&line[start..]);
    fields
}

fn parse_number<T: std::str::FromStr>(field: &str, err: ProtocolError) -> Result<T, ProtocolError> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err);
    }
    field.parse().map_err(|_| err)
}

/// Parse one request line (trailing `\r\n` or `\n` is ignored)
pub fn parse_command(line: &str) -> Result<Command, ProtocolError> {
    let line = line.trim_end_matches(['\n', '\r']);
    let fields = fields(line);

    let (name, rest) = match fields.split_first() {
        Some((name, rest)) if matches!(*name, "PUT" | "FIND" | "DELETE" | "CLEAR") => (*name, rest),
        _ => return Err(ProtocolError::UnknownCommand),
    };

    let db = match rest.first() {
        Some(db) if DB_NAME.is_match(db) => db.to_string(),
        _ => return Err(ProtocolError::InvalidDbName),
    };
    let args = &rest[1..];

    match (name, args) {
        ("PUT", [needle, reference]) => Ok(Command::Put {
            db,
            needle: needle.to_string(),
            reference: parse_number(reference, ProtocolError::BadReference)?,
            weight: 0,
        }),
        ("PUT", [needle, reference, weight]) => Ok(Command::Put {
            db,
            needle: needle.to_string(),
            reference: parse_number(reference, ProtocolError::BadReference)?,
            weight: parse_number(weight, ProtocolError::BadWeight)?,
        }),
        ("FIND", [needle]) => Ok(Command::Find {
            db,
            needle: needle.to_string(),
            limit: None,
        }),
        ("FIND", [needle, limit]) => Ok(Command::Find {
            db,
            needle: needle.to_string(),
            limit: Some(parse_number(limit, ProtocolError::BadLimit)?),
        }),
        ("DELETE", [reference]) => Ok(Command::Delete {
            db,
            reference: parse_number(reference, ProtocolError::BadReference)?,
        }),
        ("CLEAR", []) => Ok(Command::Clear { db }),
        _ => Err(ProtocolError::WrongArgumentCount),
    }
}

/// A reply line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Found(Vec<Reference>),
    Error(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => write!(f, "OK"),
            Reply::Found(refs) => {
                write!(f, "FOUND")?;
                for reference in refs {
                    write!(f, "\t{reference}")?;
                }
                Ok(())
            }
            Reply::Error(message) => {
                // Keep the reply on a single line
                let message = message.replace(['\t', '\n', '\r'], " ");
                write!(f, "ERROR\t{message}")
            }
        }
    }
}

impl Reply {
    /// Parse a reply line; `None` if it is not a known reply
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        let fields = fields(line);
        match fields.as_slice() {
            ["OK"] => Some(Reply::Ok),
            ["FOUND", refs @ ..] => refs
                .iter()
                .map(|r| r.parse::<u32>().ok().map(Reference))
                .collect::<Option<Vec<_>>>()
                .map(Reply::Found),
            ["ERROR", message @ ..] => Some(Reply::Error(message.join("\t"))),
            _ => None,
        }
    }
}

/// Read one line, rejecting lines longer than [`MAX_LINE_LEN`].
///
/// Returns `Ok(None)` at end of stream.
pub fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_LINE_LEN as u64 + 1)
        .read_until(b'\n', &mut buf)?;
    if read == 0 {
        return Ok(None);
    }
    if buf.len() > MAX_LINE_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "line too long"));
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "line is not UTF-8"))
}

/// Write one line and flush
pub fn write_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_put() {
        assert_eq!(
            parse_command("PUT\tlocations_en\tgreat london\t12\n").unwrap(),
            Command::Put {
                db: "locations_en".into(),
                needle: "great london".into(),
                reference: 12,
                weight: 0
            }
        );
        assert_eq!(
            parse_command("PUT\tdb\tWhatever string\t12\t1").unwrap(),
            Command::Put {
                db: "db".into(),
                needle: "Whatever string".into(),
                reference: 12,
                weight: 1
            }
        );
    }

    #[test]
    fn test_parse_find() {
        assert_eq!(
            parse_command("FIND\tdb\tgreat").unwrap(),
            Command::Find {
                db: "db".into(),
                needle: "great".into(),
                limit: None
            }
        );
        assert_eq!(
            parse_command("FIND\tdb\tgreat\t2\r\n").unwrap(),
            Command::Find {
                db: "db".into(),
                needle: "great".into(),
                limit: Some(2)
            }
        );
    }

    #[test]
    fn test_parse_delete_and_clear() {
        assert_eq!(
            parse_command("DELETE\tdb\t7").unwrap(),
            Command::Delete {
                db: "db".into(),
                reference: 7
            }
        );
        assert_eq!(
            parse_command("CLEAR\tlocations_en").unwrap(),
            Command::Clear {
                db: "locations_en".into()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            ("Some stuff", ProtocolError::UnknownCommand),
            ("", ProtocolError::UnknownCommand),
            ("find\tdb\tx", ProtocolError::UnknownCommand),
            ("FIND\tbad db name\tWhatever string", ProtocolError::InvalidDbName),
            ("FIND", ProtocolError::InvalidDbName),
            ("FIND\tdb\tWhatever string\tlimit", ProtocolError::BadLimit),
            ("PUT\tdb\tWhatever string\t12\tweight", ProtocolError::BadWeight),
            ("PUT\tdb\tWhatever string\tref", ProtocolError::BadReference),
            ("PUT\tdb\tWhatever string\t-1", ProtocolError::BadReference),
            (
                "PUT\tdb\tWhatever string\t1\t2\targument too much",
                ProtocolError::WrongArgumentCount,
            ),
            ("CLEAR\tdb\textra", ProtocolError::WrongArgumentCount),
            ("DELETE\tdb", ProtocolError::WrongArgumentCount),
        ];
        for (line, expected) in cases {
            assert_eq!(parse_command(line), Err(expected), "{line:?}");
        }
    }

    #[test]
    fn test_command_to_line() {
        let command = Command::Find {
            db: "places".into(),
            needle: "new york".into(),
            limit: Some(3),
        };
        let line = command.to_line().unwrap();
        assert_eq!(line, "FIND\tplaces\tnew york\t3");
        assert_eq!(parse_command(&line).unwrap(), command);

        let bad = Command::Put {
            db: "places".into(),
            needle: "a\tb".into(),
            reference: 1,
            weight: 0,
        };
        assert_eq!(bad.to_line(), Err(ProtocolError::BadNeedle));
    }

    #[test]
    fn test_reply_format() {
        assert_eq!(Reply::Ok.to_string(), "OK");
        assert_eq!(Reply::Found(vec![]).to_string(), "FOUND");
        assert_eq!(
            Reply::Found(vec![Reference(12), Reference(13)]).to_string(),
            "FOUND\t12\t13"
        );
        assert_eq!(
            Reply::Error("bad\tthing".into()).to_string(),
            "ERROR\tbad thing"
        );
    }

    #[test]
    fn test_reply_parse() {
        assert_eq!(Reply::parse("OK\n"), Some(Reply::Ok));
        assert_eq!(Reply::parse("FOUND"), Some(Reply::Found(vec![])));
        assert_eq!(
            Reply::parse("FOUND\t12\t13"),
            Some(Reply::Found(vec![Reference(12), Reference(13)]))
        );
        assert_eq!(
            Reply::parse("ERROR\tUnknown command"),
            Some(Reply::Error("Unknown command".into()))
        );
        assert_eq!(Reply::parse("FOUND\tx"), None);
        assert_eq!(Reply::parse("HELLO"), None);
    }

    #[test]
    fn test_read_line() {
        let mut cursor = Cursor::new(b"PUT\tdb\tx\t1\nFIND\tdb\tx".to_vec());
        assert_eq!(read_line(&mut cursor).unwrap().unwrap(), "PUT\tdb\tx\t1\n");
        assert_eq!(read_line(&mut cursor).unwrap().unwrap(), "FIND\tdb\tx");
        assert_eq!(read_line(&mut cursor).unwrap(), None);
    }

    #[test]
    fn test_read_line_too_long() {
        let mut cursor = Cursor::new(vec![b'a'; MAX_LINE_LEN + 10]);
        assert!(read_line(&mut cursor).is_err());
    }
}
