//! Client for a running fuzzmap server

use crate::index::types::Reference;
use crate::server::protocol::{Command, ProtocolError, Reply, read_line, write_line};
use std::io::{self, BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Read/write timeout
const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Communication error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Request could not be encoded
    #[error("invalid request: {0}")]
    Protocol(#[from] ProtocolError),
    /// Server returned an error
    #[error("server error: {0}")]
    Server(String),
    /// Unexpected or missing reply
    #[error("invalid response from server")]
    InvalidResponse,
}

/// Connection to a fuzzmap server bound to one database
pub struct Client {
    db: String,
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    pub fn connect(addr: impl ToSocketAddrs, db: &str) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr)?;
        let _ = stream.set_read_timeout(Some(IO_TIMEOUT));
        let _ = stream.set_write_timeout(Some(IO_TIMEOUT));

        Ok(Self {
            db: db.to_string(),
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    fn send(&mut self, command: Command) -> ClientResult<Reply> {
        write_line(&mut self.writer, &command.to_line()?)?;
        let line = read_line(&mut self.reader)?.ok_or(ClientError::InvalidResponse)?;
        match Reply::parse(&line) {
            Some(Reply::Error(message)) => Err(ClientError::Server(message)),
            Some(reply) => Ok(reply),
            None => Err(ClientError::InvalidResponse),
        }
    }

    fn expect_ok(&mut self, command: Command) -> ClientResult<()> {
        match self.send(command)? {
            Reply::Ok => Ok(()),
            _ => Err(ClientError::InvalidResponse),
        }
    }

    /// Store `needle` under `reference`
    pub fn put(&mut self, needle: &str, reference: u64, weight: u64) -> ClientResult<()> {
        self.expect_ok(Command::Put {
            db: self.db.clone(),
            needle: needle.to_string(),
            reference,
            weight,
        })
    }

    /// Find references for `needle`; a limit of `None` uses the server default
    pub fn find(&mut self, needle: &str, limit: Option<usize>) -> ClientResult<Vec<Reference>> {
        match self.send(Command::Find {
            db: self.db.clone(),
            needle: needle.to_string(),
            limit,
        })? {
            Reply::Found(refs) => Ok(refs),
            _ => Err(ClientError::InvalidResponse),
        }
    }

    pub fn delete(&mut self, reference: u64) -> ClientResult<()> {
        self.expect_ok(Command::Delete {
            db: self.db.clone(),
            reference,
        })
    }

    pub fn clear(&mut self) -> ClientResult<()> {
        self.expect_ok(Command::Clear {
            db: self.db.clone(),
        })
    }
}
