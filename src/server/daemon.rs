//! TCP server for the line protocol
//!
//! Every connection gets its own thread; all commands funnel through one
//! mutex around the [`CommandProcessor`]. A saver thread persists dirty
//! databases periodically and a final save runs when the server stops.

use crate::server::processor::CommandProcessor;
use crate::server::protocol::{Reply, read_line, write_line};
use anyhow::{Context, Result};
use std::io::{self, BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Idle time after which a connection is dropped
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(300);

/// Reply to requests that arrive after shutdown began
const SHUTTING_DOWN: &str = "shutting down";

/// Granularity at which the saver thread notices shutdown
const SAVER_TICK: Duration = Duration::from_millis(100);

/// State shared by the accept loop, connection threads and the saver
struct ServerState {
    processor: Mutex<CommandProcessor>,
    shutdown: AtomicBool,
    save_interval: Duration,
}

impl ServerState {
    fn processor(&self) -> MutexGuard<'_, CommandProcessor> {
        // A panicking connection thread cannot leave a map half-updated:
        // every map operation validates before it mutates
        self.processor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Execute one request line unless the server is stopping.
    ///
    /// The flag is tested under the processor lock, so a command either
    /// runs before the final save or is refused.
    fn respond(&self, line: &str) -> Reply {
        let mut processor = self.processor();
        if self.is_shutting_down() {
            return Reply::Error(SHUTTING_DOWN.to_string());
        }
        processor.process_line(line)
    }

    fn save_all(&self) {
        if let Err(e) = self.processor().save_all() {
            error!(error = %e, "save failed");
        }
    }
}

/// A bound, not yet running server
pub struct Server {
    listener: TcpListener,
    state: Arc<ServerState>,
}

/// Handle for stopping a running server from another thread
#[derive(Clone)]
pub struct ServerHandle {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl ServerHandle {
    /// Ask the server to stop; `run` returns after the final save
    pub fn shutdown(&self) {
        self.state.shutdown.store(true, Ordering::SeqCst);
        // Wake the accept loop
        let _ = TcpStream::connect(self.addr);
    }
}

impl Server {
    pub fn bind(
        addr: impl ToSocketAddrs,
        processor: CommandProcessor,
        save_interval: Duration,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).context("Failed to bind listener")?;
        Ok(Self {
            listener,
            state: Arc::new(ServerState {
                processor: Mutex::new(processor),
                shutdown: AtomicBool::new(false),
                save_interval,
            }),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> io::Result<ServerHandle> {
        Ok(ServerHandle {
            addr: self.local_addr()?,
            state: Arc::clone(&self.state),
        })
    }

    /// Serve until [`ServerHandle::shutdown`] is called (blocking)
    pub fn run(self) -> Result<()> {
        let addr = self.local_addr()?;
        info!(%addr, "listening");

        let saver = {
            let state = Arc::clone(&self.state);
            thread::Builder::new()
                .name("saver".into())
                .spawn(move || run_saver(&state))
                .context("Failed to spawn saver thread")?
        };

        for stream in self.listener.incoming() {
            if self.state.is_shutting_down() {
                break;
            }

            match stream {
                Ok(stream) => {
                    let _ = stream.set_read_timeout(Some(CONNECTION_TIMEOUT));
                    let _ = stream.set_write_timeout(Some(CONNECTION_TIMEOUT));

                    let state = Arc::clone(&self.state);
                    thread::spawn(move || {
                        let peer = stream.peer_addr().ok();
                        if let Err(e) = handle_connection(&state, stream) {
                            debug!(?peer, error = %e, "connection closed with error");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                }
            }
        }

        if saver.join().is_err() {
            error!("saver thread panicked");
        }
        self.state.save_all();
        info!("server stopped");
        Ok(())
    }
}

fn run_saver(state: &ServerState) {
    let mut last_save = Instant::now();
    while !state.is_shutting_down() {
        thread::sleep(SAVER_TICK);
        if last_save.elapsed() >= state.save_interval {
            debug!("periodic save");
            state.save_all();
            last_save = Instant::now();
        }
    }
}

/// Serve requests on one connection until the peer disconnects
fn handle_connection(state: &ServerState, stream: TcpStream) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    loop {
        let line = match read_line(&mut reader) {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                write_line(&mut writer, &Reply::Error(e.to_string()).to_string())?;
                break;
            }
            Err(e) => return Err(e),
        };

        let reply = state.respond(&line);
        write_line(&mut writer, &reply.to_string())?;
        if state.is_shutting_down() {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::registry::Registry;
    use crate::index::{Limits, Reference, TrigramMap};
    use std::io::{BufRead, Write};

    fn start(dir: &std::path::Path, save_interval: Duration) -> (ServerHandle, SocketAddr, thread::JoinHandle<Result<()>>) {
        let processor = CommandProcessor::new(Registry::new(dir), 8);
        let server = Server::bind("127.0.0.1:0", processor, save_interval).unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.handle().unwrap();
        let join = thread::spawn(move || server.run());
        (handle, addr, join)
    }

    fn request(stream: &mut BufReader<TcpStream>, line: &str) -> String {
        stream.get_mut().write_all(format!("{line}\n").as_bytes()).unwrap();
        let mut reply = String::new();
        stream.read_line(&mut reply).unwrap();
        reply.trim_end().to_string()
    }

    #[test]
    fn test_serves_requests_and_saves_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, addr, join) = start(dir.path(), Duration::from_secs(3600));

        let mut conn = BufReader::new(TcpStream::connect(addr).unwrap());
        assert_eq!(request(&mut conn, "PUT\tplaces\tlondon\t1"), "OK");
        assert_eq!(request(&mut conn, "FIND\tplaces\tlondon"), "FOUND\t1");
        assert_eq!(request(&mut conn, "nonsense"), "ERROR\tUnknown command");
        drop(conn);

        handle.shutdown();
        join.join().unwrap().unwrap();
        assert!(dir.path().join("places.trigrams").exists());
    }

    #[test]
    fn test_requests_refused_once_shutting_down() {
        let dir = tempfile::tempdir().unwrap();
        let state = ServerState {
            processor: Mutex::new(CommandProcessor::new(Registry::new(dir.path()), 8)),
            shutdown: AtomicBool::new(false),
            save_interval: Duration::from_secs(3600),
        };

        assert_eq!(state.respond("PUT\tplaces\tlondon\t1"), Reply::Ok);
        state.shutdown.store(true, Ordering::SeqCst);
        assert_eq!(
            state.respond("PUT\tplaces\tparis\t2"),
            Reply::Error("shutting down".to_string())
        );
        assert_eq!(
            state.respond("FIND\tplaces\tparis").to_string(),
            "ERROR\tshutting down"
        );

        state.save_all();
        let map = TrigramMap::load(dir.path().join("places.trigrams"), Limits::default()).unwrap();
        assert!(map.contains(Reference(1)).unwrap());
        assert!(!map.contains(Reference(2)).unwrap());
    }

    #[test]
    fn test_periodic_save() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, addr, join) = start(dir.path(), Duration::from_millis(200));

        let mut conn = BufReader::new(TcpStream::connect(addr).unwrap());
        assert_eq!(request(&mut conn, "PUT\tplaces\tparis\t2"), "OK");

        let path = dir.path().join("places.trigrams");
        let deadline = Instant::now() + Duration::from_secs(10);
        while !path.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
        }
        assert!(path.exists());

        drop(conn);
        handle.shutdown();
        join.join().unwrap().unwrap();
    }
}
