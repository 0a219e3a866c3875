//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::thread;
use std::time::Duration;

use crossbeam::channel;

use crate::engine::Engine;
use crate::error::{CoordError, Result};
use crate::protocol::{decode_command, encode_response, encode_watch_batch, Command, Request, Response};
use crate::watch::{CancellationToken, WatchUpdate};

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Handle to the shared engine
    engine: Engine,

    /// Peer address for logging
    peer_addr: String,

    /// Longest accepted request line
    max_request_bytes: usize,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O
    pub fn new(stream: TcpStream, engine: Engine, max_request_bytes: usize) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            engine,
            peer_addr,
            max_request_bytes,
        })
    }

    /// Configure connection timeouts
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let read_stream = self.reader.get_ref();
        let write_stream = self.writer.get_ref();

        if read_ms > 0 {
            read_stream.set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            write_stream.set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads one command per line and answers each with one line. A WATCH
    /// command turns the rest of the connection into an update stream.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let line = match read_request_line(&mut self.reader, self.max_request_bytes) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(ref e) if is_disconnect(e) => {
                    tracing::debug!("Client {} went away: {}", self.peer_addr, e);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    // Send error response if possible
                    let _ = self.send_error(&e);
                    return Err(e);
                }
            };

            if line.trim().is_empty() {
                continue;
            }
            let command = decode_command(&line);
            match command {
                Ok(ref command) => {
                    tracing::trace!("{:?} from {}", command.command_type(), self.peer_addr)
                }
                Err(_) => {
                    tracing::trace!("Undecodable line from {}: {}", self.peer_addr, line.trim_end())
                }
            }

            let result = match command {
                Ok(Command::Watch { prefix }) => return self.stream_watch(&prefix),
                Ok(Command::Request(request)) => self.execute_request(request),
                Ok(Command::Ping) => write_line(&mut self.writer, "PONG"),
                Ok(Command::Cancel) => {
                    self.send_error(&CoordError::Protocol("CANCEL outside of a watch".to_string()))
                }
                Err(e) => self.send_error(&e),
            };

            if let Err(e) = result {
                // If the client disconnected before we could send the response,
                // log and exit gracefully rather than treating it as a server error.
                if is_disconnect(&e) {
                    tracing::debug!(
                        "Client {} disconnected before response could be sent: {}",
                        self.peer_addr,
                        e
                    );
                    return Ok(());
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Execute a key/value request and send its response
    fn execute_request(&mut self, request: Request) -> Result<()> {
        let response = self
            .engine
            .execute(request)
            .unwrap_or_else(|e| Response::from_error(&e, self.engine.index()));
        self.send_response(&response)
    }

    /// Stream watch batches until the client cancels or disconnects
    fn stream_watch(&mut self, prefix: &str) -> Result<()> {
        let (tx, rx) = channel::unbounded::<Vec<WatchUpdate>>();
        let token = CancellationToken::new();

        self.engine.watch(
            prefix,
            move |updates| {
                let _ = tx.send(updates);
            },
            token.clone(),
        );
        tracing::debug!("Client {} watching {}", self.peer_addr, prefix);

        let reader = &mut self.reader;
        let writer = &mut self.writer;
        let peer = self.peer_addr.as_str();
        let max_request_bytes = self.max_request_bytes;

        let streamed = thread::scope(|scope| {
            let cancel = token.clone();
            scope.spawn(move || {
                wait_for_cancel(reader, max_request_bytes, peer);
                cancel.cancel();
            });

            // Ends once the watch is removed and every queued batch has run
            for batch in rx.iter() {
                let sent = encode_watch_batch(&batch).and_then(|line| write_line(writer, &line));
                if let Err(e) = sent {
                    token.cancel();
                    // Unblock the reader thread
                    let _ = writer.get_ref().shutdown(Shutdown::Both);
                    return Err(e);
                }
            }
            Ok(())
        });

        if let Err(e) = streamed {
            if is_disconnect(&e) {
                tracing::debug!("Watcher {} disconnected: {}", self.peer_addr, e);
                return Ok(());
            }
            return Err(e);
        }

        tracing::debug!("Watch for {} on {} ended", self.peer_addr, prefix);
        // The client may already be gone
        let _ = self.send_error(&CoordError::Cancelled);
        Ok(())
    }

    /// Send a response to the client
    fn send_response(&mut self, response: &Response) -> Result<()> {
        let line = encode_response(response)?;
        write_line(&mut self.writer, &line)
    }

    fn send_error(&mut self, error: &CoordError) -> Result<()> {
        let response = Response::from_error(error, self.engine.index());
        self.send_response(&response)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Read one line, refusing lines longer than `max_bytes`. `None` on EOF.
fn read_request_line(reader: &mut BufReader<TcpStream>, max_bytes: usize) -> Result<Option<String>> {
    let limit = max_bytes as u64 + 1;
    let mut line = String::new();
    let read = reader.by_ref().take(limit).read_line(&mut line)?;

    if read == 0 {
        return Ok(None);
    }
    if !line.ends_with('\n') && read as u64 >= limit {
        return Err(CoordError::Protocol(format!(
            "request line exceeds {} bytes",
            max_bytes
        )));
    }
    Ok(Some(line))
}

/// Block until the client sends CANCEL, disconnects, or the socket fails
fn wait_for_cancel(reader: &mut BufReader<TcpStream>, max_bytes: usize, peer: &str) {
    loop {
        match read_request_line(reader, max_bytes) {
            Ok(Some(line)) if line.trim().eq_ignore_ascii_case("CANCEL") => {
                tracing::debug!("Client {} cancelled its watch", peer);
                return;
            }
            Ok(Some(line)) => {
                tracing::debug!("Ignoring {:?} from {} during watch", line.trim_end(), peer);
            }
            Ok(None) | Err(_) => return,
        }
    }
}

fn write_line<W: Write>(writer: &mut W, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn is_disconnect(error: &CoordError) -> bool {
    match error {
        CoordError::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::WouldBlock
                | std::io::ErrorKind::TimedOut
        ),
        _ => false,
    }
}
