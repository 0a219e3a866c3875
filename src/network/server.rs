//! TCP Server
//!
//! Accepts connections and hands each one to its own thread.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{CoordError, Result};
use crate::protocol::{encode_response, Response};

use super::Connection;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Stops a running [`Server`] from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// TCP server for CoordKV
pub struct Server {
    config: Config,
    engine: Engine,
    listener: TcpListener,
    shutdown: ShutdownHandle,
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Bind the listen address from `config`
    pub fn bind(config: Config, engine: Engine) -> Result<Self> {
        if config.max_connections == 0 {
            return Err(CoordError::Config("max_connections must be at least 1".to_string()));
        }
        if config.max_request_bytes == 0 {
            return Err(CoordError::Config("max_request_bytes must be at least 1".to_string()));
        }

        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            CoordError::Network(format!("failed to bind {}: {}", config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            engine,
            listener,
            shutdown: ShutdownHandle {
                flag: Arc::new(AtomicBool::new(false)),
            },
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Accept connections until shut down (blocking)
    ///
    /// Connections already open keep running after this returns.
    pub fn run(&self) -> Result<()> {
        tracing::info!("Listening on {}", self.local_addr()?);

        while !self.shutdown.is_shutdown() {
            match self.listener.accept() {
                Ok((stream, addr)) => self.dispatch(stream, addr),
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("Server shutting down");
        Ok(())
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        if self.active.fetch_add(1, Ordering::AcqRel) >= self.config.max_connections {
            self.active.fetch_sub(1, Ordering::AcqRel);
            tracing::warn!("Rejecting {}: connection limit reached", addr);
            reject(stream, self.engine.index());
            return;
        }

        let engine = self.engine.clone();
        let config = self.config.clone();
        let active = Arc::clone(&self.active);

        let spawned = thread::Builder::new()
            .name(format!("coordkv-conn-{}", addr))
            .spawn(move || {
                if let Err(e) = serve(stream, engine, &config) {
                    tracing::warn!("Connection {} ended with error: {}", addr, e);
                }
                active.fetch_sub(1, Ordering::AcqRel);
            });

        if let Err(e) = spawned {
            tracing::warn!("Failed to spawn connection thread for {}: {}", addr, e);
            self.active.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

fn serve(stream: TcpStream, engine: Engine, config: &Config) -> Result<()> {
    // Accepted sockets must block; only the listener polls
    stream.set_nonblocking(false)?;
    let mut connection = Connection::new(stream, engine, config.max_request_bytes)?;
    connection.set_timeouts(config.read_timeout_ms, config.write_timeout_ms)?;
    connection.handle()
}

fn reject(stream: TcpStream, index: u64) {
    use std::io::Write;

    let error = CoordError::Network("too many connections".to_string());
    if let Ok(line) = encode_response(&Response::from_error(&error, index)) {
        let mut stream = stream;
        let _ = stream.set_nonblocking(false);
        let _ = writeln!(stream, "{}", line);
    }
}
