//! Configuration for CoordKV
//!
//! Centralized configuration with sensible defaults.

/// Main configuration for a CoordKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Callback Configuration
    // -------------------------------------------------------------------------
    /// Name of the thread that runs scheduled callbacks
    pub executor_thread_name: String,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = no timeout)
    ///
    /// Watch streams sit idle between updates, so the default is no timeout.
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = no timeout)
    pub write_timeout_ms: u64,

    /// Longest request line accepted from a client (bytes)
    pub max_request_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            executor_thread_name: "coordkv-callbacks".to_string(),
            listen_addr: "127.0.0.1:4001".to_string(),
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
            max_request_bytes: 64 * 1024, // 64 KB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the name of the callback executor thread
    pub fn executor_thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.executor_thread_name = name.into();
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the longest accepted request line (in bytes)
    pub fn max_request_bytes(mut self, bytes: usize) -> Self {
        self.config.max_request_bytes = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
