//! Host configuration options.
//!
//! # Example
//!
//! ```ignore
//! use stream_capturer::HostOptions;
//!
//! let options = HostOptions::new()
//!     .with_port(9300)
//!     .with_capacity(100)
//!     .with_storage_path("/var/lib/stream-capturer/state.json");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::{DEFAULT_CAPACITY, FingerprintScheme};
use crate::forward::DEFAULT_PROXY_ENDPOINT;
use crate::transport::{DEFAULT_BIND_IP, DEFAULT_COMMAND_TIMEOUT};

// ============================================================================
// Constants
// ============================================================================

/// Default WebSocket port.
pub const DEFAULT_PORT: u16 = 9300;

/// Default state file, relative to the working directory.
pub const DEFAULT_STORAGE_FILE: &str = "stream-capturer.json";

// ============================================================================
// HostOptions
// ============================================================================

/// Host process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOptions {
    /// Persisted state file. `None` keeps state in memory.
    pub storage_path: Option<PathBuf>,

    /// WebSocket bind address.
    pub bind_ip: IpAddr,

    /// WebSocket port (0 for random).
    pub port: u16,

    /// Proxy server endpoint.
    pub proxy_endpoint: String,

    /// Maximum persisted records.
    pub capacity: usize,

    /// Fingerprint scheme for duplicate detection.
    pub scheme: FingerprintScheme,

    /// Timeout for bridge tab lookups.
    pub lookup_timeout: Duration,

    /// Reset persisted state on start.
    pub install: bool,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl HostOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage_path: Some(PathBuf::from(DEFAULT_STORAGE_FILE)),
            bind_ip: DEFAULT_BIND_IP,
            port: DEFAULT_PORT,
            proxy_endpoint: DEFAULT_PROXY_ENDPOINT.to_string(),
            capacity: DEFAULT_CAPACITY,
            scheme: FingerprintScheme::default(),
            lookup_timeout: DEFAULT_COMMAND_TIMEOUT,
            install: false,
        }
    }

    /// Creates options for an in-memory host on a random port.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self {
            storage_path: None,
            port: 0,
            ..Self::new()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl HostOptions {
    /// Sets the state file path.
    #[inline]
    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Keeps state in memory only.
    #[inline]
    #[must_use]
    pub fn with_memory_storage(mut self) -> Self {
        self.storage_path = None;
        self
    }

    /// Sets the bind address.
    #[inline]
    #[must_use]
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Sets the WebSocket port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the proxy endpoint.
    #[inline]
    #[must_use]
    pub fn with_proxy_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.proxy_endpoint = endpoint.into();
        self
    }

    /// Sets the persisted-list capacity.
    #[inline]
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the fingerprint scheme.
    #[inline]
    #[must_use]
    pub fn with_scheme(mut self, scheme: FingerprintScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sets the tab lookup timeout.
    #[inline]
    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Resets persisted state on start.
    #[inline]
    #[must_use]
    pub fn with_install(mut self) -> Self {
        self.install = true;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl HostOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("Capacity must be greater than zero".to_string());
        }
        if self.lookup_timeout.is_zero() {
            return Err("Lookup timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
