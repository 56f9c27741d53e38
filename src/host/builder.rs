//! Builder pattern for host configuration.
//!
//! # Example
//!
//! ```no_run
//! use stream_capturer::{Host, HostOptions};
//!
//! # async fn example() -> stream_capturer::Result<()> {
//! let host = Host::builder()
//!     .options(HostOptions::new().with_port(9300))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::storage::{FileStorage, MemoryStorage, Storage};

use super::Host;
use super::options::HostOptions;

// ============================================================================
// HostBuilder
// ============================================================================

/// Builder for configuring a [`Host`] instance.
///
/// Use [`Host::builder()`] to create a new builder.
#[derive(Default)]
pub struct HostBuilder {
    /// Host options.
    options: HostOptions,
    /// Storage backend overriding `options.storage_path`.
    storage: Option<Arc<dyn Storage>>,
}

// ============================================================================
// HostBuilder Implementation
// ============================================================================

impl HostBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: HostOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the state file path.
    #[inline]
    #[must_use]
    pub fn storage_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.options = self.options.with_storage_path(path);
        self
    }

    /// Uses a caller-provided storage backend.
    ///
    /// The backend is never treated as fresh; pass `with_install()` in the
    /// options to reset it.
    #[inline]
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the proxy endpoint.
    #[inline]
    #[must_use]
    pub fn proxy_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.options = self.options.with_proxy_endpoint(endpoint);
        self
    }

    /// Builds the host with validation.
    ///
    /// Runs the installation reset when the state file did not exist yet
    /// or the options ask for it.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if options are invalid or the endpoint is not an
    ///   HTTP(S) URL
    /// - [`Error::Storage`] / [`Error::Io`] if the state file cannot be
    ///   loaded
    pub async fn build(self) -> Result<Host> {
        self.options.validate().map_err(Error::config)?;
        let endpoint = self.validate_endpoint()?;

        let (storage, fresh): (Arc<dyn Storage>, bool) =
            match (self.storage, &self.options.storage_path) {
                (Some(storage), _) => (storage, false),
                (None, Some(path)) => {
                    let file = FileStorage::open(path).await?;
                    let fresh = file.is_fresh();
                    (Arc::new(file), fresh)
                }
                (None, None) => (Arc::new(MemoryStorage::new()), true),
            };

        let install = fresh || self.options.install;
        let host = Host::new(self.options, storage, endpoint);

        if install {
            host.install().await?;
        }

        debug!(install, "Host built");
        Ok(host)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl HostBuilder {
    /// Validates the proxy endpoint.
    fn validate_endpoint(&self) -> Result<Url> {
        let raw = &self.options.proxy_endpoint;

        let endpoint = Url::parse(raw)
            .map_err(|e| Error::config(format!("Invalid proxy endpoint '{raw}': {e}")))?;

        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Proxy endpoint must be http or https, got '{}'",
                endpoint.scheme()
            )));
        }

        Ok(endpoint)
    }
}

// ============================================================================
// Tests
// ============================================================================
