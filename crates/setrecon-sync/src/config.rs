//! Configuration for reconciliation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use setrecon_ptree::TreeConfig;

use crate::error::{ReconError, Result};
use crate::messages::{limits, PeerConfig, PROTOCOL_VERSION};

/// Configuration for reconciliation behavior.
///
/// Loadable from TOML; every field has a default, so a file only needs the
/// settings it changes:
///
/// ```toml
/// mbar = 5
/// partners = ["10.0.0.2:11370"]
/// session_limit = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    /// Software version advertised in the handshake.
    pub version: String,
    /// Wire protocol version.
    pub protocol_version: u8,
    /// Prefix bits per tree level.
    pub bit_quantum: u32,
    /// Interpolation degree bound.
    pub mbar: u32,
    /// Multiplier on `mbar` below which a node is small enough to send in full.
    pub thresh_mult: u32,
    /// Dataset filters; peers must agree on them.
    pub filters: Vec<String>,
    /// Deadline for each read from the peer, in milliseconds.
    pub read_timeout_ms: u64,
    /// Deadline for establishing a connection, in seconds.
    pub dial_timeout_secs: u64,
    /// Base delay between gossip rounds, in seconds.
    pub gossip_interval_secs: u64,
    /// Random extra delay added to each gossip interval, in seconds.
    pub gossip_jitter_secs: u64,
    /// Addresses of reconciliation partners.
    pub partners: Vec<String>,
    /// Max encoded frame size in bytes.
    pub max_frame_size: usize,
    /// Stop a session after this many newly needed elements.
    pub session_limit: Option<usize>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION,
            bit_quantum: 2,
            mbar: 5,
            thresh_mult: 10,
            filters: Vec::new(),
            read_timeout_ms: 30_000,
            dial_timeout_secs: 1,
            gossip_interval_secs: 60,
            gossip_jitter_secs: 10,
            partners: Vec::new(),
            max_frame_size: limits::DEFAULT_MAX_FRAME_SIZE,
            session_limit: None,
        }
    }
}

impl ReconConfig {
    /// Parse from TOML text and validate.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ReconError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.mbar == 0 {
            return Err(ReconError::Config("mbar must be positive".into()));
        }
        if self.thresh_mult == 0 {
            return Err(ReconError::Config("thresh_mult must be positive".into()));
        }
        if self.read_timeout_ms == 0 {
            return Err(ReconError::Config("read_timeout_ms must be positive".into()));
        }
        if self.session_limit == Some(0) {
            return Err(ReconError::Config("session_limit must be positive".into()));
        }
        if self.filters.len() > limits::MAX_FILTERS {
            return Err(ReconError::Config(format!(
                "at most {} filters allowed",
                limits::MAX_FILTERS
            )));
        }
        self.tree_config().validate()?;
        Ok(())
    }

    /// Nodes below this size are sent in full when algebraic reconciliation fails.
    pub fn small_node_threshold(&self) -> usize {
        self.thresh_mult as usize * self.mbar as usize
    }

    /// Sample values per tree node.
    pub fn num_samples(&self) -> usize {
        self.mbar as usize + 1
    }

    pub fn split_threshold(&self) -> usize {
        self.small_node_threshold()
    }

    pub fn join_threshold(&self) -> usize {
        self.split_threshold() / 2
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn gossip_interval(&self) -> Duration {
        Duration::from_secs(self.gossip_interval_secs)
    }

    /// Tree shape matching this configuration.
    pub fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            bit_quantum: self.bit_quantum,
            num_samples: self.num_samples(),
            split_threshold: self.split_threshold(),
            join_threshold: self.join_threshold(),
        }
    }

    /// What this peer advertises in the handshake.
    pub fn peer_config(&self) -> PeerConfig {
        PeerConfig {
            version: self.version.clone(),
            protocol_version: self.protocol_version,
            bit_quantum: self.bit_quantum,
            mbar: self.mbar,
            filters: self.filters.clone(),
        }
    }

    /// Sets the interpolation degree bound.
    pub fn with_mbar(mut self, mbar: u32) -> Self {
        self.mbar = mbar;
        self
    }

    /// Sets the small-node threshold multiplier.
    pub fn with_thresh_mult(mut self, thresh_mult: u32) -> Self {
        self.thresh_mult = thresh_mult;
        self
    }

    /// Sets the per-read timeout, at millisecond resolution.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the partner list.
    pub fn with_partners(mut self, partners: Vec<String>) -> Self {
        self.partners = partners;
        self
    }

    /// Sets the per-session element limit.
    pub fn with_session_limit(mut self, limit: Option<usize>) -> Self {
        self.session_limit = limit;
        self
    }

    /// Sets the gossip interval and jitter.
    pub fn with_gossip_interval(mut self, interval: Duration, jitter: Duration) -> Self {
        self.gossip_interval_secs = interval.as_secs();
        self.gossip_jitter_secs = jitter.as_secs();
        self
    }

    /// Sets the dataset filters.
    pub fn with_filters(mut self, filters: Vec<String>) -> Self {
        self.filters = filters;
        self
    }
}
