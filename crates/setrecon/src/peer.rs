//! The Peer: reconciliation sessions, gossip scheduling and delivery of
//! recovered elements.
//!
//! A `Peer` dials partners and plays the responder side of each session
//! against a shared prefix tree. Elements learned from a gossip round are
//! handed to the owning application as a [`Recover`] on a channel; the
//! application decides how to fetch and insert them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use setrecon_core::{Solver, ZSet};
use setrecon_ptree::PrefixTree;
use setrecon_sync::{
    Connector, Coordinator, PeerConfig, ReconConfig, ReconSession, Role, SessionOutcome,
};

use crate::error::{PeerError, Result};

/// Recovered elements waiting in the channel before gossip blocks.
const RECOVER_CHANNEL_CAPACITY: usize = 64;

/// Elements a gossip round found missing locally.
#[derive(Debug, Clone)]
pub struct Recover {
    /// Address of the partner that holds them.
    pub remote_addr: String,
    /// What the partner advertised in the handshake.
    pub remote_config: PeerConfig,
    /// The missing elements, each in its 16-byte big-endian encoding.
    pub elements: Vec<Bytes>,
}

/// A reconciliation peer.
///
/// Provides:
/// - One-shot reconciliation with a given partner
/// - Periodic gossip with randomly chosen partners
/// - Delivery of recovered elements to the application
pub struct Peer<T: PrefixTree, S: Solver, C: Connector> {
    /// Configuration.
    config: ReconConfig,
    /// The prefix tree, shared with the application that mutates it.
    tree: Arc<T>,
    /// The algebraic solver.
    solver: S,
    /// Dials partners.
    connector: C,
    /// Gossip rounds are skipped while false.
    enabled: AtomicBool,
    /// Where recovered elements go.
    recover_tx: mpsc::Sender<Recover>,
}

impl<T, S, C> Peer<T, S, C>
where
    T: PrefixTree,
    S: Solver,
    C: Connector,
{
    /// Create a peer and the receiving end of its recover channel.
    pub fn new(
        config: ReconConfig,
        tree: Arc<T>,
        solver: S,
        connector: C,
    ) -> Result<(Self, mpsc::Receiver<Recover>)> {
        config.validate()?;
        if tree.points().len() != config.num_samples() {
            return Err(PeerError::InvalidConfig(format!(
                "tree keeps {} samples per node, configuration expects {}",
                tree.points().len(),
                config.num_samples()
            )));
        }

        let (recover_tx, recover_rx) = mpsc::channel(RECOVER_CHANNEL_CAPACITY);
        let peer = Self {
            config,
            tree,
            solver,
            connector,
            enabled: AtomicBool::new(true),
            recover_tx,
        };
        Ok((peer, recover_rx))
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    pub fn tree(&self) -> &Arc<T> {
        &self.tree
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Pick a partner at random.
    pub fn choose_partner(&self) -> Result<String> {
        self.config
            .partners
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(PeerError::NoPartners)
    }

    /// Reconcile with `addr` once and return what the local peer is missing.
    ///
    /// With a `limit` the session stops after that many elements and the
    /// returned flag is `false`; call again to continue. The limit must be
    /// positive.
    pub async fn reconcile_with(&self, addr: &str, limit: Option<usize>) -> Result<(Vec<Bytes>, bool)> {
        if limit == Some(0) {
            return Err(PeerError::InvalidConfig("session limit must be positive".into()));
        }
        let outcome = self.run_session(addr, limit).await?;
        Ok((encode_elements(&outcome.needed), outcome.complete))
    }

    /// Run one gossip round against `addr`, delivering any missing elements
    /// as a [`Recover`]. Returns how many were delivered.
    pub async fn initiate_recon(&self, addr: &str) -> Result<usize> {
        if !self.is_enabled() {
            return Err(PeerError::Disabled);
        }

        tracing::info!("initiating recon with {}", addr);
        let outcome = self.run_session(addr, self.config.session_limit).await?;
        let count = outcome.needed.len();
        if count == 0 {
            tracing::debug!("nothing to recover from {}", addr);
            return Ok(0);
        }

        tracing::info!("recovering {} elements from {}", count, addr);
        let recover = Recover {
            remote_addr: addr.to_string(),
            remote_config: outcome.remote_config,
            elements: encode_elements(&outcome.needed),
        };
        self.recover_tx
            .send(recover)
            .await
            .map_err(|_| PeerError::RecoverChannelClosed)?;
        Ok(count)
    }

    /// Run one gossip round against a random partner.
    pub async fn gossip_round(&self) -> Result<usize> {
        if !self.is_enabled() {
            return Err(PeerError::Disabled);
        }
        let partner = self.choose_partner()?;
        self.initiate_recon(&partner).await
    }

    async fn run_session(&self, addr: &str, limit: Option<usize>) -> Result<SessionOutcome> {
        let conn = self.connector.connect(addr).await?;
        let coordinator = Coordinator::new(
            self.tree.as_ref(),
            &self.solver,
            self.config.small_node_threshold(),
        );
        let session = ReconSession::new(conn, coordinator, &self.config, Role::for_connection(true))?
            .with_limit(limit)?;
        Ok(session.run().await?)
    }

    fn next_gossip_delay(&self) -> Duration {
        let jitter = self.config.gossip_jitter_secs;
        let extra = if jitter == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter * 1000)
        };
        self.config.gossip_interval() + Duration::from_millis(extra)
    }
}

impl<T, S, C> Peer<T, S, C>
where
    T: PrefixTree + 'static,
    S: Solver + 'static,
    C: Connector + 'static,
{
    // ─────────────────────────────────────────────────────────────────────────
    // Gossip
    // ─────────────────────────────────────────────────────────────────────────

    /// Start gossiping in the background.
    ///
    /// The first round runs immediately, later rounds after the configured
    /// interval plus jitter. A failed round is logged and never stops the
    /// loop.
    pub fn spawn_gossip(self: Arc<Self>) -> GossipHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut delay = Duration::ZERO;
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                tokio::select! {
                    _ = stop_rx.changed() => break,
                    result = self.gossip_round() => match result {
                        Ok(_) => {}
                        Err(PeerError::Disabled) => tracing::debug!("peer disabled, skipping gossip"),
                        Err(PeerError::NoPartners) => tracing::debug!("no partners, skipping gossip"),
                        Err(PeerError::RecoverChannelClosed) => {
                            tracing::info!("recover channel closed, stopping gossip");
                            break;
                        }
                        Err(e) => tracing::warn!("gossip round failed ({:?}): {}", e.failure_kind(), e),
                    },
                }

                delay = self.next_gossip_delay();
            }
            tracing::info!("gossip stopped");
        });

        GossipHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Controls a running gossip loop.
pub struct GossipHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl GossipHandle {
    /// Stop gossiping and wait for the loop to exit. A session in progress
    /// is abandoned.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("gossip task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

fn encode_elements(set: &ZSet) -> Vec<Bytes> {
    set.iter()
        .map(|z| Bytes::copy_from_slice(&z.to_element_bytes()))
        .collect()
}
