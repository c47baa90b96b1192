//! Session driver: one connection, one reconciliation, responder side.
//!
//! The driver owns the connection for its whole life. It performs the
//! configuration handshake, then reads requests one at a time, hands each
//! to the [`Coordinator`], queues the replies and writes them out when the
//! requester sends `Flush`.
//!
//! ```text
//! Handshaking -> Exchanging -> Draining (Done) -> Closed
//!                     |
//!                     +-> Failed
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};

use setrecon_core::{Solver, ZSet};
use setrecon_ptree::PrefixTree;

use crate::codec::{read_msg_timeout, write_msg};
use crate::config::ReconConfig;
use crate::coordinator::Coordinator;
use crate::error::{ReconError, Result};
use crate::handshake::{exchange_config, Role};
use crate::messages::{PeerConfig, ReconMsg};

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Exchanging,
    /// The requester sent `Done`.
    Draining,
    Closed,
    Failed,
}

/// What a finished session produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Elements the local peer is missing.
    pub needed: ZSet,
    /// `true` if the requester finished with `Done`, `false` if the element
    /// limit cut the session short.
    pub complete: bool,
    /// Messages read after the handshake.
    pub messages_processed: usize,
    /// Configuration the remote advertised.
    pub remote_config: PeerConfig,
}

/// A responder-side reconciliation session over one connection.
pub struct ReconSession<C, T: PrefixTree, S: Solver> {
    conn: BufWriter<C>,
    coordinator: Coordinator<T, S>,
    local: PeerConfig,
    read_timeout: Duration,
    max_frame_size: usize,
    limit: Option<usize>,
    state: SessionState,
    needed: ZSet,
    pending: Vec<ReconMsg>,
    messages_processed: usize,
}

impl<C, T, S> ReconSession<C, T, S>
where
    C: AsyncRead + AsyncWrite + Unpin + Send,
    T: PrefixTree,
    S: Solver,
{
    /// Create a session for a connection whose role is already known.
    ///
    /// Only the responder half is driven here; a requester walks its own
    /// tree and is not a `ReconSession`.
    pub fn new(
        conn: C,
        coordinator: Coordinator<T, S>,
        config: &ReconConfig,
        role: Role,
    ) -> Result<Self> {
        if role != Role::Responder {
            return Err(ReconError::Config(format!(
                "session driver cannot play {:?}",
                role
            )));
        }
        check_limit(config.session_limit)?;
        Ok(Self {
            conn: BufWriter::new(conn),
            coordinator,
            local: config.peer_config(),
            read_timeout: config.read_timeout(),
            max_frame_size: config.max_frame_size,
            limit: config.session_limit,
            state: SessionState::Handshaking,
            needed: ZSet::new(),
            pending: Vec::new(),
            messages_processed: 0,
        })
    }

    /// Override the element limit from the configuration.
    ///
    /// A limit of zero is rejected: such a session could never make
    /// progress.
    pub fn with_limit(mut self, limit: Option<usize>) -> Result<Self> {
        check_limit(limit)?;
        self.limit = limit;
        Ok(self)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion. The connection is shut down on every
    /// exit path.
    pub async fn run(mut self) -> Result<SessionOutcome> {
        let result = self.drive().await;

        match &result {
            Ok(outcome) => {
                self.state = SessionState::Closed;
                tracing::info!(
                    "session closed: {} needed, complete={}, {} messages",
                    outcome.needed.len(),
                    outcome.complete,
                    outcome.messages_processed
                );
            }
            Err(e) => {
                if self.state == SessionState::Exchanging && e.should_notify_peer() {
                    self.notify_peer(e).await;
                }
                self.state = SessionState::Failed;
                tracing::warn!("session failed ({:?}): {}", e.kind(), e);
            }
        }

        if let Err(e) = self.conn.shutdown().await {
            tracing::debug!("connection shutdown: {}", e);
        }
        result
    }

    async fn drive(&mut self) -> Result<SessionOutcome> {
        let remote_config = exchange_config(
            &mut self.conn,
            &self.local,
            self.read_timeout,
            self.max_frame_size,
        )
        .await?;
        self.state = SessionState::Exchanging;

        let complete = self.exchange().await?;
        Ok(SessionOutcome {
            needed: std::mem::take(&mut self.needed),
            complete,
            messages_processed: self.messages_processed,
            remote_config,
        })
    }

    async fn exchange(&mut self) -> Result<bool> {
        loop {
            if self.limit_reached() {
                tracing::info!(
                    "element limit reached with {} needed, {} replies unsent",
                    self.needed.len(),
                    self.pending.len()
                );
                self.pending.clear();
                return Ok(false);
            }

            let msg: ReconMsg =
                read_msg_timeout(&mut self.conn, self.max_frame_size, self.read_timeout).await?;
            msg.validate_limits()
                .map_err(|e| ReconError::InvalidMessage(format!("{}: {}", msg.name(), e)))?;
            self.messages_processed += 1;
            tracing::debug!("recv {}", msg.name());

            match msg {
                ReconMsg::ReconRqstPoly { .. } | ReconMsg::ReconRqstFull { .. } => {
                    let step = self.coordinator.handle_request(&msg)?;
                    self.accumulate(step.needed);
                    self.pending.push(step.response);
                }
                ReconMsg::Flush => self.flush_pending().await?,
                ReconMsg::Done => {
                    self.state = SessionState::Draining;
                    if !self.pending.is_empty() {
                        tracing::debug!("discarding {} replies after Done", self.pending.len());
                    }
                    self.pending.clear();
                    return Ok(true);
                }
                ReconMsg::Error { text } => return Err(ReconError::PeerError(text)),
                other => {
                    return Err(ReconError::UnexpectedMessage(format!(
                        "{} sent to responder",
                        other.name()
                    )))
                }
            }
        }
    }

    /// Add newly needed elements, never growing past the limit.
    fn accumulate(&mut self, needed: ZSet) {
        let mut dropped = 0usize;
        for z in needed {
            if self.limit_reached() {
                dropped += 1;
                continue;
            }
            self.needed.insert(z);
        }
        if dropped > 0 {
            tracing::warn!("{} needed elements beyond the limit left for a later session", dropped);
        }
    }

    fn limit_reached(&self) -> bool {
        matches!(self.limit, Some(limit) if self.needed.len() >= limit)
    }

    async fn flush_pending(&mut self) -> Result<()> {
        let count = self.pending.len();
        for msg in self.pending.drain(..) {
            write_msg(&mut self.conn, &msg, self.max_frame_size).await?;
        }
        self.conn.flush().await?;
        tracing::debug!("flushed {} replies", count);
        Ok(())
    }

    async fn notify_peer(&mut self, err: &ReconError) {
        let msg = ReconMsg::error(err.to_string());
        let sent = match write_msg(&mut self.conn, &msg, self.max_frame_size).await {
            Ok(()) => self.conn.flush().await.map_err(ReconError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            tracing::warn!("could not report failure to peer: {}", e);
        }
    }
}

fn check_limit(limit: Option<usize>) -> Result<()> {
    if limit == Some(0) {
        return Err(ReconError::Config("session limit must be positive".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::read_msg;
    use crate::error::FailureKind;
    use crate::messages::limits::DEFAULT_MAX_FRAME_SIZE;
    use setrecon_core::{Bitstring, SolveError, SolvedDiff, Zp};
    use setrecon_ptree::MemPrefixTree;
    use tokio::io::DuplexStream;

    struct NoDegree;

    impl Solver for NoDegree {
        fn solve(
            &self,
            _ratios: &[Zp],
            _points: &[Zp],
            _size_diff: i64,
        ) -> std::result::Result<SolvedDiff, SolveError> {
            Err(SolveError::InsufficientDegree)
        }
    }

    fn z(v: u64) -> Zp {
        Zp::from(v)
    }

    fn set(values: &[u64]) -> ZSet {
        values.iter().map(|&v| z(v)).collect()
    }

    fn config() -> ReconConfig {
        ReconConfig::default().with_read_timeout(Duration::from_secs(5))
    }

    fn session(
        local: &[u64],
        config: &ReconConfig,
    ) -> (ReconSession<DuplexStream, MemPrefixTree, NoDegree>, DuplexStream) {
        let tree = MemPrefixTree::from_elements(config.tree_config(), local.iter().map(|&v| z(v)))
            .unwrap();
        let coordinator = Coordinator::new(tree, NoDegree, config.small_node_threshold());
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let session = ReconSession::new(ours, coordinator, config, Role::Responder).unwrap();
        (session, theirs)
    }

    async fn handshake(remote: &mut DuplexStream, config: &ReconConfig) {
        exchange_config(
            remote,
            &config.peer_config(),
            Duration::from_secs(5),
            DEFAULT_MAX_FRAME_SIZE,
        )
        .await
        .unwrap();
    }

    async fn send(remote: &mut DuplexStream, msgs: &[ReconMsg]) {
        for msg in msgs {
            write_msg(remote, msg, DEFAULT_MAX_FRAME_SIZE).await.unwrap();
        }
        remote.flush().await.unwrap();
    }

    async fn recv(remote: &mut DuplexStream) -> ReconMsg {
        read_msg(remote, DEFAULT_MAX_FRAME_SIZE).await.unwrap()
    }

    fn full(elements: ZSet) -> ReconMsg {
        ReconMsg::ReconRqstFull {
            prefix: Bitstring::new(0),
            elements,
        }
    }

    #[tokio::test]
    async fn test_done_completes_session() {
        let config = config();
        let (session, mut remote) = session(&[100, 101, 102], &config);
        let task = tokio::spawn(session.run());

        handshake(&mut remote, &config).await;
        send(&mut remote, &[full(set(&[101, 102, 103])), ReconMsg::Flush]).await;
        assert_eq!(recv(&mut remote).await, ReconMsg::Elements(set(&[100])));
        send(&mut remote, &[ReconMsg::Done]).await;

        let outcome = task.await.unwrap().unwrap();
        assert!(outcome.complete);
        assert_eq!(outcome.needed, set(&[103]));
        assert_eq!(outcome.messages_processed, 3);
        assert_eq!(outcome.remote_config, config.peer_config());
    }

    #[tokio::test]
    async fn test_flush_preserves_order_and_done_discards_pending() {
        let config = config();
        let (session, mut remote) = session(&[100, 101, 102], &config);
        let task = tokio::spawn(session.run());

        handshake(&mut remote, &config).await;
        send(
            &mut remote,
            &[
                full(set(&[100])),
                ReconMsg::ReconRqstPoly {
                    prefix: Bitstring::new(0),
                    size: 9,
                    samples: vec![Zp::ONE; config.num_samples()],
                },
                full(set(&[100, 101, 102])),
                ReconMsg::Flush,
            ],
        )
        .await;

        assert_eq!(recv(&mut remote).await, ReconMsg::Elements(set(&[101, 102])));
        assert_eq!(
            recv(&mut remote).await,
            ReconMsg::FullElements(set(&[100, 101, 102]))
        );
        assert_eq!(recv(&mut remote).await, ReconMsg::Elements(ZSet::new()));

        send(&mut remote, &[full(set(&[104])), ReconMsg::Done]).await;
        let outcome = task.await.unwrap().unwrap();
        assert!(outcome.complete);
        assert_eq!(outcome.needed, set(&[104]));

        // the reply queued before Done never goes out
        let mut rest = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut remote, &mut rest)
            .await
            .unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_limit_truncates_and_reports_incomplete() {
        let config = config().with_session_limit(Some(2));
        let (session, mut remote) = session(&[100], &config);
        let task = tokio::spawn(session.run());

        handshake(&mut remote, &config).await;
        send(&mut remote, &[full(set(&[200, 201, 202, 203, 204]))]).await;

        let outcome = task.await.unwrap().unwrap();
        assert!(!outcome.complete);
        assert_eq!(outcome.needed.len(), 2);
        assert!(outcome.needed.iter().all(|z| set(&[200, 201, 202, 203, 204]).contains(z)));
    }

    #[tokio::test]
    async fn test_remote_error_ends_session() {
        let config = config();
        let (session, mut remote) = session(&[100], &config);
        let task = tokio::spawn(session.run());

        handshake(&mut remote, &config).await;
        send(&mut remote, &[ReconMsg::error("tree walk failed")]).await;

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ReconError::PeerError(ref t) if t == "tree walk failed"));
        assert_eq!(err.kind(), FailureKind::Remote);
    }

    #[tokio::test]
    async fn test_unexpected_message_is_reported_to_peer() {
        let config = config();
        let (session, mut remote) = session(&[100], &config);
        let task = tokio::spawn(session.run());

        handshake(&mut remote, &config).await;
        send(&mut remote, &[ReconMsg::Elements(set(&[5]))]).await;

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ReconError::UnexpectedMessage(_)));
        assert!(matches!(recv(&mut remote).await, ReconMsg::Error { .. }));
    }

    #[tokio::test]
    async fn test_poly_for_missing_node_is_fatal() {
        let config = config();
        let (session, mut remote) = session(&[100], &config);
        let task = tokio::spawn(session.run());

        handshake(&mut remote, &config).await;
        let mut prefix = Bitstring::new(0);
        prefix.push(true);
        prefix.push(false);
        send(
            &mut remote,
            &[ReconMsg::ReconRqstPoly {
                prefix,
                size: 1,
                samples: vec![Zp::ONE; config.num_samples()],
            }],
        )
        .await;

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ReconError::NodeNotFound(_)));
        assert_eq!(err.kind(), FailureKind::Protocol);
        match recv(&mut remote).await {
            ReconMsg::Error { text } => assert!(text.contains("non-existent node")),
            other => panic!("expected Error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_incompatible_handshake_fails_without_exchange() {
        let config = config();
        let (session, mut remote) = session(&[100], &config);
        let task = tokio::spawn(session.run());

        let other = config.clone().with_mbar(7);
        let err = exchange_config(
            &mut remote,
            &other.peer_config(),
            Duration::from_secs(5),
            DEFAULT_MAX_FRAME_SIZE,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReconError::Incompatible(_)));

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), FailureKind::Incompatible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out() {
        let config = config();
        let (session, mut remote) = session(&[100], &config);
        let task = tokio::spawn(session.run());

        handshake(&mut remote, &config).await;

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(matches!(recv(&mut remote).await, ReconMsg::Error { .. }));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let config = config();
        let (zero_limit, _remote) = session(&[100], &config);
        assert!(matches!(zero_limit.with_limit(Some(0)), Err(ReconError::Config(_))));

        let (one_limit, _remote) = session(&[100], &config);
        assert!(one_limit.with_limit(Some(1)).is_ok());

        let mut zero = config.clone();
        zero.session_limit = Some(0);
        let tree = MemPrefixTree::new(zero.tree_config()).unwrap();
        let coordinator = Coordinator::new(tree, NoDegree, zero.small_node_threshold());
        let (ours, _theirs) = tokio::io::duplex(1024);
        let result = ReconSession::new(ours, coordinator, &zero, Role::Responder);
        assert!(matches!(result, Err(ReconError::Config(_))));
    }

    #[test]
    fn test_requester_role_rejected() {
        let config = config();
        let tree = MemPrefixTree::new(config.tree_config()).unwrap();
        let coordinator = Coordinator::new(tree, NoDegree, config.small_node_threshold());
        let (ours, _theirs) = tokio::io::duplex(1024);
        let result = ReconSession::new(ours, coordinator, &config, Role::Requester);
        assert!(matches!(result, Err(ReconError::Config(_))));
    }
}
