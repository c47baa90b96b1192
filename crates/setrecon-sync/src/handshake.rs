//! Configuration handshake run before every session.
//!
//! ```text
//! Peer A                         Peer B
//!   |-------- Config ------------->|
//!   |<------- Config --------------|
//!   |-------- Ack(Passed|Failed) ->|
//!   |<------- Ack(Passed|Failed) --|
//! ```
//!
//! Both sides check the same fields, so an incompatible pair fails on both
//! ends with a reason.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::codec::{read_msg_timeout, write_msg};
use crate::error::{ReconError, Result};
use crate::messages::{limits, ConfigAck, HandshakeMsg, PeerConfig};

/// Which half of the exchange a peer plays once the handshake passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Walks its prefix tree and issues requests.
    Requester,
    /// Answers requests; this is the side driven by [`crate::ReconSession`].
    Responder,
}

impl Role {
    /// The peer that dialed the connection answers; the listener asks.
    pub fn for_connection(dialed: bool) -> Self {
        if dialed {
            Role::Responder
        } else {
            Role::Requester
        }
    }
}

/// Exchange configurations with the peer and agree on compatibility.
///
/// Returns the remote configuration once both sides have passed it.
pub async fn exchange_config<C>(
    conn: &mut C,
    local: &PeerConfig,
    timeout: Duration,
    max_frame_size: usize,
) -> Result<PeerConfig>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    write_msg(conn, &HandshakeMsg::Config(local.clone()), max_frame_size).await?;
    conn.flush().await?;

    let remote = match read_handshake(conn, timeout, max_frame_size).await? {
        HandshakeMsg::Config(config) => config,
        HandshakeMsg::Ack(_) => {
            return Err(ReconError::UnexpectedMessage(
                "expected Config, got Ack".into(),
            ))
        }
    };

    if let Some(reason) = local.incompatibility(&remote) {
        tracing::warn!("rejecting peer config (version {}): {}", remote.version, reason);
        let ack = HandshakeMsg::Ack(ConfigAck::Failed {
            reason: truncate(reason.clone()),
        });
        if write_msg(conn, &ack, max_frame_size).await.is_ok() {
            let _ = conn.flush().await;
        }
        return Err(ReconError::Incompatible(reason));
    }

    write_msg(conn, &HandshakeMsg::Ack(ConfigAck::Passed), max_frame_size).await?;
    conn.flush().await?;

    match read_handshake(conn, timeout, max_frame_size).await? {
        HandshakeMsg::Ack(ConfigAck::Passed) => {
            tracing::debug!("handshake passed with peer version {}", remote.version);
            Ok(remote)
        }
        HandshakeMsg::Ack(ConfigAck::Failed { reason }) => Err(ReconError::Incompatible(
            format!("rejected by peer: {}", reason),
        )),
        HandshakeMsg::Config(_) => Err(ReconError::UnexpectedMessage(
            "expected Ack, got Config".into(),
        )),
    }
}

async fn read_handshake<C>(conn: &mut C, timeout: Duration, max_frame_size: usize) -> Result<HandshakeMsg>
where
    C: AsyncRead + Unpin,
{
    let msg: HandshakeMsg = read_msg_timeout(conn, max_frame_size, timeout).await?;
    msg.validate_limits()
        .map_err(|e| ReconError::InvalidMessage(e.into()))?;
    Ok(msg)
}

fn truncate(mut reason: String) -> String {
    if reason.len() > limits::MAX_ERROR_TEXT {
        let mut end = limits::MAX_ERROR_TEXT;
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        reason.truncate(end);
    }
    reason
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{limits::DEFAULT_MAX_FRAME_SIZE, PROTOCOL_VERSION};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn config(mbar: u32) -> PeerConfig {
        PeerConfig {
            version: "0.1.0".into(),
            protocol_version: PROTOCOL_VERSION,
            bit_quantum: 2,
            mbar,
            filters: vec!["dedup".into()],
        }
    }

    #[tokio::test]
    async fn test_compatible_peers_learn_each_other() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let mut remote_cfg = config(5);
        remote_cfg.version = "0.2.0".into();

        let remote = {
            let remote_cfg = remote_cfg.clone();
            tokio::spawn(async move {
                exchange_config(&mut b, &remote_cfg, TIMEOUT, DEFAULT_MAX_FRAME_SIZE).await
            })
        };
        let seen = exchange_config(&mut a, &config(5), TIMEOUT, DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap();

        assert_eq!(seen, remote_cfg);
        assert_eq!(remote.await.unwrap().unwrap(), config(5));
    }

    #[tokio::test]
    async fn test_incompatible_fails_both_sides() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        let remote = tokio::spawn(async move {
            exchange_config(&mut b, &config(7), TIMEOUT, DEFAULT_MAX_FRAME_SIZE).await
        });
        let err = exchange_config(&mut a, &config(5), TIMEOUT, DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap_err();

        assert!(matches!(err, ReconError::Incompatible(ref r) if r.contains("mbar")));
        assert!(matches!(
            remote.await.unwrap().unwrap_err(),
            ReconError::Incompatible(_)
        ));
    }

    #[tokio::test]
    async fn test_ack_before_config_rejected() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        write_msg(
            &mut b,
            &HandshakeMsg::Ack(ConfigAck::Passed),
            DEFAULT_MAX_FRAME_SIZE,
        )
        .await
        .unwrap();

        let err = exchange_config(&mut a, &config(5), TIMEOUT, DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::UnexpectedMessage(_)));
    }

    #[test]
    fn test_dialer_is_responder() {
        assert_eq!(Role::for_connection(true), Role::Responder);
        assert_eq!(Role::for_connection(false), Role::Requester);
    }
}
