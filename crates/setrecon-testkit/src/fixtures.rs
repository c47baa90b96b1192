//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use setrecon_core::{Bitstring, SolveError, SolvedDiff, Solver, ZSet, Zp};
use setrecon_ptree::{PrefixNode, PrefixTree, TreeError};
use setrecon_sync::{
    exchange_config, limits, read_msg_timeout, write_msg, PeerConfig, ReconConfig, ReconError,
    ReconMsg,
};

/// Generate `n` random elements the way an application would: by hashing
/// random keys.
pub fn random_elements(n: usize) -> Vec<Zp> {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| {
            let mut key = [0u8; 32];
            rng.fill_bytes(&mut key);
            Zp::hash_key(&key)
        })
        .collect()
}

/// A solver that replays queued answers.
///
/// Once the queue runs dry every call reports insufficient degree, which is
/// what a real solver does when the difference outgrows `mbar`.
#[derive(Default)]
pub struct ScriptedSolver {
    answers: Mutex<VecDeque<Result<SolvedDiff, SolveError>>>,
    calls: Mutex<Vec<(Vec<Zp>, i64)>>,
}

impl ScriptedSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next answer.
    pub fn then(self, answer: Result<SolvedDiff, SolveError>) -> Self {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push_back(answer);
        }
        self
    }

    /// Queue a successful split.
    pub fn then_solve(self, remote_only: ZSet, local_only: ZSet) -> Self {
        self.then(Ok(SolvedDiff {
            remote_only,
            local_only,
        }))
    }

    /// `(ratios, size_diff)` of every call so far.
    pub fn calls(&self) -> Vec<(Vec<Zp>, i64)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Solver for ScriptedSolver {
    fn solve(&self, ratios: &[Zp], _points: &[Zp], size_diff: i64) -> Result<SolvedDiff, SolveError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((ratios.to_vec(), size_diff));
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .unwrap_or(Err(SolveError::InsufficientDegree))
    }
}

/// A solver that knows both sets up front and answers with their true
/// split.
///
/// The ratios it is handed are checked against the characteristic
/// polynomials of the two sets, so a caller that divides the wrong way round
/// or samples the wrong node gets an error instead of a lucky answer.
#[derive(Debug, Clone)]
pub struct OracleSolver {
    local: ZSet,
    remote: ZSet,
    max_degree: usize,
}

impl OracleSolver {
    pub fn new(local: ZSet, remote: ZSet) -> Self {
        Self {
            local,
            remote,
            max_degree: usize::MAX,
        }
    }

    /// Report insufficient degree when the symmetric difference is larger
    /// than `max_degree`.
    pub fn with_max_degree(mut self, max_degree: usize) -> Self {
        self.max_degree = max_degree;
        self
    }
}

impl Solver for OracleSolver {
    fn solve(&self, ratios: &[Zp], points: &[Zp], size_diff: i64) -> Result<SolvedDiff, SolveError> {
        let expected_diff = self.remote.len() as i64 - self.local.len() as i64;
        if size_diff != expected_diff {
            return Err(SolveError::Failed(format!(
                "size difference {} but sets differ by {}",
                size_diff, expected_diff
            )));
        }
        if ratios.len() != points.len() {
            return Err(SolveError::Failed(format!(
                "{} ratios for {} points",
                ratios.len(),
                points.len()
            )));
        }
        for (ratio, point) in ratios.iter().zip(points) {
            if *ratio * characteristic(&self.local, *point) != characteristic(&self.remote, *point) {
                return Err(SolveError::Failed(format!("ratio mismatch at point {}", point)));
            }
        }

        let remote_only = ZSet::diff(&self.remote, &self.local);
        let local_only = ZSet::diff(&self.local, &self.remote);
        if remote_only.len() + local_only.len() > self.max_degree {
            return Err(SolveError::InsufficientDegree);
        }
        Ok(SolvedDiff {
            remote_only,
            local_only,
        })
    }
}

fn characteristic(set: &ZSet, point: Zp) -> Zp {
    set.iter().fold(Zp::ONE, |acc, z| acc * (point - *z))
}

/// A node of a [`StaticTree`].
#[derive(Debug, Clone)]
pub struct StaticNode {
    key: Bitstring,
    svalues: Vec<Zp>,
    size: usize,
    leaf: bool,
    elements: Vec<Zp>,
}

impl PrefixNode for StaticNode {
    fn key(&self) -> &Bitstring {
        &self.key
    }

    fn svalues(&self) -> &[Zp] {
        &self.svalues
    }

    fn size(&self) -> usize {
        self.size
    }

    fn is_leaf(&self) -> bool {
        self.leaf
    }

    fn children_keys(&self) -> Vec<Bitstring> {
        Vec::new()
    }

    fn elements(&self) -> Result<Vec<Zp>, TreeError> {
        Ok(self.elements.clone())
    }
}

/// A prefix tree assembled node by node.
///
/// Lets a test place exactly the node it needs at exactly the prefix it
/// needs, without going through splits.
#[derive(Debug, Clone)]
pub struct StaticTree {
    points: Vec<Zp>,
    nodes: HashMap<Bitstring, StaticNode>,
}

impl StaticTree {
    /// An empty tree with `num_samples` sample values per node.
    pub fn new(num_samples: usize) -> Self {
        Self {
            points: Zp::points(num_samples),
            nodes: HashMap::new(),
        }
    }

    /// Add a node holding `elements`.
    pub fn with_node(self, key: Bitstring, leaf: bool, elements: Vec<Zp>) -> Self {
        let size = elements.len();
        self.with_sized_node(key, leaf, size, elements)
    }

    /// Add a node reporting `size` elements but enumerating only `elements`.
    ///
    /// Stands in for an internal node whose elements live in its children.
    pub fn with_sized_node(mut self, key: Bitstring, leaf: bool, size: usize, elements: Vec<Zp>) -> Self {
        let set: ZSet = elements.iter().copied().collect();
        let svalues = self.points.iter().map(|p| characteristic(&set, *p)).collect();
        self.nodes.insert(
            key.clone(),
            StaticNode {
                key,
                svalues,
                size,
                leaf,
                elements,
            },
        );
        self
    }
}

impl PrefixTree for StaticTree {
    type Node = StaticNode;

    fn points(&self) -> &[Zp] {
        &self.points
    }

    fn node(&self, prefix: &Bitstring) -> Result<Option<StaticNode>, TreeError> {
        Ok(self.nodes.get(prefix).cloned())
    }
}

/// Plays the requester end of a session from a script.
pub struct ScriptedRemote<C> {
    conn: C,
    timeout: Duration,
    max_frame_size: usize,
}

impl<C: AsyncRead + AsyncWrite + Unpin> ScriptedRemote<C> {
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            timeout: Duration::from_secs(10),
            max_frame_size: limits::DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Set the per-read deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the configuration handshake advertising `config`.
    pub async fn handshake(&mut self, config: &ReconConfig) -> Result<PeerConfig, ReconError> {
        exchange_config(
            &mut self.conn,
            &config.peer_config(),
            self.timeout,
            self.max_frame_size,
        )
        .await
    }

    /// Write messages and flush them.
    pub async fn send(&mut self, msgs: &[ReconMsg]) -> Result<(), ReconError> {
        for msg in msgs {
            write_msg(&mut self.conn, msg, self.max_frame_size).await?;
        }
        self.conn.flush().await?;
        Ok(())
    }

    /// Read one message.
    pub async fn recv(&mut self) -> Result<ReconMsg, ReconError> {
        read_msg_timeout(&mut self.conn, self.max_frame_size, self.timeout).await
    }

    /// Read messages until the other end closes the connection.
    pub async fn finish(mut self) -> Result<Vec<ReconMsg>, ReconError> {
        let mut msgs = Vec::new();
        loop {
            match self.recv().await {
                Ok(msg) => msgs.push(msg),
                Err(ReconError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(msgs)
                }
                Err(e) => return Err(e),
            }
        }
    }
}
