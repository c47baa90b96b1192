//! The algebraic solver capability.
//!
//! Reconciliation evaluates the characteristic polynomial of each side's set
//! at shared points; the ratio of the two evaluations is a rational function
//! whose numerator and denominator roots are exactly the symmetric
//! difference. Interpolating and factoring that function is the solver's job
//! and lives outside this workspace, behind [`Solver`].

use crate::error::SolveError;
use crate::zp::Zp;
use crate::zset::ZSet;

/// The split of a symmetric difference recovered by a solver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolvedDiff {
    /// Roots of the numerator: elements only the remote side holds.
    pub remote_only: ZSet,
    /// Roots of the denominator: elements only the local side holds.
    pub local_only: ZSet,
}

/// Recovers a set difference from sample ratios.
///
/// `ratios[i]` is `remote_sample[i] / local_sample[i]`, evaluated at
/// `points[i]`. `size_diff` is `remote_size - local_size`.
///
/// Implementations must be pure: the same inputs always give the same
/// answer, and a solver may be shared by concurrently running sessions.
pub trait Solver: Send + Sync {
    fn solve(&self, ratios: &[Zp], points: &[Zp], size_diff: i64)
        -> Result<SolvedDiff, SolveError>;
}

impl<S: Solver + ?Sized> Solver for &S {
    fn solve(
        &self,
        ratios: &[Zp],
        points: &[Zp],
        size_diff: i64,
    ) -> Result<SolvedDiff, SolveError> {
        (**self).solve(ratios, points, size_diff)
    }
}

impl<S: Solver + ?Sized> Solver for std::sync::Arc<S> {
    fn solve(
        &self,
        ratios: &[Zp],
        points: &[Zp],
        size_diff: i64,
    ) -> Result<SolvedDiff, SolveError> {
        (**self).solve(ratios, points, size_diff)
    }
}

/// Divide remote samples by local samples pointwise.
///
/// Returns `None` if the vectors differ in length, and
/// `Some(Err(index))` if a local sample is zero.
pub fn sample_ratios(remote: &[Zp], local: &[Zp]) -> Option<Result<Vec<Zp>, usize>> {
    if remote.len() != local.len() {
        return None;
    }
    Some(
        remote
            .iter()
            .zip(local)
            .enumerate()
            .map(|(i, (r, l))| r.checked_div(*l).ok_or(i))
            .collect(),
    )
}
