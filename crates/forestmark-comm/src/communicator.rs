//! The collective communication trait
//!
//! Implementors provide rank/size, a barrier and a personalised all-to-all
//! exchange. Gathers, reductions, scans and votes are derived from those two
//! primitives so every implementation shares the same protocol.

use crate::error::CommError;
use std::fmt;

/// Reduction operation applied across ranks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Sum of all contributions
    Sum,
    /// Maximum contribution
    Max,
    /// Minimum contribution
    Min,
}

impl ReduceOp {
    /// Combine two integer contributions
    #[inline]
    #[must_use]
    pub fn apply_u64(self, lhs: u64, rhs: u64) -> u64 {
        match self {
            Self::Sum => lhs.saturating_add(rhs),
            Self::Max => lhs.max(rhs),
            Self::Min => lhs.min(rhs),
        }
    }

    /// Combine two floating point contributions
    #[inline]
    #[must_use]
    pub fn apply_f64(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Sum => lhs + rhs,
            Self::Max => lhs.max(rhs),
            Self::Min => lhs.min(rhs),
        }
    }
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sum => write!(f, "sum"),
            Self::Max => write!(f, "max"),
            Self::Min => write!(f, "min"),
        }
    }
}

/// A group of ranks executing the same program
///
/// Every collective must be called by every rank of the group, in the same
/// order, with the same `root` argument. A rank that skips a collective
/// leaves its peers blocked until it leaves the group, at which point they
/// fail with [`CommError::PeerDeparted`].
pub trait Communicator {
    /// This rank's index in `0..size()`
    fn rank(&self) -> usize;

    /// Number of ranks in the group
    fn size(&self) -> usize;

    /// Block until every rank has reached the barrier
    fn barrier(&self) -> Result<(), CommError>;

    /// Personalised all-to-all exchange
    ///
    /// `outgoing[dst]` is delivered to rank `dst`; the result holds one
    /// payload per source rank, indexed by source. `outgoing` must contain
    /// exactly `size()` payloads.
    fn exchange(&self, outgoing: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, CommError>;

    /// Gather one payload per rank on `root`
    ///
    /// Returns `Some` on the root (indexed by source rank) and `None` elsewhere.
    fn gather_bytes(&self, payload: Vec<u8>, root: usize) -> Result<Option<Vec<Vec<u8>>>, CommError> {
        check_root(root, self.size())?;
        let mut outgoing = vec![Vec::new(); self.size()];
        outgoing[root] = payload;
        let incoming = self.exchange(outgoing)?;
        Ok((self.rank() == root).then_some(incoming))
    }

    /// Deliver every rank's payload to every rank
    fn all_gather_bytes(&self, payload: Vec<u8>) -> Result<Vec<Vec<u8>>, CommError> {
        let outgoing = vec![payload; self.size()];
        self.exchange(outgoing)
    }

    /// Gather one integer per rank on every rank
    fn all_gather_u64(&self, value: u64) -> Result<Vec<u64>, CommError> {
        self.all_gather_bytes(value.to_le_bytes().to_vec())?
            .iter()
            .map(|bytes| decode_u64(bytes))
            .collect()
    }

    /// Sum of the values contributed by all lower ranks
    fn exclusive_scan_u64(&self, value: u64) -> Result<u64, CommError> {
        let all = self.all_gather_u64(value)?;
        Ok(all[..self.rank()].iter().fold(0, |acc, v| acc.saturating_add(*v)))
    }

    /// Reduce integers onto `root`
    fn reduce_u64(&self, value: u64, op: ReduceOp, root: usize) -> Result<Option<u64>, CommError> {
        let Some(parts) = self.gather_bytes(value.to_le_bytes().to_vec(), root)? else {
            return Ok(None);
        };
        fold_parts(&parts, op, decode_u64, ReduceOp::apply_u64).map(Some)
    }

    /// Reduce floating point values onto `root`
    fn reduce_f64(&self, value: f64, op: ReduceOp, root: usize) -> Result<Option<f64>, CommError> {
        let Some(parts) = self.gather_bytes(value.to_le_bytes().to_vec(), root)? else {
            return Ok(None);
        };
        fold_parts(&parts, op, decode_f64, ReduceOp::apply_f64).map(Some)
    }

    /// Reduce integers and share the result with every rank
    fn all_reduce_u64(&self, value: u64, op: ReduceOp) -> Result<u64, CommError> {
        let parts = self.all_gather_bytes(value.to_le_bytes().to_vec())?;
        fold_parts(&parts, op, decode_u64, ReduceOp::apply_u64)
    }

    /// Reduce floating point values and share the result with every rank
    fn all_reduce_f64(&self, value: f64, op: ReduceOp) -> Result<f64, CommError> {
        let parts = self.all_gather_bytes(value.to_le_bytes().to_vec())?;
        fold_parts(&parts, op, decode_f64, ReduceOp::apply_f64)
    }

    /// Proceed/abort handshake
    ///
    /// Returns `true` only if every rank voted to proceed, so a local failure
    /// on one rank is seen by all ranks before anyone enters the next
    /// blocking phase.
    fn vote(&self, proceed: bool) -> Result<bool, CommError> {
        let ballots = self.all_gather_bytes(vec![u8::from(proceed)])?;
        Ok(ballots.iter().all(|ballot| ballot.first() == Some(&1)))
    }
}

fn check_root(root: usize, size: usize) -> Result<(), CommError> {
    if root < size {
        Ok(())
    } else {
        Err(CommError::InvalidRoot { root, size })
    }
}

fn fold_parts<T: Copy>(
    parts: &[Vec<u8>],
    op: ReduceOp,
    decode: fn(&[u8]) -> Result<T, CommError>,
    combine: fn(ReduceOp, T, T) -> T,
) -> Result<T, CommError> {
    let mut values = parts.iter().map(|part| decode(part));
    let first = values.next().ok_or(CommError::EmptyGroup)??;
    values.try_fold(first, |acc, value| Ok(combine(op, acc, value?)))
}

fn decode_u64(bytes: &[u8]) -> Result<u64, CommError> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| CommError::MalformedPayload {
        expected: 8,
        actual: bytes.len(),
    })?;
    Ok(u64::from_le_bytes(raw))
}

fn decode_f64(bytes: &[u8]) -> Result<f64, CommError> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| CommError::MalformedPayload {
        expected: 8,
        actual: bytes.len(),
    })?;
    Ok(f64::from_le_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_op_u64() {
        assert_eq!(ReduceOp::Sum.apply_u64(3, 4), 7);
        assert_eq!(ReduceOp::Max.apply_u64(3, 4), 4);
        assert_eq!(ReduceOp::Min.apply_u64(3, 4), 3);
        assert_eq!(ReduceOp::Sum.apply_u64(u64::MAX, 1), u64::MAX);
    }

    #[test]
    fn reduce_op_f64() {
        assert_eq!(ReduceOp::Max.apply_f64(0.25, 0.5), 0.5);
        assert_eq!(ReduceOp::Min.apply_f64(0.25, 0.5), 0.25);
        assert_eq!(ReduceOp::Max.apply_f64(f64::NAN, 0.5), 0.5);
    }

    #[test]
    fn decode_rejects_short_payload() {
        assert!(matches!(
            decode_u64(&[1, 2, 3]),
            Err(CommError::MalformedPayload { expected: 8, actual: 3 })
        ));
    }

    #[test]
    fn check_root_bounds() {
        assert!(check_root(0, 1).is_ok());
        assert!(matches!(
            check_root(2, 2),
            Err(CommError::InvalidRoot { root: 2, size: 2 })
        ));
    }
}
