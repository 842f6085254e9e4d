//! Single-rank group

use crate::communicator::Communicator;
use crate::error::CommError;

/// The trivial group: rank 0 of 1
///
/// Every collective completes immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfComm;

impl SelfComm {
    /// Create the single-rank communicator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) -> Result<(), CommError> {
        Ok(())
    }

    fn exchange(&self, outgoing: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, CommError> {
        if outgoing.len() != 1 {
            return Err(CommError::MalformedPayload {
                expected: 1,
                actual: outgoing.len(),
            });
        }
        Ok(outgoing)
    }
}
