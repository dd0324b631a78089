//! Retry policies for repeated solving attempts. Contradictions are the
//! expected failure mode of the overlapping model; retrying with fresh
//! randomness is how callers trade time for success.

use crate::err::SolveError;
use crate::overlapping::Overlapping;
use grid_2d::Grid;
use rand::Rng;

pub trait Retry: Copy + private::Sealed {
    type Return;
    fn retry<R: Rng>(&mut self, session: &Overlapping, rng: &mut R) -> Self::Return;
}

/// Retries until an attempt succeeds. An unsatisfiable constraint set
/// loops forever; prefer `NumTimes` when in doubt.
#[derive(Debug, Clone, Copy)]
pub struct Forever;

impl Retry for Forever {
    type Return = Grid<[u8; 3]>;
    fn retry<R: Rng>(&mut self, session: &Overlapping, rng: &mut R) -> Self::Return {
        loop {
            match session.collapse(rng) {
                Ok(grid) => return grid,
                Err(_) => continue,
            }
        }
    }
}

/// Retries failed attempts up to the given number of times, surfacing the
/// final error when they are exhausted. Cancellation is terminal and is
/// never retried.
#[derive(Debug, Clone, Copy)]
pub struct NumTimes(pub usize);

impl Retry for NumTimes {
    type Return = Result<Grid<[u8; 3]>, SolveError>;
    fn retry<R: Rng>(&mut self, session: &Overlapping, rng: &mut R) -> Self::Return {
        loop {
            match session.collapse(rng) {
                Ok(grid) => return Ok(grid),
                Err(SolveError::Cancelled) => return Err(SolveError::Cancelled),
                Err(error) => {
                    if self.0 == 0 {
                        return Err(error);
                    }
                    self.0 -= 1;
                }
            }
        }
    }
}

mod private {
    use super::*;

    pub trait Sealed {}

    impl Sealed for Forever {}
    impl Sealed for NumTimes {}
}
