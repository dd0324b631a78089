mod err;
pub mod overlapping;
pub mod retry;
mod symmetry;
mod wfc;
pub mod wrap;

pub use crate::err::{ConfigError, SolveError};
pub use crate::wfc::*;
pub use coord_2d::{Coord, Size};
pub use wrap::Wrap;
