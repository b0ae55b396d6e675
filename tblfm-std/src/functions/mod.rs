//! Standard aggregate functions

mod aggregate;

pub use aggregate::{Sum, Mean, Median};
