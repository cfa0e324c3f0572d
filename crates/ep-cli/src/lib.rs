//! Library parts of the `easypaper` command-line front end.

pub mod logging;
pub mod summary;
