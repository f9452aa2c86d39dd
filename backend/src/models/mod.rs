pub mod constraints;
pub mod job;
pub mod macros;
pub mod time;

pub use constraints::*;
pub use job::*;
pub use time::*;
