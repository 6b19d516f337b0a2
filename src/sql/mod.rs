//! Safe SQL builder for the local engine: identifiers validated and quoted, values as parameters.

mod builder;
pub mod params;
pub mod row;
pub use builder::*;
pub use params::*;
pub use row::*;
