//! Domain models for the clinic settlement pipeline.

mod catalog;
mod clinical;
mod encounter;
mod invoice;

pub use catalog::*;
pub use clinical::*;
pub use encounter::*;
pub use invoice::*;
