//! API request handlers

mod documents;
mod envelopes;
mod health;
mod signing;

pub use documents::*;
pub use envelopes::*;
pub use health::*;
pub use signing::*;
