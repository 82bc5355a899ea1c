mod clock;
mod identity_provider;

pub use clock::*;
pub use identity_provider::*;
