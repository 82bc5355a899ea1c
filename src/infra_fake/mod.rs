mod identity_provider_fake;

pub use identity_provider_fake::*;
