mod identity_provider_supabase;

pub use identity_provider_supabase::*;
