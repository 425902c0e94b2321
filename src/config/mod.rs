//! Manager configuration
//!
//! - `ConfigOptions` - scope resolution, cache duration and cache strategy
//! - `ScopeResolver` - capability that supplies the scope for each call
//! - `FixedScope` - a resolver that always returns the same scope

mod types;

pub use types::{
    ConfigOptions, DEFAULT_CACHE_DURATION, DEFAULT_SCOPE, FixedScope, ScopeResolver,
};
