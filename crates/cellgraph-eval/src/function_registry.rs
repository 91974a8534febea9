//! Global function registry.
//!
//! A process-wide map from uppercase function name to implementation,
//! seeded with the builtins. Custom functions registered here are picked up
//! the next time a formula compiles.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::builtins;
use crate::function::{Function, FunctionProvider};

static REG: Lazy<DashMap<String, Arc<dyn Function>>> = Lazy::new(|| {
    let map = DashMap::new();
    for f in builtins::all() {
        map.insert(f.name().to_ascii_uppercase(), f);
    }
    map
});

/// Register (or replace) a function under its own name.
pub fn register(f: Arc<dyn Function>) {
    REG.insert(f.name().to_ascii_uppercase(), f);
}

/// Case-insensitive lookup.
pub fn get(name: &str) -> Option<Arc<dyn Function>> {
    REG.get(&name.to_ascii_uppercase()).map(|e| e.value().clone())
}

/// [`FunctionProvider`] backed by the global registry. The default provider
/// a session compiles against.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalFunctions;

impl FunctionProvider for GlobalFunctions {
    fn get_function(&self, name: &str) -> Option<Arc<dyn Function>> {
        get(name)
    }
}
