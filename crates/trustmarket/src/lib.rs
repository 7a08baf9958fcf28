//! ## Crate layout
//! - `core`: storage, indexing, history and reputation runtime.
//! - `error`: the public error type every operation returns.
//! - `market`: typed operations over one store handle.
//!
//! [`Marketplace::invoke`] routes a function name and string arguments to
//! the matching operation and returns its JSON payload.

pub use trustmarket_core as core;

mod dispatch;
pub mod error;
pub mod market;

pub use error::{Error, ErrorKind, ErrorOrigin};
pub use market::{DeleteReport, IndexedKind, Marketplace};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        Error, Marketplace,
        core::{
            config::MarketConfig,
            db::{KeyValueStore, MemoryStore},
            prelude::*,
        },
    };
}
