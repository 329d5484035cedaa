//! buildinfo-core: release metadata of a build, its text/JSON forms and an
//! HTTP endpoint exposing it.
//!
//! Values are normally injected at compile time by a build script:
//!
//! ```ignore
//! // build.rs
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     buildinfo_gen::Emitter::new().emit()?;
//!     Ok(())
//! }
//!
//! // main.rs
//! let bld = buildinfo_core::build_info!();
//! println!("{bld}"); // v1.4.2 0f3c9a1 (2024-05-01T10:00:00Z)
//! ```

pub mod build_info;
pub mod dummy;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod logging;
pub mod module;

pub use build_info::{
    is_reserved, BuildInfo, EMPTY_VERSION, LONG_FLAG, METRIC_HELP, METRIC_NAME, SHORT_FLAG,
};
pub use error::{Error, Result};
pub use module::{Module, ModuleInfo, Setting};
