//! buildinfo-gen: version information from source control tags.
//!
//! Describes the current or latest git tag, renders parts of it, generates
//! Rust source embedding it and emits the build script instructions consumed
//! by `buildinfo-core`.

pub mod cancel;
pub mod config;
pub mod describe;
pub mod emit;
pub mod field;
pub mod generator;
pub mod git;
pub mod tag;
pub mod template;

pub use cancel::CancelToken;
pub use config::{Config, GenerateConfig, GitConfig};
pub use describe::describe;
pub use emit::Emitter;
pub use field::Field;
pub use generator::{Generator, DEFAULT_TEMPLATE};
pub use git::{Git, SourceControl, TagDetails, TagMode, DEFAULT_TAG};
pub use tag::TagDescriptor;
pub use template::Template;
