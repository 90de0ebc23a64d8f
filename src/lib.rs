//! Turns the Vulkan API registry (`vk.xml`) into one definition bundle per feature and
//! extension, plus tables of the types the core features and the extensions need.
//!
//! The pipeline is [`load_file`] → [`Plan::new`] → [`Emitter`] → [`write_output`];
//! [`generate`] runs the middle two steps.

#[macro_use]
extern crate serde_derive;

pub mod c;
pub mod config;
pub mod diag;
pub mod docs;
pub mod emit;
pub mod error;
#[macro_use]
mod parse;
pub mod output;
pub mod resolve;
pub mod subst;
mod types;

pub use config::{Config, Options};
pub use diag::Diagnostics;
pub use docs::{DocMap, DocSource, NoDocs};
pub use emit::{generate, DefinitionBundle, Emitter, Literal, Output, TypeTable};
pub use error::*;
pub use output::write_output;
pub use parse::{load_file, load_stream};
pub use resolve::{Closure, Plan, ResolveMode, Resolver, Unit, UnitKind};
pub use types::*;
