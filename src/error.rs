//! Error taxonomy.
//!
//! Loading fails fast: every [`ParseError`] collected while walking the document is returned
//! together in [`LoadError::Parse`]. Unresolved references are recoverable and only become
//! errors in strict mode.

use std::path::PathBuf;
use thiserror::Error;

/// Structural problem with one element of the registry, located by its xpath.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("{xpath}: missing attribute '{name}'")]
    MissingAttribute { xpath: String, name: String },

    #[error("{xpath}: missing element <{name}>")]
    MissingElement { xpath: String, name: String },

    #[error("{xpath}: unrecognized type category '{category}'")]
    UnknownCategory { xpath: String, category: String },

    /// Pointer or array syntax outside the grammar the registry uses.
    #[error("{xpath}: malformed declarator: {desc}")]
    Declarator { xpath: String, desc: String },

    #[error("{xpath}: malformed function pointer: {desc}")]
    FunctionPointer { xpath: String, desc: String },

    #[error("{xpath}: '{name}' is already defined")]
    DuplicateName { xpath: String, name: String },

    #[error("{xpath}: value '{text}' is not a valid base 10 or 16 integer")]
    ParseInt { xpath: String, text: String },

    #[error("{xpath}: {desc}")]
    SchemaViolation { xpath: String, desc: String },

    #[error("internal parser error: {desc}")]
    Internal { desc: &'static str },
}

/// Reasons the registry could not be loaded at all.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("unable to read registry: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed XML: {0}")]
    Xml(#[from] xml::reader::Error),

    #[error("document has no <registry> element")]
    MissingRegistryElement,

    #[error("{} error(s) while parsing registry, first: {}", .0.len(), first_error(.0))]
    Parse(Vec<ParseError>),
}

fn first_error(errors: &[ParseError]) -> String {
    errors
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// A name used by a require block, command, or aggregate that has no definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("'{name}' referenced from '{referrer}' is not defined")]
pub struct UnresolvedReference {
    pub name: String,
    pub referrer: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("{} unresolved reference(s), first: {}", .0.len(), first_unresolved(.0))]
    Unresolved(Vec<UnresolvedReference>),
}

fn first_unresolved(refs: &[UnresolvedReference]) -> String {
    refs.first().map(ToString::to_string).unwrap_or_default()
}

/// Invalid driver environment, detected before any parsing begins.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("registry file {} does not exist", .0.display())]
    MissingRegistry(PathBuf),

    #[error("destination {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("destination {} is not writable", .0.display())]
    NotWritable(PathBuf),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteError {
    #[error("unable to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to serialize {name}: {source}")]
    Serialize {
        name: String,
        #[source]
        source: ron::Error,
    },
}
