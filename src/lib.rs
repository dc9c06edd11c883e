//! Compile JSON Schema documents into a typed declaration model and render it
//! as source text.
//!
//! Pipeline: [`schema::parse`] → [`assemble::assemble`] (which runs the
//! [`reify`] engine and the [`promote`] pass) → [`code::emit::render`].
pub mod assemble;
pub mod cli;
pub mod code;
pub mod codec;
pub mod config;
pub mod error;
pub mod promote;
pub mod reify;
pub mod schema;

pub use assemble::{assemble, generate};
pub use config::Config;
pub use error::{Error, Result};
