//! Upstream image references and their mapping into the destination registry

pub mod reference;

pub use reference::{Destination, ImageReference};
