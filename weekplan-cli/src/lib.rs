//! Client side of weekplan: talking to the server, saving in the
//! background, and keeping a local copy for when the server is away.

pub mod autosave;
pub mod cache;
pub mod client;
pub mod config;
pub mod render;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
