//! Session loading: wallet file to authenticated client

pub mod loader;

pub use loader::{ResolveOptions, Session, SessionLoader};
