//! catsync store - the local resource store.
//!
//! Collections and items live as JSON documents on disk; see [`LocalStore`].

pub mod fs;

pub use fs::LocalStore;
