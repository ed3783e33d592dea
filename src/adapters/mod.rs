//! Concrete port implementations for native hosts.
//!
//! SYSTEM CONTEXT
//! ==============
//! The engine only sees `crate::ports` traits. These adapters back them with
//! an in-memory map, a JSON file, a `reqwest` client, the system clock, and
//! log-only document/environment stand-ins for headless use.

pub mod file;
pub mod host;
pub mod http;
pub mod memory;

pub use file::FileStorage;
pub use host::{StaticEnvironment, SystemClock, TracingDocument};
pub use http::HttpNetwork;
pub use memory::MemoryStorage;
