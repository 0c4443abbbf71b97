//! Protocol, transports, settings and the engine seam shared by the
//! session layer and the client executor.

pub mod engine;
pub mod protocol;
pub mod settings;
pub mod transport;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
