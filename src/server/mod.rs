// Server module entry point
// Listener setup, connection handling and the accept loop

pub mod connection;
pub mod listener;
pub mod serve;
pub mod signal;

pub use listener::create_reusable_listener;
pub use serve::serve;
pub use signal::ShutdownSignal;
