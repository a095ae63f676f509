// AI chat widget: session state machine, transports, and the HTTP surface.
// Vendor calls go through llm_client only, via DirectTransport.

pub mod driver;
pub mod handlers;
pub mod message;
pub mod session;
pub mod store;
pub mod transport;
