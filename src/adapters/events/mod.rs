//! Event bus adapters.
//!
//! - `InMemoryEventBus` - In-process bus that carries ride-lifecycle events
//!   from the booking services to the hub

mod in_memory;

pub use in_memory::InMemoryEventBus;
