pub mod in_memory_store;
pub mod writer;

pub use in_memory_store::InMemoryOutboxStore;
pub use writer::OutboxWriter;
