//! Tabular data layer: in-memory batches, the CSV codec and document stores.

pub mod batch;
pub mod csv_io;
pub mod store;

pub use batch::DataBatch;
pub use csv_io::{read_csv, write_csv};
pub use store::{DocumentStore, InMemoryStore, MongoStore, documents_to_batch};
