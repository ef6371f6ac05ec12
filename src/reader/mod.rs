pub mod index_reader;
pub mod record_reader;
