//! Record sources and row cleaning

pub mod clean;
pub mod csv_file;
pub mod memory;
pub mod postgrest;
pub mod source;

pub use clean::{clean_record, clean_records, dataset_hash, parse_amount, parse_timestamp};
pub use csv_file::CsvRecordSource;
pub use memory::StaticRecordSource;
pub use postgrest::PostgrestRecordSource;
pub use source::{DataSourceError, RecordSource};
