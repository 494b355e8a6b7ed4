// CSV codec: header-aware decoding and delimited encoding of text rows
pub mod decoder;
pub mod encoder;


pub use decoder::{read_header, CsvDecoder, CsvRecord, CsvRecords, DecodeOptions};
pub use encoder::{encode_rows, CsvEncoder};
