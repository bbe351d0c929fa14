//! Output sink helpers.

use std::io::{self, BufWriter, Write};
use std::path::Path;

use fgoxide::io::Io;

use crate::error::Result;

/// The buffer size to use for output writers.
pub const BUFFER_SIZE: usize = 1024 * 1024;

/// Compression level used when the output path implies gzip.
const COMPRESSION_LEVEL: u32 = 5;

/// Opens the output sink. A path yields a buffered file writer, compressed
/// when the extension is `.gz`; no path yields buffered standard output.
pub fn new_output_writer<P: AsRef<Path>>(output: Option<&P>) -> Result<Box<dyn Write + Send>> {
    match output {
        Some(path) => {
            let fg_io = Io::new(COMPRESSION_LEVEL, BUFFER_SIZE);
            let writer = fg_io
                .new_writer(path)
                .map_err(|error| io::Error::new(io::ErrorKind::Other, error.to_string()))?;
            Ok(Box::new(writer))
        }
        None => Ok(Box::new(BufWriter::with_capacity(BUFFER_SIZE, io::stdout()))),
    }
}
