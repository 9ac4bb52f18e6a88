//! Destinations for emitted quadtree addresses

use crate::Result;
use std::io::Write;

/// Receives covered quadtree node addresses, one per call, in emission order
pub trait AddressSink {
    fn write_line(&mut self, address: &str) -> Result<()>;
}

/// In-memory buffer
impl AddressSink for Vec<String> {
    fn write_line(&mut self, address: &str) -> Result<()> {
        self.push(address.to_string());
        Ok(())
    }
}

/// Writes each address followed by a newline to any [`Write`] implementation
#[derive(Debug)]
pub struct WriteSink<W: Write> {
    writer: W,
    lines: usize,
}

impl<W: Write> WriteSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    /// Number of addresses written so far
    #[inline]
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> AddressSink for WriteSink<W> {
    fn write_line(&mut self, address: &str) -> Result<()> {
        writeln!(self.writer, "{address}")?;
        self.lines += 1;
        Ok(())
    }
}
