// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::{self, Read};

use crate::stream::ByteStream;
use crate::Error;

/// Adapter that implements `std::io::Read` for [`ByteStream`].
///
/// Create an instance via [`ByteStream::as_read()`][1].
///
/// [1]: crate::ByteStream::as_read
#[derive(Debug)]
pub(crate) struct ByteStreamReader<'s> {
    inner: &'s mut ByteStream,
}

impl<'s> ByteStreamReader<'s> {
    #[must_use]
    pub(crate) const fn new(inner: &'s mut ByteStream) -> Self {
        Self { inner }
    }
}

impl Read for ByteStreamReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        match self.inner.read(buf) {
            Ok(count) => Ok(count),
            Err(Error::Eof) => Ok(0),
            Err(error) => Err(io::Error::other(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_a_flat_stream_and_signals_the_end_as_zero() {
        let mut stream = ByteStream::from_static(b"0123456789").unwrap();
        let mut reader = stream.as_read();

        let mut buffer = [0_u8; 4];

        // A flat stream fills the buffer whenever enough content remains, so the
        // ten bytes arrive as 4 + 4 + 2.
        assert_eq!(reader.read(&mut buffer).unwrap(), 4);
        assert_eq!(&buffer, b"0123");

        assert_eq!(reader.read(&mut buffer).unwrap(), 4);
        assert_eq!(&buffer, b"4567");

        assert_eq!(reader.read(&mut buffer).unwrap(), 2);
        assert_eq!(&buffer[..2], b"89");

        // Where the stream itself reports `Eof`, the adapter reports zero bytes.
        assert_eq!(reader.read(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn read_to_end_drains_a_composition() {
        let head = ByteStream::from_static(b"0123456789").unwrap();
        let tail = ByteStream::from_static(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ").unwrap();
        let mut combined = head.concat(&tail).unwrap();

        let mut content = Vec::new();
        combined.as_read().read_to_end(&mut content).unwrap();

        assert_eq!(content, b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ");
    }
}
