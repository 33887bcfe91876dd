// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Helpers shared by the unit tests of this crate.

use crate::stream::ByteStream;

/// Drains a stream from its current cursor to the end, reading through a scratch
/// buffer of the given size.
pub(crate) fn read_to_vec(stream: &mut ByteStream, chunk_size: usize) -> Vec<u8> {
    let mut content = Vec::new();
    let mut buffer = vec![0_u8; chunk_size];

    while let Ok(count) = stream.read(&mut buffer) {
        content.extend_from_slice(&buffer[..count]);
    }

    content
}
