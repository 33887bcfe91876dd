// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Expose large or heterogeneous byte content through small, uniform read windows.
//!
//! A [`ByteStream`] is one consumer's view over immutable byte content, built for
//! systems where the content may be far larger than the memory available to process
//! it. The content can live anywhere - RAM, static storage, a region handed over by a
//! foreign allocator, or a chain of other streams - and the consumer reads it the same
//! way regardless: sequentially, into a small local buffer.
//!
//! ```
//! use bytestream::ByteStream;
//!
//! # fn main() -> bytestream::Result<()> {
//! let mut stream = ByteStream::from_static(b"0123456789")?;
//!
//! let mut buffer = [0_u8; 4];
//! while let Ok(count) = stream.read(&mut buffer) {
//!     println!("got {} bytes: {:?}", count, &buffer[..count]);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # The sliding window
//!
//! Reading does not discard content. Bytes that have been read stay available - the
//! cursor can be moved back over them with [`ByteStream::set_position()`] or
//! [`ByteStream::reset()`] - until the consumer explicitly acknowledges them with
//! [`ByteStream::release()`]. This splits the content into three segments:
//!
//! ```text
//!      Released                 Pending                       Future
//!  |----------------|--------------------------|------------------------------|
//!  |                |<- first valid position   |<- current position           |
//!  |<-------------------------- content length -------------------------------|
//! ```
//!
//! The shape is the natural fit for sliding-window protocols: read and transmit a
//! portion, keep it pending until the peer acknowledges it, release it afterwards, and
//! rewind to retransmit when the acknowledgement never arrives. Release is a promise
//! from the consumer, honored even by providers that cannot actually reclaim anything
//! (static storage, shared regions): released positions become unreachable either way.
//!
//! # Sharing content between consumers
//!
//! The content behind a stream is reference counted. [`ByteStream::clone_at()`] creates
//! a new instance over the same content - no bytes are copied - with its own independent
//! cursor and window, and with a caller-chosen logical position for its first byte. A
//! protocol can, for example, clone a stream so that stream positions coincide with wire
//! sequence numbers.
//!
//! Each instance belongs to one owner and requires `&mut` for every cursor movement; to
//! read the same content from several threads, give each thread its own clone. Dropping
//! an instance releases its reference, and the last drop triggers the content's release
//! callbacks.
//!
//! # Chaining content
//!
//! [`ByteStream::concat()`] chains the content of two streams into one, in constant time
//! and without copying - the contents may come from entirely different storage. Reads
//! simply continue from one content into the next, though a single read call never mixes
//! bytes of both.
//!
//! ```
//! use bytestream::ByteStream;
//!
//! # fn main() -> bytestream::Result<()> {
//! let header = ByteStream::from_static(b"len=36;")?;
//! let body = ByteStream::from_vec(vec![0_u8; 36])?;
//!
//! let message = header.concat(&body)?;
//! assert_eq!(message.remaining_size()?, 7 + 36);
//! # Ok(())
//! # }
//! ```
//!
//! # Producing content
//!
//! Content enters the system through the factories on [`ByteStream`]:
//!
//! * [`ByteStream::from_static()`] - bytes compiled into the program image.
//! * [`ByteStream::from_vec()`] - heap bytes owned by the content.
//! * [`ByteStream::from_bytes()`] - zero-copy sharing with the `bytes` ecosystem.
//! * [`ByteStream::from_raw_parts()`] - producer-managed storage with a release
//!   callback, for regions this crate knows nothing about.
//!
//! Providers over other media (files, flash, network, generated data) implement the same
//! operation set behind the same instance type and interoperate freely with the built-in
//! ones, including under [`ByteStream::concat()`]. A provider may even convert data as
//! it is read (for example, exposing binary storage as its base64 encoding), which is
//! why sizes and positions always describe the exposed content, not the storage.

mod composite;
mod control;
mod error;
mod flat;
mod ops;
mod read_adapter;
mod stream;

pub use control::ReleaseCallback;
pub use error::*;
pub use stream::*;

#[cfg(test)]
mod testing;
