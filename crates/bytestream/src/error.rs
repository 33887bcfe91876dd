// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// The outcome of a stream operation that did not succeed.
///
/// Every fallible operation on a [`ByteStream`][crate::ByteStream] reports its outcome
/// through this closed set. The built-in providers only ever surface [`Eof`][Error::Eof],
/// [`IllegalArgument`][Error::IllegalArgument] and [`NoSuchElement`][Error::NoSuchElement];
/// the remaining variants exist so that providers backed by slower or access-controlled
/// media (file, flash, network) can surface their own runtime conditions through the same
/// interface without widening it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Error {
    /// The read cursor is at the end of the stream; no bytes were produced.
    #[error("no bytes remain to be read")]
    Eof,

    /// The resource backing the operation is temporarily busy.
    #[error("the resource backing the operation is busy")]
    Busy,

    /// A long-running provider operation was cancelled.
    #[error("the operation was cancelled")]
    Cancelled,

    /// A provided argument is invalid (empty buffer, position past the read
    /// cursor, offset arithmetic that would not fit the position domain).
    #[error("a provided argument is invalid")]
    IllegalArgument,

    /// The requested position is legal in form but falls outside the stream's
    /// currently valid window (already-released prefix, or past the end).
    #[error("the requested position is outside the valid window of the stream")]
    NoSuchElement,

    /// A provider could not allocate the memory required for the operation.
    #[error("not enough memory to complete the operation")]
    OutOfMemory,

    /// The operation was denied for security reasons.
    #[error("the operation was denied for security reasons")]
    Security,

    /// The operation failed at the system level.
    #[error("the operation failed at the system level")]
    System,
}

/// A `Result` that may contain an [`Error`] from this crate.
pub type Result<T> = std::result::Result<T, Error>;
