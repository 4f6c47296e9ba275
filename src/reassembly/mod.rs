//! Chunk reassembly and record decoding.
//!
//! The feed delivers newline-delimited JSON in arbitrarily sized chunks. A
//! [`Reassembler`] buffers those chunks, cuts them into records and hands each
//! parsed value to a [`RecordDecoder`].

mod decoder;
mod reassembler;

pub use decoder::RecordDecoder;
pub use reassembler::Reassembler;
