// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The versioned binary entry encoding for the strata cache engine.
//!
//! A [`Codec`] converts a [`strata_backend::CacheEntry`] to and from a single
//! compact byte encoding with optional deflate compression, a string fast
//! path that bypasses the generic serializer, and lazy value materialization
//! on decode. The format is the contract between heterogeneous backends: any
//! two backends sharing this codec can read each other's stored bytes.
//!
//! Reads of bytes written by the previous (whole-entry JSON) encoder
//! generation fall back transparently; bytes recognized by neither decoder
//! are logged and treated as a miss.

mod codec;

#[doc(inline)]
pub use codec::{COMPRESSED_FLAG, Codec, CodecConfig, HEADER_LEN, SIGNATURE, TYPE_ASCII, TYPE_BINARY, TYPE_OBJECT, TYPE_UTF8};
