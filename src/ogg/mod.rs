// Vorbis decoder written in Rust
//
// Copyright (c) 2016 est31 <MTest31@outlook.com>
// and contributors. All rights reserved.
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
Ogg container support

A small, in-house Ogg demultiplexer: page parsing with CRC
validation and resync, packet reassembly across page boundaries, and
a multi-stream packet provider with granule-position seeking.

This used to be provided by depending on the external `ogg` crate;
the module keeps that crate's `PacketReader`/`Packet` naming and
method surface so the rest of this crate (and code written against
earlier versions of it) keeps working unmodified.
*/

pub mod crc;
pub mod page;
pub mod packet;

pub use self::packet::{Packet, PacketReader};

use std::fmt;
use std::io;

/// Errors that can occur when reading the Ogg container layer.
#[derive(Debug)]
pub enum OggReadError {
	/// Bytes could not be read from the underlying source.
	ReadError(io::Error),
	/// No Ogg capture pattern ("OggS") could be found within the
	/// resync search window.
	NoCapturePatternFound,
	/// The page declared a stream structure version this crate
	/// doesn't understand (only version 0 is defined).
	InvalidStreamStructVersion(u8),
	/// The page's stored CRC-32 didn't match the one computed over
	/// its header, segment table and payload.
	HashMismatch(u32, u32),
	/// The data violated the Ogg framing invariants in some other way.
	InvalidFormat,
}

impl fmt::Display for OggReadError {
	fn fmt(&self, fmt :&mut fmt::Formatter) -> Result<(), fmt::Error> {
		match self {
			OggReadError::ReadError(e) => write!(fmt, "Ogg read error: {}", e),
			OggReadError::NoCapturePatternFound =>
				write!(fmt, "No Ogg capture pattern found in resync window"),
			OggReadError::InvalidStreamStructVersion(v) =>
				write!(fmt, "Unsupported Ogg stream structure version {}", v),
			OggReadError::HashMismatch(stored, computed) =>
				write!(fmt, "Ogg page CRC mismatch: stored {:#x}, computed {:#x}", stored, computed),
			OggReadError::InvalidFormat => write!(fmt, "Invalid Ogg page format"),
		}
	}
}

impl std::error::Error for OggReadError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			OggReadError::ReadError(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for OggReadError {
	fn from(e :io::Error) -> OggReadError {
		OggReadError::ReadError(e)
	}
}
