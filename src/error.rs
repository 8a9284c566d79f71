// Vorbis decoder written in Rust
//
// Copyright (c) 2016 est31 <MTest31@outlook.com>
// and contributors. All rights reserved.
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
The top level error type returned by the decoder surface in `decoder`.

Lower layers (`header`, `audio`, `ogg`) each keep their own focused
error enum; this type wraps them and adds the few error kinds that
only make sense once a full Ogg/Vorbis stream is in view: telling a
sibling Xiph codec apart from Vorbis, truncated input, and the
argument/seekability checks the public surface itself is responsible
for.
*/

use std::error;
use std::fmt;
use header::HeaderReadError;
use audio::AudioReadError;
use ogg::OggReadError;

/// A Xiph codec recognized by its own header capture pattern, for use
/// in `Error::NotVorbis` when the first packet isn't Vorbis at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignCodec {
	Opus,
	Flac,
	Speex,
	Theora,
	Skeleton,
}

impl fmt::Display for ForeignCodec {
	fn fmt(&self, fmt :&mut fmt::Formatter) -> Result<(), fmt::Error> {
		let name = match self {
			ForeignCodec::Opus => "Opus",
			ForeignCodec::Flac => "FLAC",
			ForeignCodec::Speex => "Speex",
			ForeignCodec::Theora => "Theora",
			ForeignCodec::Skeleton => "Ogg Skeleton",
		};
		write!(fmt, "{}", name)
	}
}

/// Errors that can occur while opening or decoding a Vorbis stream.
#[derive(Debug)]
pub enum Error {
	/// The first packet's header belongs to a different, recognized
	/// Xiph codec rather than to Vorbis.
	NotVorbis { kind :ForeignCodec },
	/// The byte source ran out of data inside a header or mid-page.
	Truncated,
	/// The container or codec data violated an invariant that leaves
	/// no way to recover by resyncing (an impossible codebook, a
	/// header sentinel mismatch, or a CRC failure with no valid page
	/// found within the resync window).
	Corrupt(&'static str),
	/// A seek was requested on a byte source that doesn't support it.
	NotSeekable,
	/// An argument passed to the public API violates its contract
	/// (for instance, an output buffer whose length isn't a multiple
	/// of the channel count).
	InvalidArgument(&'static str),
	/// A problem while parsing one of the three Vorbis headers.
	Header(HeaderReadError),
	/// A problem while decoding an audio packet.
	Audio(AudioReadError),
	/// A problem in the underlying Ogg container layer that isn't
	/// covered by one of the more specific variants above.
	Ogg(OggReadError),
}

impl fmt::Display for Error {
	fn fmt(&self, fmt :&mut fmt::Formatter) -> Result<(), fmt::Error> {
		match self {
			Error::NotVorbis { kind } => write!(fmt, "Not a Vorbis stream (looks like {})", kind),
			Error::Truncated => write!(fmt, "Unexpected end of data"),
			Error::Corrupt(what) => write!(fmt, "Corrupt Vorbis stream: {}", what),
			Error::NotSeekable => write!(fmt, "The byte source does not support seeking"),
			Error::InvalidArgument(what) => write!(fmt, "Invalid argument: {}", what),
			Error::Header(e) => write!(fmt, "{}", e),
			Error::Audio(e) => write!(fmt, "{}", e),
			Error::Ogg(e) => write!(fmt, "{}", e),
		}
	}
}

impl error::Error for Error {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		match self {
			Error::Header(e) => Some(e),
			Error::Audio(e) => Some(e),
			Error::Ogg(e) => Some(e),
			_ => None,
		}
	}
}

impl From<HeaderReadError> for Error {
	fn from(err :HeaderReadError) -> Error {
		// EndOfPacket while reading a header packet always means we
		// ran out of bytes before the header was complete.
		match err {
			HeaderReadError::EndOfPacket => Error::Truncated,
			HeaderReadError::NotVorbisHeader => Error::Corrupt("header capture pattern mismatch"),
			other => Error::Header(other),
		}
	}
}

impl From<AudioReadError> for Error {
	fn from(err :AudioReadError) -> Error {
		Error::Audio(err)
	}
}

impl From<OggReadError> for Error {
	fn from(err :OggReadError) -> Error {
		match err {
			OggReadError::ReadError(ref io_err)
					if io_err.kind() == std::io::ErrorKind::UnexpectedEof => Error::Truncated,
			OggReadError::NoCapturePatternFound => Error::Corrupt("no page found while resyncing"),
			OggReadError::HashMismatch(_, _) => Error::Corrupt("page CRC mismatch"),
			other => Error::Ogg(other),
		}
	}
}
