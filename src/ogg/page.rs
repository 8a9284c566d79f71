// Vorbis decoder written in Rust
//
// Copyright (c) 2016 est31 <MTest31@outlook.com>
// and contributors. All rights reserved.
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
Ogg page parsing

A page is the framing unit of the Ogg container: a fixed 27 byte
header, a segment table, and a payload made up of 1..255 "lacing"
segments of up to 255 bytes each. This module only concerns itself
with a single page at a time; stitching segments into packets that
may span several pages is the job of the `packet` mod.
*/

use std::io::Read;
use byteorder::{ReadBytesExt, LittleEndian};
use ogg::crc::update_crc;
use ogg::OggReadError;

/// Number of bytes making up the fixed-size part of a page header,
/// not including the segment table.
pub const PAGE_HEADER_LEN :usize = 27;

/// How far we are willing to scan forward, byte by byte, looking for
/// the next capture pattern after a corrupt or truncated page.
pub const MAX_RESYNC_BYTES :usize = 65536;

/// One parsed Ogg page.
///
/// `segments` holds the raw lengths straight out of the segment table;
/// a length of 255 means "more to come in the next segment", a length
/// less than 255 terminates the packet fragment it belongs to.
pub struct Page {
	pub stream_serial :u32,
	pub sequence_num :u32,
	pub absgp :u64,
	pub first_page :bool,
	pub last_page :bool,
	pub continuation :bool,
	pub segments :Vec<u8>,
	pub payload :Vec<u8>,
}

impl Page {
	/// Splits the page's payload into packet-fragment slices, one per
	/// entry in the segment table, coalescing consecutive 255-length
	/// segments into a single fragment as the Ogg framing allows.
	pub fn packet_fragments(&self) -> Vec<(&[u8], bool)> {
		let mut res = Vec::new();
		let mut pos = 0usize;
		let mut run_start = 0usize;
		let mut i = 0usize;
		while i < self.segments.len() {
			let seg_len = self.segments[i] as usize;
			pos += seg_len;
			if self.segments[i] < 255 {
				res.push((&self.payload[run_start .. pos], true));
				run_start = pos;
			} else if i + 1 == self.segments.len() {
				// A page can end mid packet: the last segment is 255
				// and there's no following segment to terminate it.
				res.push((&self.payload[run_start .. pos], false));
				run_start = pos;
			}
			i += 1;
		}
		res
	}
}

/// Reads a single page, starting exactly at `r`'s current position
/// (no resync scanning -- use `find_and_read_page` for that).
pub fn read_page<R :Read>(r :&mut R) -> Result<Page, OggReadError> {
	let mut capture = [0u8; 4];
	r.read_exact(&mut capture).map_err(OggReadError::ReadError)?;
	if &capture != b"OggS" {
		return Err(OggReadError::NoCapturePatternFound);
	}
	read_page_after_capture(r, capture)
}

/// Reads the rest of a page, given that the 4 byte capture pattern
/// has already been consumed from `r` (and found to equal `OggS`).
fn read_page_after_capture<R :Read>(r :&mut R, capture :[u8; 4]) -> Result<Page, OggReadError> {
	let mut hdr = [0u8; PAGE_HEADER_LEN];
	hdr[0 .. 4].copy_from_slice(&capture);
	r.read_exact(&mut hdr[4 ..]).map_err(OggReadError::ReadError)?;
	let version = hdr[4];
	if version != 0 {
		return Err(OggReadError::InvalidStreamStructVersion(version));
	}
	let flags = hdr[5];
	let continuation = flags & 0x1 != 0;
	let first_page = flags & 0x2 != 0;
	let last_page = flags & 0x4 != 0;

	let absgp = (&hdr[6 .. 14]).read_u64::<LittleEndian>().unwrap();
	let stream_serial = (&hdr[14 .. 18]).read_u32::<LittleEndian>().unwrap();
	let sequence_num = (&hdr[18 .. 22]).read_u32::<LittleEndian>().unwrap();
	let stored_crc = (&hdr[22 .. 26]).read_u32::<LittleEndian>().unwrap();
	let segment_count = hdr[26] as usize;

	let mut segments = vec![0u8; segment_count];
	r.read_exact(&mut segments).map_err(OggReadError::ReadError)?;

	let payload_len :usize = segments.iter().map(|&b| b as usize).sum();
	let mut payload = vec![0u8; payload_len];
	r.read_exact(&mut payload).map_err(OggReadError::ReadError)?;

	let mut crc = 0u32;
	let mut hdr_zeroed = hdr;
	hdr_zeroed[22 .. 26].copy_from_slice(&[0, 0, 0, 0]);
	crc = update_crc(crc, &hdr_zeroed);
	crc = update_crc(crc, &segments);
	crc = update_crc(crc, &payload);

	if crc != stored_crc {
		return Err(OggReadError::HashMismatch(stored_crc, crc));
	}

	Ok(Page {
		stream_serial,
		sequence_num,
		absgp,
		first_page,
		last_page,
		continuation,
		segments,
		payload,
	})
}

/// Scans forward for the next valid page, skipping corrupt or
/// spurious bytes. Used both on initial sync and whenever a CRC
/// or capture-pattern mismatch is hit mid-stream.
///
/// `r` is a plain `Read`, not a `Seek`: bytes consumed while looking
/// for the capture pattern can never be put back. So this slides a
/// 4 byte window forward one byte at a time, only ever consuming a
/// single new byte per failed candidate, instead of re-reading a
/// full header (and thereby skipping past the very position it's
/// trying to find).
///
/// Returns the page together with the number of bytes that were
/// skipped before it was found.
pub fn find_and_read_page<R :Read>(r :&mut R) -> Result<(Page, u64), OggReadError> {
	let mut waste = 0u64;
	let mut window = [0u8; 4];
	r.read_exact(&mut window).map_err(OggReadError::ReadError)?;
	loop {
		if &window == b"OggS" {
			match read_page_after_capture(r, window) {
				Ok(page) => {
					if waste > 0 {
						debug!("Ogg resync found a page after skipping {} bytes", waste);
					}
					return Ok((page, waste));
				},
				Err(OggReadError::ReadError(e)) => return Err(OggReadError::ReadError(e)),
				Err(_) => {
					// A coincidental match or a corrupt page; keep
					// sliding the window past it one byte at a time.
				},
			}
		}
		window.copy_within(1 .. 4, 0);
		let mut b = [0u8; 1];
		r.read_exact(&mut b).map_err(OggReadError::ReadError)?;
		window[3] = b[0];
		waste += 1;
		if waste as usize > MAX_RESYNC_BYTES {
			debug!("Ogg resync gave up after {} bytes without finding a capture pattern", waste);
			return Err(OggReadError::NoCapturePatternFound);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use ogg::crc::update_crc;

	fn build_page(serial :u32, seq :u32, absgp :u64, flags :u8, payload :&[u8]) -> Vec<u8> {
		let mut segments = Vec::new();
		let mut remaining = payload.len();
		if remaining == 0 {
			segments.push(0);
		}
		while remaining > 0 {
			let take = remaining.min(255);
			segments.push(take as u8);
			remaining -= take;
			if take < 255 {
				break;
			}
		}
		let mut hdr = Vec::new();
		hdr.extend_from_slice(b"OggS");
		hdr.push(0); // version
		hdr.push(flags);
		hdr.extend_from_slice(&absgp.to_le_bytes());
		hdr.extend_from_slice(&serial.to_le_bytes());
		hdr.extend_from_slice(&seq.to_le_bytes());
		hdr.extend_from_slice(&[0, 0, 0, 0]); // crc placeholder
		hdr.push(segments.len() as u8);
		hdr.extend_from_slice(&segments);
		hdr.extend_from_slice(payload);

		let mut crc = 0u32;
		crc = update_crc(crc, &hdr[0 .. 22]);
		crc = update_crc(crc, &[0, 0, 0, 0]);
		crc = update_crc(crc, &hdr[26 + segments.len() ..]);
		hdr[22 .. 26].copy_from_slice(&crc.to_le_bytes());
		hdr
	}

	#[test]
	fn test_read_page_roundtrip() {
		let payload = b"hello vorbis world";
		let bytes = build_page(42, 0, 0, 0x2, payload);
		let mut cursor = &bytes[..];
		let page = read_page(&mut cursor).unwrap();
		assert_eq!(page.stream_serial, 42);
		assert_eq!(page.first_page, true);
		assert_eq!(page.payload, payload);
	}

	#[test]
	fn test_crc_mismatch_detected() {
		let payload = b"hello vorbis world";
		let mut bytes = build_page(42, 0, 0, 0x2, payload);
		let last = bytes.len() - 1;
		bytes[last] ^= 0xff;
		let mut cursor = &bytes[..];
		match read_page(&mut cursor) {
			Err(OggReadError::HashMismatch(_, _)) => {},
			other => panic!("expected HashMismatch, got {:?}", other.map(|_| ())),
		}
	}

	#[test]
	fn test_resync_after_garbage() {
		let payload = b"second page after junk";
		let mut bytes = vec![0xde, 0xad, 0xbe, 0xef, 0x00];
		bytes.extend_from_slice(&build_page(7, 0, 0, 0x2, payload));
		let mut cursor = &bytes[..];
		let (page, waste) = find_and_read_page(&mut cursor).unwrap();
		assert_eq!(waste, 5);
		assert_eq!(page.payload, payload);
	}
}
