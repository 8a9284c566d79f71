// Vorbis decoder written in Rust
//
// Copyright (c) 2016 est31 <MTest31@outlook.com>
// and contributors. All rights reserved.
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
Packet assembly and the multi-stream packet provider

Stitches the segments carried by consecutive pages back into the
packets a logical stream's codec actually deals in, and hands them
out in arrival order regardless of how many logical streams (Vorbis,
or otherwise) are multiplexed onto the same byte source.
*/

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Read, Seek, SeekFrom, ErrorKind};
use std::ops::Range;
use ogg::OggReadError;
use ogg::page::{Page, find_and_read_page};

/// A reassembled packet belonging to one logical (per-serial) stream.
#[derive(Clone, Debug)]
pub struct Packet {
	pub data :Vec<u8>,
	stream_serial :u32,
	absgp_page :u64,
	last_in_page :bool,
	last_in_stream :bool,
	is_resync :bool,
	is_continuation :bool,
}

impl Packet {
	/// The serial number of the logical stream this packet belongs to.
	pub fn stream_serial(&self) -> u32 {
		self.stream_serial
	}
	/// The granule position of the page whose final segment completed
	/// this packet. Only meaningful for the packet that actually ends
	/// a page; earlier packets sharing that page report the same value.
	pub fn absgp_page(&self) -> u64 {
		self.absgp_page
	}
	/// Whether this packet's last byte was the page's last byte.
	pub fn last_in_page(&self) -> bool {
		self.last_in_page
	}
	/// Whether this packet is the last one of its logical stream
	/// (the page that completed it carried the EOS flag).
	pub fn last_in_stream(&self) -> bool {
		self.last_in_stream
	}
	/// Whether demuxing lost sync with this logical stream some time
	/// before this packet: either the page that started it claimed to
	/// continue a packet we had no data for, or an expected
	/// continuation never arrived and a partially assembled packet had
	/// to be dropped, or the page it started on was only found by
	/// skipping corrupt bytes. The packet itself may still be valid,
	/// but a decoder relying on continuous state (like a running mode
	/// predictor) should treat it as a discontinuity.
	pub fn is_resync(&self) -> bool {
		self.is_resync
	}
	/// Whether this packet's assembly spanned more than one page (its
	/// data includes at least one fragment taken from a page whose
	/// continuation flag was set).
	pub fn is_continuation(&self) -> bool {
		self.is_continuation
	}
}

struct LogicalStreamState {
	partial :Vec<u8>,
	/// Has the packet currently being assembled already crossed a
	/// page boundary?
	spans_pages :bool,
	/// Set when sync was lost since the last packet we handed out;
	/// consumed by (and cleared on) the next packet completed.
	pending_resync :bool,
	ended :bool,
}

impl LogicalStreamState {
	fn new() -> Self {
		LogicalStreamState {
			partial : Vec::new(),
			spans_pages : false,
			pending_resync : false,
			ended : false,
		}
	}
}

/// Reads pages from an underlying byte source and reassembles the
/// packets of all logical streams multiplexed onto it.
///
/// Mirrors the surface of the external `ogg` crate's `PacketReader`
/// that earlier revisions of this crate depended on, so that code
/// built against it (packet-serial tagging, `read_packet_expected`,
/// granule-position based seeking) keeps working unmodified.
pub struct PacketReader<T> {
	inner :T,
	streams :BTreeMap<u32, LogicalStreamState>,
	pending :VecDeque<Packet>,
	done :bool,
}

impl<T :Read> PacketReader<T> {
	pub fn new(inner :T) -> Self {
		PacketReader {
			inner,
			streams : BTreeMap::new(),
			pending : VecDeque::new(),
			done : false,
		}
	}

	/// Reads the next packet, in arrival order across all logical
	/// streams. Returns `Ok(None)` on a clean end of the byte source.
	pub fn read_packet(&mut self) -> Result<Option<Packet>, OggReadError> {
		loop {
			if let Some(pck) = self.pending.pop_front() {
				return Ok(Some(pck));
			}
			if self.done {
				return Ok(None);
			}
			let (page, waste) = match find_and_read_page(&mut self.inner) {
				Ok(res) => res,
				Err(OggReadError::ReadError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => {
					self.done = true;
					return Ok(None);
				},
				Err(e) => return Err(e),
			};
			self.ingest_page(page, waste > 0);
		}
	}

	/// Like `read_packet`, but turns a clean end of stream into an error,
	/// for call sites where running out of packets always means a
	/// truncated or malformed file (header parsing).
	pub fn read_packet_expected(&mut self) -> Result<Packet, OggReadError> {
		match self.read_packet()? {
			Some(pck) => Ok(pck),
			None => Err(OggReadError::ReadError(io::Error::new(ErrorKind::UnexpectedEof,
				"Expected further packet, but no more were available"))),
		}
	}

	/// Drops any packets that have already been read out of pages but
	/// not yet handed out, so that the next call to `read_packet`
	/// starts on a fresh page.
	pub fn delete_unread_packets(&mut self) {
		self.pending.clear();
	}

	/// `page_was_resync` is true when `find_and_read_page` had to skip
	/// bytes to find this page, meaning sync was lost somewhere before
	/// it regardless of what its own continuation flag claims.
	fn ingest_page(&mut self, page :Page, page_was_resync :bool) {
		let serial = page.stream_serial;
		let last_page = page.last_page;
		let absgp = page.absgp;
		let mut page_continuation = page.continuation;
		let fragments = page.packet_fragments();
		let frag_count = fragments.len();

		let state = self.streams.entry(serial).or_insert_with(LogicalStreamState::new);
		if page.first_page {
			state.partial.clear();
			state.spans_pages = false;
		}

		if page_was_resync {
			// Whatever we had buffered can't be trusted to precede
			// this page cleanly; don't try to stitch it together.
			state.partial.clear();
			state.spans_pages = false;
			state.pending_resync = true;
			page_continuation = false;
		}

		let had_partial = !state.partial.is_empty();
		if page_continuation && had_partial {
			// Legitimate continuation: the in-progress packet now
			// spans a page boundary.
			state.spans_pages = true;
		} else if page_continuation && !had_partial {
			// This page claims to continue a packet we have no data
			// for.
			state.pending_resync = true;
		} else if !page_continuation && had_partial {
			// The continuation we were expecting never arrived; the
			// bytes we were holding are unrecoverable.
			state.partial.clear();
			state.spans_pages = false;
			state.pending_resync = true;
		}

		for (i, (frag, terminates)) in fragments.into_iter().enumerate() {
			state.partial.extend_from_slice(frag);
			if terminates {
				let data = std::mem::take(&mut state.partial);
				let is_last_in_page = i + 1 == frag_count;
				let is_last_in_stream = last_page && is_last_in_page;
				if is_last_in_stream {
					state.ended = true;
				}
				let is_resync = state.pending_resync;
				let is_continuation = state.spans_pages;
				state.pending_resync = false;
				state.spans_pages = false;
				self.pending.push_back(Packet {
					data,
					stream_serial : serial,
					absgp_page : absgp,
					last_in_page : is_last_in_page,
					last_in_stream : is_last_in_stream,
					is_resync,
					is_continuation,
				});
			}
		}
		if last_page {
			state.ended = true;
		}
	}
}

impl<T :Read + Seek> PacketReader<T> {
	/// Seeks the underlying byte source, clearing any buffered packet
	/// and per-stream assembly state (which no longer applies once we
	/// jump elsewhere in the file).
	pub fn seek_bytes(&mut self, pos :SeekFrom) -> io::Result<u64> {
		let new_pos = self.inner.seek(pos)?;
		self.pending.clear();
		self.streams.clear();
		self.done = false;
		Ok(new_pos)
	}

	/// Returns the byte offset just past the last page of the file,
	/// usable as the upper bound of a granule-position bisection search.
	pub fn find_end_of_logical_stream(&mut self) -> Result<Option<u64>, OggReadError> {
		let end = self.inner.seek(SeekFrom::End(0)).map_err(OggReadError::ReadError)?;
		Ok(Some(end))
	}

	/// Performs a bisection search for the page, within `range` and
	/// (if `serial` is given) belonging to that logical stream, whose
	/// granule position is the greatest one not exceeding `target_absgp`.
	/// Leaves the underlying reader positioned at the start of that
	/// page so that the next `read_packet` call resumes from there.
	///
	/// Returns the granule position actually landed on, or `None` if
	/// no matching page could be found in range at all.
	pub fn seek_absgp_new(&mut self, target_absgp :u64, serial :Option<u32>,
			range :Range<u64>) -> Result<Option<u64>, OggReadError> {
		let mut lo = range.start;
		let mut hi = range.end;
		let mut best_offset :Option<u64> = None;
		let mut best_absgp :Option<u64> = None;

		// Coarse bisection: narrow down to a small byte span.
		while hi.saturating_sub(lo) > 8192 {
			let mid = lo + (hi - lo) / 2;
			match self.find_page_at_or_after(mid, serial, hi)? {
				Some((page_start, page_absgp)) => {
					if page_absgp <= target_absgp {
						best_offset = Some(page_start);
						best_absgp = Some(page_absgp);
						lo = page_start + 1;
					} else {
						hi = page_start;
					}
				},
				None => { hi = mid; },
			}
		}

		// Linear refinement from the best candidate (or the remaining
		// lower bound) forward, to catch the exact rightmost page.
		let scan_from = best_offset.unwrap_or(lo);
		self.inner.seek(SeekFrom::Start(scan_from)).map_err(OggReadError::ReadError)?;
		loop {
			let pos_before = self.inner.seek(SeekFrom::Current(0)).map_err(OggReadError::ReadError)?;
			if pos_before >= hi {
				break;
			}
			let page = match find_and_read_page(&mut self.inner) {
				Ok((page, _waste)) => page,
				Err(_) => break,
			};
			if serial.map_or(true, |s| s == page.stream_serial) {
				if page.absgp <= target_absgp {
					best_offset = Some(pos_before);
					best_absgp = Some(page.absgp);
				} else {
					break;
				}
			}
		}

		if let Some(off) = best_offset {
			self.seek_bytes(SeekFrom::Start(off)).map_err(OggReadError::ReadError)?;
		}
		Ok(best_absgp)
	}

	/// From byte offset `from`, scans forward (bounded by `limit`) for
	/// the first page matching `serial`, returning its start offset and
	/// granule position without disturbing buffered packet state.
	fn find_page_at_or_after(&mut self, from :u64, serial :Option<u32>, limit :u64)
			-> Result<Option<(u64, u64)>, OggReadError> {
		self.inner.seek(SeekFrom::Start(from)).map_err(OggReadError::ReadError)?;
		const MAX_PAGES_SCANNED :u32 = 16;
		for _ in 0 .. MAX_PAGES_SCANNED {
			let pos_before = self.inner.seek(SeekFrom::Current(0)).map_err(OggReadError::ReadError)?;
			if pos_before >= limit {
				return Ok(None);
			}
			let (page, waste) = match find_and_read_page(&mut self.inner) {
				Ok(res) => res,
				Err(_) => return Ok(None),
			};
			let page_start = pos_before + waste;
			if serial.map_or(true, |s| s == page.stream_serial) {
				return Ok(Some((page_start, page.absgp)));
			}
		}
		Ok(None)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::io::Cursor;

	fn build_page(serial :u32, seq :u32, absgp :u64, flags :u8, payload :&[u8]) -> Vec<u8> {
		use ogg::crc::update_crc;
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
		hdr.push(0);
		hdr.push(flags);
		hdr.extend_from_slice(&absgp.to_le_bytes());
		hdr.extend_from_slice(&serial.to_le_bytes());
		hdr.extend_from_slice(&seq.to_le_bytes());
		hdr.extend_from_slice(&[0, 0, 0, 0]);
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
	fn test_single_page_single_packet() {
		let payload = b"a lone vorbis packet";
		let bytes = build_page(1, 0, 5, 0x2 | 0x4, payload);
		let mut rdr = PacketReader::new(Cursor::new(bytes));
		let pck = rdr.read_packet().unwrap().unwrap();
		assert_eq!(pck.data, payload);
		assert_eq!(pck.stream_serial(), 1);
		assert!(pck.last_in_page());
		assert!(pck.last_in_stream());
		assert!(rdr.read_packet().unwrap().is_none());
	}

	#[test]
	fn test_packet_spanning_two_pages() {
		let part_a = vec![0x41u8; 255];
		let part_b = vec![0x42u8; 10];
		let mut page1 = Vec::new();
		page1.extend_from_slice(&part_a);
		let mut page2 = Vec::new();
		page2.extend_from_slice(&part_b);

		let mut bytes = build_page(9, 0, 0, 0x2, &page1);
		bytes.extend_from_slice(&build_page(9, 1, 265, 0x1 | 0x4, &page2));

		let mut rdr = PacketReader::new(Cursor::new(bytes));
		let pck = rdr.read_packet().unwrap().unwrap();
		assert_eq!(pck.data.len(), 265);
		assert!(pck.last_in_stream());
		assert!(pck.is_continuation());
		assert!(!pck.is_resync());
	}

	#[test]
	fn test_single_page_packet_is_not_continuation() {
		let payload = b"a lone vorbis packet";
		let bytes = build_page(1, 0, 5, 0x2 | 0x4, payload);
		let mut rdr = PacketReader::new(Cursor::new(bytes));
		let pck = rdr.read_packet().unwrap().unwrap();
		assert!(!pck.is_continuation());
		assert!(!pck.is_resync());
	}

	#[test]
	fn test_orphaned_continuation_flags_resync() {
		// A page claiming to continue a packet we never started.
		let payload = b"orphaned continuation data";
		let bytes = build_page(5, 0, 0, 0x1 | 0x4, payload);
		let mut rdr = PacketReader::new(Cursor::new(bytes));
		let pck = rdr.read_packet().unwrap().unwrap();
		assert!(pck.is_resync());
	}

	#[test]
	fn test_dropped_continuation_flags_resync_on_next_packet() {
		// Page 1 leaves a packet unterminated (no continuation on the
		// next page), so its bytes must be dropped and the packet
		// that does complete must come back flagged as a resync.
		let part_a = vec![0x41u8; 255];
		let part_b = vec![0x42u8; 3];
		let mut bytes = build_page(2, 0, 0, 0x2, &part_a);
		bytes.extend_from_slice(&build_page(2, 1, 3, 0x4, &part_b));
		let mut rdr = PacketReader::new(Cursor::new(bytes));
		let pck = rdr.read_packet().unwrap().unwrap();
		assert_eq!(pck.data, part_b);
		assert!(pck.is_resync());
		assert!(!pck.is_continuation());
	}
}
