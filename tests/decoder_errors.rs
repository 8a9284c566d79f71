// Vorbis decoder written in Rust
//
// This test file is licensed
// under the CC-0 license:
// https://creativecommons.org/publicdomain/zero/1.0/

//! End-to-end tests of `VorbisDecoder::open`'s error reporting. These
//! don't need a real Vorbis bitstream, only valid Ogg framing around
//! deliberately wrong or missing header packets.

extern crate oxivorbis;

use std::io::Cursor;
use oxivorbis::{VorbisDecoder, VorbisError};
use oxivorbis::error::ForeignCodec;

fn build_page(serial :u32, seq :u32, absgp :u64, flags :u8, payload :&[u8]) -> Vec<u8> {
	use oxivorbis::ogg::crc::update_crc;
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
fn empty_source_is_truncated() {
	let cursor = Cursor::new(Vec::<u8>::new());
	let err = VorbisDecoder::open(cursor).unwrap_err();
	assert!(matches!(err, VorbisError::Truncated));
}

#[test]
fn opus_first_packet_is_recognized() {
	let mut opus_ident = b"OpusHead".to_vec();
	opus_ident.extend_from_slice(&[1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
	let bytes = build_page(1, 0, 0, 0x2 | 0x4, &opus_ident);
	let cursor = Cursor::new(bytes);
	let err = VorbisDecoder::open(cursor).unwrap_err();
	match err {
		VorbisError::NotVorbis { kind } => assert_eq!(kind, ForeignCodec::Opus),
		other => panic!("expected NotVorbis(Opus), got {:?}", other),
	}
}

#[test]
fn garbage_first_packet_is_corrupt_not_a_panic() {
	// First byte's low bit set (header, not audio, per the Vorbis packet
	// type convention) but the six-byte codec tag isn't "vorbis" and
	// doesn't match any recognized sibling codec either.
	let bytes = build_page(1, 0, 0, 0x2 | 0x4, b"\x01garbage and more garbage past it");
	let cursor = Cursor::new(bytes);
	let err = VorbisDecoder::open(cursor).unwrap_err();
	assert!(matches!(err, VorbisError::Corrupt(_)));
}

#[test]
fn truncated_after_ident_header_is_reported() {
	// A well-formed identification header packet, followed by nothing:
	// comment and setup headers never arrive.
	let ident :&[u8] = &[0x01, 0x76, 0x6f, 0x72,
		0x62, 0x69, 0x73, 0x00, 0x00, 0x00, 0x00, 0x02,
		0x44, 0xac, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
		0x80, 0xb5, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
		0xb8, 0x01];

	let bytes = build_page(1, 0, 0, 0x2 | 0x4, ident);
	let cursor = Cursor::new(bytes);
	let err = VorbisDecoder::open(cursor).unwrap_err();
	assert!(matches!(err, VorbisError::Truncated) || matches!(err, VorbisError::Corrupt(_)) || matches!(err, VorbisError::Header(_)));
}
