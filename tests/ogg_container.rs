// Vorbis decoder written in Rust
//
// This test file is licensed
// under the CC-0 license:
// https://creativecommons.org/publicdomain/zero/1.0/

//! Black-box tests of the `ogg` container layer against its public
//! API, independent of anything Vorbis-specific.

extern crate oxivorbis;

use std::io::Cursor;
use oxivorbis::ogg::crc::update_crc;
use oxivorbis::ogg::page::{read_page, find_and_read_page};
use oxivorbis::ogg::PacketReader;

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
fn single_page_stream_round_trips() {
	let payload = b"an isolated ogg page";
	let bytes = build_page(1234, 0, 17, 0x2 | 0x4, payload);
	let mut cursor = Cursor::new(bytes);
	let page = read_page(&mut cursor).expect("page should parse");
	assert_eq!(page.stream_serial, 1234);
	assert_eq!(page.absgp, 17);
	assert!(page.first_page);
	assert!(page.last_page);
	assert_eq!(page.payload, payload);
}

#[test]
fn resync_skips_garbage_between_pages() {
	let mut bytes = vec![0u8; 37];
	bytes.extend_from_slice(&build_page(1, 0, 0, 0x2 | 0x4, b"after the junk"));
	let mut cursor = Cursor::new(bytes);
	let (page, waste) = find_and_read_page(&mut cursor).expect("should resync");
	assert_eq!(waste, 37);
	assert_eq!(page.payload, b"after the junk");
}

#[test]
fn multi_stream_packets_are_handed_out_in_arrival_order() {
	// Two logical streams, interleaved one page each.
	let mut bytes = Vec::new();
	bytes.extend_from_slice(&build_page(1, 0, 10, 0x2, b"stream one, page one"));
	bytes.extend_from_slice(&build_page(2, 0, 5, 0x2, b"stream two, page one"));
	bytes.extend_from_slice(&build_page(1, 1, 20, 0x4, b"stream one, last"));
	bytes.extend_from_slice(&build_page(2, 1, 15, 0x4, b"stream two, last"));

	let mut rdr = PacketReader::new(Cursor::new(bytes));

	let p1 = rdr.read_packet().unwrap().unwrap();
	assert_eq!(p1.stream_serial(), 1);
	assert_eq!(p1.data, b"stream one, page one");

	let p2 = rdr.read_packet().unwrap().unwrap();
	assert_eq!(p2.stream_serial(), 2);
	assert_eq!(p2.data, b"stream two, page one");

	let p3 = rdr.read_packet().unwrap().unwrap();
	assert_eq!(p3.stream_serial(), 1);
	assert!(p3.last_in_stream());

	let p4 = rdr.read_packet().unwrap().unwrap();
	assert_eq!(p4.stream_serial(), 2);
	assert!(p4.last_in_stream());

	assert!(rdr.read_packet().unwrap().is_none());
}

#[test]
fn packet_spanning_three_pages_reassembles() {
	let part_a = vec![0x10u8; 255];
	let part_b = vec![0x20u8; 255];
	let part_c = vec![0x30u8; 3];

	let mut bytes = Vec::new();
	bytes.extend_from_slice(&build_page(5, 0, 0, 0x2, &part_a));
	bytes.extend_from_slice(&build_page(5, 1, 0, 0x1, &part_b));
	bytes.extend_from_slice(&build_page(5, 2, 513, 0x1 | 0x4, &part_c));

	let mut rdr = PacketReader::new(Cursor::new(bytes));
	let pck = rdr.read_packet().unwrap().unwrap();
	assert_eq!(pck.data.len(), 255 + 255 + 3);
	assert_eq!(&pck.data[0 .. 255], &part_a[..]);
	assert_eq!(&pck.data[255 .. 510], &part_b[..]);
	assert_eq!(&pck.data[510 ..], &part_c[..]);
	assert!(pck.last_in_stream());
}

#[test]
fn corrupt_page_crc_is_reported() {
	let mut bytes = build_page(1, 0, 0, 0x2 | 0x4, b"tamper with me");
	let last = bytes.len() - 1;
	bytes[last] ^= 0xff;
	let mut cursor = Cursor::new(bytes);
	let err = read_page(&mut cursor).unwrap_err();
	assert!(matches!(err, oxivorbis::ogg::OggReadError::HashMismatch(_, _)));
}
