// Vorbis decoder written in Rust
//
// Copyright (c) 2016 est31 <MTest31@outlook.com>
// and contributors. All rights reserved.
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
CRC-32 checksum used by the Ogg page framing layer.

The polynomial is `0x04C11DB7`, initial value `0`, no input or
output reflection, no final xor -- this is *not* the same
polynomial as the more common CRC-32 (zip/png/ethernet) checksum.
*/

/// Precomputed lookup table for the Ogg CRC-32 polynomial
static CRC_LOOKUP_ARRAY :[u32; 256] = generate_lookup_array();

const fn generate_lookup_array() -> [u32; 256] {
	let mut array = [0u32; 256];
	let mut i = 0;
	while i < 256 {
		array[i] = calc_crc(i as u32);
		i += 1;
	}
	array
}

const fn calc_crc(idx :u32) -> u32 {
	let mut r :u32 = idx << 24;
	let mut j = 0;
	while j < 8 {
		r = if (r & 0x8000_0000) != 0 {
			(r << 1) ^ 0x04c1_1db7
		} else {
			r << 1
		};
		j += 1;
	}
	r
}

/// Updates a running CRC-32 (Ogg variant) with the given data.
///
/// The returned value can be fed back in as `crc` to process more data.
pub fn update_crc(crc :u32, array :&[u8]) -> u32 {
	let mut crc = crc;
	for &b in array {
		crc = (crc << 8) ^ CRC_LOOKUP_ARRAY[(((crc >> 24) & 0xff) ^ b as u32) as usize];
	}
	crc
}

#[test]
fn test_crc_lookup_array() {
	// A couple of spot checks against the values libogg's ogg_page_checksum_set
	// table produces for the same polynomial.
	assert_eq!(CRC_LOOKUP_ARRAY[0], 0x0000_0000);
	assert_eq!(CRC_LOOKUP_ARRAY[1], 0x04c1_1db7);
	assert_eq!(CRC_LOOKUP_ARRAY[255], 0xb1f0_40e1);
}

#[test]
fn test_update_crc_empty() {
	assert_eq!(update_crc(0, &[]), 0);
}
