// Vorbis decoder written in Rust
//
// This example file is licensed
// under the CC-0 license:
// https://creativecommons.org/publicdomain/zero/1.0/

extern crate oxivorbis;
extern crate env_logger;

fn main() {
	env_logger::init();
	match run() {
		Ok(_) => (),
		Err(err) => println!("Error: {}", err),
	}
}

use std::env;
use oxivorbis::VorbisError;
use oxivorbis::VorbisDecoder;
use std::fs::File;
use std::time::Instant;

pub fn run() -> Result<(), VorbisError> {
	let file_path = env::args().nth(1).expect("No arg found. Please specify a file to open.");
	println!("Opening file: {}", file_path);
	let f = File::open(file_path).expect("Can't open file");

	let mut decoder = VorbisDecoder::open(f)?;

	println!("Sample rate: {}", decoder.sample_rate());

	let mut n = 0;
	let mut len_play = 0.0;
	let start_decode_time = Instant::now();
	while let Some(pck) = decoder.read_channels()? {
		n += 1;
		assert_eq!(pck.len(), decoder.channels() as usize);
		len_play += pck[0].len() as f32 / decoder.sample_rate() as f32;
	}
	let decode_duration = Instant::now() - start_decode_time;
	println!("The piece is {} s long ({} packets).", len_play, n);
	println!("Decoded in {} s.", decode_duration.as_secs() as f64 + (decode_duration.subsec_nanos() as f64) / 1_000_000_000.0);

	Ok(())
}
