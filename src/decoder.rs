// Vorbis decoder written in Rust
//
// Copyright (c) 2016 est31 <MTest31@outlook.com>
// and contributors. All rights reserved.
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
Top level decoder

This module ties the Ogg demultiplexer (`ogg`) together with the
Vorbis header and audio packet decoders (`header`, `audio`) into the
single-stream decoding surface most callers want: open a byte source,
pull out PCM samples, optionally seek.

It supersedes the old `inside_ogg` module's `OggStreamReader` /
`SeekableOggStreamReader` pair, generalizing their state machine to
run on the in-house `ogg` module instead of an external crate, to
produce `f32` samples, and to track clipping.
*/

use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use error::{Error, ForeignCodec};
use header::{self, CommentHeader, IdentHeader, SetupHeader};
use audio::{PreviousWindowRight, read_audio_packet_generic, get_decoded_sample_count};
use ogg::{Packet, PacketReader};
use samples::{Samples, InterleavedSamples, clip_sample};
use tags::Tags;

/// Where a `seek_samples`/`seek_time` offset is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
	Start,
	Current,
	End,
}

enum DecoderState {
	Processing,
	Finished,
}

/// Decodes a single Vorbis logical stream out of an Ogg byte source.
///
/// Only the first logical stream found is decoded; pages belonging to
/// other multiplexed streams are read (to keep the container framing
/// intact) and otherwise ignored, matching the single-stream scope of
/// this crate.
pub struct VorbisDecoder<T> {
	rdr :PacketReader<T>,
	pwr :PreviousWindowRight,

	stream_serial :u32,
	ident_hdr :IdentHeader,
	tags :Tags,
	setup_hdr :SetupHeader,

	state :DecoderState,
	skip_count :u64,
	start_absgp :u64,
	cur_absgp :u64,
	next_packet :Option<Packet>,

	clip_samples :bool,
	has_clipped :bool,

	total_samples :Option<u64>,
}

/// Inspects the start of a header packet for the capture pattern of a
/// sibling Xiph codec, so a caller gets told "this is Opus" rather
/// than a generic corruption error.
fn detect_foreign_codec(data :&[u8]) -> Option<ForeignCodec> {
	const CHECKS :&[(&[u8], ForeignCodec)] = &[
		(b"OpusHead", ForeignCodec::Opus),
		(b"\x7FFLAC", ForeignCodec::Flac),
		(b"Speex   ", ForeignCodec::Speex),
		(b"\x80theora", ForeignCodec::Theora),
		(b"fishead\0", ForeignCodec::Skeleton),
	];
	for &(pat, kind) in CHECKS {
		if data.len() >= pat.len() && &data[.. pat.len()] == pat {
			return Some(kind);
		}
	}
	None
}

fn read_ident_header(data :&[u8]) -> Result<IdentHeader, Error> {
	match header::read_header_ident(data) {
		Ok(hdr) => Ok(hdr),
		Err(header::HeaderReadError::NotVorbisHeader) => {
			match detect_foreign_codec(data) {
				Some(kind) => Err(Error::NotVorbis { kind }),
				None => Err(Error::Corrupt("first packet is neither Vorbis nor a recognized sibling codec")),
			}
		},
		Err(e) => Err(Error::from(e)),
	}
}

fn expect_packet<T :Read>(rdr :&mut PacketReader<T>, stream_serial :u32) -> Result<Packet, Error> {
	loop {
		let pck = rdr.read_packet()?.ok_or(Error::Truncated)?;
		if pck.stream_serial() == stream_serial {
			return Ok(pck);
		}
	}
}

impl<T :Read> VorbisDecoder<T> {
	/// Opens a Vorbis stream, reading and validating all three header
	/// packets. This is the only point at which header corruption is
	/// always fatal -- once past it, audio packet damage is recovered
	/// from by windowing the affected block to silence.
	pub fn open(source :T) -> Result<Self, Error> {
		let mut rdr = PacketReader::new(source);

		// AwaitIdHeader
		let ident_packet = rdr.read_packet()?.ok_or(Error::Truncated)?;
		let stream_serial = ident_packet.stream_serial();
		let ident_hdr = read_ident_header(&ident_packet.data)?;

		// AwaitComments
		let comment_packet = expect_packet(&mut rdr, stream_serial)?;
		let comment_hdr :CommentHeader = header::read_header_comment(&comment_packet.data)?;

		// AwaitSetup
		let setup_packet = expect_packet(&mut rdr, stream_serial)?;
		let setup_hdr = header::read_header_setup(&setup_packet.data,
			ident_hdr.audio_channels, (ident_hdr.blocksize_0, ident_hdr.blocksize_1))?;

		// The first audio packet must begin on a fresh page.
		rdr.delete_unread_packets();

		let mut decoder = VorbisDecoder {
			rdr,
			pwr : PreviousWindowRight::new(),
			stream_serial,
			tags : Tags::from_comment_header(&comment_hdr),
			ident_hdr,
			setup_hdr,
			state : DecoderState::Finished,
			skip_count : 0,
			start_absgp : 0,
			cur_absgp : 0,
			next_packet : None,
			clip_samples : true,
			has_clipped : false,
			total_samples : None,
		};

		// Decoding (state machine enters here; Finished above is
		// overwritten as soon as we see there is more than one
		// audio packet to decode)
		let first_packet = loop {
			match decoder.rdr.read_packet()? {
				Some(pck) if pck.stream_serial() == stream_serial => break pck,
				// A packet from a foreign multiplexed stream: skip it,
				// matching expect_packet's handling of header packets
				// above, rather than reporting an empty stream.
				Some(_) => continue,
				None => {
					decoder.total_samples = Some(0);
					return Ok(decoder);
				},
			}
		};
		if first_packet.last_in_stream() {
			decoder.total_samples = Some(0);
			return Ok(decoder);
		}
		read_audio_packet_generic::<Vec<Vec<f32>>>(&decoder.ident_hdr, &decoder.setup_hdr,
			&first_packet.data, &mut decoder.pwr)?;
		decoder.load_second_audio_packet()?;

		Ok(decoder)
	}

	fn load_second_audio_packet(&mut self) -> Result<(), Error> {
		let second_packet = expect_packet(&mut self.rdr, self.stream_serial)?;

		if second_packet.last_in_page() {
			let n = get_decoded_sample_count(&self.ident_hdr, &self.setup_hdr, &second_packet.data)? as u64;
			let skip_count = n.saturating_sub(second_packet.absgp_page());
			let start_absgp = second_packet.absgp_page().saturating_sub(n);
			self.skip_count = skip_count;
			self.start_absgp = start_absgp;
			self.cur_absgp = start_absgp;
		}
		self.state = DecoderState::Processing;
		self.next_packet = Some(second_packet);
		Ok(())
	}

	fn next_decoded_generic<S :Samples>(&mut self) -> Result<Option<S>, Error> {
		if let DecoderState::Finished = self.state {
			return Ok(None);
		}
		let pck = if let Some(pck) = self.next_packet.take() {
			pck
		} else {
			expect_packet(&mut self.rdr, self.stream_serial)?
		};
		let mut decoded :S = read_audio_packet_generic(&self.ident_hdr, &self.setup_hdr,
			&pck.data, &mut self.pwr)?;

		let skip = self.skip_count.min(decoded.num_samples() as u64);
		self.skip_count -= skip;
		decoded.truncate_begin(skip as usize);

		if pck.last_in_stream() {
			if self.skip_count == 0 {
				let truncate_size = (self.cur_absgp + decoded.num_samples() as u64)
					.saturating_sub(pck.absgp_page());
				decoded.truncate(truncate_size as usize);
			}
			self.state = DecoderState::Finished;
		}

		self.cur_absgp += decoded.num_samples() as u64;
		if pck.last_in_page() {
			self.cur_absgp = pck.absgp_page();
		}
		if let DecoderState::Finished = self.state {
			self.total_samples = Some(self.cur_absgp);
		}

		Ok(Some(decoded))
	}

	/// Decodes the next audio packet as per-channel `f32` sample
	/// vectors, applying clipping if enabled. Returns `None` at the
	/// end of the logical stream.
	pub fn read_channels(&mut self) -> Result<Option<Vec<Vec<f32>>>, Error> {
		let pck = match self.next_decoded_generic::<Vec<Vec<f32>>>()? {
			Some(p) => p,
			None => return Ok(None),
		};
		Ok(Some(self.apply_clipping(pck)))
	}

	fn apply_clipping(&mut self, mut channels :Vec<Vec<f32>>) -> Vec<Vec<f32>> {
		if !self.clip_samples {
			return channels;
		}
		let mut clipped_any = false;
		for ch in channels.iter_mut() {
			for s in ch.iter_mut() {
				let (clamped, clipped) = clip_sample(*s);
				*s = clamped;
				clipped_any |= clipped;
			}
		}
		if clipped_any {
			self.has_clipped = true;
		}
		channels
	}

	/// Decodes the next audio packet into `out`, interleaved across
	/// channels, and returns the number of frames written. `len(out)`
	/// must be a multiple of `channels()`.
	///
	/// Returns `Ok(0)` at the end of the logical stream -- per the
	/// error policy, end of stream is informational, not an error.
	pub fn read(&mut self, out :&mut [f32]) -> Result<usize, Error> {
		let channels = self.channels() as usize;
		if out.len() % channels != 0 {
			return Err(Error::InvalidArgument("output buffer length is not a multiple of the channel count"));
		}
		let pck = match self.next_decoded_generic::<InterleavedSamples<f32>>()? {
			Some(p) => p,
			None => return Ok(0),
		};
		let frames = pck.num_samples().min(out.len() / channels);
		let mut samples = pck.samples;
		if self.clip_samples {
			let mut clipped_any = false;
			for s in samples.iter_mut() {
				let (clamped, clipped) = clip_sample(*s);
				*s = clamped;
				clipped_any |= clipped;
			}
			if clipped_any {
				self.has_clipped = true;
			}
		}
		out[.. frames * channels].copy_from_slice(&samples[.. frames * channels]);
		Ok(frames)
	}

	pub fn channels(&self) -> u8 {
		self.ident_hdr.audio_channels
	}
	pub fn sample_rate(&self) -> u32 {
		self.ident_hdr.audio_sample_rate
	}
	pub fn bitrate_upper(&self) -> i32 {
		self.ident_hdr.bitrate_maximum
	}
	pub fn bitrate_nominal(&self) -> i32 {
		self.ident_hdr.bitrate_nominal
	}
	pub fn bitrate_lower(&self) -> i32 {
		self.ident_hdr.bitrate_minimum
	}
	pub fn total_samples(&self) -> Option<u64> {
		self.total_samples
	}
	pub fn sample_position(&self) -> u64 {
		self.cur_absgp
	}
	pub fn is_end_of_stream(&self) -> bool {
		matches!(self.state, DecoderState::Finished)
	}
	pub fn has_clipped(&self) -> bool {
		self.has_clipped
	}
	pub fn clip_samples(&self) -> bool {
		self.clip_samples
	}
	pub fn set_clip_samples(&mut self, clip :bool) {
		self.clip_samples = clip;
	}
	pub fn tags(&self) -> &Tags {
		&self.tags
	}
}

impl<T :Read + Seek> VorbisDecoder<T> {
	/// Seeks to an absolute, forward-from-current, or backward-from-end
	/// sample position, with sample granularity.
	pub fn seek_samples(&mut self, n :i64, origin :SeekOrigin) -> Result<(), Error> {
		let target = match origin {
			SeekOrigin::Start => {
				if n < 0 {
					return Err(Error::InvalidArgument("negative seek position"));
				}
				n as u64
			},
			SeekOrigin::Current => {
				(self.cur_absgp as i64).saturating_add(n).max(0) as u64
			},
			SeekOrigin::End => {
				let total = self.discover_total_samples()?;
				(total as i64).saturating_add(n).max(0) as u64
			},
		};
		self.seek_absolute_sample(target)
	}

	/// Returns the stream's total sample count, discovering it without
	/// a full decode if it isn't already known: seeks to the end of the
	/// byte source and bisects backward for the logical stream's last
	/// page, whose granule position is the sample count. Caches the
	/// result once found.
	pub fn discover_total_samples(&mut self) -> Result<u64, Error> {
		if let Some(n) = self.total_samples {
			return Ok(n);
		}
		let end = self.rdr.find_end_of_logical_stream()?.ok_or(Error::NotSeekable)?;
		let granule = self.rdr.seek_absgp_new(u64::MAX, Some(self.stream_serial), 0 .. end)?
			.ok_or(Error::NotSeekable)?;
		self.total_samples = Some(granule);
		Ok(granule)
	}

	/// Seeks to an absolute, forward-from-current, or backward-from-end
	/// time position, converting via the stream's sample rate.
	pub fn seek_time(&mut self, t :Duration, origin :SeekOrigin) -> Result<(), Error> {
		let samples = (t.as_secs_f64() * self.sample_rate() as f64).round() as i64;
		self.seek_samples(samples, origin)
	}

	fn seek_absolute_sample(&mut self, absgp :u64) -> Result<(), Error> {
		self.pwr = PreviousWindowRight::new();
		let end = self.rdr.find_end_of_logical_stream()?.ok_or(Error::NotSeekable)?;
		// Pre-roll by one long block so the decoded output at the
		// target position has valid overlap-add context.
		let target_absgp = absgp.saturating_sub(1u64 << self.ident_hdr.blocksize_1);
		let seeked_absgp = self.rdr.seek_absgp_new(target_absgp, Some(self.stream_serial), 0 .. end)?;

		let first_packet = match self.rdr.read_packet()?.and_then(|pck| {
			if pck.stream_serial() == self.stream_serial {
				Some(pck)
			} else {
				self.next_packet = Some(pck);
				None
			}
		}) {
			None => {
				self.state = DecoderState::Finished;
				if let Some(seeked_absgp) = seeked_absgp {
					self.cur_absgp = seeked_absgp;
				}
				self.total_samples = Some(self.cur_absgp);
				return Ok(());
			},
			Some(pck) => pck,
		};

		read_audio_packet_generic::<Vec<Vec<f32>>>(&self.ident_hdr, &self.setup_hdr,
			&first_packet.data, &mut self.pwr)?;
		let first_packet_samples = get_decoded_sample_count(&self.ident_hdr, &self.setup_hdr,
			&first_packet.data)? as u64;

		self.state = DecoderState::Processing;
		self.cur_absgp = absgp;
		match seeked_absgp {
			Some(seeked_absgp) => {
				self.skip_count = absgp.saturating_sub(seeked_absgp).saturating_sub(first_packet_samples);
			},
			None => {
				self.load_second_audio_packet()?;
				self.skip_count += absgp.saturating_sub(self.start_absgp);
			},
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_detect_foreign_codec() {
		assert_eq!(detect_foreign_codec(b"OpusHead\x01\x02"), Some(ForeignCodec::Opus));
		assert_eq!(detect_foreign_codec(b"\x7FFLAC\x01\x00"), Some(ForeignCodec::Flac));
		assert_eq!(detect_foreign_codec(b"Speex   1.2beta3"), Some(ForeignCodec::Speex));
		assert_eq!(detect_foreign_codec(b"\x01vorbis"), None);
	}
}
