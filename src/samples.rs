// Vorbis decoder written in Rust
//
// Copyright (c) 2019 est31 <MTest31@outlook.com>
// and contributors. All rights reserved.
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
Traits for sample formats
*/

/// Trait for a packet of multiple samples
pub trait Samples {
	fn num_samples(&self) -> usize;
	fn truncate(&mut self, limit :usize);
	/// Drops the first `count` samples of each channel, shifting the
	/// rest down. Used to discard the pre-roll samples of the first
	/// audio packet of a logical stream, or after a seek.
	fn truncate_begin(&mut self, count :usize);
	fn from_floats(floats :Vec<Vec<f32>>) -> Self;
}

impl<S :Sample> Samples for Vec<Vec<S>> {
	fn num_samples(&self) -> usize {
		self[0].len()
	}
	fn truncate(&mut self, limit :usize) {
		for ch in self.iter_mut() {
			if limit < ch.len() {
				ch.truncate(limit);
			}
		}
	}
	fn truncate_begin(&mut self, count :usize) {
		for ch in self.iter_mut() {
			let count = count.min(ch.len());
			ch.drain(0 .. count);
		}
	}

	fn from_floats(floats :Vec<Vec<f32>>) -> Self {
		floats.into_iter()
			.map(|samples| {
				samples.into_iter()
					.map(S::from_float)
					.collect()
			}).collect()
	}
}

/// A packet of multi-channel interleaved samples
pub struct InterleavedSamples<S :Sample> {
	pub samples :Vec<S>,
	pub channel_count :usize,
}

impl<S :Sample> Samples for InterleavedSamples<S> {
	fn num_samples(&self) -> usize {
		self.samples.len() / self.channel_count
	}
	fn truncate(&mut self, limit :usize) {
		self.samples.truncate(limit * self.channel_count);
	}
	fn truncate_begin(&mut self, count :usize) {
		let count = count.min(self.num_samples());
		self.samples.drain(0 .. count * self.channel_count);
	}
	fn from_floats(floats :Vec<Vec<f32>>) -> Self {
		let channel_count = floats.len();
		// Note that a channel count of 0 is forbidden
		// by the spec and the header decoding code already
		// checks for that.
		assert!(floats.len() > 0);
		let samples_interleaved = if channel_count == 1 {
			// Because decoded_pck[0] doesn't work...
			<Vec<Vec<S>> as Samples>::from_floats(floats).into_iter().next().unwrap()
		} else {
			let len = floats[0].len();
			let mut samples = Vec::with_capacity(len * channel_count);
			for i in 0 .. len {
				for ref chan in floats.iter() {
					samples.push(S::from_float(chan[i]));
				}
			}
			samples
		};
		Self {
			samples : samples_interleaved,
			channel_count,
		}
	}
}

/// Trait representing a single sample
pub trait Sample {
	fn from_float(fl :f32) -> Self;
}

impl Sample for f32 {
	fn from_float(fl :f32) -> Self {
		fl
	}
}

/// The magnitude samples are clamped to when clipping is enabled.
///
/// Matches the value libvorbis itself clamps to (just under 1.0,
/// so that converting onward to a 16 bit integer never overflows).
pub const CLIP_LIMIT :f32 = 0.99999994;

/// Clamps a single sample to `[-CLIP_LIMIT, CLIP_LIMIT]`.
///
/// Returns the (possibly unchanged) sample and whether clamping
/// actually changed it, so callers can maintain a sticky
/// "has this stream ever clipped" flag.
pub fn clip_sample(x :f32) -> (f32, bool) {
	if x > CLIP_LIMIT {
		(CLIP_LIMIT, true)
	} else if x < -CLIP_LIMIT {
		(-CLIP_LIMIT, true)
	} else {
		(x, false)
	}
}

impl Sample for i16 {
	fn from_float(fl :f32) -> Self {
		let fl = fl * 32768.0;
		if fl > 32767. {
			32767
		} else if fl < -32768. {
			-32768
		} else {
			fl as i16
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_truncate_begin_multi_channel() {
		let mut pck :Vec<Vec<f32>> = vec![
			vec![1.0, 2.0, 3.0, 4.0],
			vec![5.0, 6.0, 7.0, 8.0],
		];
		pck.truncate_begin(2);
		assert_eq!(pck, vec![vec![3.0, 4.0], vec![7.0, 8.0]]);
	}

	#[test]
	fn test_truncate_begin_past_end_clamps() {
		let mut pck :Vec<Vec<f32>> = vec![vec![1.0, 2.0]];
		pck.truncate_begin(10);
		assert_eq!(pck, vec![Vec::<f32>::new()]);
	}

	#[test]
	fn test_truncate_begin_interleaved() {
		let mut pck = InterleavedSamples {
			samples : vec![1.0f32, 10.0, 2.0, 20.0, 3.0, 30.0],
			channel_count : 2,
		};
		pck.truncate_begin(1);
		assert_eq!(pck.samples, vec![2.0, 20.0, 3.0, 30.0]);
		assert_eq!(pck.num_samples(), 2);
	}

	#[test]
	fn test_clip_sample_within_range_unchanged() {
		assert_eq!(clip_sample(0.5), (0.5, false));
	}

	#[test]
	fn test_clip_sample_clamps_both_directions() {
		assert_eq!(clip_sample(1.5), (CLIP_LIMIT, true));
		assert_eq!(clip_sample(-1.5), (-CLIP_LIMIT, true));
	}
}
