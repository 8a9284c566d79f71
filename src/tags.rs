// Vorbis decoder written in Rust
//
// Copyright (c) 2016 est31 <MTest31@outlook.com>
// and contributors. All rights reserved.
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
Vendor string and user comments carried by the comment header.
*/

use header::CommentHeader;

/// The vendor string and user comments read from a stream's comment
/// header, parsed once when the stream is opened.
#[derive(Debug, Clone)]
pub struct Tags {
	/// Free-form string identifying the encoder that produced the stream.
	pub vendor :String,
	/// User comments, each already flattened to `"KEY=value"`, in the
	/// order they appeared in the comment header.
	pub comments :Vec<String>,
}

impl Tags {
	pub(crate) fn from_comment_header(hdr :&CommentHeader) -> Self {
		Tags {
			vendor : hdr.vendor.clone(),
			comments : hdr.comment_list.iter()
				.map(|(k, v)| format!("{}={}", k, v))
				.collect(),
		}
	}

	/// Looks up the first comment with the given key, case-insensitively,
	/// as is conventional for Vorbis comments (e.g. `"ARTIST"`, `"TITLE"`).
	pub fn get(&self, key :&str) -> Option<&str> {
		self.comments.iter().find_map(|c| {
			let mut parts = c.splitn(2, '=');
			let k = parts.next()?;
			let v = parts.next()?;
			if k.eq_ignore_ascii_case(key) {
				Some(v)
			} else {
				None
			}
		})
	}
}

#[test]
fn test_tags_get() {
	let tags = Tags {
		vendor : "test encoder".to_string(),
		comments : vec!["TITLE=Some Song".to_string(), "artist=Someone".to_string()],
	};
	assert_eq!(tags.get("title"), Some("Some Song"));
	assert_eq!(tags.get("ARTIST"), Some("Someone"));
	assert_eq!(tags.get("missing"), None);
}
