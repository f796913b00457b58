//! Channel naming rules.
//!
//! Channel names are registered once and never change. Each channel that
//! carries asynchronous calls owns exactly one reply stream, named by
//! appending [`ASYNC_REPLY_SUFFIX`].

use crate::error::ChannelNameError;

/// Suffix appended to a channel name to form its reply stream name.
pub const ASYNC_REPLY_SUFFIX: &str = "-ASYNC_REPLY";

/// Longest accepted channel name, in bytes.
pub const MAX_CHANNEL_NAME_LEN: usize = 128;

/// Reply stream shared by every asynchronous call on `channel`.
pub fn reply_stream_name(channel: &str) -> String {
    format!("{channel}{ASYNC_REPLY_SUFFIX}")
}

/// Returns true if `stream` names a reply stream.
pub fn is_reply_stream(stream: &str) -> bool {
    stream.len() > ASYNC_REPLY_SUFFIX.len() && stream.ends_with(ASYNC_REPLY_SUFFIX)
}

/// Check that `name` is usable as a channel identifier.
///
/// Accepted characters are ASCII letters, digits and `_ - . : /`. Names
/// that already look like a reply stream are refused so a channel can
/// never shadow another channel's reply stream.
pub fn validate_channel_name(name: &str) -> Result<(), ChannelNameError> {
    if name.is_empty() {
        return Err(ChannelNameError::Empty);
    }
    if name.len() > MAX_CHANNEL_NAME_LEN {
        return Err(ChannelNameError::TooLong {
            len: name.len(),
            max: MAX_CHANNEL_NAME_LEN,
        });
    }
    if let Some(ch) = name.chars().find(|ch| !is_channel_char(*ch)) {
        return Err(ChannelNameError::InvalidCharacter {
            name: name.to_string(),
            ch,
        });
    }
    if is_reply_stream(name) {
        return Err(ChannelNameError::ReservedSuffix(name.to_string()));
    }
    Ok(())
}

fn is_channel_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | ':' | '/')
}
