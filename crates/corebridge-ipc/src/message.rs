use std::fmt;
use std::io::BufRead;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::IpcError;

/// Severity of a log entry. Serialized as its numeric tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Info,
    Error,
}

impl LogLevel {
    pub const fn tag(self) -> u8 {
        match self {
            LogLevel::Info => 2,
            LogLevel::Error => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, IpcError> {
        match tag {
            2 => Ok(LogLevel::Info),
            4 => Ok(LogLevel::Error),
            other => Err(IpcError::UnknownLevel(other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => f.write_str("info"),
            LogLevel::Error => f.write_str("error"),
        }
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.tag())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = u8::deserialize(deserializer)?;
        LogLevel::from_tag(tag).map_err(serde::de::Error::custom)
    }
}

/// One status or error event sent from the host to the observer.
///
/// `sender_id` is fixed for the lifetime of one pipe connection, so an
/// observer can tell apart several hosts writing to the same pipe name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: LogLevel,
    pub message: String,
    pub sender_id: Uuid,
    pub process_id: u32,
    pub timestamp: DateTime<Utc>,
}

impl LogMessage {
    pub fn new(level: LogLevel, message: impl Into<String>, sender_id: Uuid) -> Self {
        Self {
            level,
            message: message.into(),
            sender_id,
            process_id: std::process::id(),
            timestamp: Utc::now(),
        }
    }
}

/// Encode a message as a single `\n`-terminated JSON line.
///
/// JSON escapes control characters inside strings, so a frame never contains
/// a raw newline before its terminator.
pub fn encode_frame(message: &LogMessage) -> Result<Vec<u8>, IpcError> {
    let mut frame = serde_json::to_vec(message)?;
    frame.push(b'\n');
    Ok(frame)
}

/// Decode one line produced by [`encode_frame`]. Trailing `\r\n` is ignored.
pub fn decode_frame(line: &str) -> Result<LogMessage, IpcError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(IpcError::EmptyFrame);
    }
    Ok(serde_json::from_str(line)?)
}

/// Iterate over the frames of a blocking reader until EOF.
pub fn read_frames<R: BufRead>(reader: R) -> impl Iterator<Item = Result<LogMessage, IpcError>> {
    reader.lines().map(|line| decode_frame(&line?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_tags_match_wire_values() {
        assert_eq!(LogLevel::Info.tag(), 2);
        assert_eq!(LogLevel::Error.tag(), 4);
        assert_eq!(LogLevel::from_tag(2).unwrap(), LogLevel::Info);
        assert!(matches!(LogLevel::from_tag(3), Err(IpcError::UnknownLevel(3))));
    }

    #[test]
    fn frame_is_one_line_with_numeric_level() {
        let msg = LogMessage::new(LogLevel::Error, "line one\nline two", Uuid::new_v4());
        let frame = encode_frame(&msg).unwrap();

        assert_eq!(frame.last(), Some(&b'\n'));
        assert_eq!(frame.iter().filter(|b| **b == b'\n').count(), 1);

        let text = String::from_utf8(frame).unwrap();
        assert!(text.contains("\"level\":4"));

        let decoded = decode_frame(&text).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn decode_rejects_unknown_level() {
        let line = format!(
            r#"{{"level":7,"message":"x","sender_id":"{}","process_id":1,"timestamp":"2024-01-01T00:00:00Z"}}"#,
            Uuid::nil()
        );
        let err = decode_frame(&line).unwrap_err();
        assert!(err.to_string().contains("unknown log level tag: 7"), "{err}");
    }

    #[test]
    fn decode_rejects_blank_lines() {
        assert!(matches!(decode_frame("\r\n"), Err(IpcError::EmptyFrame)));
    }

    #[test]
    fn read_frames_splits_stream() {
        let sender = Uuid::new_v4();
        let mut stream = Vec::new();
        stream.extend(encode_frame(&LogMessage::new(LogLevel::Info, "started", sender)).unwrap());
        stream.extend(encode_frame(&LogMessage::new(LogLevel::Error, "failed", sender)).unwrap());

        let frames: Vec<LogMessage> = read_frames(stream.as_slice())
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].message, "started");
        assert_eq!(frames[1].level, LogLevel::Error);
        assert!(frames.iter().all(|f| f.sender_id == sender));
    }
}
