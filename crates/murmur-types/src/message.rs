//! Inbound message types.
//!
//! Messages arrive from the chat channel as loosely-typed records
//! ([`RawInboundMessage`]) and are validated into the tagged
//! [`InboundMessage`] before they reach the memory subsystem. A group
//! message always carries a group name; a direct message never does.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MessageError;

/// Which kind of conversation a message (and its partition) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerKind {
    Direct,
    Group,
}

impl SpeakerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakerKind::Direct => "direct",
            SpeakerKind::Group => "group",
        }
    }
}

impl fmt::Display for SpeakerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeakerKind {
    type Err = MessageError;

    /// Accepts the English tags and the channel's native labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "direct" | "Direct" | "private" | "私聊" => Ok(SpeakerKind::Direct),
            "group" | "Group" | "群聊" => Ok(SpeakerKind::Group),
            other => Err(MessageError::UnknownCategory(other.to_string())),
        }
    }
}

/// Wire shape of a message as delivered by the chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInboundMessage {
    pub id: String,
    pub category: String,
    pub speaker_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<String>,
}

/// A validated inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawInboundMessage", into = "RawInboundMessage")]
pub enum InboundMessage {
    Direct {
        id: String,
        speaker_name: String,
        text: String,
        media_ref: Option<String>,
    },
    Group {
        id: String,
        speaker_name: String,
        group_name: String,
        text: String,
        media_ref: Option<String>,
    },
}

impl InboundMessage {
    pub fn direct(
        id: impl Into<String>,
        speaker_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        InboundMessage::Direct {
            id: id.into(),
            speaker_name: speaker_name.into(),
            text: text.into(),
            media_ref: None,
        }
    }

    pub fn group(
        id: impl Into<String>,
        speaker_name: impl Into<String>,
        group_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        InboundMessage::Group {
            id: id.into(),
            speaker_name: speaker_name.into(),
            group_name: group_name.into(),
            text: text.into(),
            media_ref: None,
        }
    }

    /// Attach a media reference (e.g. an image path) to the message.
    pub fn with_media(mut self, media: impl Into<String>) -> Self {
        match &mut self {
            InboundMessage::Direct { media_ref, .. } | InboundMessage::Group { media_ref, .. } => {
                *media_ref = Some(media.into());
            }
        }
        self
    }

    pub fn kind(&self) -> SpeakerKind {
        match self {
            InboundMessage::Direct { .. } => SpeakerKind::Direct,
            InboundMessage::Group { .. } => SpeakerKind::Group,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            InboundMessage::Direct { id, .. } | InboundMessage::Group { id, .. } => id,
        }
    }

    pub fn speaker_name(&self) -> &str {
        match self {
            InboundMessage::Direct { speaker_name, .. }
            | InboundMessage::Group { speaker_name, .. } => speaker_name,
        }
    }

    pub fn group_name(&self) -> Option<&str> {
        match self {
            InboundMessage::Direct { .. } => None,
            InboundMessage::Group { group_name, .. } => Some(group_name),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            InboundMessage::Direct { text, .. } | InboundMessage::Group { text, .. } => text,
        }
    }

    pub fn media_ref(&self) -> Option<&str> {
        match self {
            InboundMessage::Direct { media_ref, .. } | InboundMessage::Group { media_ref, .. } => {
                media_ref.as_deref()
            }
        }
    }
}

impl TryFrom<RawInboundMessage> for InboundMessage {
    type Error = MessageError;

    fn try_from(raw: RawInboundMessage) -> Result<Self, Self::Error> {
        let media_ref = raw.media_ref.filter(|m| !m.trim().is_empty());
        match raw.category.parse::<SpeakerKind>()? {
            SpeakerKind::Direct => Ok(InboundMessage::Direct {
                id: raw.id,
                speaker_name: raw.speaker_name,
                text: raw.text,
                media_ref,
            }),
            SpeakerKind::Group => {
                let group_name = raw
                    .group_name
                    .filter(|g| !g.trim().is_empty())
                    .ok_or(MessageError::MissingGroupName)?;
                Ok(InboundMessage::Group {
                    id: raw.id,
                    speaker_name: raw.speaker_name,
                    group_name,
                    text: raw.text,
                    media_ref,
                })
            }
        }
    }
}

impl From<InboundMessage> for RawInboundMessage {
    fn from(message: InboundMessage) -> Self {
        match message {
            InboundMessage::Direct {
                id,
                speaker_name,
                text,
                media_ref,
            } => RawInboundMessage {
                id,
                category: SpeakerKind::Direct.to_string(),
                speaker_name,
                group_name: None,
                text,
                media_ref,
            },
            InboundMessage::Group {
                id,
                speaker_name,
                group_name,
                text,
                media_ref,
            } => RawInboundMessage {
                id,
                category: SpeakerKind::Group.to_string(),
                speaker_name,
                group_name: Some(group_name),
                text,
                media_ref,
            },
        }
    }
}

impl FromStr for InboundMessage {
    type Err = MessageError;

    /// Parse one JSON-encoded wire message.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: RawInboundMessage =
            serde_json::from_str(s).map_err(|e| MessageError::Malformed(e.to_string()))?;
        raw.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(category: &str, group_name: Option<&str>) -> RawInboundMessage {
        RawInboundMessage {
            id: "wxid_1".to_string(),
            category: category.to_string(),
            speaker_name: "Bob".to_string(),
            group_name: group_name.map(String::from),
            text: "hi".to_string(),
            media_ref: None,
        }
    }

    #[test]
    fn test_direct_message_validates() {
        let msg = InboundMessage::try_from(raw("direct", None)).unwrap();
        assert_eq!(msg.kind(), SpeakerKind::Direct);
        assert_eq!(msg.speaker_name(), "Bob");
        assert_eq!(msg.group_name(), None);
    }

    #[test]
    fn test_direct_message_drops_stray_group_name() {
        let msg = InboundMessage::try_from(raw("direct", Some("Book Club"))).unwrap();
        assert_eq!(msg.group_name(), None);
    }

    #[test]
    fn test_group_message_requires_group_name() {
        assert_eq!(
            InboundMessage::try_from(raw("group", None)),
            Err(MessageError::MissingGroupName)
        );
        assert_eq!(
            InboundMessage::try_from(raw("group", Some("   "))),
            Err(MessageError::MissingGroupName)
        );
    }

    #[test]
    fn test_native_category_labels_accepted() {
        let msg = InboundMessage::try_from(raw("群聊", Some("读书会"))).unwrap();
        assert_eq!(msg.kind(), SpeakerKind::Group);
        assert_eq!(msg.group_name(), Some("读书会"));

        let msg = InboundMessage::try_from(raw("私聊", None)).unwrap();
        assert_eq!(msg.kind(), SpeakerKind::Direct);
    }

    #[test]
    fn test_unknown_category_rejected() {
        assert_eq!(
            InboundMessage::try_from(raw("broadcast", None)),
            Err(MessageError::UnknownCategory("broadcast".to_string()))
        );
    }

    #[test]
    fn test_parse_from_json_line() {
        let msg: InboundMessage =
            r#"{"id":"1","category":"group","speaker_name":"Ann","group_name":"Team","text":"yo"}"#
                .parse()
                .unwrap();
        assert_eq!(msg, InboundMessage::group("1", "Ann", "Team", "yo"));
    }

    #[test]
    fn test_serde_uses_wire_shape() {
        let msg = InboundMessage::direct("7", "Carol", "hello").with_media("cat.jpg");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["category"], "direct");
        assert_eq!(json["media_ref"], "cat.jpg");
        assert!(json.get("group_name").is_none());

        let back: InboundMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = "not json".parse::<InboundMessage>().unwrap_err();
        assert!(matches!(err, MessageError::Malformed(_)));
    }
}
