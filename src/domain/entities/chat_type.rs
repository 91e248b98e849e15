//! Conversation kind.

use serde::{Deserialize, Serialize};

/// Kind of conversation a message or receipt belongs to.
///
/// On the wire the kind is an integer tag (`1` group, `2` direct); the lowercase
/// names are accepted on input as well. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ChatTypeRepr", into = "u8")]
pub enum ChatType {
    /// Multi-member group conversation.
    Group,
    /// One-to-one conversation.
    Direct,
}

impl ChatType {
    const GROUP_TAG: u8 = 1;
    const DIRECT_TAG: u8 = 2;

    /// Returns true for group conversations.
    #[must_use]
    pub const fn is_group(self) -> bool {
        matches!(self, Self::Group)
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Direct => "direct",
        }
    }
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ChatType> for u8 {
    fn from(value: ChatType) -> Self {
        match value {
            ChatType::Group => ChatType::GROUP_TAG,
            ChatType::Direct => ChatType::DIRECT_TAG,
        }
    }
}

impl TryFrom<u8> for ChatType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            Self::GROUP_TAG => Ok(Self::Group),
            Self::DIRECT_TAG => Ok(Self::Direct),
            other => Err(format!("unknown chat type tag {other}")),
        }
    }
}

impl std::str::FromStr for ChatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "group" => Ok(Self::Group),
            "direct" | "single" => Ok(Self::Direct),
            other => Err(format!("unknown chat type {other:?}")),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChatTypeRepr {
    Tag(u8),
    Name(String),
}

impl TryFrom<ChatTypeRepr> for ChatType {
    type Error = String;

    fn try_from(value: ChatTypeRepr) -> Result<Self, Self::Error> {
        match value {
            ChatTypeRepr::Tag(tag) => Self::try_from(tag),
            ChatTypeRepr::Name(name) => name.parse(),
        }
    }
}
