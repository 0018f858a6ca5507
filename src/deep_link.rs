//! # Deep-Link Codec
//!
//! Poll entry points are shared as `https://t.me/<bot>?start=<token>` links.
//! The token carries a kind tag and one or two numeric ids joined with `-`
//! (`t-<teacher>-<group>` or `g-<group>`), encoded as URL-safe base64 without
//! padding so it fits Telegram's start-parameter alphabet.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::poll_errors::DecodeError;

/// Separator between the kind tag and the ids
pub const DELIMITER: char = '-';

/// Entry-point kind carried by a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeepLinkKind {
    Teacher,
    Group,
}

impl DeepLinkKind {
    pub fn tag(self) -> &'static str {
        match self {
            DeepLinkKind::Teacher => "t",
            DeepLinkKind::Group => "g",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "t" => Some(DeepLinkKind::Teacher),
            "g" => Some(DeepLinkKind::Group),
            _ => None,
        }
    }

    /// Number of ids the kind carries
    pub fn id_count(self) -> usize {
        match self {
            DeepLinkKind::Teacher => 2,
            DeepLinkKind::Group => 1,
        }
    }
}

/// Decoded entry point. Ids are database keys and therefore non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeepLink {
    Teacher { teacher_id: i64, group_id: i64 },
    Group { group_id: i64 },
}

impl DeepLink {
    pub fn kind(&self) -> DeepLinkKind {
        match self {
            DeepLink::Teacher { .. } => DeepLinkKind::Teacher,
            DeepLink::Group { .. } => DeepLinkKind::Group,
        }
    }

    pub fn ids(&self) -> Vec<i64> {
        match *self {
            DeepLink::Teacher {
                teacher_id,
                group_id,
            } => vec![teacher_id, group_id],
            DeepLink::Group { group_id } => vec![group_id],
        }
    }
}

/// Encode a deep link into an opaque start token
pub fn encode(link: &DeepLink) -> String {
    let mut payload = link.kind().tag().to_string();
    for id in link.ids() {
        payload.push(DELIMITER);
        payload.push_str(&id.to_string());
    }
    URL_SAFE_NO_PAD.encode(payload)
}

/// Decode a start token. Any malformed input yields a `DecodeError`.
pub fn decode(token: &str) -> Result<DeepLink, DecodeError> {
    let token = token.trim().trim_end_matches('=');
    if token.is_empty() {
        return Err(DecodeError::Empty);
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| DecodeError::Encoding(e.to_string()))?;
    let payload = String::from_utf8(bytes).map_err(|_| DecodeError::Utf8)?;

    let mut parts = payload.split(DELIMITER);
    let tag = parts.next().unwrap_or_default();
    let kind = DeepLinkKind::from_tag(tag).ok_or_else(|| DecodeError::UnknownKind(tag.to_string()))?;

    let ids = parts
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| DecodeError::InvalidId(part.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match (kind, ids.as_slice()) {
        (DeepLinkKind::Teacher, &[teacher_id, group_id]) => Ok(DeepLink::Teacher {
            teacher_id,
            group_id,
        }),
        (DeepLinkKind::Group, &[group_id]) => Ok(DeepLink::Group { group_id }),
        _ => Err(DecodeError::Arity {
            kind: tag.to_string(),
            expected: kind.id_count(),
            found: ids.len(),
        }),
    }
}

/// Shareable link that opens the bot with the given entry point
pub fn start_link(bot_username: &str, link: &DeepLink) -> String {
    format!("https://t.me/{bot_username}?start={}", encode(link))
}
