use serde::{Deserialize, Serialize};

/// One YouTube-sourced flashcard generation event and its metadata.
/// Created once by the generation pipeline; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub url: String,
    pub title: String,
    pub summary: String,
    pub created_at: String,
}

/// One front/back flashcard belonging to a session. `mastered` is the only
/// field that changes over the card's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub session_id: String,
    pub front: String,
    pub back: String,
    /// Positive, unique within a session, defines the display sequence.
    pub card_order: u32,
    #[serde(default)]
    pub mastered: bool,
}

/// Card content as produced by the language model, before it gets an id and
/// an order assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDraft {
    pub front: String,
    pub back: String,
}

/// Generate a random opaque token for session/card ids.
///
/// 32 hex chars from the system clock and a per-process counter are unique
/// enough for row keys without pulling in a uuid dependency.
pub fn new_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    format!("{:024x}{:04x}{:04x}", nanos, pid as u16, count as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_unique() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_card_serde_field_names() {
        let card = Card {
            id: "c1".into(),
            session_id: "s1".into(),
            front: "나는 믿어요".into(),
            back: "I believe".into(),
            card_order: 1,
            mastered: false,
        };
        let json = serde_json::to_value(&card).unwrap();
        // The wire shape uses `card_order` and a boolean `mastered`.
        assert_eq!(json["card_order"], 1);
        assert_eq!(json["mastered"], false);
    }

    #[test]
    fn test_card_mastered_defaults_false() {
        let json = r#"{"id":"c","session_id":"s","front":"f","back":"b","card_order":3}"#;
        let card: Card = serde_json::from_str(json).unwrap();
        assert!(!card.mastered);
        assert_eq!(card.card_order, 3);
    }

    #[test]
    fn test_session_roundtrip() {
        let session = Session {
            id: "s1".into(),
            url: "https://youtu.be/abc".into(),
            title: "for a while vs in a while".into(),
            summary: "usage notes".into(),
            created_at: "2025-01-01 10:00:00".into(),
        };
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(session, back);
    }
}
