use tubedeck::app::App;
use tubedeck::model::CardDraft;
use tubedeck::pipeline::{generate, CardGenerator, DeckDraft, GenerateError, TranscriptFetcher};
use tubedeck::store::Store;
use tubedeck::study::Phase;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

// Full pipeline without the network: stub transcript and LLM stages, real
// store, then study the generated deck end to end.

struct StubFetcher;

impl TranscriptFetcher for StubFetcher {
    fn fetch(&self, _video_id: &str) -> Result<String, GenerateError> {
        Ok("a transcript about everyday english phrases".to_string())
    }
}

struct StubGenerator {
    cards: u32,
}

impl CardGenerator for StubGenerator {
    fn generate_deck(&self, _transcript: &str) -> Result<DeckDraft, GenerateError> {
        Ok(DeckDraft {
            title: "Everyday English".into(),
            summary: "Phrases you hear every day.".into(),
            cards: (1..=self.cards)
                .map(|i| CardDraft {
                    front: format!("문장 {}", i),
                    back: format!("sentence {}", i),
                })
                .collect(),
        })
    }
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

#[test]
fn generated_deck_is_persisted_and_studyable() {
    let mut store = Store::open_in_memory().unwrap();
    let generated = generate(
        "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        &StubFetcher,
        &StubGenerator { cards: 15 },
        &mut store,
    )
    .unwrap();

    assert_eq!(generated.session.title, "Everyday English");
    assert_eq!(generated.cards.len(), 15);

    // The deck round-trips through the store with ascending order preserved.
    let fetched = store.cards_for_session(&generated.session.id).unwrap();
    assert_eq!(fetched.len(), 15);
    for (i, card) in fetched.iter().enumerate() {
        assert_eq!(card.card_order, (i + 1) as u32);
        assert!(!card.mastered);
    }

    // Study it: ALL exposes every card; mastering the whole deck leaves
    // nothing for a needs-study pass.
    let session_id = generated.session.id.clone();
    let mut app = App::new(store, None);
    app.open_session(&session_id);
    app.handle_key(key(KeyCode::Char('a')));
    assert_eq!(app.study.filtered_len(), 15);

    for _ in 0..15 {
        app.handle_key(key(KeyCode::Left));
    }
    assert_eq!(app.study.phase(), Phase::Complete);
    assert_eq!(app.study.unknown_count(), 0);
    assert!(!app.study.can_select_unknown_only());
}

#[test]
fn invalid_url_leaves_store_untouched() {
    let mut store = Store::open_in_memory().unwrap();
    let err = generate(
        "https://example.com/not-youtube",
        &StubFetcher,
        &StubGenerator { cards: 5 },
        &mut store,
    )
    .unwrap_err();
    assert!(matches!(err, GenerateError::InvalidUrl));
    assert!(store.list_sessions().unwrap().is_empty());
}

#[test]
fn empty_llm_deck_is_an_error() {
    let mut store = Store::open_in_memory().unwrap();
    let err = generate(
        "https://youtu.be/dQw4w9WgXcQ",
        &StubFetcher,
        &StubGenerator { cards: 0 },
        &mut store,
    )
    .unwrap_err();
    assert!(matches!(err, GenerateError::LlmParseFailure));
    assert!(store.list_sessions().unwrap().is_empty());
}
