use crate::model::{new_id, Card, CardDraft, Session};
use crate::store::Store;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

/// The LLM only ever sees the first slice of a long transcript.
pub const TRANSCRIPT_CHAR_LIMIT: usize = 8000;

/// Attempts against a non-deterministic model before giving up.
const MAX_LLM_TRIES: u32 = 3;
const LLM_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("not a valid YouTube URL")]
    InvalidUrl,
    #[error("no transcript available: {0}")]
    TranscriptUnavailable(String),
    #[error("could not parse the model response into cards")]
    LlmParseFailure,
    #[error("card generation failed: {0}")]
    Unknown(String),
}

/// A deck as produced by the language model, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckDraft {
    pub title: String,
    pub summary: String,
    pub cards: Vec<CardDraft>,
}

/// A freshly generated and persisted session.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSession {
    pub session: Session,
    pub cards: Vec<Card>,
}

/// Fetches a video transcript given a video id.
pub trait TranscriptFetcher: Send {
    fn fetch(&self, video_id: &str) -> Result<String, GenerateError>;
}

/// Turns a transcript into a deck draft.
pub trait CardGenerator: Send {
    fn generate_deck(&self, transcript: &str) -> Result<DeckDraft, GenerateError>;
}

/// Pull the video id out of the usual YouTube URL shapes.
pub fn extract_video_id(url: &str) -> Option<String> {
    let patterns = [
        r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([^&\n?#]+)",
        r"youtube\.com/shorts/([^&\n?#]+)",
    ];
    for pattern in patterns {
        let re = Regex::new(pattern).expect("video id pattern");
        if let Some(caps) = re.captures(url) {
            return Some(caps[1].to_string());
        }
    }
    None
}

/// Run the full pipeline: URL → transcript → LLM → persisted session.
///
/// The store write happens last, so a failure anywhere leaves no partial
/// session behind.
pub fn generate(
    url: &str,
    fetcher: &dyn TranscriptFetcher,
    generator: &dyn CardGenerator,
    store: &mut Store,
) -> Result<GeneratedSession, GenerateError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(GenerateError::InvalidUrl);
    }
    let video_id = extract_video_id(url).ok_or(GenerateError::InvalidUrl)?;

    log::info!("fetching transcript for video {}", video_id);
    let transcript = fetcher.fetch(&video_id)?;
    if transcript.trim().is_empty() {
        return Err(GenerateError::TranscriptUnavailable(
            "empty transcript".into(),
        ));
    }

    log::info!("transcript length: {} chars", transcript.chars().count());
    let capped: String = transcript.chars().take(TRANSCRIPT_CHAR_LIMIT).collect();
    let draft = generator.generate_deck(&capped)?;
    if draft.cards.is_empty() {
        return Err(GenerateError::LlmParseFailure);
    }

    let session_id = new_id();
    let session = Session {
        id: session_id.clone(),
        url: url.to_string(),
        title: draft.title,
        summary: draft.summary,
        created_at: String::new(),
    };
    let cards: Vec<Card> = draft
        .cards
        .into_iter()
        .enumerate()
        .map(|(i, draft)| Card {
            id: new_id(),
            session_id: session_id.clone(),
            front: draft.front,
            back: draft.back,
            card_order: i as u32 + 1,
            mastered: false,
        })
        .collect();

    store
        .create_session_with_cards(&session, &cards)
        .map_err(|e| GenerateError::Unknown(e.to_string()))?;

    // Re-read the session row so created_at reflects what the store filled in.
    let session = store
        .get_session(&session_id)
        .map_err(|e| GenerateError::Unknown(e.to_string()))?
        .ok_or_else(|| GenerateError::Unknown("session vanished after insert".into()))?;

    log::info!("session {} created with {} cards", session.id, cards.len());
    Ok(GeneratedSession { session, cards })
}

// ---------------------------------------------------------------------------
// Transcript helper subprocess

/// Output contract of the transcript helper: one JSON object on stdout.
#[derive(Debug, Deserialize)]
struct TranscriptResult {
    success: bool,
    #[serde(default)]
    text: String,
    #[serde(default)]
    error: Option<String>,
}

/// Fetches transcripts by spawning an external helper command with the video
/// id as its final argument. The helper prints a single JSON object on
/// stdout; anything can be plugged in as long as it speaks that contract.
pub struct CommandTranscriptFetcher {
    command: Vec<String>,
}

impl CommandTranscriptFetcher {
    pub fn new(command_line: &str) -> Self {
        Self {
            command: command_line.split_whitespace().map(String::from).collect(),
        }
    }
}

impl TranscriptFetcher for CommandTranscriptFetcher {
    fn fetch(&self, video_id: &str) -> Result<String, GenerateError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| GenerateError::Unknown("empty transcript command".into()))?;

        let output = Command::new(program)
            .args(args)
            .arg(video_id)
            .output()
            .map_err(|e| {
                GenerateError::TranscriptUnavailable(format!("{}: {}", program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GenerateError::TranscriptUnavailable(
                stderr.trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_transcript_output(&stdout)
    }
}

/// Decode the helper's stdout JSON into transcript text.
fn parse_transcript_output(stdout: &str) -> Result<String, GenerateError> {
    let result: TranscriptResult = serde_json::from_str(stdout.trim())
        .map_err(|_| GenerateError::TranscriptUnavailable("unreadable helper output".into()))?;
    if result.success {
        Ok(result.text)
    } else {
        Err(GenerateError::TranscriptUnavailable(
            result.error.unwrap_or_else(|| "unknown".into()),
        ))
    }
}

// ---------------------------------------------------------------------------
// LLM card generation

const SYSTEM_PROMPT: &str = r#"You are an English learning expert. Analyze the given video transcript and produce English-learning flashcards.

Respond with JSON of this exact shape:
{
  "title": "the key English expressions this video teaches",
  "summary": "an explanation of the expressions being learned: what they mean, how their nuances differ, and when to use them. Focus on the learning points, not the video's story.",
  "cards": [
    { "front": "Korean sentence", "back": "English sentence" },
    ...
  ]
}

Rules:
1. Identify the core expressions the video teaches (phrases, idioms, grammar patterns).
2. Use the video's own example sentences as cards first, then add ten practice sentences using the same expressions.
3. front is Korean, back is English; phrase the Korean to follow the English sentence structure so it can be read straight through.
4. Order the cards by difficulty and learning flow.
5. Produce at least 15 cards.

Respond with JSON only, no other commentary."#;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Card generator backed by an OpenAI-compatible chat completions endpoint.
pub struct LlmCardGenerator {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmCardGenerator {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, GenerateError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| GenerateError::Unknown(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn request_once(&self, transcript: &str) -> Result<DeckDraft, GenerateError> {
        let user_content = format!(
            "Analyze this video transcript and generate English-learning flashcards:\n\n{}",
            transcript
        );
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_content,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| GenerateError::Unknown(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GenerateError::Unknown(format!(
                "model endpoint returned {}",
                response.status()
            )));
        }

        let chat: ChatResponse = response
            .json()
            .map_err(|e| GenerateError::Unknown(e.to_string()))?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or(GenerateError::LlmParseFailure)?;
        parse_deck_response(content)
    }
}

impl CardGenerator for LlmCardGenerator {
    fn generate_deck(&self, transcript: &str) -> Result<DeckDraft, GenerateError> {
        let mut last_err = GenerateError::Unknown("no attempts made".into());
        for attempt in 1..=MAX_LLM_TRIES {
            match self.request_once(transcript) {
                Ok(draft) => return Ok(draft),
                Err(e) => {
                    log::warn!("LLM request failed (attempt {}): {}", attempt, e);
                    last_err = e;
                    if attempt < MAX_LLM_TRIES {
                        std::thread::sleep(LLM_RETRY_DELAY);
                    }
                }
            }
        }
        Err(last_err)
    }
}

/// Parse the model's reply, tolerating a ``` fence around the JSON.
pub fn parse_deck_response(content: &str) -> Result<DeckDraft, GenerateError> {
    let json = strip_code_fences(content);
    serde_json::from_str(json).map_err(|_| GenerateError::LlmParseFailure)
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip an optional language tag on the opening fence line.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    body.trim().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("https://youtube.com/watch?v=abc123&t=10s"),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn test_extract_video_id_short_forms() {
        assert_eq!(
            extract_video_id("https://youtu.be/xyz789"),
            Some("xyz789".to_string())
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/e1"),
            Some("e1".to_string())
        );
        assert_eq!(
            extract_video_id("https://youtube.com/shorts/s1?feature=share"),
            Some("s1".to_string())
        );
    }

    #[test]
    fn test_extract_video_id_rejects_non_youtube() {
        assert_eq!(extract_video_id("https://vimeo.com/12345"), None);
        assert_eq!(extract_video_id("not a url"), None);
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_deck_response_fenced() {
        let content = r#"```json
{"title": "t", "summary": "s", "cards": [{"front": "f", "back": "b"}]}
```"#;
        let draft = parse_deck_response(content).unwrap();
        assert_eq!(draft.title, "t");
        assert_eq!(draft.cards.len(), 1);
        assert_eq!(draft.cards[0].front, "f");
    }

    #[test]
    fn test_parse_deck_response_bare_json() {
        let content = r#"{"title": "t", "summary": "s", "cards": []}"#;
        let draft = parse_deck_response(content).unwrap();
        assert!(draft.cards.is_empty());
    }

    #[test]
    fn test_parse_deck_response_garbage() {
        assert!(matches!(
            parse_deck_response("Sure! Here are your flashcards."),
            Err(GenerateError::LlmParseFailure)
        ));
    }

    struct StubFetcher(Result<String, GenerateError>);
    impl TranscriptFetcher for StubFetcher {
        fn fetch(&self, _video_id: &str) -> Result<String, GenerateError> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(GenerateError::TranscriptUnavailable("stub".into())),
            }
        }
    }

    struct StubGenerator(DeckDraft);
    impl CardGenerator for StubGenerator {
        fn generate_deck(&self, _transcript: &str) -> Result<DeckDraft, GenerateError> {
            Ok(self.0.clone())
        }
    }

    fn draft(n: usize) -> DeckDraft {
        DeckDraft {
            title: "title".into(),
            summary: "summary".into(),
            cards: (1..=n)
                .map(|i| CardDraft {
                    front: format!("앞 {}", i),
                    back: format!("back {}", i),
                })
                .collect(),
        }
    }

    #[test]
    fn test_generate_persists_session_and_cards() {
        let mut store = Store::open_in_memory().unwrap();
        let fetcher = StubFetcher(Ok("hello world transcript".into()));
        let generator = StubGenerator(draft(4));

        let generated = generate(
            "https://youtu.be/abc",
            &fetcher,
            &generator,
            &mut store,
        )
        .unwrap();

        assert_eq!(generated.cards.len(), 4);
        assert_eq!(
            generated.cards.iter().map(|c| c.card_order).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert!(!generated.session.created_at.is_empty());

        let stored = store.cards_for_session(&generated.session.id).unwrap();
        assert_eq!(stored, generated.cards);
    }

    #[test]
    fn test_generate_invalid_url() {
        let mut store = Store::open_in_memory().unwrap();
        let fetcher = StubFetcher(Ok("text".into()));
        let generator = StubGenerator(draft(1));
        assert!(matches!(
            generate("https://example.com/x", &fetcher, &generator, &mut store),
            Err(GenerateError::InvalidUrl)
        ));
        assert!(matches!(
            generate("   ", &fetcher, &generator, &mut store),
            Err(GenerateError::InvalidUrl)
        ));
    }

    #[test]
    fn test_generate_transcript_unavailable() {
        let mut store = Store::open_in_memory().unwrap();
        let fetcher = StubFetcher(Err(GenerateError::TranscriptUnavailable("x".into())));
        let generator = StubGenerator(draft(1));
        assert!(matches!(
            generate("https://youtu.be/abc", &fetcher, &generator, &mut store),
            Err(GenerateError::TranscriptUnavailable(_))
        ));
        assert!(store.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_generate_empty_deck_is_parse_failure() {
        let mut store = Store::open_in_memory().unwrap();
        let fetcher = StubFetcher(Ok("text".into()));
        let generator = StubGenerator(draft(0));
        assert!(matches!(
            generate("https://youtu.be/abc", &fetcher, &generator, &mut store),
            Err(GenerateError::LlmParseFailure)
        ));
    }

    #[test]
    fn test_parse_transcript_output_success() {
        let text =
            parse_transcript_output(r#"{"success": true, "text": "hi there", "segments": 2}"#)
                .unwrap();
        assert_eq!(text, "hi there");
    }

    #[test]
    fn test_parse_transcript_output_reported_failure() {
        let err =
            parse_transcript_output(r#"{"success": false, "error": "no captions"}"#).unwrap_err();
        match err {
            GenerateError::TranscriptUnavailable(msg) => assert_eq!(msg, "no captions"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_transcript_output_garbage() {
        assert!(matches!(
            parse_transcript_output("Traceback (most recent call last)"),
            Err(GenerateError::TranscriptUnavailable(_))
        ));
    }

    #[test]
    fn test_command_fetcher_missing_program() {
        let fetcher = CommandTranscriptFetcher::new("definitely-not-a-real-program-xyz");
        assert!(matches!(
            fetcher.fetch("vid"),
            Err(GenerateError::TranscriptUnavailable(_))
        ));
    }
}
