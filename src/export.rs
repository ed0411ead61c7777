use crate::store::Store;
use anyhow::{bail, Context, Result};
use std::io::Write;

/// Write one session's deck as CSV, front/back/order/mastered, for import
/// into external flashcard tools.
pub fn export_session_csv<W: Write>(store: &Store, session_id: &str, out: W) -> Result<()> {
    let session = store
        .get_session(session_id)
        .context("reading session")?;
    let Some(session) = session else {
        bail!("session {} not found", session_id);
    };

    let cards = store
        .cards_for_session(&session.id)
        .context("reading cards")?;

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["front", "back", "card_order", "mastered"])?;
    for card in &cards {
        writer.write_record([
            card.front.as_str(),
            card.back.as_str(),
            &card.card_order.to_string(),
            if card.mastered { "1" } else { "0" },
        ])?;
    }
    writer.flush()?;
    Ok(())
}
