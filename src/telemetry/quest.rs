//! Quest span helpers.
//!
//! Provides span creation and state-transition recording for quests moving
//! through the engine.

use tracing::Span;

use crate::model::{Quest, QuestStatus};

/// Start a span scoped to one quest.
///
/// The `quest.status` field is declared empty and can be updated via
/// [`record_transition`].
pub fn quest_span(quest: &Quest) -> Span {
    tracing::info_span!(
        "quest",
        "quest.id" = %quest.id,
        "quest.type" = %quest.quest_type,
        "quest.status" = tracing::field::Empty,
    )
}

/// Record a status transition on the given span.
pub fn record_transition(span: &Span, from: QuestStatus, to: QuestStatus) {
    span.record("quest.status", tracing::field::display(to));
    span.in_scope(|| {
        tracing::info!(%from, %to, "quest_transition");
    });
}
