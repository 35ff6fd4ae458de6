//! Ranking and context assembly
//!
//! Turns raw index matches into the ordered file context handed to the
//! answer synthesizer: best match first, one record per match, optionally
//! cut down to a token budget.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::AskError;
use crate::file::FileRecord;
use crate::fts::ScoredMatch;

/// Sort matches by descending score.
///
/// The sort is stable: equal scores keep the order the index returned them in.
pub fn rank(mut matches: Vec<ScoredMatch>) -> Vec<ScoredMatch> {
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches
}

/// Join ranked matches back to their file records.
///
/// Output follows `ranked` order. Matches without a record are dropped, as
/// are repeated ids. When several records share a path the first one wins.
/// An empty result is [`AskError::NoRelevantFiles`].
pub fn assemble(
    ranked: &[ScoredMatch],
    files: Vec<FileRecord>,
) -> Result<Vec<FileRecord>, AskError> {
    let mut slots: Vec<Option<FileRecord>> = files.into_iter().map(Some).collect();

    let mut by_path: HashMap<&str, usize> = HashMap::with_capacity(slots.len());
    for (i, slot) in slots.iter().enumerate() {
        if let Some(record) = slot {
            by_path.entry(record.path.as_str()).or_insert(i);
        }
    }
    let positions: Vec<Option<usize>> = ranked
        .iter()
        .map(|m| by_path.get(m.id.as_str()).copied())
        .collect();
    drop(by_path);

    let mut seen = HashSet::new();
    let mut context = Vec::with_capacity(ranked.len());
    for (m, position) in ranked.iter().zip(positions) {
        let Some(position) = position else {
            debug!("Dropping match without a file record: {}", m.id);
            continue;
        };
        if !seen.insert(position) {
            continue;
        }
        if let Some(record) = slots[position].take() {
            context.push(record);
        }
    }

    if context.is_empty() {
        return Err(AskError::NoRelevantFiles);
    }
    Ok(context)
}

/// Keep records in order while their total token count fits `max_tokens`.
///
/// The first record is always kept so a single oversized best match still
/// reaches the synthesizer. `None` keeps everything.
pub fn bound_context(context: Vec<FileRecord>, max_tokens: Option<usize>) -> Vec<FileRecord> {
    let Some(max_tokens) = max_tokens else {
        return context;
    };

    let total = context.len();
    let mut used = 0usize;
    let mut bounded = Vec::with_capacity(total);
    for record in context {
        if !bounded.is_empty() && used + record.token_count > max_tokens {
            break;
        }
        used += record.token_count;
        bounded.push(record);
    }

    if bounded.len() < total {
        debug!(
            "Context bounded to {} of {} files ({} tokens)",
            bounded.len(),
            total,
            used
        );
    }
    bounded
}
