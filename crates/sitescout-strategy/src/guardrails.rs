//! Guardrails over model-proposed selections.
//!
//! Soft checks (geographic balance, rationale quality) flag and keep; the
//! consistency check is a hard floor that discards the model output
//! entirely, because a selection unmoored from the deterministic scoring
//! is worse than no model at all.

use sitescout_core::Candidate;

use crate::prompt::ParsedSelection;

/// Maximum share of picks allowed in one quadrant of the pool's extent.
const MAX_QUADRANT_SHARE: f64 = 0.40;

/// Minimum rationale length and the signal vocabulary it must cite.
const MIN_RATIONALE_CHARS: usize = 50;
const RATIONALE_KEYWORDS: [&str; 4] = ["population", "anchor", "gap", "performance"];

/// Minimum overlap with the deterministic top picks and minimum average
/// score relative to them.
const MIN_OVERLAP: f64 = 0.30;
const MIN_SCORE_RATIO: f64 = 0.80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailDecision {
    /// Selections pass every check.
    Allow,
    /// Selections kept, but soft checks raised the listed flags.
    Degrade(Vec<String>),
    /// Hard violation; the caller must discard the selections.
    Deny(String),
}

/// Evaluates model selections against a pool in deterministic rank order.
#[must_use]
pub fn evaluate(
    selections: &[ParsedSelection],
    pool: &[Candidate],
    target: usize,
) -> GuardrailDecision {
    if let Some(reason) = consistency_violation(selections, pool, target) {
        return GuardrailDecision::Deny(reason);
    }

    let mut flags = Vec::new();
    if let Some(flag) = balance_flag(selections, pool) {
        flags.push(flag);
    }
    flags.extend(rationale_flags(selections));

    if flags.is_empty() {
        GuardrailDecision::Allow
    } else {
        GuardrailDecision::Degrade(flags)
    }
}

/// Hard floor: picks must overlap the deterministic top-`target` and must
/// not crater the average score.
fn consistency_violation(
    selections: &[ParsedSelection],
    pool: &[Candidate],
    target: usize,
) -> Option<String> {
    let top_n = target.min(pool.len());
    if top_n == 0 || selections.is_empty() {
        return None;
    }

    let overlap = selections.iter().filter(|s| s.index < top_n).count();
    #[allow(clippy::cast_precision_loss)]
    let overlap_share = overlap as f64 / selections.len() as f64;
    if overlap_share < MIN_OVERLAP {
        return Some(format!(
            "only {overlap} of {} picks overlap the deterministic top {top_n}",
            selections.len()
        ));
    }

    #[allow(clippy::cast_precision_loss)]
    let picked_avg = selections
        .iter()
        .map(|s| pool[s.index].score)
        .sum::<f64>()
        / selections.len() as f64;
    #[allow(clippy::cast_precision_loss)]
    let top_avg = pool[..top_n].iter().map(|c| c.score).sum::<f64>() / top_n as f64;
    if top_avg > 0.0 && picked_avg < MIN_SCORE_RATIO * top_avg {
        return Some(format!(
            "picked average score {picked_avg:.3} below {MIN_SCORE_RATIO} of deterministic \
             average {top_avg:.3}"
        ));
    }
    None
}

/// Soft check: no quadrant of the pool's bounding box may hold more than
/// the allowed share of picks. Needs enough picks to be meaningful.
fn balance_flag(selections: &[ParsedSelection], pool: &[Candidate]) -> Option<String> {
    if selections.len() < 5 {
        return None;
    }
    let (mut south, mut north) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut west, mut east) = (f64::INFINITY, f64::NEG_INFINITY);
    for candidate in pool {
        south = south.min(candidate.lat);
        north = north.max(candidate.lat);
        west = west.min(candidate.lng);
        east = east.max(candidate.lng);
    }
    let mid_lat = f64::midpoint(south, north);
    let mid_lng = f64::midpoint(west, east);

    let mut quadrants = [0usize; 4];
    for selection in selections {
        let candidate = &pool[selection.index];
        let quadrant =
            usize::from(candidate.lat >= mid_lat) * 2 + usize::from(candidate.lng >= mid_lng);
        quadrants[quadrant] += 1;
    }
    #[allow(clippy::cast_precision_loss)]
    let worst_share = quadrants
        .iter()
        .map(|&n| n as f64 / selections.len() as f64)
        .fold(0.0_f64, f64::max);
    if worst_share > MAX_QUADRANT_SHARE {
        return Some(format!(
            "geographic imbalance: {:.0}% of picks in one quadrant",
            worst_share * 100.0
        ));
    }
    None
}

/// Soft check: each rationale must be substantial and cite at least one
/// concrete signal.
fn rationale_flags(selections: &[ParsedSelection]) -> Vec<String> {
    let mut flags = Vec::new();
    for selection in selections {
        let lower = selection.rationale.to_lowercase();
        let cites_signal = RATIONALE_KEYWORDS.iter().any(|k| lower.contains(k));
        if selection.rationale.chars().count() < MIN_RATIONALE_CHARS || !cites_signal {
            flags.push(format!(
                "weak rationale for candidate {}",
                selection.index
            ));
        }
    }
    flags
}
