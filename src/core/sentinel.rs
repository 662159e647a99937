// src/core/sentinel.rs — Placeholder outputs recorded instead of raising

pub const STRATEGY_UNAVAILABLE: &str = "Strategy output unavailable.";
pub const CRITIQUE_UNAVAILABLE: &str = "Critique output unavailable.";
pub const REFINED_UNAVAILABLE: &str = "Refined strategy unavailable.";

pub const NO_STRATEGY_TO_CRITIQUE: &str = "No strategy was generated yet. Cannot critique.";
pub const NO_ORIGINAL_STRATEGY: &str = "No original strategy available.";
pub const NO_CRITIQUE_TO_REFINE: &str = "No critique available yet. Cannot refine.";

const ALL: [&str; 6] = [
    STRATEGY_UNAVAILABLE,
    CRITIQUE_UNAVAILABLE,
    REFINED_UNAVAILABLE,
    NO_STRATEGY_TO_CRITIQUE,
    NO_ORIGINAL_STRATEGY,
    NO_CRITIQUE_TO_REFINE,
];

/// True for any placeholder a step may record.
pub fn is_sentinel(text: &str) -> bool {
    let text = text.trim();
    ALL.contains(&text)
}

/// `Some(text)` when the value exists, is non-blank and is not a sentinel.
pub fn usable(value: Option<&str>) -> Option<&str> {
    value.filter(|t| !t.trim().is_empty() && !is_sentinel(t))
}
