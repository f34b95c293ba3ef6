//! Two-stage result ranking.
//!
//! Stage one is pure field matching ([`RelevanceScorer`]); stage two asks a
//! completion model to compare pressing-variant requirements against
//! candidate format text ([`VariantRanker`]). Stage two only runs when the
//! query has variant descriptors and can only improve explanations, never
//! fail the search.

mod scorer;
mod types;
mod variant;

pub use scorer::{score_label, RelevanceScorer};
pub use types::RankedResult;
pub use variant::{VariantRanker, VariantRankerConfig};
