//! Structured query types produced by the description parser.

use serde::{Deserialize, Serialize};

/// Returns true for a value the query treats as "present":
/// non-null and non-empty.
fn str_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

/// Pressing-specific attributes that the catalog's structured filters cannot
/// search for reliably (vinyl color, edition, pressing plant, ...). These are
/// compared against candidate format text by the variant ranker instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantDescriptors {
    /// Vinyl color (e.g., "red", "tri-color").
    #[serde(default)]
    pub vinyl_color: Option<String>,
    /// Reissue type (e.g., "25th anniversary", "deluxe").
    #[serde(default)]
    pub reissue_type: Option<String>,
    /// Pressing plant name.
    #[serde(default)]
    pub pressing_plant: Option<String>,
    /// Matrix / runout etching.
    #[serde(default)]
    pub matrix_runout: Option<String>,
    /// Playback speed (e.g., "45 RPM").
    #[serde(default)]
    pub speed: Option<String>,
    /// Record size (e.g., "12\"").
    #[serde(default)]
    pub size: Option<String>,
    /// Free-text edition details.
    #[serde(default)]
    pub edition_details: Option<String>,
    /// Limited edition: true/false when asserted, `None` when unknown.
    #[serde(default)]
    pub limited_edition: Option<bool>,
    /// Individually numbered: true/false when asserted, `None` when unknown.
    #[serde(default)]
    pub numbered: Option<bool>,
    /// Other notable features (gatefold, box set, ...).
    #[serde(default)]
    pub special_features: Vec<String>,
}

impl VariantDescriptors {
    /// True if any descriptor is present (non-null, non-empty string,
    /// non-empty list). This is the gate for model-assisted ranking.
    pub fn has_any(&self) -> bool {
        self.count_present() > 0
    }

    /// Number of present descriptor fields.
    pub fn count_present(&self) -> usize {
        self.present_fields().len()
    }

    /// Present descriptors as (field name, rendered value) pairs, in a fixed
    /// order, for prompt construction.
    pub fn present_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();

        let strings = [
            ("vinyl color", &self.vinyl_color),
            ("reissue type", &self.reissue_type),
            ("pressing plant", &self.pressing_plant),
            ("matrix/runout", &self.matrix_runout),
            ("speed", &self.speed),
            ("size", &self.size),
            ("edition details", &self.edition_details),
        ];
        for (name, value) in strings {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                fields.push((name, v.to_string()));
            }
        }

        if let Some(limited) = self.limited_edition {
            fields.push(("limited edition", limited.to_string()));
        }
        if let Some(numbered) = self.numbered {
            fields.push(("numbered", numbered.to_string()));
        }
        if !self.special_features.is_empty() {
            fields.push(("special features", self.special_features.join(", ")));
        }

        fields
    }
}

/// Structured search query extracted from a free-text record description.
///
/// Core fields map directly to catalog search filters; variant descriptors
/// are handled by the ranking stage. Immutable once produced, except for the
/// confidence back-fill performed by the parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredQuery {
    /// Artist or band name.
    #[serde(default)]
    pub artist: Option<String>,
    /// Album or release title.
    #[serde(default)]
    pub album: Option<String>,
    /// Specific track name, if one was mentioned.
    #[serde(default)]
    pub track: Option<String>,
    /// Release year.
    #[serde(default)]
    pub year: Option<i32>,
    /// Musical genre.
    #[serde(default)]
    pub genre: Option<String>,
    /// Physical format (LP, 7", 12", ...).
    #[serde(default)]
    pub format: Option<String>,
    /// Record label.
    #[serde(default)]
    pub label: Option<String>,
    /// Catalog number.
    #[serde(default)]
    pub catalog_number: Option<String>,
    /// Country of release.
    #[serde(default)]
    pub country: Option<String>,
    /// Media condition, if mentioned.
    #[serde(default)]
    pub condition: Option<String>,
    /// Free-text pressing details that don't fit the variant descriptors.
    #[serde(default)]
    pub pressing_details: Option<String>,
    /// Additional search keywords, ordered.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Confidence in the parsed query (0-1). Always recomputed by the parser
    /// from field presence, never trusted from the completion model.
    #[serde(default)]
    pub confidence: f32,
    /// Pressing-variant descriptors.
    #[serde(default)]
    pub variant_descriptors: VariantDescriptors,
}

impl StructuredQuery {
    /// Count of present top-level fields, with variant descriptors flattened.
    /// Drives the confidence back-fill.
    pub fn non_empty_field_count(&self) -> usize {
        let mut count = 0;

        for value in [
            &self.artist,
            &self.album,
            &self.track,
            &self.genre,
            &self.format,
            &self.label,
            &self.catalog_number,
            &self.country,
            &self.condition,
            &self.pressing_details,
        ] {
            if str_present(value) {
                count += 1;
            }
        }
        if self.year.is_some() {
            count += 1;
        }
        if !self.keywords.is_empty() {
            count += 1;
        }

        count + self.variant_descriptors.count_present()
    }

    /// True if any of the primary identifying fields were extracted.
    pub fn has_primary_fields(&self) -> bool {
        str_present(&self.artist) || str_present(&self.album) || str_present(&self.track)
    }
}
