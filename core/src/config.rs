use serde::{Deserialize, Serialize};

/// Whether global search hits reveal who uploaded the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerVisibility {
    #[default]
    Exposed,
    Hidden,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Characters of context kept on each side of a match.
    pub snippet_radius: usize,
    pub owner_visibility: OwnerVisibility,
    pub recent_window_days: u32,
    pub max_upload_bytes: u64,
    /// Minimum trimmed length of extracted text for an upload to be accepted.
    pub min_text_chars: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 50,
            snippet_radius: 100,
            owner_visibility: OwnerVisibility::Exposed,
            recent_window_days: 7,
            max_upload_bytes: 50 * 1024 * 1024,
            min_text_chars: 10,
        }
    }
}

impl GatewayConfig {
    /// Resolves a requested page size: missing uses the default, anything else is clamped
    /// into `1..=max_page_size`.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        let max = self.max_page_size.max(1);
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, max)
    }
}
