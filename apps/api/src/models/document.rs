//! Input document model: an ordered list of content blocks plus page geometry.
//!
//! Documents are read-only for both pipelines. `validate` is the single gate
//! for malformed input; everything downstream assumes a validated document.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::models::geometry::Rect;

/// Average characters per word, including the trailing space.
pub const CHARS_PER_WORD: f64 = 6.0;

/// Body words that fit on one typical page, used to estimate page counts.
const WORDS_PER_PAGE_CAPACITY: u64 = 500;

/// Upper bound on a single block's declared word count.
pub const MAX_BLOCK_WORDS: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Heading,
    Paragraph,
    Image,
    Quote,
    Cta,
}

impl BlockType {
    pub fn is_text(&self) -> bool {
        matches!(self, BlockType::Heading | BlockType::Paragraph | BlockType::Quote)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaSize {
    pub width: f64,
    pub height: f64,
}

/// A single unit of content. `hierarchy_level` 1 is the most important.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub text: String,
    pub hierarchy_level: u8,
    #[serde(default)]
    pub word_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_size: Option<MediaSize>,
}

impl ContentBlock {
    /// Declared word count, falling back to counting `text` when none was given.
    pub fn effective_word_count(&self) -> u32 {
        if self.word_count > 0 {
            self.word_count
        } else {
            self.text.split_whitespace().count() as u32
        }
    }

    /// A blank, zero-word paragraph marks a deliberate large-whitespace break.
    pub fn is_whitespace_marker(&self) -> bool {
        self.block_type == BlockType::Paragraph
            && self.word_count == 0
            && self.text.trim().is_empty()
    }

    /// Images, section headings and whitespace markers give the reader a rest.
    pub fn is_natural_break(&self) -> bool {
        matches!(self.block_type, BlockType::Image | BlockType::Heading)
            || self.is_whitespace_marker()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    pub fn uniform(value: f64) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }

    fn is_valid(&self) -> bool {
        [self.top, self.right, self.bottom, self.left]
            .iter()
            .all(|m| m.is_finite() && *m >= 0.0)
    }
}

/// Page size in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_defaults: Option<Margins>,
}

impl PageGeometry {
    /// ISO A4 portrait.
    pub fn a4() -> Self {
        Self {
            width: 595.0,
            height: 842.0,
            margin_defaults: None,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(EngineError::InvalidConstraint(format!(
                "page width must be positive, got {}",
                self.width
            )));
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err(EngineError::InvalidConstraint(format!(
                "page height must be positive, got {}",
                self.height
            )));
        }
        if let Some(margins) = &self.margin_defaults {
            validate_margins(margins, self.width, self.height)?;
        }
        Ok(())
    }
}

/// Checks that margins are non-negative and leave a printable area.
pub fn validate_margins(margins: &Margins, width: f64, height: f64) -> Result<(), EngineError> {
    if !margins.is_valid() {
        return Err(EngineError::InvalidConstraint(
            "margins must be non-negative".to_string(),
        ));
    }
    if margins.horizontal() >= width || margins.vertical() >= height {
        return Err(EngineError::InvalidConstraint(format!(
            "margins leave no content area on a {width}x{height} page"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<ContentBlock>,
    pub page: PageGeometry,
}

impl Document {
    /// Rejects malformed documents before any computation happens.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.page.validate()?;

        if self.blocks.is_empty() {
            return Err(EngineError::InvalidInput(
                "document has no content blocks".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for block in &self.blocks {
            if block.id.trim().is_empty() {
                return Err(EngineError::InvalidInput(
                    "content block id cannot be empty".to_string(),
                ));
            }
            if !seen.insert(block.id.as_str()) {
                return Err(EngineError::InvalidInput(format!(
                    "duplicate content block id '{}'",
                    block.id
                )));
            }
            if block.hierarchy_level == 0 {
                return Err(EngineError::InvalidInput(format!(
                    "block '{}': hierarchyLevel starts at 1",
                    block.id
                )));
            }
            if block.word_count > MAX_BLOCK_WORDS {
                return Err(EngineError::InvalidInput(format!(
                    "block '{}': wordCount exceeds {MAX_BLOCK_WORDS}",
                    block.id
                )));
            }
            if let Some(media) = &block.media_size {
                let valid = media.width.is_finite()
                    && media.height.is_finite()
                    && media.width > 0.0
                    && media.height > 0.0;
                if !valid {
                    return Err(EngineError::InvalidInput(format!(
                        "block '{}': mediaSize must be positive",
                        block.id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn total_words(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.effective_word_count())).sum()
    }

    pub fn count_of(&self, block_type: BlockType) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.block_type == block_type)
            .count()
    }

    /// Rough page count for density scoring; never zero.
    pub fn estimated_pages(&self) -> u32 {
        let pages = self.total_words().div_ceil(WORDS_PER_PAGE_CAPACITY).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}
