//! Paragraph and text run models.

use serde::{Deserialize, Serialize};

/// Body text size in points.
pub const BULLET_SIZE_PT: u32 = 14;

/// Nested bullet size in points.
pub const SUB_BULLET_SIZE_PT: u32 = 12;

/// Section header size in points.
pub const HEADER_SIZE_PT: u32 = 18;

/// Text alignment within a paragraph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlignment {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlignment {
    /// DrawingML `algn` attribute value.
    pub fn as_drawingml(&self) -> &'static str {
        match self {
            TextAlignment::Left => "l",
            TextAlignment::Center => "ctr",
            TextAlignment::Right => "r",
        }
    }
}

/// Text style properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Bold text
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,

    /// Font size in points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_pt: Option<u32>,
}

impl TextStyle {
    /// Style with an explicit size.
    pub fn sized(size_pt: u32) -> Self {
        Self {
            bold: false,
            size_pt: Some(size_pt),
        }
    }

    /// Bold style with an explicit size.
    pub fn bold(size_pt: u32) -> Self {
        Self {
            bold: true,
            size_pt: Some(size_pt),
        }
    }
}

/// A run of text with consistent styling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,

    #[serde(default)]
    pub style: TextStyle,

    /// Hyperlink URL (if this run is a link)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperlink: Option<String>,
}

impl TextRun {
    /// Create a plain text run with no styling.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Create a hyperlink text run.
    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle::default(),
            hyperlink: Some(url.into()),
        }
    }

    /// Check if this run is a hyperlink.
    pub fn is_link(&self) -> bool {
        self.hyperlink.is_some()
    }
}

/// A paragraph of a text frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub runs: Vec<TextRun>,

    /// Outline level (0 = top level)
    #[serde(default)]
    pub level: u8,

    #[serde(default)]
    pub alignment: TextAlignment,
}

impl Paragraph {
    /// Create a paragraph with the given text.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            runs: vec![TextRun::plain(text)],
            ..Default::default()
        }
    }

    /// Bold 18pt section header.
    pub fn section_header(title: impl Into<String>) -> Self {
        Self {
            runs: vec![TextRun {
                text: title.into(),
                style: TextStyle::bold(HEADER_SIZE_PT),
                hyperlink: None,
            }],
            ..Default::default()
        }
    }

    /// Bullet line; a `•` prefix is added unless the text already has one.
    pub fn bullet(text: impl Into<String>, level: u8, size_pt: u32) -> Self {
        let text = text.into();
        let text = if text.starts_with('•') {
            text
        } else {
            format!("• {}", text)
        };
        Self {
            runs: vec![TextRun {
                text,
                style: TextStyle::sized(size_pt),
                hyperlink: None,
            }],
            level,
            alignment: TextAlignment::Left,
        }
    }

    /// Bullet made of several runs, used when part of the line is a link.
    ///
    /// Every run takes `size_pt`; bold is kept from the run's own style.
    pub fn bullet_runs(runs: Vec<TextRun>, level: u8, size_pt: u32) -> Self {
        let runs = runs
            .into_iter()
            .map(|mut run| {
                run.style.size_pt = Some(size_pt);
                run
            })
            .collect();
        Self {
            runs,
            level,
            alignment: TextAlignment::Left,
        }
    }

    /// Get the plain text content.
    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Check if this paragraph is empty.
    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|r| r.text.is_empty())
    }
}

/// Ordered paragraphs destined for one text frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub paragraphs: Vec<Paragraph>,
}

impl TextBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section header.
    pub fn header(&mut self, title: impl Into<String>) {
        self.paragraphs.push(Paragraph::section_header(title));
    }

    /// Append a bullet.
    pub fn bullet(&mut self, text: impl Into<String>, level: u8, size_pt: u32) {
        self.paragraphs.push(Paragraph::bullet(text, level, size_pt));
    }

    /// Append a multi-run bullet.
    pub fn bullet_runs(&mut self, runs: Vec<TextRun>, level: u8, size_pt: u32) {
        self.paragraphs
            .push(Paragraph::bullet_runs(runs, level, size_pt));
    }

    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Paragraph texts joined by newlines.
    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.plain_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every hyperlink target in the block, in order.
    pub fn links(&self) -> Vec<&str> {
        self.paragraphs
            .iter()
            .flat_map(|p| p.runs.iter())
            .filter_map(|r| r.hyperlink.as_deref())
            .collect()
    }
}
