//! The block tree edited by the template designer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    pub fn as_str(self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        }
    }

    /// Lenient parse of a CSS `text-align` value or an `align` attribute.
    pub fn parse(value: &str) -> Option<Align> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Some(Align::Left),
            "center" | "middle" => Some(Align::Center),
            "right" | "end" => Some(Align::Right),
            _ => None,
        }
    }
}

fn default_heading_level() -> u8 {
    2
}

fn default_spacer_height() -> u32 {
    24
}

/// One column of a `columns` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Column {
    /// Width in percent of the row; columns without one share the remainder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u8>,
    #[schema(no_recursion)]
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Heading {
        text: String,
        #[serde(default = "default_heading_level")]
        level: u8,
        #[serde(default)]
        align: Align,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    Text {
        /// Inline HTML; reduced to a small allow-list of tags when compiled
        content: String,
        #[serde(default)]
        align: Align,
    },
    Button {
        label: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        background_color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text_color: Option<String>,
        #[serde(default)]
        align: Align,
    },
    Image {
        src: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
        /// Pixels
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(default)]
        align: Align,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        link: Option<String>,
    },
    Divider {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        /// Pixels
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thickness: Option<u8>,
    },
    Spacer {
        /// Pixels
        #[serde(default = "default_spacer_height")]
        height: u32,
    },
    Columns {
        columns: Vec<Column>,
    },
    Html {
        html: String,
    },
}

impl Block {
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Heading { .. } => "heading",
            Block::Text { .. } => "text",
            Block::Button { .. } => "button",
            Block::Image { .. } => "image",
            Block::Divider { .. } => "divider",
            Block::Spacer { .. } => "spacer",
            Block::Columns { .. } => "columns",
            Block::Html { .. } => "html",
        }
    }
}

/// Structural checks serde cannot express. Returns a message naming the first offending block.
pub fn validate(blocks: &[Block]) -> Result<(), String> {
    for (index, block) in blocks.iter().enumerate() {
        match block {
            Block::Heading { level, .. } if !(1..=6).contains(level) => {
                return Err(format!("block {index}: heading level must be between 1 and 6, got {level}"));
            }
            Block::Button { label, .. } if label.trim().is_empty() => {
                return Err(format!("block {index}: button label must not be empty"));
            }
            Block::Image { src, .. } if src.trim().is_empty() => {
                return Err(format!("block {index}: image src must not be empty"));
            }
            Block::Columns { columns } => {
                if columns.is_empty() {
                    return Err(format!("block {index}: columns block needs at least one column"));
                }
                let mut total: u32 = 0;
                for column in columns {
                    if let Some(width) = column.width {
                        if width == 0 || width > 100 {
                            return Err(format!("block {index}: column width must be between 1 and 100"));
                        }
                        total += u32::from(width);
                    }
                    validate(&column.blocks).map_err(|e| format!("block {index}: {e}"))?;
                }
                if total > 100 {
                    return Err(format!("block {index}: column widths add up to more than 100"));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blocks_are_tagged_by_type() {
        let blocks: Vec<Block> = serde_json::from_value(json!([
            {"type": "heading", "text": "Welcome"},
            {"type": "spacer"},
            {"type": "columns", "columns": [{"width": 50, "blocks": [{"type": "divider"}]}, {"blocks": []}]}
        ]))
        .unwrap();

        assert_eq!(
            blocks[0],
            Block::Heading {
                text: "Welcome".to_string(),
                level: 2,
                align: Align::Left,
                color: None
            }
        );
        assert_eq!(blocks[1], Block::Spacer { height: 24 });
        let Block::Columns { columns } = &blocks[2] else {
            panic!("expected columns, got {:?}", blocks[2]);
        };
        assert_eq!(columns[0].width, Some(50));
        assert_eq!(columns[0].blocks, vec![Block::Divider { color: None, thickness: None }]);

        let value = serde_json::to_value(&blocks[0]).unwrap();
        assert_eq!(value["type"], "heading");
        assert!(value.get("color").is_none());
    }

    #[test]
    fn unknown_block_types_are_rejected() {
        let result: Result<Block, _> = serde_json::from_value(json!({"type": "carousel"}));
        assert!(result.is_err());
    }

    #[test]
    fn validation_catches_bad_levels_and_widths() {
        let heading = |level| Block::Heading {
            text: "x".to_string(),
            level,
            align: Align::Left,
            color: None,
        };
        assert!(validate(&[heading(1), heading(6)]).is_ok());
        assert!(validate(&[heading(0)]).unwrap_err().contains("heading level"));
        assert!(validate(&[heading(7)]).is_err());

        let columns = Block::Columns {
            columns: vec![
                Column {
                    width: Some(70),
                    blocks: vec![],
                },
                Column {
                    width: Some(40),
                    blocks: vec![],
                },
            ],
        };
        assert!(validate(&[columns]).unwrap_err().contains("more than 100"));

        let nested = Block::Columns {
            columns: vec![Column {
                width: None,
                blocks: vec![heading(9)],
            }],
        };
        assert!(validate(&[nested]).is_err());
    }

    #[test]
    fn align_parsing_is_lenient() {
        assert_eq!(Align::parse(" Center "), Some(Align::Center));
        assert_eq!(Align::parse("end"), Some(Align::Right));
        assert_eq!(Align::parse("justify"), None);
    }
}
