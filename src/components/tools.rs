use image::Rgba;

use crate::ops::stroke::clamp_stroke_width;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Brush,
    Fill,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Brush => "Brush",
            Tool::Fill => "Fill",
        }
    }

    pub fn all() -> &'static [Tool] {
        &[Tool::Brush, Tool::Fill]
    }
}

/// Paint palette offered by the toolbar.
pub const SWATCHES: [Rgba<u8>; 10] = [
    Rgba([255, 255, 255, 255]),
    Rgba([238, 52, 52, 255]),
    Rgba([251, 146, 60, 255]),
    Rgba([250, 204, 21, 255]),
    Rgba([74, 222, 128, 255]),
    Rgba([45, 212, 191, 255]),
    Rgba([56, 189, 248, 255]),
    Rgba([129, 140, 248, 255]),
    Rgba([232, 121, 249, 255]),
    Rgba([120, 113, 108, 255]),
];

pub const DEFAULT_STROKE_WIDTH: u32 = 3;

/// The three primitive inputs supplied by the toolbar widgets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolSettings {
    tool: Tool,
    color: Rgba<u8>,
    stroke_width: u32,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            tool: Tool::Brush,
            color: SWATCHES[0],
            stroke_width: DEFAULT_STROKE_WIDTH,
        }
    }
}

impl ToolSettings {
    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    /// Active paint color, always opaque.
    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    pub fn set_color(&mut self, color: Rgba<u8>) {
        self.color = Rgba([color[0], color[1], color[2], 255]);
    }

    pub fn stroke_width(&self) -> u32 {
        self.stroke_width
    }

    /// Out-of-range widths are clamped to 1–50.
    pub fn set_stroke_width(&mut self, width: i64) {
        self.stroke_width = clamp_stroke_width(width);
    }
}
