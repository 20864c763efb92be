use std::collections::HashMap;

pub type Color = &'static str;

/// Material 500 shades, in assignment order
pub const PALETTE: [Color; 18] = [
    "#e51c23", // red
    "#e91e63", // pink
    "#9c27b0", // purple
    "#673ab7", // deep purple
    "#3f51b5", // indigo
    "#5677fc", // blue
    "#03a9f4", // light blue
    "#00bcd4", // cyan
    "#009688", // teal
    "#259b24", // green
    "#8bc34a", // light green
    "#cddc39", // lime
    "#ffeb3b", // yellow
    "#ffc107", // amber
    "#ff9800", // orange
    "#ff5722", // deep orange
    "#795548", // brown
    "#607d8b", // blue grey
];

/// Border for events whose identifier was never colored this session
pub const NEUTRAL_GRAY: Color = "#9e9e9e";

/// Stable identifier -> color assignment for one demo session.
/// First seen, first colored; wraps around the palette.
#[derive(Debug, Clone, Default)]
pub struct ColorRegistry {
    assigned: HashMap<String, Color>,
    counter: usize,
}

impl ColorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Color for `identifier`, assigning the next palette entry if unseen
    pub fn color_for(&mut self, identifier: &str) -> Color {
        if let Some(color) = self.assigned.get(identifier).copied() {
            return color;
        }
        let color = PALETTE[self.counter % PALETTE.len()];
        self.counter += 1;
        self.assigned.insert(identifier.to_string(), color);
        color
    }

    /// Assigned color or the gray fallback; never assigns
    pub fn lookup(&self, identifier: &str) -> Color {
        self.assigned
            .get(identifier)
            .copied()
            .unwrap_or(NEUTRAL_GRAY)
    }

    pub fn reset(&mut self) {
        self.assigned.clear();
        self.counter = 0;
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

/// Round-robin chart colors, independent of event coloring
#[derive(Debug, Default)]
pub struct ChartPalette {
    next: usize,
}

impl ChartPalette {
    pub fn next_color(&mut self) -> Color {
        let color = PALETTE[self.next];
        self.next = (self.next + 1) % PALETTE.len();
        color
    }
}
