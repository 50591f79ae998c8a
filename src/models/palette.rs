use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaletteColor {
    pub color: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Palette {
    pub colors: Vec<PaletteColor>,
    pub max_colors: usize,
}

/// Static palette definition. Not user-editable — mutating it is out of
/// scope; serving it is the only touchpoint the core has with it.
const COLORS: &[&str] = &[
    "#000000", "#FFFFFF", "#FF0000", "#00FF00", "#0000FF", "#FFFF00", "#FF00FF", "#00FFFF",
    "#800000", "#008000", "#000080", "#808000", "#800080", "#008080", "#C0C0C0", "#808080",
    "#FFA500", "#A52A2A", "#FFD700", "#4B0082", "#F0E68C", "#ADD8E6", "#F08080", "#E0FFFF",
    "#FAFAD2", "#D3D3D3", "#90EE90", "#FFB6C1", "#FFA07A", "#20B2AA", "#87CEEB", "#778899",
];

impl Default for Palette {
    fn default() -> Self {
        let colors = COLORS
            .iter()
            .map(|&color| PaletteColor {
                color: color.to_string(),
                name: None,
            })
            .collect();
        Self {
            colors,
            max_colors: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_palette_is_idempotent() {
        let a = Palette::default();
        let b = Palette::default();
        assert_eq!(a.colors.len(), b.colors.len());
        assert_eq!(
            a.colors.iter().map(|c| &c.color).collect::<Vec<_>>(),
            b.colors.iter().map(|c| &c.color).collect::<Vec<_>>()
        );
        assert_eq!(a.max_colors, b.max_colors);
    }
}
