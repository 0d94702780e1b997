use image::Rgb;

/// Fixed 20-color palette. A class id always maps to the same color.
#[derive(Clone, Debug)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
}

const DEFAULT_HEX: [&str; 20] = [
    "042AFF", "0BDBEB", "F3F3F3", "00DFB7", "111F68", "FF6FDD", "FF444F", "CCED00", "00F344",
    "BD00FF", "00B4FF", "DD00BA", "00FFFF", "26C000", "01FFB3", "7D24FF", "7B0068", "FF1B6C",
    "FC6D2F", "A2FF0B",
];

/// Backgrounds brighter than this get black label text.
const LIGHT_LUMA_THRESHOLD: f32 = 150.0;

impl Palette {
    pub fn color(&self, class_id: usize) -> Rgb<u8> {
        self.colors[class_id % self.colors.len()]
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_HEX.iter().map(|hex| parse_hex(hex)).collect(),
        }
    }
}

/// Black or white, whichever reads better on `background`.
pub fn text_color_for(background: Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = background.0;
    let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    if luma > LIGHT_LUMA_THRESHOLD {
        Rgb([0, 0, 0])
    } else {
        Rgb([255, 255, 255])
    }
}

fn parse_hex(hex: &str) -> Rgb<u8> {
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
    Rgb([channel(0), channel(2), channel(4)])
}
