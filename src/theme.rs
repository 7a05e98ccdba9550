use crate::util::stable_hash;

pub type Rgb = [u8; 3];

const TYPE_PALETTE: [Rgb; 10] = [
    [86, 156, 214],
    [229, 142, 72],
    [106, 190, 110],
    [214, 96, 114],
    [160, 124, 206],
    [196, 160, 92],
    [80, 184, 184],
    [222, 120, 186],
    [150, 150, 150],
    [176, 196, 72],
];

/// Colors for one background mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Theme {
    pub background: Rgb,
    pub grid: Rgb,
    pub link: Rgb,
    pub label: Rgb,
    pub node_border: Rgb,
    pub emphasis: Rgb,
}

impl Theme {
    pub fn new(dark_mode: bool) -> Self {
        if dark_mode {
            Self {
                background: [19, 23, 29],
                grid: [60, 70, 80],
                link: [118, 132, 148],
                label: [226, 232, 240],
                node_border: [12, 14, 18],
                emphasis: [255, 214, 92],
            }
        } else {
            Self {
                background: [246, 247, 250],
                grid: [214, 220, 228],
                link: [128, 138, 150],
                label: [28, 32, 40],
                node_border: [255, 255, 255],
                emphasis: [214, 120, 0],
            }
        }
    }

    /// Palette color for a type tag. Depends only on the tag text.
    pub fn type_color(&self, type_tag: &str) -> Rgb {
        TYPE_PALETTE[(stable_hash(type_tag) % TYPE_PALETTE.len() as u64) as usize]
    }
}

pub fn blend(base: Rgb, overlay: Rgb, amount: f32) -> Rgb {
    let amount = if amount.is_finite() { amount.clamp(0.0, 1.0) } else { 0.0 };
    let inverse = 1.0 - amount;
    std::array::from_fn(|channel| {
        ((base[channel] as f32 * inverse) + (overlay[channel] as f32 * amount)).round() as u8
    })
}
