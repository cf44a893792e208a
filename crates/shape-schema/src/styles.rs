//! Enumerated style properties shared by the shape kinds.

use std::sync::OnceLock;

use record_migrate::{EnumStyle, StepError, StyleRegistry};

pub const GEO: &str = "shape:geo";
pub const COLOR: &str = "shape:color";
pub const LABEL_COLOR: &str = "shape:labelColor";
pub const FILL: &str = "shape:fill";
pub const DASH: &str = "shape:dash";
pub const SIZE: &str = "shape:size";
pub const FONT: &str = "shape:font";
pub const HORIZONTAL_ALIGN: &str = "shape:horizontalAlign";
pub const VERTICAL_ALIGN: &str = "shape:verticalAlign";

const COLORS: &[&str] = &[
    "black",
    "grey",
    "light-violet",
    "violet",
    "blue",
    "light-blue",
    "yellow",
    "orange",
    "green",
    "light-green",
    "light-red",
    "red",
    "white",
];

const GEOS: &[&str] = &[
    "cloud",
    "rectangle",
    "ellipse",
    "triangle",
    "diamond",
    "pentagon",
    "hexagon",
    "octagon",
    "star",
    "rhombus",
    "rhombus-2",
    "oval",
    "trapezoid",
    "arrow-right",
    "arrow-left",
    "arrow-up",
    "arrow-down",
    "x-box",
    "check-box",
    "heart",
];

/// The style registry every shape kind validates against.
///
/// Built once; steps read defaults from it and the validator checks tokens
/// with it.
pub fn shape_styles() -> &'static StyleRegistry {
    static STYLES: OnceLock<StyleRegistry> = OnceLock::new();
    STYLES.get_or_init(|| {
        StyleRegistry::new()
            .with(EnumStyle::new(GEO, "rectangle", GEOS.iter().copied()))
            .with(EnumStyle::new(COLOR, "black", COLORS.iter().copied()))
            .with(EnumStyle::new(LABEL_COLOR, "black", COLORS.iter().copied()))
            .with(EnumStyle::new(
                FILL,
                "none",
                ["none", "semi", "solid", "pattern", "fill"],
            ))
            .with(EnumStyle::new(
                DASH,
                "draw",
                ["draw", "solid", "dashed", "dotted"],
            ))
            .with(EnumStyle::new(SIZE, "m", ["s", "m", "l", "xl"]))
            .with(EnumStyle::new(FONT, "draw", ["draw", "sans", "serif", "mono"]))
            .with(EnumStyle::new(
                HORIZONTAL_ALIGN,
                "middle",
                [
                    "start",
                    "middle",
                    "end",
                    "start-legacy",
                    "end-legacy",
                    "middle-legacy",
                ],
            ))
            .with(EnumStyle::new(
                VERTICAL_ALIGN,
                "middle",
                ["start", "middle", "end"],
            ))
    })
}

/// Default token of `style`, as a step failure if the style is unknown.
pub(crate) fn default_token(style: &str) -> Result<&'static str, StepError> {
    shape_styles()
        .get(style)
        .map(EnumStyle::default_value)
        .ok_or_else(|| StepError::new(format!("unknown style {style}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_has_twenty_shapes() {
        let geo = shape_styles().get(GEO).unwrap();
        assert_eq!(geo.values().len(), 20);
        assert_eq!(geo.default_value(), "rectangle");
        assert!(geo.is_valid("cloud"));
        assert!(geo.is_valid("check-box"));
        assert!(!geo.is_valid("circle"));
    }

    #[test]
    fn justify_is_not_an_alignment() {
        let styles = shape_styles();
        assert_eq!(styles.is_valid(HORIZONTAL_ALIGN, "justify"), Some(false));
        assert_eq!(styles.is_valid(HORIZONTAL_ALIGN, "end-legacy"), Some(true));
        assert_eq!(styles.is_valid(VERTICAL_ALIGN, "end-legacy"), Some(false));
    }

    #[test]
    fn defaults() {
        assert_eq!(default_token(LABEL_COLOR).unwrap(), "black");
        assert_eq!(default_token(VERTICAL_ALIGN).unwrap(), "middle");
        assert!(default_token("shape:nope").is_err());
    }
}
