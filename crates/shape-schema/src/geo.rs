//! The `geo` shape: rectangles, ellipses, clouds and friends with a label.

use record_migrate::{
    is_valid_link_url, migration_ids, Down, FieldRule, KindSchema, MigrationIds,
    MigrationSequence, PropertyBag, SequenceIntegrityError, StepError, Value,
};

use crate::shape::with_shape_fields;
use crate::styles::{self, default_token};

/// Steps of the `com.shape.geo` props sequence.
#[migration_ids(sequence = "com.shape.geo")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeoVersions {
    AddUrlProp = 1,
    AddLabelColor = 2,
    RemoveJustify = 3,
    AddCheckBox = 4,
    AddVerticalAlign = 5,
    MigrateLegacyAlign = 6,
    AddCloud = 7,
    MakeUrlsValid = 8,
    AddScale = 9,
    AddLabelSize = 10,
}

/// History of the geo props.
///
/// Everything up to `AddCloud` predates down migrations and is one-way.
pub fn geo_migrations() -> Result<MigrationSequence, SequenceIntegrityError> {
    MigrationSequence::builder(GeoVersions::sequence_id())
        .step(
            GeoVersions::AddUrlProp.step_id(),
            |p: PropertyBag| Ok(p.with("url", "")),
            Down::NotReversible,
        )
        .step(
            GeoVersions::AddLabelColor.step_id(),
            |p: PropertyBag| Ok(p.with("labelColor", default_token(styles::LABEL_COLOR)?)),
            Down::NotReversible,
        )
        .step(
            GeoVersions::RemoveJustify.step_id(),
            remove_justify,
            Down::NotReversible,
        )
        // Only widened the geo style.
        .step(GeoVersions::AddCheckBox.step_id(), Ok, Down::NotReversible)
        .step(
            GeoVersions::AddVerticalAlign.step_id(),
            |p: PropertyBag| Ok(p.with("verticalAlign", default_token(styles::VERTICAL_ALIGN)?)),
            Down::NotReversible,
        )
        .step(
            GeoVersions::MigrateLegacyAlign.step_id(),
            migrate_legacy_align,
            Down::NotReversible,
        )
        .step(GeoVersions::AddCloud.step_id(), Ok, Down::NotReversible)
        .step(
            GeoVersions::MakeUrlsValid.step_id(),
            make_urls_valid,
            Down::identity(),
        )
        .step(
            GeoVersions::AddScale.step_id(),
            |p: PropertyBag| Ok(p.with("scale", 1)),
            Down::reversible(|p: PropertyBag| Ok(p.without("scale"))),
        )
        .step(
            GeoVersions::AddLabelSize.step_id(),
            |p: PropertyBag| Ok(p.with("labelSize", Value::Null)),
            Down::reversible(|p: PropertyBag| Ok(p.without("labelSize"))),
        )
        .build()
}

fn remove_justify(props: PropertyBag) -> Result<PropertyBag, StepError> {
    if props.get_str("align") == Some("justify") {
        Ok(props.with("align", "start"))
    } else {
        Ok(props)
    }
}

fn migrate_legacy_align(props: PropertyBag) -> Result<PropertyBag, StepError> {
    let align = match props.get_str("align") {
        Some("start") => "start-legacy",
        Some("end") => "end-legacy",
        _ => "middle-legacy",
    };
    Ok(props.with("align", align))
}

fn make_urls_valid(props: PropertyBag) -> Result<PropertyBag, StepError> {
    let valid = props.get_str("url").map_or(false, is_valid_link_url);
    if valid {
        Ok(props)
    } else {
        Ok(props.with("url", ""))
    }
}

/// Current geo props, including the shared shape fields.
pub fn geo_kind_schema() -> KindSchema {
    with_shape_fields(KindSchema::new("geo"))
        .field("geo", FieldRule::style(styles::GEO))
        .field("labelColor", FieldRule::style(styles::LABEL_COLOR))
        .field("color", FieldRule::style(styles::COLOR))
        .field("fill", FieldRule::style(styles::FILL))
        .field("dash", FieldRule::style(styles::DASH))
        .field("size", FieldRule::style(styles::SIZE))
        .field("font", FieldRule::style(styles::FONT))
        .field("align", FieldRule::style(styles::HORIZONTAL_ALIGN))
        .field("verticalAlign", FieldRule::style(styles::VERTICAL_ALIGN))
        .field("url", FieldRule::LinkUrl)
        .field("w", FieldRule::NonZeroNumber)
        .field("h", FieldRule::NonZeroNumber)
        .field("growY", FieldRule::PositiveNumber)
        .field("text", FieldRule::String)
        .field("scale", FieldRule::NonZeroNumber)
        .field("labelSize", FieldRule::Vec2.nullable())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(version: u32) -> record_migrate::MigrationStep {
        geo_migrations().unwrap().step(version).unwrap().clone()
    }

    #[test]
    fn ten_steps_in_order() {
        let seq = geo_migrations().unwrap();
        assert_eq!(seq.len(), GeoVersions::ALL.len());
        assert_eq!(seq.latest(), GeoVersions::AddLabelSize.step_id());
        let reversible: Vec<u32> = seq
            .steps()
            .iter()
            .filter(|s| s.is_reversible())
            .map(|s| s.id().version)
            .collect();
        assert_eq!(reversible, vec![8, 9, 10]);
    }

    #[test]
    fn justify_becomes_start() {
        let justify = PropertyBag::new().with("align", "justify");
        let out = step(3).apply_up(justify).unwrap();
        assert_eq!(out.get_str("align"), Some("start"));

        let middle = PropertyBag::new().with("align", "middle");
        assert_eq!(step(3).apply_up(middle.clone()).unwrap(), middle);
    }

    #[test]
    fn legacy_align_mapping() {
        for (before, after) in [
            ("start", "start-legacy"),
            ("end", "end-legacy"),
            ("middle", "middle-legacy"),
            ("whatever", "middle-legacy"),
        ] {
            let out = step(6)
                .apply_up(PropertyBag::new().with("align", before))
                .unwrap();
            assert_eq!(out.get_str("align"), Some(after), "{before}");
        }
        let missing = step(6).apply_up(PropertyBag::new()).unwrap();
        assert_eq!(missing.get_str("align"), Some("middle-legacy"));
    }

    #[test]
    fn invalid_urls_are_cleared() {
        let bad = PropertyBag::new().with("url", "javascript:alert(1)");
        assert_eq!(step(8).apply_up(bad).unwrap().get_str("url"), Some(""));

        let good = PropertyBag::new().with("url", "https://example.com/a");
        assert_eq!(step(8).apply_up(good.clone()).unwrap(), good);

        let not_a_string = PropertyBag::new().with("url", 3);
        assert_eq!(step(8).apply_up(not_a_string).unwrap().get_str("url"), Some(""));

        // Down leaves the cleaned url alone.
        let cleaned = PropertyBag::new().with("url", "");
        assert_eq!(step(8).apply_down(cleaned.clone()).unwrap().unwrap(), cleaned);
    }

    #[test]
    fn defaults_come_from_the_style_registry() {
        let out = step(2).apply_up(PropertyBag::new()).unwrap();
        assert_eq!(out.get_str("labelColor"), Some("black"));
        let out = step(5).apply_up(PropertyBag::new()).unwrap();
        assert_eq!(out.get_str("verticalAlign"), Some("middle"));
    }

    #[test]
    fn label_size_round_trip() {
        let before = PropertyBag::new().with("scale", 1);
        let up = step(10).apply_up(before.clone()).unwrap();
        assert!(up.get("labelSize").is_some_and(Value::is_null));
        assert_eq!(step(10).apply_down(up).unwrap().unwrap(), before);
    }
}
