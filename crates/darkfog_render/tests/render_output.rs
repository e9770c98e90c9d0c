use darkfog_core::fixture::SaveBuilder;
use darkfog_core::{Compatibility, Difficulty, FieldTable, SaveFile, SpliceStats};
use darkfog_render::{
    JsonStyle, TextRenderOptions, TextStyle, render_compatibility, render_field_dump,
    render_json, render_splice_stats, render_text, render_text_with_options,
};

fn row(label: &str, value: &str) -> String {
    format!("  {:<24}{}", format!("{label}:"), value)
}

fn dark_fog_save() -> SaveFile {
    SaveFile::from_bytes(
        SaveBuilder::new(4)
            .game_name("Orion Relay")
            .seed(12345)
            .hives_per_star(&[1, 0, 2, 0])
            .combat(Difficulty::High.settings())
            .build(),
    )
    .expect("fixture should parse")
}

#[test]
fn json_uses_canonical_top_level_order() {
    let value = render_json(&dark_fog_save().summary(), JsonStyle::CanonicalV1);
    let keys: Vec<&str> = value
        .as_object()
        .expect("json should be an object")
        .keys()
        .map(String::as_str)
        .collect();

    assert_eq!(
        keys,
        vec![
            "game_name",
            "game_version",
            "file_size",
            "file_len",
            "size_consistent",
            "galaxy_seed",
            "star_count",
            "resource_multiplier",
            "mode",
            "sandbox",
            "peace_flags",
            "combat_offset",
            "combat",
            "hives",
        ]
    );
}

#[test]
fn json_reports_hive_region() {
    let value = render_json(&dark_fog_save().summary(), JsonStyle::CanonicalV1);
    assert_eq!(value["game_name"], "Orion Relay");
    assert_eq!(value["galaxy_seed"], 12345);
    assert_eq!(value["mode"], "dark_fog");
    assert_eq!(value["size_consistent"], true);
    assert_eq!(value["hives"]["status"], "located");
    assert_eq!(value["hives"]["strategy"], "anchor");
    assert_eq!(value["hives"]["hive_count"], 3);
    assert_eq!(value["hives"]["stars_with_hives"], 2);
    assert_eq!(value["combat"]["aggressiveness"], 4.0);
    assert_eq!(value["combat"]["aggressiveness_label"], "Rampage");
}

#[test]
fn json_reports_unavailable_hives() {
    let fixture = SaveBuilder::new(4).peace_mode(true).build_with_layout();
    let mut bytes = fixture.bytes.clone();
    // wipe the trailer so neither strategy matches
    let end = fixture.region.data_end;
    bytes[end..end + 16].fill(0xEE);
    let save = SaveFile::from_bytes(bytes).unwrap();
    let value = render_json(&save.summary(), JsonStyle::CanonicalV1);
    assert_eq!(value["hives"]["status"], "unavailable");
    assert!(value["hives"]["reason"].as_str().unwrap().contains("no anchored"));
}

#[test]
fn text_report_shows_mode_and_hives() {
    let peace = SaveFile::from_bytes(SaveBuilder::new(2).peace_mode(true).sandbox(true).build())
        .unwrap();
    let text = render_text(&peace.summary(), TextStyle::Report);
    assert!(text.contains("DYSON SPHERE PROGRAM SAVE"));
    assert!(text.contains(&row("Mode", "peace (sandbox)")));
    assert!(text.contains(&row("Stars", "2")));
    assert!(text.contains(&row("Hives", "0")));
    assert!(!text.contains("Header peace flag"));
    assert!(text.lines().all(|l| l == l.trim_end()));
}

#[test]
fn verbose_text_adds_offsets() {
    let save = dark_fog_save();
    let text = render_text_with_options(
        &save.summary(),
        TextStyle::Report,
        TextRenderOptions { verbose: true },
    );
    let offset = save.fields().header_peace.offset;
    assert!(text.contains(&row("Header peace flag", &format!("false @ {offset:#x}"))));
    assert!(text.contains(&row("Located by", "hive magic anchor")));
    assert!(text.contains(&row("Aggressiveness", "4 (Rampage)")));
}

#[test]
fn field_dump_lists_every_section() {
    let bytes = SaveBuilder::new(3).game_name("Dump").build();
    let dump = render_field_dump(&FieldTable::decode(&bytes).unwrap());
    for section in ["[prefix]", "[account]", "[game_name]", "[game_desc]", "[combat]"] {
        assert!(dump.contains(section), "missing {section}");
    }
    assert!(dump.contains("\"Dump\""));
    assert!(dump.contains("56 46 53 41 56 45"));
}

#[test]
fn compatibility_and_stats_text() {
    assert!(render_compatibility(&Compatibility::Identical).starts_with("OK:"));
    let warn = render_compatibility(&Compatibility::SeedMismatch {
        source: 1,
        target: 2,
    });
    assert!(warn.starts_with("WARNING:"));

    let text = render_splice_stats(&SpliceStats {
        stars_copied: 63,
        stars_omitted: 1,
        hives_copied: 140,
        region_len: 1_234_567,
    });
    assert!(text.contains(&row("Hives copied", "140")));
    assert!(text.contains("1,234,567 bytes"));
}
