use std::fmt::Write as _;

use darkfog_core::schema::{DecodedField, FieldValue};
use darkfog_core::{
    CombatSettings, Compatibility, FieldTable, GameMode, HiveSummary, LocateStrategy, SaveSummary,
    SpliceStats,
};
use serde_json::{Map as JsonMap, Value as JsonValue};

const LABEL_WIDTH: usize = 24;
const REPORT_WIDTH: usize = 64;
const FIELD_NAME_WIDTH: usize = 28;
const FIELD_VALUE_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    #[default]
    CanonicalV1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextStyle {
    #[default]
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRenderOptions {
    pub verbose: bool,
}

pub fn render_json(summary: &SaveSummary, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Object(summary_json(summary)),
    }
}

pub fn render_text(summary: &SaveSummary, style: TextStyle) -> String {
    render_text_with_options(summary, style, TextRenderOptions::default())
}

pub fn render_text_with_options(
    summary: &SaveSummary,
    style: TextStyle,
    options: TextRenderOptions,
) -> String {
    match style {
        TextStyle::Report => render_report(summary, options),
    }
}

/// Every decoded header field with its offset, one per line.
pub fn render_field_dump(table: &FieldTable) -> String {
    let mut out = String::new();
    let mut section = "";
    for field in table.fields() {
        if field.section != section {
            section = field.section;
            writeln!(&mut out, "[{section}]").expect("writing to String cannot fail");
        }
        writeln!(&mut out, "{}", field_line(field)).expect("writing to String cannot fail");
    }
    out
}

pub fn render_compatibility(compat: &Compatibility) -> String {
    match compat {
        Compatibility::Identical => format!("OK: {compat}"),
        _ => format!("WARNING: {compat}"),
    }
}

pub fn render_splice_stats(stats: &SpliceStats) -> String {
    let mut out = String::new();
    write_row(&mut out, "Stars copied", &stats.stars_copied.to_string());
    write_row(&mut out, "Stars omitted", &stats.stars_omitted.to_string());
    write_row(&mut out, "Hives copied", &stats.hives_copied.to_string());
    write_row(
        &mut out,
        "Region size",
        &format!("{} bytes", format_number_with_commas(stats.region_len as u64)),
    );
    out
}

pub fn splice_stats_json(stats: &SpliceStats) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert(
        "stars_copied".to_string(),
        JsonValue::from(stats.stars_copied),
    );
    m.insert(
        "stars_omitted".to_string(),
        JsonValue::from(stats.stars_omitted),
    );
    m.insert(
        "hives_copied".to_string(),
        JsonValue::from(stats.hives_copied),
    );
    m.insert("region_len".to_string(), JsonValue::from(stats.region_len));
    JsonValue::Object(m)
}

fn summary_json(summary: &SaveSummary) -> JsonMap<String, JsonValue> {
    let mut out = JsonMap::new();

    out.insert(
        "game_name".to_string(),
        JsonValue::String(summary.game_name.clone()),
    );
    out.insert(
        "game_version".to_string(),
        JsonValue::String(summary.game_version.clone()),
    );
    out.insert("file_size".to_string(), JsonValue::from(summary.file_size));
    out.insert("file_len".to_string(), JsonValue::from(summary.file_len));
    out.insert(
        "size_consistent".to_string(),
        JsonValue::Bool(size_consistent(summary)),
    );
    out.insert(
        "galaxy_seed".to_string(),
        JsonValue::from(summary.galaxy_seed),
    );
    out.insert("star_count".to_string(), JsonValue::from(summary.star_count));
    out.insert(
        "resource_multiplier".to_string(),
        JsonValue::from(summary.resource_multiplier),
    );
    out.insert(
        "mode".to_string(),
        JsonValue::String(match summary.mode {
            GameMode::DarkFog => "dark_fog".to_string(),
            GameMode::Peace => "peace".to_string(),
        }),
    );
    out.insert("sandbox".to_string(), JsonValue::Bool(summary.sandbox));

    let mut flags = JsonMap::new();
    flags.insert(
        "header".to_string(),
        flag_json(summary.header_peace.offset, summary.header_peace.value),
    );
    flags.insert(
        "descriptor".to_string(),
        flag_json(summary.desc_peace.offset, summary.desc_peace.value),
    );
    out.insert("peace_flags".to_string(), JsonValue::Object(flags));

    out.insert(
        "combat_offset".to_string(),
        JsonValue::from(summary.combat_offset),
    );
    out.insert("combat".to_string(), combat_json(&summary.combat));
    out.insert("hives".to_string(), hives_json(&summary.hives));

    out
}

fn flag_json(offset: usize, value: bool) -> JsonValue {
    let mut m = JsonMap::new();
    m.insert("offset".to_string(), JsonValue::from(offset));
    m.insert("value".to_string(), JsonValue::Bool(value));
    JsonValue::Object(m)
}

fn combat_json(combat: &CombatSettings) -> JsonValue {
    let mut m = JsonMap::new();
    for (name, value) in combat_rows(combat) {
        m.insert(name.to_string(), JsonValue::from(value));
    }
    m.insert(
        "aggressiveness_label".to_string(),
        JsonValue::String(combat.aggressiveness_label().to_string()),
    );
    JsonValue::Object(m)
}

fn hives_json(hives: &HiveSummary) -> JsonValue {
    let mut m = JsonMap::new();
    match hives {
        HiveSummary::Located {
            strategy,
            count_offset,
            data_end,
            size,
            hive_count,
            stars_with_hives,
        } => {
            m.insert("status".to_string(), JsonValue::String("located".to_string()));
            m.insert(
                "strategy".to_string(),
                JsonValue::String(
                    match strategy {
                        LocateStrategy::Anchor => "anchor",
                        LocateStrategy::EmptyPattern => "empty_pattern",
                    }
                    .to_string(),
                ),
            );
            m.insert("count_offset".to_string(), JsonValue::from(*count_offset));
            m.insert("data_end".to_string(), JsonValue::from(*data_end));
            m.insert("size".to_string(), JsonValue::from(*size));
            m.insert("hive_count".to_string(), JsonValue::from(*hive_count));
            m.insert(
                "stars_with_hives".to_string(),
                JsonValue::from(*stars_with_hives),
            );
        }
        HiveSummary::Unavailable { reason } => {
            m.insert(
                "status".to_string(),
                JsonValue::String("unavailable".to_string()),
            );
            m.insert("reason".to_string(), JsonValue::String(reason.clone()));
        }
    }
    JsonValue::Object(m)
}

fn render_report(summary: &SaveSummary, options: TextRenderOptions) -> String {
    let mut out = String::new();
    writeln!(&mut out, "{}", centered_no_trailing("DYSON SPHERE PROGRAM SAVE", REPORT_WIDTH))
        .expect("writing to String cannot fail");
    writeln!(&mut out, "{}", centered_no_trailing(&summary.game_name, REPORT_WIDTH))
        .expect("writing to String cannot fail");
    writeln!(&mut out).expect("writing to String cannot fail");

    write_row(&mut out, "Game version", &summary.game_version);
    let size = format!(
        "{} bytes{}",
        format_number_with_commas(summary.file_len as u64),
        if size_consistent(summary) {
            String::new()
        } else {
            format!(" (header says {})", summary.file_size)
        }
    );
    write_row(&mut out, "File size", &size);
    write_row(&mut out, "Galaxy seed", &summary.galaxy_seed.to_string());
    write_row(&mut out, "Stars", &summary.star_count.to_string());
    write_row(
        &mut out,
        "Resource multiplier",
        &format!("{:.1}", summary.resource_multiplier),
    );
    let mode = if summary.sandbox {
        format!("{} (sandbox)", summary.mode)
    } else {
        summary.mode.to_string()
    };
    write_row(&mut out, "Mode", &mode);
    if options.verbose {
        write_row(
            &mut out,
            "Header peace flag",
            &format!(
                "{} @ {:#x}",
                summary.header_peace.value, summary.header_peace.offset
            ),
        );
        write_row(
            &mut out,
            "Descriptor peace flag",
            &format!(
                "{} @ {:#x}",
                summary.desc_peace.value, summary.desc_peace.offset
            ),
        );
        write_row(
            &mut out,
            "Combat settings",
            &format!("@ {:#x}", summary.combat_offset),
        );
    }

    writeln!(&mut out).expect("writing to String cannot fail");
    writeln!(&mut out, "COMBAT").expect("writing to String cannot fail");
    write_row(
        &mut out,
        "Aggressiveness",
        &format!(
            "{} ({})",
            trim_float(summary.combat.aggressiveness),
            summary.combat.aggressiveness_label()
        ),
    );
    for (name, value) in combat_rows(&summary.combat).into_iter().skip(1) {
        write_row(&mut out, &combat_label(name), &trim_float(value));
    }

    writeln!(&mut out).expect("writing to String cannot fail");
    writeln!(&mut out, "HIVES").expect("writing to String cannot fail");
    match &summary.hives {
        HiveSummary::Located {
            strategy,
            count_offset,
            data_end,
            size,
            hive_count,
            stars_with_hives,
        } => {
            write_row(&mut out, "Hives", &hive_count.to_string());
            write_row(
                &mut out,
                "Stars with hives",
                &format!("{stars_with_hives} of {}", summary.star_count),
            );
            write_row(
                &mut out,
                "Region",
                &format!(
                    "{count_offset:#x}..{data_end:#x} ({} bytes)",
                    format_number_with_commas(*size as u64)
                ),
            );
            if options.verbose {
                write_row(
                    &mut out,
                    "Located by",
                    match strategy {
                        LocateStrategy::Anchor => "hive magic anchor",
                        LocateStrategy::EmptyPattern => "empty-region heuristic",
                    },
                );
            }
        }
        HiveSummary::Unavailable { reason } => {
            write_row(&mut out, "Hives", &fit_column(reason, FIELD_VALUE_WIDTH));
        }
    }

    out
}

fn combat_rows(combat: &CombatSettings) -> [(&'static str, f32); 9] {
    [
        ("aggressiveness", combat.aggressiveness),
        ("initial_level", combat.initial_level),
        ("initial_growth", combat.initial_growth),
        ("initial_colonize", combat.initial_colonize),
        ("max_density", combat.max_density),
        ("growth_speed", combat.growth_speed),
        ("power_threat", combat.power_threat),
        ("battle_threat", combat.battle_threat),
        ("battle_exp", combat.battle_exp),
    ]
}

fn combat_label(name: &str) -> String {
    let mut label = String::with_capacity(name.len());
    for (i, word) in name.split('_').enumerate() {
        if i > 0 {
            label.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                label.extend(first.to_uppercase());
            } else {
                label.push(first);
            }
            label.push_str(chars.as_str());
        }
    }
    label
}

fn field_line(field: &DecodedField) -> String {
    let value = match &field.value {
        FieldValue::I32(v) => v.to_string(),
        FieldValue::I64(v) => v.to_string(),
        FieldValue::U64(v) => v.to_string(),
        FieldValue::F32(v) => trim_float(*v),
        FieldValue::Flag(v) => format!("{} ({v})", *v != 0),
        FieldValue::Bytes(b) => hex_bytes(b),
        FieldValue::String(s) => format!("{s:?}"),
        FieldValue::Skipped { count } => format!("<{count} skipped>"),
    };
    let line = format!(
        "  {:#08x}  {:<name$}{}",
        field.offset,
        fit_column(field.name, FIELD_NAME_WIDTH - 1),
        fit_column(&value, FIELD_VALUE_WIDTH),
        name = FIELD_NAME_WIDTH
    );
    line.trim_end().to_string()
}

fn write_row(out: &mut String, label: &str, value: &str) {
    let line = format!("  {:<width$}{}", format!("{label}:"), value, width = LABEL_WIDTH);
    writeln!(out, "{}", line.trim_end()).expect("writing to String cannot fail");
}

fn size_consistent(summary: &SaveSummary) -> bool {
    usize::try_from(summary.file_size).is_ok_and(|size| size == summary.file_len)
}

fn hex_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        write!(&mut out, "{b:02x}").expect("writing to String cannot fail");
    }
    out
}

fn trim_float(v: f32) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}

fn fit_column(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    if width <= 3 {
        return value.chars().take(width).collect();
    }

    let mut out = String::with_capacity(width);
    for ch in value.chars().take(width - 3) {
        out.push(ch);
    }
    out.push_str("...");
    out
}

fn centered_no_trailing(value: &str, width: usize) -> String {
    let len = value.chars().count();
    if len >= width {
        return value.to_string();
    }

    let left_padding = (width - len) / 2;
    format!("{}{}", " ".repeat(left_padding), value)
}

fn format_number_with_commas(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(c);
    }
    result
}
