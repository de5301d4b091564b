use anyhow::{anyhow, Result};
use eframe::egui::Color32;
use serde::Deserialize;

/// Colors used by the card renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub background: Color32,
    pub card: Color32,
    pub card_border: Color32,
    pub cover_idle: Color32,
    pub cover_playing: Color32,
    pub cover_label: Color32,
    pub accent: Color32,
    pub chip: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
    pub text_muted: Color32,
    pub like_veil: Color32,
    pub skip_veil: Color32,
    pub error: Color32,
    pub warning: Color32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Color32::from_rgb(18, 18, 20),
            card: Color32::from_rgb(32, 32, 36),
            card_border: Color32::from_rgb(80, 80, 90),
            cover_idle: Color32::from_rgb(64, 64, 72),
            cover_playing: Color32::from_rgb(70, 90, 120),
            cover_label: Color32::from_rgb(160, 160, 170),
            accent: Color32::from_rgb(55, 120, 230),
            chip: Color32::from_rgb(50, 97, 210),
            text_primary: Color32::from_rgb(245, 245, 245),
            text_secondary: Color32::from_rgb(210, 210, 210),
            text_muted: Color32::from_rgb(180, 180, 190),
            like_veil: Color32::from_rgba_unmultiplied(10, 170, 80, 120),
            skip_veil: Color32::from_rgba_unmultiplied(200, 40, 40, 120),
            error: Color32::from_rgb(220, 80, 80),
            warning: Color32::from_rgb(240, 200, 80),
        }
    }
}

/// `[theme]` table as written in the config file. Every key is optional.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ThemeSection {
    background: Option<String>,
    card: Option<String>,
    card_border: Option<String>,
    cover_idle: Option<String>,
    cover_playing: Option<String>,
    cover_label: Option<String>,
    accent: Option<String>,
    chip: Option<String>,
    text_primary: Option<String>,
    text_secondary: Option<String>,
    text_muted: Option<String>,
    like_veil: Option<String>,
    skip_veil: Option<String>,
}

impl ThemeSection {
    /// Resolves the section on top of the default palette. Unparseable
    /// entries keep their default and produce a warning.
    pub fn resolve(&self, warnings: &mut Vec<String>) -> Palette {
        let mut palette = Palette::default();
        let slots: [(&str, &Option<String>, &mut Color32); 13] = [
            ("background", &self.background, &mut palette.background),
            ("card", &self.card, &mut palette.card),
            ("card_border", &self.card_border, &mut palette.card_border),
            ("cover_idle", &self.cover_idle, &mut palette.cover_idle),
            ("cover_playing", &self.cover_playing, &mut palette.cover_playing),
            ("cover_label", &self.cover_label, &mut palette.cover_label),
            ("accent", &self.accent, &mut palette.accent),
            ("chip", &self.chip, &mut palette.chip),
            ("text_primary", &self.text_primary, &mut palette.text_primary),
            ("text_secondary", &self.text_secondary, &mut palette.text_secondary),
            ("text_muted", &self.text_muted, &mut palette.text_muted),
            ("like_veil", &self.like_veil, &mut palette.like_veil),
            ("skip_veil", &self.skip_veil, &mut palette.skip_veil),
        ];

        for (key, value, slot) in slots {
            let Some(raw) = value else {
                continue;
            };
            match parse_color(raw) {
                Ok(color) => *slot = color,
                Err(err) => warnings.push(format!("theme.{key}: {err}")),
            }
        }

        palette
    }
}

pub fn parse_color(value: &str) -> Result<Color32> {
    let v = value.trim();
    if v.eq_ignore_ascii_case("transparent") {
        return Ok(Color32::TRANSPARENT);
    }
    if let Some(hex) = v.strip_prefix('#') {
        return parse_hex_color(hex);
    }
    if let Some(rest) = v.strip_prefix("rgba(") {
        let (r, g, b, a) = parse_rgba_components(rest.trim_end_matches(')'))?;
        return Ok(Color32::from_rgba_unmultiplied(r, g, b, a));
    }
    if let Some(rest) = v.strip_prefix("rgb(") {
        let (r, g, b) = parse_rgb_components(rest.trim_end_matches(')'))?;
        return Ok(Color32::from_rgb(r, g, b));
    }
    Err(anyhow!("Unsupported color format: {v}"))
}

fn parse_hex_color(hex: &str) -> Result<Color32> {
    let value = hex.trim();
    if !matches!(value.len(), 6 | 8) {
        return Err(anyhow!("Invalid hex color: #{value}"));
    }
    let bits =
        u32::from_str_radix(value, 16).map_err(|_| anyhow!("Invalid hex color: #{value}"))?;

    Ok(if value.len() == 6 {
        let [_, r, g, b] = bits.to_be_bytes();
        Color32::from_rgb(r, g, b)
    } else {
        let [r, g, b, a] = bits.to_be_bytes();
        Color32::from_rgba_unmultiplied(r, g, b, a)
    })
}

fn parse_rgba_components(input: &str) -> Result<(u8, u8, u8, u8)> {
    let parts: Vec<_> = input.split(',').map(|p| p.trim()).collect();
    if parts.len() != 4 {
        return Err(anyhow!("rgba expects 4 components"));
    }
    let (r, g, b) = parse_rgb_components(&parts[0..3].join(","))?;
    let a = parse_alpha(parts[3])?;
    Ok((r, g, b, a))
}

fn parse_rgb_components(input: &str) -> Result<(u8, u8, u8)> {
    let parts: Vec<_> = input.split(',').map(|p| p.trim()).collect();
    if parts.len() != 3 {
        return Err(anyhow!("rgb expects 3 components"));
    }
    Ok((
        parse_component(parts[0])?,
        parse_component(parts[1])?,
        parse_component(parts[2])?,
    ))
}

fn parse_component(src: &str) -> Result<u8> {
    src.parse::<u8>()
        .map_err(|_| anyhow!("Color component out of range: {src}"))
}

/// Alpha with a decimal point is a 0..=1 fraction; anything else is a
/// 0..=255 integer.
fn parse_alpha(src: &str) -> Result<u8> {
    if src.contains('.') {
        let value: f32 = src
            .parse()
            .map_err(|_| anyhow!("Invalid alpha value: {src}"))?;
        if !(0.0..=1.0).contains(&value) {
            return Err(anyhow!("Alpha out of range: {src}"));
        }
        Ok((value * 255.0).round() as u8)
    } else {
        parse_component(src)
    }
}
