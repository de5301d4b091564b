use eframe::egui::{
    self, pos2, vec2, Align2, Color32, CornerRadius, FontId, Painter, Pos2, Rect, Shape, Stroke,
    StrokeKind, TextureHandle,
};
use std::time::Duration;

use crate::{
    input::HOTKEY_HINT,
    pipeline::PreviewOutcome,
    state::{CardState, Overlay},
    theme::Palette,
};

pub const SCREEN_WIDTH: f32 = 900.0;
pub const SCREEN_HEIGHT: f32 = 600.0;
pub const CARD_WIDTH: f32 = 520.0;
pub const CARD_HEIGHT: f32 = 360.0;

const CARD_PADDING: f32 = 24.0;
const COVER_SIZE: f32 = 240.0;
const ICON_RADIUS: f32 = 20.0;
const CHIP_QUERY_CHARS: usize = 14;

const PLACEHOLDER_TITLE: &str = "Track Title";
const PLACEHOLDER_ARTIST: &str = "Artist Name";
const PLACEHOLDER_CONTEXT: &str = "Genre • 110 BPM";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub text: String,
    pub severity: Severity,
}

impl Diagnostic {
    fn new(text: impl Into<String>, severity: Severity) -> Self {
        Self {
            text: text.into(),
            severity,
        }
    }

    fn color(&self, palette: &Palette) -> Color32 {
        match self.severity {
            Severity::Info => palette.text_muted,
            Severity::Warning => palette.warning,
            Severity::Error => palette.error,
        }
    }
}

/// The one line of on-screen status about the fetched preview.
pub fn diagnostic_line(
    pending: bool,
    outcome: Option<&PreviewOutcome>,
    audio_err: Option<&str>,
) -> Diagnostic {
    if pending {
        return Diagnostic::new("Fetching preview...", Severity::Info);
    }
    let Some(outcome) = outcome else {
        return Diagnostic::new("", Severity::Info);
    };
    if let Some(err) = outcome.first_error() {
        return Diagnostic::new(err, Severity::Error);
    }
    if outcome.no_preview() {
        return Diagnostic::new("No preview available", Severity::Info);
    }
    if let Some(err) = audio_err {
        return Diagnostic::new(format!("Audio unavailable: {err}"), Severity::Warning);
    }
    match &outcome.audio_path {
        Some(path) => Diagnostic::new(format!("Preview ready: {}", path.display()), Severity::Info),
        None => Diagnostic::new("", Severity::Info),
    }
}

pub fn format_timestamp(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let secs = total_seconds % 60;
    format!("{minutes}:{secs:02}")
}

pub fn card_rect(screen: Rect) -> Rect {
    Rect::from_center_size(screen.center(), vec2(CARD_WIDTH, CARD_HEIGHT))
}

fn chip_label(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.chars().count() <= CHIP_QUERY_CHARS {
        return format!("Why this track? \"{trimmed}\"");
    }
    let head: String = trimmed.chars().take(CHIP_QUERY_CHARS - 1).collect();
    format!("Why this track? \"{head}…\"")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub position: Duration,
    pub length: Option<Duration>,
}

impl Progress {
    pub fn fraction(&self) -> f32 {
        match self.length {
            Some(length) if !length.is_zero() => {
                (self.position.as_secs_f32() / length.as_secs_f32()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}

/// Everything a frame draws. Built fresh each frame from the app.
pub struct CardView<'a> {
    pub state: &'a CardState,
    pub palette: &'a Palette,
    pub title: &'a str,
    pub artist: &'a str,
    pub context: &'a str,
    pub query: &'a str,
    pub cover: Option<&'a TextureHandle>,
    pub progress: Option<Progress>,
    pub diagnostic: Diagnostic,
}

impl<'a> CardView<'a> {
    pub fn metadata(outcome: Option<&'a PreviewOutcome>) -> (&'a str, &'a str, &'a str) {
        let Some(track) = outcome.map(|o| &o.track) else {
            return (PLACEHOLDER_TITLE, PLACEHOLDER_ARTIST, PLACEHOLDER_CONTEXT);
        };
        let or = |value: &'a str, fallback: &'a str| if value.is_empty() { fallback } else { value };
        (
            or(&track.title, PLACEHOLDER_TITLE),
            or(&track.artist, PLACEHOLDER_ARTIST),
            or(&track.album, PLACEHOLDER_CONTEXT),
        )
    }
}

pub fn draw_frame(painter: &Painter, screen: Rect, view: &CardView<'_>) {
    let palette = view.palette;
    painter.rect_filled(screen, CornerRadius::ZERO, palette.background);

    painter.text(
        screen.min + vec2(24.0, 20.0),
        Align2::LEFT_TOP,
        "Swipe Sonic",
        FontId::proportional(28.0),
        palette.text_primary,
    );
    painter.text(
        screen.min + vec2(24.0, 58.0),
        Align2::LEFT_TOP,
        HOTKEY_HINT,
        FontId::proportional(18.0),
        palette.text_secondary,
    );

    let card = card_rect(screen);
    draw_card(painter, card, view);

    painter.text(
        pos2(screen.min.x + 24.0, screen.max.y - 58.0),
        Align2::LEFT_TOP,
        &view.diagnostic.text,
        FontId::proportional(16.0),
        view.diagnostic.color(palette),
    );
    painter.text(
        pos2(screen.min.x + 24.0, screen.max.y - 34.0),
        Align2::LEFT_TOP,
        format!("Status: {}", view.state.status_label()),
        FontId::proportional(18.0),
        palette.text_secondary,
    );

    if let Some(overlay) = view.state.overlay() {
        draw_overlay(painter, screen, palette, overlay);
    }
}

fn draw_card(painter: &Painter, card: Rect, view: &CardView<'_>) {
    let palette = view.palette;
    painter.rect_filled(card, CornerRadius::same(20), palette.card);
    painter.rect_stroke(
        card,
        CornerRadius::same(20),
        Stroke::new(2.0, palette.card_border),
        StrokeKind::Inside,
    );

    let cover = Rect::from_min_size(
        card.min + vec2(CARD_PADDING, CARD_PADDING),
        vec2(COVER_SIZE, COVER_SIZE),
    );
    match view.cover {
        Some(texture) => {
            painter.image(
                texture.id(),
                cover,
                Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                Color32::WHITE,
            );
        }
        None => {
            let fill = if view.state.playing {
                palette.cover_playing
            } else {
                palette.cover_idle
            };
            painter.rect_filled(cover, CornerRadius::same(10), fill);
            painter.text(
                cover.center(),
                Align2::CENTER_CENTER,
                "COVER",
                FontId::proportional(32.0),
                palette.cover_label,
            );
        }
    }

    let text_x = cover.max.x + CARD_PADDING;
    let text_width = card.max.x - CARD_PADDING - text_x;
    let lines = [
        (view.title, 26.0, palette.text_primary, 0.0),
        (view.artist, 22.0, palette.text_secondary, 36.0),
        (view.context, 20.0, palette.text_muted, 70.0),
    ];
    for (text, size, color, offset) in lines {
        let clip = Rect::from_min_size(pos2(text_x, cover.min.y + offset), vec2(text_width, size + 8.0));
        painter.with_clip_rect(clip).text(
            clip.min,
            Align2::LEFT_TOP,
            text,
            FontId::proportional(size),
            color,
        );
    }

    let icon_center = pos2(card.max.x - 44.0, card.min.y + 44.0);
    draw_play_pause_icon(painter, icon_center, ICON_RADIUS, view.state.playing, palette);

    if let Some(progress) = view.progress {
        let bar = Rect::from_min_size(pos2(text_x, cover.max.y - 40.0), vec2(text_width, 6.0));
        draw_progress(painter, bar, progress, palette);
    }

    let chip = Rect::from_min_size(
        pos2(card.min.x + CARD_PADDING, card.max.y - 60.0),
        vec2(260.0, 36.0),
    );
    painter.rect_filled(chip, CornerRadius::same(18), palette.chip);
    painter.with_clip_rect(chip.shrink(4.0)).text(
        pos2(chip.min.x + 10.0, chip.center().y),
        Align2::LEFT_CENTER,
        chip_label(view.query),
        FontId::proportional(16.0),
        palette.text_primary,
    );
}

fn draw_play_pause_icon(painter: &Painter, center: Pos2, r: f32, playing: bool, palette: &Palette) {
    painter.circle_filled(center, r, palette.accent);
    if playing {
        let w = r * 0.35;
        let h = r * 0.9;
        let gap = r * 0.25;
        let left = Rect::from_min_size(pos2(center.x - gap - w, center.y - h / 2.0), vec2(w, h));
        let right = Rect::from_min_size(pos2(center.x + gap, center.y - h / 2.0), vec2(w, h));
        painter.rect_filled(left, CornerRadius::same(2), palette.text_primary);
        painter.rect_filled(right, CornerRadius::same(2), palette.text_primary);
    } else {
        let points = vec![
            pos2(center.x - r * 0.35, center.y - r * 0.6),
            pos2(center.x + r * 0.65, center.y),
            pos2(center.x - r * 0.35, center.y + r * 0.6),
        ];
        painter.add(Shape::convex_polygon(points, palette.text_primary, Stroke::NONE));
    }
}

fn draw_progress(painter: &Painter, bar: Rect, progress: Progress, palette: &Palette) {
    painter.rect_filled(bar, CornerRadius::same(3), palette.card_border);
    let filled = Rect::from_min_size(bar.min, vec2(bar.width() * progress.fraction(), bar.height()));
    painter.rect_filled(filled, CornerRadius::same(3), palette.accent);

    let elapsed = format_timestamp(progress.position);
    let label = match progress.length {
        Some(length) => format!("{elapsed} / {}", format_timestamp(length)),
        None => elapsed,
    };
    painter.text(
        pos2(bar.min.x, bar.max.y + 8.0),
        Align2::LEFT_TOP,
        label,
        FontId::proportional(14.0),
        palette.text_muted,
    );
}

fn draw_overlay(painter: &Painter, screen: Rect, palette: &Palette, overlay: Overlay) {
    let veil = match overlay {
        Overlay::Liked => palette.like_veil,
        Overlay::Skipped => palette.skip_veil,
    };
    painter.rect_filled(screen, CornerRadius::ZERO, veil);
    painter.text(
        screen.center(),
        Align2::CENTER_CENTER,
        overlay.label(),
        FontId::proportional(64.0),
        palette.text_primary,
    );
}

/// Decodes cover art bytes into an egui image.
pub fn decode_cover_image(bytes: &[u8]) -> Result<egui::ColorImage, String> {
    let image =
        image::load_from_memory(bytes).map_err(|e| format!("Failed to decode cover: {e}"))?;
    let image = image.to_rgba8();
    let size = [image.width() as usize, image.height() as usize];
    let pixels = image.into_raw();
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, &pixels))
}
