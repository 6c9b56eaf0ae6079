//! Business card export.
//!
//! The card is described as SVG (photo clipped to a circle, name/title/company
//! text) and rasterised with resvg. Text uses the system `sans-serif` face;
//! with no fonts installed the card still renders, without text.

use std::sync::Arc;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use quick_xml::escape::escape;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, fontdb};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::imaging::codec::{decode, encode_png};
use crate::imaging::crop::center_square;
use crate::imaging::{ImageData, ImageError};

/// 3.5in × 2in at 300 DPI.
pub const CARD_WIDTH: u32 = 1050;
pub const CARD_HEIGHT: u32 = 600;
const PHOTO_RADIUS: u32 = 160;
const PHOTO_CENTER_X: u32 = 180;
const TEXT_START_X: u32 = 400;
const MAX_FIELD_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardTheme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardSide {
    #[default]
    Front,
    Back,
}

struct Palette {
    background: &'static str,
    text: &'static str,
    secondary: &'static str,
}

impl CardTheme {
    fn palette(self) -> Palette {
        match self {
            CardTheme::Light => Palette {
                background: "#ffffff",
                text: "#111827",
                secondary: "#4b5563",
            },
            CardTheme::Dark => Palette {
                background: "#111827",
                text: "#ffffff",
                secondary: "#9ca3af",
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CardTheme::Light => "light",
            CardTheme::Dark => "dark",
        }
    }
}

fn default_full_name() -> String {
    "Your Name".to_string()
}

fn default_title() -> String {
    "Senior Frontend Engineer".to_string()
}

fn default_company() -> String {
    "StarterDev".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusinessCardRequest {
    #[serde(default = "default_full_name")]
    pub full_name: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_company")]
    pub company: String,
    #[serde(default)]
    pub theme: CardTheme,
    #[serde(default)]
    pub side: CardSide,
}

impl BusinessCardRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [
            ("full_name", &self.full_name),
            ("title", &self.title),
            ("company", &self.company),
        ] {
            if value.chars().count() > MAX_FIELD_CHARS {
                return Err(AppError::Validation(format!(
                    "{field} must be at most {MAX_FIELD_CHARS} characters"
                )));
            }
        }
        Ok(())
    }
}

/// First letter of the first two words, upper-cased.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

/// Square PNG sized to fill the photo circle.
pub fn prepare_photo(photo: &ImageData) -> Result<ImageData, ImageError> {
    let img = decode(photo.bytes())?;
    let diameter = PHOTO_RADIUS * 2;
    let square = center_square(img.width(), img.height())
        .apply(&img)
        .resize_exact(diameter, diameter, FilterType::Lanczos3);
    encode_png(&square)
}

fn svg_open(background: &str) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{CARD_WIDTH}" height="{CARD_HEIGHT}" viewBox="0 0 {CARD_WIDTH} {CARD_HEIGHT}"><rect width="{CARD_WIDTH}" height="{CARD_HEIGHT}" fill="{background}"/>"#
    )
}

/// Front: circular photo on the left, name/title/company on the right.
pub fn build_front_svg(card: &BusinessCardRequest, photo_png: &ImageData) -> String {
    let palette = card.theme.palette();
    let center_y = CARD_HEIGHT / 2;
    let photo_left = PHOTO_CENTER_X - PHOTO_RADIUS;
    let photo_top = center_y - PHOTO_RADIUS;
    let diameter = PHOTO_RADIUS * 2;

    let mut svg = svg_open(palette.background);
    svg.push_str(&format!(
        r#"<defs><clipPath id="photo"><circle cx="{PHOTO_CENTER_X}" cy="{center_y}" r="{PHOTO_RADIUS}"/></clipPath></defs>"#
    ));
    svg.push_str(&format!(
        r#"<image x="{photo_left}" y="{photo_top}" width="{diameter}" height="{diameter}" clip-path="url(#photo)" xlink:href="{}"/>"#,
        photo_png.to_data_url()
    ));
    svg.push_str(&format!(
        r#"<text x="{TEXT_START_X}" y="{}" font-family="sans-serif" font-weight="bold" font-size="64" dominant-baseline="text-after-edge" fill="{}">{}</text>"#,
        center_y - 10,
        palette.text,
        escape(card.full_name.as_str())
    ));
    svg.push_str(&format!(
        r#"<text x="{TEXT_START_X}" y="{}" font-family="sans-serif" font-weight="500" font-size="36" dominant-baseline="hanging" fill="{}">{}</text>"#,
        center_y + 10,
        palette.secondary,
        escape(card.title.as_str())
    ));
    svg.push_str(&format!(
        r#"<text x="{TEXT_START_X}" y="{}" font-family="sans-serif" font-weight="400" font-size="28" dominant-baseline="hanging" fill="{}">{}</text>"#,
        center_y + 60,
        palette.secondary,
        escape(card.company.as_str())
    ));
    svg.push_str("</svg>");
    svg
}

/// Back: initials monogram with the company underneath.
pub fn build_back_svg(card: &BusinessCardRequest) -> String {
    let palette = card.theme.palette();
    let center_x = CARD_WIDTH / 2;
    let center_y = CARD_HEIGHT / 2;

    let mut svg = svg_open(palette.background);
    svg.push_str(&format!(
        r#"<text x="{center_x}" y="{}" text-anchor="middle" dominant-baseline="central" font-family="sans-serif" font-weight="bold" font-size="160" fill="{}">{}</text>"#,
        center_y - 30,
        palette.text,
        escape(initials(&card.full_name).as_str())
    ));
    svg.push_str(&format!(
        r#"<text x="{center_x}" y="{}" text-anchor="middle" font-family="sans-serif" font-weight="500" font-size="36" fill="{}">{}</text>"#,
        center_y + 140,
        palette.secondary,
        escape(card.company.as_str())
    ));
    svg.push_str("</svg>");
    svg
}

/// Rasterises card SVG. Holds the font database so system fonts are scanned once.
pub struct BusinessCardRenderer {
    fontdb: Arc<fontdb::Database>,
}

impl BusinessCardRenderer {
    pub fn new(fontdb: Arc<fontdb::Database>) -> Self {
        Self { fontdb }
    }

    pub fn with_system_fonts() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        tracing::info!("Business card renderer loaded {} font faces", db.len());
        Self::new(Arc::new(db))
    }

    pub fn render_png(&self, svg: &str) -> Result<ImageData> {
        let options = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_str(svg, &options).context("Failed to parse card SVG")?;

        let mut pixmap =
            Pixmap::new(CARD_WIDTH, CARD_HEIGHT).context("Failed to allocate card pixmap")?;
        resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

        let png = pixmap.encode_png().context("Failed to encode card PNG")?;
        Ok(ImageData::new(png, "image/png"))
    }

    /// Full export: photo preparation, SVG layout and rasterisation.
    pub fn render_card(
        &self,
        card: &BusinessCardRequest,
        photo: &ImageData,
    ) -> Result<ImageData, AppError> {
        let svg = match card.side {
            CardSide::Front => build_front_svg(card, &prepare_photo(photo)?),
            CardSide::Back => build_back_svg(card),
        };
        Ok(self.render_png(&svg)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::codec::test_support::png_of_size;

    fn card(theme: CardTheme, side: CardSide) -> BusinessCardRequest {
        BusinessCardRequest {
            full_name: "Ada Lovelace".to_string(),
            title: "Analyst".to_string(),
            company: "Engines & Co".to_string(),
            theme,
            side,
        }
    }

    fn renderer() -> BusinessCardRenderer {
        BusinessCardRenderer::new(Arc::new(fontdb::Database::new()))
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials("Ada Lovelace"), "AL");
        assert_eq!(initials("grace brewster murray hopper"), "GB");
        assert_eq!(initials("  Cher "), "C");
        assert_eq!(initials(""), "");
    }

    #[test]
    fn test_request_defaults() {
        let request: BusinessCardRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.full_name, "Your Name");
        assert_eq!(request.title, "Senior Frontend Engineer");
        assert_eq!(request.company, "StarterDev");
        assert_eq!(request.theme, CardTheme::Light);
        assert_eq!(request.side, CardSide::Front);
    }

    #[test]
    fn test_overlong_field_is_rejected() {
        let mut request = card(CardTheme::Light, CardSide::Front);
        request.title = "x".repeat(81);
        assert!(matches!(request.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_front_svg_escapes_text_and_uses_theme() {
        let svg = build_front_svg(&card(CardTheme::Dark, CardSide::Front), &png_of_size(2, 2));
        assert!(svg.contains("Engines &amp; Co"));
        assert!(svg.contains(r##"fill="#111827""##));
        assert!(svg.contains(r##"fill="#9ca3af""##));
        assert!(svg.contains("data:image/png;base64,"));
        assert!(svg.contains(r#"<circle cx="180" cy="300" r="160"/>"#));
    }

    #[test]
    fn test_back_svg_shows_initials() {
        let svg = build_back_svg(&card(CardTheme::Light, CardSide::Back));
        assert!(svg.contains(">AL</text>"));
        assert!(!svg.contains("<image"));
    }

    #[test]
    fn test_rendered_card_has_card_dimensions() {
        let out = renderer()
            .render_card(&card(CardTheme::Light, CardSide::Front), &png_of_size(40, 60))
            .unwrap();
        assert_eq!(out.mime_type(), "image/png");
        let img = decode(out.bytes()).unwrap();
        assert_eq!((img.width(), img.height()), (CARD_WIDTH, CARD_HEIGHT));
    }

    #[test]
    fn test_dark_card_background_is_dark() {
        let out = renderer()
            .render_card(&card(CardTheme::Dark, CardSide::Back), &png_of_size(4, 4))
            .unwrap();
        let img = decode(out.bytes()).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(5, 5).0, [0x11, 0x18, 0x27, 0xff]);
    }
}
