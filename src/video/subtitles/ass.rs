//! ASS (Advanced SubStation Alpha) file format generation.
//!
//! The styled track is burned into the video by the compositor. Every third
//! cue (1, 4, 7, …) uses the accent style to keep the rhythm visible.

use std::fmt::Write;

use super::align::CaptionCue;

/// Captions longer than this (in characters) are broken over two lines.
pub const MAX_LINE_CHARS: usize = 45;

/// Style configuration for ASS subtitles.
#[derive(Debug, Clone)]
pub struct AssStyle {
    pub name: String,
    pub font_name: String,
    pub font_size: u32,
    /// Primary color in ABGR format (e.g., &H00FFFFFF for white)
    pub primary_color: String,
    pub secondary_color: String,
    pub outline_color: String,
    /// Background/shadow color in ABGR format
    pub back_color: String,
    pub bold: bool,
    pub outline: u32,
    pub shadow: u32,
    /// Alignment (numpad layout: 1-3=bottom, 4-6=mid, 7-9=top)
    pub alignment: u8,
    pub margin_l: u32,
    pub margin_r: u32,
    /// Vertical margin in pixels (distance from bottom for bottom-aligned)
    pub margin_v: u32,
}

impl Default for AssStyle {
    fn default() -> Self {
        Self::reels_default()
    }
}

impl AssStyle {
    /// White bold captions, bottom-centred, high enough to clear the
    /// platform UI on a 1080x1920 frame.
    pub fn reels_default() -> Self {
        Self {
            name: "Default".to_string(),
            font_name: "Arial Black".to_string(),
            font_size: 70,
            primary_color: "&H00FFFFFF".to_string(),
            secondary_color: "&H000000FF".to_string(),
            outline_color: "&H00000000".to_string(),
            back_color: "&HAA000000".to_string(),
            bold: true,
            outline: 4,
            shadow: 2,
            alignment: 2,
            margin_l: 60,
            margin_r: 60,
            margin_v: 400,
        }
    }

    /// Yellow, slightly larger variant used for emphasis.
    pub fn reels_accent() -> Self {
        Self {
            name: "Accent".to_string(),
            font_size: 75,
            primary_color: "&H0000FFFF".to_string(),
            outline: 5,
            ..Self::reels_default()
        }
    }

    /// Format the style line for the ASS file.
    fn to_style_line(&self) -> String {
        let bold_val = if self.bold { -1 } else { 0 };
        format!(
            "Style: {name},{font},{size},{primary},{secondary},{outline},{back},{bold},0,0,0,100,100,0,0,1,{outline_w},{shadow},{align},{ml},{mr},{mv},1",
            name = self.name,
            font = self.font_name,
            size = self.font_size,
            primary = self.primary_color,
            secondary = self.secondary_color,
            outline = self.outline_color,
            back = self.back_color,
            bold = bold_val,
            outline_w = self.outline,
            shadow = self.shadow,
            align = self.alignment,
            ml = self.margin_l,
            mr = self.margin_r,
            mv = self.margin_v,
        )
    }
}

/// Default and accent styles of one track.
#[derive(Debug, Clone)]
pub struct AssTheme {
    pub default: AssStyle,
    pub accent: AssStyle,
}

impl Default for AssTheme {
    fn default() -> Self {
        Self {
            default: AssStyle::reels_default(),
            accent: AssStyle::reels_accent(),
        }
    }
}

impl AssTheme {
    fn style_for(&self, cue: &CaptionCue) -> &AssStyle {
        if cue.index % 3 == 1 {
            &self.accent
        } else {
            &self.default
        }
    }
}

/// Generate the complete ASS file content for `cues`.
///
/// `play_res` must match the output video so margins and font sizes map
/// one-to-one onto pixels.
pub fn generate_ass_file(cues: &[CaptionCue], theme: &AssTheme, play_res: (u32, u32)) -> String {
    let mut output = String::new();

    writeln!(output, "[Script Info]").unwrap();
    writeln!(output, "; Generated by content-engine").unwrap();
    writeln!(output, "ScriptType: v4.00+").unwrap();
    writeln!(output, "PlayResX: {}", play_res.0).unwrap();
    writeln!(output, "PlayResY: {}", play_res.1).unwrap();
    writeln!(output, "WrapStyle: 0").unwrap();
    writeln!(output, "ScaledBorderAndShadow: yes").unwrap();
    writeln!(output).unwrap();

    writeln!(output, "[V4+ Styles]").unwrap();
    writeln!(
        output,
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding"
    ).unwrap();
    writeln!(output, "{}", theme.default.to_style_line()).unwrap();
    writeln!(output, "{}", theme.accent.to_style_line()).unwrap();
    writeln!(output).unwrap();

    writeln!(output, "[Events]").unwrap();
    writeln!(
        output,
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text"
    ).unwrap();

    for cue in cues {
        writeln!(
            output,
            "Dialogue: 0,{start},{end},{style},,0,0,0,,{text}",
            start = format_ass_timestamp(cue.start),
            end = format_ass_timestamp(cue.end),
            style = theme.style_for(cue).name,
            text = caption_text(&cue.text)
        ).unwrap();
    }

    output
}

/// Uppercase, escape and, when too long, break the caption over two lines.
fn caption_text(text: &str) -> String {
    let upper = text.trim().to_uppercase();
    if upper.chars().count() <= MAX_LINE_CHARS {
        return escape_ass_text(&upper);
    }

    match split_near_middle(&upper) {
        Some((first, second)) => {
            format!("{}\\N{}", escape_ass_text(first), escape_ass_text(second))
        }
        None => escape_ass_text(&upper),
    }
}

/// Split at the whitespace closest to the character midpoint.
fn split_near_middle(text: &str) -> Option<(&str, &str)> {
    let middle = text.chars().count() / 2;
    let (byte_idx, _) = text
        .char_indices()
        .enumerate()
        .filter(|(_, (_, c))| c.is_whitespace())
        .min_by_key(|(char_pos, _)| char_pos.abs_diff(middle))
        .map(|(_, found)| found)?;

    let (first, rest) = text.split_at(byte_idx);
    Some((first.trim_end(), rest.trim_start()))
}

/// Format seconds as an ASS timestamp (H:MM:SS.cc), truncated to the centisecond.
fn format_ass_timestamp(seconds: f64) -> String {
    let centis = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 100.0 + 1e-6).floor() as u64
    } else {
        0
    };

    format!(
        "{}:{:02}:{:02}.{:02}",
        centis / 360_000,
        (centis / 6000) % 60,
        (centis / 100) % 60,
        centis % 100
    )
}

/// Escape special characters in ASS text.
fn escape_ass_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('\n', "\\N")
}
