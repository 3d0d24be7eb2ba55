//! Filter graph construction for the final render.

use std::path::Path;

use crate::video::config::WatermarkPosition;

/// Style forced onto the plain SRT track when the styled track cannot be used.
pub const FALLBACK_SUBTITLE_STYLE: &str = "FontName=Arial Black,FontSize=60,PrimaryColour=&H00FFFFFF,OutlineColour=&H00000000,Outline=4,Shadow=2,MarginV=200";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub text: String,
    pub position: WatermarkPosition,
    pub font_size: u32,
}

impl Watermark {
    /// `drawtext` expression pair for the corner.
    fn coordinates(&self) -> (&'static str, &'static str) {
        match self.position {
            WatermarkPosition::TopLeft => ("10", "50"),
            WatermarkPosition::TopRight => ("w-tw-10", "50"),
            WatermarkPosition::BottomLeft => ("10", "h-th-150"),
            WatermarkPosition::BottomRight => ("w-tw-10", "h-th-150"),
        }
    }

    pub fn drawtext_filter(&self) -> String {
        let (x, y) = self.coordinates();
        format!(
            "drawtext=text='{text}':fontsize={size}:fontcolor=white:x={x}:y={y}:borderw=2:bordercolor=black",
            text = escape_drawtext(&self.text),
            size = self.font_size,
        )
    }
}

pub fn escape_ffmpeg_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "'\\''")
        .replace(':', "\\:")
}

fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "'\\''")
        .replace(':', "\\:")
        .replace('%', "\\%")
}

/// Styled caption overlay, then the optional watermark, labelled `[v]`.
pub fn primary_filter_graph(ass_path: &Path, watermark: Option<&Watermark>) -> String {
    let mut graph = format!("[0:v]ass='{}'", escape_ffmpeg_path(ass_path));
    if let Some(watermark) = watermark {
        graph.push(',');
        graph.push_str(&watermark.drawtext_filter());
    }
    graph.push_str("[v]");
    graph
}

/// Plain SRT burn-in with a forced simple style.
pub fn fallback_filter(srt_path: &Path) -> String {
    format!(
        "subtitles='{}':force_style='{}'",
        escape_ffmpeg_path(srt_path),
        FALLBACK_SUBTITLE_STYLE
    )
}

/// Scale to cover the frame, centre-crop, square pixels.
pub fn cover_frame((width, height): (u32, u32)) -> String {
    format!(
        "scale={width}:{height}:force_original_aspect_ratio=increase,crop={width}:{height},setsar=1"
    )
}
