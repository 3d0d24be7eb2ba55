use crate::video::model::ContentFormat;

/// Generated two-colour background, rendered by ffmpeg's lavfi sources.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientSpec {
    pub top: String,
    pub bottom: String,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

impl GradientSpec {
    pub fn for_format(format: ContentFormat, duration: f64, (width, height): (u32, u32)) -> Self {
        let (top, bottom) = format.gradient_colors();
        Self {
            top: top.to_string(),
            bottom: bottom.to_string(),
            duration,
            width,
            height,
        }
    }

    /// Vertical gradient source for `-f lavfi -i`.
    pub fn lavfi_source(&self) -> String {
        format!(
            "gradients=s={w}x{h}:c0={c0}:c1={c1}:nb_colors=2:x0=0:y0=0:x1=0:y1={h}:d={d:.3}:r=30",
            w = self.width,
            h = self.height,
            c0 = ffmpeg_color(&self.top),
            c1 = ffmpeg_color(&self.bottom),
            d = self.duration,
        )
    }

    /// Flat source in the top colour, used when the gradients filter is unavailable.
    pub fn solid_source(&self) -> String {
        format!(
            "color=c={c}:s={w}x{h}:d={d:.3}:r=30",
            c = ffmpeg_color(&self.top),
            w = self.width,
            h = self.height,
            d = self.duration,
        )
    }
}

/// `#RRGGBB` to ffmpeg's `0xRRGGBB`.
fn ffmpeg_color(hex: &str) -> String {
    format!("0x{}", hex.trim_start_matches('#'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_use_category_colors() {
        let spec = GradientSpec::for_format(ContentFormat::Scandale, 12.5, (1080, 1920));

        assert_eq!(
            spec.lavfi_source(),
            "gradients=s=1080x1920:c0=0xFF4B4B:c1=0x8B0000:nb_colors=2:x0=0:y0=0:x1=0:y1=1920:d=12.500:r=30"
        );
        assert_eq!(spec.solid_source(), "color=c=0xFF4B4B:s=1080x1920:d=12.500:r=30");
    }
}
