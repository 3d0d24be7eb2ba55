use std::fmt::Write;

use anyhow::{Context, Result, bail};

use super::align::CaptionCue;

/// Render cues as a numbered SRT track.
pub fn to_srt(cues: &[CaptionCue]) -> String {
    let mut output = String::new();
    for cue in cues {
        write!(
            output,
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_srt_timestamp(cue.start),
            format_srt_timestamp(cue.end),
            cue.text
        ).unwrap();
    }
    output
}

/// `HH:MM:SS,mmm`, truncated (not rounded) to the millisecond.
pub fn format_srt_timestamp(seconds: f64) -> String {
    let millis = whole_millis(seconds);
    format!(
        "{:02}:{:02}:{:02},{:03}",
        millis / 3_600_000,
        (millis / 60_000) % 60,
        (millis / 1000) % 60,
        millis % 1000
    )
}

fn whole_millis(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    // The nudge keeps values like 2.3 (2299.999… ms in binary) on 2300
    (seconds * 1000.0 + 1e-6).floor() as u64
}

pub fn parse_srt(input: &str) -> Result<Vec<CaptionCue>> {
    let mut cues = Vec::new();
    let mut lines = input.lines().peekable();

    while let Some(line) = lines.next() {
        let index_line = line.trim().trim_start_matches('\u{feff}');
        if index_line.is_empty() {
            continue;
        }

        // Index line can sometimes be omitted; number such cues by position
        let (index, times) = match index_line.parse::<usize>() {
            Ok(index) => (
                index,
                lines
                    .next()
                    .map(str::trim)
                    .context("SRT cue is missing a timestamp line")?,
            ),
            Err(_) => (cues.len() + 1, index_line),
        };

        let (start_raw, end_raw) = times
            .split_once("-->")
            .map(|(a, b)| (a.trim(), b.trim()))
            .context("SRT cue timestamp line must contain '-->'")?;

        let start = parse_timestamp(start_raw)
            .with_context(|| format!("Failed to parse SRT start timestamp '{start_raw}'"))?;
        let end = parse_timestamp(end_raw)
            .with_context(|| format!("Failed to parse SRT end timestamp '{end_raw}'"))?;

        if end < start {
            bail!("SRT cue ends before it starts: {start_raw} --> {end_raw}");
        }

        let mut text_lines = Vec::new();
        while let Some(next) = lines.next_if(|next| !next.trim().is_empty()) {
            text_lines.push(next.trim().to_string());
        }

        cues.push(CaptionCue {
            index,
            start,
            end,
            text: text_lines.join(" "),
        });
    }

    Ok(cues)
}

fn parse_timestamp(value: &str) -> Result<f64> {
    let cleaned = value.trim().replace(',', ".");
    let (time_part, fractional_part) = cleaned.split_once('.').unwrap_or((cleaned.as_str(), "0"));

    let mut hms = time_part.split(':');
    let mut component = |name: &str| -> Result<u64> {
        hms.next()
            .with_context(|| format!("Timestamp missing {name}"))?
            .parse::<u64>()
            .with_context(|| format!("Invalid {name} in timestamp"))
    };
    let hours = component("hours")?;
    let minutes = component("minutes")?;
    let seconds = component("seconds")?;

    if hms.next().is_some() {
        bail!("Timestamp has more than three components: {value}");
    }

    let millis = format!("{fractional_part:0<3}")
        .chars()
        .take(3)
        .collect::<String>()
        .parse::<u64>()
        .context("Invalid millisecond component in timestamp")?;

    let total_millis = (hours * 3600 + minutes * 60 + seconds) * 1000 + millis;
    Ok(total_millis as f64 / 1000.0)
}
