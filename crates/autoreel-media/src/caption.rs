//! Filter graph construction for the caption composite.
//!
//! The graph is a single chain: a solid canvas at the target frame size,
//! the source clip scaled to the frame width and centered on it, and the
//! caption drawn centered on top.

use std::path::Path;

use autoreel_models::{CaptionStyle, FrameSize, RenderSpec};

/// Average glyph advance as a share of the font size.
const GLYPH_ADVANCE_EM: f64 = 0.55;

/// Smallest font size the fitter will go down to.
const MIN_FONT_SIZE: u32 = 12;

/// Output label of the composite.
pub const OUTPUT_LABEL: &str = "out";

/// Escape a value for use inside a single-quoted filter option.
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// Largest font size not above the preferred one at which the longest
/// line fits inside `width_fraction` of the frame.
pub fn fit_font_size(text: &str, style: &CaptionStyle, frame: FrameSize) -> u32 {
    let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    if longest == 0 {
        return style.font_size;
    }

    let box_width = frame.width as f64 * style.width_fraction.clamp(0.0, 1.0);
    let fitted = (box_width / (longest as f64 * GLYPH_ADVANCE_EM)).floor() as u32;

    fitted.clamp(MIN_FONT_SIZE, style.font_size.max(MIN_FONT_SIZE))
}

/// Build the `-filter_complex` graph for a render.
///
/// `caption_file` holds the display text; reading it from a file avoids
/// escaping arbitrary generated text inside the graph. Expansion is off so
/// `%` and `\` in the text are drawn as they are.
///
/// `text_align` needs FFmpeg 6.1 or newer.
pub fn build_filter_graph(spec: &RenderSpec, duration_secs: f64, caption_file: &Path) -> String {
    let frame = spec.frame();
    let settings = spec.settings();
    let style = spec.caption();
    let font_size = fit_font_size(spec.display_text(), style, frame);

    let canvas = format!(
        "color=c={color}:s={w}x{h}:r={fps}:d={dur:.3}[bg]",
        color = settings.canvas_color,
        w = frame.width,
        h = frame.height,
        fps = settings.fps,
        dur = duration_secs,
    );

    // -2 keeps the height even, as libx264 requires.
    let clip = format!("[0:v]scale={w}:-2,setsar=1[fg]", w = frame.width);

    let overlay = "[bg][fg]overlay=(W-w)/2:(H-h)/2:shortest=1[base]".to_string();

    let mut drawtext = format!(
        "[base]drawtext=textfile='{file}':fontsize={size}:fontcolor={color}:\
         expansion=none:borderw={borderw}:bordercolor={stroke}:text_align=C:\
         x=(w-text_w)/2:y=(h-text_h)/2",
        file = escape_filter_value(&caption_file.to_string_lossy()),
        size = font_size,
        color = style.color,
        borderw = style.stroke_width,
        stroke = style.stroke_color,
    );
    if let Some(font) = &style.font_path {
        drawtext.push_str(&format!(
            ":fontfile='{}'",
            escape_filter_value(&font.to_string_lossy())
        ));
    }
    drawtext.push_str(&format!("[{}]", OUTPUT_LABEL));

    [canvas, clip, overlay, drawtext].join(";")
}
