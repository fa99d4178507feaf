// Text fitting helpers for the terminal mini-player.

use unicode_segmentation::UnicodeSegmentation;

/// Center a string within a given width
pub fn pad_centered(text: &str, width: usize) -> String {
    let line_width = text.graphemes(true).count();
    let pad_left = width.saturating_sub(line_width) / 2;
    let mut content = String::with_capacity(pad_left + text.len());
    content.extend(std::iter::repeat_n(' ', pad_left));
    content.push_str(text);
    content
}

/// Wrap text to a given width, breaking at word boundaries
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return Vec::new();
    }
    textwrap::wrap(text, width).into_iter().map(|line| line.into_owned()).collect()
}

/// Cut `text` to at most `width` graphemes, marking the cut with an ellipsis.
pub fn truncate(text: &str, width: usize) -> String {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    if graphemes.len() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out: String = graphemes[..width - 1].concat();
    out.push('…');
    out
}
