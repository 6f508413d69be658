use std::fmt::Write;

/// Grey SVG card carrying an error message, served in place of an image so
/// that `<img>` tags still render something.
pub fn error_placeholder(width: u32, height: u32, title: &str, message: &str) -> String {
    let mut svg = String::new();
    let font = (width.min(height) / 16).clamp(10, 24);
    let _ = write!(
        svg,
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            r##"<rect width="100%" height="100%" fill="#f8d7da"/>"##,
            r##"<text x="50%" y="45%" text-anchor="middle" font-family="sans-serif" font-size="{f}" fill="#721c24">{title}</text>"##,
            r##"<text x="50%" y="60%" text-anchor="middle" font-family="sans-serif" font-size="{s}" fill="#721c24">{message}</text>"##,
            "</svg>"
        ),
        w = width,
        h = height,
        f = font,
        s = (font * 2 / 3).max(8),
        title = escape(title),
        message = escape(&truncate(message, 120)),
    );
    svg
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
