/*!
format.rs

Terminal formatting for the admin CLI's human-readable listings (module
listing, per-module command listing, `cli show`).

  - StyleOptions::detect() honors NO_COLOR and COLUMNS (clamped 40..=220,
    default 100); StyleOptions::plain() for captured output.
  - color(role, text, &style)
  - heading(title, count, &style)
  - table(headers, rows, TableOpts, &style)
  - truncate_ellipsis(s, max_chars)

Functions return strings; nothing here prints. JSON output paths must not
use these helpers.
*/

use std::borrow::Cow;

/* -------------------------------------------------------------------------- */
/* Style Options                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub term_width: usize,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self::detect()
    }
}

impl StyleOptions {
    pub fn detect() -> Self {
        let width = std::env::var("COLUMNS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|w| w.clamp(40, 220))
            .unwrap_or(100);

        StyleOptions {
            use_color: std::env::var_os("NO_COLOR").is_none(),
            term_width: width,
        }
    }

    /// No ANSI codes, fixed width. Used when output is captured.
    pub fn plain() -> Self {
        StyleOptions {
            use_color: false,
            term_width: 100,
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Color                                                                      */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Primary,
    Secondary,
    Accent,
    Error,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Primary => "38;5;45",    // cyan-ish
        Role::Secondary => "38;5;250", // gray
        Role::Accent => "38;5;213",    // magenta/pink
        Role::Error => "38;5;196",     // red
        Role::Dim => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

/// `Title (n)` line used above listings.
pub fn heading(title: impl AsRef<str>, count: usize, style: &StyleOptions) -> String {
    color(Role::Primary, format!("{} ({count})", title.as_ref()), style)
}

/* -------------------------------------------------------------------------- */
/* Table Rendering                                                            */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct TableOpts {
    /// 0 -> style.term_width
    pub max_width: usize,
    pub truncate: bool,
    pub header_sep: bool,
    pub min_col_width: usize,
}

impl Default for TableOpts {
    fn default() -> Self {
        Self {
            max_width: 0,
            truncate: true,
            header_sep: true,
            min_col_width: 4,
        }
    }
}

pub fn table(
    headers: &[&str],
    rows: &[Vec<String>],
    opts: TableOpts,
    style: &StyleOptions,
) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let col_count = headers.len();
    let width_limit = if opts.max_width == 0 {
        style.term_width
    } else {
        opts.max_width.min(style.term_width)
    };

    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(col_count) {
            widths[i] = widths[i].max(display_width(cell));
        }
    }

    // Shrink the widest columns first until the table fits.
    let total: usize = widths.iter().sum::<usize>() + (col_count - 1) * 2;
    if total > width_limit {
        let mut overflow = total - width_limit;
        let mut ordered: Vec<(usize, usize)> = widths.iter().copied().enumerate().collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1));
        for (idx, width) in ordered {
            if overflow == 0 {
                break;
            }
            if width > opts.min_col_width {
                let shrink = (width - opts.min_col_width).min(overflow);
                widths[idx] -= shrink;
                overflow -= shrink;
            }
        }
    }

    let mut out = String::new();
    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| color(Role::Accent, fit(h, widths[i], opts.truncate), style))
        .collect();
    out.push_str(header_line.join("  ").trim_end());
    out.push('\n');

    if opts.header_sep {
        let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&color(Role::Dim, sep.join("  "), style));
        out.push('\n');
    }

    let lines: Vec<String> = rows
        .iter()
        .map(|row| {
            let cells: Vec<String> = (0..col_count)
                .map(|c| fit(row.get(c).map(String::as_str).unwrap_or(""), widths[c], opts.truncate))
                .collect();
            cells.join("  ").trim_end().to_string()
        })
        .collect();
    out.push_str(&lines.join("\n"));
    out
}

fn fit(s: &str, width: usize, truncate: bool) -> String {
    let len = display_width(s);
    if len > width && truncate {
        return truncate_ellipsis(&strip_ansi(s), width);
    }
    if len < width {
        return format!("{s}{}", " ".repeat(width - len));
    }
    s.to_string()
}

/* -------------------------------------------------------------------------- */
/* Text Helpers                                                               */
/* -------------------------------------------------------------------------- */

pub fn truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

fn strip_ansi(s: &str) -> Cow<'_, str> {
    // Skips CSI sequences: ESC '[' ... final letter.
    if !s.contains('\x1b') {
        return Cow::Borrowed(s);
    }
    let mut buf = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for n in chars.by_ref() {
                if n.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        buf.push(c);
    }
    Cow::Owned(buf)
}

fn display_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                      */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_plain() {
        let t = table(
            &["MODULE", "SHORT"],
            &[
                vec!["secret_manager".into(), "sm".into()],
                vec!["db".into(), "-".into()],
            ],
            TableOpts::default(),
            &StyleOptions::plain(),
        );
        let lines: Vec<&str> = t.lines().collect();
        assert_eq!(lines[0], "MODULE          SHORT");
        assert_eq!(lines[1], "--------------  -----");
        assert_eq!(lines[2], "secret_manager  sm");
        assert_eq!(lines[3], "db              -");
    }

    #[test]
    fn test_table_shrinks_to_width() {
        let style = StyleOptions {
            use_color: false,
            term_width: 40,
        };
        let long = "x".repeat(80);
        let t = table(&["A", "B"], &[vec!["a".into(), long]], TableOpts::default(), &style);
        assert!(t.lines().all(|l| l.chars().count() <= 40));
        assert!(t.contains('…'));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate_ellipsis("abcdef", 4), "abc…");
        assert_eq!(truncate_ellipsis("abc", 4), "abc");
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[31mRED\x1b[0m"), "RED");
    }

    #[test]
    fn test_plain_color_is_identity() {
        assert_eq!(color(Role::Error, "boom", &StyleOptions::plain()), "boom");
    }
}
