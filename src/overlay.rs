//! Boxed overlay panels drawn over the map: popups, forms, modals, help.

use crate::terminal::Terminal;
use crossterm::style::Color;

/// One rendered panel line with its own color/weight.
#[derive(Clone)]
pub struct PanelLine {
    pub text: String,
    pub fg: Color,
    pub bold: bool,
}

impl PanelLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fg: Color::Grey,
            bold: false,
        }
    }

    pub fn colored(text: impl Into<String>, fg: Color) -> Self {
        Self {
            text: text.into(),
            fg,
            bold: false,
        }
    }

    pub fn title(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fg: Color::White,
            bold: true,
        }
    }
}

/// Draw a bordered panel with its top-left corner near (x, y), clamped so
/// the whole box stays on screen.
pub fn draw_panel(term: &mut Terminal, x: i32, y: i32, lines: &[PanelLine]) {
    let (width, height) = term.size();
    let inner_width = lines.iter().map(|l| l.text.chars().count()).max().unwrap_or(0);
    let box_width = inner_width + 4;
    let box_height = lines.len() + 2;

    let max_x = (width as i32 - box_width as i32).max(0);
    let max_y = (height as i32 - box_height as i32).max(0);
    let x = x.clamp(0, max_x);
    let y = y.clamp(0, max_y);

    let border = Color::White;

    term.set(x, y, '┌', Some(border), false);
    for i in 1..box_width - 1 {
        term.set(x + i as i32, y, '─', Some(border), false);
    }
    term.set(x + box_width as i32 - 1, y, '┐', Some(border), false);

    for (row, line) in lines.iter().enumerate() {
        let ly = y + 1 + row as i32;
        term.set(x, ly, '│', Some(border), false);

        let padding = inner_width.saturating_sub(line.text.chars().count());
        let padded = format!(" {}{} ", line.text, " ".repeat(padding));
        for (col, ch) in padded.chars().enumerate() {
            term.set(x + 1 + col as i32, ly, ch, Some(line.fg), line.bold);
        }

        term.set(x + box_width as i32 - 1, ly, '│', Some(border), false);
    }

    let by = y + box_height as i32 - 1;
    term.set(x, by, '└', Some(border), false);
    for i in 1..box_width - 1 {
        term.set(x + i as i32, by, '─', Some(border), false);
    }
    term.set(x + box_width as i32 - 1, by, '┘', Some(border), false);
}

/// Draw a panel centered on the screen.
pub fn draw_centered_panel(term: &mut Terminal, lines: &[PanelLine]) {
    let (width, height) = term.size();
    let inner_width = lines.iter().map(|l| l.text.chars().count()).max().unwrap_or(0);
    let box_width = inner_width + 4;
    let box_height = lines.len() + 2;
    let x = (width as usize).saturating_sub(box_width) as i32 / 2;
    let y = (height as usize).saturating_sub(box_height) as i32 / 2;
    draw_panel(term, x, y, lines);
}

/// Single-line advisory banner across the top row.
pub fn draw_banner(term: &mut Terminal, text: &str, fg: Color) {
    term.fill_row(0, ' ', None);
    term.set_str(1, 0, text, Some(fg), true);
}

/// Wrap text to a column budget, preserving words where possible.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(8);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
        // Hard-break words longer than the budget
        while current.chars().count() > width {
            let split: String = current.chars().take(width).collect();
            let rest: String = current.chars().skip(width).collect();
            lines.push(split);
            current = rest;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::wrap_text;

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_text("a handful of short words to wrap", 12);
        assert!(lines.iter().all(|l| l.chars().count() <= 12));
        assert_eq!(lines.join(" "), "a handful of short words to wrap");
    }

    #[test]
    fn wrap_hard_breaks_long_words() {
        let lines = wrap_text("supercalifragilistic", 8);
        assert!(lines.len() >= 2);
        assert!(lines.iter().all(|l| l.chars().count() <= 8));
    }

    #[test]
    fn wrap_empty_is_empty() {
        assert!(wrap_text("   ", 10).is_empty());
    }
}
