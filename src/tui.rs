use crossterm::event::KeyCode;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::allocation::{AllocationStatus, AllocationSummary};
use crate::fmt::money;
use crate::models::{LeaseStatus, PaymentStatus};
use crate::payment_form::{FormMessage, MessageKind};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Yellow)
    .add_modifier(Modifier::BOLD);

pub const FOOTER_STYLE: Style = Style::new().fg(Color::DarkGray);

pub const AMOUNT_POS_STYLE: Style = Style::new().fg(Color::Rgb(80, 220, 100));
pub const AMOUNT_NEG_STYLE: Style = Style::new().fg(Color::Red);

pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(40, 40, 60))
    .add_modifier(Modifier::BOLD);

pub const FOCUS_STYLE: Style = Style::new().fg(Color::Cyan);
pub const BOLD: Style = Style::new().add_modifier(Modifier::BOLD);
pub const WARN_STYLE: Style = Style::new().fg(Color::Yellow);

/// What a screen wants after handling a key or a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenAction {
    Continue,
    Close,
}

/// Amount owed as a colored Span: red while something is outstanding, green when settled.
pub fn balance_span(amount: f64) -> Span<'static> {
    let style = if amount > 0.005 {
        AMOUNT_NEG_STYLE
    } else {
        AMOUNT_POS_STYLE
    };
    Span::styled(money(amount), style)
}

pub fn payment_status_style(status: PaymentStatus) -> Style {
    match status {
        PaymentStatus::Paid | PaymentStatus::Current => AMOUNT_POS_STYLE,
        PaymentStatus::Partial => WARN_STYLE,
        PaymentStatus::Overdue => AMOUNT_NEG_STYLE.add_modifier(Modifier::BOLD),
    }
}

pub fn lease_status_style(status: LeaseStatus) -> Style {
    match status {
        LeaseStatus::Active => AMOUNT_POS_STYLE,
        LeaseStatus::Pending => FOCUS_STYLE,
        LeaseStatus::Expired | LeaseStatus::Terminated => FOOTER_STYLE,
    }
}

/// The fully / partially / over-allocated chip under the allocation rows.
pub fn allocation_chip(summary: &AllocationSummary) -> Line<'static> {
    let (text, style) = match summary.status {
        AllocationStatus::Full => (summary.status.label().to_string(), AMOUNT_POS_STYLE),
        AllocationStatus::Partial => (
            format!("{} ({} left)", summary.status.label(), money(summary.remaining)),
            WARN_STYLE,
        ),
        AllocationStatus::Over => (
            format!("{} (by {})", summary.status.label(), money(-summary.remaining)),
            AMOUNT_NEG_STYLE,
        ),
    };
    Line::from(vec![
        Span::raw("   "),
        Span::styled(format!("[{text}]"), style.add_modifier(Modifier::BOLD)),
        Span::styled(
            format!(
                "  allocated {} of {}",
                money(summary.total_allocated),
                money(summary.total)
            ),
            FOOTER_STYLE,
        ),
    ])
}

/// A form message wrapped to `width`, red for errors and green for success.
pub fn message_lines(message: &FormMessage, width: usize) -> Vec<Line<'static>> {
    let style = match message.kind {
        MessageKind::Error => AMOUNT_NEG_STYLE,
        MessageKind::Success => AMOUNT_POS_STYLE,
    };
    let (wrapped, _) = wrap_text(&message.text, width.saturating_sub(4));
    wrapped
        .lines()
        .map(|l| Line::from(Span::styled(format!("   {l}"), style)))
        .collect()
}

/// Wrap text to a given width. Returns (wrapped_string, line_count).
pub fn wrap_text(text: &str, width: usize) -> (String, u16) {
    if width == 0 {
        return (text.to_string(), 1);
    }
    let wrapped = textwrap::fill(text, width);
    let lines = wrapped.lines().count().max(1) as u16;
    (wrapped, lines)
}

/// Header, thick separator, body, hint line. Returns the body area.
pub fn draw_chrome(frame: &mut Frame, title: &str, hints: &str, status: Option<&str>) -> Rect {
    let area = frame.area();
    let [header_area, sep, content_area, hints_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    frame.render_widget(
        Paragraph::new(format!(" LeaseDesk: {title}")).style(HEADER_STYLE),
        header_area,
    );

    let sep_line = "━".repeat(area.width as usize);
    frame.render_widget(
        Paragraph::new(sep_line.as_str()).style(Style::default().fg(Color::DarkGray)),
        sep,
    );

    match status {
        Some(msg) => frame.render_widget(Paragraph::new(format!(" {msg}")).style(WARN_STYLE), hints_area),
        None => frame.render_widget(Paragraph::new(format!(" {hints}")).style(FOOTER_STYLE), hints_area),
    }
    content_area
}

/// One labelled input line in the style of the form screens.
pub fn field_line(label: &str, value: &str, focused: bool) -> Line<'static> {
    let cursor = if focused { "_" } else { "" };
    Line::from(vec![
        Span::styled(format!("   {label:<18} "), if focused { BOLD } else { Style::default() }),
        Span::styled(
            format!("{value}{cursor}"),
            if focused { FOCUS_STYLE } else { Style::default() },
        ),
    ])
}

/// Free-text editing. Returns true when the key was consumed.
pub fn edit_text(buffer: &mut String, code: KeyCode) -> bool {
    match code {
        KeyCode::Char(c) => {
            buffer.push(c);
            true
        }
        KeyCode::Backspace => {
            buffer.pop();
            true
        }
        _ => false,
    }
}

/// Amount editing: digits, one decimal point, at most two decimals.
pub fn edit_amount(buffer: &mut String, code: KeyCode) -> bool {
    match code {
        KeyCode::Char(c) if c.is_ascii_digit() => {
            let decimals = buffer.split_once('.').map(|(_, d)| d.len());
            if decimals.map_or(true, |d| d < 2) {
                buffer.push(c);
            }
            true
        }
        KeyCode::Char('.') => {
            if !buffer.contains('.') {
                if buffer.is_empty() {
                    buffer.push('0');
                }
                buffer.push('.');
            }
            true
        }
        KeyCode::Backspace => {
            buffer.pop();
            true
        }
        _ => false,
    }
}

/// Date editing: digits and dashes, at most `YYYY-MM-DD`.
pub fn edit_date(buffer: &mut String, code: KeyCode) -> bool {
    match code {
        KeyCode::Char(c) if (c.is_ascii_digit() || c == '-') && buffer.len() < 10 => {
            buffer.push(c);
            true
        }
        KeyCode::Backspace => {
            buffer.pop();
            true
        }
        KeyCode::Char(c) if c.is_ascii_digit() || c == '-' => true,
        _ => false,
    }
}

/// Text shown in an amount input for a stored value; zero shows as empty.
pub fn amount_input(value: f64) -> String {
    if value.abs() < 0.005 {
        String::new()
    } else {
        format!("{value:.2}")
    }
}
