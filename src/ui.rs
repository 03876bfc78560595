use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use serde_json::Value;
use tracing::debug;

use crate::console::Console;
use crate::flow::FlowState;
use crate::form::InputForm;
use crate::list::{ListControl, ListPanel, ResourceRow, column_widths};
use crate::model::PanelKind;
use crate::overlay::{Overlay, OverlayBody, OverlayKind};

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);

pub fn render(frame: &mut Frame, console: &mut Console) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], console);
    render_body(frame, root[1], console);
    render_footer(frame, root[2], console);
    render_overlays(frame, console);
}

fn render_header(frame: &mut Frame, area: Rect, console: &Console) {
    let mut spans = Vec::new();
    let engine = if console.engine().is_empty() {
        " 󰡨 berth ".to_string()
    } else {
        format!(" 󰡨 berth  engine {} ", console.engine())
    };
    push_powerline_segment(&mut spans, engine, Color::White, PL_A, BG);

    let focus = console.registry().focus_state();
    for (index, name) in focus.names().iter().enumerate() {
        let style = if index == focus.index() && console.focused_overlay().is_none() {
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(MUTED)
        };
        spans.push(Span::styled(format!(" {} {name} ", index + 1), style));
    }

    let running = console.flows().in_flight();
    if running > 0 {
        push_powerline_segment_rtl(
            &mut spans,
            format!(" 󰔟 {running} running "),
            Color::Black,
            WARN,
            BG,
        );
    } else if let Some(last) = console.flows().history().last() {
        let color = match last.state() {
            FlowState::Failed(_) => ERROR,
            _ => MUTED,
        };
        spans.push(Span::styled(
            format!(
                " last: {} {}",
                last.call.progress_label().trim_end_matches('.'),
                last.state().label()
            ),
            Style::default().fg(color),
        ));
    }

    if let Some(at) = console
        .images()
        .refreshed_at()
        .max(console.containers().refreshed_at())
    {
        spans.push(Span::styled(
            format!("  refreshed {}", at.format("%H:%M:%S")),
            Style::default().fg(MUTED),
        ));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_body(frame: &mut Frame, area: Rect, console: &mut Console) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let focused = console.registry().focused().to_string();
    for (panel, chunk) in PanelKind::ALL.into_iter().zip(chunks.iter().copied()) {
        place(console, panel.name(), chunk);
        console.list_mut(panel).set_viewport(table_rows_visible(chunk));
        let is_focused = focused == panel.name();
        match panel {
            PanelKind::Images => render_list(frame, chunk, console.images(), is_focused),
            PanelKind::Containers => render_list(frame, chunk, console.containers(), is_focused),
        }
    }
}

fn render_list<R: ResourceRow>(frame: &mut Frame, area: Rect, list: &ListPanel<R>, focused: bool) {
    let inner_width = area.width.saturating_sub(4);
    let widths = column_widths(R::COLUMNS, inner_width);

    let header_row = Row::new(R::COLUMNS.iter().map(|column| {
        Cell::from(column.title).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1)
    .style(Style::default().fg(ACCENT));

    let rows = list.rows().iter().map(|row| {
        Row::new(
            row.cells()
                .into_iter()
                .map(|cell| Cell::from(cell).style(Style::default().fg(Color::White))),
        )
    });

    let mut title = format!("{} ({})", R::PANEL.name(), list.len());
    if !list.active_filter().is_empty() {
        title.push_str(&format!(" [filter: {}]", list.active_filter()));
    }
    let border = if list.error().is_some() {
        ERROR
    } else if focused {
        ACCENT
    } else {
        MUTED
    };
    let mut block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(PANEL));
    if let Some(error) = list.error() {
        block = block.title_bottom(Line::from(Span::styled(
            format!(" {} ", compact_text(error, area.width.saturating_sub(4) as usize)),
            Style::default().fg(ERROR),
        )));
    }

    let table = Table::new(rows, widths.into_iter().map(Constraint::Length))
        .header(header_row)
        .block(block)
        .column_spacing(0)
        .row_highlight_style(
            Style::default()
                .bg(Color::Rgb(24, 36, 58))
                .add_modifier(Modifier::BOLD),
        );

    let highlighted = list.selected_index().filter(|_| focused);
    let mut state = TableState::default()
        .with_offset(list.origin())
        .with_selected(highlighted);
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_footer(frame: &mut Frame, area: Rect, console: &Console) {
    let overlay = console.focused_overlay();
    let (status_bg, status_fg) = match overlay {
        Some(OverlayKind::Confirm) => (WARN, Color::Black),
        _ if console.status().starts_with("Error") => (ERROR, Color::Black),
        _ => (PL_B, Color::White),
    };

    let mut spans = Vec::new();
    let status = compact_text(console.status(), area.width.saturating_sub(8).max(24) as usize);
    push_powerline_segment(&mut spans, format!(" {status} "), status_fg, status_bg, BG);
    spans.push(Span::styled(
        format!("  {}", key_hints(overlay, console.focused_panel())),
        Style::default().fg(MUTED),
    ));
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn key_hints(overlay: Option<OverlayKind>, panel: PanelKind) -> &'static str {
    match (overlay, panel) {
        (Some(OverlayKind::Confirm), _) => "y confirm  n cancel",
        (Some(OverlayKind::Status), _) => "waiting for the engine  ctrl+q quit",
        (Some(OverlayKind::Message), _) => "enter close",
        (Some(OverlayKind::Detail), _) => "j/k scroll  q close",
        (Some(OverlayKind::Form), _) => "tab next field  enter submit  esc cancel",
        (None, PanelKind::Images) => {
            "tab panel  f filter  o inspect  c create  p pull  d remove  ctrl+d prune  s save  i import  ctrl+l load"
        }
        (None, PanelKind::Containers) => {
            "tab panel  f filter  o inspect  u start  s stop  d remove  e export  c commit  r rename"
        }
    }
}

fn render_overlays(frame: &mut Frame, console: &mut Console) {
    let screen = frame.area();
    let areas = console
        .overlays()
        .iter()
        .map(|overlay| (overlay.kind(), overlay_area(overlay, screen)))
        .collect::<Vec<_>>();
    for (kind, area) in areas {
        place(console, kind.name(), area);
    }

    for overlay in console.overlays().iter() {
        let Some(area) = console.registry().rect(overlay.kind().name()) else {
            continue;
        };
        frame.render_widget(Clear, area);
        match &overlay.body {
            OverlayBody::Confirm { prompt } => {
                render_text_box(frame, area, &overlay.title, prompt, WARN);
            }
            OverlayBody::Status { text } => {
                render_text_box(frame, area, &overlay.title, text, ACCENT);
            }
            OverlayBody::Message { text, error } => {
                let color = if *error { ERROR } else { ACCENT };
                render_text_box(frame, area, &overlay.title, text, color);
            }
            OverlayBody::Detail { text, scroll } => {
                let paragraph = Paragraph::new(highlight_json_text(text))
                    .block(overlay_block(&overlay.title, ACCENT))
                    .style(Style::default().fg(Color::White))
                    .wrap(Wrap { trim: false })
                    .scroll((*scroll, 0));
                frame.render_widget(paragraph, area);
            }
            OverlayBody::Form { form, .. } => render_form(frame, area, &overlay.title, form),
        }
    }
}

fn render_text_box(frame: &mut Frame, area: Rect, title: &str, text: &str, color: Color) {
    let paragraph = Paragraph::new(Text::from(text.to_string()))
        .block(overlay_block(title, color))
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_form(frame: &mut Frame, area: Rect, title: &str, form: &InputForm) {
    let label_width = form
        .fields()
        .iter()
        .map(|field| field.label.chars().count())
        .max()
        .unwrap_or(0);
    let lines = form
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let label_style = if index == form.active() {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(MUTED)
            };
            Line::from(vec![
                Span::styled(format!("{:>label_width$}: ", field.label), label_style),
                Span::styled(field.value.clone(), Style::default().fg(Color::White)),
            ])
        })
        .collect::<Vec<_>>();
    frame.render_widget(
        Paragraph::new(lines).block(overlay_block(title, ACCENT)),
        area,
    );

    if let Some(field) = form.fields().get(form.active()) {
        let x = area.x + 1 + (label_width + 2 + field.caret) as u16;
        let y = area.y + 1 + form.active() as u16;
        if x < area.right().saturating_sub(1) && y < area.bottom().saturating_sub(1) {
            frame.set_cursor_position((x, y));
        }
    }
}

fn overlay_block(title: &str, color: Color) -> Block<'static> {
    Block::default()
        .title(format!(" {title} "))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .style(Style::default().bg(PANEL))
}

/// Messages sit in the upper third, detail views fill most of the screen and
/// the rest are sized to their content.
fn overlay_area(overlay: &Overlay, screen: Rect) -> Rect {
    let inset_x = screen.width / 8;
    let inset_y = screen.height / 8;
    let area = match &overlay.body {
        OverlayBody::Message { .. } | OverlayBody::Status { .. } => Rect::new(
            screen.x + screen.width / 5,
            screen.y + screen.height / 3,
            screen.width - 2 * (screen.width / 5),
            5,
        ),
        OverlayBody::Confirm { .. } => Rect::new(
            screen.x + screen.width / 4,
            screen.y + screen.height / 3,
            screen.width - 2 * (screen.width / 4),
            4,
        ),
        OverlayBody::Detail { .. } => Rect::new(
            screen.x + inset_x,
            screen.y + inset_y,
            screen.width - 2 * inset_x,
            screen.height - 2 * inset_y,
        ),
        OverlayBody::Form { form, .. } => Rect::new(
            screen.x + inset_x,
            screen.y + screen.height / 4,
            screen.width - 2 * inset_x,
            form.fields().len() as u16 + 2,
        ),
    };
    area.intersection(screen)
}

fn place(console: &mut Console, name: &str, area: Rect) {
    if let Err(error) = console.registry_mut().place(name, area) {
        debug!(%error, "panel placement skipped");
    }
}

fn highlight_json_text(input: &str) -> Text<'static> {
    if serde_json::from_str::<Value>(input).is_err() {
        return Text::from(input.to_string());
    }
    Text::from(input.lines().map(highlight_json_line).collect::<Vec<_>>())
}

fn highlight_json_line(line: &str) -> Line<'static> {
    let chars = line.chars().collect::<Vec<_>>();
    let mut index = 0usize;
    let mut spans = Vec::new();

    while index < chars.len() {
        let ch = chars[index];
        if matches!(ch, '{' | '}' | '[' | ']' | ':' | ',') {
            spans.push(Span::styled(ch.to_string(), Style::default().fg(MUTED)));
            index += 1;
            continue;
        }

        if ch == '"' {
            let (token, next_index) = read_json_string(&chars, index);
            let key = chars[next_index..]
                .iter()
                .find(|c| !c.is_ascii_whitespace())
                .is_some_and(|c| *c == ':');
            let color = if key {
                Color::Rgb(103, 232, 249)
            } else {
                Color::Rgb(125, 211, 252)
            };
            spans.push(Span::styled(token, Style::default().fg(color)));
            index = next_index;
            continue;
        }

        if ch.is_ascii_digit() || ch == '-' {
            let start = index;
            while index < chars.len()
                && (chars[index].is_ascii_digit()
                    || matches!(chars[index], '-' | '+' | '.' | 'e' | 'E'))
            {
                index += 1;
            }
            spans.push(Span::styled(
                chars[start..index].iter().collect::<String>(),
                Style::default().fg(Color::Rgb(251, 146, 60)),
            ));
            continue;
        }

        if ch.is_ascii_alphabetic() {
            let start = index;
            while index < chars.len() && chars[index].is_ascii_alphabetic() {
                index += 1;
            }
            spans.push(Span::styled(
                chars[start..index].iter().collect::<String>(),
                Style::default().fg(WARN),
            ));
            continue;
        }

        spans.push(Span::raw(ch.to_string()));
        index += 1;
    }

    Line::from(spans)
}

fn read_json_string(chars: &[char], start: usize) -> (String, usize) {
    let mut index = start;
    let mut escaped = false;
    let mut token = String::new();
    while index < chars.len() {
        let ch = chars[index];
        token.push(ch);
        if index > start {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                return (token, index + 1);
            }
        }
        index += 1;
    }
    (token, chars.len())
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn push_powerline_segment_rtl(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
}

/// Rows left for data once borders and the header row are drawn.
fn table_rows_visible(area: Rect) -> usize {
    area.height.saturating_sub(3).max(1) as usize
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}
