use chrono::{DateTime, Local};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Widget, Wrap},
};
use time_humanize::HumanTime;
use unicode_width::UnicodeWidthStr;

use recite::config::Config;
use recite::session::{RenderModel, SegmentView};

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;
const HEALTH_BAR_WIDTH: usize = 10;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Picker => render_picker(self, area, buf),
            AppState::Practice => render_practice(self, area, buf),
            AppState::Results => render_results(self, area, buf),
            AppState::Stats => render_stats(self, area, buf),
        }
    }
}

fn render_picker(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    let title = Paragraph::new(Span::styled(
        "recite — pick a passage",
        Style::default().add_modifier(Modifier::BOLD),
    ));
    title.render(chunks[0], buf);

    if app.passages.is_empty() {
        let empty = Paragraph::new(
            "no passages yet — add one with `recite --add <name> --file <path>` or `recite --seed`",
        )
        .style(Style::default().add_modifier(Modifier::DIM))
        .wrap(Wrap { trim: true });
        empty.render(chunks[1], buf);
    } else {
        let name_width = app
            .passages
            .iter()
            .map(|p| p.name.width())
            .max()
            .unwrap_or(0);

        let lines: Vec<Line> = app
            .passages
            .iter()
            .enumerate()
            .map(|(idx, summary)| {
                let selected = idx == app.selected;
                let marker = if selected { "> " } else { "  " };
                let name = format!("{:<width$}", summary.name, width = name_width);

                let mut spans = vec![
                    Span::raw(marker),
                    Span::styled(
                        name,
                        if selected {
                            Style::default().add_modifier(Modifier::BOLD)
                        } else {
                            Style::default()
                        },
                    ),
                    Span::raw("  "),
                ];

                match summary.health {
                    Some(health) => {
                        spans.push(Span::styled(
                            health_bar(health),
                            Style::default().fg(health_color(health)),
                        ));
                        spans.push(Span::raw(format!(" {:>6.2}%", health)));
                        if let Some(last) = summary.last_practiced {
                            spans.push(Span::styled(
                                format!("  practiced {}", humanize_since(last)),
                                Style::default().add_modifier(Modifier::DIM),
                            ));
                        }
                    }
                    None => spans.push(Span::styled(
                        "never practiced",
                        Style::default().add_modifier(Modifier::DIM),
                    )),
                }

                Line::from(spans)
            })
            .collect();

        Paragraph::new(lines).render(chunks[1], buf);
    }

    let help = Paragraph::new(Span::styled(
        "enter: practice  s: stats  j/k: move  esc: quit",
        Style::default().add_modifier(Modifier::DIM),
    ));
    help.render(chunks[2], buf);
}

fn render_practice(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(session) = &app.session else {
        return;
    };
    let model = session.render_model(std::time::SystemTime::now());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    let flash = model.flash_active && app.config.flash_enabled;
    let border_style = if flash {
        Style::default().fg(Color::Red)
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(session.passage_name.clone());
    let passage = Paragraph::new(segment_lines(&model, &app.config))
        .block(block)
        .wrap(Wrap { trim: false });
    passage.render(chunks[0], buf);

    let progress = Gauge::default()
        .gauge_style(Style::default().fg(Color::Green))
        .ratio((model.progress_percent / 100.0).clamp(0.0, 1.0))
        .label(format!("recalled {:.2}%", model.progress_percent));
    progress.render(chunks[1], buf);

    let missed = Gauge::default()
        .gauge_style(Style::default().fg(Color::Red))
        .ratio((model.missed_percent / 100.0).clamp(0.0, 1.0))
        .label(format!("missed {:.2}%", model.missed_percent));
    missed.render(chunks[2], buf);

    let help = Paragraph::new(Span::styled(
        "type the first letter of each word — hold tab for a hint, esc to abandon",
        Style::default().add_modifier(Modifier::DIM),
    ));
    help.render(chunks[4], buf);
}

/// Turn the render model into styled terminal lines, splitting on the
/// newlines embedded in segment texts. Carriage returns are dropped so
/// CRLF passages break lines on the `\n` alone.
fn segment_lines<'a>(model: &'a RenderModel, config: &Config) -> Vec<Line<'a>> {
    let hidden_style = Style::default().add_modifier(Modifier::DIM);
    let plain_style = Style::default();
    let verse_style = if config.dim_verse_markers {
        Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC)
    } else {
        Style::default()
    };
    let miss_style = Style::default().fg(Color::Red).add_modifier(Modifier::BOLD);
    let hint_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::ITALIC);

    let mut lines: Vec<Line> = Vec::new();
    let mut current: Vec<Span> = Vec::new();

    for view in &model.segments {
        let (text, style) = match view {
            SegmentView::Hidden(t) => (t.as_str(), hidden_style),
            SegmentView::Plain(t) => (t.as_str(), plain_style),
            SegmentView::Verse(t) => (t.as_str(), verse_style),
            SegmentView::Miss(t) => (t.as_str(), miss_style),
            SegmentView::Hint(t) => (t.as_str(), hint_style),
            SegmentView::Heading { level, text } => {
                // Headings own their line; deeper levels render dimmer
                if !current.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current)));
                }
                let style = if *level <= 1 {
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Cyan)
                };
                lines.push(Line::from(Span::styled(text.as_str(), style)));
                continue;
            }
        };

        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            let first = first.trim_end_matches('\r');
            if !first.is_empty() {
                current.push(Span::styled(first, style));
            }
        }
        for part in parts {
            lines.push(Line::from(std::mem::take(&mut current)));
            let part = part.trim_end_matches('\r');
            if !part.is_empty() {
                current.push(Span::styled(part, style));
            }
        }
    }
    if !current.is_empty() {
        lines.push(Line::from(current));
    }

    lines
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(outcome) = &app.last_outcome else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);

    let record = &outcome.record;
    let lines = vec![
        Line::from(Span::styled(
            "practice complete",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(format!("score        {:.2}%", record.score_percent)),
        Line::from(format!("missed       {}", record.missed_points)),
        Line::from(format!("hints used   {}", record.hints_used)),
        Line::from(vec![
            Span::raw("health       "),
            Span::styled(
                format!("{} {:.2}%", health_bar(outcome.new_health), outcome.new_health),
                Style::default().fg(health_color(outcome.new_health)),
            ),
        ]),
    ];

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let help = Paragraph::new(Span::styled(
        "r: practice again  s: stats  esc: back",
        Style::default().add_modifier(Modifier::DIM),
    ));
    help.render(chunks[1], buf);
}

fn render_stats(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(passage) = &app.stats_passage else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    let summary = match &passage.stats {
        Some(stats) => {
            let mut spans = vec![Span::styled(
                format!("{} {:.2}%", health_bar(stats.health), stats.health),
                Style::default().fg(health_color(stats.health)),
            )];
            if let Some(last) = stats.last_practiced {
                spans.push(Span::styled(
                    format!("  last practiced {}", humanize_since(last)),
                    Style::default().add_modifier(Modifier::DIM),
                ));
            }
            Line::from(spans)
        }
        None => Line::from(Span::styled(
            "never practiced",
            Style::default().add_modifier(Modifier::DIM),
        )),
    };

    let header = Paragraph::new(vec![
        Line::from(Span::styled(
            passage.name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        summary,
    ]);
    header.render(chunks[0], buf);

    let practices = passage
        .stats
        .as_ref()
        .map(|s| s.practices.as_slice())
        .unwrap_or(&[]);

    let rows: Vec<Row> = practices
        .iter()
        .rev()
        .map(|p| {
            Row::new(vec![
                Cell::from(p.date.format("%Y-%m-%d %H:%M").to_string()),
                Cell::from(format!("{:.2}%", p.score_percent)),
                Cell::from(p.missed_points.to_string()),
                Cell::from(p.hints_used.to_string()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(9),
            Constraint::Length(8),
            Constraint::Length(7),
        ],
    )
    .header(
        Row::new(vec!["date", "score", "missed", "hints"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title("practices"));
    ratatui::widgets::Widget::render(table, chunks[1], buf);

    let help = Paragraph::new(Span::styled(
        "esc: back",
        Style::default().add_modifier(Modifier::DIM),
    ));
    help.render(chunks[2], buf);
}

fn health_bar(health: f64) -> String {
    let filled = ((health / 100.0) * HEALTH_BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(HEALTH_BAR_WIDTH);
    format!(
        "[{}{}]",
        "█".repeat(filled),
        "░".repeat(HEALTH_BAR_WIDTH - filled)
    )
}

fn health_color(health: f64) -> Color {
    if health >= 70.0 {
        Color::Green
    } else if health >= 35.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

fn humanize_since(dt: DateTime<Local>) -> String {
    let secs = (Local::now() - dt).num_seconds();
    HumanTime::from(-secs).to_string()
}
