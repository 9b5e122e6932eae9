use crate::app::{App, FilterRow, InputMode, LoadState, Page};
use crate::forms::FormField;
use crate::models::{RecordId, Tag};
use crate::notify::ToastKind;
use crate::services::tag::color_of;
use crate::view::{distinct_tags, Direction as SortDirection, Listable, SortKey};
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((r.height.saturating_sub(height)) / 2),
            Constraint::Length(height.min(r.height)),
            Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length((r.width.saturating_sub(width)) / 2),
            Constraint::Length(width.min(r.width)),
            Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// `#rrggbb` to a terminal colour. Anything else falls back to blue.
pub fn hex_color(hex: &str) -> Color {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 {
        return Color::Blue;
    }
    match u32::from_str_radix(digits, 16) {
        Ok(rgb) => Color::Rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8),
        Err(_) => Color::Blue,
    }
}

fn tag_badge(name: &str, known: &[Tag]) -> Span<'static> {
    Span::styled(
        format!(" {} ", name),
        Style::default()
            .bg(hex_color(color_of(known, name)))
            .fg(Color::Black),
    )
}

fn tag_badges(names: &[String], known: &[Tag]) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }
        spans.push(tag_badge(name, known));
    }
    Line::from(spans)
}

fn key_span(key: &'static str) -> Span<'static> {
    Span::styled(key, Style::default().fg(Color::Red))
}

fn get_legend(input_mode: &InputMode) -> Text<'static> {
    let spans = match input_mode {
        InputMode::Normal => vec![
            key_span(" q "),
            Span::raw(": Quit "),
            key_span(" j/k "),
            Span::raw(": Move "),
            key_span(" Tab "),
            Span::raw(": Tasks/Staff "),
            key_span(" / "),
            Span::raw(": Search "),
            key_span(" f "),
            Span::raw(": Filters "),
            key_span(" 1-7 "),
            Span::raw(": Sort "),
            key_span(" a "),
            Span::raw(": Add "),
            key_span(" e "),
            Span::raw(": Edit "),
            key_span(" t "),
            Span::raw(": Tags "),
            key_span(" Space "),
            Span::raw(": Mark "),
            key_span(" d "),
            Span::raw(": Delete "),
            key_span(" c "),
            Span::raw(": Clear "),
            key_span(" r "),
            Span::raw(": Refresh "),
        ],
        InputMode::Search => vec![
            key_span(" Enter "),
            Span::raw(": Apply "),
            key_span(" Esc "),
            Span::raw(": Clear search "),
        ],
        InputMode::Create | InputMode::Edit(_) => vec![
            key_span(" Tab "),
            Span::raw(": Switch field "),
            key_span(" Enter "),
            Span::raw(": Add tag / Save "),
            key_span(" Up/Down "),
            Span::raw(": Tag colour "),
            key_span(" Esc "),
            Span::raw(": Cancel "),
        ],
        InputMode::Filter => vec![
            key_span(" j/k "),
            Span::raw(": Row "),
            key_span(" h/l "),
            Span::raw(": Change "),
            key_span(" Space "),
            Span::raw(": Toggle tag "),
            key_span(" x "),
            Span::raw(": Clear all "),
            key_span(" Esc "),
            Span::raw(": Close "),
        ],
        InputMode::ConfirmDelete => vec![
            key_span(" y "),
            Span::raw(": Delete "),
            key_span(" n "),
            Span::raw(": Cancel "),
        ],
    };
    Text::from(Line::from(spans))
}

fn day(value: Option<chrono::DateTime<chrono::Utc>>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn cell_for<E: Listable>(item: &E, key: SortKey, known: &[Tag]) -> Cell<'static> {
    let text = |value: Option<&str>| value.unwrap_or("-").to_string();
    match key {
        SortKey::Name => Cell::from(item.name().to_string()),
        SortKey::Tags => Cell::from(tag_badges(item.tags(), known)),
        SortKey::Owner => Cell::from(item.owner_name().unwrap_or("Unassigned").to_string()),
        SortKey::Status => Cell::from(item.status().unwrap_or_default()),
        SortKey::CreatedOn => Cell::from(day(item.created_on())),
        SortKey::CreatedBy => Cell::from(text(item.creator_name())),
        SortKey::ModifiedOn => Cell::from(day(item.modified_on())),
        SortKey::ModifiedBy => Cell::from(text(item.modifier_name())),
    }
}

fn build_rows<'a, E: Listable + 'a>(
    items: impl Iterator<Item = (RecordId, &'a E)>,
    columns: &[SortKey],
    app: &App,
) -> Vec<Row<'static>> {
    items
        .map(|(id, item)| {
            let mark = if app.marked.contains(&id) { "*" } else { " " };
            let mut cells = vec![Cell::from(mark).style(Style::default().fg(Color::Red))];
            cells.extend(columns.iter().map(|key| cell_for(item, *key, &app.tags)));
            Row::new(cells)
        })
        .collect()
}

fn draw_table(f: &mut Frame, app: &mut App, area: Rect) {
    let columns = app.page.columns();
    let sort = app.query().sort;

    let header = Row::new(
        std::iter::once(Cell::from(" ")).chain(columns.iter().enumerate().map(|(i, key)| {
            let arrow = match (sort.key == *key, sort.direction) {
                (true, SortDirection::Ascending) => " ^",
                (true, SortDirection::Descending) => " v",
                (false, _) => "",
            };
            Cell::from(format!("{} {}{}", i + 1, key.label(), arrow))
        })),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = match app.page {
        Page::Tasks => build_rows(app.visible_tasks.iter().map(|t| (t.id, t)), columns, app),
        Page::Staff => build_rows(app.visible_staff.iter().map(|s| (s.id, s)), columns, app),
    };

    let widths: Vec<Constraint> = std::iter::once(Constraint::Length(1))
        .chain(columns.iter().map(|key| match key {
            SortKey::Name => Constraint::Min(20),
            SortKey::Tags => Constraint::Min(16),
            SortKey::Status => Constraint::Length(10),
            SortKey::CreatedOn | SortKey::ModifiedOn => Constraint::Length(12),
            _ => Constraint::Length(16),
        }))
        .collect();

    let title = match app.page {
        Page::Tasks => format!("Tasks ({} of {})", app.visible_len(), app.total_len()),
        Page::Staff => format!(
            "Staff ({} of {}, {} tags)",
            app.visible_len(),
            app.total_len(),
            distinct_tags(&app.staff).len()
        ),
    };
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn draw_message(f: &mut Frame, area: Rect, title: &str, message: String, color: Color) {
    let paragraph = Paragraph::new(message)
        .style(Style::default().fg(color))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_body(f: &mut Frame, app: &mut App, area: Rect) {
    let title = app.page.title();
    let state = app.load_state.clone();
    match &state {
        LoadState::Loading => draw_message(
            f,
            area,
            title,
            format!("Loading {}...", title.to_lowercase()),
            Color::Yellow,
        ),
        LoadState::Failed(err) => draw_message(
            f,
            area,
            title,
            format!("{}\n\nPress r to retry.", err),
            Color::Red,
        ),
        LoadState::Ready if app.total_len() == 0 => draw_message(
            f,
            area,
            title,
            format!("No {} yet. Press a to add one.", title.to_lowercase()),
            Color::Gray,
        ),
        LoadState::Ready if app.visible_len() == 0 => draw_message(
            f,
            area,
            title,
            format!(
                "No {} match the current search and filters. Press c to clear.",
                title.to_lowercase()
            ),
            Color::Gray,
        ),
        LoadState::Ready => draw_table(f, app, area),
    }
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let tab = |page: Page| {
        let style = if app.page == page {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        Span::styled(format!(" {} ", page.title()), style)
    };

    let mut spans = vec![tab(Page::Tasks), Span::raw(" "), tab(Page::Staff), Span::raw("  ")];

    let searching = app.input_mode == InputMode::Search;
    if searching || !app.query().search.is_empty() {
        let text = if searching {
            format!("{}_", app.search_input)
        } else {
            app.query().search.clone()
        };
        spans.push(Span::styled(
            "Search: ",
            Style::default().add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(text, Style::default().fg(Color::Yellow)));
        spans.push(Span::raw("  "));
    }
    if app.query().filters.is_active() {
        spans.push(Span::styled(
            "[filtered]",
            Style::default().fg(Color::Magenta),
        ));
    }
    if !app.marked.is_empty() {
        spans.push(Span::styled(
            format!("  {} marked", app.marked.len()),
            Style::default().fg(Color::Red),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_form(f: &mut Frame, app: &App, area: Rect) {
    let form = &app.form;
    let title = match app.input_mode {
        InputMode::Edit(_) => format!("Edit {}", app.page.noun()),
        _ => format!("New {}", app.page.noun()),
    };

    let active = |field: FormField| {
        if form.active == field {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    };
    let cursor = |field: FormField| if form.active == field { "_" } else { "" };

    let mut lines: Vec<Line<'static>> = vec![Line::from(vec![
        Span::styled("Name: ", active(FormField::Name)),
        Span::raw(format!("{}{}", form.name, cursor(FormField::Name))),
    ])];
    if let Some(err) = &form.error {
        lines.push(Line::from(Span::styled(
            err.to_string(),
            Style::default().fg(Color::Red),
        )));
    } else {
        lines.push(Line::from(""));
    }

    let mut tag_line = vec![Span::styled("Tags: ", active(FormField::Tags))];
    tag_line.extend(tag_badges(&form.tags.selected, &app.tags).spans);
    tag_line.push(Span::raw(format!(" {}{}", form.tags.buffer, cursor(FormField::Tags))));
    lines.push(Line::from(tag_line));

    let suggestions = form.tags.suggestions(&app.tags);
    if !suggestions.is_empty() {
        let mut spans = vec![Span::styled("  matches: ", Style::default().fg(Color::Gray))];
        for tag in suggestions.into_iter().take(5) {
            spans.push(tag_badge(&tag.name, &app.tags));
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
    } else {
        lines.push(Line::from(""));
    }

    lines.push(Line::from(vec![
        Span::styled("  new tag colour: ", Style::default().fg(Color::Gray)),
        Span::styled("    ", Style::default().bg(hex_color(form.tags.color()))),
    ]));
    lines.push(Line::from(Span::styled(
        "Quick add: type #tag in the name",
        Style::default().fg(Color::DarkGray),
    )));

    let popup = centered_rect_absolute(area.width * 60 / 100, lines.len() as u16 + 2, area);
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Green)),
        )
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup);
    f.render_widget(paragraph, popup);
}

fn draw_filters(f: &mut Frame, app: &App, area: Rect) {
    let panel = &app.filter_panel;
    let filters = &app.query().filters;

    let row_style = |row: FilterRow| {
        if panel.row == row {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    };
    let any = |value: &Option<String>| value.clone().unwrap_or_else(|| "any".to_string());

    let mut tag_spans = vec![Span::styled("Tags:       ", row_style(FilterRow::Tags))];
    for (i, tag) in app.tags.iter().enumerate() {
        let mut style = Style::default().fg(hex_color(&tag.color));
        if filters.has_tag(&tag.name) {
            style = style.add_modifier(Modifier::REVERSED);
        }
        if panel.row == FilterRow::Tags && panel.tag_cursor == i {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        tag_spans.push(Span::styled(format!(" {} ", tag.name), style));
    }

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Owner:      ", row_style(FilterRow::Owner)),
            Span::raw(format!("< {} >", any(&filters.owner))),
        ]),
        Line::from(vec![
            Span::styled("Created by: ", row_style(FilterRow::Creator)),
            Span::raw(format!("< {} >", any(&filters.created_by))),
        ]),
        Line::from(tag_spans),
        Line::from(vec![
            Span::styled("From:       ", row_style(FilterRow::CreatedFrom)),
            Span::raw(panel.from_text.clone()),
        ]),
        Line::from(vec![
            Span::styled("To:         ", row_style(FilterRow::CreatedTo)),
            Span::raw(panel.to_text.clone()),
        ]),
    ];
    if let Some(err) = &panel.error {
        lines.push(Line::from(Span::styled(
            err.clone(),
            Style::default().fg(Color::Red),
        )));
    }

    let popup = centered_rect_absolute(area.width * 70 / 100, lines.len() as u16 + 2, area);
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Filters")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Magenta)),
        )
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup);
    f.render_widget(paragraph, popup);
}

fn draw_confirm(f: &mut Frame, app: &App, area: Rect) {
    let count = app.pending_delete.len();
    let question = if count == 1 {
        format!("Delete this {}?", app.page.noun())
    } else {
        format!("Delete {} {} records?", count, app.page.noun())
    };
    let popup = centered_rect_absolute(44, 5, area);
    let paragraph = Paragraph::new(vec![
        Line::from(question),
        Line::from(Span::styled(
            "This cannot be undone. (y/n)",
            Style::default().fg(Color::Gray),
        )),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .title("Confirm")
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Red)),
    );

    f.render_widget(Clear, popup);
    f.render_widget(paragraph, popup);
}

fn draw_toasts(f: &mut Frame, app: &App, area: Rect) {
    let spans: Vec<Span> = app
        .toasts
        .visible()
        .flat_map(|toast| {
            let color = match toast.kind {
                ToastKind::Success => Color::Green,
                ToastKind::Error => Color::Red,
                ToastKind::Info => Color::Cyan,
            };
            [
                Span::styled(format!(" {} ", toast.message), Style::default().fg(color)),
                Span::raw(" "),
            ]
        })
        .collect();
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw(f: &mut Frame, app: &mut App) {
    let size = f.area();

    // header, body, toasts, legend
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(2),
        ])
        .split(size);

    draw_header(f, app, chunks[0]);
    draw_body(f, app, chunks[1]);

    match app.input_mode {
        InputMode::Create | InputMode::Edit(_) => draw_form(f, app, chunks[1]),
        InputMode::Filter => draw_filters(f, app, chunks[1]),
        InputMode::ConfirmDelete => draw_confirm(f, app, chunks[1]),
        InputMode::Normal | InputMode::Search => {}
    }

    draw_toasts(f, app, chunks[2]);

    let legend = Paragraph::new(get_legend(&app.input_mode))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    f.render_widget(legend, chunks[3]);
}

pub async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    poll_timeout: Duration,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, &mut app))?;

        app.tick(Instant::now());

        // Handle input
        if event::poll(poll_timeout)? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_input(key).await {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::config::{Backend as StoreBackend, Config, TableNames};
    use crate::models::Identity;
    use crate::services::testing::fixture_store;
    use crate::services::Services;
    use ratatui::backend::TestBackend;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color("#ef4444"), Color::Rgb(0xef, 0x44, 0x44));
        assert_eq!(hex_color("10b981"), Color::Rgb(0x10, 0xb9, 0x81));
        assert_eq!(hex_color("red"), Color::Blue);
        assert_eq!(hex_color("#zzzzzz"), Color::Blue);
    }

    #[test]
    fn test_centered_rect_fits_inside() {
        let outer = Rect::new(0, 0, 100, 40);
        let inner = centered_rect_absolute(60, 10, outer);
        assert_eq!(inner, Rect::new(20, 15, 60, 10));

        let tiny = centered_rect_absolute(60, 10, Rect::new(0, 0, 20, 5));
        assert!(tiny.width <= 20 && tiny.height <= 5);
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_draws_loading_then_table() {
        let config = Config {
            backend: StoreBackend::Fixture,
            instance_url: None,
            api_key: None,
            tables: TableNames::default(),
            page_size: 100,
            identity: Identity::new(9, "Dana"),
            data_dir: None,
            debounce: Duration::from_millis(300),
            toast_ttl: Duration::from_secs(4),
            poll_timeout: Duration::from_millis(100),
        };
        let services = Services::new(fixture_store().await, &config);
        let mut app = App::new(services, &config);
        let mut terminal = Terminal::new(TestBackend::new(140, 20)).unwrap();

        terminal.draw(|f| draw(f, &mut app)).unwrap();
        assert!(buffer_text(&terminal).contains("Loading tasks..."));

        app.reload().await;
        terminal.draw(|f| draw(f, &mut app)).unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("Tasks (6 of 6)"));
        assert!(text.contains("Plan team offsite"));
        assert!(text.contains("5 Created v"));
    }

    async fn loaded_app() -> App {
        let config = Config {
            backend: StoreBackend::Fixture,
            instance_url: None,
            api_key: None,
            tables: TableNames::default(),
            page_size: 100,
            identity: Identity::new(9, "Dana"),
            data_dir: None,
            debounce: Duration::from_millis(300),
            toast_ttl: Duration::from_secs(4),
            poll_timeout: Duration::from_millis(100),
        };
        let services = Services::new(fixture_store().await, &config);
        let mut app = App::new(services, &config);
        app.reload().await;
        app
    }

    #[tokio::test]
    async fn test_refresh_draws_loading_before_fetch_completes() {
        let mut app = loaded_app().await;
        let mut terminal = Terminal::new(TestBackend::new(140, 20)).unwrap();

        app.handle_input(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE))
            .await;
        terminal.draw(|f| draw(f, &mut app)).unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("Loading tasks..."));
        assert!(!text.contains("Tasks (6 of 6)"));

        app.wait_for_load().await;
        terminal.draw(|f| draw(f, &mut app)).unwrap();
        assert!(buffer_text(&terminal).contains("Tasks (6 of 6)"));
    }

    #[tokio::test]
    async fn test_staff_title_counts_distinct_tags() {
        let mut app = loaded_app().await;
        let mut terminal = Terminal::new(TestBackend::new(140, 20)).unwrap();

        app.handle_input(KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE))
            .await;
        terminal.draw(|f| draw(f, &mut app)).unwrap();
        assert!(buffer_text(&terminal).contains("Staff (3 of 3, 5 tags)"));
    }
}
