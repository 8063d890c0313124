use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::GridConfig;
use crate::model::{Model, UIData};

pub const TITLE_HEIGHT: u16 = 1;
pub const CMDLINE_HEIGH: u16 = 1;
pub const TABLE_HEADER_HEIGHT: u16 = 2;
pub const COLUMN_SPACING: u16 = 1;

pub struct TableUI {
    show_filters: bool,
}

impl TableUI {
    pub fn new(cfg: &GridConfig) -> Self {
        Self {
            show_filters: cfg.filter_fields,
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [title_area, table_area, cmdline_area] = Layout::vertical([
            Constraint::Length(TITLE_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(CMDLINE_HEIGH),
        ])
        .areas(frame.area());

        self.draw_title(&uidata, frame, title_area);
        self.draw_table(&uidata, frame, table_area);
        self.draw_cmdline(&uidata, frame, cmdline_area);

        if uidata.show_popup {
            self.draw_popup(&uidata, frame);
        }
    }

    fn draw_title(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let title = Line::from(vec![
            Span::from(format!(" {} ", uidata.name)).bold(),
            Span::from(format!("[{}/{} rows]", uidata.nrows, uidata.total_rows)).yellow(),
        ]);
        frame.render_widget(Paragraph::new(title), area);
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let header_cells = uidata
            .headers
            .iter()
            .zip(uidata.filters.iter())
            .map(|(header, filter)| {
                let mut lines = vec![Line::from(header.clone()).bold()];
                if self.show_filters {
                    let filter_line = if filter.is_empty() {
                        Line::from("/").dark_gray()
                    } else {
                        Line::from(format!("/{filter}")).italic().cyan()
                    };
                    lines.push(filter_line);
                }
                Cell::from(Text::from(lines))
            });
        let header_height = if self.show_filters { TABLE_HEADER_HEIGHT } else { 1 };
        let header = Row::new(header_cells)
            .height(header_height)
            .style(Style::default().add_modifier(Modifier::UNDERLINED));

        let rows = uidata
            .rows
            .iter()
            .map(|cells| Row::new(cells.iter().map(|c| Cell::from(c.as_str()))));

        let widths = uidata
            .widths
            .iter()
            .map(|&w| Constraint::Length(w.min(u16::MAX as usize) as u16));

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(COLUMN_SPACING)
            .row_highlight_style(Style::default().bg(Color::DarkGray))
            .column_highlight_style(Style::default().fg(Color::Yellow))
            .cell_highlight_style(Style::default().fg(Color::Black).bg(Color::Yellow))
            .block(Block::bordered().border_set(border::PLAIN));

        let mut state = TableState::default();
        if !uidata.rows.is_empty() {
            state.select(Some(uidata.selected_row));
        }
        if !uidata.headers.is_empty() {
            state.select_column(Some(uidata.selected_column));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_cmdline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        match &uidata.filter_input {
            Some(input) => {
                let line = Line::from(vec![Span::from("filter /").cyan(), Span::from(input.input.as_str())]);
                frame.render_widget(Paragraph::new(line), area);
                let x = area.x + 8 + input.curser_pos as u16;
                frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
            }
            None => {
                let position = format!("{}/{} ", uidata.abs_selected_row + 1, uidata.nrows);
                let [message_area, position_area] = Layout::horizontal([
                    Constraint::Min(0),
                    Constraint::Length(position.len() as u16),
                ])
                .areas(area);
                frame.render_widget(Paragraph::new(uidata.status_message.as_str()), message_area);
                frame.render_widget(Paragraph::new(position).right_aligned(), position_area);
            }
        }
    }

    fn draw_popup(&self, uidata: &UIData, frame: &mut Frame) {
        let area = popup_area(frame.area(), 60, 22);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(" <Esc> close ").centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(uidata.popup_message.as_str())
                .wrap(Wrap { trim: false })
                .block(block),
            area,
        );
    }
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_is_centered_and_clipped() {
        let area = Rect::new(0, 0, 100, 40);
        assert_eq!(popup_area(area, 60, 20), Rect::new(20, 10, 60, 20));
        let small = Rect::new(0, 0, 30, 10);
        assert_eq!(popup_area(small, 60, 20), small);
    }
}
