use kaz_core::{
    model::PropertyType,
    query::{
        DETAIL_ROWS, FilterSpec, HISTOGRAM_BINS, MapPoint, Summary, View, price_histogram,
        recent_transactions, type_breakdown,
    },
    service::{Dataset, QueryOutcome},
};
use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Dataset as ChartDataset,
        GraphType, List, ListItem, ListState, Paragraph, Row, Table, Wrap,
        canvas::{Canvas, Points},
    },
};

use crate::app::{App, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    let header = Paragraph::new(format!(
        "kaz – DVF real-estate sales in La Réunion · {}",
        app.source_label
    ))
    .block(Block::default().borders(Borders::ALL).title("kaz"));
    frame.render_widget(header, *header_area);

    match app.screen {
        Screen::MunicipalitySelect => draw_municipality_select(frame, app, *content_area),
        Screen::Dashboard => draw_dashboard(frame, app, *content_area),
    }

    let nav_hint = match app.screen {
        Screen::MunicipalitySelect => "↑/↓ move · Enter/Space open · q/Ctrl-C quit",
        Screen::Dashboard => {
            "←/→ postal code · Space toggle · a all · t type · [/] min · {/} max · r reset · ↑/↓ scroll · u reload · Esc back · q quit"
        }
    };

    let status_text = if app.is_loading {
        format!("Loading… · {nav_hint}")
    } else if let Some(msg) = &app.error_message {
        format!("{msg} · {nav_hint}")
    } else {
        nav_hint.to_owned()
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn draw_municipality_select(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let items = app
        .municipalities
        .iter()
        .enumerate()
        .map(|(idx, municipality)| {
            let prefix = if idx == app.list_index { "> " } else { "  " };
            ListItem::new(format!(
                "{prefix}{} ({})",
                municipality.name, municipality.code
            ))
        })
        .collect::<Vec<ListItem<'_>>>();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Choose a municipality (↑/↓, Enter)"),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    if !app.municipalities.is_empty() {
        state.select(Some(app.list_index));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_dashboard(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let name = app
        .selected_municipality()
        .map_or("<municipality>", |municipality| municipality.name.as_str());

    if app.is_loading {
        render_message(frame, area, &format!("Loading sales for {name}…"), name);
        return;
    }
    if let Some(notice) = &app.notice {
        render_message(frame, area, notice, name);
        return;
    }
    let (Some(dataset), Some(filter)) = (app.dataset.as_ref(), app.filter.as_ref()) else {
        render_message(frame, area, "No data loaded. Press Esc to pick a municipality.", name);
        return;
    };

    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);
    let chunks = layout_chunks.as_ref();
    let [filter_area, body_area] = chunks else {
        return;
    };

    draw_filters(frame, app, dataset, filter, *filter_area);

    let shown = dataset.municipality().name.as_str();
    match dataset.query(filter) {
        QueryOutcome::NoMatch => {
            render_message(frame, *body_area, "No transaction matches your filters.", shown);
        }
        QueryOutcome::Matched { view, summary } => {
            draw_results(frame, app, shown, &view, &summary, *body_area);
        }
    }
}

fn render_message(frame: &mut Frame<'_>, area: Rect, message: &str, name: &str) {
    let paragraph = Paragraph::new(message.to_owned())
        .block(Block::default().borders(Borders::ALL).title(name.to_owned()))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn draw_filters(frame: &mut Frame<'_>, app: &App, dataset: &Dataset, filter: &FilterSpec, area: Rect) {
    let mut codes = vec![Span::raw("Postal codes: ")];
    for (idx, code) in app.postal_codes.iter().enumerate() {
        let mark = if filter.postal_codes.contains(code) { "x" } else { " " };
        let mut style = Style::default();
        if idx == app.postal_index {
            style = style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
        }
        codes.push(Span::styled(format!("[{mark}] {code}"), style));
        codes.push(Span::raw("  "));
    }

    let bounds = Line::from(format!(
        "Type: {}   Min price: {} €   Max price: {} €",
        filter.property_type,
        group_thousands(filter.min_value),
        group_thousands(filter.max_value)
    ));

    let municipality = dataset.municipality();
    let title = format!(
        "{} ({}) · {} · {} sales from {} source rows",
        municipality.name,
        municipality.code,
        dataset.source().label,
        dataset.records().len(),
        dataset.report().input_rows
    );
    let paragraph = Paragraph::new(vec![Line::from(codes), bounds])
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(paragraph, area);
}

fn draw_results(
    frame: &mut Frame<'_>,
    app: &App,
    name: &str,
    view: &View<'_>,
    summary: &Summary,
    area: Rect,
) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Percentage(45),
            Constraint::Min(0),
        ])
        .split(area);
    let chunks = layout_chunks.as_ref();
    let [metrics_area, charts_area, bottom_area] = chunks else {
        return;
    };

    draw_metrics(frame, summary, *metrics_area);

    let chart_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(*charts_area);
    if let [histogram_area, types_area] = chart_chunks.as_ref() {
        draw_histogram(frame, name, view, *histogram_area);
        draw_type_breakdown(frame, view, *types_area);
    }

    let bottom_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(*bottom_area);
    if let [map_area, table_area] = bottom_chunks.as_ref() {
        draw_map(frame, app, name, *map_area);
        draw_recent(frame, app, view, *table_area);
    }
}

fn draw_metrics(frame: &mut Frame<'_>, summary: &Summary, area: Rect) {
    let metrics = [
        ("Avg price / m²", format!("{} €", group_thousands(summary.mean_price_per_area))),
        ("Median price", format!("{} €", group_thousands(summary.median_property_value))),
        ("Transactions", group_thousands(count_f64(summary.transaction_count))),
        ("Avg area", format!("{} m²", group_thousands(summary.mean_built_area))),
    ];

    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);

    for ((title, value), cell) in metrics.into_iter().zip(cells.iter()) {
        let widget = Paragraph::new(value)
            .style(Style::default().add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(widget, *cell);
    }
}

fn draw_histogram(frame: &mut Frame<'_>, name: &str, view: &View<'_>, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Price per m² distribution in {name}"));
    let Some(bins) = price_histogram(view, HISTOGRAM_BINS) else {
        frame.render_widget(Paragraph::new("No data").block(block), area);
        return;
    };

    let low = bins.first().map_or(0.0, |bin| bin.lower);
    let high = bins.last().map_or(0.0, |bin| bin.upper);
    let peak = bins.iter().map(|bin| bin.houses.max(bin.apartments)).max().unwrap_or(0);
    let quarter = (high - low) / (count_f64(bins.len()) * 4.0);

    // Both types share a bin; offset them so the bars sit side by side.
    let houses: Vec<(f64, f64)> = bins
        .iter()
        .filter(|bin| bin.houses > 0)
        .map(|bin| (f64::midpoint(bin.lower, bin.upper) - quarter, count_f64(bin.houses)))
        .collect();
    let apartments: Vec<(f64, f64)> = bins
        .iter()
        .filter(|bin| bin.apartments > 0)
        .map(|bin| (f64::midpoint(bin.lower, bin.upper) + quarter, count_f64(bin.apartments)))
        .collect();

    let datasets = vec![
        ChartDataset::default()
            .name(PropertyType::House.to_string())
            .marker(Marker::HalfBlock)
            .graph_type(GraphType::Bar)
            .style(Style::default().fg(type_color(PropertyType::House)))
            .data(&houses),
        ChartDataset::default()
            .name(PropertyType::Apartment.to_string())
            .marker(Marker::HalfBlock)
            .graph_type(GraphType::Bar)
            .style(Style::default().fg(type_color(PropertyType::Apartment)))
            .data(&apartments),
    ];

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .title("€/m²")
                .bounds([low, high.max(low + 1.0)])
                .labels([
                    group_thousands(low),
                    group_thousands(f64::midpoint(low, high)),
                    group_thousands(high),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("sales")
                .bounds([0.0, count_f64(peak).max(1.0)])
                .labels(["0".to_owned(), peak.to_string()]),
        );

    frame.render_widget(chart, area);
}

fn draw_type_breakdown(frame: &mut Frame<'_>, view: &View<'_>, area: Rect) {
    let bars: Vec<Bar<'_>> = type_breakdown(view)
        .into_iter()
        .map(|share| {
            Bar::default()
                .value(u64::try_from(share.count).unwrap_or(u64::MAX))
                .label(Line::from(share.property_type.to_string()))
                .text_value(format!("{} ({:.0}%)", share.count, share.share * 100.0))
                .style(Style::default().fg(type_color(share.property_type)))
        })
        .collect();

    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title("Property types"))
        .bar_width(14)
        .bar_gap(3)
        .data(BarGroup::default().bars(&bars));

    frame.render_widget(chart, area);
}

fn draw_map(frame: &mut Frame<'_>, app: &App, name: &str, area: Rect) {
    let Some(points) = app.map_points.as_ref() else {
        let paragraph = Paragraph::new("Location data (latitude/longitude) is not available for the map.")
            .block(Block::default().borders(Borders::ALL).title(format!("Map of {name}")))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    };

    let (x_bounds, y_bounds) = map_bounds(points);
    let (cheap_cut, dear_cut) = price_terciles(points);
    let (mut cheap, mut middle, mut dear) = (Vec::new(), Vec::new(), Vec::new());
    for point in points {
        let coord = (point.longitude, point.latitude);
        if point.price_per_area < cheap_cut {
            cheap.push(coord);
        } else if point.price_per_area < dear_cut {
            middle.push(coord);
        } else {
            dear.push(coord);
        }
    }

    let title = format!("Transactions in {name} ({} sampled)", points.len());
    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .marker(Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            for (coords, color) in [
                (&cheap, Color::Green),
                (&middle, Color::Yellow),
                (&dear, Color::Red),
            ] {
                ctx.draw(&Points {
                    coords: coords.as_slice(),
                    color,
                });
            }
        });

    frame.render_widget(canvas, area);
}

fn map_bounds(points: &[MapPoint]) -> ([f64; 2], [f64; 2]) {
    let (mut west, mut east, mut south, mut north) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    for point in points {
        west = west.min(point.longitude);
        east = east.max(point.longitude);
        south = south.min(point.latitude);
        north = north.max(point.latitude);
    }
    let pad_x = ((east - west) * 0.05).max(0.001);
    let pad_y = ((north - south) * 0.05).max(0.001);
    ([west - pad_x, east + pad_x], [south - pad_y, north + pad_y])
}

// Cut points splitting the sample into three equally sized price groups.
fn price_terciles(points: &[MapPoint]) -> (f64, f64) {
    let mut prices: Vec<f64> = points.iter().map(|point| point.price_per_area).collect();
    prices.sort_by(f64::total_cmp);
    let at = |fraction: usize| {
        prices
            .get(prices.len() * fraction / 3)
            .copied()
            .unwrap_or(f64::MAX)
    };
    (at(1), at(2))
}

fn draw_recent(frame: &mut Frame<'_>, app: &App, view: &View<'_>, area: Rect) {
    let rows = recent_transactions(view, DETAIL_ROWS);
    let offset = app.detail_offset.min(rows.len().saturating_sub(1));
    let total = rows.len();

    let table_rows = rows.into_iter().skip(offset).map(|row| {
        Row::new(vec![
            Cell::from(row.mutation_date.format("%d/%m/%Y").to_string()),
            Cell::from(row.property_type.to_string()),
            Cell::from(format!("{} €", group_thousands(row.property_value))),
            Cell::from(format!("{} m²", group_thousands(row.built_area))),
            Cell::from(group_thousands(row.price_per_area)),
            Cell::from(row.postal_code),
            Cell::from(row.rooms.map_or_else(String::new, |rooms| rooms.to_string())),
            Cell::from(row.street.unwrap_or_default()),
        ])
        .style(Style::default().fg(type_color(row.property_type)))
    });

    let column_widths = [
        Constraint::Length(10),
        Constraint::Length(9),
        Constraint::Length(12),
        Constraint::Length(7),
        Constraint::Length(7),
        Constraint::Length(6),
        Constraint::Length(5),
        Constraint::Min(10),
    ];

    let title = format!("Latest transactions ({}/{total})", offset + 1);
    let table = Table::new(table_rows, column_widths)
        .header(
            Row::new(vec!["Date", "Type", "Price", "Area", "€/m²", "Postal", "Rooms", "Street"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .column_spacing(1);

    frame.render_widget(table, area);
}

fn type_color(property_type: PropertyType) -> Color {
    match property_type {
        PropertyType::House => Color::Cyan,
        PropertyType::Apartment => Color::Magenta,
    }
}

fn count_f64(count: usize) -> f64 {
    u32::try_from(count).map_or(f64::from(u32::MAX), f64::from)
}

/// Rounded amount with a space between thousands, as written in French.
fn group_thousands(value: f64) -> String {
    let rounded = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (idx, digit) in rounded.chars().enumerate() {
        if idx > 0 && (rounded.len() - idx) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }
    if value < 0.0 && rounded != "0" {
        grouped.insert(0, '-');
    }
    grouped
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use kaz_core::{
        model::{PlausibilityBand, SourceId},
        plugin::SourceRegistry,
        service::KazService,
    };
    use ratatui::{Terminal, backend::TestBackend};

    use super::*;

    const HEADER: &str = "id_mutation,date_mutation,valeur_fonciere,code_postal,code_commune,type_local,surface_reelle_bati,latitude,longitude";

    fn rendered(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(200, 60)).expect("test terminal");
        terminal.draw(|frame| draw(frame, app)).expect("draw");
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[tokio::test]
    async fn dashboard_names_the_loaded_municipality() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "{HEADER}").expect("write header");
        writeln!(file, "a,2024-03-01,150000,97470,97411,Maison,50,-21.03,55.71").expect("write row");

        let source = SourceId(kaz_source_file::SOURCE_ID.to_owned());
        let registry = SourceRegistry::new(vec![kaz_source_file::plugin(
            file.path(),
            PlausibilityBand::LOCAL_FILE,
        )]);
        let mut app = App::new(Arc::new(KazService::new(Arc::new(registry))), source.clone());
        app.select_code("97411");
        let state = app
            .service
            .dataset(&source, "97411")
            .await
            .expect("known municipality");
        app.apply_state(state);

        let screen = rendered(&app);
        assert!(screen.contains("Avg price"), "metrics are drawn");
        assert!(screen.contains("Saint-Benoît (97411)"), "banner names the municipality");
        assert!(screen.contains("1 sales from 1 source rows"), "banner shows the row counts");
        assert!(screen.contains("Transactions in Saint-Benoît"), "map title names it too");
    }

    #[test]
    fn thousands_are_grouped() {
        assert_eq!(group_thousands(0.0), "0");
        assert_eq!(group_thousands(999.4), "999");
        assert_eq!(group_thousands(150_000.0), "150 000");
        assert_eq!(group_thousands(1_234_567.8), "1 234 568");
        assert_eq!(group_thousands(-2500.0), "-2 500");
    }
}
