use miri_core::report::ReportDocument;
use miri_core::report::SegmentStyle;
use miri_core::report::Tone;
use miri_core::state::AppSelection;
use ratatui::style::Color;
use ratatui::style::Modifier;
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::text::Span;

use crate::ui::UiPalette;

pub(crate) fn tone_color(tone: Tone, palette: UiPalette) -> Color {
    match tone {
        Tone::Positive => palette.success,
        Tone::Warning => palette.warning,
        Tone::Negative => palette.danger,
        Tone::Neutral => palette.muted,
    }
}

fn segment_style(style: SegmentStyle, palette: UiPalette) -> Style {
    match style {
        SegmentStyle::Plain => Style::default(),
        SegmentStyle::Heading => Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        SegmentStyle::Emphasis => Style::default().add_modifier(Modifier::BOLD),
        SegmentStyle::Muted => Style::default().fg(palette.muted),
        SegmentStyle::Toned(tone) => Style::default()
            .fg(tone_color(tone, palette))
            .add_modifier(Modifier::BOLD),
        SegmentStyle::Citation => Style::default()
            .fg(palette.accent_alt)
            .add_modifier(Modifier::BOLD),
        SegmentStyle::Link => Style::default()
            .fg(palette.accent_alt)
            .add_modifier(Modifier::UNDERLINED),
    }
}

/// Styled lines for the whole document. The citation under the cursor and
/// the focused reference entry are highlighted.
pub(crate) fn report_lines(
    doc: &ReportDocument,
    selection: &AppSelection,
    palette: UiPalette,
) -> Vec<Line<'static>> {
    let focused = selection
        .focused_reference
        .map(miri_core::report::LineAnchor::Reference);
    let mut citation_pos = 0usize;
    let mut out = Vec::with_capacity(doc.lines().len());

    for line in doc.lines() {
        let mut spans = Vec::with_capacity(line.segments.len() + 1);
        if line.indent > 0 {
            spans.push(Span::raw(" ".repeat(usize::from(line.indent))));
        }
        for segment in &line.segments {
            let mut style = segment_style(segment.style, palette);
            if segment.citation.is_some() {
                if selection.citation_cursor == Some(citation_pos) {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                citation_pos += 1;
            }
            spans.push(Span::styled(segment.text.clone(), style));
        }

        let mut rendered = Line::from(spans);
        if focused.is_some() && line.anchor == focused {
            rendered = rendered.style(Style::default().bg(palette.selected_bg));
        }
        out.push(rendered);
    }
    out
}
