use std::sync::OnceLock;

use regex::Regex;

use crate::analysis::AnalysisResult;

pub const EMPTY_SUMMARY_TEXT: &str = "검토 결과에 대한 상세 내용이 생성되지 않았습니다.";
pub const NO_KEY_ISSUES_TEXT: &str = "식별된 주요 쟁점이 없습니다.";
pub const EXPORT_HINT_TEXT: &str = "[e] 보고서 저장";
pub const WHAT_IF_HINT_TEXT: &str = "숫자 키로 시나리오를 켜고 끕니다";

pub fn verdict_label(code: &str) -> &str {
    match code {
        "Safe" => "안전",
        "Danger" => "위험",
        "Caution" => "주의",
        "Review Required" => "검토 필요",
        other => other,
    }
}

pub fn status_label(code: &str) -> &str {
    match code {
        "Prohibited" => "금지",
        "Permitted" => "허용",
        "Conditional" => "조건부",
        "Neutral" => "중립",
        "Ambiguous" => "모호함",
        other => other,
    }
}

pub fn risk_label(code: &str) -> &str {
    match code {
        "Red" => "높음",
        "Yellow" => "보통",
        "Green" => "낮음",
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Positive,
    Warning,
    Negative,
    Neutral,
}

pub fn verdict_tone(code: &str) -> Tone {
    match code {
        "Safe" => Tone::Positive,
        "Danger" => Tone::Negative,
        _ => Tone::Warning,
    }
}

pub fn status_tone(code: &str) -> Tone {
    match code {
        "Prohibited" => Tone::Negative,
        "Permitted" => Tone::Positive,
        _ => Tone::Neutral,
    }
}

pub fn risk_tone(code: &str) -> Tone {
    match code {
        "Red" => Tone::Negative,
        "Yellow" => Tone::Warning,
        "Green" => Tone::Positive,
        _ => Tone::Neutral,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSegment {
    Text(String),
    /// An inline `[n]` marker addressing the n-th reference (1-based).
    Citation { index: usize, marker: String },
}

impl TextSegment {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Citation { marker, .. } => marker,
        }
    }
}

fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("citation pattern is valid"))
}

/// Splits `text` around `[<digits>]` markers. Concatenating the segments
/// yields `text` unchanged. Markers whose number is zero or does not fit in
/// `usize` stay plain text.
pub fn segment_citations(text: &str) -> Vec<TextSegment> {
    let mut segments = Vec::new();
    let mut plain = String::new();
    let mut cursor = 0;

    for caps in citation_pattern().captures_iter(text) {
        let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let index = match digits.as_str().parse::<usize>() {
            Ok(index) if index >= 1 => index,
            _ => continue,
        };

        plain.push_str(&text[cursor..whole.start()]);
        if !plain.is_empty() {
            segments.push(TextSegment::Text(std::mem::take(&mut plain)));
        }
        segments.push(TextSegment::Citation {
            index,
            marker: whole.as_str().to_string(),
        });
        cursor = whole.end();
    }

    plain.push_str(&text[cursor..]);
    if !plain.is_empty() {
        segments.push(TextSegment::Text(plain));
    }
    segments
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStyle {
    Plain,
    Heading,
    Emphasis,
    Muted,
    Toned(Tone),
    Citation,
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub style: SegmentStyle,
    pub citation: Option<usize>,
    pub exclude_from_export: bool,
}

impl Segment {
    fn new(text: impl Into<String>, style: SegmentStyle) -> Self {
        Self {
            text: text.into(),
            style,
            citation: None,
            exclude_from_export: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSection {
    Verdict,
    Risk,
    Evidence,
    Roadmap,
    CrossDomain,
    WhatIf,
    References,
}

impl ReportSection {
    pub fn title(self) -> &'static str {
        match self {
            Self::Verdict => "검토 결과",
            Self::Risk => "위험도 평가",
            Self::Evidence => "상세 분석 보고서",
            Self::Roadmap => "추진 로드맵",
            Self::CrossDomain => "유사 분야 비교",
            Self::WhatIf => "What-if 시나리오",
            Self::References => "참고 문헌",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAnchor {
    Section(ReportSection),
    Reference(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub segments: Vec<Segment>,
    pub indent: u16,
    pub anchor: Option<LineAnchor>,
    pub exclude_from_export: bool,
}

impl ReportLine {
    fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            indent: 0,
            anchor: None,
            exclude_from_export: false,
        }
    }

    fn blank() -> Self {
        Self::new(Vec::new())
    }

    fn indented(mut self, indent: u16) -> Self {
        self.indent = indent;
        self
    }

    fn anchored(mut self, anchor: LineAnchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    fn screen_only(mut self) -> Self {
        self.exclude_from_export = true;
        self
    }

    pub fn text(&self) -> String {
        self.segments.iter().map(|segment| segment.text.as_str()).collect()
    }
}

/// Display-ready view of one [`AnalysisResult`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportDocument {
    lines: Vec<ReportLine>,
}

impl ReportDocument {
    pub fn build(
        result: &AnalysisResult,
        execution_time_secs: Option<f64>,
        active_what_ifs: &[String],
    ) -> Self {
        let mut doc = Self::default();
        doc.push_verdict(result, execution_time_secs);
        doc.push_risk(result);
        doc.push_evidence(result);
        doc.push_roadmap(result);
        doc.push_cross_domains(result);
        doc.push_what_ifs(result, active_what_ifs);
        doc.push_references(result);
        doc
    }

    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    /// Citation targets in reading order, one entry per marker.
    pub fn citation_indices(&self) -> Vec<usize> {
        self.lines
            .iter()
            .flat_map(|line| line.segments.iter())
            .filter_map(|segment| segment.citation)
            .collect()
    }

    pub fn anchor_line(&self, anchor: LineAnchor) -> Option<usize> {
        self.lines.iter().position(|line| line.anchor == Some(anchor))
    }

    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            for _ in 0..line.indent {
                out.push(' ');
            }
            out.push_str(&line.text());
            out.push('\n');
        }
        out
    }

    fn push(&mut self, line: ReportLine) {
        self.lines.push(line);
    }

    fn push_heading(&mut self, section: ReportSection) {
        if !self.lines.is_empty() {
            self.push(ReportLine::blank());
        }
        self.push(
            ReportLine::new(vec![Segment::new(section.title(), SegmentStyle::Heading)])
                .anchored(LineAnchor::Section(section)),
        );
    }

    fn push_cited(&mut self, text: &str, base: SegmentStyle, indent: u16) {
        let segments = segment_citations(text)
            .into_iter()
            .map(|segment| match segment {
                TextSegment::Text(text) => Segment::new(text, base),
                TextSegment::Citation { index, marker } => Segment {
                    text: marker,
                    style: SegmentStyle::Citation,
                    citation: Some(index),
                    exclude_from_export: true,
                },
            })
            .collect();
        self.push(ReportLine::new(segments).indented(indent));
    }

    fn push_verdict(&mut self, result: &AnalysisResult, execution_time_secs: Option<f64>) {
        self.push_heading(ReportSection::Verdict);
        let verdict = result.verdict.clone().unwrap_or_default();

        if !verdict.verdict.is_empty() {
            self.push(ReportLine::new(vec![
                Segment::new("판정: ", SegmentStyle::Muted),
                Segment::new(
                    verdict_label(&verdict.verdict),
                    SegmentStyle::Toned(verdict_tone(&verdict.verdict)),
                ),
            ]));
        }
        if let Some(secs) = execution_time_secs {
            self.push(ReportLine::new(vec![
                Segment::new("처리 시간: ", SegmentStyle::Muted),
                Segment::new(format!("{secs:.2}초"), SegmentStyle::Emphasis),
            ]));
        }
        self.push(
            ReportLine::new(vec![Segment::new(EXPORT_HINT_TEXT, SegmentStyle::Muted)])
                .screen_only(),
        );

        self.push(ReportLine::blank());
        if verdict.summary.trim().is_empty() {
            self.push(ReportLine::new(vec![Segment::new(
                EMPTY_SUMMARY_TEXT,
                SegmentStyle::Muted,
            )]));
        } else {
            for paragraph in verdict.summary.lines() {
                self.push_cited(paragraph, SegmentStyle::Plain, 0);
            }
        }

        if let Some(citation) = verdict.citation.as_deref().filter(|c| !c.trim().is_empty()) {
            self.push(ReportLine::blank());
            self.push(ReportLine::new(vec![Segment::new(
                "판단 근거 (법령)",
                SegmentStyle::Emphasis,
            )]));
            for line in citation.lines() {
                self.push_cited(line, SegmentStyle::Plain, 2);
            }
        }

        self.push(ReportLine::blank());
        self.push(ReportLine::new(vec![Segment::new(
            "주요 법적 쟁점",
            SegmentStyle::Emphasis,
        )]));
        if verdict.key_issues.is_empty() {
            self.push(
                ReportLine::new(vec![Segment::new(NO_KEY_ISSUES_TEXT, SegmentStyle::Muted)])
                    .indented(2),
            );
        } else {
            for issue in &verdict.key_issues {
                self.push_cited(&format!("! {issue}"), SegmentStyle::Plain, 2);
            }
        }
    }

    fn push_risk(&mut self, result: &AnalysisResult) {
        let Some(risk) = result.risk_evaluation.as_ref() else {
            return;
        };
        self.push_heading(ReportSection::Risk);
        self.push(ReportLine::new(vec![
            Segment::new("위험도: ", SegmentStyle::Muted),
            Segment::new(risk_label(&risk.score), SegmentStyle::Toned(risk_tone(&risk.score))),
        ]));
        if !risk.rationale.trim().is_empty() {
            self.push_cited(&risk.rationale, SegmentStyle::Plain, 0);
        }
        for hurdle in &risk.key_hurdles {
            self.push_cited(&format!("- {hurdle}"), SegmentStyle::Plain, 2);
        }
    }

    fn push_evidence(&mut self, result: &AnalysisResult) {
        if result.evidence.is_empty() {
            return;
        }
        self.push_heading(ReportSection::Evidence);
        for (idx, item) in result.evidence.iter().enumerate() {
            if idx > 0 {
                self.push(ReportLine::blank());
            }
            let mut header = vec![
                Segment::new(
                    format!("[{}]", status_label(&item.status)),
                    SegmentStyle::Toned(status_tone(&item.status)),
                ),
                Segment::new(" ", SegmentStyle::Plain),
                Segment::new(item.law_name.clone(), SegmentStyle::Emphasis),
            ];
            if !item.key_clause.is_empty() {
                header.push(Segment::new(format!(" {}", item.key_clause), SegmentStyle::Muted));
            }
            self.push(ReportLine::new(header));
            if !item.summary.trim().is_empty() {
                self.push_cited(&item.summary, SegmentStyle::Plain, 2);
            }
            if let Some(url) = item.url.as_deref().filter(|url| !url.is_empty()) {
                self.push(
                    ReportLine::new(vec![
                        Segment::new("법령 원문: ", SegmentStyle::Muted),
                        Segment::new(url, SegmentStyle::Link),
                    ])
                    .indented(2),
                );
            }
        }
    }

    fn push_roadmap(&mut self, result: &AnalysisResult) {
        if result.roadmap.is_empty() {
            return;
        }
        self.push_heading(ReportSection::Roadmap);
        for step in &result.roadmap {
            let mut header = vec![Segment::new(
                format!("Phase {}. {}", step.phase, step.title),
                SegmentStyle::Emphasis,
            )];
            if !step.estimated_time.is_empty() {
                header.push(Segment::new(
                    format!(" ({})", step.estimated_time),
                    SegmentStyle::Muted,
                ));
            }
            self.push(ReportLine::new(header));
            if !step.description.trim().is_empty() {
                self.push_cited(&step.description, SegmentStyle::Plain, 2);
            }
            for item in &step.action_items {
                let mut line = vec![Segment::new(format!("- {}", item.step_name), SegmentStyle::Plain)];
                if !item.submission_agency.is_empty() {
                    line.push(Segment::new(
                        format!(" @ {}", item.submission_agency),
                        SegmentStyle::Muted,
                    ));
                }
                self.push(ReportLine::new(line).indented(4));
                if !item.required_documents.is_empty() {
                    self.push(
                        ReportLine::new(vec![
                            Segment::new("필요 서류: ", SegmentStyle::Muted),
                            Segment::new(item.required_documents.join(", "), SegmentStyle::Plain),
                        ])
                        .indented(6),
                    );
                }
                if !item.context.trim().is_empty() {
                    self.push_cited(&item.context, SegmentStyle::Muted, 6);
                }
            }
        }
    }

    fn push_cross_domains(&mut self, result: &AnalysisResult) {
        if result.cross_domains.is_empty() {
            return;
        }
        self.push_heading(ReportSection::CrossDomain);
        for mapping in &result.cross_domains {
            self.push(ReportLine::new(vec![Segment::new(
                format!("{} -> {}", mapping.source_domain, mapping.target_domain),
                SegmentStyle::Emphasis,
            )]));
            for (label, value) in [
                ("소관 기관: ", &mapping.agency_mapping),
                ("관련 법령: ", &mapping.law_mapping),
            ] {
                if !value.is_empty() {
                    self.push(
                        ReportLine::new(vec![
                            Segment::new(label, SegmentStyle::Muted),
                            Segment::new(value.clone(), SegmentStyle::Plain),
                        ])
                        .indented(2),
                    );
                }
            }
            if !mapping.key_differences.trim().is_empty() {
                self.push_cited(&mapping.key_differences, SegmentStyle::Plain, 2);
            }
        }
    }

    fn push_what_ifs(&mut self, result: &AnalysisResult, active_what_ifs: &[String]) {
        if result.what_ifs.is_empty() {
            return;
        }
        self.push_heading(ReportSection::WhatIf);
        self.push(
            ReportLine::new(vec![Segment::new(WHAT_IF_HINT_TEXT, SegmentStyle::Muted)])
                .screen_only(),
        );
        for (idx, trigger) in result.what_ifs.iter().enumerate() {
            let active = active_what_ifs
                .iter()
                .any(|name| name == &trigger.variable_name);
            let mark = if active { "[x]" } else { "[ ]" };
            let tone = if active { Tone::Positive } else { Tone::Neutral };
            self.push(ReportLine::new(vec![
                Segment::new(format!("{mark} {}. ", idx + 1), SegmentStyle::Toned(tone)),
                Segment::new(trigger.variable_name.clone(), SegmentStyle::Emphasis),
                Segment::new(format!(" {}", trigger.description), SegmentStyle::Plain),
            ]));
        }
    }

    fn push_references(&mut self, result: &AnalysisResult) {
        if result.references.is_empty() {
            return;
        }
        self.push_heading(ReportSection::References);
        for (idx, reference) in result.references.iter().enumerate() {
            let number = idx + 1;
            self.push(
                ReportLine::new(vec![
                    Segment::new(format!("[{number}] "), SegmentStyle::Muted),
                    Segment::new(reference.title.clone(), SegmentStyle::Plain),
                    Segment::new(format!(" {}", reference.url), SegmentStyle::Link),
                ])
                .anchored(LineAnchor::Reference(number)),
            );
        }
    }
}
