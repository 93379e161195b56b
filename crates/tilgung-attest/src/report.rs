// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable certificate report (the `.report` artifact), rendered to PDF
// with `printpdf` 0.8.
//
// printpdf 0.8 builds pages from `Vec<Op>` operation lists.  The report is a
// flat list of styled lines laid out top to bottom on A4 with the built-in
// Helvetica faces, breaking onto a new page when the bottom margin is hit.

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use tilgung_core::types::Certificate;
use tracing::{debug, instrument};

use crate::record::CertificateRecord;

const PAGE_W_MM: f32 = 210.0;
const PAGE_H_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;

#[derive(Debug, Clone, Copy)]
enum Style {
    Title,
    Heading,
    Body,
    Footer,
}

impl Style {
    fn font(self) -> BuiltinFont {
        match self {
            Self::Title | Self::Heading => BuiltinFont::HelveticaBold,
            Self::Body | Self::Footer => BuiltinFont::Helvetica,
        }
    }

    fn size_pt(self) -> f32 {
        match self {
            Self::Title => 18.0,
            Self::Heading => 13.0,
            Self::Body => 10.5,
            Self::Footer => 9.0,
        }
    }

    /// Vertical advance after the line.
    fn advance_pt(self) -> f32 {
        self.size_pt() * 1.4
    }
}

struct Line {
    text: String,
    style: Style,
    /// Extra space before the line.
    space_before_pt: f32,
}

/// Render the report for `cert` and return the PDF bytes.
#[instrument(skip_all, fields(certificate_id = %cert.id))]
pub fn render(cert: &Certificate, record: &CertificateRecord) -> Vec<u8> {
    let lines = layout(cert, record);

    let page_w = Mm(PAGE_W_MM);
    let page_h = Mm(PAGE_H_MM);
    let margin_pt = Mm(MARGIN_MM).into_pt().0;
    let top_pt = page_h.into_pt().0 - margin_pt;

    let mut pages = Vec::new();
    let mut ops: Vec<Op> = Vec::new();
    let mut y = top_pt;

    for line in &lines {
        let needed = line.space_before_pt + line.style.advance_pt();
        if y - needed < margin_pt && !ops.is_empty() {
            pages.push(PdfPage::new(page_w, page_h, std::mem::take(&mut ops)));
            y = top_pt;
        } else {
            y -= line.space_before_pt;
        }

        let font = line.style.font();
        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(margin_pt),
                y: Pt(y),
            },
        });
        ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(line.style.size_pt()),
            font,
        });
        ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(line.text.clone())],
            font,
        });
        ops.push(Op::EndTextSection);
        y -= line.style.advance_pt();
    }
    pages.push(PdfPage::new(page_w, page_h, ops));

    let mut doc = PdfDocument::new(&format!("Erasure Certificate {}", cert.id));
    doc.with_pages(pages);
    debug!(lines = lines.len(), pages = doc.pages.len(), "report laid out");

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    doc.save(&PdfSaveOptions::default(), &mut warnings)
}

fn layout(cert: &Certificate, record: &CertificateRecord) -> Vec<Line> {
    let mut lines = vec![
        Line {
            text: "Data Erasure Certificate".into(),
            style: Style::Title,
            space_before_pt: 0.0,
        },
        Line {
            text: format!("Certificate ID: {}", cert.id),
            style: Style::Body,
            space_before_pt: 4.0,
        },
    ];

    let e = &record.erasure;
    let sections: [(&str, Vec<(&str, String)>); 5] = [
        (
            "Certificate Information",
            vec![
                ("Certificate ID", record.certificate.id.clone()),
                ("Created At", stamp(&record.certificate.created_at)),
                ("Expires At", stamp(&record.certificate.expires_at)),
                ("Status", "Valid".into()),
            ],
        ),
        (
            "User Information",
            vec![
                ("User ID", record.user.id.clone()),
                ("User Name", record.user.name.clone()),
                ("Organization", record.user.organization.clone()),
            ],
        ),
        (
            "Device Information",
            vec![
                ("Device Serial", record.device.serial.clone()),
                ("Device Model", record.device.model.clone()),
                ("Device Type", record.device.device_type.clone()),
            ],
        ),
        (
            "Erasure Operation",
            vec![
                ("Operation ID", e.operation_id.to_string()),
                ("Method", format!("{} ({})", e.method_name, e.method)),
                ("Status", e.status.clone()),
                ("Target", format!("{} {}", e.target_kind, e.target_path)),
                ("Size", format!("{} ({} bytes)", e.size_human, e.size_bytes)),
                ("Passes Completed", format!("{}/{}", e.passes_completed, e.total_passes)),
                ("Duration", format!("{:.2} seconds", e.duration_seconds)),
                (
                    "Verification Hash",
                    e.verification_hash.clone().unwrap_or_else(|| "N/A".into()),
                ),
            ],
        ),
        (
            "Verification Information",
            vec![
                ("Certificate Hash", record.verification.certificate_hash.clone()),
                ("Signature Algorithm", record.verification.signature_algorithm.clone()),
                ("Key Size", format!("{} bits", record.verification.key_size)),
                ("Certificate Authority", record.verification.certificate_authority.clone()),
            ],
        ),
    ];

    for (heading, rows) in sections {
        lines.push(Line {
            text: heading.into(),
            style: Style::Heading,
            space_before_pt: 14.0,
        });
        for (label, value) in rows {
            for (i, chunk) in wrap_text(&format!("{label}: {value}"), body_chars_per_line())
                .into_iter()
                .enumerate()
            {
                lines.push(Line {
                    text: if i == 0 { chunk } else { format!("    {chunk}") },
                    style: Style::Body,
                    space_before_pt: 0.0,
                });
            }
        }
    }

    lines.push(Line {
        text: "This certificate is digitally signed; verify it against the accompanying .sig file."
            .into(),
        style: Style::Footer,
        space_before_pt: 24.0,
    });
    lines
}

fn stamp(t: &chrono::DateTime<chrono::Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Approximate characters per body line.  Average Helvetica glyph width is
/// roughly half the font size.
fn body_chars_per_line() -> usize {
    let usable_mm = PAGE_W_MM - 2.0 * MARGIN_MM;
    let avg_char_mm = 0.5 * Style::Body.size_pt() * 0.3528;
    (usable_mm / avg_char_mm) as usize
}

/// Word-wrap `text` to `max_width` characters, force-breaking long words
/// such as hashes and paths.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while word.chars().count() > max_width {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            let split = word
                .char_indices()
                .nth(max_width)
                .map_or(word.len(), |(i, _)| i);
            let (head, tail) = word.split_at(split);
            out.push(head.to_owned());
            word = tail;
        }
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word.chars().count() <= max_width {
            current.push(' ');
            current.push_str(word);
        } else {
            out.push(std::mem::replace(&mut current, word.to_owned()));
        }
    }
    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::sample_certificate;

    #[test]
    fn renders_a_pdf() {
        let cert = sample_certificate();
        let record = CertificateRecord::build(&cert);
        let pdf = render(&cert, &record);
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn wrap_breaks_long_words() {
        let hash = "a".repeat(70);
        let lines = wrap_text(&format!("Digest: {hash}"), 30);
        assert!(lines.iter().all(|l| l.chars().count() <= 30));
        assert_eq!(lines.concat().matches('a').count(), 70);
    }

    #[test]
    fn wrap_keeps_short_text() {
        assert_eq!(wrap_text("User ID: 42", 80), vec!["User ID: 42".to_string()]);
        assert_eq!(wrap_text("", 80), vec![String::new()]);
    }

    #[test]
    fn layout_covers_every_section() {
        let cert = sample_certificate();
        let lines = layout(&cert, &CertificateRecord::build(&cert));
        let text: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        for heading in ["User Information", "Device Information", "Erasure Operation"] {
            assert!(text.contains(&heading), "{heading}");
        }
        assert!(text.iter().any(|l| l.starts_with("Passes Completed: 3/3")));
    }
}
