//! Line assembly: fold text runs into visual lines.
//!
//! Runs are merged left to right while the probability model says the
//! next run continues the open line. Every other slot passes through in
//! order; an assembled table forces the next run onto a new line.

use crate::model::{BoundingBox, ContentPrimitive, SemanticNode, Slot, TextLine};
use crate::probability::ProbabilityModel;

use super::Thresholds;

/// Fold the text runs of `slots` into [`TextLine`] slots.
pub fn assemble_lines(slots: Vec<Slot>, model: &dyn ProbabilityModel, thresholds: &Thresholds) -> Vec<Slot> {
    let mut out: Vec<Slot> = Vec::with_capacity(slots.len());
    let mut open: Option<usize> = None;
    let mut separate = false;

    for slot in slots {
        match slot {
            Slot::Primitive(ContentPrimitive::TextRun(run)) => {
                if run.is_empty() || run.is_whitespace() {
                    continue;
                }
                let merge = match (open, separate) {
                    (Some(index), false) => match &out[index] {
                        Slot::Line(line) => {
                            line.hidden() == run.hidden
                                && model.run_merge_probability(line, &run) >= thresholds.line_merge
                        }
                        _ => false,
                    },
                    _ => false,
                };
                if merge {
                    if let Some(Slot::Line(line)) = open.and_then(|index| out.get_mut(index)) {
                        line.push_run(run, thresholds.space_ratio);
                    }
                } else {
                    out.push(Slot::Line(TextLine::from_run(run)));
                    open = Some(out.len() - 1);
                }
                separate = false;
            }
            other => {
                if matches!(other, Slot::Node(SemanticNode::Table(_)) | Slot::Line(_)) {
                    separate = true;
                }
                out.push(other);
            }
        }
    }

    for slot in &mut out {
        if let Slot::Line(line) = slot {
            line.close(thresholds.space_ratio);
        }
    }
    link_line_art_bullets(&mut out, thresholds.line_art_label_epsilon);
    out
}

/// Attach a bare line-art glyph to the line that follows it when it sits
/// to the left of the line and is no taller than the line.
fn link_line_art_bullets(slots: &mut [Slot], epsilon: f64) {
    let mut pending: Option<BoundingBox> = None;
    for slot in slots.iter_mut() {
        match slot {
            Slot::Primitive(ContentPrimitive::LineArt(art)) => {
                pending = Some(art.bbox);
            }
            Slot::Node(SemanticNode::Table(_)) => pending = None,
            Slot::Line(line) => {
                if let Some(art) = pending.take() {
                    if art.right <= line.left() && art.height() < epsilon * line.bbox.height() {
                        line.label_box = Some(art);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LineArt, TextRun};
    use crate::probability::GeometricModel;

    fn run(text: &str, left: f64, right: f64, bottom: f64) -> Slot {
        Slot::Primitive(ContentPrimitive::TextRun(TextRun::new(
            0,
            BoundingBox::new(0, left, bottom, right, bottom + 12.0),
            text,
            10.0,
        )))
    }

    fn lines(slots: &[Slot]) -> Vec<String> {
        slots.iter().filter_map(Slot::as_line).map(|l| l.text.clone()).collect()
    }

    #[test]
    fn test_runs_on_one_baseline_merge() {
        let slots = vec![
            run("Hello", 50.0, 80.0, 700.0),
            run("world", 84.0, 115.0, 700.0),
            run("Second", 50.0, 90.0, 680.0),
        ];
        let out = assemble_lines(slots, &GeometricModel::default(), &Thresholds::default());
        assert_eq!(lines(&out), vec!["Hello world", "Second"]);
    }

    #[test]
    fn test_whitespace_runs_skipped() {
        let slots = vec![run("   ", 50.0, 60.0, 700.0), run("text", 62.0, 90.0, 700.0)];
        let out = assemble_lines(slots, &GeometricModel::default(), &Thresholds::default());
        assert_eq!(out.len(), 1);
        assert_eq!(lines(&out), vec!["text"]);
    }

    #[test]
    fn test_hidden_runs_start_new_line() {
        let hidden = match run("ocr", 84.0, 100.0, 700.0) {
            Slot::Primitive(ContentPrimitive::TextRun(r)) => Slot::Primitive(ContentPrimitive::TextRun(r.with_hidden(true))),
            other => other,
        };
        let slots = vec![run("visible", 50.0, 80.0, 700.0), hidden];
        let out = assemble_lines(slots, &GeometricModel::default(), &Thresholds::default());
        assert_eq!(lines(&out).len(), 2);
    }

    #[test]
    fn test_line_art_bullet_attached() {
        let art = Slot::Primitive(ContentPrimitive::LineArt(LineArt {
            index: 0,
            bbox: BoundingBox::new(0, 40.0, 703.0, 46.0, 709.0),
            hidden: false,
        }));
        let slots = vec![art, run("Item", 50.0, 80.0, 700.0)];
        let out = assemble_lines(slots, &GeometricModel::default(), &Thresholds::default());
        let line = out.iter().find_map(Slot::as_line).unwrap();
        assert!(line.label_box.is_some());
        // the glyph stays in the page flow
        assert_eq!(out.len(), 2);
    }
}
