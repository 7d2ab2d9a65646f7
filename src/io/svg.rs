use std::fs;
use std::fmt::Write as _;
use std::path::Path;

use glam::Vec2;

use crate::error::{Error, Result};
use crate::vertex_list::{Primitive, VertexList};

/// Render line lists as `<line>` strokes and triangle lists as filled
/// `<polygon>`s, with a viewBox enclosing every point.
pub fn write(path: &Path, lists: &[VertexList], scale: f32) -> Result<()> {
    let mut min = Vec2::INFINITY;
    let mut max = Vec2::NEG_INFINITY;
    for vl in lists {
        if vl.floats_per_vert() < 2 {
            return Err(Error::InputInvalid("SVG output needs 2D or wider vertices".into()));
        }
        for i in 0..vl.vert_count() {
            let p = vl.pos2(i) * scale;
            min = min.min(p);
            max = max.max(p);
        }
    }
    if !min.is_finite() {
        (min, max) = (Vec2::ZERO, Vec2::ONE);
    }
    let size = (max - min).max(Vec2::ONE * 1e-6);
    let stroke = size.max_element() * 0.005;

    let mut text = String::new();
    let _ = writeln!(
        text,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{} {} {} {}">"#,
        min.x, min.y, size.x, size.y
    );
    for vl in lists {
        match vl.primitive() {
            Primitive::Lines => {
                for [a, b] in vl.segments() {
                    let (pa, pb) = (vl.pos2(a) * scale, vl.pos2(b) * scale);
                    let _ = writeln!(
                        text,
                        r#"  <line x1="{}" y1="{}" x2="{}" y2="{}" stroke="black" stroke-width="{stroke}"/>"#,
                        pa.x, pa.y, pb.x, pb.y
                    );
                }
            }
            Primitive::Triangles => {
                for [a, b, c] in vl.triangles() {
                    let (pa, pb, pc) = (vl.pos2(a) * scale, vl.pos2(b) * scale, vl.pos2(c) * scale);
                    let _ = writeln!(
                        text,
                        r#"  <polygon points="{},{} {},{} {},{}" fill="silver" stroke="black" stroke-width="{stroke}"/>"#,
                        pa.x, pa.y, pb.x, pb.y, pc.x, pc.y
                    );
                }
            }
            _ => {
                return Err(Error::InputInvalid(
                    "SVG output supports line and triangle lists".into(),
                ));
            }
        }
    }
    text.push_str("</svg>\n");
    fs::write(path, text)?;
    Ok(())
}
