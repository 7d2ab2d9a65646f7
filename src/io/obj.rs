use std::fs;
use std::fmt::Write as _;
use std::path::Path;

use crate::error::{Error, Result};
use crate::vertex_list::{Primitive, VertexList};

/// One `f`-directive vertex reference: position plus optional uv/normal.
#[derive(Clone, Copy)]
struct FaceRef {
    v: usize,
    vt: Option<usize>,
    vn: Option<usize>,
}

pub fn read(path: &Path, scale: f32) -> Result<Vec<VertexList>> {
    let text = fs::read_to_string(path)?;
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut objects: Vec<Vec<[FaceRef; 3]>> = Vec::new();
    let mut current: Vec<[FaceRef; 3]> = Vec::new();

    for (lineno, raw) in text.lines().enumerate() {
        let line = lineno + 1;
        let parse = |s: &str| -> Result<f32> {
            s.parse()
                .map_err(|_| Error::Parse { line, message: format!("bad number '{s}'") })
        };
        let mut words = raw.split_whitespace();
        match words.next() {
            Some("v") => {
                let mut p = [0.0; 3];
                for slot in &mut p {
                    let word = words
                        .next()
                        .ok_or_else(|| Error::Parse { line, message: "v needs 3 floats".into() })?;
                    *slot = parse(word)? * scale;
                }
                positions.push(p);
            }
            Some("vt") => {
                let u = parse(words.next().ok_or_else(|| Error::Parse {
                    line,
                    message: "vt needs 2 floats".into(),
                })?)?;
                let v = parse(words.next().ok_or_else(|| Error::Parse {
                    line,
                    message: "vt needs 2 floats".into(),
                })?)?;
                uvs.push([u, 1.0 - v]);
            }
            Some("vn") => {
                let mut p = [0.0; 3];
                for slot in &mut p {
                    let word = words.next().ok_or_else(|| Error::Parse {
                        line,
                        message: "vn needs 3 floats".into(),
                    })?;
                    *slot = parse(word)?;
                }
                normals.push(p);
            }
            Some("f") => {
                let refs: Vec<FaceRef> = words
                    .map(|w| parse_face_ref(w, line, positions.len(), uvs.len(), normals.len()))
                    .collect::<Result<_>>()?;
                match refs.as_slice() {
                    [a, b, c] => current.push([*a, *b, *c]),
                    _ => {
                        return Err(Error::Parse {
                            line,
                            message: format!("only triangular faces supported, got {}", refs.len()),
                        });
                    }
                }
            }
            Some("o") => {
                if !current.is_empty() {
                    objects.push(std::mem::take(&mut current));
                }
            }
            _ => {} // comments, groups, materials
        }
    }
    if !current.is_empty() {
        objects.push(current);
    }

    let mut out = Vec::new();
    for faces in objects {
        let has_uv = faces[0][0].vt.is_some();
        let has_normal = faces[0][0].vn.is_some();
        let fpv = 3 + if has_uv { 2 } else { 0 } + if has_normal { 3 } else { 0 };
        let mut vl = VertexList::new(fpv, Primitive::Triangles)?;
        for tri in faces {
            for r in tri {
                let mut record = Vec::with_capacity(fpv);
                record.extend_from_slice(&positions[r.v]);
                if has_uv {
                    record.extend_from_slice(&r.vt.map(|i| uvs[i]).unwrap_or([0.0; 2]));
                }
                if has_normal {
                    record.extend_from_slice(&r.vn.map(|i| normals[i]).unwrap_or([0.0; 3]));
                }
                vl.add(&record)?;
            }
        }
        out.push(vl);
    }
    Ok(out)
}

fn parse_face_ref(
    word: &str,
    line: usize,
    nv: usize,
    nvt: usize,
    nvn: usize,
) -> Result<FaceRef> {
    let mut parts = word.split('/');
    let index = |s: Option<&str>, count: usize, what: &str| -> Result<Option<usize>> {
        match s {
            None | Some("") => Ok(None),
            Some(s) => {
                let i: usize = s.parse().map_err(|_| Error::Parse {
                    line,
                    message: format!("bad {what} index '{s}'"),
                })?;
                if i == 0 || i > count {
                    return Err(Error::Parse {
                        line,
                        message: format!("{what} index {i} out of range (have {count})"),
                    });
                }
                Ok(Some(i - 1))
            }
        }
    };
    let v = index(parts.next(), nv, "vertex")?.ok_or_else(|| Error::Parse {
        line,
        message: "face reference without a vertex index".into(),
    })?;
    let vt = index(parts.next(), nvt, "texture")?;
    let vn = index(parts.next(), nvn, "normal")?;
    Ok(FaceRef { v, vt, vn })
}

pub fn write(path: &Path, lists: &[VertexList], scale: f32) -> Result<()> {
    let mut text = String::from("# libpolyhedra\n");
    let mut offset = 1usize;
    for (n, vl) in lists.iter().enumerate() {
        if vl.primitive() != Primitive::Triangles || vl.floats_per_vert() < 3 {
            return Err(Error::InputInvalid("OBJ output requires triangle meshes".into()));
        }
        let fpv = vl.floats_per_vert();
        let has_uv = fpv >= 5;
        let has_normal = fpv >= 8;
        let _ = writeln!(text, "o polyhedra.{n:03}");
        for i in 0..vl.vert_count() {
            let r = vl.vert(i);
            let _ = writeln!(text, "v {} {} {}", r[0] * scale, r[1] * scale, r[2] * scale);
            if has_uv {
                let _ = writeln!(text, "vt {} {}", r[3], 1.0 - r[4]);
            }
            if has_normal {
                let _ = writeln!(text, "vn {} {} {}", r[5], r[6], r[7]);
            }
        }
        for [a, b, c] in vl.triangles() {
            let _ = write!(text, "f");
            for i in [a, b, c] {
                let i = offset + i as usize;
                if has_normal {
                    let _ = write!(text, " {i}/{i}/{i}");
                } else if has_uv {
                    let _ = write!(text, " {i}/{i}");
                } else {
                    let _ = write!(text, " {i}");
                }
            }
            let _ = writeln!(text);
        }
        offset += vl.vert_count() as usize;
    }
    fs::write(path, text)?;
    Ok(())
}
