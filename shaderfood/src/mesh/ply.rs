//! Stanford PLY polygon soups, in any of the three encodings.
//!
//! The `vertex` element supplies `pos` (`x y z`), `normal` (`nx ny nz`),
//! `uv` (`s t`, `u v` or `texture_u texture_v`) and `color`
//! (`red green blue [alpha]`, integers normalized to 0..1).  The `face`
//! element's index list is fan-triangulated.  Other elements are skipped.

use super::{Model, Scene};
use crate::buffers::IndexData;
use crate::error::MeshError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Encoding {
    Ascii,
    LittleEndian,
    BigEndian,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl Scalar {
    fn from_name(name: &str) -> Result<Self, MeshError> {
        Ok(match name {
            "char" | "int8" => Self::I8,
            "uchar" | "uint8" => Self::U8,
            "short" | "int16" => Self::I16,
            "ushort" | "uint16" => Self::U16,
            "int" | "int32" => Self::I32,
            "uint" | "uint32" => Self::U32,
            "float" | "float32" => Self::F32,
            "double" | "float64" => Self::F64,
            other => return Err(MeshError::ply(format!("unsupported type {other:?}"))),
        })
    }
    fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
    /// Divisor that maps this type's color values into 0..1.
    fn color_scale(self) -> f64 {
        match self {
            Self::I8 => i8::MAX as f64,
            Self::U8 => u8::MAX as f64,
            Self::I16 => i16::MAX as f64,
            Self::U16 => u16::MAX as f64,
            Self::I32 => i32::MAX as f64,
            Self::U32 => u32::MAX as f64,
            Self::F32 | Self::F64 => 1.0,
        }
    }
}

#[derive(Clone, Debug)]
enum Property {
    Scalar { name: String, ty: Scalar },
    List { name: String, count: Scalar, item: Scalar },
}

impl Property {
    fn name(&self) -> &str {
        match self {
            Self::Scalar { name, .. } | Self::List { name, .. } => name,
        }
    }
}

#[derive(Clone, Debug)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

impl Element {
    fn scalar(&self, name: &str) -> Option<usize> {
        self.properties
            .iter()
            .position(|p| matches!(p, Property::Scalar { name: n, .. } if n == name))
    }
}

struct Header {
    encoding: Encoding,
    elements: Vec<Element>,
}

fn bad_header(line: &str) -> MeshError {
    MeshError::ply(format!("bad header line {line:?}"))
}

/// Parses the header, returning it and the offset where the body starts.
fn parse_header(bytes: &[u8]) -> Result<(Header, usize), MeshError> {
    let mut pos = 0;
    let mut lines = vec![];
    loop {
        let rest = &bytes[pos..];
        let Some(nl) = rest.iter().position(|&b| b == b'\n') else {
            return Err(MeshError::ply("header has no end_header"));
        };
        let line = std::str::from_utf8(&rest[..nl])
            .map_err(|_| MeshError::ply("header is not text"))?
            .trim_end_matches('\r');
        pos += nl + 1;
        if line.trim() == "end_header" {
            break;
        }
        lines.push(line);
    }

    let mut lines = lines.into_iter();
    if lines.next().map(str::trim) != Some("ply") {
        return Err(MeshError::ply("missing ply magic"));
    }
    let mut encoding = None;
    let mut elements: Vec<Element> = vec![];
    for line in lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [] | ["comment", ..] | ["obj_info", ..] => {}
            ["format", format, _version] => {
                encoding = Some(match *format {
                    "ascii" => Encoding::Ascii,
                    "binary_little_endian" => Encoding::LittleEndian,
                    "binary_big_endian" => Encoding::BigEndian,
                    other => return Err(MeshError::ply(format!("unknown format {other:?}"))),
                });
            }
            ["element", name, count] => elements.push(Element {
                name: name.to_string(),
                count: count.parse().map_err(|_| bad_header(line))?,
                properties: vec![],
            }),
            ["property", "list", count, item, name] => elements
                .last_mut()
                .ok_or_else(|| bad_header(line))?
                .properties
                .push(Property::List {
                    name: name.to_string(),
                    count: Scalar::from_name(count)?,
                    item: Scalar::from_name(item)?,
                }),
            ["property", ty, name] => elements
                .last_mut()
                .ok_or_else(|| bad_header(line))?
                .properties
                .push(Property::Scalar {
                    name: name.to_string(),
                    ty: Scalar::from_name(ty)?,
                }),
            _ => return Err(bad_header(line)),
        }
    }
    let encoding = encoding.ok_or_else(|| MeshError::ply("header has no format line"))?;
    Ok((Header { encoding, elements }, pos))
}

enum Body<'a> {
    Ascii(std::str::SplitAsciiWhitespace<'a>),
    Binary {
        bytes: &'a [u8],
        pos: usize,
        big_endian: bool,
    },
}

impl<'a> Body<'a> {
    fn read(&mut self, ty: Scalar) -> Result<f64, MeshError> {
        match self {
            Self::Ascii(tokens) => {
                let tok = tokens
                    .next()
                    .ok_or_else(|| MeshError::ply("truncated body"))?;
                tok.parse()
                    .map_err(|_| MeshError::ply(format!("bad number {tok:?}")))
            }
            Self::Binary {
                bytes,
                pos,
                big_endian,
            } => {
                let size = ty.size();
                let raw = bytes
                    .get(*pos..*pos + size)
                    .ok_or_else(|| MeshError::ply(format!("truncated body at byte {pos}")))?;
                *pos += size;
                let mut buf = [0_u8; 8];
                buf[..size].copy_from_slice(raw);
                if *big_endian {
                    buf[..size].reverse();
                }
                let le4 = [buf[0], buf[1], buf[2], buf[3]];
                Ok(match ty {
                    Scalar::I8 => buf[0] as i8 as f64,
                    Scalar::U8 => buf[0] as f64,
                    Scalar::I16 => i16::from_le_bytes([buf[0], buf[1]]) as f64,
                    Scalar::U16 => u16::from_le_bytes([buf[0], buf[1]]) as f64,
                    Scalar::I32 => i32::from_le_bytes(le4) as f64,
                    Scalar::U32 => u32::from_le_bytes(le4) as f64,
                    Scalar::F32 => f32::from_le_bytes(le4) as f64,
                    Scalar::F64 => f64::from_le_bytes(buf),
                })
            }
        }
    }

    fn read_count(&mut self, ty: Scalar) -> Result<usize, MeshError> {
        let n = self.read(ty)?;
        if n < 0.0 || n.fract() != 0.0 {
            return Err(MeshError::ply(format!("bad list length {n}")));
        }
        Ok(n as usize)
    }
}

/// One element instance: scalar values in property order, plus any lists.
#[derive(Default)]
struct Row {
    scalars: Vec<f64>,
    lists: Vec<Vec<f64>>,
}

fn read_row(body: &mut Body, element: &Element, row: &mut Row) -> Result<(), MeshError> {
    row.scalars.clear();
    row.lists.clear();
    for prop in element.properties.iter() {
        match prop {
            Property::Scalar { ty, .. } => row.scalars.push(body.read(*ty)?),
            Property::List { count, item, .. } => {
                row.scalars.push(f64::NAN);
                let n = body.read_count(*count)?;
                // the length is untrusted; let a short body end the loop
                let mut list = vec![];
                for _ in 0..n {
                    list.push(body.read(*item)?);
                }
                row.lists.push(list);
            }
        }
    }
    Ok(())
}

/// Indices into a vertex row for one attribute's components.
fn columns(element: &Element, names: &[&str]) -> Option<Vec<usize>> {
    names.iter().map(|n| element.scalar(n)).collect()
}

/// Parses a PLY file into a single model named `unnamed.0`.
pub fn parse(bytes: &[u8]) -> Result<Scene, MeshError> {
    let (header, body_at) = parse_header(bytes)?;
    let body_bytes = &bytes[body_at..];
    let mut body = match header.encoding {
        Encoding::Ascii => Body::Ascii(
            std::str::from_utf8(body_bytes)
                .map_err(|_| MeshError::ply("ascii body is not text"))?
                .split_ascii_whitespace(),
        ),
        enc => Body::Binary {
            bytes: body_bytes,
            pos: 0,
            big_endian: enc == Encoding::BigEndian,
        },
    };

    let mut pos = vec![];
    let mut normal = vec![];
    let mut uv = vec![];
    let mut color = vec![];
    let mut indices: Vec<u32> = vec![];
    let mut vertex_count = 0;
    let mut row = Row::default();

    for element in header.elements.iter() {
        match element.name.as_str() {
            "vertex" => {
                let xyz = columns(element, &["x", "y", "z"])
                    .ok_or_else(|| MeshError::ply("vertex element has no x, y and z"))?;
                let nxyz = columns(element, &["nx", "ny", "nz"]);
                let st = [["s", "t"], ["u", "v"], ["texture_u", "texture_v"]]
                    .iter()
                    .find_map(|names| columns(element, names));
                let rgb = columns(element, &["red", "green", "blue"]);
                let alpha = element.scalar("alpha");
                let color_type = |i: usize| match &element.properties[i] {
                    Property::Scalar { ty, .. } => ty.color_scale(),
                    Property::List { .. } => 1.0,
                };
                for _ in 0..element.count {
                    read_row(&mut body, element, &mut row)?;
                    let v = &row.scalars;
                    pos.extend(xyz.iter().map(|&i| v[i] as f32));
                    if let Some(n) = &nxyz {
                        normal.extend(n.iter().map(|&i| v[i] as f32));
                    }
                    if let Some(t) = &st {
                        uv.extend(t.iter().map(|&i| v[i] as f32));
                    }
                    if let Some(c) = &rgb {
                        color.extend(c.iter().map(|&i| (v[i] / color_type(i)) as f32));
                        color.push(alpha.map_or(1.0, |i| (v[i] / color_type(i)) as f32));
                    }
                }
                vertex_count = element.count;
            }
            "face" => {
                let list = element
                    .properties
                    .iter()
                    .filter(|p| matches!(p, Property::List { .. }))
                    .position(|p| p.name() == "vertex_indices" || p.name() == "vertex_index")
                    .ok_or_else(|| MeshError::ply("face element has no vertex_indices list"))?;
                for _ in 0..element.count {
                    read_row(&mut body, element, &mut row)?;
                    let corners = &row.lists[list];
                    if corners.len() < 3 {
                        log::trace!("ply: skipping face with {} corners", corners.len());
                        continue;
                    }
                    for i in 1..corners.len() - 1 {
                        for &c in &[corners[0], corners[i], corners[i + 1]] {
                            if c < 0.0 || c > u32::MAX as f64 || c.fract() != 0.0 {
                                return Err(MeshError::ply(format!("bad vertex index {c}")));
                            }
                            indices.push(c as u32);
                        }
                    }
                }
            }
            other => {
                log::trace!("ply: skipping {} {other:?} elements", element.count);
                for _ in 0..element.count {
                    read_row(&mut body, element, &mut row)?;
                }
            }
        }
    }

    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
        return Err(MeshError::ply(format!(
            "vertex index {bad} out of range ({vertex_count} vertices)"
        )));
    }
    let mut model = Model::new("unnamed.0", IndexData::from_u32(indices)).with_attribute("pos", pos);
    if !normal.is_empty() {
        model = model.with_attribute("normal", normal);
    }
    if !uv.is_empty() {
        model = model.with_attribute("uv", uv);
    }
    if !color.is_empty() {
        model = model.with_attribute("color", color);
    }
    log::debug!(
        "ply: {} vertices, {} triangles",
        model.vertex_count(),
        model.triangle_count()
    );
    let mut scene = Scene::new();
    scene.insert(model);
    Ok(scene)
}

/// Load and parse a PLY file.
pub async fn load(url: &str) -> Result<Scene, MeshError> {
    let bytes = crate::assets::load_bytes(url).await?;
    parse(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII_QUAD: &str = "ply\n\
format ascii 1.0\n\
comment a unit quad\n\
element vertex 4\n\
property float x\n\
property float y\n\
property float z\n\
property uchar red\n\
property uchar green\n\
property uchar blue\n\
element face 1\n\
property list uchar int vertex_indices\n\
end_header\n\
0 0 0 255 0 0\n\
1 0 0 0 255 0\n\
1 1 0 0 0 255\n\
0 1 0 255 255 255\n\
4 0 1 2 3\n";

    #[test]
    fn ascii_quad_with_colors() {
        let scene = parse(ASCII_QUAD.as_bytes()).unwrap();
        let m = scene.get("unnamed.0").unwrap();
        assert_eq!(m.vertex_count(), 4);
        assert_eq!(m.indices.to_u32(), vec![0, 1, 2, 0, 2, 3]);
        let color = m.attribute("color").unwrap().as_slice();
        assert_eq!(&color[0..4], &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(&color[12..16], &[1.0, 1.0, 1.0, 1.0]);
        assert!(m.attribute("normal").is_none());
    }

    fn binary_triangle(big_endian: bool) -> Vec<u8> {
        let format = if big_endian {
            "binary_big_endian"
        } else {
            "binary_little_endian"
        };
        let mut out = format!(
            "ply\r\nformat {format} 1.0\r\n\
element vertex 3\r\n\
property float x\r\nproperty float y\r\nproperty float z\r\n\
property float nx\r\nproperty float ny\r\nproperty float nz\r\n\
property float s\r\nproperty float t\r\n\
element edge 1\r\nproperty int vertex1\r\nproperty int vertex2\r\n\
element face 1\r\n\
property uchar flags\r\n\
property list uchar ushort vertex_index\r\n\
end_header\r\n"
        )
        .into_bytes();
        let f = |out: &mut Vec<u8>, v: f32| {
            out.extend(if big_endian {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            })
        };
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            for v in [x, y, 0.0, 0.0, 0.0, 1.0, x, y] {
                f(&mut out, v);
            }
        }
        for i in [0_i32, 1] {
            out.extend(if big_endian {
                i.to_be_bytes()
            } else {
                i.to_le_bytes()
            });
        }
        out.push(7);
        out.push(3);
        for i in [0_u16, 1, 2] {
            out.extend(if big_endian {
                i.to_be_bytes()
            } else {
                i.to_le_bytes()
            });
        }
        out
    }

    #[test]
    fn binary_encodings_agree() {
        let le = parse(&binary_triangle(false)).unwrap();
        let be = parse(&binary_triangle(true)).unwrap();
        assert_eq!(le, be);
        let m = le.get("unnamed.0").unwrap();
        assert_eq!(m.indices.to_u32(), vec![0, 1, 2]);
        assert_eq!(
            m.attribute("pos").unwrap().as_slice(),
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        );
        assert_eq!(m.attribute("normal").unwrap().len(), 9);
        assert_eq!(m.attribute("uv").unwrap().as_slice(), &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn malformed_files_are_errors() {
        let cases: &[(&[u8], &str)] = &[
            (b"plx\nformat ascii 1.0\nend_header\n", "magic"),
            (b"ply\nformat ascii 1.0\nelement vertex 1\n", "end_header"),
            (b"ply\nformat ascii 1.0\nelement vertex 1\nproperty half x\nend_header\n", "unsupported type"),
            (b"ply\nformat ascii 1.0\nproperty float x\nend_header\n", "bad header"),
            (b"ply\nformat ascii 1.0\nelement vertex 1\nproperty float y\nend_header\n0\n", "x, y and z"),
            (b"ply\nformat ascii 1.0\nelement vertex 2\nproperty float x\nproperty float y\nproperty float z\nend_header\n0 0 0\n", "truncated"),
            (
                b"ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\nproperty float z\n\
element face 1\nproperty list uchar int vertex_indices\nend_header\n0 0 0\n3 0 0 5\n",
                "out of range",
            ),
        ];
        for (bytes, expected) in cases {
            let err = parse(bytes).unwrap_err();
            assert!(err.to_string().contains(expected), "{err} should mention {expected}");
        }
    }

    const ONE_TRIANGLE: &[u8] = b"ply\nformat ascii 1.0\nelement vertex 3\n\
property float x\nproperty float y\nproperty float z\n\
element face 1\nproperty list uchar int vertex_indices\nend_header\n\
0 0 0\n1 0 0\n0 1 0\n";

    #[test]
    fn huge_list_lengths_end_at_the_body() {
        let mut ascii = ONE_TRIANGLE.to_vec();
        ascii.extend(b"1e19 0 1 2\n");
        let err = parse(&ascii).unwrap_err();
        assert!(err.to_string().contains("truncated body"), "{err}");

        let mut binary = b"ply\nformat binary_little_endian 1.0\nelement face 1\n\
property list uint int vertex_indices\nend_header\n"
            .to_vec();
        binary.extend(u32::MAX.to_le_bytes());
        binary.extend(0_i32.to_le_bytes());
        let err = parse(&binary).unwrap_err();
        assert!(err.to_string().contains("truncated body"), "{err}");
    }

    #[test]
    fn fractional_face_indices_are_errors() {
        let mut ascii = ONE_TRIANGLE.to_vec();
        ascii.extend(b"3 0 1.5 2\n");
        let err = parse(&ascii).unwrap_err();
        assert!(err.to_string().contains("bad vertex index 1.5"), "{err}");
    }

    fn textured_triangle(u: &str, v: &str) -> Vec<u8> {
        format!(
            "ply\nformat ascii 1.0\nelement vertex 3\n\
property float x\nproperty float y\nproperty float z\n\
property float {u}\nproperty float {v}\n\
property uchar red\nproperty uchar green\nproperty uchar blue\nproperty uchar alpha\n\
element face 1\nproperty list uchar int vertex_indices\nend_header\n\
0 0 0 0 0 255 0 0 255\n\
1 0 0 1 0 0 255 0 0\n\
0 1 0 0 1 0 0 255 51\n\
3 0 1 2\n"
        )
        .into_bytes()
    }

    #[test]
    fn uv_spellings_and_alpha_column() {
        let uv = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        for (u, v) in [("u", "v"), ("texture_u", "texture_v")] {
            let scene = parse(&textured_triangle(u, v)).unwrap();
            let m = scene.get("unnamed.0").unwrap();
            assert_eq!(m.attribute("uv").unwrap().as_slice(), &uv, "{u} {v}");
            let color = m.attribute("color").unwrap().as_slice();
            assert_eq!(color.len(), 12);
            assert_eq!(&color[0..4], &[1.0, 0.0, 0.0, 1.0]);
            assert_eq!(color[7], 0.0);
            assert_eq!(color[11], 0.2);
        }
    }
}
