//! Conversion between PDF annotation dictionaries and [`NativeAnnotation`].

use crate::PdfEngineError;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};

/// Numeric annotation kind codes shared with the annotation model.
pub mod codes {
    pub const UNKNOWN: i32 = -1;
    pub const TEXT: i32 = 0;
    /// Accepted on write as a rectangle; never produced on read.
    pub const SQUARE_ALIAS: i32 = 1;
    pub const LINK: i32 = 2;
    pub const SQUARE: i32 = 3;
    pub const FREE_TEXT: i32 = 4;
    pub const CIRCLE: i32 = 5;
    pub const LINE: i32 = 6;
    pub const POLYGON: i32 = 7;
    pub const HIGHLIGHT: i32 = 8;
    pub const UNDERLINE: i32 = 9;
    pub const STRIKE_OUT: i32 = 10;
    pub const SQUIGGLY: i32 = 11;
    pub const STAMP: i32 = 12;
    pub const INK: i32 = 15;
    pub const POPUP: i32 = 16;
}

const SUBTYPES: &[(&str, i32)] = &[
    ("Text", codes::TEXT),
    ("Link", codes::LINK),
    ("Square", codes::SQUARE),
    ("FreeText", codes::FREE_TEXT),
    ("Circle", codes::CIRCLE),
    ("Line", codes::LINE),
    ("Polygon", codes::POLYGON),
    ("Highlight", codes::HIGHLIGHT),
    ("Underline", codes::UNDERLINE),
    ("StrikeOut", codes::STRIKE_OUT),
    ("Squiggly", codes::SQUIGGLY),
    ("Stamp", codes::STAMP),
    ("Ink", codes::INK),
    ("Popup", codes::POPUP),
];

const DEFAULT_FONT_SIZE: f32 = 12.0;

pub fn subtype_code(name: &[u8]) -> i32 {
    SUBTYPES
        .iter()
        .find(|(subtype, _)| subtype.as_bytes() == name)
        .map_or(codes::UNKNOWN, |(_, code)| *code)
}

pub fn subtype_name(code: i32) -> Option<&'static str> {
    if code == codes::SQUARE_ALIAS {
        return Some("Square");
    }
    SUBTYPES.iter().find(|(_, known)| *known == code).map(|(subtype, _)| *subtype)
}

/// An annotation as stored in the file, with its rectangle in top-left page space.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeAnnotation {
    pub code: i32,
    /// `[x0, y0, x1, y1]`, normalized so `x0 <= x1` and `y0 <= y1`.
    pub rect: [f32; 4],
    pub stroke: Option<[f32; 3]>,
    pub contents: Option<String>,
    pub font_size: Option<f32>,
}

impl NativeAnnotation {
    pub fn new(code: i32, rect: [f32; 4]) -> Self {
        Self { code, rect, stroke: None, contents: None, font_size: None }
    }

    pub fn with_stroke(mut self, stroke: [f32; 3]) -> Self {
        self.stroke = Some(stroke);
        self
    }

    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = Some(contents.into());
        self
    }

    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = Some(font_size);
        self
    }

    fn is_text_markup(&self) -> bool {
        matches!(
            self.code,
            codes::HIGHLIGHT | codes::UNDERLINE | codes::STRIKE_OUT | codes::SQUIGGLY
        )
    }
}

pub(crate) fn read_annotation(
    document: &Document,
    dict: &Dictionary,
    media_box: [f32; 4],
) -> Option<NativeAnnotation> {
    let rect = read_rect(document, dict.get(b"Rect").ok()?)?;

    let code = dict
        .get(b"Subtype")
        .ok()
        .and_then(|subtype| subtype.as_name().ok())
        .map_or(codes::UNKNOWN, subtype_code);

    let stroke = dict.get(b"C").ok().and_then(|color| read_color(document, color));
    let contents = dict.get(b"Contents").ok().and_then(|value| match resolve(document, value) {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        _ => None,
    });
    let font_size = dict.get(b"DA").ok().and_then(|da| match resolve(document, da) {
        Object::String(bytes, _) => parse_font_size(&String::from_utf8_lossy(bytes)),
        _ => None,
    });

    Some(NativeAnnotation { code, rect: flip(rect, media_box), stroke, contents, font_size })
}

pub(crate) fn write_annotation(
    annotation: &NativeAnnotation,
    media_box: [f32; 4],
    page_id: ObjectId,
) -> Result<Dictionary, PdfEngineError> {
    let subtype = subtype_name(annotation.code)
        .ok_or(PdfEngineError::UnsupportedAnnotation(annotation.code))?;
    let [x0, y0, x1, y1] = flip(normalize(annotation.rect), media_box);

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"Annot".to_vec()));
    dict.set("Subtype", Object::Name(subtype.as_bytes().to_vec()));
    dict.set("Rect", reals(&[x0, y0, x1, y1]));
    dict.set("F", Object::Integer(4));
    dict.set("P", Object::Reference(page_id));

    if let Some(stroke) = annotation.stroke {
        dict.set("C", reals(&stroke));
    }
    if let Some(contents) = &annotation.contents {
        dict.set("Contents", encode_text(contents));
    }

    if annotation.is_text_markup() {
        dict.set("QuadPoints", reals(&[x0, y1, x1, y1, x0, y0, x1, y0]));
    }

    match subtype {
        "Square" => {
            let mut border = Dictionary::new();
            border.set("W", Object::Integer(1));
            dict.set("BS", Object::Dictionary(border));
        }
        "FreeText" => {
            let size = annotation.font_size.unwrap_or(DEFAULT_FONT_SIZE);
            let [r, g, b] = annotation.stroke.unwrap_or([0.0, 0.0, 0.0]);
            let appearance = format!("/Helv {size} Tf {r} {g} {b} rg");
            dict.set("DA", Object::String(appearance.into_bytes(), StringFormat::Literal));
        }
        _ => {}
    }

    Ok(dict)
}

/// Reads a four-number rectangle, resolving references, and normalizes its corners.
pub(crate) fn read_rect(document: &Document, object: &Object) -> Option<[f32; 4]> {
    let values = resolve(document, object).as_array().ok()?;
    if values.len() != 4 {
        return None;
    }

    let mut rect = [0.0_f32; 4];
    for (slot, value) in rect.iter_mut().zip(values) {
        *slot = resolve(document, value).as_float().ok()?;
    }

    Some(normalize(rect))
}

fn read_color(document: &Document, object: &Object) -> Option<[f32; 3]> {
    let values = resolve(document, object)
        .as_array()
        .ok()?
        .iter()
        .map(|value| resolve(document, value).as_float().ok())
        .collect::<Option<Vec<f32>>>()?;

    match values.as_slice() {
        [gray] => Some([*gray, *gray, *gray]),
        [r, g, b] => Some([*r, *g, *b]),
        [c, m, y, k] => Some([(1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k)]),
        _ => None,
    }
}

/// Font size from a default-appearance string such as `/Helv 12 Tf 0 0 1 rg`.
fn parse_font_size(appearance: &str) -> Option<f32> {
    let tokens: Vec<&str> = appearance.split_whitespace().collect();
    let position = tokens.iter().position(|token| *token == "Tf")?;
    let size = tokens.get(position.checked_sub(1)?)?.parse::<f32>().ok()?;
    (size > 0.0).then_some(size)
}

fn decode_text(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> =
            utf16.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes.iter().map(|byte| pdf_doc_char(*byte)).collect()
}

/// PDFDocEncoding; it matches Latin-1 outside these ranges.
fn pdf_doc_char(byte: u8) -> char {
    const BREVE_TO_TILDE: [char; 8] = [
        '\u{02D8}', '\u{02C7}', '\u{02C6}', '\u{02D9}', '\u{02DD}', '\u{02DB}', '\u{02DA}', '\u{02DC}',
    ];
    const BULLET_TO_EURO: [char; 33] = [
        '\u{2022}', '\u{2020}', '\u{2021}', '\u{2026}', '\u{2014}', '\u{2013}', '\u{0192}', '\u{2044}',
        '\u{2039}', '\u{203A}', '\u{2212}', '\u{2030}', '\u{201E}', '\u{201C}', '\u{201D}', '\u{2018}',
        '\u{2019}', '\u{201A}', '\u{2122}', '\u{FB01}', '\u{FB02}', '\u{0141}', '\u{0152}', '\u{0160}',
        '\u{0178}', '\u{017D}', '\u{0131}', '\u{0142}', '\u{0153}', '\u{0161}', '\u{017E}', '\u{FFFD}',
        '\u{20AC}',
    ];

    match byte {
        0x18..=0x1F => BREVE_TO_TILDE[usize::from(byte - 0x18)],
        0x80..=0xA0 => BULLET_TO_EURO[usize::from(byte - 0x80)],
        0xAD => '\u{FFFD}',
        _ => char::from(byte),
    }
}

fn encode_text(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }

    let mut bytes = vec![0xFE, 0xFF];
    bytes.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    crate::resolve(document, object)
}

fn reals(values: &[f32]) -> Object {
    Object::Array(values.iter().map(|value| Object::Real(*value)).collect())
}

fn normalize([x0, y0, x1, y1]: [f32; 4]) -> [f32; 4] {
    [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)]
}

/// Maps between PDF user space (bottom-left origin) and top-left page space.
/// The mapping is its own inverse.
fn flip([x0, y0, x1, y1]: [f32; 4], media_box: [f32; 4]) -> [f32; 4] {
    let [left, _, _, top] = media_box;
    [x0 - left, top - y1, x1 - left, top - y0]
}
