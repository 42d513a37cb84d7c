//! Page layout for the builtin engine.
//!
//! Lays [`Block`]s out top to bottom with greedy word wrapping, starting a
//! new page whenever the cursor would cross the bottom margin. Widths are
//! estimated from average glyph advances rather than measured.
//!
//! Without a configured font, text is set in the PDF base-14 fonts and
//! folded to ASCII; every character that has no stand-in is replaced with
//! `?` and counted in [`LayoutStats`].

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};

use mdpress_markdown::Block;
use mdpress_shared::PageSize;

/// Points to millimetres.
const PT_TO_MM: f32 = 0.352_778;

/// Average advance of a proportional glyph, as a fraction of the font size.
const PROPORTIONAL_ADVANCE: f32 = 0.5;

/// Courier is monospaced at 600/1000 em.
const MONOSPACE_ADVANCE: f32 = 0.6;

const LINE_SPACING: f32 = 1.4;

/// Indent per list nesting level, in millimetres.
const LIST_INDENT_MM: f32 = 6.0;

/// Geometry, type size and font for one document.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    pub page_size: PageSize,
    pub font_size: f32,
    pub margin_mm: f32,
    /// TrueType font used for every face. `None` selects the base-14 fonts.
    pub font: Option<PathBuf>,
}

/// What laying out one document produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutStats {
    pub pages: usize,
    /// Characters the base-14 fonts cannot show, written as `?`.
    pub replaced_chars: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("pdf error: {0}")]
    Pdf(#[from] printpdf::Error),

    #[error("cannot open font {path:?}: {source}")]
    Font {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot create {path:?}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Clone, Copy)]
enum Face {
    Regular,
    Bold,
    Italic,
    Mono,
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
    mono: IndirectFontRef,
}

impl Fonts {
    fn builtin(doc: &PdfDocumentReference) -> Result<Self, LayoutError> {
        Ok(Self {
            regular: doc.add_builtin_font(BuiltinFont::Helvetica)?,
            bold: doc.add_builtin_font(BuiltinFont::HelveticaBold)?,
            italic: doc.add_builtin_font(BuiltinFont::HelveticaOblique)?,
            mono: doc.add_builtin_font(BuiltinFont::Courier)?,
        })
    }

    fn external(doc: &PdfDocumentReference, path: &Path) -> Result<Self, LayoutError> {
        let file = File::open(path).map_err(|source| LayoutError::Font {
            path: path.to_path_buf(),
            source,
        })?;
        let font = doc.add_external_font(BufReader::new(file))?;
        Ok(Self {
            regular: font.clone(),
            bold: font.clone(),
            italic: font.clone(),
            mono: font,
        })
    }

    fn get(&self, face: Face) -> &IndirectFontRef {
        match face {
            Face::Regular => &self.regular,
            Face::Bold => &self.bold,
            Face::Italic => &self.italic,
            Face::Mono => &self.mono,
        }
    }
}

/// Cursor over the pages of one document.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    fonts: Fonts,
    font_size: f32,
    margin_mm: f32,
    width: f32,
    height: f32,
    /// Baseline of the next line, millimetres from the page bottom.
    y: f32,
    /// Text is folded to ASCII for the base-14 fonts.
    fold: bool,
    stats: LayoutStats,
}

impl PageWriter {
    fn new(title: &str, opts: &LayoutOptions) -> Result<Self, LayoutError> {
        let (width, height) = opts.page_size.dimensions_mm();
        let (metadata_title, _) = to_ascii(title);
        let (doc, page, layer) = PdfDocument::new(metadata_title, Mm(width), Mm(height), "Layer 1");
        let fonts = match &opts.font {
            Some(path) => Fonts::external(&doc, path)?,
            None => Fonts::builtin(&doc)?,
        };
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            layer,
            fonts,
            font_size: opts.font_size,
            margin_mm: opts.margin_mm,
            width,
            height,
            y: height - opts.margin_mm,
            fold: opts.font.is_none(),
            stats: LayoutStats {
                pages: 1,
                replaced_chars: 0,
            },
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(self.width), Mm(self.height), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = self.height - self.margin_mm;
        self.stats.pages += 1;
    }

    fn usable_width(&self, indent: f32) -> f32 {
        self.width - 2.0 * self.margin_mm - indent
    }

    /// Text as it will be set in the current fonts.
    fn prepare(&mut self, text: &str) -> String {
        if !self.fold {
            return text.replace('\t', " ");
        }
        let (folded, replaced) = to_ascii(text);
        self.stats.replaced_chars += replaced;
        folded
    }

    fn space(&mut self, size: f32) {
        self.y -= size * PT_TO_MM * 0.6;
    }

    fn line(&mut self, text: &str, face: Face, size: f32, indent: f32) {
        let advance = size * LINE_SPACING * PT_TO_MM;
        if self.y - advance < self.margin_mm {
            self.new_page();
        }
        self.y -= advance;
        self.layer.use_text(
            text,
            size,
            Mm(self.margin_mm + indent),
            Mm(self.y),
            self.fonts.get(face),
        );
    }

    fn wrapped(&mut self, text: &str, face: Face, size: f32, indent: f32) {
        let glyph = match face {
            Face::Mono => MONOSPACE_ADVANCE,
            _ => PROPORTIONAL_ADVANCE,
        };
        let max_units = (self.usable_width(indent) / (size * glyph * PT_TO_MM)).max(1.0) as usize;
        for line in wrap(text, max_units) {
            self.line(&line, face, size, indent);
        }
    }

    fn block(&mut self, block: &Block) {
        let base = self.font_size;
        match block {
            Block::Heading { level, text } => {
                let size = base * heading_scale(*level);
                let text = self.prepare(text);
                self.space(size);
                self.wrapped(&text, Face::Bold, size, 0.0);
                self.space(base * 0.5);
            }
            Block::Paragraph(text) => {
                let text = self.prepare(text);
                self.wrapped(&text, Face::Regular, base, 0.0);
                self.space(base);
            }
            Block::ListItem {
                marker,
                depth,
                text,
            } => {
                let indent = LIST_INDENT_MM * (*depth as f32 + 1.0);
                let text = self.prepare(&format!("{marker} {text}"));
                self.wrapped(&text, Face::Regular, base, indent);
            }
            Block::Code(code) => {
                let size = base * 0.9;
                for line in code.lines() {
                    let line = self.prepare(line);
                    if line.is_empty() {
                        self.line(" ", Face::Mono, size, LIST_INDENT_MM);
                    } else {
                        self.wrapped(&line, Face::Mono, size, LIST_INDENT_MM);
                    }
                }
                self.space(base);
            }
            Block::Quote(text) => {
                let text = self.prepare(text);
                self.wrapped(&text, Face::Italic, base, LIST_INDENT_MM);
                self.space(base);
            }
            Block::Rule => {
                self.line("* * *", Face::Regular, base, self.usable_width(0.0) / 2.0 - 5.0);
                self.space(base);
            }
        }
    }

    fn save(self, dest: &Path) -> Result<LayoutStats, LayoutError> {
        let file = File::create(dest).map_err(|source| LayoutError::Create {
            path: dest.to_path_buf(),
            source,
        })?;
        self.doc.save(&mut BufWriter::new(file))?;
        Ok(self.stats)
    }
}

/// Lay out `blocks` and write the PDF to `dest`.
pub fn write_pdf(
    title: &str,
    blocks: &[Block],
    opts: &LayoutOptions,
    dest: &Path,
) -> Result<LayoutStats, LayoutError> {
    let mut writer = PageWriter::new(title, opts)?;
    for block in blocks {
        writer.block(block);
    }
    writer.save(dest)
}

fn heading_scale(level: u8) -> f32 {
    match level {
        1 => 2.0,
        2 => 1.6,
        3 => 1.35,
        4 => 1.2,
        5 => 1.1,
        _ => 1.0,
    }
}

/// Width of `c` in average-glyph units. East Asian wide characters take
/// two.
fn char_units(c: char) -> usize {
    match c {
        '\u{1100}'..='\u{115F}'
        | '\u{2E80}'..='\u{A4CF}'
        | '\u{AC00}'..='\u{D7A3}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FE30}'..='\u{FE4F}'
        | '\u{FF00}'..='\u{FF60}'
        | '\u{FFE0}'..='\u{FFE6}' => 2,
        _ => 1,
    }
}

/// Greedy word wrap to at most `max_units` per line. Words longer than a
/// line are split.
pub(crate) fn wrap(text: &str, max_units: usize) -> Vec<String> {
    let max_units = max_units.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_units = 0;

    for word in text.split_whitespace() {
        let mut chunk = String::new();
        let mut chunk_units = 0;
        let mut chunks = Vec::new();
        for c in word.chars() {
            let w = char_units(c);
            if chunk_units + w > max_units && !chunk.is_empty() {
                chunks.push((std::mem::take(&mut chunk), chunk_units));
                chunk_units = 0;
            }
            chunk.push(c);
            chunk_units += w;
        }
        chunks.push((chunk, chunk_units));

        let last = chunks.len() - 1;
        for (i, (piece, units)) in chunks.into_iter().enumerate() {
            if i < last {
                // Overlong word: full-width pieces stand on their own lines.
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    current_units = 0;
                }
                lines.push(piece);
                continue;
            }
            let needed = if current.is_empty() {
                units
            } else {
                current_units + 1 + units
            };
            if needed > max_units && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_units = 0;
            }
            if !current.is_empty() {
                current.push(' ');
                current_units += 1;
            }
            current.push_str(&piece);
            current_units += units;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Fold text into the ASCII range the base-14 fonts can always show.
/// Returns the folded text and how many characters became `?`.
pub(crate) fn to_ascii(text: &str) -> (String, usize) {
    let mut replaced = 0;
    let folded = text
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            '\u{2022}' => '-',
            '\u{00A0}' | '\t' => ' ',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => {
                replaced += 1;
                '?'
            }
        })
        .collect();
    (folded, replaced)
}
