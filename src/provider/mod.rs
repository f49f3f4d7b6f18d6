//! Access to a parsed document: pages, dictionaries and decoded streams.
//!
//! The converter never reads the container format itself. A provider hands
//! out values by kind and keeps indirect references unresolved so callers
//! can track object identity.

pub mod lopdf_backend;

use std::collections::HashMap;

use crate::error::{ConvertError, Result};
use crate::types::{ObjRef, PdfDict, PdfObject};

pub use lopdf_backend::LopdfDocument;

/// Axis-aligned box, origin plus size.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Build from PDF `[x0 y0 x1 y1]` corners in any order.
    pub fn from_corners(c: [f64; 4]) -> Self {
        let (x0, x1) = (c[0].min(c[2]), c[0].max(c[2]));
        let (y0, y1) = (c[1].min(c[3]), c[1].max(c[3]));
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// One page as seen by the converter.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: Option<ObjRef>,
    pub dict: PdfDict,
    pub media_box: Rect,
    pub crop_box: Option<Rect>,
}

pub trait DocumentProvider {
    /// First bytes of the file, starting with `%PDF-` for valid input.
    fn header(&self) -> &[u8];

    fn is_encrypted(&self) -> bool;

    /// True once the document can be read, either because it opened with
    /// the empty user password or because [`unlock`](Self::unlock) succeeded.
    fn is_unlocked(&self) -> bool;

    fn unlock(&mut self, password: &str) -> bool;

    fn page_count(&self) -> usize;

    /// Page by 1-based number.
    fn page(&self, number: usize) -> Result<Page>;

    fn catalog(&self) -> Result<PdfDict>;

    fn resolve(&self, id: ObjRef) -> Option<PdfObject>;

    /// Follow a reference, or clone a direct value.
    fn deref(&self, obj: &PdfObject) -> Option<PdfObject> {
        match obj {
            PdfObject::Ref(id) => self.resolve(*id),
            other => Some(other.clone()),
        }
    }
}

/// In-memory provider assembled by hand; used by tests and by callers that
/// already hold decoded objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    header: Vec<u8>,
    objects: HashMap<ObjRef, PdfObject>,
    pages: Vec<(ObjRef, Rect, Option<Rect>)>,
    fonts: PdfDict,
    catalog_extra: PdfDict,
    password: Option<String>,
    unlocked: bool,
    next_id: u32,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            header: b"%PDF-1.4\n".to_vec(),
            next_id: 1,
            unlocked: true,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, header: &[u8]) -> Self {
        self.header = header.to_vec();
        self
    }

    /// Require `password` before pages can be read.
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self.unlocked = false;
        self
    }

    /// Store an object and return its id.
    pub fn add_object(&mut self, obj: PdfObject) -> ObjRef {
        let id = ObjRef::new(self.next_id, 0);
        self.next_id += 1;
        self.objects.insert(id, obj);
        id
    }

    /// Register a font under resource name `key`, shared by every page.
    pub fn add_font(&mut self, key: &str, font: PdfDict) -> ObjRef {
        let id = self.add_object(PdfObject::Dict(font));
        self.fonts.insert(key.to_string(), PdfObject::Ref(id));
        id
    }

    /// Add an entry to the catalog beyond `Type` and `Pages`.
    pub fn set_catalog_entry(&mut self, key: &str, value: PdfObject) {
        self.catalog_extra.insert(key.to_string(), value);
    }

    /// Append a page whose content is `content`; returns its 1-based number.
    pub fn add_page(&mut self, width: f64, height: f64, content: &[u8]) -> usize {
        self.add_page_with(Rect::new(0.0, 0.0, width, height), None, content, PdfDict::new())
    }

    pub fn add_page_with(&mut self, media_box: Rect, crop_box: Option<Rect>, content: &[u8], xobjects: PdfDict) -> usize {
        let stream = self.add_object(PdfObject::Stream {
            dict: PdfDict::new(),
            data: content.to_vec(),
            raw: false,
        });
        let mut resources = PdfDict::new();
        if !xobjects.is_empty() {
            resources.insert("XObject".into(), PdfObject::Dict(xobjects));
        }
        let mut dict = PdfDict::new();
        dict.insert("Type".into(), PdfObject::Name("Page".into()));
        dict.insert("Resources".into(), PdfObject::Dict(resources));
        dict.insert("Contents".into(), PdfObject::Ref(stream));
        let id = self.add_object(PdfObject::Dict(dict));
        self.pages.push((id, media_box, crop_box));
        self.pages.len()
    }

    fn resources_with_fonts(&self, page: &PdfDict) -> PdfDict {
        let mut dict = page.clone();
        if !self.fonts.is_empty() {
            if let Some(PdfObject::Dict(res)) = dict.get_mut("Resources") {
                res.insert("Font".into(), PdfObject::Dict(self.fonts.clone()));
            }
        }
        dict
    }

    fn check_unlocked(&self) -> Result<()> {
        if self.unlocked {
            Ok(())
        } else {
            Err(ConvertError::DecryptRequired)
        }
    }
}

impl DocumentProvider for MemoryDocument {
    fn header(&self) -> &[u8] {
        &self.header
    }

    fn is_encrypted(&self) -> bool {
        self.password.is_some()
    }

    fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    fn unlock(&mut self, password: &str) -> bool {
        if self.password.as_deref() == Some(password) {
            self.unlocked = true;
        }
        self.unlocked
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, number: usize) -> Result<Page> {
        self.check_unlocked()?;
        let &(id, media_box, crop_box) = number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .ok_or(ConvertError::BadPage(number))?;
        let dict = match self.objects.get(&id) {
            Some(PdfObject::Dict(d)) => self.resources_with_fonts(d),
            _ => return Err(ConvertError::BadPage(number)),
        };
        Ok(Page {
            id: Some(id),
            dict,
            media_box,
            crop_box,
        })
    }

    fn catalog(&self) -> Result<PdfDict> {
        self.check_unlocked()?;
        let kids = self
            .pages
            .iter()
            .filter_map(|(id, _, _)| match self.objects.get(id) {
                Some(PdfObject::Dict(d)) => Some(PdfObject::Dict(self.resources_with_fonts(d))),
                _ => None,
            })
            .collect::<Vec<_>>();
        let mut pages = PdfDict::new();
        pages.insert("Type".into(), PdfObject::Name("Pages".into()));
        pages.insert("Count".into(), PdfObject::Int(kids.len() as i64));
        pages.insert("Kids".into(), PdfObject::Array(kids));

        let mut catalog = PdfDict::new();
        catalog.insert("Type".into(), PdfObject::Name("Catalog".into()));
        catalog.insert("Pages".into(), PdfObject::Dict(pages));
        for (k, v) in &self.catalog_extra {
            catalog.insert(k.clone(), v.clone());
        }
        Ok(catalog)
    }

    fn resolve(&self, id: ObjRef) -> Option<PdfObject> {
        if !self.unlocked {
            return None;
        }
        self.objects.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_from_corners_normalizes() {
        let r = Rect::from_corners([612.0, 792.0, 0.0, 0.0]);
        assert_eq!(r, Rect::new(0.0, 0.0, 612.0, 792.0));
    }

    #[test]
    fn test_memory_document_pages() {
        let mut doc = MemoryDocument::new();
        doc.add_page(612.0, 792.0, b"BT ET");
        doc.add_page(300.0, 400.0, b"");
        assert_eq!(doc.page_count(), 2);
        let page = doc.page(2).unwrap();
        assert_eq!(page.media_box.width, 300.0);
        assert!(matches!(doc.page(3), Err(ConvertError::BadPage(3))));
        assert!(matches!(doc.page(0), Err(ConvertError::BadPage(0))));

        let contents = page.dict.get("Contents").and_then(|c| doc.deref(c)).unwrap();
        assert!(contents.as_stream().is_some());
    }

    #[test]
    fn test_memory_document_fonts_reach_pages() {
        let mut doc = MemoryDocument::new();
        let mut font = PdfDict::new();
        font.insert("Type".into(), PdfObject::Name("Font".into()));
        doc.add_font("F1", font);
        doc.add_page(612.0, 792.0, b"");
        let page = doc.page(1).unwrap();
        let fonts = page.dict["Resources"].as_dict().and_then(|r| r.get("Font")).and_then(|f| f.as_dict());
        assert!(fonts.is_some_and(|f| f.contains_key("F1")));
    }

    #[test]
    fn test_memory_document_password() {
        let mut doc = MemoryDocument::new().with_password("secret");
        doc.add_page(612.0, 792.0, b"");
        assert!(doc.is_encrypted() && !doc.is_unlocked());
        assert!(matches!(doc.page(1), Err(ConvertError::DecryptRequired)));
        assert!(!doc.unlock("wrong"));
        assert!(doc.unlock("secret"));
        assert!(doc.page(1).is_ok());
    }
}
