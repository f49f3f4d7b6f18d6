//! Provider backed by the `lopdf` crate.

use lopdf::{Dictionary, Object, ObjectId};
use tracing::{debug, instrument, warn};

use super::{DocumentProvider, Page, Rect};
use crate::error::{ConvertError, Result};
use crate::session::check_header;
use crate::types::{ObjRef, PdfDict, PdfObject};

const HEADER_LEN: usize = 32;

pub struct LopdfDocument {
    inner: lopdf::Document,
    header: Vec<u8>,
    page_ids: Vec<ObjectId>,
    encrypted: bool,
    unlocked: bool,
}

impl LopdfDocument {
    /// Parse a document held in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        check_header(data)?;
        let mut inner = lopdf::Document::load_mem(data)
            .map_err(|e| ConvertError::Provider(format!("failed to parse PDF: {e}")))?;

        let encrypted = inner.is_encrypted();
        let unlocked = !encrypted || inner.decrypt("").is_ok();
        // get_pages returns BTreeMap<u32, ObjectId> with 1-based keys
        let page_ids = inner.get_pages().values().copied().collect::<Vec<_>>();
        debug!(pages = page_ids.len(), encrypted, "PDF loaded");

        Ok(Self {
            inner,
            header: data[..data.len().min(HEADER_LEN)].to_vec(),
            page_ids,
            encrypted,
            unlocked,
        })
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    fn page_dict(&self, id: ObjectId) -> Result<&Dictionary> {
        self.inner
            .get_object(id)
            .and_then(|o| o.as_dict())
            .map_err(|e| ConvertError::Provider(format!("failed to get page dictionary: {e}")))
    }

    /// Look up `key` on the page or its `/Parent` chain.
    fn inherited(&self, page: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = page;
        for _ in 0..32 {
            let dict = self.page_dict(current).ok()?;
            if let Ok(value) = dict.get(key) {
                return self.follow(value);
            }
            current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok()?;
        }
        None
    }

    fn follow<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => self.inner.get_object(*id).ok(),
            other => Some(other),
        }
    }

    fn rect(&self, obj: Option<&Object>) -> Option<Rect> {
        let arr = obj?.as_array().ok()?;
        if arr.len() < 4 {
            return None;
        }
        let mut corners = [0.0; 4];
        for (slot, value) in corners.iter_mut().zip(arr) {
            *slot = object_to_f64(self.follow(value)?)?;
        }
        Some(Rect::from_corners(corners))
    }
}

fn object_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

fn convert_dict(dict: &Dictionary) -> PdfDict {
    dict.iter()
        .map(|(k, v)| (String::from_utf8_lossy(k).into_owned(), convert(v)))
        .collect()
}

/// Shallow conversion: references stay references.
fn convert(obj: &Object) -> PdfObject {
    match obj {
        Object::Null => PdfObject::Null,
        Object::Boolean(b) => PdfObject::Bool(*b),
        Object::Integer(i) => PdfObject::Int(*i),
        Object::Real(f) => PdfObject::Real(*f as f64),
        Object::Name(n) => PdfObject::Name(String::from_utf8_lossy(n).into_owned()),
        Object::String(bytes, _) => PdfObject::String(bytes.clone()),
        Object::Array(items) => PdfObject::Array(items.iter().map(convert).collect()),
        Object::Dictionary(dict) => PdfObject::Dict(convert_dict(dict)),
        Object::Stream(stream) => {
            let filtered = stream.dict.get(b"Filter").is_ok();
            let (data, raw) = if filtered {
                match stream.decompressed_content() {
                    Ok(data) => (data, false),
                    Err(e) => {
                        warn!(error = %e, "stream filter not decoded");
                        (stream.content.clone(), true)
                    }
                }
            } else {
                (stream.content.clone(), false)
            };
            PdfObject::Stream {
                dict: convert_dict(&stream.dict),
                data,
                raw,
            }
        }
        Object::Reference((num, generation)) => PdfObject::Ref(ObjRef::new(*num, *generation)),
    }
}

impl DocumentProvider for LopdfDocument {
    fn header(&self) -> &[u8] {
        &self.header
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    fn unlock(&mut self, password: &str) -> bool {
        if !self.unlocked {
            self.unlocked = self.inner.decrypt(password).is_ok();
        }
        self.unlocked
    }

    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page(&self, number: usize) -> Result<Page> {
        let id = *number
            .checked_sub(1)
            .and_then(|i| self.page_ids.get(i))
            .ok_or(ConvertError::BadPage(number))?;
        let mut dict = convert_dict(self.page_dict(id)?);

        // inherited attributes are copied down so callers see one dictionary
        for key in ["Resources", "MediaBox", "CropBox"] {
            if !dict.contains_key(key) {
                if let Some(value) = self.inherited(id, key.as_bytes()) {
                    dict.insert(key.to_string(), convert(value));
                }
            }
        }

        let media_box = self
            .rect(self.inherited(id, b"MediaBox"))
            .unwrap_or(Rect::new(0.0, 0.0, 612.0, 792.0));
        let crop_box = self.rect(self.inherited(id, b"CropBox"));

        Ok(Page {
            id: Some(ObjRef::new(id.0, id.1)),
            dict,
            media_box,
            crop_box,
        })
    }

    fn catalog(&self) -> Result<PdfDict> {
        self.inner
            .catalog()
            .map(convert_dict)
            .map_err(|e| ConvertError::Provider(format!("failed to read catalog: {e}")))
    }

    fn resolve(&self, id: ObjRef) -> Option<PdfObject> {
        self.inner.get_object((id.obj_num, id.gen_num)).ok().map(convert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    fn build_pdf(content: &[u8]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_rejects_non_pdf() {
        assert!(matches!(LopdfDocument::from_bytes(b"hello"), Err(ConvertError::Format)));
    }

    #[test]
    fn test_page_inherits_media_box_and_resources() {
        let data = build_pdf(b"BT /F1 12 Tf 72 700 Td (Hi) Tj ET");
        let doc = LopdfDocument::from_bytes(&data).unwrap();
        assert_eq!(doc.page_count(), 1);
        assert!(doc.header().starts_with(b"%PDF-1.5"));
        assert!(!doc.is_encrypted());

        let page = doc.page(1).unwrap();
        assert_eq!(page.media_box, Rect::new(0.0, 0.0, 612.0, 792.0));
        assert!(page.crop_box.is_none());
        assert!(page.dict.contains_key("Resources"));

        let contents = page.dict.get("Contents").and_then(|c| doc.deref(c)).unwrap();
        let (_, data) = contents.as_stream().unwrap();
        assert_eq!(data, b"BT /F1 12 Tf 72 700 Td (Hi) Tj ET");
    }

    #[test]
    fn test_bad_page_number() {
        let data = build_pdf(b"");
        let doc = LopdfDocument::from_bytes(&data).unwrap();
        assert!(matches!(doc.page(2), Err(ConvertError::BadPage(2))));
    }
}
