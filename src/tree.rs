//! Page dictionaries transcribed as an XML tree or an Apple property list.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, instrument};

use crate::error::{ConvertError, Result};
use crate::provider::DocumentProvider;
use crate::types::{ObjRef, PdfDict, PdfObject};

const PLIST_DOCTYPE: &str =
    r#"<!DOCTYPE plist PUBLIC "-//Apple Computer//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeFlavor {
    Xml,
    PropertyList,
}

/// Keys whose streams are worth reading as text.
fn is_text_stream(key: &str) -> bool {
    key == "Contents" || key == "ToUnicode"
}

/// PDF strings carry bytes; show them as Latin-1 characters.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Where a dictionary came from, for object numbering.
enum Origin {
    Inline,
    Indirect(ObjRef),
}

pub struct TreeWriter<'a> {
    provider: &'a dyn DocumentProvider,
    flavor: TreeFlavor,
    objects: HashMap<ObjRef, usize>,
    next_object: usize,
    out: String,
    depth: usize,
}

impl<'a> TreeWriter<'a> {
    pub fn new(provider: &'a dyn DocumentProvider, flavor: TreeFlavor) -> Self {
        Self {
            provider,
            flavor,
            objects: HashMap::new(),
            next_object: 0,
            out: String::new(),
            depth: 0,
        }
    }

    /// Transcribe pages `first..=last`.
    #[instrument(skip_all, fields(flavor = ?self.flavor, first = first, last = last))]
    pub fn transcribe(mut self, first: usize, last: usize, abort: &AtomicBool) -> Result<Vec<u8>> {
        match self.flavor {
            TreeFlavor::Xml => {
                self.out.push_str("<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n");
                self.open("dictionary", Some("Document"), &[]);
            }
            TreeFlavor::PropertyList => {
                self.out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
                self.out.push_str(PLIST_DOCTYPE);
                self.out.push('\n');
                self.open("plist", None, &[("version", "1.0".into())]);
                self.open("dict", None, &[]);
            }
        }

        for number in first..=last {
            if abort.load(Ordering::Relaxed) {
                return Err(ConvertError::UserAbort);
            }
            let page = self.provider.page(number)?;
            if let Some(id) = page.id {
                let _ = self.number(id);
            }
            match self.flavor {
                TreeFlavor::Xml => {
                    self.open("dictionary", Some("Page"), &[]);
                    self.xml_entries(&page.dict)?;
                    self.close("dictionary");
                }
                TreeFlavor::PropertyList => {
                    self.leaf("key", None, &format!("Page {number}"));
                    self.open("dict", None, &[]);
                    self.plist_entries(&page.dict)?;
                    self.close("dict");
                }
            }
        }

        match self.flavor {
            TreeFlavor::Xml => self.close("dictionary"),
            TreeFlavor::PropertyList => {
                self.close("dict");
                self.close("plist");
            }
        }
        debug!(objects = self.next_object, bytes = self.out.len(), "tree written");
        Ok(self.encode())
    }

    /// Number an object on first sight; `Err` carries the earlier number.
    fn number(&mut self, id: ObjRef) -> std::result::Result<usize, usize> {
        if let Some(&n) = self.objects.get(&id) {
            return Err(n);
        }
        let n = self.fresh();
        self.objects.insert(id, n);
        Ok(n)
    }

    fn fresh(&mut self) -> usize {
        self.next_object += 1;
        self.next_object
    }

    fn encode(self) -> Vec<u8> {
        match self.flavor {
            TreeFlavor::PropertyList => self.out.into_bytes(),
            // every char came from a byte or from ASCII markup
            TreeFlavor::Xml => self.out.chars().map(|c| u8::try_from(c).unwrap_or(b'?')).collect(),
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push('\t');
        }
    }

    fn start_tag(&mut self, name: &str, key: Option<&str>, attrs: &[(&str, String)]) {
        self.indent();
        self.out.push('<');
        self.out.push_str(name);
        if let Some(key) = key {
            self.out.push_str(" key=\"");
            self.out.push_str(&html_escape::encode_double_quoted_attribute(key));
            self.out.push('"');
        }
        for (attr, value) in attrs {
            self.out.push(' ');
            self.out.push_str(attr);
            self.out.push_str("=\"");
            self.out.push_str(&html_escape::encode_double_quoted_attribute(value));
            self.out.push('"');
        }
    }

    fn open(&mut self, name: &str, key: Option<&str>, attrs: &[(&str, String)]) {
        self.start_tag(name, key, attrs);
        self.out.push_str(">\n");
        self.depth += 1;
    }

    fn close(&mut self, name: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push_str(">\n");
    }

    fn empty(&mut self, name: &str, key: Option<&str>, attrs: &[(&str, String)]) {
        self.start_tag(name, key, attrs);
        self.out.push_str("/>\n");
    }

    fn leaf(&mut self, name: &str, key: Option<&str>, text: &str) {
        self.start_tag(name, key, &[]);
        self.out.push('>');
        self.out.push_str(&html_escape::encode_text(text));
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push_str(">\n");
    }

    fn cdata(&mut self, name: &str, key: Option<&str>, data: &[u8]) {
        self.start_tag(name, key, &[]);
        self.out.push_str("><![CDATA[");
        self.out.push_str(&latin1(data).replace("]]>", "]]]]><![CDATA[>"));
        self.out.push_str("]]></");
        self.out.push_str(name);
        self.out.push_str(">\n");
    }

    fn resolve(&self, value: &PdfObject) -> Option<(PdfObject, Origin)> {
        match value {
            PdfObject::Ref(id) => self.provider.resolve(*id).map(|v| (v, Origin::Indirect(*id))),
            other => Some((other.clone(), Origin::Inline)),
        }
    }

    fn xml_entries(&mut self, dict: &PdfDict) -> Result<()> {
        for (key, value) in dict {
            self.xml_value(key, true, value)?;
        }
        Ok(())
    }

    /// `keyed` is false for array elements, which inherit the array's key
    /// for stream and `Parent` handling but do not show it.
    fn xml_value(&mut self, key: &str, keyed: bool, value: &PdfObject) -> Result<()> {
        let shown = keyed.then_some(key);
        if let PdfObject::Ref(id) = value {
            if let Some(&n) = self.objects.get(id) {
                if key != "Parent" {
                    self.empty("dictionary", shown, &[("reference", n.to_string())]);
                }
                return Ok(());
            }
        }
        let Some((value, origin)) = self.resolve(value) else {
            self.empty("null", shown, &[]);
            return Ok(());
        };

        let node = value.kind();
        match &value {
            PdfObject::Null => self.empty(node, shown, &[]),
            PdfObject::Bool(b) => self.leaf(node, shown, if *b { "true" } else { "false" }),
            PdfObject::Int(i) => self.leaf(node, shown, &i.to_string()),
            PdfObject::Real(r) => self.leaf(node, shown, &format!("{r:.6}")),
            PdfObject::Name(n) => self.leaf(node, shown, n),
            PdfObject::String(s) => self.leaf(node, shown, &latin1(s)),
            PdfObject::Array(items) => {
                self.open(node, shown, &[]);
                for item in items {
                    self.xml_value(key, false, item)?;
                }
                self.close(node);
            }
            PdfObject::Dict(dict) => {
                if key == "Parent" {
                    return Ok(());
                }
                let n = match origin {
                    Origin::Indirect(id) => self.number(id),
                    Origin::Inline => Ok(self.fresh()),
                };
                match n {
                    Ok(n) => {
                        self.open(node, shown, &[("object", n.to_string())]);
                        self.xml_entries(dict)?;
                        self.close(node);
                    }
                    Err(n) => self.empty(node, shown, &[("reference", n.to_string())]),
                }
            }
            PdfObject::Stream { data, .. } => {
                if is_text_stream(key) {
                    self.cdata(node, shown, data);
                } else {
                    self.leaf(node, shown, "[STRIPPED]");
                }
            }
            PdfObject::Ref(_) => self.empty("null", shown, &[]),
        }
        Ok(())
    }

    fn plist_entries(&mut self, dict: &PdfDict) -> Result<()> {
        for (key, value) in dict {
            self.plist_value(key, true, value)?;
        }
        Ok(())
    }

    fn plist_value(&mut self, key: &str, keyed: bool, value: &PdfObject) -> Result<()> {
        if key == "Parent" && keyed {
            let is_dict = matches!(value, PdfObject::Dict(_) | PdfObject::Ref(_));
            if is_dict {
                return Ok(());
            }
        }
        let Some((value, origin)) = (match value {
            PdfObject::Ref(id) if self.objects.contains_key(id) => Some((PdfObject::Dict(PdfDict::new()), Origin::Indirect(*id))),
            other => self.resolve(other),
        }) else {
            return Ok(());
        };
        if matches!(value, PdfObject::Null | PdfObject::Ref(_)) {
            return Ok(());
        }
        if keyed {
            self.leaf("key", None, key);
        }

        match &value {
            PdfObject::Bool(b) => self.empty(if *b { "true" } else { "false" }, None, &[]),
            PdfObject::Int(i) => self.leaf("integer", None, &i.to_string()),
            PdfObject::Real(r) => self.leaf("real", None, &format!("{r:.6}")),
            PdfObject::Name(n) => self.leaf("string", None, n),
            PdfObject::String(s) => self.leaf("string", None, &latin1(s)),
            PdfObject::Array(items) => {
                self.open("array", None, &[]);
                for item in items {
                    self.plist_value(key, false, item)?;
                }
                self.close("array");
            }
            PdfObject::Dict(dict) => {
                let n = match origin {
                    Origin::Indirect(id) => self.number(id),
                    Origin::Inline => Ok(self.fresh()),
                };
                self.open("dict", None, &[]);
                match n {
                    Ok(n) => {
                        self.leaf("key", None, "_Object");
                        self.leaf("integer", None, &n.to_string());
                        self.plist_entries(dict)?;
                    }
                    Err(n) => {
                        self.leaf("key", None, "_Reference");
                        self.leaf("integer", None, &n.to_string());
                    }
                }
                self.close("dict");
            }
            PdfObject::Stream { data, .. } => {
                let encoded = STANDARD.encode(data);
                self.leaf("data", None, &encoded);
            }
            PdfObject::Null | PdfObject::Ref(_) => {}
        }
        Ok(())
    }
}
