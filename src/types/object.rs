use indexmap::IndexMap;

/// Dictionary value as handed out by a document provider. Keys keep the
/// order in which the provider enumerated them.
pub type PdfDict = IndexMap<String, PdfObject>;

/// Reference to an indirect object (e.g., "5 0 R")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    pub obj_num: u32,
    pub gen_num: u16,
}

impl ObjRef {
    pub fn new(obj_num: u32, gen_num: u16) -> Self {
        Self { obj_num, gen_num }
    }
}

/// All value kinds a provider can hand to the converter
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    String(Vec<u8>),
    Name(String),
    Array(Vec<PdfObject>),
    Dict(PdfDict),
    /// `data` is already decoded unless `raw` is set, in which case the
    /// provider could not apply the stream's filters.
    Stream {
        dict: PdfDict,
        data: Vec<u8>,
        raw: bool,
    },
    Ref(ObjRef),
}

// Helper methods for convenient access
impl PdfObject {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PdfObject::Int(n) => Some(*n),
            PdfObject::Real(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            PdfObject::Real(f) => Some(*f),
            PdfObject::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PdfObject::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<PdfObject>> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&PdfDict> {
        match self {
            PdfObject::Dict(d) => Some(d),
            PdfObject::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<(&PdfDict, &[u8])> {
        match self {
            PdfObject::Stream { dict, data, .. } => Some((dict, data)),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Option<ObjRef> {
        match self {
            PdfObject::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Lowercase kind name, used as the element name of tree transcriptions.
    pub fn kind(&self) -> &'static str {
        match self {
            PdfObject::Null => "null",
            PdfObject::Bool(_) => "boolean",
            PdfObject::Int(_) => "integer",
            PdfObject::Real(_) => "real",
            PdfObject::String(_) => "string",
            PdfObject::Name(_) => "name",
            PdfObject::Array(_) => "array",
            PdfObject::Dict(_) => "dictionary",
            PdfObject::Stream { .. } => "stream",
            PdfObject::Ref(_) => "reference",
        }
    }
}

/// Four-number rectangle `[x0 y0 x1 y1]` read from a page dictionary.
pub fn rect_from_array(obj: &PdfObject) -> Option<[f64; 4]> {
    let arr = obj.as_array()?;
    if arr.len() < 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, value) in out.iter_mut().zip(arr.iter()) {
        *slot = value.as_real()?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(PdfObject::Int(3).as_real(), Some(3.0));
        assert_eq!(PdfObject::Real(4.0).as_int(), Some(4));
        assert_eq!(PdfObject::Real(4.5).as_int(), None);
        assert_eq!(PdfObject::Name("F1".into()).as_int(), None);
    }

    #[test]
    fn test_stream_exposes_dict() {
        let mut dict = PdfDict::new();
        dict.insert("Length".into(), PdfObject::Int(2));
        let stream = PdfObject::Stream {
            dict,
            data: b"BT".to_vec(),
            raw: false,
        };
        assert_eq!(stream.as_dict().map(|d| d.len()), Some(1));
        assert_eq!(stream.as_stream().map(|(_, d)| d), Some(&b"BT"[..]));
        assert_eq!(stream.kind(), "stream");
    }

    #[test]
    fn test_rect_from_array() {
        let arr = PdfObject::Array(vec![
            PdfObject::Int(0),
            PdfObject::Int(0),
            PdfObject::Real(612.0),
            PdfObject::Int(792),
        ]);
        assert_eq!(rect_from_array(&arr), Some([0.0, 0.0, 612.0, 792.0]));
        assert_eq!(rect_from_array(&PdfObject::Array(vec![])), None);
    }
}
