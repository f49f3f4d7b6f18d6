//! Adobe glyph names used by `/Differences` arrays.

/// Names for 0x20..=0x7E in order.
const ASCII_NAMES: [&str; 95] = [
    "space", "exclam", "quotedbl", "numbersign", "dollar", "percent", "ampersand", "quotesingle",
    "parenleft", "parenright", "asterisk", "plus", "comma", "hyphen", "period", "slash",
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
    "colon", "semicolon", "less", "equal", "greater", "question", "at",
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M",
    "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z",
    "bracketleft", "backslash", "bracketright", "asciicircum", "underscore", "grave",
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m",
    "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z",
    "braceleft", "bar", "braceright", "asciitilde",
];

/// Names for the Latin-1 supplement 0xA0..=0xFF in order. Empty slots
/// duplicate a name already listed above.
const LATIN1_NAMES: [&str; 96] = [
    "", "exclamdown", "cent", "sterling", "currency", "yen", "brokenbar", "section",
    "dieresis", "copyright", "ordfeminine", "guillemotleft", "logicalnot", "", "registered", "macron",
    "degree", "plusminus", "twosuperior", "threesuperior", "acute", "mu", "paragraph", "periodcentered",
    "cedilla", "onesuperior", "ordmasculine", "guillemotright", "onequarter", "onehalf", "threequarters", "questiondown",
    "Agrave", "Aacute", "Acircumflex", "Atilde", "Adieresis", "Aring", "AE", "Ccedilla",
    "Egrave", "Eacute", "Ecircumflex", "Edieresis", "Igrave", "Iacute", "Icircumflex", "Idieresis",
    "Eth", "Ntilde", "Ograve", "Oacute", "Ocircumflex", "Otilde", "Odieresis", "multiply",
    "Oslash", "Ugrave", "Uacute", "Ucircumflex", "Udieresis", "Yacute", "Thorn", "germandbls",
    "agrave", "aacute", "acircumflex", "atilde", "adieresis", "aring", "ae", "ccedilla",
    "egrave", "eacute", "ecircumflex", "edieresis", "igrave", "iacute", "icircumflex", "idieresis",
    "eth", "ntilde", "ograve", "oacute", "ocircumflex", "otilde", "odieresis", "divide",
    "oslash", "ugrave", "uacute", "ucircumflex", "udieresis", "yacute", "thorn", "ydieresis",
];

const GREEK_NAMES: [(&str, char); 48] = [
    ("Alpha", 'Α'), ("Beta", 'Β'), ("Gamma", 'Γ'), ("Delta", 'Δ'), ("Epsilon", 'Ε'), ("Zeta", 'Ζ'),
    ("Eta", 'Η'), ("Theta", 'Θ'), ("Iota", 'Ι'), ("Kappa", 'Κ'), ("Lambda", 'Λ'), ("Mu", 'Μ'),
    ("Nu", 'Ν'), ("Xi", 'Ξ'), ("Omicron", 'Ο'), ("Pi", 'Π'), ("Rho", 'Ρ'), ("Sigma", 'Σ'),
    ("Tau", 'Τ'), ("Upsilon", 'Υ'), ("Phi", 'Φ'), ("Chi", 'Χ'), ("Psi", 'Ψ'), ("Omega", 'Ω'),
    ("alpha", 'α'), ("beta", 'β'), ("gamma", 'γ'), ("delta", 'δ'), ("epsilon", 'ε'), ("zeta", 'ζ'),
    ("eta", 'η'), ("theta", 'θ'), ("iota", 'ι'), ("kappa", 'κ'), ("lambda", 'λ'), ("nu", 'ν'),
    ("xi", 'ξ'), ("omicron", 'ο'), ("pi", 'π'), ("rho", 'ρ'), ("sigma", 'σ'), ("sigma1", 'ς'),
    ("tau", 'τ'), ("upsilon", 'υ'), ("phi", 'φ'), ("chi", 'χ'), ("psi", 'ψ'), ("omega", 'ω'),
];

fn named(name: &str) -> Option<char> {
    let ch = match name {
        "quoteleft" => '\u{2018}',
        "quoteright" => '\u{2019}',
        "quotedblleft" => '\u{201C}',
        "quotedblright" => '\u{201D}',
        "quotesinglbase" => '\u{201A}',
        "quotedblbase" => '\u{201E}',
        "guilsinglleft" => '‹',
        "guilsinglright" => '›',
        "endash" => '–',
        "emdash" => '—',
        "minus" => '−',
        "bullet" => '•',
        "ellipsis" => '…',
        "dagger" => '†',
        "daggerdbl" => '‡',
        "perthousand" => '‰',
        "trademark" => '™',
        "florin" => 'ƒ',
        "circumflex" => 'ˆ',
        "tilde" => '˜',
        "breve" => '˘',
        "dotaccent" => '˙',
        "ring" => '˚',
        "hungarumlaut" => '˝',
        "ogonek" => '˛',
        "caron" => 'ˇ',
        "fraction" => '⁄',
        "dotlessi" => 'ı',
        "OE" => 'Œ',
        "oe" => 'œ',
        "Scaron" => 'Š',
        "scaron" => 'š',
        "Zcaron" => 'Ž',
        "zcaron" => 'ž',
        "Ydieresis" => 'Ÿ',
        "Euro" => '€',
        "notequal" => '≠',
        "infinity" => '∞',
        "lessequal" => '≤',
        "greaterequal" => '≥',
        "partialdiff" => '∂',
        "summation" => '∑',
        "product" => '∏',
        "integral" => '∫',
        "radical" => '√',
        "approxequal" => '≈',
        "lozenge" => '◊',
        "apple" => '\u{F8FF}',
        "nbspace" => '\u{A0}',
        "sfthyphen" => '\u{AD}',
        "fi" => 'ﬁ',
        "fl" => 'ﬂ',
        _ => return None,
    };
    Some(ch)
}

/// Unicode character for an Adobe glyph name, including `uniXXXX` and
/// `uXXXX[XX]` forms.
pub fn glyph_to_char(name: &str) -> Option<char> {
    if let Some(pos) = ASCII_NAMES.iter().position(|&n| n == name) {
        return char::from_u32(0x20 + pos as u32);
    }
    if let Some(pos) = LATIN1_NAMES.iter().position(|&n| !n.is_empty() && n == name) {
        return char::from_u32(0xA0 + pos as u32);
    }
    if let Some(&(_, ch)) = GREEK_NAMES.iter().find(|(n, _)| *n == name) {
        return Some(ch);
    }
    if let Some(ch) = named(name) {
        return Some(ch);
    }
    let hex = name
        .strip_prefix("uni")
        .filter(|h| h.len() == 4)
        .or_else(|| name.strip_prefix('u').filter(|h| (4..=6).contains(&h.len())))?;
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

/// Byte code for Adobe's numbered glyph names (`a65`, `g32`, `cid97`,
/// `Gxx` hex forms) produced by some font converters.
pub fn numbered_glyph_code(name: &str) -> Option<u8> {
    let (digits, radix) = if let Some(rest) = name.strip_prefix("cid") {
        (rest, 10)
    } else if let Some(rest) = name.strip_prefix('G').filter(|r| r.len() == 2) {
        (rest, 16)
    } else if let Some(rest) = name.strip_prefix('a').or_else(|| name.strip_prefix('g')) {
        (rest, 10)
    } else {
        return None;
    };
    if digits.is_empty() {
        return None;
    }
    u8::from_str_radix(digits, radix).ok().filter(|&c| c != 0)
}
