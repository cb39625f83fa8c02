//! DTD schema extraction
//!
//! Reads the element declarations of a DTD and keeps, for every element,
//! only what the transcoder needs to shape it: the occurrence class of its
//! content model and the names of the child elements it may contain.
//!
//! Extraction is best-effort and lossy. Declarations that cannot be parsed
//! are skipped with a [`DtdWarning`]; the rest of the DTD still contributes.
//! Supported: comments, internal parameter entities (`<!ENTITY % x "...">`)
//! and their expansion, `EMPTY`/`ANY`/`#PCDATA`/mixed/element content
//! models, `IGNORE` conditional sections. External entities are not fetched.

use std::fmt;
use std::io;
use std::path::Path;

use rustc_hash::FxHashMap;

/// Entity references nest at most this deep before expansion gives up
const MAX_ENTITY_DEPTH: usize = 16;

/// Declaration text kept in warnings
const WARNING_EXCERPT_LEN: usize = 80;

/// Cardinality of an element's content model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    /// No marker
    Required,
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
    /// No content model to read a marker from (`EMPTY`, `ANY`)
    None,
}

impl Occurrence {
    fn from_marker(marker: Option<u8>) -> Self {
        match marker {
            Some(b'?') => Self::Optional,
            Some(b'*') => Self::ZeroOrMore,
            Some(b'+') => Self::OneOrMore,
            _ => Self::Required,
        }
    }

    /// Lower-case name used in logs and failure records
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::ZeroOrMore => "zero or more",
            Self::OneOrMore => "one or more",
            Self::None => "none",
        }
    }

    /// Parse the lower-case name back (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "required" => Some(Self::Required),
            "optional" => Some(Self::Optional),
            "zero or more" => Some(Self::ZeroOrMore),
            "one or more" => Some(Self::OneOrMore),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    /// `*` or `+`
    pub fn is_repeated(self) -> bool {
        matches!(self, Self::ZeroOrMore | Self::OneOrMore)
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape metadata for one declared element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSchema {
    pub occurrence: Occurrence,
    /// Declared child elements, in declaration order, without duplicates.
    /// Empty for text-only, mixed, `EMPTY` and `ANY` content.
    pub children: Vec<String>,
}

impl ElementSchema {
    pub fn new<I, S>(occurrence: Occurrence, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for child in children {
            let child = child.into();
            if !unique.contains(&child) {
                unique.push(child);
            }
        }
        Self {
            occurrence,
            children: unique,
        }
    }

    /// Text-only element (`(#PCDATA)`)
    pub fn text() -> Self {
        Self::new(Occurrence::Required, Vec::<String>::new())
    }
}

/// A declaration that was skipped or partially understood
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtdWarning {
    /// Start of the offending declaration
    pub declaration: String,
    pub message: String,
}

impl fmt::Display for DtdWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.declaration)
    }
}

/// Element name → shape metadata, extracted from a DTD.
///
/// Built once and never mutated afterwards; workers share it by reference.
#[derive(Debug, Clone, Default)]
pub struct DtdSchema {
    elements: FxHashMap<String, ElementSchema>,
    warnings: Vec<DtdWarning>,
}

impl DtdSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a DTD file. Only I/O failures are errors.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let schema = Self::parse(&String::from_utf8_lossy(&bytes));
        log::info!(
            "DTD {}: {} elements ({} warnings)",
            path.display(),
            schema.len(),
            schema.warnings.len()
        );
        Ok(schema)
    }

    /// Parse DTD text, recovering whatever declarations are understood.
    pub fn parse(text: &str) -> Self {
        let mut parser = Parser::default();
        parser.run(text);
        Self {
            elements: parser.elements,
            warnings: parser.warnings,
        }
    }

    /// Add or replace a declaration
    pub fn insert(&mut self, name: impl Into<String>, schema: ElementSchema) -> Option<ElementSchema> {
        self.elements.insert(name.into(), schema)
    }

    pub fn get(&self, name: &str) -> Option<&ElementSchema> {
        self.elements.get(name)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Declarations that were skipped or only partly understood
    pub fn warnings(&self) -> &[DtdWarning] {
        &self.warnings
    }

    /// All declarations, sorted by element name
    pub fn sorted(&self) -> Vec<(&str, &ElementSchema)> {
        let mut entries: Vec<_> = self
            .elements
            .iter()
            .map(|(name, schema)| (name.as_str(), schema))
            .collect();
        entries.sort_by_key(|(name, _)| *name);
        entries
    }
}

#[derive(Default)]
struct Parser {
    /// Internal parameter entities: name → replacement text
    entities: FxHashMap<String, String>,
    elements: FxHashMap<String, ElementSchema>,
    warnings: Vec<DtdWarning>,
}

impl Parser {
    fn run(&mut self, text: &str) {
        let mut pos = 0;
        while let Some(rel) = text[pos..].find("<!") {
            let start = pos + rel;
            let rest = &text[start..];

            if rest.starts_with("<!--") {
                match rest.find("-->") {
                    Some(end) => pos = start + end + 3,
                    None => {
                        self.warn(rest, "unterminated comment");
                        return;
                    }
                }
                continue;
            }

            if let Some(section) = rest.strip_prefix("<![") {
                pos = start + 3 + self.conditional_section(section);
                continue;
            }

            let after = &rest[2..];
            let keyword_len = after
                .bytes()
                .take_while(|b| b.is_ascii_alphabetic())
                .count();
            let Some(end) = declaration_end(after) else {
                self.warn(rest, "unterminated declaration");
                return;
            };
            let keyword = &after[..keyword_len];
            let body = &after[keyword_len..end];
            pos = start + 2 + end + 1;

            match keyword {
                "ELEMENT" => self.element(body),
                "ENTITY" => self.entity(body),
                "ATTLIST" | "NOTATION" => {}
                _ => self.warn(rest, "unknown declaration"),
            }
        }
    }

    /// Handle the text after `<![`. Returns how many bytes to skip.
    ///
    /// `IGNORE` sections are skipped whole; anything else is scanned as if
    /// included.
    fn conditional_section(&mut self, section: &str) -> usize {
        let Some(open) = section.find('[') else {
            return 0;
        };
        let keyword = self.expand(&section[..open], section).trim().to_string();
        if keyword != "IGNORE" {
            return open + 1;
        }

        let mut depth = 1usize;
        let mut i = open + 1;
        while i < section.len() {
            let rest = &section[i..];
            if rest.starts_with("<![") {
                depth += 1;
                i += 3;
            } else if rest.starts_with("]]>") {
                depth -= 1;
                i += 3;
                if depth == 0 {
                    return i;
                }
            } else {
                i += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
        self.warn(section, "unterminated IGNORE section");
        section.len()
    }

    fn entity(&mut self, body: &str) {
        let body = body.trim_start();
        // General entities don't affect element shapes
        let Some(rest) = body.strip_prefix('%') else {
            return;
        };
        let rest = rest.trim_start();
        let name_len = rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(rest.len());
        let name = &rest[..name_len];
        let value = rest[name_len..].trim();

        if name.is_empty() {
            self.warn(body, "parameter entity without a name");
            return;
        }
        if self.entities.contains_key(name) {
            // First declaration is binding
            return;
        }

        match value.chars().next() {
            Some(quote @ ('"' | '\'')) => match value[1..].find(quote) {
                Some(close) => {
                    self.entities
                        .insert(name.to_string(), value[1..1 + close].to_string());
                }
                None => self.warn(body, "unterminated entity value"),
            },
            _ if value.starts_with("SYSTEM") || value.starts_with("PUBLIC") => {
                self.warn(body, "external parameter entity not loaded");
            }
            _ => self.warn(body, "malformed parameter entity"),
        }
    }

    fn element(&mut self, body: &str) {
        let expanded = self.expand(body, body);
        let decl = expanded.trim();

        let name_len = decl
            .find(|c: char| c.is_whitespace() || c == '(')
            .unwrap_or(decl.len());
        let name = &decl[..name_len];
        if !is_valid_name(name) {
            self.warn(body, "invalid element name");
            return;
        }

        let spec = decl[name_len..].trim();
        let schema = match spec {
            "EMPTY" | "ANY" => ElementSchema::new(Occurrence::None, Vec::<String>::new()),
            _ if spec.starts_with('(') => match parse_content_model(spec) {
                Ok(schema) => schema,
                Err(message) => {
                    self.warn(body, &message);
                    return;
                }
            },
            _ => {
                self.warn(body, "unrecognized content specification");
                return;
            }
        };

        if self.elements.contains_key(name) {
            self.warn(body, "duplicate declaration ignored");
            return;
        }
        self.elements.insert(name.to_string(), schema);
    }

    /// Replace `%name;` references, recursively. Unknown references are
    /// dropped with a warning.
    fn expand(&mut self, text: &str, context: &str) -> String {
        let mut unknown = Vec::new();
        let expanded = expand_entities(text, &self.entities, 0, &mut unknown);
        for name in unknown {
            self.warn(context, &format!("unknown parameter entity %{name};"));
        }
        expanded
    }

    fn warn(&mut self, declaration: &str, message: &str) {
        let excerpt: String = declaration
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(WARNING_EXCERPT_LEN)
            .collect();
        log::warn!("DTD: {message}: {excerpt}");
        self.warnings.push(DtdWarning {
            declaration: excerpt,
            message: message.to_string(),
        });
    }
}

/// Offset of the `>` closing a declaration, skipping quoted literals
fn declaration_end(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => return Some(i),
            None => {}
        }
    }
    None
}

fn expand_entities(
    text: &str,
    entities: &FxHashMap<String, String>,
    depth: usize,
    unknown: &mut Vec<String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pct) = rest.find('%') {
        out.push_str(&rest[..pct]);
        let after = &rest[pct + 1..];
        let reference = after
            .find(';')
            .map(|semi| &after[..semi])
            .filter(|name| is_valid_name(name));
        match reference {
            Some(name) => {
                match entities.get(name) {
                    Some(value) if depth < MAX_ENTITY_DEPTH => {
                        out.push_str(&expand_entities(value, entities, depth + 1, unknown));
                    }
                    Some(_) => unknown.push(format!("{name} (nested too deep)")),
                    None => unknown.push(name.to_string()),
                }
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('%');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == ':' => {
            chars.all(is_name_char)
        }
        _ => false,
    }
}

/// One node of a parsed content model
#[derive(Debug)]
enum Particle {
    PcData,
    Name(String, Occurrence),
    Group(Vec<Particle>, Occurrence),
}

impl Particle {
    /// Cardinality governing the element's children.
    ///
    /// A marker-less group around a single particle takes that particle's
    /// marker: `(Author+)` repeats just like `(Author)+`.
    fn occurrence(&self) -> Occurrence {
        match self {
            Self::Group(items, Occurrence::Required) if items.len() == 1 => items[0].occurrence(),
            Self::Group(_, occurrence) | Self::Name(_, occurrence) => *occurrence,
            Self::PcData => Occurrence::Required,
        }
    }

    fn has_pcdata(&self) -> bool {
        match self {
            Self::PcData => true,
            Self::Name(..) => false,
            Self::Group(items, _) => items.iter().any(Particle::has_pcdata),
        }
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::PcData => {}
            Self::Name(name, _) => out.push(name),
            Self::Group(items, _) => items.iter().for_each(|p| p.collect_names(out)),
        }
    }
}

fn parse_content_model(spec: &str) -> Result<ElementSchema, String> {
    let mut cursor = Cursor {
        bytes: spec.as_bytes(),
        pos: 0,
    };
    let model = cursor.group()?;
    cursor.skip_ws();
    if cursor.pos < cursor.bytes.len() {
        return Err("trailing content after content model".to_string());
    }

    // Text-only and mixed content render as text, whatever element names
    // the mixture allows.
    let mut names = Vec::new();
    if !model.has_pcdata() {
        model.collect_names(&mut names);
    }
    Ok(ElementSchema::new(model.occurrence(), names))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn marker(&mut self) -> Occurrence {
        match self.peek() {
            Some(b @ (b'?' | b'*' | b'+')) => {
                self.pos += 1;
                Occurrence::from_marker(Some(b))
            }
            _ => Occurrence::Required,
        }
    }

    fn word(&mut self) -> &str {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| !b.is_ascii_whitespace() && !b"()|,?*+".contains(&b))
        {
            self.pos += 1;
        }
        // Only ASCII delimiters are ever split on, so this stays on a char boundary
        std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("")
    }

    /// Parse `( ... )` plus its marker. Separators are not checked for
    /// consistency and empty alternatives are tolerated.
    fn group(&mut self) -> Result<Particle, String> {
        if self.peek() != Some(b'(') {
            return Err("expected '('".to_string());
        }
        self.pos += 1;

        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err("unbalanced parentheses".to_string()),
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(b',' | b'|') => self.pos += 1,
                Some(b'(') => items.push(self.group()?),
                Some(b'#') => {
                    let word = self.word();
                    if word != "#PCDATA" {
                        return Err(format!("unexpected keyword {word}"));
                    }
                    items.push(Particle::PcData);
                }
                Some(other) => {
                    let word = self.word().to_string();
                    if !is_valid_name(&word) {
                        return Err(format!("unexpected character '{}'", other as char));
                    }
                    let occurrence = self.marker();
                    items.push(Particle::Name(word, occurrence));
                }
            }
        }

        let occurrence = self.marker();
        Ok(Particle::Group(items, occurrence))
    }
}
