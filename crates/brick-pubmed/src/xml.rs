//! Streaming XML reader yielding one element tree per article
//!
//! The document root (`PubmedArticleSet`) is never materialized: each of its
//! direct child elements is built into a small owned tree, handed out, and
//! dropped before the next one is read. Text is kept verbatim, including
//! whitespace, so mixed content flattens exactly as written.

use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};

/// Node of an article tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// Element with its children in document order. Attributes are not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Direct child elements, skipping text
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First direct child element named `name`
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|e| e.name == name)
    }

    /// Follow a path of child names, e.g. `["MedlineCitation", "PMID"]`
    pub fn find_path(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter().try_fold(self, |element, name| element.child(name))
    }

    /// Concatenation of all descendant text, verbatim
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }
}

/// Owned view of one reader event
enum Token {
    Start(String),
    Empty(String),
    End(String),
    Text(String),
    Eof,
    Skip,
}

/// Pulls the direct children of the document root one at a time.
pub struct ArticleReader<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    root: Option<String>,
    finished: bool,
}

impl<R: BufRead> ArticleReader<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = true;
        Self {
            reader,
            buf: Vec::with_capacity(8 * 1024),
            root: None,
            finished: false,
        }
    }

    /// Name of the document root, once it has been read
    pub fn root_name(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Bytes consumed from the (decompressed) input so far
    pub fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    /// Next top-level element, or `None` after the root closes.
    pub fn next_article(&mut self) -> Result<Option<XmlElement>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            match self.next_token()? {
                Token::Start(name) => {
                    if self.root.is_none() {
                        self.root = Some(name);
                    } else {
                        return self.read_element(name).map(Some);
                    }
                }
                Token::Empty(name) => {
                    if self.root.is_none() {
                        self.root = Some(name);
                        self.finished = true;
                        return Ok(None);
                    }
                    return Ok(Some(XmlElement::new(name)));
                }
                Token::End(name) => {
                    if self.root.as_deref() != Some(name.as_str()) {
                        return Err(Error::parse(
                            self.position(),
                            format!("unexpected closing tag </{name}>"),
                        ));
                    }
                    self.finished = true;
                    return Ok(None);
                }
                Token::Eof => {
                    return Err(match &self.root {
                        None => Error::parse(self.position(), "no root element"),
                        Some(root) => Error::parse(
                            self.position(),
                            format!("unexpected end of file inside <{root}>"),
                        ),
                    });
                }
                Token::Text(_) | Token::Skip => {}
            }
        }
    }

    /// Build the subtree of an element whose start tag was just read
    fn read_element(&mut self, name: String) -> Result<XmlElement> {
        let mut stack = vec![XmlElement::new(name)];
        loop {
            match self.next_token()? {
                Token::Start(child) => stack.push(XmlElement::new(child)),
                Token::Empty(child) => {
                    if let Some(top) = stack.last_mut() {
                        top.children.push(XmlNode::Element(XmlElement::new(child)));
                    }
                }
                Token::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        top.push_text(&text);
                    }
                }
                Token::End(end) => {
                    let Some(done) = stack.pop() else {
                        return Err(Error::parse(self.position(), "unbalanced closing tag"));
                    };
                    if done.name != end {
                        return Err(Error::parse(
                            self.position(),
                            format!("expected </{}>, found </{end}>", done.name),
                        ));
                    }
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Element(done)),
                        None => return Ok(done),
                    }
                }
                Token::Eof => {
                    let open = stack.last().map_or("", |e| e.name.as_str()).to_string();
                    return Err(Error::parse(
                        self.position(),
                        format!("unexpected end of file inside <{open}>"),
                    ));
                }
                Token::Skip => {}
            }
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        let position = self.position();
        self.buf.clear();
        let event = self
            .reader
            .read_event_into(&mut self.buf)
            .map_err(|e| Error::parse(position, e.to_string()))?;

        let token = match event {
            Event::Start(e) => Token::Start(String::from_utf8_lossy(e.name().as_ref()).into_owned()),
            Event::Empty(e) => Token::Empty(String::from_utf8_lossy(e.name().as_ref()).into_owned()),
            Event::End(e) => Token::End(String::from_utf8_lossy(e.name().as_ref()).into_owned()),
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|err| Error::parse(position, err.to_string()))?;
                Token::Text(text.into_owned())
            }
            Event::CData(e) => Token::Text(String::from_utf8_lossy(&e).into_owned()),
            Event::Eof => Token::Eof,
            // Declarations, doctype, comments, processing instructions
            _ => Token::Skip,
        };
        Ok(token)
    }
}

/// Parse a complete document and return its root element
pub fn parse_document<R: BufRead>(input: R) -> Result<XmlElement> {
    let mut reader = ArticleReader::new(input);
    loop {
        match reader.next_token()? {
            Token::Start(name) => return reader.read_element(name),
            Token::Empty(name) => return Ok(XmlElement::new(name)),
            Token::Eof => return Err(Error::parse(reader.position(), "no root element")),
            Token::End(name) => {
                return Err(Error::parse(
                    reader.position(),
                    format!("unexpected closing tag </{name}>"),
                ));
            }
            Token::Text(_) | Token::Skip => {}
        }
    }
}

/// [`parse_document`] over a string
pub fn parse_str(xml: &str) -> Result<XmlElement> {
    parse_document(xml.as_bytes())
}
