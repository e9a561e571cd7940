//! Minimal XML text handling for the XML-based encoders.

use std::fmt::Write;

/// Escapes text for use in element content and attribute values.
pub(crate) fn escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    result
}

/// An indenting XML text builder.
pub(crate) struct XmlWriter {
    out: String,
    depth: usize,
}

impl XmlWriter {
    pub(crate) fn new(prolog: &str) -> Self {
        let mut out = String::from(prolog);
        out.push('\n');
        Self { out, depth: 0 }
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push('\t');
        }
    }

    /// Opens `<tag attrs>`. Attribute values are escaped.
    pub(crate) fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.indent();
        self.out.push('<');
        self.out.push_str(tag);
        for (name, value) in attrs {
            let _ = write!(self.out, " {name}=\"{}\"", escape(value));
        }
        self.out.push_str(">\n");
        self.depth += 1;
    }

    pub(crate) fn close(&mut self, tag: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        let _ = writeln!(self.out, "</{tag}>");
    }

    /// Writes `<tag attrs>text</tag>`. The text is escaped.
    pub(crate) fn element(&mut self, tag: &str, attrs: &[(&str, &str)], text: &str) {
        self.indent();
        self.out.push('<');
        self.out.push_str(tag);
        for (name, value) in attrs {
            let _ = write!(self.out, " {name}=\"{}\"", escape(value));
        }
        let _ = writeln!(self.out, ">{}</{tag}>", escape(text));
    }

    /// Writes `<tag/>`.
    pub(crate) fn empty(&mut self, tag: &str) {
        self.indent();
        let _ = writeln!(self.out, "<{tag}/>");
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_writer_nests_and_escapes() {
        let mut xml = XmlWriter::new("<?xml version=\"1.0\"?>");
        xml.open("root", &[("id", "a&b")]);
        xml.element("name", &[], "x < y");
        xml.empty("flag");
        xml.close("root");

        assert_eq!(
            xml.finish(),
            "<?xml version=\"1.0\"?>\n<root id=\"a&amp;b\">\n\t<name>x &lt; y</name>\n\t<flag/>\n</root>\n"
        );
    }
}
