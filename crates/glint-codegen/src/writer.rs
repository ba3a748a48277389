//! Indented line writer.

use alloc::string::String;

#[derive(Debug, Default)]
pub struct SourceWriter {
    out: String,
    indent: usize,
}

impl SourceWriter {
    const INDENT: &'static str = "    ";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.out.push_str(Self::INDENT);
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    /// Emit an empty line unless the previous one is already empty.
    pub fn blank(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn finish(self) -> String {
        let mut out = self.out;
        while out.ends_with("\n\n") {
            out.pop();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation() {
        let mut w = SourceWriter::new();
        w.line("fn main() {");
        w.indent();
        w.line("return;");
        w.dedent();
        w.line("}");
        w.blank();
        w.blank();
        assert_eq!(w.finish(), "fn main() {\n    return;\n}\n");
    }
}
