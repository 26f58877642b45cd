//! Token scanning over one input line.
//!
//! A `Tokenizer` is built fresh for every line the outer interpreter is
//! handed (`ForthRuntime::interpret`), so there is no shared mutable
//! cursor state across calls — each call owns its own input buffer, as
//! the re-entrancy note in the design notes requires.

/// Scans whitespace-delimited tokens out of one line of source text,
/// tracking an `>IN`-style byte offset so words like `(` and `."` can
/// consume past the next blank without disturbing the main cursor.
pub struct Tokenizer {
    chars: Vec<char>,
    pos: usize,
}

impl Tokenizer {
    pub fn new(line: &str) -> Tokenizer {
        Tokenizer {
            chars: line.chars().collect(),
            pos: 0,
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Current `>IN` offset, in characters.
    pub fn in_ptr(&self) -> usize {
        self.pos
    }

    fn skip_spaces(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    /// Pulls the next space-delimited token, or `None` if the line is
    /// exhausted. Does not interpret `(` or `."` specially — callers that
    /// need delimiter-based parsing use `parse_to`.
    pub fn next_token(&mut self) -> Option<String> {
        self.skip_spaces();
        if self.at_end() {
            return None;
        }
        let start = self.pos;
        while self.pos < self.chars.len() && !self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
        Some(self.chars[start..self.pos].iter().collect())
    }

    /// Parses up to (and consuming) the next occurrence of `delim`,
    /// skipping exactly one leading space first — used by `."` and `(`
    /// which both read "one space, then text up to a delimiter".
    pub fn parse_to(&mut self, delim: char) -> String {
        if self.pos < self.chars.len() && self.chars[self.pos] == ' ' {
            self.pos += 1;
        }
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos] != delim {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if self.pos < self.chars.len() {
            self.pos += 1; // consume the delimiter
        }
        text
    }

    /// Everything left on the line, unconsumed. Used by `\` comments.
    pub fn rest_of_line(&mut self) -> String {
        let text: String = self.chars[self.pos..].iter().collect();
        self.pos = self.chars.len();
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulls_words_separated_by_whitespace() {
        let mut t = Tokenizer::new("  dup   swap ");
        assert_eq!(t.next_token().as_deref(), Some("dup"));
        assert_eq!(t.next_token().as_deref(), Some("swap"));
        assert_eq!(t.next_token(), None);
    }

    #[test]
    fn parse_to_reads_a_dot_quote_body() {
        let mut t = Tokenizer::new(r#"." hello world" drop"#);
        assert_eq!(t.next_token().as_deref(), Some(".\""));
        let body = t.parse_to('"');
        assert_eq!(body, "hello world");
        assert_eq!(t.next_token().as_deref(), Some("drop"));
    }

    #[test]
    fn rest_of_line_consumes_everything_left() {
        let mut t = Tokenizer::new("\\ this is a comment");
        assert_eq!(t.next_token().as_deref(), Some("\\"));
        assert_eq!(t.rest_of_line(), " this is a comment");
        assert!(t.at_end());
    }

    #[test]
    fn empty_line_yields_no_tokens() {
        let mut t = Tokenizer::new("   ");
        assert_eq!(t.next_token(), None);
    }
}
