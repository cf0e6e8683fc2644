//! # Groovy Function Scanner
//!
//! Extracts function definitions from Gremlin/Groovy source files so they
//! can be bound as model methods.
//!
//! Two passes:
//! 1. A line scan captures blocks. A block opens at a line that starts with
//!    `def` and contains `{`, and closes at the next line that is exactly `}`.
//!    A definition whose braces balance on its first line is a block on its own.
//! 2. Each block is re-parsed against a minimal grammar:
//!    `def NAME ( [PARAM {, PARAM}] ) {`
//!    where names match `[A-Za-z0-9][A-Za-z0-9_]*`.
//!
//! Blocks that fail the grammar (typed parameters, default values, closures
//! assigned to variables) are skipped, not reported. The scanner favors
//! finding the common case over rejecting files.

use crate::OgmError;
use crate::primitives::SCRIPT_DEF_KEYWORD;
use std::path::Path;

/// A function definition found in a script file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSignature {
    /// Function name.
    pub name: String,
    /// Parameter names, in declaration order.
    pub params: Vec<String>,
    /// Text between the opening `{` and the closing `}`.
    pub body: String,
    /// The full captured definition.
    pub definition: String,
}

// =============================================================================
// FILE SCAN
// =============================================================================

/// Read a script file and return every definition the scanner recognizes.
pub fn parse_file(path: &Path) -> Result<Vec<ScriptSignature>, OgmError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| OgmError::Io(format!("cannot read '{}': {}", path.display(), e)))?;
    Ok(parse_source(&source))
}

/// Scan source text and return every definition the scanner recognizes.
#[must_use]
pub fn parse_source(source: &str) -> Vec<ScriptSignature> {
    let mut signatures = Vec::new();
    for block in capture_blocks(source) {
        match parse_definition(&block) {
            Some(sig) => signatures.push(sig),
            None => {
                tracing::debug!(
                    block = block.lines().next().unwrap_or_default(),
                    "skipping unparseable script definition"
                );
            }
        }
    }
    signatures
}

fn is_block_start(line: &str) -> bool {
    line.starts_with(SCRIPT_DEF_KEYWORD) && line.contains('{')
}

fn is_block_end(line: &str) -> bool {
    line.trim_end_matches('\r') == "}"
}

fn braces_balance(line: &str) -> bool {
    line.matches('{').count() == line.matches('}').count()
}

fn capture_blocks(source: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();

    for line in source.split('\n') {
        if !current.is_empty() {
            current.push_str(line);
            current.push('\n');
            if is_block_end(line) {
                blocks.push(std::mem::take(&mut current));
            }
        } else if is_block_start(line) {
            current.push_str(line);
            current.push('\n');
            if braces_balance(line) {
                blocks.push(std::mem::take(&mut current));
            }
        }
    }

    // An unterminated trailing block is dropped.
    blocks
}

// =============================================================================
// DEFINITION GRAMMAR
// =============================================================================

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Punct(char),
}

/// Tokenize the header of a definition, stopping after the first `{`.
fn tokenize_header(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if start.is_none() {
                start = Some(idx);
            }
            continue;
        }
        if let Some(s) = start.take() {
            tokens.push(Token::Word(&text[s..idx]));
        }
        if ch.is_whitespace() {
            continue;
        }
        tokens.push(Token::Punct(ch));
        if ch == '{' {
            return tokens;
        }
    }
    if let Some(s) = start {
        tokens.push(Token::Word(&text[s..]));
    }
    tokens
}

fn is_name(word: &str) -> bool {
    word.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
}

/// Parse a single captured definition.
///
/// Returns `None` if the text does not match the definition grammar.
#[must_use]
pub fn parse_definition(text: &str) -> Option<ScriptSignature> {
    let tokens = tokenize_header(text);
    let mut iter = tokens.into_iter();

    if iter.next()? != Token::Word(SCRIPT_DEF_KEYWORD) {
        return None;
    }
    let name = match iter.next()? {
        Token::Word(w) if is_name(w) => w.to_string(),
        _ => return None,
    };
    if iter.next()? != Token::Punct('(') {
        return None;
    }

    let mut params = Vec::new();
    let mut expect_name = true;
    loop {
        match iter.next()? {
            Token::Punct(')') if !expect_name || params.is_empty() => break,
            Token::Word(w) if expect_name && is_name(w) => {
                params.push(w.to_string());
                expect_name = false;
            }
            Token::Punct(',') if !expect_name => expect_name = true,
            _ => return None,
        }
    }

    if iter.next()? != Token::Punct('{') {
        return None;
    }

    Some(ScriptSignature {
        name,
        params,
        body: extract_body(text)?,
        definition: text.to_string(),
    })
}

fn extract_body(text: &str) -> Option<String> {
    let open = text.find('{')?;
    let inner = &text[open + 1..];
    let trimmed = inner.trim_end();
    let inner = trimmed.strip_suffix('}').unwrap_or(trimmed);
    Some(inner.trim().to_string())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
// helper methods
def greet(name, times) {
  (1..times).collect { \"hello \" + name }
}

def my_method(eid, arg1) {
  v = g.v(eid)
  v.setProperty(\"arg\", arg1)
  g.stopTransaction(SUCCESS)
  v
}

def typed(String a) {
  a
}

def count_all() { g.V.count() }
";

    #[test]
    fn scans_all_wellformed_definitions() {
        let sigs = parse_source(SOURCE);
        let names: Vec<_> = sigs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["greet", "my_method", "count_all"]);
    }

    #[test]
    fn extracts_params_in_order() {
        let sigs = parse_source(SOURCE);
        assert_eq!(sigs[0].params, vec!["name", "times"]);
        assert_eq!(sigs[1].params, vec!["eid", "arg1"]);
        assert!(sigs[2].params.is_empty());
    }

    #[test]
    fn extracts_body_without_braces() {
        let sigs = parse_source(SOURCE);
        assert_eq!(sigs[0].body, "(1..times).collect { \"hello \" + name }");
        assert!(sigs[1].body.starts_with("v = g.v(eid)"));
        assert!(sigs[1].body.ends_with('v'));
        assert_eq!(sigs[2].body, "g.V.count()");
    }

    #[test]
    fn definition_keeps_full_text() {
        let sigs = parse_source(SOURCE);
        assert!(sigs[0].definition.starts_with("def greet(name, times) {"));
        assert!(sigs[0].definition.trim_end().ends_with('}'));
    }

    #[test]
    fn rejects_malformed_headers() {
        assert!(parse_definition("def (a) {\n}\n").is_none());
        assert!(parse_definition("def f(a b) {\n}\n").is_none());
        assert!(parse_definition("def f(a,) {\n}\n").is_none());
        assert!(parse_definition("def f(a = 1) {\n}\n").is_none());
        assert!(parse_definition("define f(a) {\n}\n").is_none());
    }

    #[test]
    fn indented_definitions_are_not_captured() {
        let source = "  def inner(a) {\n    a\n}\n";
        assert!(parse_source(source).is_empty());
    }

    #[test]
    fn unterminated_block_is_dropped() {
        let source = "def open(a) {\n  a\n";
        assert!(parse_source(source).is_empty());
    }

    #[test]
    fn crlf_line_endings() {
        let source = "def f(a) {\r\n  a\r\n}\r\n";
        let sigs = parse_source(source);
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].body, "a");
    }

    #[test]
    fn parse_file_reports_missing_file() {
        let result = parse_file(Path::new("/definitely/not/here.groovy"));
        assert!(matches!(result, Err(OgmError::Io(_))));
    }
}
