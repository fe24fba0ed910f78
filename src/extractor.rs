//! Schema extraction: from a table file to its declared indexes and column keys.
//!
//! The analyzer treats extraction as opaque: anything implementing
//! [`SchemaExtractor`] can be plugged into the runner. The bundled
//! [`DirectiveExtractor`] reads a `#`-prefixed declaration preamble:
//!
//! ```text
//! # orders table, exported 2024-03-01
//! #INDEX by_customer, by_date
//! #INDEX by_sku
//! #COLKEY order_id customer_id
//! order_id,customer_id,sku,date
//! 1,42,X-1,2024-03-01
//! ```
//!
//! The preamble ends at the first line that does not start with `#`; nothing
//! after it is read. Directive keywords follow the `#` directly and are
//! case-insensitive (`#COLKEY` may be spelled `#KEY`); any other `#` line is a
//! comment.

use anyhow::{Context as _, Result, bail};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Indexes and column keys declared by one table file, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    pub indexes: Vec<String>,
    pub col_keys: Vec<String>,
}

/// Turns a file path into its declared schema.
///
/// Implementations are shared between extraction worker threads.
pub trait SchemaExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<TableSchema>;
}

/// Blanket impl so closures can stand in for an extractor (handy in tests).
impl<F> SchemaExtractor for F
where
    F: Fn(&Path) -> Result<TableSchema> + Send + Sync,
{
    fn extract(&self, path: &Path) -> Result<TableSchema> {
        self(path)
    }
}

/// Reads `#INDEX` / `#COLKEY` directives from the head of a delimited or
/// fixed-width table file.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveExtractor;

impl SchemaExtractor for DirectiveExtractor {
    fn extract(&self, path: &Path) -> Result<TableSchema> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        parse_preamble(BufReader::new(file))
    }
}

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

enum Directive {
    Index,
    ColKey,
}

fn directive_kind(keyword: &str) -> Option<Directive> {
    match keyword.to_ascii_uppercase().as_str() {
        "INDEX" => Some(Directive::Index),
        "COLKEY" | "KEY" => Some(Directive::ColKey),
        _ => None,
    }
}

/// Parse the directive preamble from any buffered reader.
pub fn parse_preamble<R: BufRead>(reader: R) -> Result<TableSchema> {
    let mut schema = TableSchema::default();

    for (line_no, raw) in reader.split(b'\n').enumerate() {
        let mut raw = raw.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        if line_no == 0 && raw.starts_with(UTF8_BOM) {
            raw.drain(..UTF8_BOM.len());
        }

        if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        // Data rows are never decoded, only the preamble has to be UTF-8
        if raw.first() != Some(&b'#') {
            break;
        }
        let line = String::from_utf8(raw)
            .with_context(|| format!("line {}: directive is not valid UTF-8", line_no + 1))?;
        let line = line.trim_end_matches('\r');
        let body = line.strip_prefix('#').unwrap_or(line);

        // `# INDEX` (with a space) is prose, not a directive
        let (keyword, rest) = body
            .split_once(char::is_whitespace)
            .unwrap_or((body, ""));
        let Some(kind) = directive_kind(keyword) else {
            // plain comment
            continue;
        };

        let names: Vec<&str> = rest
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            bail!("line {}: '#{keyword}' declares no names", line_no + 1);
        }

        let target = match kind {
            Directive::Index => &mut schema.indexes,
            Directive::ColKey => &mut schema.col_keys,
        };
        for name in names {
            if !target.iter().any(|existing| existing == name) {
                target.push(name.to_owned());
            }
        }
    }

    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_preamble_collects_directives() {
        let input = "# comment\n#INDEX b, a\n#index c\n\n#COLKEY id  code\n#KEY id\nid,code\n#INDEX ignored\n";
        let schema = parse_preamble(Cursor::new(input)).unwrap();
        assert_eq!(schema.indexes, vec!["b", "a", "c"]);
        assert_eq!(schema.col_keys, vec!["id", "code"]);
    }

    #[test]
    fn test_spaced_keyword_is_a_comment() {
        let schema = parse_preamble(Cursor::new("# index of tables\n# key points\n")).unwrap();
        assert_eq!(schema, TableSchema::default());
    }

    #[test]
    fn test_leading_bom_is_skipped() {
        let bytes: &[u8] = b"\xef\xbb\xbf#INDEX k\n";
        let schema = parse_preamble(Cursor::new(bytes)).unwrap();
        assert_eq!(schema.indexes, vec!["k"]);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let schema = parse_preamble(Cursor::new("#INDEX Idx idx\n")).unwrap();
        assert_eq!(schema.indexes, vec!["Idx", "idx"]);
    }

    #[test]
    fn test_file_without_preamble_has_empty_schema() {
        let schema = parse_preamble(Cursor::new("a,b,c\n1,2,3\n")).unwrap();
        assert_eq!(schema, TableSchema::default());
    }

    #[test]
    fn test_crlf_line_endings() {
        let schema = parse_preamble(Cursor::new("#INDEX x\r\n#COLKEY k\r\ndata\r\n")).unwrap();
        assert_eq!(schema.indexes, vec!["x"]);
        assert_eq!(schema.col_keys, vec!["k"]);
    }

    #[test]
    fn test_empty_directive_is_an_error() {
        let err = parse_preamble(Cursor::new("#INDEX x\n#INDEX\n")).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let bytes: &[u8] = b"#INDEX \xff\xfe\n";
        assert!(parse_preamble(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn test_binary_data_after_preamble_is_not_read() {
        let bytes: &[u8] = b"#INDEX k\n\xff\xfe\x00data\n";
        let schema = parse_preamble(Cursor::new(bytes)).unwrap();
        assert_eq!(schema.indexes, vec!["k"]);
    }

    #[test]
    fn test_directive_extractor_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"#INDEX pk\nrow\n").unwrap();
        let schema = DirectiveExtractor.extract(file.path()).unwrap();
        assert_eq!(schema.indexes, vec!["pk"]);
    }

    #[test]
    fn test_directive_extractor_missing_file() {
        assert!(
            DirectiveExtractor
                .extract(Path::new("/no/such/table.fac"))
                .is_err()
        );
    }
}
