//! Tests for error reporting
//!
//! This module checks that structural errors carry the right line number and
//! offending text, that a failed parse leaves previously loaded content
//! intact, and that error messages stay readable.

#[cfg(test)]
mod tests {
    use crate::error::{IniError, ParseError, ValueError};
    use crate::options::Options;
    use crate::parser::parse_reader;
    use crate::registry::Registry;
    use crate::value::FromValue;

    fn parse_err(input: &str, options: &Options) -> ParseError {
        let mut registry = Registry::new();
        match parse_reader(input.as_bytes(), options, &mut registry) {
            Err(IniError::Parse(err)) => err,
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_unclosed_section_line() {
        let err = parse_err("a = 1\n\n[server\n", &Options::default());
        assert_eq!(
            err,
            ParseError::UnclosedSection {
                line: 3,
                text: "[server".to_string(),
            }
        );
        assert_eq!(err.to_string(), "unclosed section at line 3: [server");
    }

    #[test]
    fn test_missing_key_quote() {
        let err = parse_err("[s]\n`open = 1\n", &Options::default());
        assert!(matches!(err, ParseError::MissingKeyQuote { line: 2, .. }));

        let err = parse_err("\"\"\"name = 1\n", &Options::default());
        assert!(matches!(err, ParseError::MissingKeyQuote { line: 1, .. }));
    }

    #[test]
    fn test_empty_key_name() {
        let err = parse_err("[s]\n; comment\n= value\n", &Options::default());
        assert_eq!(err.line(), 3);
        assert!(err.to_string().contains("empty key name"));
    }

    #[test]
    fn test_missing_value_quote_reports_last_line() {
        let err = parse_err("k = \"\"\"start\nmiddle\nend\n", &Options::default());
        match err {
            ParseError::MissingValueQuote { line, start } => {
                assert_eq!(line, 4);
                assert_eq!(start, "\"\"\"start");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_value_quote_for_backtick() {
        let err = parse_err("k = `open", &Options::default());
        assert!(matches!(err, ParseError::MissingValueQuote { line: 2, .. }));
    }

    #[test]
    fn test_missing_delimiter_without_boolean_keys() {
        let options = Options {
            allow_boolean_keys: false,
            ..Options::default()
        };
        let err = parse_err("[mysqld]\nskip-name-resolve\n", &options);
        assert_eq!(
            err,
            ParseError::MissingDelimiter {
                line: 2,
                text: "skip-name-resolve".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_utf8_is_rejected_with_line() {
        let mut registry = Registry::new();
        let err = parse_reader(&b"[s]\nk = caf\xE9\n"[..], &Options::default(), &mut registry)
            .unwrap_err();

        match err {
            IniError::Parse(ParseError::InvalidUtf8 { line, offset }) => {
                assert_eq!(line, 2);
                assert_eq!(offset, 7);
            }
            other => panic!("expected invalid UTF-8 error, got {:?}", other),
        }
        assert!(registry.section("s").is_none());
    }

    #[test]
    fn test_invalid_utf8_in_python_multiline() {
        let options = Options {
            allow_python_multiline_values: true,
            ..Options::default()
        };
        let mut registry = Registry::new();
        let err = parse_reader(&b"k = a\n  b\xFF\n"[..], &options, &mut registry).unwrap_err();
        assert!(matches!(
            err,
            IniError::Parse(ParseError::InvalidUtf8 { line: 2, offset: 3 })
        ));
    }

    #[test]
    fn test_error_leaves_registry_untouched() {
        let mut registry = Registry::new();
        parse_reader("[kept]\nk = v\n".as_bytes(), &Options::default(), &mut registry).unwrap();
        let before = registry.clone();

        let result = parse_reader(
            "[new]\nx = 1\n[broken\n".as_bytes(),
            &Options::default(),
            &mut registry,
        );
        assert!(result.is_err());
        assert_eq!(registry, before);
        assert!(registry.section("new").is_none());
    }

    #[test]
    fn test_io_error_is_wrapped() {
        struct Failing;

        impl std::io::Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk gone"))
            }
        }

        let mut registry = Registry::new();
        let err = parse_reader(Failing, &Options::default(), &mut registry).unwrap_err();
        assert!(matches!(err, IniError::Io(_)));
        assert_eq!(err.to_string(), "IO error: disk gone");
    }

    #[test]
    fn test_value_error_messages() {
        let err = bool::from_value("maybe").unwrap_err();
        assert_eq!(err.to_string(), "parsing \"maybe\": invalid boolean syntax");

        let err = i32::from_value("12a").unwrap_err();
        assert!(matches!(err, ValueError::InvalidInteger { .. }));
        assert_eq!(err.to_string(), "parsing \"12a\": invalid syntax");

        let wrapped: IniError = err.into();
        assert!(wrapped.to_string().starts_with("Value error: "));
    }

    #[test]
    fn test_lookup_error_messages() {
        let err = IniError::KeyNotFound {
            section: "server".to_string(),
            key: "port".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "key \"port\" does not exist in section \"server\""
        );

        let err = IniError::SectionNotFound {
            name: "db".to_string(),
        };
        assert_eq!(err.to_string(), "section \"db\" does not exist");
    }
}
