use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use ini_parser::{Manager, ValueError, from_str};

#[cfg(test)]
mod accessor_tests {
    use super::*;

    const CONFIG: &str = r#"
[server]
host = example.org
port = 8080
mode = 0755
mask = 0xff
ratio = 0.75
debug = on
verbose = maybe
timeout = 1m30s
started = 2024-05-01T10:00:00+02:00
day = 2024-05-01
ports = 80, 443, x, 8443
names = a\, b, c
empty =
"#;

    fn config() -> Manager {
        from_str(CONFIG).unwrap()
    }

    #[test]
    fn test_parse_scalars() {
        let config = config();
        let server = config.section("server");

        assert_eq!(server.parse::<u16>("port").unwrap(), 8080);
        assert_eq!(server.parse::<u32>("mode").unwrap(), 0o755);
        assert_eq!(server.parse::<u8>("mask").unwrap(), 255);
        assert_eq!(server.parse::<f64>("ratio").unwrap(), 0.75);
        assert!(server.parse::<bool>("debug").unwrap());
        assert_eq!(server.parse::<String>("host").unwrap(), "example.org");
    }

    #[test]
    fn test_parse_errors() {
        let config = config();
        let server = config.section("server");

        assert!(matches!(
            server.parse::<bool>("verbose"),
            Err(ValueError::InvalidBool { .. })
        ));
        assert!(matches!(
            server.parse::<i64>("host"),
            Err(ValueError::InvalidInteger { .. })
        ));
        assert!(matches!(
            server.parse::<i8>("port"),
            Err(ValueError::InvalidInteger { .. })
        ));
    }

    #[test]
    fn test_duration_and_time() {
        let config = config();
        let server = config.section("server");

        assert_eq!(
            server.key("timeout").duration().unwrap(),
            Duration::from_secs(90)
        );

        let started = server.key("started").time().unwrap();
        assert_eq!(started.timestamp(), 1_714_550_400);

        let day = server.key("day").time_format("%Y-%m-%d").unwrap();
        assert_eq!(day.to_rfc3339(), "2024-05-01T00:00:00+00:00");

        assert!(server.key("host").time().is_err());
        assert!(server.parse::<DateTime<FixedOffset>>("day").is_err());
    }

    #[test]
    fn test_must_stores_default_on_failure() {
        let config = config();
        let key = config.section("server").key("verbose");

        assert!(!key.must(false));
        assert_eq!(key.value(), "false");

        let port = config.section("server").key("port");
        assert_eq!(port.must(1u16), 8080);
        assert_eq!(port.value(), "8080");
    }

    #[test]
    fn test_must_duration_renders_default() {
        let config = config();
        let key = config.section("server").key("host");
        let timeout = key.must(Duration::from_millis(1500));

        assert_eq!(timeout, Duration::from_millis(1500));
        assert_eq!(key.value(), "1.5s");
    }

    #[test]
    fn test_must_string() {
        let config = config();
        let server = config.section("server");

        assert_eq!(server.key("empty").must_string("fallback"), "fallback");
        assert_eq!(server.key("empty").value(), "fallback");
        assert_eq!(server.key("host").must_string("fallback"), "example.org");
    }

    #[test]
    fn test_must_on_missing_key_does_not_create_it() {
        let config = config();
        let key = config.section("server").key("missing");

        assert_eq!(key.must(7i32), 7);
        assert!(!key.exists());
    }

    #[test]
    fn test_in_candidates_and_range() {
        let config = config();
        let server = config.section("server");

        assert_eq!(
            server.key("host").in_candidates("localhost".to_string(), &[
                "example.org".to_string(),
                "example.com".to_string(),
            ]),
            "example.org"
        );
        assert_eq!(server.key("port").in_candidates(80u16, &[80, 443]), 80);

        assert_eq!(server.key("port").range(0u16, 1024, 65535), 8080);
        assert_eq!(server.key("port").range(1u16, 1, 1023), 1);
        assert_eq!(server.key("ratio").range(0.5f64, 0.0, 1.0), 0.75);
        assert_eq!(server.key("host").range(3i32, 0, 10), 3);
    }

    #[test]
    fn test_strings_split_and_escape() {
        let config = config();
        let server = config.section("server");

        assert_eq!(server.key("names").strings(","), vec!["a, b", "c"]);
        assert_eq!(server.key("ports").strings(","), vec!["80", "443", "x", "8443"]);
        assert!(server.key("empty").strings(",").is_empty());
    }

    #[test]
    fn test_typed_lists() {
        let config = config();
        let ports = config.section("server").key("ports");

        assert_eq!(ports.list::<u16>(","), vec![80, 443, 0, 8443]);
        assert_eq!(ports.valid_list::<u16>(","), vec![80, 443, 8443]);

        let err = ports.strict_list::<u16>(",").unwrap_err();
        assert_eq!(
            err,
            ValueError::InvalidInteger {
                value: "x".to_string(),
                reason: "invalid syntax".to_string(),
            }
        );
    }

    #[test]
    fn test_validate() {
        let config = config();
        let host = config.section("server").key("host");
        let checked = host.validate(|value| {
            if value.ends_with(".org") {
                value.to_string()
            } else {
                "localhost".to_string()
            }
        });
        assert_eq!(checked, "example.org");
    }

    #[test]
    fn test_accessors_resolve_before_converting() {
        let config = from_str("base = 8000\n[s]\nport = %(base)s\n").unwrap();
        let port = config.section("s").key("port");

        assert_eq!(port.value(), "%(base)s");
        assert_eq!(port.parse::<u32>().unwrap(), 8000);
    }

    #[test]
    fn test_section_must_delegates_to_key() {
        let config = config();
        assert_eq!(config.section("server").must("port", 0u32), 8080);
        assert_eq!(config.section("server").string("missing"), "");
    }
}
