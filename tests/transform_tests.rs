use std::sync::Arc;

use ini_parser::{
    MAX_SUBSTITUTION_DEPTH, Manager, MapVariableHandler, Options, Source, TransformContext,
};

#[cfg(test)]
mod transform_tests {
    use super::*;

    fn variables(pairs: &[(&str, &str)]) -> Options {
        let handler: MapVariableHandler = pairs.iter().copied().collect();
        Options::default().with_variables(Arc::new(handler))
    }

    fn load(options: Options, text: &str) -> Manager {
        let manager = Manager::new(options);
        manager.append(Source::bytes(text)).unwrap();
        manager
    }

    #[test]
    fn test_reference_in_same_section() {
        let config = load(Options::default(), "[paths]\nroot = /a\nsub = %(root)s/b\n");
        assert_eq!(config.section("paths").string("sub"), "/a/b");
        assert_eq!(config.section("paths").key("sub").value(), "%(root)s/b");
    }

    #[test]
    fn test_reference_chain() {
        let text = "[p]\na = x\nb = %(a)s/y\nc = %(b)s/z\n";
        let config = load(Options::default(), text);
        assert_eq!(config.section("p").string("c"), "x/y/z");
    }

    #[test]
    fn test_reference_falls_back_to_default_section() {
        let text = "base = /srv\n[app]\ndata = %(base)s/data\n";
        let config = load(Options::default(), text);
        assert_eq!(config.section("app").string("data"), "/srv/data");
    }

    #[test]
    fn test_reference_through_parent_section() {
        let text = "[app]\nroot = /opt/app\n[app.logs]\ndir = %(root)s/logs\n";
        let config = load(Options::default(), text);
        assert_eq!(config.section("app.logs").string("dir"), "/opt/app/logs");
    }

    #[test]
    fn test_reference_uses_folded_names() {
        let options = Options {
            insensitive_keys: true,
            ..Options::default()
        };
        let config = load(options, "[s]\nRoot = /a\npath = %(ROOT)s/b\n");
        assert_eq!(config.section("s").string("path"), "/a/b");
    }

    #[test]
    fn test_cyclic_references_terminate() {
        let config = load(Options::default(), "[s]\na = %(b)s\nb = %(a)s\n");
        let value = config.section("s").string("a");
        assert!(value == "%(a)s" || value == "%(b)s", "got {value:?}");
    }

    #[test]
    fn test_growing_reference_is_bounded() {
        let text = "[s]\nx = y\nc = %(b)s\nb = %(x)s%(c)s\na = %(b)s\n";
        let config = load(Options::default(), text);
        let value = config.section("s").string("a");

        assert!(value.starts_with("yy"), "got {value:?}");
        assert!(value.contains("%("));
        assert!(value.matches('y').count() < MAX_SUBSTITUTION_DEPTH);
    }

    #[test]
    fn test_missing_reference_left_in_place() {
        let config = load(Options::default(), "[s]\nk = %(nope)s and %(k)s\n");
        assert_eq!(config.section("s").string("k"), "%(nope)s and %(k)s");
    }

    #[test]
    fn test_environment_force_mode() {
        let set = load(variables(&[("FOO", "bar")]), "k = ${FOO||baz}\n");
        assert_eq!(set.section("").string("k"), "bar");

        let empty = load(variables(&[("FOO", "")]), "k = ${FOO||baz}\n");
        assert_eq!(empty.section("").string("k"), "baz");

        let unset = load(variables(&[]), "k = ${FOO||baz}\n");
        assert_eq!(unset.section("").string("k"), "baz");
    }

    #[test]
    fn test_environment_keep_empty_mode() {
        let empty = load(variables(&[("FOO", "")]), "k = ${FOO??baz}\n");
        assert_eq!(empty.section("").string("k"), "");

        let unset = load(variables(&[]), "k = ${FOO??baz}\n");
        assert_eq!(unset.section("").string("k"), "baz");
    }

    #[test]
    fn test_environment_bare_marker() {
        let config = load(
            variables(&[("HOME", "/home/u")]),
            "a = ${HOME}/bin\nb = [${MISSING}]\n",
        );
        assert_eq!(config.section("").string("a"), "/home/u/bin");
        assert_eq!(config.section("").string("b"), "[]");
    }

    #[test]
    fn test_environment_default_is_trimmed_and_unquoted() {
        let config = load(variables(&[]), "k = ${X || 'a b' }\n");
        assert_eq!(config.section("").string("k"), "a b");
    }

    #[test]
    fn test_several_markers_in_one_value() {
        let config = load(
            variables(&[("USER", "ann"), ("HOST", "db")]),
            "url = ${USER}@${HOST}:${PORT||5432}\n",
        );
        assert_eq!(config.section("").string("url"), "ann@db:5432");
    }

    #[test]
    fn test_references_then_environment() {
        let config = load(
            variables(&[("DATA", "/data")]),
            "[s]\nroot = ${DATA}\ncache = %(root)s/cache\n",
        );
        assert_eq!(config.section("s").string("cache"), "/data/cache");
    }

    #[test]
    fn test_real_environment_is_the_default_handler() {
        let name = "INI_PARSER_TRANSFORM_TESTS_UNIQUE_VARIABLE";
        // SAFETY: the variable name is unique to this test
        unsafe { std::env::set_var(name, "from-env") };

        let config = load(Options::default(), &format!("k = ${{{name}}}\n"));
        assert_eq!(config.section("").string("k"), "from-env");

        unsafe { std::env::remove_var(name) };
    }

    fn expand_root(ctx: &TransformContext<'_>) -> String {
        ctx.key().value().replace("@root", "%(root)s")
    }

    #[test]
    fn test_transformer_runs_before_substitution() {
        let options = variables(&[("NAME", "svc")]).with_transformer(Arc::new(expand_root));
        let config = load(options, "[s]\nroot = /a\nk = ${NAME}-@root\n");

        assert_eq!(config.section("s").string("k"), "svc-/a");
        assert_eq!(config.section("s").key("k").value(), "${NAME}-@root");
    }

    fn section_label(ctx: &TransformContext<'_>) -> String {
        format!("{}:{}", ctx.section().name(), ctx.key().value())
    }

    #[test]
    fn test_transformer_sees_section() {
        let options = Options::default().with_transformer(Arc::new(section_label));
        let config = load(options, "[web]\nport = 80\n");
        assert_eq!(config.section("web").string("port"), "web:80");
    }
}
