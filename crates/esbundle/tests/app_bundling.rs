//! End-to-end bundling of a small app: a shell that lazily loads two pages
//! sharing a utility module.

use esbundle::{
    BundleError, BundleOutput, Bundler, BundlerOptions, DocumentUrl, InMemoryProvider,
    ast::{Code, ParsedModule},
    ast_builder::{
        code, const_decl, decl, dynamic_import, export_decl, expr, function_decl, import, text,
    },
};
use insta::assert_snapshot;
use pretty_assertions::assert_eq;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn page(title: &str) -> ParsedModule {
    ParsedModule::new(vec![
        import("./lib/util.js").named("format").build(),
        export_decl(const_decl("title", code(&format!("#format('{title}')")))),
    ])
}

fn app_provider() -> InMemoryProvider {
    let load = text("(page) {\n  return page === 'a' ? ")
        .then_dynamic(dynamic_import("./page-a.js"))
        .then_text(" : ")
        .then_dynamic(dynamic_import("./page-b.js"))
        .then_text(";\n}");

    InMemoryProvider::new()
        .with(
            "src/app-shell.js",
            ParsedModule::new(vec![
                import("./lib/router.js").named("navigate").build(),
                decl(function_decl("load", load)),
                expr(code("#navigate(#load);")),
            ])
            .with_nested_bindings(["page"]),
        )
        .with(
            "src/lib/router.js",
            ParsedModule::new(vec![export_decl(function_decl(
                "navigate",
                text("(load) {\n  return load();\n}"),
            ))])
            .with_nested_bindings(["load"]),
        )
        .with("src/page-a.js", page("A"))
        .with("src/page-b.js", page("B"))
        .with(
            "src/lib/util.js",
            ParsedModule::new(vec![export_decl(function_decl(
                "format",
                text("(text) {\n  return text.toUpperCase();\n}"),
            ))])
            .with_nested_bindings(["text"]),
        )
}

fn bundle_app(options: BundlerOptions) -> BundleOutput {
    init_logging();
    Bundler::new(options)
        .expect("options select a strategy")
        .bundle(&[DocumentUrl::new("src/app-shell.js")], &app_provider())
        .expect("app should bundle")
}

fn content<'a>(output: &'a BundleOutput, url: &str) -> &'a str {
    &output
        .documents
        .get(&DocumentUrl::new(url))
        .unwrap_or_else(|| panic!("{url} should be a bundle"))
        .content
}

const UTIL_CONTENT: &str = "function format(text) {
  return text.toUpperCase();
}

var util = {
  format: format
};
";

#[test]
fn test_shared_strategy_hoists_page_dependencies() {
    let output = bundle_app(BundlerOptions::default());

    assert_snapshot!(output.index.to_string(), @r"
    src/app-shell.js: src/app-shell.js, src/lib/router.js
    src/page-a.js: src/lib/util.js, src/page-a.js
    src/page-b.js: src/lib/util.js, src/page-b.js
    ");
    assert_snapshot!(output.manifest.to_string(), @r"
    src/app-shell.js: src/lib/router.js, src/app-shell.js
    src/page-a.js: src/page-a.js
    src/page-b.js: src/page-b.js
    src/shared_bundle_1.js: src/lib/util.js
    ");

    assert_eq!(
        content(&output, "src/app-shell.js"),
        "function navigate(load) {
  return load();
}

var router = {
  navigate: navigate
};

function load$1(page) {
  return page === 'a' ? import('./page-a.js').then(({ $page_a }) => $page_a) : import('./page-b.js').then(({ $page_b }) => $page_b);
}
navigate(load$1);

export { router as $router, navigate };
"
    );
    assert_eq!(
        content(&output, "src/page-a.js"),
        "import { format } from './shared_bundle_1.js';

const title = format('A');

var page_a = {
  title: title
};

export { page_a as $page_a, title };
"
    );
    assert_eq!(
        content(&output, "src/shared_bundle_1.js"),
        format!("{UTIL_CONTENT}\nexport {{ util as $util, format }};\n")
    );
}

#[test]
fn test_shell_strategy_merges_into_shell() {
    let options = BundlerOptions::from_toml_str(
        r#"
        strategy = "shell"
        shell = "src/app-shell.js"
        "#,
    )
    .expect("options parse");
    let output = bundle_app(options);

    assert_snapshot!(output.manifest.to_string(), @r"
    src/app-shell.js: src/lib/router.js, src/app-shell.js, src/lib/util.js
    src/page-a.js: src/page-a.js
    src/page-b.js: src/page-b.js
    ");
    assert_eq!(
        content(&output, "src/page-b.js"),
        "import { format } from './app-shell.js';

const title = format('B');

var page_b = {
  title: title
};

export { page_b as $page_b, title };
"
    );

    let shell = &output.documents[&DocumentUrl::new("src/app-shell.js")];
    assert!(shell.content.contains(UTIL_CONTENT));
    assert_eq!(shell.exports, ["$router", "$util", "navigate", "format"]);
}

#[test]
fn test_excluded_root_is_skipped() {
    init_logging();
    let options = BundlerOptions {
        exclude: vec![DocumentUrl::new("src/page-b.js")],
        ..BundlerOptions::default()
    };
    let output = Bundler::new(options)
        .expect("options select a strategy")
        .bundle(
            &[DocumentUrl::new("src/page-a.js"), DocumentUrl::new("src/page-b.js")],
            &app_provider(),
        )
        .expect("page-a should bundle alone");

    assert_snapshot!(output.manifest.to_string(), @"src/page-a.js: src/lib/util.js, src/page-a.js");
}

#[test]
fn test_manifest_serializes_to_toml() {
    let output = bundle_app(BundlerOptions::default());
    let serialized = output.manifest.to_toml_string().expect("manifest serializes");
    let table: toml::Table = serialized.parse().expect("manifest is valid TOML");

    let shared = &table["bundles"]["src/shared_bundle_1.js"];
    assert_eq!(shared["generated"].as_bool(), Some(true));
    assert_eq!(
        shared["members"].as_array().map(Vec::len),
        Some(1),
        "{serialized}"
    );
}

#[test]
fn test_unresolvable_import_is_reported() {
    init_logging();
    let provider = InMemoryProvider::new().with(
        "src/app.js",
        ParsedModule::new(vec![
            import("./missing.js").build(),
            expr(Code::default().then_text("start();")),
        ]),
    );
    let err = Bundler::new(BundlerOptions::default())
        .expect("options select a strategy")
        .bundle(&[DocumentUrl::new("src/app.js")], &provider)
        .expect_err("./missing.js does not resolve");

    assert!(
        matches!(&err, BundleError::Resolution { specifier, .. } if specifier == "./missing.js"),
        "unexpected error: {err}"
    );
}
