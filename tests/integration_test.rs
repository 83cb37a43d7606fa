use openapi_from_comments::{
    config::{BuildConfig, TemplateDelims},
    emitter::doc_template,
    error::{BuildError, ConfigError, ResolveError},
    generator::Generator,
    packages::PackageLister,
    runtime::{self, Spec},
    scanner::CrateRoot,
    serializer::{deserialize_json, deserialize_yaml, serialize_json},
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PETSTORE: &[(&str, &str)] = &[
    ("Cargo.toml", include_str!("fixtures/petstore/Cargo.toml")),
    ("src/main.rs", include_str!("fixtures/petstore/src/main.rs")),
    ("src/models.rs", include_str!("fixtures/petstore/src/models.rs")),
    ("src/handlers.rs", include_str!("fixtures/petstore/src/handlers.rs")),
];

/// Helper function to create a temporary test project
fn create_test_project(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    write_files(temp_dir.path(), files);
    temp_dir
}

fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let file_path = root.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
    }
}

fn config_for(project: &Path) -> BuildConfig {
    BuildConfig {
        search_dirs: vec![project.to_path_buf()],
        output_dir: project.join("docs"),
        package_name: Some("docs".to_string()),
        use_cargo_metadata: false,
        ..BuildConfig::default()
    }
}

fn read_json(path: PathBuf) -> Value {
    let text = fs::read_to_string(&path).expect("Failed to read generated file");
    serde_json::from_str(&text).expect("Generated JSON should parse")
}

fn assemble_json(config: BuildConfig) -> Value {
    let assembled = Generator::new(config).assemble().expect("Assembly failed");
    serde_json::to_value(&assembled.document).unwrap()
}

fn schema_ref(name: &str) -> Value {
    Value::String(format!("#/components/schemas/{}", name))
}

#[test]
fn test_petstore_end_to_end_generation() {
    let project = create_test_project(PETSTORE);
    let config = config_for(project.path());

    let summary = Generator::new(config).build().expect("Build failed");
    assert_eq!(summary.files_scanned, 3);
    assert_eq!(summary.files_parsed, 3);
    assert_eq!(summary.operations, 5);
    assert_eq!(summary.parse_errors, 0);
    assert_eq!(summary.artifacts.len(), 3);

    let docs = project.path().join("docs");
    assert!(docs.join("docs.rs").is_file());
    assert!(docs.join("openapi.yaml").is_file());
    let doc = read_json(docs.join("openapi.json"));

    assert_eq!(doc["openapi"], "3.0.3");
    assert_eq!(doc["info"]["title"], "Petstore API");
    assert_eq!(doc["info"]["version"], "1.0");
    assert_eq!(doc["info"]["description"], "Pets and the people who look after them.");
    assert_eq!(doc["servers"][0]["url"], "https://petstore.example.com/api/v1");
    assert_eq!(doc["tags"][0]["name"], "pets");
    assert_eq!(
        doc["components"]["securitySchemes"]["ApiKeyAuth"],
        serde_json::json!({"type": "apiKey", "name": "Authorization", "in": "header"})
    );

    let paths: Vec<&String> = doc["paths"].as_object().unwrap().keys().collect();
    assert_eq!(paths, vec!["/admin/purge", "/admin/stats", "/pets", "/pets/{id}"]);

    let get_pet = &doc["paths"]["/pets/{id}"]["get"];
    assert_eq!(get_pet["summary"], "Get a pet");
    assert_eq!(get_pet["parameters"][0]["name"], "id");
    assert_eq!(get_pet["parameters"][0]["in"], "path");
    assert_eq!(get_pet["parameters"][0]["required"], true);
    assert_eq!(get_pet["parameters"][0]["schema"]["type"], "integer");
    assert_eq!(get_pet["responses"]["404"]["description"], "Pet not found");

    let list_pets = &doc["paths"]["/pets"]["get"];
    let ids = &list_pets["parameters"][1];
    assert_eq!(ids["name"], "ids");
    assert_eq!(ids["in"], "query");
    assert_eq!(ids["style"], "form");
    assert_eq!(ids["explode"], false);
    assert_eq!(ids["schema"]["items"]["type"], "string");

    let purge = &doc["paths"]["/admin/purge"]["delete"];
    assert_eq!(purge["responses"]["204"]["description"], "No Content");

    let stats = &doc["paths"]["/admin/stats"]["get"];
    assert_eq!(stats["security"][0]["ApiKeyAuth"], serde_json::json!([]));
    let stats_schema = &stats["responses"]["200"]["content"]["application/json"]["schema"];
    assert_eq!(stats_schema["type"], "object");
    assert_eq!(stats_schema["additionalProperties"]["type"], "integer");
}

#[test]
fn test_aliased_import_and_qualified_path_share_one_schema() {
    let project = create_test_project(PETSTORE);
    let doc = assemble_json(config_for(project.path()));

    let by_alias =
        &doc["paths"]["/pets/{id}"]["get"]["responses"]["200"]["content"]["application/json"]["schema"]["$ref"];
    let by_path =
        &doc["paths"]["/pets"]["post"]["requestBody"]["content"]["application/json"]["schema"]["$ref"];
    let by_dotted =
        &doc["paths"]["/pets"]["post"]["responses"]["201"]["content"]["application/json"]["schema"]["$ref"];
    assert_eq!(by_alias, &schema_ref("models.Pet"));
    assert_eq!(by_path, &schema_ref("models.Pet"));
    assert_eq!(by_dotted, &schema_ref("models.Pet"));

    let schemas = doc["components"]["schemas"].as_object().unwrap();
    assert_eq!(schemas.keys().filter(|k| k.ends_with("Pet")).count(), 1);
}

#[test]
fn test_generic_instantiation_is_named_by_arguments() {
    let project = create_test_project(PETSTORE);
    let doc = assemble_json(config_for(project.path()));

    let list_ref =
        &doc["paths"]["/pets"]["get"]["responses"]["200"]["content"]["application/json"]["schema"]["$ref"];
    assert_eq!(list_ref, &schema_ref("models.Page[models.Pet]"));

    let page = &doc["components"]["schemas"]["models.Page[models.Pet]"];
    assert_eq!(page["properties"]["items"]["type"], "array");
    assert_eq!(page["properties"]["items"]["items"]["$ref"], schema_ref("models.Pet"));
    assert_eq!(page["properties"]["total"]["type"], "integer");
}

#[test]
fn test_flattened_struct_loses_to_direct_field() {
    let project = create_test_project(PETSTORE);
    let doc = assemble_json(config_for(project.path()));

    let pet = &doc["components"]["schemas"]["models.Pet"];
    assert_eq!(pet["description"], "A pet in the store.");
    let names: Vec<&String> = pet["properties"].as_object().unwrap().keys().collect();
    assert_eq!(names, vec!["id", "name", "tag", "created_at"]);
    assert_eq!(pet["properties"]["id"]["type"], "integer");
    assert_eq!(pet["properties"]["id"]["format"], "int64");
    assert_eq!(pet["properties"]["name"]["example"], "Rex");
    assert_eq!(pet["properties"]["tag"]["nullable"], true);
    assert!(doc["components"]["schemas"].get("models.Audit").is_none());
}

#[test]
fn test_tag_filter_with_exclusion() {
    let project = create_test_project(PETSTORE);
    let config = BuildConfig {
        tags: "admin,!internal".to_string(),
        ..config_for(project.path())
    };
    let doc = assemble_json(config);

    let mut routes = Vec::new();
    for (path, item) in doc["paths"].as_object().unwrap() {
        for method in item.as_object().unwrap().keys() {
            routes.push(format!("{} {}", method, path));
        }
    }
    assert_eq!(routes, vec!["get /admin/stats", "post /pets"]);
}

#[test]
fn test_template_delimiters_only_change_the_rust_module() {
    let project = create_test_project(PETSTORE);
    let default_config = config_for(project.path());
    let custom_config = BuildConfig {
        output_dir: project.path().join("docs-custom"),
        template_delims: TemplateDelims::parse("[[,]]").unwrap(),
        ..config_for(project.path())
    };
    Generator::new(default_config).build().unwrap();
    Generator::new(custom_config).build().unwrap();

    let default_dir = project.path().join("docs");
    let custom_dir = project.path().join("docs-custom");
    for file in ["openapi.json", "openapi.yaml"] {
        assert_eq!(
            fs::read_to_string(default_dir.join(file)).unwrap(),
            fs::read_to_string(custom_dir.join(file)).unwrap(),
            "{} should not depend on delimiters",
            file
        );
    }
    let default_module = fs::read_to_string(default_dir.join("docs.rs")).unwrap();
    let custom_module = fs::read_to_string(custom_dir.join("docs.rs")).unwrap();
    assert_ne!(default_module, custom_module);
    assert!(custom_module.contains("[[ title|tojson ]]"));
    assert!(default_module.contains("{{ title|tojson }}"));
}

#[test]
fn test_embedded_template_renders_the_document() {
    let project = create_test_project(PETSTORE);
    let config = config_for(project.path());
    let generator = Generator::new(config);
    let assembled = generator.assemble().unwrap();
    let delims = TemplateDelims::parse("[[,]]").unwrap();

    runtime::register(Spec {
        version: "1.0".to_string(),
        host: "petstore.example.com".to_string(),
        base_path: "/api/v1".to_string(),
        schemes: vec!["https".to_string()],
        title: "Petstore API".to_string(),
        description: "Pets and the people who look after them.".to_string(),
        instance_name: "integration_petstore".to_string(),
        left_delim: delims.left.clone(),
        right_delim: delims.right.clone(),
        template: doc_template(&assembled.document, &delims).unwrap(),
    })
    .unwrap();

    let rendered = runtime::read_doc(Some("integration_petstore")).unwrap();
    let from_runtime: Value = serde_json::from_str(&rendered).unwrap();
    let built = serde_json::to_value(&assembled.document).unwrap();
    assert_eq!(from_runtime, built);
}

#[test]
fn test_round_trip_of_written_documents() {
    let project = create_test_project(PETSTORE);
    let config = config_for(project.path());
    let generator = Generator::new(config);
    let assembled = generator.assemble().unwrap();
    generator.build().unwrap();

    let docs = project.path().join("docs");
    let from_json = deserialize_json(&fs::read_to_string(docs.join("openapi.json")).unwrap()).unwrap();
    let from_yaml = deserialize_yaml(&fs::read_to_string(docs.join("openapi.yaml")).unwrap()).unwrap();
    assert_eq!(from_json, assembled.document);
    assert_eq!(from_yaml, assembled.document);
    assert_eq!(
        serialize_json(&from_json).unwrap(),
        serialize_json(&assembled.document).unwrap()
    );
}

#[test]
fn test_builds_are_byte_identical() {
    let project = create_test_project(PETSTORE);
    let first = BuildConfig {
        output_dir: project.path().join("first"),
        ..config_for(project.path())
    };
    let second = BuildConfig {
        output_dir: project.path().join("second"),
        ..config_for(project.path())
    };
    Generator::new(first).build().unwrap();
    Generator::new(second).build().unwrap();

    for file in ["docs.rs", "openapi.json", "openapi.yaml"] {
        let a = fs::read(project.path().join("first").join(file)).unwrap();
        let b = fs::read(project.path().join("second").join(file)).unwrap();
        assert!(a == b, "{} differs between builds", file);
    }
}

#[test]
fn test_openapi_3_1_document() {
    let project = create_test_project(PETSTORE);
    let config = BuildConfig {
        openapi_3_1: true,
        ..config_for(project.path())
    };
    let doc = assemble_json(config);

    assert_eq!(doc["openapi"], "3.1.0");
    let tag = &doc["components"]["schemas"]["models.Pet"]["properties"]["tag"];
    assert_eq!(tag["type"], serde_json::json!(["string", "null"]));
    assert!(tag.get("nullable").is_none());
}

const BROKEN_HANDLER: &str = r#"
/// @Summary Broken
/// @Param id path
/// @Router /broken [get]
pub async fn broken() {}
"#;

#[test]
fn test_annotation_errors_warn_or_fail_in_strict_mode() {
    let project = create_test_project(PETSTORE);
    write_files(project.path(), &[("src/broken.rs", BROKEN_HANDLER)]);

    let lenient = Generator::new(config_for(project.path())).assemble().unwrap();
    assert_eq!(lenient.summary.parse_errors, 1);

    let strict = BuildConfig {
        strict: true,
        ..config_for(project.path())
    };
    match Generator::new(strict).build() {
        Err(BuildError::Parse(errors)) => assert_eq!(errors.len(), 1),
        other => panic!("expected a parse error, got {:?}", other),
    }
    assert!(!project.path().join("docs").exists());
}

#[test]
fn test_syntax_errors_skip_files_but_fail_for_the_main_file() {
    let project = create_test_project(PETSTORE);
    write_files(project.path(), &[("src/garbage.rs", "pub fn (")]);
    let summary = Generator::new(config_for(project.path())).build().unwrap();
    assert_eq!(summary.files_scanned, 4);
    assert_eq!(summary.files_parsed, 3);
    assert_eq!(summary.operations, 5);

    let broken_main = create_test_project(PETSTORE);
    write_files(broken_main.path(), &[("src/main.rs", "//! @title Broken\nfn main( {")]);
    let result = Generator::new(config_for(broken_main.path())).build();
    assert!(matches!(result, Err(BuildError::Syntax { .. })));
}

#[test]
fn test_missing_main_file_is_a_config_error() {
    let project = create_test_project(&[("src/lib.rs", "pub struct Empty;")]);
    let result = Generator::new(config_for(project.path())).build();
    assert!(matches!(
        result,
        Err(BuildError::Config(ConfigError::MainFileNotFound(_)))
    ));
}

#[test]
fn test_unknown_response_type_is_unresolved() {
    let project = create_test_project(PETSTORE);
    write_files(
        project.path(),
        &[(
            "src/orders.rs",
            r#"
            /// @Success 200 {object} models.Order
            /// @Router /orders [get]
            pub async fn list_orders() {}
            "#,
        )],
    );
    let result = Generator::new(config_for(project.path())).assemble();
    match result {
        Err(BuildError::Resolve(ResolveError::UnresolvedReference { reference, .. })) => {
            assert!(reference.contains("Order"), "unexpected reference {}", reference)
        }
        other => panic!("expected an unresolved reference, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_parse_extension_keeps_marked_operations() {
    let project = create_test_project(PETSTORE);
    write_files(
        project.path(),
        &[(
            "src/beta.rs",
            r#"
            /// @Summary Beta feature
            /// @x-beta true
            /// @Router /beta [get]
            pub async fn beta() {}
            "#,
        )],
    );
    let config = BuildConfig {
        parse_extension: Some("beta".to_string()),
        ..config_for(project.path())
    };
    let doc = assemble_json(config);

    let paths: Vec<&String> = doc["paths"].as_object().unwrap().keys().collect();
    assert_eq!(paths, vec!["/beta"]);
    assert_eq!(doc["paths"]["/beta"]["get"]["x-beta"], true);
}

struct FixedLister(Vec<CrateRoot>);

impl PackageLister for FixedLister {
    fn list(&self, _root: &Path, _max_depth: usize) -> anyhow::Result<Vec<CrateRoot>> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_types_from_dependency_crates() {
    let workspace = TempDir::new().unwrap();
    let project = workspace.path().join("petstore");
    let shared = workspace.path().join("shared");
    write_files(&project, PETSTORE);
    write_files(
        &project,
        &[(
            "src/billing.rs",
            r#"
            /// @Summary Account balance
            /// @Success 200 {object} shared_types::Money
            /// @Router /balance [get]
            pub async fn balance() {}
            "#,
        )],
    );
    write_files(
        &shared,
        &[
            ("Cargo.toml", include_str!("fixtures/shared/Cargo.toml")),
            ("src/lib.rs", include_str!("fixtures/shared/src/lib.rs")),
        ],
    );

    let config = BuildConfig {
        parse_dependency: true,
        ..config_for(&project)
    };
    let generator = Generator::new(config)
        .with_lister(Box::new(FixedLister(vec![CrateRoot::from_dir(&shared, 1)])));
    let assembled = generator.assemble().unwrap();
    let doc = serde_json::to_value(&assembled.document).unwrap();

    let balance =
        &doc["paths"]["/balance"]["get"]["responses"]["200"]["content"]["application/json"]["schema"]["$ref"];
    assert_eq!(balance, &schema_ref("shared_types.Money"));
    let money = &doc["components"]["schemas"]["shared_types.Money"];
    assert_eq!(money["properties"]["currency"]["type"], "string");

    // Without dependency parsing the type cannot be found
    let without = Generator::new(config_for(&project)).assemble();
    assert!(matches!(without, Err(BuildError::Resolve(_))));
}

#[test]
fn test_colliding_canonical_names_are_ambiguous() {
    let project = create_test_project(PETSTORE);
    write_files(
        project.path(),
        &[
            ("src/billing/model.rs", "pub struct Id { pub value: i64 }"),
            ("src/shipping/model.rs", "pub struct Id { pub value: String }"),
            (
                "src/ids.rs",
                r#"
                /// @Success 200 {object} crate::billing::model::Id
                /// @Router /billing/id [get]
                pub async fn billing_id() {}

                /// @Success 200 {object} crate::shipping::model::Id
                /// @Router /shipping/id [get]
                pub async fn shipping_id() {}
                "#,
            ),
        ],
    );

    for _ in 0..3 {
        match Generator::new(config_for(project.path())).assemble() {
            Err(BuildError::Resolve(ResolveError::AmbiguousName { name, first, second })) => {
                assert_eq!(name, "model.Id");
                assert_eq!(first, "petstore::billing::model::Id");
                assert_eq!(second, "petstore::shipping::model::Id");
            }
            other => panic!("expected an ambiguous name, got {:?}", other.map(|_| ())),
        }
    }
}
