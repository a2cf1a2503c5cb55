use clap::Parser;
use openapi_from_routes::{
    cli::{self, CliArgs},
    config::{ProjectLayout, RunConfig},
    model_gen::GENERATED_BANNER,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

const CONFIG: &str = r#"_output: identrust.json
_files:
  - ./src/api/identrust/*.ts
  - ./src/api/policyTemplates/*.ts
openapi: 3.0.0
info:
  title: Identrust API
servers:
  - url: https://api.example.com
"#;

const HIDDEN_ROUTE: &str = r#"/**
 * openapi: false
 */
router.delete("/:id", async (req: TypedRequestUserPath<{ id: string }>, res: TypedResponse<AccountRes>) => {
});
"#;

const INVOICE_ROUTE: &str = r#"router.get("/:id", async (req: TypedRequestUserPath<{ id: string }>, res: TypedResponse<Invoice>) => {
});
"#;

fn fragment(name: &str, definition: Value) -> String {
    serde_json::to_string_pretty(&json!({"components": {"schemas": {name: definition}}}))
        .expect("Failed to serialize fragment")
}

/// Helper function to create a temporary test project
fn create_test_project(files: Vec<(&str, String)>) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write test file");
    }

    temp_dir
}

fn identrust_project() -> TempDir {
    create_test_project(vec![
        ("package.json", r#"{"name": "identrust", "version": "3.1.4"}"#.to_string()),
        ("identrust.yaml", CONFIG.to_string()),
        ("src/api/identrust/index.ts", "router.use(\"/identrust\", identrust);\n".to_string()),
        ("src/api/identrust/getAccount.ts", include_str!("fixtures/get_account.ts").to_string()),
        ("src/api/identrust/createAccount.ts", include_str!("fixtures/create_account.ts").to_string()),
        ("src/api/identrust/deleteAccount.ts", HIDDEN_ROUTE.to_string()),
        ("src/api/policyTemplates/listTemplates.ts", include_str!("fixtures/list_templates.ts").to_string()),
        ("src/api/billing/getInvoice.ts", INVOICE_ROUTE.to_string()),
        (
            "src/schemas/account.ts",
            "export interface Account {\n  id: string;\n  owner: User;\n}\n".to_string(),
        ),
        (
            "src/schemas/accountRes.ts",
            "import { Account } from \"./account\";\n\nexport interface AccountRes extends Account {\n  token: string;\n}\n"
                .to_string(),
        ),
        (
            "src/schemas/accountStatus.ts",
            "export enum AccountStatus {\n  Active = \"active\",\n  Closed = \"closed\",\n}\n".to_string(),
        ),
        (
            "build/account.json",
            fragment(
                "Account",
                json!({
                    "title": "Account",
                    "type": "object",
                    "properties": {
                        "id": {"title": "Account.id", "type": "string", "description": "Identifier\n@format : uuid"},
                        "owner": {"title": "Account.owner", "$ref": "#/components/schemas/User"},
                        "status": {"title": "Account.status", "$ref": "#/components/schemas/AccountStatus"}
                    },
                    "required": ["id"]
                }),
            ),
        ),
        (
            "build/accountRes.json",
            fragment(
                "AccountRes",
                json!({
                    "title": "AccountRes",
                    "type": "object",
                    "properties": {"token": {"title": "AccountRes.token", "type": "string"}},
                    "required": ["token"]
                }),
            ),
        ),
        (
            "build/user.json",
            fragment(
                "User",
                json!({"title": "User", "type": "object", "properties": {"name": {"title": "User.name", "type": "string"}}}),
            ),
        ),
        (
            "build/resultError.json",
            fragment(
                "ResultError",
                json!({"title": "ResultError", "type": "object", "properties": {"message": {"title": "ResultError.message", "type": "string"}}}),
            ),
        ),
        (
            "build/policyTemplate.json",
            fragment(
                "PolicyTemplate",
                json!({"title": "PolicyTemplate", "type": "object", "properties": {"name": {"title": "PolicyTemplate.name", "type": "string"}}}),
            ),
        ),
        (
            "build/invoice.json",
            fragment("Invoice", json!({"title": "Invoice", "type": "object", "properties": {}})),
        ),
        ("build/openapi.json", "previous output, not a fragment".to_string()),
    ])
}

fn run_cli(root: &Path, extra: &[&str]) -> anyhow::Result<()> {
    let root = root.to_string_lossy().to_string();
    let mut argv = vec!["openapi-from-routes", "--root", root.as_str()];
    argv.extend_from_slice(extra);
    let args = CliArgs::try_parse_from(argv).expect("Failed to parse arguments");
    cli::run(args)
}

fn read_output(root: &Path, name: &str) -> Value {
    let content = std::fs::read_to_string(root.join("swagger").join(name)).expect("Output should be written");
    serde_json::from_str(&content).expect("Output should be valid JSON")
}

#[test]
fn test_end_to_end_document() {
    let project = identrust_project();
    let root = project.path();
    let config = root.join("identrust.yaml");

    run_cli(root, &[config.to_str().unwrap()]).expect("Generation should succeed");
    let document = read_output(root, "identrust.json");

    assert_eq!(document["openapi"], json!("3.0.0"));
    assert_eq!(document["info"], json!({"title": "Identrust API", "version": "3.1.4"}));
    assert_eq!(document["servers"], json!([{"url": "https://api.example.com"}]));
    assert_eq!(document["security"], json!([{"OAuth2AuthorizationCodeBearer": []}]));

    let paths: Vec<&String> = document["paths"].as_object().unwrap().keys().collect();
    assert_eq!(paths, vec!["/identrust/", "/identrust/{id}", "/policytemplates/"]);

    assert_eq!(
        document["paths"]["/identrust/{id}"],
        json!({
            "get": {
                "tags": ["Identrust"],
                "summary": "Fetch one account",
                "parameters": [{
                    "name": "id",
                    "in": "path",
                    "required": true,
                    "description": "Account identifier",
                    "schema": {"type": "string", "format": "uuid"}
                }],
                "responses": {
                    "200": {
                        "description": "The account",
                        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/AccountRes"}}}
                    },
                    "401": {
                        "description": "NotAuthorizedError",
                        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ResultError"}}}
                    },
                    "404": {
                        "description": "NotFoundError",
                        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ResultError"}}}
                    }
                }
            }
        })
    );

    let create = &document["paths"]["/identrust/"]["post"];
    assert_eq!(create["tags"], json!(["Accounts"]));
    assert_eq!(create["security"], json!([]));
    assert_eq!(
        create["requestBody"],
        json!({
            "description": "Account to create",
            "required": true,
            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/AccountCreate"}}}
        })
    );
    let codes: Vec<&String> = create["responses"].as_object().unwrap().keys().collect();
    assert_eq!(codes, vec!["200", "201", "422"]);

    let list = &document["paths"]["/policytemplates/"]["get"];
    assert!(list.get("tags").is_none());
    assert_eq!(
        list["responses"]["200"]["content"]["application/json"]["schema"],
        json!({"type": "array", "items": {"$ref": "#/components/schemas/PolicyTemplate"}})
    );
    assert_eq!(
        list["parameters"],
        json!([
            {"name": "limit", "in": "query", "required": false, "description": "Page size", "schema": {"type": "integer"}},
            {"name": "cursor", "in": "query", "required": false, "schema": {"type": "string"}}
        ])
    );
}

#[test]
fn test_schema_closure_and_cleanup() {
    let project = identrust_project();
    let root = project.path();
    let config = root.join("identrust.yaml");

    run_cli(root, &[config.to_str().unwrap()]).expect("Generation should succeed");
    let document = read_output(root, "identrust.json");
    let schemas = &document["components"]["schemas"];

    let names: Vec<&String> = schemas.as_object().unwrap().keys().collect();
    assert_eq!(
        names,
        vec!["Account", "AccountRes", "AccountStatus", "PolicyTemplate", "ResultError", "User"]
    );

    assert_eq!(
        schemas["Account"]["properties"]["id"],
        json!({"type": "string", "format": "uuid", "description": "Identifier"})
    );
    assert!(schemas["Account"].get("title").is_none());
    assert_eq!(
        schemas["AccountStatus"],
        json!({"type": "string", "enum": ["active", "closed"]})
    );

    // Inherited from Account by the patch pass
    let account_res = &schemas["AccountRes"];
    let properties: Vec<&String> = account_res["properties"].as_object().unwrap().keys().collect();
    assert_eq!(properties, vec!["id", "owner", "status", "token"]);
    assert_eq!(account_res["required"], json!(["token", "id"]));
    assert_eq!(
        document["components"]["securitySchemes"]["OAuth2AuthorizationCodeBearer"]["flows"]["authorizationCode"]["tokenUrl"],
        json!("/token")
    );
}

#[test]
fn test_generation_is_idempotent() {
    let project = identrust_project();
    let root = project.path();
    let config = root.join("identrust.yaml");
    let output = root.join("swagger").join("identrust.json");

    run_cli(root, &[config.to_str().unwrap()]).expect("First run should succeed");
    let first = std::fs::read_to_string(&output).unwrap();
    run_cli(root, &[config.to_str().unwrap()]).expect("Second run should succeed");
    let second = std::fs::read_to_string(&output).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_failed_configuration_does_not_stop_the_others() {
    let project = identrust_project();
    let root = project.path();
    std::fs::write(root.join("broken.yaml"), "_files: [./src/api/identrust/*.ts]\n").unwrap();
    let broken = root.join("broken.yaml");
    let config = root.join("identrust.yaml");

    let result = run_cli(root, &[broken.to_str().unwrap(), config.to_str().unwrap()]);

    assert!(result.is_err());
    assert!(root.join("swagger").join("identrust.json").exists());
}

#[test]
fn test_yaml_output() {
    let project = identrust_project();
    let root = project.path();
    std::fs::write(
        root.join("templates.yaml"),
        "_output: templates.yaml\n_files: [./src/api/policyTemplates/]\ninfo:\n  title: Templates\n",
    )
    .unwrap();
    let config = root.join("templates.yaml");

    let layout = ProjectLayout::new(root);
    let summary = cli::build_from_config(&config, &layout).expect("Generation should succeed");

    assert_eq!(summary.routes, 1);
    assert_eq!(summary.output, root.join("swagger").join("templates.yaml"));
    let content = std::fs::read_to_string(&summary.output).unwrap();
    let document: serde_yaml::Value = serde_yaml::from_str(&content).unwrap();
    assert_eq!(document["info"]["title"].as_str(), Some("Templates"));
    assert!(document["paths"]["/policytemplates/"]["get"].is_mapping());
}

#[test]
fn test_missing_schemas_are_reported() {
    let project = identrust_project();
    let root = project.path();
    let layout = ProjectLayout::new(root);
    let config = root.join("identrust.yaml");

    let summary = cli::build_from_config(&config, &layout).expect("Generation should succeed");

    assert_eq!(summary.routes, 3);
    assert_eq!(summary.missing_schemas, vec!["AccountCreate".to_string()]);
    assert!(RunConfig::load(&config).is_ok());
}

#[test]
fn test_models_command() {
    let project = create_test_project(vec![
        ("src/models/item.ts", include_str!("fixtures/item_model.ts").to_string()),
        (
            "src/schemas/timestamps.ts",
            "export interface Timestamps {\n  createdAt: string;\n  updatedAt?: string;\n}\n".to_string(),
        ),
    ]);
    let root = project.path();

    run_cli(root, &["models"]).expect("Generation should succeed");

    let item = std::fs::read_to_string(root.join("src/schemas/item.ts")).unwrap();
    let expected = format!(
        "{}{}",
        GENERATED_BANNER,
        r#"import { ItemStatus } from "./itemStatus";
import { Timestamps } from "./timestamps";
import { User } from "./user";

/**
 * A stored item.
 */
export interface Item extends Timestamps {
  /**
   * Item identifier
   */
  id: string;
  owner: User | null;
  labels: string[];
  status: ItemStatus;
}
"#
    );
    assert_eq!(item, expected);

    let status = std::fs::read_to_string(root.join("src/schemas/itemStatus.ts")).unwrap();
    assert!(status.starts_with(GENERATED_BANNER));
    assert!(status.ends_with("export enum ItemStatus {\n  Active = \"active\",\n  Archived = \"archived\",\n}\n"));
}

#[test]
fn test_no_configurations_prints_help() {
    let project = TempDir::new().unwrap();
    assert!(run_cli(project.path(), &[]).is_ok());
}
