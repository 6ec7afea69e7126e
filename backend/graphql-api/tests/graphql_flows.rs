//! End-to-end GraphQL flows against the schema with the in-memory directory.

use std::sync::Arc;
use std::time::Duration;

use async_graphql::Request;
use futures_util::StreamExt;
use serde_json::Value;
use uuid::Uuid;

use graphql_api::bus::NotificationBus;
use graphql_api::db::{memory::MemoryDirectory, UserDirectory};
use graphql_api::models::ProductRecord;
use graphql_api::schema::{auth::SessionCookie, build_schema, AppSchema};
use graphql_api::security::TokenService;

const SECRET: &str = "integration-test-secret";

fn schema_with(directory: Arc<MemoryDirectory>) -> AppSchema {
    let directory: Arc<dyn UserDirectory> = directory;
    build_schema(
        directory,
        Arc::new(NotificationBus::new(64)),
        TokenService::new(SECRET, 3600),
    )
}

fn schema() -> AppSchema {
    schema_with(Arc::new(MemoryDirectory::new()))
}

async fn data(schema: &AppSchema, query: &str) -> Value {
    let resp = schema.execute(query).await;
    assert!(resp.errors.is_empty(), "unexpected errors: {:?}", resp.errors);
    resp.data.into_json().unwrap()
}

fn error_code(resp: &async_graphql::Response) -> String {
    let err = serde_json::to_value(&resp.errors[0]).unwrap();
    err["extensions"]["code"].as_str().unwrap_or_default().to_string()
}

async fn signup_ana(schema: &AppSchema) -> Value {
    data(
        schema,
        r#"mutation {
            signup(input: { name: "Ana", email: "ana@x.com", password: "wonderwall" }) {
                token
                user { id name email }
            }
        }"#,
    )
    .await
}

#[tokio::test]
async fn signup_returns_token_and_user_without_password() {
    let schema = schema();
    let data = signup_ana(&schema).await;

    let payload = &data["signup"];
    assert!(!payload["token"].as_str().unwrap().is_empty());
    assert_eq!(payload["user"]["email"], "ana@x.com");
    assert_eq!(payload["user"]["name"], "Ana");
    Uuid::parse_str(payload["user"]["id"].as_str().unwrap()).unwrap();

    // no password field anywhere in the response
    assert!(!data.to_string().to_lowercase().contains("password"));
}

#[tokio::test]
async fn signup_rejects_duplicate_email() {
    let schema = schema();
    signup_ana(&schema).await;

    let resp = schema
        .execute(
            r#"mutation {
                signup(input: { name: "Ana Two", email: "ana@x.com", password: "wonderwall" }) {
                    token
                }
            }"#,
        )
        .await;
    assert!(!resp.errors.is_empty());
    assert_eq!(error_code(&resp), "VALIDATION_ERROR");
}

#[tokio::test]
async fn login_unknown_email_fails_without_cookie() {
    let schema = schema();

    let resp = schema
        .execute(
            r#"mutation {
                login(input: { email: "nobody@x.com", password: "whatever" }) { token }
            }"#,
        )
        .await;

    assert!(!resp.errors.is_empty());
    assert_eq!(error_code(&resp), "AUTHENTICATION_ERROR");
    assert!(resp.http_headers.get("set-cookie").is_none());
}

#[tokio::test]
async fn login_wrong_password_fails_without_cookie() {
    let schema = schema();
    signup_ana(&schema).await;

    let resp = schema
        .execute(
            r#"mutation {
                login(input: { email: "ana@x.com", password: "not-the-password" }) { token }
            }"#,
        )
        .await;

    assert!(!resp.errors.is_empty());
    assert_eq!(error_code(&resp), "AUTHENTICATION_ERROR");
    assert!(resp.http_headers.get("set-cookie").is_none());
}

#[tokio::test]
async fn login_sets_http_only_session_cookie() {
    let schema = schema();
    signup_ana(&schema).await;

    let resp = schema
        .execute(
            r#"mutation {
                login(input: { email: "ana@x.com", password: "wonderwall" }) {
                    token
                    user { email }
                }
            }"#,
        )
        .await;
    assert!(resp.errors.is_empty(), "{:?}", resp.errors);

    let cookie = resp
        .http_headers
        .get("set-cookie")
        .expect("login must set a cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Expires="));
    assert!(!cookie.contains("Secure"));

    let data = resp.data.into_json().unwrap();
    let token = data["login"]["token"].as_str().unwrap();
    assert!(cookie.contains(token));
}

#[tokio::test]
async fn me_without_cookie_is_an_authentication_error() {
    let schema = schema();

    let resp = schema
        .execute(Request::new("{ me { id } }").data(SessionCookie(None)))
        .await;
    assert!(!resp.errors.is_empty());
    assert_eq!(error_code(&resp), "AUTHENTICATION_ERROR");
}

#[tokio::test]
async fn me_with_garbage_token_is_an_authentication_error() {
    let schema = schema();

    let resp = schema
        .execute(
            Request::new("{ me { id } }").data(SessionCookie(Some("not.a.token".to_string()))),
        )
        .await;
    assert!(!resp.errors.is_empty());
    assert_eq!(error_code(&resp), "AUTHENTICATION_ERROR");
}

#[tokio::test]
async fn me_answers_from_the_token_snapshot() {
    let schema = schema();
    let signup = signup_ana(&schema).await;
    let token = signup["signup"]["token"].as_str().unwrap().to_string();

    let resp = schema
        .execute(Request::new("{ me { id name email } }").data(SessionCookie(Some(token))))
        .await;
    assert!(resp.errors.is_empty(), "{:?}", resp.errors);

    let data = resp.data.into_json().unwrap();
    assert_eq!(data["me"]["email"], "ana@x.com");
    assert_eq!(data["me"]["id"], signup["signup"]["user"]["id"]);
}

#[tokio::test]
async fn get_user_miss_resolves_to_null() {
    let schema = schema();
    let data = data(
        &schema,
        r#"{ getUser(id: "550e8400-e29b-41d4-a716-446655440000") { id } }"#,
    )
    .await;
    assert!(data["getUser"].is_null());
}

#[tokio::test]
async fn get_users_lists_created_users() {
    let schema = schema();
    data(
        &schema,
        r#"mutation { createUser(input: { name: "Ana", email: "ana@x.com", password: "wonderwall" }) { id } }"#,
    )
    .await;
    data(
        &schema,
        r#"mutation { createUser(input: { name: "Bo", email: "bo@x.com", password: "wonderwall" }) { id } }"#,
    )
    .await;

    let data = data(&schema, "{ getUsers { email } }").await;
    let users = data["getUsers"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["email"], "ana@x.com");
    assert_eq!(users[1]["email"], "bo@x.com");
}

#[tokio::test]
async fn update_user_returns_the_updated_entity() {
    let schema = schema();
    let created = data(
        &schema,
        r#"mutation { createUser(input: { name: "Ana", email: "ana@x.com", password: "wonderwall" }) { id } }"#,
    )
    .await;
    let id = created["createUser"]["id"].as_str().unwrap().to_string();

    let updated = data(
        &schema,
        &format!(
            r#"mutation {{ updateUser(input: {{ id: "{}", name: "Ana Maria" }}) {{ id name email }} }}"#,
            id
        ),
    )
    .await;

    assert_eq!(updated["updateUser"]["id"].as_str().unwrap(), id);
    assert_eq!(updated["updateUser"]["name"], "Ana Maria");
    // untouched fields survive the update
    assert_eq!(updated["updateUser"]["email"], "ana@x.com");
}

#[tokio::test]
async fn update_user_rejects_email_of_another_user() {
    let schema = schema();
    data(
        &schema,
        r#"mutation { createUser(input: { name: "Ana", email: "ana@x.com", password: "wonderwall" }) { id } }"#,
    )
    .await;
    let bo = data(
        &schema,
        r#"mutation { createUser(input: { name: "Bo", email: "bo@x.com", password: "wonderwall" }) { id } }"#,
    )
    .await;
    let bo_id = bo["createUser"]["id"].as_str().unwrap().to_string();

    let resp = schema
        .execute(&format!(
            r#"mutation {{ updateUser(input: {{ id: "{}", email: "ana@x.com" }}) {{ id }} }}"#,
            bo_id
        ))
        .await;
    assert!(!resp.errors.is_empty());
    assert_eq!(error_code(&resp), "VALIDATION_ERROR");

    // Bo keeps the original address
    let after = data(&schema, "{ getUsers { email } }").await;
    let emails: Vec<&str> = after["getUsers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap())
        .collect();
    assert_eq!(emails, vec!["ana@x.com", "bo@x.com"]);
}

#[tokio::test]
async fn update_missing_user_is_not_found() {
    let schema = schema();

    let resp = schema
        .execute(
            r#"mutation {
                updateUser(input: { id: "550e8400-e29b-41d4-a716-446655440000", name: "Ghost" }) { id }
            }"#,
        )
        .await;
    assert!(!resp.errors.is_empty());
    assert_eq!(error_code(&resp), "NOT_FOUND");
}

#[tokio::test]
async fn delete_missing_user_returns_false_without_error() {
    let schema = schema();
    let data = data(
        &schema,
        r#"mutation { deleteUser(id: "550e8400-e29b-41d4-a716-446655440000") }"#,
    )
    .await;
    assert_eq!(data["deleteUser"], false);
}

#[tokio::test]
async fn delete_existing_user_returns_true() {
    let schema = schema();
    let created = data(
        &schema,
        r#"mutation { createUser(input: { name: "Ana", email: "ana@x.com", password: "wonderwall" }) { id } }"#,
    )
    .await;
    let id = created["createUser"]["id"].as_str().unwrap().to_string();

    let deleted = data(&schema, &format!(r#"mutation {{ deleteUser(id: "{}") }}"#, id)).await;
    assert_eq!(deleted["deleteUser"], true);

    let gone = data(&schema, &format!(r#"{{ getUser(id: "{}") {{ id }} }}"#, id)).await;
    assert!(gone["getUser"].is_null());
}

#[tokio::test]
async fn create_user_delivers_exactly_one_user_created_event() {
    let schema = schema();

    let mut stream = schema.execute_stream("subscription { userCreated { id email } }");
    let listener = tokio::spawn(async move {
        let first = stream.next().await;
        let second = tokio::time::timeout(Duration::from_millis(200), stream.next())
            .await
            .ok()
            .flatten();
        (first, second)
    });

    // give the subscription a chance to register before mutating
    tokio::time::sleep(Duration::from_millis(100)).await;

    let created = data(
        &schema,
        r#"mutation { createUser(input: { name: "Ana", email: "ana@x.com", password: "wonderwall" }) { id } }"#,
    )
    .await;
    let id = created["createUser"]["id"].as_str().unwrap().to_string();

    let (first, second) = listener.await.unwrap();
    let event = first.expect("subscriber must receive the event");
    assert!(event.errors.is_empty(), "{:?}", event.errors);

    let event_data = event.data.into_json().unwrap();
    assert_eq!(event_data["userCreated"]["id"].as_str().unwrap(), id);
    assert_eq!(event_data["userCreated"]["email"], "ana@x.com");

    assert!(second.is_none(), "exactly one event expected");
}

#[tokio::test]
async fn delete_user_delivers_the_deleted_id() {
    let schema = schema();
    let created = data(
        &schema,
        r#"mutation { createUser(input: { name: "Ana", email: "ana@x.com", password: "wonderwall" }) { id } }"#,
    )
    .await;
    let id = created["createUser"]["id"].as_str().unwrap().to_string();

    let mut stream = schema.execute_stream("subscription { userDeleted }");
    let listener = tokio::spawn(async move { stream.next().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    data(&schema, &format!(r#"mutation {{ deleteUser(id: "{}") }}"#, id)).await;

    let event = listener.await.unwrap().expect("event expected");
    let event_data = event.data.into_json().unwrap();
    assert_eq!(event_data["userDeleted"].as_str().unwrap(), id);
}

#[tokio::test]
async fn update_user_delivers_the_fresh_entity() {
    let schema = schema();
    let created = data(
        &schema,
        r#"mutation { createUser(input: { name: "Ana", email: "ana@x.com", password: "wonderwall" }) { id } }"#,
    )
    .await;
    let id = created["createUser"]["id"].as_str().unwrap().to_string();

    let mut stream = schema.execute_stream("subscription { userUpdated { id name } }");
    let listener = tokio::spawn(async move { stream.next().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    data(
        &schema,
        &format!(
            r#"mutation {{ updateUser(input: {{ id: "{}", name: "Ana Maria" }}) {{ id }} }}"#,
            id
        ),
    )
    .await;

    let event = listener.await.unwrap().expect("event expected");
    let event_data = event.data.into_json().unwrap();
    assert_eq!(event_data["userUpdated"]["id"].as_str().unwrap(), id);
    assert_eq!(event_data["userUpdated"]["name"], "Ana Maria");
}

#[tokio::test]
async fn user_relation_fields_resolve_through_the_directory() {
    let directory = Arc::new(MemoryDirectory::new());
    let schema = schema_with(directory.clone());

    let created = data(
        &schema,
        r#"mutation { createUser(input: { name: "Ana", email: "ana@x.com", password: "wonderwall" }) { id } }"#,
    )
    .await;
    let id = Uuid::parse_str(created["createUser"]["id"].as_str().unwrap()).unwrap();

    directory
        .add_product(ProductRecord {
            id: Uuid::new_v4(),
            user_id: id,
            name: "Espresso machine".to_string(),
            price: 249.9,
        })
        .await;

    let data = data(
        &schema,
        &format!(
            r#"{{ getUser(id: "{}") {{ products {{ name price user {{ email }} }} orders {{ id }} payments {{ id }} }} }}"#,
            id
        ),
    )
    .await;

    let products = data["getUser"]["products"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "Espresso machine");
    // products link back to their owner
    assert_eq!(products[0]["user"]["email"], "ana@x.com");
    assert!(data["getUser"]["orders"].as_array().unwrap().is_empty());
    assert!(data["getUser"]["payments"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn input_validation_rejects_bad_email_and_short_password() {
    let schema = schema();

    let resp = schema
        .execute(r#"mutation { signup(input: { name: "Ana", email: "not-an-email", password: "wonderwall" }) { token } }"#)
        .await;
    assert!(!resp.errors.is_empty());

    let resp = schema
        .execute(r#"mutation { signup(input: { name: "Ana", email: "ana@x.com", password: "short" }) { token } }"#)
        .await;
    assert!(!resp.errors.is_empty());
}
