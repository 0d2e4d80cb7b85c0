use lambda_http::{http::StatusCode, Body, Error, Response};
use serde_json::{Map, Value};

use crate::errors::{missing_as, parse_body, ApiError};
use crate::persistence::{from_item, to_item, Filter, Item, ItemStore, ReturnMode};
use crate::responses;
use crate::types::{Role, UpdateUserRequest, User};

/// Shape every new user starts from before the caller's fields are laid over it.
fn user_defaults() -> Map<String, Value> {
    let mut defaults = Map::new();
    defaults.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
    defaults.insert("email".into(), Value::String(String::new()));
    defaults.insert("role".into(), Value::String(Role::PaperGetter.as_str().into()));
    defaults.insert("name".into(), Value::String(String::new()));
    defaults.insert("createdAt".into(), serde_json::to_value(chrono::Utc::now()).unwrap_or(Value::Null));
    defaults.insert("isVerified".into(), Value::Bool(false));
    defaults
}

/// Create (or overwrite) a user.
///
/// The payload is merged over [`user_defaults`], so callers can also set
/// server-side fields such as `isVerified`. Upstream role checks are expected
/// to restrict who can reach this endpoint.
pub async fn create_user(
    store: &dyn ItemStore,
    table_name: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    match put_user(store, table_name, body).await {
        Ok(user) => responses::json(StatusCode::CREATED, &user),
        Err(e) => e.into_response("create_user"),
    }
}

async fn put_user(store: &dyn ItemStore, table_name: &str, body: &[u8]) -> Result<User, ApiError> {
    let Value::Object(fields) = parse_body::<Value>(body)? else {
        return Err(ApiError::Validation("user payload must be a JSON object".into()));
    };

    let mut record = user_defaults();
    record.extend(fields);

    let user: User = serde_json::from_value(Value::Object(record))
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    store.put(table_name, to_item(&user)?).await?;

    tracing::info!("User {} stored with role {}", user.id, user.role.as_str());
    Ok(user)
}

/// Get a single user
pub async fn get_user(
    store: &dyn ItemStore,
    table_name: &str,
    user_id: &str,
) -> Result<Response<Body>, Error> {
    match load_user(store, table_name, user_id).await {
        Ok(user) => responses::json(StatusCode::OK, &user),
        Err(e) => e.into_response("get_user"),
    }
}

async fn load_user(store: &dyn ItemStore, table_name: &str, user_id: &str) -> Result<User, ApiError> {
    let item = store
        .get(table_name, user_id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(from_item(item)?)
}

/// List users, optionally narrowed to one role
pub async fn list_users(
    store: &dyn ItemStore,
    table_name: &str,
    role: Option<&str>,
) -> Result<Response<Body>, Error> {
    let mut filter = Filter::new();
    if let Some(role) = role {
        filter = filter.eq("role", role);
    }

    match query_users(store, table_name, &filter).await {
        Ok(users) => responses::json(StatusCode::OK, &users),
        Err(e) => e.into_response("list_users"),
    }
}

async fn query_users(
    store: &dyn ItemStore,
    table_name: &str,
    filter: &Filter,
) -> Result<Vec<User>, ApiError> {
    let items = store.query(table_name, filter).await?;
    let users = items
        .into_iter()
        .map(from_item)
        .collect::<Result<Vec<User>, _>>()?;
    Ok(users)
}

/// Verify a user or change their role/name
pub async fn update_user(
    store: &dyn ItemStore,
    table_name: &str,
    user_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    match patch_user(store, table_name, user_id, body).await {
        Ok(user) => responses::json(StatusCode::OK, &user),
        Err(e) => e.into_response("update_user"),
    }
}

async fn patch_user(
    store: &dyn ItemStore,
    table_name: &str,
    user_id: &str,
    body: &[u8],
) -> Result<User, ApiError> {
    let req: UpdateUserRequest = parse_body(body)?;

    let mut fields = Item::new();
    if let Some(name) = req.name {
        fields.insert("name".into(), Value::String(name));
    }
    if let Some(role) = req.role {
        fields.insert("role".into(), Value::String(role.as_str().into()));
    }
    if let Some(is_verified) = req.is_verified {
        fields.insert("isVerified".into(), Value::Bool(is_verified));
    }

    let updated = store
        .update(table_name, user_id, fields, ReturnMode::AllNew)
        .await
        .map_err(missing_as("User"))?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(from_item(updated)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use serde_json::json;

    const TABLE: &str = "users";

    fn body_of(resp: &Response<Body>) -> Value {
        serde_json::from_slice(resp.body()).unwrap()
    }

    #[tokio::test]
    async fn create_user_fills_server_defaults() {
        let store = MemoryStore::new();
        let payload = json!({"id": "u1", "email": "a@b.c", "role": "paper_setter", "name": "Ada"});

        let resp = create_user(&store, TABLE, payload.to_string().as_bytes()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body = body_of(&resp);
        assert_eq!(body["id"], "u1");
        assert_eq!(body["email"], "a@b.c");
        assert_eq!(body["role"], "paper_setter");
        assert_eq!(body["name"], "Ada");
        assert_eq!(body["isVerified"], false);
        assert!(body["createdAt"].is_string());

        let stored = store.get(TABLE, "u1").await.unwrap().unwrap();
        assert_eq!(Value::Object(stored), body);
    }

    #[tokio::test]
    async fn caller_can_override_verification_flag() {
        let store = MemoryStore::new();
        let payload = json!({"id": "u2", "email": "x@y.z", "role": "admin", "name": "X", "isVerified": true});

        let resp = create_user(&store, TABLE, payload.to_string().as_bytes()).await.unwrap();
        assert_eq!(body_of(&resp)["isVerified"], true);
    }

    #[tokio::test]
    async fn missing_id_gets_generated() {
        let store = MemoryStore::new();
        let payload = json!({"email": "n@o.id", "role": "paper_getter", "name": "Nid"});

        let resp = create_user(&store, TABLE, payload.to_string().as_bytes()).await.unwrap();
        let id = body_of(&resp)["id"].as_str().unwrap().to_string();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert!(store.get(TABLE, &id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn second_create_with_same_id_wins() {
        let store = MemoryStore::new();
        let first = json!({"id": "u3", "email": "old@x", "role": "paper_getter", "name": "Old", "dept": "math"});
        let second = json!({"id": "u3", "email": "new@x", "role": "super_user", "name": "New"});

        create_user(&store, TABLE, first.to_string().as_bytes()).await.unwrap();
        create_user(&store, TABLE, second.to_string().as_bytes()).await.unwrap();

        let stored = store.get(TABLE, "u3").await.unwrap().unwrap();
        assert_eq!(stored["email"], "new@x");
        assert_eq!(stored["role"], "super_user");
        assert_eq!(stored["name"], "New");
        assert_eq!(stored["isVerified"], false);
        assert!(!stored.contains_key("dept"));
    }

    #[tokio::test]
    async fn unknown_role_is_a_generic_failure() {
        let store = MemoryStore::new();
        let payload = json!({"id": "u4", "email": "e", "role": "janitor", "name": "J"});

        let resp = create_user(&store, TABLE, payload.to_string().as_bytes()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(&resp)["error"], "Internal server error");
        assert!(store.get(TABLE, "u4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_object_payload_is_rejected() {
        let store = MemoryStore::new();
        let resp = create_user(&store, TABLE, b"[1,2,3]").await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn get_user_returns_404_when_absent() {
        let store = MemoryStore::new();
        let resp = get_user(&store, TABLE, "ghost").await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(&resp)["error"], "User not found");
    }

    #[tokio::test]
    async fn verification_updates_only_given_fields() {
        let store = MemoryStore::new();
        let payload = json!({"id": "u5", "email": "v@x", "role": "paper_setter", "name": "Vee"});
        create_user(&store, TABLE, payload.to_string().as_bytes()).await.unwrap();

        let resp = update_user(&store, TABLE, "u5", br#"{"isVerified": true, "role": "super_user"}"#)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_of(&resp);
        assert_eq!(body["isVerified"], true);
        assert_eq!(body["role"], "super_user");
        assert_eq!(body["name"], "Vee");
        assert_eq!(body["email"], "v@x");
    }

    #[tokio::test]
    async fn update_on_missing_user_is_404_and_creates_nothing() {
        let store = MemoryStore::new();
        let resp = update_user(&store, TABLE, "ghost", br#"{"isVerified": true}"#).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(store.get(TABLE, "ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_users_filters_by_role() {
        let store = MemoryStore::new();
        for (id, role) in [("a", "admin"), ("b", "paper_setter"), ("c", "paper_setter")] {
            let payload = json!({"id": id, "email": "e", "role": role, "name": id});
            create_user(&store, TABLE, payload.to_string().as_bytes()).await.unwrap();
        }

        let resp = list_users(&store, TABLE, Some("paper_setter")).await.unwrap();
        let body = body_of(&resp);
        let ids: Vec<&str> = body.as_array().unwrap().iter().map(|u| u["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        let resp = list_users(&store, TABLE, None).await.unwrap();
        assert_eq!(body_of(&resp).as_array().unwrap().len(), 3);
    }
}
