//! HTTP routes. Every `/api/birthdays*` and `/api/categories*` handler takes a
//! [`CurrentUser`](crate::auth::CurrentUser), so those routes answer 401 without a
//! session. The session layer itself is added by the caller of [`router`].

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod auth;
pub mod avatars;
pub mod birthdays;
pub mod categories;

pub fn router(state: AppState) -> Router {
    let max_upload = state.settings.storage.max_upload_bytes;

    Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/birthdays", get(birthdays::list).post(birthdays::create))
        .route("/api/birthdays/upcoming", get(birthdays::list_upcoming))
        .route(
            "/api/birthdays/{id}",
            put(birthdays::update).delete(birthdays::delete),
        )
        .route("/api/birthdays/{id}/pin", patch(birthdays::pin))
        .route(
            "/api/birthdays/{id}/avatar",
            get(avatars::signed_url)
                .post(avatars::upload)
                .layer(DefaultBodyLimit::max(max_upload)),
        )
        .route(
            "/api/categories",
            get(categories::list).post(categories::create),
        )
        .route(
            "/api/categories/{id}",
            put(categories::update).delete(categories::delete),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use async_trait::async_trait;
    use store::{
        BirthdayStore, Category, CategoryInput, MemoryStore, NewUser, Person, PersonInput,
        StoreResult, User,
    };
    use uuid::Uuid;
    use tower::ServiceExt;
    use tower_sessions::SessionManagerLayer;

    use crate::settings::Settings;
    use crate::storage::MemoryAvatarStorage;

    const BOUNDARY: &str = "X-BIRTHDAYS-BOUNDARY";

    /// Deletes the person right before recording an avatar, as a concurrent
    /// delete request would.
    #[derive(Clone, Default)]
    struct DeletedDuringUpload(MemoryStore);

    #[async_trait]
    impl BirthdayStore for DeletedDuringUpload {
        async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
            self.0.insert_user(user).await
        }

        async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
            self.0.find_user_by_email(email).await
        }

        async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
            self.0.find_user(id).await
        }

        async fn list_people(&self, owner: Uuid) -> StoreResult<Vec<Person>> {
            self.0.list_people(owner).await
        }

        async fn get_person(&self, owner: Uuid, id: Uuid) -> StoreResult<Person> {
            self.0.get_person(owner, id).await
        }

        async fn insert_person(&self, owner: Uuid, input: PersonInput) -> StoreResult<Person> {
            self.0.insert_person(owner, input).await
        }

        async fn update_person(
            &self,
            owner: Uuid,
            id: Uuid,
            input: PersonInput,
        ) -> StoreResult<Person> {
            self.0.update_person(owner, id, input).await
        }

        async fn set_pinned(&self, owner: Uuid, id: Uuid, pinned: bool) -> StoreResult<Person> {
            self.0.set_pinned(owner, id, pinned).await
        }

        async fn set_avatar(
            &self,
            owner: Uuid,
            id: Uuid,
            key: &str,
        ) -> StoreResult<Option<String>> {
            self.0.delete_person(owner, id).await?;
            self.0.set_avatar(owner, id, key).await
        }

        async fn delete_person(&self, owner: Uuid, id: Uuid) -> StoreResult<Person> {
            self.0.delete_person(owner, id).await
        }

        async fn list_categories(&self, owner: Uuid) -> StoreResult<Vec<Category>> {
            self.0.list_categories(owner).await
        }

        async fn insert_category(
            &self,
            owner: Uuid,
            input: CategoryInput,
        ) -> StoreResult<Category> {
            self.0.insert_category(owner, input).await
        }

        async fn insert_categories(
            &self,
            owner: Uuid,
            inputs: Vec<CategoryInput>,
        ) -> StoreResult<Vec<Category>> {
            self.0.insert_categories(owner, inputs).await
        }

        async fn update_category(
            &self,
            owner: Uuid,
            id: Uuid,
            input: CategoryInput,
        ) -> StoreResult<Category> {
            self.0.update_category(owner, id, input).await
        }

        async fn delete_category(&self, owner: Uuid, id: Uuid) -> StoreResult<()> {
            self.0.delete_category(owner, id).await
        }
    }

    struct TestApp {
        router: Router,
        avatars: MemoryAvatarStorage,
    }

    struct Reply {
        status: StatusCode,
        cookie: Option<String>,
        body: Value,
    }

    impl TestApp {
        fn new() -> Self {
            Self::with_store(MemoryStore::new())
        }

        fn with_store(store: impl BirthdayStore + 'static) -> Self {
            let avatars = MemoryAvatarStorage::new("images");
            let state = AppState::new(store, avatars.clone(), Settings::default());
            let sessions = SessionManagerLayer::new(tower_sessions::MemoryStore::default())
                .with_secure(false);
            Self {
                router: router(state).layer(sessions),
                avatars,
            }
        }

        async fn send(&self, request: Request<Body>) -> Reply {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let cookie = response
                .headers()
                .get(header::SET_COOKIE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(';').next())
                .map(str::to_string);
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                // axum's own rejections answer in plain text
                serde_json::from_slice(&bytes)
                    .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            };
            Reply {
                status,
                cookie,
                body,
            }
        }

        async fn json(
            &self,
            method: Method,
            uri: &str,
            cookie: Option<&str>,
            body: Option<Value>,
        ) -> Reply {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(cookie) = cookie {
                request = request.header(header::COOKIE, cookie);
            }
            let request = match body {
                Some(body) => request
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string())),
                None => request.body(Body::empty()),
            };
            self.send(request.unwrap()).await
        }

        async fn upload(&self, uri: &str, cookie: &str, file_name: &str, content_type: &str) -> Reply {
            let mut body = Vec::new();
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(&[0x89, b'P', b'N', b'G', 1, 2, 3, 4]);
            body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

            let request = Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::COOKIE, cookie)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap();
            self.send(request).await
        }

        /// Sign up and return the session cookie.
        async fn signup(&self, email: &str) -> String {
            let reply = self
                .json(
                    Method::POST,
                    "/api/auth/signup",
                    None,
                    Some(json!({ "email": email, "username": "tester", "password": "password123" })),
                )
                .await;
            assert_eq!(reply.status, StatusCode::CREATED);
            reply.cookie.expect("signup sets a session cookie")
        }

        async fn create_person(&self, cookie: &str, body: Value) -> Value {
            let reply = self
                .json(Method::POST, "/api/birthdays", Some(cookie), Some(body))
                .await;
            assert_eq!(reply.status, StatusCode::CREATED);
            reply.body
        }
    }

    fn category_id(categories: &Value, name: &str) -> String {
        categories
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["name"] == name)
            .map(|c| c["id"].as_str().unwrap().to_string())
            .unwrap()
    }

    #[tokio::test]
    async fn test_requires_session() {
        let app = TestApp::new();
        for uri in ["/api/birthdays", "/api/categories", "/api/birthdays/upcoming"] {
            let reply = app.json(Method::GET, uri, None, None).await;
            assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(reply.body["message"], "Unauthorized");
        }
        let me = app.json(Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(me.status, StatusCode::OK);
        assert!(me.body.is_null());
    }

    #[tokio::test]
    async fn test_signup_seeds_categories_and_signs_in() {
        let app = TestApp::new();
        let cookie = app.signup("  Ada@Example.com ").await;

        let me = app.json(Method::GET, "/api/auth/me", Some(&cookie), None).await;
        assert_eq!(me.body["email"], "ada@example.com");
        assert_eq!(me.body["username"], "tester");

        let categories = app
            .json(Method::GET, "/api/categories", Some(&cookie), None)
            .await;
        let names: Vec<&str> = categories
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Family", "Friends", "Coworkers", "Pets"]);
    }

    #[tokio::test]
    async fn test_signup_validation_and_conflict() {
        let app = TestApp::new();
        app.signup("ada@example.com").await;

        let duplicate = app
            .json(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({ "email": "ADA@example.com", "username": "other", "password": "password123" })),
            )
            .await;
        assert_eq!(duplicate.status, StatusCode::CONFLICT);

        let short = app
            .json(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({ "email": "bob@example.com", "username": "bob", "password": "short" })),
            )
            .await;
        assert_eq!(short.status, StatusCode::BAD_REQUEST);

        let bad_email = app
            .json(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({ "email": "bob", "username": "bob", "password": "password123" })),
            )
            .await;
        assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let app = TestApp::new();
        app.signup("ada@example.com").await;

        let wrong = app
            .json(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "ada@example.com", "password": "not-the-password" })),
            )
            .await;
        assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.body["message"], "Invalid email or password");

        let unknown = app
            .json(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "nobody@example.com", "password": "password123" })),
            )
            .await;
        assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);

        let login = app
            .json(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": "ADA@example.com", "password": "password123" })),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK);
        let cookie = login.cookie.unwrap();

        let list = app.json(Method::GET, "/api/birthdays", Some(&cookie), None).await;
        assert_eq!(list.status, StatusCode::OK);

        let logout = app
            .json(Method::POST, "/api/auth/logout", Some(&cookie), None)
            .await;
        assert_eq!(logout.status, StatusCode::NO_CONTENT);

        let after = app.json(Method::GET, "/api/birthdays", Some(&cookie), None).await;
        assert_eq!(after.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_birthday_crud() {
        let app = TestApp::new();
        let cookie = app.signup("ada@example.com").await;
        let categories = app
            .json(Method::GET, "/api/categories", Some(&cookie), None)
            .await
            .body;
        let family = category_id(&categories, "Family");

        let created = app
            .create_person(
                &cookie,
                json!({ "name": "Grace", "birthday": "1906-12-09", "email": "grace@example.com", "category_ids": [family] }),
            )
            .await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["categories"][0]["name"], "Family");
        assert_eq!(created["pinned"], false);

        let updated = app
            .json(
                Method::PUT,
                &format!("/api/birthdays/{id}"),
                Some(&cookie),
                Some(json!({ "name": "Grace Hopper", "birthday": "1906-12-09", "phone": "555-0100" })),
            )
            .await;
        assert_eq!(updated.status, StatusCode::OK);
        assert_eq!(updated.body["name"], "Grace Hopper");
        assert_eq!(updated.body["phone"], "555-0100");
        assert!(updated.body["categories"].as_array().unwrap().is_empty());

        let pinned = app
            .json(
                Method::PATCH,
                &format!("/api/birthdays/{id}/pin"),
                Some(&cookie),
                Some(json!({ "pinned": true })),
            )
            .await;
        assert_eq!(pinned.status, StatusCode::OK);
        assert_eq!(pinned.body["pinned"], true);

        let list = app.json(Method::GET, "/api/birthdays", Some(&cookie), None).await;
        assert_eq!(list.body.as_array().unwrap().len(), 1);

        let deleted = app
            .json(Method::DELETE, &format!("/api/birthdays/{id}"), Some(&cookie), None)
            .await;
        assert_eq!(deleted.status, StatusCode::OK);

        let again = app
            .json(Method::DELETE, &format!("/api/birthdays/{id}"), Some(&cookie), None)
            .await;
        assert_eq!(again.status, StatusCode::NOT_FOUND);
        assert_eq!(again.body["message"], "Birthday not found");
    }

    #[tokio::test]
    async fn test_rejects_blank_name_and_bad_date() {
        let app = TestApp::new();
        let cookie = app.signup("ada@example.com").await;

        let blank = app
            .json(
                Method::POST,
                "/api/birthdays",
                Some(&cookie),
                Some(json!({ "name": "  ", "birthday": "1990-01-01" })),
            )
            .await;
        assert_eq!(blank.status, StatusCode::BAD_REQUEST);

        let bad_date = app
            .json(
                Method::POST,
                "/api/birthdays",
                Some(&cookie),
                Some(json!({ "name": "Ada", "birthday": "not a date" })),
            )
            .await;
        assert!(bad_date.status.is_client_error());
    }

    #[tokio::test]
    async fn test_people_are_private_to_their_owner() {
        let app = TestApp::new();
        let alice = app.signup("alice@example.com").await;
        let bob = app.signup("bob@example.com").await;

        let person = app
            .create_person(&alice, json!({ "name": "Ada", "birthday": "1815-12-10" }))
            .await;
        let id = person["id"].as_str().unwrap();

        let bob_list = app.json(Method::GET, "/api/birthdays", Some(&bob), None).await;
        assert!(bob_list.body.as_array().unwrap().is_empty());

        let bob_pin = app
            .json(
                Method::PATCH,
                &format!("/api/birthdays/{id}/pin"),
                Some(&bob),
                Some(json!({ "pinned": true })),
            )
            .await;
        assert_eq!(bob_pin.status, StatusCode::NOT_FOUND);

        let bob_delete = app
            .json(Method::DELETE, &format!("/api/birthdays/{id}"), Some(&bob), None)
            .await;
        assert_eq!(bob_delete.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upcoming_groups_pinned_first() {
        let app = TestApp::new();
        let cookie = app.signup("ada@example.com").await;
        let categories = app
            .json(Method::GET, "/api/categories", Some(&cookie), None)
            .await
            .body;
        let friends = category_id(&categories, "Friends");

        app.create_person(&cookie, json!({ "name": "A", "birthday": "1990-03-15", "category_ids": [friends] }))
            .await;
        app.create_person(&cookie, json!({ "name": "B", "birthday": "1985-01-01" }))
            .await;
        app.create_person(&cookie, json!({ "name": "C", "birthday": "2000-12-25", "pinned": true }))
            .await;

        let reply = app
            .json(
                Method::GET,
                "/api/birthdays/upcoming?today=2024-03-10",
                Some(&cookie),
                None,
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["today"], "2024-03-10");

        let groups = reply.body["groups"].as_array().unwrap();
        let months: Vec<&str> = groups.iter().map(|g| g["month"].as_str().unwrap()).collect();
        assert_eq!(months, vec!["December", "March", "January"]);
        assert_eq!(groups[0]["people"][0]["name"], "C");
        assert_eq!(groups[1]["people"][0]["name"], "A");
        assert_eq!(groups[1]["people"][0]["days_until"], 5);
        assert_eq!(groups[1]["people"][0]["turning"], 34);
        assert_eq!(groups[2]["people"][0]["next_birthday"], "2025-01-01");

        let filtered = app
            .json(
                Method::GET,
                "/api/birthdays/upcoming?today=2024-03-10&category=FRIENDS&limit=5",
                Some(&cookie),
                None,
            )
            .await;
        let groups = filtered.body["groups"].as_array().unwrap();
        let names: Vec<&str> = groups
            .iter()
            .flat_map(|g| g["people"].as_array().unwrap())
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["C", "A"]);
    }

    #[tokio::test]
    async fn test_category_crud_and_cascade() {
        let app = TestApp::new();
        let cookie = app.signup("ada@example.com").await;

        let created = app
            .json(
                Method::POST,
                "/api/categories",
                Some(&cookie),
                Some(json!({ "name": "Book club", "color": "#336699" })),
            )
            .await;
        assert_eq!(created.status, StatusCode::CREATED);
        let id = created.body["id"].as_str().unwrap().to_string();

        let person = app
            .create_person(&cookie, json!({ "name": "Ada", "birthday": "1815-12-10", "category_ids": [id] }))
            .await;
        assert_eq!(person["categories"][0]["name"], "Book club");

        let renamed = app
            .json(
                Method::PUT,
                &format!("/api/categories/{id}"),
                Some(&cookie),
                Some(json!({ "name": "Readers", "color": "#ffffff" })),
            )
            .await;
        assert_eq!(renamed.status, StatusCode::OK);
        assert_eq!(renamed.body["name"], "Readers");

        let deleted = app
            .json(Method::DELETE, &format!("/api/categories/{id}"), Some(&cookie), None)
            .await;
        assert_eq!(deleted.status, StatusCode::NO_CONTENT);

        let people = app.json(Method::GET, "/api/birthdays", Some(&cookie), None).await;
        assert!(people.body[0]["categories"].as_array().unwrap().is_empty());

        let missing = app
            .json(Method::DELETE, &format!("/api/categories/{id}"), Some(&cookie), None)
            .await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        assert_eq!(missing.body["message"], "Category not found");
    }

    #[tokio::test]
    async fn test_avatar_upload_replaces_previous() {
        let app = TestApp::new();
        let cookie = app.signup("ada@example.com").await;
        let person = app
            .create_person(&cookie, json!({ "name": "Ada", "birthday": "1815-12-10" }))
            .await;
        let uri = format!("/api/birthdays/{}/avatar", person["id"].as_str().unwrap());

        let none = app.json(Method::GET, &uri, Some(&cookie), None).await;
        assert_eq!(none.status, StatusCode::NOT_FOUND);

        let gif = app.upload(&uri, &cookie, "me.gif", "image/gif").await;
        assert_eq!(gif.status, StatusCode::BAD_REQUEST);
        assert_eq!(gif.body["message"], "Unsupported image format");

        let first = app.upload(&uri, &cookie, "me.png", "image/png").await;
        assert_eq!(first.status, StatusCode::OK);
        let first_key = first.body["path"].as_str().unwrap().to_string();
        assert!(first_key.ends_with(".png"));
        assert!(app.avatars.contains(&first_key));
        assert_eq!(
            first.body["signed_url"],
            format!("memory://images/{first_key}?expires=3600")
        );

        let second = app.upload(&uri, &cookie, "me.webp", "image/webp").await;
        let second_key = second.body["path"].as_str().unwrap().to_string();
        assert!(app.avatars.contains(&second_key));
        assert!(!app.avatars.contains(&first_key));

        let signed = app.json(Method::GET, &uri, Some(&cookie), None).await;
        assert_eq!(signed.status, StatusCode::OK);
        assert!(signed.body["signed_url"]
            .as_str()
            .unwrap()
            .contains(&second_key));

        let delete_uri = format!("/api/birthdays/{}", person["id"].as_str().unwrap());
        app.json(Method::DELETE, &delete_uri, Some(&cookie), None).await;
        assert!(!app.avatars.contains(&second_key));
    }

    #[tokio::test]
    async fn test_avatar_upload_for_unknown_person() {
        let app = TestApp::new();
        let cookie = app.signup("ada@example.com").await;
        let uri = format!("/api/birthdays/{}/avatar", uuid::Uuid::new_v4());

        let reply = app.upload(&uri, &cookie, "me.png", "image/png").await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_avatar_removed_when_person_deleted_during_upload() {
        let app = TestApp::with_store(DeletedDuringUpload::default());
        let cookie = app.signup("ada@example.com").await;
        let person = app
            .create_person(&cookie, json!({ "name": "Ada", "birthday": "1815-12-10" }))
            .await;
        let uri = format!("/api/birthdays/{}/avatar", person["id"].as_str().unwrap());

        let reply = app.upload(&uri, &cookie, "me.png", "image/png").await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert!(app.avatars.keys().is_empty());
    }
}
