use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use idea_board::db::{
    self,
    enums::IdeaStatus,
    services::{IdeaFilter, IdeaService, UserService},
};
use idea_board::server::config::ServerConfig;
use idea_board::web::{create_axum_router, AppState};

const BOUNDARY: &str = "----idea-board-test-boundary";

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    uploads: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_upload_limit(16 * 1024 * 1024).await
    }

    async fn with_upload_limit(max_upload_bytes: usize) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            secret_key: "test-secret".to_string(),
            database_url: "sqlite::memory:".to_string(),
            upload_dir: uploads.path().to_string_lossy().into_owned(),
            listen_addr: "127.0.0.1:0".to_string(),
            log_dir: "logs".to_string(),
            max_upload_bytes,
            bcrypt_cost: 4,
        };
        let db_pool = db::connect(&config.database_url).await.unwrap();
        let state = idea_board::build_state(db_pool, Arc::new(config)).await.unwrap();
        let router = create_axum_router(state.clone());
        Self { router, state, uploads }
    }

    async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    async fn register(&self, username: &str, password: &str) -> Response {
        let body = format!("username={username}&password={password}&password2={password}");
        self.send(
            Request::post("/register")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Registers and logs in, returning the `Cookie` header value for the session.
    async fn login_as(&self, username: &str) -> String {
        let res = self.register(username, "clave123").await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);

        let res = self
            .send(
                Request::post("/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(format!("username={username}&password=clave123")))
                    .unwrap(),
            )
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        session_cookie(&res).expect("login sets a session cookie")
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut req = Request::get(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    async fn post_idea(&self, uri: &str, cookie: &str, form: &IdeaSubmission<'_>) -> Response {
        self.send(
            Request::post(uri)
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
                .body(Body::from(form.encode()))
                .unwrap(),
        )
        .await
    }

    fn stored_files(&self) -> Vec<String> {
        std::fs::read_dir(self.uploads.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect()
    }

    async fn all_ideas(&self) -> Vec<idea_board::db::entities::idea::Model> {
        IdeaService::list(&self.state.db_pool, &IdeaFilter::default()).await.unwrap()
    }
}

struct IdeaSubmission<'a> {
    title: &'a str,
    description: &'a str,
    format: &'a str,
    tags: &'a str,
    status: &'a str,
    image: Option<(&'a str, Vec<u8>)>,
}

impl<'a> IdeaSubmission<'a> {
    fn new(title: &'a str) -> Self {
        Self {
            title,
            description: "Una descripción",
            format: "Tutorial",
            tags: "",
            status: "Pendiente",
            image: None,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in [
            ("title", self.title),
            ("description", self.description),
            ("format", self.format),
            ("tags", self.tags),
            ("status", self.status),
        ] {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
            );
        }
        if let Some((filename, bytes)) = &self.image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn session_cookie(res: &Response) -> Option<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("token=") && !v.starts_with("token=;"))
        .and_then(|v| v.split(';').next())
        .map(str::to_owned)
}

fn sets_flash(res: &Response) -> bool {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with("flash=") && !v.starts_with("flash=;"))
}

fn location(res: &Response) -> &str {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn body_text(res: Response) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_check_responds() {
    let app = TestApp::new().await;
    let res = app.get("/health", None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, "OK");
}

#[tokio::test]
async fn second_registration_with_same_username_fails() {
    let app = TestApp::new().await;

    let first = app.register("creadora", "pw").await;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&first), "/login");

    let second = app.register("creadora", "otra").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert!(body_text(second).await.contains("ya está en uso"));
}

#[tokio::test]
async fn username_is_trimmed_before_uniqueness_check() {
    let app = TestApp::new().await;

    let first = app.register("creadora", "pw").await;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);

    let padded = app.register("creadora%20%20", "pw").await;
    assert_eq!(padded.status(), StatusCode::OK);
    assert!(body_text(padded).await.contains("ya está en uso"));

    let res = app
        .send(
            Request::post("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=%20creadora&password=pw"))
                .unwrap(),
        )
        .await;
    assert!(session_cookie(&res).is_some());
}

#[tokio::test]
async fn registration_requires_matching_passwords() {
    let app = TestApp::new().await;
    let res = app
        .send(
            Request::post("/register")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=creadora&password=uno&password2=dos"))
                .unwrap(),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Las contraseñas no coinciden."));
    assert!(UserService::find_by_username(&app.state.db_pool, "creadora")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn wrong_password_redirects_back_to_login() {
    let app = TestApp::new().await;
    app.register("creadora", "correcta").await;

    let res = app
        .send(
            Request::post("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=creadora&password=incorrecta"))
                .unwrap(),
        )
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/login");
    assert!(session_cookie(&res).is_none());
    assert!(sets_flash(&res));
}

#[tokio::test]
async fn protected_pages_redirect_anonymous_users() {
    let app = TestApp::new().await;
    for uri in ["/add", "/edit/1", "/delete/1"] {
        let res = app.get(uri, None).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&res), "/login", "{uri}");
    }

    let index = app.get("/", None).await;
    assert_eq!(index.status(), StatusCode::OK);
}

#[tokio::test]
async fn logged_in_user_is_sent_away_from_login() {
    let app = TestApp::new().await;
    let cookie = app.login_as("creadora").await;
    let res = app.get("/login", Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");
}

#[tokio::test]
async fn added_idea_is_listed_with_resized_image() {
    let app = TestApp::new().await;
    let cookie = app.login_as("creadora").await;

    let mut form = IdeaSubmission::new("Receta de pan");
    form.image = Some(("portada.png", png(800, 600)));
    let res = app.post_idea("/add", &cookie, &form).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");

    let ideas = app.all_ideas().await;
    assert_eq!(ideas.len(), 1);
    let filename = ideas[0].image_filename.clone().unwrap();
    assert_eq!(app.stored_files(), vec![filename.clone()]);

    let dims = image::image_dimensions(app.uploads.path().join(&filename)).unwrap();
    assert_eq!(dims, (400, 300));

    let page = body_text(app.get("/", Some(&cookie)).await).await;
    assert!(page.contains("Receta de pan"));
    assert!(page.contains(&filename));

    let served = app.get(&format!("/uploads/{filename}"), None).await;
    assert_eq!(served.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_image_upload_is_rejected_before_anything_is_stored() {
    let app = TestApp::new().await;
    let cookie = app.login_as("creadora").await;

    let mut form = IdeaSubmission::new("Con adjunto raro");
    form.image = Some(("notas.txt", b"hola".to_vec()));
    let res = app.post_idea("/add", &cookie, &form).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Solo se permiten imágenes"));
    assert!(app.all_ideas().await.is_empty());
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn oversized_upload_is_rejected_with_413() {
    let app = TestApp::with_upload_limit(64 * 1024).await;
    let cookie = app.login_as("creadora").await;

    let mut form = IdeaSubmission::new("Demasiado grande");
    form.image = Some(("enorme.png", vec![0u8; 128 * 1024]));
    let res = app.post_idea("/add", &cookie, &form).await;

    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.all_ideas().await.is_empty());
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn missing_required_fields_are_reported_inline() {
    let app = TestApp::new().await;
    let cookie = app.login_as("creadora").await;

    let form = IdeaSubmission::new("");
    let res = app.post_idea("/add", &cookie, &form).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.contains("Este campo es obligatorio."));
    assert!(app.all_ideas().await.is_empty());
}

#[tokio::test]
async fn deleting_an_idea_removes_its_image() {
    let app = TestApp::new().await;
    let cookie = app.login_as("creadora").await;

    let mut form = IdeaSubmission::new("Para borrar");
    form.image = Some(("foto.jpg", png(50, 50)));
    app.post_idea("/add", &cookie, &form).await;
    let idea = app.all_ideas().await.remove(0);
    assert_eq!(app.stored_files().len(), 1);

    let res = app.get(&format!("/delete/{}", idea.id), Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");

    assert!(app.all_ideas().await.is_empty());
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn replacing_an_image_swaps_the_stored_file() {
    let app = TestApp::new().await;
    let cookie = app.login_as("creadora").await;

    let mut form = IdeaSubmission::new("Con portada");
    form.image = Some(("vieja.png", png(20, 20)));
    app.post_idea("/add", &cookie, &form).await;
    let idea = app.all_ideas().await.remove(0);
    let old = idea.image_filename.clone().unwrap();

    let mut edit = IdeaSubmission::new("Con portada nueva");
    edit.status = "En Progreso";
    edit.image = Some(("nueva.png", png(30, 30)));
    let res = app.post_idea(&format!("/edit/{}", idea.id), &cookie, &edit).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    let updated = app.all_ideas().await.remove(0);
    let new = updated.image_filename.clone().unwrap();
    assert_ne!(new, old);
    assert_eq!(updated.title, "Con portada nueva");
    assert_eq!(updated.status, IdeaStatus::InProgress);
    assert_eq!(app.stored_files(), vec![new]);
}

#[tokio::test]
async fn editing_without_a_new_image_keeps_the_old_one() {
    let app = TestApp::new().await;
    let cookie = app.login_as("creadora").await;

    let mut form = IdeaSubmission::new("Con portada");
    form.image = Some(("portada.png", png(20, 20)));
    app.post_idea("/add", &cookie, &form).await;
    let idea = app.all_ideas().await.remove(0);

    let edit = IdeaSubmission::new("Solo texto");
    app.post_idea(&format!("/edit/{}", idea.id), &cookie, &edit).await;

    let updated = app.all_ideas().await.remove(0);
    assert_eq!(updated.title, "Solo texto");
    assert_eq!(updated.image_filename, idea.image_filename);
    assert_eq!(app.stored_files().len(), 1);
}

#[tokio::test]
async fn other_users_cannot_edit_or_delete() {
    let app = TestApp::new().await;
    let owner = app.login_as("duena").await;
    let intruder = app.login_as("intrusa").await;

    app.post_idea("/add", &owner, &IdeaSubmission::new("Idea privada")).await;
    let idea = app.all_ideas().await.remove(0);

    let edit_page = app.get(&format!("/edit/{}", idea.id), Some(&intruder)).await;
    assert_eq!(edit_page.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&edit_page), "/");
    assert!(sets_flash(&edit_page));

    let edit = app
        .post_idea(&format!("/edit/{}", idea.id), &intruder, &IdeaSubmission::new("Secuestrada"))
        .await;
    assert_eq!(edit.status(), StatusCode::SEE_OTHER);

    let delete = app.get(&format!("/delete/{}", idea.id), Some(&intruder)).await;
    assert_eq!(delete.status(), StatusCode::SEE_OTHER);
    assert!(sets_flash(&delete));

    let still_there = app.all_ideas().await;
    assert_eq!(still_there.len(), 1);
    assert_eq!(still_there[0].title, "Idea privada");

    let listing = body_text(app.get("/", Some(&intruder)).await).await;
    assert!(!listing.contains("Idea privada"));
}

#[tokio::test]
async fn admin_can_see_and_delete_any_idea() {
    let app = TestApp::new().await;
    let owner = app.login_as("duena").await;
    let admin = app.login_as("moderadora").await;
    UserService::set_admin(&app.state.db_pool, "moderadora", true).await.unwrap();

    app.post_idea("/add", &owner, &IdeaSubmission::new("Idea ajena")).await;
    let idea = app.all_ideas().await.remove(0);

    let own_scope = body_text(app.get("/", Some(&admin)).await).await;
    assert!(!own_scope.contains("Idea ajena"));
    let all_scope = body_text(app.get("/?scope=all", Some(&admin)).await).await;
    assert!(all_scope.contains("Idea ajena"));

    let page = app.get(&format!("/edit/{}", idea.id), Some(&admin)).await;
    assert_eq!(page.status(), StatusCode::OK);

    app.get(&format!("/delete/{}", idea.id), Some(&admin)).await;
    assert!(app.all_ideas().await.is_empty());
}

#[tokio::test]
async fn scope_all_is_ignored_for_regular_users() {
    let app = TestApp::new().await;
    let owner = app.login_as("duena").await;
    let other = app.login_as("vecina").await;
    app.post_idea("/add", &owner, &IdeaSubmission::new("Idea ajena")).await;

    let page = body_text(app.get("/?scope=all", Some(&other)).await).await;
    assert!(!page.contains("Idea ajena"));
}

#[tokio::test]
async fn search_matches_tags_and_status_filter_is_exact() {
    let app = TestApp::new().await;
    let cookie = app.login_as("creadora").await;

    let mut tagged = IdeaSubmission::new("Primera entrada");
    tagged.tags = "cocina, pasteleria";
    app.post_idea("/add", &cookie, &tagged).await;

    let mut done = IdeaSubmission::new("Segunda entrada");
    done.status = "Completada";
    app.post_idea("/add", &cookie, &done).await;

    let mut in_progress = IdeaSubmission::new("Tercera entrada");
    in_progress.status = "En Progreso";
    app.post_idea("/add", &cookie, &in_progress).await;

    let search = body_text(app.get("/?search=PASTEL", Some(&cookie)).await).await;
    assert!(search.contains("Primera entrada"));
    assert!(!search.contains("Segunda entrada"));
    assert!(!search.contains("Tercera entrada"));

    let completed = body_text(app.get("/?status=Completada", Some(&cookie)).await).await;
    assert!(completed.contains("Segunda entrada"));
    assert!(!completed.contains("Primera entrada"));
    assert!(!completed.contains("Tercera entrada"));

    let unknown = body_text(app.get("/?status=Archivada", Some(&cookie)).await).await;
    assert!(!unknown.contains("entrada"));
}

#[tokio::test]
async fn missing_idea_is_not_found() {
    let app = TestApp::new().await;
    let cookie = app.login_as("creadora").await;

    assert_eq!(app.get("/edit/999", Some(&cookie)).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/delete/999", Some(&cookie)).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/uploads/nada.png", None).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_hides_images_whose_file_vanished() {
    let app = TestApp::new().await;
    let cookie = app.login_as("creadora").await;

    let mut form = IdeaSubmission::new("Imagen perdida");
    form.image = Some(("foto.png", png(10, 10)));
    app.post_idea("/add", &cookie, &form).await;
    let filename = app.all_ideas().await[0].image_filename.clone().unwrap();
    std::fs::remove_file(app.uploads.path().join(&filename)).unwrap();

    let page = body_text(app.get("/", Some(&cookie)).await).await;
    assert!(page.contains("Imagen perdida"));
    assert!(!page.contains(&filename));
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
    let app = TestApp::new().await;
    let cookie = app.login_as("creadora").await;

    let res = app.get("/logout", Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let cleared = res
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with("token=") && v.contains("Max-Age=0"));
    assert!(cleared);
}
