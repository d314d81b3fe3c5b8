//! Loading startup seed files from disk.

use std::io::Write;

use boardstore::{
    application::auth::CredentialResolver,
    domain::auth::{Credentials, ModerationLevel},
    infra::{
        seed::{SeedDocument, SeedError},
        sessions::MemorySessionStore,
    },
};
use tempfile::NamedTempFile;

fn write_seed(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write seed");
    file
}

#[tokio::test]
async fn seed_file_populates_store_and_sessions() {
    let file = write_seed(
        r#"
[global]
rootURL = "https://example.org"

[global.public]
defaultCSS = "ocean"

[[boards]]
id = "g"
public = { title = "Games", defaultCSS = "tea" }

[[sessions]]
user = "admin"
token = "secret"
expires_in_days = 2

[[staff]]
board = "all"
user = "admin"
position = "admin"
"#,
    );

    let seed = SeedDocument::read(file.path()).await.expect("read seed");
    let store = seed.build_store().expect("store");
    assert_eq!(store.global().root_url, "https://example.org");
    assert_eq!(store.global().public.default_css, "ocean");
    assert_eq!(store.board("g").expect("g").config.public.default_css, "tea");

    let sessions = MemorySessionStore::new();
    seed.populate_sessions(&sessions).expect("seed sessions");
    let credentials = Credentials::new("admin", "secret");
    assert!(sessions.is_logged_in(&credentials).await.expect("lookup"));
    assert_eq!(
        sessions.position("g", "admin").await.expect("position"),
        ModerationLevel::Admin
    );
}

#[tokio::test]
async fn missing_and_malformed_files_are_reported() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        SeedDocument::read(&missing).await,
        Err(SeedError::Read { .. })
    ));

    let file = write_seed("[[boards]\nid = ");
    assert!(matches!(
        SeedDocument::read(file.path()).await,
        Err(SeedError::Parse { .. })
    ));
}

#[tokio::test]
async fn invalid_entries_fail_before_any_store_is_built() {
    let file = write_seed(
        r#"
[[boards]]
id = "best"
public = { title = "Reserved" }
"#,
    );
    let seed = SeedDocument::read(file.path()).await.expect("parses");
    assert!(matches!(seed.build_store(), Err(SeedError::Invalid { .. })));

    let duplicate = SeedDocument::parse(
        r#"
[[boards]]
id = "a"
public = { title = "One" }

[[boards]]
id = "a"
public = { title = "Two" }
"#,
    )
    .expect("parses");
    assert!(matches!(
        duplicate.validate(),
        Err(SeedError::DuplicateBoard(id)) if id == "a"
    ));
}
