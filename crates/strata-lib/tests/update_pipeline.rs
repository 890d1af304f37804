//! End-to-end pipeline runs against a mock metadata/download server.

use sha1::{Digest, Sha1};
use std::path::Path;
use std::sync::Arc;
use strata_lib::error::Error;
use strata_lib::game::config::Endpoints;
use strata_lib::game::update::{SilentProgressReporter, UpdatePipeline, UpdateSpec};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

async fn mount_json(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(server)
        .await;
}

async fn mount_bytes(server: &MockServer, route: &str, bytes: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
        .mount(server)
        .await;
}

fn write_patch(dir: &Path, name: &str, body: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), body).unwrap();
}

fn spec_for(tmp: &TempDir) -> UpdateSpec {
    UpdateSpec::new(
        "1.5.2",
        tmp.path().join("data"),
        tmp.path().join("instance/minecraft"),
    )
}

/// Seed the instance with minecraft + lwjgl patches so stage 1 stays
/// offline.
fn seed_core_patches(spec: &UpdateSpec) {
    write_patch(
        &spec.patches_dir(),
        "net.minecraft.json",
        r#"{
            "id": "net.minecraft",
            "version": "1.5.2",
            "order": 0,
            "type": "release",
            "assets": "legacy",
            "mainClass": "net.minecraft.client.Minecraft",
            "minecraftArguments": "--username ${auth_player_name}"
        }"#,
    );
    write_patch(
        &spec.patches_dir(),
        "org.lwjgl.json",
        r#"{"id": "org.lwjgl", "version": "2.9.1", "order": 0}"#,
    );
}

fn asset_index_body(objects: &[(&str, &[u8])]) -> String {
    let entries: Vec<String> = objects
        .iter()
        .map(|(name, bytes)| {
            format!(
                r#""{}": {{"hash": "{}", "size": {}}}"#,
                name,
                sha1_hex(bytes),
                bytes.len()
            )
        })
        .collect();
    format!(r#"{{"objects": {{{}}}}}"#, entries.join(","))
}

fn seed_asset_object(spec: &UpdateSpec, bytes: &[u8]) {
    let hash = sha1_hex(bytes);
    let path = spec
        .objects_dir()
        .join(&hash[..2])
        .join(&hash);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

#[tokio::test]
async fn fresh_instance_installs_components_and_downloads_everything() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let spec = spec_for(&tmp);

    mount_json(
        &server,
        "/meta/index.json",
        r#"{"index": [
            {"uid": "net.minecraft", "name": "Minecraft"},
            {"uid": "org.lwjgl", "name": "LWJGL"}
        ]}"#
        .to_string(),
    )
    .await;
    mount_json(
        &server,
        "/meta/net.minecraft.json",
        r#"{"name": "Minecraft", "versions": [
            {"version": "1.5.2", "type": "release", "releaseTime": "2013-04-25T15:45:00Z",
             "requires": [{"uid": "org.lwjgl", "version": "2.9.1"}]}
        ]}"#
        .to_string(),
    )
    .await;
    mount_json(
        &server,
        "/meta/net.minecraft/1.5.2.json",
        r#"{
            "uid": "net.minecraft",
            "version": "1.5.2",
            "type": "release",
            "order": 0,
            "assets": "legacy",
            "mainClass": "net.minecraft.client.Minecraft",
            "minecraftArguments": "--username ${auth_player_name}",
            "libraries": [{"name": "com.google.guava:guava:12.0.1"}]
        }"#
        .to_string(),
    )
    .await;
    mount_json(
        &server,
        "/meta/org.lwjgl.json",
        r#"{"name": "LWJGL", "versions": [
            {"version": "2.9.1", "type": "release", "releaseTime": "2013-01-01T00:00:00Z"}
        ]}"#
        .to_string(),
    )
    .await;
    mount_json(
        &server,
        "/meta/org.lwjgl/2.9.1.json",
        r#"{
            "uid": "org.lwjgl",
            "version": "2.9.1",
            "order": 0,
            "libraries": [{"name": "org.lwjgl.lwjgl:lwjgl:2.9.1"}]
        }"#
        .to_string(),
    )
    .await;

    mount_bytes(&server, "/versions/1.5.2/1.5.2.jar", b"client jar".to_vec()).await;
    mount_bytes(
        &server,
        "/libraries/com/google/guava/guava/12.0.1/guava-12.0.1.jar",
        b"guava".to_vec(),
    )
    .await;
    mount_bytes(
        &server,
        "/libraries/org/lwjgl/lwjgl/lwjgl/2.9.1/lwjgl-2.9.1.jar",
        b"lwjgl".to_vec(),
    )
    .await;

    let present: &[u8] = b"present-bytes";
    let missing: &[u8] = b"missing-bytes";
    mount_json(
        &server,
        "/indexes/legacy.json",
        asset_index_body(&[("icons/present.png", present), ("icons/missing.png", missing)]),
    )
    .await;
    seed_asset_object(&spec, present);
    // only the missing object is served; a request for the present one
    // would 404 and fail the run
    let missing_hash = sha1_hex(missing);
    mount_bytes(
        &server,
        &format!("/resources/{}/{}", &missing_hash[..2], missing_hash),
        missing.to_vec(),
    )
    .await;

    let endpoints = Endpoints::with_root(&server.uri());
    let mut pipeline =
        UpdatePipeline::new(spec.clone(), endpoints, Arc::new(SilentProgressReporter)).unwrap();
    pipeline.run().await.unwrap();

    // components were installed as patches
    assert!(spec.patches_dir().join("net.minecraft.json").is_file());
    assert!(spec.patches_dir().join("org.lwjgl.json").is_file());

    // the profile reflects the merged stack
    let profile = pipeline.profile().unwrap();
    assert_eq!(profile.minecraft_version, "1.5.2");
    assert_eq!(profile.main_class, "net.minecraft.client.Minecraft");
    assert_eq!(profile.libraries.len(), 2);

    // downloads landed in the cache buckets
    let cache_root = spec.cache_root.clone();
    assert!(cache_root.join("versions/1.5.2/1.5.2.jar").is_file());
    assert!(cache_root
        .join("libraries/com/google/guava/guava/12.0.1/guava-12.0.1.jar")
        .is_file());
    assert!(cache_root
        .join("libraries/org/lwjgl/lwjgl/lwjgl/2.9.1/lwjgl-2.9.1.jar")
        .is_file());

    // exactly the missing asset object was fetched
    let fetched = spec
        .objects_dir()
        .join(&missing_hash[..2])
        .join(&missing_hash);
    assert_eq!(std::fs::read(fetched).unwrap(), missing);
}

#[tokio::test]
async fn second_run_downloads_nothing_new() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let spec = spec_for(&tmp);
    seed_core_patches(&spec);

    mount_bytes(&server, "/versions/1.5.2/1.5.2.jar", b"client jar".to_vec()).await;
    mount_json(&server, "/indexes/legacy.json", asset_index_body(&[])).await;

    let endpoints = Endpoints::with_root(&server.uri());
    let mut pipeline = UpdatePipeline::new(
        spec.clone(),
        endpoints.clone(),
        Arc::new(SilentProgressReporter),
    )
    .unwrap();
    pipeline.run().await.unwrap();

    // wipe the mocks: any further request would fail the second run
    server.reset().await;
    let mut pipeline =
        UpdatePipeline::new(spec, endpoints, Arc::new(SilentProgressReporter)).unwrap();
    pipeline.run().await.unwrap();
}

#[tokio::test]
async fn missing_local_library_fails_fatally_naming_the_file() {
    let tmp = TempDir::new().unwrap();
    let spec = spec_for(&tmp);
    write_patch(
        &spec.patches_dir(),
        "net.minecraft.json",
        r#"{
            "id": "net.minecraft",
            "version": "1.5.2",
            "order": 0,
            "mainClass": "net.minecraft.client.Minecraft",
            "libraries": [
                {"name": "local:only:1", "hint": "local", "storage": "local/only-1.jar"}
            ]
        }"#,
    );
    write_patch(
        &spec.patches_dir(),
        "org.lwjgl.json",
        r#"{"id": "org.lwjgl", "version": "2.9.1", "order": 0}"#,
    );

    // never contacted: the stage fails before any network job runs
    let endpoints = Endpoints::with_root("http://127.0.0.1:1");
    let mut pipeline =
        UpdatePipeline::new(spec, endpoints, Arc::new(SilentProgressReporter)).unwrap();
    let err = pipeline.run().await.unwrap_err();
    match err {
        Error::ResourceMissing { files, .. } => {
            assert_eq!(files, vec!["local/only-1.jar".to_string()]);
        }
        other => panic!("expected ResourceMissing, got {other:?}"),
    }
}

#[tokio::test]
async fn unresolvable_jar_mod_fails_fatally_naming_every_mod() {
    let tmp = TempDir::new().unwrap();
    let spec = spec_for(&tmp);
    write_patch(
        &spec.patches_dir(),
        "net.minecraft.json",
        r#"{
            "id": "net.minecraft",
            "version": "1.5.2",
            "order": 0,
            "mainClass": "net.minecraft.client.Minecraft"
        }"#,
    );
    write_patch(
        &spec.patches_dir(),
        "org.lwjgl.json",
        r#"{"id": "org.lwjgl", "version": "2.9.1", "order": 0}"#,
    );
    write_patch(
        &spec.patches_dir(),
        "me.mods.json",
        r#"{"id": "me.mods", "order": 5, "jarMods": [
            {"name": "gone.jar", "originalName": "Some Old Mod"},
            {"name": "also-gone.jar"}
        ]}"#,
    );

    let endpoints = Endpoints::with_root("http://127.0.0.1:1");
    let mut pipeline =
        UpdatePipeline::new(spec, endpoints, Arc::new(SilentProgressReporter)).unwrap();
    let err = pipeline.run().await.unwrap_err();
    match err {
        Error::ResourceMissing { files, .. } => {
            assert_eq!(
                files,
                vec!["Some Old Mod".to_string(), "also-gone.jar".to_string()]
            );
        }
        other => panic!("expected ResourceMissing, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_asset_downloads_aggregate_into_one_error() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let spec = spec_for(&tmp);
    seed_core_patches(&spec);

    mount_bytes(&server, "/versions/1.5.2/1.5.2.jar", b"client jar".to_vec()).await;
    let a: &[u8] = b"object-a";
    let b: &[u8] = b"object-b";
    mount_json(
        &server,
        "/indexes/legacy.json",
        asset_index_body(&[("sounds/a.ogg", a), ("sounds/b.ogg", b)]),
    )
    .await;
    // no resource mocks: every object download 404s

    let endpoints = Endpoints::with_root(&server.uri());
    let mut pipeline =
        UpdatePipeline::new(spec, endpoints, Arc::new(SilentProgressReporter)).unwrap();
    let err = pipeline.run().await.unwrap_err();
    match err {
        Error::Network { job, failures } => {
            assert_eq!(job, "Assets for legacy");
            assert_eq!(failures.len(), 2);
            let names: Vec<_> = failures.iter().map(|f| f.name.as_str()).collect();
            assert!(names.contains(&"sounds/a.ogg"));
            assert!(names.contains(&"sounds/b.ogg"));
        }
        other => panic!("expected Network, got {other:?}"),
    }
}

#[tokio::test]
async fn corrupt_asset_index_is_evicted_and_refetched_once() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let spec = spec_for(&tmp);
    seed_core_patches(&spec);

    mount_bytes(&server, "/versions/1.5.2/1.5.2.jar", b"client jar".to_vec()).await;
    // first response is garbage, the retry gets a usable document
    Mock::given(method("GET"))
        .and(path("/indexes/legacy.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{ nope", "application/json"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_json(&server, "/indexes/legacy.json", asset_index_body(&[])).await;

    let endpoints = Endpoints::with_root(&server.uri());
    let mut pipeline =
        UpdatePipeline::new(spec.clone(), endpoints, Arc::new(SilentProgressReporter)).unwrap();
    pipeline.run().await.unwrap();

    let cached = std::fs::read_to_string(spec.cache_root.join("asset_indexes/legacy.json")).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&cached).is_ok());
}
