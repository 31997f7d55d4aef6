use super::*;

#[test]
fn validate_key_accepts_nested_keys() {
    assert!(validate_key("uploads/abc.jpg").is_ok());
    assert!(validate_key("equipment/photos/123.png").is_ok());
}

#[test]
fn validate_key_rejects_traversal_and_absolute() {
    for key in ["", "/etc/passwd", "../secret", "a/../b", "a\\b", "a//b", "./a", "a/", "x..y"] {
        assert!(matches!(validate_key(key), Err(StorageError::InvalidKey(_))), "{key:?} should be rejected");
    }
}

#[test]
fn signer_round_trips_before_expiry() {
    let signer = UrlSigner::new("secret");
    let sig = signer.sign("uploads/a.png", 1_000);
    assert!(signer.verify("uploads/a.png", 1_000, &sig, 999));
    assert!(signer.verify("uploads/a.png", 1_000, &sig, 1_000));
}

#[test]
fn signer_rejects_expired_tampered_or_foreign() {
    let signer = UrlSigner::new("secret");
    let sig = signer.sign("uploads/a.png", 1_000);
    assert!(!signer.verify("uploads/a.png", 1_000, &sig, 1_001));
    assert!(!signer.verify("uploads/b.png", 1_000, &sig, 10));
    assert!(!signer.verify("uploads/a.png", 2_000, &sig, 10));
    assert!(!UrlSigner::new("other").verify("uploads/a.png", 1_000, &sig, 10));
}

#[test]
fn signature_is_a_keyed_sha256_mac() {
    let sig = UrlSigner::new("secret").sign("uploads/a.png", 1_000);
    assert_eq!(sig.len(), 64);
    assert!(sig.bytes().all(|b| b.is_ascii_hexdigit()));
    assert_ne!(sig, UrlSigner::new("secret2").sign("uploads/a.png", 1_000));
}

#[test]
fn signer_rejects_malformed_or_truncated_signatures() {
    let signer = UrlSigner::new("secret");
    let sig = signer.sign("uploads/a.png", 1_000);
    let padded = format!("{sig}00");
    for bad in ["", "zz", &sig[..63], &sig[..62], padded.as_str(), "é"] {
        assert!(!signer.verify("uploads/a.png", 1_000, bad, 10), "{bad:?} accepted");
    }
    assert!(signer.verify("uploads/a.png", 1_000, &sig.to_ascii_uppercase(), 10));
}

#[test]
fn hex_decoding_matches_encoding() {
    let bytes = [0x00, 0x0a, 0xde, 0xad, 0xbe, 0xef];
    assert_eq!(hex_to_bytes(&bytes_to_hex(&bytes)).unwrap(), bytes);
    assert_eq!(hex_to_bytes("0g"), None);
    assert_eq!(hex_to_bytes("abc"), None);
}

#[test]
fn signer_query_has_future_expiry() {
    let signer = UrlSigner::new("s");
    let query = signer.query("k.pdf", Duration::from_secs(60));
    let expires: u64 = query
        .strip_prefix("expires=")
        .and_then(|rest| rest.split('&').next())
        .and_then(|v| v.parse().ok())
        .unwrap();
    assert!(expires >= unix_now() + 59);
    assert!(query.contains("&sig="));
}

#[test]
fn storage_errors_map_to_statuses() {
    assert_eq!(StorageError::InvalidKey("x".into()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(StorageError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
    assert_eq!(StorageError::Backend("x".into()).status(), StatusCode::BAD_GATEWAY);
    assert!(StorageError::Backend("x".into()).retryable());
}

#[tokio::test]
async fn memory_store_put_exists_delete() {
    let store = memory::MemoryStore::default();
    store.put("uploads/a.png", vec![1, 2], "image/png").await.unwrap();
    assert!(store.exists("uploads/a.png").await.unwrap());
    store.delete("uploads/a.png").await.unwrap();
    assert!(!store.exists("uploads/a.png").await.unwrap());
}

#[test]
fn from_config_local_exposes_files() {
    let config = StorageConfig {
        backend: StorageBackend::Local { dir: PathBuf::from("/tmp/fixdesk-test") },
        public_base_url: "http://localhost:3000".into(),
        url_ttl: Duration::from_secs(60),
        url_secret: Some("s".into()),
    };
    let storage = Storage::from_config(config).unwrap();
    let files = storage.files.unwrap();
    assert_eq!(files.root, PathBuf::from("/tmp/fixdesk-test"));
    assert_eq!(storage.url_ttl, Duration::from_secs(60));
}

#[test]
fn from_config_s3_has_no_local_files() {
    let config = StorageConfig {
        backend: StorageBackend::S3 { endpoint: "http://minio:9000".into(), bucket: "fixdesk".into(), token: None },
        public_base_url: "https://cdn.example.com".into(),
        url_ttl: Duration::from_secs(60),
        url_secret: None,
    };
    let storage = Storage::from_config(config).unwrap();
    assert!(storage.files.is_none());
}
