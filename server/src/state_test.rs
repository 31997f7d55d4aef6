use super::*;

#[tokio::test]
async fn test_state_has_no_llm_or_local_files() {
    let state = test_helpers::test_app_state();
    assert!(state.llm.is_none());
    assert!(state.files.is_none());
    assert!(state.email.is_none());
    assert_eq!(state.ai_max_tokens, DEFAULT_AI_MAX_TOKENS);
}

#[tokio::test]
async fn builders_override_defaults() {
    let state = test_helpers::test_app_state()
        .with_ai_max_tokens(77)
        .with_email(Some(EmailConfig { resend_api_key: "k".into(), from: "FixDesk <a@b.c>".into() }));
    assert_eq!(state.ai_max_tokens, 77);
    assert_eq!(state.email.as_deref().map(|e| e.from.as_str()), Some("FixDesk <a@b.c>"));
}

#[tokio::test]
async fn cloned_state_shares_the_store() {
    let (state, store) = test_helpers::test_app_state_with_store();
    let clone = state.clone();
    clone.store.put("uploads/a.png", vec![1], "image/png").await.unwrap();
    assert!(store.objects.read().await.contains_key("uploads/a.png"));
    assert!(state.store.exists("uploads/a.png").await.unwrap());
}
