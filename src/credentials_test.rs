use super::*;

#[test]
fn access_token_is_preferred() {
    let store = MemoryTokenStore::new();
    store.set("token", "legacy");
    store.set("accessToken", "fresh");
    assert_eq!(credential_token(&store).as_deref(), Some("fresh"));
}

#[test]
fn falls_back_to_legacy_key() {
    let store = MemoryTokenStore::with_token("token", "legacy");
    assert_eq!(credential_token(&store).as_deref(), Some("legacy"));

    store.set("accessToken", "  ");
    assert_eq!(credential_token(&store).as_deref(), Some("legacy"));
}

#[test]
fn missing_credential_is_none() {
    let store = MemoryTokenStore::with_token("accessToken", "t");
    store.remove("accessToken");
    assert_eq!(credential_token(&store), None);
}
