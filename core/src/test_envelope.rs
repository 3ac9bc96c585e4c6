/// end-to-end tests of envelope encryption
///
#[cfg(test)]
mod tests {

    use crate::{
        error::{Error, Result},
        keepers::SecretKeeper,
        CipherKind, EncryptOptions, Envelope, MasterKey, WrappedKey,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use secret_envelope_test_util::{random_text, set_test_passphrase};
    use serde::{Deserialize, Serialize};
    use std::{collections::BTreeMap, sync::Arc};

    /// keeper whose back-end is always unreachable
    #[derive(Debug)]
    struct FailingKeeper {}

    #[async_trait]
    impl SecretKeeper for FailingKeeper {
        fn get_scheme(&self) -> &str {
            "failing"
        }

        async fn wrap(&self, _uri: &str, _nonce: &[u8], _key: &[u8]) -> Result<WrappedKey, Error> {
            Err(Error::OtherError("key service unreachable".to_string()))
        }

        async fn unwrap(&self, _nonce: &[u8], _wk: &WrappedKey) -> Result<Bytes, Error> {
            Err(Error::OtherError("key service unreachable".to_string()))
        }
    }

    fn failing_key() -> MasterKey {
        MasterKey::with_keeper("failing:offline", Arc::new(FailingKeeper {}))
    }

    fn sample() -> Result<Envelope, Error> {
        Envelope::new([
            ("db_password", "hunter2".to_string()),
            ("api_token", random_text(40)),
            ("empty", String::new()),
        ])
    }

    /// replace one stored value in the serialized form
    fn with_value(env: &Envelope, key: &str, value: Option<&str>) -> Result<Envelope, Error> {
        let mut json: serde_json::Value = serde_json::from_str(&env.to_json()?)?;
        let map = json.as_object_mut().expect("envelope is an object");
        match value {
            Some(v) => map.insert(key.to_string(), v.into()),
            None => map.remove(key),
        };
        Envelope::from_json(&json.to_string())
    }

    /// change the first character of one token field (`data:`, `iv:`, or `tag:`)
    fn flip_field(token: &str, field: &str) -> String {
        let start = token.find(field).expect("token has field") + field.len();
        let mut chars: Vec<char> = token.chars().collect();
        chars[start] = if chars[start] == 'A' { 'B' } else { 'A' };
        chars.into_iter().collect()
    }

    #[tokio::test]
    async fn round_trip() -> Result<(), Error> {
        let uri = set_test_passphrase("TEST_E2E_ROUND_TRIP");
        let plain = sample()?;
        let sealed = plain.encrypt(Some(MasterKey::new(&uri))).await?;

        // source is untouched
        assert!(!plain.is_encrypted());
        assert!(plain.tree().is_none());

        for (k, v) in sealed.data() {
            if plain.data()[k].is_empty() {
                assert_eq!(v, "");
            } else {
                assert!(v.starts_with("ENC[AES256_GCM,"), "{} encrypted", k);
            }
        }
        let opened = sealed.decrypt().await?;
        assert_eq!(opened.data(), plain.data());

        // and again after serialization, without the attached tree
        let reloaded = Envelope::from_json(&sealed.to_json()?)?;
        assert!(reloaded.tree().is_none());
        let opened = reloaded.decrypt().await?;
        assert_eq!(opened.data(), plain.data());
        Ok(())
    }

    #[tokio::test]
    async fn state_flags() -> Result<(), Error> {
        let uri = set_test_passphrase("TEST_E2E_STATE_FLAGS");
        let fresh = sample()?;
        assert!(!fresh.is_encrypted());
        assert!(fresh.needs_key());

        let sealed = fresh.encrypt(Some(MasterKey::new(&uri))).await?;
        assert!(sealed.is_encrypted());
        assert!(!sealed.needs_key());
        let block = sealed.metadata().expect("metadata");
        assert_eq!(block.key_groups.len(), 1);
        assert_eq!(block.key_groups[0][0].wrapped.key_uri, uri);
        assert!(block.mac.starts_with("ENC[AES256_GCM,"));

        let opened = sealed.decrypt().await?;
        assert!(!opened.is_encrypted());
        assert!(!opened.needs_key());
        assert!(opened.metadata().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn tampered_values_detected() -> Result<(), Error> {
        let uri = set_test_passphrase("TEST_E2E_TAMPER");
        let sealed = sample()?.encrypt(Some(MasterKey::new(&uri))).await?;

        let token = sealed.data()["db_password"].clone();
        for field in ["data:", "iv:", "tag:"] {
            let flipped = with_value(&sealed, "db_password", Some(&flip_field(&token, field)))?;
            match flipped.decrypt().await {
                Err(e) => assert!(e.is_integrity_failure(), "flipped {}: {}", field, e),
                Ok(_) => panic!("decrypted with flipped {}", field),
            }
        }

        // values that still decrypt, but no longer match the mac
        let blanked = with_value(&sealed, "db_password", Some(""))?;
        assert!(matches!(
            blanked.decrypt().await,
            Err(Error::MacMismatch { .. })
        ));
        let removed = with_value(&sealed, "api_token", None)?;
        match removed.decrypt().await {
            Err(Error::MacMismatch { expected, actual }) => {
                assert_ne!(expected, actual);
                assert_eq!(expected.len(), 128);
            }
            other => panic!("expected mac mismatch, got {:?}", other.map(|_| ())),
        }

        // empty values are stored as-is, but their keys are still covered
        let removed_empty = with_value(&sealed, "empty", None)?;
        assert!(matches!(
            removed_empty.decrypt().await,
            Err(Error::MacMismatch { .. })
        ));
        let injected = with_value(&sealed, "is_admin", Some(""))?;
        assert!(matches!(
            injected.decrypt().await,
            Err(Error::MacMismatch { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn tampered_plain_values_detected() -> Result<(), Error> {
        let uri = set_test_passphrase("TEST_E2E_TAMPER_PLAIN");
        let plain = Envelope::new([("a_pub", "ab"), ("b_pub", "c"), ("s", "x")])?;
        let opt = EncryptOptions::defaults().with_unencrypted_suffix("_pub");
        let sealed = plain.encrypt_with(Some(MasterKey::new(&uri)), &opt).await?;
        assert_eq!(sealed.data()["a_pub"], "ab");
        assert_eq!(sealed.decrypt().await?.data(), plain.data());

        // characters moved from one value to its neighbour
        let shifted = with_value(&sealed, "a_pub", Some("a"))?;
        let shifted = with_value(&shifted, "b_pub", Some("bc"))?;
        assert!(matches!(
            shifted.decrypt().await,
            Err(Error::MacMismatch { .. })
        ));

        // key renamed, value kept
        let renamed = with_value(&sealed, "b_pub", None)?;
        let renamed = with_value(&renamed, "c_pub", Some("c"))?;
        assert!(matches!(
            renamed.decrypt().await,
            Err(Error::MacMismatch { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn tampered_mac_detected() -> Result<(), Error> {
        let uri = set_test_passphrase("TEST_E2E_TAMPER_MAC");
        let sealed = sample()?.encrypt(Some(MasterKey::new(&uri))).await?;

        let mut json: serde_json::Value = serde_json::from_str(&sealed.to_json()?)?;
        let mac = json["sops"]["mac"].as_str().expect("mac").to_string();
        json["sops"]["mac"] = flip_field(&mac, "data:").into();
        let altered = Envelope::from_json(&json.to_string())?;
        let err = altered.decrypt().await.expect_err("altered mac");
        assert!(err.is_integrity_failure());

        // the mac is bound to the timestamp
        let mut json: serde_json::Value = serde_json::from_str(&sealed.to_json()?)?;
        json["sops"]["lastmodified"] = "2001-01-01T00:00:00Z".into();
        let altered = Envelope::from_json(&json.to_string())?;
        let err = altered.decrypt().await.expect_err("altered timestamp");
        assert!(err.is_integrity_failure());
        Ok(())
    }

    #[tokio::test]
    async fn key_requirement() -> Result<(), Error> {
        let uri = set_test_passphrase("TEST_E2E_KEY_REQUIRED");
        let fresh = sample()?;
        match fresh.encrypt(None).await {
            Err(e) => assert!(e.is_key_unavailable(), "{}", e),
            Ok(_) => panic!("encrypted without a key"),
        }

        let opened = fresh
            .encrypt(Some(MasterKey::new(&uri)))
            .await?
            .decrypt()
            .await?;
        let resealed = opened.encrypt(None).await?;
        assert!(resealed.is_encrypted());
        assert_eq!(resealed.decrypt().await?.data(), fresh.data());
        Ok(())
    }

    #[tokio::test]
    async fn key_override() -> Result<(), Error> {
        const K1_VAR: &str = "TEST_E2E_OVERRIDE_K1";
        let k1 = set_test_passphrase(K1_VAR);
        let k2 = set_test_passphrase("TEST_E2E_OVERRIDE_K2");

        let opened = sample()?
            .encrypt(Some(MasterKey::new(&k1)))
            .await?
            .decrypt()
            .await?;
        let rekeyed = opened.encrypt(Some(MasterKey::new(&k2))).await?;

        let groups = &rekeyed.metadata().expect("metadata").key_groups;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[0][0].wrapped.key_uri, k2);
        let tree = rekeyed.tree().expect("tree");
        assert_eq!(tree.metadata.key_groups[0][0].uri(), k2);

        // K1 no longer matters
        std::env::remove_var(K1_VAR);
        let reloaded = Envelope::from_json(&rekeyed.to_json()?)?;
        assert_eq!(reloaded.decrypt().await?.data(), opened.data());
        Ok(())
    }

    #[tokio::test]
    async fn lost_key_unavailable() -> Result<(), Error> {
        const VAR: &str = "TEST_E2E_LOST_KEY";
        let uri = set_test_passphrase(VAR);
        let sealed = sample()?.encrypt(Some(MasterKey::new(&uri))).await?;
        let json = sealed.to_json()?;

        std::env::set_var(VAR, "some other passphrase");
        let err = Envelope::from_json(&json)?
            .decrypt()
            .await
            .expect_err("wrong passphrase");
        assert!(err.is_key_unavailable(), "{}", err);
        Ok(())
    }

    #[derive(Debug, Deserialize, Serialize)]
    struct Config {
        foo: String,
        encrypted: Envelope,
    }

    #[tokio::test]
    async fn embedded_in_json() -> Result<(), Error> {
        let uri = set_test_passphrase("TEST_E2E_EMBEDDED_JSON");
        let config: Config = serde_json::from_str(r#"{"foo":"bar","encrypted":{"key":"value"}}"#)?;
        assert_eq!(config.foo, "bar");
        assert!(!config.encrypted.is_encrypted());
        assert!(config.encrypted.needs_key());

        let sealed = config.encrypted.encrypt(Some(MasterKey::new(&uri))).await?;
        assert!(sealed.is_encrypted());
        assert!(!sealed.needs_key());

        // the whole document serializes with the envelope inline
        let doc = serde_json::to_string(&Config {
            foo: config.foo.clone(),
            encrypted: sealed.clone(),
        })?;
        let parsed: Config = serde_json::from_str(&doc)?;
        assert!(parsed.encrypted.is_encrypted());

        let opened = parsed.encrypted.decrypt().await?;
        let expected: BTreeMap<String, String> =
            [("key".to_string(), "value".to_string())].into_iter().collect();
        assert_eq!(opened.data(), &expected);
        assert!(!opened.is_encrypted());

        let again = opened.encrypt(None).await?;
        assert!(again.is_encrypted());
        Ok(())
    }

    #[tokio::test]
    async fn embedded_in_yaml() -> Result<(), Error> {
        let uri = set_test_passphrase("TEST_E2E_EMBEDDED_YAML");
        let config: Config = serde_yaml::from_str("foo: bar\nencrypted:\n  key: value\n")?;
        let sealed = config.encrypted.encrypt(Some(MasterKey::new(&uri))).await?;

        let doc = serde_yaml::to_string(&Config {
            foo: config.foo,
            encrypted: sealed,
        })?;
        assert!(doc.contains("sops:"));
        assert!(!doc.contains("key: value"), "plaintext leaked: {}", doc);

        let parsed: Config = serde_yaml::from_str(&doc)?;
        let opened = parsed.encrypted.decrypt().await?;
        assert_eq!(opened.data()["key"], "value");
        Ok(())
    }

    #[tokio::test]
    async fn partial_key_failure_reported() -> Result<(), Error> {
        let good = set_test_passphrase("TEST_E2E_PARTIAL_GOOD");
        let plain = sample()?;
        let opened = plain
            .encrypt(Some(MasterKey::new(&good)))
            .await?
            .decrypt()
            .await?;

        // add an unreachable key to the decrypted tree's group
        let mut with_bad = opened.clone();
        if let Some(tree) = with_bad.tree.as_mut() {
            tree.metadata.key_groups[0].insert(0, failing_key());
        }
        let mut meta = with_bad.tree().expect("tree").metadata.clone();
        let (_, report) = meta.generate_data_key().await?;
        assert_eq!(report.failed_uris(), vec!["failing:offline"]);
        assert!(report.to_string().contains("key service unreachable"));

        // encryption proceeds with the remaining key, and says which one was dropped
        let sealed = with_bad.encrypt(None).await?;
        let dropped = sealed.key_storage_report().expect("partial failure reported");
        assert_eq!(dropped.failed_uris(), vec!["failing:offline"]);
        assert!(dropped.to_string().contains("key service unreachable"));
        let groups = &sealed.metadata().expect("metadata").key_groups;
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[0][0].wrapped.key_uri, good);
        let opened_again = sealed.decrypt().await?;
        assert_eq!(opened_again.data(), plain.data());
        assert!(opened_again.key_storage_report().is_none());
        assert!(opened_again
            .encrypt(None)
            .await?
            .key_storage_report()
            .is_none());

        // unless every key is required
        let strict = EncryptOptions::defaults().with_require_all_keys(true);
        match with_bad.encrypt_with(None, &strict).await {
            Err(Error::KeyStorage(report)) => assert_eq!(report.failures.len(), 1),
            other => panic!("expected KeyStorage, got {:?}", other.map(|_| ())),
        }

        // all keys failing is an error
        match plain.encrypt(Some(failing_key())).await {
            Err(Error::KeyStorage(report)) => {
                assert_eq!(report.failed_uris(), vec!["failing:offline"])
            }
            other => panic!("expected KeyStorage, got {:?}", other.map(|_| ())),
        }
        Ok(())
    }

    #[tokio::test]
    async fn unencrypted_suffix() -> Result<(), Error> {
        let uri = set_test_passphrase("TEST_E2E_SUFFIX");
        let plain = Envelope::new([("host_unencrypted", "db.local"), ("password", "hunter2")])?;
        let opt = EncryptOptions::defaults()
            .with_unencrypted_suffix("_unencrypted")
            .with_cipher(CipherKind::XChaCha20Poly1305);
        let sealed = plain.encrypt_with(Some(MasterKey::new(&uri)), &opt).await?;

        assert_eq!(sealed.data()["host_unencrypted"], "db.local");
        assert!(sealed.data()["password"].starts_with("ENC[XCHACHA20_POLY1305,"));
        let block = sealed.metadata().expect("metadata");
        assert_eq!(block.unencrypted_suffix.as_deref(), Some("_unencrypted"));

        let reloaded = Envelope::from_json(&sealed.to_json()?)?;
        assert_eq!(reloaded.decrypt().await?.data(), plain.data());

        // plaintext values are still covered by the mac
        let altered = with_value(&sealed, "host_unencrypted", Some("evil.local"))?;
        assert!(matches!(
            altered.decrypt().await,
            Err(Error::MacMismatch { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn state_misuse() -> Result<(), Error> {
        let uri = set_test_passphrase("TEST_E2E_MISUSE");
        let plain = sample()?;
        assert!(matches!(plain.decrypt().await, Err(Error::NotEncrypted)));

        let sealed = plain.encrypt(Some(MasterKey::new(&uri))).await?;
        assert!(matches!(
            sealed.encrypt(Some(MasterKey::new(&uri))).await,
            Err(Error::AlreadyEncrypted)
        ));
        assert!(matches!(
            sealed.decrypt().await?.decrypt().await,
            Err(Error::NotEncrypted)
        ));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_envelopes() -> Result<(), Error> {
        let uri = set_test_passphrase("TEST_E2E_CONCURRENT");
        let key = MasterKey::for_uri(&uri).await?;

        let mut handles = Vec::new();
        for i in 0..8 {
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                let plain = Envelope::new([("index", i.to_string()), ("text", random_text(64))])?;
                let opened = plain.encrypt(Some(key)).await?.decrypt().await?;
                assert_eq!(opened.data(), plain.data());
                Ok::<_, Error>(i)
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            let done = handle
                .await
                .map_err(|e| Error::OtherError(e.to_string()))??;
            assert_eq!(done, i);
        }
        Ok(())
    }
}
