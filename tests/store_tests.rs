//! Integration tests for credential operations against a real vault.

use std::fs;
use std::path::PathBuf;

use age::secrecy::SecretString;
use passvault::errors::{Result, StoreError, VaultError};
use passvault::vault::{self, with_session, CredentialChanges, InitOptions, NewCredential};
use regex::Regex;
use tempfile::TempDir;
use zeroize::Zeroizing;

const PASSPHRASE: &str = "store-test-passphrase";

fn secret() -> SecretString {
    SecretString::from(PASSPHRASE.to_string())
}

fn new_vault() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("passvault.db");
    vault::init(&path, &secret(), &InitOptions::default().with_work_factor(10)).unwrap();
    (dir, path)
}

#[test]
fn duplicate_add_is_rejected_across_sessions() {
    let (_dir, path) = new_vault();

    with_session(&path, |session| {
        let broker = session.broker(secret())?;
        let mut store = session.store(&broker)?;
        store.add(NewCredential::new("email", "personal", "first"), "one")?;
        Ok(())
    })
    .unwrap();

    let result: Result<()> = with_session(&path, |session| {
        let broker = session.broker(secret())?;
        let mut store = session.store(&broker)?;
        store.add(NewCredential::new("email", "personal", "second"), "two")?;
        Ok(())
    });
    assert!(matches!(
        result,
        Err(VaultError::Store(StoreError::DuplicateCredential { ref fullname, ref name }))
            if fullname == "email" && name == "personal"
    ));

    let (login, password) = with_session(&path, |session| {
        let broker = session.broker(secret())?;
        let store = session.store(&broker)?;
        let login = store.find("email", Some("personal"))?.map(|c| c.login.clone());
        Ok((login, store.reveal("email", "personal")?))
    })
    .unwrap();
    assert_eq!(login.as_deref(), Some("first"));
    assert_eq!(password.as_str(), "one");
}

#[test]
fn rename_and_new_password_persist() {
    let (_dir, path) = new_vault();

    with_session(&path, |session| {
        let broker = session.broker(secret())?;
        let mut store = session.store(&broker)?;
        store.add(
            NewCredential::new("email", "personal", "me").with_comment("old account"),
            "pw-1",
        )?;
        store.update(
            "email",
            "personal",
            CredentialChanges {
                fullname: Some("mail".into()),
                name: Some("home".into()),
                comment: Some(None),
                password: Some(Zeroizing::new("pw-2".into())),
                ..CredentialChanges::default()
            },
        )?;
        Ok(())
    })
    .unwrap();

    with_session(&path, |session| {
        let broker = session.broker(secret())?;
        let store = session.store(&broker)?;
        assert!(store.find("email", Some("personal"))?.is_none());
        let record = store.find("mail", Some("home"))?.expect("renamed record");
        assert_eq!(record.login, "me");
        assert!(record.comment.is_none());
        assert_eq!(store.reveal("mail", "home")?.as_str(), "pw-2");
        Ok(())
    })
    .unwrap();
}

#[test]
fn insertion_order_survives_commit() {
    let (_dir, path) = new_vault();
    let order = ["zulu", "alpha", "mike", "bravo"];

    with_session(&path, |session| {
        let broker = session.broker(secret())?;
        let mut store = session.store(&broker)?;
        for fullname in order {
            store.add(NewCredential::new(fullname, "main", "u"), "p")?;
        }
        Ok(())
    })
    .unwrap();

    let (listed, sorted) = with_session(&path, |session| {
        let broker = session.broker(secret())?;
        let store = session.store(&broker)?;
        let listed: Vec<String> = store.list(|_| true).map(|c| c.fullname.clone()).collect();
        let sorted: Vec<String> = store.list_sorted().iter().map(|c| c.fullname.clone()).collect();
        Ok((listed, sorted))
    })
    .unwrap();

    assert_eq!(listed, order);
    assert_eq!(sorted, ["alpha", "bravo", "mike", "zulu"]);
}

#[test]
fn search_and_ambiguous_lookup() {
    let (_dir, path) = new_vault();

    with_session(&path, |session| {
        let broker = session.broker(secret())?;
        let mut store = session.store(&broker)?;
        store.add(NewCredential::new("email", "personal", "me@home.org"), "1")?;
        store.add(NewCredential::new("email", "work", "me@corp.com"), "2")?;
        store.add(NewCredential::new("bank", "main", "12345"), "3")?;

        let pattern = Regex::new(r"@corp\.com$").unwrap();
        let hits: Vec<_> = store.search(&pattern).map(|c| c.name.clone()).collect();
        assert_eq!(hits, ["work"]);

        assert!(matches!(
            store.find("email", None),
            Err(StoreError::AmbiguousMatch { count: 2, .. })
        ));
        assert_eq!(store.find("bank", None)?.map(|c| c.name.as_str()), Some("main"));
        Ok(())
    })
    .unwrap();
}

#[test]
fn workspace_file_never_holds_plaintext_passwords() {
    let (_dir, path) = new_vault();

    let session = passvault::vault::Session::open(&path).unwrap();
    let broker = session.broker(secret()).unwrap();
    {
        let mut store = session.store(&broker).unwrap();
        store
            .add(NewCredential::new("email", "personal", "me"), "plain-text-marker")
            .unwrap();
    }

    let on_disk = fs::read_to_string(session.workspace().credentials_path()).unwrap();
    assert!(on_disk.contains("\"login\": \"me\""));
    assert!(!on_disk.contains("plain-text-marker"));
    session.abort();
}
