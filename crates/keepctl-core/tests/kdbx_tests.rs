use keepctl_core::mutation::{Defaults, EntryChanges, NewEntry, PasswordSpec};
use keepctl_core::params::{EntryOp, EntryRequest};
use keepctl_core::{
    navigator, search, Credentials, ErrorKind, KeepassDatabase, Outcome, Session, VaultBackend,
    VaultError,
};
use tempfile::TempDir;

fn fresh_database() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.kdbx");
    KeepassDatabase::create(&path, Credentials::password("correct horse")).unwrap();
    (dir, path)
}

fn open(path: &std::path::Path) -> Session<KeepassDatabase> {
    Session::open(KeepassDatabase::new(path, Credentials::password("correct horse"))).unwrap()
}

#[test]
fn created_database_opens_empty() {
    let (_dir, path) = fresh_database();
    let session = open(&path);
    assert_eq!(session.store().entry_count(), 0);
    assert!(session.store().children(session.store().root()).is_empty());
}

#[test]
fn entry_survives_a_round_trip_with_history() {
    let (_dir, path) = fresh_database();

    open(&path)
        .with_defaults(Defaults::default())
        .entry(EntryRequest {
            group_path: Vec::new(),
            op: EntryOp::Create(NewEntry {
                title: "svc".into(),
                username: Some("admin".into()),
                password: Some(PasswordSpec::Explicit("first".into())),
                tags: Some(vec!["prod".into()]),
                ..NewEntry::default()
            }),
        })
        .unwrap();

    let outcome = open(&path)
        .entry(EntryRequest {
            group_path: Vec::new(),
            op: EntryOp::Modify {
                title: "svc".into(),
                changes: EntryChanges {
                    password: Some(PasswordSpec::Explicit("second".into())),
                    ..EntryChanges::default()
                },
            },
        })
        .unwrap();
    assert!(matches!(outcome, Outcome::Entry(ref r) if r.password == "second"));

    let session = open(&path);
    let store = session.store();
    let id = search::entries_titled(store, store.root(), "svc").unwrap()[0];
    let node = store.node(id).unwrap();
    let entry = node.as_entry().unwrap();

    assert_eq!(node.icon_id, Some(58));
    assert_eq!(entry.username, "admin");
    assert_eq!(entry.password, "second");
    assert_eq!(entry.tags, vec!["prod"]);
    assert_eq!(entry.history.len(), 1);
    assert_eq!(entry.history[0].password, "first");
}

#[test]
fn groups_are_written_in_order() {
    let (_dir, path) = fresh_database();
    let mut session = open(&path);
    let store = session.store_mut();
    navigator::ensure(store, &["Infra", "DB", "Creds"], true).unwrap();
    navigator::ensure(store, &["Apps"], true).unwrap();
    session.save().unwrap();

    let session = open(&path);
    let store = session.store();
    let creds = navigator::resolve(store, &["Infra", "DB", "Creds"]).unwrap();
    assert_eq!(store.path(creds), vec!["Infra", "DB", "Creds"]);
    let names: Vec<_> = store
        .children(store.root())
        .iter()
        .map(|id| store.node(*id).unwrap().name.clone())
        .collect();
    assert_eq!(names, vec!["Infra", "Apps"]);
}

#[test]
fn wrong_password_is_a_credentials_error() {
    let (_dir, path) = fresh_database();
    let mut backend = KeepassDatabase::new(&path, Credentials::password("wrong"));
    let err = backend.open().unwrap_err();

    assert!(matches!(err, VaultError::Credentials(_)), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Backend);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = KeepassDatabase::new(
        dir.path().join("absent.kdbx"),
        Credentials::password("pw"),
    );
    assert!(matches!(backend.open(), Err(VaultError::Io { .. })));
}

#[test]
fn missing_keyfile_is_an_io_error() {
    let (dir, path) = fresh_database();
    let credentials = Credentials::new(
        Some("correct horse".into()),
        Some(dir.path().join("absent.key")),
    )
    .unwrap();
    let mut backend = KeepassDatabase::new(&path, credentials);
    assert!(matches!(backend.open(), Err(VaultError::Io { .. })));
}

#[test]
fn garbage_file_does_not_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.kdbx");
    std::fs::write(&path, b"definitely not a keepass database").unwrap();

    let mut backend = KeepassDatabase::new(&path, Credentials::password("pw"));
    let err = backend.open().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);
}
