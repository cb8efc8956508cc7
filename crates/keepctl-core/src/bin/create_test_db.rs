use keepctl_core::mutation::{self, Defaults, NewEntry, NewGroup, PasswordSpec};
use keepctl_core::{Credentials, KeepassDatabase, Session};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "test_db.kdbx".to_string());

    KeepassDatabase::create(&path, Credentials::password("password"))?;

    let backend = KeepassDatabase::new(&path, Credentials::password("password"));
    let mut session = Session::open(backend)?;
    let defaults = Defaults::default();

    let applied = mutation::create_group(
        session.store_mut(),
        &["Infra", "DB"],
        NewGroup {
            name: "Creds".to_string(),
            ..NewGroup::default()
        },
        true,
        &defaults,
    )?;
    mutation::create_entry(
        session.store_mut(),
        applied.node,
        NewEntry {
            title: "postgres".to_string(),
            username: Some("admin".to_string()),
            password: Some(PasswordSpec::Explicit("pass".to_string())),
            url: Some("postgres://db.example:5432".to_string()),
            tags: Some(vec!["prod".to_string(), "db".to_string()]),
            ..NewEntry::default()
        },
        &defaults,
    )?;
    let root = session.store().root();
    mutation::create_entry(
        session.store_mut(),
        root,
        NewEntry {
            title: "Test Entry".to_string(),
            username: Some("user".to_string()),
            url: Some("http://example.com".to_string()),
            ..NewEntry::default()
        },
        &defaults,
    )?;
    session.save()?;

    println!("Created {path} with password 'password'");
    Ok(())
}
