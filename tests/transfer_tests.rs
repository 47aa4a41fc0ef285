//! Export / import through the vault service.

use tempfile::TempDir;

use keyvault::audit::{AuditLedger, AuditQuery};
use keyvault::config::Settings;
use keyvault::crypto::{Cipher, MasterKey, Revealed};
use keyvault::db::Database;
use keyvault::service::{Caller, VaultService};
use keyvault::transfer::{self, Format, MASK};
use keyvault::vault::{Category, NewSecret, SecretFilter};

fn instance() -> (TempDir, VaultService, Caller) {
    let dir = TempDir::new().unwrap();
    let mut service = VaultService::open(dir.path(), &Settings::default()).unwrap();
    let admin = service.bootstrap_admin("admin").unwrap();
    (dir, service, Caller::new(admin))
}

fn sample() -> NewSecret {
    NewSecret {
        category: Category::Database,
        username: Some("root".into()),
        password: Some("p@ss, \"quoted\"".into()),
        url: Some("https://db.example.com".into()),
        notes: Some("line one\nline two".into()),
        tags: vec!["prod".into(), "db".into()],
        ..NewSecret::new("DB-root")
    }
}

#[test]
fn json_export_imports_into_another_instance() {
    let (_a, mut source, admin) = instance();
    source.create_secret(&admin, &sample()).unwrap();

    let json = source.export_secrets(&admin, false).unwrap().to_json().unwrap();

    let (_b, mut target, admin_b) = instance();
    let secrets = transfer::parse_import(&json, Format::Json).unwrap();
    let created = target.import_secrets(&admin_b, &secrets).unwrap();
    assert_eq!(created.len(), 1);

    let revealed = target.read_secret(&admin_b, created[0].id).unwrap();
    assert_eq!(revealed.name, "DB-root");
    assert_eq!(revealed.category, Category::Database);
    assert_eq!(revealed.password.value(), Some("p@ss, \"quoted\""));
    assert_eq!(revealed.notes.value(), Some("line one\nline two"));
    assert_eq!(revealed.url_domain.as_deref(), Some("db.example.com"));
    assert_eq!(revealed.tags.len(), 2);

    let imported = target
        .ledger()
        .query(&AuditQuery {
            action: Some("secrets_imported".into()),
            ..AuditQuery::default()
        })
        .unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].details.as_deref(), Some("count=1"));
}

#[test]
fn masked_export_hides_sensitive_values() {
    let (_dir, mut service, admin) = instance();
    service.create_secret(&admin, &sample()).unwrap();

    let doc = service.export_secrets(&admin, true).unwrap();
    assert_eq!(doc.version, "1.0");
    assert_eq!(doc.count, 1);
    let item = &doc.items[0];
    assert_eq!(item.password.as_deref(), Some(MASK));
    assert_eq!(item.username.as_deref(), Some(MASK));
    assert_eq!(item.url.as_deref(), Some("https://db.example.com"));

    let exported = service
        .ledger()
        .query(&AuditQuery {
            action: Some("secrets_exported".into()),
            ..AuditQuery::default()
        })
        .unwrap();
    assert_eq!(exported[0].details.as_deref(), Some("count=1, masked"));
}

#[test]
fn csv_export_never_contains_passwords() {
    let (_dir, mut service, admin) = instance();
    service.create_secret(&admin, &sample()).unwrap();

    let csv = service.export_secrets(&admin, false).unwrap().to_csv().unwrap();
    assert!(csv.starts_with("Name,Category,Username,URL,Tags,Created At"));
    assert!(csv.contains("DB-root"));
    assert!(!csv.contains("p@ss"));
}

#[test]
fn csv_import_handles_quotes_and_missing_titles() {
    let csv = "Title,Username,Password,URL,Notes\r\n\
               Mail,alice,\"pa,ss\"\"word\",https://mail.example.com,\"multi\nline\"\r\n\
               ,bob,secret,,\r\n";
    let secrets = transfer::parse_import(csv, Format::Csv).unwrap();
    assert_eq!(secrets.len(), 2);

    let (_dir, mut service, admin) = instance();
    let created = service.import_secrets(&admin, &secrets).unwrap();

    let mail = service.read_secret(&admin, created[0].id).unwrap();
    assert_eq!(mail.password.value(), Some("pa,ss\"word"));
    assert_eq!(mail.notes.value(), Some("multi\nline"));
    assert_eq!(created[1].name, "Imported");
}

#[test]
fn export_covers_only_readable_secrets() {
    let (_dir, mut service, admin) = instance();
    let alice = Caller::new(
        service
            .create_user(&admin, &keyvault::identity::NewUser::new("alice", keyvault::identity::Role::User))
            .unwrap(),
    );
    service.create_secret(&admin, &NewSecret::new("admin-only")).unwrap();
    service.create_secret(&alice, &NewSecret::new("alice's")).unwrap();

    let doc = service.export_secrets(&alice, false).unwrap();
    let names: Vec<&str> = doc.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["alice's"]);
    assert_eq!(service.export_secrets(&admin, false).unwrap().count, 2);
}

#[test]
fn undecryptable_fields_degrade_instead_of_failing() {
    let (dir, mut service, admin) = instance();
    service.create_secret(&admin, &sample()).unwrap();
    drop(service);

    // Same database, different master key.
    let db_path = Settings::default().database_path(dir.path());
    let rekeyed = VaultService::new(
        Database::open(&db_path).unwrap(),
        AuditLedger::open(&db_path).unwrap(),
        Cipher::new(&MasterKey::generate()),
    );

    let listed = rekeyed.list_secrets(&admin, &SecretFilter::default()).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].username, Revealed::Failed);

    let doc = rekeyed.export_secrets(&admin, false).unwrap();
    assert_eq!(doc.items[0].password.as_deref(), Some(Revealed::FAILED_MARKER));
    assert_eq!(doc.items[0].name, "DB-root");
}
