use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use slug::slugify;

use crate::model::{Client, CompanyInfo, Invoice, Settings};

// Fixed store keys. External tools reading the data directory rely on these
// exact names and document shapes.
pub const SETTINGS_KEY: &str = "invoiceDragon_settings";
pub const COMPANY_INFO_KEY: &str = "invoiceDragonCompanyInfo";
pub const LOGO_KEY: &str = "invoiceDragonLogo";
pub const INVOICES_KEY: &str = "invoiceDragonInvoices";
pub const CLIENTS_KEY: &str = "invoiceDragonClients";

/// Injected storage capability: get/set/remove by key. The record operations
/// below never touch a concrete backend, so tests substitute an in-memory
/// store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&mut self, key: &str) -> io::Result<()>;
}

/// File-backed store: one file per key under the store directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.key_path(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        fs::write(self.key_path(key), value)
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.key_path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// In-memory store for tests and storage-less contexts.
#[derive(Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn write_json<T: Serialize>(store: &mut dyn KeyValueStore, key: &str, value: &T) -> bool {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            log::error!("Error serializing {}: {}", key, e);
            return false;
        }
    };
    match store.set(key, &json) {
        Ok(()) => true,
        Err(e) => {
            log::error!("Error saving {}: {}", key, e);
            false
        }
    }
}

fn remove_key(store: &mut dyn KeyValueStore, key: &str) -> bool {
    match store.remove(key) {
        Ok(()) => true,
        Err(e) => {
            log::error!("Error clearing {}: {}", key, e);
            false
        }
    }
}

// ==========================================
// Settings
// ==========================================

pub fn save_settings(store: &mut dyn KeyValueStore, settings: &Settings) -> bool {
    write_json(store, SETTINGS_KEY, settings)
}

/// Load settings, merging the stored document over the defaults. A missing,
/// empty, or corrupt document degrades to the full defaults.
pub fn load_settings(store: &dyn KeyValueStore) -> Settings {
    let raw = match store.get(SETTINGS_KEY) {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Settings::default(),
    };
    match serde_json::from_str(&raw) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Error loading settings, falling back to defaults: {}", e);
            Settings::default()
        }
    }
}

pub fn clear_settings(store: &mut dyn KeyValueStore) -> bool {
    remove_key(store, SETTINGS_KEY)
}

// ==========================================
// Company info
// ==========================================

pub fn save_company_info(store: &mut dyn KeyValueStore, info: &CompanyInfo) -> bool {
    write_json(store, COMPANY_INFO_KEY, info)
}

pub fn load_company_info(store: &dyn KeyValueStore) -> Option<CompanyInfo> {
    let raw = store.get(COMPANY_INFO_KEY)?;
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(&raw) {
        Ok(info) => Some(info),
        Err(e) => {
            log::warn!("Error loading company info: {}", e);
            None
        }
    }
}

pub fn clear_company_info(store: &mut dyn KeyValueStore) -> bool {
    remove_key(store, COMPANY_INFO_KEY)
}

// ==========================================
// Logo
// ==========================================

/// The logo is stored as the raw data-URI string, not JSON.
pub fn save_logo(store: &mut dyn KeyValueStore, data: &str) -> bool {
    match store.set(LOGO_KEY, data) {
        Ok(()) => true,
        Err(e) => {
            log::error!("Error saving logo: {}", e);
            false
        }
    }
}

pub fn load_logo(store: &dyn KeyValueStore) -> Option<String> {
    store.get(LOGO_KEY)
}

pub fn clear_logo(store: &mut dyn KeyValueStore) -> bool {
    remove_key(store, LOGO_KEY)
}

// ==========================================
// Invoice history
// ==========================================

pub fn load_invoices(store: &dyn KeyValueStore) -> Vec<Invoice> {
    let raw = match store.get(INVOICES_KEY) {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Vec::new(),
    };
    match serde_json::from_str(&raw) {
        Ok(invoices) => invoices,
        Err(e) => {
            log::warn!("Error loading invoices: {}", e);
            Vec::new()
        }
    }
}

pub fn save_invoices(store: &mut dyn KeyValueStore, invoices: &[Invoice]) -> bool {
    write_json(store, INVOICES_KEY, &invoices)
}

/// Upsert an invoice by id. A blank id gets a generated `inv_{millis}` id and
/// a fresh `created_at`; `updated_at` is stamped on every save. Returns the
/// stored id, or `None` when the write failed.
pub fn save_invoice(store: &mut dyn KeyValueStore, mut invoice: Invoice) -> Option<String> {
    let now = now_iso();
    if invoice.id.is_empty() {
        invoice.id = format!("inv_{}", Utc::now().timestamp_millis());
    }
    invoice.updated_at = now.clone();

    let mut invoices = load_invoices(store);
    match invoices.iter_mut().find(|existing| existing.id == invoice.id) {
        Some(existing) => {
            invoice.created_at = existing.created_at.clone();
            *existing = invoice.clone();
        }
        None => {
            invoice.created_at = now;
            invoices.push(invoice.clone());
        }
    }

    save_invoices(store, &invoices).then_some(invoice.id)
}

pub fn delete_invoice(store: &mut dyn KeyValueStore, id: &str) -> bool {
    let mut invoices = load_invoices(store);
    invoices.retain(|invoice| invoice.id != id);
    save_invoices(store, &invoices)
}

// ==========================================
// Clients
// ==========================================

pub fn load_clients(store: &dyn KeyValueStore) -> Vec<Client> {
    let raw = match store.get(CLIENTS_KEY) {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Vec::new(),
    };
    match serde_json::from_str(&raw) {
        Ok(clients) => clients,
        Err(e) => {
            log::warn!("Error loading clients: {}", e);
            Vec::new()
        }
    }
}

pub fn save_clients(store: &mut dyn KeyValueStore, clients: &[Client]) -> bool {
    write_json(store, CLIENTS_KEY, &clients)
}

/// Upsert a client. Matching is by case-insensitive name equality, not id: a
/// save under an existing name merges into that record (keeping its id and
/// `created_at`) and refreshes `updated_at` instead of creating a duplicate.
pub fn save_client(store: &mut dyn KeyValueStore, mut client: Client) -> bool {
    let now = now_iso();
    let needle = client.name.to_lowercase();

    let mut clients = load_clients(store);
    match clients
        .iter_mut()
        .find(|existing| existing.name.to_lowercase() == needle)
    {
        Some(existing) => {
            client.id = existing.id.clone();
            client.created_at = existing.created_at.clone();
            client.updated_at = now;
            *existing = client;
        }
        None => {
            if client.id.is_empty() {
                client.id = slugify(&client.name);
            }
            client.created_at = now.clone();
            client.updated_at = now;
            clients.push(client);
        }
    }

    save_clients(store, &clients)
}

// ==========================================
// Export / Import / Clear all
// ==========================================

/// Aggregate backup blob. A point-in-time snapshot across the stores with no
/// atomicity guarantee between them; absent stores are simply omitted.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_info: Option<CompanyInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoices: Option<Vec<Invoice>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients: Option<Vec<Client>>,
    #[serde(default)]
    pub exported_at: String,
    #[serde(default)]
    pub app_version: String,
}

pub fn export_all(store: &dyn KeyValueStore) -> BackupData {
    BackupData {
        settings: Some(load_settings(store)),
        company_info: load_company_info(store),
        logo: load_logo(store),
        invoices: Some(load_invoices(store)),
        clients: Some(load_clients(store)),
        exported_at: now_iso(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

pub fn backup_file_name(date: NaiveDate) -> String {
    format!("invoice-dragon-backup-{}.json", date.format("%Y-%m-%d"))
}

/// Parse a backup blob and re-invoke the individual save operations for every
/// top-level key that is present. Unknown keys are skipped. A malformed file
/// is the user's to fix, so the parse error is returned rather than swallowed.
pub fn import_all(store: &mut dyn KeyValueStore, json: &str) -> Result<(), serde_json::Error> {
    let backup: BackupData = serde_json::from_str(json)?;

    if let Some(settings) = &backup.settings {
        save_settings(store, settings);
    }
    if let Some(info) = &backup.company_info {
        save_company_info(store, info);
    }
    if let Some(logo) = &backup.logo {
        save_logo(store, logo);
    }
    if let Some(invoices) = &backup.invoices {
        save_invoices(store, invoices);
    }
    if let Some(clients) = &backup.clients {
        save_clients(store, clients);
    }

    Ok(())
}

/// "Clear all data": settings, company profile, and logo. Invoice history and
/// clients are deleted individually, not here.
pub fn clear_all_data(store: &mut dyn KeyValueStore) -> bool {
    let settings = clear_settings(store);
    let company = clear_company_info(store);
    let logo = clear_logo(store);
    settings && company && logo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LineItem;

    /// Store whose writes always fail, standing in for a full disk.
    struct QuotaExceededStore;

    impl KeyValueStore for QuotaExceededStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&mut self, _key: &str, _value: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "quota exceeded"))
        }

        fn remove(&mut self, _key: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "quota exceeded"))
        }
    }

    fn invoice(id: &str, client_name: &str) -> Invoice {
        Invoice {
            id: id.to_string(),
            form_data: [("clientName".to_string(), client_name.to_string())].into(),
            rows: vec![LineItem::new(0)],
            status: Default::default(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn client(name: &str, email: &str) -> Client {
        Client {
            name: name.to_string(),
            email: Some(email.to_string()),
            ..Client::default()
        }
    }

    #[test]
    fn settings_round_trip_merges_over_defaults() {
        let mut store = MemoryStore::new();
        let mut settings = Settings::default();
        settings.currency = "EUR".to_string();
        settings.default_notes = "Net 30".to_string();

        assert!(save_settings(&mut store, &settings));
        assert_eq!(load_settings(&store), settings);
    }

    #[test]
    fn partial_settings_document_fills_missing_keys() {
        let mut store = MemoryStore::new();
        store.set(SETTINGS_KEY, r#"{"currency":"GBP"}"#).unwrap();

        let loaded = load_settings(&store);
        assert_eq!(loaded.currency, "GBP");
        assert_eq!(loaded.language, "en");
        assert!(loaded.auto_increment);
        assert_eq!(loaded.branding, Default::default());
    }

    #[test]
    fn unknown_settings_keys_survive_a_round_trip() {
        let mut store = MemoryStore::new();
        store
            .set(SETTINGS_KEY, r#"{"currency":"GBP","futureFeature":true}"#)
            .unwrap();

        let loaded = load_settings(&store);
        assert!(save_settings(&mut store, &loaded));

        let raw = store.get(SETTINGS_KEY).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["futureFeature"], serde_json::json!(true));
        assert_eq!(value["currency"], serde_json::json!("GBP"));
    }

    #[test]
    fn corrupt_settings_fall_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.set(SETTINGS_KEY, "invalid json {").unwrap();
        assert_eq!(load_settings(&store), Settings::default());
    }

    #[test]
    fn clear_settings_reverts_to_defaults() {
        let mut store = MemoryStore::new();
        let mut settings = Settings::default();
        settings.currency = "JPY".to_string();
        save_settings(&mut store, &settings);

        assert!(clear_settings(&mut store));
        assert_eq!(load_settings(&store), Settings::default());
    }

    #[test]
    fn company_info_round_trip() {
        let mut store = MemoryStore::new();
        let info = CompanyInfo {
            business_name: Some("Acme Corp".to_string()),
            email: Some("hello@acme.com".to_string()),
            ..CompanyInfo::default()
        };

        assert!(save_company_info(&mut store, &info));
        assert_eq!(load_company_info(&store), Some(info));
    }

    #[test]
    fn missing_or_corrupt_company_info_is_none() {
        let mut store = MemoryStore::new();
        assert_eq!(load_company_info(&store), None);

        store.set(COMPANY_INFO_KEY, "").unwrap();
        assert_eq!(load_company_info(&store), None);

        store.set(COMPANY_INFO_KEY, "invalid json {").unwrap();
        assert_eq!(load_company_info(&store), None);
    }

    #[test]
    fn clear_company_info_is_idempotent() {
        let mut store = MemoryStore::new();
        save_company_info(&mut store, &CompanyInfo::default());

        assert!(clear_company_info(&mut store));
        assert!(clear_company_info(&mut store));
        assert_eq!(load_company_info(&store), None);
    }

    #[test]
    fn logo_is_stored_as_the_raw_string() {
        let mut store = MemoryStore::new();
        let data = "data:image/png;base64,iVBORw0KGgo";

        assert!(save_logo(&mut store, data));
        assert_eq!(store.get(LOGO_KEY).as_deref(), Some(data));
        assert_eq!(load_logo(&store).as_deref(), Some(data));

        assert!(clear_logo(&mut store));
        assert_eq!(load_logo(&store), None);
    }

    #[test]
    fn save_invoice_generates_an_id_and_timestamps() {
        let mut store = MemoryStore::new();
        let id = save_invoice(&mut store, invoice("", "Test")).unwrap();
        assert!(id.starts_with("inv_"));

        let invoices = load_invoices(&store);
        assert_eq!(invoices.len(), 1);
        assert!(!invoices[0].created_at.is_empty());
        assert_eq!(invoices[0].created_at, invoices[0].updated_at);
    }

    #[test]
    fn save_invoice_updates_in_place_by_id() {
        let mut store = MemoryStore::new();
        save_invoice(&mut store, invoice("inv_1", "Test"));
        save_invoice(&mut store, invoice("inv_1", "Updated"));

        let invoices = load_invoices(&store);
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].form_data["clientName"], "Updated");
    }

    #[test]
    fn update_keeps_created_at() {
        let mut store = MemoryStore::new();
        save_invoice(&mut store, invoice("inv_1", "Test"));
        let created = load_invoices(&store)[0].created_at.clone();

        save_invoice(&mut store, invoice("inv_1", "Updated"));
        assert_eq!(load_invoices(&store)[0].created_at, created);
    }

    #[test]
    fn delete_invoice_filters_by_id() {
        let mut store = MemoryStore::new();
        save_invoice(&mut store, invoice("inv_1", "A"));
        save_invoice(&mut store, invoice("inv_2", "B"));

        assert!(delete_invoice(&mut store, "inv_1"));
        let invoices = load_invoices(&store);
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].id, "inv_2");
    }

    #[test]
    fn corrupt_invoices_load_as_empty() {
        let mut store = MemoryStore::new();
        store.set(INVOICES_KEY, "not json").unwrap();
        assert!(load_invoices(&store).is_empty());
    }

    #[test]
    fn client_upsert_matches_name_case_insensitively() {
        let mut store = MemoryStore::new();
        assert!(save_client(&mut store, client("Client A", "old@test.com")));
        assert!(save_client(&mut store, client("client a", "new@test.com")));

        let clients = load_clients(&store);
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].email.as_deref(), Some("new@test.com"));
    }

    #[test]
    fn client_upsert_keeps_id_and_created_at() {
        let mut store = MemoryStore::new();
        save_client(&mut store, client("Client A", "old@test.com"));
        let first = load_clients(&store)[0].clone();
        assert_eq!(first.id, "client-a");

        save_client(&mut store, client("CLIENT A", "new@test.com"));
        let second = load_clients(&store)[0].clone();
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
    }

    #[test]
    fn distinct_names_create_distinct_clients() {
        let mut store = MemoryStore::new();
        save_client(&mut store, client("Client A", "a@test.com"));
        save_client(&mut store, client("Client B", "b@test.com"));
        assert_eq!(load_clients(&store).len(), 2);
    }

    #[test]
    fn corrupt_clients_load_as_empty() {
        let mut store = MemoryStore::new();
        store.set(CLIENTS_KEY, "[{]").unwrap();
        assert!(load_clients(&store).is_empty());
    }

    #[test]
    fn failed_writes_report_false_not_panic() {
        let mut store = QuotaExceededStore;
        assert!(!save_settings(&mut store, &Settings::default()));
        assert!(!save_company_info(&mut store, &CompanyInfo::default()));
        assert!(!save_logo(&mut store, "data:"));
        assert!(save_invoice(&mut store, invoice("inv_1", "A")).is_none());
        assert!(!save_client(&mut store, client("A", "a@test.com")));
        assert!(!clear_settings(&mut store));
    }

    #[test]
    fn export_captures_every_store() {
        let mut store = MemoryStore::new();
        save_company_info(
            &mut store,
            &CompanyInfo {
                business_name: Some("Acme".to_string()),
                ..CompanyInfo::default()
            },
        );
        save_logo(&mut store, "data:image/png;base64,x");
        save_invoice(&mut store, invoice("inv_1", "A"));
        save_client(&mut store, client("Client A", "a@test.com"));

        let backup = export_all(&store);
        assert_eq!(backup.settings, Some(Settings::default()));
        assert!(backup.company_info.is_some());
        assert_eq!(backup.logo.as_deref(), Some("data:image/png;base64,x"));
        assert_eq!(backup.invoices.as_ref().map(Vec::len), Some(1));
        assert_eq!(backup.clients.as_ref().map(Vec::len), Some(1));
        assert_eq!(backup.app_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn import_restores_present_keys_and_skips_unknown() {
        let mut store = MemoryStore::new();
        let json = r#"{
            "settings": {"currency": "EUR"},
            "logo": "data:image/png;base64,y",
            "unknownSection": {"ignored": true},
            "exportedAt": "2026-08-29T00:00:00.000Z",
            "appVersion": "0.1.0"
        }"#;

        import_all(&mut store, json).unwrap();
        assert_eq!(load_settings(&store).currency, "EUR");
        assert_eq!(load_logo(&store).as_deref(), Some("data:image/png;base64,y"));
        assert_eq!(load_company_info(&store), None);
        assert!(load_invoices(&store).is_empty());
    }

    #[test]
    fn import_round_trips_an_export() {
        let mut store = MemoryStore::new();
        save_logo(&mut store, "data:image/png;base64,x");
        save_invoice(&mut store, invoice("inv_1", "A"));
        save_client(&mut store, client("Client A", "a@test.com"));
        let json = serde_json::to_string(&export_all(&store)).unwrap();

        let mut restored = MemoryStore::new();
        import_all(&mut restored, &json).unwrap();
        assert_eq!(load_logo(&restored), load_logo(&store));
        assert_eq!(load_invoices(&restored), load_invoices(&store));
        assert_eq!(load_clients(&restored), load_clients(&store));
    }

    #[test]
    fn import_rejects_malformed_json() {
        let mut store = MemoryStore::new();
        assert!(import_all(&mut store, "not a backup").is_err());
    }

    #[test]
    fn backup_file_name_has_a_date_suffix() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();
        assert_eq!(backup_file_name(date), "invoice-dragon-backup-2026-08-29.json");
    }

    #[test]
    fn clear_all_data_leaves_history_intact() {
        let mut store = MemoryStore::new();
        save_settings(&mut store, &Settings::default());
        save_company_info(&mut store, &CompanyInfo::default());
        save_logo(&mut store, "data:");
        save_invoice(&mut store, invoice("inv_1", "A"));

        assert!(clear_all_data(&mut store));
        assert_eq!(load_settings(&store), Settings::default());
        assert_eq!(load_company_info(&store), None);
        assert_eq!(load_logo(&store), None);
        assert_eq!(load_invoices(&store).len(), 1);
    }

    #[test]
    fn file_store_round_trip_and_idempotent_remove() {
        let dir = std::env::temp_dir().join(format!(
            "invoice-dragon-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let mut store = FileStore::new(dir.clone()).unwrap();

        assert_eq!(store.get(SETTINGS_KEY), None);
        store.set(SETTINGS_KEY, r#"{"currency":"EUR"}"#).unwrap();
        assert_eq!(load_settings(&store).currency, "EUR");

        store.remove(SETTINGS_KEY).unwrap();
        store.remove(SETTINGS_KEY).unwrap();
        assert_eq!(store.get(SETTINGS_KEY), None);

        fs::remove_dir_all(dir).ok();
    }
}
