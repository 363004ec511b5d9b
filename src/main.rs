mod formatting;
mod model;
mod numbering;
mod session;
mod storage;
mod validation;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Local;
use clap::{Parser, Subcommand};
use comfy_table::{Attribute, Cell, Color, Table};
use directories::{BaseDirs, ProjectDirs};
use inquire::{Confirm, Select, Text};
use serde::{Deserialize, Serialize};

use crate::model::{
    Client, FIELD_CLIENT_NAME, FIELD_DATE, FIELD_INVOICE_NO, FIELD_NOTES, Invoice, InvoiceStatus,
    Theme,
};
use crate::session::{Mode, RowField, Session};
use crate::storage::FileStore;

// ==========================================
// Constants
// ==========================================
const NEW_CLIENT_OPT: &str = "➕ Add New Client";
const NO_CLIENT_OPT: &str = "✏️  Enter Manually";

// ==========================================
// Structs & Enums
// ==========================================

#[derive(Debug, Serialize, Deserialize)]
struct AppConfig {
    data_root: String,
}

#[derive(Parser)]
#[command(name = "invoice-dragon")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new invoice
    New,
    /// List saved invoices
    Invoices,
    /// Delete a saved invoice
    Delete,
    /// List saved clients
    Clients,
    /// Add a new client
    AddClient,
    /// Edit application settings
    Settings,
    /// Set or clear the saved logo
    Logo {
        /// Path to an image file; omit to clear the logo
        path: Option<PathBuf>,
    },
    /// Export all data to a JSON backup file
    Export {
        /// Output path (defaults to a dated file in the current directory)
        path: Option<PathBuf>,
    },
    /// Import data from a JSON backup file
    Import { path: PathBuf },
    /// Clear saved settings, company info and logo
    ClearData,
    /// Configure data directory
    Config,
}

// ==========================================
// Main Function
// ==========================================

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = load_app_config().unwrap_or_else(setup_config_wizard);
    let root = PathBuf::from(expand_home_dir(&config.data_root));

    let mut store = match FileStore::new(root.join("store")) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("❌ Error: Failed to open data directory: {}", e);
            return;
        }
    };

    if cli.command.is_none() {
        use clap::CommandFactory;
        Cli::command().print_help().ok();
        return;
    }

    match cli.command.unwrap() {
        Commands::New => {
            new_invoice_wizard(&mut store);
        }
        Commands::Invoices => {
            list_invoices(&store);
        }
        Commands::Delete => {
            delete_invoice_wizard(&mut store);
        }
        Commands::Clients => {
            list_clients(&store);
        }
        Commands::AddClient => {
            create_client_wizard(&mut store);
        }
        Commands::Settings => {
            settings_wizard(&mut store);
        }
        Commands::Logo { path } => {
            update_logo(&mut store, path.as_deref());
        }
        Commands::Export { path } => {
            export_data(&store, path);
        }
        Commands::Import { path } => {
            import_data(&mut store, &path);
        }
        Commands::ClearData => {
            clear_data_wizard(&mut store);
        }
        Commands::Config => {
            setup_config_wizard();
        }
    }
}

// ==========================================
// 1. Invoice Session Wizard
// ==========================================

fn new_invoice_wizard(store: &mut FileStore) {
    let settings = storage::load_settings(store);
    let mut session = Session::new();
    session.start(store, &settings);
    session.currency_code = settings.currency.clone();
    session.currency_symbol = currency_symbol(&settings.currency).to_string();

    println!("\n--- Business Details ---");
    for (field, label) in [
        ("businessName", "Business Name:"),
        ("email", "Business Email:"),
        ("address", "Business Address:"),
        ("city", "City:"),
        ("zipcode", "Zip Code:"),
        ("phone", "Phone:"),
        ("website", "Website:"),
    ] {
        let prompt = Text::new(label).with_initial_value(session.field(field));
        match prompt.prompt() {
            Ok(value) => session.set_field(field, &value, Instant::now()),
            Err(_) => std::process::exit(0),
        }
    }

    enter_client_details(store, &mut session);

    if let Ok(number) = Text::new("Invoice Number:")
        .with_initial_value(session.field(FIELD_INVOICE_NO))
        .prompt()
    {
        session.set_field(FIELD_INVOICE_NO, &number, Instant::now());
    }
    let date = Local::now().date_naive().format("%m/%d/%Y").to_string();
    session.set_field(FIELD_DATE, &date, Instant::now());

    enter_line_items(&mut session);

    if let Ok(notes) = Text::new("Notes:")
        .with_initial_value(session.field(FIELD_NOTES))
        .prompt()
    {
        session.set_field(FIELD_NOTES, &notes, Instant::now());
    }

    // The debounce window has long passed by the time the prompts finish, but
    // the session is ending either way.
    if let Some(info) = session.flush_autosave() {
        storage::save_company_info(store, &info);
    }

    let result = session.try_preview();
    if !result.valid {
        println!("\n❌ Invoice is not ready:");
        for error in &result.errors {
            println!("   • {}", error);
        }
        return;
    }
    debug_assert_eq!(session.mode(), Mode::Previewing);

    print_preview(&session);

    let save = Confirm::new("Save this invoice to history?")
        .with_default(true)
        .prompt()
        .unwrap_or(false);
    if !save {
        session.back_to_edit();
        println!("Discarded.");
        return;
    }

    match storage::save_invoice(store, session.snapshot("")) {
        Some(id) => println!("✅ Invoice saved: {}", id),
        None => println!("❌ Could not save invoice; it only exists in this session."),
    }
}

fn enter_client_details(store: &mut FileStore, session: &mut Session) {
    println!("\n--- Client Details ---");

    let clients = storage::load_clients(store);
    let mut options = vec![NO_CLIENT_OPT.to_string(), NEW_CLIENT_OPT.to_string()];
    options.extend(clients.iter().map(|c| c.name.clone()));

    let choice = match Select::new("Bill To (Type to Filter):", options).prompt() {
        Ok(choice) => choice,
        Err(_) => std::process::exit(0),
    };

    let client = if choice == NEW_CLIENT_OPT {
        create_client_wizard(store)
    } else if choice == NO_CLIENT_OPT {
        None
    } else {
        clients.into_iter().find(|c| c.name == choice)
    };

    match client {
        Some(client) => {
            session.set_field(FIELD_CLIENT_NAME, &client.name, Instant::now());
            for (field, value) in [
                ("clientEmail", &client.email),
                ("clientAddress", &client.address),
                ("clientCity", &client.city),
                ("clientZipcode", &client.zipcode),
                ("clientPhone", &client.phone),
            ] {
                if let Some(value) = value {
                    session.set_field(field, value, Instant::now());
                }
            }
        }
        None => {
            for (field, label) in [
                (FIELD_CLIENT_NAME, "Client Name:"),
                ("clientEmail", "Client Email:"),
                ("clientAddress", "Client Address:"),
                ("clientCity", "Client City:"),
                ("clientZipcode", "Client Zip Code:"),
                ("clientPhone", "Client Phone:"),
            ] {
                if let Ok(value) = Text::new(label).prompt() {
                    session.set_field(field, &value, Instant::now());
                }
            }
        }
    }
}

fn enter_line_items(session: &mut Session) {
    println!("\n--- Enter Line Items ---");
    println!("(Leave Description empty to finish)");

    let mut row_id = session.rows.first().map(|row| row.id);
    loop {
        let id = match row_id.take() {
            Some(id) => id,
            None => session.add_row(),
        };

        let desc = Text::new("Description (leave empty to finish):")
            .prompt()
            .unwrap_or_default();
        if desc.trim().is_empty() {
            session.remove_row(id);
            break;
        }
        session.update_row(id, RowField::Description, &desc);

        let rate = Text::new("Rate:").prompt().unwrap_or_default();
        session.update_row(id, RowField::Rate, &rate);

        let quantity = Text::new("Quantity:")
            .with_default("1")
            .prompt()
            .unwrap_or_default();
        session.update_row(id, RowField::Quantity, &quantity);
    }
}

fn print_preview(session: &Session) {
    println!("\n--- {} ---", session.field(FIELD_INVOICE_NO));
    println!(
        "From: {}   To: {}   Date: {}",
        session.field("businessName"),
        session.field(FIELD_CLIENT_NAME),
        session.field(FIELD_DATE)
    );

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Description"),
        Cell::new("Rate"),
        Cell::new("Qty"),
        Cell::new("Amount"),
    ]);
    for row in &session.rows {
        table.add_row(vec![
            Cell::new(&row.description),
            Cell::new(format!("{}{:.2}", session.currency_symbol, row.rate)),
            Cell::new(row.quantity),
            Cell::new(format!("{}{}", session.currency_symbol, row.amount)),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format!("{}{}", session.currency_symbol, session.total()))
            .add_attribute(Attribute::Bold),
    ]);
    println!("{table}");

    let notes = session.field(FIELD_NOTES);
    if !notes.is_empty() {
        println!("Notes: {}", notes);
    }
}

// ==========================================
// 2. Invoice History
// ==========================================

fn invoice_total(invoice: &Invoice) -> f64 {
    invoice.rows.iter().map(|row| session::parse_amount(&row.amount)).sum()
}

fn invoice_label(invoice: &Invoice) -> String {
    let number = invoice
        .form_data
        .get(FIELD_INVOICE_NO)
        .cloned()
        .unwrap_or_else(|| invoice.id.clone());
    let client = invoice
        .form_data
        .get(FIELD_CLIENT_NAME)
        .map(String::as_str)
        .unwrap_or("Unknown Client");
    format!("{} | {}", number, client)
}

fn list_invoices(store: &FileStore) {
    let invoices = storage::load_invoices(store);
    if invoices.is_empty() {
        println!("(No invoices saved yet)");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Invoice"),
        Cell::new("Client"),
        Cell::new("Total"),
        Cell::new("Status"),
        Cell::new("Updated"),
    ]);

    for invoice in &invoices {
        let status = format!("{:?}", invoice.status).to_uppercase();
        let status_cell = match invoice.status {
            InvoiceStatus::Paid => Cell::new(status).fg(Color::Rgb { r: 4, g: 120, b: 87 }),
            InvoiceStatus::Void => Cell::new(status).fg(Color::Rgb { r: 185, g: 28, b: 28 }),
            InvoiceStatus::Draft => Cell::new(status),
        };
        table.add_row(vec![
            Cell::new(
                invoice
                    .form_data
                    .get(FIELD_INVOICE_NO)
                    .unwrap_or(&invoice.id),
            ),
            Cell::new(
                invoice
                    .form_data
                    .get(FIELD_CLIENT_NAME)
                    .map(String::as_str)
                    .unwrap_or(""),
            ),
            Cell::new(format!("${:.2}", invoice_total(invoice))),
            status_cell,
            Cell::new(invoice.updated_at.get(..10).unwrap_or("")),
        ]);
    }

    println!("--- Saved Invoices ---");
    println!("{table}");
}

fn delete_invoice_wizard(store: &mut FileStore) {
    let invoices = storage::load_invoices(store);
    if invoices.is_empty() {
        println!("❌ No invoices to delete.");
        return;
    }

    let options: Vec<String> = invoices.iter().map(invoice_label).collect();
    let selection = Select::new("Select Invoice to DELETE:", options.clone())
        .with_page_size(10)
        .prompt();

    match selection {
        Ok(choice) => {
            let index = options.iter().position(|label| *label == choice).unwrap_or(0);
            let id = invoices[index].id.clone();

            let confirmed = Confirm::new("Delete this invoice? This cannot be undone.")
                .with_default(false)
                .prompt()
                .unwrap_or(false);
            if !confirmed {
                println!("Cancelled");
                return;
            }

            if storage::delete_invoice(store, &id) {
                println!("✅ Invoice deleted.");
            } else {
                println!("❌ Failed to delete invoice.");
            }
        }
        Err(_) => println!("Cancelled"),
    }
}

// ==========================================
// 3. Client Logic
// ==========================================

fn list_clients(store: &FileStore) {
    let clients = storage::load_clients(store);
    if clients.is_empty() {
        println!("(No clients saved yet)");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Name"),
        Cell::new("Email"),
        Cell::new("City"),
        Cell::new("Phone"),
    ]);
    for client in &clients {
        table.add_row(vec![
            Cell::new(&client.name),
            Cell::new(client.email.as_deref().unwrap_or("")),
            Cell::new(client.city.as_deref().unwrap_or("")),
            Cell::new(client.phone.as_deref().unwrap_or("")),
        ]);
    }

    println!("--- Saved Clients ---");
    println!("{table}");
}

fn create_client_wizard(store: &mut FileStore) -> Option<Client> {
    println!("\n--- Creating New Client ---");

    let name = match Text::new("Client Name:").prompt() {
        Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
        Ok(_) => {
            println!("❌ A client needs a name.");
            return None;
        }
        Err(_) => std::process::exit(0),
    };

    let optional = |label: &str, default: &str| -> Option<String> {
        Text::new(label)
            .with_default(default)
            .prompt()
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let email = optional("Client Email (Optional):", "");
    let address = optional("Street (Optional):", "");

    let zipcode = optional("Zip Code (Leave empty to skip lookup):", "");
    let mut def_city = String::new();
    if let Some(zip) = &zipcode {
        if let Ok(results) = zipcodes::matching(zip, None) {
            if let Some(info) = results.first() {
                println!("🚀 Found: {}, {}", info.city, info.state);
                def_city = info.city.to_string();
            }
        }
    }
    let city = optional("City:", &def_city);
    let phone = optional("Phone (Optional):", "");

    let client = Client {
        name,
        email,
        address,
        city,
        zipcode,
        phone,
        ..Client::default()
    };

    if storage::save_client(store, client.clone()) {
        println!("✅ Client saved: {}", client.name);
        // Re-read so the caller sees the merged record, not just the input.
        storage::load_clients(store)
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(&client.name))
    } else {
        println!("❌ Failed to save client; using details for this invoice only.");
        Some(client)
    }
}

// ==========================================
// 4. Settings & Data Management
// ==========================================

fn settings_wizard(store: &mut FileStore) {
    println!("\n⚙️  --- Settings ---");
    let mut settings = storage::load_settings(store);

    if let Ok(currency) = Text::new("Currency (ISO code):")
        .with_initial_value(&settings.currency)
        .prompt()
    {
        settings.currency = currency.trim().to_uppercase();
    }

    settings.auto_increment = Confirm::new("Auto-increment invoice numbers?")
        .with_default(settings.auto_increment)
        .prompt()
        .unwrap_or(settings.auto_increment);

    if settings.auto_increment {
        if let Ok(format) = Text::new("Invoice number format:")
            .with_initial_value(&settings.auto_increment_format)
            .prompt()
        {
            settings.auto_increment_format = format;
        }
    }

    if let Ok(notes) = Text::new("Default payment terms/notes:")
        .with_initial_value(&settings.default_notes)
        .prompt()
    {
        settings.default_notes = notes;
    }

    if let Ok(theme) = Select::new("Theme:", vec!["light", "dark"]).prompt() {
        settings.theme = if theme == "dark" { Theme::Dark } else { Theme::Light };
    }

    if storage::save_settings(store, &settings) {
        println!("✅ Settings saved.");
    } else {
        println!("❌ Failed to save settings.");
    }
}

fn update_logo(store: &mut FileStore, path: Option<&Path>) {
    let Some(path) = path else {
        if storage::clear_logo(store) {
            println!("✅ Logo cleared.");
        } else {
            println!("❌ Failed to clear logo.");
        }
        return;
    };

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            println!("❌ Error: Failed to read {}: {}", path.display(), e);
            return;
        }
    };

    let mime = match path.extension().and_then(|ext| ext.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "image/png",
    };
    let data_uri = format!("data:{};base64,{}", mime, BASE64.encode(bytes));

    if storage::save_logo(store, &data_uri) {
        println!("✅ Logo saved.");
    } else {
        println!("❌ Failed to save logo.");
    }
}

fn export_data(store: &FileStore, path: Option<PathBuf>) {
    let path = path.unwrap_or_else(|| {
        PathBuf::from(storage::backup_file_name(Local::now().date_naive()))
    });

    let backup = storage::export_all(store);
    let json = match serde_json::to_string_pretty(&backup) {
        Ok(json) => json,
        Err(e) => {
            println!("❌ Error: Failed to serialize backup: {}", e);
            return;
        }
    };

    match fs::write(&path, json) {
        Ok(()) => println!("✅ Exported to {}", path.display()),
        Err(e) => println!("❌ Error: Failed to write {}: {}", path.display(), e),
    }
}

fn import_data(store: &mut FileStore, path: &Path) {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) => {
            println!("❌ Error: Failed to read {}: {}", path.display(), e);
            return;
        }
    };

    match storage::import_all(store, &json) {
        Ok(()) => println!("✅ Import complete. Restart any open sessions to pick up the data."),
        Err(e) => println!("❌ Error: Not a valid backup file: {}", e),
    }
}

fn clear_data_wizard(store: &mut FileStore) {
    let confirmed =
        Confirm::new("This will delete your saved settings, company info and logo. Are you sure?")
            .with_default(false)
            .prompt()
            .unwrap_or(false);
    if !confirmed {
        println!("Cancelled");
        return;
    }

    if storage::clear_all_data(store) {
        println!("✅ Saved data cleared.");
    } else {
        println!("❌ Some data could not be cleared.");
    }
}

// ==========================================
// 5. Config & Utilities
// ==========================================

fn currency_symbol(code: &str) -> &'static str {
    match code {
        "USD" | "CAD" | "AUD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" | "CNY" => "¥",
        "INR" => "₹",
        _ => "",
    }
}

fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "invoice-dragon", "app") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir).ok();
        }
        return config_dir.join("config.toml");
    }
    PathBuf::from("config.toml")
}

fn load_app_config() -> Option<AppConfig> {
    let path = get_config_path();
    if !path.exists() {
        return None;
    }
    let content = fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

fn setup_config_wizard() -> AppConfig {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = load_app_config();
    let default_val = current
        .map(|c| c.data_root)
        .unwrap_or_else(|| "~/Documents/InvoiceDragon".to_string());

    println!("📂 Opening folder picker...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Data Directory")
        .pick_folder();

    let new_root = if let Some(path) = picked_path {
        path.to_string_lossy().to_string()
    } else {
        println!("❌ No folder selected. Falling back to manual input.");
        Text::new("Enter Data Directory:")
            .with_default(&default_val)
            .prompt()
            .unwrap_or(default_val)
    };

    let config = AppConfig { data_root: new_root };

    let path = get_config_path();
    match toml::to_string_pretty(&config) {
        Ok(toml_str) => match fs::write(&path, toml_str) {
            Ok(()) => println!("✅ Configuration saved."),
            Err(e) => println!("❌ Error: Failed to save configuration: {}", e),
        },
        Err(e) => println!("❌ Error: Failed to serialize configuration: {}", e),
    }
    config
}

fn expand_home_dir(path: &str) -> String {
    if path.starts_with("~") {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen("~", &home, 1);
        }
    }
    path.to_string()
}
