//! `admitline contacts` — Inspect and export stored contact requests.

use admitline_config::ContactStoreKind;
use admitline_core::contact::{ContactRequest, ContactStatus};
use admitline_core::store::ContactStore;
use anyhow::Context;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use super::load_config;
use super::runtime::open_contact_store;

const CSV_HEADER: [&str; 8] =
    ["reference_id", "created_at", "name", "email", "phone", "query_type", "message", "status"];

pub async fn list(config_path: &Path, limit: usize, status: Option<ContactStatus>) -> anyhow::Result<()> {
    let Some(store) = persistent_store(config_path).await? else {
        return Ok(());
    };

    let all = store.list().await?;
    let (pending, contacted, resolved) = status_counts(&all);
    println!("📋 Contact requests: {pending} pending, {contacted} contacted, {resolved} resolved");

    let requests = match status {
        Some(status) => store.list_by_status(status).await?,
        None => all,
    };
    if requests.is_empty() {
        println!("No contact requests yet.");
        return Ok(());
    }

    for request in requests.iter().take(limit) {
        println!("{}", row(request));
    }
    if requests.len() > limit {
        println!("… and {} more", requests.len() - limit);
    }
    Ok(())
}

/// Write requests as CSV to `out`, or to stdout.
pub async fn export(config_path: &Path, status: Option<ContactStatus>, out: Option<&Path>) -> anyhow::Result<()> {
    let Some(store) = persistent_store(config_path).await? else {
        return Ok(());
    };
    let requests = match status {
        Some(status) => store.list_by_status(status).await?,
        None => store.list().await?,
    };

    match out {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            write_csv(&requests, file)?;
            eprintln!("✅ Exported {} request(s) to {}", requests.len(), path.display());
        }
        None => write_csv(&requests, std::io::stdout().lock())?,
    }
    Ok(())
}

async fn persistent_store(config_path: &Path) -> anyhow::Result<Option<Arc<dyn ContactStore>>> {
    let config = load_config(config_path)?;
    if config.contact.store == ContactStoreKind::Memory {
        println!("Contact store is in-memory; nothing persists between runs.");
        return Ok(None);
    }
    Ok(Some(open_contact_store(&config).await?))
}

fn status_counts(requests: &[ContactRequest]) -> (usize, usize, usize) {
    let count = |status| requests.iter().filter(|r| r.status == status).count();
    (
        count(ContactStatus::Pending),
        count(ContactStatus::Contacted),
        count(ContactStatus::Resolved),
    )
}

/// The phone number is shown only for query types where staff may call back.
fn visible_phone(request: &ContactRequest) -> Option<&str> {
    request.query_type.phone_visible().then_some(request.phone.as_str())
}

/// One line per request.
fn row(request: &ContactRequest) -> String {
    format!(
        "{}  {}  {:<22} {:<9} {} <{}> {}",
        request.reference_id,
        request.created_at.format("%Y-%m-%d %H:%M"),
        request.query_type.label(),
        request.status.as_str(),
        request.name,
        request.email,
        visible_phone(request).unwrap_or("(hidden)"),
    )
}

fn write_csv<W: Write>(requests: &[ContactRequest], out: W) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(CSV_HEADER)?;
    for request in requests {
        let created_at = request.created_at.format("%Y-%m-%d %H:%M:%S").to_string();
        writer.write_record([
            request.reference_id.as_str(),
            created_at.as_str(),
            request.name.as_str(),
            request.email.as_str(),
            visible_phone(request).unwrap_or(""),
            request.query_type.as_str(),
            request.message.as_deref().unwrap_or(""),
            request.status.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
