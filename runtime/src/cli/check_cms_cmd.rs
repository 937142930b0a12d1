//! `pagescout check-cms`: verify the configured CMS credentials.

use crate::cli::output::{self, Styled};
use crate::config::ScoutConfig;
use crate::session::{OperationKind, ScoutSession};
use anyhow::{bail, Result};

pub async fn run(config: ScoutConfig) -> Result<()> {
    let s = Styled::new();
    let session = ScoutSession::new(config)?;
    let cancel = session.begin(OperationKind::Discovery);

    let endpoint = session
        .config()
        .cms
        .credentials
        .as_ref()
        .map(|c| c.api_base().to_string())
        .unwrap_or_default();

    match session.test_cms_connection(&cancel).await {
        Ok(info) => {
            if output::is_json() {
                output::print_json(&serde_json::json!({
                    "connected": true,
                    "endpoint": endpoint,
                    "id": info.id,
                    "name": info.name,
                    "roles": info.roles,
                }));
                return Ok(());
            }
            if !output::is_quiet() {
                output::print_header(&s);
            }
            output::print_check(s.ok_sym(), "connected", &endpoint);
            output::print_check(s.ok_sym(), "user", &format!("{} (#{})", info.name, info.id));
            if !info.roles.is_empty() {
                output::print_check(s.ok_sym(), "roles", &info.roles.join(", "));
            }
            Ok(())
        }
        Err(e) => {
            if output::is_json() {
                output::print_json(&serde_json::json!({
                    "connected": false,
                    "endpoint": endpoint,
                    "error": e.to_string(),
                    "hint": e.hint(),
                }));
            } else {
                output::print_check(s.fail_sym(), "connection", &endpoint);
                output::print_detail(e.hint());
            }
            bail!("CMS connection failed: {e}");
        }
    }
}
