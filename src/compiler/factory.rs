//! Multi-target compiler construction.

use std::sync::Arc;

use crate::compiler::{Bundler, CompilerUnit, TargetKind};
use crate::config::TargetConfig;
use crate::error::ConfigurationError;

/// Compose the client and optional server targets into one compiler unit.
///
/// Target order is `[client]` or `[client, server]`. No build is started.
pub fn create_compiler(
    bundler: Arc<dyn Bundler>,
    client_config: Option<TargetConfig>,
    server_config: Option<TargetConfig>,
) -> Result<Arc<CompilerUnit>, ConfigurationError> {
    let client_config = client_config.ok_or(ConfigurationError::MissingClient)?;

    if client_config.name != TargetKind::Client.as_str() {
        return Err(ConfigurationError::ClientName {
            found: client_config.name,
        });
    }

    let mut targets = vec![(TargetKind::Client, client_config)];

    match server_config {
        Some(server_config) => {
            if server_config.name != TargetKind::Server.as_str() {
                return Err(ConfigurationError::ServerName {
                    found: server_config.name,
                });
            }
            targets.push((TargetKind::Server, server_config));
        }
        None => {
            tracing::info!("No server config found. Starting in client-only mode.");
        }
    }

    Ok(Arc::new(CompilerUnit::new(bundler, targets)))
}
