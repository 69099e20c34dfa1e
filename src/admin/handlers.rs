use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::compiler::{CompilationSummary, CompilerUnit};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DevStatus {
    pub version: String,
    /// `idle`, `building` or `done`.
    pub state: String,
    /// Last completed generation.
    pub generation: Option<u64>,
    pub targets: Vec<TargetSummary>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TargetSummary {
    pub name: String,
    pub public_path: String,
    pub build: Option<BuildSummary>,
}

/// Mirror of [`CompilationSummary`] that can also be read back by clients.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BuildSummary {
    pub hash: String,
    pub time: u64,
    pub assets: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl From<CompilationSummary> for BuildSummary {
    fn from(summary: CompilationSummary) -> Self {
        Self {
            hash: summary.hash,
            time: summary.time,
            assets: summary.assets,
            errors: summary.errors,
            warnings: summary.warnings,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RebuildAccepted {
    pub status: String,
}

pub async fn get_status(State(unit): State<Arc<CompilerUnit>>) -> Json<DevStatus> {
    let stats = unit.last_stats();

    let targets = unit
        .targets()
        .iter()
        .map(|target| TargetSummary {
            name: target.name().to_string(),
            public_path: target.config().output.public_path.clone(),
            build: stats.as_ref().and_then(|stats| {
                stats
                    .get(target.name())
                    .map(|c| CompilationSummary::new(c, stats).into())
            }),
        })
        .collect();

    Json(DevStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        state: unit.status().label().to_string(),
        generation: stats.as_ref().map(|s| s.generation),
        targets,
    })
}

pub async fn post_rebuild(State(unit): State<Arc<CompilerUnit>>) -> (StatusCode, Json<RebuildAccepted>) {
    if unit.is_watching() {
        unit.invalidate();
    } else {
        let unit = Arc::clone(&unit);
        tokio::spawn(async move {
            unit.run().await;
        });
    }

    (
        StatusCode::ACCEPTED,
        Json(RebuildAccepted {
            status: "rebuild scheduled".to_string(),
        }),
    )
}
