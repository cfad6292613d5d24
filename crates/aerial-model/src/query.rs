//! Read-side queries for serving code: every line with its attributes, and
//! every stop that currently has a vehicle, per line and route.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::entity::{Model, Operator};

pub type Attributes = BTreeMap<String, String>;

/// One present stop on one route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentStop {
    pub line: String,
    pub route: Attributes,
    pub stop: Attributes,
}

/// Line id -> line attributes, for every line known to `operator`.
pub async fn list_lines(operator: &Operator) -> Result<BTreeMap<String, Attributes>> {
    let mut out = BTreeMap::new();
    for line in operator.lines().await? {
        let attrs = line.attributes().await?;
        out.insert(line.id().to_string(), attrs);
    }
    Ok(out)
}

/// Every present stop of every route of every line, ordered by line, route
/// and stop key.
pub async fn present_stops(operator: &Operator) -> Result<Vec<PresentStop>> {
    let mut lines = operator.lines().await?;
    lines.sort();

    let mut out = Vec::new();
    for line in lines {
        let mut routes = line.routes().await?;
        routes.sort();
        for route in routes {
            let route_attrs = route.attributes().await?;
            let mut stops = route.present().stops().await?;
            stops.sort();
            for stop in stops {
                out.push(PresentStop {
                    line: line.id().to_string(),
                    route: route_attrs.clone(),
                    stop: stop.attributes().await?,
                });
            }
        }
    }
    Ok(out)
}
