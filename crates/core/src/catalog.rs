//! Catalog aggregation: chart version listings → deduplicated services and plans.
//!
//! One service per chart name, one plan per distinct `appVersion` of that
//! chart. When several chart versions package the same app version, the
//! highest chart version wins. Each plan remembers the exact chart version
//! it was built from, so provisioning looks the version up instead of
//! reconstructing it from the plan ID.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::repository::ChartVersion;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub description: String,
    pub free: bool,
    /// Chart version this plan installs.
    #[serde(skip)]
    pub chart_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub description: String,
    pub bindable: bool,
    pub tags: Vec<String>,
    pub plans: Vec<Plan>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    pub services: Vec<Service>,
}

impl Catalog {
    pub fn service(&self, service_id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == service_id)
    }

    /// The chart version behind `plan_id` of `service_id`.
    pub fn resolve(&self, service_id: &str, plan_id: &str) -> Option<&str> {
        self.service(service_id)?
            .plans
            .iter()
            .find(|p| p.id == plan_id)
            .map(|p| p.chart_version.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Build the catalog. `include` decides which chart names are listed at all.
pub fn build_catalog(
    charts: &BTreeMap<String, Vec<ChartVersion>>,
    include: impl Fn(&str) -> bool,
) -> Catalog {
    let mut services = Vec::new();

    for (chart, versions) in charts {
        if !include(chart) {
            continue;
        }

        let plans = build_plans(chart, versions);
        if plans.is_empty() {
            tracing::debug!(chart = %chart, "no plans, leaving chart out of the catalog");
            continue;
        }

        services.push(Service {
            id: chart.clone(),
            name: chart.clone(),
            description: format!("Helm Chart for {}", chart),
            bindable: true,
            tags: tag_intersection(versions),
            plans,
        });
    }

    Catalog { services }
}

fn build_plans(chart: &str, versions: &[ChartVersion]) -> Vec<Plan> {
    let mut newest: BTreeMap<&str, (semver::Version, &ChartVersion)> = BTreeMap::new();

    for cv in versions {
        if cv.app_version.is_empty() {
            continue;
        }
        let parsed = match parse_chart_version(&cv.version) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    chart = %chart,
                    app_version = %cv.app_version,
                    version = %cv.version,
                    error = %e,
                    "skipping chart version that is not valid semver"
                );
                continue;
            }
        };

        let replace = match newest.get(cv.app_version.as_str()) {
            Some((current, _)) => parsed > *current,
            None => true,
        };
        if replace {
            newest.insert(cv.app_version.as_str(), (parsed, cv));
        }
    }

    let mut ids = HashSet::new();
    newest
        .into_values()
        .map(|(_, cv)| {
            let id = slug(&format!("{}@{}", chart, cv.app_version).to_lowercase());
            if !ids.insert(id.clone()) {
                // Distinct app versions such as `9.6` and `9-6` share a slug;
                // lookups by plan ID only ever reach the first one.
                tracing::warn!(
                    chart = %chart,
                    plan_id = %id,
                    app_version = %cv.app_version,
                    "plan ID collides with another app version"
                );
            }
            Plan {
                id,
                name: slug(&cv.app_version),
                description: cv.description.clone(),
                free: true,
                chart_version: cv.version.clone(),
            }
        })
        .collect()
}

/// Keywords shared by every version of a chart, in first-seen order.
pub fn tag_intersection(versions: &[ChartVersion]) -> Vec<String> {
    let Some((first, rest)) = versions.split_first() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    first
        .keywords
        .iter()
        .filter(|tag| rest.iter().all(|cv| cv.keywords.contains(tag)))
        .filter(|tag| seen.insert(tag.as_str()))
        .cloned()
        .collect()
}

/// Replace every character outside `[a-z0-9]` with `-`.
pub fn slug(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Parse a chart version, accepting the short forms charts use in practice
/// (`v1.2.3`, `1.2`, `3`).
pub fn parse_chart_version(raw: &str) -> Result<semver::Version, semver::Error> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    match semver::Version::parse(trimmed) {
        Ok(v) => Ok(v),
        Err(err) => {
            let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
            let (core, suffix) = trimmed.split_at(split);
            let padded = match core.split('.').count() {
                1 => format!("{core}.0.0{suffix}"),
                2 => format!("{core}.0{suffix}"),
                _ => return Err(err),
            };
            semver::Version::parse(&padded).map_err(|_| err)
        }
    }
}
