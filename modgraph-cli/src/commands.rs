use anyhow::{bail, Result};
use modgraph_lib::models::{Conflict, ConflictRule, ConflictType, Severity};
use modgraph_lib::{AnalysisReport, AnalysisService, ScanResult};
use serde::Serialize;
use std::path::Path;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn scan(service: &AnalysisService, dir: &Path, json: bool) -> Result<()> {
    let result = service.scan(dir)?;
    if json {
        return print_json(&result);
    }
    print_scan_summary(&result);
    Ok(())
}

fn print_scan_summary(result: &ScanResult) {
    println!(
        "{}: {} mods ({} new, {} updated, {} removed)",
        result.modpack.name,
        result.mods.len(),
        result.new_mods.len(),
        result.updated_mods.len(),
        result.removed_mods.len()
    );
    println!(
        "Cache: {} hits, {} misses ({:.1}%)",
        result.cache_hits,
        result.cache_misses,
        result.cache_hit_rate()
    );
    for failure in &result.failures {
        println!("  skipped {}: {}", failure.relative_path, failure.error);
    }
}

pub fn analyze(service: &AnalysisService, dir: &Path, json: bool) -> Result<()> {
    let report = service.analyze(dir)?;
    if json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    let summary = &report.summary;
    println!(
        "{}: {} mods, {} conflicts ({} failed archives, {:.1}% cache hits)",
        report.modpack.name,
        summary.total_mods,
        summary.total_conflicts,
        summary.failed_archives,
        summary.cache_hit_rate
    );
    for (severity, count) in &summary.conflicts_by_severity {
        println!("  {}: {}", severity, count);
    }
    for conflict in &report.conflicts {
        print_conflict(conflict);
    }
}

fn print_conflict(conflict: &Conflict) {
    println!(
        "[{}] {} ({})",
        conflict.severity.as_str().to_uppercase(),
        conflict.description,
        conflict.conflict_type.as_str()
    );
}

pub fn graph(service: &AnalysisService, dir: &Path) -> Result<()> {
    print_json(&service.get_graph(dir)?)
}

pub fn show_mod(service: &AnalysisService, mod_id: &str) -> Result<()> {
    match service.get_mod_metadata(mod_id)? {
        Some(metadata) => print_json(&metadata),
        None => bail!("No stored metadata for mod '{}'", mod_id),
    }
}

pub fn list_rules(service: &AnalysisService) -> Result<()> {
    let rules = service.list_rules()?;
    if rules.is_empty() {
        println!("No conflict rules defined");
    }
    for rule in rules {
        println!(
            "#{} {} <-> {} [{} / {}] {}",
            rule.id,
            rule.mod_id_a,
            rule.mod_id_b,
            rule.conflict_type.as_str(),
            rule.severity,
            rule.description
        );
    }
    Ok(())
}

pub fn add_rule(
    service: &AnalysisService,
    mod_a: &str,
    mod_b: &str,
    conflict_type: &str,
    severity: &str,
    description: &str,
) -> Result<()> {
    let conflict_type: ConflictType = conflict_type.parse().map_err(anyhow::Error::msg)?;
    let severity: Severity = severity.parse().map_err(anyhow::Error::msg)?;
    if mod_a == mod_b {
        bail!("A conflict rule needs two different mods");
    }
    let saved = service.add_rule(ConflictRule {
        id: 0,
        mod_id_a: mod_a.to_string(),
        mod_id_b: mod_b.to_string(),
        conflict_type,
        description: description.to_string(),
        severity,
    })?;
    println!("Added rule #{}", saved.id);
    Ok(())
}

pub fn remove_rule(service: &AnalysisService, rule_id: u64) -> Result<()> {
    if !service.delete_rule(rule_id)? {
        bail!("No conflict rule with id {}", rule_id);
    }
    println!("Removed rule #{}", rule_id);
    Ok(())
}
