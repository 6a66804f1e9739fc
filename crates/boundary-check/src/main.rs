use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::{Context, Result};
use cargo_metadata::MetadataCommand;

/// Crates that must stay free of storage and host concerns, with the workspace crates
/// each one may never reach.
const RULES: &[(&str, &[&str])] = &[
    (
        "lock3r-contracts",
        &["lock3r-ledger", "lock3r-policy", "lock3r-guard"],
    ),
    ("lock3r-ledger", &["lock3r-policy", "lock3r-guard"]),
    ("lock3r-policy", &["lock3r-guard"]),
];

fn main() -> Result<()> {
    let metadata = MetadataCommand::new()
        .exec()
        .context("failed to run `cargo metadata`")?;

    let resolve = metadata
        .resolve
        .as_ref()
        .context("`cargo metadata` did not include a resolved dependency graph")?;

    let id_to_name: HashMap<_, _> = metadata
        .packages
        .iter()
        .map(|p| (p.id.clone(), p.name.as_str()))
        .collect();

    let adjacency: HashMap<_, _> = resolve
        .nodes
        .iter()
        .map(|node| {
            let deps: Vec<_> = node.deps.iter().map(|dep| dep.pkg.clone()).collect();
            (node.id.clone(), deps)
        })
        .collect();

    let mut failed = false;

    for (package_name, forbidden) in RULES {
        let package = metadata
            .packages
            .iter()
            .find(|p| p.name == *package_name)
            .with_context(|| format!("package `{}` not found in workspace", package_name))?;

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(package.id.clone());
        visited.insert(package.id.clone());

        let mut violations = Vec::new();

        while let Some(current) = queue.pop_front() {
            let Some(deps) = adjacency.get(&current) else {
                continue;
            };

            for dep in deps.iter().cloned() {
                if !visited.insert(dep.clone()) {
                    continue;
                }

                if let Some(name) = id_to_name.get(&dep)
                    && forbidden.contains(name)
                {
                    violations.push((*name).to_string());
                }

                queue.push_back(dep);
            }
        }

        if violations.is_empty() {
            println!(
                "OK: `{}` has no dependency edge to {}",
                package_name,
                forbidden.join(", ")
            );
            continue;
        }

        violations.sort();
        violations.dedup();
        eprintln!(
            "FAIL: `{}` depends on forbidden crate(s): {}",
            package_name,
            violations.join(", ")
        );
        failed = true;
    }

    if failed {
        std::process::exit(1);
    }

    Ok(())
}
