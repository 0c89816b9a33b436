use std::fmt::Debug;

use serde_json::Value;
use setcache_core::{OpOutcome, ScanOptions, SetCache};

use crate::Commands;

/// Members given on the command line are JSON when they parse as JSON
fn parse_member(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn report<T: Debug>(label: &str, outcome: OpOutcome<T>) {
    match outcome {
        OpOutcome::Success(value) => println!("{}: {:?}", label, value),
        OpOutcome::Unavailable => println!("{}: cache not available", label),
        OpOutcome::Failed(e) => eprintln!("❌ {}: {}", label, e),
    }
}

/// Reference workflow over one key
pub(crate) async fn run_demo(cache: &SetCache, key: &str) {
    let numbers = [1, 3, 5, 7, 9, 4, 5, 1, 32, 32, 434, 243];
    println!("🚀 Running set workflow on '{}'", key);

    report("add_members", cache.add_members(key, &numbers).await);
    report("cardinality", cache.cardinality(key).await);
    report("is_member(5)", cache.is_member(key, &5).await);
    report("is_member(6)", cache.is_member(key, &6).await);
    report("all_members", cache.all_members(key).await);
    report(
        "scan_all",
        cache.scan_all(key, &ScanOptions::default().with_count(4)).await,
    );
    report("pop_random(2)", cache.pop_random(key, Some(2)).await);
    report("remove_members", cache.remove_members(key, &numbers).await);
    report("cardinality", cache.cardinality(key).await);
}

pub(crate) async fn run_command(cache: &SetCache, command: Commands) {
    match command {
        Commands::Demo { key } => run_demo(cache, &key).await,
        Commands::Add { key, members } => {
            let members: Vec<Value> = members.iter().map(|m| parse_member(m)).collect();
            report("add_members", cache.add_members(&key, &members).await);
        }
        Commands::Card { key } => report("cardinality", cache.cardinality(&key).await),
        Commands::IsMember { key, member } => {
            report("is_member", cache.is_member(&key, &parse_member(&member)).await)
        }
        Commands::Members { key } => report("all_members", cache.all_members(&key).await),
        Commands::Pop { key, count } => report("pop_random", cache.pop_random(&key, count).await),
        Commands::Remove { key, members } => {
            let members: Vec<Value> = members.iter().map(|m| parse_member(m)).collect();
            report("remove_members", cache.remove_members(&key, &members).await);
        }
        Commands::Scan {
            key,
            pattern,
            count,
        } => {
            let mut options = ScanOptions::default();
            if let Some(pattern) = pattern {
                options = options.with_pattern(pattern);
            }
            if let Some(count) = count {
                options = options.with_count(count);
            }
            report("scan_all", cache.scan_all(&key, &options).await);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_member_prefers_json() {
        assert_eq!(parse_member("5"), Value::from(5));
        assert_eq!(parse_member("\"5\""), Value::from("5"));
        assert_eq!(parse_member("alice"), Value::from("alice"));
    }
}
